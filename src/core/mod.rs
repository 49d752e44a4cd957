//! Core abstractions shared by every gateway component
//!
//! - `error`: structured error handling with kind tags and HTTP mapping

pub mod error;

pub use error::{ErrorKind, Result, ResultExt, TtsError};
