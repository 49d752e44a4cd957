//! Duplex task protocol
//!
//! One WebSocket connection per synthesis task:
//! start, continue with the whole text, finish, then collect binary audio
//! frames until the backend reports completion or failure.

pub mod client;
pub mod dashscope;
pub mod ids;
pub mod nls;
pub mod profile;
pub mod settle;
pub mod state;
pub mod types;

pub use client::TaskClient;
pub use dashscope::DashscopeProfile;
pub use ids::new_task_id;
pub use nls::NlsProfile;
pub use profile::{InboundControl, ProfileKind, ProtocolProfile, VoiceParams};
pub use settle::Settlement;
pub use state::{Action, ControlEvent, TaskEvent, TaskSession, TaskState};
pub use types::{AudioFormat, AudioResult, SynthesisRequest};
