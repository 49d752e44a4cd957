//! Audio delivery
//!
//! A [`DeliverySink`] persists finished audio under a generated object key and
//! hands back a locator the caller can fetch it from.

mod http;
mod local;

pub use http::HttpPutSink;
pub use local::LocalDirSink;

use async_trait::async_trait;
use bytes::Bytes;
use chrono::{DateTime, Utc};

use crate::core::Result;
use crate::protocol::AudioFormat;

/// Where synthesized audio ends up
#[async_trait]
pub trait DeliverySink: Send + Sync {
    /// Store `data` under `key` and return its public locator
    async fn upload(&self, key: &str, data: Bytes, content_type: &str, overwrite: bool) -> Result<String>;
}

/// `tts/<UTC timestamp>-<8 hex>.<ext>`
pub fn object_key(format: AudioFormat) -> String {
    object_key_at(Utc::now(), format)
}

fn object_key_at(now: DateTime<Utc>, format: AudioFormat) -> String {
    format!(
        "tts/{}-{}.{}",
        now.format("%Y%m%dT%H%M%S%3fZ"),
        hex::encode(rand::random::<[u8; 4]>()),
        format.extension()
    )
}

/// Join a base URL and a key with exactly one slash
pub(crate) fn join_url(base: &str, key: &str) -> String {
    format!("{}/{}", base.trim_end_matches('/'), key.trim_start_matches('/'))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_object_key_shape() {
        let now = Utc.with_ymd_and_hms(2024, 5, 6, 7, 8, 9).unwrap()
            + chrono::Duration::milliseconds(42);
        let key = object_key_at(now, AudioFormat::Mp3);

        assert!(key.starts_with("tts/20240506T070809042Z-"), "{}", key);
        assert!(key.ends_with(".mp3"));
        let suffix = &key["tts/20240506T070809042Z-".len()..key.len() - 4];
        assert_eq!(suffix.len(), 8);
        assert!(suffix.chars().all(|c| c.is_ascii_hexdigit()));
    }

    #[test]
    fn test_object_key_uses_format_extension() {
        assert!(object_key(AudioFormat::Wav).ends_with(".wav"));
        assert!(object_key(AudioFormat::Opus).ends_with(".ogg"));
        assert_ne!(object_key(AudioFormat::Mp3), object_key(AudioFormat::Mp3));
    }

    #[test]
    fn test_join_url() {
        assert_eq!(join_url("http://cdn/x/", "tts/a.mp3"), "http://cdn/x/tts/a.mp3");
        assert_eq!(join_url("http://cdn", "/tts/a.mp3"), "http://cdn/tts/a.mp3");
    }
}
