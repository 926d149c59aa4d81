//! On-disk encoding of queue entries.
//!
//! Small events are stored as plain JSON. Events whose JSON reaches the
//! threshold are gzip-compressed and wrapped in a versioned envelope:
//!
//! ```text
//! {"v":1,"compression":"gzip","payload":"<base64>"}
//! ```

use base64::{engine::general_purpose::STANDARD as BASE64, Engine};
use flate2::{read::GzDecoder, write::GzEncoder, Compression};
use serde::{Deserialize, Serialize};
use std::io::{Read, Write};
use thiserror::Error;

const ENVELOPE_VERSION: u8 = 1;
const COMPRESSION_TYPE: &str = "gzip";

#[derive(Debug, Serialize, Deserialize)]
struct CompressedEnvelope {
    v: u8,
    compression: String,
    payload: String,
}

#[derive(Debug, Error)]
pub enum EnvelopeError {
    #[error("Compression failed: {0}")]
    Compression(#[from] std::io::Error),

    #[error("Base64 decode failed: {0}")]
    Base64(#[from] base64::DecodeError),

    #[error("Envelope serialization failed: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Unsupported envelope version {0}")]
    UnsupportedVersion(u8),

    #[error("Unsupported compression '{0}'")]
    UnsupportedCompression(String),
}

/// Encodes event JSON for storage, compressing at or above `threshold` bytes.
pub fn encode_entry(json: &[u8], threshold: usize) -> Result<Vec<u8>, EnvelopeError> {
    if json.len() < threshold {
        return Ok(json.to_vec());
    }

    let mut encoder = GzEncoder::new(Vec::new(), Compression::default());
    encoder.write_all(json)?;
    let compressed = encoder.finish()?;

    let envelope = CompressedEnvelope {
        v: ENVELOPE_VERSION,
        compression: COMPRESSION_TYPE.into(),
        payload: BASE64.encode(&compressed),
    };
    Ok(serde_json::to_vec(&envelope)?)
}

/// Returns the event JSON stored in `bytes`, unwrapping an envelope if present.
pub fn decode_entry(bytes: &[u8]) -> Result<Vec<u8>, EnvelopeError> {
    let Ok(envelope) = serde_json::from_slice::<CompressedEnvelope>(bytes) else {
        return Ok(bytes.to_vec());
    };

    if envelope.v != ENVELOPE_VERSION {
        return Err(EnvelopeError::UnsupportedVersion(envelope.v));
    }
    if envelope.compression != COMPRESSION_TYPE {
        return Err(EnvelopeError::UnsupportedCompression(envelope.compression));
    }

    let compressed = BASE64.decode(&envelope.payload)?;
    let mut decoder = GzDecoder::new(&compressed[..]);
    let mut json = Vec::new();
    decoder.read_to_end(&mut json)?;
    Ok(json)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn small_entries_stay_plain() {
        let json = br#"{"message":"tiny"}"#;
        assert_eq!(encode_entry(json, 1024).unwrap(), json.to_vec());
        assert_eq!(decode_entry(json).unwrap(), json.to_vec());
    }

    #[test]
    fn large_entries_are_enveloped() {
        let json = format!(r#"{{"message":"{}"}}"#, "x".repeat(4000));

        let stored = encode_entry(json.as_bytes(), 1024).unwrap();
        let parsed: serde_json::Value = serde_json::from_slice(&stored).unwrap();

        assert_eq!(parsed["v"], 1);
        assert_eq!(parsed["compression"], "gzip");
        assert!(stored.len() < json.len() / 2);
        assert_eq!(decode_entry(&stored).unwrap(), json.into_bytes());
    }

    #[test]
    fn unknown_compression_is_rejected() {
        let stored = br#"{"v":1,"compression":"zstd","payload":""}"#;
        assert!(matches!(
            decode_entry(stored),
            Err(EnvelopeError::UnsupportedCompression(c)) if c == "zstd"
        ));

        let stored = br#"{"v":2,"compression":"gzip","payload":""}"#;
        assert!(matches!(decode_entry(stored), Err(EnvelopeError::UnsupportedVersion(2))));
    }
}
