use crate::codec::{Decoder, Encoder};
use anyhow::Result;
use bytes::Bytes;
use serde::{Serialize, de::DeserializeOwned};

/// Codec storing values as JSON, compact by default.
///
/// # Example
/// ```
/// use workflow_core::codec::{Decoder, Encoder};
/// use workflow_core::serialization::JsonCodec;
///
/// let codec = JsonCodec::pretty();
/// let bytes = codec.encode(&vec![1u32, 2, 3]).unwrap();
/// assert!(bytes.contains(&b'\n'));
/// let back: Vec<u32> = codec.decode(bytes).unwrap();
/// assert_eq!(back, vec![1, 2, 3]);
/// ```
#[derive(Debug, Clone, Copy, Default)]
pub struct JsonCodec {
    pretty: bool,
}

impl JsonCodec {
    pub fn new() -> Self {
        Self::default()
    }

    /// Indented output, for snapshots meant to be read by operators.
    pub fn pretty() -> Self {
        Self { pretty: true }
    }
}

impl<T: Serialize> Encoder<T> for JsonCodec {
    fn encode(&self, value: &T) -> Result<Bytes> {
        let bytes = if self.pretty {
            serde_json::to_vec_pretty(value)?
        } else {
            serde_json::to_vec(value)?
        };
        Ok(Bytes::from(bytes))
    }
}

impl<T: DeserializeOwned> Decoder<T> for JsonCodec {
    fn decode(&self, bytes: Bytes) -> Result<T> {
        Ok(serde_json::from_slice(&bytes)?)
    }
}
