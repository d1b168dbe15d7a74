//! Byte codecs used by storage backends.

use anyhow::Result;
use bytes::Bytes;

/// An encoder that can serialize a value into bytes.
pub trait Encoder<T>: Send + Sync + 'static {
    fn encode(&self, value: &T) -> Result<Bytes>;
}

/// A decoder that can deserialize a value from bytes.
pub trait Decoder<T>: Send + Sync + 'static {
    fn decode(&self, bytes: Bytes) -> Result<T>;
}

/// A codec that can serialize and deserialize a value.
pub trait Codec<T>: Encoder<T> + Decoder<T> {}

/// Blanket impl `Codec` for any type that implements Encoder and Decoder.
impl<T, U> Codec<T> for U where U: Encoder<T> + Decoder<T> {}
