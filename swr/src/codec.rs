//! The contract between typed values and the opaque bytes a driver stores.

use crate::error::CodecError;

use serde::de::DeserializeOwned;
use serde::Serialize;

/// Encodes typed values into bytes and decodes them back.
///
/// For every value `v` the codec supports, decoding `encode(v)` into a
/// destination leaves the destination equal to `v`.
pub trait Codec: Send + Sync + 'static {
  /// Encodes `value` into a byte payload.
  fn encode<T>(&self, value: &T) -> Result<Vec<u8>, CodecError>
  where
    T: Serialize + ?Sized;

  /// Decodes `bytes` into a new value.
  fn decode_value<T>(&self, bytes: &[u8]) -> Result<T, CodecError>
  where
    T: DeserializeOwned;

  /// Decodes `bytes` into the caller-owned `dst`.
  ///
  /// The default implementation decodes fully before assigning, so a failed
  /// decode leaves `dst` as it was. Callers must not rely on that for codecs
  /// that override this method.
  fn decode<T>(&self, bytes: &[u8], dst: &mut T) -> Result<(), CodecError>
  where
    T: DeserializeOwned,
  {
    *dst = self.decode_value(bytes)?;
    Ok(())
  }
}

/// A compact binary codec backed by `bincode`. This is the default codec.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BincodeCodec;

impl Codec for BincodeCodec {
  fn encode<T>(&self, value: &T) -> Result<Vec<u8>, CodecError>
  where
    T: Serialize + ?Sized,
  {
    bincode::serialize(value).map_err(|e| CodecError::Encode(e))
  }

  fn decode_value<T>(&self, bytes: &[u8]) -> Result<T, CodecError>
  where
    T: DeserializeOwned,
  {
    bincode::deserialize(bytes).map_err(|e| CodecError::Decode(e))
  }
}

/// A human-readable codec backed by `serde_json`.
#[cfg(feature = "json")]
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct JsonCodec;

#[cfg(feature = "json")]
impl Codec for JsonCodec {
  fn encode<T>(&self, value: &T) -> Result<Vec<u8>, CodecError>
  where
    T: Serialize + ?Sized,
  {
    serde_json::to_vec(value).map_err(|e| CodecError::Encode(Box::new(e)))
  }

  fn decode_value<T>(&self, bytes: &[u8]) -> Result<T, CodecError>
  where
    T: DeserializeOwned,
  {
    serde_json::from_slice(bytes).map_err(|e| CodecError::Decode(Box::new(e)))
  }
}
