//! Dataset byte encodings.

use serde::de::DeserializeOwned;
use serde::Serialize;

use daf_mapper::Format;

use crate::error::{ButlerError, ButlerResult};

fn codec_error(format: Format, e: impl ToString) -> ButlerError {
    ButlerError::Codec {
        format,
        reason: e.to_string(),
    }
}

/// Encode `value` in `format`.
pub fn encode<T: Serialize + ?Sized>(format: Format, value: &T) -> ButlerResult<Vec<u8>> {
    match format {
        Format::Json => serde_json::to_vec_pretty(value).map_err(|e| codec_error(format, e)),
        Format::Yaml => serde_yaml::to_string(value)
            .map(String::into_bytes)
            .map_err(|e| codec_error(format, e)),
        Format::Bincode => bincode::serialize(value).map_err(|e| codec_error(format, e)),
    }
}

/// Decode a `T` from `bytes` written in `format`.
///
/// Bincode is not self-describing: decoding it into a dynamic
/// [`serde_json::Value`] fails, so bincode datasets must be read with a
/// concrete type.
pub fn decode<T: DeserializeOwned>(format: Format, bytes: &[u8]) -> ButlerResult<T> {
    match format {
        Format::Json => serde_json::from_slice(bytes).map_err(|e| codec_error(format, e)),
        Format::Yaml => serde_yaml::from_slice(bytes).map_err(|e| codec_error(format, e)),
        Format::Bincode => bincode::deserialize(bytes).map_err(|e| codec_error(format, e)),
    }
}
