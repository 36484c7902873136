use serde::{de::DeserializeOwned, Serialize};

use crate::error::StateError;

pub(crate) fn encode<T: Serialize + ?Sized>(key: &str, value: &T) -> Result<String, StateError> {
    serde_json::to_string(value).map_err(|source| StateError::Encode {
        key: key.to_string(),
        source,
    })
}

pub(crate) fn decode<T: DeserializeOwned>(key: &str, raw: &str) -> Result<T, StateError> {
    serde_json::from_str(raw).map_err(|e| StateError::Corrupt {
        key: key.to_string(),
        reason: e.to_string(),
    })
}
