use serde::{Deserialize, Serialize};

use super::errors::ServiceResult;

/// Wire-level result: `model` on success, `msg` on failure.
///
/// A failed call always carries `model: null` and a non-empty `msg`; a
/// successful one carries the model and an empty `msg`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Envelope<T> {
    pub model: Option<T>,
    pub msg: String,
}

impl<T> Envelope<T> {
    pub fn ok(model: T) -> Self {
        Self {
            model: Some(model),
            msg: String::new(),
        }
    }

    pub fn failure(msg: impl Into<String>) -> Self {
        Self {
            model: None,
            msg: msg.into(),
        }
    }

    pub fn is_ok(&self) -> bool {
        self.model.is_some()
    }
}

impl<T> From<ServiceResult<T>> for Envelope<T> {
    fn from(value: ServiceResult<T>) -> Self {
        match value {
            Ok(model) => Envelope::ok(model),
            Err(e) => Envelope::failure(e.to_string()),
        }
    }
}
