// Last-error slot shared by the session manager, the retrying client,
// and the Nest client. Written by whoever performs the current attempt,
// read by the host at any time.

use std::sync::{Arc, RwLock};

use crate::error::Error;

/// Text reported when no error has been recorded since the last attempt.
pub const NO_ERROR: &str = "All good";

/// Cheaply cloneable handle to the most recent access error.
///
/// `None` means "no error since the last attempt". All clones observe the
/// same slot.
#[derive(Debug, Clone, Default)]
pub struct AccessError {
    slot: Arc<RwLock<Option<String>>>,
}

impl AccessError {
    pub fn new() -> Self {
        Self::default()
    }

    /// Overwrite the stored message.
    pub fn set(&self, message: impl Into<String>) {
        *self.slot.write().expect("access error lock poisoned") = Some(message.into());
    }

    pub fn clear(&self) {
        *self.slot.write().expect("access error lock poisoned") = None;
    }

    /// Record a failed operation. Cancellation leaves the slot untouched.
    pub fn record(&self, err: &Error) {
        if !matches!(err, Error::Cancelled) {
            self.set(err.to_string());
        }
    }

    /// The stored message, if any.
    pub fn get(&self) -> Option<String> {
        self.slot.read().expect("access error lock poisoned").clone()
    }

    /// The stored message, or [`NO_ERROR`] when cleared.
    pub fn message(&self) -> String {
        self.get().unwrap_or_else(|| NO_ERROR.to_owned())
    }

    pub fn is_set(&self) -> bool {
        self.slot.read().expect("access error lock poisoned").is_some()
    }
}
