//! Failure classification and reduced-DPI retry parameters.
//!
//! A render failure is [`FailureClass::Transient`] when the engine itself
//! faulted (a trap in its runtime, an allocation failure) and the same page
//! is likely to render at a lower resolution. Anything else is a problem
//! with the page content and is [`FailureClass::Fatal`].
//!
//! Classification prefers the structured class set by the backend. Only
//! when the backend could not tell does the policy fall back to matching
//! known fault signatures in the error message.

use crate::engine::{EngineError, FailureClass};
use once_cell::sync::Lazy;
use regex::Regex;

/// Lower bound for any retry resolution; retries never go below it.
pub const MIN_RETRY_DPI: f32 = 72.0;

/// Factor applied to the original DPI on retry.
pub const RETRY_DPI_FACTOR: f32 = 0.75;

/// Engine-internal fault signatures.
static TRANSIENT_SIGNATURE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)unreachable|\bwasm\b|\btrap(ped)?\b|out of memory|allocation failed|panicked")
        .unwrap()
});

/// Decides whether a failed page is retried, and at what resolution.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RetryPolicy {
    pub factor: f32,
    pub min_dpi: f32,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            factor: RETRY_DPI_FACTOR,
            min_dpi: MIN_RETRY_DPI,
        }
    }
}

impl RetryPolicy {
    pub fn classify(&self, error: &EngineError) -> FailureClass {
        match error.class {
            Some(class) => class,
            None => classify_message(&error.message),
        }
    }

    /// Resolution for the retry pass, or `None` when `dpi` is already at or
    /// below the minimum and no retry should happen.
    pub fn reduced_dpi(&self, dpi: f32) -> Option<f32> {
        if dpi <= self.min_dpi {
            return None;
        }
        Some((dpi * self.factor).max(self.min_dpi))
    }
}

/// Message-only classification for errors without a structured class.
pub fn classify_message(message: &str) -> FailureClass {
    if TRANSIENT_SIGNATURE.is_match(message) {
        FailureClass::Transient
    } else {
        FailureClass::Fatal
    }
}
