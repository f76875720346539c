//! Error-code contract shared by every error enum in the crate.
//!
//! Each module owns its own `thiserror` enum. This trait gives the UI layer a
//! grepable code and a retry hint without matching on concrete types.

/// Grepable error code and retryable flag for user-facing error notices.
pub trait ErrorCode: std::fmt::Display {
    fn error_code(&self) -> &'static str;

    fn retryable(&self) -> bool {
        false
    }
}
