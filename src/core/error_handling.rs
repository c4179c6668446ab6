//! Generic error handling utilities
//!
//! Top-level reporting for errors that reach the binary.

/// Errors that know whether their message is meant for the user
///
/// When `is_user_actionable()` returns `true`, `user_message()` should return
/// `Some(message)`; otherwise it returns `None` and callers fall back to a
/// generic context line.
pub trait ContextualError: std::error::Error {
    /// True for errors the user can fix (bad options, invalid config file)
    fn is_user_actionable(&self) -> bool;

    /// The message to show when the error is user-actionable
    fn user_message(&self) -> Option<&str>;
}

/// Log a fatal error with detail matched to its kind
///
/// User-actionable errors print their own message; system errors print
/// `operation_context`. Full details always go to debug level.
///
/// # Examples
/// ```rust,no_run
/// # use smartqueue::core::error_handling::log_error_with_context;
/// # use smartqueue::queue::{EngineOptions, QueueError, SmartQueueEngine};
/// let options = EngineOptions { max_queue_size: 0, ..EngineOptions::default() };
/// if let Err(error) = SmartQueueEngine::<u32>::new(options) {
///     // Logs: "FATAL: max-queue-size must be greater than 0"
///     log_error_with_context(&error, "Creating queue");
/// }
/// ```
pub fn log_error_with_context<E: ContextualError + std::fmt::Display + std::fmt::Debug>(
    error: &E,
    operation_context: &str,
) {
    match error.user_message() {
        Some(user_msg) if error.is_user_actionable() => log::error!("FATAL: {}", user_msg),
        _ => log::error!("FATAL: {}", operation_context),
    }
    log::debug!("DETAIL: {}", error);
    log::debug!("DEBUG_DETAILS: {:?}", error);
}
