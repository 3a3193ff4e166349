//! Notification sink trait.
//!
//! Defines the interface for pushing a completed model answer somewhere
//! else (a chat bot, a desktop notifier, a script).

/// Receives the full text of each successfully recorded answer.
///
/// Implementations live outside the core. A failing sink never undoes the
/// conversation commit; callers log the error and move on.
#[async_trait::async_trait]
pub trait NotificationSink: Send + Sync {
    /// Delivers `text`.
    ///
    /// # Returns
    ///
    /// - `Ok(())`: Delivered
    /// - `Err(String)`: Delivery failed (message is logged, not propagated)
    async fn notify(&self, text: &str) -> Result<(), String>;
}
