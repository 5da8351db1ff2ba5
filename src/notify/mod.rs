pub mod telegram;

use tracing::info;

use crate::error::NotifyError;

/// Sink for human-facing alerts. `send` blocks until delivery is settled.
pub trait Notifier {
    fn send(&self, code: &str, provenance_link: &str) -> Result<(), NotifyError>;
}

/// Markdown alert shared by every notifier.
pub fn format_alert(title: &str, code: &str, provenance_link: &str) -> String {
    format!(
        "🆕 *{}*\n\n`{}`\n\n[Source]({})",
        title, code, provenance_link
    )
}

/// Writes alerts to the log. Used when no delivery channel is configured.
pub struct ConsoleNotifier {
    title: String,
}

impl ConsoleNotifier {
    pub fn new(title: impl Into<String>) -> Self {
        ConsoleNotifier {
            title: title.into(),
        }
    }
}

impl Notifier for ConsoleNotifier {
    fn send(&self, code: &str, provenance_link: &str) -> Result<(), NotifyError> {
        info!(
            "Skipping Telegram send (no credentials): {}",
            format_alert(&self.title, code, provenance_link).replace('\n', " ")
        );
        Ok(())
    }
}
