use std::fmt;

use tracing::{error, info, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NotifyLevel {
    Info,
    Warn,
    Error,
}

impl fmt::Display for NotifyLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Info => "info",
            Self::Warn => "warn",
            Self::Error => "error",
        })
    }
}

/// Fire-and-forget user notifications. Sessions never look at the result.
pub trait Notifier: Send + Sync {
    fn notify(&self, level: NotifyLevel, title: &str, message: &str);
}

/// Routes notifications into the log.
#[derive(Debug, Clone, Copy, Default)]
pub struct LogNotifier;

impl Notifier for LogNotifier {
    fn notify(&self, level: NotifyLevel, title: &str, message: &str) {
        match level {
            NotifyLevel::Info => info!(target: "opsdesk::notify", title, "{message}"),
            NotifyLevel::Warn => warn!(target: "opsdesk::notify", title, "{message}"),
            NotifyLevel::Error => error!(target: "opsdesk::notify", title, "{message}"),
        }
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use parking_lot::Mutex;

    use super::{Notifier, NotifyLevel};

    #[derive(Debug, Default)]
    pub(crate) struct RecordingNotifier {
        pub seen: Mutex<Vec<(NotifyLevel, String, String)>>,
    }

    impl RecordingNotifier {
        pub(crate) fn levels(&self) -> Vec<NotifyLevel> {
            self.seen.lock().iter().map(|(level, _, _)| *level).collect()
        }
    }

    impl Notifier for RecordingNotifier {
        fn notify(&self, level: NotifyLevel, title: &str, message: &str) {
            self.seen
                .lock()
                .push((level, title.to_string(), message.to_string()));
        }
    }

    #[test]
    fn recording_notifier_keeps_order() {
        let notifier = RecordingNotifier::default();
        notifier.notify(NotifyLevel::Info, "SQL", "ok");
        notifier.notify(NotifyLevel::Error, "SSH", "denied");
        assert_eq!(notifier.levels(), [NotifyLevel::Info, NotifyLevel::Error]);
    }
}
