//! User-facing notifications.
//!
//! Failures that the user should know about (a layer that would not load)
//! are reported to a [`NotificationSink`]. [`NotificationLog`] is a sink
//! that keeps everything it receives and can group it for display.

use std::error::Error as StdError;
use std::fmt;
use std::sync::Arc;

use parking_lot::Mutex;

use crate::logging::targets;
use crate::signal::Signal;

/// How serious a notification is.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Severity {
    /// Informational.
    Information,
    /// Something may be wrong.
    Warning,
    /// Something failed.
    Error,
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Information => "Information",
            Self::Warning => "Warning",
            Self::Error => "Error",
        })
    }
}

/// What area a notification concerns.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default)]
pub enum NotificationCategory {
    /// Uncategorized.
    #[default]
    General,
    /// Reading or writing files and resources.
    FileIo,
    /// Network access.
    Network,
    /// Background downloads.
    Download,
}

impl fmt::Display for NotificationCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::General => "General",
            Self::FileIo => "File I/O",
            Self::Network => "Network",
            Self::Download => "Download",
        })
    }
}

/// A single notification.
#[derive(Debug, Clone)]
pub struct Notification {
    /// Severity.
    pub severity: Severity,
    /// Category.
    pub category: NotificationCategory,
    /// Short title.
    pub title: String,
    /// Full message.
    pub message: String,
    /// Underlying error, if any.
    pub cause: Option<Arc<dyn StdError + Send + Sync>>,
}

impl Notification {
    /// Create a notification in the general category.
    pub fn new(severity: Severity, title: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            severity,
            category: NotificationCategory::General,
            title: title.into(),
            message: message.into(),
            cause: None,
        }
    }

    /// An error notification.
    pub fn error(title: impl Into<String>, message: impl Into<String>) -> Self {
        Self::new(Severity::Error, title, message)
    }

    /// A warning notification.
    pub fn warning(title: impl Into<String>, message: impl Into<String>) -> Self {
        Self::new(Severity::Warning, title, message)
    }

    /// An informational notification.
    pub fn information(title: impl Into<String>, message: impl Into<String>) -> Self {
        Self::new(Severity::Information, title, message)
    }

    /// Set the category.
    pub fn with_category(mut self, category: NotificationCategory) -> Self {
        self.category = category;
        self
    }

    /// Attach the underlying error.
    pub fn with_cause<E>(mut self, cause: E) -> Self
    where
        E: StdError + Send + Sync + 'static,
    {
        self.cause = Some(Arc::new(cause));
        self
    }
}

/// Receives notifications.
pub trait NotificationSink: Send + Sync {
    /// Report one notification.
    fn report(&self, notification: Notification);
}

/// A sink that only writes notifications to the log.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingSink;

impl NotificationSink for TracingSink {
    fn report(&self, n: Notification) {
        match n.severity {
            Severity::Error => {
                tracing::error!(target: targets::NOTIFY, category = %n.category, title = %n.title, "{}", n.message)
            }
            Severity::Warning => {
                tracing::warn!(target: targets::NOTIFY, category = %n.category, title = %n.title, "{}", n.message)
            }
            Severity::Information => {
                tracing::info!(target: targets::NOTIFY, category = %n.category, title = %n.title, "{}", n.message)
            }
        }
    }
}

/// How [`NotificationLog::grouped`] groups notifications.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Grouping {
    /// One group holding everything.
    #[default]
    None,
    /// One group per severity, most severe first.
    Level,
    /// One group per category.
    Category,
}

/// Key of a group produced by [`NotificationLog::grouped`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum GroupKey {
    /// Everything.
    All,
    /// All notifications of one severity.
    Level(Severity),
    /// All notifications of one category.
    Category(NotificationCategory),
}

/// A collecting sink.
#[derive(Default)]
pub struct NotificationLog {
    entries: Mutex<Vec<Notification>>,
    posted: Signal<Notification>,
}

impl NotificationLog {
    /// Create an empty log.
    pub fn new() -> Self {
        Self::default()
    }

    /// Emitted after each notification is stored.
    pub fn posted(&self) -> &Signal<Notification> {
        &self.posted
    }

    /// A snapshot of everything reported so far, oldest first.
    pub fn notifications(&self) -> Vec<Notification> {
        self.entries.lock().clone()
    }

    /// Number of stored notifications.
    pub fn len(&self) -> usize {
        self.entries.lock().len()
    }

    /// Whether nothing has been reported.
    pub fn is_empty(&self) -> bool {
        self.entries.lock().is_empty()
    }

    /// Remove all stored notifications.
    pub fn clear(&self) {
        self.entries.lock().clear();
    }

    /// Group the stored notifications. Within a group, order of arrival is
    /// preserved; empty groups are omitted.
    pub fn grouped(&self, grouping: Grouping) -> Vec<(GroupKey, Vec<Notification>)> {
        let entries = self.entries.lock();
        match grouping {
            Grouping::None if entries.is_empty() => Vec::new(),
            Grouping::None => vec![(GroupKey::All, entries.clone())],
            Grouping::Level => {
                let mut levels: Vec<Severity> = entries.iter().map(|n| n.severity).collect();
                levels.sort_unstable_by(|a, b| b.cmp(a));
                levels.dedup();
                levels
                    .into_iter()
                    .map(|level| {
                        let group = entries.iter().filter(|n| n.severity == level).cloned().collect();
                        (GroupKey::Level(level), group)
                    })
                    .collect()
            }
            Grouping::Category => {
                let mut categories: Vec<NotificationCategory> =
                    entries.iter().map(|n| n.category).collect();
                categories.sort_unstable();
                categories.dedup();
                categories
                    .into_iter()
                    .map(|category| {
                        let group = entries.iter().filter(|n| n.category == category).cloned().collect();
                        (GroupKey::Category(category), group)
                    })
                    .collect()
            }
        }
    }
}

impl NotificationSink for NotificationLog {
    fn report(&self, notification: Notification) {
        tracing::debug!(
            target: targets::NOTIFY,
            severity = %notification.severity,
            title = %notification.title,
            "notification stored"
        );
        self.entries.lock().push(notification.clone());
        self.posted.emit(notification);
    }
}

impl fmt::Debug for NotificationLog {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("NotificationLog")
            .field("len", &self.len())
            .finish_non_exhaustive()
    }
}
