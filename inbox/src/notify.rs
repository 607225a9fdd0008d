//! User-facing notifications
//!
//! A rolled-back update is reported once, through whichever [`Notifier`]
//! the host wires in: straight to the log, or over a channel to the UI.
//! Server rejections are errors; an update abandoned by its caller is a
//! warning.

use serde::{Deserialize, Serialize};
use tracing::{error, warn};

use crate::error::InboxError;

const GENERIC_FAILURE: &str = "failed to update inbox messages";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NoticeLevel {
    Warning,
    Error,
}

/// Notification shown to the user
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Notice {
    pub level: NoticeLevel,
    pub message: String,
}

impl Notice {
    pub fn error(message: impl Into<String>) -> Self {
        Self {
            level: NoticeLevel::Error,
            message: message.into(),
        }
    }

    pub fn warning(message: impl Into<String>) -> Self {
        Self {
            level: NoticeLevel::Warning,
            message: message.into(),
        }
    }

    /// Error notice for a failed mutation.
    ///
    /// Shows the server's detail when there is one; transport failures and
    /// bare server errors get a generic message.
    pub fn from_error(err: &InboxError) -> Self {
        let detail = err.detail().unwrap_or(GENERIC_FAILURE);
        Self::error(format!("Error: {}", detail))
    }
}

pub trait Notifier: Send + Sync {
    fn notify(&self, notice: Notice);
}

/// Writes notices to the log
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingNotifier;

impl Notifier for TracingNotifier {
    fn notify(&self, notice: Notice) {
        match notice.level {
            NoticeLevel::Warning => warn!("{}", notice.message),
            NoticeLevel::Error => error!("{}", notice.message),
        }
    }
}

/// Forwards notices to a receiver, typically the UI thread
#[derive(Debug, Clone)]
pub struct ChannelNotifier {
    sender: flume::Sender<Notice>,
}

impl ChannelNotifier {
    pub fn new(sender: flume::Sender<Notice>) -> Self {
        Self { sender }
    }

    /// Create a notifier along with the receiving end of its channel
    pub fn unbounded() -> (Self, flume::Receiver<Notice>) {
        let (sender, receiver) = flume::unbounded();
        (Self::new(sender), receiver)
    }
}

impl Notifier for ChannelNotifier {
    fn notify(&self, notice: Notice) {
        if let Err(e) = self.sender.send(notice) {
            warn!("Notice dropped, receiver is gone: {}", e.into_inner().message);
        }
    }
}
