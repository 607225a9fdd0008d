use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::error::InboxError;

/// Status a client can request for a set of inbox messages
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum InboxStatus {
    Read,
    Unread,
    /// Cleared from the actionable inbox.
    Inactive,
}

/// Flag values a status maps to
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StatusFields {
    pub read: bool,
    pub active: bool,
}

impl InboxStatus {
    /// Get the status string as sent over the wire
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Read => "read",
            Self::Unread => "unread",
            Self::Inactive => "inactive",
        }
    }

    pub fn fields(&self) -> StatusFields {
        match self {
            Self::Read => StatusFields {
                read: true,
                active: true,
            },
            Self::Unread => StatusFields {
                read: false,
                active: true,
            },
            Self::Inactive => StatusFields {
                read: true,
                active: false,
            },
        }
    }
}

impl fmt::Display for InboxStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for InboxStatus {
    type Err = InboxError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "read" => Ok(Self::Read),
            "unread" => Ok(Self::Unread),
            "inactive" => Ok(Self::Inactive),
            other => Err(InboxError::UnknownStatus(other.to_string())),
        }
    }
}

impl TryFrom<&str> for InboxStatus {
    type Error = InboxError;

    fn try_from(s: &str) -> Result<Self, Self::Error> {
        s.parse()
    }
}
