use serde::{Deserialize, Serialize};
use std::fmt;

use crate::message::Message;

/// Identifies one cached inbox query result.
///
/// Partitions are disjoint: a message is cached in exactly one of them.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct PartitionKey {
    /// Recency window bound (how many latest messages the query asked for).
    pub last: u32,
    pub important: Option<bool>,
    /// `false` for the cleared view.
    pub active: bool,
}

impl PartitionKey {
    pub fn new(last: u32, important: Option<bool>, active: bool) -> Self {
        Self {
            last,
            important,
            active,
        }
    }

    /// Partition a message taken from `self` lands in when its cleared
    /// state is toggled.
    ///
    /// Clearing strips the importance classification, so every cleared
    /// message converges to the same partition. Un-clearing restores the
    /// message's own classification.
    pub fn destination_for(&self, message: &Message) -> PartitionKey {
        let important = if self.active {
            None
        } else {
            message.important
        };

        PartitionKey {
            last: self.last,
            important,
            active: !self.active,
        }
    }
}

impl fmt::Display for PartitionKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let important = match self.important {
            Some(true) => "true",
            Some(false) => "false",
            None => "null",
        };
        write!(
            f,
            "inbox(last={}, important={}, active={})",
            self.last, important, self.active
        )
    }
}
