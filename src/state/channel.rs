//! Channel records.

use std::collections::{HashMap, HashSet};

use chrono::{DateTime, Utc};

use super::user::{ChannelId, UserId, UserLevel};
use crate::proto::Hostmask;

/// A channel we are on.
///
/// Created when our own JOIN is confirmed (or a NAMES reply mentions a
/// channel we joined); destroyed when we PART or are kicked.
#[derive(Clone, Debug)]
pub struct Channel {
    pub(crate) id: ChannelId,
    /// Canonical name as the server spelled it.
    pub name: String,
    /// Current topic, if one is set.
    pub topic: Option<Topic>,
    /// Channel creation time from numeric 329.
    pub created_at: Option<DateTime<Utc>>,
    /// Channel key (+k), when known.
    pub key: Option<String>,
    /// Non-status modes: letter → argument (None for booleans).
    pub modes: HashMap<char, Option<String>>,
    /// Ban masks (+b) from numeric 367.
    pub ban_masks: Vec<ListEntry>,
    /// Ban exception masks (+e) from numeric 348.
    pub except_masks: Vec<ListEntry>,
    /// Invite-only exception masks (+I) from numeric 346.
    pub invite_masks: Vec<ListEntry>,
    /// Membership edges: user → status level set.
    pub(crate) members: HashMap<UserId, HashSet<UserLevel>>,
}

/// A topic with its provenance.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Topic {
    /// Topic text.
    pub text: String,
    /// Who set it, from numeric 333 or the TOPIC command prefix.
    pub set_by: Option<Hostmask>,
    /// When it was set.
    pub set_at: Option<DateTime<Utc>>,
}

/// One entry of a +b/+e/+I list.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ListEntry {
    /// The mask itself.
    pub mask: String,
    /// Who placed it, when the server says.
    pub set_by: Option<String>,
    /// When it was placed.
    pub set_at: Option<DateTime<Utc>>,
}

impl Channel {
    pub(crate) fn new(id: ChannelId, name: String) -> Self {
        Self {
            id,
            name,
            topic: None,
            created_at: None,
            key: None,
            modes: HashMap::new(),
            ban_masks: Vec::new(),
            except_masks: Vec::new(),
            invite_masks: Vec::new(),
            members: HashMap::new(),
        }
    }

    /// Number of members we know about.
    pub fn member_count(&self) -> usize {
        self.members.len()
    }

    /// Record a mode letter, mirroring +k into `key`.
    pub(crate) fn apply_mode(&mut self, letter: char, argument: Option<String>) {
        if letter == 'k' {
            self.key = argument.clone();
        }
        self.modes.insert(letter, argument);
    }

    /// Drop a mode letter, clearing `key` for -k.
    pub(crate) fn clear_mode(&mut self, letter: char) {
        if letter == 'k' {
            self.key = None;
        }
        self.modes.remove(&letter);
    }

    pub(crate) fn list_for_mut(&mut self, letter: char) -> Option<&mut Vec<ListEntry>> {
        match letter {
            'b' => Some(&mut self.ban_masks),
            'e' => Some(&mut self.except_masks),
            'I' => Some(&mut self.invite_masks),
            _ => None,
        }
    }
}
