//! Identity types: where a chat event came from and how its memory is keyed.
//!
//! The conversation key is deliberately asymmetric. A private chat is keyed by
//! the user alone, so a user's personal history follows them. Group and room
//! chats are keyed by both the channel and the speaker, so concurrent
//! speakers in one channel each keep their own context window.

use crate::error::UNKNOWN_IDENTITY;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use ulid::Ulid;

/// Error returned when parsing an ID from a string fails.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParseIdError {
    /// The type of ID that failed to parse.
    pub id_type: &'static str,
    /// The reason for the parse failure.
    pub reason: String,
}

impl fmt::Display for ParseIdError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "failed to parse {}: {}", self.id_type, self.reason)
    }
}

impl std::error::Error for ParseIdError {}

/// Generates a ULID-backed identifier with a display prefix.
macro_rules! define_id {
    ($(#[$meta:meta])* $name:ident, $prefix:expr) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(Ulid);

        impl $name {
            /// Creates a new ID with a randomly generated ULID.
            #[must_use]
            pub fn new() -> Self {
                Self(Ulid::new())
            }

            /// Returns the prefix used for display formatting.
            #[must_use]
            pub const fn prefix() -> &'static str {
                $prefix
            }
        }

        impl Default for $name {
            fn default() -> Self {
                Self::new()
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}_{}", $prefix, self.0)
            }
        }

        impl FromStr for $name {
            type Err = ParseIdError;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                let raw = s.strip_prefix(concat!($prefix, "_")).unwrap_or(s);
                Ulid::from_str(raw).map(Self).map_err(|e| ParseIdError {
                    id_type: stringify!($name),
                    reason: e.to_string(),
                })
            }
        }
    };
}

define_id!(
    /// Correlation id assigned to each inbound event while it is handled.
    HandlingId,
    "evt"
);

define_id!(
    /// Identifier of an image received from a chat and written to the blob store.
    ImageId,
    "img"
);

/// The kind of chat surface an event originated from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SourceKind {
    /// One-to-one chat with the bot.
    #[serde(rename = "user")]
    Individual,
    /// A group chat.
    Group,
    /// A multi-person room.
    Room,
}

impl SourceKind {
    /// Returns the wire name of this source kind.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Individual => "user",
            Self::Group => "group",
            Self::Room => "room",
        }
    }

    /// Returns true for one-to-one chats.
    #[must_use]
    pub fn is_individual(&self) -> bool {
        matches!(self, Self::Individual)
    }
}

impl fmt::Display for SourceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Where an inbound event came from.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum ChatSource {
    /// A private chat with a single user.
    User { user_id: String },
    /// A group chat; the speaker may be withheld by the platform.
    Group {
        group_id: String,
        user_id: Option<String>,
    },
    /// A room; the speaker may be withheld by the platform.
    Room {
        room_id: String,
        user_id: Option<String>,
    },
}

impl ChatSource {
    /// Returns the kind of chat surface.
    #[must_use]
    pub fn kind(&self) -> SourceKind {
        match self {
            Self::User { .. } => SourceKind::Individual,
            Self::Group { .. } => SourceKind::Group,
            Self::Room { .. } => SourceKind::Room,
        }
    }

    /// Returns the speaking user's id, if the platform disclosed it.
    #[must_use]
    pub fn user_id(&self) -> Option<&str> {
        match self {
            Self::User { user_id } => Some(user_id),
            Self::Group { user_id, .. } | Self::Room { user_id, .. } => user_id.as_deref(),
        }
    }

    /// Returns the id checked against the allow-list.
    ///
    /// This is the user for private chats and the channel otherwise.
    #[must_use]
    pub fn channel_id(&self) -> &str {
        match self {
            Self::User { user_id } => user_id,
            Self::Group { group_id, .. } => group_id,
            Self::Room { room_id, .. } => room_id,
        }
    }

    /// Returns the id that asynchronous pushes are addressed to.
    #[must_use]
    pub fn push_target(&self) -> &str {
        self.channel_id()
    }

    /// Resolves the conversation key for the speaker in this source.
    #[must_use]
    pub fn conversation_key(&self) -> ConversationKey {
        let user_id = self.user_id().unwrap_or(UNKNOWN_IDENTITY);
        let source_id = match self {
            Self::User { .. } => None,
            Self::Group { group_id, .. } => Some(group_id.as_str()),
            Self::Room { room_id, .. } => Some(room_id.as_str()),
        };
        ConversationKey::resolve(user_id, self.kind(), source_id)
    }
}

/// Key isolating one speaker's memory on one chat surface.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ConversationKey(String);

impl ConversationKey {
    /// Derives the key for a speaker.
    ///
    /// For [`SourceKind::Individual`] the `source_id` is ignored. Components
    /// are escaped so that no two distinct inputs share a key.
    #[must_use]
    pub fn resolve(user_id: &str, kind: SourceKind, source_id: Option<&str>) -> Self {
        match kind {
            SourceKind::Individual => Self(escape(user_id)),
            SourceKind::Group | SourceKind::Room => Self(format!(
                "{}:{}:{}",
                escape(user_id),
                kind.as_str(),
                escape(source_id.unwrap_or_default())
            )),
        }
    }

    /// Returns the key as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ConversationKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

fn escape(component: &str) -> String {
    if !component.contains([':', '%']) {
        return component.to_string();
    }
    component.replace('%', "%25").replace(':', "%3A")
}
