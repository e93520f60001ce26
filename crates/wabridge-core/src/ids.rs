use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Suffix the platform appends to group conversation identifiers.
pub const GROUP_SUFFIX: &str = "@g.us";

/// Identifier of the status/stories broadcast pseudo-chat.
pub const STATUS_BROADCAST: &str = "status@broadcast";

/// Opaque identifier of a conversation or message origin.
///
/// The bridge never looks inside it except for the two reserved patterns
/// above.
#[derive(Clone, Debug, Hash, Eq, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ChatId(String);

impl ChatId {
    pub fn from_raw(s: impl Into<String>) -> Self {
        Self(s.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn is_group(&self) -> bool {
        self.0.contains(GROUP_SUFFIX)
    }

    pub fn is_status_broadcast(&self) -> bool {
        self.0 == STATUS_BROADCAST
    }
}

impl fmt::Display for ChatId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl FromStr for ChatId {
    type Err = std::convert::Infallible;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(Self(s.to_owned()))
    }
}

impl AsRef<str> for ChatId {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl From<&str> for ChatId {
    fn from(s: &str) -> Self {
        Self(s.to_owned())
    }
}

impl From<String> for ChatId {
    fn from(s: String) -> Self {
        Self(s)
    }
}
