use std::fmt;

use wabridge_core::IncomingMessage;

/// Why a chat message was not forwarded.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum DropReason {
    Group,
    StatusBroadcast,
    SelfSent,
}

impl DropReason {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Group => "group",
            Self::StatusBroadcast => "status_broadcast",
            Self::SelfSent => "self_sent",
        }
    }
}

impl fmt::Display for DropReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Decide whether an incoming message is forwarded to the controller.
///
/// Evaluated per message. Duplicates from the transport are forwarded as
/// duplicates.
pub fn check_message(message: &IncomingMessage) -> Result<(), DropReason> {
    if message.from.is_group() {
        return Err(DropReason::Group);
    }
    if message.from.is_status_broadcast() {
        return Err(DropReason::StatusBroadcast);
    }
    if message.from_me {
        return Err(DropReason::SelfSent);
    }
    Ok(())
}
