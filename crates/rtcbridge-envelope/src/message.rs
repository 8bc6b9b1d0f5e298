//! Message ids.
//!
//! Ids 1-4 are the long-standing event set; later ids were appended and
//! existing values never change.

/// Side-channel tag identifying the payload layout of an envelope.
pub type MessageId = u16;

/// Local user joined a channel: uid + channel name.
pub const JOIN_SUCCESS: MessageId = 1;

/// Remote user joined the channel.
pub const USER_JOINED: MessageId = 2;

/// Remote user left or dropped.
pub const USER_OFFLINE: MessageId = 3;

/// Remote user toggled its video stream.
pub const USER_MUTE_VIDEO: MessageId = 4;

/// Remote user toggled its audio stream.
pub const USER_MUTE_AUDIO: MessageId = 5;

/// Local user left the channel.
pub const LEAVE_CHANNEL: MessageId = 6;

/// The engine reported an error code.
pub const ENGINE_ERROR: MessageId = 7;

/// Returns a human-readable name for a message id.
pub fn message_name(id: MessageId) -> &'static str {
    match id {
        JOIN_SUCCESS => "JOIN_SUCCESS",
        USER_JOINED => "USER_JOINED",
        USER_OFFLINE => "USER_OFFLINE",
        USER_MUTE_VIDEO => "USER_MUTE_VIDEO",
        USER_MUTE_AUDIO => "USER_MUTE_AUDIO",
        LEAVE_CHANNEL => "LEAVE_CHANNEL",
        ENGINE_ERROR => "ENGINE_ERROR",
        _ => "UNKNOWN",
    }
}

/// Returns true if the id has a defined payload layout.
pub fn is_known(id: MessageId) -> bool {
    (JOIN_SUCCESS..=ENGINE_ERROR).contains(&id)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn names_cover_known_ids() {
        for id in JOIN_SUCCESS..=ENGINE_ERROR {
            assert!(is_known(id));
            assert_ne!(message_name(id), "UNKNOWN");
        }
        assert!(!is_known(0));
        assert!(!is_known(8));
        assert_eq!(message_name(99), "UNKNOWN");
    }
}
