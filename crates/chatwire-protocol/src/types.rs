//! Command types and their fixed 4-character wire tags.
//!
//! Every frame on the wire starts with a tag like `LOGI` or `MESG`. The
//! tag says what the JSON after it means, and whether the server will
//! answer it with an acknowledgement carrying the same `req_id`.

use std::fmt;

/// Length in bytes of every command tag.
pub const TAG_LEN: usize = 4;

/// Declares `CommandType` together with its tag table, so a variant can
/// never be added without a tag and an ack classification.
macro_rules! command_types {
    ($( $(#[$doc:meta])* $variant:ident => $tag:literal, ack = $ack:literal; )+) => {
        /// A wire-protocol command type.
        ///
        /// `None` is a sentinel for "no type" (unknown tag, too-short
        /// frame). It has no tag and cannot be encoded.
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
        pub enum CommandType {
            /// Sentinel: unrecognized or absent command type.
            None,
            $( $(#[$doc])* $variant, )+
        }

        impl CommandType {
            /// Every encodable command type, in declaration order.
            pub const ALL: &'static [CommandType] = &[ $( CommandType::$variant, )+ ];

            /// The 4-character wire tag, or `None` for the sentinel.
            pub const fn tag(self) -> Option<&'static str> {
                match self {
                    CommandType::None => Option::None,
                    $( CommandType::$variant => Some($tag), )+
                }
            }

            /// Whether the server answers this command with an
            /// acknowledgement that echoes its `req_id`.
            ///
            /// Fixed by the server protocol; everything not listed here is
            /// fire-and-forget or server-push only.
            pub const fn requires_ack(self) -> bool {
                match self {
                    CommandType::None => false,
                    $( CommandType::$variant => $ack, )+
                }
            }

            /// Maps a wire tag back to its command type.
            ///
            /// Returns [`CommandType::None`] for anything unknown.
            pub fn from_tag(tag: &str) -> CommandType {
                match tag {
                    $( $tag => CommandType::$variant, )+
                    _ => CommandType::None,
                }
            }
        }
    };
}

command_types! {
    /// Authentication handshake.
    Login => "LOGI", ack = true;
    /// A user text message.
    UserMessage => "MESG", ack = true;
    /// A file message.
    FileMessage => "FILE", ack = true;
    /// A message sent by an administrator.
    AdminMessage => "ADMM", ack = false;
    /// A broadcast message.
    BroadcastMessage => "BRDM", ack = false;
    /// Server-side error report.
    Error => "EROR", ack = false;
    /// Read receipt.
    Read => "READ", ack = true;
    /// Edit of a user message.
    MessageEdit => "MEDI", ack = true;
    /// Edit of a file message.
    FileEdit => "FEDI", ack = true;
    /// A message was deleted.
    MessageDelete => "DELM", ack = false;
    /// Channel-level system event.
    SystemEvent => "SYEV", ack = false;
    /// User-level event (block, friend change, ...).
    UserEvent => "USEV", ack = false;
    /// Typing started.
    TypingStart => "TPST", ack = false;
    /// Typing ended.
    TypingEnd => "TPEN", ack = false;
    /// Keepalive ping.
    Ping => "PING", ack = false;
    /// Keepalive reply.
    Pong => "PONG", ack = false;
    /// Enter an open channel.
    Enter => "ENTR", ack = true;
    /// Exit an open channel.
    Exit => "EXIT", ack = true;
    /// Participant count update.
    ParticipantCount => "MCNT", ack = false;
    /// Unread count update.
    Unread => "UNRD", ack = false;
    /// A member left a channel.
    Leave => "LEAV", ack = false;
    /// The session expired on the server side.
    SessionExpired => "EXPR", ack = false;
    /// Delivery receipt.
    Delivery => "DLVR", ack = false;
    /// Reaction added or removed.
    Reaction => "MRCT", ack = false;
    /// Thread summary update.
    ThreadInfo => "MTHD", ack = false;
    /// Poll state update pushed by the server.
    PollUpdate => "POLL", ack = false;
    /// Edit of a poll.
    PollEdit => "PEDI", ack = true;
    /// Vote in a poll.
    Vote => "VOTE", ack = true;
    /// Request a message summary.
    Summary => "SUMM", ack = true;
    /// Revoke a user message.
    MessageRevoke => "MRVK", ack = true;
    /// Revoke a file message.
    FileRevoke => "FRVK", ack = true;
    /// The server is busy and shed the request.
    Busy => "BUSY", ack = false;
}

impl CommandType {
    /// Returns `true` for the `None` sentinel.
    pub fn is_none(self) -> bool {
        matches!(self, CommandType::None)
    }
}

impl fmt::Display for CommandType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.tag().unwrap_or("NONE"))
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashSet;

    use super::*;

    #[test]
    fn test_all_has_at_least_thirty_types() {
        assert!(CommandType::ALL.len() >= 30);
        assert!(!CommandType::ALL.contains(&CommandType::None));
    }

    #[test]
    fn test_tags_are_four_chars_and_unique() {
        let mut seen = HashSet::new();
        for ty in CommandType::ALL {
            let tag = ty.tag().expect("every listed type has a tag");
            assert_eq!(tag.len(), TAG_LEN, "{ty:?}");
            assert!(seen.insert(tag), "duplicate tag {tag}");
        }
    }

    #[test]
    fn test_from_tag_inverts_tag() {
        for ty in CommandType::ALL {
            assert_eq!(CommandType::from_tag(ty.tag().unwrap()), *ty);
        }
    }

    #[test]
    fn test_from_tag_unknown_returns_none() {
        assert_eq!(CommandType::from_tag("XXXX"), CommandType::None);
        assert_eq!(CommandType::from_tag("logi"), CommandType::None);
        assert_eq!(CommandType::from_tag(""), CommandType::None);
    }

    #[test]
    fn test_requires_ack_matches_protocol_set() {
        let acked: HashSet<&str> = CommandType::ALL
            .iter()
            .filter(|ty| ty.requires_ack())
            .filter_map(|ty| ty.tag())
            .collect();
        let expected: HashSet<&str> = [
            "LOGI", "MESG", "FILE", "EXIT", "READ", "MEDI", "FEDI", "ENTR", "PEDI", "VOTE",
            "SUMM", "MRVK", "FRVK",
        ]
        .into_iter()
        .collect();
        assert_eq!(acked, expected);
        assert!(!CommandType::None.requires_ack());
    }

    #[test]
    fn test_display_uses_tag() {
        assert_eq!(CommandType::UserMessage.to_string(), "MESG");
        assert_eq!(CommandType::None.to_string(), "NONE");
    }
}
