//! Inbound protocol events and sender masks.
//!
//! An [`Event`] is the structured record an external line-to-message parser
//! produces from one wire line: a name (command word or numeric), the sender
//! (server hostname or `nick!user@host` mask), and the ordered argument
//! list. [`EventKind`] is the closed dispatch enum the store matches on;
//! names it does not track map to [`EventKind::Ignored`], preserving the
//! silent-ignore contract.

use std::fmt;

/// A `nick!user@host` mask, or a bare nickname or server name.
///
/// Accessors slice the underlying string; missing components yield the
/// empty string.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Mask(String);

impl Mask {
    /// Wrap a mask string.
    pub fn new(mask: impl Into<String>) -> Self {
        Self(mask.into())
    }

    /// The nickname portion: everything before the first `!` (or `@`).
    pub fn nick(&self) -> &str {
        let end = self
            .0
            .find(['!', '@'])
            .unwrap_or(self.0.len());
        &self.0[..end]
    }

    /// The username portion: between `!` and `@`, empty if absent.
    pub fn username(&self) -> &str {
        match (self.0.find('!'), self.0.find('@')) {
            (Some(bang), Some(at)) if bang < at => &self.0[bang + 1..at],
            (Some(bang), None) => &self.0[bang + 1..],
            _ => "",
        }
    }

    /// The host portion: everything after `@`, empty if absent.
    pub fn host(&self) -> &str {
        match self.0.find('@') {
            Some(at) => &self.0[at + 1..],
            None => "",
        }
    }

    /// Whether this is a full `nick!user@host` mask.
    pub fn is_full(&self) -> bool {
        matches!((self.0.find('!'), self.0.find('@')), (Some(b), Some(a)) if b < a)
    }

    /// Whether this looks like a bare server hostname rather than a user:
    /// no `!`/`@` separators but a dot in the name. Bare nicknames (no dot)
    /// count as users.
    pub fn is_server(&self) -> bool {
        !self.0.contains('!') && !self.0.contains('@') && self.0.contains('.')
    }

    /// The underlying string.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Mask {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for Mask {
    fn from(s: &str) -> Self {
        Self::new(s)
    }
}

/// One structured inbound protocol message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Event {
    /// Command word (`PRIVMSG`) or numeric (`001`).
    pub name: String,
    /// Server hostname or full `nick!user@host` mask of the origin.
    pub sender: String,
    /// Ordered arguments, trailing parameter included as the last entry.
    pub args: Vec<String>,
}

impl Event {
    /// Build an event from borrowed parts.
    pub fn new(name: &str, sender: &str, args: &[&str]) -> Self {
        Self {
            name: name.to_owned(),
            sender: sender.to_owned(),
            args: args.iter().map(|&a| a.to_owned()).collect(),
        }
    }

    /// The argument at `index`, or the empty string when absent.
    pub fn arg(&self, index: usize) -> &str {
        self.args.get(index).map(String::as_str).unwrap_or("")
    }

    /// Comma-split the argument at `index` (multi-target commands).
    pub fn split_arg(&self, index: usize) -> Vec<&str> {
        self.arg(index).split(',').collect()
    }

    /// The sender as a mask.
    pub fn sender_mask(&self) -> Mask {
        Mask::new(self.sender.as_str())
    }

    /// Classify the event name for dispatch.
    pub fn kind(&self) -> EventKind {
        EventKind::from_name(&self.name)
    }
}

/// The closed set of event kinds the state store reacts to.
///
/// Everything else is `Ignored`: the store's contract is to leave state
/// unchanged on inapplicable input, not to signal validation errors.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EventKind {
    Nick,
    Join,
    Part,
    Kick,
    Quit,
    Mode,
    Topic,
    Privmsg,
    Notice,
    /// `RPL_WELCOME` (001)
    Welcome,
    /// `RPL_TOPIC` (332)
    TopicReply,
    /// `RPL_NAMREPLY` (353)
    NamesReply,
    /// `RPL_WHOREPLY` (352)
    WhoReply,
    /// `RPL_CHANNELMODEIS` (324)
    ChannelModeIs,
    /// `RPL_BANLIST` (367)
    BanList,
    /// Any name the store does not track.
    Ignored,
}

impl EventKind {
    /// Map a command word or numeric to its kind. Command words match
    /// case-insensitively; unknown names map to `Ignored`.
    pub fn from_name(name: &str) -> Self {
        match name.to_ascii_uppercase().as_str() {
            "NICK" => Self::Nick,
            "JOIN" => Self::Join,
            "PART" => Self::Part,
            "KICK" => Self::Kick,
            "QUIT" => Self::Quit,
            "MODE" => Self::Mode,
            "TOPIC" => Self::Topic,
            "PRIVMSG" => Self::Privmsg,
            "NOTICE" => Self::Notice,
            "001" => Self::Welcome,
            "332" => Self::TopicReply,
            "353" => Self::NamesReply,
            "352" => Self::WhoReply,
            "324" => Self::ChannelModeIs,
            "367" => Self::BanList,
            _ => Self::Ignored,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_mask_full() {
        let m = Mask::new("nick1!user1@host1");
        assert_eq!(m.nick(), "nick1");
        assert_eq!(m.username(), "user1");
        assert_eq!(m.host(), "host1");
        assert!(m.is_full());
        assert!(!m.is_server());
    }

    #[test]
    fn test_mask_bare_nick() {
        let m = Mask::new("nick1");
        assert_eq!(m.nick(), "nick1");
        assert_eq!(m.username(), "");
        assert_eq!(m.host(), "");
        assert!(!m.is_full());
        assert!(!m.is_server());
    }

    #[test]
    fn test_mask_server_name() {
        let m = Mask::new("irc.server.net");
        assert!(m.is_server());
        assert!(!m.is_full());
    }

    #[test]
    fn test_event_args() {
        let ev = Event::new("PRIVMSG", "nick!u@h", &["#chan,#other", "hello"]);
        assert_eq!(ev.arg(0), "#chan,#other");
        assert_eq!(ev.arg(5), "");
        assert_eq!(ev.split_arg(0), vec!["#chan", "#other"]);
        assert_eq!(ev.kind(), EventKind::Privmsg);
    }

    #[test]
    fn test_kind_dispatch() {
        assert_eq!(EventKind::from_name("nick"), EventKind::Nick);
        assert_eq!(EventKind::from_name("001"), EventKind::Welcome);
        assert_eq!(EventKind::from_name("353"), EventKind::NamesReply);
        assert_eq!(EventKind::from_name("PING"), EventKind::Ignored);
        assert_eq!(EventKind::from_name("999"), EventKind::Ignored);
    }
}
