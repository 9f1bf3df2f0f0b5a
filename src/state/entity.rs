//! The tracked entities: users, channels, and the client's own identity.

use std::collections::BTreeMap;
use std::fmt;

use crate::event::Mask;
use crate::modes::{KindTable, Modeset};

/// A user known to the store.
///
/// Identity key is the nickname, with the case as received; the stored mask
/// grows from a bare nickname to a full `nick!user@host` as the server
/// reveals more.
#[derive(Debug, Clone)]
pub struct User {
    mask: Mask,
    realname: String,
}

impl User {
    /// Create a user from a nickname or full mask.
    pub fn new(mask: &str) -> Self {
        Self {
            mask: Mask::new(mask),
            realname: String::new(),
        }
    }

    /// The nickname.
    pub fn nick(&self) -> &str {
        self.mask.nick()
    }

    /// The username portion, empty if not yet known.
    pub fn username(&self) -> &str {
        self.mask.username()
    }

    /// The host portion, empty if not yet known.
    pub fn host(&self) -> &str {
        self.mask.host()
    }

    /// The full mask as stored (a bare nickname until a full mask arrives).
    pub fn fullhost(&self) -> &str {
        self.mask.as_str()
    }

    /// The real name, empty if not yet known (populated by `RPL_WHOREPLY`).
    pub fn realname(&self) -> &str {
        &self.realname
    }

    pub(crate) fn set_realname(&mut self, realname: &str) {
        self.realname = realname.to_owned();
    }

    /// Replace the stored mask, keeping the real name.
    pub(crate) fn set_mask(&mut self, mask: &str) {
        self.mask = Mask::new(mask);
    }
}

impl fmt::Display for User {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.fullhost())
    }
}

/// A channel known to the store: name, topic, channel-level modes, and the
/// membership relation (nickname → per-member status modes).
#[derive(Debug, Clone)]
pub struct Channel {
    name: String,
    topic: String,
    modes: Modeset,
    members: BTreeMap<String, Modeset>,
}

impl Channel {
    /// Create a channel with an empty topic and modeset.
    pub fn new(name: &str, kinds: KindTable) -> Self {
        Self {
            name: name.to_owned(),
            topic: String::new(),
            modes: Modeset::new(kinds),
            members: BTreeMap::new(),
        }
    }

    /// The channel name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// The current topic text.
    pub fn topic(&self) -> &str {
        &self.topic
    }

    pub(crate) fn set_topic(&mut self, topic: &str) {
        self.topic = topic.to_owned();
    }

    /// The channel-level modeset (including ban and exception lists).
    pub fn modes(&self) -> &Modeset {
        &self.modes
    }

    /// Mutable access to the channel-level modeset.
    pub fn modes_mut(&mut self) -> &mut Modeset {
        &mut self.modes
    }

    /// Whether `mask` is on the channel's ban list.
    pub fn has_ban(&self, mask: &str) -> bool {
        self.modes.is_address_set('b', mask)
    }

    /// Whether the nickname is a member.
    pub fn is_member(&self, nick: &str) -> bool {
        self.members.contains_key(nick)
    }

    /// A member's status modes, if the nickname is a member.
    pub fn member_modes(&self, nick: &str) -> Option<&Modeset> {
        self.members.get(nick)
    }

    pub(crate) fn member_modes_mut(&mut self, nick: &str) -> Option<&mut Modeset> {
        self.members.get_mut(nick)
    }

    pub(crate) fn add_member(&mut self, nick: &str, modes: Modeset) {
        self.members.entry(nick.to_owned()).or_insert(modes);
    }

    pub(crate) fn remove_member(&mut self, nick: &str) -> Option<Modeset> {
        self.members.remove(nick)
    }

    /// Iterate member nicknames in sorted order.
    pub fn members(&self) -> impl Iterator<Item = &str> {
        self.members.keys().map(String::as_str)
    }

    /// Number of members.
    pub fn n_members(&self) -> usize {
        self.members.len()
    }
}

impl fmt::Display for Channel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.name)
    }
}

/// The client's own identity: its user record plus its user modes
/// (e.g. `+i`). Exactly one per store.
#[derive(Debug, Clone)]
pub struct SelfUser {
    /// The client's own user record.
    pub user: User,
    /// The client's user modes, interpreted through the user-mode kind
    /// table.
    pub modes: Modeset,
}

impl SelfUser {
    pub(crate) fn new(kinds: KindTable) -> Self {
        Self {
            user: User::new(""),
            modes: Modeset::new(kinds),
        }
    }

    /// The client's own nickname.
    pub fn nick(&self) -> &str {
        self.user.nick()
    }
}
