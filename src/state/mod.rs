//! The protocol state store.
//!
//! A [`Store`] models one connection's world-view: who is online, in which
//! channels, with which privileges. It owns the user and channel indexes,
//! the membership relation, the client's own identity, and the three
//! capability-derived lookup tables. State changes arrive exclusively
//! through [`Store::update`] and the explicit add/remove primitives, all of
//! which are idempotent; `update` never errors, because protocol streams
//! are partial by nature and inapplicable input must leave state unchanged
//! rather than fail.
//!
//! The store performs no blocking operations and is not internally
//! concurrent: callers serialize access (single-writer discipline).

mod entity;

pub use entity::{Channel, SelfUser, User};

use std::collections::HashMap;
use std::sync::Arc;

use tracing::{debug, trace};

use crate::caps::{Capabilities, ChannelFinder, Prefixes};
use crate::error::CapsError;
use crate::event::{Event, EventKind, Mask};
use crate::modes::{KindTable, ModeDiff, ModeKind, ModeKinds, Modeset};

/// The lookup tables derived from one capability descriptor.
struct Tables {
    chan_kinds: ModeKinds,
    user_kinds: ModeKinds,
    status_kinds: ModeKinds,
    prefixes: Prefixes,
    finder: ChannelFinder,
}

impl Tables {
    /// Derive every table, failing on the first malformed token.
    fn derive(caps: &Capabilities) -> Result<Self, CapsError> {
        let prefixes = caps.prefixes()?;

        // Status letters double as channel modes that always carry a
        // nickname argument, so the diff parser consumes them correctly.
        let mut chan_kinds = ModeKinds::from_chanmodes(caps.chanmodes_token())?;
        chan_kinds.extend_with(prefixes.modes(), ModeKind::ArgAlways);

        let letters = caps.usermodes_token();
        if letters.is_empty() {
            return Err(CapsError::UserModes(letters.to_owned()));
        }
        let user_kinds = ModeKinds::from_letters(letters, ModeKind::Flag);

        let status_kinds = ModeKinds::from_letters(prefixes.modes(), ModeKind::Flag);
        let finder = caps.channel_finder()?;

        Ok(Self {
            chan_kinds,
            user_kinds,
            status_kinds,
            prefixes,
            finder,
        })
    }
}

/// In-memory model of one connection's server state.
pub struct Store {
    users: HashMap<String, User>,
    channels: HashMap<String, Channel>,
    self_user: SelfUser,
    chan_kinds: KindTable,
    user_kinds: KindTable,
    status_kinds: KindTable,
    prefixes: Prefixes,
    finder: ChannelFinder,
}

impl Store {
    /// Create a store from a capability descriptor.
    ///
    /// Fails when the channel-mode kinds, user-mode kinds, or channel-type
    /// classifier cannot be derived from the descriptor's tokens.
    pub fn new(caps: &Capabilities) -> Result<Self, CapsError> {
        let tables = Tables::derive(caps)?;
        let user_kinds = tables.user_kinds.shared();
        Ok(Self {
            users: HashMap::new(),
            channels: HashMap::new(),
            self_user: SelfUser::new(Arc::clone(&user_kinds)),
            chan_kinds: tables.chan_kinds.shared(),
            user_kinds,
            status_kinds: tables.status_kinds.shared(),
            prefixes: tables.prefixes,
            finder: tables.finder,
        })
    }

    /// Re-derive and swap all lookup tables from an updated descriptor
    /// (e.g. after further `ISUPPORT` lines), keeping existing entities.
    ///
    /// The swap is all-or-nothing: a malformed descriptor leaves the
    /// current tables in place. Every live modeset shares the tables, so
    /// all of them observe the update.
    pub fn protocaps(&mut self, caps: &Capabilities) -> Result<(), CapsError> {
        let tables = Tables::derive(caps)?;
        *self.chan_kinds.write() = tables.chan_kinds;
        *self.user_kinds.write() = tables.user_kinds;
        *self.status_kinds.write() = tables.status_kinds;
        self.prefixes = tables.prefixes;
        self.finder = tables.finder;
        debug!("capability tables swapped");
        Ok(())
    }

    /// Set the client's own identity from a nickname or full mask.
    pub fn set_self(&mut self, mask: &str) {
        self.self_user.user = User::new(mask);
    }

    /// The client's own identity and user modes.
    pub fn self_user(&self) -> &SelfUser {
        &self.self_user
    }

    /// Mutable access to the client's own identity and user modes.
    pub fn self_user_mut(&mut self) -> &mut SelfUser {
        &mut self.self_user
    }

    /// The status-prefix mapping currently in effect.
    pub fn prefixes(&self) -> &Prefixes {
        &self.prefixes
    }

    /// The channel-name classifier currently in effect.
    pub fn channel_finder(&self) -> &ChannelFinder {
        &self.finder
    }

    // ------------------------------------------------------------------
    // Primitives (idempotent)
    // ------------------------------------------------------------------

    /// Track a user by nickname or full mask. A known nickname with a new
    /// full mask has its record updated in place; memberships are
    /// untouched.
    pub fn add_user(&mut self, mask: &str) {
        let m = Mask::new(mask);
        let nick = m.nick().to_owned();
        if nick.is_empty() {
            return;
        }
        match self.users.get_mut(&nick) {
            Some(user) => {
                if m.is_full() && user.fullhost() != mask {
                    trace!(nick = %nick, mask = %mask, "updating user mask");
                    user.set_mask(mask);
                }
            }
            None => {
                trace!(nick = %nick, "tracking user");
                self.users.insert(nick, User::new(mask));
            }
        }
    }

    /// Track a channel; no-op if already present.
    pub fn add_channel(&mut self, name: &str) {
        if name.is_empty() || self.channels.contains_key(name) {
            return;
        }
        trace!(channel = %name, "tracking channel");
        self.channels
            .insert(name.to_owned(), Channel::new(name, Arc::clone(&self.chan_kinds)));
    }

    /// Link a user to a channel with a fresh empty membership. No-op when
    /// either side is unknown or the link already exists.
    pub fn add_to_channel(&mut self, user: &str, channel: &str) {
        let nick = Mask::new(user).nick().to_owned();
        if !self.users.contains_key(&nick) {
            return;
        }
        let Some(ch) = self.channels.get_mut(channel) else {
            return;
        };
        if !ch.is_member(&nick) {
            ch.add_member(&nick, Modeset::new(Arc::clone(&self.status_kinds)));
        }
    }

    /// Remove a user's membership from a channel; no-op if either side is
    /// unknown.
    pub fn remove_from_channel(&mut self, user: &str, channel: &str) {
        let mask = Mask::new(user);
        let nick = mask.nick();
        if let Some(ch) = self.channels.get_mut(channel) {
            ch.remove_member(nick);
        }
    }

    /// Drop a channel and every membership in it.
    pub fn remove_channel(&mut self, name: &str) {
        self.channels.remove(name);
    }

    /// Drop a user record and all of its memberships.
    pub fn remove_user(&mut self, user: &str) {
        let nick = Mask::new(user).nick().to_owned();
        if self.users.remove(&nick).is_some() {
            for ch in self.channels.values_mut() {
                ch.remove_member(&nick);
            }
        }
    }

    // ------------------------------------------------------------------
    // Queries
    // ------------------------------------------------------------------

    /// Look up a user by nickname or full mask (resolution is by the
    /// nickname portion).
    pub fn get_user(&self, key: &str) -> Option<&User> {
        self.users.get(Mask::new(key).nick())
    }

    /// Look up a channel by name.
    pub fn get_channel(&self, name: &str) -> Option<&Channel> {
        self.channels.get(name)
    }

    /// Mutable lookup of a channel by name.
    pub fn get_channel_mut(&mut self, name: &str) -> Option<&mut Channel> {
        self.channels.get_mut(name)
    }

    /// A user's status modes on a channel, if the membership exists.
    pub fn get_users_channel_modes(&self, user: &str, channel: &str) -> Option<&Modeset> {
        self.channels
            .get(channel)?
            .member_modes(Mask::new(user).nick())
    }

    /// Number of tracked users.
    pub fn n_users(&self) -> usize {
        self.users.len()
    }

    /// Number of tracked channels.
    pub fn n_channels(&self) -> usize {
        self.channels.len()
    }

    /// Number of channels a user is on.
    pub fn n_user_chans(&self, user: &str) -> usize {
        let mask = Mask::new(user);
        let nick = mask.nick();
        self.channels.values().filter(|ch| ch.is_member(nick)).count()
    }

    /// Number of users on a channel.
    pub fn n_chan_users(&self, channel: &str) -> usize {
        self.channels.get(channel).map_or(0, Channel::n_members)
    }

    /// Whether a user is on a channel.
    pub fn is_on(&self, user: &str, channel: &str) -> bool {
        self.get_users_channel_modes(user, channel).is_some()
    }

    /// Visit every tracked user.
    pub fn each_user(&self, mut f: impl FnMut(&User)) {
        let mut nicks: Vec<&String> = self.users.keys().collect();
        nicks.sort();
        for nick in nicks {
            f(&self.users[nick]);
        }
    }

    /// Visit every tracked channel.
    pub fn each_channel(&self, mut f: impl FnMut(&Channel)) {
        let mut names: Vec<&String> = self.channels.keys().collect();
        names.sort();
        for name in names {
            f(&self.channels[name]);
        }
    }

    /// All tracked users' fullhosts, sorted by nickname.
    pub fn users(&self) -> Vec<String> {
        let mut out = Vec::with_capacity(self.users.len());
        self.each_user(|u| out.push(u.fullhost().to_owned()));
        out
    }

    /// All tracked channel names, sorted.
    pub fn channels(&self) -> Vec<String> {
        let mut out: Vec<String> = self.channels.keys().cloned().collect();
        out.sort();
        out
    }

    /// The channels a user is on, sorted.
    pub fn user_chans(&self, user: &str) -> Vec<String> {
        let mask = Mask::new(user);
        let nick = mask.nick();
        let mut out: Vec<String> = self
            .channels
            .values()
            .filter(|ch| ch.is_member(nick))
            .map(|ch| ch.name().to_owned())
            .collect();
        out.sort();
        out
    }

    /// The fullhosts of a channel's members, sorted by nickname.
    pub fn chan_users(&self, channel: &str) -> Vec<String> {
        let Some(ch) = self.channels.get(channel) else {
            return Vec::new();
        };
        ch.members()
            .map(|nick| {
                self.users
                    .get(nick)
                    .map(|u| u.fullhost().to_owned())
                    .unwrap_or_else(|| nick.to_owned())
            })
            .collect()
    }

    // ------------------------------------------------------------------
    // The state machine
    // ------------------------------------------------------------------

    /// Apply one inbound protocol event as a state transition.
    ///
    /// Never errors: unknown senders, unknown targets, and malformed
    /// arguments leave state unchanged. Events that reference unknown
    /// channels or users are ignored except where creation is part of the
    /// event's meaning (self-JOIN, PRIVMSG/NOTICE senders, NAMES/WHO
    /// replies).
    ///
    /// A self-PART removes only the membership and keeps the channel
    /// record; a self-KICK drops the channel entirely, because the client
    /// loses visibility into its membership and must not retain stale
    /// state.
    pub fn update(&mut self, ev: &Event) {
        match ev.kind() {
            EventKind::Nick => self.on_nick(ev),
            EventKind::Join => self.on_join(ev),
            EventKind::Part => self.on_part(ev),
            EventKind::Kick => self.on_kick(ev),
            EventKind::Quit => self.on_quit(ev),
            EventKind::Mode => self.on_mode(ev),
            EventKind::Topic => self.on_topic(ev.arg(0), ev.arg(1)),
            EventKind::TopicReply => self.on_topic(ev.arg(1), ev.arg(2)),
            EventKind::Privmsg | EventKind::Notice => self.on_msg(ev),
            EventKind::Welcome => self.on_welcome(ev),
            EventKind::NamesReply => self.on_names_reply(ev),
            EventKind::WhoReply => self.on_who_reply(ev),
            EventKind::ChannelModeIs => self.on_channel_mode_is(ev),
            EventKind::BanList => self.on_ban_list(ev),
            EventKind::Ignored => {
                trace!(name = %ev.name, "event not tracked");
            }
        }
    }

    fn on_nick(&mut self, ev: &Event) {
        let old = ev.sender_mask().nick().to_owned();
        let new_nick = ev.arg(0);
        if new_nick.is_empty() {
            return;
        }
        let Some(mut user) = self.users.remove(&old) else {
            return;
        };
        debug!(old = %old, new = %new_nick, "nickname change");

        let mask = if user.username().is_empty() && user.host().is_empty() {
            new_nick.to_owned()
        } else {
            format!("{}!{}@{}", new_nick, user.username(), user.host())
        };
        user.set_mask(&mask);
        self.users.insert(new_nick.to_owned(), user);

        // Memberships carry over under the new key.
        for ch in self.channels.values_mut() {
            if let Some(modes) = ch.remove_member(&old) {
                ch.add_member(new_nick, modes);
            }
        }
    }

    fn on_join(&mut self, ev: &Event) {
        let sender = ev.sender_mask();
        let channel = ev.arg(0);
        if channel.is_empty() || sender.nick().is_empty() {
            return;
        }

        if sender.nick() == self.self_user.nick() {
            self.add_channel(channel);
        }
        if !self.channels.contains_key(channel) {
            // A join we observe for a channel we are not tracking.
            return;
        }
        self.add_user(sender.as_str());
        self.add_to_channel(sender.nick(), channel);
    }

    fn on_part(&mut self, ev: &Event) {
        self.remove_from_channel(ev.sender_mask().nick(), ev.arg(0));
    }

    fn on_kick(&mut self, ev: &Event) {
        let channel = ev.arg(0);
        let target = Mask::new(ev.arg(1));
        if target.nick() == self.self_user.nick() {
            debug!(channel = %channel, "kicked; dropping channel");
            self.remove_channel(channel);
        } else {
            self.remove_from_channel(target.nick(), channel);
        }
    }

    fn on_quit(&mut self, ev: &Event) {
        self.remove_user(ev.sender_mask().nick());
    }

    fn on_topic(&mut self, channel: &str, text: &str) {
        if let Some(ch) = self.channels.get_mut(channel) {
            ch.set_topic(text);
        }
    }

    fn on_mode(&mut self, ev: &Event) {
        let target = ev.arg(0);
        let args: Vec<&str> = ev.args.iter().skip(2).map(String::as_str).collect();

        if self.finder.is_channel(target) {
            if !self.channels.contains_key(target) {
                return;
            }
            let diff = ModeDiff::parse(&self.chan_kinds, ev.arg(1), &args);
            self.apply_channel_diff(target, &diff);
        } else if target == self.self_user.nick() {
            let diff = ModeDiff::parse(&self.user_kinds, ev.arg(1), &args);
            self.self_user.modes.apply_diff(&diff);
        }
    }

    /// Route one parsed channel diff: per-member status letters go to the
    /// named member's membership modeset (their argument is the nickname),
    /// everything else to the channel modeset.
    fn apply_channel_diff(&mut self, channel: &str, diff: &ModeDiff) {
        let Some(ch) = self.channels.get_mut(channel) else {
            return;
        };

        for letter in diff.positive().flags() {
            ch.modes_mut().set_flag(letter);
        }
        for (letter, arg) in diff.positive().args() {
            if self.prefixes.is_prefix_mode(letter) {
                if let Some(member) = ch.member_modes_mut(Mask::new(arg).nick()) {
                    member.set_flag(letter);
                }
            } else {
                ch.modes_mut().set_arg(letter, arg);
            }
        }
        for (letter, list) in diff.positive().address_lists() {
            for address in list {
                ch.modes_mut().set_address(letter, address);
            }
        }

        for letter in diff.negative().flags() {
            ch.modes_mut().unset_flag(letter);
        }
        for (letter, arg) in diff.negative().args() {
            if self.prefixes.is_prefix_mode(letter) {
                if let Some(member) = ch.member_modes_mut(Mask::new(arg).nick()) {
                    member.unset_flag(letter);
                }
            } else {
                ch.modes_mut().unset_arg(letter, arg);
            }
        }
        for (letter, list) in diff.negative().address_lists() {
            for address in list {
                ch.modes_mut().unset_address(letter, address);
            }
        }
    }

    fn on_msg(&mut self, ev: &Event) {
        let sender = ev.sender_mask();
        // Messages from a bare server name never create a user.
        if sender.is_server() || sender.nick().is_empty() {
            return;
        }
        self.add_user(sender.as_str());

        let target = ev.arg(0);
        if self.channels.contains_key(target) {
            self.add_to_channel(sender.nick(), target);
        }
    }

    fn on_welcome(&mut self, ev: &Event) {
        let nick = ev.arg(0);
        if nick.is_empty() {
            return;
        }
        // The trailing text sometimes ends in our full mask.
        let mask = ev
            .arg(1)
            .split_whitespace()
            .last()
            .filter(|tok| Mask::new(*tok).is_full())
            .unwrap_or(nick);

        debug!(nick = %nick, mask = %mask, "registered with server");
        self.self_user.user = User::new(mask);

        let key = Mask::new(mask).nick().to_owned();
        self.users.insert(key, User::new(mask));
    }

    fn on_names_reply(&mut self, ev: &Event) {
        let channel = ev.arg(2).to_owned();
        if !self.channels.contains_key(&channel) {
            return;
        }

        let list = ev.arg(3).to_owned();
        for entry in list.split_whitespace() {
            let mut letters = Vec::new();
            let mut nick = entry;
            while let Some(c) = nick.chars().next() {
                match self.prefixes.mode_for_symbol(c) {
                    Some(mode) => {
                        letters.push(mode);
                        nick = &nick[c.len_utf8()..];
                    }
                    None => break,
                }
            }
            if nick.is_empty() {
                continue;
            }

            self.add_user(nick);
            self.add_to_channel(nick, &channel);
            if let Some(member) = self
                .channels
                .get_mut(&channel)
                .and_then(|ch| ch.member_modes_mut(nick))
            {
                for letter in letters {
                    member.set_flag(letter);
                }
            }
        }
    }

    fn on_who_reply(&mut self, ev: &Event) {
        let nick = ev.arg(5);
        if nick.is_empty() {
            return;
        }
        let mask = format!("{}!{}@{}", nick, ev.arg(2), ev.arg(3));
        self.add_user(&mask);

        // Realname follows the hopcount token in the trailing parameter.
        if let Some((_, realname)) = ev.arg(7).split_once(' ') {
            if let Some(user) = self.users.get_mut(nick) {
                user.set_realname(realname);
            }
        }

        let channel = ev.arg(1);
        if self.channels.contains_key(channel) {
            self.add_to_channel(nick, channel);
            let status: Vec<char> = ev
                .arg(6)
                .chars()
                .filter_map(|c| self.prefixes.mode_for_symbol(c))
                .collect();
            if let Some(member) = self
                .channels
                .get_mut(channel)
                .and_then(|ch| ch.member_modes_mut(nick))
            {
                for letter in status {
                    member.set_flag(letter);
                }
            }
        }
    }

    fn on_channel_mode_is(&mut self, ev: &Event) {
        let channel = ev.arg(1);
        if !self.channels.contains_key(channel) {
            return;
        }
        let args: Vec<&str> = ev.args.iter().skip(3).map(String::as_str).collect();
        let diff = ModeDiff::parse(&self.chan_kinds, ev.arg(2), &args);
        self.apply_channel_diff(channel, &diff);
    }

    fn on_ban_list(&mut self, ev: &Event) {
        let channel = ev.arg(1);
        let banmask = ev.arg(2);
        if banmask.is_empty() {
            return;
        }
        if let Some(ch) = self.channels.get_mut(channel) {
            ch.modes_mut().set_address('b', banmask);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const USERS: [&str; 2] = ["nick1!user1@host1", "nick2!user2@host2"];
    const CHANNELS: [&str; 2] = ["#chan1", "#chan2"];
    const SERVER: &str = "irc.server.net";
    const SELF_MASK: &str = "me!my@host.com";

    fn store() -> Store {
        let mut st = Store::new(&Capabilities::new()).unwrap();
        st.set_self(SELF_MASK);
        st
    }

    #[test]
    fn test_construction_fails_on_bad_descriptor() {
        assert!(matches!(
            Store::new(&Capabilities::new().chanmodes("a,b,c")),
            Err(CapsError::ChanModes(_))
        ));
        assert!(matches!(
            Store::new(&Capabilities::new().prefix("")),
            Err(CapsError::Prefix(_))
        ));
        assert!(matches!(
            Store::new(&Capabilities::new().usermodes("")),
            Err(CapsError::UserModes(_))
        ));
        assert!(matches!(
            Store::new(&Capabilities::new().chantypes("H")),
            Err(CapsError::ChanTypes(_))
        ));
    }

    #[test]
    fn test_protocaps_swaps_tables() {
        let mut st = store();
        assert!(!st.channel_finder().is_channel("!chan"));
        assert!(!st.prefixes().is_prefix_mode('q'));

        let caps = Capabilities::new()
            .chantypes("!")
            .prefix("(q)~")
            .chanmodes(",,,q")
            .usermodes("q");
        st.protocaps(&caps).unwrap();

        assert!(st.channel_finder().is_channel("!chan"));
        assert!(st.prefixes().is_prefix_mode('q'));
        assert!(!st.channel_finder().is_channel("#chan"));
    }

    #[test]
    fn test_protocaps_rejects_bad_descriptor_and_keeps_tables() {
        let mut st = store();
        assert!(st.protocaps(&Capabilities::new().chantypes("Z")).is_err());
        assert!(st.channel_finder().is_channel("#chan"));
    }

    #[test]
    fn test_add_user_updates_in_place() {
        let mut st = store();
        st.add_user("nick!user@host.com");
        assert_eq!(st.get_user("nick").unwrap().fullhost(), "nick!user@host.com");

        st.add_user("nick!user@host.net");
        assert_eq!(st.n_users(), 1);
        assert_eq!(st.get_user("nick").unwrap().fullhost(), "nick!user@host.net");

        // A bare nickname never downgrades a full mask.
        st.add_user("nick");
        assert_eq!(st.get_user("nick").unwrap().fullhost(), "nick!user@host.net");
    }

    #[test]
    fn test_lookup_by_nick_or_mask() {
        let mut st = store();
        st.add_user(USERS[0]);
        assert!(st.get_user("nick1").is_some());
        assert!(st.get_user(USERS[0]).is_some());
        assert!(st.get_user("nick2").is_none());
    }

    #[test]
    fn test_membership_primitives() {
        let mut st = store();

        // Linking with either side missing is a no-op.
        st.add_to_channel(USERS[0], CHANNELS[0]);
        assert!(!st.is_on(USERS[0], CHANNELS[0]));

        st.add_user(USERS[0]);
        st.add_user(USERS[1]);
        st.add_channel(CHANNELS[0]);
        st.add_channel(CHANNELS[1]);
        st.add_to_channel(USERS[0], CHANNELS[0]);
        st.add_to_channel(USERS[0], CHANNELS[0]); // no duplicate link
        st.add_to_channel(USERS[0], CHANNELS[1]);
        st.add_to_channel(USERS[1], CHANNELS[0]);

        assert_eq!(st.n_user_chans(USERS[0]), 2);
        assert_eq!(st.n_user_chans(USERS[1]), 1);
        assert_eq!(st.n_chan_users(CHANNELS[0]), 2);
        assert_eq!(st.n_chan_users(CHANNELS[1]), 1);
        assert_eq!(st.user_chans(USERS[0]), vec![CHANNELS[0], CHANNELS[1]]);
        assert_eq!(st.chan_users(CHANNELS[0]), vec![USERS[0], USERS[1]]);
    }

    #[test]
    fn test_remove_user_cascades() {
        let mut st = store();
        st.add_user(USERS[0]);
        st.add_channel(CHANNELS[0]);
        st.add_to_channel(USERS[0], CHANNELS[0]);

        st.remove_user(USERS[0]);
        assert!(st.get_user(USERS[0]).is_none());
        assert!(!st.is_on(USERS[0], CHANNELS[0]));
        assert!(st.get_channel(CHANNELS[0]).is_some());
    }

    #[test]
    fn test_enumeration() {
        let mut st = store();
        st.add_user(USERS[0]);
        st.add_user(USERS[1]);
        st.add_channel(CHANNELS[0]);
        assert_eq!(st.users(), vec![USERS[0], USERS[1]]);
        assert_eq!(st.channels(), vec![CHANNELS[0]]);

        let mut seen = 0;
        st.each_user(|_| seen += 1);
        st.each_channel(|_| seen += 1);
        assert_eq!(seen, 3);
    }

    #[test]
    fn test_update_mode_routes_status_letters() {
        let mut st = store();
        st.add_channel(CHANNELS[0]);
        st.add_user(USERS[0]);
        st.add_user(USERS[1]);
        st.add_to_channel(USERS[0], CHANNELS[0]);
        st.add_to_channel(USERS[1], CHANNELS[0]);

        st.get_channel_mut(CHANNELS[0]).unwrap().modes_mut().set(["n"]);
        st.update(&Event::new(
            "MODE",
            USERS[0],
            &[CHANNELS[0], "+ovmb-vn", "nick1", "nick1", "*!*mask", "nick2"],
        ));

        let ch = st.get_channel(CHANNELS[0]).unwrap();
        assert!(!ch.modes().is_set(["n"]));
        assert!(ch.modes().is_set(["m"]));
        assert!(ch.modes().is_set(["b *!*mask"]));

        let u1 = st.get_users_channel_modes(USERS[0], CHANNELS[0]).unwrap();
        assert!(u1.has_flag('o'));
        assert!(u1.has_flag('v'));
        let u2 = st.get_users_channel_modes(USERS[1], CHANNELS[0]).unwrap();
        assert!(!u2.has_flag('v'));
    }

    #[test]
    fn test_update_mode_self() {
        let mut st = store();
        st.self_user_mut().modes.set(["o"]);

        st.update(&Event::new("MODE", SELF_MASK, &["me", "+i-o"]));
        assert!(st.self_user().modes.is_set(["i"]));
        assert!(!st.self_user().modes.is_set(["o"]));
    }

    #[test]
    fn test_update_mode_unknown_channel_ignored() {
        let mut st = store();
        st.update(&Event::new("MODE", USERS[0], &["#nowhere", "+n"]));
        assert!(st.get_channel("#nowhere").is_none());
    }

    #[test]
    fn test_update_topic_variants() {
        let mut st = store();
        st.add_channel(CHANNELS[0]);

        st.update(&Event::new("TOPIC", USERS[1], &[CHANNELS[0], "topic one"]));
        assert_eq!(st.get_channel(CHANNELS[0]).unwrap().topic(), "topic one");

        st.update(&Event::new("332", SERVER, &["me", CHANNELS[0], "topic two"]));
        assert_eq!(st.get_channel(CHANNELS[0]).unwrap().topic(), "topic two");
    }

    #[test]
    fn test_update_welcome() {
        let mut st = store();
        st.update(&Event::new("001", SERVER, &["nick2", "Welcome to"]));
        assert_eq!(st.self_user().user.fullhost(), "nick2");
        assert_eq!(st.get_user("nick2").unwrap().fullhost(), "nick2");

        st.update(&Event::new(
            "001",
            SERVER,
            &["nick2", "Welcome to nick2!user2@host2"],
        ));
        assert_eq!(st.self_user().user.fullhost(), USERS[1]);
        assert_eq!(st.get_user("nick2").unwrap().fullhost(), USERS[1]);
    }

    #[test]
    fn test_update_names_reply() {
        let mut st = store();
        st.add_channel(CHANNELS[0]);

        st.update(&Event::new(
            "353",
            SERVER,
            &["me", "=", CHANNELS[0], "@nick1 +nick2 me"],
        ));

        assert_eq!(
            st.get_users_channel_modes("nick1", CHANNELS[0]).unwrap().to_string(),
            "o"
        );
        assert_eq!(
            st.get_users_channel_modes("nick2", CHANNELS[0]).unwrap().to_string(),
            "v"
        );
        // No prefix symbol means no modes, our own nick included.
        assert_eq!(
            st.get_users_channel_modes("me", CHANNELS[0]).unwrap().to_string(),
            ""
        );
    }

    #[test]
    fn test_update_who_reply() {
        let mut st = store();
        st.add_channel(CHANNELS[0]);

        st.update(&Event::new(
            "352",
            SERVER,
            &["me", CHANNELS[0], "user1", "host1", "*.server.net", "nick1", "Hx@d", "3 real name"],
        ));

        let user = st.get_user("nick1").unwrap();
        assert_eq!(user.fullhost(), USERS[0]);
        assert_eq!(user.realname(), "real name");
        assert_eq!(
            st.get_users_channel_modes("nick1", CHANNELS[0]).unwrap().to_string(),
            "o"
        );
    }

    #[test]
    fn test_update_channel_mode_is() {
        let mut st = store();
        st.add_channel(CHANNELS[0]);
        assert!(!st.get_channel(CHANNELS[0]).unwrap().modes().is_set(["ntl 10"]));

        st.update(&Event::new("324", SERVER, &["me", CHANNELS[0], "+ntl", "10"]));
        assert!(st.get_channel(CHANNELS[0]).unwrap().modes().is_set(["ntl 10"]));
    }

    #[test]
    fn test_update_ban_list() {
        let mut st = store();
        st.add_channel(CHANNELS[0]);

        st.update(&Event::new(
            "367",
            SERVER,
            &["me", CHANNELS[0], "nick1!*@*", "nick2", "1367197165"],
        ));
        assert!(st.get_channel(CHANNELS[0]).unwrap().has_ban("nick1!*@*"));
    }
}
