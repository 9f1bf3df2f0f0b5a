//! The mode engine: kind classification, flag/argument/address containers,
//! and compound modestring diff parsing.
//!
//! IRC modes come in four argument arities, advertised per letter by the
//! server (`CHANMODES`): plain flags, modes that always carry an argument,
//! modes that carry an argument only when set, and address-list modes (bans
//! and friends). A [`Modeset`] stores one entity's current modes against a
//! shared [`ModeKinds`] table; a [`ModeDiff`] is one parsed compound
//! modestring (`+ov-b nick1 nick2 mask`) split into its positive and
//! negative halves.
//!
//! Two modestring shapes exist:
//!
//! - a *simple* modestring carries only letters plus arguments in encounter
//!   order, with the direction implied by the operation (`set` vs `unset`);
//! - a *compound* modestring carries explicit `+`/`-` runs and is what the
//!   server sends in `MODE` and `RPL_CHANNELMODEIS` events.

use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use std::sync::Arc;

use parking_lot::RwLock;
use tracing::trace;

use crate::error::CapsError;

/// Argument arity class of a mode letter.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ModeKind {
    /// Plain flag; consumes no argument on set or unset.
    Flag,
    /// Consumes one argument on both set and unset (e.g. `k`).
    ArgAlways,
    /// Consumes one argument on set, none on unset (e.g. `l`).
    ArgOnSet,
    /// Address list; one argument on both set and unset, list semantics
    /// (e.g. `b`).
    AddressList,
}

/// Letter → kind lookup table.
///
/// A table is derived once from a capability descriptor and shared read-only
/// by every `Modeset` on the same connection; `Store::protocaps` swaps the
/// contents in place so all holders observe an update atomically.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ModeKinds {
    kinds: BTreeMap<char, ModeKind>,
}

/// Shared handle to a kind table.
pub type KindTable = Arc<RwLock<ModeKinds>>;

impl ModeKinds {
    /// Build a table from a `CHANMODES` token: four comma-separated groups
    /// of letters, in order address-list, always-arg, on-set-arg, flag.
    pub fn from_chanmodes(token: &str) -> Result<Self, CapsError> {
        let groups: Vec<&str> = token.split(',').collect();
        if groups.len() != 4 {
            return Err(CapsError::ChanModes(token.to_owned()));
        }

        let mut kinds = BTreeMap::new();
        let classes = [
            ModeKind::AddressList,
            ModeKind::ArgAlways,
            ModeKind::ArgOnSet,
            ModeKind::Flag,
        ];
        for (group, kind) in groups.iter().zip(classes) {
            for letter in group.chars() {
                kinds.insert(letter, kind);
            }
        }
        Ok(Self { kinds })
    }

    /// Build a table assigning one kind to every letter in `letters`.
    pub fn from_letters(letters: &str, kind: ModeKind) -> Self {
        Self {
            kinds: letters.chars().map(|c| (c, kind)).collect(),
        }
    }

    /// Assign `kind` to every letter in `letters`, overriding existing
    /// entries.
    pub fn extend_with(&mut self, letters: &str, kind: ModeKind) {
        for letter in letters.chars() {
            self.kinds.insert(letter, kind);
        }
    }

    /// The kind of a letter, or `None` when the letter is unknown.
    pub fn kind(&self, letter: char) -> Option<ModeKind> {
        self.kinds.get(&letter).copied()
    }

    /// Number of known letters.
    pub fn len(&self) -> usize {
        self.kinds.len()
    }

    /// Whether the table knows no letters.
    pub fn is_empty(&self) -> bool {
        self.kinds.is_empty()
    }

    /// Wrap this table in a shared handle.
    pub fn shared(self) -> KindTable {
        Arc::new(RwLock::new(self))
    }
}

/// One entity's current modes: flags, single-argument modes, and address
/// lists, interpreted through a shared kind table.
#[derive(Debug, Clone)]
pub struct Modeset {
    flags: BTreeSet<char>,
    args: BTreeMap<char, String>,
    addresses: BTreeMap<char, Vec<String>>,
    kinds: KindTable,
}

impl Modeset {
    /// Create an empty modeset over the given kind table.
    pub fn new(kinds: KindTable) -> Self {
        Self {
            flags: BTreeSet::new(),
            args: BTreeMap::new(),
            addresses: BTreeMap::new(),
            kinds,
        }
    }

    /// Set modes from simple modestrings.
    ///
    /// The first whitespace token of the first string is the letter run;
    /// every following token is an argument, consumed left to right by the
    /// letters whose kind requires one.
    pub fn set<'a>(&mut self, modestrings: impl IntoIterator<Item = &'a str>) {
        let (letters, args) = parse_simple(modestrings);
        let mut used = 0;
        for letter in letters {
            match self.kind_of(letter) {
                Some(ModeKind::Flag) => self.set_flag(letter),
                Some(ModeKind::ArgAlways) | Some(ModeKind::ArgOnSet) => {
                    if let Some(arg) = args.get(used) {
                        self.set_arg(letter, arg);
                        used += 1;
                    }
                }
                Some(ModeKind::AddressList) => {
                    if let Some(arg) = args.get(used) {
                        self.set_address(letter, arg);
                        used += 1;
                    }
                }
                None => {}
            }
        }
    }

    /// Unset modes from simple modestrings; argument handling mirrors
    /// [`Modeset::set`] except that on-set-arg modes clear without consuming
    /// an argument.
    pub fn unset<'a>(&mut self, modestrings: impl IntoIterator<Item = &'a str>) {
        let (letters, args) = parse_simple(modestrings);
        let mut used = 0;
        for letter in letters {
            match self.kind_of(letter) {
                Some(ModeKind::Flag) => {
                    self.unset_flag(letter);
                }
                Some(ModeKind::ArgAlways) => {
                    if let Some(arg) = args.get(used) {
                        self.unset_arg(letter, arg);
                        used += 1;
                    }
                }
                Some(ModeKind::ArgOnSet) => {
                    self.unset_arg(letter, "");
                }
                Some(ModeKind::AddressList) => {
                    if let Some(arg) = args.get(used) {
                        self.unset_address(letter, arg);
                        used += 1;
                    }
                }
                None => {}
            }
        }
    }

    /// Check whether modes are set, using simple modestrings.
    ///
    /// For argument modes an empty (absent) query argument checks presence
    /// only; a non-empty one also requires an exact value match. For address
    /// lists a non-empty argument checks list membership.
    pub fn is_set<'a>(&self, modestrings: impl IntoIterator<Item = &'a str>) -> bool {
        let (letters, args) = parse_simple(modestrings);
        if letters.is_empty() {
            return false;
        }

        let mut used = 0;
        for letter in letters {
            match self.kind_of(letter) {
                Some(ModeKind::Flag) => {
                    if !self.has_flag(letter) {
                        return false;
                    }
                }
                Some(ModeKind::ArgAlways) | Some(ModeKind::ArgOnSet) => {
                    let arg = args.get(used).map(String::as_str).unwrap_or("");
                    if !arg.is_empty() {
                        used += 1;
                    }
                    if !self.is_arg_set(letter, arg) {
                        return false;
                    }
                }
                Some(ModeKind::AddressList) => {
                    let arg = args.get(used).map(String::as_str).unwrap_or("");
                    if !arg.is_empty() {
                        used += 1;
                    }
                    if !self.is_address_set(letter, arg) {
                        return false;
                    }
                }
                None => {}
            }
        }
        true
    }

    /// Parse a compound modestring (`+ov-b nick1 nick2 mask`) and apply it.
    pub fn apply(&mut self, compound: &str) {
        let mut tokens = compound.split_whitespace();
        let Some(modes) = tokens.next() else { return };
        let args: Vec<&str> = tokens.collect();
        let diff = ModeDiff::parse(&self.kinds, modes, &args);
        self.apply_diff(&diff);
    }

    /// Apply a parsed diff: positive entries set, negative entries unset.
    ///
    /// Entries were already kind-checked at parse time, so application goes
    /// straight to the containers; letters the kind table does not know never
    /// made it into the diff.
    pub fn apply_diff(&mut self, diff: &ModeDiff) {
        for letter in diff.pos.flags() {
            self.set_flag(letter);
        }
        for (letter, arg) in diff.pos.args() {
            self.set_arg(letter, arg);
        }
        for (letter, list) in diff.pos.address_lists() {
            for address in list {
                self.set_address(letter, address);
            }
        }

        for letter in diff.neg.flags() {
            self.unset_flag(letter);
        }
        for (letter, arg) in diff.neg.args() {
            self.unset_arg(letter, arg);
        }
        for (letter, list) in diff.neg.address_lists() {
            for address in list {
                self.unset_address(letter, address);
            }
        }
    }

    /// The argument stored for a mode, if the mode is set.
    pub fn arg(&self, letter: char) -> Option<&str> {
        self.args.get(&letter).map(String::as_str)
    }

    /// The addresses stored for an address-list mode, if any are set.
    pub fn addresses(&self, letter: char) -> Option<&[String]> {
        self.addresses.get(&letter).map(Vec::as_slice)
    }

    /// Whether a plain flag is set.
    pub fn has_flag(&self, letter: char) -> bool {
        self.flags.contains(&letter)
    }

    /// Set a plain flag.
    pub fn set_flag(&mut self, letter: char) {
        self.flags.insert(letter);
    }

    /// Unset a plain flag.
    pub fn unset_flag(&mut self, letter: char) {
        self.flags.remove(&letter);
    }

    /// Store an argument for a mode.
    pub fn set_arg(&mut self, letter: char, arg: &str) {
        self.args.insert(letter, arg.to_owned());
    }

    /// Remove an argument mode. A non-empty `arg` must match the stored
    /// value for the removal to happen; an empty `arg` removes
    /// unconditionally.
    pub fn unset_arg(&mut self, letter: char, arg: &str) {
        if self.is_arg_set(letter, arg) {
            self.args.remove(&letter);
        }
    }

    /// Whether an argument mode is set; a non-empty `arg` additionally
    /// requires an exact value match.
    pub fn is_arg_set(&self, letter: char, arg: &str) -> bool {
        match self.args.get(&letter) {
            Some(stored) => arg.is_empty() || stored == arg,
            None => false,
        }
    }

    /// Insert an address into a list mode, if not already present.
    pub fn set_address(&mut self, letter: char, address: &str) {
        let list = self.addresses.entry(letter).or_default();
        if !list.iter().any(|a| a == address) {
            list.push(address.to_owned());
        }
    }

    /// Remove an address from a list mode. Removing the last entry removes
    /// the letter's key entirely; removing an absent address is a no-op.
    pub fn unset_address(&mut self, letter: char, address: &str) {
        if let Some(list) = self.addresses.get_mut(&letter) {
            if let Some(i) = list.iter().position(|a| a == address) {
                list.remove(i);
                if list.is_empty() {
                    self.addresses.remove(&letter);
                }
            }
        }
    }

    /// Whether an address-list mode is set; a non-empty `address`
    /// additionally requires list membership.
    pub fn is_address_set(&self, letter: char, address: &str) -> bool {
        match self.addresses.get(&letter) {
            Some(list) => address.is_empty() || list.iter().any(|a| a == address),
            None => false,
        }
    }

    /// Iterate the set plain flags.
    pub fn flags(&self) -> impl Iterator<Item = char> + '_ {
        self.flags.iter().copied()
    }

    /// Iterate the set argument modes with their values.
    pub fn args(&self) -> impl Iterator<Item = (char, &str)> + '_ {
        self.args.iter().map(|(&l, a)| (l, a.as_str()))
    }

    /// Iterate the set address-list modes with their address lists.
    pub fn address_lists(&self) -> impl Iterator<Item = (char, &[String])> + '_ {
        self.addresses.iter().map(|(&l, v)| (l, v.as_slice()))
    }

    fn kind_of(&self, letter: char) -> Option<ModeKind> {
        self.kinds.read().kind(letter)
    }
}

impl fmt::Display for Modeset {
    /// Canonical rendering: every set letter concatenated (one occurrence
    /// per address-list entry), then a single space and the space-joined
    /// arguments, omitted entirely when there are none.
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut letters = String::new();
        let mut args: Vec<&str> = Vec::new();

        for &letter in &self.flags {
            letters.push(letter);
        }
        for (letter, arg) in &self.args {
            letters.push(*letter);
            args.push(arg);
        }
        for (letter, list) in &self.addresses {
            for address in list {
                letters.push(*letter);
                args.push(address);
            }
        }

        f.write_str(&letters)?;
        if !args.is_empty() {
            write!(f, " {}", args.join(" "))?;
        }
        Ok(())
    }
}

/// One parsed compound modestring, split into additions and removals.
///
/// Immutable after parse; consumed by [`Modeset::apply_diff`] or by the
/// store's channel mode routing.
#[derive(Debug, Clone)]
pub struct ModeDiff {
    pos: Modeset,
    neg: Modeset,
}

impl ModeDiff {
    /// Parse a compound mode token plus its already-split argument list.
    ///
    /// Arguments are consumed left to right, assigned to letters strictly in
    /// the order those letters require one. Letters the kind table does not
    /// know are dropped without consuming an argument.
    pub fn parse(kinds: &KindTable, modes: &str, args: &[&str]) -> Self {
        let mut pos = Modeset::new(Arc::clone(kinds));
        let mut neg = Modeset::new(Arc::clone(kinds));
        let mut adding = true;
        let mut used = 0;

        let table = kinds.read();
        for letter in modes.chars() {
            match letter {
                '+' => adding = true,
                '-' => adding = false,
                _ => match table.kind(letter) {
                    Some(ModeKind::Flag) => {
                        let target = if adding { &mut pos } else { &mut neg };
                        target.set_flag(letter);
                    }
                    Some(ModeKind::ArgAlways) => {
                        if let Some(&arg) = args.get(used) {
                            used += 1;
                            let target = if adding { &mut pos } else { &mut neg };
                            target.set_arg(letter, arg);
                        }
                    }
                    Some(ModeKind::ArgOnSet) => {
                        if adding {
                            if let Some(&arg) = args.get(used) {
                                used += 1;
                                pos.set_arg(letter, arg);
                            }
                        } else {
                            // Unset clears regardless of value.
                            neg.set_arg(letter, "");
                        }
                    }
                    Some(ModeKind::AddressList) => {
                        if let Some(&arg) = args.get(used) {
                            used += 1;
                            let target = if adding { &mut pos } else { &mut neg };
                            target.set_address(letter, arg);
                        }
                    }
                    None => {
                        trace!(letter = %letter, "ignoring unknown mode letter");
                    }
                },
            }
        }
        drop(table);

        Self { pos, neg }
    }

    /// Parse a compound modestring carrying its arguments inline.
    pub fn parse_compound(kinds: &KindTable, compound: &str) -> Self {
        let mut tokens = compound.split_whitespace();
        let modes = tokens.next().unwrap_or("");
        let args: Vec<&str> = tokens.collect();
        Self::parse(kinds, modes, &args)
    }

    /// The additions half.
    pub fn positive(&self) -> &Modeset {
        &self.pos
    }

    /// The removals half.
    pub fn negative(&self) -> &Modeset {
        &self.neg
    }
}

/// Split simple modestrings into a letter run and an argument list.
///
/// The first whitespace token of the first non-empty string is the letter
/// run; all remaining tokens across all strings are arguments.
fn parse_simple<'a>(modestrings: impl IntoIterator<Item = &'a str>) -> (Vec<char>, Vec<String>) {
    let mut letters = Vec::new();
    let mut args = Vec::new();
    let mut seen_letters = false;

    for s in modestrings {
        for token in s.split_whitespace() {
            if !seen_letters {
                letters.extend(token.chars());
                seen_letters = true;
            } else {
                args.push(token.to_owned());
            }
        }
    }
    (letters, args)
}
