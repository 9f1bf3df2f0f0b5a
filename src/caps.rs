//! Server capability descriptor and its derived lookup tables.
//!
//! A [`Capabilities`] value carries the raw token values a server advertises
//! through `RPL_ISUPPORT`/`RPL_MYINFO` (`CHANTYPES`, `CHANMODES`, `PREFIX`,
//! and the user mode letters). Parsing those protocol lines is the job of an
//! external message parser; this module only derives the lookup tables the
//! state store consumes:
//!
//! - mode kind tables ([`ModeKinds`](crate::modes::ModeKinds)),
//! - the status-prefix mapping ([`Prefixes`]),
//! - the channel-name classifier ([`ChannelFinder`]).
//!
//! Derivation fails with a [`CapsError`] when a token is malformed, which is
//! fatal to `Store` construction.

use crate::error::CapsError;

/// Channel type characters accepted by RFC 2812 (`#`, `&`, `+`, `!`).
const VALID_CHANTYPES: &str = "#&+!";

/// Raw capability tokens, with RFC 1459 defaults.
///
/// # Example
///
/// ```
/// use irckit::caps::Capabilities;
///
/// let caps = Capabilities::new()
///     .chantypes("#&")
///     .prefix("(qaohv)~&@%+")
///     .chanmodes("beI,k,l,imnpst");
/// assert_eq!(caps.prefix_token(), "(qaohv)~&@%+");
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Capabilities {
    chantypes: String,
    chanmodes: String,
    prefix: String,
    usermodes: String,
}

impl Default for Capabilities {
    fn default() -> Self {
        Self {
            chantypes: "#&".into(),
            chanmodes: "beI,k,l,imnpst".into(),
            prefix: "(ov)@+".into(),
            usermodes: "oiws".into(),
        }
    }
}

impl Capabilities {
    /// Create a descriptor carrying the RFC 1459 defaults.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the `CHANTYPES` value (e.g. `#&`).
    pub fn chantypes(mut self, value: impl Into<String>) -> Self {
        self.chantypes = value.into();
        self
    }

    /// Set the `CHANMODES` value (e.g. `beI,k,l,imnpst`).
    pub fn chanmodes(mut self, value: impl Into<String>) -> Self {
        self.chanmodes = value.into();
        self
    }

    /// Set the `PREFIX` value (e.g. `(ov)@+`).
    pub fn prefix(mut self, value: impl Into<String>) -> Self {
        self.prefix = value.into();
        self
    }

    /// Set the user mode letters advertised by `RPL_MYINFO` (e.g. `oiws`).
    pub fn usermodes(mut self, value: impl Into<String>) -> Self {
        self.usermodes = value.into();
        self
    }

    /// The raw `CHANTYPES` value.
    pub fn chantypes_token(&self) -> &str {
        &self.chantypes
    }

    /// The raw `CHANMODES` value.
    pub fn chanmodes_token(&self) -> &str {
        &self.chanmodes
    }

    /// The raw `PREFIX` value.
    pub fn prefix_token(&self) -> &str {
        &self.prefix
    }

    /// The raw user mode letters.
    pub fn usermodes_token(&self) -> &str {
        &self.usermodes
    }

    /// Derive the status-prefix mapping from the `PREFIX` token.
    pub fn prefixes(&self) -> Result<Prefixes, CapsError> {
        Prefixes::parse(&self.prefix)
    }

    /// Derive the channel-name classifier from the `CHANTYPES` token.
    pub fn channel_finder(&self) -> Result<ChannelFinder, CapsError> {
        ChannelFinder::new(&self.chantypes)
    }
}

/// Mapping between status prefix symbols (`@`, `+`) and the channel user
/// mode letters they stand for (`o`, `v`), parsed from a `PREFIX` token of
/// the form `(ov)@+`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Prefixes {
    modes: String,
    symbols: String,
}

impl Prefixes {
    /// Parse a `PREFIX` value like `(ov)@+`.
    ///
    /// Fails when the parentheses are missing or the mode and symbol runs
    /// have different lengths.
    pub fn parse(token: &str) -> Result<Self, CapsError> {
        let bad = || CapsError::Prefix(token.to_owned());

        let open = token.find('(').ok_or_else(bad)?;
        let close = token[open + 1..].find(')').map(|i| open + 1 + i).ok_or_else(bad)?;
        let modes = &token[open + 1..close];
        let symbols = &token[close + 1..];

        if modes.is_empty() || modes.chars().count() != symbols.chars().count() {
            return Err(bad());
        }

        Ok(Self {
            modes: modes.to_owned(),
            symbols: symbols.to_owned(),
        })
    }

    /// The mode letters, in privilege order (e.g. `ov`).
    pub fn modes(&self) -> &str {
        &self.modes
    }

    /// The prefix symbols, in privilege order (e.g. `@+`).
    pub fn symbols(&self) -> &str {
        &self.symbols
    }

    /// Whether the given letter is a per-member status mode on this server.
    pub fn is_prefix_mode(&self, mode: char) -> bool {
        self.modes.contains(mode)
    }

    /// The prefix symbol for a mode letter (`o` → `@`), if any.
    pub fn symbol_for_mode(&self, mode: char) -> Option<char> {
        self.modes
            .chars()
            .position(|c| c == mode)
            .and_then(|i| self.symbols.chars().nth(i))
    }

    /// The mode letter for a prefix symbol (`@` → `o`), if any.
    pub fn mode_for_symbol(&self, symbol: char) -> Option<char> {
        self.symbols
            .chars()
            .position(|c| c == symbol)
            .and_then(|i| self.modes.chars().nth(i))
    }
}

/// Classifier that tests whether a target string names a channel, based on
/// the server's `CHANTYPES` token.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChannelFinder {
    chantypes: String,
}

impl ChannelFinder {
    /// Build a classifier from a `CHANTYPES` value like `#&`.
    ///
    /// Fails when the token is empty or contains a character outside the
    /// RFC 2812 channel type set (`#&+!`).
    pub fn new(chantypes: &str) -> Result<Self, CapsError> {
        if chantypes.is_empty() || chantypes.chars().any(|c| !VALID_CHANTYPES.contains(c)) {
            return Err(CapsError::ChanTypes(chantypes.to_owned()));
        }
        Ok(Self {
            chantypes: chantypes.to_owned(),
        })
    }

    /// Whether the target begins with one of this server's channel type
    /// characters.
    pub fn is_channel(&self, target: &str) -> bool {
        target
            .chars()
            .next()
            .is_some_and(|c| self.chantypes.contains(c))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_prefixes_parse() {
        let p = Prefixes::parse("(ov)@+").unwrap();
        assert_eq!(p.mode_for_symbol('@'), Some('o'));
        assert_eq!(p.mode_for_symbol('+'), Some('v'));
        assert_eq!(p.symbol_for_mode('o'), Some('@'));
        assert!(p.is_prefix_mode('v'));
        assert!(!p.is_prefix_mode('b'));
    }

    #[test]
    fn test_prefixes_parse_extended() {
        let p = Prefixes::parse("(qaohv)~&@%+").unwrap();
        assert_eq!(p.mode_for_symbol('~'), Some('q'));
        assert_eq!(p.symbol_for_mode('h'), Some('%'));
        assert_eq!(p.mode_for_symbol('!'), None);
    }

    #[test]
    fn test_prefixes_parse_malformed() {
        assert!(Prefixes::parse("").is_err());
        assert!(Prefixes::parse("@+").is_err());
        assert!(Prefixes::parse("(ov)@").is_err());
        assert!(Prefixes::parse("()").is_err());
    }

    #[test]
    fn test_channel_finder() {
        let f = ChannelFinder::new("#&").unwrap();
        assert!(f.is_channel("#rust"));
        assert!(f.is_channel("&local"));
        assert!(!f.is_channel("nick"));
        assert!(!f.is_channel(""));
        assert!(!f.is_channel("+modeless"));
    }

    #[test]
    fn test_channel_finder_rejects_bad_types() {
        assert!(ChannelFinder::new("").is_err());
        assert!(ChannelFinder::new("H").is_err());
        assert!(ChannelFinder::new("#H").is_err());
        assert!(ChannelFinder::new("!").is_ok());
    }

    #[test]
    fn test_capabilities_defaults() {
        let caps = Capabilities::new();
        assert!(caps.prefixes().is_ok());
        assert!(caps.channel_finder().is_ok());
        assert_eq!(caps.chanmodes_token(), "beI,k,l,imnpst");
    }
}
