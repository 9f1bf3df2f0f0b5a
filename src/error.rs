//! Unified error handling for irckit.
//!
//! Two error domains exist in this crate: capability-descriptor derivation
//! (`CapsError`, fatal to `Store` construction) and connection pump I/O
//! (`ConnError`, surfaced once to blocking `write`/`read` callers).

use thiserror::Error;

/// Errors deriving the lookup tables from a capability descriptor.
///
/// Any of these is fatal to the `Store` being constructed; the caller may
/// retry after obtaining corrected capability data from the server.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum CapsError {
    /// The `CHANMODES` token did not contain the four comma-separated groups.
    #[error("malformed CHANMODES token: {0:?}")]
    ChanModes(String),

    /// The `PREFIX` token was not of the form `(modes)symbols` with matching
    /// lengths.
    #[error("malformed PREFIX token: {0:?}")]
    Prefix(String),

    /// No user mode letters were available to build the self kind table.
    #[error("no user mode letters: {0:?}")]
    UserModes(String),

    /// The `CHANTYPES` token was empty or contained an invalid channel type
    /// character.
    #[error("malformed CHANTYPES token: {0:?}")]
    ChanTypes(String),
}

/// Errors surfaced by the connection pump.
#[derive(Debug, Error)]
pub enum ConnError {
    /// The pump has stopped (close was called or the connection reached
    /// end-of-stream); outstanding and subsequent writes fail with this.
    #[error("connection closed")]
    Closed,

    /// An I/O error from the underlying connection.
    #[error("i/o error: {0}")]
    Io(#[from] std::io::Error),
}
