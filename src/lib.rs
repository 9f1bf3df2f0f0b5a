//! Client-side IRC runtime: connection pumping and protocol state.
//!
//! Two halves, usable together or alone:
//!
//! - [`net`]: a [`Connection`] over any async byte stream, with a writer
//!   pump that serializes concurrent senders (optionally throttled by a
//!   [`FloodPolicy`]) and a reader pump that frames inbound bytes into
//!   complete CR-LF lines.
//! - [`state`]: a [`Store`] that folds structured inbound [`Event`]s into
//!   an in-memory picture of users, channels, memberships, and modes,
//!   interpreting mode letters through server-advertised [`Capabilities`].
//!
//! Line-to-message parsing sits outside this crate; the store consumes
//! already-structured events.

pub mod caps;
pub mod error;
pub mod event;
pub mod modes;
pub mod net;
pub mod state;

pub use caps::Capabilities;
pub use error::{CapsError, ConnError};
pub use event::{Event, EventKind, Mask};
pub use modes::{ModeDiff, ModeKind, ModeKinds, Modeset};
pub use net::{Connection, FloodPolicy};
pub use state::{Channel, SelfUser, Store, User};
