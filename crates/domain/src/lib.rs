//! `pn-domain`: types shared by every pn crate.
//!
//! Nothing in here performs I/O except [`config::Config::load`].  The
//! crate holds the shared [`error::Error`], the configuration tree, the
//! operation / endpoint tags used by the retry policy and the parser
//! registry, status categories, the subscribe [`cursor::Cursor`], the
//! decoded real-time event payloads, and structured trace events.

pub mod category;
pub mod config;
pub mod cursor;
pub mod error;
pub mod event;
pub mod operation;
pub mod trace;

pub use category::StatusCategory;
pub use cursor::Cursor;
pub use error::{Error, Result};
pub use operation::{Endpoint, OperationType};

/// SDK identifier reported in the `pnsdk` query parameter.
pub const SDK_NAME: &str = concat!("PubNub-Rust-Engine/", env!("CARGO_PKG_VERSION"));

/// Suffix of presence pseudo-channels and pseudo-groups.
pub const PRESENCE_SUFFIX: &str = "-pnpres";
