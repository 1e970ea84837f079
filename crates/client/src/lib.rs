//! `pn-client`: real-time pub/sub client engine.
//!
//! Layers, bottom up:
//!
//! - [`builder`] turns operation parameters into a transport request
//!   (path template, query, signature).
//! - [`parser`] maps each response to a typed [`ParsedData`] or a
//!   [`Status`].
//! - [`network`] owns the two sessions, the retry loop and cancellation.
//! - [`subscribe`] is the long-poll state machine; [`heartbeat`] keeps
//!   presence alive next to it.
//! - [`client`] is the facade; REST operations live in [`operations`].

pub mod builder;
pub mod client;
pub mod heartbeat;
pub mod listener;
pub mod model;
pub mod network;
pub mod operations;
pub mod parser;
pub mod persistence;
pub mod status;
pub mod subscribe;
pub mod subscription;

pub use builder::RequestParameters;
pub use client::{Client, ClientBuilder};
pub use listener::{ChannelListener, ClientEvent, EventListener, ListenerId};
pub use model::{
    ChannelMetadata, ChannelOccupancy, FetchMessagesResult, HereNowResult, HistoryMessage,
    MessageActionsPage, Occupant, UuidMetadata,
};
pub use network::NetworkEngine;
pub use operations::{FetchMessagesRequest, HereNowRequest, PublishRequest, SignalRequest};
pub use parser::ParsedData;
pub use persistence::{KeyringStore, MemoryStore, SecureStore};
pub use status::{RetryHandle, Status};
pub use subscribe::{SubscribeRequest, SubscribeState};
