//! In-process publish/subscribe registry (mechanics only).
//!
//! Producers call [`EventManager::notify`] with an event name and a payload; every
//! callback registered under that name is invoked synchronously on the caller's
//! thread before `notify` returns.
//!
//! Two independent subscription tables share one namespace of event names:
//!
//! - **Identity-keyed**: a long-lived [`Receiver`] subscribes one of its methods.
//!   At most one callback per (name, receiver); subscribing again overwrites.
//! - **Handle-keyed**: an anonymous closure subscribes and gets back a
//!   [`SubscriptionId`] that is never reissued by the same registry.
//!
//! Callbacks are stored type-erased together with the [`TypeTag`] of the payload
//! they expect, and every invocation is checked against it.

pub mod config;
pub mod guard;
pub mod handler;
pub mod registry;

pub use config::{ChannelTyping, RegistryConfig};
pub use guard::{ReceiverGuard, SubscriptionGuard};
pub use handler::{Delivery, ErasedCallback};
pub use registry::EventManager;

pub use eventter_core::{
    Event, EventterError, EventterResult, Receiver, ReceiverId, RegistryId, SubscriptionId,
    TypeTag,
};
