//! `eventter-core` — building blocks shared by the event registry.
//!
//! This crate holds identifiers, the error model and the capability traits for
//! payloads and receivers. It has no dispatch logic of its own.

pub mod error;
pub mod event;
pub mod id;

pub use error::{EventterError, EventterResult};
pub use event::{Event, Receiver, TypeTag};
pub use id::{ReceiverId, RegistryId, SubscriptionId};
