//! Capabilities for event payloads and long-lived receivers.

use core::any::{Any, TypeId};
use core::fmt;

/// A payload carried by the registry.
///
/// Payloads are opaque to the registry: it never inspects them, it only hands a
/// mutable reference to every matching callback. Implement this for each type
/// a host publishes.
pub trait Event: Any {}

/// A long-lived object that subscribes one of its methods to an event name.
///
/// The registry keys such subscriptions by the receiver's identity and keeps only
/// a weak link to it; ownership stays with the host.
pub trait Receiver: Any {}

/// Runtime type identity captured when a callback is registered.
#[derive(Copy, Clone, Eq)]
pub struct TypeTag {
    id: TypeId,
    name: &'static str,
}

impl TypeTag {
    pub fn of<E: Event>() -> Self {
        Self {
            id: TypeId::of::<E>(),
            name: core::any::type_name::<E>(),
        }
    }

    pub fn type_id(&self) -> TypeId {
        self.id
    }

    pub fn type_name(&self) -> &'static str {
        self.name
    }
}

// Names are informational only; identity is the TypeId.
impl PartialEq for TypeTag {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
    }
}

impl core::hash::Hash for TypeTag {
    fn hash<H: core::hash::Hasher>(&self, state: &mut H) {
        self.id.hash(state);
    }
}

impl fmt::Debug for TypeTag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name)
    }
}

impl fmt::Display for TypeTag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name)
    }
}
