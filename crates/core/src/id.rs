//! Strongly-typed identifiers used by the registry.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Handle of an anonymous (handle-keyed) subscription.
///
/// Issued by a registry in strictly increasing order starting at `0` and never
/// reused for the lifetime of that registry.
#[derive(Debug, Copy, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SubscriptionId(u64);

impl SubscriptionId {
    pub const fn from_raw(raw: u64) -> Self {
        Self(raw)
    }

    pub fn as_u64(&self) -> u64 {
        self.0
    }

    /// The handle issued right after this one, or `None` at `u64::MAX`.
    pub fn successor(self) -> Option<Self> {
        self.0.checked_add(1).map(Self)
    }
}

impl core::fmt::Display for SubscriptionId {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        write!(f, "#{}", self.0)
    }
}

impl From<SubscriptionId> for u64 {
    fn from(value: SubscriptionId) -> Self {
        value.0
    }
}

/// Identity of a receiver object: the address of its shared allocation.
///
/// Only ever compared and hashed; the registry never turns it back into a pointer.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub struct ReceiverId(usize);

impl ReceiverId {
    pub fn of<T: ?Sized>(ptr: *const T) -> Self {
        Self(ptr as *const () as usize)
    }

    pub fn as_usize(&self) -> usize {
        self.0
    }
}

impl core::fmt::Display for ReceiverId {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        write!(f, "receiver@{:#x}", self.0)
    }
}

/// Identifier of a registry instance (shows up in log records).
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RegistryId(Uuid);

impl RegistryId {
    /// Create a new identifier.
    ///
    /// Uses UUIDv7 (time-ordered).
    pub fn new() -> Self {
        Self(Uuid::now_v7())
    }
}

impl Default for RegistryId {
    fn default() -> Self {
        Self::new()
    }
}

impl core::fmt::Display for RegistryId {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        core::fmt::Display::fmt(&self.0, f)
    }
}
