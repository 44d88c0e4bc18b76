//! Subscription registry and synchronous dispatcher.
//!
//! ## Tables
//!
//! ```text
//! receivers: event name → (ReceiverId     → ErasedCallback)   identity-keyed
//! handles:   event name → (SubscriptionId → ErasedCallback)   handle-keyed
//! ```
//!
//! Per-name buckets are removed as soon as they become empty, on every removal
//! path. Handles come from a counter that only ever moves forward, so a handle is
//! never issued twice by the same registry, not even across `clear_subscriptions`.
//!
//! ## Dispatch
//!
//! `notify` snapshots the matching callbacks, releases every internal borrow and
//! only then runs them, one after another, on the caller's thread. Subscribe,
//! unsubscribe and clear calls made from inside a callback therefore take effect
//! for the next `notify`; the dispatch in flight still reaches its snapshot.
//!
//! Identity-keyed callbacks run first (in unspecified order), then handle-keyed
//! callbacks in ascending handle order.
//!
//! ## Thread model
//!
//! Single-threaded. `EventManager` is neither `Send` nor `Sync`; share it inside
//! one thread with `Rc` if callbacks need to reach it.

use std::cell::RefCell;
use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::rc::{Rc, Weak};

use tracing::{debug, trace, warn};

use eventter_core::{
    Event, EventterError, EventterResult, Receiver, ReceiverId, RegistryId, SubscriptionId,
    TypeTag,
};

use crate::config::{ChannelTyping, RegistryConfig};
use crate::guard::{ReceiverGuard, SubscriptionGuard};
use crate::handler::{Delivery, ErasedCallback};

/// Subscription state shared between the registry and its guards.
#[derive(Debug)]
pub(crate) struct Tables {
    registry: String,
    typing: ChannelTyping,
    receivers: HashMap<String, HashMap<ReceiverId, ErasedCallback>>,
    handles: HashMap<String, BTreeMap<SubscriptionId, ErasedCallback>>,
    /// Payload type bound to each live event name (exclusive typing only).
    bindings: HashMap<String, TypeTag>,
    next_handle: SubscriptionId,
}

impl Tables {
    fn new(config: &RegistryConfig) -> Self {
        Self {
            registry: config.name.clone(),
            typing: config.channel_typing,
            receivers: HashMap::new(),
            handles: HashMap::new(),
            bindings: HashMap::new(),
            next_handle: SubscriptionId::from_raw(0),
        }
    }

    /// Check (and under exclusive typing, record) the payload type for `event`.
    fn bind(&mut self, event: &str, tag: TypeTag) -> EventterResult<()> {
        if self.typing == ChannelTyping::Shared {
            return Ok(());
        }
        match self.bindings.get(event) {
            Some(bound) if *bound != tag => Err(EventterError::type_mismatch(
                event,
                bound.type_name(),
                tag.type_name(),
            )),
            Some(_) => Ok(()),
            None => {
                self.bindings.insert(event.to_string(), tag);
                Ok(())
            }
        }
    }

    /// Drop the type binding once neither table has a bucket for `event`.
    fn release_if_unused(&mut self, event: &str) {
        if !self.receivers.contains_key(event) && !self.handles.contains_key(event) {
            self.bindings.remove(event);
        }
    }

    /// Returns the callback that was replaced, if any.
    fn insert_receiver(
        &mut self,
        event: &str,
        receiver: ReceiverId,
        callback: ErasedCallback,
    ) -> EventterResult<Option<ErasedCallback>> {
        self.bind(event, callback.tag())?;
        Ok(self
            .receivers
            .entry(event.to_string())
            .or_default()
            .insert(receiver, callback))
    }

    fn insert_handle(
        &mut self,
        event: &str,
        callback: ErasedCallback,
    ) -> EventterResult<SubscriptionId> {
        let id = self.next_handle;
        let next = id.successor().ok_or(EventterError::HandlesExhausted)?;
        self.bind(event, callback.tag())?;
        self.next_handle = next;
        self.handles
            .entry(event.to_string())
            .or_default()
            .insert(id, callback);
        Ok(id)
    }

    // Removal paths hand the removed callbacks back instead of dropping them:
    // a callback may own a guard whose drop needs to borrow these tables again.

    pub(crate) fn remove_receiver(
        &mut self,
        event: &str,
        receiver: ReceiverId,
    ) -> Option<ErasedCallback> {
        let bucket = self.receivers.get_mut(event)?;
        let removed = bucket.remove(&receiver);
        if bucket.is_empty() {
            self.receivers.remove(event);
            self.release_if_unused(event);
        }
        if removed.is_some() {
            debug!(registry = %self.registry, event, %receiver, "receiver unsubscribed");
        }
        removed
    }

    pub(crate) fn remove_handle(
        &mut self,
        event: &str,
        handle: SubscriptionId,
    ) -> Option<ErasedCallback> {
        let bucket = self.handles.get_mut(event)?;
        let removed = bucket.remove(&handle);
        if bucket.is_empty() {
            self.handles.remove(event);
            self.release_if_unused(event);
        }
        if removed.is_some() {
            debug!(registry = %self.registry, event, %handle, "handle unsubscribed");
        }
        removed
    }

    fn clear(&mut self) -> Vec<ErasedCallback> {
        self.bindings.clear();
        let receivers = std::mem::take(&mut self.receivers);
        let handles = std::mem::take(&mut self.handles);
        receivers
            .into_values()
            .flat_map(HashMap::into_values)
            .chain(handles.into_values().flat_map(BTreeMap::into_values))
            .collect()
    }

    fn prune_stale(&mut self) -> Vec<ErasedCallback> {
        let mut pruned = Vec::new();
        let mut emptied = Vec::new();

        for (event, bucket) in self.receivers.iter_mut() {
            let stale: Vec<ReceiverId> = bucket
                .iter()
                .filter(|(_, callback)| callback.is_stale())
                .map(|(receiver, _)| *receiver)
                .collect();
            pruned.extend(stale.iter().filter_map(|receiver| bucket.remove(receiver)));
            if bucket.is_empty() {
                emptied.push(event.clone());
            }
        }

        for event in emptied {
            self.receivers.remove(&event);
            self.release_if_unused(&event);
        }
        pruned
    }

    /// Callbacks registered under `event`, identity table first.
    fn snapshot(&self, event: &str) -> Vec<ErasedCallback> {
        let identity = self.receivers.get(event).into_iter().flat_map(|b| b.values());
        let anonymous = self.handles.get(event).into_iter().flat_map(|b| b.values());
        identity.chain(anonymous).cloned().collect()
    }

    fn count(&self, event: &str) -> usize {
        self.receivers.get(event).map_or(0, HashMap::len)
            + self.handles.get(event).map_or(0, BTreeMap::len)
    }
}

/// Event registry and dispatcher.
///
/// Every registry is an independent object; nothing is global, and several
/// registries can coexist without seeing each other's subscriptions.
///
/// ```ignore
/// let manager = EventManager::new();
///
/// let handle = manager.subscribe("Tick", |tick: &mut Tick| println!("{}", tick.0))?;
/// manager.subscribe_receiver("Tick", &clock, Clock::on_tick)?;
///
/// manager.notify("Tick", &mut Tick(1))?;   // both callbacks run
/// manager.unsubscribe("Tick", handle);
/// ```
#[derive(Debug)]
pub struct EventManager {
    id: RegistryId,
    config: RegistryConfig,
    tables: Rc<RefCell<Tables>>,
}

impl Default for EventManager {
    fn default() -> Self {
        Self::new()
    }
}

impl EventManager {
    pub fn new() -> Self {
        Self::with_config(RegistryConfig::default())
    }

    pub fn with_config(config: RegistryConfig) -> Self {
        let id = RegistryId::new();
        debug!(
            registry = %config.name,
            registry_id = %id,
            typing = ?config.channel_typing,
            "registry created"
        );
        Self {
            id,
            tables: Rc::new(RefCell::new(Tables::new(&config))),
            config,
        }
    }

    pub fn id(&self) -> RegistryId {
        self.id
    }

    pub fn config(&self) -> &RegistryConfig {
        &self.config
    }

    /// Subscribe a method of `receiver` to `event`.
    ///
    /// The registry keeps only a weak link to the receiver. Subscribing the same
    /// receiver to the same event again replaces the previous callback.
    pub fn subscribe_receiver<R, E, M>(
        &self,
        event: &str,
        receiver: &Rc<RefCell<R>>,
        method: M,
    ) -> EventterResult<()>
    where
        R: Receiver,
        E: Event,
        M: Fn(&mut R, &mut E) + 'static,
    {
        let receiver_id = ReceiverId::of(Rc::as_ptr(receiver));
        let callback = ErasedCallback::from_method(receiver, method);
        let replaced = self
            .tables
            .borrow_mut()
            .insert_receiver(event, receiver_id, callback)
            .inspect_err(|err| self.log_rejected(event, err))?;

        debug!(
            registry = %self.config.name,
            event,
            receiver = %receiver_id,
            replaced = replaced.is_some(),
            "receiver subscribed"
        );
        drop(replaced);
        Ok(())
    }

    /// Same as [`subscribe_receiver`](Self::subscribe_receiver), returning a guard
    /// that unsubscribes when dropped. Typically stored inside the receiver itself.
    pub fn subscribe_receiver_scoped<R, E, M>(
        &self,
        event: &str,
        receiver: &Rc<RefCell<R>>,
        method: M,
    ) -> EventterResult<ReceiverGuard>
    where
        R: Receiver,
        E: Event,
        M: Fn(&mut R, &mut E) + 'static,
    {
        self.subscribe_receiver(event, receiver, method)?;
        Ok(ReceiverGuard::new(
            self.downgrade(),
            event,
            ReceiverId::of(Rc::as_ptr(receiver)),
        ))
    }

    /// Subscribe an anonymous callback and return its handle.
    pub fn subscribe<E, F>(&self, event: &str, callback: F) -> EventterResult<SubscriptionId>
    where
        E: Event,
        F: Fn(&mut E) + 'static,
    {
        let handle = self
            .tables
            .borrow_mut()
            .insert_handle(event, ErasedCallback::from_fn(callback))
            .inspect_err(|err| self.log_rejected(event, err))?;

        debug!(registry = %self.config.name, event, %handle, "handle subscribed");
        Ok(handle)
    }

    /// Same as [`subscribe`](Self::subscribe), returning a guard that unsubscribes
    /// when dropped.
    pub fn subscribe_scoped<E, F>(
        &self,
        event: &str,
        callback: F,
    ) -> EventterResult<SubscriptionGuard>
    where
        E: Event,
        F: Fn(&mut E) + 'static,
    {
        let handle = self.subscribe(event, callback)?;
        Ok(SubscriptionGuard::new(self.downgrade(), event, handle))
    }

    /// Remove `receiver`'s subscription to `event`. No-op if there is none.
    pub fn unsubscribe_receiver<R: Receiver>(&self, event: &str, receiver: &Rc<RefCell<R>>) {
        self.unsubscribe_receiver_id(event, ReceiverId::of(Rc::as_ptr(receiver)));
    }

    /// Remove the subscription keyed by `receiver` under `event`. No-op if there is none.
    pub fn unsubscribe_receiver_id(&self, event: &str, receiver: ReceiverId) {
        let removed = self.tables.borrow_mut().remove_receiver(event, receiver);
        drop(removed);
    }

    /// Remove the handle-keyed subscription `handle` under `event`.
    ///
    /// No-op if the handle is unknown or was issued for a different event name.
    pub fn unsubscribe(&self, event: &str, handle: SubscriptionId) {
        let removed = self.tables.borrow_mut().remove_handle(event, handle);
        drop(removed);
    }

    /// Empty both tables. Handles issued so far are still never reissued.
    pub fn clear_subscriptions(&self) {
        let removed = self.tables.borrow_mut().clear();
        debug!(registry = %self.config.name, removed = removed.len(), "subscriptions cleared");
        drop(removed);
    }

    /// Drop identity-keyed subscriptions whose receiver no longer exists.
    pub fn prune_stale_receivers(&self) -> usize {
        let removed = self.tables.borrow_mut().prune_stale();
        let pruned = removed.len();
        drop(removed);
        if pruned > 0 {
            debug!(registry = %self.config.name, pruned, "stale receivers pruned");
        }
        pruned
    }

    /// Publish `event` to every callback registered under `name`.
    ///
    /// Returns the number of callbacks that ran. Publishing to a name without
    /// subscribers is not an error and returns `Ok(0)`.
    ///
    /// ## Errors
    ///
    /// - [`EventterError::TypeMismatch`] when exclusive typing is on and the payload
    ///   type differs from the one bound to `name`. Nothing runs in that case.
    /// - [`EventterError::ReceiverBusy`] when a nested dispatch reaches a receiver
    ///   that is still running. Callbacks after it in the snapshot do not run.
    ///
    /// Panics raised by callbacks are not caught.
    pub fn notify<E: Event>(&self, name: &str, event: &mut E) -> EventterResult<usize> {
        let found = TypeTag::of::<E>();

        let snapshot = {
            let tables = self.tables.borrow();
            if let Some(bound) = tables.bindings.get(name) {
                if *bound != found {
                    let err =
                        EventterError::type_mismatch(name, bound.type_name(), found.type_name());
                    self.log_rejected(name, &err);
                    return Err(err);
                }
            }
            tables.snapshot(name)
        };

        if snapshot.is_empty() {
            trace!(registry = %self.config.name, event = name, "no subscribers");
            return Ok(0);
        }

        let mut delivered = 0;
        for callback in &snapshot {
            if callback.tag() != found {
                trace!(
                    registry = %self.config.name,
                    event = name,
                    expected = %callback.tag(),
                    "skipping callback for another payload type"
                );
                continue;
            }
            match callback
                .invoke(name, event)
                .inspect_err(|err| self.log_rejected(name, err))?
            {
                Delivery::Delivered => delivered += 1,
                Delivery::Stale => {
                    trace!(registry = %self.config.name, event = name, "skipping dropped receiver")
                }
            }
        }

        debug!(registry = %self.config.name, event = name, delivered, "event dispatched");
        Ok(delivered)
    }

    /// Number of subscriptions under `event` across both tables.
    ///
    /// Identity-keyed entries whose receiver was dropped count until pruned.
    pub fn subscriber_count(&self, event: &str) -> usize {
        self.tables.borrow().count(event)
    }

    pub fn has_subscribers(&self, event: &str) -> bool {
        self.subscriber_count(event) > 0
    }

    pub fn is_empty(&self) -> bool {
        let tables = self.tables.borrow();
        tables.receivers.is_empty() && tables.handles.is_empty()
    }

    /// Event names with at least one subscription, sorted.
    pub fn event_names(&self) -> Vec<String> {
        let tables = self.tables.borrow();
        let names: BTreeSet<&String> =
            tables.receivers.keys().chain(tables.handles.keys()).collect();
        names.into_iter().cloned().collect()
    }

    fn downgrade(&self) -> Weak<RefCell<Tables>> {
        Rc::downgrade(&self.tables)
    }

    fn log_rejected(&self, event: &str, err: &EventterError) {
        warn!(registry = %self.config.name, event, error = %err, "event rejected");
    }
}
