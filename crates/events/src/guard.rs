//! RAII subscriptions.
//!
//! A guard ends its subscription when dropped, which ties the subscription to
//! the lifetime of whoever owns the guard (usually the receiver itself). Guards
//! hold only a weak link to the registry state: dropping one after its registry
//! is gone does nothing.

use std::cell::RefCell;
use std::rc::Weak;

use tracing::warn;

use eventter_core::{ReceiverId, SubscriptionId};

use crate::registry::Tables;

/// Owns a handle-keyed subscription; unsubscribes on drop.
#[must_use = "dropping the guard unsubscribes immediately"]
#[derive(Debug)]
pub struct SubscriptionGuard {
    tables: Weak<RefCell<Tables>>,
    event: String,
    handle: Option<SubscriptionId>,
}

impl SubscriptionGuard {
    pub(crate) fn new(tables: Weak<RefCell<Tables>>, event: &str, handle: SubscriptionId) -> Self {
        Self {
            tables,
            event: event.to_string(),
            handle: Some(handle),
        }
    }

    pub fn event(&self) -> &str {
        &self.event
    }

    pub fn id(&self) -> Option<SubscriptionId> {
        self.handle
    }

    /// Give up the guard without unsubscribing and return the raw handle.
    pub fn into_id(mut self) -> Option<SubscriptionId> {
        self.handle.take()
    }
}

impl Drop for SubscriptionGuard {
    fn drop(&mut self) {
        let Some(handle) = self.handle.take() else {
            return;
        };
        let Some(tables) = self.tables.upgrade() else {
            return;
        };
        // Bound first so the callback is dropped after the borrow ends.
        let removed = match tables.try_borrow_mut() {
            Ok(mut tables) => tables.remove_handle(&self.event, handle),
            Err(_) => {
                warn!(event = %self.event, %handle, "registry busy; subscription left in place");
                None
            }
        };
        drop(removed);
    }
}

/// Owns an identity-keyed subscription; unsubscribes on drop.
#[must_use = "dropping the guard unsubscribes immediately"]
#[derive(Debug)]
pub struct ReceiverGuard {
    tables: Weak<RefCell<Tables>>,
    event: String,
    receiver: Option<ReceiverId>,
}

impl ReceiverGuard {
    pub(crate) fn new(tables: Weak<RefCell<Tables>>, event: &str, receiver: ReceiverId) -> Self {
        Self {
            tables,
            event: event.to_string(),
            receiver: Some(receiver),
        }
    }

    pub fn event(&self) -> &str {
        &self.event
    }

    pub fn receiver(&self) -> Option<ReceiverId> {
        self.receiver
    }

    /// Give up the guard without unsubscribing.
    pub fn release(mut self) -> Option<ReceiverId> {
        self.receiver.take()
    }
}

impl Drop for ReceiverGuard {
    fn drop(&mut self) {
        let Some(receiver) = self.receiver.take() else {
            return;
        };
        let Some(tables) = self.tables.upgrade() else {
            return;
        };
        // Bound first so the callback is dropped after the borrow ends.
        let removed = match tables.try_borrow_mut() {
            Ok(mut tables) => tables.remove_receiver(&self.event, receiver),
            Err(_) => {
                warn!(event = %self.event, %receiver, "registry busy; subscription left in place");
                None
            }
        };
        drop(removed);
    }
}

#[cfg(test)]
mod tests {
    use std::cell::{Cell, RefCell};
    use std::rc::Rc;

    use eventter_core::{Event, Receiver};

    use crate::{EventManager, ReceiverGuard, SubscriptionGuard};

    struct Tick;
    impl Event for Tick {}

    struct Tock;
    impl Event for Tock {}

    struct Label;
    impl Event for Label {}

    /// A receiver that keeps its own subscription alive.
    struct Panel {
        redraws: usize,
        subscription: Option<ReceiverGuard>,
    }
    impl Receiver for Panel {}

    impl Panel {
        fn on_tick(&mut self, _: &mut Tick) {
            self.redraws += 1;
        }
    }

    struct Window {
        redraws: usize,
    }
    impl Receiver for Window {}

    impl Window {
        fn on_tick(&mut self, _: &mut Tick) {
            self.redraws += 1;
        }
    }

    #[test]
    fn dropping_the_guard_unsubscribes() {
        let manager = EventManager::new();
        let hits = Rc::new(Cell::new(0));
        let sink = hits.clone();

        let guard = manager
            .subscribe_scoped("Tick", move |_: &mut Tick| sink.set(sink.get() + 1))
            .unwrap();
        assert_eq!(guard.event(), "Tick");
        manager.notify("Tick", &mut Tick).unwrap();

        drop(guard);
        manager.notify("Tick", &mut Tick).unwrap();

        assert_eq!(hits.get(), 1);
        assert!(manager.is_empty());
    }

    #[test]
    fn released_guard_keeps_the_subscription() {
        let manager = EventManager::new();
        let guard = manager.subscribe_scoped("Tick", |_: &mut Tick| {}).unwrap();
        let handle = guard.into_id().unwrap();

        assert!(manager.has_subscribers("Tick"));
        manager.unsubscribe("Tick", handle);
        assert!(!manager.has_subscribers("Tick"));
    }

    #[test]
    fn receiver_guard_ends_with_its_owner() {
        let manager = EventManager::new();
        let window = Rc::new(RefCell::new(Window { redraws: 0 }));
        let guard = manager
            .subscribe_receiver_scoped("Tick", &window, Window::on_tick)
            .unwrap();

        assert_eq!(manager.notify("Tick", &mut Tick).unwrap(), 1);
        drop(guard);
        assert_eq!(manager.notify("Tick", &mut Tick).unwrap(), 0);
        assert_eq!(window.borrow().redraws, 1);
    }

    #[test]
    fn guard_outliving_registry_is_harmless() {
        let manager = EventManager::new();
        let guard = manager.subscribe_scoped("Tick", |_: &mut Tick| {}).unwrap();
        drop(manager);
        drop(guard);
    }

    #[test]
    fn guard_captured_by_removed_callback_unsubscribes() {
        let manager = EventManager::new();
        let inner: SubscriptionGuard =
            manager.subscribe_scoped("Tock", |_: &mut Tock| {}).unwrap();
        let outer = manager
            .subscribe("Tick", move |_: &mut Tick| {
                let _ = inner.id();
            })
            .unwrap();

        manager.unsubscribe("Tick", outer);

        assert_eq!(manager.subscriber_count("Tock"), 0);
        assert!(manager.is_empty());
        // the old payload binding for "Tock" is released too
        assert!(manager.subscribe("Tock", |_: &mut Label| {}).is_ok());
    }

    #[test]
    fn receiver_owning_its_guard_is_released_with_its_last_owner() {
        let manager = EventManager::new();
        let panel = Rc::new(RefCell::new(Panel {
            redraws: 0,
            subscription: None,
        }));
        let guard = manager
            .subscribe_receiver_scoped("Tick", &panel, Panel::on_tick)
            .unwrap();
        panel.borrow_mut().subscription = Some(guard);

        // the last strong reference to the panel lives in a handle callback
        let owner = manager
            .subscribe("Tock", move |_: &mut Tock| {
                let _ = panel.borrow().redraws;
            })
            .unwrap();

        assert_eq!(manager.notify("Tick", &mut Tick).unwrap(), 1);
        manager.unsubscribe("Tock", owner);

        assert_eq!(manager.subscriber_count("Tick"), 0);
        assert!(manager.is_empty());
    }

    #[test]
    fn clearing_drops_captured_guards_cleanly() {
        let manager = EventManager::new();
        let inner = manager.subscribe_scoped("Tock", |_: &mut Tock| {}).unwrap();
        manager
            .subscribe("Tick", move |_: &mut Tick| {
                let _ = inner.event();
            })
            .unwrap();

        manager.clear_subscriptions();
        assert!(manager.is_empty());

        manager.subscribe("Tock", |_: &mut Label| {}).unwrap();
        assert!(manager.has_subscribers("Tock"));
    }

    #[test]
    fn replacing_a_receiver_callback_drops_captured_guards() {
        let manager = EventManager::new();
        let panel = Rc::new(RefCell::new(Panel {
            redraws: 0,
            subscription: None,
        }));
        let inner = manager.subscribe_scoped("Tock", |_: &mut Tock| {}).unwrap();
        manager
            .subscribe_receiver("Tick", &panel, move |panel: &mut Panel, tick: &mut Tick| {
                let _ = inner.id();
                panel.on_tick(tick);
            })
            .unwrap();

        manager.subscribe_receiver("Tick", &panel, Panel::on_tick).unwrap();

        assert_eq!(manager.subscriber_count("Tock"), 0);
        assert_eq!(manager.subscriber_count("Tick"), 1);
    }
}
