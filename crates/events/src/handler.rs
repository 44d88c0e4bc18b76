//! Type-erased callbacks.
//!
//! Both subscription tables store callbacks for arbitrarily many payload types in
//! one uniform map. An [`ErasedCallback`] wraps the user's typed callable in an
//! adapter that takes `&mut dyn Any`, and remembers the [`TypeTag`] of the payload
//! it was built for. Invocation is always checked: a payload of any other type is
//! reported as [`EventterError::TypeMismatch`] and the user callable never runs.

use core::any::{Any, type_name};
use core::cell::RefCell;
use core::fmt;
use std::rc::{Rc, Weak};

use eventter_core::{Event, EventterError, EventterResult, Receiver, ReceiverId, TypeTag};

/// Outcome of invoking one stored callback.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum Delivery {
    /// The user callable ran.
    Delivered,
    /// The receiver behind an identity-keyed callback has been dropped.
    Stale,
}

type Thunk = dyn Fn(&str, &mut dyn Any) -> EventterResult<Delivery>;

/// A stored callable that accepts an opaque payload and downcasts it to the type
/// its subscriber asked for.
///
/// Cloning is cheap (shared `Rc`), which is what lets `notify` snapshot a bucket
/// before running any callback.
#[derive(Clone)]
pub struct ErasedCallback {
    tag: TypeTag,
    thunk: Rc<Thunk>,
    /// Weak link to the receiver, for identity-keyed callbacks only.
    receiver: Option<Weak<dyn Any>>,
}

impl ErasedCallback {
    /// Wrap an anonymous callback.
    pub fn from_fn<E, F>(callback: F) -> Self
    where
        E: Event,
        F: Fn(&mut E) + 'static,
    {
        let thunk = move |event_name: &str, event: &mut dyn Any| -> EventterResult<Delivery> {
            let event = downcast::<E>(event_name, event)?;
            callback(event);
            Ok(Delivery::Delivered)
        };

        Self {
            tag: TypeTag::of::<E>(),
            thunk: Rc::new(thunk),
            receiver: None,
        }
    }

    /// Bind `method` to a receiver without taking ownership of it.
    ///
    /// The receiver is mutably borrowed for the duration of the call. If it is
    /// already borrowed (a nested notify reached it again) the call fails with
    /// [`EventterError::ReceiverBusy`]. Once the receiver is dropped the callback
    /// reports [`Delivery::Stale`] instead of running.
    pub fn from_method<R, E, M>(receiver: &Rc<RefCell<R>>, method: M) -> Self
    where
        R: Receiver,
        E: Event,
        M: Fn(&mut R, &mut E) + 'static,
    {
        let id = ReceiverId::of(Rc::as_ptr(receiver));
        let weak = Rc::downgrade(receiver);
        let liveness: Weak<dyn Any> = weak.clone();

        let thunk = move |event_name: &str, event: &mut dyn Any| -> EventterResult<Delivery> {
            let Some(receiver) = weak.upgrade() else {
                return Ok(Delivery::Stale);
            };
            let mut receiver = receiver
                .try_borrow_mut()
                .map_err(|_| EventterError::receiver_busy(event_name, id))?;
            let event = downcast::<E>(event_name, event)?;
            method(&mut *receiver, event);
            Ok(Delivery::Delivered)
        };

        Self {
            tag: TypeTag::of::<E>(),
            thunk: Rc::new(thunk),
            receiver: Some(liveness),
        }
    }

    /// Payload type this callback was registered for.
    pub fn tag(&self) -> TypeTag {
        self.tag
    }

    /// True once the receiver of an identity-keyed callback has been dropped.
    pub fn is_stale(&self) -> bool {
        self.receiver
            .as_ref()
            .is_some_and(|receiver| receiver.strong_count() == 0)
    }

    /// Invoke the callback with a typed payload.
    pub fn invoke<E: Event>(&self, event_name: &str, event: &mut E) -> EventterResult<Delivery> {
        let found = TypeTag::of::<E>();
        if found != self.tag {
            return Err(EventterError::type_mismatch(
                event_name,
                self.tag.type_name(),
                found.type_name(),
            ));
        }
        let event: &mut dyn Any = event;
        (self.thunk)(event_name, event)
    }
}

impl fmt::Debug for ErasedCallback {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ErasedCallback")
            .field("tag", &self.tag)
            .field("bound_to_receiver", &self.receiver.is_some())
            .finish()
    }
}

fn downcast<'a, E: Event>(event_name: &str, event: &'a mut dyn Any) -> EventterResult<&'a mut E> {
    // `invoke` has already compared tags; this only guards direct thunk misuse.
    event
        .downcast_mut::<E>()
        .ok_or_else(|| EventterError::type_mismatch(event_name, type_name::<E>(), "<erased>"))
}
