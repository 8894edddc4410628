//! Publish/subscribe plumbing between the engine and its UI consumers.
//!
//! One primitive, [`Registry`], keyed by a closed enumeration. The [`Bus`]
//! configures it twice: payload-free topics that tell panels to re-read
//! engine state, and named canvas events that carry a payload to every
//! renderer listening for that name. Dispatch is synchronous and in
//! subscription order; nothing is queued or replayed.

use std::cell::{Cell, RefCell};
use std::rc::{Rc, Weak};

use tracing::trace;

use crate::world::Location;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Topic {
    CanvasInteraction,
    GameChanged,
    RoundChanged,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EventName {
    Render,
    RenderMap,
    RenderStack,
    TileClick,
    RightClick,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CanvasEvent {
    /// Repaint agents and layers of the current round.
    Render,
    /// Repaint the whole map, terrain included.
    RenderMap,
    /// Repaint only the listed stacks.
    RenderStack { cells: Vec<Location> },
    TileClick(Location),
    RightClick(Location),
}

impl CanvasEvent {
    pub fn name(&self) -> EventName {
        match self {
            CanvasEvent::Render => EventName::Render,
            CanvasEvent::RenderMap => EventName::RenderMap,
            CanvasEvent::RenderStack { .. } => EventName::RenderStack,
            CanvasEvent::TileClick(_) => EventName::TileClick,
            CanvasEvent::RightClick(_) => EventName::RightClick,
        }
    }
}

type Callback<P> = Rc<RefCell<dyn FnMut(&P)>>;

struct Entry<K, P> {
    id: u64,
    key: K,
    active: Rc<Cell<bool>>,
    callback: Callback<P>,
}

struct Listeners<K, P> {
    next_id: u64,
    entries: Vec<Entry<K, P>>,
}

trait Detach {
    fn detach(&self, id: u64);
}

impl<K, P> Detach for RefCell<Listeners<K, P>> {
    fn detach(&self, id: u64) {
        self.borrow_mut().entries.retain(|entry| entry.id != id);
    }
}

/// Handle returned by `subscribe`. Dropping it keeps the listener attached.
pub struct Subscription {
    id: u64,
    active: Rc<Cell<bool>>,
    registry: Weak<dyn Detach>,
}

impl Subscription {
    /// Removes this registration; calling it again does nothing.
    pub fn unsubscribe(&self) {
        if !self.active.replace(false) {
            return;
        }
        if let Some(registry) = self.registry.upgrade() {
            registry.detach(self.id);
        }
    }

    pub fn is_active(&self) -> bool {
        self.active.get()
    }
}

pub struct Registry<K, P> {
    inner: Rc<RefCell<Listeners<K, P>>>,
}

impl<K, P> Clone for Registry<K, P> {
    fn clone(&self) -> Self {
        Self {
            inner: Rc::clone(&self.inner),
        }
    }
}

impl<K: Copy + Eq + 'static, P: 'static> Default for Registry<K, P> {
    fn default() -> Self {
        Self::new()
    }
}

impl<K: Copy + Eq + 'static, P: 'static> Registry<K, P> {
    pub fn new() -> Self {
        Self {
            inner: Rc::new(RefCell::new(Listeners {
                next_id: 0,
                entries: Vec::new(),
            })),
        }
    }

    pub fn subscribe(&self, key: K, callback: impl FnMut(&P) + 'static) -> Subscription {
        let active = Rc::new(Cell::new(true));
        let callback: Callback<P> = Rc::new(RefCell::new(callback));
        let id = {
            let mut inner = self.inner.borrow_mut();
            let id = inner.next_id;
            inner.next_id += 1;
            inner.entries.push(Entry {
                id,
                key,
                active: Rc::clone(&active),
                callback,
            });
            id
        };
        let registry: Weak<dyn Detach> = Rc::downgrade(&self.inner) as Weak<dyn Detach>;
        Subscription {
            id,
            active,
            registry,
        }
    }

    /// Delivers `payload` to the listeners registered for `key` at the time
    /// of the call and returns how many were invoked.
    pub fn publish(&self, key: K, payload: &P) -> usize {
        let listeners: Vec<(Rc<Cell<bool>>, Callback<P>)> = self
            .inner
            .borrow()
            .entries
            .iter()
            .filter(|entry| entry.key == key)
            .map(|entry| (Rc::clone(&entry.active), Rc::clone(&entry.callback)))
            .collect();

        let mut delivered = 0;
        for (active, callback) in listeners {
            if !active.get() {
                continue;
            }
            match callback.try_borrow_mut() {
                Ok(mut guard) => {
                    (&mut *guard)(payload);
                    delivered += 1;
                }
                // A listener that re-publishes its own key does not recurse into itself.
                Err(_) => trace!("skipping listener already running"),
            }
        }
        delivered
    }

    pub fn listener_count(&self, key: K) -> usize {
        self.inner
            .borrow()
            .entries
            .iter()
            .filter(|entry| entry.key == key)
            .count()
    }
}

/// Cloning a bus shares its listeners.
#[derive(Clone, Default)]
pub struct Bus {
    topics: Registry<Topic, ()>,
    events: Registry<EventName, CanvasEvent>,
}

impl Bus {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn subscribe(&self, topic: Topic, mut callback: impl FnMut() + 'static) -> Subscription {
        self.topics.subscribe(topic, move |_| callback())
    }

    pub fn notify(&self, topic: Topic) -> usize {
        self.topics.publish(topic, &())
    }

    pub fn listen(
        &self,
        name: EventName,
        callback: impl FnMut(&CanvasEvent) + 'static,
    ) -> Subscription {
        self.events.subscribe(name, callback)
    }

    pub fn dispatch(&self, event: CanvasEvent) -> usize {
        self.events.publish(event.name(), &event)
    }

    pub fn topic_listeners(&self, topic: Topic) -> usize {
        self.topics.listener_count(topic)
    }

    pub fn event_listeners(&self, name: EventName) -> usize {
        self.events.listener_count(name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn callbacks_run_in_subscription_order() {
        let bus = Bus::new();
        let log = Rc::new(RefCell::new(Vec::new()));
        for label in ["first", "second", "third"] {
            let log = Rc::clone(&log);
            bus.subscribe(Topic::RoundChanged, move || log.borrow_mut().push(label));
        }
        assert_eq!(bus.notify(Topic::RoundChanged), 3);
        assert_eq!(*log.borrow(), vec!["first", "second", "third"]);
        assert_eq!(bus.notify(Topic::GameChanged), 0);
    }

    #[test]
    fn unsubscribe_removes_one_registration_and_is_idempotent() {
        let bus = Bus::new();
        let hits = Rc::new(Cell::new(0));
        let first = {
            let hits = Rc::clone(&hits);
            bus.subscribe(Topic::CanvasInteraction, move || hits.set(hits.get() + 1))
        };
        let _second = {
            let hits = Rc::clone(&hits);
            bus.subscribe(Topic::CanvasInteraction, move || hits.set(hits.get() + 10))
        };

        first.unsubscribe();
        first.unsubscribe();
        assert!(!first.is_active());
        assert_eq!(bus.topic_listeners(Topic::CanvasInteraction), 1);

        bus.notify(Topic::CanvasInteraction);
        assert_eq!(hits.get(), 10);
    }

    #[test]
    fn late_listeners_miss_earlier_dispatches() {
        let bus = Bus::new();
        let seen = Rc::new(RefCell::new(Vec::new()));
        bus.dispatch(CanvasEvent::TileClick(Location::new(1, 1)));
        {
            let seen = Rc::clone(&seen);
            bus.listen(EventName::TileClick, move |event| {
                seen.borrow_mut().push(event.clone())
            });
        }
        bus.dispatch(CanvasEvent::TileClick(Location::new(2, 3)));
        bus.dispatch(CanvasEvent::RightClick(Location::new(0, 0)));
        assert_eq!(
            *seen.borrow(),
            vec![CanvasEvent::TileClick(Location::new(2, 3))]
        );
    }

    #[test]
    fn listener_subscribed_during_dispatch_waits_for_next_one() {
        let bus = Bus::new();
        let late_hits = Rc::new(Cell::new(0));
        {
            let bus_inner = bus.clone();
            let late_hits = Rc::clone(&late_hits);
            bus.subscribe(Topic::GameChanged, move || {
                let late_hits = Rc::clone(&late_hits);
                bus_inner.subscribe(Topic::GameChanged, move || {
                    late_hits.set(late_hits.get() + 1)
                });
            });
        }
        bus.notify(Topic::GameChanged);
        assert_eq!(late_hits.get(), 0);
        bus.notify(Topic::GameChanged);
        assert_eq!(late_hits.get(), 1);
    }

    #[test]
    fn listener_removed_mid_dispatch_is_skipped() {
        let bus = Bus::new();
        let hits = Rc::new(Cell::new(0));
        let victim: Rc<RefCell<Option<Subscription>>> = Rc::new(RefCell::new(None));
        {
            let victim = Rc::clone(&victim);
            bus.listen(EventName::Render, move |_| {
                if let Some(subscription) = victim.borrow().as_ref() {
                    subscription.unsubscribe();
                }
            });
        }
        let subscription = {
            let hits = Rc::clone(&hits);
            bus.listen(EventName::Render, move |_| hits.set(hits.get() + 1))
        };
        *victim.borrow_mut() = Some(subscription);

        assert_eq!(bus.dispatch(CanvasEvent::Render), 1);
        assert_eq!(hits.get(), 0);
    }
}
