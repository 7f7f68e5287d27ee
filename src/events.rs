//! Observer registry and dispatch.
//!
//! Observers register under a dotted-name pattern: a full event name
//! (`"notice.group.decrease"`) or any dot-prefix of one (`"notice"`,
//! `"notice.group"`). Dispatch of one event is synchronous and preserves
//! registration order; a failing observer never blocks the ones behind
//! it, its error goes to the fault sink (`log::error!`).

use crate::types::events::EventData;
use log::error;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};

pub type Handler = Arc<dyn Fn(&EventData) -> anyhow::Result<()> + Send + Sync>;

/// Opaque handle returned by `on`/`once`, consumed by `off`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ListenerId(u64);

struct Registration {
    id: u64,
    pattern: String,
    once: bool,
    handler: Handler,
}

#[derive(Default)]
pub struct EventHub {
    registry: Mutex<Vec<Registration>>,
    next_id: AtomicU64,
}

impl EventHub {
    pub fn new() -> Self {
        Self::default()
    }

    fn registry(&self) -> MutexGuard<'_, Vec<Registration>> {
        match self.registry.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        }
    }

    fn register(&self, pattern: &str, once: bool, handler: Handler) -> ListenerId {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        self.registry().push(Registration {
            id,
            pattern: pattern.to_string(),
            once,
            handler,
        });
        ListenerId(id)
    }

    /// Registers a persistent observer.
    pub fn on(&self, pattern: &str, handler: Handler) -> ListenerId {
        self.register(pattern, false, handler)
    }

    /// Registers an observer that fires for at most one matching event.
    pub fn once(&self, pattern: &str, handler: Handler) -> ListenerId {
        self.register(pattern, true, handler)
    }

    /// Removes a registration. Returns false when the id was already gone
    /// (fired once, or removed earlier).
    pub fn off(&self, id: ListenerId) -> bool {
        let mut registry = self.registry();
        let before = registry.len();
        registry.retain(|r| r.id != id.0);
        registry.len() != before
    }

    pub fn listener_count(&self) -> usize {
        self.registry().len()
    }

    fn matches(pattern: &str, name: &str) -> bool {
        pattern.is_empty()
            || name == pattern
            || (name.len() > pattern.len()
                && name.starts_with(pattern)
                && name.as_bytes()[pattern.len()] == b'.')
    }

    /// Delivers one event to every matching observer, in registration
    /// order. Fire-once registrations are retired before their handler
    /// runs, so a handler re-dispatching the same event cannot fire them
    /// twice.
    pub fn dispatch(&self, event: &EventData) {
        let handlers: Vec<(u64, Handler)> = {
            let mut registry = self.registry();
            let matched: Vec<(u64, Handler)> = registry
                .iter()
                .filter(|r| Self::matches(&r.pattern, &event.name))
                .map(|r| (r.id, r.handler.clone()))
                .collect();
            registry.retain(|r| !(r.once && Self::matches(&r.pattern, &event.name)));
            matched
        };

        for (id, handler) in handlers {
            if let Err(e) = (*handler)(event) {
                error!(
                    target: "Client/Event",
                    "Observer {id} failed while handling '{}': {e:#}",
                    event.name
                );
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::events::{EventKind, SystemEvent};

    fn event(name_kind: EventKind) -> EventData {
        EventData::new(1, 0, name_kind)
    }

    fn online() -> EventData {
        event(EventKind::System(SystemEvent::Online))
    }

    #[test]
    fn prefix_matching_follows_dot_boundaries() {
        assert!(EventHub::matches("system", "system.online"));
        assert!(EventHub::matches("system.online", "system.online"));
        assert!(EventHub::matches("", "system.online"));
        assert!(!EventHub::matches("sys", "system.online"));
        assert!(!EventHub::matches("system.onl", "system.online"));
        assert!(!EventHub::matches("system.online.x", "system.online"));
    }

    #[test]
    fn dispatch_preserves_registration_order() {
        let hub = EventHub::new();
        let order = Arc::new(Mutex::new(Vec::new()));

        for tag in ["first", "second", "third"] {
            let order = order.clone();
            hub.on(
                "system",
                Arc::new(move |_| {
                    order.lock().unwrap().push(tag);
                    Ok(())
                }),
            );
        }

        hub.dispatch(&online());
        assert_eq!(*order.lock().unwrap(), vec!["first", "second", "third"]);
    }

    #[test]
    fn once_fires_exactly_once() {
        let hub = EventHub::new();
        let hits = Arc::new(AtomicU64::new(0));
        let counter = hits.clone();
        hub.once(
            "system.online",
            Arc::new(move |_| {
                counter.fetch_add(1, Ordering::SeqCst);
                Ok(())
            }),
        );

        hub.dispatch(&online());
        hub.dispatch(&online());
        assert_eq!(hits.load(Ordering::SeqCst), 1);
        assert_eq!(hub.listener_count(), 0);
    }

    #[test]
    fn off_deregisters() {
        let hub = EventHub::new();
        let hits = Arc::new(AtomicU64::new(0));
        let counter = hits.clone();
        let id = hub.on(
            "system",
            Arc::new(move |_| {
                counter.fetch_add(1, Ordering::SeqCst);
                Ok(())
            }),
        );

        assert!(hub.off(id));
        assert!(!hub.off(id));
        hub.dispatch(&online());
        assert_eq!(hits.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn erring_observer_does_not_block_later_ones() {
        let hub = EventHub::new();
        let hits = Arc::new(AtomicU64::new(0));

        hub.on("system", Arc::new(|_| anyhow::bail!("observer exploded")));
        let counter = hits.clone();
        hub.on(
            "system",
            Arc::new(move |_| {
                counter.fetch_add(1, Ordering::SeqCst);
                Ok(())
            }),
        );

        hub.dispatch(&online());
        assert_eq!(hits.load(Ordering::SeqCst), 1);
    }
}
