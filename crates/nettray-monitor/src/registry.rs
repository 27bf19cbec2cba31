use std::{
    fmt,
    sync::{Arc, Mutex, MutexGuard, PoisonError},
};

use nettray_types::events::StatusEvent;
use uuid::Uuid;

pub type StatusHandler = Arc<dyn Fn(&StatusEvent) + Send + Sync>;

/// Handle returned by [`SubscriberRegistry::subscribe`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SubscriptionId(Uuid);

impl fmt::Display for SubscriptionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

/// Observers of status events, kept in registration order.
#[derive(Default)]
pub struct SubscriberRegistry {
    handlers: Mutex<Vec<(SubscriptionId, StatusHandler)>>,
}

impl SubscriberRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn subscribe<F>(&self, handler: F) -> SubscriptionId
    where
        F: Fn(&StatusEvent) + Send + Sync + 'static,
    {
        let id = SubscriptionId(Uuid::new_v4());
        self.lock().push((id, Arc::new(handler)));
        id
    }

    /// Returns `false` when `id` was not (or no longer) registered.
    pub fn unsubscribe(&self, id: SubscriptionId) -> bool {
        let mut handlers = self.lock();
        let before = handlers.len();
        handlers.retain(|(existing, _)| *existing != id);
        handlers.len() != before
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Calls every handler synchronously, in registration order.
    ///
    /// The list is copied first so a handler may subscribe or unsubscribe
    /// without deadlocking; such changes apply from the next emission.
    pub fn emit(&self, event: &StatusEvent) {
        let handlers: Vec<StatusHandler> = self
            .lock()
            .iter()
            .map(|(_, handler)| Arc::clone(handler))
            .collect();
        for handler in handlers {
            handler(event);
        }
    }

    fn lock(&self) -> MutexGuard<'_, Vec<(SubscriptionId, StatusHandler)>> {
        self.handlers.lock().unwrap_or_else(PoisonError::into_inner)
    }
}
