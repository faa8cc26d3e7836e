use std::fmt;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use parking_lot::RwLock;

/// Observer invoked with one human-readable message per channel event.
pub type ObserverCallback =
    Arc<dyn Fn(String) -> Pin<Box<dyn Future<Output = ()> + Send>> + Send + Sync>;

/// Wrap an async closure as an [`ObserverCallback`].
pub fn observer<F, Fut>(callback: F) -> ObserverCallback
where
    F: Fn(String) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = ()> + Send + 'static,
{
    Arc::new(move |message| -> Pin<Box<dyn Future<Output = ()> + Send>> {
        Box::pin(callback(message))
    })
}

/// Wrap a synchronous closure as an [`ObserverCallback`].
pub fn observer_fn<F>(callback: F) -> ObserverCallback
where
    F: Fn(String) + Send + Sync + 'static,
{
    Arc::new(move |message| -> Pin<Box<dyn Future<Output = ()> + Send>> {
        callback(message);
        Box::pin(async {})
    })
}

/// Handle returned by [`ObserverRegistry::add`], used to unregister.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ObserverId(u64);

/// Ordered list of observers.
///
/// Delivery walks a snapshot of the list taken when the event arrives and
/// awaits each observer before moving to the next, so a slow observer delays
/// the ones registered after it. Observers may add or remove entries while
/// being notified; the change applies from the next event.
#[derive(Default)]
pub struct ObserverRegistry {
    next_id: AtomicU64,
    observers: RwLock<Vec<(ObserverId, ObserverCallback)>>,
}

impl ObserverRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&self, callback: ObserverCallback) -> ObserverId {
        let id = ObserverId(self.next_id.fetch_add(1, Ordering::Relaxed));
        self.observers.write().push((id, callback));
        id
    }

    /// Returns `false` if the id was not registered.
    pub fn remove(&self, id: ObserverId) -> bool {
        let mut observers = self.observers.write();
        let before = observers.len();
        observers.retain(|(existing, _)| *existing != id);
        observers.len() != before
    }

    pub fn clear(&self) {
        self.observers.write().clear();
    }

    pub fn len(&self) -> usize {
        self.observers.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.observers.read().is_empty()
    }

    pub async fn notify(&self, message: String) {
        let snapshot: Vec<ObserverCallback> = self
            .observers
            .read()
            .iter()
            .map(|(_, callback)| callback.clone())
            .collect();

        for callback in snapshot {
            callback(message.clone()).await;
        }
    }
}

impl fmt::Debug for ObserverRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ObserverRegistry")
            .field("observers", &self.len())
            .finish()
    }
}
