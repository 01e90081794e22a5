//! DTMF detection events and observer fan-out

use std::fmt;
use std::sync::{Arc, Mutex};

/// A single detected DTMF digit.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DtmfEvent {
    tone: char,
}

impl DtmfEvent {
    pub fn new(tone: char) -> Self {
        Self { tone }
    }

    /// The detected symbol, one of `0-9`, `A-D`, `*`, `#`.
    pub fn tone(&self) -> char {
        self.tone
    }
}

impl fmt::Display for DtmfEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.tone)
    }
}

/// Event sink for detected digits.
///
/// Implementations are invoked synchronously from the media thread driving
/// [`DtmfDetector::detect`](crate::DtmfDetector::detect), so callbacks must
/// be cheap; hand off to a channel or queue for anything heavier.
pub trait DtmfEventObserver: Send + Sync {
    fn on_dtmf_event(&self, event: DtmfEvent);
}

/// Shared registry of event observers.
///
/// Clones are handles onto the same underlying set, so registration and
/// removal may run on a different thread than the one driving detection.
/// Notification snapshots the set under the lock and invokes observers
/// outside it: a callback may re-enter `observe`/`forget` without
/// deadlocking, and management calls never see a torn list.
///
/// Registration is list-append: registering the same observer twice yields
/// two callbacks per digit, and each `forget` removes one registration.
#[derive(Clone, Default)]
pub struct ObserverSet {
    observers: Arc<Mutex<Vec<Arc<dyn DtmfEventObserver>>>>,
}

impl ObserverSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn observe(&self, observer: Arc<dyn DtmfEventObserver>) {
        self.lock().push(observer);
    }

    pub fn forget(&self, observer: &Arc<dyn DtmfEventObserver>) {
        let mut observers = self.lock();
        if let Some(idx) = observers.iter().position(|o| Arc::ptr_eq(o, observer)) {
            observers.remove(idx);
        }
    }

    pub fn clear_all(&self) {
        self.lock().clear();
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }

    pub fn notify(&self, event: DtmfEvent) {
        let snapshot: Vec<Arc<dyn DtmfEventObserver>> = self.lock().clone();
        for observer in snapshot {
            observer.on_dtmf_event(event);
        }
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Vec<Arc<dyn DtmfEventObserver>>> {
        // A panicking observer must not wedge the registry.
        self.observers
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

impl fmt::Debug for ObserverSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ObserverSet")
            .field("len", &self.len())
            .finish()
    }
}
