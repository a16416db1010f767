use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use tokio::sync::watch;

/// Observable value backed by a `watch` channel
///
/// `set` reports whether the value actually changed; subscribers are only
/// woken on real changes.
pub struct Observable<T> {
    tx: watch::Sender<T>,
}

impl<T: Clone + PartialEq> Observable<T> {
    pub fn new(initial: T) -> Self {
        let (tx, _rx) = watch::channel(initial);
        Self { tx }
    }

    pub fn get(&self) -> T {
        self.tx.borrow().clone()
    }

    /// Replaces the value, returns true if it differed from the old one
    pub fn set(&self, value: T) -> bool {
        self.tx.send_if_modified(|current| {
            if *current == value {
                false
            } else {
                *current = value;
                true
            }
        })
    }

    /// Mutates in place; `modify` returns whether it changed anything
    pub fn update(&self, modify: impl FnOnce(&mut T) -> bool) -> bool {
        self.tx.send_if_modified(modify)
    }

    pub fn subscribe(&self) -> watch::Receiver<T> {
        self.tx.subscribe()
    }
}

impl<T: Clone + PartialEq + Default> Default for Observable<T> {
    fn default() -> Self {
        Self::new(T::default())
    }
}

/// Guards one command against re-entrant invocation
#[derive(Clone)]
pub struct BusyFlag {
    busy: Arc<AtomicBool>,
    observable: Arc<Observable<bool>>,
}

impl Default for BusyFlag {
    fn default() -> Self {
        Self {
            busy: Arc::new(AtomicBool::new(false)),
            observable: Arc::new(Observable::new(false)),
        }
    }
}

impl BusyFlag {
    /// Marks the command busy. Returns `None` when it already is.
    pub fn try_acquire(&self) -> Option<BusyGuard> {
        if self
            .busy
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_err()
        {
            return None;
        }
        self.observable.set(true);
        Some(BusyGuard { flag: self.clone() })
    }

    pub fn is_busy(&self) -> bool {
        self.busy.load(Ordering::Acquire)
    }

    pub fn subscribe(&self) -> watch::Receiver<bool> {
        self.observable.subscribe()
    }
}

/// Clears its flag when dropped, on success, error or unwinding alike
pub struct BusyGuard {
    flag: BusyFlag,
}

impl Drop for BusyGuard {
    fn drop(&mut self) {
        self.flag.busy.store(false, Ordering::Release);
        self.flag.observable.set(false);
    }
}

/// Monotonic load counter; results of superseded loads are discarded
#[derive(Debug, Default)]
pub struct Generation(AtomicU64);

impl Generation {
    /// Starts a new load and returns its ticket
    pub fn next(&self) -> u64 {
        self.0.fetch_add(1, Ordering::AcqRel) + 1
    }

    /// Ticket of the latest load, without starting a new one
    pub fn current(&self) -> u64 {
        self.0.load(Ordering::Acquire)
    }

    pub fn is_current(&self, ticket: u64) -> bool {
        self.0.load(Ordering::Acquire) == ticket
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn set_reports_changes_only() {
        let value = Observable::new(1);
        let mut rx = value.subscribe();
        assert!(!value.set(1));
        assert!(!rx.has_changed().unwrap());
        assert!(value.set(2));
        assert!(rx.has_changed().unwrap());
        assert_eq!(*rx.borrow_and_update(), 2);
    }

    #[test]
    fn busy_flag_rejects_reentry_and_resets_on_drop() {
        let flag = BusyFlag::default();
        let guard = flag.try_acquire().unwrap();
        assert!(flag.is_busy());
        assert!(flag.try_acquire().is_none());
        drop(guard);
        assert!(!flag.is_busy());
        assert!(!*flag.subscribe().borrow());
    }

    #[test]
    fn busy_flag_resets_after_panic() {
        let flag = BusyFlag::default();
        let inner = flag.clone();
        let result = std::panic::catch_unwind(std::panic::AssertUnwindSafe(move || {
            let _guard = inner.try_acquire().unwrap();
            panic!("load failed");
        }));
        assert!(result.is_err());
        assert!(!flag.is_busy());
    }

    #[test]
    fn only_latest_generation_is_current() {
        let generation = Generation::default();
        let first = generation.next();
        let second = generation.next();
        assert!(!generation.is_current(first));
        assert!(generation.is_current(second));
        assert_eq!(generation.current(), second);
    }
}
