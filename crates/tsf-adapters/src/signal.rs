//! ---
//! tsf_section: "01-core-functionality"
//! tsf_subsection: "module"
//! tsf_type: "source"
//! tsf_scope: "code"
//! tsf_description: "Adapter lifecycle, filtering and composite collections."
//! tsf_version: "v0.0.0-prealpha"
//! tsf_owner: "tbd"
//! ---
//! Wait signals shared between adapters.
use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};

use parking_lot::{Condvar, Mutex, RwLock};
use tracing::trace;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ManualState {
    Reset,
    Set,
    Closed,
}

/// Signal that stays set until explicitly reset. Closing it releases every
/// waiter and makes later waits fail immediately.
#[derive(Debug)]
pub struct ManualResetEvent {
    state: Mutex<ManualState>,
    cond: Condvar,
}

impl ManualResetEvent {
    /// Create a signal in the given state.
    pub fn new(initially_set: bool) -> Self {
        Self {
            state: Mutex::new(if initially_set {
                ManualState::Set
            } else {
                ManualState::Reset
            }),
            cond: Condvar::new(),
        }
    }

    /// Set the signal and wake all waiters.
    pub fn set(&self) {
        let mut state = self.state.lock();
        if *state != ManualState::Closed {
            *state = ManualState::Set;
            self.cond.notify_all();
        }
    }

    /// Return the signal to the unset state.
    pub fn reset(&self) {
        let mut state = self.state.lock();
        if *state != ManualState::Closed {
            *state = ManualState::Reset;
        }
    }

    /// Whether the signal is currently set.
    pub fn is_set(&self) -> bool {
        *self.state.lock() == ManualState::Set
    }

    /// Permanently release the signal.
    pub fn close(&self) {
        *self.state.lock() = ManualState::Closed;
        self.cond.notify_all();
    }

    /// Block until set or `timeout` elapses; `true` when the signal was set.
    pub fn wait(&self, timeout: Duration) -> bool {
        let deadline = Instant::now() + timeout;
        let mut state = self.state.lock();
        loop {
            match *state {
                ManualState::Set => return true,
                ManualState::Closed => return false,
                ManualState::Reset => {
                    if self.cond.wait_until(&mut state, deadline).timed_out() {
                        return *state == ManualState::Set;
                    }
                }
            }
        }
    }
}

/// Signal that releases exactly one waiter per `set`, then resets itself.
#[derive(Debug, Default)]
pub struct AutoResetEvent {
    signaled: Mutex<bool>,
    cond: Condvar,
}

impl AutoResetEvent {
    /// Create an unset signal.
    pub fn new() -> Self {
        Self::default()
    }

    /// Post the signal, releasing one current or future waiter.
    pub fn set(&self) {
        let mut signaled = self.signaled.lock();
        *signaled = true;
        self.cond.notify_one();
    }

    /// Discard a posted signal.
    pub fn reset(&self) {
        *self.signaled.lock() = false;
    }

    /// Consume a posted signal, waiting up to `timeout` for one.
    pub fn wait(&self, timeout: Duration) -> bool {
        let deadline = Instant::now() + timeout;
        let mut signaled = self.signaled.lock();
        while !*signaled {
            if self.cond.wait_until(&mut signaled, deadline).timed_out() {
                break;
            }
        }
        std::mem::replace(&mut *signaled, false)
    }
}

/// Wait for every handle within one shared deadline.
pub fn wait_all(handles: &[Arc<AutoResetEvent>], timeout: Duration) -> bool {
    let deadline = Instant::now() + timeout;
    handles.iter().all(|handle| {
        let remaining = deadline.saturating_duration_since(Instant::now());
        handle.wait(remaining)
    })
}

/// Process-wide named auto-reset signals, keyed case-insensitively.
///
/// The registry is owned by the session and handed to every collection so
/// adapters of different roles can block on each other.
#[derive(Debug, Default)]
pub struct SignalRegistry {
    signals: RwLock<HashMap<String, Arc<AutoResetEvent>>>,
}

impl SignalRegistry {
    /// Empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Resolve `name`, creating the signal on first reference.
    pub fn get_or_create(&self, name: &str) -> Arc<AutoResetEvent> {
        let key = name.trim().to_lowercase();
        if let Some(existing) = self.signals.read().get(&key) {
            return existing.clone();
        }
        let mut signals = self.signals.write();
        signals
            .entry(key)
            .or_insert_with(|| {
                trace!(signal = %name, "creating external wait signal");
                Arc::new(AutoResetEvent::new())
            })
            .clone()
    }

    /// Resolve `name` without creating it.
    pub fn get(&self, name: &str) -> Option<Arc<AutoResetEvent>> {
        self.signals.read().get(&name.trim().to_lowercase()).cloned()
    }

    /// Post the named signal, creating it if needed.
    pub fn signal(&self, name: &str) {
        self.get_or_create(name).set();
    }

    /// Number of registered signals.
    pub fn len(&self) -> usize {
        self.signals.read().len()
    }

    /// Whether no signal has been referenced yet.
    pub fn is_empty(&self) -> bool {
        self.signals.read().is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::thread;

    #[test]
    fn manual_reset_stays_set_until_reset() {
        let event = ManualResetEvent::new(false);
        assert!(!event.wait(Duration::from_millis(10)));
        event.set();
        assert!(event.wait(Duration::from_millis(10)));
        assert!(event.wait(Duration::ZERO));
        event.reset();
        assert!(!event.is_set());
    }

    #[test]
    fn manual_reset_wakes_waiting_thread() {
        let event = Arc::new(ManualResetEvent::new(false));
        let waiter = {
            let event = event.clone();
            thread::spawn(move || event.wait(Duration::from_secs(5)))
        };
        thread::sleep(Duration::from_millis(20));
        event.set();
        assert!(waiter.join().unwrap());
    }

    #[test]
    fn closed_signal_fails_waits() {
        let event = ManualResetEvent::new(true);
        event.close();
        assert!(!event.wait(Duration::from_millis(10)));
        event.set();
        assert!(!event.is_set());
    }

    #[test]
    fn auto_reset_consumes_posted_signal() {
        let event = AutoResetEvent::new();
        event.set();
        assert!(event.wait(Duration::ZERO));
        assert!(!event.wait(Duration::from_millis(10)));
    }

    #[test]
    fn registry_is_case_insensitive() {
        let registry = SignalRegistry::new();
        let a = registry.get_or_create("FrameReady");
        let b = registry.get_or_create("frameready");
        assert!(Arc::ptr_eq(&a, &b));
        assert_eq!(registry.len(), 1);
        registry.signal("FRAMEREADY");
        assert!(a.wait(Duration::ZERO));
    }

    #[test]
    fn wait_all_requires_every_handle() {
        let registry = SignalRegistry::new();
        let handles = vec![registry.get_or_create("a"), registry.get_or_create("b")];
        registry.signal("a");
        assert!(!wait_all(&handles, Duration::from_millis(20)));
        registry.signal("a");
        registry.signal("b");
        assert!(wait_all(&handles, Duration::from_millis(20)));
    }
}
