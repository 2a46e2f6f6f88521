//! A pause gate.  While the gate is closed, workers that reach it
//! block until someone reopens it (handing over an optional reason
//! code) or the job is aborted.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Condvar, Mutex, MutexGuard};

#[derive(Debug, Default)]
struct GateState {
    paused: bool,
    reason: Option<u32>,
}

/// Suspends workers between units of work.
#[derive(Debug, Default)]
pub struct Gate {
    state: Mutex<GateState>,
    wakeup: Condvar,
}

impl Gate {
    /// An open gate.
    pub fn new() -> Gate {
        Gate::default()
    }

    fn lock(&self) -> MutexGuard<GateState> {
        self.state.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Closes the gate.
    pub fn pause(&self) {
        let mut state = self.lock();
        state.paused = true;
        state.reason = None;
    }

    /// Reopens the gate, waking everyone blocked on it.
    pub fn resume(&self, reason: Option<u32>) {
        let mut state = self.lock();
        state.paused = false;
        state.reason = reason;
        self.wakeup.notify_all();
    }

    /// Wakes blocked waiters so they can notice an abort.
    pub fn release(&self) {
        let _state = self.lock();
        self.wakeup.notify_all();
    }

    /// True while the gate is closed.
    pub fn is_paused(&self) -> bool {
        self.lock().paused
    }

    /// Blocks while the gate is closed and `abort` is clear.  Returns
    /// the resume reason when the caller actually had to wait.
    pub fn wait(&self, abort: &AtomicBool) -> Option<u32> {
        let mut state = self.lock();
        if !state.paused {
            return None;
        }
        while state.paused && !abort.load(Ordering::SeqCst) {
            state = self.wakeup.wait(state).unwrap_or_else(|e| e.into_inner());
        }
        if state.paused {
            None
        } else {
            state.reason
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::thread;
    use std::time::Duration;

    #[test]
    fn open_gate_does_not_block() {
        let gate = Gate::new();
        assert_eq!(gate.wait(&AtomicBool::new(false)), None);
    }

    #[test]
    fn resume_delivers_reason() {
        let gate = Arc::new(Gate::new());
        let abort = Arc::new(AtomicBool::new(false));
        gate.pause();
        assert!(gate.is_paused());

        let waiter = {
            let (gate, abort) = (gate.clone(), abort.clone());
            thread::spawn(move || gate.wait(&abort))
        };
        thread::sleep(Duration::from_millis(20));
        gate.resume(Some(7));
        assert_eq!(waiter.join().unwrap(), Some(7));
        assert!(!gate.is_paused());
    }

    #[test]
    fn abort_releases_paused_waiters() {
        let gate = Arc::new(Gate::new());
        let abort = Arc::new(AtomicBool::new(false));
        gate.pause();

        let waiter = {
            let (gate, abort) = (gate.clone(), abort.clone());
            thread::spawn(move || gate.wait(&abort))
        };
        thread::sleep(Duration::from_millis(20));
        abort.store(true, Ordering::SeqCst);
        gate.release();
        assert_eq!(waiter.join().unwrap(), None);
        assert!(gate.is_paused());
    }
}
