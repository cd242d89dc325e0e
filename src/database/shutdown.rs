/// Stop signal shared by the accept loop and `Engine::stop`
use crossbeam::channel::{self, Receiver, Sender};
use parking_lot::Mutex;
use std::sync::atomic::{AtomicBool, Ordering};

/// One-shot signal. Triggering drops the only sender, so every clone of
/// `receiver()` becomes ready at once and stays ready.
pub struct StopSignal {
    triggered: AtomicBool,
    sender: Mutex<Option<Sender<()>>>,
    receiver: Receiver<()>,
}

impl StopSignal {
    pub fn new() -> Self {
        let (sender, receiver) = channel::bounded(0);
        Self {
            triggered: AtomicBool::new(false),
            sender: Mutex::new(Some(sender)),
            receiver,
        }
    }

    /// Fire the signal. Returns `true` only for the call that fired it.
    pub fn trigger(&self) -> bool {
        if self.triggered.swap(true, Ordering::AcqRel) {
            return false;
        }
        self.sender.lock().take();
        true
    }

    pub fn is_triggered(&self) -> bool {
        self.triggered.load(Ordering::Acquire)
    }

    /// Channel that disconnects when the signal fires; for `select!`.
    pub fn receiver(&self) -> Receiver<()> {
        self.receiver.clone()
    }
}

impl Default for StopSignal {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::thread;

    #[test]
    fn test_trigger_is_idempotent() {
        let signal = StopSignal::new();
        assert!(!signal.is_triggered());
        assert!(signal.trigger());
        assert!(!signal.trigger());
        assert!(signal.is_triggered());
    }

    #[test]
    fn test_receiver_wakes_waiters() {
        let signal = Arc::new(StopSignal::new());
        let waiters: Vec<_> = (0..3)
            .map(|_| {
                let receiver = signal.receiver();
                thread::spawn(move || receiver.recv().is_err())
            })
            .collect();

        signal.trigger();
        for waiter in waiters {
            assert!(waiter.join().unwrap());
        }
        // Still ready after the fact
        assert!(signal.receiver().recv().is_err());
    }
}
