use std::sync::mpsc::{self, RecvTimeoutError, Sender};
use std::thread;
use std::time::Duration;

use crate::runtime::FlinchEvent;

/// One-shot timer that delivers the cue for a round.
///
/// At most one cue is pending. Arming again cancels the previous one, and
/// dropping the timer cancels whatever is still pending.
#[derive(Debug, Default)]
pub struct CueTimer {
    cancel: Option<Sender<()>>,
    generation: Option<u64>,
}

impl CueTimer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn arm(&mut self, delay: Duration, generation: u64, events: Sender<FlinchEvent>) {
        self.cancel();
        let (cancel_tx, cancel_rx) = mpsc::channel::<()>();

        thread::spawn(move || {
            // a message or a dropped sender both mean the cue was cancelled
            if let Err(RecvTimeoutError::Timeout) = cancel_rx.recv_timeout(delay) {
                let _ = events.send(FlinchEvent::Cue(generation));
            }
        });

        self.cancel = Some(cancel_tx);
        self.generation = Some(generation);
    }

    pub fn cancel(&mut self) {
        self.generation = None;
        if let Some(tx) = self.cancel.take() {
            let _ = tx.send(());
        }
    }

    pub fn is_armed(&self) -> bool {
        self.cancel.is_some()
    }

    /// Round the pending cue belongs to
    pub fn generation(&self) -> Option<u64> {
        self.generation
    }

    /// Forget the pending handle once its cue has been delivered.
    /// A cue from any other round leaves the pending one armed.
    pub fn fired(&mut self, generation: u64) {
        if self.generation == Some(generation) {
            self.cancel = None;
            self.generation = None;
        }
    }
}

impl Drop for CueTimer {
    fn drop(&mut self) {
        self.cancel();
    }
}
