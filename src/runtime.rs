use std::sync::mpsc::{self, Receiver, RecvTimeoutError, Sender};
use std::time::Duration;

use crossterm::event::{self, Event as CtEvent, KeyEvent};

/// Unified event type consumed by the app runner
#[derive(Clone, Debug)]
pub enum FlinchEvent {
    Key(KeyEvent),
    Resize,
    Tick,
    /// The cue timer for the given round fired
    Cue(u64),
}

/// Source of terminal and timer events
pub trait FlinchEventSource: Send + 'static {
    /// Block for up to `timeout` waiting for an event.
    /// Returns Ok(event) if an event arrives before the timeout, or Err(Timeout) if it expires.
    fn recv_timeout(&self, timeout: Duration) -> Result<FlinchEvent, RecvTimeoutError>;

    /// Handle for timers that feed events back into this source
    fn sender(&self) -> Sender<FlinchEvent>;
}

/// Production event source using crossterm
pub struct CrosstermEventSource {
    tx: Sender<FlinchEvent>,
    rx: Receiver<FlinchEvent>,
}

impl CrosstermEventSource {
    pub fn new() -> Self {
        let (tx, rx) = mpsc::channel();
        let input_tx = tx.clone();

        std::thread::spawn(move || loop {
            let evt = match event::read() {
                Ok(CtEvent::Key(key)) => FlinchEvent::Key(key),
                Ok(CtEvent::Resize(_, _)) => FlinchEvent::Resize,
                Ok(_) => continue,
                Err(e) => {
                    log::error!("terminal input closed: {}", e);
                    break;
                }
            };
            if input_tx.send(evt).is_err() {
                break;
            }
        });

        Self { tx, rx }
    }
}

impl Default for CrosstermEventSource {
    fn default() -> Self {
        Self::new()
    }
}

impl FlinchEventSource for CrosstermEventSource {
    fn recv_timeout(&self, timeout: Duration) -> Result<FlinchEvent, RecvTimeoutError> {
        self.rx.recv_timeout(timeout)
    }

    fn sender(&self) -> Sender<FlinchEvent> {
        self.tx.clone()
    }
}

/// Configurable ticker interface
pub trait Ticker: Send + Sync + 'static {
    fn interval(&self) -> Duration;
}

/// Fixed interval ticker
#[derive(Clone, Copy, Debug)]
pub struct FixedTicker {
    interval: Duration,
}

impl FixedTicker {
    pub fn new(interval: Duration) -> Self {
        Self { interval }
    }
}

impl Ticker for FixedTicker {
    fn interval(&self) -> Duration {
        self.interval
    }
}

/// Test event source for unit tests
pub struct TestEventSource {
    tx: Sender<FlinchEvent>,
    rx: Receiver<FlinchEvent>,
}

impl TestEventSource {
    pub fn new() -> Self {
        let (tx, rx) = mpsc::channel();
        Self { tx, rx }
    }
}

impl Default for TestEventSource {
    fn default() -> Self {
        Self::new()
    }
}

impl FlinchEventSource for TestEventSource {
    fn recv_timeout(&self, timeout: Duration) -> Result<FlinchEvent, RecvTimeoutError> {
        self.rx.recv_timeout(timeout)
    }

    fn sender(&self) -> Sender<FlinchEvent> {
        self.tx.clone()
    }
}

/// Runner that advances the application one event/tick at a time
pub struct Runner<E: FlinchEventSource, T: Ticker> {
    event_source: E,
    ticker: T,
}

impl<E: FlinchEventSource, T: Ticker> Runner<E, T> {
    pub fn new(event_source: E, ticker: T) -> Self {
        Self {
            event_source,
            ticker,
        }
    }

    pub fn sender(&self) -> Sender<FlinchEvent> {
        self.event_source.sender()
    }

    /// Blocks up to tick interval and returns the next event, or Tick on timeout
    pub fn step(&self) -> FlinchEvent {
        match self.event_source.recv_timeout(self.ticker.interval()) {
            Ok(ev) => ev,
            Err(RecvTimeoutError::Timeout) | Err(RecvTimeoutError::Disconnected) => FlinchEvent::Tick,
        }
    }
}
