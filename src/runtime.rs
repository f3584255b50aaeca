use std::ops::ControlFlow;
use std::sync::mpsc::{self, Receiver, RecvTimeoutError};
use std::time::Duration;

use crossterm::event::{self, Event as CtEvent, KeyEvent};
use tracing::{trace, warn};

/// What the main loop reacts to: a key, a resize, or a timer tick
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum TermEvent {
    Key(KeyEvent),
    Resize,
    Tick,
}

/// Source of terminal input
pub trait EventSource: Send + 'static {
    /// Waits up to `timeout` for the next event.
    fn recv_timeout(&self, timeout: Duration) -> Result<TermEvent, RecvTimeoutError>;
}

/// Reads crossterm events on a background thread
pub struct CrosstermEventSource {
    rx: Receiver<TermEvent>,
}

impl CrosstermEventSource {
    pub fn new() -> Self {
        let (tx, rx) = mpsc::channel();

        std::thread::spawn(move || loop {
            let forwarded = match event::read() {
                Ok(CtEvent::Key(key)) => tx.send(TermEvent::Key(key)),
                Ok(CtEvent::Resize(_, _)) => tx.send(TermEvent::Resize),
                Ok(_) => Ok(()),
                Err(e) => {
                    warn!(error = %e, "terminal input closed");
                    break;
                }
            };
            if forwarded.is_err() {
                break;
            }
        });

        Self { rx }
    }
}

impl Default for CrosstermEventSource {
    fn default() -> Self {
        Self::new()
    }
}

impl EventSource for CrosstermEventSource {
    fn recv_timeout(&self, timeout: Duration) -> Result<TermEvent, RecvTimeoutError> {
        self.rx.recv_timeout(timeout)
    }
}

/// Events fed through a channel; scripted sessions and tests use this.
pub struct ChannelEventSource {
    rx: Receiver<TermEvent>,
}

impl ChannelEventSource {
    pub fn new(rx: Receiver<TermEvent>) -> Self {
        Self { rx }
    }
}

impl EventSource for ChannelEventSource {
    fn recv_timeout(&self, timeout: Duration) -> Result<TermEvent, RecvTimeoutError> {
        self.rx.recv_timeout(timeout)
    }
}

pub trait Ticker: Send + Sync + 'static {
    fn interval(&self) -> Duration;
}

#[derive(Clone, Copy, Debug)]
pub struct FixedTicker {
    interval: Duration,
}

impl FixedTicker {
    pub fn new(interval: Duration) -> Self {
        Self { interval }
    }

    pub fn from_millis(ms: u64) -> Self {
        Self::new(Duration::from_millis(ms))
    }
}

impl Ticker for FixedTicker {
    fn interval(&self) -> Duration {
        self.interval
    }
}

/// Turns input plus a fixed tick into one stream of [`TermEvent`]s.
pub struct Runner<E: EventSource, T: Ticker> {
    event_source: E,
    ticker: T,
}

impl<E: EventSource, T: Ticker> Runner<E, T> {
    pub fn new(event_source: E, ticker: T) -> Self {
        Self {
            event_source,
            ticker,
        }
    }

    /// Blocks up to one tick interval. A quiet or closed source yields `Tick`,
    /// so letter timers keep running while the player is idle.
    pub fn step(&self) -> TermEvent {
        match self.event_source.recv_timeout(self.ticker.interval()) {
            Ok(ev) => ev,
            Err(RecvTimeoutError::Timeout) | Err(RecvTimeoutError::Disconnected) => TermEvent::Tick,
        }
    }

    /// Feeds events to `handle` until it breaks.
    pub fn run<B>(&self, mut handle: impl FnMut(TermEvent) -> ControlFlow<B>) -> B {
        loop {
            let ev = self.step();
            trace!(?ev, "runner step");
            if let ControlFlow::Break(out) = handle(ev) {
                return out;
            }
        }
    }
}
