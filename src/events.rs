//! Typed publish/subscribe hub shared by every game system.
//!
//! Systems never call each other back directly: they publish a [`GameEvent`]
//! and whoever cares subscribes to its [`EventKind`]. Delivery is synchronous,
//! in registration order, on the caller's thread.

use std::cell::{Cell, RefCell};
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::rc::{Rc, Weak};

use strum_macros::{Display, EnumDiscriminants};
use tracing::{debug, warn};

use crate::fever::FeverStats;
use crate::stats::SessionSummary;
use crate::tutorial::Phase;
use crate::types::{LetterPos, RewardTier, SessionMode, SolSource};

#[derive(Debug, Clone, PartialEq, EnumDiscriminants)]
#[strum_discriminants(name(EventKind), derive(Hash, Display))]
pub enum GameEvent {
    Keystroke {
        key: char,
        correct: bool,
        pos: LetterPos,
    },
    WordComplete {
        word_index: usize,
    },
    /// The word buffer grew or was replaced
    WordsChanged,
    SessionStarted {
        mode: SessionMode,
    },
    SessionEnded {
        summary: SessionSummary,
    },

    GoldenSpawned {
        pos: LetterPos,
        reward: RewardTier,
        fade_ms: u64,
    },
    GoldenCaptured {
        reward: RewardTier,
        pos: LetterPos,
    },
    GoldenExpired,

    GreenSpawned {
        pos: LetterPos,
    },
    GreenCaptured,
    GreenExpired,

    SolEarned {
        amount: u64,
        total: u64,
        source: SolSource,
    },

    PhaseChanged {
        from: Phase,
        to: Phase,
    },
    TutorialComplete,

    FeverStarted,
    FeverEnded {
        stats: FeverStats,
        wpm: u32,
        accuracy: u32,
    },
    ChainUpdated {
        current: u32,
        max: u32,
    },
}

impl GameEvent {
    pub fn kind(&self) -> EventKind {
        EventKind::from(self)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SubscriptionId(u64);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Filter {
    Kind(EventKind),
    Any,
}

impl Filter {
    fn matches(self, kind: EventKind) -> bool {
        match self {
            Filter::Kind(k) => k == kind,
            Filter::Any => true,
        }
    }
}

type Handler = Rc<dyn Fn(&GameEvent)>;

struct Entry {
    id: SubscriptionId,
    filter: Filter,
    handler: Handler,
    once: bool,
}

/// Handle returned by [`EventBus::subscribe`].
///
/// Dropping it does not unsubscribe; call [`Subscription::unsubscribe`].
#[derive(Debug, Clone)]
pub struct Subscription {
    id: SubscriptionId,
    bus: Weak<EventBus>,
}

impl Subscription {
    pub fn id(&self) -> SubscriptionId {
        self.id
    }

    /// Returns false if the subscription was already gone.
    pub fn unsubscribe(self) -> bool {
        match self.bus.upgrade() {
            Some(bus) => bus.unsubscribe(self.id),
            None => false,
        }
    }
}

#[derive(Default)]
pub struct EventBus {
    entries: RefCell<Vec<Entry>>,
    next_id: Cell<u64>,
    debug: Cell<bool>,
}

impl std::fmt::Debug for EventBus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EventBus")
            .field("subscriptions", &self.subscription_count())
            .field("debug", &self.debug.get())
            .finish()
    }
}

impl EventBus {
    pub fn new() -> Rc<Self> {
        Rc::new(Self::default())
    }

    /// Log every published event at debug level
    pub fn set_debug(&self, enabled: bool) {
        self.debug.set(enabled);
    }

    pub fn subscribe<F>(self: &Rc<Self>, kind: EventKind, handler: F) -> Subscription
    where
        F: Fn(&GameEvent) + 'static,
    {
        self.register(Filter::Kind(kind), Rc::new(handler), false)
    }

    /// The handler runs for the next matching event only.
    pub fn subscribe_once<F>(self: &Rc<Self>, kind: EventKind, handler: F) -> Subscription
    where
        F: Fn(&GameEvent) + 'static,
    {
        self.register(Filter::Kind(kind), Rc::new(handler), true)
    }

    /// Receives every event regardless of kind.
    pub fn subscribe_all<F>(self: &Rc<Self>, handler: F) -> Subscription
    where
        F: Fn(&GameEvent) + 'static,
    {
        self.register(Filter::Any, Rc::new(handler), false)
    }

    fn register(self: &Rc<Self>, filter: Filter, handler: Handler, once: bool) -> Subscription {
        let id = SubscriptionId(self.next_id.get());
        self.next_id.set(id.0 + 1);
        self.entries.borrow_mut().push(Entry {
            id,
            filter,
            handler,
            once,
        });
        Subscription {
            id,
            bus: Rc::downgrade(self),
        }
    }

    pub fn unsubscribe(&self, id: SubscriptionId) -> bool {
        let mut entries = self.entries.borrow_mut();
        match entries.iter().position(|e| e.id == id) {
            Some(index) => {
                entries.remove(index);
                true
            }
            None => false,
        }
    }

    /// Delivers `event` to every matching handler.
    ///
    /// Handlers see a snapshot taken before delivery starts, so they may
    /// subscribe, unsubscribe or publish from inside a handler. A panicking
    /// handler is logged and skipped; the remaining handlers still run.
    pub fn publish(&self, event: GameEvent) {
        let kind = event.kind();
        if self.debug.get() {
            debug!(target: "glint::events", %kind, ?event, "publish");
        }

        let targets: Vec<(SubscriptionId, Handler, bool)> = self
            .entries
            .borrow()
            .iter()
            .filter(|e| e.filter.matches(kind))
            .map(|e| (e.id, Rc::clone(&e.handler), e.once))
            .collect();

        for (id, handler, once) in targets {
            // One-shot entries leave the list before they run, so a nested
            // publish cannot fire them twice and a panic cannot keep them.
            if once && !self.unsubscribe(id) {
                continue;
            }
            if catch_unwind(AssertUnwindSafe(|| handler(&event))).is_err() {
                warn!(%kind, "event handler panicked, continuing delivery");
            }
        }
    }

    pub fn clear(&self) {
        self.entries.borrow_mut().clear();
    }

    pub fn subscription_count(&self) -> usize {
        self.entries.borrow().len()
    }
}

/// Collects every published event; handy for tests and headless runs.
#[derive(Debug, Clone, Default)]
pub struct EventLog {
    events: Rc<RefCell<Vec<GameEvent>>>,
}

impl EventLog {
    pub fn attach(bus: &Rc<EventBus>) -> Self {
        let log = Self::default();
        let sink = Rc::clone(&log.events);
        bus.subscribe_all(move |event| sink.borrow_mut().push(event.clone()));
        log
    }

    pub fn events(&self) -> Vec<GameEvent> {
        self.events.borrow().clone()
    }

    pub fn of_kind(&self, kind: EventKind) -> Vec<GameEvent> {
        self.events
            .borrow()
            .iter()
            .filter(|e| e.kind() == kind)
            .cloned()
            .collect()
    }

    pub fn count(&self, kind: EventKind) -> usize {
        self.events.borrow().iter().filter(|e| e.kind() == kind).count()
    }

    pub fn clear(&self) {
        self.events.borrow_mut().clear();
    }
}
