use std::rc::Rc;

use tracing::{debug, warn};

use crate::events::{EventBus, GameEvent};
use crate::storage::{GardenState, GardenStore};
use crate::types::{RewardTier, SolSource};

pub const BASE_WORD_SOL: u64 = 1;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct SolState {
    pub session_sol: u64,
    pub lifetime_sol: u64,
}

/// Sol only ever goes up, and only through [`SolLedger::credit`].
pub struct SolLedger {
    bus: Rc<EventBus>,
    store: Rc<dyn GardenStore>,
    state: SolState,
}

impl std::fmt::Debug for SolLedger {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SolLedger")
            .field("state", &self.state)
            .finish_non_exhaustive()
    }
}

impl SolLedger {
    pub fn new(bus: Rc<EventBus>, store: Rc<dyn GardenStore>) -> Self {
        Self {
            bus,
            store,
            state: SolState::default(),
        }
    }

    /// Seeds the lifetime total from a stored baseline.
    pub fn init(&mut self, lifetime_baseline: u64) {
        self.state.lifetime_sol = lifetime_baseline;
    }

    pub fn state(&self) -> SolState {
        self.state
    }

    pub fn session_sol(&self) -> u64 {
        self.state.session_sol
    }

    pub fn lifetime_sol(&self) -> u64 {
        self.state.lifetime_sol
    }

    /// Adds to both totals, persists the lifetime figure and announces it.
    /// Returns the new session total.
    pub fn credit(&mut self, amount: u64, source: SolSource) -> u64 {
        self.state.session_sol += amount;
        self.state.lifetime_sol += amount;

        let SolState {
            session_sol,
            lifetime_sol,
        } = self.state;
        let persisted = self.store.update(&|g| GardenState {
            session_sol,
            lifetime_sol,
            ..g
        });
        if let Err(e) = persisted {
            warn!(error = %e, "failed to persist sol");
        }

        debug!(amount, %source, session_sol, lifetime_sol, "sol earned");
        self.bus.publish(GameEvent::SolEarned {
            amount,
            total: session_sol,
            source,
        });
        session_sol
    }

    pub fn earn_base(&mut self) -> u64 {
        self.credit(BASE_WORD_SOL, SolSource::Base)
    }

    pub fn earn_golden(&mut self, reward: RewardTier) -> u64 {
        self.credit(reward.value(), SolSource::Golden)
    }

    pub fn earn_bonus(&mut self, amount: u64) -> u64 {
        self.credit(amount, SolSource::Bonus)
    }

    /// Starts a fresh run; the lifetime total is untouched.
    pub fn reset_session(&mut self) {
        self.state.session_sol = 0;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::events::{EventKind, EventLog};
    use crate::storage::MemoryGardenStore;
    use assert_matches::assert_matches;

    fn ledger() -> (SolLedger, MemoryGardenStore, EventLog) {
        let bus = EventBus::new();
        let log = EventLog::attach(&bus);
        let store = MemoryGardenStore::new();
        (SolLedger::new(bus, Rc::new(store.clone())), store, log)
    }

    #[test]
    fn credit_updates_both_totals_and_persists() {
        let (mut sol, store, log) = ledger();
        sol.init(100);
        assert_eq!(sol.earn_golden(RewardTier::Three), 3);
        assert_eq!(sol.earn_base(), 4);
        assert_eq!(sol.lifetime_sol(), 104);
        assert_eq!(store.load().map(|g| g.lifetime_sol), Some(104));
        assert_matches!(
            log.of_kind(EventKind::SolEarned)[..],
            [
                GameEvent::SolEarned {
                    amount: 3,
                    total: 3,
                    source: SolSource::Golden
                },
                GameEvent::SolEarned {
                    amount: 1,
                    total: 4,
                    source: SolSource::Base
                }
            ]
        );
    }

    #[test]
    fn every_credit_publishes_even_zero() {
        let (mut sol, _store, log) = ledger();
        sol.earn_bonus(0);
        assert_eq!(log.count(EventKind::SolEarned), 1);
    }

    #[test]
    fn reset_session_keeps_lifetime() {
        let (mut sol, _store, _log) = ledger();
        sol.earn_bonus(5);
        sol.reset_session();
        assert_eq!(
            sol.state(),
            SolState {
                session_sol: 0,
                lifetime_sol: 5
            }
        );
    }

    #[test]
    fn persisting_keeps_other_garden_fields() {
        let (mut sol, store, _log) = ledger();
        store
            .save(&GardenState {
                tutorial_complete: true,
                ..GardenState::default()
            })
            .unwrap();
        sol.earn_base();
        let g = store.load().unwrap();
        assert!(g.tutorial_complete);
        assert_eq!(g.lifetime_sol, 1);
    }
}
