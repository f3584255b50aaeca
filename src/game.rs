//! Wires the systems together and reacts to what they publish.
//!
//! Handlers on the bus cannot borrow the game, so the game subscribes a plain
//! queue and drains it after every key and every tick.

use std::cell::RefCell;
use std::collections::VecDeque;
use std::rc::Rc;

use chrono::Utc;
use crossterm::event::{KeyCode, KeyEvent, KeyEventKind};
use rand::rngs::StdRng;
use rand::SeedableRng;
use tracing::{debug, info, warn};

use crate::config::Config;
use crate::engine::TypingEngine;
use crate::events::{EventBus, GameEvent, Subscription};
use crate::fever::{FeverSummary, FeverTracker};
use crate::golden::{GoldenConfig, GoldenSystem};
use crate::green::{GreenConfig, GreenSystem};
use crate::input::InputSystem;
use crate::ledger::SolLedger;
use crate::scheduler::Clock;
use crate::session::SessionOptions;
use crate::stats::{RunResult, SessionSummary};
use crate::storage::{GardenState, GardenStore, FINAL_TUTORIAL_BEAT};
use crate::tutorial::{Phase, PhaseConfig, TutorialMachine};
use crate::upgrades::{self, Upgrade, UpgradeEffects};
use crate::words::{WordSource, WordSupply};

/// Fever bonus is the rush's best chain divided by this
pub const FEVER_BONUS_DIVISOR: u32 = 10;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Screen {
    Typing,
    /// Fever recap at the end of the walkthrough
    TutorialStats,
    /// Results of a finished run, with an upgrade offer while the story lasts
    RunSummary,
}

pub struct Game {
    bus: Rc<EventBus>,
    clock: Rc<dyn Clock>,
    store: Rc<dyn GardenStore>,
    config: Config,
    engine: TypingEngine,
    tutorial: TutorialMachine,
    ledger: SolLedger,
    input: InputSystem,
    garden: GardenState,
    inbox: Rc<RefCell<VecDeque<GameEvent>>>,
    inbox_sub: Option<Subscription>,
    screen: Screen,
    rush_active: bool,
    last_run: Option<RunResult>,
    last_fever: Option<FeverSummary>,
}

impl std::fmt::Debug for Game {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Game")
            .field("screen", &self.screen)
            .field("phase", &self.tutorial.phase())
            .field("engine", &self.engine)
            .field("ledger", &self.ledger)
            .field("rush_active", &self.rush_active)
            .finish_non_exhaustive()
    }
}

impl Game {
    pub fn new(
        config: Config,
        store: Rc<dyn GardenStore>,
        clock: Rc<dyn Clock>,
        supply: Box<dyn WordSupply>,
        seed: u64,
    ) -> Self {
        let bus = EventBus::new();
        let inbox = Rc::new(RefCell::new(VecDeque::new()));
        let sink = Rc::clone(&inbox);
        let inbox_sub = bus.subscribe_all(move |event| sink.borrow_mut().push_back(event.clone()));

        let engine = TypingEngine::new(
            Rc::clone(&bus),
            Rc::clone(&clock),
            GoldenSystem::new(Rc::clone(&bus), StdRng::seed_from_u64(seed)),
            GreenSystem::new(Rc::clone(&bus), StdRng::seed_from_u64(seed.wrapping_add(1))),
            FeverTracker::new(Rc::clone(&bus)),
            supply,
        );

        let garden = store.load().unwrap_or_default();
        let mut ledger = SolLedger::new(Rc::clone(&bus), Rc::clone(&store));
        ledger.init(garden.lifetime_sol);

        Self {
            tutorial: TutorialMachine::new(Rc::clone(&bus)),
            bus,
            clock,
            store,
            config,
            engine,
            ledger,
            input: InputSystem::new(),
            garden,
            inbox,
            inbox_sub: Some(inbox_sub),
            screen: Screen::Typing,
            rush_active: false,
            last_run: None,
            last_fever: None,
        }
    }

    pub fn bus(&self) -> &Rc<EventBus> {
        &self.bus
    }

    pub fn engine(&self) -> &TypingEngine {
        &self.engine
    }

    pub fn tutorial(&self) -> &TutorialMachine {
        &self.tutorial
    }

    pub fn ledger(&self) -> &SolLedger {
        &self.ledger
    }

    pub fn garden(&self) -> &GardenState {
        &self.garden
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn screen(&self) -> Screen {
        self.screen
    }

    pub fn input(&self) -> &InputSystem {
        &self.input
    }

    pub fn last_run(&self) -> Option<&RunResult> {
        self.last_run.as_ref()
    }

    pub fn last_fever(&self) -> Option<&FeverSummary> {
        self.last_fever.as_ref()
    }

    pub fn rush_active(&self) -> bool {
        self.rush_active
    }

    pub fn effects(&self) -> UpgradeEffects {
        UpgradeEffects::from_active(&self.garden.active_upgrades)
    }

    pub fn sol_bar_visible(&self) -> bool {
        !self.tutorial.is_active() || self.tutorial.config().sol_bar_visible
    }

    pub fn now_ms(&self) -> u64 {
        self.clock.now_ms()
    }

    /// Upgrades on offer on the run summary screen, if the story is not over
    pub fn upgrade_offer(&self) -> Vec<&'static Upgrade> {
        if self.screen != Screen::RunSummary || self.garden.tutorial_beat >= FINAL_TUTORIAL_BEAT {
            return Vec::new();
        }
        upgrades::by_tier(self.garden.tutorial_beat + 1)
    }

    /// Opens the walkthrough for new players, otherwise a normal run.
    pub fn begin(&mut self, skip_tutorial: bool) {
        if self.garden.tutorial_complete || skip_tutorial {
            self.start_run();
        } else {
            let now = self.clock.now_ms();
            self.tutorial.start(self.engine.fever_mut(), now);
        }
        self.process_events();
    }

    pub fn handle_key(&mut self, key: KeyEvent) {
        if key.kind == KeyEventKind::Release {
            return;
        }
        match self.screen {
            Screen::Typing => {
                if key.code == KeyCode::Enter && self.is_open_ended_run() {
                    self.engine.complete();
                } else {
                    self.input.handle_key(&key, &mut self.engine);
                }
            }
            Screen::TutorialStats => {
                if key.code == KeyCode::Enter {
                    let now = self.clock.now_ms();
                    if self.tutorial.dismiss_stats(self.engine.fever_mut(), now) {
                        self.finish_tutorial();
                    }
                }
            }
            Screen::RunSummary => match key.code {
                KeyCode::Enter => self.start_run(),
                KeyCode::Char(c @ '1'..='3') => {
                    let choice = c as usize - '1' as usize;
                    if let Some(upgrade) = self.upgrade_offer().get(choice).copied() {
                        self.choose_upgrade(upgrade);
                        self.start_run();
                    }
                }
                _ => {}
            },
        }
        self.process_events();
    }

    /// Runs due letter timers and reacts to anything they published.
    pub fn tick(&mut self) {
        self.engine.poll_timers();
        self.process_events();
    }

    /// Wipes the garden and returns to the start of the walkthrough.
    pub fn reset_progress(&mut self) {
        if let Err(e) = self.store.clear() {
            warn!(error = %e, "failed to clear stored garden");
        }
        self.garden = GardenState::default();
        let now = self.clock.now_ms();
        self.tutorial.reset(self.engine.fever_mut(), now);
        self.engine.fever_mut().reset();
        self.rush_active = false;
        // a fever cut short here must not pay out into the wiped garden
        self.inbox.borrow_mut().clear();
        self.ledger.init(0);
        self.ledger.reset_session();
        self.last_run = None;
        self.last_fever = None;
        info!("progress reset");
        self.process_events();
    }

    fn is_open_ended_run(&self) -> bool {
        let options = self.engine.session().options();
        !options.is_tutorial() && options.word_limit.is_none()
    }

    fn save_garden(&mut self) {
        self.sync_sol();
        if let Err(e) = self.store.save(&self.garden) {
            warn!(error = %e, "failed to save garden");
        }
    }

    /// Keeps the in-memory garden in step with what the ledger persisted.
    fn sync_sol(&mut self) {
        let sol = self.ledger.state();
        self.garden.session_sol = sol.session_sol;
        self.garden.lifetime_sol = sol.lifetime_sol;
    }

    fn enter_phase(&mut self, phase: Phase) {
        match phase {
            // runs configure themselves
            Phase::Idle => {}
            Phase::Stats => {
                self.engine.golden_mut().set_enabled(false);
                self.engine.set_capture_all(false);
                self.input.set_enabled(false);
                self.screen = Screen::TutorialStats;
            }
            Phase::Intro | Phase::Mechanics | Phase::Fever => {
                let cfg = PhaseConfig::for_phase(phase);
                self.engine.golden_mut().configure(GoldenConfig {
                    enabled: cfg.golden_enabled,
                    spawn_interval: cfg.golden_spawn_interval,
                    start_word_index: cfg.golden_start_word_index,
                    base_fade_ms: self.config.golden_base_fade_ms,
                });
                self.engine.green_mut().configure(GreenConfig::default());
                self.engine.set_strict(false);
                self.engine.set_capture_all(cfg.all_letters_capturable);
                self.engine.start(cfg.words, SessionOptions::tutorial());
                if let Some(pos) = cfg.green_position {
                    self.engine.green_mut().set_position(pos);
                }
                self.input.set_enabled(true);
                self.screen = Screen::Typing;
            }
        }
    }

    fn finish_tutorial(&mut self) {
        self.garden.tutorial_complete = true;
        self.save_garden();
        info!("tutorial complete");
        self.bus.publish(GameEvent::TutorialComplete);
        self.start_run();
    }

    fn start_run(&mut self) {
        let effects = self.effects();
        let endless = self.config.endless || effects.endless;

        self.ledger.reset_session();
        self.sync_sol();
        self.engine.golden_mut().configure(GoldenConfig {
            enabled: true,
            spawn_interval: self.config.golden_interval,
            start_word_index: 0,
            base_fade_ms: self.config.golden_base_fade_ms,
        });
        self.engine.green_mut().configure(GreenConfig {
            spawning: true,
            word_threshold: self.config.green_word_threshold,
            spawn_chance: self.config.green_spawn_chance,
            ..GreenConfig::default()
        });
        self.engine.set_strict(effects.strict);
        self.engine.set_capture_all(false);

        let mut words = Vec::new();
        if self.garden.tutorial_beat < FINAL_TUTORIAL_BEAT {
            let beat = self.garden.tutorial_beat + 1;
            words.extend(self.engine.generate_words(&WordSource::Tutorial { beat }));
        }
        let options = if endless {
            SessionOptions::endless(None)
        } else {
            let count = self.config.words_per_run;
            words.extend(self.engine.generate_words(&WordSource::Common { count }));
            SessionOptions::endless(Some(words.len()))
        };

        self.engine.start(words, options);
        self.input.set_enabled(true);
        self.screen = Screen::Typing;
    }

    fn choose_upgrade(&mut self, upgrade: &Upgrade) {
        let mut garden = std::mem::take(&mut self.garden)
            .unlock_upgrade(upgrade.id)
            .advance_tutorial();
        if garden.tutorial_beat == FINAL_TUTORIAL_BEAT {
            garden = garden.set_seed(upgrade.seed);
        }
        self.garden = garden;
        info!(id = upgrade.id, "upgrade unlocked");
        self.save_garden();
    }

    fn start_rush(&mut self) {
        let now = self.clock.now_ms();
        let limit = self.config.fever_rush_words;
        self.engine.fever_mut().start_with_limit(now, Some(limit));
        self.engine
            .golden_mut()
            .set_spawn_interval(self.config.fever_golden_interval);
        self.rush_active = true;
        info!(limit, "fever rush started");
    }

    fn end_rush(&mut self) {
        if !self.rush_active {
            return;
        }
        self.rush_active = false;
        let now = self.clock.now_ms();
        self.engine.fever_mut().end(now);
        self.engine
            .golden_mut()
            .set_spawn_interval(self.config.golden_interval);
    }

    fn record_run(&mut self, summary: &SessionSummary) {
        let run = RunResult::new(summary, self.ledger.session_sol(), Utc::now());
        self.garden = std::mem::take(&mut self.garden).add_run(run.clone());
        self.save_garden();
        debug!(wpm = run.wpm, accuracy = run.accuracy, "run recorded");
        self.last_run = Some(run);
        self.input.set_enabled(false);
        self.screen = Screen::RunSummary;
    }

    /// Drains the inbox, including anything published while draining.
    pub fn process_events(&mut self) {
        loop {
            let next = self.inbox.borrow_mut().pop_front();
            let Some(event) = next else {
                break;
            };
            self.react(event);
        }
    }

    fn react(&mut self, event: GameEvent) {
        let now = self.clock.now_ms();
        match event {
            GameEvent::Keystroke { .. } => {
                if self.tutorial.is_active() {
                    self.tutorial.start_timer(now);
                }
            }
            GameEvent::WordComplete { .. } => {
                if self.tutorial.phase() != Phase::Intro {
                    self.ledger.earn_base();
                }
                if self.engine.fever_mut().track_word_complete() && self.rush_active {
                    self.end_rush();
                }
            }
            GameEvent::GoldenCaptured { reward, .. } => {
                self.ledger.earn_golden(reward);
                self.engine.fever_mut().track_golden_capture();
            }
            GameEvent::GreenCaptured => {
                if self.tutorial.phase() == Phase::Mechanics {
                    self.tutorial.capture_green(self.engine.fever_mut(), now);
                } else if !self.tutorial.is_active() && !self.rush_active {
                    self.start_rush();
                }
            }
            GameEvent::SessionEnded { summary } => match self.tutorial.phase() {
                Phase::Intro | Phase::Mechanics | Phase::Fever => {
                    self.tutorial.complete_phase(self.engine.fever_mut(), now);
                }
                Phase::Stats => {}
                Phase::Idle => {
                    // settle the rush bonus before the run is written down
                    self.end_rush();
                    self.process_events();
                    self.record_run(&summary);
                }
            },
            GameEvent::PhaseChanged { from, to } => {
                debug!(%from, %to, "entering phase");
                self.enter_phase(to);
            }
            GameEvent::FeverEnded { stats, wpm, accuracy } => {
                let bonus = stats.max_chain / FEVER_BONUS_DIVISOR;
                if bonus > 0 {
                    self.ledger.earn_bonus(u64::from(bonus));
                }
                self.last_fever = Some(FeverSummary {
                    stats,
                    wpm,
                    accuracy,
                });
            }
            GameEvent::SolEarned { .. } => self.sync_sol(),
            _ => {}
        }
    }
}

impl Drop for Game {
    fn drop(&mut self) {
        if let Some(sub) = self.inbox_sub.take() {
            sub.unsubscribe();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scheduler::ManualClock;
    use crate::storage::MemoryGardenStore;
    use crossterm::event::KeyModifiers;

    struct Repeat;

    impl WordSupply for Repeat {
        fn generate_words(&mut self, source: &WordSource) -> Vec<String> {
            match source {
                WordSource::Common { count } => vec!["go".to_string(); *count],
                WordSource::Tutorial { beat } => crate::words::tutorial_beat(*beat),
                WordSource::Custom(words) => words.clone(),
            }
        }
    }

    fn game(garden: GardenState) -> (Game, ManualClock, MemoryGardenStore) {
        let store = MemoryGardenStore::new();
        store.save(&garden).unwrap();
        let clock = ManualClock::new(0);
        let config = Config {
            words_per_run: 3,
            ..Config::default()
        };
        let game = Game::new(
            config,
            Rc::new(store.clone()),
            Rc::new(clock.clone()),
            Box::new(Repeat),
            9,
        );
        (game, clock, store)
    }

    fn veteran() -> GardenState {
        GardenState {
            tutorial_complete: true,
            tutorial_beat: FINAL_TUTORIAL_BEAT,
            ..GardenState::default()
        }
    }

    fn press(game: &mut Game, code: KeyCode) {
        game.handle_key(KeyEvent::new(code, KeyModifiers::NONE));
    }

    fn type_words(game: &mut Game, n: usize) {
        for _ in 0..n {
            press(game, KeyCode::Char('g'));
            press(game, KeyCode::Char('o'));
            press(game, KeyCode::Char(' '));
        }
    }

    #[test]
    fn new_players_start_in_the_intro() {
        let (mut game, _clock, _store) = game(GardenState::default());
        game.begin(false);
        assert_eq!(game.tutorial().phase(), Phase::Intro);
        assert!(!game.sol_bar_visible());
        assert!(game.engine().session().options().is_tutorial());
    }

    #[test]
    fn veterans_go_straight_to_a_run() {
        let (mut game, _clock, _store) = game(veteran());
        game.begin(false);
        assert_eq!(game.tutorial().phase(), Phase::Idle);
        assert_eq!(game.engine().session().words().len(), 3);
    }

    #[test]
    fn finished_run_earns_sol_and_is_recorded() {
        let (mut game, _clock, store) = game(veteran());
        game.begin(false);
        type_words(&mut game, 3);

        assert_eq!(game.screen(), Screen::RunSummary);
        assert_eq!(game.ledger().session_sol(), 3);
        let saved = store.load().unwrap();
        assert_eq!(saved.run_history.len(), 1);
        assert_eq!(saved.lifetime_sol, 3);
        assert_eq!(saved.total_words_typed, 3);

        press(&mut game, KeyCode::Enter);
        assert_eq!(game.screen(), Screen::Typing);
        assert_eq!(game.ledger().session_sol(), 0);
        assert_eq!(game.ledger().lifetime_sol(), 3);
    }

    #[test]
    fn summary_screen_ignores_typing() {
        let (mut game, _clock, _store) = game(veteran());
        game.begin(false);
        type_words(&mut game, 3);
        let keystrokes = game.engine().session().correct_keystrokes;
        press(&mut game, KeyCode::Char('g'));
        assert_eq!(game.engine().session().correct_keystrokes, keystrokes);
    }

    #[test]
    fn upgrade_choice_advances_the_story() {
        let garden = GardenState {
            tutorial_complete: true,
            ..GardenState::default()
        };
        let (mut game, _clock, store) = game(garden);
        game.begin(false);
        let story_words = game.engine().session().words().len() - 3;
        assert!(story_words > 0);
        type_words(&mut game, story_words + 3);
        assert_eq!(game.screen(), Screen::RunSummary);
        assert_eq!(game.upgrade_offer().len(), 3);

        press(&mut game, KeyCode::Char('2'));
        let saved = store.load().unwrap();
        assert_eq!(saved.tutorial_beat, 1);
        assert_eq!(saved.unlocked_upgrades, vec![upgrades::TIMER]);
        assert_eq!(game.screen(), Screen::Typing);
    }

    #[test]
    fn open_ended_run_finishes_on_enter() {
        let (mut game, _clock, _store) = game(veteran());
        game.config.endless = true;
        game.begin(false);
        type_words(&mut game, 12);
        assert_eq!(game.screen(), Screen::Typing);
        press(&mut game, KeyCode::Enter);
        assert_eq!(game.screen(), Screen::RunSummary);
        assert_eq!(game.last_run().map(|r| r.words), Some(12));
    }

    #[test]
    fn reset_progress_wipes_garden() {
        let (mut game, _clock, store) = game(veteran());
        game.begin(false);
        type_words(&mut game, 3);
        game.reset_progress();
        assert!(store.load().is_none());
        assert_eq!(game.ledger().lifetime_sol(), 0);
        game.begin(false);
        assert_eq!(game.tutorial().phase(), Phase::Intro);
    }
}
