use std::any::Any;
use std::fs::File;
use std::io::{self, stdin};
use std::ops::ControlFlow;
use std::panic;
use std::path::PathBuf;
use std::rc::Rc;
use std::sync::Mutex;

use anyhow::{Context, Result};
use clap::{error::ErrorKind, CommandFactory, Parser};
use crossterm::{
    event::{KeyCode, KeyEvent, KeyModifiers},
    execute,
    terminal::{disable_raw_mode, enable_raw_mode, EnterAlternateScreen, LeaveAlternateScreen},
    tty::IsTty,
};
use rand::rngs::StdRng;
use rand::SeedableRng;
use ratatui::{
    backend::{Backend, CrosstermBackend},
    Terminal,
};
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

use glint::config::{Config, ConfigStore, FileConfigStore};
use glint::game::Game;
use glint::runtime::{CrosstermEventSource, FixedTicker, Runner, TermEvent};
use glint::scheduler::SystemClock;
use glint::storage::FileGardenStore;
use glint::words::WordGenerator;

/// typing game where golden letters, fever rushes and sol reward staying in flow
#[derive(Parser, Debug, Clone)]
#[clap(version, about)]
pub struct Cli {
    /// number of words per run
    #[clap(short = 'w', long)]
    words: Option<usize>,

    /// keep feeding words until enter is pressed
    #[clap(short = 'e', long)]
    endless: bool,

    /// go straight to a run even if the walkthrough is unfinished
    #[clap(long)]
    skip_tutorial: bool,

    /// wipe sol, upgrades and history, then start the walkthrough again
    #[clap(long)]
    reset_progress: bool,

    /// seed for letter placement and word order
    #[clap(long)]
    seed: Option<u64>,

    /// write logs here (filtered by GLINT_LOG or RUST_LOG)
    #[clap(long)]
    log_file: Option<PathBuf>,

    /// log every event published on the bus
    #[clap(long)]
    debug_events: bool,

    /// persist --words and --endless as the new defaults
    #[clap(long)]
    save_config: bool,
}

impl Cli {
    fn apply(&self, mut config: Config) -> Config {
        if let Some(words) = self.words {
            config.words_per_run = words;
        }
        if self.endless {
            config.endless = true;
        }
        config
    }
}

fn init_tracing(log_file: Option<&PathBuf>) -> Result<()> {
    let filter = EnvFilter::try_from_env("GLINT_LOG")
        .or_else(|_| EnvFilter::try_from_default_env())
        .unwrap_or_else(|_| EnvFilter::new("info"));

    match log_file {
        Some(path) => {
            let file = File::create(path)
                .with_context(|| format!("cannot open log file {}", path.display()))?;
            tracing_subscriber::fmt()
                .with_env_filter(filter)
                .with_ansi(false)
                .with_writer(Mutex::new(file))
                .init();
        }
        // the terminal belongs to the game
        None => tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_writer(io::sink)
            .init(),
    }
    Ok(())
}

fn panic_message(payload: &(dyn Any + Send)) -> &str {
    payload
        .downcast_ref::<&str>()
        .copied()
        .or_else(|| payload.downcast_ref::<String>().map(String::as_str))
        .unwrap_or("unknown panic")
}

/// Panics go to the log; stderr would land on the alternate screen.
fn install_panic_hook() {
    panic::set_hook(Box::new(|info| {
        let location = info
            .location()
            .map(|l| format!("{}:{}", l.file(), l.line()))
            .unwrap_or_default();
        error!(%location, "panic: {}", panic_message(info.payload()));
    }));
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    if !stdin().is_tty() {
        let mut cmd = Cli::command();
        cmd.error(ErrorKind::Io, "stdin must be a tty").exit();
    }

    init_tracing(cli.log_file.as_ref())?;

    let config_store = FileConfigStore::new();
    let config = cli.apply(config_store.load());
    config.validate()?;
    if cli.save_config {
        config_store.save(&config)?;
        info!(path = %config_store.path().display(), "config saved");
    }

    let seed = cli.seed.unwrap_or_else(rand::random);
    info!(seed, "starting");
    let supply = WordGenerator::new(StdRng::seed_from_u64(seed))?;
    let store = FileGardenStore::new()?;

    let mut game = Game::new(
        config,
        Rc::new(store),
        Rc::new(SystemClock::new()),
        Box::new(supply),
        seed,
    );
    game.bus().set_debug(cli.debug_events);
    if cli.reset_progress {
        game.reset_progress();
    }
    game.begin(cli.skip_tutorial);

    install_panic_hook();
    enable_raw_mode()?;
    let mut stdout = io::stdout();
    execute!(stdout, EnterAlternateScreen)?;
    let backend = CrosstermBackend::new(stdout);
    let mut terminal = Terminal::new(backend)?;

    let outcome = start_tui(&mut terminal, &mut game);

    disable_raw_mode()?;
    execute!(terminal.backend_mut(), LeaveAlternateScreen)?;
    terminal.show_cursor()?;

    outcome
}

fn is_quit(key: &KeyEvent) -> bool {
    key.code == KeyCode::Esc
        || (key.code == KeyCode::Char('c') && key.modifiers.contains(KeyModifiers::CONTROL))
}

fn start_tui<B: Backend>(terminal: &mut Terminal<B>, game: &mut Game) -> Result<()> {
    let runner = Runner::new(
        CrosstermEventSource::new(),
        FixedTicker::from_millis(game.config().tick_ms),
    );
    terminal.draw(|f| f.render_widget(&*game, f.area()))?;

    runner.run(|ev| {
        match ev {
            TermEvent::Key(key) if is_quit(&key) => return ControlFlow::Break(Ok(())),
            TermEvent::Key(key) => game.handle_key(key),
            TermEvent::Tick => game.tick(),
            TermEvent::Resize => {}
        }
        match terminal.draw(|f| f.render_widget(&*game, f.area())) {
            Ok(_) => ControlFlow::Continue(()),
            Err(e) => ControlFlow::Break(Err(e.into())),
        }
    })
}
