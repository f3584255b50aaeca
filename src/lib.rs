// Library surface for the binary and the headless integration tests.
pub mod app_dirs;
pub mod config;
pub mod engine;
pub mod error;
pub mod events;
pub mod fever;
pub mod game;
pub mod golden;
pub mod green;
pub mod input;
pub mod ledger;
pub mod runtime;
pub mod scheduler;
pub mod session;
pub mod stats;
pub mod storage;
pub mod tutorial;
pub mod types;
pub mod ui;
pub mod upgrades;
pub mod words;
