use serde::{Deserialize, Serialize};
use strum_macros::Display;

/// Upgrade family the player commits to at the end of the story beats
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Display, Serialize, Deserialize)]
#[strum(serialize_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum Seed {
    Cosmetic,
    Mechanical,
    Data,
}

impl Seed {
    pub const ALL: [Seed; 3] = [Seed::Cosmetic, Seed::Mechanical, Seed::Data];
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Upgrade {
    pub id: &'static str,
    pub seed: Seed,
    pub name: &'static str,
    pub description: &'static str,
    /// Story beat at which it can be offered
    pub tier: u8,
}

pub const PALETTE: &str = "cosmetic.palette";
pub const MINIMAL: &str = "cosmetic.minimal";
pub const FOCUS: &str = "cosmetic.focus";
pub const TIMER: &str = "mechanical.timer";
pub const ENDLESS: &str = "mechanical.endless";
pub const STRICT: &str = "mechanical.strict";
pub const LIVE_WPM: &str = "data.wpm";
pub const HEATMAP: &str = "data.heatmap";
pub const HISTORY: &str = "data.history";

pub const UPGRADES: [Upgrade; 9] = [
    Upgrade {
        id: PALETTE,
        seed: Seed::Cosmetic,
        name: "palette",
        description: "shift the colors",
        tier: 1,
    },
    Upgrade {
        id: MINIMAL,
        seed: Seed::Cosmetic,
        name: "minimal",
        description: "hide everything but the text",
        tier: 2,
    },
    Upgrade {
        id: FOCUS,
        seed: Seed::Cosmetic,
        name: "focus",
        description: "dim untyped words, highlight the current one",
        tier: 3,
    },
    Upgrade {
        id: TIMER,
        seed: Seed::Mechanical,
        name: "timer",
        description: "show a running clock",
        tier: 1,
    },
    Upgrade {
        id: ENDLESS,
        seed: Seed::Mechanical,
        name: "endless",
        description: "no word limit",
        tier: 2,
    },
    Upgrade {
        id: STRICT,
        seed: Seed::Mechanical,
        name: "strict",
        description: "errors must be fixed before moving on",
        tier: 3,
    },
    Upgrade {
        id: LIVE_WPM,
        seed: Seed::Data,
        name: "wpm",
        description: "show live words per minute",
        tier: 1,
    },
    Upgrade {
        id: HEATMAP,
        seed: Seed::Data,
        name: "heatmap",
        description: "show which keys you miss most",
        tier: 2,
    },
    Upgrade {
        id: HISTORY,
        seed: Seed::Data,
        name: "history",
        description: "show your last 5 runs",
        tier: 3,
    },
];

pub fn by_tier(tier: u8) -> Vec<&'static Upgrade> {
    UPGRADES.iter().filter(|u| u.tier == tier).collect()
}

pub fn by_id(id: &str) -> Option<&'static Upgrade> {
    UPGRADES.iter().find(|u| u.id == id)
}

pub fn by_seed(seed: Seed) -> Vec<&'static Upgrade> {
    UPGRADES.iter().filter(|u| u.seed == seed).collect()
}

/// What the active upgrades switch on
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct UpgradeEffects {
    pub palette: bool,
    pub minimal: bool,
    pub focus: bool,
    pub timer: bool,
    pub endless: bool,
    pub strict: bool,
    pub live_wpm: bool,
    pub heatmap: bool,
    pub history: bool,
}

impl UpgradeEffects {
    pub fn from_active<S: AsRef<str>>(active: &[S]) -> Self {
        let on = |id: &str| active.iter().any(|a| a.as_ref() == id);
        Self {
            palette: on(PALETTE),
            minimal: on(MINIMAL),
            focus: on(FOCUS),
            timer: on(TIMER),
            endless: on(ENDLESS),
            strict: on(STRICT),
            live_wpm: on(LIVE_WPM),
            heatmap: on(HEATMAP),
            history: on(HISTORY),
        }
    }
}
