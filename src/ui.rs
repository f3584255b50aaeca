use itertools::Itertools;
use ratatui::{
    buffer::Buffer,
    layout::{Alignment, Constraint, Direction, Layout, Rect},
    style::{Color, Modifier, Style},
    text::{Line, Span},
    widgets::{Paragraph, Widget, Wrap},
};
use unicode_width::UnicodeWidthStr;

use crate::game::{Game, Screen};
use crate::session::TypingSession;
use crate::types::LetterPos;
use crate::upgrades::UpgradeEffects;

const HORIZONTAL_MARGIN: u16 = 5;
const VERTICAL_MARGIN: u16 = 2;
/// Words kept visible behind the cursor
const WORDS_BEHIND: usize = 8;
/// Words drawn ahead of the cursor
const WORDS_AHEAD: usize = 60;
const HISTORY_ROWS: usize = 5;
const HEATMAP_KEYS: usize = 5;

/// Letter and accent colours; the palette upgrade swaps them.
#[derive(Debug, Clone, Copy)]
struct Theme {
    correct: Color,
    wrong: Color,
    golden: Color,
    rare: Color,
    accent: Color,
}

impl Theme {
    fn for_effects(effects: &UpgradeEffects) -> Self {
        if effects.palette {
            Self {
                correct: Color::Cyan,
                wrong: Color::LightRed,
                golden: Color::LightYellow,
                rare: Color::LightMagenta,
                accent: Color::Blue,
            }
        } else {
            Self {
                correct: Color::Green,
                wrong: Color::Red,
                golden: Color::Yellow,
                rare: Color::LightGreen,
                accent: Color::Magenta,
            }
        }
    }
}

impl Widget for &Game {
    fn render(self, area: Rect, buf: &mut Buffer) {
        match self.screen() {
            Screen::Typing => render_typing(self, area, buf),
            Screen::TutorialStats => render_fever_recap(self, area, buf),
            Screen::RunSummary => render_run_summary(self, area, buf),
        }
    }
}

fn bold() -> Style {
    Style::default().add_modifier(Modifier::BOLD)
}

fn dim() -> Style {
    bold().add_modifier(Modifier::DIM)
}

/// Rough count of terminal rows the prompt needs at `width` columns.
fn prompt_rows(words: &[String], width: u16) -> u16 {
    let width = usize::from(width.max(1));
    let chars = words.iter().map(|w| w.width() + 1).sum::<usize>();
    u16::try_from(chars / width + 1).unwrap_or(u16::MAX)
}

fn letter_style(game: &Game, theme: &Theme, pos: LetterPos) -> Option<Style> {
    let engine = game.engine();
    if engine.golden().is_position(pos) {
        let reward = engine.golden().active().map(|l| l.reward.value()).unwrap_or(1);
        let mut style = bold().fg(theme.golden).add_modifier(Modifier::UNDERLINED);
        if reward > 1 {
            style = style.add_modifier(Modifier::REVERSED);
        }
        return Some(style);
    }
    if engine.green().is_position(pos) {
        return Some(bold().fg(theme.rare).add_modifier(Modifier::REVERSED));
    }
    None
}

fn word_spans(game: &Game, theme: &Theme, focus: bool, index: usize) -> Vec<Span<'static>> {
    let session = game.engine().session();
    let Some(word) = session.word(index) else {
        return Vec::new();
    };
    let current = index == session.current_word_index;
    let typed: Vec<char> = word.typed.chars().collect();
    let target: Vec<char> = word.target.chars().collect();

    let untyped = match (focus, index.cmp(&session.current_word_index)) {
        (true, std::cmp::Ordering::Equal) => bold(),
        (true, std::cmp::Ordering::Greater) => Style::default().fg(Color::DarkGray),
        _ => dim(),
    };

    let mut spans = Vec::with_capacity(target.len().max(typed.len()) + 1);
    for i in 0..target.len().max(typed.len()) {
        let pos = LetterPos::new(index, i);
        let span = match (typed.get(i), target.get(i)) {
            (Some(&t), Some(&e)) if t == e => {
                Span::styled(e.to_string(), bold().fg(theme.correct))
            }
            (Some(_), Some(&e)) => Span::styled(e.to_string(), bold().fg(theme.wrong)),
            (Some(&t), None) => Span::styled(
                t.to_string(),
                bold().fg(theme.wrong).add_modifier(Modifier::CROSSED_OUT),
            ),
            (None, Some(&e)) => {
                let mut style = letter_style(game, theme, pos).unwrap_or(untyped);
                if current && i == typed.len() {
                    style = style.add_modifier(Modifier::UNDERLINED);
                }
                Span::styled(e.to_string(), style)
            }
            (None, None) => continue,
        };
        spans.push(span);
    }

    if word.mistaken {
        for span in spans.iter_mut() {
            span.style = span.style.add_modifier(Modifier::ITALIC);
        }
    }
    spans.push(Span::raw(" "));
    spans
}

/// Keystrokes per five over the minutes since the first key.
fn live_wpm(session: &TypingSession, now_ms: u64) -> u32 {
    let Some(start) = session.started_at else {
        return 0;
    };
    let minutes = now_ms.saturating_sub(start) as f64 / 60_000.0;
    if minutes <= 0.0 {
        return 0;
    }
    ((session.correct_keystrokes as f64 / 5.0) / minutes).round() as u32
}

fn header_line(game: &Game, theme: &Theme, effects: &UpgradeEffects) -> Line<'static> {
    let session = game.engine().session();
    let now = game.now_ms();
    let mut parts: Vec<Span<'static>> = Vec::new();

    if game.sol_bar_visible() {
        parts.push(Span::styled(
            format!(
                "sol {} / {}",
                game.ledger().session_sol(),
                game.ledger().lifetime_sol()
            ),
            bold().fg(theme.golden),
        ));
    }
    let fever = game.engine().fever();
    if fever.is_active() {
        parts.push(Span::styled(
            format!("fever x{} (best {})", fever.current_chain(), fever.max_chain()),
            bold().fg(theme.accent),
        ));
    }
    if effects.timer {
        let secs = session
            .started_at
            .map_or(0, |start| now.saturating_sub(start) / 1000);
        parts.push(Span::styled(format!("{}:{:02}", secs / 60, secs % 60), dim()));
    }
    if effects.live_wpm {
        parts.push(Span::styled(format!("{} wpm", live_wpm(session, now)), dim()));
    }
    if effects.heatmap {
        let misses = session
            .top_misses(HEATMAP_KEYS)
            .into_iter()
            .map(|(c, n)| format!("{c}:{n}"))
            .join(" ");
        if !misses.is_empty() {
            parts.push(Span::styled(format!("misses {misses}"), bold().fg(theme.wrong)));
        }
    }

    let spaced = Itertools::intersperse(parts.into_iter(), Span::raw("   ")).collect::<Vec<_>>();
    Line::from(spaced)
}

fn render_typing(game: &Game, area: Rect, buf: &mut Buffer) {
    let effects = game.effects();
    let theme = Theme::for_effects(&effects);
    let session = game.engine().session();

    let first = session.current_word_index.saturating_sub(WORDS_BEHIND);
    let last = (session.current_word_index + WORDS_AHEAD).min(session.words().len());
    let visible: Vec<String> = (first..last)
        .map(|i| session.target(i).to_string())
        .collect();

    let width = area.width.saturating_sub(HORIZONTAL_MARGIN * 2);
    let rows = prompt_rows(&visible, width).min(area.height);
    let header_rows = if effects.minimal { 0 } else { 2 };
    let padding = area.height.saturating_sub(rows + header_rows) / 2;

    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .horizontal_margin(HORIZONTAL_MARGIN)
        .constraints([
            Constraint::Length(padding),
            Constraint::Length(header_rows),
            Constraint::Length(rows),
            Constraint::Min(0),
        ])
        .split(area);

    if !effects.minimal {
        Paragraph::new(header_line(game, &theme, &effects))
            .alignment(Alignment::Center)
            .render(chunks[1], buf);
    }

    let spans: Vec<Span<'static>> = (first..last)
        .flat_map(|i| word_spans(game, &theme, effects.focus, i))
        .collect();
    Paragraph::new(Line::from(spans))
        .alignment(if rows <= 1 {
            Alignment::Center
        } else {
            Alignment::Left
        })
        .wrap(Wrap { trim: true })
        .render(chunks[2], buf);

    if !effects.minimal {
        let hint = if session.options().word_limit.is_none() && !session.options().is_tutorial() {
            "(enter) finish / (esc)ape"
        } else {
            "(esc)ape"
        };
        Paragraph::new(Span::styled(hint, Style::default().add_modifier(Modifier::ITALIC)))
            .alignment(Alignment::Center)
            .render(chunks[3], buf);
    }
}

fn render_fever_recap(game: &Game, area: Rect, buf: &mut Buffer) {
    let theme = Theme::for_effects(&game.effects());
    let mut lines = vec![Line::from(Span::styled("fever", bold().fg(theme.accent)))];

    match game.last_fever() {
        Some(fever) => {
            lines.push(Line::from(Span::styled(
                format!("{} wpm   {}% acc", fever.wpm, fever.accuracy),
                bold(),
            )));
            lines.push(Line::from(Span::styled(
                format!(
                    "best chain {}   captures {}   words {}",
                    fever.stats.max_chain, fever.stats.golden_captures, fever.stats.words_completed
                ),
                dim(),
            )));
        }
        None => lines.push(Line::from(Span::styled("no fever recorded", dim()))),
    }
    let elapsed = game.tutorial().elapsed_ms(game.now_ms()) / 1000;
    lines.push(Line::from(Span::styled(
        format!("walkthrough took {}:{:02}", elapsed / 60, elapsed % 60),
        dim(),
    )));
    lines.push(Line::default());
    lines.push(Line::from(Span::styled(
        "(enter) begin",
        Style::default().add_modifier(Modifier::ITALIC),
    )));

    render_centered(lines, area, buf);
}

fn render_run_summary(game: &Game, area: Rect, buf: &mut Buffer) {
    let effects = game.effects();
    let theme = Theme::for_effects(&effects);
    let mut lines = Vec::new();

    if let Some(run) = game.last_run() {
        lines.push(Line::from(Span::styled(
            format!("{} wpm   {}% acc   {} words", run.wpm, run.accuracy, run.words),
            bold(),
        )));
        lines.push(Line::from(Span::styled(
            format!(
                "+{} sol   {} lifetime",
                run.sol_earned,
                game.ledger().lifetime_sol()
            ),
            bold().fg(theme.golden),
        )));
    }

    let offer = game.upgrade_offer();
    if !offer.is_empty() {
        lines.push(Line::default());
        lines.push(Line::from(Span::styled("choose what grows", bold().fg(theme.accent))));
        for (i, upgrade) in offer.iter().enumerate() {
            lines.push(Line::from(vec![
                Span::styled(format!("({}) {} ", i + 1, upgrade.name), bold()),
                Span::styled(format!("[{}] ", upgrade.seed), dim()),
                Span::styled(upgrade.description, Style::default()),
            ]));
        }
    }

    if effects.history {
        lines.push(Line::default());
        for run in game.garden().recent_runs(HISTORY_ROWS).iter().rev() {
            lines.push(Line::from(Span::styled(
                format!(
                    "{}  {:>3} wpm  {:>3}%  +{}",
                    run.finished_at.format("%m-%d %H:%M"),
                    run.wpm,
                    run.accuracy,
                    run.sol_earned
                ),
                dim(),
            )));
        }
    }

    lines.push(Line::default());
    lines.push(Line::from(Span::styled(
        "(enter) next run / (esc)ape",
        Style::default().add_modifier(Modifier::ITALIC),
    )));

    render_centered(lines, area, buf);
}

fn render_centered(lines: Vec<Line<'static>>, area: Rect, buf: &mut Buffer) {
    let height = lines.len() as u16;
    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .horizontal_margin(HORIZONTAL_MARGIN)
        .vertical_margin(VERTICAL_MARGIN)
        .constraints([
            Constraint::Fill(1),
            Constraint::Length(height),
            Constraint::Fill(1),
        ])
        .split(area);

    Paragraph::new(lines)
        .alignment(Alignment::Center)
        .wrap(Wrap { trim: true })
        .render(chunks[1], buf);
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Config;
    use crate::scheduler::ManualClock;
    use crate::storage::{GardenState, GardenStore, MemoryGardenStore, FINAL_TUTORIAL_BEAT};
    use crate::words::{WordSource, WordSupply};
    use crossterm::event::{KeyCode, KeyEvent, KeyModifiers};
    use std::rc::Rc;

    struct Fixed;

    impl WordSupply for Fixed {
        fn generate_words(&mut self, source: &WordSource) -> Vec<String> {
            match source {
                WordSource::Common { count } => vec!["moss".to_string(); *count],
                _ => Vec::new(),
            }
        }
    }

    fn game(garden: GardenState) -> Game {
        let store = MemoryGardenStore::new();
        store.save(&garden).unwrap();
        let config = Config {
            words_per_run: 2,
            ..Config::default()
        };
        let mut game = Game::new(
            config,
            Rc::new(store),
            Rc::new(ManualClock::new(0)),
            Box::new(Fixed),
            1,
        );
        game.begin(false);
        game
    }

    fn veteran(active: &[&str]) -> GardenState {
        GardenState {
            tutorial_complete: true,
            tutorial_beat: FINAL_TUTORIAL_BEAT,
            active_upgrades: active.iter().map(|s| s.to_string()).collect(),
            ..GardenState::default()
        }
    }

    fn rendered(game: &Game, area: Rect) -> String {
        let mut buffer = Buffer::empty(area);
        game.render(area, &mut buffer);
        buffer.content().iter().map(|c| c.symbol()).collect()
    }

    fn type_str(game: &mut Game, text: &str) {
        for c in text.chars() {
            game.handle_key(KeyEvent::new(KeyCode::Char(c), KeyModifiers::NONE));
        }
    }

    #[test]
    fn typing_screen_shows_words_and_sol() {
        let game = game(veteran(&[]));
        let out = rendered(&game, Rect::new(0, 0, 80, 24));
        assert!(out.contains("moss moss"));
        assert!(out.contains("sol 0 / 0"));
    }

    #[test]
    fn minimal_hides_the_header() {
        let game = game(veteran(&[crate::upgrades::MINIMAL]));
        let out = rendered(&game, Rect::new(0, 0, 80, 24));
        assert!(out.contains("moss"));
        assert!(!out.contains("sol"));
    }

    #[test]
    fn intro_hides_the_sol_bar() {
        let game = game(GardenState::default());
        let out = rendered(&game, Rect::new(0, 0, 100, 30));
        assert!(out.contains("welcome"));
        assert!(!out.contains("sol 0"));
    }

    #[test]
    fn summary_lists_the_run() {
        let mut game = game(veteran(&[]));
        type_str(&mut game, "moss moss ");
        assert_eq!(game.screen(), Screen::RunSummary);
        let out = rendered(&game, Rect::new(0, 0, 80, 24));
        assert!(out.contains("2 words"));
        assert!(out.contains("+2 sol"));
    }

    #[test]
    fn small_area_does_not_panic() {
        let game = game(veteran(&[crate::upgrades::TIMER, crate::upgrades::LIVE_WPM]));
        let area = Rect::new(0, 0, 12, 3);
        let mut buffer = Buffer::empty(area);
        (&game).render(area, &mut buffer);
        assert_eq!(*buffer.area(), area);
    }

    #[test]
    fn live_wpm_counts_correct_keys() {
        let mut session = TypingSession::new(
            vec!["moss".to_string()],
            crate::session::SessionOptions::endless(None),
        );
        for (i, c) in "moss".chars().enumerate() {
            session.push_char(c, i as u64 * 100);
        }
        session.started_at = Some(0);
        assert_eq!(live_wpm(&session, 60_000), 1);
        assert_eq!(live_wpm(&session, 0), 0);
    }

    #[test]
    fn prompt_rows_wraps_by_width() {
        let words = vec!["moss".to_string(); 10];
        assert_eq!(prompt_rows(&words, 100), 1);
        assert_eq!(prompt_rows(&words, 10), 6);
    }

    #[test]
    fn prompt_rows_saturates_on_huge_buffers() {
        let words = vec!["moss".to_string(); 20_000];
        assert_eq!(prompt_rows(&words, 1), u16::MAX);
    }
}
