//! Output helpers: color policy, duration formatting, palette, tables.

use std::io::{self, IsTerminal};
use std::time::Duration;

use owo_colors::{OwoColorize, Style};
use tabled::{Table, Tabled, settings::Style as TableStyle};

use wsload_core::ConnectionRecord;

use crate::cli::ColorMode;

// ── Color helpers ────────────────────────────────────────────────────

/// Determine whether color output should be enabled.
pub fn should_color(mode: ColorMode) -> bool {
    match mode {
        ColorMode::Always => true,
        ColorMode::Never => false,
        ColorMode::Auto => io::stdout().is_terminal() && std::env::var("NO_COLOR").is_err(),
    }
}

/// Bold foreground styles used by every screen.
#[derive(Debug, Clone, Copy)]
pub struct Palette {
    enabled: bool,
}

impl Palette {
    pub fn new(enabled: bool) -> Self {
        Self { enabled }
    }

    fn paint(self, text: &str, style: Style) -> String {
        if self.enabled {
            text.style(style).to_string()
        } else {
            text.to_owned()
        }
    }

    pub fn green(self, text: &str) -> String {
        self.paint(text, Style::new().green().bold())
    }
    pub fn red(self, text: &str) -> String {
        self.paint(text, Style::new().red().bold())
    }
    pub fn yellow(self, text: &str) -> String {
        self.paint(text, Style::new().yellow().bold())
    }
    pub fn blue(self, text: &str) -> String {
        self.paint(text, Style::new().blue().bold())
    }
    pub fn magenta(self, text: &str) -> String {
        self.paint(text, Style::new().magenta().bold())
    }
    pub fn cyan(self, text: &str) -> String {
        self.paint(text, Style::new().cyan().bold())
    }
}

// ── Formatting ───────────────────────────────────────────────────────

/// Emoji shown next to a subscription type.
pub fn subscription_emoji(subscription_type: &str) -> &'static str {
    match subscription_type {
        "newHeads" => "🧊",
        "newPendingTransactions" => "⚡",
        "logs" => "📄",
        "syncing" => "🔄",
        _ => "📡",
    }
}

/// Round to whole seconds (half up) and format as `1h 2m 3s`.
pub fn fmt_duration(d: Duration) -> String {
    let secs = d.as_secs() + u64::from(d.subsec_millis() >= 500);
    humantime::format_duration(Duration::from_secs(secs)).to_string()
}

/// Clamp a terminal width to the separator range.
pub fn separator_width(columns: u16) -> usize {
    usize::from(columns.clamp(20, 100))
}

/// First `max` characters of `text`.
pub fn truncate_chars(text: &str, max: usize) -> &str {
    text.char_indices().nth(max).map_or(text, |(i, _)| &text[..i])
}

// ── Tables & JSON ────────────────────────────────────────────────────

#[derive(Tabled)]
struct HistoryRow {
    #[tabled(rename = "#")]
    number: u64,
    #[tabled(rename = "Start")]
    start: String,
    #[tabled(rename = "End")]
    end: String,
    #[tabled(rename = "Duration")]
    duration: String,
    #[tabled(rename = "Messages")]
    messages: u64,
}

/// Connection history as a rounded table.
pub fn history_table(history: &[ConnectionRecord]) -> String {
    let rows: Vec<HistoryRow> = history
        .iter()
        .map(|r| HistoryRow {
            number: r.number,
            start: r.started_at.format("%H:%M:%S").to_string(),
            end: r.ended_at.format("%H:%M:%S").to_string(),
            duration: fmt_duration(r.duration),
            messages: r.messages,
        })
        .collect();
    Table::new(rows).with(TableStyle::rounded()).to_string()
}

/// Pretty-printed JSON.
pub fn render_json_pretty<T: serde::Serialize + ?Sized>(data: &T) -> Result<String, serde_json::Error> {
    serde_json::to_string_pretty(data)
}
