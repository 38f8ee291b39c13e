//! Terminal output: startup banner, live dashboard, final summary, and the
//! 1-second display loop that drives the dashboard.

use std::io::{self, Write};
use std::sync::Arc;
use std::time::Duration;

use chrono::Local;
use crossterm::cursor::MoveTo;
use crossterm::queue;
use crossterm::terminal::{Clear, ClearType};
use secrecy::ExposeSecret;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;
use tracing::warn;

use wsload_api::Dialer;
use wsload_core::{ConnectionManager, FinalReport, LiveReport, LoadTestConfig};

use crate::output::{
    Palette, fmt_duration, history_table, separator_width, subscription_emoji, truncate_chars,
};

const TICK: Duration = Duration::from_secs(1);
const SPINNER: [&str; 10] = ["⠋", "⠙", "⠹", "⠸", "⠼", "⠴", "⠦", "⠧", "⠇", "⠏"];
/// Credential characters echoed in the banner.
const AUTH_PREVIEW_CHARS: usize = 20;
const SUMMARY_WIDTH: usize = 60;

fn terminal_width() -> u16 {
    crossterm::terminal::size().map_or(80, |(cols, _)| cols)
}

// ── Banner ───────────────────────────────────────────────────────────

pub fn print_banner(out: &mut impl Write, config: &LoadTestConfig, palette: Palette) -> io::Result<()> {
    let kinds = config.subscription_kinds();

    writeln!(out, "{}", palette.green("🚀 Starting WebSocket Load Test..."))?;
    writeln!(out, "{}", palette.green(&format!("📊 Target: {}", config.url)))?;
    writeln!(out, "{}", palette.green(&format!("🎯 Service: {}", config.service_id)))?;
    writeln!(
        out,
        "{}",
        palette.green(&format!(
            "📡 Subscriptions ({} types × {} instances = {} total):",
            kinds.len(),
            config.instances,
            config.planned_subscriptions()
        ))
    )?;
    for kind in &kinds {
        let name = kind.as_str();
        writeln!(
            out,
            "{}",
            palette.green(&format!("  {} {name} (×{})", subscription_emoji(name), config.instances))
        )?;
    }

    if let Some(auth) = &config.auth {
        let raw = auth.expose_secret();
        if !raw.is_empty() {
            let preview = truncate_chars(raw, AUTH_PREVIEW_CHARS);
            writeln!(out, "{}", palette.green(&format!("🔐 Auth: {preview}...")))?;
        }
    }
    writeln!(out)?;
    out.flush()
}

// ── Live dashboard ───────────────────────────────────────────────────

/// Anything that can draw a live report.
pub trait Renderer: Send {
    fn render(&mut self, report: &LiveReport) -> io::Result<()>;
}

/// Full-screen dashboard written to a terminal.
pub struct Dashboard<W> {
    out: W,
    palette: Palette,
    spinner: usize,
    /// Connection count at the last render; a change forces a full clear.
    rendered_connections: Option<u64>,
}

impl<W: Write + Send> Dashboard<W> {
    pub fn new(out: W, palette: Palette) -> Self {
        Self {
            out,
            palette,
            spinner: 0,
            rendered_connections: None,
        }
    }

    #[allow(clippy::too_many_lines)]
    fn frame(&mut self, r: &LiveReport, width: u16) -> io::Result<Vec<u8>> {
        let p = self.palette;
        let mut buf = Vec::new();
        let rule = "═".repeat(separator_width(width));

        self.spinner = (self.spinner + 1) % SPINNER.len();
        let mut header = format!("{} WebSocket Load Test - Live Stats", SPINNER[self.spinner]);
        let width = usize::from(width);
        if header.chars().count() > width {
            header = format!("{}...", truncate_chars(&header, width.saturating_sub(3)));
        }
        writeln!(buf, "{}", p.green(&header))?;
        writeln!(buf, "{rule}")?;

        writeln!(buf, "{}", p.cyan("📡 CONNECTION METRICS"))?;
        writeln!(buf, "🔗 Total Connections:     {}", p.green(&r.total_connections.to_string()))?;
        writeln!(buf, "🔄 Reconnections:         {}", p.yellow(&r.reconnections.to_string()))?;
        writeln!(buf, "🎯 Connection Attempts:   {}", p.blue(&r.connection_attempts.to_string()))?;
        writeln!(buf, "⏱️  Current Conn Duration: {}", p.green(&fmt_duration(r.current_conn_duration)))?;
        writeln!(buf, "🏃 Total Runtime:         {}", p.cyan(&fmt_duration(r.total_runtime)))?;
        if let Some(avg) = r.average_connection {
            writeln!(buf, "📊 Avg Connection Time:   {}", p.blue(&fmt_duration(avg)))?;
        }

        writeln!(buf)?;
        writeln!(buf, "{}", p.magenta("📡 SUBSCRIPTION METRICS"))?;
        writeln!(buf, "📊 Total Subscriptions:   {}", p.magenta(&r.total_subscriptions.to_string()))?;
        writeln!(buf, "✅ Confirmations:         {}", p.green(&r.confirmation_events.to_string()))?;
        writeln!(buf, "🧊 Subscription Events:   {}", p.cyan(&r.subscription_events.to_string()))?;
        writeln!(buf, "❌ Error Events:          {}", p.red(&r.error_events.to_string()))?;

        if !r.messages_by_type.is_empty() {
            writeln!(buf)?;
            writeln!(buf, "{}", p.blue("📊 MESSAGES BY TYPE"))?;
            for (kind, count) in &r.messages_by_type {
                writeln!(buf, "{} {kind}: {} msgs", subscription_emoji(kind), p.cyan(&count.to_string()))?;
            }
        }

        writeln!(buf)?;
        writeln!(buf, "{}", p.blue("📨 MESSAGE METRICS"))?;
        writeln!(buf, "📈 Total Messages:        {}", p.blue(&r.events_received.to_string()))?;
        writeln!(buf, "📨 Current Conn Messages: {}", p.cyan(&r.current_conn_messages.to_string()))?;
        writeln!(buf, "⚡ Messages/Second:       {}", p.yellow(&format!("{:.2}", r.current_rate)))?;
        writeln!(buf, "📊 Overall Rate:          {}/sec", p.cyan(&format!("{:.2}", r.overall_rate)))?;
        let last_event = r
            .since_last_event
            .map_or_else(|| "never".to_owned(), |d| format!("{} ago", fmt_duration(d)));
        writeln!(buf, "⏰ Last Event:            {}", p.green(&last_event))?;

        writeln!(buf)?;
        writeln!(buf, "{}", p.yellow("⚡ PERFORMANCE METRICS"))?;
        if r.events_received > 0 {
            writeln!(buf, "✅ Success Rate:          {}", p.green(&format!("{:.1}%", r.success_rate)))?;
        }
        if r.total_subscriptions > 0 {
            writeln!(
                buf,
                "📊 Events/Subscription:   {}",
                p.cyan(&format!("{:.1}", r.events_per_subscription))
            )?;
        }
        if let Some(longest) = r.longest_connection {
            writeln!(buf, "🏆 Longest Connection:    {}", p.green(&fmt_duration(longest)))?;
        }
        if let Some(shortest) = r.shortest_connection {
            writeln!(buf, "⚡ Shortest Connection:   {}", p.yellow(&fmt_duration(shortest)))?;
        }

        if !r.recent_history.is_empty() {
            writeln!(buf)?;
            writeln!(buf, "{}", p.yellow("📋 CONNECTION HISTORY"))?;
            for conn in &r.recent_history {
                writeln!(
                    buf,
                    "🔗 Connection #{}: {} msgs in {} ({} to {})",
                    p.green(&conn.number.to_string()),
                    p.cyan(&conn.messages.to_string()),
                    p.blue(&fmt_duration(conn.duration)),
                    conn.started_at.format("%H:%M:%S"),
                    conn.ended_at.format("%H:%M:%S"),
                )?;
            }
        }

        if let Some(message) = &r.last_message {
            writeln!(buf)?;
            writeln!(buf, "{}", p.magenta("📝 LATEST MESSAGE"))?;
            writeln!(buf, "{message}")?;
        }

        writeln!(buf)?;
        writeln!(buf, "{rule}")?;
        writeln!(buf, "🕐 Last Updated: {}", Local::now().format("%H:%M:%S"))?;
        Ok(buf)
    }
}

impl<W: Write + Send> Renderer for Dashboard<W> {
    fn render(&mut self, report: &LiveReport) -> io::Result<()> {
        let frame = self.frame(report, terminal_width())?;

        if self.rendered_connections == Some(report.total_connections) {
            queue!(self.out, MoveTo(0, 0), Clear(ClearType::FromCursorDown))?;
        } else {
            queue!(self.out, Clear(ClearType::All), MoveTo(0, 0))?;
            self.rendered_connections = Some(report.total_connections);
        }
        self.out.write_all(&frame)?;
        self.out.flush()
    }
}

/// Redraw every second (and once as soon as a connection opens) until
/// cancelled. Nothing is drawn before the first connection.
pub async fn drive<D, R>(manager: Arc<ConnectionManager<D>>, mut renderer: R, cancel: CancellationToken)
where
    D: Dialer,
    R: Renderer,
{
    let mut ticker = tokio::time::interval(TICK);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
    let mut state = manager.subscribe_state();
    let mut watching = true;
    let mut drawn_connections = 0;

    loop {
        tokio::select! {
            biased;
            () = cancel.cancelled() => break,
            changed = state.changed(), if watching => {
                if changed.is_err() {
                    watching = false;
                    continue;
                }
                // The watch only keeps the latest state, which may already be
                // past Connected. A new connection is what triggers the draw.
                if manager.stats().total_connections() <= drawn_connections {
                    continue;
                }
            }
            _ = ticker.tick() => {}
        }

        let stats = manager.stats();
        let connections = stats.total_connections();
        if connections == 0 {
            continue;
        }
        drawn_connections = connections;
        let report = stats.live_report(manager.total_subscriptions());
        if let Err(e) = renderer.render(&report) {
            warn!(error = %e, "dashboard render failed");
        }
    }
}

// ── Final summary ────────────────────────────────────────────────────

#[allow(clippy::too_many_lines)]
pub fn print_final_summary(out: &mut impl Write, r: &FinalReport, palette: Palette) -> io::Result<()> {
    let p = palette;
    let rule = "═".repeat(SUMMARY_WIDTH);

    queue!(out, Clear(ClearType::All), MoveTo(0, 0))?;
    writeln!(out, "{}", p.cyan("🏁 FINAL SESSION SUMMARY"))?;
    writeln!(out, "{rule}")?;

    writeln!(out, "{}", p.cyan("📡 CONNECTION SUMMARY"))?;
    writeln!(out, "🔗 Total Connections:     {}", p.green(&r.total_connections.to_string()))?;
    writeln!(out, "🔄 Total Reconnections:   {}", p.yellow(&r.reconnections.to_string()))?;
    writeln!(out, "🎯 Connection Attempts:   {}", p.blue(&r.connection_attempts.to_string()))?;
    writeln!(out, "📡 Total Subscriptions:   {}", p.magenta(&r.total_subscriptions.to_string()))?;
    writeln!(out, "⏱️  Total Uptime:          {}", p.green(&fmt_duration(r.total_uptime)))?;
    writeln!(out, "🏃 Total Runtime:         {}", p.cyan(&fmt_duration(r.total_runtime)))?;

    writeln!(out)?;
    writeln!(out, "{}", p.blue("📨 MESSAGE SUMMARY"))?;
    writeln!(out, "📈 Total Messages:        {}", p.blue(&r.events_received.to_string()))?;
    writeln!(out, "🧊 Subscription Events:   {}", p.cyan(&r.subscription_events.to_string()))?;
    writeln!(out, "✅ Confirmations:         {}", p.green(&r.confirmation_events.to_string()))?;
    writeln!(out, "❌ Error Events:          {}", p.red(&r.error_events.to_string()))?;
    for (kind, count) in &r.messages_by_type {
        writeln!(out, "{} {kind}: {} msgs", subscription_emoji(kind), p.cyan(&count.to_string()))?;
    }

    writeln!(out)?;
    writeln!(out, "{}", p.yellow("⚡ PERFORMANCE SUMMARY"))?;
    if let Some(rate) = r.connection_event_rate {
        writeln!(out, "📈 Connection Event Rate: {} events/sec", p.yellow(&format!("{rate:.2}")))?;
    }
    if let Some(rate) = r.overall_event_rate {
        writeln!(out, "📊 Overall Event Rate:    {} events/sec", p.cyan(&format!("{rate:.2}")))?;
    }
    if !r.total_runtime.is_zero() {
        writeln!(out, "📡 Connection Reliability: {}", p.green(&format!("{:.1}%", r.reliability)))?;
    }
    if r.events_received > 0 {
        writeln!(out, "✅ Success Rate:          {}", p.green(&format!("{:.1}%", r.success_rate)))?;
    }
    if r.total_subscriptions > 0 {
        writeln!(out, "📊 Events/Subscription:   {}", p.cyan(&format!("{:.1}", r.events_per_subscription)))?;
    }
    if let Some(avg) = r.average_connection {
        writeln!(out, "⏳ Avg Connection Time:   {}", p.blue(&fmt_duration(avg)))?;
    }
    if let Some(longest) = r.longest_connection {
        writeln!(out, "🏆 Longest Connection:    {}", p.green(&fmt_duration(longest)))?;
    }
    if let Some(shortest) = r.shortest_connection {
        writeln!(out, "⚡ Shortest Connection:   {}", p.yellow(&fmt_duration(shortest)))?;
    }

    if !r.history.is_empty() {
        writeln!(out)?;
        writeln!(out, "{}", p.yellow("📋 CONNECTION HISTORY"))?;
        writeln!(out, "{}", history_table(&r.history))?;
    }

    writeln!(out)?;
    writeln!(out, "{rule}")?;
    writeln!(out, "{}", p.green("👋 Session complete"))?;
    out.flush()
}
