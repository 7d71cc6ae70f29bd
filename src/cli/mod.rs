//! CLI command implementations for speckle-activity.
//!
//! Provides subcommand handlers for:
//! - `speckle-activity streams`: streams visible to the account
//! - `speckle-activity report --stream NAME`: the full dashboard in the terminal
//! - `speckle-activity timeline --stream NAME`: commit activity per day
//! - `speckle-activity health`: config, token, server reachability, render log
//! - `speckle-activity history --days N`: past render passes
//! - `speckle-activity config show|init|set|reset`: configuration management

use anyhow::{Result, bail};
use colored::Colorize;

use crate::analytics::aggregate::{self, Share};
use crate::analytics::logger;
use crate::analytics::reporter::{self, History};
use crate::config::{self, ActivityConfig};
use crate::dashboard::{Dashboard, DashboardInputs, DashboardState, DashboardView};
use crate::speckle::{Connector, SpeckleConnector, Stream, StreamSource};

/// Output format for listing and report commands.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputFormat {
    Table,
    Json,
    Csv,
}

impl OutputFormat {
    pub fn from_str_opt(s: Option<&str>) -> Self {
        match s {
            Some("json") => Self::Json,
            Some("csv") => Self::Csv,
            _ => Self::Table,
        }
    }
}

/// Server and token given on the command line; either falls back to config.
#[derive(Debug, Clone, Default)]
pub struct ConnectionArgs {
    pub server: Option<String>,
    pub token: Option<String>,
}

impl ConnectionArgs {
    fn inputs(&self, config: &ActivityConfig, stream: Option<&str>, limit: Option<usize>) -> DashboardInputs {
        DashboardInputs {
            server: self.server.clone().unwrap_or_else(|| config.server.url.clone()),
            token: self.token.clone().unwrap_or_else(|| config.server.token.clone()),
            stream_name: stream.map(str::to_string),
            commit_limit: limit,
        }
    }
}

/// Run one render pass with the real connector.
fn render(config: &ActivityConfig, inputs: &DashboardInputs) -> Result<DashboardState> {
    let dashboard = Dashboard::new(config, SpeckleConnector::from_config(&config.server));
    let state = dashboard.render(inputs)?;

    if let DashboardState::AwaitingCredentials { .. } = state {
        bail!(
            "no access token: pass --token, set SPECKLE_TOKEN, or run \
             `speckle-activity config set server.token <TOKEN>`"
        );
    }
    Ok(state)
}

// ---------------------------------------------------------------------------
// speckle-activity streams
// ---------------------------------------------------------------------------

/// List the streams visible to the account.
pub fn run_streams(config: &ActivityConfig, conn: &ConnectionArgs, format: OutputFormat) -> Result<()> {
    let state = render(config, &conn.inputs(config, None, None))?;
    if let DashboardState::AwaitingStreamSelection {
        server,
        account,
        streams,
        ..
    } = &state
    {
        print_streams(server, &account.name, streams, format)?;
    }
    Ok(())
}

fn print_streams(server: &str, account: &str, streams: &[Stream], format: OutputFormat) -> Result<()> {
    match format {
        OutputFormat::Json => {
            println!("{}", serde_json::to_string_pretty(streams)?);
        }
        OutputFormat::Csv => {
            println!("id,name,branches,collaborators,updated_at");
            for s in streams {
                println!(
                    "{},{},{},{},{}",
                    csv_field(&s.id),
                    csv_field(&s.name),
                    s.branch_count,
                    s.collaborators.len(),
                    s.updated_at.map(|t| t.to_rfc3339()).unwrap_or_default(),
                );
            }
        }
        OutputFormat::Table => {
            println!("{}", format!("Streams on {server}").bold().cyan());
            println!("{}", "=".repeat(60));
            println!("  {} {}", "Signed in as:".bold(), account);
            println!();

            if streams.is_empty() {
                println!("  {}", "No streams visible to this account.".yellow());
                return Ok(());
            }

            println!(
                "  {:<32} {:<12} {:>8} {:>6}",
                "Name", "Id", "Branches", "Users"
            );
            println!("  {}", "-".repeat(58));
            for (i, s) in streams.iter().enumerate() {
                let line = format!(
                    "  {:<32} {:<12} {:>8} {:>6}",
                    truncate(&s.name, 32),
                    truncate(&s.id, 12),
                    s.branch_count,
                    s.collaborators.len(),
                );
                if i % 2 == 0 {
                    println!("{line}");
                } else {
                    println!("{}", line.dimmed());
                }
            }
            println!();
            println!(
                "  {}",
                "Pick one with `speckle-activity report --stream <NAME>`.".dimmed()
            );
        }
    }
    Ok(())
}

// ---------------------------------------------------------------------------
// speckle-activity report
// ---------------------------------------------------------------------------

/// Show the full dashboard for a stream, or the stream list if none is given.
pub fn run_report(
    config: &ActivityConfig,
    conn: &ConnectionArgs,
    stream: Option<&str>,
    limit: Option<usize>,
    format: OutputFormat,
) -> Result<()> {
    let state = render(config, &conn.inputs(config, stream, limit))?;

    match &state {
        DashboardState::Loaded { view } => match format {
            OutputFormat::Json => println!("{}", serde_json::to_string_pretty(view)?),
            OutputFormat::Csv => print_report_csv(view),
            OutputFormat::Table => print_report_table(view),
        },
        DashboardState::AwaitingStreamSelection {
            server,
            account,
            streams,
            ..
        } => print_streams(server, &account.name, streams, format)?,
        DashboardState::AwaitingCredentials { .. } => {}
    }
    Ok(())
}

fn print_report_table(view: &DashboardView) {
    let header = &view.header;
    println!("{}", format!("{} {}", header.icon, header.title).bold().cyan());
    println!("{}", "=".repeat(60));
    println!("  {} {}", "Server:".bold(), view.inputs.server);
    println!("  {} {} ({})", "Stream:".bold(), view.stream.name, view.stream.id);
    if let Some(description) = view.stream.description.as_deref()
        && !description.trim().is_empty()
    {
        println!("  {} {}", "About: ".bold(), description.dimmed());
    }
    println!();

    // Latest commit
    let latest = &view.viewer.commit;
    println!("{}", "Latest Commit".bold().cyan());
    println!(
        "  {} by {} from {} at {}",
        latest.id.bold(),
        latest.author_name,
        latest.source_application,
        latest.created_at.format("%Y-%m-%d %H:%M UTC"),
    );
    if let Some(message) = latest.message.as_deref() {
        println!("  {}", message.dimmed());
    }
    println!("  {} {}", "Viewer:".bold(), view.viewer.embed_url);
    println!();

    // Report
    let report = &view.report;
    println!("{}", "Stream Activity Report".bold().cyan());
    println!("  {} {}", "Branches:    ".bold(), report.branch_count);
    print_bullets(&report.branch_list);
    println!("  {} {}", "Commits:     ".bold(), format_number(report.commit_count));
    println!("  {} {}", "Connectors:  ".bold(), report.connectors.count);
    print_bullets(&report.connector_list);
    println!("  {} {}", "Contributors:".bold(), report.contributors.count);
    print_bullets(&report.contributor_list);
    println!();

    // Graphs
    let graphs = &view.graphs;
    println!("{}", "Commits per Branch".bold().cyan());
    let max = graphs.branch_commits.iter().map(|b| b.commit_count).max().unwrap_or(0);
    for row in &graphs.branch_commits {
        println!(
            "  {:<24} {:>6} {}",
            truncate(&row.branch, 24),
            row.commit_count,
            bar(row.commit_count, max, 30).green(),
        );
    }
    println!();

    print_shares("Commits per Connector", &graphs.applications);
    print_shares("Commits per Author", &graphs.authors);

    println!("{}", "Commit Activity".bold().cyan());
    print_timeline_rows(&graphs.timeline);
}

fn print_bullets(list: &str) {
    for line in list.lines() {
        println!("      {}", line.trim_end().dimmed());
    }
}

fn print_shares(title: &str, shares: &[Share]) {
    let total: usize = shares.iter().map(|s| s.count).sum();
    println!("{}", title.bold().cyan());
    for share in shares {
        let pct = aggregate::share_pct(share.count, total);
        println!(
            "  {:<24} {:>6} {:>6.1}% {}",
            truncate(&share.label, 24),
            share.count,
            pct,
            bar(share.count, total, 30).blue(),
        );
    }
    println!();
}

fn print_report_csv(view: &DashboardView) {
    println!("section,label,value");
    let report = &view.report;
    println!("report,branches,{}", report.branch_count);
    println!("report,commits,{}", report.commit_count);
    println!("report,connectors,{}", report.connectors.count);
    println!("report,contributors,{}", report.contributors.count);
    for row in &view.graphs.branch_commits {
        println!("branch_commits,{},{}", csv_field(&row.branch), row.commit_count);
    }
    for share in &view.graphs.applications {
        println!("applications,{},{}", csv_field(&share.label), share.count);
    }
    for share in &view.graphs.authors {
        println!("authors,{},{}", csv_field(&share.label), share.count);
    }
    for day in &view.graphs.timeline {
        println!("timeline,{},{}", day.date, day.count);
    }
}

// ---------------------------------------------------------------------------
// speckle-activity timeline
// ---------------------------------------------------------------------------

/// Show commits per day for a stream.
pub fn run_timeline(
    config: &ActivityConfig,
    conn: &ConnectionArgs,
    stream: &str,
    limit: Option<usize>,
    format: OutputFormat,
) -> Result<()> {
    let state = render(config, &conn.inputs(config, Some(stream), limit))?;
    let DashboardState::Loaded { view } = state else {
        bail!("stream '{stream}' could not be loaded");
    };
    let timeline = &view.graphs.timeline;

    match format {
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(timeline)?),
        OutputFormat::Csv => {
            println!("date,commits");
            for day in timeline {
                println!("{},{}", day.date, day.count);
            }
        }
        OutputFormat::Table => {
            println!(
                "{}",
                format!("Commit Activity: {}", view.stream.name).bold().cyan()
            );
            println!("{}", "=".repeat(50));
            print_timeline_rows(timeline);
        }
    }
    Ok(())
}

fn print_timeline_rows(timeline: &[aggregate::DailyCount]) {
    let max = timeline.iter().map(|d| d.count).max().unwrap_or(0);
    for day in timeline {
        let line = format!("  {} {:>5} {}", day.date, day.count, bar(day.count, max, 30));
        if day.count == 0 {
            println!("{}", line.dimmed());
        } else {
            println!("{line}");
        }
    }
}

// ---------------------------------------------------------------------------
// speckle-activity health
// ---------------------------------------------------------------------------

/// Check config files, token, server reachability and the render log.
pub fn run_health(config: &ActivityConfig) -> Result<()> {
    println!("{}", "speckle-activity Health Check".bold().cyan());
    println!("{}", "=".repeat(40));

    // 0. Config file status
    let global = config::global_config_file();
    let global_exists = global.as_ref().map(|p| p.exists()).unwrap_or(false);
    let global_broken = global.as_deref().map(config::is_malformed).unwrap_or(false);
    print_health_item(
        "Global config",
        global_exists && !global_broken,
        if global_broken {
            "~/.speckle-activity/config.toml is malformed, ignored"
        } else if global_exists {
            "~/.speckle-activity/config.toml found"
        } else {
            "not found (run `speckle-activity config init` to create)"
        },
    );

    let project = config::project_config_file();
    let project_exists = project.as_ref().map(|p| p.exists()).unwrap_or(false);
    let project_broken = project.as_deref().map(config::is_malformed).unwrap_or(false);
    print_health_item(
        "Project config",
        !project_broken,
        if project_broken {
            ".speckle-activity.toml is malformed, ignored"
        } else if project_exists {
            ".speckle-activity.toml found"
        } else {
            "none (optional)"
        },
    );

    // 1. Token
    let has_token = config.has_token();
    print_health_item(
        "Access token",
        has_token,
        if has_token {
            "configured"
        } else {
            "not set (set SPECKLE_TOKEN or server.token)"
        },
    );

    // 2. Server
    if has_token {
        let connector = SpeckleConnector::from_config(&config.server);
        match connector.connect(&config.server.url, &config.server.token) {
            Ok(session) => print_health_item(
                "Server",
                true,
                &format!(
                    "{} (signed in as {})",
                    session.base_url(),
                    session.account().name
                ),
            ),
            Err(err) => print_health_item("Server", false, &err.to_string()),
        }
    } else {
        print_health_item("Server", false, &format!("{} (not checked)", config.server.url));
    }

    // 3. Render log
    let log_path = logger::render_log_path(&config.logging);
    let log_exists = log_path.as_ref().map(|p| p.exists()).unwrap_or(false);
    let log_entries = match (&log_path, log_exists) {
        (Some(path), true) => logger::read_all_entries(path).len(),
        _ => 0,
    };
    print_health_item(
        "Render log",
        config.logging.enabled,
        &if !config.logging.enabled {
            "disabled".to_string()
        } else if log_exists {
            format!("{} entries", format_number(log_entries))
        } else {
            "no log file yet".to_string()
        },
    );

    Ok(())
}

fn print_health_item(name: &str, ok: bool, detail: &str) {
    let status = if ok {
        "✓".green().bold()
    } else {
        "✗".red().bold()
    };
    println!("  {} {:<18} {}", status, name, detail.dimmed());
}

// ---------------------------------------------------------------------------
// speckle-activity history
// ---------------------------------------------------------------------------

/// Show past render passes from the render log.
pub fn run_history(config: &ActivityConfig, days: Option<u32>, format: OutputFormat) -> Result<()> {
    let Some(path) = logger::render_log_path(&config.logging) else {
        bail!("could not resolve render log path '{}'", config.logging.path);
    };
    let history = reporter::compute_history(&path, days);

    if history.total_renders == 0 {
        println!(
            "{}",
            "No render history yet. Open the dashboard or run a report first.".yellow()
        );
        return Ok(());
    }

    match format {
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&history)?),
        OutputFormat::Csv => print_history_csv(&history),
        OutputFormat::Table => print_history_table(&history, days),
    }
    Ok(())
}

fn print_history_table(history: &History, days: Option<u32>) {
    let title = match days {
        Some(days) => format!("Render History: Last {days} Days"),
        None => "Render History".to_string(),
    };
    println!("{}", title.bold().cyan());
    println!("{}", "=".repeat(50));

    let states = &history.states;
    println!("  {} {}", "Render passes:".bold(), format_number(history.total_renders));
    println!("  {} {}ms", "Avg duration: ".bold(), history.avg_duration_ms);
    println!(
        "  Loaded: {} ({:.0}%)  Awaiting input: {} ({:.0}%)  Failed: {} ({:.0}%)",
        states.loaded,
        states.pct(states.loaded),
        states.awaiting_input,
        states.pct(states.awaiting_input),
        states.failed,
        states.pct(states.failed),
    );
    println!();

    if !history.error_kinds.is_empty() {
        println!("{}", "Failures by Kind".bold().cyan());
        for (kind, count) in &history.error_kinds {
            println!("  {:<20} {:>6}", kind.red(), count);
        }
        println!();
    }

    if !history.stream_stats.is_empty() {
        println!("{}", "Streams".bold().cyan());
        println!(
            "  {:<28} {:>8} {:>8} {:>8}",
            "Stream", "Renders", "Failed", "Commits"
        );
        println!("  {}", "-".repeat(56));
        for stat in history.stream_stats.iter().take(15) {
            println!(
                "  {:<28} {:>8} {:>8} {:>8}",
                truncate(&stat.stream, 28),
                stat.renders,
                stat.failures,
                stat.last_commits.map(format_number).unwrap_or_else(|| "-".to_string()),
            );
        }
        println!();
    }

    println!("{}", "Daily".bold().cyan());
    println!(
        "  {:<12} {:>8} {:>8} {:>10}",
        "Date", "Renders", "Failed", "Avg ms"
    );
    println!("  {}", "-".repeat(42));
    for day in &history.daily {
        println!(
            "  {:<12} {:>8} {:>8} {:>10}",
            day.date, day.renders, day.failures, day.avg_duration_ms
        );
    }
}

fn print_history_csv(history: &History) {
    println!("date,renders,failures,avg_duration_ms");
    for day in &history.daily {
        println!(
            "{},{},{},{}",
            day.date, day.renders, day.failures, day.avg_duration_ms
        );
    }
}

// ---------------------------------------------------------------------------
// speckle-activity config show | init | set | reset
// ---------------------------------------------------------------------------

/// Show the effective (merged) configuration as TOML, token redacted.
pub fn run_config_show(config: &ActivityConfig) -> Result<()> {
    let toml_str = config::show_effective_config(config)?;
    println!("{}", "Effective speckle-activity Configuration".bold().cyan());
    println!("{}", "=".repeat(50));
    println!();
    println!("{toml_str}");

    let global_exists = config::global_config_file()
        .map(|p| p.exists())
        .unwrap_or(false);
    let project_exists = config::project_config_file()
        .map(|p| p.exists())
        .unwrap_or(false);
    println!("{}", "Sources (highest priority last):".dimmed());
    println!("  {} built-in defaults", "·".dimmed());
    print_source("~/.speckle-activity/config.toml", global_exists);
    print_source(".speckle-activity.toml", project_exists);
    println!(
        "  {} {}",
        "·".dimmed(),
        "SPECKLE_* environment variables".dimmed()
    );

    Ok(())
}

fn print_source(label: &str, exists: bool) {
    if exists {
        println!("  {} {}", "✓".green(), label.dimmed());
    } else {
        println!("  {} {}", "·".dimmed(), format!("{label} (not found)").dimmed());
    }
}

/// Initialize a default config file at `~/.speckle-activity/config.toml`.
pub fn run_config_init(force: bool) -> Result<()> {
    let path = config::init_config(force)?;
    println!(
        "{} Config written to {}",
        "✓".green().bold(),
        path.display()
    );
    println!(
        "  {}",
        "Set your access token with `speckle-activity config set server.token <TOKEN>`.".dimmed()
    );
    Ok(())
}

/// Set a single configuration value in the global config file.
pub fn run_config_set(key: &str, value: &str) -> Result<()> {
    config::set_config_value(key, value)?;
    let shown = if key == "server.token" {
        crate::config::schema::REDACTED
    } else {
        value
    };
    println!("{} Set {} = {}", "✓".green().bold(), key.bold(), shown);
    Ok(())
}

/// Reset configuration to defaults.
pub fn run_config_reset() -> Result<()> {
    let path = config::reset_config()?;
    println!(
        "{} Config reset to defaults at {}",
        "✓".green().bold(),
        path.display()
    );
    Ok(())
}

// ---------------------------------------------------------------------------
// Formatting helpers
// ---------------------------------------------------------------------------

/// Format a number with comma separators for readability.
fn format_number(n: usize) -> String {
    let s = n.to_string();
    let mut result = String::new();
    for (i, ch) in s.chars().rev().enumerate() {
        if i > 0 && i % 3 == 0 {
            result.push(',');
        }
        result.push(ch);
    }
    result.chars().rev().collect()
}

/// Truncate a string to `max_len` characters, appending "…" if truncated.
fn truncate(s: &str, max_len: usize) -> String {
    if s.chars().count() <= max_len {
        s.to_string()
    } else {
        let kept: String = s.chars().take(max_len.saturating_sub(1)).collect();
        format!("{kept}…")
    }
}

/// Horizontal bar of `count / max * width` block characters.
fn bar(count: usize, max: usize, width: usize) -> String {
    if max == 0 {
        return String::new();
    }
    let len = (count * width).div_ceil(max).min(width);
    "█".repeat(len)
}

/// Quote a CSV field when it contains a separator, quote or newline.
fn csv_field(s: &str) -> String {
    if s.contains([',', '"', '\n']) {
        format!("\"{}\"", s.replace('"', "\"\""))
    } else {
        s.to_string()
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
