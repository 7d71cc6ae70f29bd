use anyhow::Result;
use clap::{Args, Parser, Subcommand};

use speckle_activity::cli::{self, ConnectionArgs, OutputFormat};
use speckle_activity::{config, web};

#[derive(Debug, Parser)]
#[command(name = "speckle-activity")]
#[command(about = "Activity dashboard for Speckle streams")]
struct App {
    #[command(subcommand)]
    command: Commands,
}

/// Server and token flags shared by every command that talks to the server.
#[derive(Debug, Args)]
struct Connection {
    /// Server address (default: `[server] url` from config)
    #[arg(long)]
    server: Option<String>,
    /// Personal access token (default: `[server] token` or SPECKLE_TOKEN)
    #[arg(long)]
    token: Option<String>,
}

impl From<Connection> for ConnectionArgs {
    fn from(c: Connection) -> Self {
        Self {
            server: c.server,
            token: c.token,
        }
    }
}

#[derive(Debug, Subcommand)]
enum Commands {
    /// Serve the web dashboard
    Web {
        /// Bind address (default: `[web] addr`, 127.0.0.1:8501)
        #[arg(long)]
        addr: Option<String>,
        /// Don't open the dashboard in a browser
        #[arg(long)]
        no_browser: bool,
    },
    /// List streams visible to the account
    Streams {
        #[command(flatten)]
        connection: Connection,
        /// Output format: table (default), json, csv
        #[arg(long, default_value = "table")]
        format: String,
    },
    /// Show the stream activity report; lists streams when --stream is omitted
    Report {
        /// Stream name
        #[arg(long)]
        stream: Option<String>,
        #[command(flatten)]
        connection: Connection,
        /// Maximum commits to fetch (default: `[server] commit_limit`)
        #[arg(long)]
        limit: Option<usize>,
        /// Output format: table (default), json, csv
        #[arg(long, default_value = "table")]
        format: String,
    },
    /// Show commits per day for a stream
    Timeline {
        /// Stream name
        #[arg(long)]
        stream: String,
        #[command(flatten)]
        connection: Connection,
        /// Maximum commits to fetch (default: `[server] commit_limit`)
        #[arg(long)]
        limit: Option<usize>,
        /// Output format: table (default), json, csv
        #[arg(long, default_value = "table")]
        format: String,
    },
    /// Check config, token, server reachability and the render log
    Health,
    /// Show past render passes from the render log
    History {
        /// Only include the last N days of data
        #[arg(long)]
        days: Option<u32>,
        /// Output format: table (default), json, csv
        #[arg(long, default_value = "table")]
        format: String,
    },
    /// Manage configuration
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },
}

#[derive(Debug, Subcommand)]
enum ConfigAction {
    /// Show the effective configuration (token redacted)
    Show,
    /// Write the default config to ~/.speckle-activity/config.toml
    Init {
        /// Overwrite an existing file
        #[arg(long)]
        force: bool,
    },
    /// Set a dotted key, e.g. `server.commit_limit 50`
    Set { key: String, value: String },
    /// Reset the global config to defaults
    Reset,
}

fn main() -> Result<()> {
    let app = App::parse();
    let cfg = config::load();

    match app.command {
        Commands::Web { addr, no_browser } => {
            let addr = addr.unwrap_or_else(|| cfg.web.addr.clone());
            web::serve(&cfg, &addr, cfg.web.open_browser && !no_browser)
        }
        Commands::Streams { connection, format } => {
            let fmt = OutputFormat::from_str_opt(Some(&format));
            cli::run_streams(&cfg, &connection.into(), fmt)
        }
        Commands::Report {
            stream,
            connection,
            limit,
            format,
        } => {
            let fmt = OutputFormat::from_str_opt(Some(&format));
            cli::run_report(&cfg, &connection.into(), stream.as_deref(), limit, fmt)
        }
        Commands::Timeline {
            stream,
            connection,
            limit,
            format,
        } => {
            let fmt = OutputFormat::from_str_opt(Some(&format));
            cli::run_timeline(&cfg, &connection.into(), &stream, limit, fmt)
        }
        Commands::Health => cli::run_health(&cfg),
        Commands::History { days, format } => {
            let fmt = OutputFormat::from_str_opt(Some(&format));
            cli::run_history(&cfg, days, fmt)
        }
        Commands::Config { action } => match action {
            ConfigAction::Show => cli::run_config_show(&cfg),
            ConfigAction::Init { force } => cli::run_config_init(force),
            ConfigAction::Set { key, value } => cli::run_config_set(&key, &value),
            ConfigAction::Reset => cli::run_config_reset(),
        },
    }
}
