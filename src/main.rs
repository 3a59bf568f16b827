mod commands;
mod console;

use clap::{Parser, Subcommand};
use commands::{DelayAction, JobsAction, SendKind};
use console::Console;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};
use uazdash_core::{
    config::{self, shellexpand, DashboardConfig},
    message::HistoryRange,
};

#[derive(Parser)]
#[command(
    name = "uazdash",
    version,
    about = "Operator console for WhatsApp instances on the UAZ API gateway"
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Path to config file.
    #[arg(short, long, default_value = "config.toml")]
    config: String,
}

#[derive(Subcommand)]
enum Commands {
    /// List instances known to the backend.
    Instances,
    /// Show the live status of one instance.
    Status { id: i64 },
    /// Pair an instance by scanning its QR code.
    Pair { id: i64 },
    /// Follow job status changes and instance connectivity.
    Watch {
        /// Instance to watch for connection; repeatable.
        #[arg(long = "instance")]
        instances: Vec<i64>,
    },
    /// Send a message through an instance.
    Send {
        instance_id: i64,
        number: String,
        /// Text block sent after the main one; repeatable.
        #[arg(long)]
        then: Vec<String>,
        #[command(subcommand)]
        kind: SendKind,
    },
    /// Manage sending jobs.
    Jobs {
        #[command(subcommand)]
        action: JobsAction,
    },
    /// Show or change send delays.
    Delay {
        #[command(subcommand)]
        action: DelayAction,
    },
    /// Show sent message history.
    History {
        /// today, 7d, 30d or YYYY-MM-DD..YYYY-MM-DD.
        #[arg(long, default_value = "today")]
        range: HistoryRange,
        /// Maximum rows; 100 when omitted.
        #[arg(long)]
        limit: Option<u32>,
    },
    /// Show recent audit log entries.
    Audit {
        #[arg(long, default_value_t = 20)]
        limit: i64,
    },
}

/// Stderr logging plus an optional daily log file under `{data_dir}/logs`.
///
/// The returned guard flushes the file writer on drop; keep it alive.
fn init_logging(cfg: &DashboardConfig) -> Option<WorkerGuard> {
    let filter = || {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&cfg.log_level))
    };
    let stderr = fmt::layer().with_writer(std::io::stderr);

    if cfg.log_to_file {
        let dir = std::path::Path::new(&shellexpand(&cfg.data_dir)).join("logs");
        match std::fs::create_dir_all(&dir) {
            Ok(()) => {
                let appender = tracing_appender::rolling::daily(&dir, "uazdash.log");
                let (writer, guard) = tracing_appender::non_blocking(appender);
                tracing_subscriber::registry()
                    .with(filter())
                    .with(stderr)
                    .with(fmt::layer().with_ansi(false).with_writer(writer))
                    .init();
                return Some(guard);
            }
            Err(e) => eprintln!("cannot create log dir {}: {e}", dir.display()),
        }
    }

    tracing_subscriber::registry()
        .with(filter())
        .with(stderr)
        .init();
    None
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    let cfg = config::load(&cli.config)?;
    let _log_guard = init_logging(&cfg.dashboard);

    let console = Console::from_config(&cfg).await?;
    let result = match cli.command {
        Commands::Instances => commands::instances(&console).await,
        Commands::Status { id } => commands::status(&console, id).await,
        Commands::Pair { id } => commands::pair(&console, id).await,
        Commands::Watch { instances } => commands::watch(&console, instances).await,
        Commands::Send {
            instance_id,
            number,
            then,
            kind,
        } => commands::send(&console, instance_id, &number, kind, then).await,
        Commands::Jobs { action } => commands::jobs(&console.registry, action).await,
        Commands::Delay { action } => commands::delay(&console, action).await,
        Commands::History { range, limit } => commands::history(&console, range, limit).await,
        Commands::Audit { limit } => commands::audit(&console, limit).await,
    };
    console.shutdown();
    result
}
