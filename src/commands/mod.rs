//! Command handlers: one function per CLI subcommand.

pub mod format;
pub mod media;


use crate::console::{Console, PairingResult, ReconcileOutcome};
use anyhow::Context;
use clap::{Args, Subcommand, ValueEnum};
use format::*;
use std::path::PathBuf;
use tokio::task::JoinHandle;
use tracing::warn;
use uazdash_client::qr::{prepare_qr, QrDisplay};
use uazdash_core::{
    delay::{DelayConfig, DelayPreset},
    job::{JobStatus, SendingJob},
    message::{HistoryFilter, HistoryRange, MediaKind, MenuType, OutboundMessage},
    notify::Notifier,
};
use uazdash_store::JobRegistry;

// ---------------------------------------------------------------------------
// Argument types
// ---------------------------------------------------------------------------

#[derive(Debug, Subcommand)]
pub enum SendKind {
    /// Plain text.
    Text {
        #[arg(trailing_var_arg = true, required = true)]
        text: Vec<String>,
    },
    /// Image from a URL or local file (max 5 MB).
    Image(MediaArgs),
    /// Video from a URL or local file (max 16 MB).
    Video(MediaArgs),
    /// Document from a URL or local file (max 100 MB).
    Document(MediaArgs),
    /// Audio from a URL or local file (max 16 MB).
    Audio(MediaArgs),
    /// Interactive menu: buttons, list or poll.
    Menu {
        #[arg(value_enum)]
        menu_type: MenuArg,
        text: String,
        /// Menu option; repeat for each choice.
        #[arg(long = "choice", required = true)]
        choices: Vec<String>,
        #[arg(long)]
        footer: Option<String>,
        /// Button label that opens a list menu.
        #[arg(long)]
        list_button: Option<String>,
        /// Number of options a poll voter may pick.
        #[arg(long)]
        selectable_count: Option<u32>,
    },
    /// Carousel of cards read from a JSON file.
    Carousel {
        text: String,
        #[arg(long)]
        cards: PathBuf,
    },
}

#[derive(Debug, Args)]
pub struct MediaArgs {
    /// http(s) URL or path to a local file.
    pub source: String,
    #[arg(long)]
    pub caption: Option<String>,
}

#[derive(Debug, Clone, Copy, ValueEnum)]
pub enum MenuArg {
    Button,
    List,
    Poll,
}

impl From<MenuArg> for MenuType {
    fn from(arg: MenuArg) -> Self {
        match arg {
            MenuArg::Button => MenuType::Button,
            MenuArg::List => MenuType::List,
            MenuArg::Poll => MenuType::Poll,
        }
    }
}

#[derive(Debug, Subcommand)]
pub enum JobsAction {
    /// List all jobs.
    List,
    /// Pause a sending job.
    Pause { id: String },
    /// Resume a paused job.
    Resume { id: String },
    /// Cancel a sending or paused job.
    Cancel { id: String },
    /// Remove a job from the list, whatever its status.
    Remove { id: String },
    /// Remove all completed, failed and cancelled jobs.
    Clear,
}

#[derive(Debug, Subcommand)]
pub enum DelayAction {
    /// Show the saved delay config.
    Show,
    /// Apply a preset: rapido, normal, seguro or muito_seguro.
    Preset {
        name: DelayPreset,
        /// Persist the preset; without it the preset is only previewed.
        #[arg(long)]
        save: bool,
    },
    /// Save a custom config. Every field is replaced.
    Set {
        #[arg(long)]
        before: f64,
        #[arg(long)]
        between: f64,
        #[arg(long)]
        chars: f64,
        #[arg(long)]
        safe_mode: bool,
        #[arg(long)]
        randomize: bool,
        #[arg(long, default_value_t = 0.0)]
        variation: f64,
    },
}

// ---------------------------------------------------------------------------
// Handlers
// ---------------------------------------------------------------------------

/// Print notifications as they arrive until aborted.
pub fn spawn_printer(notifier: &Notifier) -> JoinHandle<()> {
    let mut rx = notifier.subscribe();
    tokio::spawn(async move {
        loop {
            match rx.recv().await {
                Ok(n) => println!("{}", format_notification(&n)),
                Err(tokio::sync::broadcast::error::RecvError::Lagged(n)) => {
                    warn!("notification printer skipped {n} message(s)")
                }
                Err(tokio::sync::broadcast::error::RecvError::Closed) => break,
            }
        }
    })
}

pub async fn instances(console: &Console) -> anyhow::Result<()> {
    let list = console.backend.list_instances().await?;
    print!("{}", format_instances(&list));
    Ok(())
}

pub async fn status(console: &Console, instance_id: i64) -> anyhow::Result<()> {
    let status = console.backend.instance_status(instance_id).await?;
    print!("{}", format_status(instance_id, &status));
    Ok(())
}

pub async fn pair(console: &Console, instance_id: i64) -> anyhow::Result<()> {
    let printer = spawn_printer(&console.notifier);
    let data_dir = PathBuf::from(&console.data_dir);
    println!("Pairing instance {instance_id}. Scan the QR code with WhatsApp > Linked devices.");

    let result = console
        .pairing()
        .run(instance_id, |qr| {
            if let Some(code) = &qr.paircode {
                println!("Pair code: {code}");
            }
            let Some(payload) = &qr.qrcode else { return };
            match prepare_qr(payload) {
                Ok(QrDisplay::Terminal(art)) => println!("\n{art}"),
                Ok(QrDisplay::Image { bytes, extension }) => {
                    let path = data_dir.join(format!("qrcode-{instance_id}.{extension}"));
                    let written = std::fs::create_dir_all(&data_dir)
                        .and_then(|_| std::fs::write(&path, bytes));
                    match written {
                        Ok(()) => println!("QR code written to {}", path.display()),
                        Err(e) => warn!("failed to write QR image {}: {e}", path.display()),
                    }
                }
                Err(e) => warn!("cannot render QR code: {e}"),
            }
        })
        .await;
    printer.abort();

    match result? {
        PairingResult::AlreadyConnected => {
            println!("Instance {instance_id} is already connected.")
        }
        PairingResult::Deleted => println!("Instance {instance_id} no longer exists."),
        PairingResult::Connected(outcome) => {
            println!("Instance {instance_id} connected.");
            match outcome {
                ReconcileOutcome::KeptExisting { kept, .. } => println!(
                    "This number was already connected on instance {kept}; use that instance."
                ),
                ReconcileOutcome::KeptCurrent { removed } => {
                    println!("Removed stale duplicate instance {removed}.")
                }
                ReconcileOutcome::Failed { reason } => {
                    println!("Duplicate check failed ({reason}); review the instance list.")
                }
                ReconcileOutcome::NoDuplicate => {}
            }
        }
    }
    Ok(())
}

pub async fn watch(console: &Console, instance_ids: Vec<i64>) -> anyhow::Result<()> {
    let printer = spawn_printer(&console.notifier);
    let handle = console.poller().watch_instances(instance_ids).start().await;
    println!("Watching jobs and instances. Press Ctrl+C to stop.");
    tokio::signal::ctrl_c()
        .await
        .context("failed to listen for Ctrl+C")?;
    handle.stop().await;
    printer.abort();
    Ok(())
}

/// Turn a send subcommand (plus follow-up texts) into outbound blocks.
pub async fn build_blocks(
    kind: SendKind,
    then: Vec<String>,
) -> anyhow::Result<Vec<OutboundMessage>> {
    let load = |kind: MediaKind, args: MediaArgs| async move {
        anyhow::Ok(OutboundMessage::Media {
            kind,
            source: media::load_media(kind, &args.source).await?,
            caption: args.caption,
        })
    };
    let first = match kind {
        SendKind::Text { text } => OutboundMessage::Text {
            text: text.join(" "),
        },
        SendKind::Image(args) => load(MediaKind::Image, args).await?,
        SendKind::Video(args) => load(MediaKind::Video, args).await?,
        SendKind::Document(args) => load(MediaKind::Document, args).await?,
        SendKind::Audio(args) => load(MediaKind::Audio, args).await?,
        SendKind::Menu {
            menu_type,
            text,
            choices,
            footer,
            list_button,
            selectable_count,
        } => OutboundMessage::Menu {
            menu_type: menu_type.into(),
            text,
            choices,
            footer_text: footer,
            list_button,
            selectable_count,
        },
        SendKind::Carousel { text, cards } => OutboundMessage::Carousel {
            text,
            cards: media::load_cards(&cards).await?,
        },
    };
    let mut blocks = vec![first];
    blocks.extend(then.into_iter().map(|text| OutboundMessage::Text { text }));
    Ok(blocks)
}

pub async fn send(
    console: &Console,
    instance_id: i64,
    number: &str,
    kind: SendKind,
    then: Vec<String>,
) -> anyhow::Result<()> {
    let blocks = build_blocks(kind, then).await?;
    let dispatcher = console.dispatcher().await?;
    let dispatch = dispatcher.dispatch(instance_id, number, blocks).await?;
    let started = dispatch.job.clone();
    println!(
        "Job {} started: {} block(s) to {}",
        short_id(&started.id),
        started.total_blocks,
        started.target_number
    );

    // The sender writes through its own registry handle; the poller sees
    // its changes through the console's handle and reports them.
    let mut notifications = console.notifier.subscribe();
    let poller = console
        .poller()
        .with_baseline(vec![started.clone()])
        .start()
        .await;

    let ctrl_c = tokio::signal::ctrl_c();
    tokio::pin!(ctrl_c);
    let mut handle = dispatch.handle;
    let mut cancelling = false;
    let final_status = loop {
        tokio::select! {
            res = &mut handle => break res.context("send task failed")?,
            Ok(n) = notifications.recv() => println!("{}", format_notification(&n)),
            _ = &mut ctrl_c, if !cancelling => {
                cancelling = true;
                console.registry.set_status(&started.id, JobStatus::Cancelled).await?;
                println!("Cancelling; waiting for the current block to finish...");
            }
        }
    };
    poller.stop().await;
    while let Ok(n) = notifications.try_recv() {
        println!("{}", format_notification(&n));
    }

    let jobs = console.registry.reload().await?;
    match jobs.into_iter().find(|j| j.id == started.id) {
        Some(job) => print!("{}", format_jobs(&[job])),
        None => println!("Job {} ended: {final_status}", short_id(&started.id)),
    }
    Ok(())
}

/// Find a job by full id or unique id prefix.
pub fn resolve_job<'a>(jobs: &'a [SendingJob], id: &str) -> anyhow::Result<&'a SendingJob> {
    let matches: Vec<&SendingJob> = jobs.iter().filter(|j| j.id.starts_with(id)).collect();
    match matches.as_slice() {
        [job] => Ok(job),
        [] => anyhow::bail!("no job matches '{id}'"),
        _ => anyhow::bail!("'{id}' matches {} jobs; use a longer prefix", matches.len()),
    }
}

pub async fn jobs(registry: &JobRegistry, action: JobsAction) -> anyhow::Result<()> {
    let jobs = registry.reload().await?;
    let (id, target) = match action {
        JobsAction::List => {
            print!("{}", format_jobs(&jobs));
            return Ok(());
        }
        JobsAction::Clear => {
            let removed = registry.clear_finished().await?;
            println!("Removed {removed} finished job(s).");
            return Ok(());
        }
        JobsAction::Remove { id } => {
            let job = resolve_job(&jobs, &id)?;
            registry.remove(&job.id).await?;
            println!("Removed job {}.", short_id(&job.id));
            return Ok(());
        }
        JobsAction::Pause { id } => (id, JobStatus::Paused),
        JobsAction::Resume { id } => (id, JobStatus::Sending),
        JobsAction::Cancel { id } => (id, JobStatus::Cancelled),
    };
    let job = resolve_job(&jobs, &id)?;
    if registry.set_status(&job.id, target).await? {
        println!("Job {} is now {target}.", short_id(&job.id));
    } else {
        println!(
            "Job {} is {}; it cannot become {target}.",
            short_id(&job.id),
            job.status
        );
    }
    Ok(())
}

pub async fn delay(console: &Console, action: DelayAction) -> anyhow::Result<()> {
    match action {
        DelayAction::Show => {
            print!("{}", format_delay(&console.store.load_delay_config().await?));
        }
        DelayAction::Preset { name, save } => {
            let config = name.config();
            print!("{}", format_delay(&config));
            if save {
                console.store.save_delay_config(&config).await?;
                println!("Saved.");
            } else {
                println!("Not saved; rerun with --save to keep it.");
            }
        }
        DelayAction::Set {
            before,
            between,
            chars,
            safe_mode,
            randomize,
            variation,
        } => {
            let config = DelayConfig {
                delay_before_sending: before,
                delay_between_messages: between,
                delay_between_chars: chars,
                enable_safe_mode: safe_mode,
                randomize_delays: randomize,
                max_random_variation: variation,
            };
            console.store.save_delay_config(&config).await?;
            print!("{}", format_delay(&config));
            println!("Saved.");
        }
    }
    Ok(())
}

pub async fn history(
    console: &Console,
    range: HistoryRange,
    limit: Option<u32>,
) -> anyhow::Result<()> {
    let mut filter = HistoryFilter::new(range);
    if let Some(limit) = limit {
        filter.limit = limit;
    }
    let messages = console.backend.history(&filter).await?;
    print!("{}", format_history(&messages));
    Ok(())
}

pub async fn audit(console: &Console, limit: i64) -> anyhow::Result<()> {
    let records = console.audit.recent(limit).await?;
    print!("{}", format_audit(&records));
    Ok(())
}
