//! `focus`: task list and focus-session tracker.
//!
//! Runs in local mode (data in a JSON file) unless both a server URL and an
//! owner are configured, in which case tasks sync through the server.
//!
//! ```bash
//! # Local mode
//! cargo run --bin focus -- add write the report
//! cargo run --bin focus -- list
//! cargo run --bin focus -- log 25 --task "write the report"
//!
//! # Synced mode
//! cargo run --bin focus -- --server-url http://127.0.0.1:8080 --owner alice list
//! FOCUS_SERVER_URL=http://127.0.0.1:8080 FOCUS_OWNER=alice cargo run --bin focus -- watch
//! ```

use std::path::Path;
use std::process::ExitCode;

use clap::Parser;
use tracing_appender::non_blocking::WorkerGuard;

use focus::FocusError;
use focus::config::{CliArgs, ClientConfig, Command};
use focus::remote::follow;
use focus::stats::DerivedStats;
use focus::tasks::{TaskBackend, TaskTally};
use focus::workspace::Workspace;
use focus_proto::channel::ChannelMessage;
use focus_proto::session::FocusSession;
use focus_proto::settings::{SettingsPatch, UserSettings};
use focus_proto::task::{SyncEvent, Task, TaskId};

#[tokio::main]
async fn main() -> ExitCode {
    let cli = CliArgs::parse();

    let config = match ClientConfig::load(&cli) {
        Ok(c) => c,
        Err(e) => {
            eprintln!("Warning: failed to load config file: {e}");
            ClientConfig::from_cli(&cli)
        }
    };

    let _log_guard = init_logging(&cli.log_level, cli.log_file.as_deref());
    tracing::info!("focus starting");

    let workspace = match Workspace::open(&config) {
        Ok(w) => w,
        Err(e) => {
            eprintln!("error: {e}");
            return ExitCode::FAILURE;
        }
    };

    let command = cli.command.clone().unwrap_or(Command::List);
    match run(&workspace, command, &config).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            tracing::error!(error = %e, "command failed");
            eprintln!("error: {e}");
            if e.is_retryable() {
                eprintln!("the server may be temporarily unavailable, try again");
            }
            ExitCode::FAILURE
        }
    }
}

/// Initialize file-based logging so stdout stays free for command output.
///
/// Returns a [`WorkerGuard`] that must be held until shutdown so buffered
/// entries are flushed.
fn init_logging(level: &str, file_path: Option<&Path>) -> Option<WorkerGuard> {
    let default_path = std::env::temp_dir().join("focus.log");
    let log_path = file_path.unwrap_or(&default_path);

    let log_dir = log_path.parent()?;
    let file_name = log_path.file_name()?.to_str()?;

    let file_appender = tracing_appender::rolling::never(log_dir, file_name);
    let (non_blocking, guard) = tracing_appender::non_blocking(file_appender);

    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(level));

    tracing_subscriber::fmt()
        .with_writer(non_blocking)
        .with_env_filter(env_filter)
        .with_ansi(false)
        .init();

    Some(guard)
}

async fn run(workspace: &Workspace, command: Command, config: &ClientConfig) -> Result<(), FocusError> {
    match command {
        Command::Add { text } => {
            let task = workspace.add_task(&text.join(" ")).await?;
            println!("added {}", format_task(&task));
        }
        Command::Done { id } => {
            let task = workspace.toggle_done(&TaskId::from_string(id)).await?;
            println!("{}", format_task(&task));
        }
        Command::Edit { id, text } => {
            let task = workspace
                .edit_text(&TaskId::from_string(id), &text.join(" "))
                .await?;
            println!("{}", format_task(&task));
        }
        Command::Rm { id } => {
            workspace.remove_task(&TaskId::from_string(id.clone())).await?;
            println!("removed {id}");
        }
        Command::List => print_tasks(&workspace.list_tasks().await?),
        Command::Log { minutes, task } => {
            let session = workspace.record_session(task.as_deref(), minutes).await?;
            println!("logged {}", format_session(&session));
        }
        Command::Sessions { limit } => {
            for session in workspace.list_sessions(limit).await? {
                println!("{}", format_session(&session));
            }
        }
        Command::Stats => print_stats(&workspace.stats().await?),
        Command::Settings {
            pomodoro,
            short_break,
            long_break,
            sound,
            notify,
        } => {
            let patch = SettingsPatch {
                default_pomodoro: pomodoro,
                short_break,
                long_break,
                sound_enabled: sound,
                notify_enabled: notify,
            };
            let settings = if patch == SettingsPatch::default() {
                workspace.settings().await?
            } else {
                workspace.update_settings(&patch).await?
            };
            print_settings(&settings);
        }
        Command::Watch => watch(workspace, config.channel_capacity).await?,
    }
    Ok(())
}

async fn watch(workspace: &Workspace, capacity: usize) -> Result<(), FocusError> {
    let Workspace::Synced { coordinator, .. } = workspace else {
        return Err(FocusError::InvalidInput(
            "watch requires --server-url and --owner".to_string(),
        ));
    };
    let stream = workspace.subscribe(capacity).await?;
    print_tasks(&coordinator.list_tasks().await?);
    println!(
        "watching {} ({} connection(s)), Ctrl-C to stop",
        stream.owner(),
        stream.connections_at_join()
    );

    follow(&stream, coordinator, |msg| match msg {
        ChannelMessage::Event(SyncEvent::Created(task) | SyncEvent::Updated(task)) => {
            println!("{:<13} {}", event_name(msg), format_task(task));
        }
        ChannelMessage::Event(SyncEvent::Deleted { id }) => {
            println!("{:<13} {id}", event_name(msg));
        }
        ChannelMessage::SessionCreated(session) => {
            println!("{:<13} {}", "session", format_session(session));
        }
        _ => {}
    })
    .await;
    println!("disconnected; run `focus list` to catch up");
    Ok(())
}

fn event_name(msg: &ChannelMessage) -> &'static str {
    match msg {
        ChannelMessage::Event(event) => event.name(),
        _ => "",
    }
}

fn format_task(task: &Task) -> String {
    let mark = if task.done { "x" } else { " " };
    format!("[{mark}] {}  {}", task.id, task.text)
}

fn format_session(session: &FocusSession) -> String {
    let when = session
        .completed_at
        .with_timezone(&chrono::Local)
        .format("%Y-%m-%d %H:%M");
    match &session.task {
        Some(label) => format!("{when}  {:>3} min  {label}", session.minutes),
        None => format!("{when}  {:>3} min", session.minutes),
    }
}

fn print_tasks(tasks: &[Task]) {
    if tasks.is_empty() {
        println!("no tasks");
        return;
    }
    for task in tasks {
        println!("{}", format_task(task));
    }
    let tally = TaskTally::of(tasks);
    println!("{} done, {} remaining", tally.completed, tally.remaining);
}

fn print_stats(stats: &DerivedStats) {
    println!(
        "total  {} sessions, {} min ({:.1} h)",
        stats.total_sessions, stats.total_minutes, stats.total_hours
    );
    println!(
        "today  {} sessions, {} min",
        stats.today_sessions, stats.today_minutes
    );
    println!(
        "week   {} sessions, {} min",
        stats.week_sessions, stats.week_minutes
    );
    println!("streak {} day(s)", stats.streak);
}

fn print_settings(settings: &UserSettings) {
    println!("pomodoro     {} min", settings.default_pomodoro);
    println!("short break  {} min", settings.short_break);
    println!("long break   {} min", settings.long_break);
    println!("sound        {}", on_off(settings.sound_enabled));
    println!("notify       {}", on_off(settings.notify_enabled));
}

const fn on_off(flag: bool) -> &'static str {
    if flag { "on" } else { "off" }
}
