//! Brewdoro - Pomodoro session client.
//!
//! # Commands
//!
//! - `brewdoro tasks`: list the user's tasks
//! - `brewdoro task add|update|delete|complete`: manage tasks
//! - `brewdoro start`: run Pomodoros for a task in the terminal
//!
//! # Environment Variables
//!
//! See the [`config`](brewdoro_client::config) module for available options.

use std::sync::Arc;

use anyhow::{bail, Context, Result};
use clap::{Args, Parser, Subcommand};
use tokio::signal;
use tokio::sync::oneshot;
use tracing::{info, warn};

use brewdoro_client::api::{ApiClient, SessionApi};
use brewdoro_client::config::Config;
use brewdoro_client::controller::{Controller, Settings, TaskRef};
use brewdoro_client::error::TuiError;
use brewdoro_client::logging;
use brewdoro_client::runner::{command_channel, Headless, Runner};
use brewdoro_client::tui::{install_panic_hook, InputHandler, TuiFrontend};
use brewdoro_client::types::{NewTask, Task, TaskStatus, TaskUpdate};

/// Title used for an offline focus with no task.
const DEFAULT_LOCAL_TITLE: &str = "Pomodoro";

/// Brewdoro - Pomodoro session client.
///
/// Runs focus and break sessions for your tasks and records them with the
/// Brewdoro API.
#[derive(Parser, Debug)]
#[command(name = "brewdoro")]
#[command(author, version, about, long_about = None)]
#[command(after_help = "\
ENVIRONMENT VARIABLES:
    BREWDORO_API_URL               API base URL (default: http://localhost:8080/api/v1)
    BREWDORO_USER_ID               User owning tasks and sessions (default: 123)
    BREWDORO_FOCUS_MINUTES         Focus length (default: 25)
    BREWDORO_BREAK_MINUTES         Break length (default: 5)
    BREWDORO_REQUEST_TIMEOUT_SECS  HTTP timeout (default: 30)
    BREWDORO_AUTO_CHAIN            Chain Pomodoros after a break (default: true)
    BREWDORO_LOG_DIR               TUI log directory (default: ~/.brewdoro)

EXAMPLES:
    # List your tasks
    brewdoro tasks

    # Run Pomodoros for task 42 in the terminal UI
    brewdoro start --task 42

    # Run one 50/10 Pomodoro without a terminal UI
    brewdoro start --task 42 --focus 50 --break 10 --no-chain --headless

    # Run a local timer without contacting the API
    brewdoro start --offline
")]
struct Cli {
    /// User to act as, overriding BREWDORO_USER_ID.
    #[arg(long, global = true)]
    user: Option<String>,

    #[command(subcommand)]
    command: Command,
}

/// CLI subcommands.
#[derive(Subcommand, Debug)]
enum Command {
    /// List the user's tasks.
    Tasks,

    /// Create, edit, delete or complete a task.
    #[command(subcommand)]
    Task(TaskCommand),

    /// Run Pomodoros for a task.
    ///
    /// Without --task, the first task that is not completed is used.
    Start(StartArgs),
}

#[derive(Subcommand, Debug)]
enum TaskCommand {
    /// Create a task.
    Add {
        title: String,
        #[arg(short, long)]
        description: Option<String>,
        #[arg(short, long)]
        project: Option<String>,
    },

    /// Change a task's title, description or status.
    Update {
        id: String,
        #[arg(short, long)]
        title: Option<String>,
        #[arg(short, long)]
        description: Option<String>,
        /// PENDING, IN_PROGRESS, PAUSED or COMPLETED.
        #[arg(short, long)]
        status: Option<String>,
    },

    /// Delete a task.
    Delete { id: String },

    /// Mark a task as completed.
    Complete { id: String },
}

#[derive(Args, Debug)]
struct StartArgs {
    /// Task to focus on.
    #[arg(short, long)]
    task: Option<String>,

    /// Focus length in minutes.
    #[arg(long, value_parser = clap::value_parser!(u32).range(1..=240))]
    focus: Option<u32>,

    /// Break length in minutes.
    #[arg(long = "break", value_parser = clap::value_parser!(u32).range(1..=120))]
    break_minutes: Option<u32>,

    /// Stop after one Pomodoro instead of chaining the next one.
    #[arg(long)]
    no_chain: bool,

    /// Log progress instead of drawing the terminal UI.
    #[arg(long)]
    headless: bool,

    /// Run a local timer without contacting the API.
    #[arg(long)]
    offline: bool,
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    let mut config = Config::from_env().context("Failed to load configuration")?;
    if let Some(user) = cli.user {
        config.user_id = user;
    }

    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .context("Failed to create tokio runtime")?;

    match cli.command {
        Command::Tasks => {
            logging::init_stderr();
            runtime.block_on(run_list(&config))
        }
        Command::Task(command) => {
            logging::init_stderr();
            runtime.block_on(run_task(&config, command))
        }
        Command::Start(args) => runtime.block_on(run_start(config, args)),
    }
}

fn api_client(config: &Config) -> Result<ApiClient> {
    ApiClient::new(&config.api_url, config.request_timeout)
        .with_context(|| format!("Invalid API URL: {}", config.api_url))
}

/// Prints the user's tasks as a table.
async fn run_list(config: &Config) -> Result<()> {
    let api = api_client(config)?;
    let tasks = api
        .tasks_for_user(&config.user_id)
        .await
        .context("Failed to fetch tasks")?;

    if tasks.is_empty() {
        println!("No tasks for user {}.", config.user_id);
        return Ok(());
    }

    println!("{:<8} {:<12} {:>9} {:>7}  TITLE", "ID", "STATUS", "POMODOROS", "MINUTES");
    for task in &tasks {
        println!(
            "{:<8} {:<12} {:>9} {:>7}  {}",
            task.id,
            task.status.label(),
            task.pomodoros_completed,
            task.total_focus_minutes,
            task.title
        );
    }
    Ok(())
}

async fn run_task(config: &Config, command: TaskCommand) -> Result<()> {
    let api = api_client(config)?;

    match command {
        TaskCommand::Add {
            title,
            description,
            project,
        } => {
            let task = api
                .create_task(&NewTask {
                    user_id: config.user_id.clone(),
                    title,
                    description,
                    project_id: project,
                })
                .await
                .context("Failed to create task")?;
            println!("Created task {}: {}", task.id, task.title);
        }

        TaskCommand::Update {
            id,
            title,
            description,
            status,
        } => {
            let update = TaskUpdate {
                title,
                description,
                status: status.map(TaskStatus::from),
            };
            if update.is_empty() {
                bail!("Nothing to update; pass --title, --description or --status");
            }
            let task = api
                .update_task(&id, &update)
                .await
                .with_context(|| format!("Failed to update task {id}"))?;
            println!("Updated task {}: {} ({})", task.id, task.title, task.status);
        }

        TaskCommand::Delete { id } => {
            api.delete_task(&id)
                .await
                .with_context(|| format!("Failed to delete task {id}"))?;
            println!("Deleted task {id}");
        }

        TaskCommand::Complete { id } => {
            let mut controller = Controller::new(Settings::from(config));
            let request = controller.complete_task(&id);
            controller
                .drive(&api, request)
                .await
                .with_context(|| format!("Failed to complete task {id}"))?;
            println!("Completed task {id}");
        }
    }
    Ok(())
}

/// Picks the task to run: the requested one, or the first open task.
fn select_task(tasks: &[Task], requested: Option<&str>) -> Result<TaskRef> {
    let task = match requested {
        Some(id) => tasks.iter().find(|t| t.id == id).with_context(|| {
            let known: Vec<&str> = tasks.iter().map(|t| t.id.as_str()).collect();
            format!("Task {id} not found (known tasks: {})", known.join(", "))
        })?,
        None => tasks
            .iter()
            .find(|t| t.status != TaskStatus::Completed)
            .context("No open task; create one with `brewdoro task add`")?,
    };
    Ok(TaskRef::from(task))
}

/// Runs Pomodoros until the chain ends (headless) or the user quits (TUI).
async fn run_start(config: Config, args: StartArgs) -> Result<()> {
    let mut settings = Settings::from(&config);
    if let Some(focus) = args.focus {
        settings.focus_minutes = focus;
    }
    if let Some(minutes) = args.break_minutes {
        settings.break_minutes = minutes;
    }
    if args.no_chain {
        settings.auto_chain = false;
    }

    if args.headless {
        logging::init_stderr();
    } else {
        let path = logging::init_file(&config.log_dir).with_context(|| {
            format!("Failed to open log file in {}", config.log_dir.display())
        })?;
        eprintln!("Logging to {}", path.display());
    }

    info!(
        api_url = %config.api_url,
        user_id = %settings.user_id,
        focus_minutes = settings.focus_minutes,
        break_minutes = settings.break_minutes,
        auto_chain = settings.auto_chain,
        offline = args.offline,
        "Starting Brewdoro"
    );

    let api = Arc::new(api_client(&config)?);
    let mut controller = Controller::new(settings);

    let initial = if args.offline {
        let title = args.task.as_deref().unwrap_or(DEFAULT_LOCAL_TITLE);
        controller
            .start_local(title)
            .context("Failed to start local timer")?;
        None
    } else {
        let tasks = api
            .tasks_for_user(&config.user_id)
            .await
            .context("Failed to fetch tasks")?;
        let task = select_task(&tasks, args.task.as_deref())?;
        info!(task_id = %task.id, title = %task.title, "Task selected");
        Some(
            controller
                .start_task(task)
                .context("Failed to start session")?,
        )
    };

    if args.headless {
        let mut runner = Runner::new(controller, api, Headless::new()).exit_when_idle(true);
        if let Some(request) = initial {
            runner.submit(request);
        }
        // No interactive commands without a terminal.
        let (_, commands) = command_channel();
        runner.run(commands, wait_for_shutdown()).await?;
        info!("Brewdoro stopped");
        return Ok(());
    }

    install_panic_hook();
    let frontend = TuiFrontend::new()?;

    let (command_tx, commands) = command_channel();
    let (shutdown_tx, shutdown_rx) = oneshot::channel();
    let input = tokio::spawn(InputHandler::new(command_tx, shutdown_rx).run());

    let mut runner = Runner::new(controller, api, frontend);
    if let Some(request) = initial {
        runner.submit(request);
    }
    let result = runner.run(commands, wait_for_shutdown()).await;

    let _ = shutdown_tx.send(());
    match input.await {
        Ok(Ok(())) => {}
        Ok(Err(e)) => warn!(error = %e, "Input handler failed"),
        Err(e) => warn!(error = %TuiError::Event(e.to_string()), "Input handler task failed"),
    }

    let controller = result?;
    if let Some(cycle) = controller.context().last_cycle {
        println!(
            "Pomodoros completed: {} (cycles: {})",
            cycle.total_pomodoros, cycle.cycles_done
        );
    }
    info!("Brewdoro stopped");
    Ok(())
}

/// Waits for a shutdown signal (SIGINT or SIGTERM).
async fn wait_for_shutdown() {
    let ctrl_c = async {
        signal::ctrl_c()
            .await
            .expect("Failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("Failed to install SIGTERM handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
}
