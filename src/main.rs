//! `queuectl` command-line entry point.

use std::path::PathBuf;

use anyhow::{bail, Context};
use clap::{Args, Parser, Subcommand};
use tracing::{debug, info};

use queuectl::config::{QueueConfig, QueuePaths};
use queuectl::core::{AppResult, DeadLetterQueue, Job, JobState, JobStore, Worker};
use queuectl::infra::{ShellRunner, SqliteJobStore, WorkerRegistry};
use queuectl::runtime::{
    shutdown_token, status, stop_workers, submit_job, JobSubmission, WorkerCommand, WorkerPool,
    WORKER_INDEX_ENV,
};
use queuectl::util::{init_tracing, with_bootstrap_logging};

#[derive(Parser)]
#[command(name = "queuectl")]
#[command(version)]
#[command(about = "Persistent background job queue with retries and a dead-letter queue")]
#[command(long_about = None)]
struct Cli {
    /// Data directory (overrides QUEUECTL_HOME)
    #[arg(long, global = true, value_name = "DIR")]
    home: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Add a job to the queue
    Enqueue(EnqueueArgs),
    /// List jobs as a table, oldest first
    List {
        /// Only jobs in this state
        #[arg(long)]
        state: Option<JobState>,
        /// Maximum rows
        #[arg(long)]
        limit: Option<usize>,
        /// Print JSON instead of a table
        #[arg(long)]
        json: bool,
    },
    /// Show job details and output, newest first
    Show {
        /// Only jobs in this state
        #[arg(long)]
        state: Option<JobState>,
        /// Maximum jobs
        #[arg(long, default_value_t = 10)]
        limit: usize,
    },
    /// Manage worker processes
    Worker {
        #[command(subcommand)]
        action: WorkerAction,
    },
    /// Job counts per state and registered workers
    Status,
    /// Inspect and retry dead jobs
    Dlq {
        #[command(subcommand)]
        action: DlqAction,
    },
    /// Read or change configuration
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },
}

#[derive(Args)]
struct EnqueueArgs {
    /// Job as JSON, e.g. '{"id":"job1","command":"sleep 2"}'
    payload: Option<String>,
    /// Job identifier (generated when omitted)
    #[arg(long)]
    id: Option<String>,
    /// Shell command line
    #[arg(long)]
    command: Option<String>,
    /// Attempt ceiling (defaults to the configured max_retries)
    #[arg(long)]
    max_retries: Option<u32>,
}

#[derive(Subcommand)]
enum WorkerAction {
    /// Spawn workers and supervise them in the foreground
    Start {
        /// Number of worker processes
        #[arg(long, default_value_t = 1)]
        count: usize,
    },
    /// Stop workers recorded in the registry
    Stop,
    /// Run a single worker loop in this process
    #[command(hide = true)]
    Run,
}

#[derive(Subcommand)]
enum DlqAction {
    /// List dead jobs, most recently failed first
    List,
    /// Move dead jobs back to pending
    Retry {
        /// Job to revive
        #[arg(required_unless_present = "all")]
        id: Option<String>,
        /// Revive every dead job
        #[arg(long, conflicts_with = "id")]
        all: bool,
    },
}

#[derive(Subcommand)]
enum ConfigAction {
    /// Print the effective configuration
    Show,
    /// Print one value
    Get { key: String },
    /// Change one value
    Set { key: String, value: String },
}

fn main() -> AppResult<()> {
    let _ = dotenvy::dotenv();
    let cli = Cli::parse();
    let paths = QueuePaths::resolve(cli.home);

    let mut config = with_bootstrap_logging(|| QueueConfig::load_or_create(&paths.config()))
        .with_context(|| format!("failed to load {}", paths.config().display()))?;
    config.apply_env();
    init_tracing(&config.log_level);
    debug!(home = %paths.home().display(), "configuration loaded");

    match cli.command {
        Commands::Enqueue(args) => enqueue(&paths, &config, args),
        Commands::List { state, limit, json } => list(&paths, state, limit, json),
        Commands::Show { state, limit } => show(&paths, state, limit),
        Commands::Worker { action } => match action {
            WorkerAction::Start { count } => start_workers(&paths, &config, count),
            WorkerAction::Stop => stop(&paths, &config),
            WorkerAction::Run => run_worker(&paths, &config),
        },
        Commands::Status => print_status(&paths),
        Commands::Dlq { action } => dlq(&paths, action),
        Commands::Config { action } => config_cmd(&paths, &config, action),
    }
}

fn open_store(paths: &QueuePaths) -> AppResult<SqliteJobStore> {
    let path = paths.database();
    SqliteJobStore::open(&path).with_context(|| format!("failed to open {}", path.display()))
}

fn current_thread_runtime() -> AppResult<tokio::runtime::Runtime> {
    tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .context("failed to build tokio runtime")
}

fn enqueue(paths: &QueuePaths, config: &QueueConfig, args: EnqueueArgs) -> AppResult<()> {
    let mut submission = match (args.payload, args.command) {
        (Some(payload), command) => {
            let mut submission = JobSubmission::from_json_str(&payload)?;
            if let Some(command) = command {
                submission.command = command;
            }
            submission
        }
        (None, Some(command)) => JobSubmission {
            id: None,
            command,
            max_retries: None,
        },
        (None, None) => bail!("provide a job JSON payload or --command"),
    };
    if args.id.is_some() {
        submission.id = args.id;
    }
    if args.max_retries.is_some() {
        submission.max_retries = args.max_retries;
    }

    let store = open_store(paths)?;
    let job = submit_job(&store, submission, config.max_retries)?;
    info!(job_id = %job.id, "job enqueued");
    println!("Enqueued job {} (max_retries={}): {}", job.id, job.max_retries, job.command);
    Ok(())
}

fn list(paths: &QueuePaths, state: Option<JobState>, limit: Option<usize>, json: bool) -> AppResult<()> {
    let mut jobs = open_store(paths)?.list(state)?;
    if let Some(limit) = limit {
        jobs.truncate(limit);
    }
    if json {
        println!("{}", serde_json::to_string_pretty(&jobs)?);
        return Ok(());
    }
    if jobs.is_empty() {
        println!("No jobs found.");
        return Ok(());
    }
    println!(
        "{:<36}  {:<10}  {:>8}  {:<27}  COMMAND",
        "ID", "STATE", "ATTEMPTS", "CREATED_AT"
    );
    for job in &jobs {
        println!(
            "{:<36}  {:<10}  {:>8}  {:<27}  {}",
            job.id,
            job.state,
            format!("{}/{}", job.attempts, job.max_retries),
            queuectl::util::format_ts(&job.created_at),
            clip(&job.command, 60)
        );
    }
    Ok(())
}

fn show(paths: &QueuePaths, state: Option<JobState>, limit: usize) -> AppResult<()> {
    let mut jobs = open_store(paths)?.list(state)?;
    if jobs.is_empty() {
        println!("No jobs found.");
        return Ok(());
    }
    jobs.sort_by(|a, b| b.created_at.cmp(&a.created_at).then_with(|| a.id.cmp(&b.id)));
    for job in jobs.iter().take(limit) {
        print_job(job);
    }
    Ok(())
}

fn print_job(job: &Job) {
    println!("Job ID:     {}", job.id);
    println!("Command:    {}", job.command);
    println!("State:      {}", job.state);
    println!("Attempts:   {}/{}", job.attempts, job.max_retries);
    println!("Created:    {}", queuectl::util::format_ts(&job.created_at));
    println!("Updated:    {}", queuectl::util::format_ts(&job.updated_at));
    if let Some(error) = &job.last_error {
        println!("Last error: {error}");
    }
    println!("Result:\n{}", job.result.as_deref().unwrap_or("(no output)"));
    println!("{}", "-".repeat(50));
}

fn start_workers(paths: &QueuePaths, config: &QueueConfig, count: usize) -> AppResult<()> {
    let registry = WorkerRegistry::new(paths.workers());
    let command = WorkerCommand::current_exe(paths.home())?;
    let runtime = current_thread_runtime()?;
    runtime.block_on(async {
        let token = shutdown_token().context("failed to install signal handlers")?;
        let pool = WorkerPool::start(&command, count, registry)?;
        for (index, entry) in pool.entries().iter().enumerate() {
            println!("Started worker-{index} (pid {})", entry.pid);
        }
        println!("{count} worker(s) running; press Ctrl-C to stop");
        let report = pool.supervise(&token, config.stop_grace()).await;
        println!(
            "Workers stopped ({} exited, {} killed)",
            report.exited, report.killed
        );
        Ok::<_, anyhow::Error>(())
    })
}

fn stop(paths: &QueuePaths, config: &QueueConfig) -> AppResult<()> {
    let registry = WorkerRegistry::new(paths.workers());
    let entries = registry.read();
    if entries.is_empty() {
        println!("No active workers found.");
        return Ok(());
    }
    println!("Stopping {} worker(s)...", entries.len());
    let runtime = current_thread_runtime()?;
    let report = runtime.block_on(stop_workers(&registry, config.stop_grace()))?;
    println!(
        "Signalled {}, exited {}, killed {}",
        report.signalled, report.exited, report.killed
    );
    Ok(())
}

fn run_worker(paths: &QueuePaths, config: &QueueConfig) -> AppResult<()> {
    let index = std::env::var(WORKER_INDEX_ENV)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(0);
    let store = open_store(paths)?;
    let runtime = current_thread_runtime()?;
    runtime.block_on(async {
        let token = shutdown_token().context("failed to install signal handlers")?;
        let worker = Worker::new(index, store, ShellRunner::new(), config.worker_settings());
        worker.run(&token).await;
        Ok::<_, anyhow::Error>(())
    })
}

fn print_status(paths: &QueuePaths) -> AppResult<()> {
    let store = open_store(paths)?;
    let report = status(&store, &WorkerRegistry::new(paths.workers()))?;
    println!("Jobs");
    for state in JobState::ALL {
        println!("  {:<11} {}", state.as_str(), report.counts.get(state));
    }
    println!("  {:<11} {}", "total", report.counts.total());
    println!(
        "Workers ({} registered, {} alive)",
        report.workers.len(),
        report.alive_workers()
    );
    for worker in &report.workers {
        println!(
            "  pid {:<8} started {}  {}",
            worker.pid,
            queuectl::util::format_ts(&worker.started_at),
            if worker.alive { "alive" } else { "not running" }
        );
    }
    Ok(())
}

fn dlq(paths: &QueuePaths, action: DlqAction) -> AppResult<()> {
    let dlq = DeadLetterQueue::new(open_store(paths)?);
    match action {
        DlqAction::List => {
            let jobs = dlq.list_dead()?;
            if jobs.is_empty() {
                println!("Dead-letter queue is empty.");
                return Ok(());
            }
            println!("{:<36}  {:>8}  {:<27}  LAST_ERROR", "ID", "ATTEMPTS", "UPDATED_AT");
            for job in &jobs {
                println!(
                    "{:<36}  {:>8}  {:<27}  {}",
                    job.id,
                    job.attempts,
                    queuectl::util::format_ts(&job.updated_at),
                    clip(job.last_error.as_deref().unwrap_or("-"), 80)
                );
            }
        }
        DlqAction::Retry { all: true, .. } => {
            let revived = dlq.retry_all()?;
            println!("Moved {revived} job(s) back to pending.");
        }
        DlqAction::Retry { id: Some(id), .. } => {
            if !dlq.retry_one(&id)? {
                bail!("job {id} is not in the dead-letter queue");
            }
            println!("Job {id} moved back to pending.");
        }
        DlqAction::Retry { id: None, all: false } => bail!("provide a job id or --all"),
    }
    Ok(())
}

fn config_cmd(paths: &QueuePaths, effective: &QueueConfig, action: ConfigAction) -> AppResult<()> {
    match action {
        ConfigAction::Show => println!("{}", serde_json::to_string_pretty(effective)?),
        ConfigAction::Get { key } => match effective.get(&key) {
            Some(value) => println!("{value}"),
            None => bail!(
                "unknown key `{key}` (known keys: {})",
                QueueConfig::KEYS.join(", ")
            ),
        },
        ConfigAction::Set { key, value } => {
            // edit the file as stored, without environment overrides
            let path = paths.config();
            let mut stored = QueueConfig::load_or_create(&path)?;
            stored.set(&key, &value)?;
            stored.save(&path)?;
            println!("Set {key} = {}", stored.get(&key).unwrap_or(value));
        }
    }
    Ok(())
}

fn clip(text: &str, max_chars: usize) -> String {
    let mut chars = text.chars();
    let clipped: String = chars.by_ref().take(max_chars).collect();
    if chars.next().is_some() {
        format!("{clipped}...")
    } else {
        clipped
    }
}
