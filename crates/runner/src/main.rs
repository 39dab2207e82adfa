//! The Runner binary: the LLM work-cycle loop (spec §4.1-§4.4). No
//! flags — driven entirely by environment and cwd (spec §6 "CLI surface").

mod cycle;
mod pidfile;
mod prompt;
mod schedule;

use std::time::Duration;

use af_domain::config::RunnerConfig;
use af_logging::LogSink;
use af_providers::ChatClient;
use af_tools::{ToolContext, ToolDispatcher};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

#[tokio::main]
async fn main() {
    let working_dir = std::env::current_dir().expect("cwd must be accessible");
    let cfg = match RunnerConfig::from_env(working_dir) {
        Ok(cfg) => cfg,
        Err(e) => {
            eprintln!("ERROR: {e}");
            std::process::exit(1);
        }
    };

    // `runner.log`/`model.log` are operational logs of this specific
    // instance, scoped to its own working copy. `errors.log`,
    // `bootstrap.log` and the bootstrap marker are always main-pinned
    // (spec §3 "Bootstrap marker"/"Bootstrap log", §5 "stderr of Runner")
    // since the Watcher only ever polls main's `logs/` dir, regardless of
    // which branch this Runner is currently running as.
    let own_sink = LogSink::new(&cfg.working_dir);
    let main_sink = LogSink::new(&af_git::branch_dir("main"));

    init_tracing(&own_sink);

    if let Err(e) = main_sink.truncate_errors_log() {
        tracing::warn!(error = %e, "failed to truncate errors.log");
    }

    let branch = af_git::current_branch(&cfg.working_dir);
    let branch = if branch.is_empty() { "main".to_string() } else { branch };

    if let Err(e) = af_upgrade::mark_bootstrapping(&main_sink, &branch) {
        tracing::warn!(error = %e, "failed to write bootstrap marker/log");
    }

    let pid_path = af_git::branch_dir("main").join("logs/runner.pid");
    let pid_handle = match pidfile::write_pid_file(&pid_path) {
        Ok(handle) => handle,
        Err(e) => {
            tracing::warn!(error = %e, "failed to write PID file");
            None
        }
    };

    let dispatcher = build_dispatcher(&cfg);
    let client = ChatClient::new(cfg.base_url.clone(), cfg.openrouter_api_key.clone());

    if let Err(e) = af_upgrade::mark_bootstrap_success(&main_sink, &branch) {
        tracing::warn!(error = %e, "failed to write bootstrap success line");
    }
    tracing::info!(%branch, working_dir = %cfg.working_dir.display(), "Runner started");

    let mut last_comms_hash: Option<String> = None;

    loop {
        let now = chrono::Local::now().naive_local();
        let sleep_secs = schedule::sleep_seconds(now, cfg.work_interval_minutes);

        let work = async {
            tokio::time::sleep(Duration::from_secs_f64(sleep_secs)).await;
            cycle::run_cycle(&cfg, &dispatcher, &client, &own_sink, &mut last_comms_hash).await
        };

        tokio::select! {
            _ = tokio::signal::ctrl_c() => {
                tracing::info!("Shutdown requested.");
                if let Some(handle) = pid_handle {
                    pidfile::remove_pid_file(&pid_path, handle);
                }
                return;
            }
            result = work => {
                match result {
                    Ok(outcome) if outcome.ran => {
                        tracing::info!(requests = outcome.requests_sent, "cycle complete");
                    }
                    Ok(_) => tracing::info!("cycle skipped (COMMS.md unchanged)"),
                    Err(e) => {
                        tracing::error!(error = %e, "cycle failed");
                        let _ = main_sink.write_error(&e.to_string());
                        tokio::time::sleep(cfg.retry_delay()).await;
                    }
                }
            }
        }
    }
}

/// Start from the generic built-ins and layer on the two tools that need
/// process-replacement/sub-agent machinery `af-tools` deliberately doesn't
/// depend on (spec §4.4; ground: DESIGN.md's `af-tools` entry).
fn build_dispatcher(cfg: &RunnerConfig) -> ToolDispatcher {
    let ctx = ToolContext {
        working_dir: cfg.working_dir.clone(),
        bash_timeout: cfg.bash_timeout(),
    };
    let mut dispatcher = af_tools::default_dispatcher(ctx);

    dispatcher.register(
        "bootstrap",
        "Clone/update the given branch and exec-replace this process with its runner. Does not return on success.",
        serde_json::json!({
            "type": "object",
            "properties": {
                "branch": {"type": "string", "description": "Git branch to bootstrap to"}
            },
            "required": ["branch"]
        }),
        |args| async move {
            let branch = args
                .get("branch")
                .and_then(|v| v.as_str())
                .unwrap_or_default()
                .to_string();
            Err(af_upgrade::bootstrap(&branch))
        },
    );

    dispatcher.register(
        "rollback",
        "Bootstrap back to main to recover from a bad state. Does not return on success.",
        serde_json::json!({"type": "object", "properties": {}}),
        |_args| async move { Err(af_upgrade::rollback()) },
    );

    let contracts_cfg = cfg.clone();
    dispatcher.register(
        "execute_contracts",
        "Execute every pending contract file under contracts/.",
        serde_json::json!({"type": "object", "properties": {}}),
        move |_args| {
            let cfg = contracts_cfg.clone();
            async move { run_contracts(&cfg).await }
        },
    );

    dispatcher
}

/// Build a fresh `ContractsExecutor` and run every pending contract (spec
/// §4.4 `execute_contracts`; ground: `Contracts.execute_all`).
async fn run_contracts(cfg: &RunnerConfig) -> af_domain::Result<String> {
    let ctx = ToolContext {
        working_dir: cfg.working_dir.clone(),
        bash_timeout: cfg.bash_timeout(),
    };
    let inner_dispatcher = af_tools::default_dispatcher(ctx);
    let policy = af_contracts::ToolPolicy::new(
        inner_dispatcher,
        af_contracts::ToolPolicy::default_allow_list().iter().copied(),
    );
    let client = ChatClient::new(cfg.base_url.clone(), cfg.openrouter_api_key.clone());
    let model = cfg.openrouter_model.clone().unwrap_or_default();
    let system_prompt =
        af_contracts::ContractsExecutor::load_system_prompt(&cfg.working_dir.join("static/prompts"));
    let sink = LogSink::new(&cfg.working_dir);

    let executor = af_contracts::ContractsExecutor::new(
        policy,
        client,
        model,
        system_prompt,
        sink,
        cfg.working_dir.clone(),
    );

    executor
        .execute_all(&cfg.working_dir.join("contracts"))
        .await
        .map_err(af_domain::Error::Io)
}

/// Two `tracing-subscriber` fmt layers: the rotating `runner.log` file and
/// stdout, both filtered by `RUST_LOG` (default `info`) — ground: teacher's
/// `init_tracing` in `crates/gateway/src/main.rs`, extended to a layered
/// registry since a single `fmt().with_writer(...)` can only target one
/// sink and this binary needs both.
fn init_tracing(sink: &LogSink) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let stdout_layer = tracing_subscriber::fmt::layer();

    match sink.runner_log_writer() {
        Ok(writer) => {
            let file_layer = tracing_subscriber::fmt::layer()
                .with_writer(writer)
                .with_ansi(false);
            tracing_subscriber::registry()
                .with(filter)
                .with(stdout_layer)
                .with(file_layer)
                .init();
        }
        Err(e) => {
            eprintln!("warning: failed to open runner.log: {e}");
            tracing_subscriber::registry().with(filter).with(stdout_layer).init();
        }
    }
}
