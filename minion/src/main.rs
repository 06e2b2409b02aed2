//! Node agent converging local Docker state to the overlord's desired state.
//!
//! Startup resolves the node identity once, then `run` polls forever while
//! `once` performs a single cycle (or only prints the plan with `--dry-run`).

use std::path::PathBuf;
use std::process;

use anyhow::Result;
use clap::{Parser, Subcommand};
use tracing::info;

use minion::core::types::NodeIdentity;
use minion::engine::{CyclePlan, EngineSettings, Reconciler};
use minion::exit_codes;
use minion::io::config::{AgentConfig, load_config};
use minion::io::docker::DockerCli;
use minion::io::metadata::{Ec2Metadata, resolve_identity};
use minion::io::overlord::HttpOverlordClient;
use minion::io::registry_auth::EcrCliTokenSource;
use minion::io::runtime::ContainerRuntime;
use minion::io::sleep::ThreadSleeper;
use minion::logging;
use minion::looping::run_loop;

#[derive(Parser)]
#[command(
    name = "minion",
    version,
    about = "Keeps this host's managed container in line with the overlord"
)]
struct Cli {
    /// Agent config file (TOML). A missing file means defaults.
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Desired-state endpoint, queried as `<url>?id=<instance id>`.
    #[arg(long, env = "OVERLORD_URL", global = true)]
    overlord_url: Option<String>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Reconcile forever, one cycle per poll interval.
    Run,
    /// Reconcile once and exit.
    Once {
        /// Print the planned steps without touching the runtime.
        #[arg(long)]
        dry_run: bool,
    },
}

/// A startup or command failure with the exit code it maps to.
struct Failure {
    code: i32,
    err: anyhow::Error,
}

trait OrExit<T> {
    fn or_exit(self, code: i32) -> Result<T, Failure>;
}

impl<T> OrExit<T> for Result<T> {
    fn or_exit(self, code: i32) -> Result<T, Failure> {
        self.map_err(|err| Failure { code, err })
    }
}

type Agent = Reconciler<HttpOverlordClient, DockerCli, EcrCliTokenSource, ThreadSleeper>;

fn main() {
    logging::init();
    let cli = Cli::parse();
    let code = match run(cli) {
        Ok(code) => code,
        Err(Failure { code, err }) => {
            eprintln!("{:#}", err);
            code
        }
    };
    process::exit(code);
}

fn run(cli: Cli) -> Result<i32, Failure> {
    let cfg = load_config(cli.config.as_deref()).or_exit(exit_codes::MISCONFIGURED)?;
    let overlord_url = cfg
        .overlord_url(cli.overlord_url.as_deref())
        .or_exit(exit_codes::MISCONFIGURED)?;
    let (agent, node) = start(&cfg, &overlord_url)?;

    match cli.command {
        Command::Run => {
            run_loop(&agent, &node, cfg.poll_interval(), None, |_| {});
            Ok(exit_codes::OK)
        }
        Command::Once { dry_run: true } => Ok(print_plan(&agent, &node)),
        Command::Once { dry_run: false } => {
            let outcome = run_loop(&agent, &node, cfg.poll_interval(), Some(1), |_| {});
            Ok(match outcome.last_error {
                None => exit_codes::OK,
                Some(_) => exit_codes::CYCLE_FAILED,
            })
        }
    }
}

/// Build the adapters, check the runtime answers and resolve the node identity.
fn start(cfg: &AgentConfig, overlord_url: &str) -> Result<(Agent, NodeIdentity), Failure> {
    let limits = cfg.command_limits();
    let runtime = DockerCli::new(&cfg.docker_bin, &cfg.docker_host, limits);
    let version = runtime.ping().or_exit(exit_codes::RUNTIME_UNAVAILABLE)?;
    info!(docker_host = %cfg.docker_host, version = %version, "container runtime reachable");

    let metadata =
        Ec2Metadata::new(&cfg.metadata_url, cfg.http_timeout()).or_exit(exit_codes::MISCONFIGURED)?;
    let node = resolve_identity(&metadata, &cfg.identity_overrides())
        .or_exit(exit_codes::IDENTITY_UNAVAILABLE)?;

    let overlord = HttpOverlordClient::new(overlord_url, cfg.http_timeout())
        .or_exit(exit_codes::MISCONFIGURED)?;
    let tokens = EcrCliTokenSource::new(&cfg.aws_bin, &node.region, limits);
    let settings = EngineSettings {
        managed_name: cfg.managed_name.clone(),
        stop_timeout: cfg.stop_timeout(),
        stop_wait: cfg.wait_policy(),
    };
    info!(
        node = %node.instance_id,
        overlord = %overlord_url,
        managed_name = %settings.managed_name,
        "agent started"
    );
    let agent = Reconciler::new(overlord, runtime, tokens, ThreadSleeper, settings);
    Ok((agent, node))
}

fn print_plan(agent: &Agent, node: &NodeIdentity) -> i32 {
    match agent.plan_cycle(node) {
        Ok(CyclePlan::NotDeployed) => {
            println!("not deployed");
            exit_codes::OK
        }
        Ok(CyclePlan::Target { target, plan, .. }) => {
            println!("target {}", target.image);
            let steps = plan.action.steps();
            if steps.is_empty() {
                println!("no-op");
            }
            for step in steps {
                println!("{step}");
            }
            if let Some(blocked) = plan.blocked {
                println!("start blocked: {blocked}");
            }
            exit_codes::OK
        }
        Err(err) => {
            eprintln!("{err}");
            exit_codes::CYCLE_FAILED
        }
    }
}
