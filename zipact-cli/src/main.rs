//! # ZipAct CLI
//!
//! Runs agent experiments against text environments and compares results.
//!
//! Usage:
//!   zipact run --env <ENV> --agent <AGENT> [OPTIONS]
//!   zipact analyze --log-dir <DIR>
//!   zipact prompts --env <ENV> --agent <AGENT>
//!
//! Examples:
//!   zipact run --env alfworld_simple --agent zipact --episodes 3
//!   zipact run --env webshop --agent react --provider anthropic --model claude-sonnet-4-20250514
//!   zipact run --config experiments/sciworld.toml --env-url http://localhost:8080
//!   zipact analyze --log-dir logs

use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;
use std::process::ExitCode;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};
use zipact_agent::{analyze, run_experiment, AgentKind, ExperimentConfig, Prompts};
use zipact_env::{AnyEnv, Domain};
use zipact_error::{Error, Result};
use zipact_llm::{AnyProvider, LlmClient, ProviderConfig, ProviderType};

const LOCAL_BASE_URL: &str = "http://localhost:8000/v1";

#[derive(Parser)]
#[command(name = "zipact")]
#[command(author, version, about = "ZipAct - state-compression agents and their baselines")]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Debug logging for the zipact crates (stderr)
    #[arg(short, long, global = true)]
    verbose: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Run an experiment
    Run(RunArgs),
    /// Compare every experiment summary in a log directory
    Analyze {
        #[arg(long, default_value = "logs")]
        log_dir: PathBuf,
    },
    /// Print the rendered prompts an agent would use
    Prompts {
        #[arg(long, default_value = "alfworld")]
        env: String,
        #[arg(long, default_value = "zipact")]
        agent: AgentKind,
    },
}

/// Flags override values from `--config`; unset flags keep the file's (or
/// the built-in) defaults.
#[derive(Args, Debug, Default)]
struct RunArgs {
    /// TOML experiment config
    #[arg(long)]
    config: Option<PathBuf>,

    /// alfworld, alfworld_simple, sciworld or webshop [default: alfworld]
    #[arg(long)]
    env: Option<String>,

    /// react, zipact, reflexion, obs_mask or summary [default: zipact]
    #[arg(long)]
    agent: Option<AgentKind>,

    /// [default: gpt-4o-mini]
    #[arg(long)]
    model: Option<String>,

    /// openai, anthropic or local [default: openai]
    #[arg(long)]
    provider: Option<ProviderType>,

    /// Falls back to OPENAI_API_KEY or ANTHROPIC_API_KEY
    #[arg(long)]
    api_key: Option<String>,

    /// OpenAI-compatible endpoint
    #[arg(long, env = "OPENAI_BASE_URL")]
    base_url: Option<String>,

    /// [default: 5]
    #[arg(long)]
    episodes: Option<usize>,

    /// [default: 50]
    #[arg(long)]
    max_steps: Option<usize>,

    /// [default: logs]
    #[arg(long)]
    log_dir: Option<PathBuf>,

    /// Household split [default: eval_out_of_distribution]
    #[arg(long)]
    split: Option<String>,

    /// Science task name or shopping session label
    #[arg(long)]
    task: Option<String>,

    #[arg(long)]
    variation: Option<u32>,

    /// easy, medium or hard [default: easy]
    #[arg(long)]
    difficulty: Option<String>,

    /// Server wrapping the real simulator
    #[arg(long)]
    env_url: Option<String>,

    /// Observations kept unmasked by obs_mask [default: 5]
    #[arg(long)]
    keep_recent: Option<usize>,

    /// Steps between summaries for the summary agent [default: 10]
    #[arg(long)]
    summary_interval: Option<usize>,

    /// Log token usage of every LLM call
    #[arg(long)]
    verbose_tokens: bool,
}

impl RunArgs {
    fn to_config(&self) -> Result<ExperimentConfig> {
        let mut config = match &self.config {
            Some(path) => ExperimentConfig::load(path)?,
            None => ExperimentConfig::default(),
        };

        macro_rules! overlay {
            ($($field:ident),* $(,)?) => {
                $(if let Some(value) = &self.$field {
                    config.$field = value.clone();
                })*
            };
        }
        overlay!(env, agent, model, provider, episodes, max_steps, log_dir, split, variation, difficulty, keep_recent, summary_interval);

        if self.task.is_some() {
            config.task = self.task.clone();
        }
        if self.env_url.is_some() {
            config.env_url = self.env_url.clone();
        }
        if self.base_url.is_some() {
            config.base_url = self.base_url.clone();
        }
        config.verbose_tokens |= self.verbose_tokens;

        config.validate()?;
        Ok(config)
    }
}

fn init_tracing(verbose: bool, verbose_tokens: bool) {
    let mut directives = std::env::var("RUST_LOG").unwrap_or_else(|_| "warn".to_string());
    if verbose {
        directives.push_str(",zipact_agent=debug,zipact_env=debug,zipact_llm=debug,zipact_cli=debug");
    } else if verbose_tokens {
        directives.push_str(",zipact_llm=info");
    }
    let filter = EnvFilter::try_new(&directives).unwrap_or_else(|_| EnvFilter::new("warn"));

    tracing_subscriber::registry()
        .with(fmt::layer().with_writer(std::io::stderr))
        .with(filter)
        .init();
}

fn api_key(explicit: Option<&str>, var: &str) -> Result<String> {
    explicit
        .map(str::to_string)
        .or_else(|| std::env::var(var).ok())
        .filter(|k| !k.trim().is_empty())
        .ok_or_else(|| {
            Error::config_invalid(format!("{} not set, pass --api-key or export it", var))
                .with_operation("cli::api_key")
        })
}

fn build_provider(config: &ExperimentConfig, explicit_key: Option<&str>) -> Result<AnyProvider> {
    let provider_config = match config.provider {
        ProviderType::OpenAI => {
            let base = ProviderConfig::openai(api_key(explicit_key, "OPENAI_API_KEY")?);
            match &config.base_url {
                Some(url) => base.with_base_url(url.clone()),
                None => base,
            }
        }
        ProviderType::Anthropic => ProviderConfig::anthropic(api_key(explicit_key, "ANTHROPIC_API_KEY")?),
        ProviderType::Local => ProviderConfig::local(
            config.base_url.clone().unwrap_or_else(|| LOCAL_BASE_URL.to_string()),
            config.model.clone(),
        ),
    };
    Ok(AnyProvider::from_config(provider_config.with_model(config.model.clone())))
}

async fn run(args: RunArgs, verbose: bool) -> Result<()> {
    let config = args.to_config()?;
    init_tracing(verbose, config.verbose_tokens);

    let provider = build_provider(&config, args.api_key.as_deref())?;
    let mut client = LlmClient::new(provider, config.model.clone()).with_verbose(config.verbose_tokens);
    let mut env = AnyEnv::open(&config.env_spec())?;
    let experiment_name = config.experiment_name();

    println!("Model: {} ({:?})", config.model, config.provider);
    println!("Agent: {}", config.agent);
    println!("Environment: {}", config.env);
    println!("\nRunning {} episodes on {}...", config.episodes, config.env);
    println!("{}\n", "=".repeat(60));

    let mut out = std::io::stdout();
    run_experiment(&config, &experiment_name, &mut env, &mut client, &mut out).await?;
    Ok(())
}

fn print_prompts(env: &str, agent: AgentKind) -> Result<()> {
    let domain: Domain = env.parse()?;
    let prompts = Prompts::new(domain);
    let section = |title: &str, body: String| println!("===== {} =====\n{}\n", title, body);

    match agent {
        AgentKind::ZipAct => {
            section("init (system)", zipact_agent::prompts::INIT_SYSTEM.to_string());
            section("init (user)", prompts.zipact_init("{instruction}")?);
            section("updater (system)", prompts.zipact_updater()?);
            section("update (user)", prompts.zipact_update("{state}", "{last_action}", "{observation}")?);
            section("actor (system)", prompts.zipact_actor()?);
            section("act (user)", prompts.zipact_act("{state}", "{observation}")?);
        }
        _ => {
            section("system", prompts.react_system()?);
            section("user", prompts.react_user("{instruction}", "{history}")?);
            match agent {
                AgentKind::Reflexion => section("reflection", prompts.reflection("{task}", "{history}", "{failure_reason}")?),
                AgentKind::Summary => section("summary", prompts.summary("{history}")?),
                _ => {}
            }
        }
    }
    Ok(())
}

async fn dispatch(cli: Cli) -> Result<()> {
    match cli.command {
        Commands::Run(args) => run(args, cli.verbose).await,
        Commands::Analyze { log_dir } => {
            init_tracing(cli.verbose, false);
            analyze::analyze_dir(&log_dir, &mut std::io::stdout())?;
            Ok(())
        }
        Commands::Prompts { env, agent } => {
            init_tracing(cli.verbose, false);
            print_prompts(&env, agent)
        }
    }
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();
    match dispatch(cli).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("Error: {}", e);
            ExitCode::FAILURE
        }
    }
}
