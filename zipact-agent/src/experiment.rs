//! Runs a whole experiment: many episodes, one agent, one environment.

use crate::agents::{AnyAgent, EpisodeOutcome};
use crate::config::ExperimentConfig;
use crate::record::{group_thousands, ExperimentLog, ExperimentSummary};
use crate::runner::run_episode;
use std::io::Write;
use std::path::PathBuf;
use zipact_env::Environment;
use zipact_error::Result;
use zipact_llm::{LlmClient, LlmProvider};

/// What a finished experiment produced.
#[derive(Debug, Clone)]
pub struct ExperimentReport {
    pub experiment_name: String,
    pub outcomes: Vec<EpisodeOutcome>,
    pub summary: Option<ExperimentSummary>,
    pub log_file: PathBuf,
    pub summary_file: PathBuf,
}

/// Run `config.episodes` episodes, writing records under `config.log_dir`
/// and progress to `out`.
///
/// Episode ids start at 1. The same agent instance serves every episode so cross-episode memory
/// (Reflexion's lessons) carries over. Token counts are reset after each
/// episode is recorded.
pub async fn run_experiment<E, P>(
    config: &ExperimentConfig,
    experiment_name: &str,
    env: &mut E,
    client: &mut LlmClient<P>,
    out: &mut impl Write,
) -> Result<ExperimentReport>
where
    E: Environment,
    P: LlmProvider,
{
    config.validate()?;
    let mut agent = AnyAgent::new(config.agent, config.agent_options()?);
    let mut log = ExperimentLog::create(&config.log_dir, experiment_name)?;

    tracing::info!(
        experiment = experiment_name,
        env = %config.env,
        agent = %config.agent,
        model = client.model(),
        episodes = config.episodes,
        "experiment started"
    );

    let mut outcomes = Vec::with_capacity(config.episodes);
    for i in 0..config.episodes {
        let outcome = run_episode(&mut agent, env, client, &mut log, i + 1, config.max_steps).await?;

        let usage = client.token_usage();
        log.end_episode(outcome.success, outcome.reward, usage)?;
        client.reset_token_count();

        writeln!(
            out,
            "Episode {}/{}: {} (Steps: {}, Reward: {:.2}, Tokens: {})",
            i + 1,
            config.episodes,
            if outcome.success { "✓ SUCCESS" } else { "✗ FAILURE" },
            outcome.steps,
            outcome.reward,
            group_thousands(usage.total_tokens)
        )?;
        outcomes.push(outcome);
    }

    let summary = log.save_summary(config.agent.as_str(), client.model(), &config.dataset_label())?;
    if let Some(summary) = &summary {
        write!(out, "{}", summary.render())?;
    }
    writeln!(out, "\nLogs saved to: {}", log.log_file().display())?;
    writeln!(out, "Summary saved to: {}", log.summary_file().display())?;

    Ok(ExperimentReport {
        experiment_name: experiment_name.to_string(),
        outcomes,
        summary,
        log_file: log.log_file().to_path_buf(),
        summary_file: log.summary_file().to_path_buf(),
    })
}
