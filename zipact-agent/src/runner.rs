//! Drives one agent through one episode of one environment.

use crate::agents::{Agent, EpisodeOutcome};
use crate::record::ExperimentLog;
use zipact_env::Environment;
use zipact_error::{ErrorKind, Result};
use zipact_llm::{LlmClient, LlmProvider};

/// Run a single episode and record its steps into the open episode of `log`.
///
/// The episode ends when the environment reports `done`, when `max_steps`
/// decisions were made, or when the agent's own budget runs out. Success
/// means the final transition was `done` with a positive reward.
pub async fn run_episode<A, E, P>(
    agent: &mut A,
    env: &mut E,
    client: &mut LlmClient<P>,
    log: &mut ExperimentLog,
    episode_id: usize,
    max_steps: usize,
) -> Result<EpisodeOutcome>
where
    A: Agent,
    E: Environment,
    P: LlmProvider,
{
    let reset = env.reset().await?;
    let task = env.task().to_string();
    tracing::info!(episode = episode_id, agent = agent.name(), task = %task, "episode started");

    agent.reset(client, &task).await?;
    log.start_episode(&task, episode_id);

    let mut observation = reset.observation;
    let mut outcome = EpisodeOutcome { success: false, reward: 0.0, steps: 0 };

    for step in 1..=max_steps {
        let decision = match agent.step(client, &observation).await {
            Ok(decision) => decision,
            Err(e) if e.kind() == ErrorKind::StepLimitReached => {
                tracing::debug!(episode = episode_id, step, "agent step budget exhausted");
                break;
            }
            Err(e) => return Err(e),
        };

        outcome.steps = step;
        log.log_step(step, &observation, &decision.thought, &decision.action, agent.snapshot());

        let transition = env.step(&decision.action).await?;
        outcome.reward += transition.reward;
        observation = transition.observation;

        if transition.done {
            outcome.success = transition.reward > 0.0;
            tracing::info!(episode = episode_id, step, success = outcome.success, "episode done");
            break;
        }
    }

    agent.finish(client, &outcome).await?;
    Ok(outcome)
}
