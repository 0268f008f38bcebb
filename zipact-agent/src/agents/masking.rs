use super::{decide, Agent, StepBudget};
use crate::parse::Decision;
use crate::prompts::Prompts;
use zipact_env::Domain;
use zipact_error::Result;
use zipact_llm::{LlmClient, LlmProvider};

/// Placeholder for observations outside the recent window
pub const MASKED: &str = "[Observation masked]";

/// ReAct with old observations hidden. Thoughts and actions stay visible.
#[derive(Debug)]
pub struct ObservationMaskingAgent {
    prompts: Prompts,
    budget: StepBudget,
    keep_recent: usize,
    instruction: String,
    observations: Vec<String>,
    decisions: Vec<Decision>,
    last_thought: String,
}

impl ObservationMaskingAgent {
    pub fn new(domain: Domain, max_steps: usize, keep_recent: usize) -> Self {
        Self {
            prompts: Prompts::new(domain),
            budget: StepBudget::new(max_steps),
            keep_recent,
            instruction: String::new(),
            observations: Vec::new(),
            decisions: Vec::new(),
            last_thought: String::new(),
        }
    }

    /// The history block as the model sees it.
    pub fn render_history(&self) -> String {
        let visible_from = self.observations.len().saturating_sub(self.keep_recent);
        let mut lines = Vec::with_capacity(self.observations.len() * 3);

        for (i, observation) in self.observations.iter().enumerate() {
            let step = i + 1;
            let shown = if i < visible_from { MASKED } else { observation.as_str() };
            lines.push(format!("Observation {}: {}", step, shown));
            if let Some(decision) = self.decisions.get(i) {
                lines.push(format!("Thought {}: {}", step, decision.thought));
                lines.push(format!("Action {}: {}", step, decision.action));
            }
        }
        lines.join("\n")
    }
}

impl Agent for ObservationMaskingAgent {
    fn name(&self) -> &'static str {
        "obs_mask"
    }

    async fn reset<P: LlmProvider>(&mut self, _client: &mut LlmClient<P>, instruction: &str) -> Result<()> {
        self.instruction = instruction.to_string();
        self.observations.clear();
        self.decisions.clear();
        self.last_thought.clear();
        self.budget.reset();
        tracing::debug!(agent = self.name(), keep_recent = self.keep_recent, "starting task: {}", instruction);
        Ok(())
    }

    async fn step<P: LlmProvider>(&mut self, client: &mut LlmClient<P>, observation: &str) -> Result<Decision> {
        let step = self.budget.take()?;
        self.observations.push(observation.to_string());

        let system = self.prompts.react_system()?;
        let user = self.prompts.react_user(&self.instruction, &self.render_history())?;
        let decision = decide(client, self.prompts.domain(), system, user).await;

        self.decisions.push(decision.clone());
        self.last_thought = decision.thought.clone();
        tracing::debug!(agent = self.name(), step, action = %decision.action, "decided");
        Ok(decision)
    }

    fn last_thought(&self) -> &str {
        &self.last_thought
    }

    fn steps_taken(&self) -> usize {
        self.budget.used()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use zipact_llm::ScriptedProvider;

    #[tokio::test]
    async fn test_old_observations_are_masked() {
        let provider = ScriptedProvider::new(Vec::<String>::new()).with_fallback("Thought: t\nAction: look");
        let mut client = LlmClient::new(provider, "m");
        let mut agent = ObservationMaskingAgent::new(Domain::Household, 10, 2);
        agent.reset(&mut client, "task").await.unwrap();

        for obs in ["o1", "o2", "o3"] {
            agent.step(&mut client, obs).await.unwrap();
        }
        assert_eq!(
            agent.render_history(),
            "Observation 1: [Observation masked]\nThought 1: t\nAction 1: look\n\
             Observation 2: o2\nThought 2: t\nAction 2: look\n\
             Observation 3: o3\nThought 3: t\nAction 3: look"
        );

        // The third request saw o1 masked and o3 without a decision yet.
        let requests = client.provider().requests();
        let user = &requests[2].messages[1].content;
        assert!(user.contains("Observation 1: [Observation masked]"));
        assert!(user.ends_with("Observation 3: o3\n\nWhat do you do next?"));
    }

    #[tokio::test]
    async fn test_keep_recent_zero_masks_everything() {
        let provider = ScriptedProvider::new(Vec::<String>::new()).with_fallback("Action: look");
        let mut client = LlmClient::new(provider, "m");
        let mut agent = ObservationMaskingAgent::new(Domain::Household, 10, 0);
        agent.reset(&mut client, "task").await.unwrap();
        agent.step(&mut client, "secret").await.unwrap();
        assert!(!agent.render_history().contains("secret"));
    }
}
