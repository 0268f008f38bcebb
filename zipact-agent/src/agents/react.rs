use super::{decide, Agent, StepBudget, Transcript};
use crate::parse::Decision;
use crate::prompts::Prompts;
use zipact_env::Domain;
use zipact_error::Result;
use zipact_llm::{LlmClient, LlmProvider};

/// Conditions every decision on the full transcript.
#[derive(Debug)]
pub struct ReactAgent {
    prompts: Prompts,
    budget: StepBudget,
    instruction: String,
    history: Transcript,
    last_thought: String,
}

impl ReactAgent {
    pub fn new(domain: Domain, max_steps: usize) -> Self {
        Self {
            prompts: Prompts::new(domain),
            budget: StepBudget::new(max_steps),
            instruction: String::new(),
            history: Transcript::default(),
            last_thought: String::new(),
        }
    }

    pub fn history(&self) -> &Transcript {
        &self.history
    }
}

impl Agent for ReactAgent {
    fn name(&self) -> &'static str {
        "react"
    }

    async fn reset<P: LlmProvider>(&mut self, _client: &mut LlmClient<P>, instruction: &str) -> Result<()> {
        self.instruction = instruction.to_string();
        self.history.clear();
        self.last_thought.clear();
        self.budget.reset();
        tracing::debug!(agent = self.name(), max_steps = self.budget.max(), "starting task: {}", instruction);
        Ok(())
    }

    async fn step<P: LlmProvider>(&mut self, client: &mut LlmClient<P>, observation: &str) -> Result<Decision> {
        let step = self.budget.take()?;
        self.history.observation(step, observation);

        let system = self.prompts.react_system()?;
        let user = self.prompts.react_user(&self.instruction, &self.history.render())?;
        let decision = decide(client, self.prompts.domain(), system, user).await;

        self.history.decision(step, &decision);
        self.last_thought = decision.thought.clone();
        tracing::debug!(agent = self.name(), step, thought = %decision.thought, action = %decision.action, "decided");
        Ok(decision)
    }

    fn last_thought(&self) -> &str {
        &self.last_thought
    }

    fn steps_taken(&self) -> usize {
        self.budget.used()
    }
}
