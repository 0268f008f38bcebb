use super::{decide, Agent, StepBudget, Transcript};
use crate::parse::Decision;
use crate::prompts::Prompts;
use zipact_env::Domain;
use zipact_error::Result;
use zipact_llm::{ChatMessage, ChatOptions, LlmClient, LlmProvider};

/// ReAct that periodically folds the transcript into a model-written summary.
#[derive(Debug)]
pub struct SummaryAgent {
    prompts: Prompts,
    budget: StepBudget,
    interval: usize,
    instruction: String,
    history: Transcript,
    summary: String,
    last_thought: String,
}

impl SummaryAgent {
    pub fn new(domain: Domain, max_steps: usize, interval: usize) -> Self {
        Self {
            prompts: Prompts::new(domain),
            budget: StepBudget::new(max_steps),
            interval: interval.max(1),
            instruction: String::new(),
            history: Transcript::default(),
            summary: String::new(),
            last_thought: String::new(),
        }
    }

    pub fn summary(&self) -> &str {
        &self.summary
    }

    pub fn history(&self) -> &Transcript {
        &self.history
    }

    /// Transcript lines kept after a summary
    fn window(&self) -> usize {
        self.interval * 2
    }

    async fn summarize<P: LlmProvider>(&mut self, client: &mut LlmClient<P>) -> Result<()> {
        let prompt = self.prompts.summary(&self.history.render())?;
        let reply = client.chat(vec![ChatMessage::user(prompt)], ChatOptions::new(0.0, 300)).await;
        self.summary = reply.trim().to_string();
        self.history.keep_last(self.window());
        tracing::debug!(agent = self.name(), kept = self.history.len(), "summary: {}", self.summary);
        Ok(())
    }

    fn context(&self) -> String {
        if self.summary.is_empty() {
            self.history.render()
        } else {
            format!(
                "Summary of earlier steps:\n{}\n\nRecent history:\n{}",
                self.summary,
                self.history.render_last(self.window())
            )
        }
    }
}

impl Agent for SummaryAgent {
    fn name(&self) -> &'static str {
        "summary"
    }

    async fn reset<P: LlmProvider>(&mut self, _client: &mut LlmClient<P>, instruction: &str) -> Result<()> {
        self.instruction = instruction.to_string();
        self.history.clear();
        self.summary.clear();
        self.last_thought.clear();
        self.budget.reset();
        tracing::debug!(agent = self.name(), interval = self.interval, "starting task: {}", instruction);
        Ok(())
    }

    async fn step<P: LlmProvider>(&mut self, client: &mut LlmClient<P>, observation: &str) -> Result<Decision> {
        let step = self.budget.take()?;
        self.history.observation(step, observation);

        let len = self.history.len();
        if len >= self.window() && len % self.window() == 0 {
            self.summarize(client).await?;
        }

        let system = self.prompts.react_system()?;
        let user = self.prompts.react_user(&self.instruction, &self.context())?;
        let decision = decide(client, self.prompts.domain(), system, user).await;

        self.history.decision(step, &decision);
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
