use super::{decide, Agent, EpisodeOutcome, StepBudget, Transcript};
use crate::parse::Decision;
use crate::prompts::Prompts;
use zipact_env::Domain;
use zipact_error::Result;
use zipact_llm::{ChatMessage, ChatOptions, LlmClient, LlmProvider};

const REFLECTIONS_SHOWN: usize = 3;
const DIGEST_LIMIT: usize = 1000;
const DIGEST_EDGE: usize = 500;

/// ReAct that writes a lesson after each failed episode and carries the
/// lessons into later episodes.
#[derive(Debug)]
pub struct ReflexionAgent {
    prompts: Prompts,
    budget: StepBudget,
    instruction: String,
    history: Transcript,
    reflections: Vec<String>,
    episodes: usize,
    last_thought: String,
}

impl ReflexionAgent {
    pub fn new(domain: Domain, max_steps: usize) -> Self {
        Self {
            prompts: Prompts::new(domain),
            budget: StepBudget::new(max_steps),
            instruction: String::new(),
            history: Transcript::default(),
            reflections: Vec::new(),
            episodes: 0,
            last_thought: String::new(),
        }
    }

    pub fn reflections(&self) -> &[String] {
        &self.reflections
    }

    fn history_block(&self) -> String {
        let mut block = self.history.render();
        if !self.reflections.is_empty() {
            let start = self.reflections.len().saturating_sub(REFLECTIONS_SHOWN);
            block.push_str("\n\nPast Reflections:");
            for reflection in &self.reflections[start..] {
                block.push_str("\n- ");
                block.push_str(reflection);
            }
        }
        block
    }

    /// Head and tail of the transcript when it is long.
    fn digest(&self) -> String {
        let text = self.history.render();
        let chars = text.chars().count();
        if chars <= DIGEST_LIMIT {
            return text;
        }
        let head: String = text.chars().take(DIGEST_EDGE).collect();
        let tail: String = text.chars().skip(chars - DIGEST_EDGE).collect();
        format!("{}\n...\n{}", head, tail)
    }
}

impl Agent for ReflexionAgent {
    fn name(&self) -> &'static str {
        "reflexion"
    }

    async fn reset<P: LlmProvider>(&mut self, _client: &mut LlmClient<P>, instruction: &str) -> Result<()> {
        self.instruction = instruction.to_string();
        self.history.clear();
        self.last_thought.clear();
        self.budget.reset();
        self.episodes += 1;
        tracing::debug!(
            agent = self.name(),
            attempt = self.episodes,
            reflections = self.reflections.len(),
            "starting task: {}",
            instruction
        );
        Ok(())
    }

    async fn step<P: LlmProvider>(&mut self, client: &mut LlmClient<P>, observation: &str) -> Result<Decision> {
        let step = self.budget.take()?;
        self.history.observation(step, observation);

        let system = self.prompts.react_system()?;
        let user = self.prompts.react_user(&self.instruction, &self.history_block())?;
        let decision = decide(client, self.prompts.domain(), system, user).await;

        self.history.decision(step, &decision);
        self.last_thought = decision.thought.clone();
        tracing::debug!(agent = self.name(), step, action = %decision.action, "decided");
        Ok(decision)
    }

    fn last_thought(&self) -> &str {
        &self.last_thought
    }

    async fn finish<P: LlmProvider>(&mut self, client: &mut LlmClient<P>, outcome: &EpisodeOutcome) -> Result<()> {
        if outcome.success {
            return Ok(());
        }

        let reason = if self.budget.exhausted() { "Max steps reached" } else { "Task failed" };
        let prompt = self.prompts.reflection(&self.instruction, &self.digest(), reason)?;
        let reply = client.chat(vec![ChatMessage::user(prompt)], ChatOptions::new(0.3, 200)).await;

        let reflection = reply.trim();
        if reflection.is_empty() {
            tracing::warn!(agent = self.name(), "empty reflection, nothing recorded");
            return Ok(());
        }
        tracing::debug!(agent = self.name(), reason, "reflection: {}", reflection);
        self.reflections.push(reflection.to_string());
        Ok(())
    }

    fn steps_taken(&self) -> usize {
        self.budget.used()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use zipact_llm::ScriptedProvider;

    fn failed(steps: usize) -> EpisodeOutcome {
        EpisodeOutcome { success: false, reward: 0.0, steps }
    }

    #[tokio::test]
    async fn test_reflects_only_on_failure() {
        let provider = ScriptedProvider::new(["Action: look", "I should open the cabinet before looking inside."]);
        let mut client = LlmClient::new(provider, "m");
        let mut agent = ReflexionAgent::new(Domain::Household, 1);

        agent.reset(&mut client, "heat some mug").await.unwrap();
        agent.step(&mut client, "You are in a kitchen.").await.unwrap();
        agent.finish(&mut client, &failed(1)).await.unwrap();
        assert_eq!(agent.reflections(), ["I should open the cabinet before looking inside."]);

        let requests = client.provider().requests();
        let reflect = &requests[1];
        assert_eq!(reflect.messages.len(), 1);
        assert_eq!(reflect.temperature, Some(0.3));
        assert_eq!(reflect.max_tokens, Some(200));
        assert!(reflect.messages[0].content.contains("Outcome: Max steps reached"));

        agent
            .finish(&mut client, &EpisodeOutcome { success: true, reward: 1.0, steps: 1 })
            .await
            .unwrap();
        assert_eq!(client.provider().requests().len(), 2);
    }

    #[tokio::test]
    async fn test_reflections_survive_reset_and_reach_prompt() {
        let provider = ScriptedProvider::new(Vec::<String>::new()).with_fallback("Action: look");
        let mut client = LlmClient::new(provider, "m");
        let mut agent = ReflexionAgent::new(Domain::Household, 5);
        agent.reflections = (1..=4).map(|i| format!("lesson {}", i)).collect();

        agent.reset(&mut client, "task").await.unwrap();
        agent.step(&mut client, "obs").await.unwrap();

        let requests = client.provider().requests();
        let user = &requests[0].messages[1].content;
        assert!(user.contains("Observation 1: obs\n\nPast Reflections:\n- lesson 2\n- lesson 3\n- lesson 4"));
        assert!(!user.contains("lesson 1"));
    }

    #[tokio::test]
    async fn test_task_failed_reason_and_empty_reflection() {
        let provider = ScriptedProvider::new(["Action: look", "   "]);
        let mut client = LlmClient::new(provider, "m");
        let mut agent = ReflexionAgent::new(Domain::Household, 5);
        agent.reset(&mut client, "task").await.unwrap();
        agent.step(&mut client, "obs").await.unwrap();
        agent.finish(&mut client, &failed(1)).await.unwrap();

        assert!(agent.reflections().is_empty());
        let requests = client.provider().requests();
        assert!(requests[1].messages[0].content.contains("Outcome: Task failed"));
    }

    #[test]
    fn test_digest_keeps_head_and_tail() {
        let mut agent = ReflexionAgent::new(Domain::Household, 5);
        agent.history.observation(1, &"a".repeat(600));
        agent.history.observation(2, &"b".repeat(600));
        let digest = agent.digest();
        assert!(digest.starts_with("Observation 1: aaa"));
        assert!(digest.contains("\n...\n"));
        assert!(digest.ends_with(&"b".repeat(500)));
        assert_eq!(digest.chars().count(), 500 + 5 + 500);
    }
}
