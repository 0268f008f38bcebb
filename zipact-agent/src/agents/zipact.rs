use super::{decide, Agent, StepBudget};
use crate::parse::Decision;
use crate::prompts::{Prompts, INIT_SYSTEM};
use crate::state::AgentState;
use serde_json::Value;
use zipact_env::Domain;
use zipact_error::Result;
use zipact_llm::{ChatMessage, ChatOptions, LlmClient, LlmProvider};

const INIT_MAX_TOKENS: usize = 512;
const UPDATE_MAX_TOKENS: usize = 800;

/// Decides from a compact state instead of the transcript.
///
/// Each step first folds the last action and the new observation into the
/// state (one model call), then picks an action from the state and the
/// observation alone (a second call). Past observations are never replayed.
#[derive(Debug)]
pub struct ZipActAgent {
    prompts: Prompts,
    budget: StepBudget,
    state: AgentState,
    last_action: Option<String>,
    last_thought: String,
}

impl ZipActAgent {
    pub fn new(domain: Domain, max_steps: usize) -> Self {
        Self {
            prompts: Prompts::new(domain),
            budget: StepBudget::new(max_steps),
            state: AgentState::default(),
            last_action: None,
            last_thought: String::new(),
        }
    }

    pub fn state(&self) -> &AgentState {
        &self.state
    }

    async fn update_state<P: LlmProvider>(
        &mut self,
        client: &mut LlmClient<P>,
        last_action: &str,
        observation: &str,
    ) -> Result<()> {
        self.state.record_attempt(last_action);

        let system = self.prompts.zipact_updater()?;
        let user = self
            .prompts
            .zipact_update(&self.state.to_pretty_json(), last_action, observation)?;
        let reply = client
            .chat(
                vec![ChatMessage::system(system), ChatMessage::user(user)],
                ChatOptions::new(0.0, UPDATE_MAX_TOKENS),
            )
            .await;

        match AgentState::from_model_reply(&reply) {
            Ok(next) => self.state.merge_update(next),
            Err(e) => tracing::warn!(agent = self.name(), error = %e, "state update unparsable, keeping previous state"),
        }
        Ok(())
    }
}

impl Agent for ZipActAgent {
    fn name(&self) -> &'static str {
        "zipact"
    }

    async fn reset<P: LlmProvider>(&mut self, client: &mut LlmClient<P>, instruction: &str) -> Result<()> {
        self.budget.reset();
        self.last_action = None;
        self.last_thought.clear();

        let prompt = self.prompts.zipact_init(instruction)?;
        let reply = client
            .chat(
                vec![ChatMessage::system(INIT_SYSTEM), ChatMessage::user(prompt)],
                ChatOptions::new(0.0, INIT_MAX_TOKENS),
            )
            .await;

        self.state = match AgentState::from_model_reply(&reply) {
            Ok(state) => state,
            Err(e) => {
                tracing::warn!(agent = self.name(), error = %e, "state init unparsable, starting from the empty template");
                AgentState::default()
            }
        };
        if self.state.goal_state.global_instruction.trim().is_empty() {
            self.state.goal_state.global_instruction = instruction.to_string();
        }
        tracing::debug!(
            agent = self.name(),
            objective = %self.state.goal_state.current_objective,
            queued = self.state.goal_state.sub_goal_queue.len(),
            "state initialized"
        );
        Ok(())
    }

    async fn step<P: LlmProvider>(&mut self, client: &mut LlmClient<P>, observation: &str) -> Result<Decision> {
        let step = self.budget.take()?;

        if let Some(last_action) = self.last_action.take() {
            self.update_state(client, &last_action, observation).await?;
        }

        let system = self.prompts.zipact_actor()?;
        let user = self.prompts.zipact_act(&self.state.to_pretty_json(), observation)?;
        let decision = decide(client, self.prompts.domain(), system, user).await;

        self.last_action = Some(decision.action.clone());
        self.last_thought = decision.thought.clone();
        tracing::debug!(
            agent = self.name(),
            step,
            objective = %self.state.goal_state.current_objective,
            action = %decision.action,
            "decided"
        );
        Ok(decision)
    }

    fn last_thought(&self) -> &str {
        &self.last_thought
    }

    fn snapshot(&self) -> Option<Value> {
        Some(self.state.to_value())
    }

    fn steps_taken(&self) -> usize {
        self.budget.used()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use zipact_llm::{Role, ScriptedProvider};

    const INIT_REPLY: &str = r#"```json
{
  "goal_state": {"global_instruction": "heat some mug and put it in cabinet.", "sub_goal_queue": ["heat the mug", "put it in a cabinet"], "current_objective": "find a mug"},
  "world_state": {"location": "unknown", "inventory": [], "entity_map": {}, "discovered_objects": []},
  "constraint_state": {"negative_constraints": [], "visited_locations": [], "attempted_actions": []}
}
```"#;

    #[tokio::test]
    async fn test_reset_parses_initial_state() {
        let mut client = LlmClient::new(ScriptedProvider::new([INIT_REPLY]), "m");
        let mut agent = ZipActAgent::new(Domain::Household, 10);
        agent.reset(&mut client, "heat some mug and put it in cabinet.").await.unwrap();

        assert_eq!(agent.state().goal_state.current_objective, "find a mug");
        assert_eq!(agent.state().goal_state.sub_goal_queue.len(), 2);

        let requests = client.provider().requests();
        assert_eq!(requests[0].messages[0].content, INIT_SYSTEM);
        assert_eq!(requests[0].max_tokens, Some(512));
    }

    #[tokio::test]
    async fn test_reset_falls_back_to_template() {
        let mut client = LlmClient::new(ScriptedProvider::new(["I'd rather not."]), "m");
        let mut agent = ZipActAgent::new(Domain::Science, 10);
        agent.reset(&mut client, "boil water").await.unwrap();

        assert_eq!(agent.state().goal_state.global_instruction, "boil water");
        assert_eq!(agent.state().world_state.location, "unknown");
        assert!(agent.state().goal_state.sub_goal_queue.is_empty());
    }

    #[tokio::test]
    async fn test_first_step_skips_update() {
        let provider = ScriptedProvider::new([INIT_REPLY, "Thought: mugs live in cabinets\nAction: go to cabinet 1"]);
        let mut client = LlmClient::new(provider, "m");
        let mut agent = ZipActAgent::new(Domain::Household, 10);
        agent.reset(&mut client, "heat some mug and put it in cabinet.").await.unwrap();

        let decision = agent.step(&mut client, "You are in the middle of a room.").await.unwrap();
        assert_eq!(decision.action, "go to cabinet 1");

        let requests = client.provider().requests();
        assert_eq!(requests.len(), 2);
        let act = &requests[1];
        assert_eq!(act.messages[0].role, Role::System);
        assert!(act.messages[1].content.starts_with("Current State:\n```json\n{"));
        assert!(act.messages[1].content.contains("Immediate Observation:\nYou are in the middle of a room."));
        assert!(!act.messages[1].content.contains("Observation 1"));
    }

    #[tokio::test]
    async fn test_update_merges_and_keeps_attempts() {
        let update = r#"{"goal_state": {"current_objective": "open the cabinet"}, "world_state": {"location": "cabinet 1", "entity_map": {"cabinet 1": "closed"}}, "constraint_state": {"attempted_actions": ["bogus"]}}"#;
        let provider = ScriptedProvider::new([
            INIT_REPLY,
            "Action: go to cabinet 1",
            update,
            "Thought: open it\nAction: open cabinet 1",
        ]);
        let mut client = LlmClient::new(provider, "m");
        let mut agent = ZipActAgent::new(Domain::Household, 10);
        agent.reset(&mut client, "heat some mug and put it in cabinet.").await.unwrap();

        agent.step(&mut client, "You are in the middle of a room.").await.unwrap();
        let decision = agent.step(&mut client, "The cabinet 1 is closed.").await.unwrap();
        assert_eq!(decision.action, "open cabinet 1");

        let state = agent.state();
        assert_eq!(state.world_state.location, "cabinet 1");
        assert_eq!(state.world_state.entity_map["cabinet 1"], "closed");
        assert_eq!(state.constraint_state.attempted_actions, vec!["go to cabinet 1"]);
        assert_eq!(state.goal_state.global_instruction, "heat some mug and put it in cabinet.");

        let requests = client.provider().requests();
        let update_request = &requests[2];
        assert_eq!(update_request.max_tokens, Some(800));
        let user = &update_request.messages[1].content;
        assert!(user.starts_with("Previous State:\n```json\n"));
        assert!(user.contains("\"attempted_actions\": [\n      \"go to cabinet 1\"\n    ]"));
        assert!(user.contains("Last Action: go to cabinet 1\n\nNew Observation:\nThe cabinet 1 is closed."));

        let snapshot = agent.snapshot().unwrap();
        assert_eq!(snapshot["world_state"]["location"], "cabinet 1");
    }

    #[tokio::test]
    async fn test_bad_update_keeps_state() {
        let provider = ScriptedProvider::new([INIT_REPLY, "Action: look", "```json\n{not json\n```", "Action: look"]);
        let mut client = LlmClient::new(provider, "m");
        let mut agent = ZipActAgent::new(Domain::Household, 10);
        agent.reset(&mut client, "heat some mug and put it in cabinet.").await.unwrap();
        agent.step(&mut client, "o1").await.unwrap();
        let before = agent.state().goal_state.clone();
        agent.step(&mut client, "o2").await.unwrap();

        assert_eq!(agent.state().goal_state, before);
        assert_eq!(agent.state().constraint_state.attempted_actions, vec!["look"]);
    }

    #[tokio::test]
    async fn test_empty_update_keeps_state() {
        let provider = ScriptedProvider::new([INIT_REPLY, "Action: look", "```json\n{}\n```", "Action: look"]);
        let mut client = LlmClient::new(provider, "m");
        let mut agent = ZipActAgent::new(Domain::Household, 10);
        agent.reset(&mut client, "heat some mug and put it in cabinet.").await.unwrap();
        agent.step(&mut client, "o1").await.unwrap();
        agent.step(&mut client, "o2").await.unwrap();

        let goal = &agent.state().goal_state;
        assert_eq!(goal.current_objective, "find a mug");
        assert_eq!(goal.sub_goal_queue, vec!["heat the mug", "put it in a cabinet"]);
        assert_eq!(agent.state().constraint_state.attempted_actions, vec!["look"]);
    }
}
