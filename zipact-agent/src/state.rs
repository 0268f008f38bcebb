//! The compressed agent state the ZipAct agent conditions on.
//!
//! Models emit this as JSON and are not careful about it, so every field
//! deserializes leniently: `null` reads as empty, stray scalars are coerced
//! to text, and unknown keys are kept per group.

use crate::parse::{parse_json_reply, truncate};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::BTreeMap;
use zipact_error::{Error, Result};

const GROUPS: [&str; 3] = ["goal_state", "world_state", "constraint_state"];

/// Task progress: the instruction and its breakdown.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct GoalState {
    #[serde(default, deserialize_with = "lenient::string")]
    pub global_instruction: String,
    #[serde(default, deserialize_with = "lenient::string_list")]
    pub sub_goal_queue: Vec<String>,
    #[serde(default, deserialize_with = "lenient::string")]
    pub current_objective: String,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// What the agent knows about the environment.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WorldState {
    #[serde(default = "unknown_location", deserialize_with = "lenient::location")]
    pub location: String,
    #[serde(default, deserialize_with = "lenient::string_list")]
    pub inventory: Vec<String>,
    #[serde(default, deserialize_with = "lenient::string_map")]
    pub entity_map: BTreeMap<String, String>,
    #[serde(default, deserialize_with = "lenient::string_list")]
    pub discovered_objects: Vec<String>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl Default for WorldState {
    fn default() -> Self {
        Self {
            location: unknown_location(),
            inventory: Vec::new(),
            entity_map: BTreeMap::new(),
            discovered_objects: Vec::new(),
            extra: Map::new(),
        }
    }
}

fn unknown_location() -> String {
    "unknown".to_string()
}

/// What not to do again.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ConstraintState {
    #[serde(default, deserialize_with = "lenient::string_list")]
    pub negative_constraints: Vec<String>,
    #[serde(default, deserialize_with = "lenient::string_list")]
    pub visited_locations: Vec<String>,
    #[serde(default, deserialize_with = "lenient::string_list")]
    pub attempted_actions: Vec<String>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// Goal, world and constraint groups.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AgentState {
    #[serde(default, deserialize_with = "lenient::or_default")]
    pub goal_state: GoalState,
    #[serde(default, deserialize_with = "lenient::or_default")]
    pub world_state: WorldState,
    #[serde(default, deserialize_with = "lenient::or_default")]
    pub constraint_state: ConstraintState,
}

impl AgentState {
    /// The empty template with `instruction` as the global instruction.
    pub fn for_instruction(instruction: &str) -> Self {
        let mut state = Self::default();
        state.goal_state.global_instruction = instruction.to_string();
        state
    }

    /// Parse a model reply (fenced or bare JSON) into a state.
    ///
    /// An object with none of the three groups (`{}` included) is rejected,
    /// so callers keep their current state instead of resetting it.
    pub fn from_model_reply(reply: &str) -> Result<Self> {
        let value: Value = parse_json_reply(reply)?;
        let has_group = value
            .as_object()
            .is_some_and(|obj| GROUPS.iter().any(|g| obj.get(*g).is_some_and(|v| !v.is_null())));
        if !has_group {
            return Err(Error::parse_failed("reply carries no state groups")
                .with_operation("state::from_model_reply")
                .with_context("excerpt", truncate(reply, 200)));
        }
        serde_json::from_value(value).map_err(|e| {
            Error::parse_failed("reply does not match the state layout")
                .with_operation("state::from_model_reply")
                .set_source(e)
        })
    }

    /// Append an action to `attempted_actions` unless already present.
    pub fn record_attempt(&mut self, action: &str) {
        let attempted = &mut self.constraint_state.attempted_actions;
        if !attempted.iter().any(|a| a == action) {
            attempted.push(action.to_string());
        }
    }

    /// Replace this state with a model rewrite.
    ///
    /// `attempted_actions` is owned by the agent, not the model: the current
    /// list always survives. So does a non-empty global instruction when the
    /// rewrite drops it.
    pub fn merge_update(&mut self, mut next: AgentState) {
        next.constraint_state.attempted_actions =
            std::mem::take(&mut self.constraint_state.attempted_actions);
        if next.goal_state.global_instruction.trim().is_empty() {
            next.goal_state.global_instruction = std::mem::take(&mut self.goal_state.global_instruction);
        }
        *self = next;
    }

    pub fn to_pretty_json(&self) -> String {
        serde_json::to_string_pretty(self).unwrap_or_else(|_| "{}".to_string())
    }

    pub fn to_value(&self) -> Value {
        serde_json::to_value(self).unwrap_or(Value::Null)
    }
}

mod lenient {
    use serde::{Deserialize, Deserializer};
    use serde_json::Value;
    use std::collections::BTreeMap;

    fn text(value: Value) -> String {
        match value {
            Value::Null => String::new(),
            Value::String(s) => s,
            other => other.to_string(),
        }
    }

    pub fn string<'de, D: Deserializer<'de>>(d: D) -> Result<String, D::Error> {
        Ok(text(Value::deserialize(d)?))
    }

    pub fn location<'de, D: Deserializer<'de>>(d: D) -> Result<String, D::Error> {
        let s = text(Value::deserialize(d)?);
        Ok(if s.trim().is_empty() { super::unknown_location() } else { s })
    }

    pub fn string_list<'de, D: Deserializer<'de>>(d: D) -> Result<Vec<String>, D::Error> {
        Ok(match Value::deserialize(d)? {
            Value::Null => Vec::new(),
            Value::Array(items) => items.into_iter().filter(|v| !v.is_null()).map(text).collect(),
            Value::String(s) if s.trim().is_empty() => Vec::new(),
            other => vec![text(other)],
        })
    }

    pub fn string_map<'de, D: Deserializer<'de>>(d: D) -> Result<BTreeMap<String, String>, D::Error> {
        Ok(match Value::deserialize(d)? {
            Value::Object(map) => map.into_iter().map(|(k, v)| (k, text(v))).collect(),
            _ => BTreeMap::new(),
        })
    }

    pub fn or_default<'de, D, T>(d: D) -> Result<T, D::Error>
    where
        D: Deserializer<'de>,
        T: Deserialize<'de> + Default,
    {
        Ok(Option::<T>::deserialize(d)?.unwrap_or_default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_default_shape() {
        let state = AgentState::for_instruction("heat some mug");
        let v = state.to_value();
        assert_eq!(v["goal_state"]["global_instruction"], "heat some mug");
        assert_eq!(v["world_state"]["location"], "unknown");
        assert_eq!(v["world_state"]["entity_map"], json!({}));
        assert_eq!(v["constraint_state"]["attempted_actions"], json!([]));
    }

    #[test]
    fn test_lenient_fields() {
        let state: AgentState = serde_json::from_value(json!({
            "goal_state": {"global_instruction": null, "sub_goal_queue": "find mug", "current_objective": 3},
            "world_state": {
                "location": null,
                "inventory": ["mug 3", null, 7],
                "entity_map": {"fridge 1": "open", "mug 3": {"hot": true}},
                "scientific_facts": ["water boils at 100C"]
            },
            "constraint_state": null
        }))
        .unwrap();

        assert_eq!(state.goal_state.global_instruction, "");
        assert_eq!(state.goal_state.sub_goal_queue, vec!["find mug"]);
        assert_eq!(state.goal_state.current_objective, "3");
        assert_eq!(state.world_state.location, "unknown");
        assert_eq!(state.world_state.inventory, vec!["mug 3", "7"]);
        assert_eq!(state.world_state.entity_map["mug 3"], r#"{"hot":true}"#);
        assert_eq!(state.world_state.extra["scientific_facts"][0], "water boils at 100C");
        assert_eq!(state.constraint_state, ConstraintState::default());

        let round: Value = state.to_value();
        assert_eq!(round["world_state"]["scientific_facts"][0], "water boils at 100C");
    }

    #[test]
    fn test_record_attempt_dedupes() {
        let mut state = AgentState::default();
        state.record_attempt("look");
        state.record_attempt("go to cabinet 1");
        state.record_attempt("look");
        assert_eq!(state.constraint_state.attempted_actions, vec!["look", "go to cabinet 1"]);
    }

    #[test]
    fn test_merge_keeps_attempted_actions_and_instruction() {
        let mut state = AgentState::for_instruction("heat some mug and put it in cabinet.");
        state.record_attempt("go to cabinet 1");

        let mut next = AgentState::default();
        next.world_state.location = "cabinet 1".into();
        next.constraint_state.attempted_actions = vec!["made up".into()];
        state.merge_update(next);

        assert_eq!(state.world_state.location, "cabinet 1");
        assert_eq!(state.constraint_state.attempted_actions, vec!["go to cabinet 1"]);
        assert_eq!(state.goal_state.global_instruction, "heat some mug and put it in cabinet.");
    }

    #[test]
    fn test_from_model_reply() {
        let reply = "Sure!\n```json\n{\"goal_state\": {\"current_objective\": \"find a mug\",},}\n```";
        let state = AgentState::from_model_reply(reply).unwrap();
        assert_eq!(state.goal_state.current_objective, "find a mug");
        assert_eq!(state.world_state.location, "unknown");

        assert!(AgentState::from_model_reply("I cannot comply").is_err());
    }

    #[test]
    fn test_reply_without_groups_is_rejected() {
        for reply in ["```json\n{}\n```", r#"{"state": "fine"}"#, r#"{"goal_state": null}"#, "[1, 2]"] {
            let err = AgentState::from_model_reply(reply).unwrap_err();
            assert_eq!(err.kind(), zipact_error::ErrorKind::ParseFailed, "{}", reply);
        }
        assert!(AgentState::from_model_reply(r#"{"world_state": {}}"#).is_ok());
    }
}
