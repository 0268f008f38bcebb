//! Recovering structure from free-text model output.
//!
//! Two shapes come back from the model: a `Thought:` / `Action:` pair, and a
//! JSON object (the agent state), possibly fenced and sloppily formatted.

use regex::Regex;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::sync::LazyLock;
use zipact_env::Domain;
use zipact_error::{Error, Result};

/// One decision: the model's rationale and the command to execute.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Decision {
    pub thought: String,
    pub action: String,
}

static HOUSEHOLD_VERBS: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)\b(go to|take|put|open|close|clean|heat|cool|toggle|use|look|inventory)\b.+").unwrap()
});
static SCIENCE_VERBS: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"(?i)\b(look around|go to|pick up|put down|put|pour|open|close|activate|deactivate|focus on|wait|mix|connect|use|read|examine)\b.+",
    )
    .unwrap()
});
static SHOP_VERBS: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)(search\[.+?\]|click\[.+?\]|\bback\b)").unwrap());
static TRAILING_COMMA: LazyLock<Regex> = LazyLock::new(|| Regex::new(r",(\s*[}\]])").unwrap());

fn verb_pattern(domain: Domain) -> &'static Regex {
    match domain {
        Domain::Household => &HOUSEHOLD_VERBS,
        Domain::Science => &SCIENCE_VERBS,
        Domain::Shopping => &SHOP_VERBS,
    }
}

/// Split model output into a thought and an action.
///
/// Lines starting with `Thought:` and `Action:` win, the last of each. With
/// neither present, the whole text is the thought and the action is the
/// first domain verb phrase found in it. A missing or empty action becomes
/// the domain's no-op command.
pub fn parse_decision(text: &str, domain: Domain) -> Decision {
    let mut thought: Option<String> = None;
    let mut action: Option<String> = None;

    for line in text.trim().lines().map(str::trim) {
        if let Some(rest) = line.strip_prefix("Thought:") {
            thought = Some(rest.trim().to_string());
        } else if let Some(rest) = line.strip_prefix("Action:") {
            action = Some(rest.trim().to_string());
        }
    }

    if thought.is_none() && action.is_none() {
        let whole = text.trim();
        thought = Some(whole.to_string());
        action = verb_pattern(domain)
            .find(whole)
            .map(|m| m.as_str().trim().to_string());
    }

    let action = action
        .filter(|a| !a.is_empty())
        .unwrap_or_else(|| domain.noop_action().to_string());

    Decision {
        thought: thought.unwrap_or_default(),
        action,
    }
}

/// The JSON payload of a reply: the first ```` ```json ```` block, else the
/// first bare fenced block, else the whole trimmed text.
pub fn extract_json_block(content: &str) -> &str {
    if content.contains("```json") {
        content
            .split("```json")
            .nth(1)
            .and_then(|s| s.split("```").next())
            .map(|s| s.trim())
            .unwrap_or(content)
    } else if content.contains("```") {
        content
            .split("```")
            .nth(1)
            .map(|s| s.trim())
            .unwrap_or(content)
    } else {
        content.trim()
    }
}

/// Drop commas that directly precede a closing brace or bracket.
pub fn strip_trailing_commas(json: &str) -> String {
    TRAILING_COMMA.replace_all(json, "$1").into_owned()
}

/// Extract, repair and deserialize a JSON reply.
pub fn parse_json_reply<T: DeserializeOwned>(content: &str) -> Result<T> {
    let repaired = strip_trailing_commas(extract_json_block(content));
    serde_json::from_str(&repaired).map_err(|e| {
        Error::parse_failed("model reply is not valid JSON")
            .with_operation("parse::json_reply")
            .with_context("excerpt", truncate(&repaired, 200))
            .set_source(e)
    })
}

pub(crate) fn truncate(s: &str, max_chars: usize) -> String {
    match s.char_indices().nth(max_chars) {
        Some((idx, _)) => format!("{}…", &s[..idx]),
        None => s.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::Value;

    #[test]
    fn test_thought_and_action_lines() {
        let d = parse_decision(
            "Thought: the mug is probably in a cabinet.\nAction: go to cabinet 1",
            Domain::Household,
        );
        assert_eq!(d.thought, "the mug is probably in a cabinet.");
        assert_eq!(d.action, "go to cabinet 1");
    }

    #[test]
    fn test_last_occurrence_wins() {
        let text = "Thought: first\nAction: look\n  Thought: second\n  Action: open fridge 1  ";
        let d = parse_decision(text, Domain::Household);
        assert_eq!(d.thought, "second");
        assert_eq!(d.action, "open fridge 1");
    }

    #[test]
    fn test_thought_only_gets_noop() {
        let d = parse_decision("Thought: not sure yet", Domain::Science);
        assert_eq!(d.thought, "not sure yet");
        assert_eq!(d.action, "look around");
    }

    #[test]
    fn test_empty_action_gets_noop() {
        let d = parse_decision("Thought: hmm\nAction:   ", Domain::Shopping);
        assert_eq!(d.action, "look");
    }

    #[test]
    fn test_household_fallback() {
        let d = parse_decision("I think I should go to countertop 2 now.", Domain::Household);
        assert_eq!(d.thought, "I think I should go to countertop 2 now.");
        assert_eq!(d.action, "go to countertop 2 now.");
    }

    #[test]
    fn test_science_fallback() {
        let d = parse_decision("Best next move: focus on thermometer", Domain::Science);
        assert_eq!(d.action, "focus on thermometer");
    }

    #[test]
    fn test_shop_fallback() {
        let d = parse_decision("Let me try search[red cotton shirt] first", Domain::Shopping);
        assert_eq!(d.action, "search[red cotton shirt]");

        let d = parse_decision("Maybe CLICK[Buy Now]", Domain::Shopping);
        assert_eq!(d.action, "CLICK[Buy Now]");
    }

    #[test]
    fn test_empty_reply() {
        let d = parse_decision("", Domain::Household);
        assert_eq!(d.thought, "");
        assert_eq!(d.action, "look");
    }

    #[test]
    fn test_no_verb_falls_back_to_noop() {
        let d = parse_decision("I am confused.", Domain::Shopping);
        assert_eq!(d.action, "look");
    }

    #[test]
    fn test_extract_json_block() {
        assert_eq!(extract_json_block("here:\n```json\n{\"a\": 1}\n```\nbye"), "{\"a\": 1}");
        assert_eq!(extract_json_block("```\n[1]\n```"), "[1]");
        assert_eq!(extract_json_block("  {\"b\": 2}  "), "{\"b\": 2}");
    }

    #[test]
    fn test_strip_trailing_commas() {
        assert_eq!(strip_trailing_commas("{\"a\": [1, 2,], }"), "{\"a\": [1, 2] }");
    }

    #[test]
    fn test_parse_json_reply() {
        let v: Value = parse_json_reply("```json\n{\"items\": [\"x\",],}\n```").unwrap();
        assert_eq!(v["items"][0], "x");

        let err = parse_json_reply::<Value>("not json at all").unwrap_err();
        assert_eq!(err.kind(), zipact_error::ErrorKind::ParseFailed);
    }

    #[test]
    fn test_truncate_respects_char_boundaries() {
        assert_eq!(truncate("héllo", 2), "hé…");
        assert_eq!(truncate("hi", 5), "hi");
    }
}
