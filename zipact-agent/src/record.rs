//! Experiment records: one JSONL line per episode and a summary JSON file.

use chrono::Local;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fs::{self, OpenOptions};
use std::io::Write as _;
use std::path::{Path, PathBuf};
use zipact_error::{Error, Result};
use zipact_llm::TokenUsage;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StepRecord {
    pub step: usize,
    pub observation: String,
    pub thought: String,
    pub action: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub state: Option<Value>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EpisodeRecord {
    pub episode_id: usize,
    pub task: String,
    pub steps: Vec<StepRecord>,
    pub start_time: String,
    #[serde(default)]
    pub end_time: String,
    pub success: bool,
    pub reward: f64,
    pub num_steps: usize,
    pub token_usage: TokenUsage,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SummaryTokens {
    pub total_input_tokens: usize,
    pub total_output_tokens: usize,
    pub total_tokens: usize,
    pub avg_tokens_per_episode: f64,
}

/// Aggregate numbers for one experiment.
///
/// Every field defaults when missing so hand-edited or older summary files
/// still load.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ExperimentSummary {
    pub agent: String,
    pub model: String,
    pub dataset: String,
    pub experiment_name: String,
    pub total_episodes: usize,
    pub successful_episodes: usize,
    pub success_rate: f64,
    pub avg_steps: f64,
    pub avg_reward: f64,
    pub token_usage: SummaryTokens,
}

impl ExperimentSummary {
    /// Human-readable block printed at the end of a run.
    pub fn render(&self) -> String {
        let rule = "=".repeat(50);
        let lines = [
            String::new(),
            rule.clone(),
            format!("EXPERIMENT SUMMARY: {}", self.experiment_name),
            rule.clone(),
            format!("Agent: {}", self.agent),
            format!("Model: {}", self.model),
            format!("Dataset: {}", self.dataset),
            format!(
                "Success Rate: {:.2}% ({}/{})",
                self.success_rate * 100.0,
                self.successful_episodes,
                self.total_episodes
            ),
            format!("Avg Steps: {:.2}", self.avg_steps),
            format!("Avg Reward: {:.2}", self.avg_reward),
            format!("Total Tokens: {}", group_thousands(self.token_usage.total_tokens)),
            format!("Avg Tokens/Episode: {:.0}", self.token_usage.avg_tokens_per_episode),
            rule,
        ];
        let mut out = lines.join("\n");
        out.push('\n');
        out
    }
}

/// `1234567` as `1,234,567`
pub fn group_thousands(n: usize) -> String {
    let digits = n.to_string();
    let mut out = String::with_capacity(digits.len() + digits.len() / 3);
    for (i, c) in digits.chars().enumerate() {
        if i > 0 && (digits.len() - i) % 3 == 0 {
            out.push(',');
        }
        out.push(c);
    }
    out
}

fn now() -> String {
    Local::now().format("%Y-%m-%dT%H:%M:%S%.6f").to_string()
}

/// Collects episodes and writes them under a log directory.
#[derive(Debug)]
pub struct ExperimentLog {
    experiment_name: String,
    log_file: PathBuf,
    summary_file: PathBuf,
    episodes: Vec<EpisodeRecord>,
    current: Option<EpisodeRecord>,
}

impl ExperimentLog {
    /// Prepare `{log_dir}/{name}.jsonl` and `{log_dir}/{name}_summary.json`.
    pub fn create(log_dir: impl AsRef<Path>, experiment_name: impl Into<String>) -> Result<Self> {
        let log_dir = log_dir.as_ref();
        fs::create_dir_all(log_dir).map_err(|e| {
            Error::from(e)
                .with_operation("record::create")
                .with_context("path", log_dir.display().to_string())
        })?;

        let experiment_name = experiment_name.into();
        Ok(Self {
            log_file: log_dir.join(format!("{}.jsonl", experiment_name)),
            summary_file: log_dir.join(format!("{}_summary.json", experiment_name)),
            experiment_name,
            episodes: Vec::new(),
            current: None,
        })
    }

    pub fn experiment_name(&self) -> &str {
        &self.experiment_name
    }

    pub fn log_file(&self) -> &Path {
        &self.log_file
    }

    pub fn summary_file(&self) -> &Path {
        &self.summary_file
    }

    /// Finished episodes, in order
    pub fn episodes(&self) -> &[EpisodeRecord] {
        &self.episodes
    }

    pub fn start_episode(&mut self, task: &str, episode_id: usize) {
        self.current = Some(EpisodeRecord {
            episode_id,
            task: task.to_string(),
            steps: Vec::new(),
            start_time: now(),
            end_time: String::new(),
            success: false,
            reward: 0.0,
            num_steps: 0,
            token_usage: TokenUsage::default(),
        });
    }

    /// Ignored when no episode is open.
    pub fn log_step(&mut self, step: usize, observation: &str, thought: &str, action: &str, state: Option<Value>) {
        if let Some(episode) = self.current.as_mut() {
            episode.steps.push(StepRecord {
                step,
                observation: observation.to_string(),
                thought: thought.to_string(),
                action: action.to_string(),
                state,
            });
        }
    }

    /// Close the open episode and append it to the JSONL file.
    pub fn end_episode(&mut self, success: bool, reward: f64, token_usage: TokenUsage) -> Result<()> {
        let Some(mut episode) = self.current.take() else {
            return Ok(());
        };
        episode.success = success;
        episode.reward = reward;
        episode.num_steps = episode.steps.len();
        episode.token_usage = token_usage;
        episode.end_time = now();

        let line = serde_json::to_string(&episode).map_err(|e| {
            Error::serialization_failed("failed to encode episode record")
                .with_operation("record::end_episode")
                .set_source(e)
        })?;

        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.log_file)
            .and_then(|mut f| writeln!(f, "{}", line).map(|_| f))
            .map_err(|e| {
                Error::from(e)
                    .with_operation("record::end_episode")
                    .with_context("path", self.log_file.display().to_string())
            })?;
        file.flush()?;

        self.episodes.push(episode);
        Ok(())
    }

    /// Aggregate finished episodes; `None` before the first one.
    pub fn summarize(&self, agent: &str, model: &str, dataset: &str) -> Option<ExperimentSummary> {
        if self.episodes.is_empty() {
            return None;
        }
        let total = self.episodes.len();
        let n = total as f64;
        let successes = self.episodes.iter().filter(|e| e.success).count();
        let input: usize = self.episodes.iter().map(|e| e.token_usage.input_tokens).sum();
        let output: usize = self.episodes.iter().map(|e| e.token_usage.output_tokens).sum();

        Some(ExperimentSummary {
            agent: agent.to_string(),
            model: model.to_string(),
            dataset: dataset.to_string(),
            experiment_name: self.experiment_name.clone(),
            total_episodes: total,
            successful_episodes: successes,
            success_rate: successes as f64 / n,
            avg_steps: self.episodes.iter().map(|e| e.num_steps as f64).sum::<f64>() / n,
            avg_reward: self.episodes.iter().map(|e| e.reward).sum::<f64>() / n,
            token_usage: SummaryTokens {
                total_input_tokens: input,
                total_output_tokens: output,
                total_tokens: input + output,
                avg_tokens_per_episode: (input + output) as f64 / n,
            },
        })
    }

    /// Write the summary JSON. Nothing is written without finished episodes.
    pub fn save_summary(&self, agent: &str, model: &str, dataset: &str) -> Result<Option<ExperimentSummary>> {
        let Some(summary) = self.summarize(agent, model, dataset) else {
            return Ok(None);
        };
        let json = serde_json::to_string_pretty(&summary).map_err(|e| {
            Error::serialization_failed("failed to encode experiment summary")
                .with_operation("record::save_summary")
                .set_source(e)
        })?;
        fs::write(&self.summary_file, json).map_err(|e| {
            Error::from(e)
                .with_operation("record::save_summary")
                .with_context("path", self.summary_file.display().to_string())
        })?;
        Ok(Some(summary))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn usage(input: usize, output: usize) -> TokenUsage {
        TokenUsage { input_tokens: input, output_tokens: output, total_tokens: input + output, calls: 2 }
    }

    #[test]
    fn test_episode_lines_and_summary() {
        let dir = tempfile::tempdir().unwrap();
        let mut log = ExperimentLog::create(dir.path().join("logs"), "alfworld_react_m_20260101_000000").unwrap();

        log.start_episode("heat some mug", 1);
        log.log_step(1, "You are in a kitchen.", "look first", "look", None);
        log.log_step(2, "Nothing happened.", "try the cabinet", "go to cabinet 1", Some(json!({"a": 1})));
        log.end_episode(true, 1.0, usage(100, 20)).unwrap();

        log.start_episode("heat some mug", 2);
        log.log_step(1, "You are in a kitchen.", "", "look", None);
        log.end_episode(false, 0.0, usage(50, 10)).unwrap();

        let text = fs::read_to_string(log.log_file()).unwrap();
        let lines: Vec<Value> = text.lines().map(|l| serde_json::from_str(l).unwrap()).collect();
        assert_eq!(lines.len(), 2);
        assert_eq!(lines[0]["episode_id"], 1);
        assert_eq!(lines[1]["episode_id"], 2);
        assert_eq!(lines[0]["num_steps"], 2);
        assert!(lines[0]["steps"][0].get("state").is_none());
        assert_eq!(lines[0]["steps"][1]["state"]["a"], 1);
        assert_eq!(lines[0]["token_usage"], json!({"input_tokens": 100, "output_tokens": 20, "total_tokens": 120}));
        assert!(!lines[1]["end_time"].as_str().unwrap().is_empty());

        let summary = log.save_summary("react", "m", "alfworld_eval_out_of_distribution").unwrap().unwrap();
        assert_eq!(summary.total_episodes, 2);
        assert_eq!(summary.successful_episodes, 1);
        assert_eq!(summary.success_rate, 0.5);
        assert_eq!(summary.avg_steps, 1.5);
        assert_eq!(summary.avg_reward, 0.5);
        assert_eq!(summary.token_usage.total_tokens, 180);
        assert_eq!(summary.token_usage.avg_tokens_per_episode, 90.0);

        let on_disk: ExperimentSummary =
            serde_json::from_str(&fs::read_to_string(log.summary_file()).unwrap()).unwrap();
        assert_eq!(on_disk, summary);
    }

    #[test]
    fn test_no_episodes_no_summary() {
        let dir = tempfile::tempdir().unwrap();
        let mut log = ExperimentLog::create(dir.path(), "empty").unwrap();
        log.log_step(1, "o", "t", "a", None);
        log.end_episode(true, 1.0, TokenUsage::default()).unwrap();
        assert!(log.save_summary("react", "m", "d").unwrap().is_none());
        assert!(!log.summary_file().exists());
        assert!(!log.log_file().exists());
    }

    #[test]
    fn test_render_and_grouping() {
        assert_eq!(group_thousands(0), "0");
        assert_eq!(group_thousands(999), "999");
        assert_eq!(group_thousands(1000), "1,000");
        assert_eq!(group_thousands(1234567), "1,234,567");

        let summary = ExperimentSummary {
            agent: "zipact".into(),
            model: "gpt-4o-mini".into(),
            dataset: "webshop_default".into(),
            experiment_name: "exp".into(),
            total_episodes: 3,
            successful_episodes: 2,
            success_rate: 2.0 / 3.0,
            avg_steps: 4.0,
            avg_reward: 0.5666,
            token_usage: SummaryTokens {
                total_input_tokens: 10000,
                total_output_tokens: 2345,
                total_tokens: 12345,
                avg_tokens_per_episode: 4115.0,
            },
        };
        let text = summary.render();
        assert!(text.contains("EXPERIMENT SUMMARY: exp"));
        assert!(text.contains("Success Rate: 66.67% (2/3)"));
        assert!(text.contains("Avg Reward: 0.57"));
        assert!(text.contains("Total Tokens: 12,345"));
        assert!(text.contains("Avg Tokens/Episode: 4115"));

        let rule = "=".repeat(50);
        assert!(text.starts_with(&format!("\n{}\nEXPERIMENT SUMMARY: exp\n{}\nAgent: zipact\n", rule, rule)));
        assert!(text.ends_with(&format!("Avg Tokens/Episode: 4115\n{}\n", rule)));
        assert_eq!(text.lines().count(), 13);
    }
}
