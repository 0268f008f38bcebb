//! Experiment configuration, optionally loaded from a TOML file.

use crate::agents::{AgentKind, AgentOptions, DEFAULT_KEEP_RECENT, DEFAULT_MAX_STEPS, DEFAULT_SUMMARY_INTERVAL};
use chrono::Local;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use zipact_env::{Domain, EnvSpec};
use zipact_error::{Error, Result};
use zipact_llm::ProviderType;

/// Everything one `zipact run` needs apart from credentials.
///
/// Missing fields take their defaults, so a config file only lists what it
/// changes. Command-line flags override file values.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ExperimentConfig {
    /// `alfworld`, `alfworld_simple`, `sciworld` or `webshop`
    pub env: String,
    pub agent: AgentKind,
    pub model: String,
    pub provider: ProviderType,
    /// OpenAI-compatible endpoint, e.g. a local vLLM server
    pub base_url: Option<String>,
    pub episodes: usize,
    pub max_steps: usize,
    pub log_dir: PathBuf,

    /// Household split, used for the dataset label
    pub split: String,
    /// Science task name or shopping session label
    pub task: Option<String>,
    pub variation: u32,
    pub difficulty: String,
    /// Server wrapping the real simulator
    pub env_url: Option<String>,

    pub keep_recent: usize,
    pub summary_interval: usize,
    pub verbose_tokens: bool,
}

impl Default for ExperimentConfig {
    fn default() -> Self {
        Self {
            env: "alfworld".to_string(),
            agent: AgentKind::ZipAct,
            model: "gpt-4o-mini".to_string(),
            provider: ProviderType::OpenAI,
            base_url: None,
            episodes: 5,
            max_steps: DEFAULT_MAX_STEPS,
            log_dir: PathBuf::from("logs"),
            split: "eval_out_of_distribution".to_string(),
            task: None,
            variation: 0,
            difficulty: "easy".to_string(),
            env_url: None,
            keep_recent: DEFAULT_KEEP_RECENT,
            summary_interval: DEFAULT_SUMMARY_INTERVAL,
            verbose_tokens: false,
        }
    }
}

impl ExperimentConfig {
    /// Load and validate a TOML file.
    pub fn load(path: &Path) -> Result<Self> {
        let contents = fs::read_to_string(path).map_err(|e| {
            Error::from(e)
                .with_operation("config::load")
                .with_context("path", path.display().to_string())
        })?;
        let config: Self = toml::from_str(&contents).map_err(|e| {
            Error::config_invalid("failed to parse config file")
                .with_operation("config::load")
                .with_context("path", path.display().to_string())
                .set_source(e)
        })?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        let invalid = |msg: &str| -> Result<()> {
            Err(Error::config_invalid(msg).with_operation("config::validate"))
        };

        self.domain()?;
        if self.model.trim().is_empty() {
            return invalid("model must not be empty");
        }
        if self.episodes == 0 {
            return invalid("episodes must be > 0");
        }
        if self.max_steps == 0 {
            return invalid("max_steps must be > 0");
        }
        if self.summary_interval == 0 {
            return invalid("summary_interval must be > 0");
        }
        Ok(())
    }

    pub fn domain(&self) -> Result<Domain> {
        self.env.parse()
    }

    pub fn env_spec(&self) -> EnvSpec {
        let mut spec = EnvSpec::new(self.env.clone());
        spec.url = self.env_url.clone();
        spec.split = self.split.clone();
        spec.task = self.task.clone();
        spec.variation = self.variation;
        spec.difficulty = self.difficulty.clone();
        spec
    }

    pub fn agent_options(&self) -> Result<AgentOptions> {
        Ok(AgentOptions {
            domain: self.domain()?,
            max_steps: self.max_steps,
            keep_recent: self.keep_recent,
            summary_interval: self.summary_interval,
        })
    }

    /// `{env}_{split}` for household runs, `{env}_{task}` otherwise.
    pub fn dataset_label(&self) -> String {
        let household = matches!(self.domain(), Ok(Domain::Household));
        let suffix = if household {
            self.split.as_str()
        } else {
            self.task.as_deref().unwrap_or("default")
        };
        format!("{}_{}", self.env, suffix)
    }

    /// `{env}_{agent}_{model}_{stamp}`; path separators in the model name
    /// become underscores.
    pub fn experiment_name_at(&self, stamp: &str) -> String {
        let model = self.model.replace(['/', '\\'], "_");
        format!("{}_{}_{}_{}", self.env, self.agent, model, stamp)
    }

    pub fn experiment_name(&self) -> String {
        self.experiment_name_at(&Local::now().format("%Y%m%d_%H%M%S").to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use zipact_error::ErrorKind;

    #[test]
    fn test_defaults_are_valid() {
        let config = ExperimentConfig::default();
        config.validate().unwrap();
        assert_eq!(config.agent, AgentKind::ZipAct);
        assert_eq!(config.max_steps, 50);
        assert_eq!(config.dataset_label(), "alfworld_eval_out_of_distribution");
    }

    #[test]
    fn test_load_partial_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("exp.toml");
        fs::write(
            &path,
            "env = \"webshop\"\nagent = \"observation_masking\"\nprovider = \"anthropic\"\nkeep_recent = 3\n",
        )
        .unwrap();

        let config = ExperimentConfig::load(&path).unwrap();
        assert_eq!(config.env, "webshop");
        assert_eq!(config.agent, AgentKind::ObsMask);
        assert_eq!(config.provider, ProviderType::Anthropic);
        assert_eq!(config.keep_recent, 3);
        assert_eq!(config.episodes, 5);
        assert_eq!(config.dataset_label(), "webshop_default");
    }

    #[test]
    fn test_load_rejects_bad_files() {
        let dir = tempfile::tempdir().unwrap();

        let missing = ExperimentConfig::load(&dir.path().join("nope.toml")).unwrap_err();
        assert_eq!(missing.kind(), ErrorKind::FileNotFound);

        let path = dir.path().join("bad.toml");
        fs::write(&path, "episodes = 0\n").unwrap();
        assert_eq!(ExperimentConfig::load(&path).unwrap_err().kind(), ErrorKind::ConfigInvalid);

        fs::write(&path, "colour = \"blue\"\n").unwrap();
        assert_eq!(ExperimentConfig::load(&path).unwrap_err().kind(), ErrorKind::ConfigInvalid);

        fs::write(&path, "env = \"minecraft\"\n").unwrap();
        assert_eq!(ExperimentConfig::load(&path).unwrap_err().kind(), ErrorKind::UnknownEnvironment);
    }

    #[test]
    fn test_partial_file_keeps_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("sciworld.toml");
        fs::write(&path, "env = \"sciworld\"\ntask = \"boil\"\nprovider = \"local\"\n").unwrap();

        let config = ExperimentConfig::load(&path).unwrap();
        let expected = ExperimentConfig {
            env: "sciworld".into(),
            task: Some("boil".into()),
            provider: ProviderType::Local,
            ..Default::default()
        };
        assert_eq!(config, expected);
        assert_eq!(config.dataset_label(), "sciworld_boil");
    }

    #[test]
    fn test_names() {
        let config = ExperimentConfig {
            env: "alfworld_simple".into(),
            agent: AgentKind::Reflexion,
            model: "meta-llama/Llama-3.1-8B".into(),
            ..Default::default()
        };
        assert_eq!(
            config.experiment_name_at("20260101_120000"),
            "alfworld_simple_reflexion_meta-llama_Llama-3.1-8B_20260101_120000"
        );
        assert_eq!(config.dataset_label(), "alfworld_simple_eval_out_of_distribution");

        let spec = config.env_spec();
        assert_eq!(spec.name, "alfworld_simple");
        assert_eq!(spec.split, "eval_out_of_distribution");
    }
}
