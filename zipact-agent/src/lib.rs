//! # ZipAct Agent
//!
//! Agents, the episode loop and experiment bookkeeping.
//!
//! ## Agents
//! - **ZipAct**: conditions on a compact goal/world/constraint state that the
//!   model rewrites after every transition, so prompt size stays flat
//! - **ReAct**, **observation masking**, **Reflexion**, **summary**: baselines
//!   that condition on some form of the full transcript
//!
//! ## Flow
//! ```text
//! ExperimentConfig ─► run_experiment ─► run_episode ─► Agent::step ─► LlmClient
//!                            │                 │
//!                            ▼                 ▼
//!                      ExperimentLog      Environment::step
//! ```
//!
//! Records land in `{log_dir}/{experiment}.jsonl` and
//! `{log_dir}/{experiment}_summary.json`; [`analyze::analyze_dir`] compares
//! summaries across experiments.

pub mod agents;
pub mod analyze;
pub mod config;
pub mod experiment;
pub mod parse;
pub mod prompts;
pub mod record;
pub mod runner;
pub mod state;

pub use agents::{
    Agent, AgentKind, AgentOptions, AnyAgent, EpisodeOutcome, ObservationMaskingAgent, ReactAgent, ReflexionAgent,
    StepBudget, SummaryAgent, Transcript, ZipActAgent,
};
pub use config::ExperimentConfig;
pub use experiment::{run_experiment, ExperimentReport};
pub use parse::{parse_decision, Decision};
pub use prompts::{DomainProfile, Prompts};
pub use record::{EpisodeRecord, ExperimentLog, ExperimentSummary, StepRecord};
pub use runner::run_episode;
pub use state::{AgentState, ConstraintState, GoalState, WorldState};
