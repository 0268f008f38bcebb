//! Agent strategies.
//!
//! Four baselines condition on some form of the interaction history
//! (ReAct, observation masking, Reflexion, rolling summary). ZipAct
//! conditions on a compressed state the model rewrites every step.
//!
//! Agents do not own the LLM client; the runner lends it for each call so
//! token accounting stays in one place.

mod masking;
mod react;
mod reflexion;
mod summary;
mod zipact;

pub use masking::ObservationMaskingAgent;
pub use react::ReactAgent;
pub use reflexion::ReflexionAgent;
pub use summary::SummaryAgent;
pub use zipact::ZipActAgent;

use crate::parse::{parse_decision, Decision};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;
use std::str::FromStr;
use zipact_env::Domain;
use zipact_error::{Error, Result};
use zipact_llm::{ChatMessage, ChatOptions, LlmClient, LlmProvider};

/// Default per-episode step budget
pub const DEFAULT_MAX_STEPS: usize = 50;
/// Observations kept verbatim by the masking agent
pub const DEFAULT_KEEP_RECENT: usize = 5;
/// Steps between summaries for the summary agent
pub const DEFAULT_SUMMARY_INTERVAL: usize = 10;

const DECISION_TEMPERATURE: f32 = 0.0;
const DECISION_MAX_TOKENS: usize = 256;

/// How an episode ended, handed to [`Agent::finish`].
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct EpisodeOutcome {
    pub success: bool,
    pub reward: f64,
    pub steps: usize,
}

/// A decision-making strategy.
#[allow(async_fn_in_trait)]
pub trait Agent {
    fn name(&self) -> &'static str;

    /// Start a new episode for `instruction`
    async fn reset<P: LlmProvider>(&mut self, client: &mut LlmClient<P>, instruction: &str) -> Result<()>;

    /// Decide the next action. Fails with `StepLimitReached` once the budget is spent.
    async fn step<P: LlmProvider>(&mut self, client: &mut LlmClient<P>, observation: &str) -> Result<Decision>;

    fn last_thought(&self) -> &str;

    /// Internal state worth logging next to each step
    fn snapshot(&self) -> Option<Value> {
        None
    }

    /// End-of-episode hook
    async fn finish<P: LlmProvider>(&mut self, _client: &mut LlmClient<P>, _outcome: &EpisodeOutcome) -> Result<()> {
        Ok(())
    }

    fn steps_taken(&self) -> usize;
}

/// Counts steps against a fixed maximum.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StepBudget {
    max: usize,
    used: usize,
}

impl StepBudget {
    pub fn new(max: usize) -> Self {
        Self { max, used: 0 }
    }

    pub fn reset(&mut self) {
        self.used = 0;
    }

    /// Consume one step and return its 1-based number.
    pub fn take(&mut self) -> Result<usize> {
        if self.used >= self.max {
            return Err(Error::step_limit_reached(self.max));
        }
        self.used += 1;
        Ok(self.used)
    }

    pub fn used(&self) -> usize {
        self.used
    }

    pub fn max(&self) -> usize {
        self.max
    }

    pub fn exhausted(&self) -> bool {
        self.used >= self.max
    }
}

/// Numbered `Observation n:` / `Thought n:` / `Action n:` lines.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Transcript {
    lines: Vec<String>,
}

impl Transcript {
    pub fn clear(&mut self) {
        self.lines.clear();
    }

    pub fn observation(&mut self, step: usize, observation: &str) {
        self.lines.push(format!("Observation {}: {}", step, observation));
    }

    pub fn decision(&mut self, step: usize, decision: &Decision) {
        self.lines.push(format!("Thought {}: {}", step, decision.thought));
        self.lines.push(format!("Action {}: {}", step, decision.action));
    }

    pub fn len(&self) -> usize {
        self.lines.len()
    }

    pub fn is_empty(&self) -> bool {
        self.lines.is_empty()
    }

    /// Drop all but the last `n` lines
    pub fn keep_last(&mut self, n: usize) {
        let drop = self.lines.len().saturating_sub(n);
        self.lines.drain(..drop);
    }

    pub fn render(&self) -> String {
        self.lines.join("\n")
    }

    pub fn render_last(&self, n: usize) -> String {
        let start = self.lines.len().saturating_sub(n);
        self.lines[start..].join("\n")
    }
}

/// Ask for one decision with the system/user pair and parse the reply.
pub(crate) async fn decide<P: LlmProvider>(
    client: &mut LlmClient<P>,
    domain: Domain,
    system: String,
    user: String,
) -> Decision {
    let reply = client
        .chat(
            vec![ChatMessage::system(system), ChatMessage::user(user)],
            ChatOptions::new(DECISION_TEMPERATURE, DECISION_MAX_TOKENS),
        )
        .await;
    parse_decision(&reply, domain)
}

/// The five strategies by name.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AgentKind {
    React,
    #[serde(rename = "zipact")]
    ZipAct,
    Reflexion,
    #[serde(alias = "observation_masking")]
    ObsMask,
    Summary,
}

impl AgentKind {
    pub const ALL: [AgentKind; 5] = [
        AgentKind::React,
        AgentKind::ZipAct,
        AgentKind::Reflexion,
        AgentKind::ObsMask,
        AgentKind::Summary,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            AgentKind::React => "react",
            AgentKind::ZipAct => "zipact",
            AgentKind::Reflexion => "reflexion",
            AgentKind::ObsMask => "obs_mask",
            AgentKind::Summary => "summary",
        }
    }
}

impl FromStr for AgentKind {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "react" => Ok(AgentKind::React),
            "zipact" => Ok(AgentKind::ZipAct),
            "reflexion" => Ok(AgentKind::Reflexion),
            "obs_mask" | "observation_masking" => Ok(AgentKind::ObsMask),
            "summary" => Ok(AgentKind::Summary),
            _ => Err(Error::unknown_agent(s)
                .with_context("supported", "react, zipact, reflexion, obs_mask, summary")),
        }
    }
}

impl fmt::Display for AgentKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Knobs shared by agent construction.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AgentOptions {
    pub domain: Domain,
    pub max_steps: usize,
    pub keep_recent: usize,
    pub summary_interval: usize,
}

impl AgentOptions {
    pub fn new(domain: Domain) -> Self {
        Self {
            domain,
            max_steps: DEFAULT_MAX_STEPS,
            keep_recent: DEFAULT_KEEP_RECENT,
            summary_interval: DEFAULT_SUMMARY_INTERVAL,
        }
    }

    pub fn with_max_steps(mut self, max_steps: usize) -> Self {
        self.max_steps = max_steps;
        self
    }
}

/// An agent chosen at runtime.
pub enum AnyAgent {
    React(ReactAgent),
    ZipAct(ZipActAgent),
    Reflexion(ReflexionAgent),
    ObsMask(ObservationMaskingAgent),
    Summary(SummaryAgent),
}

impl AnyAgent {
    pub fn new(kind: AgentKind, options: AgentOptions) -> Self {
        let AgentOptions { domain, max_steps, keep_recent, summary_interval } = options;
        match kind {
            AgentKind::React => AnyAgent::React(ReactAgent::new(domain, max_steps)),
            AgentKind::ZipAct => AnyAgent::ZipAct(ZipActAgent::new(domain, max_steps)),
            AgentKind::Reflexion => AnyAgent::Reflexion(ReflexionAgent::new(domain, max_steps)),
            AgentKind::ObsMask => {
                AnyAgent::ObsMask(ObservationMaskingAgent::new(domain, max_steps, keep_recent))
            }
            AgentKind::Summary => AnyAgent::Summary(SummaryAgent::new(domain, max_steps, summary_interval)),
        }
    }

    pub fn kind(&self) -> AgentKind {
        match self {
            AnyAgent::React(_) => AgentKind::React,
            AnyAgent::ZipAct(_) => AgentKind::ZipAct,
            AnyAgent::Reflexion(_) => AgentKind::Reflexion,
            AnyAgent::ObsMask(_) => AgentKind::ObsMask,
            AnyAgent::Summary(_) => AgentKind::Summary,
        }
    }
}

macro_rules! dispatch {
    ($self:expr, $agent:ident => $body:expr) => {
        match $self {
            AnyAgent::React($agent) => $body,
            AnyAgent::ZipAct($agent) => $body,
            AnyAgent::Reflexion($agent) => $body,
            AnyAgent::ObsMask($agent) => $body,
            AnyAgent::Summary($agent) => $body,
        }
    };
}

impl Agent for AnyAgent {
    fn name(&self) -> &'static str {
        dispatch!(self, a => a.name())
    }

    async fn reset<P: LlmProvider>(&mut self, client: &mut LlmClient<P>, instruction: &str) -> Result<()> {
        dispatch!(self, a => a.reset(client, instruction).await)
    }

    async fn step<P: LlmProvider>(&mut self, client: &mut LlmClient<P>, observation: &str) -> Result<Decision> {
        dispatch!(self, a => a.step(client, observation).await)
    }

    fn last_thought(&self) -> &str {
        dispatch!(self, a => a.last_thought())
    }

    fn snapshot(&self) -> Option<Value> {
        dispatch!(self, a => a.snapshot())
    }

    async fn finish<P: LlmProvider>(&mut self, client: &mut LlmClient<P>, outcome: &EpisodeOutcome) -> Result<()> {
        dispatch!(self, a => a.finish(client, outcome).await)
    }

    fn steps_taken(&self) -> usize {
        dispatch!(self, a => a.steps_taken())
    }
}
