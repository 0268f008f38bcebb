//! The environment interface and the factory that picks an implementation.

use crate::household::HouseholdSim;
use crate::remote::RemoteEnv;
use crate::shop::MockShop;
use crate::Domain;
use serde_json::{Map, Value};
use zipact_error::{Error, Result};

/// Free-form extra data an environment attaches to a reset or step
pub type Info = Map<String, Value>;

/// What `reset` returns: the first observation of an episode.
#[derive(Debug, Clone, PartialEq)]
pub struct Reset {
    pub observation: String,
    pub info: Info,
}

/// What `step` returns.
#[derive(Debug, Clone, PartialEq)]
pub struct Transition {
    pub observation: String,
    pub reward: f64,
    pub done: bool,
    pub info: Info,
}

/// A text environment driven one action at a time.
#[allow(async_fn_in_trait)]
pub trait Environment {
    fn domain(&self) -> Domain;

    /// Start a new episode
    async fn reset(&mut self) -> Result<Reset>;

    /// Execute one action
    async fn step(&mut self, action: &str) -> Result<Transition>;

    /// The instruction for the current episode
    fn task(&self) -> &str;

    /// Commands valid in the current state, when the environment knows them
    fn admissible_commands(&self) -> Vec<String> {
        Vec::new()
    }
}

/// How to open an environment.
#[derive(Debug, Clone, PartialEq)]
pub struct EnvSpec {
    /// Name as given on the command line (`alfworld`, `alfworld_simple`, `sciworld`, `webshop`)
    pub name: String,
    /// Base URL of a server wrapping the real simulator
    pub url: Option<String>,
    pub split: String,
    pub task: Option<String>,
    pub variation: u32,
    pub difficulty: String,
    /// Environment-side step cap for the household simulator
    pub sim_max_steps: usize,
}

impl EnvSpec {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            url: None,
            split: "eval_out_of_distribution".into(),
            task: None,
            variation: 0,
            difficulty: "easy".into(),
            sim_max_steps: crate::household::DEFAULT_MAX_STEPS,
        }
    }

    pub fn with_url(mut self, url: impl Into<String>) -> Self {
        self.url = Some(url.into());
        self
    }

    pub fn domain(&self) -> Result<Domain> {
        self.name.parse()
    }
}

/// An environment chosen at runtime.
pub enum AnyEnv {
    Household(HouseholdSim),
    Shop(MockShop),
    Remote(RemoteEnv),
}

impl AnyEnv {
    /// Open the environment `spec` names.
    ///
    /// `alfworld_simple` always runs the local simulator. Otherwise a URL
    /// selects the remote adapter; without one, household and shopping fall
    /// back to their local stand-ins and science is an error.
    pub fn open(spec: &EnvSpec) -> Result<Self> {
        let domain = spec.domain()?;
        let simple = spec.name.trim().eq_ignore_ascii_case("alfworld_simple");

        if let (Some(url), false) = (&spec.url, simple) {
            tracing::info!(domain = %domain, url = %url, "using remote environment");
            return Ok(AnyEnv::Remote(RemoteEnv::new(domain, url.clone(), spec)));
        }

        match domain {
            Domain::Household => Ok(AnyEnv::Household(HouseholdSim::new(spec.sim_max_steps))),
            Domain::Shopping => {
                tracing::warn!("no --env-url given, webshop runs against the built-in mock storefront");
                Ok(AnyEnv::Shop(MockShop::new()))
            }
            Domain::Science => Err(Error::config_invalid(
                "sciworld needs a simulator server, pass --env-url",
            )
            .with_operation("env::open")
            .with_context("env", spec.name.clone())),
        }
    }
}

impl Environment for AnyEnv {
    fn domain(&self) -> Domain {
        match self {
            AnyEnv::Household(e) => e.domain(),
            AnyEnv::Shop(e) => e.domain(),
            AnyEnv::Remote(e) => e.domain(),
        }
    }

    async fn reset(&mut self) -> Result<Reset> {
        match self {
            AnyEnv::Household(e) => e.reset().await,
            AnyEnv::Shop(e) => e.reset().await,
            AnyEnv::Remote(e) => e.reset().await,
        }
    }

    async fn step(&mut self, action: &str) -> Result<Transition> {
        match self {
            AnyEnv::Household(e) => e.step(action).await,
            AnyEnv::Shop(e) => e.step(action).await,
            AnyEnv::Remote(e) => e.step(action).await,
        }
    }

    fn task(&self) -> &str {
        match self {
            AnyEnv::Household(e) => e.task(),
            AnyEnv::Shop(e) => e.task(),
            AnyEnv::Remote(e) => e.task(),
        }
    }

    fn admissible_commands(&self) -> Vec<String> {
        match self {
            AnyEnv::Household(e) => e.admissible_commands(),
            AnyEnv::Shop(e) => e.admissible_commands(),
            AnyEnv::Remote(e) => e.admissible_commands(),
        }
    }
}
