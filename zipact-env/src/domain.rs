//! Task domains
//!
//! A domain selects the prompts, the action vocabulary and the environment
//! adapter. Environment names on the command line map onto one of three.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use zipact_error::Error;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Domain {
    /// ALFWorld-style household tasks
    #[serde(rename = "alfworld")]
    Household,
    /// ScienceWorld-style experiments
    #[serde(rename = "sciworld")]
    Science,
    /// WebShop-style product search
    #[serde(rename = "webshop")]
    Shopping,
}

impl Domain {
    pub const ALL: [Domain; 3] = [Domain::Household, Domain::Science, Domain::Shopping];

    pub fn as_str(&self) -> &'static str {
        match self {
            Domain::Household => "alfworld",
            Domain::Science => "sciworld",
            Domain::Shopping => "webshop",
        }
    }

    /// The command that only re-observes; used when no action can be parsed.
    pub fn noop_action(&self) -> &'static str {
        match self {
            Domain::Household | Domain::Shopping => "look",
            Domain::Science => "look around",
        }
    }
}

impl FromStr for Domain {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "alfworld" | "alf" | "alfworld_simple" => Ok(Domain::Household),
            "sciworld" | "sci" | "scienceworld" => Ok(Domain::Science),
            "webshop" | "web" => Ok(Domain::Shopping),
            _ => Err(Error::unknown_environment(s)
                .with_context("supported", "alfworld, alfworld_simple, sciworld, webshop")),
        }
    }
}

impl fmt::Display for Domain {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
