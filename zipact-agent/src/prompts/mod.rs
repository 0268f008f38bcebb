//! Prompt templates for every agent and domain.
//!
//! Templates are markdown files compiled into the binary and rendered with
//! minijinja. What differs between domains lives in a [`DomainProfile`].

use minijinja::{context, Environment};
use serde::Serialize;
use zipact_env::Domain;
use zipact_error::{Error, Result};

const REACT_SYSTEM: &str = include_str!("react_system.md");
const REACT_USER: &str = include_str!("react_user.md");
const ZIPACT_UPDATER: &str = include_str!("zipact_updater.md");
const ZIPACT_ACTOR: &str = include_str!("zipact_actor.md");
const ZIPACT_INIT: &str = include_str!("zipact_init.md");
const ZIPACT_UPDATE: &str = include_str!("zipact_update.md");
const ZIPACT_ACT: &str = include_str!("zipact_act.md");
const REFLECTION: &str = include_str!("reflection.md");
const SUMMARY: &str = include_str!("summary.md");

/// System prompt for the ZipAct state initialization call
pub const INIT_SYSTEM: &str = "You are a helpful assistant that initializes agent state.";

/// Domain-specific pieces spliced into the shared templates.
#[derive(Debug, Clone, Serialize)]
pub struct DomainProfile {
    pub role: &'static str,
    pub task_label: &'static str,
    pub actions: &'static str,
    pub example: &'static str,
    pub failure_cues: &'static str,
    pub state_notes: &'static str,
    pub decomposition: &'static str,
}

const HOUSEHOLD: DomainProfile = DomainProfile {
    role: "an agent doing chores in a text-based household",
    task_label: "Task",
    actions: "- go to <receptacle>
- open <receptacle> / close <receptacle>
- take <object> from <receptacle>
- put <object> in/on <receptacle>
- heat <object> with <receptacle> (microwave)
- cool <object> with <receptacle> (fridge)
- clean <object> with <receptacle> (sinkbasin)
- toggle <object>, use <object>, examine <object>
- look (describe where you are)
- inventory (list what you hold)",
    example: "Thought: A mug is often kept in a cabinet. I will check cabinet 1 first.
Action: go to cabinet 1",
    failure_cues: "\"Nothing happened.\", something is closed, an object is not there",
    state_notes: "",
    decomposition: "Example: for \"put a clean apple in the fridge\" the sub-goals are: find an apple, take the apple, clean the apple at the sinkbasin, go to the fridge, put the apple in the fridge.",
};

const SCIENCE: DomainProfile = DomainProfile {
    role: "an agent running experiments in a text-based science lab",
    task_label: "Scientific Task",
    actions: "- look around
- go to <location>
- pick up <object> / put down <object>
- put <object> in <container>, pour <container> into <container>
- open <object> / close <object>
- activate <device> / deactivate <device>
- focus on <object> (marks the object the task is about, use it deliberately)
- mix <container>, connect <a> to <b>, use <tool> on <object>
- read <object>, examine <object>
- wait (let time pass)",
    example: "Thought: I need a thermometer before I can measure anything. The kitchen usually has one.
Action: go to kitchen",
    failure_cues: "\"No known action matches that input.\", an object is not found, a device does not react",
    state_notes: "You may add a scientific_facts list to world_state for measurements and observed properties (temperatures, states of matter, results of mixing).",
    decomposition: "Example: for \"boil water\" the sub-goals are: find a pot, fill the pot with water, put the pot on the stove, activate the stove, wait until the water boils, focus on the water.",
};

const SHOPPING: DomainProfile = DomainProfile {
    role: "an agent shopping on a text-based web store",
    task_label: "Shopping Task",
    actions: "- search[<query>] (only on the search page)
- click[<product title or id>] (open a product from the results)
- click[<option>] (pick a size, color or other option on a product page)
- click[Buy Now] (purchase the product as configured)
- click[Back to Search], click[Next >], click[< Prev]
- back",
    example: "Thought: I need a red cotton shirt in medium under $30. I will search for it.
Action: search[red cotton shirt medium]",
    failure_cues: "the page did not change, an option is missing, the product does not match",
    state_notes: "You may add a target_attributes object to goal_state (product type, color, size, price limit) and current_page, selected_options and candidate_products to world_state.",
    decomposition: "Example: for \"find a red cotton shirt in size medium under $30\" the sub-goals are: search for red cotton shirts, open a matching product under $30, select size medium, buy the product.",
};

impl DomainProfile {
    pub fn for_domain(domain: Domain) -> &'static DomainProfile {
        match domain {
            Domain::Household => &HOUSEHOLD,
            Domain::Science => &SCIENCE,
            Domain::Shopping => &SHOPPING,
        }
    }
}

/// Template engine bound to one domain.
pub struct Prompts {
    domain: Domain,
    env: Environment<'static>,
}

impl std::fmt::Debug for Prompts {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Prompts").field("domain", &self.domain).finish()
    }
}

impl Prompts {
    pub fn new(domain: Domain) -> Self {
        let mut env = Environment::new();
        for (name, source) in [
            ("react_system", REACT_SYSTEM),
            ("react_user", REACT_USER),
            ("zipact_updater", ZIPACT_UPDATER),
            ("zipact_actor", ZIPACT_ACTOR),
            ("zipact_init", ZIPACT_INIT),
            ("zipact_update", ZIPACT_UPDATE),
            ("zipact_act", ZIPACT_ACT),
            ("reflection", REFLECTION),
            ("summary", SUMMARY),
        ] {
            env.add_template(name, source)
                .expect("bundled prompt template should be valid");
        }
        Self { domain, env }
    }

    pub fn domain(&self) -> Domain {
        self.domain
    }

    pub fn profile(&self) -> &'static DomainProfile {
        DomainProfile::for_domain(self.domain)
    }

    fn render(&self, name: &'static str, ctx: minijinja::Value) -> Result<String> {
        let template = self.env.get_template(name).map_err(|e| {
            Error::template_failed("missing template")
                .with_operation("prompts::render")
                .with_context("template", name)
                .set_source(e)
        })?;
        template.render(ctx).map_err(|e| {
            Error::template_failed("failed to render template")
                .with_operation("prompts::render")
                .with_context("template", name)
                .set_source(e)
        })
    }

    pub fn react_system(&self) -> Result<String> {
        let p = self.profile();
        self.render("react_system", context! { role => p.role, actions => p.actions, example => p.example })
    }

    pub fn react_user(&self, instruction: &str, history: &str) -> Result<String> {
        self.render(
            "react_user",
            context! { task_label => self.profile().task_label, instruction => instruction, history => history },
        )
    }

    pub fn zipact_updater(&self) -> Result<String> {
        let p = self.profile();
        self.render(
            "zipact_updater",
            context! { role => p.role, failure_cues => p.failure_cues, state_notes => p.state_notes },
        )
    }

    pub fn zipact_actor(&self) -> Result<String> {
        let p = self.profile();
        self.render("zipact_actor", context! { role => p.role, actions => p.actions, example => p.example })
    }

    pub fn zipact_init(&self, instruction: &str) -> Result<String> {
        let p = self.profile();
        self.render(
            "zipact_init",
            context! { task_label => p.task_label, instruction => instruction, decomposition => p.decomposition },
        )
    }

    pub fn zipact_update(&self, state: &str, last_action: &str, observation: &str) -> Result<String> {
        self.render(
            "zipact_update",
            context! { state => state, last_action => last_action, observation => observation },
        )
    }

    pub fn zipact_act(&self, state: &str, observation: &str) -> Result<String> {
        self.render("zipact_act", context! { state => state, observation => observation })
    }

    pub fn reflection(&self, task: &str, history: &str, failure_reason: &str) -> Result<String> {
        self.render(
            "reflection",
            context! { task => task, history => history, failure_reason => failure_reason },
        )
    }

    pub fn summary(&self, history: &str) -> Result<String> {
        self.render("summary", context! { history => history })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_all_templates_render_for_every_domain() {
        for domain in Domain::ALL {
            let prompts = Prompts::new(domain);
            let profile = prompts.profile();

            let system = prompts.react_system().unwrap();
            assert!(system.contains(profile.role));
            assert!(system.contains("Action: <one command"));

            assert!(prompts.zipact_updater().unwrap().contains("\"constraint_state\""));
            assert!(prompts.zipact_actor().unwrap().contains(profile.actions));
            assert!(prompts.zipact_init("do it").unwrap().contains(&format!("{}: do it", profile.task_label)));
            assert!(prompts.reflection("t", "h", "Task failed").unwrap().contains("Outcome: Task failed"));
            assert!(prompts.summary("Action 1: look").unwrap().ends_with("Summary:"));
        }
    }

    #[test]
    fn test_react_user_layout() {
        let prompts = Prompts::new(Domain::Household);
        let user = prompts.react_user("heat some mug", "Observation 1: You are in a kitchen.").unwrap();
        assert_eq!(
            user,
            "Task: heat some mug\n\nHistory:\nObservation 1: You are in a kitchen.\n\nWhat do you do next?"
        );
    }

    #[test]
    fn test_zipact_update_layout() {
        let prompts = Prompts::new(Domain::Shopping);
        let update = prompts.zipact_update("{}", "search[shirt]", "Results for \"shirt\"").unwrap();
        assert_eq!(
            update,
            "Previous State:\n```json\n{}\n```\n\nLast Action: search[shirt]\n\nNew Observation:\nResults for \"shirt\"\n\nAnalyze the transition and output the updated state in JSON format."
        );

        let act = prompts.zipact_act("{}", "WebShop").unwrap();
        assert!(act.starts_with("Current State:\n```json\n{}\n```\n\nImmediate Observation:\nWebShop"));
        assert!(act.ends_with("Decide what to do next."));
    }

    #[test]
    fn test_state_notes_only_where_present() {
        let household = Prompts::new(Domain::Household).zipact_updater().unwrap();
        assert!(!household.contains("scientific_facts"));
        let science = Prompts::new(Domain::Science).zipact_updater().unwrap();
        assert!(science.contains("scientific_facts"));
    }
}
