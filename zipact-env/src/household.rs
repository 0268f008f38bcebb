//! A small deterministic kitchen standing in for ALFWorld.
//!
//! One task: heat a mug and put it in a cabinet. Commands follow ALFWorld's
//! text grammar (`go to X`, `take O from R`, `put O in/on R`, `open R`, ...),
//! anything else yields `Nothing happened.`.

use crate::environment::{Environment, Info, Reset, Transition};
use crate::Domain;
use regex::Regex;
use serde_json::{json, Value};
use std::collections::HashSet;
use std::sync::LazyLock;
use zipact_error::Result;

pub const DEFAULT_MAX_STEPS: usize = 30;

const TASK: &str = "heat some mug and put it in cabinet.";

const ROOM: &str = "You are in the middle of a room. Looking quickly around you, you see \
a cabinet 6, a cabinet 5, a cabinet 4, a cabinet 3, a cabinet 2, a cabinet 1, \
a coffeemachine 1, a countertop 3, a countertop 2, a countertop 1, a drawer 3, a drawer 2, \
a drawer 1, a fridge 1, a garbagecan 1, a microwave 1, a shelf 3, a shelf 2, a shelf 1, \
a sinkbasin 1, a stoveburner 4, a stoveburner 3, a stoveburner 2, a stoveburner 1, \
and a toaster 1.";

const LAYOUT: &[(&str, &[&str])] = &[
    ("countertop 1", &["creditcard 1", "potato 2"]),
    ("countertop 2", &["butterknife 1", "knife 1", "peppershaker 2", "spoon 1", "tomato 1", "vase 3", "vase 2"]),
    (
        "countertop 3",
        &[
            "butterknife 3", "butterknife 2", "cellphone 2", "creditcard 2", "dishsponge 3",
            "glassbottle 3", "houseplant 1", "knife 3", "knife 2", "pan 2", "saltshaker 2",
            "soapbottle 3", "spoon 3", "statue 1", "tomato 2",
        ],
    ),
    ("cabinet 1", &["mug 3"]),
    ("cabinet 2", &[]),
    ("cabinet 3", &["plate 1"]),
    ("cabinet 4", &["bowl 1"]),
    ("cabinet 5", &[]),
    ("cabinet 6", &["soapbottle 1"]),
    ("drawer 1", &["fork 1"]),
    ("drawer 2", &["spoon 2"]),
    ("drawer 3", &[]),
    ("fridge 1", &["apple 1", "lettuce 1", "mug 1", "tomato 3"]),
    ("microwave 1", &[]),
    ("coffeemachine 1", &["mug 2"]),
    ("shelf 1", &["peppershaker 1"]),
    ("shelf 2", &["vase 1"]),
    ("shelf 3", &["statue 2"]),
    ("sinkbasin 1", &[]),
    ("garbagecan 1", &[]),
    ("stoveburner 1", &[]),
    ("stoveburner 2", &[]),
    ("stoveburner 3", &[]),
    ("stoveburner 4", &["pot 1"]),
    ("toaster 1", &[]),
];

const OPENABLE: &[&str] = &[
    "fridge 1", "microwave 1", "cabinet 1", "cabinet 2", "cabinet 3", "cabinet 4", "cabinet 5", "cabinet 6",
];

static GO_TO: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"^go to (.+)$").unwrap());
static TAKE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"^take (.+?) from (.+)$").unwrap());
static PUT: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"^put (.+?) (?:in/on|in|on) (.+)$").unwrap());
static OPEN: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"^open (.+)$").unwrap());
static CLOSE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"^close (.+)$").unwrap());
static USE_WITH: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^(heat|cool|clean) (.+?) with (.+)$").unwrap());
static EXAMINE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"^(?:examine|look at) (.+)$").unwrap());

const NOTHING: &str = "Nothing happened.";

pub struct HouseholdSim {
    max_steps: usize,
    receptacles: Vec<(String, Vec<String>)>,
    location: Option<String>,
    inventory: Vec<String>,
    heated: HashSet<String>,
    cooled: HashSet<String>,
    cleaned: HashSet<String>,
    opened: HashSet<String>,
    steps: usize,
    done: bool,
    success: bool,
}

impl HouseholdSim {
    pub fn new(max_steps: usize) -> Self {
        let mut sim = Self {
            max_steps,
            receptacles: Vec::new(),
            location: None,
            inventory: Vec::new(),
            heated: HashSet::new(),
            cooled: HashSet::new(),
            cleaned: HashSet::new(),
            opened: HashSet::new(),
            steps: 0,
            done: false,
            success: false,
        };
        sim.restore();
        sim
    }

    pub fn success(&self) -> bool {
        self.success
    }

    fn restore(&mut self) {
        self.receptacles = LAYOUT
            .iter()
            .map(|(name, items)| (name.to_string(), items.iter().map(|i| i.to_string()).collect()))
            .collect();
        self.location = None;
        self.inventory.clear();
        self.heated.clear();
        self.cooled.clear();
        self.cleaned.clear();
        self.opened.clear();
        self.steps = 0;
        self.done = false;
        self.success = false;
    }

    fn contents(&self, receptacle: &str) -> Option<&Vec<String>> {
        self.receptacles.iter().find(|(name, _)| name == receptacle).map(|(_, items)| items)
    }

    fn contents_mut(&mut self, receptacle: &str) -> Option<&mut Vec<String>> {
        self.receptacles.iter_mut().find(|(name, _)| name == receptacle).map(|(_, items)| items)
    }

    fn is_closed(&self, receptacle: &str) -> bool {
        OPENABLE.contains(&receptacle) && !self.opened.contains(receptacle)
    }

    fn execute(&mut self, action: &str) -> String {
        if let Some(c) = GO_TO.captures(action) {
            return self.go_to(c[1].trim());
        }
        if let Some(c) = TAKE.captures(action) {
            return self.take(c[1].trim(), c[2].trim());
        }
        if let Some(c) = PUT.captures(action) {
            return self.put(c[1].trim(), c[2].trim());
        }
        if let Some(c) = OPEN.captures(action) {
            return self.open(c[1].trim());
        }
        if let Some(c) = CLOSE.captures(action) {
            return self.close(c[1].trim());
        }
        if let Some(c) = USE_WITH.captures(action) {
            return self.treat(&c[1], c[2].trim(), c[3].trim());
        }
        if let Some(c) = EXAMINE.captures(action) {
            return self.examine(c[1].trim());
        }
        match action {
            "look" => self.look(),
            "inventory" => self.describe_inventory(),
            _ => NOTHING.to_string(),
        }
    }

    fn go_to(&mut self, receptacle: &str) -> String {
        let Some(items) = self.contents(receptacle) else {
            return NOTHING.to_string();
        };
        let seen = list_items(items);
        self.location = Some(receptacle.to_string());

        if self.is_closed(receptacle) {
            return format!("The {} is closed.", receptacle);
        }
        format!("On the {}, you see {}.", receptacle, seen)
    }

    fn take(&mut self, object: &str, receptacle: &str) -> String {
        if !self.inventory.is_empty() || self.is_closed(receptacle) {
            return NOTHING.to_string();
        }
        let Some(items) = self.contents_mut(receptacle) else {
            return NOTHING.to_string();
        };
        let Some(pos) = items.iter().position(|i| i == object) else {
            return NOTHING.to_string();
        };
        items.remove(pos);
        self.inventory.push(object.to_string());
        format!("You pick up the {} from the {}.", object, receptacle)
    }

    fn put(&mut self, object: &str, receptacle: &str) -> String {
        let Some(held) = self.inventory.iter().position(|i| i == object) else {
            return NOTHING.to_string();
        };
        if self.contents(receptacle).is_none() || self.is_closed(receptacle) {
            return NOTHING.to_string();
        }

        let object = self.inventory.remove(held);
        if object.contains("mug") && self.heated.contains(&object) && receptacle.contains("cabinet") {
            self.success = true;
            self.done = true;
        }
        let reply = format!("You put the {} in/on the {}.", object, receptacle);
        if let Some(items) = self.contents_mut(receptacle) {
            items.push(object);
        }
        reply
    }

    fn open(&mut self, receptacle: &str) -> String {
        let Some(items) = self.contents(receptacle) else {
            return NOTHING.to_string();
        };
        if !OPENABLE.contains(&receptacle) {
            return NOTHING.to_string();
        }
        if self.opened.contains(receptacle) {
            return format!("The {} is already open.", receptacle);
        }

        let seen = list_items(items);
        self.opened.insert(receptacle.to_string());
        self.location = Some(receptacle.to_string());
        format!("You open the {r}. The {r} is open. In it, you see {seen}.", r = receptacle, seen = seen)
    }

    fn close(&mut self, receptacle: &str) -> String {
        if !OPENABLE.contains(&receptacle) {
            return NOTHING.to_string();
        }
        if !self.opened.remove(receptacle) {
            return format!("The {} is already closed.", receptacle);
        }
        format!("You close the {}.", receptacle)
    }

    fn treat(&mut self, verb: &str, object: &str, appliance: &str) -> String {
        if !self.inventory.iter().any(|i| i == object) {
            return NOTHING.to_string();
        }
        let (required, done) = match verb {
            "heat" => ("microwave", &mut self.heated),
            "cool" => ("fridge", &mut self.cooled),
            _ => ("sinkbasin", &mut self.cleaned),
        };
        if !appliance.contains(required) {
            return NOTHING.to_string();
        }
        done.insert(object.to_string());
        format!("You {} the {} using the {}.", verb, object, appliance)
    }

    fn examine(&self, target: &str) -> String {
        if !self.inventory.iter().any(|i| i == target) {
            return NOTHING.to_string();
        }
        let status: Vec<&str> = [
            (&self.heated, "heated"),
            (&self.cooled, "cooled"),
            (&self.cleaned, "cleaned"),
        ]
        .iter()
        .filter(|(set, _)| set.contains(target))
        .map(|(_, label)| *label)
        .collect();

        if status.is_empty() {
            format!("This is a {}.", target)
        } else {
            format!("The {} is {}.", target, status.join(", "))
        }
    }

    fn look(&self) -> String {
        match &self.location {
            Some(location) => format!("You are facing the {}. Next to it, you see nothing.", location),
            None => ROOM.to_string(),
        }
    }

    fn describe_inventory(&self) -> String {
        match self.inventory.first() {
            Some(item) => format!("You are carrying: a {}.", item),
            None => "You are not carrying anything.".to_string(),
        }
    }

    fn info(&self) -> Info {
        let mut info = Info::new();
        info.insert("success".into(), Value::Bool(self.success));
        info.insert("admissible_commands".into(), json!(self.admissible_commands()));
        info
    }
}

fn list_items(items: &[String]) -> String {
    if items.is_empty() {
        return "nothing".to_string();
    }
    items.iter().map(|i| format!("a {}", i)).collect::<Vec<_>>().join(", ")
}

impl Environment for HouseholdSim {
    fn domain(&self) -> Domain {
        Domain::Household
    }

    async fn reset(&mut self) -> Result<Reset> {
        self.restore();
        let mut info = Info::new();
        info.insert("task".into(), Value::String(TASK.into()));
        info.insert("admissible_commands".into(), json!(self.admissible_commands()));

        Ok(Reset {
            observation: format!("{}\nYour task is to: {}", ROOM, TASK),
            info,
        })
    }

    async fn step(&mut self, action: &str) -> Result<Transition> {
        self.steps += 1;
        let action = action.trim().to_lowercase();

        if self.steps >= self.max_steps {
            self.done = true;
            let mut info = Info::new();
            info.insert("success".into(), Value::Bool(false));
            return Ok(Transition {
                observation: "Episode timed out.".into(),
                reward: 0.0,
                done: true,
                info,
            });
        }

        let observation = self.execute(&action);
        tracing::trace!(step = self.steps, action = %action, observation = %observation, "household step");

        Ok(Transition {
            observation,
            reward: if self.success { 1.0 } else { 0.0 },
            done: self.done,
            info: self.info(),
        })
    }

    fn task(&self) -> &str {
        TASK
    }

    fn admissible_commands(&self) -> Vec<String> {
        let mut commands: Vec<String> = self
            .receptacles
            .iter()
            .map(|(name, _)| format!("go to {}", name))
            .collect();

        for receptacle in OPENABLE {
            if self.opened.contains(*receptacle) {
                commands.push(format!("close {}", receptacle));
            } else {
                commands.push(format!("open {}", receptacle));
            }
        }

        match (self.inventory.first(), &self.location) {
            (None, Some(location)) => {
                if let Some(items) = self.contents(location) {
                    commands.extend(items.iter().map(|o| format!("take {} from {}", o, location)));
                }
            }
            (Some(held), _) => {
                commands.extend(self.receptacles.iter().map(|(name, _)| format!("put {} in/on {}", held, name)));
                commands.push(format!("heat {} with microwave 1", held));
                commands.push(format!("cool {} with fridge 1", held));
                commands.push(format!("clean {} with sinkbasin 1", held));
                commands.push(format!("examine {}", held));
            }
            (None, None) => {}
        }

        commands.push("look".into());
        commands.push("inventory".into());
        commands
    }
}
