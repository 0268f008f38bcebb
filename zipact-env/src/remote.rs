//! Adapter for simulators served over HTTP.
//!
//! The real ALFWorld, ScienceWorld and WebShop simulators are not Rust
//! libraries; a thin server wraps each of them and speaks JSON:
//!
//! - `POST {url}/reset` with `{"domain", "options"}` returns `{"observation", "info"}`
//! - `POST {url}/step` with `{"action"}` returns `{"observation", "reward", "done", "info"}`
//!
//! This adapter adds what the harness expects on top: a task string per
//! domain, science scores normalized to `[0, 1]`, and a page type for
//! shopping steps.

use crate::environment::{EnvSpec, Environment, Info, Reset, Transition};
use crate::Domain;
use regex::Regex;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::sync::LazyLock;
use zipact_error::{Error, Result};

static HOUSEHOLD_TASK: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)Your task is to:\s*(.+?)(?:\n|$)").unwrap());
static SCIENCE_TASK: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"(?i)Task:\s*(.+?)(?:\n|$)").unwrap());
static SHOP_TASK: LazyLock<Vec<Regex>> = LazyLock::new(|| {
    [
        r"(?is)Instruction:\s*\[(.+?)\]",
        r"(?is)Instruction:\s*(.+?)(?:\n|$)",
        r"(?is)Goal:\s*(.+?)(?:\n|$)",
        r"(?is)I need\s+(.+?)(?:\n|$)",
        r"(?is)Find\s+(.+?)(?:\n|$)",
    ]
    .iter()
    .map(|p| Regex::new(p).unwrap())
    .collect()
});

#[derive(Debug, Serialize)]
struct ResetRequest<'a> {
    domain: Domain,
    options: &'a Value,
}

#[derive(Debug, Serialize)]
struct StepRequest<'a> {
    action: &'a str,
}

#[derive(Debug, Deserialize)]
pub(crate) struct ResetResponse {
    observation: String,
    #[serde(default)]
    info: Info,
}

#[derive(Debug, Deserialize)]
pub(crate) struct StepResponse {
    observation: String,
    #[serde(default)]
    reward: f64,
    #[serde(default)]
    done: bool,
    #[serde(default)]
    info: Info,
}

pub struct RemoteEnv {
    client: Client,
    base_url: String,
    domain: Domain,
    options: Value,
    task_name: String,
    task: String,
    admissible: Vec<String>,
    max_score: f64,
}

impl RemoteEnv {
    pub fn new(domain: Domain, base_url: impl Into<String>, spec: &EnvSpec) -> Self {
        let base_url: String = base_url.into();
        let client = Client::builder()
            .timeout(std::time::Duration::from_secs(120))
            .build()
            .unwrap_or_else(|_| Client::new());

        let mut options = json!({
            "split": spec.split,
            "variation": spec.variation,
            "difficulty": spec.difficulty,
        });
        if let Some(task) = &spec.task {
            options["task"] = Value::String(task.clone());
        }

        Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            domain,
            options,
            task_name: spec.task.clone().unwrap_or_else(|| "boil".into()),
            task: String::new(),
            admissible: Vec::new(),
            max_score: 0.0,
        }
    }

    async fn post<B: Serialize, R: for<'de> Deserialize<'de>>(
        &self,
        path: &'static str,
        body: &B,
    ) -> Result<R> {
        let url = format!("{}/{}", self.base_url, path);
        let response = self.client.post(&url).json(body).send().await.map_err(|e| {
            Error::environment_failed(format!("request to {} failed", url))
                .with_operation("env::remote")
                .with_context("path", path)
                .set_source(e)
        })?;

        let status = response.status();
        if !status.is_success() {
            let text = response.text().await.unwrap_or_default();
            return Err(Error::environment_failed(text)
                .with_operation("env::remote")
                .with_context("path", path)
                .with_context("status", status.as_u16().to_string()));
        }

        response.json().await.map_err(|e| {
            Error::environment_failed("malformed response from simulator")
                .with_operation("env::remote")
                .with_context("path", path)
                .set_source(e)
        })
    }

    pub(crate) fn absorb_reset(&mut self, response: ResetResponse) -> Reset {
        let ResetResponse { observation, mut info } = response;

        self.task = match self.domain {
            Domain::Household => household_task(&observation),
            Domain::Science => {
                let description = info.get("task_description").and_then(Value::as_str).unwrap_or_default();
                science_task(&observation, description, &self.task_name)
            }
            Domain::Shopping => shop_task(&observation),
        };
        self.max_score = info.get("max_score").and_then(Value::as_f64).unwrap_or(0.0);
        self.admissible = admissible_from(&info).unwrap_or_default();

        info.insert("task".into(), Value::String(self.task.clone()));
        if self.domain == Domain::Shopping {
            info.entry("page_type").or_insert_with(|| Value::String("search".into()));
        }
        Reset { observation, info }
    }

    pub(crate) fn absorb_step(&mut self, action: &str, response: StepResponse) -> Transition {
        let StepResponse { observation, mut reward, done, mut info } = response;

        if let Some(commands) = admissible_from(&info) {
            self.admissible = commands;
        }

        match self.domain {
            Domain::Science => {
                if let Some(max) = info.get("max_score").and_then(Value::as_f64) {
                    self.max_score = max;
                }
                if let Some(score) = info.get("score").and_then(Value::as_f64) {
                    reward = normalize_score(score, self.max_score);
                    info.insert("normalized_score".into(), json!(reward));
                    info.insert("max_score".into(), json!(self.max_score));
                }
            }
            Domain::Shopping => {
                info.insert("page_type".into(), Value::String(detect_page_type(&observation).into()));
                info.insert("action".into(), Value::String(action.into()));
            }
            Domain::Household => {}
        }

        Transition { observation, reward, done, info }
    }
}

impl Environment for RemoteEnv {
    fn domain(&self) -> Domain {
        self.domain
    }

    async fn reset(&mut self) -> Result<Reset> {
        let request = ResetRequest { domain: self.domain, options: &self.options };
        let response: ResetResponse = self.post("reset", &request).await?;
        Ok(self.absorb_reset(response))
    }

    async fn step(&mut self, action: &str) -> Result<Transition> {
        let response: StepResponse = self.post("step", &StepRequest { action }).await?;
        Ok(self.absorb_step(action, response))
    }

    fn task(&self) -> &str {
        &self.task
    }

    fn admissible_commands(&self) -> Vec<String> {
        self.admissible.clone()
    }
}

/// Accepts either a flat list or the batched `[[...]]` form.
fn admissible_from(info: &Info) -> Option<Vec<String>> {
    let list = info.get("admissible_commands")?.as_array()?;
    let list = match list.first() {
        Some(Value::Array(inner)) => inner,
        _ => list,
    };
    Some(list.iter().filter_map(Value::as_str).map(str::to_string).collect())
}

fn non_empty_lines(text: &str) -> impl Iterator<Item = &str> {
    text.lines().map(str::trim).filter(|l| !l.is_empty())
}

pub fn household_task(observation: &str) -> String {
    if let Some(c) = HOUSEHOLD_TASK.captures(observation) {
        return c[1].trim().to_string();
    }
    non_empty_lines(observation)
        .last()
        .map(str::to_string)
        .unwrap_or_else(|| observation.to_string())
}

pub fn science_task(observation: &str, description: &str, task_name: &str) -> String {
    if !description.trim().is_empty() {
        return description.trim().to_string();
    }
    if let Some(c) = SCIENCE_TASK.captures(observation) {
        return c[1].trim().to_string();
    }
    format!("Complete the {} task", task_name)
}

pub fn shop_task(observation: &str) -> String {
    for pattern in SHOP_TASK.iter() {
        if let Some(c) = pattern.captures(observation) {
            return c[1].trim().to_string();
        }
    }
    non_empty_lines(observation)
        .next()
        .map(str::to_string)
        .unwrap_or_else(|| "Find and purchase the requested product".to_string())
}

pub fn normalize_score(score: f64, max_score: f64) -> f64 {
    if max_score > 0.0 {
        score / max_score
    } else {
        0.0
    }
}

/// Rough page classification from the page text.
pub fn detect_page_type(observation: &str) -> &'static str {
    let text = observation.to_lowercase();
    let has = |word: &str| text.contains(word);

    if has("search") && !has("results") {
        "search"
    } else if has("results") || has("products") {
        "results"
    } else if has("product") && (has("details") || has("description")) {
        "product_detail"
    } else if has("cart") {
        "cart"
    } else if has("checkout") || has("thank you") || has("order") {
        "checkout"
    } else {
        "unknown"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use std::sync::{Arc, Mutex};
    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tokio::net::{TcpListener, TcpStream};

    fn env(domain: Domain) -> RemoteEnv {
        RemoteEnv::new(domain, "http://localhost:3000/", &EnvSpec::new(domain.as_str()))
    }

    type Seen = Arc<Mutex<Vec<(String, Value)>>>;

    /// Local HTTP server answering each path with a fixed status and JSON body.
    /// Returns its base URL and the (path, body) of every request received.
    async fn serve(routes: Vec<(&'static str, u16, Value)>) -> (String, Seen) {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let url = format!("http://{}", listener.local_addr().unwrap());
        let routes: HashMap<String, (u16, String)> =
            routes.into_iter().map(|(path, status, body)| (path.to_string(), (status, body.to_string()))).collect();
        let seen: Seen = Arc::default();

        let log = seen.clone();
        tokio::spawn(async move {
            while let Ok((stream, _)) = listener.accept().await {
                answer(stream, &routes, &log).await;
            }
        });
        (url, seen)
    }

    async fn answer(mut stream: TcpStream, routes: &HashMap<String, (u16, String)>, seen: &Seen) {
        let mut buf = Vec::new();
        let mut chunk = [0u8; 1024];
        let head_end = loop {
            let n = stream.read(&mut chunk).await.unwrap();
            if n == 0 {
                return;
            }
            buf.extend_from_slice(&chunk[..n]);
            if let Some(pos) = buf.windows(4).position(|w| w == b"\r\n\r\n") {
                break pos + 4;
            }
        };

        let head = String::from_utf8_lossy(&buf[..head_end]).to_string();
        let length: usize = head
            .lines()
            .filter_map(|line| line.split_once(':'))
            .find(|(name, _)| name.eq_ignore_ascii_case("content-length"))
            .and_then(|(_, value)| value.trim().parse().ok())
            .unwrap_or(0);
        while buf.len() < head_end + length {
            let n = stream.read(&mut chunk).await.unwrap();
            if n == 0 {
                break;
            }
            buf.extend_from_slice(&chunk[..n]);
        }

        let path = head.split_whitespace().nth(1).unwrap_or("/").to_string();
        let body = serde_json::from_slice(&buf[head_end..]).unwrap_or(Value::Null);
        let (status, payload) = routes.get(&path).cloned().unwrap_or((404, "{}".into()));
        seen.lock().unwrap().push((path, body));

        let response = format!(
            "HTTP/1.1 {} X\r\nContent-Type: application/json\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{}",
            status,
            payload.len(),
            payload
        );
        stream.write_all(response.as_bytes()).await.unwrap();
        stream.shutdown().await.ok();
    }

    #[tokio::test]
    async fn test_reset_and_step_over_http() {
        let (url, seen) = serve(vec![
            (
                "/reset",
                200,
                json!({
                    "observation": "You are in the middle of a room.\nYour task is to: put a clean apple in fridge.",
                    "info": {"admissible_commands": [["look", "go to fridge 1"]]}
                }),
            ),
            ("/step", 200, json!({"observation": "The fridge 1 is closed.", "reward": 1.0, "done": true})),
        ])
        .await;

        let mut env = RemoteEnv::new(Domain::Household, format!("{}/", url), &EnvSpec::new("alfworld"));
        let reset = env.reset().await.unwrap();
        assert!(reset.observation.starts_with("You are in the middle of a room."));
        assert_eq!(env.task(), "put a clean apple in fridge.");
        assert_eq!(reset.info["task"], "put a clean apple in fridge.");
        assert_eq!(env.admissible_commands(), vec!["look", "go to fridge 1"]);

        let t = env.step("go to fridge 1").await.unwrap();
        assert_eq!(t.observation, "The fridge 1 is closed.");
        assert_eq!(t.reward, 1.0);
        assert!(t.done);
        assert_eq!(env.admissible_commands(), vec!["look", "go to fridge 1"]);

        let seen = seen.lock().unwrap().clone();
        assert_eq!(seen.len(), 2);
        assert_eq!(seen[0].0, "/reset");
        assert_eq!(seen[0].1["domain"], "alfworld");
        assert!(seen[0].1["options"]["split"].is_string());
        assert_eq!(seen[1].0, "/step");
        assert_eq!(seen[1].1, json!({"action": "go to fridge 1"}));
    }

    #[tokio::test]
    async fn test_server_error_is_retryable() {
        let (url, _) = serve(vec![("/step", 503, json!({"error": "simulator restarting"}))]).await;
        let mut env = RemoteEnv::new(Domain::Science, url, &EnvSpec::new("sciworld"));

        let err = env.step("look around").await.unwrap_err();
        assert_eq!(err.kind(), zipact_error::ErrorKind::EnvironmentFailed);
        assert!(err.is_retryable());
        assert!(err.context().contains(&("status", "503".to_string())));

        let err = env.reset().await.unwrap_err();
        assert!(err.context().contains(&("status", "404".to_string())));
    }

    #[test]
    fn test_household_task() {
        let obs = "You are in the middle of a room.\nYour task is to: put a clean apple in fridge.";
        assert_eq!(household_task(obs), "put a clean apple in fridge.");
        assert_eq!(household_task("line one\n\nlast line\n"), "last line");
    }

    #[test]
    fn test_science_task_fallbacks() {
        assert_eq!(science_task("", "  Your task is to boil water. ", "boil"), "Your task is to boil water.");
        assert_eq!(science_task("Task: melt the ice\nThis room is called the kitchen.", "", "melt"), "melt the ice");
        assert_eq!(science_task("This room is called the kitchen.", "", "freeze"), "Complete the freeze task");
    }

    #[test]
    fn test_shop_task_patterns() {
        assert_eq!(shop_task("WebShop\nInstruction: [i want a blue mug]\n[Search]"), "i want a blue mug");
        assert_eq!(shop_task("Instruction: buy socks\n[Search]"), "buy socks");
        assert_eq!(shop_task("Goal: cheap lamp"), "cheap lamp");
        assert_eq!(shop_task("\n  WebShop home\n[Search]"), "WebShop home");
    }

    #[test]
    fn test_detect_page_type() {
        assert_eq!(detect_page_type("[Search]"), "search");
        assert_eq!(detect_page_type("Results for \"shirt\""), "results");
        assert_eq!(detect_page_type("Red shirt\nProduct details"), "product_detail");
        assert_eq!(detect_page_type("Thank you for your purchase!"), "checkout");
        assert_eq!(detect_page_type("???"), "unknown");
    }

    #[test]
    fn test_normalize_score() {
        assert_eq!(normalize_score(50.0, 100.0), 0.5);
        assert_eq!(normalize_score(10.0, 0.0), 0.0);
    }

    #[test]
    fn test_absorb_science_step() {
        let mut env = env(Domain::Science);
        let reset: ResetResponse = serde_json::from_value(json!({
            "observation": "This room is called the kitchen.",
            "info": {"task_description": "Your task is to boil water.", "max_score": 100}
        }))
        .unwrap();
        let reset = env.absorb_reset(reset);
        assert_eq!(env.task(), "Your task is to boil water.");
        assert_eq!(reset.info["task"], "Your task is to boil water.");

        let step: StepResponse = serde_json::from_value(json!({
            "observation": "You move to the kitchen.",
            "reward": 25,
            "done": false,
            "info": {"score": 25}
        }))
        .unwrap();
        let t = env.absorb_step("go to kitchen", step);
        assert_eq!(t.reward, 0.25);
        assert_eq!(t.info["normalized_score"], 0.25);
    }

    #[test]
    fn test_absorb_shop_step_and_admissible() {
        let mut env = env(Domain::Shopping);
        let step: StepResponse = serde_json::from_value(json!({
            "observation": "Results for \"mug\"",
            "info": {"admissible_commands": [["click[item 1]", "click[Back to Search]"]]}
        }))
        .unwrap();
        let t = env.absorb_step("search[mug]", step);
        assert_eq!(t.info["page_type"], "results");
        assert_eq!(t.info["action"], "search[mug]");
        assert_eq!(t.reward, 0.0);
        assert_eq!(env.admissible_commands(), vec!["click[item 1]", "click[Back to Search]"]);
    }

    #[test]
    fn test_base_url_and_options() {
        let spec = EnvSpec { task: Some("melt".into()), ..EnvSpec::new("sciworld") };
        let env = RemoteEnv::new(Domain::Science, "http://sim:8080/", &spec);
        assert_eq!(env.base_url, "http://sim:8080");
        assert_eq!(env.options["task"], "melt");
        assert_eq!(env.options["variation"], 0);
    }
}
