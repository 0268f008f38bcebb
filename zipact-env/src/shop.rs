//! A scripted storefront standing in for WebShop when no server is available.
//!
//! Only one session exists: find a red cotton shirt, pick size medium, buy it.

use crate::environment::{Environment, Info, Reset, Transition};
use crate::Domain;
use serde_json::Value;
use zipact_error::Result;

const TASK: &str = "Find a red cotton shirt in size medium, price under $30";

const START_PAGE: &str = "WebShop
Instruction: [Find a red cotton shirt in size medium, price under $30]

[Search]";

const RESULTS_PAGE: &str = "Results for \"red cotton shirt\":

[Product 1] Red Cotton T-Shirt - $25.99 ★★★★☆
[Product 2] Premium Red Shirt - $45.00 ★★★★★
[Product 3] Cotton Blend Red Top - $19.99 ★★★☆☆

[Back to Search]";

const PRODUCT_PAGE: &str = "Red Cotton T-Shirt - $25.99

Description: Comfortable 100% cotton t-shirt in vibrant red.
Material: Cotton
Available sizes: [small] [medium] [large] [xl]
Color: Red

[Buy Now] [Back to Search]";

const SIZE_SELECTED_PAGE: &str = "Red Cotton T-Shirt - $25.99

Description: Comfortable 100% cotton t-shirt in vibrant red.
Material: Cotton
Selected size: medium ✓
Color: Red

[Buy Now] [Back to Search]";

const CHECKOUT_PAGE: &str = "Thank you for your purchase!

Order confirmed: Red Cotton T-Shirt (medium) - $25.99

Your reward score: 0.85";

/// Match score awarded for the scripted purchase
pub const PURCHASE_REWARD: f64 = 0.85;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Page {
    Search,
    Results,
    ProductDetail,
    Checkout,
}

impl Page {
    pub fn as_str(&self) -> &'static str {
        match self {
            Page::Search => "search",
            Page::Results => "results",
            Page::ProductDetail => "product_detail",
            Page::Checkout => "checkout",
        }
    }
}

pub struct MockShop {
    page: Page,
    steps: usize,
}

impl MockShop {
    pub fn new() -> Self {
        Self { page: Page::Search, steps: 0 }
    }

    pub fn page(&self) -> Page {
        self.page
    }
}

impl Default for MockShop {
    fn default() -> Self {
        Self::new()
    }
}

impl Environment for MockShop {
    fn domain(&self) -> Domain {
        Domain::Shopping
    }

    async fn reset(&mut self) -> Result<Reset> {
        self.page = Page::Search;
        self.steps = 0;

        let mut info = Info::new();
        info.insert("task".into(), Value::String(TASK.into()));
        info.insert("session".into(), Value::String("mock_session".into()));
        info.insert("page_type".into(), Value::String(self.page.as_str().into()));
        Ok(Reset { observation: START_PAGE.into(), info })
    }

    async fn step(&mut self, action: &str) -> Result<Transition> {
        self.steps += 1;
        let mut reward = 0.0;
        let mut done = false;

        let observation = if action.starts_with("search[") {
            self.page = Page::Results;
            RESULTS_PAGE.to_string()
        } else if action.contains("click[Red Cotton T-Shirt") || action.contains("click[Product 1]") {
            self.page = Page::ProductDetail;
            PRODUCT_PAGE.to_string()
        } else if action == "click[medium]" {
            SIZE_SELECTED_PAGE.to_string()
        } else if action == "click[Buy Now]" {
            self.page = Page::Checkout;
            reward = PURCHASE_REWARD;
            done = true;
            CHECKOUT_PAGE.to_string()
        } else {
            format!("Action '{}' executed. Current page: {}", action, self.page.as_str())
        };

        let mut info = Info::new();
        info.insert("page_type".into(), Value::String(self.page.as_str().into()));
        info.insert("action".into(), Value::String(action.into()));
        info.insert("mock".into(), Value::Bool(true));

        Ok(Transition { observation, reward, done, info })
    }

    fn task(&self) -> &str {
        TASK
    }

    fn admissible_commands(&self) -> Vec<String> {
        let commands: &[&str] = match self.page {
            Page::Search => &["search[<query>]"],
            Page::Results => &["click[<product>]", "click[Back to Search]", "click[Next >]"],
            Page::ProductDetail => &["click[<size>]", "click[<color>]", "click[Buy Now]", "click[Back to Search]"],
            Page::Checkout => &["click[<element>]", "back"],
        };
        commands.iter().map(|c| c.to_string()).collect()
    }
}
