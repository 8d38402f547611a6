//! Common test utilities and helpers for integration tests

#![allow(dead_code)]

use std::sync::{Arc, Mutex};

use serde_json::{json, Value};
use wiremock::matchers::any;
use wiremock::{Mock, MockServer, Request, Respond, ResponseTemplate};

use gateway_sync::config::{CloudflareConfig, Config, RetryConfig};

pub const ACCOUNT_ID: &str = "test-account";

/// List stored by the fake gateway
#[derive(Debug, Clone, PartialEq)]
pub struct StoredList {
    pub id: String,
    pub name: String,
    pub items: Vec<String>,
}

/// Rule stored by the fake gateway
#[derive(Debug, Clone, PartialEq)]
pub struct StoredRule {
    pub id: String,
    pub name: String,
    pub traffic: String,
    pub filters: Vec<String>,
    pub block_page_enabled: bool,
}

/// Account state held by the fake gateway
#[derive(Debug, Clone, Default)]
pub struct GatewayState {
    pub lists: Vec<StoredList>,
    pub rules: Vec<StoredRule>,
    pub next_id: usize,
    /// Every call as (method, path)
    pub calls: Vec<(String, String)>,
}

impl GatewayState {
    fn allocate_id(&mut self, prefix: &str) -> String {
        self.next_id += 1;
        format!("{}-{:04}", prefix, self.next_id)
    }
}

/// In-memory gateway API answering list and rule CRUD calls
#[derive(Debug, Clone, Default)]
pub struct FakeGateway {
    state: Arc<Mutex<GatewayState>>,
}

impl FakeGateway {
    /// Start a mock server backed by a fresh fake gateway
    pub async fn start() -> (MockServer, FakeGateway) {
        let server = MockServer::start().await;
        let fake = FakeGateway::default();
        Mock::given(any())
            .respond_with(fake.clone())
            .mount(&server)
            .await;
        (server, fake)
    }

    /// Add a list directly, returning its id
    pub fn seed_list(&self, name: &str, items: &[&str]) -> String {
        let mut state = self.state.lock().unwrap();
        let id = state.allocate_id("seed-list");
        state.lists.push(StoredList {
            id: id.clone(),
            name: name.to_string(),
            items: items.iter().map(|s| s.to_string()).collect(),
        });
        id
    }

    /// Add a rule directly, returning its id
    pub fn seed_rule(&self, name: &str) -> String {
        let mut state = self.state.lock().unwrap();
        let id = state.allocate_id("seed-rule");
        state.rules.push(StoredRule {
            id: id.clone(),
            name: name.to_string(),
            traffic: String::new(),
            filters: vec!["dns".to_string()],
            block_page_enabled: false,
        });
        id
    }

    /// Copy of the current state
    pub fn snapshot(&self) -> GatewayState {
        self.state.lock().unwrap().clone()
    }

    /// Calls other than GET
    pub fn mutating_calls(&self) -> Vec<(String, String)> {
        self.snapshot()
            .calls
            .into_iter()
            .filter(|(method, _)| method != "GET")
            .collect()
    }

    /// Names of the stored lists, sorted
    pub fn list_names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.snapshot().lists.into_iter().map(|l| l.name).collect();
        names.sort();
        names
    }

    /// Names of the stored rules, sorted
    pub fn rule_names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.snapshot().rules.into_iter().map(|r| r.name).collect();
        names.sort();
        names
    }

    /// Stored rule by name
    pub fn rule(&self, name: &str) -> Option<StoredRule> {
        self.snapshot().rules.into_iter().find(|r| r.name == name)
    }
}

fn envelope(result: Value) -> ResponseTemplate {
    ResponseTemplate::new(200).set_body_json(json!({
        "success": true,
        "errors": [],
        "messages": [],
        "result": result
    }))
}

fn not_found() -> ResponseTemplate {
    ResponseTemplate::new(404).set_body_json(json!({
        "success": false,
        "errors": [{"code": 404, "message": "not found"}],
        "messages": [],
        "result": null
    }))
}

fn rule_json(rule: &StoredRule) -> Value {
    json!({
        "id": rule.id,
        "name": rule.name,
        "traffic": rule.traffic,
        "filters": rule.filters,
        "enabled": true,
        "precedence": 1000
    })
}

impl Respond for FakeGateway {
    fn respond(&self, request: &Request) -> ResponseTemplate {
        let prefix = format!("/accounts/{}/gateway", ACCOUNT_ID);
        let method = request.method.as_str().to_string();
        let path = request.url.path().to_string();

        let mut state = self.state.lock().unwrap();
        state.calls.push((method.clone(), path.clone()));

        let Some(rest) = path.strip_prefix(&prefix) else {
            return not_found();
        };
        let segments: Vec<&str> = rest.trim_start_matches('/').split('/').collect();
        let body: Value = serde_json::from_slice(&request.body).unwrap_or(Value::Null);

        match (method.as_str(), segments.as_slice()) {
            ("GET", ["lists"]) => envelope(Value::Array(
                state
                    .lists
                    .iter()
                    .map(|l| json!({"id": l.id, "name": l.name, "type": "DOMAIN", "count": l.items.len()}))
                    .collect(),
            )),
            ("POST", ["lists"]) => {
                let id = state.allocate_id("list");
                let name = body["name"].as_str().unwrap_or_default().to_string();
                let items = body["items"]
                    .as_array()
                    .map(|items| {
                        items
                            .iter()
                            .filter_map(|i| i["value"].as_str().map(str::to_string))
                            .collect()
                    })
                    .unwrap_or_default();
                state.lists.push(StoredList {
                    id: id.clone(),
                    name: name.clone(),
                    items,
                });
                envelope(json!({"id": id, "name": name, "type": "DOMAIN"}))
            }
            ("DELETE", ["lists", id]) => {
                let before = state.lists.len();
                state.lists.retain(|l| l.id != *id);
                if state.lists.len() == before {
                    not_found()
                } else {
                    envelope(json!({"id": id}))
                }
            }
            ("GET", ["rules"]) => envelope(Value::Array(state.rules.iter().map(rule_json).collect())),
            ("POST", ["rules"]) => {
                let id = state.allocate_id("rule");
                let rule = stored_rule(id, &body);
                let response = rule_json(&rule);
                state.rules.push(rule);
                envelope(response)
            }
            ("PUT", ["rules", id]) => {
                let id = id.to_string();
                match state.rules.iter_mut().find(|r| r.id == id) {
                    Some(existing) => {
                        *existing = stored_rule(id, &body);
                        envelope(rule_json(existing))
                    }
                    None => not_found(),
                }
            }
            ("DELETE", ["rules", id]) => {
                let before = state.rules.len();
                state.rules.retain(|r| r.id != *id);
                if state.rules.len() == before {
                    not_found()
                } else {
                    envelope(json!({"id": id}))
                }
            }
            _ => not_found(),
        }
    }
}

fn stored_rule(id: String, body: &Value) -> StoredRule {
    StoredRule {
        id,
        name: body["name"].as_str().unwrap_or_default().to_string(),
        traffic: body["traffic"].as_str().unwrap_or_default().to_string(),
        filters: body["filters"]
            .as_array()
            .map(|f| f.iter().filter_map(|v| v.as_str().map(str::to_string)).collect())
            .unwrap_or_default(),
        block_page_enabled: body["rule_settings"]["block_page_enabled"]
            .as_bool()
            .unwrap_or(false),
    }
}

/// Configuration pointing at `host` with fast retries and no settle delay
pub fn test_config(host: &str) -> Config {
    let mut config = Config {
        cloudflare: CloudflareConfig {
            api_token: Some("test-token".to_string()),
            account_id: ACCOUNT_ID.to_string(),
            api_host: host.to_string(),
            list_item_size: 2,
            ..Default::default()
        },
        retry: RetryConfig {
            initial_backoff_ms: 10,
            max_backoff_ms: 50,
            backoff_multiplier: 2.0,
            jitter: false,
            max_elapsed_ms: 1_000,
        },
        ..Default::default()
    };
    config.behavior.settle_delay_ms = 0;
    config
}

/// `n` distinct domains with the given label prefix
pub fn domains(prefix: &str, n: usize) -> Vec<String> {
    (0..n).map(|i| format!("{}{}.example.com", prefix, i)).collect()
}

/// Replace list ids in an expression with their position in `ids`
pub fn expression_shape(expression: &str, ids: &[String]) -> String {
    let mut shape = expression.to_string();
    for (i, id) in ids.iter().enumerate() {
        shape = shape.replace(&format!("${}", id), &format!("$<{}>", i));
    }
    shape
}
