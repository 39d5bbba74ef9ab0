#![allow(dead_code)]

use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use axum::extract::{Query, State};
use axum::http::StatusCode;
use axum::routing::get;
use axum::Router;
use regex::Regex;
use wafsmith::environment::{artifact_name, Deployment, EnvState, RuleHandle, TestEnvironment};
use wafsmith::errors::WafsmithError;
use wafsmith::payload::{HttpMethod, Position, ProbeTarget};
use wafsmith::synthesis::{Classification, RuleSynthesizer};

/// Marks a rule the fake WAF refuses to load.
pub const BROKEN_MARKER: &str = "BROKEN";

/// The rule slot both the fake WAF and the mock environment see.
#[derive(Clone, Default)]
pub struct ActiveRule {
    rule: Arc<Mutex<Option<Regex>>>,
    requests: Arc<AtomicUsize>,
}

impl ActiveRule {
    /// Load a rule without going through an environment.
    pub fn install(&self, rule: &str) {
        self.set(Regex::new(rule).ok());
    }

    fn set(&self, rule: Option<Regex>) {
        *self.rule.lock().unwrap() = rule;
    }

    fn blocks(&self, payload: &str) -> bool {
        self.rule
            .lock()
            .unwrap()
            .as_ref()
            .is_some_and(|r| r.is_match(payload))
    }

    pub fn is_empty(&self) -> bool {
        self.rule.lock().unwrap().is_none()
    }

    pub fn requests(&self) -> usize {
        self.requests.load(Ordering::SeqCst)
    }
}

async fn inspect(
    State(active): State<ActiveRule>,
    Query(params): Query<HashMap<String, String>>,
) -> StatusCode {
    active.requests.fetch_add(1, Ordering::SeqCst);
    let payload = params.get("payload").map(String::as_str).unwrap_or("");
    if active.blocks(payload) {
        StatusCode::FORBIDDEN
    } else {
        StatusCode::OK
    }
}

/// Serve a WAF stand-in that answers 403 when the deployed rule (a regex)
/// matches the `payload` query parameter, 200 otherwise.
pub async fn spawn_fake_waf(active: ActiveRule) -> ProbeTarget {
    let app = Router::new().route("/", get(inspect)).with_state(active);
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    ProbeTarget::new(&format!("http://{}/", addr), HttpMethod::Get, Position::UrlParameters)
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EnvCall {
    Setup,
    Teardown,
    Deploy(String),
    Remove(String),
    Restart,
}

/// In-memory environment wired to an [`ActiveRule`].
pub struct MockEnvironment {
    active: ActiveRule,
    calls: Arc<Mutex<Vec<EnvCall>>>,
    state: EnvState,
    fail_setup: bool,
}

impl MockEnvironment {
    pub fn new(active: ActiveRule) -> (Self, Arc<Mutex<Vec<EnvCall>>>) {
        let calls = Arc::new(Mutex::new(Vec::new()));
        let env = Self {
            active,
            calls: calls.clone(),
            state: EnvState::Down,
            fail_setup: false,
        };
        (env, calls)
    }

    pub fn failing_setup(mut self) -> Self {
        self.fail_setup = true;
        self
    }

    fn record(&self, call: EnvCall) {
        self.calls.lock().unwrap().push(call);
    }
}

#[async_trait]
impl TestEnvironment for MockEnvironment {
    async fn setup(&mut self) -> Result<(), WafsmithError> {
        self.record(EnvCall::Setup);
        self.state = EnvState::Up;
        if self.fail_setup {
            return Err(WafsmithError::Environment("compose up failed".into()));
        }
        Ok(())
    }

    async fn teardown(&mut self) -> Result<(), WafsmithError> {
        self.record(EnvCall::Teardown);
        self.state = EnvState::Down;
        self.active.set(None);
        Ok(())
    }

    async fn deploy_rule(&mut self, rule: &str) -> Result<Deployment, WafsmithError> {
        self.record(EnvCall::Deploy(rule.to_string()));
        // Give concurrent callers a chance to interleave.
        tokio::task::yield_now().await;
        let compiled = match Regex::new(rule) {
            Ok(r) if !rule.contains(BROKEN_MARKER) => r,
            _ => {
                self.record(EnvCall::Remove(rule.to_string()));
                self.record(EnvCall::Restart);
                return Ok(Deployment::Unhealthy);
            }
        };
        self.active.set(Some(compiled));
        Ok(Deployment::Healthy(RuleHandle {
            path: PathBuf::from("rules").join(artifact_name("lwrc", rule, ".conf")),
            rule: rule.to_string(),
        }))
    }

    async fn remove_rule(&mut self, handle: &RuleHandle) -> bool {
        self.record(EnvCall::Remove(handle.rule.clone()));
        self.active.set(None);
        true
    }

    async fn restart_waf(&mut self) -> bool {
        self.record(EnvCall::Restart);
        true
    }

    async fn health_check(&mut self) -> bool {
        self.state == EnvState::Up
    }

    fn state(&self) -> EnvState {
        self.state
    }
}

/// Panics unless every deploy is followed by its removal before the next deploy.
pub fn assert_single_slot(calls: &[EnvCall]) {
    let mut deployed: Option<&str> = None;
    for call in calls {
        match call {
            EnvCall::Deploy(rule) => {
                assert!(deployed.is_none(), "deployed {} while {:?} was still live", rule, deployed);
                deployed = Some(rule);
            }
            EnvCall::Remove(rule) => {
                assert_eq!(deployed, Some(rule.as_str()), "removed a rule that was not deployed");
                deployed = None;
            }
            _ => {}
        }
    }
    assert!(deployed.is_none(), "a rule was left deployed");
}

/// Deterministic synthesizer: fixed rules per payload and a fixed aggregation answer.
pub struct ScriptedSynthesizer {
    rules: HashMap<String, String>,
    aggregated: Vec<String>,
    aggregate_calls: AtomicUsize,
}

impl ScriptedSynthesizer {
    pub fn new(rules: &[(&str, &str)], aggregated: &[&str]) -> Self {
        Self {
            rules: rules.iter().map(|(p, r)| (p.to_string(), r.to_string())).collect(),
            aggregated: aggregated.iter().map(|r| r.to_string()).collect(),
            aggregate_calls: AtomicUsize::new(0),
        }
    }

    pub fn aggregate_calls(&self) -> usize {
        self.aggregate_calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl RuleSynthesizer for ScriptedSynthesizer {
    async fn synthesize_rule(&self, payload: &str, _: HttpMethod, _: &Position) -> Option<String> {
        self.rules.get(payload).cloned()
    }

    async fn aggregate_rules(&self, _: &[String], _: &[String]) -> Vec<String> {
        self.aggregate_calls.fetch_add(1, Ordering::SeqCst);
        self.aggregated.clone()
    }

    async fn classify_log(&self, _: &str) -> Option<Classification> {
        None
    }
}

pub fn strings(items: &[&str]) -> Vec<String> {
    items.iter().map(|s| s.to_string()).collect()
}
