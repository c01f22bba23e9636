//! Shared test fixtures: in-process connector, pool and text generator
//!
//! The fakes stand in for MySQL and the Gemini API so the registry, dispatcher
//! and HTTP routes can be driven end to end without external services.

#![allow(dead_code)]

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use axum::body::{to_bytes, Body};
use axum::http::{Request, StatusCode};
use axum::Router;
use serde_json::{json, Map, Value};
use tower::ServiceExt;

use querygate::{
    build_router, AppState, ConnectionIdentity, ConnectionPool, DefaultIdentity, PoolConnector,
    PoolRegistry, QueryGateError, QueryOutcome, ResolvedConnection, Result, TextGenerator,
};

/// Host whose connection attempts always fail
pub const DOWN_HOST: &str = "down.invalid";

/// Password the fake server rejects
pub const WRONG_PASSWORD: &str = "wrong";

/// Tables reported by `SHOW TABLES` on every fake database
pub const FAKE_TABLES: [&str; 2] = ["orders", "users"];

/// Connector that counts establishments per identity
#[derive(Default)]
pub struct FakeConnector {
    delay: Duration,
    slow_hosts: HashMap<String, Duration>,
    established: Mutex<HashMap<ConnectionIdentity, usize>>,
    verifications: AtomicUsize,
}

impl FakeConnector {
    pub fn new() -> Self {
        Self::default()
    }

    /// Every establishment sleeps for `delay` first
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    /// Establishments for `host` sleep for `delay` instead
    pub fn with_slow_host(mut self, host: &str, delay: Duration) -> Self {
        self.slow_hosts.insert(host.to_string(), delay);
        self
    }

    /// Total number of `establish` calls
    pub fn establish_count(&self) -> usize {
        self.established.lock().unwrap().values().sum()
    }

    /// Number of `establish` calls for one identity
    pub fn establish_count_for(&self, identity: &ConnectionIdentity) -> usize {
        self.established.lock().unwrap().get(identity).copied().unwrap_or(0)
    }

    pub fn verify_count(&self) -> usize {
        self.verifications.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl PoolConnector for FakeConnector {
    async fn establish(&self, target: &ResolvedConnection) -> Result<Arc<dyn ConnectionPool>> {
        *self.established.lock().unwrap().entry(target.identity()).or_insert(0) += 1;

        let delay = self.slow_hosts.get(&target.host).copied().unwrap_or(self.delay);
        if !delay.is_zero() {
            tokio::time::sleep(delay).await;
        }

        if target.host == DOWN_HOST {
            return Err(QueryGateError::connection(format!(
                "Can't connect to MySQL server on '{DOWN_HOST}'"
            )));
        }
        if target.password == WRONG_PASSWORD {
            return Err(QueryGateError::connection(format!(
                "Access denied for user '{}'@'{}'",
                target.user, target.host
            )));
        }

        Ok(Arc::new(FakePool::new(target.database.clone())))
    }

    async fn verify(&self, target: &ResolvedConnection) -> Result<()> {
        self.verifications.fetch_add(1, Ordering::SeqCst);
        if target.password == WRONG_PASSWORD {
            return Err(QueryGateError::connection(format!(
                "Access denied for user '{}'@'{}'",
                target.user, target.host
            )));
        }
        Ok(())
    }
}

/// Pool that understands a handful of statements
pub struct FakePool {
    database: Option<String>,
    executed: AtomicUsize,
}

impl FakePool {
    pub fn new(database: Option<String>) -> Self {
        Self {
            database,
            executed: AtomicUsize::new(0),
        }
    }

    fn row(column: &str, value: Value) -> Map<String, Value> {
        let mut row = Map::new();
        row.insert(column.to_string(), value);
        row
    }
}

#[async_trait]
impl ConnectionPool for FakePool {
    async fn execute(&self, statement: &str) -> Result<QueryOutcome> {
        let n = self.executed.fetch_add(1, Ordering::SeqCst) as u64;
        let normalized = statement.trim().trim_end_matches(';').trim();
        let keyword = normalized.split_whitespace().next().unwrap_or_default().to_ascii_uppercase();

        match keyword.as_str() {
            "SELECT" if normalized.eq_ignore_ascii_case("SELECT 1") => {
                Ok(QueryOutcome::Rows(vec![Self::row("1", json!(1))]))
            }
            "SELECT" => Ok(QueryOutcome::Rows(Vec::new())),
            "SHOW" => {
                let column = match &self.database {
                    Some(db) => format!("Tables_in_{db}"),
                    None => {
                        return Err(QueryGateError::query_execution("No database selected"));
                    }
                };
                Ok(QueryOutcome::Rows(
                    FAKE_TABLES.iter().map(|t| Self::row(&column, json!(t))).collect(),
                ))
            }
            "INSERT" => Ok(QueryOutcome::Ack {
                affected_rows: 1,
                insert_id: Some(n + 1),
            }),
            "CREATE" | "ALTER" | "DROP" => Ok(QueryOutcome::Ack {
                affected_rows: 0,
                insert_id: None,
            }),
            "UPDATE" | "DELETE" => Ok(QueryOutcome::Ack {
                affected_rows: 2,
                insert_id: None,
            }),
            _ => Err(QueryGateError::query_execution(format!(
                "You have an error in your SQL syntax near '{normalized}'"
            ))),
        }
    }

    fn max_connections(&self) -> usize {
        10
    }
}

/// Generator replying with a fixed text and recording the last prompt
pub struct FakeGenerator {
    reply: String,
    prompts: Mutex<Vec<String>>,
}

impl FakeGenerator {
    pub fn replying(reply: &str) -> Self {
        Self {
            reply: reply.to_string(),
            prompts: Mutex::new(Vec::new()),
        }
    }

    pub fn prompts(&self) -> Vec<String> {
        self.prompts.lock().unwrap().clone()
    }
}

impl Default for FakeGenerator {
    fn default() -> Self {
        Self::replying("```sql\nSELECT * FROM users WHERE age > 18;\n```")
    }
}

#[async_trait]
impl TextGenerator for FakeGenerator {
    async fn generate(&self, prompt: &str) -> Result<String> {
        self.prompts.lock().unwrap().push(prompt.to_string());
        Ok(self.reply.clone())
    }
}

/// A router wired to fakes, plus handles to inspect them
pub struct TestApp {
    pub router: Router,
    pub registry: Arc<PoolRegistry>,
    pub connector: Arc<FakeConnector>,
    pub generator: Arc<FakeGenerator>,
}

impl TestApp {
    pub fn new() -> Self {
        Self::with(FakeConnector::new(), FakeGenerator::default())
    }

    pub fn with(connector: FakeConnector, generator: FakeGenerator) -> Self {
        let connector = Arc::new(connector);
        let generator = Arc::new(generator);
        let registry = Arc::new(PoolRegistry::new(connector.clone(), DefaultIdentity::default()));
        let state = Arc::new(AppState::new(registry.clone(), generator.clone()));
        Self {
            router: build_router(state, true),
            registry,
            connector,
            generator,
        }
    }

    pub async fn get(&self, uri: &str) -> (StatusCode, Value) {
        self.send("GET", uri, Body::empty()).await
    }

    pub async fn post(&self, uri: &str, body: Value) -> (StatusCode, Value) {
        self.send("POST", uri, Body::from(body.to_string())).await
    }

    pub async fn post_raw(&self, uri: &str, body: &str) -> (StatusCode, Value) {
        self.send("POST", uri, Body::from(body.to_string())).await
    }

    async fn send(&self, method: &str, uri: &str, body: Body) -> (StatusCode, Value) {
        let request = Request::builder()
            .method(method)
            .uri(uri)
            .header("content-type", "application/json")
            .body(body)
            .unwrap();

        let response = self.router.clone().oneshot(request).await.unwrap();
        let status = response.status();
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let value = if bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&bytes).unwrap()
        };
        (status, value)
    }
}

/// Identity the registry derives for `database` with default host and user
pub fn default_identity(database: Option<&str>) -> ConnectionIdentity {
    let defaults = DefaultIdentity::default();
    ConnectionIdentity {
        host: defaults.host,
        user: defaults.user,
        database: database.map(str::to_string),
    }
}
