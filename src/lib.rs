//! querygate - HTTP gateway for MySQL with SQL generation
//!
//! querygate keeps one connection pool per connection identity (host, user,
//! database), runs single statements against those pools on behalf of HTTP
//! callers, and turns natural-language requests into SQL through an external
//! text generator.
//!
//! # Module Organization
//! - [`error`] - Error types and handling
//! - [`output`] - JSON response bodies
//! - [`engine`] - Connection types and the pool/connector traits
//! - [`registry`] - One pool per identity, created on demand
//! - [`dispatch`] - Lookup-only statement routing
//! - [`generate`] - Prompt, provider call and code-fence sanitization
//! - [`config`] - Configuration file and environment overrides
//! - [`server`] - axum routes, CORS and graceful shutdown
//! - [`tracing_setup`] - Log subscriber initialization
//!
//! The MySQL driver lives behind the `mysql` feature (on by default); everything
//! else is usable with in-process fakes of [`PoolConnector`] and [`TextGenerator`].

pub mod config;
pub mod dispatch;
pub mod engine;
pub mod error;
pub mod generate;
pub mod output;
pub mod registry;
pub mod server;
pub mod tracing_setup;

pub use config::{AppConfig, DefaultIdentity, GeneratorSettings, PoolSettings, ServerSettings};
pub use dispatch::{Dispatched, QueryDispatcher};
pub use engine::{
    ConnectionIdentity, ConnectionPool, ConnectionRequest, PoolConnector, QueryOutcome,
    ResolvedConnection,
};
pub use error::{QueryGateError, Result};
pub use generate::{GeminiClient, GenerationAdapter, TextGenerator, FALLBACK_SQL};
pub use registry::{PoolHandle, PoolRegistry};
pub use server::{build_router, AppState};

#[cfg(feature = "mysql")]
pub use engine::mysql::MySqlConnector;
