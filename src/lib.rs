//! # Chatflow
//!
//! Chatflow is a multi-tenant conversational flow execution engine written in Rust.
//! It interprets a directed graph of conversation nodes to drive multi-turn dialogues,
//! one stateless request/response cycle per inbound message.
//!
//! ## Core Features
//!
//! - **Per-session state**: current node, context variables and bounded history survive between turns
//! - **Branching**: ordered conditional transitions with typed comparison operators
//! - **Template overrides**: per-tenant rewrites of prompts and content, never written back to the graph
//! - **Navigation**: validated non-linear jumps with circular detection and rollback
//! - **Flow cache**: TTL cache of compiled graphs, invalidated on every flow mutation
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use chatflow::{FlowModel, FlowServiceBuilder, TurnRequest};
//!
//! let service = FlowServiceBuilder::new().build()?;
//! service.create_flow(&FlowModel::from_json(json_str)?).await?;
//! service.activate_flow("onboarding", "acme").await?;
//!
//! let outcome = service.process_message(TurnRequest::new("acme", "user-1", "session-1", "hello")).await;
//! println!("{}", outcome.response.text);
//! ```

mod builder;
pub mod cache;
pub mod common;
mod config;
pub mod delegate;
mod error;
pub mod executor;
pub mod graph;
mod model;
pub mod navigation;
pub mod service;
pub mod session;
pub mod store;
mod utils;

use std::sync::{Arc, RwLock};

pub use builder::FlowServiceBuilder;
pub use config::{CacheConfig, Config, ExecutorConfig, NavigationConfig, SessionConfig};
pub use error::{ErrorKind, FlowError};
pub use model::*;
pub use service::{FlowService, TenantMetrics, TurnOutcome, TurnRequest};

/// Result type alias for Chatflow operations.
pub type Result<T> = std::result::Result<T, FlowError>;

/// Thread-safe shared lock wrapper using Arc<RwLock<T>>.
pub(crate) type ShareLock<T> = Arc<RwLock<T>>;
