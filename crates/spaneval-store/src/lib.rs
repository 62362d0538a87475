//! SpanEval-Store: trace store and analytics collaborators
//!
//! This crate holds the data model shared by every SpanEval layer and the
//! two external services the evaluation loop depends on.
//!
//! ## Layer 0 - Data/Collaborators
//!
//! Focus: time-bounded reads, idempotent annotation writes, bulk mirroring.
//!
//! ## Key Components
//!
//! - `TraceStore` / `PhoenixClient`: spans, derived views, annotations
//! - `AnalyticsSink` / `ArizeClient`: bulk span + evaluation mirroring
//! - `views`: question/answer and retrieved-document views over raw spans
//! - `fakes`: in-memory implementations for tests

pub mod arize;
mod error;
pub mod fakes;
pub mod phoenix;
mod schema;
pub mod store_traits;
pub mod views;

pub use arize::{ArizeClient, ArizeConfig};
pub use error::StoreError;
pub use phoenix::{PhoenixClient, PhoenixConfig};
pub use schema::{
    lookup, BackendResponse, DocumentRow, DocumentSetRow, EvalName, EvalTarget,
    EvaluationResult, EvaluationWindow, ModelTag, NamedResultSet, QaRow, SpanContext, SpanRow,
    TraceSnapshot,
};
pub use store_traits::{AnalyticsSink, TraceStore};

/// Result type for collaborator operations
pub type StoreResult<T> = std::result::Result<T, StoreError>;
