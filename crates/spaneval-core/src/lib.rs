//! SpanEval-Core: the windowed evaluation cycle
//!
//! ## Layer 2 - Pipeline
//!
//! One cycle: compute a window, fetch QA records and retrieved documents,
//! score them with the judge, write the scores back as annotations and
//! mirror the window to the analytics backend.
//!
//! ## Key Components
//!
//! - `WindowTracker`: gap-free, monotonic evaluation windows
//! - `TraceFetcher`: validated records for a window
//! - `EvaluationRunner`: bounded-concurrency judge fan-out
//! - `ResultPublisher`: primary annotations plus analytics mirror
//! - `CycleScheduler`: IDLE/RUNNING loop with per-cycle failure isolation

pub mod config;
mod error;
pub mod fetcher;
pub mod metrics;
pub mod obs;
pub mod publisher;
pub mod runner;
pub mod scheduler;
pub mod telemetry;
pub mod window;

pub use config::PipelineConfig;
pub use error::{ConfigError, CycleError};
pub use fetcher::{FetchResult, QaRecord, RetrievedDocument, RetrievedDocumentSet, TraceFetcher};
pub use metrics::METRICS;
pub use obs::{
    cycle_span, emit_cycle_failed, emit_cycle_finished, emit_cycle_started,
    emit_evaluation_completed, emit_fetch_completed, emit_nothing_to_evaluate,
    emit_window_computed,
};
pub use publisher::{dedupe, Backend, PublishOutcome, PublishStatus, ResultPublisher};
pub use runner::{EvaluationBatch, EvaluationRunner, EvaluatorStats, RunOutcome};
pub use scheduler::{CycleOutcome, CycleReport, CycleScheduler, CycleStatus, SchedulerState};
pub use telemetry::{init_tracing, LogFormat};
pub use window::{WindowPolicy, WindowTracker};
