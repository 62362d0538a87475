//! Record types exchanged with the trace store and the analytics backend.
//!
//! Everything here is cycle-scoped: rows are read-only, time-bounded copies
//! of what the store holds, and results live only until they are published.

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::StoreError;
use crate::StoreResult;

// ---------------------------------------------------------------------------
// EvaluationWindow
// ---------------------------------------------------------------------------

/// Half-open time range `[start, end)` evaluated by one cycle.
///
/// Fields are private so that `start < end` holds for every instance.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct EvaluationWindow {
    start: DateTime<Utc>,
    end: DateTime<Utc>,
}

impl EvaluationWindow {
    /// Build a window, rejecting empty or inverted ranges.
    pub fn new(start: DateTime<Utc>, end: DateTime<Utc>) -> StoreResult<Self> {
        if start >= end {
            return Err(StoreError::InvalidWindow { start, end });
        }
        Ok(Self { start, end })
    }

    /// Window of `width` ending at `end`; widths under a millisecond are widened to one.
    ///
    /// The start saturates at the earliest representable time.
    pub fn ending_at(end: DateTime<Utc>, width: Duration) -> Self {
        let width = width.max(Duration::milliseconds(1));
        Self {
            start: end
                .checked_sub_signed(width)
                .unwrap_or(DateTime::<Utc>::MIN_UTC),
            end,
        }
    }

    pub fn start(&self) -> DateTime<Utc> {
        self.start
    }

    pub fn end(&self) -> DateTime<Utc> {
        self.end
    }

    pub fn duration(&self) -> Duration {
        self.end - self.start
    }

    /// Whether `ts` falls inside `[start, end)`.
    pub fn contains(&self, ts: DateTime<Utc>) -> bool {
        self.start <= ts && ts < self.end
    }
}

impl std::fmt::Display for EvaluationWindow {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "[{}, {})", self.start.to_rfc3339(), self.end.to_rfc3339())
    }
}

// ---------------------------------------------------------------------------
// Spans
// ---------------------------------------------------------------------------

/// Trace/span identifiers of a span.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SpanContext {
    pub trace_id: String,
    pub span_id: String,
}

/// A recorded span as served by the trace store.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SpanRow {
    pub context: SpanContext,
    #[serde(default)]
    pub parent_id: Option<String>,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub span_kind: Option<String>,
    pub start_time: DateTime<Utc>,
    pub end_time: DateTime<Utc>,
    #[serde(default)]
    pub status_code: Option<String>,
    #[serde(default)]
    pub attributes: Value,
}

impl SpanRow {
    pub fn span_id(&self) -> &str {
        &self.context.span_id
    }

    pub fn trace_id(&self) -> &str {
        &self.context.trace_id
    }

    pub fn is_root(&self) -> bool {
        self.parent_id.as_deref().map_or(true, str::is_empty)
    }

    /// OpenInference span kind, upper-cased (`LLM`, `RETRIEVER`, `CHAIN`, ...).
    pub fn kind(&self) -> Option<String> {
        self.span_kind
            .clone()
            .or_else(|| self.attr_str("openinference.span.kind").map(str::to_string))
            .map(|k| k.to_ascii_uppercase())
    }

    /// Look up an attribute by dotted path.
    pub fn attr(&self, path: &str) -> Option<&Value> {
        lookup(&self.attributes, path)
    }

    pub fn attr_str(&self, path: &str) -> Option<&str> {
        self.attr(path).and_then(Value::as_str)
    }
}

/// Resolve a dotted attribute path against either flattened keys
/// (`{"input.value": ..}`) or nested objects (`{"input": {"value": ..}}`).
pub fn lookup<'a>(value: &'a Value, path: &str) -> Option<&'a Value> {
    let obj = value.as_object()?;
    if let Some(v) = obj.get(path) {
        return Some(v);
    }
    // Longest flattened prefix first.
    let mut split = path.len();
    while let Some(idx) = path[..split].rfind('.') {
        let found = obj
            .get(&path[..idx])
            .and_then(|inner| lookup(inner, &path[idx + 1..]));
        if found.is_some() {
            return found;
        }
        split = idx;
    }
    None
}

// ---------------------------------------------------------------------------
// Derived views
// ---------------------------------------------------------------------------

/// Question/answer pair with reference text, unvalidated.
///
/// Any field may be missing; the fetcher decides what is usable.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QaRow {
    pub span_id: String,
    pub input: Option<String>,
    pub output: Option<String>,
    pub reference: Option<String>,
    pub end_time: DateTime<Utc>,
}

/// One retrieved document inside a [`DocumentSetRow`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DocumentRow {
    pub position: usize,
    pub content: Option<String>,
    pub score: Option<f64>,
}

/// Documents retrieved by one span, in retrieval order, unvalidated.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DocumentSetRow {
    pub span_id: String,
    pub query: Option<String>,
    pub documents: Vec<DocumentRow>,
    pub end_time: DateTime<Utc>,
}

// ---------------------------------------------------------------------------
// Evaluation results
// ---------------------------------------------------------------------------

/// The fixed set of evaluations this pipeline produces.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum EvalName {
    #[serde(rename = "Hallucination")]
    Hallucination,
    #[serde(rename = "QA Correctness")]
    QaCorrectness,
    #[serde(rename = "Relevance")]
    Relevance,
}

impl EvalName {
    pub const ALL: [EvalName; 3] = [
        EvalName::Hallucination,
        EvalName::QaCorrectness,
        EvalName::Relevance,
    ];

    /// Name used on the wire and in dashboards.
    pub fn as_str(&self) -> &'static str {
        match self {
            EvalName::Hallucination => "Hallucination",
            EvalName::QaCorrectness => "QA Correctness",
            EvalName::Relevance => "Relevance",
        }
    }

    pub fn from_wire(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|n| n.as_str() == name)
    }

    /// Relevance is judged per document; the others per span.
    pub fn is_document_level(&self) -> bool {
        matches!(self, EvalName::Relevance)
    }
}

impl std::fmt::Display for EvalName {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// What an evaluation result is attached to.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(tag = "level", rename_all = "snake_case")]
pub enum EvalTarget {
    Span { span_id: String },
    Document { span_id: String, position: usize },
}

impl EvalTarget {
    pub fn span(span_id: impl Into<String>) -> Self {
        EvalTarget::Span {
            span_id: span_id.into(),
        }
    }

    pub fn document(span_id: impl Into<String>, position: usize) -> Self {
        EvalTarget::Document {
            span_id: span_id.into(),
            position,
        }
    }

    pub fn span_id(&self) -> &str {
        match self {
            EvalTarget::Span { span_id } | EvalTarget::Document { span_id, .. } => span_id,
        }
    }

    pub fn position(&self) -> Option<usize> {
        match self {
            EvalTarget::Span { .. } => None,
            EvalTarget::Document { position, .. } => Some(*position),
        }
    }
}

impl std::fmt::Display for EvalTarget {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            EvalTarget::Span { span_id } => write!(f, "span:{span_id}"),
            EvalTarget::Document { span_id, position } => write!(f, "doc:{span_id}#{position}"),
        }
    }
}

/// A single scored judgement, attributable to exactly one target.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EvaluationResult {
    pub target: EvalTarget,
    pub eval_name: EvalName,
    pub label: String,
    pub score: f64,
    pub explanation: Option<String>,
}

impl EvaluationResult {
    /// Key under which the store keeps exactly one current value.
    pub fn key(&self) -> (EvalTarget, EvalName) {
        (self.target.clone(), self.eval_name)
    }
}

/// All results of one evaluator, published under its name.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NamedResultSet {
    pub eval_name: EvalName,
    pub results: Vec<EvaluationResult>,
}

impl NamedResultSet {
    pub fn new(eval_name: EvalName, results: Vec<EvaluationResult>) -> Self {
        Self { eval_name, results }
    }

    pub fn len(&self) -> usize {
        self.results.len()
    }

    pub fn is_empty(&self) -> bool {
        self.results.is_empty()
    }
}

// ---------------------------------------------------------------------------
// Snapshot and analytics
// ---------------------------------------------------------------------------

/// Spans plus their evaluations for one window, as mirrored downstream.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TraceSnapshot {
    pub spans: Vec<SpanRow>,
    pub evaluations: Vec<EvaluationResult>,
}

impl TraceSnapshot {
    pub fn is_empty(&self) -> bool {
        self.spans.is_empty() && self.evaluations.is_empty()
    }
}

/// Model identity attached to every bulk log call.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ModelTag {
    pub model_id: String,
    pub model_version: String,
}

/// Raw response of the analytics backend.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BackendResponse {
    pub status_code: u16,
    pub body: String,
}

impl BackendResponse {
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status_code)
    }
}
