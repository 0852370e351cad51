//! Auxiliary JSON context sources (stages 2–3 of the retrieval pipeline).
//!
//! Each topic signal maps to at most one per-repository analysis artifact
//! (`flows.json`, `architecture.json`, …). Selection is weight-ranked and
//! capped; loading is tolerant — a missing or corrupt artifact is recorded
//! as a failed chunk and never aborts the pipeline.

use std::path::Path;

use serde_json::Value;

use crate::question::{QuestionAnalysis, Signal, SignalWeights};

/// Minimum token length used by the per-type filters (strictly greater).
const FILTER_TOKEN_MIN_LEN: usize = 3;

/// The auxiliary JSON source types, one fixed file per type.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JsonSourceKind {
    Flows,
    Architecture,
    Modules,
    Components,
    FilesMap,
    Config,
}

impl JsonSourceKind {
    pub fn file_name(&self) -> &'static str {
        match self {
            JsonSourceKind::Flows => "flows.json",
            JsonSourceKind::Architecture => "architecture.json",
            JsonSourceKind::Modules => "modules.json",
            JsonSourceKind::Components => "components.json",
            JsonSourceKind::FilesMap => "files-map.json",
            JsonSourceKind::Config => "config.json",
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            JsonSourceKind::Flows => "flows",
            JsonSourceKind::Architecture => "architecture",
            JsonSourceKind::Modules => "modules",
            JsonSourceKind::Components => "components",
            JsonSourceKind::FilesMap => "files-map",
            JsonSourceKind::Config => "config",
        }
    }
}

/// Fixed signal → source table. Several signals alias to the same source;
/// `improvement` and `existence` map to nothing and are always discarded.
fn source_for(signal: Signal) -> Option<JsonSourceKind> {
    match signal {
        Signal::Flow | Signal::Bug => Some(JsonSourceKind::Flows),
        Signal::Architecture => Some(JsonSourceKind::Architecture),
        Signal::Module => Some(JsonSourceKind::Modules),
        Signal::Component => Some(JsonSourceKind::Components),
        Signal::File => Some(JsonSourceKind::FilesMap),
        Signal::Config => Some(JsonSourceKind::Config),
        Signal::Improvement | Signal::Existence => None,
    }
}

/// A source chosen for loading, with the signal that earned it.
#[derive(Debug, Clone)]
pub struct SelectedSource {
    pub kind: JsonSourceKind,
    pub signal: Signal,
    pub weight: f32,
}

/// Why a nonzero signal contributed no source.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DiscardReason {
    /// The signal maps to no source type.
    NoSource,
    /// A heavier signal already claimed the same source type.
    Shadowed,
    /// The selection cap was already reached.
    OverCap,
}

/// Observability record for a discarded nonzero signal.
#[derive(Debug, Clone)]
pub struct DiscardedSignal {
    pub signal: Signal,
    pub weight: f32,
    pub reason: DiscardReason,
}

#[derive(Debug, Clone, Default)]
pub struct JsonSelectionResult {
    pub selected: Vec<SelectedSource>,
    pub discarded: Vec<DiscardedSignal>,
}

/// Stage 2: pick up to `max_sources` distinct source types, heaviest
/// originating signal first.
pub fn select_json_sources(signals: &SignalWeights, max_sources: usize) -> JsonSelectionResult {
    let mut result = JsonSelectionResult::default();

    for (signal, weight) in signals.nonzero_desc() {
        let Some(kind) = source_for(signal) else {
            result.discarded.push(DiscardedSignal {
                signal,
                weight,
                reason: DiscardReason::NoSource,
            });
            continue;
        };

        if result.selected.iter().any(|s| s.kind == kind) {
            result.discarded.push(DiscardedSignal {
                signal,
                weight,
                reason: DiscardReason::Shadowed,
            });
            continue;
        }

        if result.selected.len() >= max_sources {
            result.discarded.push(DiscardedSignal {
                signal,
                weight,
                reason: DiscardReason::OverCap,
            });
            continue;
        }

        result.selected.push(SelectedSource {
            kind,
            signal,
            weight,
        });
    }

    result
}

/// One loaded (or failed) auxiliary source.
#[derive(Debug, Clone)]
pub struct JsonChunk {
    pub kind: JsonSourceKind,
    /// Human summary of what happened to this source.
    pub summary: String,
    /// Filtered data, or `None` when the file was missing/corrupt.
    pub data: Option<Value>,
}

/// Stage-3 output: loaded chunks plus a sufficiency verdict.
#[derive(Debug, Clone, Default)]
pub struct JsonContextResult {
    /// Includes failure records (null data) for observability.
    pub chunks: Vec<JsonChunk>,
    /// True when at least one chunk carries non-empty data.
    pub sufficient: bool,
    pub note: Option<String>,
}

/// Stage 3: load each selected source from the repository's analysis
/// directory and apply the per-type filter.
///
/// Missing or unparseable files become failure chunks; sources whose filter
/// yields nothing contribute no chunk at all.
pub fn load_and_filter(
    analysis_dir: &Path,
    selection: &JsonSelectionResult,
    analysis: &QuestionAnalysis,
) -> JsonContextResult {
    let tokens = filter_tokens(&analysis.normalized);
    let mut result = JsonContextResult::default();

    for source in &selection.selected {
        let path = analysis_dir.join(source.kind.file_name());

        let parsed: Option<Value> = std::fs::read_to_string(&path)
            .ok()
            .and_then(|raw| serde_json::from_str(&raw).ok());

        let Some(value) = parsed else {
            result.chunks.push(JsonChunk {
                kind: source.kind,
                summary: format!("{} missing or invalid", source.kind.file_name()),
                data: None,
            });
            continue;
        };

        let (filtered, summary) = filter_source(source.kind, value, &tokens);
        if let Some(data) = filtered {
            result.chunks.push(JsonChunk {
                kind: source.kind,
                summary,
                data: Some(data),
            });
        }
    }

    result.sufficient = result.chunks.iter().any(|c| c.data.is_some());
    if !result.sufficient {
        result.note = Some("No structured context matched the question.".to_string());
    }
    result
}

fn filter_tokens(normalized: &str) -> Vec<String> {
    normalized
        .split_whitespace()
        .map(|t| t.trim_matches('?'))
        .filter(|t| t.len() > FILTER_TOKEN_MIN_LEN)
        .map(|t| t.to_string())
        .collect()
}

/// Per-type filter. Flow arrays match on name/description; generic arrays on
/// the stringified entry; objects pass through unfiltered.
fn filter_source(
    kind: JsonSourceKind,
    value: Value,
    tokens: &[String],
) -> (Option<Value>, String) {
    match value {
        Value::Array(entries) => {
            let total = entries.len();
            let kept: Vec<Value> = entries
                .into_iter()
                .filter(|entry| match kind {
                    JsonSourceKind::Flows => flow_entry_matches(entry, tokens),
                    _ => generic_entry_matches(entry, tokens),
                })
                .collect();

            let summary = format!(
                "{}: {} of {} entries matched",
                kind.as_str(),
                kept.len(),
                total
            );
            if kept.is_empty() {
                (None, summary)
            } else {
                (Some(Value::Array(kept)), summary)
            }
        }
        // Generic object sources pass through unfiltered.
        other => (
            Some(other),
            format!("{}: included unfiltered", kind.as_str()),
        ),
    }
}

fn flow_entry_matches(entry: &Value, tokens: &[String]) -> bool {
    let name = entry.get("name").and_then(|v| v.as_str()).unwrap_or("");
    let description = entry
        .get("description")
        .and_then(|v| v.as_str())
        .unwrap_or("");
    let haystack = format!("{} {}", name, description).to_lowercase();
    tokens.iter().any(|t| haystack.contains(t.as_str()))
}

fn generic_entry_matches(entry: &Value, tokens: &[String]) -> bool {
    let haystack = entry.to_string().to_lowercase();
    tokens.iter().any(|t| haystack.contains(t.as_str()))
}
