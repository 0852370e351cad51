//! Stages 4–5 of the answer pipeline: indexed-file fallback selection,
//! context assembly, confidence grading, and the LLM call.

use anyhow::Result;
use serde::Serialize;

use crate::config::PipelineConfig;
use crate::llm::GenerationService;
use crate::models::{FileCategory, IndexedFile, RepositoryIndex};
use crate::question::QuestionAnalysis;
use crate::search;
use crate::sources::JsonContextResult;

/// Fixed framing for every answer request. The model must stay inside the
/// provided context and flag anything it cannot confirm.
const SYSTEM_PROMPT: &str = "You are a code assistant answering questions about one \
specific repository. Use ONLY the context provided below. Never assert anything the \
context does not support; when the context is insufficient, say so explicitly and \
mark the statement as unconfirmed. Cite the source names and file paths you relied \
on. Answer in the same language as the question.";

/// Score bonuses for the indexed-file fallback.
const SERVICE_BONUS: u32 = 2;
const ACTION_BONUS: u32 = 3;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Confidence {
    High,
    Medium,
    Low,
}

impl Confidence {
    pub fn as_str(&self) -> &'static str {
        match self {
            Confidence::High => "high",
            Confidence::Medium => "medium",
            Confidence::Low => "low",
        }
    }
}

/// Provenance of an answer.
#[derive(Debug, Clone, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AnswerSources {
    pub json_sources: Vec<String>,
    pub files: Vec<String>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Answer {
    pub answer: String,
    pub confidence: Confidence,
    pub sources: AnswerSources,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub notes: Option<String>,
}

/// Stage 4: keyword-score the indexed files and keep the top matches.
///
/// Each keyword hit in the path/description/exports/tags haystack scores one
/// point; service files and files with detected actions get fixed bonuses on
/// top, but only files with at least one keyword hit survive. No keywords
/// means no candidates at all.
pub fn select_files_from_index<'a>(
    files: &'a [IndexedFile],
    analysis: &QuestionAnalysis,
    max_files: usize,
) -> Vec<&'a IndexedFile> {
    if analysis.keywords.is_empty() {
        return Vec::new();
    }

    let mut scored: Vec<(u32, &IndexedFile)> = files
        .iter()
        .filter_map(|file| {
            let haystack = file_haystack(file);
            let hits = analysis
                .keywords
                .iter()
                .filter(|k| haystack.contains(k.as_str()))
                .count() as u32;
            if hits == 0 {
                return None;
            }

            let mut score = hits;
            if file.category == FileCategory::Service {
                score += SERVICE_BONUS;
            }
            if !file.process.actions.is_empty() {
                score += ACTION_BONUS;
            }
            Some((score, file))
        })
        .collect();

    scored.sort_by(|a, b| b.0.cmp(&a.0));
    scored.truncate(max_files);
    scored.into_iter().map(|(_, f)| f).collect()
}

/// Stage 5 fallback: run the plain filter once per question token and merge
/// the hits, first match first, duplicates dropped. A whole multi-word
/// question is useless as a substring needle, so keywords drive the queries;
/// when the question yielded none, the longer raw tokens stand in.
fn fallback_search<'a>(
    index: &'a RepositoryIndex,
    analysis: &QuestionAnalysis,
    max_files: usize,
) -> Vec<&'a IndexedFile> {
    let tokens: Vec<&str> = if analysis.keywords.is_empty() {
        analysis
            .normalized
            .split_whitespace()
            .map(|t| t.trim_matches('?'))
            .filter(|t| t.len() > 3)
            .collect()
    } else {
        analysis.keywords.iter().map(String::as_str).collect()
    };

    let mut merged: Vec<&IndexedFile> = Vec::new();
    for token in tokens {
        for hit in search::search_files(&index.files, token) {
            if !merged.iter().any(|f| f.path == hit.path) {
                merged.push(hit);
            }
        }
    }
    merged.truncate(max_files);
    merged
}

fn file_haystack(file: &IndexedFile) -> String {
    let mut haystack = file.path.to_lowercase();
    if let Some(description) = &file.description {
        haystack.push(' ');
        haystack.push_str(&description.to_lowercase());
    }
    if let Some(exports) = &file.exports {
        for export in exports {
            haystack.push(' ');
            haystack.push_str(&export.to_lowercase());
        }
    }
    for tag in &file.tags {
        haystack.push(' ');
        haystack.push_str(&tag.to_lowercase());
    }
    haystack
}

/// Structured context beats file descriptions; having only the latter (or
/// neither) lowers confidence.
pub fn grade_confidence(json: &JsonContextResult, files: &[&IndexedFile]) -> Confidence {
    let structured = json.chunks.iter().any(|c| c.data.is_some());
    match (structured, files.is_empty()) {
        (true, true) => Confidence::High,
        (true, false) => Confidence::Medium,
        (false, _) => Confidence::Low,
    }
}

fn assemble_context(
    index: &RepositoryIndex,
    json: &JsonContextResult,
    files: &[&IndexedFile],
) -> String {
    let mut out = format!(
        "Repository: {} ({} files, default branch {})\n",
        index.id, index.summary.total_files, index.branch
    );

    for chunk in &json.chunks {
        match &chunk.data {
            Some(data) => {
                out.push_str(&format!(
                    "\n=== Source: {} ({}) ===\n{}\n",
                    chunk.kind.file_name(),
                    chunk.summary,
                    serde_json::to_string_pretty(data).unwrap_or_default()
                ));
            }
            None => {
                out.push_str(&format!(
                    "\n=== Source: {} — unavailable ({}) ===\n",
                    chunk.kind.file_name(),
                    chunk.summary
                ));
            }
        }
    }

    for file in files {
        out.push_str(&format!("\n--- File: {} ---\n", file.path));
        if let Some(description) = &file.description {
            out.push_str(&format!("Description: {}\n", description));
        }
        if let Some(exports) = &file.exports {
            if !exports.is_empty() {
                out.push_str(&format!("Exports: {}\n", exports.join(", ")));
            }
        }
        if !file.process.actions.is_empty() {
            out.push_str(&format!("Actions: {}\n", file.process.actions.join(", ")));
        }
        if !file.relations.imported_by.is_empty() {
            out.push_str(&format!(
                "Imported by: {}\n",
                file.relations.imported_by.join(", ")
            ));
        }
    }

    out
}

/// Stage 5: assemble the context, grade confidence, and ask the LLM.
pub async fn generate_answer(
    index: &RepositoryIndex,
    analysis: &QuestionAnalysis,
    json: &JsonContextResult,
    config: &PipelineConfig,
    llm: &dyn GenerationService,
) -> Result<Answer> {
    // File selection runs regardless of JSON sufficiency; structured and
    // file context complement each other.
    let mut files = if config.keyword_bridge && !analysis.keywords.is_empty() {
        select_files_from_index(&index.files, analysis, config.max_context_files)
    } else {
        Vec::new()
    };
    if files.is_empty() && !json.sufficient {
        // The staged pipeline yielded nothing; fall back to the plain filter,
        // one query per question token, merged in index order.
        files = fallback_search(index, analysis, config.max_context_files);
    }

    let confidence = grade_confidence(json, &files);
    let context = assemble_context(index, json, &files);

    let prompt = format!(
        "Context:\n{}\n\nQuestion: {}\n\nAnswer the question using only the context above.",
        context, analysis.original
    );
    let answer_text = llm.generate(SYSTEM_PROMPT, &prompt).await?;

    let mut notes = Vec::new();
    if let Some(ambiguity) = &analysis.ambiguity {
        notes.push(ambiguity.clone());
    }
    if let Some(note) = &json.note {
        notes.push(note.clone());
    }
    if confidence == Confidence::Low {
        notes.push("Answer is based on limited context; verify against the code.".to_string());
    }

    Ok(Answer {
        answer: answer_text,
        confidence,
        sources: AnswerSources {
            json_sources: json
                .chunks
                .iter()
                .filter(|c| c.data.is_some())
                .map(|c| c.kind.file_name().to_string())
                .collect(),
            files: files.iter().map(|f| f.path.clone()).collect(),
        },
        notes: if notes.is_empty() {
            None
        } else {
            Some(notes.join(" "))
        },
    })
}
