//! Question analysis (stage 1 of the retrieval pipeline).
//!
//! Normalizes a free-text question and scores nine fixed topic signals by
//! phrase matching. The dictionaries are bilingual (English/Spanish) because
//! that is what users actually type. Scoring is saturating: each matching
//! phrase adds 0.4, capped at 1.0 per signal.

use unicode_normalization::char::is_combining_mark;
use unicode_normalization::UnicodeNormalization;

/// Per-phrase weight increment.
const SIGNAL_STEP: f32 = 0.4;

/// Minimum token length for the keyword bridge (strictly greater).
const KEYWORD_MIN_LEN: usize = 3;

/// The nine fixed topic signals.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Signal {
    Flow,
    Architecture,
    Module,
    Component,
    File,
    Config,
    Bug,
    Improvement,
    Existence,
}

impl Signal {
    pub const ALL: [Signal; 9] = [
        Signal::Flow,
        Signal::Architecture,
        Signal::Module,
        Signal::Component,
        Signal::File,
        Signal::Config,
        Signal::Bug,
        Signal::Improvement,
        Signal::Existence,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Signal::Flow => "flow",
            Signal::Architecture => "architecture",
            Signal::Module => "module",
            Signal::Component => "component",
            Signal::File => "file",
            Signal::Config => "config",
            Signal::Bug => "bug",
            Signal::Improvement => "improvement",
            Signal::Existence => "existence",
        }
    }

    fn phrases(&self) -> &'static [&'static str] {
        match self {
            Signal::Flow => &[
                "flow", "flujo", "how does", "como funciona", "process of", "proceso",
                "step", "paso", "works",
            ],
            Signal::Architecture => &[
                "architecture", "arquitectura", "structure", "estructura", "organized",
                "organizado", "design", "diseno", "layers", "capas",
            ],
            Signal::Module => &[
                "module", "modulo", "feature", "funcionalidad", "domain", "dominio",
            ],
            Signal::Component => &[
                "component", "componente", "screen", "pantalla", "view", "vista",
                "button", "boton", "form", "formulario",
            ],
            Signal::File => &[
                "file", "archivo", "where is", "donde esta", "path", "ruta",
                "folder", "carpeta",
            ],
            Signal::Config => &[
                "config", "configuracion", "environment", "entorno", "settings",
                "setup", "env",
            ],
            Signal::Bug => &[
                "bug", "error", "fail", "falla", "broken", "roto", "issue",
                "problema", "crash", "exception",
            ],
            Signal::Improvement => &[
                "improve", "mejorar", "refactor", "optimize", "optimizar", "better",
                "mejora", "clean up",
            ],
            Signal::Existence => &[
                "is there", "existe", "does it have", "tiene", "hay alguna", "exists",
            ],
        }
    }
}

/// Weight per signal, each in `[0, 1]`.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SignalWeights([f32; 9]);

impl SignalWeights {
    pub fn get(&self, signal: Signal) -> f32 {
        self.0[index_of(signal)]
    }

    pub fn set(&mut self, signal: Signal, weight: f32) {
        self.0[index_of(signal)] = weight.clamp(0.0, 1.0);
    }

    /// `(signal, weight)` pairs in the fixed signal order.
    pub fn iter(&self) -> impl Iterator<Item = (Signal, f32)> + '_ {
        Signal::ALL.iter().map(move |s| (*s, self.get(*s)))
    }

    /// Nonzero signals, heaviest first; ties keep the fixed signal order.
    pub fn nonzero_desc(&self) -> Vec<(Signal, f32)> {
        let mut nonzero: Vec<(Signal, f32)> =
            self.iter().filter(|(_, w)| *w > 0.0).collect();
        nonzero.sort_by(|a, b| b.1.partial_cmp(&a.1).unwrap_or(std::cmp::Ordering::Equal));
        nonzero
    }

    pub fn all_zero(&self) -> bool {
        self.0.iter().all(|w| *w == 0.0)
    }
}

fn index_of(signal: Signal) -> usize {
    Signal::ALL.iter().position(|s| *s == signal).unwrap()
}

/// Ephemeral per-query analysis result.
#[derive(Debug, Clone)]
pub struct QuestionAnalysis {
    pub original: String,
    pub normalized: String,
    pub signals: SignalWeights,
    /// Concrete subject tokens (length > 3, stopwords removed) used by the
    /// file-selection stage; empty when the keyword bridge is disabled.
    pub keywords: Vec<String>,
    /// Advisory only; never blocks later stages.
    pub ambiguity: Option<String>,
}

/// Normalize a question: lowercase, NFD + combining-mark strip, then replace
/// everything outside `[a-z0-9\s?]` with a space and collapse whitespace.
pub fn normalize_question(text: &str) -> String {
    let stripped: String = text
        .to_lowercase()
        .nfd()
        .filter(|c| !is_combining_mark(*c))
        .map(|c| {
            if c.is_ascii_lowercase() || c.is_ascii_digit() || c.is_whitespace() || c == '?' {
                c
            } else {
                ' '
            }
        })
        .collect();

    stripped.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Score the nine topic signals against the normalized question.
pub fn extract_signals(normalized: &str) -> SignalWeights {
    let mut weights = SignalWeights::default();
    for signal in Signal::ALL {
        let mut weight = 0.0f32;
        for phrase in signal.phrases() {
            if normalized.contains(phrase) {
                weight += SIGNAL_STEP;
            }
        }
        weights.set(signal, weight.min(1.0));
    }
    weights
}

const STOPWORDS: [&str; 38] = [
    // English
    "what", "how", "does", "the", "this", "that", "with", "from", "where",
    "when", "which", "have", "there", "work", "works", "about",
    // Spanish
    "como", "donde", "cual", "cuales", "para", "porque", "este", "esta",
    "esto", "sobre", "funciona", "tiene", "existe", "cuando", "entre",
    "pero", "los", "las", "del", "una", "hay", "que",
];

/// Subject tokens for the file-selection stage: length > 3, stopwords and the
/// trailing question mark removed, order-preserving, deduplicated.
pub fn extract_keywords(normalized: &str) -> Vec<String> {
    let mut keywords: Vec<String> = Vec::new();
    for token in normalized.split_whitespace() {
        let token = token.trim_matches('?');
        if token.len() <= KEYWORD_MIN_LEN {
            continue;
        }
        if STOPWORDS.contains(&token) {
            continue;
        }
        if !keywords.iter().any(|k| k == token) {
            keywords.push(token.to_string());
        }
    }
    keywords
}

/// Full stage-1 analysis.
///
/// When `keyword_bridge` is false the keyword list stays empty and the
/// file-selection stage is dormant (answering then falls back to the plain
/// search filter).
pub fn analyze_question(question: &str, keyword_bridge: bool) -> QuestionAnalysis {
    let normalized = normalize_question(question);
    let signals = extract_signals(&normalized);
    let subject_tokens = extract_keywords(&normalized);

    let flow_only = signals.get(Signal::Flow) > 0.0
        && signals
            .iter()
            .all(|(s, w)| s == Signal::Flow || w == 0.0);

    let ambiguity = if signals.all_zero() {
        Some("Question matched no known topic; the answer may be generic.".to_string())
    } else if flow_only && subject_tokens.is_empty() {
        Some("Flow question without an explicit subject; results may be broad.".to_string())
    } else {
        None
    };

    QuestionAnalysis {
        original: question.to_string(),
        normalized,
        signals,
        keywords: if keyword_bridge { subject_tokens } else { Vec::new() },
        ambiguity,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalize_strips_diacritics_and_punctuation() {
        let normalized = normalize_question("¿Cómo funciona el LOGIN?");
        assert_eq!(normalized, "como funciona el login?");
    }

    #[test]
    fn test_normalize_collapses_whitespace() {
        assert_eq!(normalize_question("  a,,   b!  "), "a b");
    }

    #[test]
    fn test_flow_signal_from_spanish_phrase() {
        let weights = extract_signals("como funciona el flujo de login");
        assert!(weights.get(Signal::Flow) >= 0.4);
    }

    #[test]
    fn test_signal_saturation_exact() {
        // Four flow phrases; saturates at exactly 1.0.
        let weights = extract_signals("el flujo de login paso a paso how does it work flow");
        assert_eq!(weights.get(Signal::Flow), 1.0);
    }

    #[test]
    fn test_unmatched_signals_stay_zero() {
        let weights = extract_signals("como funciona el flujo de login");
        assert_eq!(weights.get(Signal::Config), 0.0);
        assert_eq!(weights.get(Signal::Bug), 0.0);
    }

    #[test]
    fn test_keywords_filter_stopwords_and_short_tokens() {
        let keywords = extract_keywords("como funciona el flujo de login?");
        assert_eq!(keywords, vec!["flujo", "login"]);
    }

    #[test]
    fn test_keywords_dedup_preserve_order() {
        let keywords = extract_keywords("login flujo login checkout");
        assert_eq!(keywords, vec!["login", "flujo", "checkout"]);
    }

    #[test]
    fn test_ambiguity_when_no_signal() {
        let analysis = analyze_question("xyzzy?", true);
        assert!(analysis.signals.all_zero());
        assert!(analysis.ambiguity.is_some());
    }

    #[test]
    fn test_no_ambiguity_with_subject() {
        let analysis = analyze_question("como funciona el flujo de login", true);
        assert!(analysis.ambiguity.is_none());
    }

    #[test]
    fn test_keyword_bridge_off_leaves_keywords_empty() {
        let analysis = analyze_question("como funciona el flujo de login", false);
        assert!(analysis.keywords.is_empty());
        assert!(analysis.signals.get(Signal::Flow) >= 0.4);
    }

    #[test]
    fn test_nonzero_desc_ordering() {
        let mut weights = SignalWeights::default();
        weights.set(Signal::Bug, 0.4);
        weights.set(Signal::Flow, 0.8);
        let ranked = weights.nonzero_desc();
        assert_eq!(ranked[0].0, Signal::Flow);
        assert_eq!(ranked[1].0, Signal::Bug);
    }
}
