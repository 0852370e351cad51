//! File classification and best-effort metadata extraction.
//!
//! Classification is a strict priority cascade: exact-name matches outrank
//! directory conventions, which outrank the extension fallback. Content
//! analysis is regex-driven and tied to one source-ecosystem convention set
//! behind the [`SourceAnalyzer`] trait, so the core stays testable no matter
//! which ecosystem is being indexed. Extraction never fails: malformed
//! content degrades to absent fields.

use regex::Regex;

use crate::models::{FileCategory, FileKind, ProcessInfo, ProcessRole};

/// Fixed action-verb vocabulary for process-role detection.
pub const ACTION_VERBS: [&str; 13] = [
    "upload", "create", "generate", "process", "convert", "save", "delete", "approve", "reject",
    "validate", "schedule", "sync", "fetch",
];

/// Classify a file into (kind, category) from its path and name alone.
///
/// First match wins; there is no scoring.
pub fn classify(path: &str, name: &str) -> (FileKind, FileCategory) {
    let kind = detect_kind(path, name);
    let category = categorize(kind, path);
    (kind, category)
}

fn detect_kind(path: &str, name: &str) -> FileKind {
    let lower_name = name.to_lowercase();
    let lower_path = path.to_lowercase();

    // Exact / prefix name matches first.
    if lower_name == "readme" || lower_name.starts_with("readme.") {
        return FileKind::Readme;
    }
    if lower_name == "package.json" {
        return FileKind::PackageManifest;
    }
    if matches!(
        lower_name.as_str(),
        "package-lock.json" | "yarn.lock" | "pnpm-lock.yaml" | "bun.lockb"
    ) {
        return FileKind::Lockfile;
    }
    if lower_name.starts_with("tsconfig") {
        return FileKind::TsConfig;
    }
    if lower_name.starts_with("next.config")
        || lower_name.starts_with("vite.config")
        || lower_name.starts_with("webpack.config")
        || lower_name.starts_with("tailwind.config")
    {
        return FileKind::FrameworkConfig;
    }
    if lower_name.starts_with("firebase") || lower_name == ".firebaserc" {
        return FileKind::FirebaseConfig;
    }
    if lower_name.starts_with(".env") {
        return FileKind::EnvConfig;
    }
    if lower_name.starts_with("middleware.") {
        return FileKind::Middleware;
    }
    if lower_name.starts_with("page.") {
        return FileKind::Page;
    }
    if lower_name.starts_with("layout.") {
        return FileKind::Layout;
    }
    if lower_name.starts_with("route.") {
        return FileKind::ApiRoute;
    }
    if lower_name.contains(".test.")
        || lower_name.contains(".spec.")
        || lower_path.contains("__tests__/")
    {
        return FileKind::Test;
    }

    // Directory conventions next.
    if lower_path.contains("/api/") || lower_path.starts_with("api/") {
        return FileKind::ApiRoute;
    }
    if lower_path.contains("/components/") || lower_path.starts_with("components/") {
        return FileKind::Component;
    }
    if lower_path.contains("/hooks/") || lower_path.starts_with("hooks/") {
        return FileKind::Hook;
    }
    if lower_path.contains("/services/") || lower_path.starts_with("services/") {
        return FileKind::Service;
    }
    if lower_path.contains("/pages/") || lower_path.starts_with("pages/") {
        return FileKind::Page;
    }

    // Extension fallback last.
    match extension(&lower_name).as_deref() {
        Some(".md") | Some(".mdx") => FileKind::Markdown,
        Some(".css") | Some(".scss") | Some(".sass") | Some(".less") => FileKind::Stylesheet,
        Some(".json") => FileKind::Json,
        Some(".tsx") | Some(".jsx") => FileKind::Component,
        Some(".ts") => FileKind::TypeScript,
        Some(".js") | Some(".mjs") | Some(".cjs") => FileKind::JavaScript,
        Some(".png") | Some(".jpg") | Some(".jpeg") | Some(".gif") | Some(".svg")
        | Some(".ico") | Some(".webp") => FileKind::Image,
        _ => FileKind::Other,
    }
}

/// Category is a pure function of kind, with a path-substring override for
/// test/utility when the kind resolved through the generic fallback.
fn categorize(kind: FileKind, path: &str) -> FileCategory {
    let base = match kind {
        FileKind::Component | FileKind::Page | FileKind::Layout => FileCategory::Component,
        FileKind::Hook => FileCategory::Hook,
        FileKind::Service | FileKind::ApiRoute | FileKind::Middleware => FileCategory::Service,
        FileKind::PackageManifest
        | FileKind::Lockfile
        | FileKind::TsConfig
        | FileKind::FrameworkConfig
        | FileKind::FirebaseConfig
        | FileKind::EnvConfig
        | FileKind::Json => FileCategory::Config,
        FileKind::Readme | FileKind::Markdown => FileCategory::Docs,
        FileKind::Test => FileCategory::Test,
        FileKind::Stylesheet => FileCategory::Style,
        FileKind::TypeScript | FileKind::JavaScript | FileKind::Image | FileKind::Other => {
            FileCategory::Other
        }
    };

    if base == FileCategory::Other {
        let lower = path.to_lowercase();
        if lower.contains("test") {
            return FileCategory::Test;
        }
        if lower.contains("utils") || lower.contains("helpers") || lower.contains("/lib/") {
            return FileCategory::Utility;
        }
    }

    base
}

/// Derive free-form tag labels from path segments, the file stem, and kind.
pub fn extract_tags(path: &str, name: &str, kind: FileKind) -> Vec<String> {
    const SEGMENT_VOCAB: [&str; 12] = [
        "components",
        "hooks",
        "services",
        "api",
        "pages",
        "app",
        "lib",
        "utils",
        "config",
        "docs",
        "tests",
        "styles",
    ];

    let lower_path = path.to_lowercase();
    let mut tags: Vec<String> = Vec::new();
    let mut push = |tag: String| {
        if !tag.is_empty() && !tags.contains(&tag) {
            tags.push(tag);
        }
    };

    for segment in lower_path.split('/') {
        if SEGMENT_VOCAB.contains(&segment) {
            push(segment.to_string());
        }
    }

    let lower_name = name.to_lowercase();
    let stem = lower_name
        .split_once('.')
        .map(|(s, _)| s)
        .unwrap_or(&lower_name);
    push(stem.to_string());

    if let Some(ext) = extension(&lower_name) {
        push(ext.trim_start_matches('.').to_string());
    }

    match kind {
        FileKind::Readme | FileKind::Markdown => push("documentation".to_string()),
        FileKind::Test => push("testing".to_string()),
        FileKind::PackageManifest => push("manifest".to_string()),
        _ => {}
    }

    tags
}

fn extension(lower_name: &str) -> Option<String> {
    lower_name.rfind('.').map(|i| lower_name[i..].to_string())
}

/// Best-effort insights extracted from one file's content.
#[derive(Debug, Clone, Default)]
pub struct FileInsights {
    pub description: Option<String>,
    pub exports: Option<Vec<String>>,
    pub imports: Option<Vec<String>>,
    pub dependencies: Option<Vec<String>>,
    pub functions: Option<Vec<String>>,
    pub hooks: Option<Vec<String>>,
    pub calls_api: Vec<String>,
    pub lines: u64,
}

/// Pluggable content extractor for one source-ecosystem convention set.
///
/// Implementations must never fail on malformed content; every field
/// degrades independently to "absent".
pub trait SourceAnalyzer: Send + Sync {
    /// Extract lightweight metadata from fetched file content.
    fn analyze(&self, content: &str, path: &str, kind: FileKind) -> FileInsights;

    /// Detect action verbs against the fixed vocabulary. Filename matches are
    /// substring checks; content matches are whole-word occurrences. The
    /// result is the union, in vocabulary order.
    fn detect_actions(&self, name: &str, content: Option<&str>) -> Vec<String>;
}

/// [`SourceAnalyzer`] for JavaScript/TypeScript repository conventions.
///
/// All patterns are compiled once at construction.
pub struct JsConventionAnalyzer {
    re_import: Regex,
    re_export: Regex,
    re_function: Regex,
    re_hook: Regex,
    re_api_call: Regex,
    re_action_word: Regex,
}

impl JsConventionAnalyzer {
    pub fn new() -> Self {
        // Static patterns, known valid.
        Self {
            re_import: Regex::new(r#"from\s+['"]([^'"]+)['"]"#).unwrap(),
            re_export: Regex::new(
                r"export\s+(?:default\s+)?(?:async\s+)?(?:function|const|class|let|var|interface|type|enum)\s+([A-Za-z_$][\w$]*)",
            )
            .unwrap(),
            re_function: Regex::new(
                r"(?:\bfunction\s+([A-Za-z_$][\w$]*))|(?:\bconst\s+([A-Za-z_$][\w$]*)\s*=\s*(?:async\s*)?\()",
            )
            .unwrap(),
            re_hook: Regex::new(r"\b(use[A-Z][\w$]*)").unwrap(),
            re_api_call: Regex::new(
                r#"(?:fetch|axios\.(?:get|post|put|delete|patch))\(\s*[`'"]([^`'"]+)[`'"]"#,
            )
            .unwrap(),
            re_action_word: Regex::new(
                r"(?i)\b(upload|create|generate|process|convert|save|delete|approve|reject|validate|schedule|sync|fetch)\b",
            )
            .unwrap(),
        }
    }

    fn extract_imports(&self, content: &str) -> Option<Vec<String>> {
        let mut specs: Vec<String> = Vec::new();
        for cap in self.re_import.captures_iter(content) {
            let spec = cap[1].to_string();
            if !specs.contains(&spec) {
                specs.push(spec);
            }
            if specs.len() >= 10 {
                break;
            }
        }
        if specs.is_empty() {
            None
        } else {
            Some(specs)
        }
    }

    fn extract_exports(&self, content: &str) -> Option<Vec<String>> {
        let mut names: Vec<String> = Vec::new();
        for cap in self.re_export.captures_iter(content) {
            let name = cap[1].to_string();
            if !names.contains(&name) {
                names.push(name);
            }
        }
        if names.is_empty() {
            None
        } else {
            Some(names)
        }
    }

    fn extract_functions(&self, content: &str) -> Option<Vec<String>> {
        let mut names: Vec<String> = Vec::new();
        for cap in self.re_function.captures_iter(content) {
            let name = cap
                .get(1)
                .or_else(|| cap.get(2))
                .map(|m| m.as_str().to_string());
            if let Some(name) = name {
                if !names.contains(&name) {
                    names.push(name);
                }
            }
        }
        if names.is_empty() {
            None
        } else {
            Some(names)
        }
    }

    fn extract_hooks(&self, content: &str) -> Option<Vec<String>> {
        let mut names: Vec<String> = Vec::new();
        for cap in self.re_hook.captures_iter(content) {
            let name = cap[1].to_string();
            if !names.contains(&name) {
                names.push(name);
            }
        }
        if names.is_empty() {
            None
        } else {
            Some(names)
        }
    }

    fn extract_api_calls(&self, content: &str) -> Vec<String> {
        let mut paths: Vec<String> = Vec::new();
        for cap in self.re_api_call.captures_iter(content) {
            let path = cap[1].to_string();
            if (path.starts_with('/') || path.starts_with("http")) && !paths.contains(&path) {
                paths.push(path);
            }
        }
        paths
    }

    /// Parse dependency names from a package manifest; a tolerant parse that
    /// swallows failure (absent, not an error).
    fn extract_dependencies(&self, content: &str) -> Option<Vec<String>> {
        let value: serde_json::Value = serde_json::from_str(content).ok()?;
        let mut deps: Vec<String> = Vec::new();
        for section in ["dependencies", "devDependencies"] {
            if let Some(map) = value.get(section).and_then(|v| v.as_object()) {
                for key in map.keys() {
                    if !deps.contains(key) {
                        deps.push(key.clone());
                    }
                }
            }
        }
        if deps.is_empty() {
            None
        } else {
            Some(deps)
        }
    }
}

impl Default for JsConventionAnalyzer {
    fn default() -> Self {
        Self::new()
    }
}

impl SourceAnalyzer for JsConventionAnalyzer {
    fn analyze(&self, content: &str, _path: &str, kind: FileKind) -> FileInsights {
        let mut insights = FileInsights {
            lines: content.lines().count() as u64,
            ..FileInsights::default()
        };

        insights.description = leading_doc_line(content);

        if kind == FileKind::PackageManifest {
            insights.dependencies = self.extract_dependencies(content);
            return insights;
        }

        insights.imports = self.extract_imports(content);
        insights.exports = self.extract_exports(content);
        insights.functions = self.extract_functions(content);
        insights.hooks = self.extract_hooks(content);
        insights.calls_api = self.extract_api_calls(content);
        insights
    }

    fn detect_actions(&self, name: &str, content: Option<&str>) -> Vec<String> {
        let lower_name = name.to_lowercase();
        let mut content_hits: Vec<String> = Vec::new();
        if let Some(content) = content {
            for cap in self.re_action_word.captures_iter(content) {
                content_hits.push(cap[1].to_lowercase());
            }
        }

        ACTION_VERBS
            .iter()
            .filter(|verb| {
                lower_name.contains(*verb) || content_hits.iter().any(|h| h == *verb)
            })
            .map(|v| v.to_string())
            .collect()
    }
}

/// First line of a leading JSDoc block, capped at 200 characters.
fn leading_doc_line(content: &str) -> Option<String> {
    let trimmed = content.trim_start();
    if !trimmed.starts_with("/**") {
        return None;
    }
    let block_end = trimmed.find("*/")?;
    let block = &trimmed[3..block_end];

    for line in block.lines() {
        let text = line.trim().trim_start_matches('*').trim();
        if !text.is_empty() {
            let capped: String = text.chars().take(200).collect();
            return Some(capped);
        }
    }
    None
}

/// Apply the fixed process-role decision order.
///
/// config category → config; entrypoint shape (api route, `route.*`,
/// `index.*`) → entrypoint; two or more distinct actions → orchestrator;
/// exactly one → worker; none → utility.
pub fn classify_process(
    category: FileCategory,
    kind: FileKind,
    name: &str,
    actions: Vec<String>,
    calls_api: Vec<String>,
) -> ProcessInfo {
    if category == FileCategory::Config {
        return ProcessInfo {
            role: ProcessRole::Config,
            entrypoint: false,
            actions,
            calls_api,
        };
    }

    let lower_name = name.to_lowercase();
    let is_entrypoint = kind == FileKind::ApiRoute
        || lower_name.starts_with("route.")
        || lower_name.starts_with("index.");
    if is_entrypoint {
        return ProcessInfo {
            role: ProcessRole::Entrypoint,
            entrypoint: true,
            actions,
            calls_api,
        };
    }

    let role = match actions.len() {
        0 => ProcessRole::Utility,
        1 => ProcessRole::Worker,
        _ => ProcessRole::Orchestrator,
    };
    ProcessInfo {
        role,
        entrypoint: false,
        actions,
        calls_api,
    }
}
