//! Import specifier resolution and import-graph linking.
//!
//! Only relative (`./`, `../`) and root-alias (`@/`) specifiers are eligible;
//! bare package names are external dependencies and resolve to nothing. A
//! dangling import is not an error — no edge is created.

use std::collections::{HashMap, HashSet};

use crate::models::IndexedFile;

/// Extensions tried when an exact path match misses, in order.
const RESOLVE_EXTENSIONS: [&str; 5] = [".ts", ".tsx", ".js", ".jsx", ".json"];

/// Root alias prefix and the directory it rewrites to.
const ALIAS_PREFIX: &str = "@/";
const ALIAS_ROOT: &str = "src/";

/// Resolve an import specifier against the set of known indexed paths.
///
/// Exact match first, then each extension suffix, then `/index` with each
/// extension. First hit wins; `None` if everything misses.
pub fn resolve_import(
    specifier: &str,
    current_file: &str,
    known_paths: &HashSet<String>,
) -> Option<String> {
    let base = if let Some(rest) = specifier.strip_prefix(ALIAS_PREFIX) {
        format!("{}{}", ALIAS_ROOT, rest)
    } else if specifier.starts_with("./") || specifier.starts_with("../") {
        let dir = parent_dir(current_file);
        join_normalized(&dir, specifier)?
    } else {
        // Bare package name: external dependency, not tracked.
        return None;
    };

    if known_paths.contains(&base) {
        return Some(base);
    }
    for ext in RESOLVE_EXTENSIONS {
        let candidate = format!("{}{}", base, ext);
        if known_paths.contains(&candidate) {
            return Some(candidate);
        }
    }
    for ext in RESOLVE_EXTENSIONS {
        let candidate = format!("{}/index{}", base, ext);
        if known_paths.contains(&candidate) {
            return Some(candidate);
        }
    }
    None
}

fn parent_dir(path: &str) -> String {
    match path.rfind('/') {
        Some(i) => path[..i].to_string(),
        None => String::new(),
    }
}

/// Join a relative specifier onto a directory, walking `..` segments exactly
/// as a filesystem path join would. Returns `None` when `..` escapes the
/// repository root.
fn join_normalized(dir: &str, specifier: &str) -> Option<String> {
    let mut segments: Vec<&str> = if dir.is_empty() {
        Vec::new()
    } else {
        dir.split('/').collect()
    };

    for part in specifier.split('/') {
        match part {
            "." | "" => {}
            ".." => {
                segments.pop()?;
            }
            other => segments.push(other),
        }
    }
    Some(segments.join("/"))
}

/// Resolve every file's raw import specifiers and build symmetric
/// imports/imported_by edges in place.
///
/// Idempotent per edge: processing order affects list insertion order only,
/// never set membership.
pub fn link_imports(files: &mut [IndexedFile]) {
    let known_paths: HashSet<String> = files.iter().map(|f| f.path.clone()).collect();

    // path → resolved targets, computed before mutation.
    let mut resolved: HashMap<String, Vec<String>> = HashMap::new();
    for file in files.iter() {
        let Some(specs) = &file.import_specifiers else {
            continue;
        };
        let mut targets: Vec<String> = Vec::new();
        for spec in specs {
            if let Some(target) = resolve_import(spec, &file.path, &known_paths) {
                if target != file.path && !targets.contains(&target) {
                    targets.push(target);
                }
            }
        }
        if !targets.is_empty() {
            resolved.insert(file.path.clone(), targets);
        }
    }

    let mut reverse: HashMap<String, Vec<String>> = HashMap::new();
    for (importer, targets) in &resolved {
        for target in targets {
            let entry = reverse.entry(target.clone()).or_default();
            if !entry.contains(importer) {
                entry.push(importer.clone());
            }
        }
    }

    for file in files.iter_mut() {
        if let Some(targets) = resolved.remove(&file.path) {
            file.relations.imports = targets;
        }
        if let Some(importers) = reverse.remove(&file.path) {
            file.relations.imported_by = importers;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{FileCategory, FileKind, IndexedFile};

    fn known(paths: &[&str]) -> HashSet<String> {
        paths.iter().map(|p| p.to_string()).collect()
    }

    fn file(path: &str, specs: &[&str]) -> IndexedFile {
        let name = path.rsplit('/').next().unwrap().to_string();
        IndexedFile {
            path: path.to_string(),
            name,
            directory: parent_dir(path),
            size: 100,
            sha: "sha".into(),
            lines: 10,
            category: FileCategory::Other,
            kind: FileKind::TypeScript,
            tags: vec![],
            description: None,
            exports: None,
            import_specifiers: if specs.is_empty() {
                None
            } else {
                Some(specs.iter().map(|s| s.to_string()).collect())
            },
            dependencies: None,
            functions: None,
            hooks: None,
            props: None,
            relations: Default::default(),
            is_key_file: false,
            is_documentation: false,
            process: Default::default(),
        }
    }

    #[test]
    fn test_bare_package_not_tracked() {
        let paths = known(&["src/a.ts"]);
        assert_eq!(resolve_import("react", "src/a.ts", &paths), None);
    }

    #[test]
    fn test_relative_with_extension_retry() {
        let paths = known(&["src/components/Button.tsx"]);
        assert_eq!(
            resolve_import("./Button", "src/components/Input.tsx", &paths),
            Some("src/components/Button.tsx".to_string())
        );
    }

    #[test]
    fn test_parent_walk() {
        let paths = known(&["src/lib/api.ts"]);
        assert_eq!(
            resolve_import("../lib/api", "src/components/Cart.tsx", &paths),
            Some("src/lib/api.ts".to_string())
        );
    }

    #[test]
    fn test_directory_index_retry() {
        let paths = known(&["src/hooks/index.ts"]);
        assert_eq!(
            resolve_import("../hooks", "src/components/Cart.tsx", &paths),
            Some("src/hooks/index.ts".to_string())
        );
    }

    #[test]
    fn test_alias_prefix() {
        let paths = known(&["src/lib/api.ts"]);
        assert_eq!(
            resolve_import("@/lib/api", "deep/nested/file.ts", &paths),
            Some("src/lib/api.ts".to_string())
        );
    }

    #[test]
    fn test_exact_match_beats_extension_retry() {
        // Both "src/data" and "src/data.ts" exist; exact wins.
        let paths = known(&["src/data", "src/data.ts"]);
        assert_eq!(
            resolve_import("./data", "src/main.ts", &paths),
            Some("src/data".to_string())
        );
    }

    #[test]
    fn test_dangling_import_resolves_to_none() {
        let paths = known(&["src/a.ts"]);
        assert_eq!(resolve_import("./missing", "src/a.ts", &paths), None);
    }

    #[test]
    fn test_escaping_root_resolves_to_none() {
        let paths = known(&["a.ts"]);
        assert_eq!(resolve_import("../../a", "a.ts", &paths), None);
    }

    #[test]
    fn test_link_imports_symmetry() {
        let mut files = vec![
            file("src/components/Button.tsx", &["react"]),
            file("src/components/Input.tsx", &["./Button"]),
        ];
        link_imports(&mut files);

        let button = &files[0];
        let input = &files[1];
        assert_eq!(
            input.relations.imports,
            vec!["src/components/Button.tsx".to_string()]
        );
        assert_eq!(
            button.relations.imported_by,
            vec!["src/components/Input.tsx".to_string()]
        );
        // External import created no edge.
        assert!(button.relations.imports.is_empty());
    }

    #[test]
    fn test_link_imports_idempotent_membership() {
        let mut files = vec![
            file("src/a.ts", &["./b", "./b.ts"]),
            file("src/b.ts", &[]),
        ];
        link_imports(&mut files);
        // Two specifiers resolving to the same target yield one edge.
        assert_eq!(files[0].relations.imports, vec!["src/b.ts".to_string()]);
        assert_eq!(files[1].relations.imported_by, vec!["src/a.ts".to_string()]);
    }
}
