//! Graph validation.

use graft_core::{
    CodeGraph, GraftError, HintCode, ImportStatus, RecoveryHint, ResolutionConfig, ValidationResult, ValidationStatus,
};

/// Check the graph, stopping at the first failing rule:
/// no nodes, then the import resolution rate, then edge/parent integrity.
pub fn validate(graph: &CodeGraph, config: &ResolutionConfig) -> ValidationResult {
    let has_text = graph.files().any(|f| !f.text.trim().is_empty());
    let has_nodes = graph.nodes().any(|n| !n.id.is_root());
    if has_text && !has_nodes {
        return ValidationResult::failure(
            ValidationStatus::NoNodes,
            vec![format!("{} file(s) have source text but no nodes were extracted", graph.file_count())],
            vec![
                RecoveryHint::new(HintCode::CheckGrammarConfiguration, "confirm the files use a supported grammar"),
                RecoveryHint::new(HintCode::ReparseCodebase, "re-index the codebase from disk"),
            ],
        );
    }

    let rate = resolution_rate(graph, config);
    if let Some(rate) = rate {
        if rate < config.min_resolution_rate {
            let errors = unresolved_imports(graph);
            let mut result = ValidationResult::failure(
                ValidationStatus::LowImportResolutionRate,
                errors,
                vec![
                    RecoveryHint::new(
                        HintCode::CheckModuleSearchPaths,
                        format!(
                            "only {:.0}% of imports resolved (minimum {:.0}%); add source roots to module_search_paths",
                            rate * 100.0,
                            config.min_resolution_rate * 100.0
                        ),
                    ),
                    RecoveryHint::new(HintCode::AddExternalPattern, "mark third-party modules with external_patterns"),
                ],
            );
            result.resolution_rate = Some(rate);
            return result;
        }
    }

    let violations = graph.integrity_violations();
    if !violations.is_empty() {
        let hints = GraftError::GraphIntegrity {
            violations: violations.clone(),
        }
        .recovery_hints();
        let mut result = ValidationResult::failure(ValidationStatus::GraphIntegrityError, violations, hints);
        result.resolution_rate = rate;
        return result;
    }

    ValidationResult::success(rate, warnings(graph))
}

/// Fraction of import nodes that bound, or `None` without imports.
pub fn resolution_rate(graph: &CodeGraph, config: &ResolutionConfig) -> Option<f64> {
    let mut total = 0usize;
    let mut bound = 0usize;
    for node in graph.nodes().filter(|n| n.kind.is_import()) {
        total += 1;
        match graph.import_status(node.id) {
            ImportStatus::Resolved => bound += 1,
            ImportStatus::External if config.count_external_as_resolved => bound += 1,
            _ => {}
        }
    }
    (total > 0).then(|| bound as f64 / total as f64)
}

fn unresolved_imports(graph: &CodeGraph) -> Vec<String> {
    graph
        .nodes()
        .filter(|n| n.kind.is_import())
        .filter(|n| matches!(graph.import_status(n.id), ImportStatus::Unresolved | ImportStatus::Pending))
        .map(|n| {
            let path = graph.file(n.file()).map(|f| f.display_path()).unwrap_or_default();
            let module = n.import().map(|d| d.module.as_str()).unwrap_or("?");
            format!("{path}: unresolved import '{module}'")
        })
        .collect()
}

fn warnings(graph: &CodeGraph) -> Vec<String> {
    let mut warnings: Vec<String> = graph
        .files()
        .filter(|f| f.has_syntax_errors())
        .map(|f| format!("{}: {} syntax error(s)", f.display_path(), f.syntax_errors.len()))
        .collect();
    warnings.extend(
        graph
            .parse_errors()
            .map(|(path, message)| format!("{}: not indexed: {}", path.display(), message)),
    );
    warnings
}
