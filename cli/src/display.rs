//! Human-readable rendering of exploration results for stdout.

use thoughtgraph::ExploreResult;

const INDENT: &str = "  ";

/// Truncates `s` to at most `max` chars; appends "..." when truncated. UTF-8 safe.
/// `max == 0` disables truncation.
pub fn truncate_display(s: &str, max: usize) -> String {
    const SUFFIX: &str = "...";
    if max == 0 || s.chars().count() <= max {
        return s.to_string();
    }
    if max <= SUFFIX.len() {
        return s.chars().take(max).collect();
    }
    let mut out: String = s.chars().take(max - SUFFIX.len()).collect();
    out.push_str(SUFFIX);
    out
}

/// Steps, totals, then conclusions best first.
pub fn format_explore_summary(result: &ExploreResult, max: usize) -> String {
    let mut lines = vec![format!(
        "graph {}: {}",
        result.graph_id,
        truncate_display(&result.problem, max)
    )];
    lines.push("steps:".to_string());
    for step in &result.exploration_path {
        lines.push(format!(
            "{INDENT}{:>2}. {:<10} {:>3}  {}",
            step.step, step.action, step.vertex_count, step.details
        ));
    }
    lines.push(format!(
        "totals: iterations={} generated={} pruned={} refined={}",
        result.iterations, result.total_generated, result.total_pruned, result.total_refined
    ));
    if result.conclusions.is_empty() {
        lines.push("conclusions: none".to_string());
    } else {
        lines.push("conclusions:".to_string());
        for v in &result.conclusions {
            let score = v.score.map_or_else(|| "-".to_string(), |s| format!("{s:.3}"));
            lines.push(format!(
                "{INDENT}[{score}] {} ({}, depth {}): {}",
                v.id,
                v.kind,
                v.depth,
                truncate_display(&v.content, max)
            ));
        }
    }
    lines.join("\n")
}
