use context_graph::{DependencyGraph, DependencyTarget, GraphNodeId, GraphStatistics};
use context_indexer::{MetricsSnapshot, ProjectContext, UpdateReport};
use context_search::CodeReference;
use serde::Serialize;

#[derive(Debug, Serialize)]
pub struct DependencyEntry {
    pub target: DependencyTarget,
    /// Declarations the target name resolves to in this project
    pub resolved: Vec<GraphNodeId>,
}

#[derive(Debug, Serialize)]
pub struct DepsOutput {
    pub symbol: GraphNodeId,
    pub dependencies: Vec<DependencyEntry>,
}

#[derive(Debug, Serialize)]
pub struct DependentsOutput {
    pub symbol: GraphNodeId,
    pub dependents: Vec<GraphNodeId>,
}

#[derive(Debug, Serialize)]
pub struct PathOutput {
    pub from: GraphNodeId,
    pub to: GraphNodeId,
    pub reachable: bool,
}

#[derive(Debug, Serialize)]
pub struct StatsOutput {
    pub graph: GraphStatistics,
    pub engine: MetricsSnapshot,
}

pub fn render_project(project: &ProjectContext) -> String {
    let mut out = String::new();
    out.push_str(&format!("Project: {} ({})\n", project.name, project.root.display()));
    if project.degraded {
        out.push_str("Analysis failed; see log for details\n");
        return out;
    }
    let m = &project.metrics;
    out.push_str(&format!(
        "Files: {} scanned, {} parsed, {} failed\n",
        m.files_scanned, m.files_parsed, m.parse_failures
    ));
    out.push_str(&format!("Lines: {}\n", m.total_lines));
    out.push_str(&format!("Time: {}ms\n", m.analysis_time_ms));
    if !project.structure.languages.is_empty() {
        out.push_str("Languages:\n");
        for (language, count) in &project.structure.languages {
            out.push_str(&format!("  {language}: {count}\n"));
        }
    }
    out
}

pub fn render_search(hits: &[CodeReference]) -> String {
    if hits.is_empty() {
        return "No matches\n".to_string();
    }
    let mut out = String::new();
    for (i, hit) in hits.iter().enumerate() {
        out.push_str(&format!(
            "{}. {}:{}:{} (score: {:.3})\n",
            i + 1,
            hit.file_path,
            hit.line,
            hit.column,
            hit.score
        ));
        if let Some(symbol) = &hit.symbol {
            out.push_str(&format!("   Symbol: {symbol}\n"));
        }
        out.push_str(&format!("   {}\n", first_line(&hit.snippet)));
        out.push('\n');
    }
    out
}

pub fn render_deps(deps: &DepsOutput) -> String {
    let mut out = String::new();
    out.push_str(&format!("{} depends on:\n", deps.symbol));
    if deps.dependencies.is_empty() {
        out.push_str("  (nothing)\n");
    }
    for entry in &deps.dependencies {
        if entry.resolved.is_empty() {
            out.push_str(&format!("  {} (external)\n", entry.target));
        } else {
            out.push_str(&format!("  {}\n", entry.target));
            for id in &entry.resolved {
                out.push_str(&format!("    -> {id}\n"));
            }
        }
    }
    out
}

pub fn render_dependents(deps: &DependentsOutput) -> String {
    let mut out = String::new();
    out.push_str(&format!("Depends on {}:\n", deps.symbol));
    if deps.dependents.is_empty() {
        out.push_str("  (nothing)\n");
    }
    for id in &deps.dependents {
        out.push_str(&format!("  {id}\n"));
    }
    out
}

pub fn render_path(path: &PathOutput) -> String {
    let verdict = if path.reachable { "reaches" } else { "does not reach" };
    format!("{} {verdict} {}\n", path.from, path.to)
}

pub fn render_cycles(graph: &DependencyGraph, cycles: &[Vec<GraphNodeId>]) -> String {
    if cycles.is_empty() {
        return "No circular dependencies\n".to_string();
    }
    let mut out = String::new();
    out.push_str(&format!("{} circular dependenc(ies):\n", cycles.len()));
    for (i, cycle) in cycles.iter().enumerate() {
        let names: Vec<&str> = cycle
            .iter()
            .map(|id| {
                graph
                    .node(id)
                    .and_then(|node| node.name())
                    .unwrap_or_else(|| id.as_str())
            })
            .collect();
        let head = names.first().copied().unwrap_or_default();
        out.push_str(&format!("{}. {} -> {head}\n", i + 1, names.join(" -> ")));
    }
    out
}

pub fn render_stats(stats: &StatsOutput) -> String {
    let g = &stats.graph;
    let e = &stats.engine;
    let mut out = String::new();
    out.push_str("Graph:\n");
    out.push_str(&format!("  nodes: {}\n", g.node_count));
    out.push_str(&format!(
        "  edges: {} ({} resolved)\n",
        g.edge_count, g.resolved_edge_count
    ));
    out.push_str(&format!(
        "  out-degree: avg {:.2}, max {}\n",
        g.avg_out_degree, g.max_out_degree
    ));
    out.push_str(&format!("  cycles: {}\n", g.cycle_count));
    out.push_str("Engine:\n");
    out.push_str(&format!("  cached trees: {}\n", e.cache_size));
    out.push_str(&format!("  files parsed: {}\n", e.files_parsed));
    out.push_str(&format!("  parse failures: {}\n", e.parse_failures));
    out.push_str(&format!("  avg analysis: {:.1}ms\n", e.avg_analysis_time_ms));
    out.push_str(&format!("  memory: ~{} KiB\n", e.memory_usage_bytes / 1024));
    out
}

pub fn render_update(report: &UpdateReport) -> String {
    let mut line = format!(
        "Applied {} change(s) in {}ms: {} re-parsed, {} removed, {} failed",
        report.applied, report.duration_ms, report.reparsed, report.removed, report.failed
    );
    if report.over_budget {
        line.push_str(" [slow]");
    }
    line.push('\n');
    line
}

fn first_line(text: &str) -> &str {
    text.lines().next().unwrap_or_default().trim()
}

#[cfg(test)]
mod tests {
    use super::*;
    use context_graph::DependencyKind;

    #[test]
    fn deps_mark_unresolved_targets_external() {
        let output = DepsOutput {
            symbol: GraphNodeId::from("class:Widget@w.ts:1:1-3:2"),
            dependencies: vec![
                DependencyEntry {
                    target: DependencyTarget::new(DependencyKind::Class, "Base"),
                    resolved: vec![GraphNodeId::from("class:Base@b.ts:1:1-1:14")],
                },
                DependencyEntry {
                    target: DependencyTarget::new(DependencyKind::Import, "react"),
                    resolved: Vec::new(),
                },
            ],
        };
        let text = render_deps(&output);
        assert!(text.contains("class:Base\n    -> class:Base@b.ts:1:1-1:14"));
        assert!(text.contains("import:react (external)"));
    }

    #[test]
    fn update_line_flags_slow_batches() {
        let report = UpdateReport {
            applied: 2,
            over_budget: true,
            ..UpdateReport::default()
        };
        assert!(render_update(&report).ends_with("[slow]\n"));
    }

    #[test]
    fn stats_text_lists_graph_and_engine() {
        let stats = StatsOutput {
            graph: GraphStatistics {
                node_count: 4,
                edge_count: 3,
                resolved_edge_count: 2,
                avg_out_degree: 0.75,
                max_out_degree: 2,
                cycle_count: 1,
            },
            engine: MetricsSnapshot {
                cache_size: 2,
                memory_usage_bytes: 4096,
                ..MetricsSnapshot::default()
            },
        };
        let text = render_stats(&stats);
        assert!(text.starts_with("Graph:\n  nodes: 4\n  edges: 3 (2 resolved)\n"));
        assert!(text.contains("  out-degree: avg 0.75, max 2\n  cycles: 1\nEngine:\n"));
        assert!(text.ends_with("  memory: ~4 KiB\n"));
    }
}
