//! Cross-experiment comparison over the summary files in a log directory.

use crate::record::{group_thousands, ExperimentSummary};
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use zipact_error::{Error, Result};

/// File written next to the summaries
pub const CSV_FILE: &str = "results_summary.csv";

const COLUMNS: [&str; 10] = [
    "Agent",
    "Model",
    "Dataset",
    "Success Rate",
    "Successes",
    "Total",
    "Avg Steps",
    "Avg Tokens/Episode",
    "Total Tokens",
    "Experiment",
];

/// One summary file, as displayed.
#[derive(Debug, Clone, PartialEq)]
pub struct ResultRow {
    pub summary: ExperimentSummary,
}

impl ResultRow {
    fn or_unknown(s: &str) -> &str {
        if s.is_empty() { "unknown" } else { s }
    }

    pub fn agent(&self) -> &str {
        Self::or_unknown(&self.summary.agent)
    }

    pub fn model(&self) -> &str {
        Self::or_unknown(&self.summary.model)
    }

    /// Cells in column order
    pub fn cells(&self) -> [String; 10] {
        let s = &self.summary;
        [
            self.agent().to_string(),
            self.model().to_string(),
            Self::or_unknown(&s.dataset).to_string(),
            percent(s.success_rate),
            s.successful_episodes.to_string(),
            s.total_episodes.to_string(),
            format!("{:.1}", s.avg_steps),
            format!("{:.0}", s.token_usage.avg_tokens_per_episode),
            group_thousands(s.token_usage.total_tokens),
            s.experiment_name.clone(),
        ]
    }
}

fn percent(rate: f64) -> String {
    format!("{:.1}%", rate * 100.0)
}

/// Load every `*_summary.json` in `dir`, sorted by model then agent.
///
/// Files that fail to read or parse are skipped with a warning.
pub fn load_results(dir: &Path) -> Result<Vec<ResultRow>> {
    let entries = fs::read_dir(dir).map_err(|e| {
        Error::from(e)
            .with_operation("analyze::load_results")
            .with_context("path", dir.display().to_string())
    })?;

    let mut paths: Vec<PathBuf> = entries
        .filter_map(|entry| entry.ok().map(|e| e.path()))
        .filter(|p| {
            p.file_name()
                .and_then(|n| n.to_str())
                .is_some_and(|n| n.ends_with("_summary.json"))
        })
        .collect();
    paths.sort();

    let mut rows = Vec::with_capacity(paths.len());
    for path in paths {
        let parsed = fs::read_to_string(&path)
            .map_err(|e| e.to_string())
            .and_then(|text| serde_json::from_str::<ExperimentSummary>(&text).map_err(|e| e.to_string()));
        match parsed {
            Ok(summary) => rows.push(ResultRow { summary }),
            Err(e) => tracing::warn!(path = %path.display(), error = %e, "skipping unreadable summary"),
        }
    }

    rows.sort_by(|a, b| (a.model(), a.agent()).cmp(&(b.model(), b.agent())));
    Ok(rows)
}

/// Fixed-width text table, right-aligned like a dataframe dump.
fn render_grid(header: &[&str], rows: &[Vec<String>]) -> String {
    let mut widths: Vec<usize> = header.iter().map(|h| h.chars().count()).collect();
    for row in rows {
        for (w, cell) in widths.iter_mut().zip(row) {
            *w = (*w).max(cell.chars().count());
        }
    }

    let mut out = String::new();
    grid_line(&mut out, header.iter().copied(), &widths);
    for row in rows {
        grid_line(&mut out, row.iter().map(String::as_str), &widths);
    }
    out
}

fn grid_line<'a>(out: &mut String, cells: impl Iterator<Item = &'a str>, widths: &[usize]) {
    let padded: Vec<String> = cells
        .zip(widths)
        .map(|(cell, w)| format!("{:>width$}", cell, width = *w))
        .collect();
    out.push_str(&padded.join(" "));
    out.push('\n');
}

pub fn render_table(rows: &[ResultRow]) -> String {
    let cells: Vec<Vec<String>> = rows.iter().map(|r| r.cells().to_vec()).collect();
    render_grid(&COLUMNS, &cells)
}

/// Per-agent means across all loaded experiments.
pub fn render_agent_comparison(rows: &[ResultRow]) -> String {
    let mut groups: BTreeMap<&str, Vec<&ExperimentSummary>> = BTreeMap::new();
    for row in rows {
        groups.entry(row.agent()).or_default().push(&row.summary);
    }

    let cells: Vec<Vec<String>> = groups
        .into_iter()
        .map(|(agent, summaries)| {
            let n = summaries.len() as f64;
            let mean = |f: fn(&ExperimentSummary) -> f64| summaries.iter().map(|s| f(s)).sum::<f64>() / n;
            vec![
                agent.to_string(),
                percent(mean(|s| s.success_rate)),
                format!("{:.1}", mean(|s| s.avg_steps)),
                format!("{:.0}", mean(|s| s.token_usage.avg_tokens_per_episode)),
            ]
        })
        .collect();
    render_grid(&["Agent", "Success Rate", "Avg Steps", "Avg Tokens/Episode"], &cells)
}

fn csv_field(value: &str) -> String {
    if value.contains([',', '"', '\n', '\r']) {
        format!("\"{}\"", value.replace('"', "\"\""))
    } else {
        value.to_string()
    }
}

pub fn render_csv(rows: &[ResultRow]) -> String {
    let mut out = COLUMNS.map(csv_field).join(",");
    out.push('\n');
    for row in rows {
        out.push_str(&row.cells().map(|c| csv_field(&c)).join(","));
        out.push('\n');
    }
    out
}

/// Print the comparison for `dir` into `out` and write the CSV next to the
/// summaries. Returns the CSV path, or `None` when nothing was found.
pub fn analyze_dir(dir: &Path, out: &mut impl std::io::Write) -> Result<Option<PathBuf>> {
    let rows = load_results(dir)?;
    if rows.is_empty() {
        writeln!(out, "No summary files found in {}", dir.display())?;
        return Ok(None);
    }

    let rule = "=".repeat(100);
    writeln!(out, "\n{}\nEXPERIMENT RESULTS SUMMARY\n{}", rule, rule)?;
    write!(out, "{}", render_table(&rows))?;
    writeln!(out, "{}", rule)?;
    writeln!(out, "\n{}\nCOMPARISON BY AGENT (Average across experiments)\n{}", rule, rule)?;
    write!(out, "{}", render_agent_comparison(&rows))?;
    writeln!(out, "{}", rule)?;

    let csv_path = dir.join(CSV_FILE);
    fs::write(&csv_path, render_csv(&rows)).map_err(|e| {
        Error::from(e)
            .with_operation("analyze::write_csv")
            .with_context("path", csv_path.display().to_string())
    })?;
    writeln!(out, "\nResults saved to: {}", csv_path.display())?;
    Ok(Some(csv_path))
}
