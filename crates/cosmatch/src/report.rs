//! Markdown task report

use chrono::{DateTime, Local};
use cosmatch_matcher::{MatchParams, RunStats};
use std::path::PathBuf;

/// Everything the task report shows
#[derive(Debug, Clone)]
pub struct ReportContext {
    pub generated_at: DateTime<Local>,
    pub elapsed_secs: f64,
    pub query_path: PathBuf,
    pub query_size: u64,
    pub candidate_path: PathBuf,
    pub candidate_size: u64,
    pub output_path: PathBuf,
    pub output_size: u64,
    pub params: MatchParams,
    pub batch_size: usize,
    pub stats: RunStats,
}

fn kb(bytes: u64) -> f64 {
    bytes as f64 / 1024.0
}

/// `numerator / seconds`, or 0 when no time elapsed
fn per_second(numerator: f64, seconds: f64) -> f64 {
    if seconds > 0.0 {
        numerator / seconds
    } else {
        0.0
    }
}

/// Render the report as Markdown
pub fn render_report(ctx: &ReportContext) -> String {
    let stats = &ctx.stats;
    let input_kb = kb(ctx.query_size + ctx.candidate_size);

    format!(
        r#"# Cosine Similarity Recommendation Report

## 1. Overview
- **Task**: cosine similarity recommendation
- **Run at**: {run_at}
- **Elapsed**: {elapsed:.2}s

## 2. Input Data
- **Query data**:
  - File: {query_path}
  - Size: {query_kb:.2} KB
  - Count: {queries}
- **Candidate data**:
  - File: {candidate_path}
  - Size: {candidate_kb:.2} KB
  - Count: {candidates}

## 3. Settings
- **Max recommendations (top_n)**: {top_n}
- **Similarity threshold**: {threshold}
- **Batch size**: {batch_size}

## 4. Results
- **Output file**: {output_path}
- **Output size**: {output_kb:.2} KB
- **Matched queries**: {matched}
- **Match ratio**: {ratio:.2}%
- **Average recommendations**: {avg:.2}

## 5. Performance
- **Throughput**: {kb_per_sec:.2} KB/s
- **Queries per second**: {queries_per_sec:.2}
- **Matched queries per second**: {matched_per_sec:.2}

## 6. Status
- **Status**: success
- **Detail**: cosine similarity recommendation completed
"#,
        run_at = ctx.generated_at.format("%Y-%m-%d %H:%M:%S"),
        elapsed = ctx.elapsed_secs,
        query_path = ctx.query_path.display(),
        query_kb = kb(ctx.query_size),
        queries = stats.total_queries,
        candidate_path = ctx.candidate_path.display(),
        candidate_kb = kb(ctx.candidate_size),
        candidates = stats.total_candidates,
        top_n = ctx.params.top_n,
        threshold = ctx.params.threshold,
        batch_size = ctx.batch_size,
        output_path = ctx.output_path.display(),
        output_kb = kb(ctx.output_size),
        matched = stats.matched_queries,
        ratio = stats.matched_ratio() * 100.0,
        avg = stats.avg_recommendations(),
        kb_per_sec = per_second(input_kb, ctx.elapsed_secs),
        queries_per_sec = per_second(stats.total_queries as f64, ctx.elapsed_secs),
        matched_per_sec = per_second(stats.matched_queries as f64, ctx.elapsed_secs),
    )
}
