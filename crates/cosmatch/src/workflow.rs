use cosmatch_common::{AppConfig, CosMatchError, Result};
use cosmatch_matcher::{BatchCoordinator, MatchParams, RunStats};
use indicatif::{ProgressBar, ProgressStyle};
use std::path::PathBuf;
use std::time::Instant;
use tracing::info;

use crate::input::load_embeddings;
use crate::output::write_results;
use crate::report::{render_report, ReportContext};

/// Workflow execution options
#[derive(Debug, Clone, Copy)]
pub struct WorkflowOptions {
    /// Draw a progress bar over chunks
    pub show_progress: bool,
}

/// Workflow execution result
#[derive(Debug)]
pub struct WorkflowResult {
    pub stats: RunStats,
    pub output_path: PathBuf,
    pub report_path: PathBuf,
}

/// Load both collections, match them, write results and the task report
pub fn execute(config: &AppConfig, options: WorkflowOptions) -> Result<WorkflowResult> {
    let started = Instant::now();

    info!("[1/4] Loading embeddings");
    let queries = load_embeddings(&config.query_path)?;
    let candidates = load_embeddings(&config.candidate_path)?;

    info!("[2/4] Scoring in batches");
    let params = MatchParams::new(config.top_n, config.threshold)?;
    let coordinator = BatchCoordinator::new(params, config.batch_size)?.with_parallel(config.parallel);

    let progress = if options.show_progress {
        let chunks = coordinator.chunk_ranges(queries.set.len()).len();
        progress_bar(chunks as u64)?
    } else {
        ProgressBar::hidden()
    };

    let output = coordinator.run_with_progress(&queries.set, &candidates.set, |chunk| {
        progress.inc(1);
        progress.set_message(format!("queries {}..{}", chunk.start + 1, chunk.end));
    })?;
    progress.finish_and_clear();

    info!("[3/4] Saving results");
    let output_size = write_results(&config.output_path, &output.results)?;

    info!("[4/4] Writing task report");
    let report = render_report(&ReportContext {
        generated_at: chrono::Local::now(),
        elapsed_secs: started.elapsed().as_secs_f64(),
        query_path: queries.path.clone(),
        query_size: queries.size_bytes,
        candidate_path: candidates.path.clone(),
        candidate_size: candidates.size_bytes,
        output_path: config.output_path.clone(),
        output_size,
        params: *coordinator.params(),
        batch_size: coordinator.batch_size(),
        stats: output.stats,
    });
    std::fs::write(&config.report_path, report).map_err(|e| {
        CosMatchError::file_system(format!(
            "Failed to write report {}: {}",
            config.report_path.display(),
            e
        ))
    })?;

    let stats = output.stats;
    info!(
        "Summary - queries: {}, matched: {}, avg recommendations: {:.2}, elapsed: {:.2}s",
        stats.total_queries,
        stats.matched_queries,
        stats.avg_recommendations(),
        started.elapsed().as_secs_f64()
    );

    Ok(WorkflowResult {
        stats,
        output_path: config.output_path.clone(),
        report_path: config.report_path.clone(),
    })
}

fn progress_bar(chunks: u64) -> Result<ProgressBar> {
    let pb = ProgressBar::new(chunks);
    let style = ProgressStyle::default_bar()
        .template("[{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} batches {msg}")
        .map_err(|e| anyhow::anyhow!("Invalid progress template: {}", e))?
        .progress_chars("#>-");
    pb.set_style(style);
    Ok(pb)
}
