use cosmatch_common::{CosMatchError, Result};
use cosmatch_matcher::{Identifier, QueryResult};
use serde::Serialize;
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;
use tracing::info;

/// Decimal places kept for scores in the result file
const SCORE_DECIMALS: i32 = 4;

#[derive(Debug, Serialize)]
struct ResultRecord<'a> {
    query: &'a Identifier,
    recommendations: Vec<Recommendation<'a>>,
}

#[derive(Debug, Serialize)]
struct Recommendation<'a> {
    candidate: &'a Identifier,
    score: f64,
}

fn round_score(score: f32) -> f64 {
    let scale = 10f64.powi(SCORE_DECIMALS);
    (f64::from(score) * scale).round() / scale
}

fn to_records(results: &[QueryResult]) -> Vec<ResultRecord<'_>> {
    results
        .iter()
        .map(|r| ResultRecord {
            query: &r.query,
            recommendations: r
                .recommendations
                .iter()
                .map(|m| Recommendation {
                    candidate: &m.candidate,
                    score: round_score(m.score),
                })
                .collect(),
        })
        .collect()
}

/// Write results as pretty-printed JSON, returning the file size in bytes
pub fn write_results(path: &Path, results: &[QueryResult]) -> Result<u64> {
    let file = File::create(path).map_err(|e| {
        CosMatchError::file_system(format!("Failed to create {}: {}", path.display(), e))
    })?;

    let mut writer = BufWriter::new(file);
    serde_json::to_writer_pretty(&mut writer, &to_records(results))?;
    writer.flush()?;
    drop(writer);

    let size = std::fs::metadata(path)?.len();
    info!("Results saved: {} ({:.2} KB)", path.display(), size as f64 / 1024.0);

    Ok(size)
}
