use crate::error::CosMatchError;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Environment variable prefix for configuration overrides (`COSMATCH_TOP_N`, ...)
pub const ENV_PREFIX: &str = "COSMATCH";

/// Environment variable naming an optional configuration file
pub const CONFIG_FILE_ENV: &str = "COSMATCH_CONFIG";

/// CosMatch application configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    /// Query embedding container path
    pub query_path: PathBuf,

    /// Candidate embedding container path
    pub candidate_path: PathBuf,

    /// Match result output path (JSON)
    pub output_path: PathBuf,

    /// Task report output path (Markdown)
    pub report_path: PathBuf,

    /// Maximum number of recommendations per query
    pub top_n: usize,

    /// Minimum cosine similarity for a candidate to be kept
    pub threshold: f32,

    /// Number of queries scored per chunk
    pub batch_size: usize,

    /// Score chunks on the rayon thread pool
    pub parallel: bool,

    /// Log directory
    pub log_dir: PathBuf,

    /// Log level
    pub log_level: String,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            query_path: PathBuf::from("./tmp/query.json"),
            candidate_path: PathBuf::from("./tmp/candidate.json"),
            output_path: PathBuf::from("./tmp/result.json"),
            report_path: PathBuf::from("./tmp/task_report.md"),
            top_n: 3,
            threshold: 0.8,
            batch_size: 1000,
            parallel: false,
            log_dir: PathBuf::from("./tmp/log"),
            log_level: "info".to_string(),
        }
    }
}

impl AppConfig {
    /// Load configuration from defaults, an optional file, environment variables and .env file
    ///
    /// The file path is taken from `config_file`, falling back to `COSMATCH_CONFIG`.
    pub fn load(config_file: Option<&Path>) -> Result<Self, CosMatchError> {
        // Load .env file (ignore if not exists)
        let _ = dotenv::dotenv();

        let from_env = Self::get_env_path(CONFIG_FILE_ENV);
        let config_file = config_file.or(from_env.as_deref());

        Self::load_layers(config_file, ENV_PREFIX)
    }

    /// Build the layered configuration: defaults, then file, then `<prefix>_*` variables
    fn load_layers(config_file: Option<&Path>, env_prefix: &str) -> Result<Self, CosMatchError> {
        let defaults = Self::default();

        let mut builder = ::config::Config::builder()
            .set_default("query_path", path_str(&defaults.query_path))?
            .set_default("candidate_path", path_str(&defaults.candidate_path))?
            .set_default("output_path", path_str(&defaults.output_path))?
            .set_default("report_path", path_str(&defaults.report_path))?
            .set_default("top_n", defaults.top_n as i64)?
            .set_default("threshold", f64::from(defaults.threshold))?
            .set_default("batch_size", defaults.batch_size as i64)?
            .set_default("parallel", defaults.parallel)?
            .set_default("log_dir", path_str(&defaults.log_dir))?
            .set_default("log_level", defaults.log_level.as_str())?;

        if let Some(path) = config_file {
            if !path.exists() {
                return Err(CosMatchError::config(format!(
                    "Config file not found: {}",
                    path.display()
                )));
            }
            builder = builder.add_source(::config::File::from(path).required(true));
        }

        let config: Self = builder
            .add_source(::config::Environment::with_prefix(env_prefix))
            .build()?
            .try_deserialize()?;

        Ok(config)
    }

    /// Get PathBuf from environment variable
    fn get_env_path(key: &str) -> Option<PathBuf> {
        std::env::var(key).ok().map(PathBuf::from)
    }

    /// Ensure output and log directories exist, create if not
    pub fn ensure_directories(&self) -> Result<(), CosMatchError> {
        let dirs = [
            self.output_path.parent(),
            self.report_path.parent(),
            Some(self.log_dir.as_path()),
        ];

        for dir in dirs.into_iter().flatten() {
            if dir.as_os_str().is_empty() || dir.exists() {
                continue;
            }
            std::fs::create_dir_all(dir).map_err(|e| {
                CosMatchError::config(format!(
                    "Failed to create directory {}: {}",
                    dir.display(),
                    e
                ))
            })?;
        }

        Ok(())
    }

    /// Validate configuration
    pub fn validate(&self) -> Result<(), CosMatchError> {
        if self.top_n == 0 {
            return Err(CosMatchError::config("top_n must be at least 1"));
        }

        if self.batch_size == 0 {
            return Err(CosMatchError::config("batch_size must be at least 1"));
        }

        if self.threshold.is_nan() {
            return Err(CosMatchError::config("threshold must be a number"));
        }

        if self.log_level.trim().is_empty() {
            return Err(CosMatchError::config("Log level cannot be empty"));
        }

        Ok(())
    }
}

fn path_str(path: &Path) -> String {
    path.to_string_lossy().into_owned()
}
