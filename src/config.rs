use dotenv::dotenv;
use std::env;
use std::path::PathBuf;

pub const API_URL_ENV_VAR: &str = "MESS_PLANNER_API_URL";
pub const DATA_DIR_ENV_VAR: &str = "MESS_PLANNER_DATA_DIR";

const DEFAULT_API_URL: &str = "http://localhost:8000";
const DEFAULT_DATA_DIR: &str = ".mess_planner";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlannerConfig {
    pub api_base_url: String,
    pub data_dir: PathBuf,
}

impl PlannerConfig {
    /// Command-line values win over the environment (including `.env`), which
    /// wins over the built-in defaults.
    pub fn resolve(api_url: Option<String>, data_dir: Option<PathBuf>) -> Self {
        dotenv().ok();
        Self::from_sources(
            api_url,
            data_dir,
            env::var(API_URL_ENV_VAR).ok(),
            env::var(DATA_DIR_ENV_VAR).ok(),
        )
    }

    fn from_sources(
        cli_api_url: Option<String>,
        cli_data_dir: Option<PathBuf>,
        env_api_url: Option<String>,
        env_data_dir: Option<String>,
    ) -> Self {
        let api_base_url = cli_api_url
            .or(env_api_url)
            .filter(|url| !url.trim().is_empty())
            .unwrap_or_else(|| DEFAULT_API_URL.to_string());
        let data_dir = cli_data_dir
            .or_else(|| env_data_dir.filter(|d| !d.trim().is_empty()).map(PathBuf::from))
            .unwrap_or_else(|| PathBuf::from(DEFAULT_DATA_DIR));

        Self {
            api_base_url: api_base_url.trim().trim_end_matches('/').to_string(),
            data_dir,
        }
    }
}
