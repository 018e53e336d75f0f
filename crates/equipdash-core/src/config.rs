use std::path::PathBuf;
use std::time::Duration;

#[derive(Debug, Clone)]
pub struct DashboardConfig {
    pub base_url: String,
    pub request_timeout: Duration,
    pub connect_timeout: Duration,
    pub report_dir: PathBuf,
    pub report_retention_days: u64,
}

impl Default for DashboardConfig {
    fn default() -> Self {
        Self {
            base_url: "http://127.0.0.1:8000/api".to_string(),
            request_timeout: Duration::from_secs(30),
            connect_timeout: Duration::from_secs(5),
            report_dir: PathBuf::from("./reports"),
            report_retention_days: 30,
        }
    }
}
