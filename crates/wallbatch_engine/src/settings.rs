use std::time::Duration;

use wallbatch_core::PollSettings;

pub const DEFAULT_BASE_URL: &str = "http://localhost:3001/api/";

#[derive(Debug, Clone)]
pub struct EngineSettings {
    /// Service root; submit and status paths are joined onto it.
    pub base_url: String,
    pub connect_timeout: Duration,
    pub request_timeout: Duration,
    pub poll: PollSettings,
}

impl Default for EngineSettings {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_BASE_URL.to_string(),
            connect_timeout: Duration::from_secs(10),
            // Synchronous batches can run for minutes before replying.
            request_timeout: Duration::from_secs(300),
            poll: PollSettings::default(),
        }
    }
}
