use std::env;

#[derive(Clone, Debug)]
pub struct AppConfig {
    pub bind_addr: String,
    /// Base URL of the summarization service exposing the `/chat` and
    /// `/answer-question` refinement endpoints.
    pub refine_base_url: String,
}

impl AppConfig {
    pub fn from_env() -> Self {
        Self {
            bind_addr: env::var("SUMMARY_ASSISTANT_BIND")
                .unwrap_or_else(|_| "127.0.0.1:8080".to_string()),
            refine_base_url: env::var("REFINE_API_BASE_URL")
                .unwrap_or_else(|_| "http://127.0.0.1:8000".to_string()),
        }
    }
}
