use anyhow::Result;
use tracing_subscriber::EnvFilter;

use summary_assistant::backend::RefineClient;
use summary_assistant::{run_server, AppConfig};

#[tokio::main]
async fn main() -> Result<()> {
    init_tracing();

    let config = AppConfig::from_env();
    let client = RefineClient::new(config.refine_base_url.clone());

    run_server(config, client).await
}

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt().with_env_filter(filter).init();
}
