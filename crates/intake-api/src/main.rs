//! Binary entrypoint for the intake API server.
use intake_api::{run, ServiceConfig};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt().with_env_filter(filter).init();

    // INTAKE_ADDR and INTAKE_CONFIG override the defaults
    run(ServiceConfig::from_env()).await
}
