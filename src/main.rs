use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() {
    // stdout carries the JSON protocol.
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    tracing::info!("pomocycle starting");
    if let Err(error) = pomocycle::run().await {
        tracing::error!(error = %error, "pomocycle exited with error");
        std::process::exit(1);
    }
    tracing::info!("pomocycle shut down cleanly");
}
