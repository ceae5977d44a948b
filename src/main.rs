use anyhow::Result;

#[tokio::main]
async fn main() -> Result<()> {
    // Diagnostics go to stderr; stdout carries the startup report
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .init();
    memviz::cli::run_cli().await
}
