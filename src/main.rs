//
// main.rs
// dicom-headers
//
// Tokio entry point that initializes logging and hands off execution to the CLI layer.
//

use dicom_headers::cli;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    cli::run().await
}
