use anyhow::Context;
use skinledger::config::Config;
use skinledger::orchestration::{build_sources, run};

#[tokio::main]
async fn main() {
    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive(tracing_subscriber::filter::LevelFilter::INFO.into()),
        )
        .init();

    if let Err(e) = try_main().await {
        eprintln!("Error: {:#}", e);
        std::process::exit(1);
    }
}

async fn try_main() -> anyhow::Result<()> {
    let config = Config::from_env().context("loading configuration")?;
    let secrets = config.load_secrets().context("loading secrets")?;

    let sources = build_sources(&config, &secrets);
    if sources.is_empty() {
        tracing::warn!("No marketplaces enabled; the report will be empty");
    }

    let report = run(&config, &sources).await?;
    for file in &report.files {
        tracing::info!("Report written to {}", file.display());
    }
    Ok(())
}
