// Check that one fund's detail page is reachable and parseable.

use anyhow::Result;
use navscraper::{
    config::Settings,
    detail::{browser_backed_client, detail_url, DetailClient},
    extract::first_table,
};
use std::env;
use tracing::{error, info, warn};
use tracing_subscriber::{fmt, EnvFilter};

const PREVIEW_CHARS: usize = 500;

#[tokio::main]
async fn main() -> Result<()> {
    fmt::Subscriber::builder()
        .with_env_filter(EnvFilter::from_default_env().add_directive("info".parse()?))
        .with_target(false)
        .init();

    let symbol = env::args().nth(1).unwrap_or_else(|| "C30MF".to_string());
    let settings = Settings::default();
    let url = detail_url(&settings.detail_base_url, &symbol)?;
    info!(%url, "testing URL");

    let client = browser_backed_client(&settings)?;
    let resp = match client.get(&url).await {
        Ok(resp) => resp,
        Err(e) => {
            error!(error = %format!("{:#}", e), "request failed");
            return Ok(());
        }
    };
    info!(status = resp.status, "response");
    if resp.status != 200 {
        warn!("failed to access URL");
        return Ok(());
    }

    let preview: String = resp.body.chars().take(PREVIEW_CHARS).collect();
    info!(length = resp.body.len(), "response body");
    match first_table(&resp.body) {
        Some(table) => info!(
            columns = ?table.headers,
            rows = table.len(),
            "table found:\n{}",
            preview
        ),
        None => warn!("response received but no table found:\n{}", preview),
    }
    Ok(())
}
