use std::sync::Arc;

use campaign_publisher::config::AppConfig;
use campaign_publisher::gateway::{GoogleAdsConfig, GoogleAdsGateway};
use campaign_publisher::Error;
use tracing_subscriber::fmt::format::FmtSpan;
use tracing_subscriber::EnvFilter;

#[actix_web::main]
async fn main() -> Result<(), Error> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("campaign_publisher=debug,info")),
        )
        .with_span_events(FmtSpan::NEW)
        .compact()
        .init();

    let config = AppConfig::load()?;

    // without credentials nothing can be published, so refuse to start
    let gateway = GoogleAdsGateway::new(GoogleAdsConfig::from_env()?)?;

    campaign_publisher::run(config, Arc::new(gateway)).await
}
