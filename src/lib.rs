use std::sync::Arc;

use actix_web::body::MessageBody;
use actix_web::dev::{ServiceFactory, ServiceRequest, ServiceResponse};
use actix_web::middleware::{NormalizePath, TrailingSlash};
use actix_web::web::{self, Data, JsonConfig, PathConfig};
use actix_web::{App, HttpResponse, HttpServer, ResponseError};
use tracing::info;
use tracing_actix_web::TracingLogger;

pub mod campaign;
pub mod config;
pub mod database;
pub mod error;
pub mod gateway;
pub mod typedid;
pub mod violations;

pub use campaign::publisher::Publisher;
pub use campaign::{CampaignBody, CreatedCampaignBody, PublishedCampaignBody};
pub use error::Error;

use crate::config::AppConfig;
use crate::database::Database;
use crate::gateway::AdsGateway;

pub async fn path_does_not_exist() -> HttpResponse {
    Error::PathDoesNotExist.error_response()
}

/// Builds the application with its collaborators attached.
pub fn app(
    db: Data<dyn Database>,
    publisher: Data<Publisher>,
) -> App<
    impl ServiceFactory<
        ServiceRequest,
        Config = (),
        Response = ServiceResponse<impl MessageBody>,
        Error = actix_web::Error,
        InitError = (),
    >,
> {
    App::new()
        .app_data(JsonConfig::default().error_handler(|err, _req| {
            // format json errors with custom format
            Error::InvalidJson(err).into()
        }))
        .app_data(PathConfig::default().error_handler(|err, _req| {
            // format path errors with custom format
            Error::InvalidPath(err).into()
        }))
        .app_data(db)
        .app_data(publisher)
        .wrap(NormalizePath::new(TrailingSlash::Trim))
        .wrap(TracingLogger::default())
        .service(campaign::endpoints::create_campaign)
        .service(campaign::endpoints::get_campaigns)
        .service(campaign::endpoints::get_campaign_by_id)
        .service(campaign::endpoints::publish_campaign)
        .service(campaign::endpoints::health_check)
        .default_service(web::to(path_does_not_exist))
}

/// Connects to the configured store and serves until shutdown.
pub async fn run(config: AppConfig, gateway: Arc<dyn AdsGateway>) -> Result<(), Error> {
    let db = database::connect(&config.database).await?;
    let publisher = Publisher::new(db.clone(), gateway, config.publish.claim_lease());

    let db = Data::from(db);
    let publisher = Data::new(publisher);

    info!(
        host = %config.server.host,
        port = config.server.port,
        "starting campaign publisher"
    );

    HttpServer::new(move || app(db.clone(), publisher.clone()))
        .bind((config.server.host.as_str(), config.server.port))?
        .run()
        .await?;

    Ok(())
}
