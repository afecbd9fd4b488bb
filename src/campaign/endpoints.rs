use actix_web::web::{Data, Json, Path};
use actix_web::{get, post, HttpResponse};
use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

use crate::database::Database;
use crate::error::Error;

use super::publisher::Publisher;
use super::validation::{self, CreateCampaignBody};
use super::{manager, Campaign, CampaignId, CampaignStatus};

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct CampaignBody {
    pub id: CampaignId,
    pub name: String,
    pub objective: String,
    pub campaign_type: String,
    pub daily_budget: i64,
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
    pub status: CampaignStatus,
    pub remote_campaign_id: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl CampaignBody {
    pub fn render(campaign: Campaign) -> CampaignBody {
        CampaignBody {
            id: campaign.id,
            name: campaign.name,
            objective: campaign.objective,
            campaign_type: campaign.campaign_type,
            daily_budget: campaign.daily_budget,
            start_date: campaign.start_date,
            end_date: campaign.end_date,
            status: campaign.status,
            remote_campaign_id: campaign.remote_campaign_id,
            created_at: campaign.created_at,
        }
    }
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct CreatedCampaignBody {
    pub id: CampaignId,
    pub status: CampaignStatus,
    pub message: String,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct PublishedCampaignBody {
    pub message: String,
    pub remote_campaign_id: String,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct MessageBody {
    pub message: String,
}

#[post("/api/campaigns")]
#[tracing::instrument(skip(db))]
pub async fn create_campaign(
    db: Data<dyn Database>,
    body: Json<CreateCampaignBody>,
) -> Result<HttpResponse, Error> {
    let new = validation::validate(body.into_inner())?;

    let campaign = manager::create_campaign(&**db, new).await?;

    Ok(HttpResponse::Created().json(CreatedCampaignBody {
        id: campaign.id,
        status: campaign.status,
        message: "Campaign created".to_string(),
    }))
}

#[get("/api/campaigns")]
#[tracing::instrument(skip(db))]
pub async fn get_campaigns(db: Data<dyn Database>) -> Result<Json<Vec<CampaignBody>>, Error> {
    let campaigns = manager::get_campaigns(&**db).await?;

    let body = campaigns.into_iter().map(CampaignBody::render).collect();

    Ok(Json(body))
}

#[get("/api/campaigns/{campaign_id}")]
#[tracing::instrument(skip(db))]
pub async fn get_campaign_by_id(
    db: Data<dyn Database>,
    params: Path<CampaignId>,
) -> Result<Json<CampaignBody>, Error> {
    let campaign_id = params.into_inner();

    let campaign = manager::get_campaign_by_id(&**db, campaign_id).await?;

    Ok(Json(CampaignBody::render(campaign)))
}

#[post("/api/campaigns/{campaign_id}/publish")]
#[tracing::instrument(skip(publisher))]
pub async fn publish_campaign(
    publisher: Data<Publisher>,
    params: Path<CampaignId>,
) -> Result<Json<PublishedCampaignBody>, Error> {
    let campaign_id = params.into_inner();

    let remote_campaign_id = publisher.publish(campaign_id).await?;

    Ok(Json(PublishedCampaignBody {
        message: "Campaign published".to_string(),
        remote_campaign_id,
    }))
}

#[get("/health")]
pub async fn health_check() -> Json<MessageBody> {
    Json(MessageBody {
        message: "Campaigns service running".to_string(),
    })
}
