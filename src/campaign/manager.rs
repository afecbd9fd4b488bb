use chrono::Utc;
use tracing::info;

use crate::database::Database;
use crate::error::Error;

use super::validation::NewCampaign;
use super::{Campaign, CampaignId, CampaignStatus};

#[tracing::instrument(skip(db))]
pub async fn create_campaign(db: &dyn Database, new: NewCampaign) -> Result<Campaign, Error> {
    let now = Utc::now();
    let campaign = Campaign {
        id: CampaignId::new(),
        name: new.name,
        objective: new.objective,
        campaign_type: new.campaign_type,
        daily_budget: new.daily_budget,
        start_date: new.start_date,
        end_date: new.end_date,
        status: CampaignStatus::Draft,
        remote_budget_resource: None,
        remote_campaign_id: None,
        ad_group_name: new.ad_group_name,
        ad_headline: new.ad_headline,
        ad_description: new.ad_description,
        asset_url: new.asset_url,
        publish_claim: None,
        revision: 0,
        created_at: now,
        modified_at: now,
    };

    db.campaigns().insert_campaign(&campaign).await?;
    info!(campaign_id = %campaign.id, "created draft campaign");

    Ok(campaign)
}

#[tracing::instrument(skip(db))]
pub async fn get_campaigns(db: &dyn Database) -> Result<Vec<Campaign>, Error> {
    let campaigns = db.campaigns().fetch_campaigns().await?;

    Ok(campaigns)
}

#[tracing::instrument(skip(db))]
pub async fn get_campaign_by_id(
    db: &dyn Database,
    campaign_id: CampaignId,
) -> Result<Campaign, Error> {
    let campaign = db
        .campaigns()
        .fetch_campaign_by_id(campaign_id)
        .await?
        .ok_or(Error::CampaignDoesNotExist { campaign_id })?;

    Ok(campaign)
}
