//! Publishing a draft to the ads platform.
//!
//! A publish run creates two remote resources, a budget and then a campaign
//! that spends from it. Each result is written back to the record as soon as
//! it exists, so a run that fails half way can be repeated: the retry finds
//! `remote_budget_resource` already set and only creates the campaign.
//!
//! Runs on the same campaign are serialized by a [`PublishClaim`] written with
//! a compare-and-set on the record's revision before the first remote call.

use std::sync::Arc;

use chrono::{Duration, Utc};
use tracing::{error, info, warn};

use crate::database::Database;
use crate::error::Error;
use crate::gateway::{AdsGateway, CampaignSpec, GatewayError, ResourceName};

use super::{to_micros, Campaign, CampaignId, CampaignStatus, PublishClaim};

pub struct Publisher {
    db: Arc<dyn Database>,
    gateway: Arc<dyn AdsGateway>,
    claim_lease: Duration,
}

impl Publisher {
    pub fn new(
        db: Arc<dyn Database>,
        gateway: Arc<dyn AdsGateway>,
        claim_lease: Duration,
    ) -> Publisher {
        Publisher {
            db,
            gateway,
            claim_lease,
        }
    }

    /// Publishes the draft and returns the platform's id for the new campaign.
    #[tracing::instrument(skip(self))]
    pub async fn publish(&self, campaign_id: CampaignId) -> Result<String, Error> {
        let mut campaign = self.claim(campaign_id).await?;

        match self.run(&mut campaign).await {
            Ok(remote_campaign_id) => {
                info!(%remote_campaign_id, "published campaign");
                Ok(remote_campaign_id)
            }
            Err(err) => {
                self.release(campaign).await;
                Err(err)
            }
        }
    }

    async fn claim(&self, campaign_id: CampaignId) -> Result<Campaign, Error> {
        let now = Utc::now();
        let mut campaign = self
            .db
            .campaigns()
            .fetch_campaign_by_id(campaign_id)
            .await?
            .ok_or(Error::CampaignDoesNotExist { campaign_id })?;

        if !campaign.is_draft() {
            return Err(Error::CampaignAlreadyPublished { campaign_id });
        }

        if campaign.active_claim(now).is_some() {
            return Err(Error::PublishAlreadyInProgress { campaign_id });
        }

        if let Some(expired) = &campaign.publish_claim {
            warn!(expired_at = %expired.expires_at, "taking over lapsed publish claim");
        }

        campaign.publish_claim = Some(PublishClaim::new(now, self.claim_lease));

        match self.db.campaigns().update_campaign(campaign).await {
            Err(Error::ConcurrentModificationDetected) => {
                Err(Error::PublishAlreadyInProgress { campaign_id })
            }
            result => result,
        }
    }

    /// Drives the remote calls. `campaign` always holds the last state that
    /// was successfully written.
    async fn run(&self, campaign: &mut Campaign) -> Result<String, Error> {
        let budget = match campaign.remote_budget_resource.clone() {
            Some(budget) => {
                info!(%budget, "resuming publish with existing budget");
                ResourceName::new(budget)
            }
            None => {
                let budget = self.create_budget(campaign).await?;

                let mut updated = campaign.clone();
                updated.remote_budget_resource = Some(budget.to_string());
                *campaign = self.db.campaigns().update_campaign(updated).await?;

                budget
            }
        };

        let spec = CampaignSpec::new(campaign.name.clone(), budget);
        let remote_campaign = self
            .gateway
            .create_campaign(&spec)
            .await
            .map_err(|err| remote_failure(campaign.id, "create campaign", err))?;

        let remote_campaign_id = match remote_campaign.id() {
            Some(id) => id.to_string(),
            None => {
                error!(%remote_campaign, "remote campaign created with an unrecognized resource name");
                return Err(GatewayError::MalformedResponse(format!(
                    "unexpected campaign resource name: {}",
                    remote_campaign
                ))
                .into());
            }
        };

        let mut updated = campaign.clone();
        updated.status = CampaignStatus::Published;
        updated.remote_campaign_id = Some(remote_campaign_id.clone());
        updated.publish_claim = None;

        *campaign = self
            .db
            .campaigns()
            .update_campaign(updated)
            .await
            .map_err(|err| {
                error!(%remote_campaign, error = %err, "remote campaign created but not recorded");
                err
            })?;

        Ok(remote_campaign_id)
    }

    async fn create_budget(&self, campaign: &Campaign) -> Result<ResourceName, Error> {
        let amount_micros = to_micros(campaign.daily_budget).ok_or_else(|| {
            Error::ExistentialState(format!(
                "daily budget {} of campaign {} does not fit in micros",
                campaign.daily_budget, campaign.id
            ))
        })?;

        let budget = self
            .gateway
            .ensure_budget(&campaign.budget_name(), amount_micros)
            .await
            .map_err(|err| remote_failure(campaign.id, "ensure budget", err))?;

        info!(%budget, amount_micros, "campaign budget ready");

        Ok(budget)
    }

    async fn release(&self, mut campaign: Campaign) {
        campaign.publish_claim = None;

        if let Err(err) = self.db.campaigns().update_campaign(campaign).await {
            warn!(error = %err, "failed to release publish claim, it will lapse on its own");
        }
    }
}

fn remote_failure(campaign_id: CampaignId, step: &'static str, err: GatewayError) -> Error {
    error!(%campaign_id, step, error = %err, "ads platform call failed");
    Error::RemoteGatewayFailed(err)
}
