use std::collections::HashMap;

use async_trait::async_trait;
use chrono::Utc;
use futures::TryStreamExt;
use mongodb::options::FindOptions;
use mongodb::{bson, Database};
use tokio::sync::RwLock;

use crate::database::MongoCampaignStore;
use crate::error::Error;

use super::{Campaign, CampaignId};

const CAMPAIGNS: &str = "campaigns";

pub async fn initialize(db: &Database) -> Result<(), Error> {
    db.run_command(
        bson::doc! {
            "createIndexes": CAMPAIGNS,
            "indexes": [
                { "key": { "created_at": -1 }, "name": "by_created_at" },
            ]
        },
        None,
    )
    .await?;

    Ok(())
}

#[async_trait]
pub trait CampaignStore: Send + Sync {
    async fn insert_campaign(&self, campaign: &Campaign) -> Result<(), Error>;

    /// All campaigns, most recently created first.
    async fn fetch_campaigns(&self) -> Result<Vec<Campaign>, Error>;

    async fn fetch_campaign_by_id(&self, campaign_id: CampaignId)
        -> Result<Option<Campaign>, Error>;

    /// Replaces the stored record with `campaign` if nobody else wrote it
    /// since it was read, and returns it with the revision bumped.
    async fn update_campaign(&self, campaign: Campaign) -> Result<Campaign, Error>;
}

fn next_revision(mut campaign: Campaign) -> Campaign {
    campaign.revision += 1;
    campaign.modified_at = Utc::now();
    campaign
}

#[async_trait]
impl CampaignStore for MongoCampaignStore {
    #[tracing::instrument(skip(self))]
    async fn insert_campaign(&self, campaign: &Campaign) -> Result<(), Error> {
        self.insert_one(campaign, None).await?;

        Ok(())
    }

    #[tracing::instrument(skip(self))]
    async fn fetch_campaigns(&self) -> Result<Vec<Campaign>, Error> {
        let options = FindOptions::builder()
            .sort(bson::doc! { "created_at": -1 })
            .build();

        let campaigns: Vec<Campaign> = self
            .find(bson::doc! {}, options)
            .await?
            .try_collect()
            .await?;

        Ok(campaigns)
    }

    #[tracing::instrument(skip(self))]
    async fn fetch_campaign_by_id(
        &self,
        campaign_id: CampaignId,
    ) -> Result<Option<Campaign>, Error> {
        let campaign = self
            .find_one(bson::doc! { "_id": campaign_id }, None)
            .await?;

        Ok(campaign)
    }

    #[tracing::instrument(skip(self))]
    async fn update_campaign(&self, campaign: Campaign) -> Result<Campaign, Error> {
        let old_revision = campaign.revision;
        let campaign = next_revision(campaign);

        let result = self
            .replace_one(
                bson::doc! { "_id": campaign.id, "revision": old_revision },
                &campaign,
                None,
            )
            .await?;

        if result.matched_count == 0 {
            return Err(Error::ConcurrentModificationDetected);
        }

        Ok(campaign)
    }
}

/// Process-local store for development runs and tests. Offers the same
/// compare-and-set guarantees as the mongo store within one process.
#[derive(Debug, Default)]
pub struct MemoryCampaignStore {
    campaigns: RwLock<HashMap<CampaignId, Campaign>>,
}

impl MemoryCampaignStore {
    pub fn new() -> MemoryCampaignStore {
        MemoryCampaignStore::default()
    }
}

#[async_trait]
impl CampaignStore for MemoryCampaignStore {
    #[tracing::instrument(skip(self))]
    async fn insert_campaign(&self, campaign: &Campaign) -> Result<(), Error> {
        let mut campaigns = self.campaigns.write().await;
        if campaigns.contains_key(&campaign.id) {
            return Err(Error::ExistentialState(format!(
                "campaign {} inserted twice",
                campaign.id
            )));
        }
        campaigns.insert(campaign.id, campaign.clone());

        Ok(())
    }

    #[tracing::instrument(skip(self))]
    async fn fetch_campaigns(&self) -> Result<Vec<Campaign>, Error> {
        let mut campaigns: Vec<Campaign> = self.campaigns.read().await.values().cloned().collect();
        campaigns.sort_by(|a, b| b.created_at.cmp(&a.created_at));

        Ok(campaigns)
    }

    #[tracing::instrument(skip(self))]
    async fn fetch_campaign_by_id(
        &self,
        campaign_id: CampaignId,
    ) -> Result<Option<Campaign>, Error> {
        Ok(self.campaigns.read().await.get(&campaign_id).cloned())
    }

    #[tracing::instrument(skip(self))]
    async fn update_campaign(&self, campaign: Campaign) -> Result<Campaign, Error> {
        let mut campaigns = self.campaigns.write().await;
        let stored = campaigns
            .get_mut(&campaign.id)
            .ok_or(Error::ConcurrentModificationDetected)?;

        if stored.revision != campaign.revision {
            return Err(Error::ConcurrentModificationDetected);
        }

        let campaign = next_revision(campaign);
        *stored = campaign.clone();

        Ok(campaign)
    }
}
