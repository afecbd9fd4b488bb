use chrono::{DateTime, Duration, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::typedid::{TypedId, TypedIdMarker};

pub mod db;
pub mod endpoints;
pub mod manager;
pub mod publisher;
pub mod validation;
pub use endpoints::*;

pub type CampaignId = TypedId<Campaign>;

/// The platform counts money in millionths of the account currency.
pub const MICROS_PER_UNIT: i64 = 1_000_000;

/// Converts a whole-unit amount into platform micros, or `None` if it would
/// not fit.
pub fn to_micros(amount: i64) -> Option<i64> {
    amount.checked_mul(MICROS_PER_UNIT)
}

#[derive(Copy, Clone, Debug, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum CampaignStatus {
    Draft,
    Published,
}

#[derive(Clone, Debug, PartialEq, Deserialize, Serialize)]
pub struct Campaign {
    #[serde(rename = "_id")]
    pub id: CampaignId,
    pub name: String,
    pub objective: String,
    pub campaign_type: String,
    pub daily_budget: i64,
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
    pub status: CampaignStatus,
    pub remote_budget_resource: Option<String>,
    pub remote_campaign_id: Option<String>,
    pub ad_group_name: String,
    pub ad_headline: String,
    pub ad_description: String,
    pub asset_url: Option<String>,
    pub publish_claim: Option<PublishClaim>,
    pub revision: i64,
    #[serde(with = "mongodb::bson::serde_helpers::chrono_datetime_as_bson_datetime")]
    pub created_at: DateTime<Utc>,
    #[serde(with = "mongodb::bson::serde_helpers::chrono_datetime_as_bson_datetime")]
    pub modified_at: DateTime<Utc>,
}

impl Campaign {
    pub fn is_draft(&self) -> bool {
        self.status == CampaignStatus::Draft
    }

    /// Display name of the budget backing this campaign on the platform. It
    /// only depends on immutable fields so a retried publish finds the same
    /// budget again.
    pub fn budget_name(&self) -> String {
        format!("{} Budget {}", self.name, self.id)
    }

    pub fn active_claim(&self, now: DateTime<Utc>) -> Option<&PublishClaim> {
        self.publish_claim
            .as_ref()
            .filter(|claim| claim.expires_at > now)
    }
}

impl TypedIdMarker for Campaign {
    fn tag() -> &'static str {
        "CMP"
    }
}

/// Lease taken on a draft while one publish run talks to the platform.
#[derive(Clone, Debug, PartialEq, Eq, Deserialize, Serialize)]
pub struct PublishClaim {
    pub token: String,
    #[serde(with = "mongodb::bson::serde_helpers::chrono_datetime_as_bson_datetime")]
    pub expires_at: DateTime<Utc>,
}

impl PublishClaim {
    pub fn new(now: DateTime<Utc>, lease: Duration) -> PublishClaim {
        PublishClaim {
            token: Uuid::new_v4().to_string(),
            expires_at: now
                .checked_add_signed(lease)
                .unwrap_or(DateTime::<Utc>::MAX_UTC),
        }
    }
}
