use std::fmt::{Debug, Display};

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

pub mod google;

pub use google::{GoogleAdsConfig, GoogleAdsGateway};

/// The ads platform side of publishing. Both calls are expected to be safe to
/// repeat: the publisher may call them again after a partial failure.
#[async_trait]
pub trait AdsGateway: Send + Sync {
    /// Returns the budget named `name`, creating it with a daily amount of
    /// `amount_micros` if the account does not have one yet.
    async fn ensure_budget(
        &self,
        name: &str,
        amount_micros: i64,
    ) -> Result<ResourceName, GatewayError>;

    async fn create_campaign(&self, spec: &CampaignSpec) -> Result<ResourceName, GatewayError>;
}

/// A platform resource path such as `customers/123/campaignBudgets/456`.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ResourceName(String);

impl ResourceName {
    pub fn new(name: impl Into<String>) -> ResourceName {
        ResourceName(name.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// The platform-assigned id, i.e. the last path segment.
    pub fn id(&self) -> Option<&str> {
        self.0
            .rsplit('/')
            .next()
            .filter(|id| !id.is_empty() && *id != self.0)
    }
}

impl Display for ResourceName {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> Result<(), std::fmt::Error> {
        f.write_str(&self.0)
    }
}

#[derive(Copy, Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RemoteCampaignStatus {
    Paused,
}

#[derive(Copy, Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum AdvertisingChannel {
    Search,
}

#[derive(Copy, Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum EuPoliticalAdvertising {
    DoesNotContainEuPoliticalAdvertising,
}

/// Everything the platform needs to create a campaign. Built once per publish
/// and never mutated.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CampaignSpec {
    name: String,
    budget: ResourceName,
    status: RemoteCampaignStatus,
    channel: AdvertisingChannel,
    enhanced_cpc_enabled: bool,
    eu_political_advertising: EuPoliticalAdvertising,
}

impl CampaignSpec {
    /// New campaigns always start paused on the search network so nothing
    /// spends money until an operator enables it on the platform.
    pub fn new(name: impl Into<String>, budget: ResourceName) -> CampaignSpec {
        CampaignSpec {
            name: name.into(),
            budget,
            status: RemoteCampaignStatus::Paused,
            channel: AdvertisingChannel::Search,
            enhanced_cpc_enabled: false,
            eu_political_advertising: EuPoliticalAdvertising::DoesNotContainEuPoliticalAdvertising,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn budget(&self) -> &ResourceName {
        &self.budget
    }

    pub fn status(&self) -> RemoteCampaignStatus {
        self.status
    }

    pub fn channel(&self) -> AdvertisingChannel {
        self.channel
    }

    pub fn enhanced_cpc_enabled(&self) -> bool {
        self.enhanced_cpc_enabled
    }

    pub fn eu_political_advertising(&self) -> EuPoliticalAdvertising {
        self.eu_political_advertising
    }
}

#[derive(Debug)]
pub enum GatewayError {
    /// A credential or setting needed to talk to the platform is absent or malformed.
    Configuration(String),
    /// The request never produced a response.
    Transport(reqwest::Error),
    /// The OAuth token endpoint refused the refresh token.
    Authentication { status: u16, body: String },
    /// The platform answered with a non-success status.
    Api { status: u16, body: String },
    /// The platform answered successfully but not with what was asked for.
    MalformedResponse(String),
}

impl Display for GatewayError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> Result<(), std::fmt::Error> {
        match self {
            GatewayError::Configuration(reason) => write!(f, "invalid configuration: {}", reason),
            GatewayError::Transport(err) => write!(f, "transport failure: {}", err),
            GatewayError::Authentication { status, body } => {
                write!(f, "authentication failed with status {}: {}", status, body)
            }
            GatewayError::Api { status, body } => {
                write!(f, "platform returned status {}: {}", status, body)
            }
            GatewayError::MalformedResponse(reason) => write!(f, "malformed response: {}", reason),
        }
    }
}

impl std::error::Error for GatewayError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            GatewayError::Transport(err) => Some(err),
            _ => None,
        }
    }
}

impl From<reqwest::Error> for GatewayError {
    fn from(error: reqwest::Error) -> GatewayError {
        GatewayError::Transport(error)
    }
}
