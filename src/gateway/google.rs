use std::time::{Duration, Instant};

use async_trait::async_trait;
use ::config::{Config, ConfigError, Environment};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use tokio::sync::Mutex;
use tracing::{debug, error, info};

use super::{
    AdsGateway, AdvertisingChannel, CampaignSpec, EuPoliticalAdvertising, GatewayError,
    RemoteCampaignStatus, ResourceName,
};

const ENV_PREFIX: &str = "GOOGLE_ADS";

// refresh a little early so a token never expires mid-request
const TOKEN_EXPIRY_MARGIN: Duration = Duration::from_secs(60);

/// Credentials and endpoints for the Google Ads REST API, read from
/// `GOOGLE_ADS_*` environment variables.
#[derive(Clone, Deserialize)]
pub struct GoogleAdsConfig {
    #[serde(default)]
    pub developer_token: String,
    #[serde(default)]
    pub client_id: String,
    #[serde(default)]
    pub client_secret: String,
    #[serde(default)]
    pub refresh_token: String,
    #[serde(default)]
    pub login_customer_id: String,
    /// The account campaigns are published into.
    #[serde(default)]
    pub customer_id: String,
    #[serde(default = "default_api_base")]
    pub api_base: String,
    #[serde(default = "default_api_version")]
    pub api_version: String,
    #[serde(default = "default_token_url")]
    pub token_url: String,
    #[serde(default = "default_request_timeout_secs")]
    pub request_timeout_secs: u64,
}

fn default_api_base() -> String {
    "https://googleads.googleapis.com".to_string()
}

fn default_api_version() -> String {
    "v19".to_string()
}

fn default_token_url() -> String {
    "https://oauth2.googleapis.com/token".to_string()
}

fn default_request_timeout_secs() -> u64 {
    30
}

impl GoogleAdsConfig {
    pub fn from_env() -> Result<GoogleAdsConfig, ConfigError> {
        GoogleAdsConfig::load(Environment::with_prefix(ENV_PREFIX))
    }

    fn load(source: Environment) -> Result<GoogleAdsConfig, ConfigError> {
        // customer ids are digit strings and must not be coerced into integers
        Config::builder()
            .add_source(source.try_parsing(false))
            .build()?
            .try_deserialize()
    }
}

impl std::fmt::Debug for GoogleAdsConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GoogleAdsConfig")
            .field("developer_token", &"<redacted>")
            .field("client_id", &self.client_id)
            .field("client_secret", &"<redacted>")
            .field("refresh_token", &"<redacted>")
            .field("login_customer_id", &self.login_customer_id)
            .field("customer_id", &self.customer_id)
            .field("api_base", &self.api_base)
            .field("api_version", &self.api_version)
            .field("token_url", &self.token_url)
            .field("request_timeout_secs", &self.request_timeout_secs)
            .finish()
    }
}

struct AccessToken {
    value: String,
    expires_at: Instant,
}

impl AccessToken {
    fn is_fresh(&self) -> bool {
        Instant::now() + TOKEN_EXPIRY_MARGIN < self.expires_at
    }
}

pub struct GoogleAdsGateway {
    config: GoogleAdsConfig,
    customer_id: String,
    login_customer_id: String,
    client: reqwest::Client,
    token: Mutex<Option<AccessToken>>,
}

impl std::fmt::Debug for GoogleAdsGateway {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GoogleAdsGateway")
            .field("config", &self.config)
            .field("customer_id", &self.customer_id)
            .finish()
    }
}

impl GoogleAdsGateway {
    /// Validates the credentials and builds the HTTP client. No request is
    /// made until the first publish.
    pub fn new(config: GoogleAdsConfig) -> Result<GoogleAdsGateway, GatewayError> {
        GoogleAdsGateway::build(config).map_err(|err| {
            error!(error = %err, "failed to initialize google ads client");
            err
        })
    }

    fn build(config: GoogleAdsConfig) -> Result<GoogleAdsGateway, GatewayError> {
        require("DEVELOPER_TOKEN", &config.developer_token)?;
        require("CLIENT_ID", &config.client_id)?;
        require("CLIENT_SECRET", &config.client_secret)?;
        require("REFRESH_TOKEN", &config.refresh_token)?;
        let login_customer_id = normalize_customer_id("LOGIN_CUSTOMER_ID", &config.login_customer_id)?;
        let customer_id = normalize_customer_id("CUSTOMER_ID", &config.customer_id)?;

        if config.request_timeout_secs == 0 {
            return Err(GatewayError::Configuration(format!(
                "{}_REQUEST_TIMEOUT_SECS must be greater than zero",
                ENV_PREFIX
            )));
        }

        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.request_timeout_secs))
            .build()
            .map_err(|err| {
                GatewayError::Configuration(format!("failed to create http client: {}", err))
            })?;

        info!(customer_id = %customer_id, api_version = %config.api_version, "google ads client initialized");

        Ok(GoogleAdsGateway {
            config,
            customer_id,
            login_customer_id,
            client,
            token: Mutex::new(None),
        })
    }

    async fn access_token(&self) -> Result<String, GatewayError> {
        let mut token = self.token.lock().await;
        if let Some(token) = token.as_ref().filter(|token| token.is_fresh()) {
            return Ok(token.value.clone());
        }

        debug!("refreshing google ads access token");
        let response = self
            .client
            .post(&self.config.token_url)
            .form(&[
                ("grant_type", "refresh_token"),
                ("client_id", self.config.client_id.as_str()),
                ("client_secret", self.config.client_secret.as_str()),
                ("refresh_token", self.config.refresh_token.as_str()),
            ])
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(GatewayError::Authentication {
                status: status.as_u16(),
                body,
            });
        }

        let refreshed: TokenResponse = response.json().await?;
        let value = refreshed.access_token.clone();
        *token = Some(AccessToken {
            value: refreshed.access_token,
            expires_at: Instant::now() + Duration::from_secs(refreshed.expires_in),
        });

        Ok(value)
    }

    fn customer_url(&self, method: &str) -> String {
        format!(
            "{}/{}/customers/{}/{}",
            self.config.api_base.trim_end_matches('/'),
            self.config.api_version,
            self.customer_id,
            method
        )
    }

    async fn call<B, R>(&self, method: &str, body: &B) -> Result<R, GatewayError>
    where
        B: Serialize + ?Sized,
        R: DeserializeOwned,
    {
        let token = self.access_token().await?;
        let response = self
            .client
            .post(self.customer_url(method))
            .bearer_auth(token)
            .header("developer-token", &self.config.developer_token)
            .header("login-customer-id", &self.login_customer_id)
            .json(body)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(GatewayError::Api {
                status: status.as_u16(),
                body,
            });
        }

        Ok(response.json().await?)
    }

    async fn find_budget(&self, name: &str) -> Result<Option<ResourceName>, GatewayError> {
        let request = SearchRequest {
            query: budget_lookup_query(name),
        };
        let response: SearchResponse = self.call("googleAds:search", &request).await?;

        Ok(response
            .results
            .into_iter()
            .filter_map(|row| row.campaign_budget)
            .map(|budget| ResourceName::new(budget.resource_name))
            .next())
    }

    async fn mutate<T: Serialize>(
        &self,
        method: &str,
        request: &MutateRequest<T>,
    ) -> Result<ResourceName, GatewayError> {
        let response: MutateResponse = self.call(method, request).await?;

        response
            .results
            .into_iter()
            .next()
            .map(|result| ResourceName::new(result.resource_name))
            .ok_or_else(|| {
                GatewayError::MalformedResponse(format!("{} returned no results", method))
            })
    }
}

#[async_trait]
impl AdsGateway for GoogleAdsGateway {
    #[tracing::instrument(skip(self))]
    async fn ensure_budget(
        &self,
        name: &str,
        amount_micros: i64,
    ) -> Result<ResourceName, GatewayError> {
        if let Some(existing) = self.find_budget(name).await? {
            info!(budget = %existing, "reusing existing campaign budget");
            return Ok(existing);
        }

        let budget = self
            .mutate("campaignBudgets:mutate", &budget_request(name, amount_micros))
            .await?;
        info!(budget = %budget, "created campaign budget");

        Ok(budget)
    }

    #[tracing::instrument(skip(self))]
    async fn create_campaign(&self, spec: &CampaignSpec) -> Result<ResourceName, GatewayError> {
        let campaign = self
            .mutate("campaigns:mutate", &campaign_request(spec))
            .await?;
        info!(campaign = %campaign, "created campaign");

        Ok(campaign)
    }
}

fn require(key: &str, value: &str) -> Result<(), GatewayError> {
    if value.trim().is_empty() {
        return Err(GatewayError::Configuration(format!(
            "{}_{} is not set",
            ENV_PREFIX, key
        )));
    }

    Ok(())
}

/// Accepts both `1234567890` and the dashed `123-456-7890` form shown in the UI.
fn normalize_customer_id(key: &str, value: &str) -> Result<String, GatewayError> {
    require(key, value)?;

    let digits: String = value.trim().chars().filter(|c| *c != '-').collect();
    if !digits.chars().all(|c| c.is_ascii_digit()) {
        return Err(GatewayError::Configuration(format!(
            "{}_{} must contain only digits and dashes",
            ENV_PREFIX, key
        )));
    }

    Ok(digits)
}

fn budget_lookup_query(name: &str) -> String {
    let escaped = name.replace('\\', "\\\\").replace('\'', "\\'");
    format!(
        "SELECT campaign_budget.resource_name FROM campaign_budget \
         WHERE campaign_budget.name = '{}' AND campaign_budget.status != 'REMOVED' LIMIT 1",
        escaped
    )
}

fn budget_request(name: &str, amount_micros: i64) -> MutateRequest<BudgetResource<'_>> {
    MutateRequest {
        operations: vec![CreateOperation {
            create: BudgetResource {
                name,
                // int64 fields travel as strings in the REST mapping
                amount_micros: amount_micros.to_string(),
                delivery_method: "STANDARD",
                explicitly_shared: false,
            },
        }],
    }
}

fn campaign_request(spec: &CampaignSpec) -> MutateRequest<CampaignResource<'_>> {
    MutateRequest {
        operations: vec![CreateOperation {
            create: CampaignResource {
                name: spec.name(),
                status: spec.status(),
                advertising_channel_type: spec.channel(),
                manual_cpc: ManualCpc {
                    enhanced_cpc_enabled: spec.enhanced_cpc_enabled(),
                },
                campaign_budget: spec.budget().as_str(),
                contains_eu_political_advertising: spec.eu_political_advertising(),
            },
        }],
    }
}

#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: String,
    #[serde(default = "default_token_lifetime")]
    expires_in: u64,
}

fn default_token_lifetime() -> u64 {
    3600
}

#[derive(Debug, Serialize)]
struct SearchRequest {
    query: String,
}

#[derive(Debug, Deserialize)]
struct SearchResponse {
    #[serde(default)]
    results: Vec<SearchRow>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct SearchRow {
    campaign_budget: Option<ResourceRow>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ResourceRow {
    resource_name: String,
}

#[derive(Debug, Serialize)]
struct MutateRequest<T> {
    operations: Vec<CreateOperation<T>>,
}

#[derive(Debug, Serialize)]
struct CreateOperation<T> {
    create: T,
}

#[derive(Debug, Deserialize)]
struct MutateResponse {
    #[serde(default)]
    results: Vec<ResourceRow>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct BudgetResource<'a> {
    name: &'a str,
    amount_micros: String,
    delivery_method: &'static str,
    explicitly_shared: bool,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct CampaignResource<'a> {
    name: &'a str,
    status: RemoteCampaignStatus,
    advertising_channel_type: AdvertisingChannel,
    manual_cpc: ManualCpc,
    campaign_budget: &'a str,
    contains_eu_political_advertising: EuPoliticalAdvertising,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct ManualCpc {
    enhanced_cpc_enabled: bool,
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use serde_json::json;

    use super::*;

    fn complete_env() -> HashMap<String, String> {
        [
            ("GOOGLE_ADS_DEVELOPER_TOKEN", "dev-token"),
            ("GOOGLE_ADS_CLIENT_ID", "client-id"),
            ("GOOGLE_ADS_CLIENT_SECRET", "client-secret"),
            ("GOOGLE_ADS_REFRESH_TOKEN", "refresh-token"),
            ("GOOGLE_ADS_LOGIN_CUSTOMER_ID", "123-456-7890"),
            ("GOOGLE_ADS_CUSTOMER_ID", "0987654321"),
        ]
        .iter()
        .map(|(key, value)| (key.to_string(), value.to_string()))
        .collect()
    }

    fn load(env: HashMap<String, String>) -> GoogleAdsConfig {
        GoogleAdsConfig::load(Environment::with_prefix(ENV_PREFIX).source(Some(env))).unwrap()
    }

    #[test]
    fn config_loads_from_environment() {
        let config = load(complete_env());

        assert_eq!(config.developer_token, "dev-token");
        assert_eq!(config.login_customer_id, "123-456-7890");
        assert_eq!(config.customer_id, "0987654321");
        assert_eq!(config.api_version, default_api_version());
        assert_eq!(config.request_timeout_secs, 30);
    }

    #[test]
    fn config_debug_redacts_secrets() {
        let rendered = format!("{:?}", load(complete_env()));

        assert!(!rendered.contains("dev-token"));
        assert!(!rendered.contains("client-secret"));
        assert!(!rendered.contains("refresh-token"));
    }

    #[tokio::test]
    async fn gateway_normalizes_customer_ids() {
        let gateway = GoogleAdsGateway::new(load(complete_env())).unwrap();

        assert_eq!(gateway.login_customer_id, "1234567890");
        assert_eq!(
            gateway.customer_url("campaigns:mutate"),
            "https://googleads.googleapis.com/v19/customers/0987654321/campaigns:mutate"
        );
    }

    #[tokio::test]
    async fn gateway_rejects_missing_credentials() {
        let mut env = complete_env();
        env.remove("GOOGLE_ADS_REFRESH_TOKEN");

        let err = GoogleAdsGateway::new(load(env)).unwrap_err();

        assert!(
            matches!(err, GatewayError::Configuration(ref reason) if reason.contains("GOOGLE_ADS_REFRESH_TOKEN")),
            "unexpected error: {}",
            err
        );
    }

    #[tokio::test]
    async fn gateway_rejects_non_numeric_customer_id() {
        let mut env = complete_env();
        env.insert("GOOGLE_ADS_CUSTOMER_ID".into(), "acme-corp".into());

        let err = GoogleAdsGateway::new(load(env)).unwrap_err();

        assert!(matches!(err, GatewayError::Configuration(_)));
    }

    #[test]
    fn budget_lookup_escapes_quotes() {
        let query = budget_lookup_query(r"Bob's \ Sale");

        assert!(query.contains(r"campaign_budget.name = 'Bob\'s \\ Sale'"));
    }

    #[test]
    fn budget_request_uses_micros() {
        let body = serde_json::to_value(budget_request("Spring Sale Budget", 50_000_000)).unwrap();

        assert_eq!(
            body,
            json!({
                "operations": [{
                    "create": {
                        "name": "Spring Sale Budget",
                        "amountMicros": "50000000",
                        "deliveryMethod": "STANDARD",
                        "explicitlyShared": false,
                    }
                }]
            })
        );
    }

    #[test]
    fn campaign_request_is_paused_search() {
        let spec = CampaignSpec::new(
            "Spring Sale",
            ResourceName::new("customers/0987654321/campaignBudgets/42"),
        );
        let body = serde_json::to_value(campaign_request(&spec)).unwrap();

        assert_eq!(
            body,
            json!({
                "operations": [{
                    "create": {
                        "name": "Spring Sale",
                        "status": "PAUSED",
                        "advertisingChannelType": "SEARCH",
                        "manualCpc": { "enhancedCpcEnabled": false },
                        "campaignBudget": "customers/0987654321/campaignBudgets/42",
                        "containsEuPoliticalAdvertising": "DOES_NOT_CONTAIN_EU_POLITICAL_ADVERTISING",
                    }
                }]
            })
        );
    }

    #[test]
    fn search_response_tolerates_empty_results() {
        let response: SearchResponse = serde_json::from_value(json!({})).unwrap();

        assert!(response.results.is_empty());
    }
}
