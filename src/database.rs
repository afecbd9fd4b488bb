use std::sync::Arc;

use mongodb::{Client, Collection};
use tracing::info;

use crate::campaign::db::{self as campaign_db, CampaignStore, MemoryCampaignStore};
use crate::campaign::Campaign;
use crate::config::{DatabaseConfig, StoreBackend};
use crate::error::Error;

pub type MongoCampaignStore = Collection<Campaign>;

pub trait Database: Send + Sync {
    fn campaigns(&self) -> &dyn CampaignStore;
}

/// Opens whichever backend the configuration names.
pub async fn connect(config: &DatabaseConfig) -> Result<Arc<dyn Database>, Error> {
    match config.backend {
        StoreBackend::Mongo => {
            info!("connecting to db: {}", config.uri);
            let db = Client::with_uri_str(&config.uri)
                .await?
                .database(&config.name);
            let db = MongoDatabase::initialize(db).await?;
            Ok(Arc::new(db))
        }
        StoreBackend::Memory => {
            info!("using in-memory campaign store; records are lost on exit");
            Ok(Arc::new(MemoryDatabase::new()))
        }
    }
}

#[derive(Debug, Clone)]
pub struct MongoDatabase {
    campaigns: MongoCampaignStore,
}

impl MongoDatabase {
    pub fn new(db: mongodb::Database) -> MongoDatabase {
        MongoDatabase {
            campaigns: db.collection("campaigns"),
        }
    }

    pub async fn initialize(db: mongodb::Database) -> Result<MongoDatabase, Error> {
        // ping the database to ensure connection is established
        db.run_command(mongodb::bson::doc! { "ping": 1 }, None)
            .await?;

        campaign_db::initialize(&db).await?;

        Ok(MongoDatabase::new(db))
    }
}

impl Database for MongoDatabase {
    fn campaigns(&self) -> &dyn CampaignStore {
        &self.campaigns
    }
}

#[derive(Debug, Default)]
pub struct MemoryDatabase {
    campaigns: MemoryCampaignStore,
}

impl MemoryDatabase {
    pub fn new() -> MemoryDatabase {
        MemoryDatabase::default()
    }
}

impl Database for MemoryDatabase {
    fn campaigns(&self) -> &dyn CampaignStore {
        &self.campaigns
    }
}
