//! MongoDB document sink implementation.

use std::time::Duration;

use async_trait::async_trait;
use mongodb::bson::{doc, Document};
use mongodb::options::ClientOptions;
use mongodb::{Client, Collection, Database};
use tracing::{debug, info};

use crate::config::TargetConfig;
use crate::core::DocumentSink;
use crate::error::{MigrateError, Result};

/// How long to wait for a reachable server before giving up.
const SERVER_SELECTION_TIMEOUT: Duration = Duration::from_secs(10);

/// MongoDB sink over one database.
pub struct MongoSink {
    client: Client,
    database: Database,
}

impl MongoSink {
    /// Connect and ping the deployment.
    pub async fn new(config: &TargetConfig) -> Result<Self> {
        let endpoint = config.endpoint();

        let mut options = ClientOptions::parse(&config.uri)
            .await
            .map_err(|e| MigrateError::connection(&endpoint, e))?;
        options.server_selection_timeout = Some(SERVER_SELECTION_TIMEOUT);
        options.app_name = Some("optica-migrate".to_string());

        let client =
            Client::with_options(options).map_err(|e| MigrateError::connection(&endpoint, e))?;

        client
            .database("admin")
            .run_command(doc! { "ping": 1 })
            .await
            .map_err(|e| MigrateError::connection(&endpoint, e))?;

        info!(
            "Connected to MongoDB sink: {} (database {})",
            endpoint, config.database
        );

        let database = client.database(&config.database);
        Ok(Self { client, database })
    }

    fn collection(&self, name: &str) -> Collection<Document> {
        self.database.collection::<Document>(name)
    }
}

#[async_trait]
impl DocumentSink for MongoSink {
    async fn clear_collection(&self, collection: &str) -> Result<u64> {
        let result = self
            .collection(collection)
            .delete_many(doc! {})
            .await
            .map_err(|e| MigrateError::sink(collection, e))?;
        debug!("{}: cleared {} documents", collection, result.deleted_count);
        Ok(result.deleted_count)
    }

    async fn bulk_insert(&self, collection: &str, documents: Vec<Document>) -> Result<u64> {
        if documents.is_empty() {
            return Ok(0);
        }
        let result = self
            .collection(collection)
            .insert_many(documents)
            .await
            .map_err(|e| MigrateError::sink(collection, e))?;
        Ok(result.inserted_ids.len() as u64)
    }

    async fn count(&self, collection: &str) -> Result<u64> {
        self.collection(collection)
            .count_documents(doc! {})
            .await
            .map_err(|e| MigrateError::sink(collection, e))
    }

    async fn ping(&self) -> Result<()> {
        self.database
            .run_command(doc! { "ping": 1 })
            .await
            .map_err(|e| MigrateError::connection(self.database.name(), e))?;
        Ok(())
    }

    fn db_type(&self) -> &str {
        "mongodb"
    }

    async fn close(&self) {
        self.client.clone().shutdown().await;
    }
}
