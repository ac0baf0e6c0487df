use std::collections::BTreeMap;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client, Response};
use serde::de::DeserializeOwned;
use serde_json::{Value, json};
use tracing::debug;

use crate::client::Inventory;
use crate::error::{InventoryError, InventoryResult};
use crate::spool::{InventorySettings, Spool, SpoolId};

/// Configuration for the inventory REST client.
#[derive(Debug, Clone)]
pub struct HttpInventoryConfig {
    /// API root, e.g. `http://spoolman.local:7912/api/v1`.
    pub api_url: String,
    pub timeout: Duration,
}

impl Default for HttpInventoryConfig {
    fn default() -> Self {
        Self {
            api_url: "http://localhost:7912/api/v1".into(),
            timeout: Duration::from_secs(10),
        }
    }
}

/// [`Inventory`] over the Spoolman REST API.
pub struct HttpInventory {
    client: Client,
    api_url: String,
}

impl HttpInventory {
    pub fn new(config: HttpInventoryConfig) -> InventoryResult<Self> {
        let client = Client::builder().timeout(config.timeout).build()?;
        Ok(Self {
            client,
            api_url: config.api_url.trim_end_matches('/').to_string(),
        })
    }

    fn url(&self, path: &str) -> String {
        format!("{}/{}", self.api_url, path)
    }
}

async fn decode<T: DeserializeOwned>(response: Response) -> InventoryResult<T> {
    let status = response.status();
    if !status.is_success() {
        let body = response.text().await.unwrap_or_default();
        return Err(InventoryError::Status {
            status: status.as_u16(),
            body,
        });
    }
    Ok(response.json::<T>().await?)
}

#[async_trait]
impl Inventory for HttpInventory {
    async fn list_spools(&self) -> InventoryResult<Vec<Spool>> {
        let response = self.client.get(self.url("spool")).send().await?;
        let spools: Vec<Spool> = decode(response).await?;
        debug!(count = spools.len(), "fetched spool list");
        Ok(spools)
    }

    async fn get_spool(&self, id: SpoolId) -> InventoryResult<Spool> {
        let response = self.client.get(self.url(&format!("spool/{id}"))).send().await?;
        if response.status() == reqwest::StatusCode::NOT_FOUND {
            return Err(InventoryError::SpoolNotFound(id));
        }
        decode(response).await
    }

    async fn settings(&self) -> InventoryResult<InventorySettings> {
        let response = self.client.get(self.url("setting/")).send().await?;
        let raw: Value = decode(response).await?;
        InventorySettings::from_raw(&raw)
    }

    async fn patch_extra(
        &self,
        id: SpoolId,
        extra: &BTreeMap<String, String>,
    ) -> InventoryResult<Spool> {
        debug!(spool = id, ?extra, "patching spool extras");
        let response = self
            .client
            .patch(self.url(&format!("spool/{id}")))
            .json(&json!({ "extra": extra }))
            .send()
            .await?;
        decode(response).await
    }

    async fn use_weight(&self, id: SpoolId, grams: f64) -> InventoryResult<Spool> {
        debug!(spool = id, grams, "consuming filament");
        let response = self
            .client
            .put(self.url(&format!("spool/{id}/use")))
            .json(&json!({ "use_weight": grams }))
            .send()
            .await?;
        decode(response).await
    }
}
