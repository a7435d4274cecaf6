//! Postal code to city lookup.
//!
//! Zero results is a valid answer; several results mean the caller has to
//! disambiguate.

use std::collections::HashMap;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;

use common::{AppError, AppResult};

#[cfg(any(test, feature = "test-utils"))]
use mockall::automock;

#[cfg_attr(any(test, feature = "test-utils"), automock)]
#[async_trait]
pub trait AddressLookup: Send + Sync {
    async fn cities_for_postal_code(&self, code: &str) -> AppResult<Vec<String>>;
}

/// Client for the French government geo API (`/communes`).
pub struct GeoApiLookup {
    client: Client,
    base_url: String,
}

#[derive(Debug, Deserialize)]
struct Commune {
    nom: String,
}

impl GeoApiLookup {
    pub fn new(base_url: impl Into<String>, timeout: Duration) -> AppResult<Self> {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| AppError::internal(format!("geo client: {}", e)))?;

        Ok(Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
        })
    }
}

#[async_trait]
impl AddressLookup for GeoApiLookup {
    async fn cities_for_postal_code(&self, code: &str) -> AppResult<Vec<String>> {
        let url = format!("{}/communes", self.base_url);
        let unavailable = |e: reqwest::Error| {
            tracing::warn!(postal_code = %code, error = %e, "Geo API request failed");
            AppError::upstream("Postal code lookup")
        };

        let communes: Vec<Commune> = self
            .client
            .get(&url)
            .query(&[("codePostal", code), ("fields", "nom"), ("format", "json")])
            .send()
            .await
            .and_then(|response| response.error_for_status())
            .map_err(unavailable)?
            .json()
            .await
            .map_err(unavailable)?;

        let mut cities: Vec<String> = communes.into_iter().map(|c| c.nom).collect();
        cities.sort();
        cities.dedup();
        Ok(cities)
    }
}

/// Fixed table, for development without network access and for tests.
#[derive(Debug, Clone, Default)]
pub struct StaticAddressLookup {
    cities: HashMap<String, Vec<String>>,
}

impl StaticAddressLookup {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, code: &str, cities: &[&str]) -> Self {
        self.cities.insert(
            code.to_string(),
            cities.iter().map(|c| c.to_string()).collect(),
        );
        self
    }
}

#[async_trait]
impl AddressLookup for StaticAddressLookup {
    async fn cities_for_postal_code(&self, code: &str) -> AppResult<Vec<String>> {
        Ok(self.cities.get(code).cloned().unwrap_or_default())
    }
}
