use std::time::Duration;

use anyhow::{Context, Result};
use async_trait::async_trait;
use common::types::{AttributeSet, TrackedEntity};
use common::wire::{NewEntity, Subscription};
use reqwest::{header, Client, Response, StatusCode};

use crate::error::StoreError;

/// Result of a partial update that reached the store.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PatchStatus {
    Patched,
    NotFound,
}

#[async_trait]
pub trait ContextStore: Send + Sync {
    /// Merge `attrs` into the existing record; untouched attributes stay.
    async fn patch_attrs(&self, id: &str, attrs: &AttributeSet) -> Result<PatchStatus, StoreError>;

    async fn create_entity(
        &self,
        entity: &TrackedEntity,
        attrs: &AttributeSet,
    ) -> Result<(), StoreError>;

    async fn create_subscription(&self, subscription: &Subscription) -> Result<(), StoreError>;
}

#[derive(Clone)]
pub struct OrionClient {
    base_url: String,
    client: Client,
}

impl OrionClient {
    pub fn new(base_url: impl Into<String>, timeout: Duration) -> Result<Self> {
        let mut headers = header::HeaderMap::new();
        headers.insert(
            header::ACCEPT,
            header::HeaderValue::from_static("application/json"),
        );

        let base_url: String = base_url.into();
        Ok(Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            client: Client::builder()
                .timeout(timeout)
                .default_headers(headers)
                .build()
                .context("Failed to build HTTP client")?,
        })
    }
}

async fn rejected(res: Response) -> StoreError {
    let status = res.status().as_u16();
    let body = res.text().await.unwrap_or_default();
    StoreError::Rejected { status, body }
}

#[async_trait]
impl ContextStore for OrionClient {
    async fn patch_attrs(&self, id: &str, attrs: &AttributeSet) -> Result<PatchStatus, StoreError> {
        let res = self
            .client
            .patch(format!("{}/entities/{}/attrs", self.base_url, id))
            .json(attrs)
            .send()
            .await
            .map_err(StoreError::transport)?;

        match res.status() {
            s if s.is_success() => Ok(PatchStatus::Patched),
            StatusCode::NOT_FOUND => Ok(PatchStatus::NotFound),
            _ => Err(rejected(res).await),
        }
    }

    async fn create_entity(
        &self,
        entity: &TrackedEntity,
        attrs: &AttributeSet,
    ) -> Result<(), StoreError> {
        let req = NewEntity::new(entity, attrs);

        if let Ok(body) = serde_json::to_string_pretty(&req) {
            tracing::debug!("Creating entity request:\n{}", body);
        }

        let res = self
            .client
            .post(format!("{}/entities", self.base_url))
            .json(&req)
            .send()
            .await
            .map_err(StoreError::transport)?;

        if res.status().is_success() {
            Ok(())
        } else {
            Err(rejected(res).await)
        }
    }

    async fn create_subscription(&self, subscription: &Subscription) -> Result<(), StoreError> {
        let res = self
            .client
            .post(format!("{}/subscriptions", self.base_url))
            .json(subscription)
            .send()
            .await
            .map_err(StoreError::transport)?;

        if res.status().is_success() {
            Ok(())
        } else {
            Err(rejected(res).await)
        }
    }
}
