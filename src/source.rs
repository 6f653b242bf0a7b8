use async_trait::async_trait;
use std::sync::Arc;
use std::time::Duration;

use crate::{
    config::ReadProviderKind,
    credential::Credential,
    error::{Result, StoreError},
    github::GitHubClient,
    types::FileContent,
};

/// One step of the read fallback chain
///
/// Implementors fetch a single repository file from one endpoint. The store
/// tries providers in order until one succeeds or reports the file missing.
#[async_trait]
pub trait ReadProvider: Send + Sync {
    /// Fetch a file by its repository-relative path
    ///
    /// Returns `StoreError::NotFound` if the file doesn't exist
    async fn fetch(&self, path: &str, credential: Option<&Credential>) -> Result<FileContent>;

    /// Providers that need a credential are skipped when none is held
    fn requires_credential(&self) -> bool {
        false
    }

    /// Get a human-readable identifier for this provider (for logging/debugging)
    fn identifier(&self) -> String;
}

/// Reads through the unauthenticated raw-content mirror
///
/// A suspected rate limit is retried exactly once after `backoff`, with a
/// fresh cache-buster.
pub struct RawMirrorProvider {
    client: GitHubClient,
    backoff: Duration,
}

impl RawMirrorProvider {
    pub fn new(client: GitHubClient, backoff: Duration) -> Self {
        Self { client, backoff }
    }
}

#[async_trait]
impl ReadProvider for RawMirrorProvider {
    async fn fetch(&self, path: &str, _credential: Option<&Credential>) -> Result<FileContent> {
        match self.client.fetch_raw(path).await {
            Err(StoreError::RateLimited { .. }) => {
                tracing::warn!(
                    path,
                    backoff_ms = self.backoff.as_millis() as u64,
                    "raw mirror refused request, retrying once"
                );
                tokio::time::sleep(self.backoff).await;
                self.client.fetch_raw(path).await
            }
            other => other,
        }
    }

    fn identifier(&self) -> String {
        format!("raw:{}", self.client.identifier())
    }
}

/// Reads through the authenticated contents API
pub struct ContentsApiProvider {
    client: GitHubClient,
}

impl ContentsApiProvider {
    pub fn new(client: GitHubClient) -> Self {
        Self { client }
    }
}

#[async_trait]
impl ReadProvider for ContentsApiProvider {
    async fn fetch(&self, path: &str, credential: Option<&Credential>) -> Result<FileContent> {
        let credential = credential.ok_or(StoreError::Unauthenticated)?;
        self.client.fetch_contents(path, Some(credential)).await
    }

    fn requires_credential(&self) -> bool {
        true
    }

    fn identifier(&self) -> String {
        format!("api:{}", self.client.identifier())
    }
}

/// Build the provider chain named by `order`
pub fn providers_for(
    order: &[ReadProviderKind],
    client: &GitHubClient,
    backoff: Duration,
) -> Vec<Arc<dyn ReadProvider>> {
    order
        .iter()
        .map(|kind| match kind {
            ReadProviderKind::RawMirror => {
                Arc::new(RawMirrorProvider::new(client.clone(), backoff)) as Arc<dyn ReadProvider>
            }
            ReadProviderKind::ContentsApi => {
                Arc::new(ContentsApiProvider::new(client.clone())) as Arc<dyn ReadProvider>
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::StoreConfig;

    #[test]
    fn test_providers_follow_configured_order() {
        let client = GitHubClient::new(&StoreConfig::new("owner", "repo")).unwrap();
        let providers = providers_for(
            &[ReadProviderKind::ContentsApi, ReadProviderKind::RawMirror],
            &client,
            Duration::from_millis(1),
        );

        assert_eq!(providers.len(), 2);
        assert!(providers[0].requires_credential());
        assert!(providers[0].identifier().starts_with("api:"));
        assert!(!providers[1].requires_credential());
        assert!(providers[1].identifier().starts_with("raw:"));
    }

    #[tokio::test]
    async fn test_contents_provider_needs_credential() {
        let client = GitHubClient::new(&StoreConfig::new("owner", "repo")).unwrap();
        let provider = ContentsApiProvider::new(client);

        assert!(matches!(
            provider.fetch("data/skills.json", None).await,
            Err(StoreError::Unauthenticated)
        ));
    }
}
