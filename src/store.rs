use serde::de::DeserializeOwned;
use serde_json::Value;
use std::sync::Arc;

use crate::{
    config::StoreConfig,
    credential::{Credential, CredentialHolder, CredentialStore, FileCredentialStore, MemoryCredentialStore},
    error::{Result, StoreError},
    github::GitHubClient,
    records,
    resource::{PathResolver, Resource, Shape},
    source::{providers_for, ReadProvider},
    types::{CredentialStatus, FileContent, WriteOutcome},
};

/// JSON-file data store backed by a GitHub repository
///
/// Reads walk the configured provider chain (raw mirror, then contents API by
/// default). Writes always go through the contents API and need a credential.
/// Nothing is cached locally: every read re-fetches.
pub struct ContentStore {
    providers: Vec<Arc<dyn ReadProvider>>,
    client: GitHubClient,
    credentials: CredentialHolder,
    paths: PathResolver,
    fallback_to_default: bool,
}

impl ContentStore {
    /// Create a store, persisting the credential where the config says
    pub async fn new(config: StoreConfig) -> Result<Self> {
        let store: Arc<dyn CredentialStore> = match &config.credential_file {
            Some(path) => Arc::new(FileCredentialStore::new(path.clone())),
            None => Arc::new(MemoryCredentialStore::new()),
        };
        Self::with_credential_store(config, store).await
    }

    /// Create a store with an explicit credential store
    ///
    /// Any credential already persisted in `store` becomes active.
    pub async fn with_credential_store(
        config: StoreConfig,
        store: Arc<dyn CredentialStore>,
    ) -> Result<Self> {
        config.validate()?;

        let client = GitHubClient::new(&config)?;
        let providers = providers_for(&config.read_order, &client, config.rate_limit_backoff());
        let credentials = CredentialHolder::load(store).await?;

        tracing::debug!(
            repo = %client.identifier(),
            providers = providers.len(),
            "content store ready"
        );

        Ok(Self {
            providers,
            client,
            credentials,
            paths: PathResolver::new(config.data_folder),
            fallback_to_default: config.fallback_to_default,
        })
    }

    /// Replace the read fallback chain
    pub fn with_providers(mut self, providers: Vec<Arc<dyn ReadProvider>>) -> Self {
        self.providers = providers;
        self
    }

    /// Repository-relative path backing `name`
    pub fn path_for(&self, name: &str) -> String {
        self.paths.resolve(name)
    }

    pub fn credentials(&self) -> &CredentialHolder {
        &self.credentials
    }

    /// Replace the active credential; a blank token clears it
    pub async fn set_credential(&self, token: &str) -> Result<()> {
        self.credentials.set(token).await
    }

    pub async fn clear_credential(&self) -> Result<()> {
        self.credentials.clear().await
    }

    async fn require_credential(&self) -> Result<Credential> {
        self.credentials
            .current()
            .await
            .ok_or(StoreError::Unauthenticated)
    }

    /// Check the active credential against the identity and repository endpoints
    ///
    /// Malformed tokens fail with `InvalidCredentialFormat` before any request
    /// is made. The repository check is skipped when the identity check fails.
    pub async fn validate(&self) -> Result<CredentialStatus> {
        let credential = self.require_credential().await?;
        credential.check_format()?;

        let status = match self.client.authenticated_user(&credential).await? {
            Some(login) => {
                let repo_access = self.client.repository_access(&credential).await?;
                CredentialStatus {
                    valid: true,
                    identity: Some(login),
                    repo_access,
                }
            }
            None => CredentialStatus::default(),
        };

        tracing::info!(
            valid = status.valid,
            repo_access = status.repo_access,
            "credential validated"
        );
        self.credentials.record_status(status.clone()).await;
        Ok(status)
    }

    /// Read a resource as JSON
    ///
    /// A missing file yields the empty default for known resources and
    /// `NotFound` for any other name. A rate limit seen on any provider is
    /// reported as `RateLimited` unless a later provider succeeds.
    pub async fn get_content(&self, name: &str) -> Result<Value> {
        self.read_document(name, self.fallback_to_default).await
    }

    /// Walk the provider chain for `name`
    ///
    /// With `lenient` set, a known resource whose providers all failed reads
    /// as its empty default. Otherwise only a confirmed absence does.
    async fn read_document(&self, name: &str, lenient: bool) -> Result<Value> {
        let known = Resource::from_name(name);
        let path = self.paths.resolve(name);
        let credential = self.credentials.current().await;

        let mut last_error = None;
        let mut rate_limited = None;

        for provider in &self.providers {
            if provider.requires_credential() && credential.is_none() {
                tracing::debug!(provider = %provider.identifier(), "no credential, skipping provider");
                continue;
            }

            let outcome = match provider.fetch(&path, credential.as_ref()).await {
                Ok(file) => parse_document(&file),
                Err(e) => Err(e),
            };

            match outcome {
                Ok(value) => {
                    return Ok(match (known, value) {
                        (Some(resource), Value::Null) => resource.empty_default(),
                        (_, value) => value,
                    });
                }
                Err(StoreError::NotFound { .. }) => {
                    tracing::debug!(path = %path, provider = %provider.identifier(), "resource absent");
                    return match known {
                        Some(resource) => Ok(resource.empty_default()),
                        None => Err(StoreError::NotFound { path }),
                    };
                }
                Err(e @ StoreError::RateLimited { .. }) => {
                    tracing::warn!(path = %path, provider = %provider.identifier(), error = %e, "read rate limited");
                    rate_limited = Some(e);
                }
                Err(e) => {
                    tracing::warn!(path = %path, provider = %provider.identifier(), error = %e, "read failed, trying next provider");
                    last_error = Some(e);
                }
            }
        }

        if let Some(e) = rate_limited {
            return Err(e);
        }

        let error = last_error.unwrap_or(StoreError::Unauthenticated);
        match known {
            Some(resource) if lenient => {
                tracing::warn!(path = %path, error = %error, "all read providers failed, using empty default");
                Ok(resource.empty_default())
            }
            _ => Err(error),
        }
    }

    /// Read a known resource
    pub async fn get_resource(&self, resource: Resource) -> Result<Value> {
        self.get_content(resource.name()).await
    }

    /// Create or update the file backing `name` with `value`
    ///
    /// Fails with `Unauthenticated`, without touching the network, when no
    /// credential is held. A concurrent writer shows up as `RemoteRejected`;
    /// nothing is retried here.
    pub async fn update_content(&self, name: &str, value: &Value) -> Result<WriteOutcome> {
        let credential = self.require_credential().await?;
        let path = self.paths.resolve(name);

        let sha = self.client.current_sha(&path, &credential).await?;
        let body = serialize_document(value)?;
        let message = match sha {
            Some(_) => format!("Update {}", path),
            None => format!("Create {}", path),
        };

        let shas = self
            .client
            .put_contents(&path, body.as_bytes(), &message, sha.as_deref(), &credential)
            .await?;

        tracing::info!(path = %path, created = sha.is_none(), "committed resource");

        Ok(WriteOutcome {
            created: sha.is_none(),
            path,
            content_sha: shas.content_sha,
            commit_sha: shas.commit_sha,
        })
    }

    /// Delete the file backing `name`, returning the commit sha
    pub async fn delete_content(&self, name: &str) -> Result<Option<String>> {
        let credential = self.require_credential().await?;
        let path = self.paths.resolve(name);

        let sha = self
            .client
            .current_sha(&path, &credential)
            .await?
            .ok_or_else(|| StoreError::NotFound { path: path.clone() })?;

        let shas = self
            .client
            .delete_contents(&path, &format!("Delete {}", path), &sha, &credential)
            .await?;

        tracing::info!(path = %path, "deleted resource");
        Ok(shas.commit_sha)
    }

    /// Whether a repository file exists
    ///
    /// Uses the contents API when a credential is held, the raw mirror
    /// otherwise. Anything but a 2xx answer, errors included, counts as absent.
    pub async fn exists(&self, path: &str) -> bool {
        let status = match self.credentials.current().await {
            Some(credential) => self.client.probe_contents(path, Some(&credential)).await,
            None => self.client.probe_raw(path).await,
        };

        match status {
            Ok(status) if status.is_success() => true,
            Ok(status) => {
                tracing::debug!(path, %status, "treating file as absent");
                false
            }
            Err(e) => {
                tracing::warn!(path, error = %e, "existence check failed, treating file as absent");
                false
            }
        }
    }

    /// Whether the file backing `name` exists
    pub async fn resource_exists(&self, name: &str) -> bool {
        self.exists(&self.paths.resolve(name)).await
    }

    /// Create every missing known resource file with its empty default
    ///
    /// Existing files are left untouched. Returns the resources created.
    pub async fn initialize_resources(&self) -> Result<Vec<Resource>> {
        let credential = self.require_credential().await?;
        let mut created = Vec::new();

        for resource in Resource::ALL {
            let path = self.paths.resolve(resource.name());
            if self.exists(&path).await {
                continue;
            }

            // Confirm before creating so a failed probe never overwrites a real file
            if self.client.current_sha(&path, &credential).await?.is_some() {
                continue;
            }

            let body = serialize_document(&resource.empty_default())?;
            self.client
                .put_contents(&path, body.as_bytes(), &format!("Create {}", path), None, &credential)
                .await?;

            tracing::info!(path = %path, "initialized resource");
            created.push(resource);
        }

        Ok(created)
    }

    /// Read a collection resource as typed records
    ///
    /// Only a confirmed absence reads as an empty collection; any other
    /// failure is returned.
    pub async fn get_records<T: DeserializeOwned>(&self, resource: Resource) -> Result<Vec<T>> {
        let records = self.load_collection(resource).await?;
        records
            .into_iter()
            .map(|r| serde_json::from_value(r).map_err(StoreError::from))
            .collect()
    }

    /// Append a record to a collection, assigning a time-based id if it has none
    pub async fn add_record(&self, resource: Resource, record: Value) -> Result<Value> {
        self.require_credential().await?;
        let mut records = self.load_collection(resource).await?;
        let stored = records::insert(resource, &mut records, record)?;
        self.update_content(resource.name(), &Value::Array(records)).await?;
        Ok(stored)
    }

    /// Merge `partial` into the record with `id`
    pub async fn update_record(&self, resource: Resource, id: u64, partial: Value) -> Result<Value> {
        self.require_credential().await?;
        let mut records = self.load_collection(resource).await?;
        let merged = records::merge(resource, &mut records, id, partial)?;
        self.update_content(resource.name(), &Value::Array(records)).await?;
        Ok(merged)
    }

    /// Remove the record with `id` and rewrite the collection
    pub async fn delete_record(&self, resource: Resource, id: u64) -> Result<Value> {
        self.require_credential().await?;
        let mut records = self.load_collection(resource).await?;
        let removed = records::remove(resource, &mut records, id)?;
        self.update_content(resource.name(), &Value::Array(records)).await?;
        Ok(removed)
    }

    async fn load_collection(&self, resource: Resource) -> Result<Vec<Value>> {
        if resource.shape() != Shape::Collection {
            return Err(StoreError::NotACollection {
                name: resource.name().to_string(),
            });
        }

        // Strict read: the collection is rewritten whole, so an unreadable
        // file must never be mistaken for an empty one
        match self.read_document(resource.name(), false).await? {
            Value::Array(records) => Ok(records),
            _ => Err(StoreError::NotACollection {
                name: resource.name().to_string(),
            }),
        }
    }

    /// Get the list of read providers
    pub fn providers(&self) -> &[Arc<dyn ReadProvider>] {
        &self.providers
    }
}

fn parse_document(file: &FileContent) -> Result<Value> {
    Ok(serde_json::from_slice(&file.content)?)
}

/// Two-space indented JSON with a trailing newline
fn serialize_document(value: &Value) -> Result<String> {
    let mut body = serde_json::to_string_pretty(value)?;
    body.push('\n');
    Ok(body)
}
