use base64::{engine::general_purpose::STANDARD, Engine as _};
use reqwest::{header::HeaderMap, Client, RequestBuilder, Response, StatusCode};
use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{SystemTime, UNIX_EPOCH};

use crate::{
    config::StoreConfig,
    credential::Credential,
    error::{Result, StoreError},
    types::FileContent,
};

const USER_AGENT: &str = concat!("folio-store/", env!("CARGO_PKG_VERSION"));
const API_ACCEPT: &str = "application/vnd.github+json";
const API_VERSION: &str = "2022-11-28";

/// HTTP client for one GitHub repository
///
/// Talks to:
/// - the raw-content mirror for unauthenticated file downloads
/// - the REST contents API for authenticated reads, writes and deletes
/// - the user and repository endpoints for credential validation
#[derive(Clone)]
pub struct GitHubClient {
    client: Client,
    owner: String,
    repo: String,
    branch: String,
    api_base: String,
    raw_base: String,
    last_cache_buster: Arc<AtomicU64>,
}

#[derive(Deserialize)]
struct ContentsResponse {
    #[serde(default)]
    content: String,
    #[serde(default)]
    encoding: Option<String>,
    sha: String,
}

impl ContentsResponse {
    /// Decoded file body; only base64 payloads carry the file inline
    fn decode(&self, path: &str) -> Result<Vec<u8>> {
        match self.encoding.as_deref() {
            None | Some("base64") => decode_content(&self.content),
            Some(other) => Err(StoreError::UnsupportedEncoding {
                path: path.to_string(),
                encoding: other.to_string(),
            }),
        }
    }
}

#[derive(Serialize)]
struct PutRequest<'a> {
    message: &'a str,
    content: String,
    branch: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    sha: Option<&'a str>,
}

#[derive(Serialize)]
struct DeleteRequest<'a> {
    message: &'a str,
    sha: &'a str,
    branch: &'a str,
}

#[derive(Deserialize)]
struct ShaRef {
    sha: String,
}

#[derive(Deserialize)]
struct CommitResponse {
    content: Option<ShaRef>,
    commit: Option<ShaRef>,
}

#[derive(Deserialize)]
struct UserResponse {
    login: String,
}

#[derive(Deserialize)]
struct RepoResponse {
    permissions: Option<RepoPermissions>,
}

#[derive(Deserialize)]
struct RepoPermissions {
    #[serde(default)]
    push: bool,
}

/// Revision markers returned by a successful commit
#[derive(Debug, Clone, Default)]
pub struct CommitShas {
    pub content_sha: Option<String>,
    pub commit_sha: Option<String>,
}

impl GitHubClient {
    /// Create a client for the repository described by `config`
    pub fn new(config: &StoreConfig) -> Result<Self> {
        let client = Client::builder()
            .user_agent(USER_AGENT)
            .timeout(config.timeout())
            .build()?;

        Ok(Self {
            client,
            owner: config.owner.clone(),
            repo: config.repo.clone(),
            branch: config.branch.clone(),
            api_base: config.api_base.trim_end_matches('/').to_string(),
            raw_base: config.raw_base.trim_end_matches('/').to_string(),
            last_cache_buster: Arc::new(AtomicU64::new(0)),
        })
    }

    /// Build the raw content URL for a file
    fn raw_url(&self, path: &str, cache_buster: u64) -> String {
        format!(
            "{}/{}/{}/{}/{}?t={}",
            self.raw_base,
            self.owner,
            self.repo,
            self.branch,
            path.trim_start_matches('/'),
            cache_buster
        )
    }

    /// Build the contents API URL for a file
    fn contents_url(&self, path: &str) -> String {
        format!(
            "{}/repos/{}/{}/contents/{}",
            self.api_base,
            self.owner,
            self.repo,
            path.trim_start_matches('/')
        )
    }

    fn repo_url(&self) -> String {
        format!("{}/repos/{}/{}", self.api_base, self.owner, self.repo)
    }

    fn user_url(&self) -> String {
        format!("{}/user", self.api_base)
    }

    /// Strictly increasing millisecond value used to defeat intermediate caches
    pub fn next_cache_buster(&self) -> u64 {
        let now = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_millis() as u64)
            .unwrap_or(0);

        let previous = self
            .last_cache_buster
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |prev| {
                Some(now.max(prev + 1))
            })
            .unwrap_or(now);

        now.max(previous + 1)
    }

    /// Attach the headers every contents API call carries
    fn api_request(&self, builder: RequestBuilder, credential: Option<&Credential>) -> RequestBuilder {
        let builder = builder
            .header("Accept", API_ACCEPT)
            .header("X-GitHub-Api-Version", API_VERSION);

        match credential {
            Some(credential) => builder.bearer_auth(credential.expose()),
            None => builder,
        }
    }

    /// Download a file from the raw-content mirror
    ///
    /// 403 and 429 are reported as `RateLimited`; the mirror sends no quota
    /// headers so any refusal is treated as a suspected rate limit.
    pub async fn fetch_raw(&self, path: &str) -> Result<FileContent> {
        let url = self.raw_url(path, self.next_cache_buster());

        let response = self.client.get(&url).send().await?;
        let status = response.status();
        tracing::debug!(path, %status, "raw mirror fetch");

        match status {
            StatusCode::OK => {
                let content = response.bytes().await?;
                Ok(FileContent {
                    content,
                    source_path: url,
                    sha: None,
                })
            }
            StatusCode::NOT_FOUND => Err(StoreError::NotFound {
                path: path.to_string(),
            }),
            StatusCode::FORBIDDEN | StatusCode::TOO_MANY_REQUESTS => {
                let reset_at = reset_at(response.headers());
                let message = response
                    .text()
                    .await
                    .ok()
                    .filter(|m| !m.trim().is_empty())
                    .unwrap_or_else(|| "raw content mirror refused the request".to_string());
                Err(StoreError::RateLimited { message, reset_at })
            }
            _ => Err(error_for_status(response, path).await),
        }
    }

    /// Read a file through the contents API and decode its base64 payload
    pub async fn fetch_contents(
        &self,
        path: &str,
        credential: Option<&Credential>,
    ) -> Result<FileContent> {
        let url = self.contents_url(path);

        let response = self
            .api_request(self.client.get(&url), credential)
            .query(&[("ref", self.branch.as_str())])
            .send()
            .await?;
        tracing::debug!(path, status = %response.status(), "contents api fetch");

        if !response.status().is_success() {
            return Err(error_for_status(response, path).await);
        }

        let body = response.bytes().await?;
        let parsed: ContentsResponse = serde_json::from_slice(&body)?;
        let content = parsed.decode(path)?;

        Ok(FileContent {
            content: content.into(),
            source_path: url,
            sha: Some(parsed.sha),
        })
    }

    /// Current revision marker of a file, `None` when the file does not exist
    pub async fn current_sha(
        &self,
        path: &str,
        credential: &Credential,
    ) -> Result<Option<String>> {
        match self.fetch_contents(path, Some(credential)).await {
            Ok(file) => Ok(file.sha),
            Err(StoreError::NotFound { .. }) => Ok(None),
            Err(e) => Err(e),
        }
    }

    /// Status code of a contents API lookup, used for existence checks
    pub async fn probe_contents(
        &self,
        path: &str,
        credential: Option<&Credential>,
    ) -> Result<StatusCode> {
        let response = self
            .api_request(self.client.get(self.contents_url(path)), credential)
            .query(&[("ref", self.branch.as_str())])
            .send()
            .await?;
        Ok(response.status())
    }

    /// Status code of a raw mirror lookup, used for existence checks
    pub async fn probe_raw(&self, path: &str) -> Result<StatusCode> {
        let url = self.raw_url(path, self.next_cache_buster());
        let response = self.client.get(&url).send().await?;
        Ok(response.status())
    }

    /// Create or update a file in one request
    ///
    /// `sha` must be the current revision marker when the file exists; a
    /// stale marker is rejected by the remote with 409.
    pub async fn put_contents(
        &self,
        path: &str,
        content: &[u8],
        message: &str,
        sha: Option<&str>,
        credential: &Credential,
    ) -> Result<CommitShas> {
        let body = PutRequest {
            message,
            content: STANDARD.encode(content),
            branch: &self.branch,
            sha,
        };

        let response = self
            .api_request(self.client.put(self.contents_url(path)), Some(credential))
            .json(&body)
            .send()
            .await?;
        tracing::debug!(path, status = %response.status(), "contents api put");

        if !response.status().is_success() {
            return Err(error_for_status(response, path).await);
        }

        commit_shas(response).await
    }

    /// Delete a file at its current revision marker
    pub async fn delete_contents(
        &self,
        path: &str,
        message: &str,
        sha: &str,
        credential: &Credential,
    ) -> Result<CommitShas> {
        let body = DeleteRequest {
            message,
            sha,
            branch: &self.branch,
        };

        let response = self
            .api_request(self.client.delete(self.contents_url(path)), Some(credential))
            .json(&body)
            .send()
            .await?;
        tracing::debug!(path, status = %response.status(), "contents api delete");

        if !response.status().is_success() {
            return Err(error_for_status(response, path).await);
        }

        commit_shas(response).await
    }

    /// Login owning `credential`, `None` when the remote refuses the token
    pub async fn authenticated_user(&self, credential: &Credential) -> Result<Option<String>> {
        let response = self
            .api_request(self.client.get(self.user_url()), Some(credential))
            .send()
            .await?;
        let status = response.status();
        tracing::debug!(%status, "identity check");

        if status.is_success() {
            let body = response.bytes().await?;
            let user: UserResponse = serde_json::from_slice(&body)?;
            return Ok(Some(user.login));
        }

        match error_for_status(response, "user").await {
            e @ StoreError::RateLimited { .. } => Err(e),
            _ if status == StatusCode::UNAUTHORIZED || status == StatusCode::FORBIDDEN => Ok(None),
            e => Err(e),
        }
    }

    /// Whether `credential` can write to the configured repository
    ///
    /// When the remote reports permissions, push access is required; a
    /// visible repository without a permissions block counts as accessible.
    pub async fn repository_access(&self, credential: &Credential) -> Result<bool> {
        let response = self
            .api_request(self.client.get(self.repo_url()), Some(credential))
            .send()
            .await?;
        let status = response.status();
        tracing::debug!(%status, repo = %self.identifier(), "repository access check");

        if status.is_success() {
            let body = response.bytes().await?;
            let repo: RepoResponse = serde_json::from_slice(&body)?;
            return Ok(repo.permissions.map(|p| p.push).unwrap_or(true));
        }

        // Only a refusal or a hidden repository means "no access"
        match error_for_status(response, &self.repo).await {
            StoreError::NotFound { .. } => Ok(false),
            StoreError::RemoteRejected { status: 403, .. } => Ok(false),
            e => Err(e),
        }
    }

    pub fn identifier(&self) -> String {
        format!("github://{}/{}/{}", self.owner, self.repo, self.branch)
    }
}

/// Decode a contents API payload; GitHub wraps the base64 text at 60 columns
fn decode_content(encoded: &str) -> Result<Vec<u8>> {
    let cleaned: String = encoded.chars().filter(|c| !c.is_whitespace()).collect();
    Ok(STANDARD.decode(cleaned)?)
}

async fn commit_shas(response: Response) -> Result<CommitShas> {
    let body = response.bytes().await?;
    if body.is_empty() {
        return Ok(CommitShas::default());
    }
    let parsed: CommitResponse = serde_json::from_slice(&body)?;
    Ok(CommitShas {
        content_sha: parsed.content.map(|c| c.sha),
        commit_sha: parsed.commit.map(|c| c.sha),
    })
}

fn quota_exhausted(headers: &HeaderMap) -> bool {
    headers
        .get("x-ratelimit-remaining")
        .and_then(|v| v.to_str().ok())
        .map(|v| v.trim() == "0")
        .unwrap_or(false)
}

fn reset_at(headers: &HeaderMap) -> Option<u64> {
    headers
        .get("x-ratelimit-reset")
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.trim().parse().ok())
}

/// Map an unsuccessful API response to a tagged error
async fn error_for_status(response: Response, path: &str) -> StoreError {
    let status = response.status();
    let exhausted = quota_exhausted(response.headers());
    let reset_at = reset_at(response.headers());
    let body = response.text().await.unwrap_or_default();

    match status {
        StatusCode::NOT_FOUND => StoreError::NotFound {
            path: path.to_string(),
        },
        StatusCode::TOO_MANY_REQUESTS => StoreError::RateLimited {
            message: body,
            reset_at,
        },
        StatusCode::FORBIDDEN if exhausted || body.to_lowercase().contains("rate limit") => {
            StoreError::RateLimited {
                message: body,
                reset_at,
            }
        }
        status => StoreError::RemoteRejected {
            status: status.as_u16(),
            message: body,
        },
    }
}
