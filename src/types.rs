use serde::{Deserialize, Serialize};

/// A file fetched from the repository
#[derive(Debug, Clone)]
pub struct FileContent {
    /// The raw bytes of the file
    pub content: bytes::Bytes,
    /// URL the content was served from
    pub source_path: String,
    /// Revision marker, only known when read through the contents API
    pub sha: Option<String>,
}

/// Result of a successful create-or-update
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WriteOutcome {
    /// True when no file existed before the write
    pub created: bool,
    /// Repository-relative path that was written
    pub path: String,
    /// Revision marker of the new file content
    pub content_sha: Option<String>,
    /// Commit created by the write
    pub commit_sha: Option<String>,
}

/// Outcome of validating a credential against the remote
///
/// `valid` and `repo_access` are independent: a live token may still lack
/// access to the configured repository.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct CredentialStatus {
    pub valid: bool,
    /// Login of the account owning the token
    pub identity: Option<String>,
    pub repo_access: bool,
}

/// A skill record stored in `skills.json`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Skill {
    pub id: u64,
    pub name: String,
    #[serde(default)]
    pub category: String,
    /// Percentage, 0 to 100
    #[serde(default)]
    pub proficiency: u8,
}

/// A project record stored in `projects.json`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Project {
    pub id: u64,
    pub title: String,
    #[serde(default)]
    pub category: String,
    #[serde(default)]
    pub description: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub image: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub link: Option<String>,
    #[serde(default)]
    pub status: String,
}
