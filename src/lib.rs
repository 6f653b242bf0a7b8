pub mod config;
pub mod credential;
pub mod error;
pub mod github;
pub mod records;
pub mod resource;
pub mod source;
pub mod store;
pub mod types;

pub use config::{ReadProviderKind, StoreConfig};
pub use credential::{
    Credential, CredentialHolder, CredentialStore, FileCredentialStore, MemoryCredentialStore,
};
pub use error::{Result, StoreError};
pub use github::GitHubClient;
pub use resource::{PathResolver, Resource, Shape};
pub use source::{ContentsApiProvider, RawMirrorProvider, ReadProvider};
pub use store::ContentStore;
pub use types::{CredentialStatus, FileContent, Project, Skill, WriteOutcome};
