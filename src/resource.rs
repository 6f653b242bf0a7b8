use serde_json::{Map, Value};
use std::fmt;
use std::str::FromStr;

use crate::error::StoreError;

/// Shape of the JSON document backing a resource
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Shape {
    /// Array of records
    Collection,
    /// Single object
    Singleton,
}

/// Logical collections the portfolio knows about
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Resource {
    Skills,
    Projects,
    Profile,
    Settings,
}

impl Resource {
    pub const ALL: [Resource; 4] = [
        Resource::Skills,
        Resource::Projects,
        Resource::Profile,
        Resource::Settings,
    ];

    /// Look up a known resource by its name, `None` for anything else
    pub fn from_name(name: &str) -> Option<Self> {
        match name {
            "skills" => Some(Resource::Skills),
            "projects" => Some(Resource::Projects),
            "profile" => Some(Resource::Profile),
            "settings" => Some(Resource::Settings),
            _ => None,
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            Resource::Skills => "skills",
            Resource::Projects => "projects",
            Resource::Profile => "profile",
            Resource::Settings => "settings",
        }
    }

    pub fn shape(&self) -> Shape {
        match self {
            Resource::Skills | Resource::Projects => Shape::Collection,
            Resource::Profile | Resource::Settings => Shape::Singleton,
        }
    }

    /// Value returned when the backing file does not exist yet
    pub fn empty_default(&self) -> Value {
        match self.shape() {
            Shape::Collection => Value::Array(Vec::new()),
            Shape::Singleton => Value::Object(Map::new()),
        }
    }
}

impl FromStr for Resource {
    type Err = StoreError;

    fn from_str(name: &str) -> Result<Self, Self::Err> {
        Resource::from_name(name).ok_or_else(|| StoreError::UnknownResource {
            name: name.to_string(),
        })
    }
}

impl fmt::Display for Resource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Maps resource names to repository-relative file paths
#[derive(Debug, Clone)]
pub struct PathResolver {
    data_folder: String,
}

impl PathResolver {
    pub fn new(data_folder: impl Into<String>) -> Self {
        Self {
            data_folder: data_folder.into(),
        }
    }

    /// `resolve("projects") == "data/projects.json"`
    pub fn resolve(&self, name: &str) -> String {
        let folder = self.data_folder.trim_matches('/');
        if folder.is_empty() {
            format!("{}.json", name)
        } else {
            format!("{}/{}.json", folder, name)
        }
    }
}

impl Default for PathResolver {
    fn default() -> Self {
        Self::new("data")
    }
}
