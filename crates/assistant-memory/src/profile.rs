//! JSON-backed user profile: preferences, weighted topics and identity
use std::collections::BTreeMap;
use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::context_engine::ProfileSource;
use crate::error::{MemoryError, Result};

const DEFAULT_TOP_N: usize = 5;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IdentityField {
    FirstName,
    LastName,
    Alias,
    Bio,
}

impl FromStr for IdentityField {
    type Err = MemoryError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "first_name" => Ok(Self::FirstName),
            "last_name" => Ok(Self::LastName),
            "alias" => Ok(Self::Alias),
            "bio" => Ok(Self::Bio),
            other => Err(MemoryError::Profile(format!("unknown identity field '{}'", other))),
        }
    }
}

impl fmt::Display for IdentityField {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::FirstName => "First name",
            Self::LastName => "Last name",
            Self::Alias => "Alias",
            Self::Bio => "Bio",
        })
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct UserProfile {
    #[serde(skip)]
    path: PathBuf,
    pub preferences: BTreeMap<String, String>,
    pub topics: BTreeMap<String, f64>,
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub alias: Option<String>,
    pub bio: Option<String>,
    pub core_values: BTreeMap<String, f64>,
    pub primary_motivations: BTreeMap<String, f64>,
}

fn top_n(scores: &BTreeMap<String, f64>, n: usize) -> Vec<(String, f64)> {
    let mut items: Vec<(String, f64)> = scores.iter().map(|(k, v)| (k.clone(), *v)).collect();
    // stable: equal scores stay in key order
    items.sort_by(|a, b| b.1.partial_cmp(&a.1).unwrap_or(std::cmp::Ordering::Equal));
    items.truncate(n);
    items
}

impl UserProfile {
    /// Loads the profile at `path`, or starts an empty one bound to it.
    pub fn load_or_default(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        let mut profile = if path.exists() {
            let raw = std::fs::read_to_string(&path)?;
            let profile: UserProfile = serde_json::from_str(&raw)
                .map_err(|e| MemoryError::Profile(format!("{}: {}", path.display(), e)))?;
            info!("Loaded user profile from {}", path.display());
            profile
        } else {
            debug!("No profile at {}, starting empty", path.display());
            UserProfile::default()
        };
        profile.path = path;
        Ok(profile)
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Writes to a sibling temp file first so a crash never leaves half a
    /// profile behind.
    pub fn save(&self) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }
        let json = serde_json::to_string_pretty(self)
            .map_err(|e| MemoryError::Profile(e.to_string()))?;
        let tmp = self.path.with_extension("json.tmp");
        std::fs::write(&tmp, json)?;
        std::fs::rename(&tmp, &self.path)?;
        Ok(())
    }

    pub fn update_preference(&mut self, key: &str, value: &str) -> Result<()> {
        self.preferences.insert(key.to_string(), value.to_string());
        self.save()
    }

    pub fn update_topic(&mut self, topic: &str, importance: f64) -> Result<()> {
        self.topics.insert(topic.to_string(), importance);
        self.save()
    }

    pub fn update_identity_field(&mut self, field: IdentityField, value: &str) -> Result<()> {
        let slot = match field {
            IdentityField::FirstName => &mut self.first_name,
            IdentityField::LastName => &mut self.last_name,
            IdentityField::Alias => &mut self.alias,
            IdentityField::Bio => &mut self.bio,
        };
        *slot = Some(value.to_string()).filter(|v| !v.trim().is_empty());
        self.save()
    }

    pub fn update_core_value(&mut self, value: &str, importance: f64) -> Result<()> {
        self.core_values.insert(value.to_string(), importance);
        self.save()
    }

    pub fn update_primary_motivation(&mut self, motivation: &str, importance: f64) -> Result<()> {
        self.primary_motivations.insert(motivation.to_string(), importance);
        self.save()
    }

    pub fn get_core_values(&self, n: usize) -> Vec<(String, f64)> {
        top_n(&self.core_values, n)
    }

    pub fn get_primary_motivations(&self, n: usize) -> Vec<(String, f64)> {
        top_n(&self.primary_motivations, n)
    }
}

impl ProfileSource for UserProfile {
    fn get_preference(&self, key: &str, default: &str) -> String {
        self.preferences
            .get(key)
            .cloned()
            .unwrap_or_else(|| default.to_string())
    }

    fn get_top_topics(&self, n: usize) -> Vec<(String, f64)> {
        top_n(&self.topics, n)
    }

    fn preferences(&self) -> Vec<(String, String)> {
        self.preferences.iter().map(|(k, v)| (k.clone(), v.clone())).collect()
    }

    fn identity(&self) -> Vec<(String, String)> {
        let mut lines = Vec::new();
        for (field, value) in [
            (IdentityField::FirstName, &self.first_name),
            (IdentityField::LastName, &self.last_name),
            (IdentityField::Alias, &self.alias),
            (IdentityField::Bio, &self.bio),
        ] {
            if let Some(value) = value {
                lines.push((field.to_string(), value.clone()));
            }
        }
        let join = |items: Vec<(String, f64)>| {
            items.into_iter().map(|(k, _)| k).collect::<Vec<_>>().join(", ")
        };
        let values = self.get_core_values(DEFAULT_TOP_N);
        if !values.is_empty() {
            lines.push(("Core values".to_string(), join(values)));
        }
        let motivations = self.get_primary_motivations(DEFAULT_TOP_N);
        if !motivations.is_empty() {
            lines.push(("Primary motivations".to_string(), join(motivations)));
        }
        lines
    }
}
