//! Read model of flag definitions.
//!
//! A flagset document describes the workspace -> project -> environment
//! hierarchy with the flags of each environment. It is validated once at load
//! and then shared immutably between requests.

mod validate;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use thiserror::Error;
use tracing::info;
use uuid::Uuid;

use crate::evaluation::{EvaluationError, Flag, MatcherTable};

pub use validate::{validate_flag_key, validate_resource_key};

// DOCUMENT

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct FlagsetDocument {
    #[serde(default)]
    pub workspaces: Vec<WorkspaceDocument>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WorkspaceDocument {
    pub key: String,
    pub name: Option<String>,
    #[serde(default)]
    pub projects: Vec<ProjectDocument>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProjectDocument {
    pub key: String,
    pub name: Option<String>,
    #[serde(default)]
    pub environments: Vec<EnvironmentDocument>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EnvironmentDocument {
    pub id: Uuid,
    pub key: String,
    pub name: Option<String>,
    pub sdk_key: String,
    #[serde(default)]
    pub flags: Vec<Flag>,
}

// ERRORS

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("failed to read flagset {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse flagset: {0}")]
    Parse(#[from] serde_json::Error),

    #[error("invalid {kind} key '{key}': {message}")]
    InvalidKey {
        kind: &'static str,
        key: String,
        message: String,
    },

    #[error("environment '{environment}' has no sdk key")]
    EmptySdkKey { environment: String },

    #[error("sdk key of environment '{environment}' is already in use")]
    DuplicateSdkKey { environment: String },

    #[error("flag '{flag_key}' appears twice in environment '{environment}'")]
    DuplicateFlag {
        environment: String,
        flag_key: String,
    },

    #[error("flag '{flag_key}' in environment '{environment}' has an empty {scope} variation set")]
    EmptyVariations {
        environment: String,
        flag_key: String,
        scope: String,
    },

    #[error("flag '{flag_key}' in environment '{environment}' has an invalid rule: {source}")]
    InvalidRule {
        environment: String,
        flag_key: String,
        #[source]
        source: EvaluationError,
    },
}

// SNAPSHOTS

/// Flags of one environment, as served to SDKs.
#[derive(Debug, Clone)]
pub struct EnvironmentSnapshot {
    pub id: Uuid,
    pub workspace_key: String,
    pub project_key: String,
    pub key: String,
    pub name: Option<String>,
    flags: Vec<Flag>,
    by_key: HashMap<String, usize>,
    salt: String,
    etag: String,
}

impl EnvironmentSnapshot {
    /// `workspace/project/environment`
    pub fn path(&self) -> String {
        format!("{}/{}/{}", self.workspace_key, self.project_key, self.key)
    }

    /// Salt fed to bucketing. The environment id keeps rollouts independent
    /// between environments.
    pub fn salt(&self) -> &str {
        &self.salt
    }

    pub fn flags(&self) -> &[Flag] {
        &self.flags
    }

    pub fn flag(&self, flag_key: &str) -> Option<&Flag> {
        self.by_key.get(flag_key).map(|idx| &self.flags[*idx])
    }

    /// Strong validator for the flag list, unquoted.
    pub fn etag(&self) -> &str {
        &self.etag
    }
}

#[derive(Debug, Clone)]
pub struct FlagStore {
    by_sdk_key: HashMap<String, Arc<EnvironmentSnapshot>>,
    loaded_at: DateTime<Utc>,
}

impl FlagStore {
    pub async fn load(path: impl AsRef<Path>, matchers: &mut MatcherTable) -> Result<Self, StoreError> {
        let path = path.as_ref();
        let raw = tokio::fs::read_to_string(path)
            .await
            .map_err(|source| StoreError::Io {
                path: path.to_path_buf(),
                source,
            })?;
        let store = Self::from_json(&raw, matchers)?;
        info!(path = %path.display(), environments = store.len(), "flagset loaded");
        Ok(store)
    }

    pub fn from_json(raw: &str, matchers: &mut MatcherTable) -> Result<Self, StoreError> {
        let document: FlagsetDocument = serde_json::from_str(raw)?;
        Self::from_document(document, matchers)
    }

    pub fn from_document(document: FlagsetDocument, matchers: &mut MatcherTable) -> Result<Self, StoreError> {
        let mut by_sdk_key = HashMap::new();

        for workspace in document.workspaces {
            check_key("workspace", &workspace.key, validate_resource_key)?;

            for project in workspace.projects {
                check_key("project", &project.key, validate_resource_key)?;

                for environment in project.environments {
                    check_key("environment", &environment.key, validate_resource_key)?;
                    let (sdk_key, snapshot) =
                        build_snapshot(&workspace.key, &project.key, environment, matchers)?;

                    if sdk_key.trim().is_empty() {
                        return Err(StoreError::EmptySdkKey {
                            environment: snapshot.path(),
                        });
                    }
                    if by_sdk_key.contains_key(&sdk_key) {
                        return Err(StoreError::DuplicateSdkKey {
                            environment: snapshot.path(),
                        });
                    }
                    by_sdk_key.insert(sdk_key, Arc::new(snapshot));
                }
            }
        }

        Ok(Self {
            by_sdk_key,
            loaded_at: Utc::now(),
        })
    }

    pub fn environment_for_sdk_key(&self, sdk_key: &str) -> Option<Arc<EnvironmentSnapshot>> {
        self.by_sdk_key.get(sdk_key).cloned()
    }

    /// Number of environments served.
    pub fn len(&self) -> usize {
        self.by_sdk_key.len()
    }

    pub fn is_empty(&self) -> bool {
        self.by_sdk_key.is_empty()
    }

    pub fn loaded_at(&self) -> DateTime<Utc> {
        self.loaded_at
    }
}

fn check_key(
    kind: &'static str,
    key: &str,
    validate: fn(&str) -> Result<(), String>,
) -> Result<(), StoreError> {
    validate(key).map_err(|message| StoreError::InvalidKey {
        kind,
        key: key.to_string(),
        message,
    })
}

// Returns the sdk key alongside the validated snapshot.
fn build_snapshot(
    workspace_key: &str,
    project_key: &str,
    environment: EnvironmentDocument,
    matchers: &mut MatcherTable,
) -> Result<(String, EnvironmentSnapshot), StoreError> {
    let path = format!("{}/{}/{}", workspace_key, project_key, environment.key);
    let mut by_key = HashMap::with_capacity(environment.flags.len());

    for (idx, flag) in environment.flags.iter().enumerate() {
        check_key("flag", &flag.flag_key, validate_flag_key)?;
        check_flag(&path, flag, matchers)?;

        if by_key.insert(flag.flag_key.clone(), idx).is_some() {
            return Err(StoreError::DuplicateFlag {
                environment: path,
                flag_key: flag.flag_key.clone(),
            });
        }
    }

    let etag = flags_etag(&environment.flags)?;
    let snapshot = EnvironmentSnapshot {
        id: environment.id,
        workspace_key: workspace_key.to_string(),
        project_key: project_key.to_string(),
        key: environment.key,
        name: environment.name,
        flags: environment.flags,
        by_key,
        salt: environment.id.to_string(),
        etag,
    };
    Ok((environment.sdk_key, snapshot))
}

// Rules are prepared against the table so bad operators and rule values fail
// the load instead of surfacing per request.
fn check_flag(environment: &str, flag: &Flag, matchers: &mut MatcherTable) -> Result<(), StoreError> {
    let empty = |scope: String| StoreError::EmptyVariations {
        environment: environment.to_string(),
        flag_key: flag.flag_key.clone(),
        scope,
    };

    if flag.fallthrough_variations.is_empty() {
        return Err(empty("fallthrough".to_string()));
    }

    for rule in &flag.rules {
        if rule.rule_variations.is_empty() {
            return Err(empty(format!("rule '{}'", rule.identity())));
        }
        matchers
            .prepare(&rule.operator, &rule.trait_value)
            .map_err(|source| StoreError::InvalidRule {
                environment: environment.to_string(),
                flag_key: flag.flag_key.clone(),
                source,
            })?;
    }

    Ok(())
}

fn flags_etag(flags: &[Flag]) -> Result<String, StoreError> {
    let body = serde_json::to_vec(flags)?;
    let digest = Sha256::digest(&body);
    Ok(hex::encode(&digest[..8]))
}
