use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::path::{Path, PathBuf};

/// Main configuration structure for a sync run
#[derive(Debug, Deserialize, Serialize, Clone, Default, PartialEq)]
pub struct SyncConfig {
    /// User or organization that owns every target repository
    pub owner: String,

    /// Repository names, processed in this order
    #[serde(default)]
    pub repos: Vec<String>,

    /// Names of environment variables to propagate as repository secrets
    #[serde(default)]
    pub secrets: Vec<String>,

    /// Repository settings, sent verbatim to the update-repository endpoint
    #[serde(default)]
    pub settings: Map<String, Value>,

    /// Desired rulesets, matched against remote rulesets by name
    #[serde(default)]
    pub rulesets: Vec<RulesetConfig>,

    /// Report intended changes without writing anything.
    /// Set from the command line, never from the file.
    #[serde(skip)]
    pub dry_run: bool,
}

/// A ruleset as declared in the config file
#[derive(Debug, Deserialize, Serialize, Clone, PartialEq)]
pub struct RulesetConfig {
    /// Matching key against remote rulesets (case-sensitive)
    pub name: String,

    pub target: RulesetTarget,

    pub enforcement: RulesetEnforcement,

    #[serde(default)]
    pub conditions: RulesetConditions,

    #[serde(default)]
    pub rules: Vec<RuleConfig>,
}

/// Ref type a ruleset applies to
#[derive(Debug, Deserialize, Serialize, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum RulesetTarget {
    Branch,
    Tag,
}

/// Enforcement level of a ruleset
#[derive(Debug, Deserialize, Serialize, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum RulesetEnforcement {
    Active,
    Disabled,
    /// Rules are evaluated and logged but not enforced
    Evaluate,
}

/// Conditions under which a ruleset applies
#[derive(Debug, Deserialize, Serialize, Clone, Default, PartialEq, Eq)]
pub struct RulesetConditions {
    #[serde(default)]
    pub ref_name: RefNameCondition,
}

/// Ref name glob patterns, e.g. `~DEFAULT_BRANCH` or `refs/heads/release/*`
#[derive(Debug, Deserialize, Serialize, Clone, Default, PartialEq, Eq)]
pub struct RefNameCondition {
    #[serde(default)]
    pub include: Vec<String>,

    #[serde(default)]
    pub exclude: Vec<String>,
}

/// A single rule inside a ruleset. Parameters are opaque to this tool.
#[derive(Debug, Deserialize, Serialize, Clone, PartialEq)]
pub struct RuleConfig {
    #[serde(rename = "type")]
    pub rule_type: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub parameters: Option<Map<String, Value>>,
}

impl SyncConfig {
    /// Load configuration from a specific file.
    ///
    /// `.yml` and `.yaml` files are parsed as YAML, everything else as JSON.
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {:?}", path))?;

        let config = if is_yaml(path) {
            serde_yaml::from_str(&content)
                .with_context(|| format!("Failed to parse config file: {:?}", path))?
        } else {
            Self::from_json(&content)
                .with_context(|| format!("Failed to parse config file: {:?}", path))?
        };

        Ok(config)
    }

    /// Parse configuration from a JSON document
    pub fn from_json(content: &str) -> Result<Self> {
        serde_json::from_str(content).context("Invalid JSON configuration")
    }

    /// Default config file location, relative to the working directory
    pub fn default_config_path() -> PathBuf {
        PathBuf::from("config.json")
    }

    /// Restrict the run to a single repository, replacing the configured list.
    ///
    /// The name does not have to appear in the configured list.
    pub fn with_repo_filter(mut self, repo: Option<String>) -> Self {
        if let Some(repo) = repo {
            self.repos = vec![repo];
        }
        self
    }

    pub fn with_dry_run(mut self, dry_run: bool) -> Self {
        self.dry_run = dry_run;
        self
    }

    /// `owner/repo` for every configured repository, in processing order
    pub fn full_names(&self) -> Vec<String> {
        self.repos
            .iter()
            .map(|repo| format!("{}/{}", self.owner, repo))
            .collect()
    }
}

fn is_yaml(path: &Path) -> bool {
    matches!(
        path.extension().and_then(|ext| ext.to_str()),
        Some("yml") | Some("yaml")
    )
}
