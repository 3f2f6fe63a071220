use anyhow::{Context, Result};
use async_trait::async_trait;
use octocrab::Octocrab;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::env;
use tracing::{debug, info, warn};

use crate::config::{RuleConfig, RulesetConditions, RulesetConfig, RulesetEnforcement, RulesetTarget};

/// Page size used when listing rulesets (the API maximum)
const RULESETS_PER_PAGE: u8 = 100;

/// Public key used to encrypt secrets for one repository
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq, Eq)]
pub struct PublicKey {
    pub key_id: String,
    /// Base64-encoded X25519 public key
    pub key: String,
}

/// A ruleset as returned by the rulesets API.
///
/// Only the fields needed to match by name and address an update are kept.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq, Eq)]
pub struct RemoteRuleset {
    pub id: u64,
    pub name: String,
    /// "Repository" or "Organization"
    #[serde(default)]
    pub source_type: Option<String>,
}

/// Body of a ruleset create or update call. Always the full desired state.
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct RulesetPayload {
    pub name: String,
    pub target: RulesetTarget,
    pub enforcement: RulesetEnforcement,
    pub conditions: RulesetConditions,
    pub rules: Vec<RuleConfig>,
}

impl From<&RulesetConfig> for RulesetPayload {
    fn from(ruleset: &RulesetConfig) -> Self {
        Self {
            name: ruleset.name.clone(),
            target: ruleset.target,
            enforcement: ruleset.enforcement,
            conditions: ruleset.conditions.clone(),
            rules: ruleset.rules.clone(),
        }
    }
}

#[derive(Debug, Serialize)]
struct SecretPayload<'a> {
    encrypted_value: &'a str,
    key_id: &'a str,
}

#[derive(Debug, Serialize)]
struct PageParams {
    per_page: u8,
    page: u32,
}

/// The remote operations the sync engine needs from GitHub
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait RepoApi: Send + Sync {
    /// Fetch the key used to encrypt secrets for `owner/repo`
    async fn get_public_key(&self, owner: &str, repo: &str) -> Result<PublicKey>;

    /// Create or replace an Actions secret with an already-encrypted value
    async fn create_or_update_secret(
        &self,
        owner: &str,
        repo: &str,
        name: &str,
        encrypted_value: &str,
        key_id: &str,
    ) -> Result<()>;

    /// Apply repository settings verbatim
    async fn update_settings(&self, owner: &str, repo: &str, settings: &Map<String, Value>) -> Result<()>;

    /// List every ruleset visible on the repository
    async fn list_rulesets(&self, owner: &str, repo: &str) -> Result<Vec<RemoteRuleset>>;

    async fn create_ruleset(&self, owner: &str, repo: &str, ruleset: &RulesetPayload) -> Result<RemoteRuleset>;

    async fn update_ruleset(
        &self,
        owner: &str,
        repo: &str,
        ruleset_id: u64,
        ruleset: &RulesetPayload,
    ) -> Result<RemoteRuleset>;
}

/// GitHub REST client backed by octocrab
pub struct GitHubClient {
    client: Octocrab,
}

impl GitHubClient {
    /// Create a client from `GITHUB_TOKEN` and the optional `GITHUB_API_URL`
    pub fn from_env() -> Result<Self> {
        let token = Self::try_environment_token();
        let api_url = env::var("GITHUB_API_URL").ok().filter(|url| !url.is_empty());
        Self::new(token, api_url)
    }

    /// Create a client with an optional token and API base URL.
    ///
    /// A missing token is not an error here: the client is built without
    /// credentials and the first API call reports the authentication failure.
    pub fn new(token: Option<String>, api_url: Option<String>) -> Result<Self> {
        let mut builder = Octocrab::builder();

        match token {
            Some(token) => builder = builder.personal_token(token),
            None => warn!("GITHUB_TOKEN is not set, API calls will be unauthenticated"),
        }

        if let Some(api_url) = api_url {
            info!("Using GitHub API at {}", api_url);
            builder = builder
                .base_uri(api_url.as_str())
                .with_context(|| format!("Invalid GitHub API URL: {}", api_url))?;
        }

        let client = builder.build().context("Failed to create GitHub client")?;

        Ok(Self { client })
    }

    /// Try to get token from environment variable
    fn try_environment_token() -> Option<String> {
        debug!("Attempting environment variable authentication");

        let token = env::var("GITHUB_TOKEN").ok().filter(|token| !token.is_empty())?;

        const PREFIXES: [&str; 5] = ["ghp_", "gho_", "ghs_", "ghu_", "github_pat_"];
        if !PREFIXES.iter().any(|prefix| token.starts_with(prefix)) {
            warn!("GITHUB_TOKEN doesn't look like a GitHub token (expected a ghp_, gho_, ghs_, ghu_ or github_pat_ prefix)");
        }

        Some(token)
    }
}

#[async_trait]
impl RepoApi for GitHubClient {
    async fn get_public_key(&self, owner: &str, repo: &str) -> Result<PublicKey> {
        debug!("Fetching secrets public key for {}/{}", owner, repo);

        let route = format!("/repos/{}/{}/actions/secrets/public-key", owner, repo);
        let key: PublicKey = self
            .client
            .get(route, None::<&()>)
            .await
            .with_context(|| format!("Failed to fetch public key for {}/{}", owner, repo))?;

        Ok(key)
    }

    async fn create_or_update_secret(
        &self,
        owner: &str,
        repo: &str,
        name: &str,
        encrypted_value: &str,
        key_id: &str,
    ) -> Result<()> {
        debug!("Writing secret {} to {}/{}", name, owner, repo);

        let route = format!("/repos/{}/{}/actions/secrets/{}", owner, repo, name);
        let payload = SecretPayload {
            encrypted_value,
            key_id,
        };

        // 201 and 204 both come back without a JSON body
        let response = self
            .client
            ._put(route, Some(&payload))
            .await
            .with_context(|| format!("Failed to update secret {} for {}/{}", name, owner, repo))?;
        octocrab::map_github_error(response)
            .await
            .with_context(|| format!("Failed to update secret {} for {}/{}", name, owner, repo))?;

        Ok(())
    }

    async fn update_settings(&self, owner: &str, repo: &str, settings: &Map<String, Value>) -> Result<()> {
        debug!("Updating {} settings on {}/{}", settings.len(), owner, repo);

        let route = format!("/repos/{}/{}", owner, repo);
        let _repository: Value = self
            .client
            .patch(route, Some(settings))
            .await
            .with_context(|| format!("Failed to update settings for {}/{}", owner, repo))?;

        Ok(())
    }

    async fn list_rulesets(&self, owner: &str, repo: &str) -> Result<Vec<RemoteRuleset>> {
        debug!("Fetching rulesets for {}/{}", owner, repo);

        let route = format!("/repos/{}/{}/rulesets", owner, repo);
        let mut rulesets = Vec::new();
        let mut page = 1u32;

        loop {
            let params = PageParams {
                per_page: RULESETS_PER_PAGE,
                page,
            };
            let items: Vec<RemoteRuleset> = self
                .client
                .get(&route, Some(&params))
                .await
                .with_context(|| {
                    format!("Failed to list rulesets for {}/{} page {}", owner, repo, page)
                })?;

            let count = items.len();
            rulesets.extend(items);

            if count < RULESETS_PER_PAGE as usize {
                break;
            }
            page += 1;
        }

        debug!("Found {} rulesets on {}/{}", rulesets.len(), owner, repo);
        Ok(rulesets)
    }

    async fn create_ruleset(&self, owner: &str, repo: &str, ruleset: &RulesetPayload) -> Result<RemoteRuleset> {
        debug!("Creating ruleset {} on {}/{}", ruleset.name, owner, repo);

        let route = format!("/repos/{}/{}/rulesets", owner, repo);
        let created: RemoteRuleset = self
            .client
            .post(route, Some(ruleset))
            .await
            .with_context(|| {
                format!("Failed to create ruleset {} for {}/{}", ruleset.name, owner, repo)
            })?;

        Ok(created)
    }

    async fn update_ruleset(
        &self,
        owner: &str,
        repo: &str,
        ruleset_id: u64,
        ruleset: &RulesetPayload,
    ) -> Result<RemoteRuleset> {
        debug!(
            "Updating ruleset {} ({}) on {}/{}",
            ruleset.name, ruleset_id, owner, repo
        );

        let route = format!("/repos/{}/{}/rulesets/{}", owner, repo, ruleset_id);
        let updated: RemoteRuleset = self
            .client
            .put(route, Some(ruleset))
            .await
            .with_context(|| {
                format!("Failed to update ruleset {} for {}/{}", ruleset.name, owner, repo)
            })?;

        Ok(updated)
    }
}
