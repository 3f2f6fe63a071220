//! Sync Engine - Reconciles repository secrets, settings and rulesets
//!
//! Repositories are processed one at a time. Each repository runs three
//! stages in order (secrets, settings, rulesets); a stage with no input is
//! skipped. An error in any stage abandons the remaining stages for that
//! repository only, and the batch moves on to the next one.

use crate::config::{RulesetConfig, SyncConfig};
use crate::crypto::encrypt_secret;
use crate::github::{PublicKey, RepoApi, RulesetPayload};
use crate::secrets::SecretSource;
use anyhow::Result;
use serde_json::{Map, Value};
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};

/// What happened to one secret
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SecretAction {
    /// No value in the environment
    Skipped,
    WouldUpdate,
    Updated,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SecretReport {
    pub name: String,
    pub action: SecretAction,
}

/// What happened to the settings bag
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SettingsAction {
    /// Dry run: the keys that would have been sent
    WouldUpdate(Vec<String>),
    Updated,
}

/// What happened to one desired ruleset
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RulesetAction {
    WouldCreate,
    WouldUpdate { id: u64 },
    Created { id: u64 },
    Updated { id: u64 },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RulesetReport {
    pub name: String,
    pub action: RulesetAction,
}

/// Stage results for a repository that synced without error
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RepoReport {
    pub repo: String,
    pub secrets: Vec<SecretReport>,
    /// `None` when the settings stage was skipped
    pub settings: Option<SettingsAction>,
    pub rulesets: Vec<RulesetReport>,
}

/// Terminal state of one repository
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RepoOutcome {
    Synced(RepoReport),
    Failed { repo: String, error: String },
}

impl RepoOutcome {
    pub fn repo(&self) -> &str {
        match self {
            RepoOutcome::Synced(report) => &report.repo,
            RepoOutcome::Failed { repo, .. } => repo,
        }
    }

    pub fn is_success(&self) -> bool {
        matches!(self, RepoOutcome::Synced(_))
    }
}

/// Results from a complete sync operation
#[derive(Debug, Clone)]
pub struct SyncSummary {
    pub results: Vec<RepoOutcome>,
    pub duration: Duration,
}

impl SyncSummary {
    pub fn total_repositories(&self) -> usize {
        self.results.len()
    }

    pub fn successful(&self) -> usize {
        self.results.iter().filter(|r| r.is_success()).count()
    }

    pub fn failed(&self) -> usize {
        self.total_repositories() - self.successful()
    }
}

/// Drives the three reconciliation stages against a [`RepoApi`]
pub struct SyncEngine<A, S> {
    api: A,
    secrets: S,
}

impl<A: RepoApi, S: SecretSource> SyncEngine<A, S> {
    /// Create a sync engine over an API client and a source of secret values
    pub fn new(api: A, secrets: S) -> Self {
        Self { api, secrets }
    }

    /// The API client this engine writes through
    pub fn api(&self) -> &A {
        &self.api
    }

    /// Sync every configured repository in order and return per-repo outcomes.
    ///
    /// Never fails as a whole: repository errors are recorded in the summary.
    pub async fn sync_repos(&self, config: &SyncConfig) -> SyncSummary {
        let start_time = Instant::now();

        if config.dry_run {
            println!("🔍 DRY RUN - no changes will be made\n");
        }

        info!(
            "Syncing {} repositories for {} (dry run: {})",
            config.repos.len(),
            config.owner,
            config.dry_run
        );

        let mut results = Vec::with_capacity(config.repos.len());

        for repo in &config.repos {
            println!("\n🔄 Syncing {}/{}", config.owner, repo);

            match self.sync_repo(config, repo).await {
                Ok(report) => {
                    println!("✅ {}/{} synced successfully", config.owner, repo);
                    results.push(RepoOutcome::Synced(report));
                }
                Err(e) => {
                    debug!(owner = %config.owner, repo = %repo, "Sync failed: {:#}", e);
                    eprintln!("❌ Error syncing {}/{}: {:#}", config.owner, repo, e);
                    results.push(RepoOutcome::Failed {
                        repo: repo.clone(),
                        error: format!("{:#}", e),
                    });
                }
            }
        }

        println!("\n🎉 Sync complete!");

        let summary = SyncSummary {
            results,
            duration: start_time.elapsed(),
        };

        info!(
            "Sync completed in {:.2}s: {} successful, {} failed",
            summary.duration.as_secs_f64(),
            summary.successful(),
            summary.failed()
        );

        summary
    }

    /// Run the stage sequence for one repository, stopping at the first error
    async fn sync_repo(&self, config: &SyncConfig, repo: &str) -> Result<RepoReport> {
        let owner = config.owner.as_str();
        let mut report = RepoReport {
            repo: repo.to_string(),
            ..Default::default()
        };

        if !config.secrets.is_empty() {
            report.secrets = self
                .sync_secrets(owner, repo, &config.secrets, config.dry_run)
                .await?;
        }

        if !config.settings.is_empty() {
            report.settings = Some(
                self.sync_settings(owner, repo, &config.settings, config.dry_run)
                    .await?,
            );
        }

        if !config.rulesets.is_empty() {
            report.rulesets = self
                .sync_rulesets(owner, repo, &config.rulesets, config.dry_run)
                .await?;
        }

        Ok(report)
    }

    /// Push each named secret from the secret source to the repository.
    ///
    /// The repository public key is fetched at most once, and only when a
    /// secret actually has to be written.
    pub async fn sync_secrets(
        &self,
        owner: &str,
        repo: &str,
        names: &[String],
        dry_run: bool,
    ) -> Result<Vec<SecretReport>> {
        println!("  📦 Syncing secrets...");

        let mut public_key: Option<PublicKey> = None;
        let mut reports = Vec::with_capacity(names.len());

        for name in names {
            let Some(value) = self.secrets.lookup(name) else {
                debug!("Secret {} not found in environment, skipping", name);
                println!("    ⚠️  {}: not found in environment, skipping", name);
                reports.push(SecretReport {
                    name: name.clone(),
                    action: SecretAction::Skipped,
                });
                continue;
            };

            if dry_run {
                println!("    🔐 {}: would update", name);
                reports.push(SecretReport {
                    name: name.clone(),
                    action: SecretAction::WouldUpdate,
                });
                continue;
            }

            let key = match public_key {
                Some(ref key) => key,
                None => public_key.insert(self.api.get_public_key(owner, repo).await?),
            };

            let encrypted_value = encrypt_secret(&key.key, &value)?;
            self.api
                .create_or_update_secret(owner, repo, name, &encrypted_value, &key.key_id)
                .await?;

            debug!("Secret {} written to {}/{}", name, owner, repo);
            println!("    ✅ {}: updated", name);
            reports.push(SecretReport {
                name: name.clone(),
                action: SecretAction::Updated,
            });
        }

        Ok(reports)
    }

    /// Apply the settings bag to the repository in one call, without reading
    /// the current settings first.
    pub async fn sync_settings(
        &self,
        owner: &str,
        repo: &str,
        settings: &Map<String, Value>,
        dry_run: bool,
    ) -> Result<SettingsAction> {
        println!("  ⚙️  Syncing settings...");

        if dry_run {
            let keys: Vec<String> = settings.keys().cloned().collect();
            println!("    Would update: {}", keys.join(", "));
            return Ok(SettingsAction::WouldUpdate(keys));
        }

        self.api.update_settings(owner, repo, settings).await?;

        println!("    ✅ Settings updated");
        Ok(SettingsAction::Updated)
    }

    /// Create or overwrite each desired ruleset, matched to remote rulesets by
    /// exact name. Remote rulesets with no desired counterpart are left alone.
    pub async fn sync_rulesets(
        &self,
        owner: &str,
        repo: &str,
        rulesets: &[RulesetConfig],
        dry_run: bool,
    ) -> Result<Vec<RulesetReport>> {
        println!("  📋 Syncing rulesets...");

        let existing_rulesets = self.api.list_rulesets(owner, repo).await?;
        let mut reports = Vec::with_capacity(rulesets.len());

        for ruleset in rulesets {
            let existing = existing_rulesets.iter().find(|r| r.name == ruleset.name);

            if dry_run {
                let action = match existing {
                    Some(existing) => {
                        println!("    📜 {}: would update", ruleset.name);
                        RulesetAction::WouldUpdate { id: existing.id }
                    }
                    None => {
                        println!("    📜 {}: would create", ruleset.name);
                        RulesetAction::WouldCreate
                    }
                };
                reports.push(RulesetReport {
                    name: ruleset.name.clone(),
                    action,
                });
                continue;
            }

            let payload = RulesetPayload::from(ruleset);

            let action = match existing {
                Some(existing) => {
                    if existing.source_type.as_deref() == Some("Organization") {
                        warn!(
                            "Ruleset {} on {}/{} is inherited from the organization, updating it will likely fail",
                            ruleset.name, owner, repo
                        );
                    }
                    self.api
                        .update_ruleset(owner, repo, existing.id, &payload)
                        .await?;
                    println!("    ✅ {}: updated", ruleset.name);
                    RulesetAction::Updated { id: existing.id }
                }
                None => {
                    let created = self.api.create_ruleset(owner, repo, &payload).await?;
                    println!("    ✅ {}: created", ruleset.name);
                    RulesetAction::Created { id: created.id }
                }
            };

            reports.push(RulesetReport {
                name: ruleset.name.clone(),
                action,
            });
        }

        Ok(reports)
    }
}
