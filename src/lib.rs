//! github-repo-sync - Declarative configuration for GitHub repositories
//!
//! Pushes one desired configuration to a set of repositories under a single owner:
//! Actions secrets taken from the environment, general repository settings, and
//! rulesets. Each run reconciles remote state toward the config file and reports
//! per-repository results.
//!
//! ## Modules
//!
//! - [`config`]: Config file model and loading
//! - [`crypto`]: Sealed-box encryption of secret values
//! - [`github`]: GitHub REST API client
//! - [`secrets`]: Sources of secret values
//! - [`sync`]: Reconciliation engine

pub mod config;
pub mod crypto;
pub mod github;
pub mod secrets;
pub mod sync;

pub use config::{RulesetConfig, SyncConfig};
pub use github::{GitHubClient, RepoApi};
pub use secrets::{ProcessEnv, SecretSource};
pub use sync::{RepoOutcome, SyncEngine, SyncSummary};
