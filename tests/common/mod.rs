/// Common test utilities and helpers for github-repo-sync CLI tests
use assert_fs::prelude::*;
use assert_fs::TempDir;
use std::path::{Path, PathBuf};
use std::process::Output;

pub const BIN: &str = env!("CARGO_BIN_EXE_github-repo-sync");

/// Scratch working directory holding config files for one test
pub struct TestEnvironment {
    pub temp_dir: TempDir,
}

impl TestEnvironment {
    pub fn new() -> Self {
        let temp_dir = TempDir::new().expect("Failed to create temp dir");
        Self { temp_dir }
    }

    pub fn write_config(&self, name: &str, content: &str) -> PathBuf {
        let child = self.temp_dir.child(name);
        child.write_str(content).expect("Failed to write test config");
        child.path().to_path_buf()
    }

    pub fn create_minimal_config(&self) -> PathBuf {
        self.write_config(
            "config.json",
            r#"{
  "owner": "acme",
  "repos": ["svc", "web"],
  "secrets": [],
  "settings": {},
  "rulesets": []
}"#,
        )
    }

    /// Subdirectory of the scratch directory, created on demand
    pub fn subdir(&self, name: &str) -> PathBuf {
        let child = self.temp_dir.child(name);
        child.create_dir_all().expect("Failed to create subdirectory");
        child.path().to_path_buf()
    }

    /// Command for the binary, run inside the scratch directory with GitHub
    /// and logging variables cleared
    pub fn command(&self) -> tokio::process::Command {
        self.command_in(self.temp_dir.path())
    }

    pub fn command_in(&self, dir: &Path) -> tokio::process::Command {
        let mut command = tokio::process::Command::new(BIN);
        command
            .current_dir(dir)
            .env_remove("GITHUB_TOKEN")
            .env_remove("GITHUB_API_URL")
            .env_remove("RUST_LOG");
        command
    }

    pub async fn run(&self, args: &[&str]) -> Output {
        self.command()
            .args(args)
            .output()
            .await
            .expect("Failed to execute binary")
    }
}

pub fn stdout(output: &Output) -> String {
    String::from_utf8_lossy(&output.stdout).into_owned()
}

pub fn stderr(output: &Output) -> String {
    String::from_utf8_lossy(&output.stderr).into_owned()
}
