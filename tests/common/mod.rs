//! Common test utilities for bundlescope integration tests
//!
//! `TestBundle` writes minified fixtures into a temp directory and runs
//! the CLI binary against them.

#![allow(dead_code)]

use std::fs;
use std::path::{Path, PathBuf};
use std::process::{Command, Output};

use tempfile::TempDir;

/// A temp directory holding one or more bundle fixtures
pub struct TestBundle {
    dir: TempDir,
}

impl TestBundle {
    pub fn new() -> Self {
        Self {
            dir: TempDir::new().expect("Failed to create temp dir"),
        }
    }

    pub fn path(&self) -> &Path {
        self.dir.path()
    }

    /// Write a bundle fixture and return its path
    pub fn add_bundle(&self, name: &str, content: &str) -> PathBuf {
        let full_path = self.dir.path().join(name);
        fs::write(&full_path, content).expect("Failed to write bundle");
        full_path
    }

    /// Run the bundlescope CLI and return the raw output
    pub fn run_cli(&self, args: &[&str]) -> Output {
        Command::new(env!("CARGO_BIN_EXE_bundlescope"))
            .current_dir(self.path())
            .args(args)
            .output()
            .expect("Failed to run CLI")
    }

    /// Run the CLI expecting success, return stdout
    pub fn run_cli_success(&self, args: &[&str]) -> String {
        let output = self.run_cli(args);
        assert!(
            output.status.success(),
            "CLI failed: {:?}\nstdout: {}\nstderr: {}",
            args,
            String::from_utf8_lossy(&output.stdout),
            String::from_utf8_lossy(&output.stderr)
        );
        String::from_utf8_lossy(&output.stdout).to_string()
    }

    /// Run the CLI expecting failure, return (exit_code, stdout, stderr)
    pub fn run_cli_failure(&self, args: &[&str]) -> (i32, String, String) {
        let output = self.run_cli(args);
        assert!(
            !output.status.success(),
            "CLI unexpectedly succeeded: {:?}",
            args
        );
        (
            output.status.code().unwrap_or(-1),
            String::from_utf8_lossy(&output.stdout).to_string(),
            String::from_utf8_lossy(&output.stderr).to_string(),
        )
    }
}

/// A small but representative minified bundle used across tests
pub const SAMPLE_BUNDLE: &str = concat!(
    r#"var V1="1.0.3";function gA(){return V1}"#,
    r#"async function zO6(A,q){if((await A()).queuedCommands.length===0)return;q("drained")}"#,
    r#"function wr(m){var b=Buffer.alloc(4);b.writeUInt32LE(m.length,0);proc.stdout.write(b)}"#,
    r#"var hnd=(e)=>{if(e.type==="click"){gA()}};"#,
    r#"function outer(){function inner(){return "deep_marker"}return inner}"#,
);
