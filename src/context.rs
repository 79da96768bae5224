/*
 * Licensed to the Apache Software Foundation (ASF) under one
 * or more contributor license agreements.  See the NOTICE file
 * distributed with this work for additional information
 * regarding copyright ownership.  The ASF licenses this file
 * to you under the Apache License, Version 2.0 (the
 * "License"); you may not use this file except in compliance
 * with the License.  You may obtain a copy of the License at
 *
 *   http://www.apache.org/licenses/LICENSE-2.0
 *
 * Unless required by applicable law or agreed to in writing,
 * software distributed under the License is distributed on an
 * "AS IS" BASIS, WITHOUT WARRANTIES OR CONDITIONS OF ANY
 * KIND, either express or implied.  See the License for the
 * specific language governing permissions and limitations
 * under the License.
 */

//! Per-invocation scoped directory.
//!
//! Every harness invocation gets its own temporary directory holding the
//! broker's mnesia state, default plugin file, default logs and captured
//! stdout/stderr. Two concurrent sessions therefore never collide on storage
//! paths. The directory is removed when the context drops, unless the test is
//! panicking or cleanup was disabled, in which case it is kept for post-mortem
//! inspection.

use std::path::{Path, PathBuf};
use std::thread;

use tempfile::TempDir;
use uuid::Uuid;

use crate::error::HarnessError;

const CLEANUP_DISABLED_ENV_VAR: &str = "RABBITMQ_TEST_KEEP_DIRS";

fn is_cleanup_disabled_by_env() -> bool {
    std::env::var(CLEANUP_DISABLED_ENV_VAR)
        .map(|value| matches!(value.to_lowercase().as_str(), "true" | "1"))
        .unwrap_or(false)
}

/// Owns the scoped directory for one harness invocation.
pub struct TestContext {
    test_name: String,
    base_dir: PathBuf,
    dir: Option<TempDir>,
    cleanup: bool,
}

impl TestContext {
    pub fn new(test_name: Option<String>, cleanup: bool) -> Result<Self, HarnessError> {
        let test_name = test_name.unwrap_or_else(derive_test_name);
        let dir = tempfile::Builder::new()
            .prefix(&format!("rabbitmq-harness-{}-", sanitize_path(&test_name)))
            .tempdir()
            .map_err(|source| HarnessError::FileSystem {
                path: std::env::temp_dir(),
                source,
            })?;
        let base_dir = dir.path().to_path_buf();

        Ok(Self {
            test_name,
            base_dir,
            dir: Some(dir),
            cleanup,
        })
    }

    pub fn test_name(&self) -> &str {
        &self.test_name
    }

    pub fn base_dir(&self) -> &Path {
        &self.base_dir
    }

    pub fn broker_stdout_path(&self) -> PathBuf {
        self.base_dir.join("broker_stdout.log")
    }

    pub fn broker_stderr_path(&self) -> PathBuf {
        self.base_dir.join("broker_stderr.log")
    }
}

fn derive_test_name() -> String {
    thread::current()
        .name()
        .map(|name| name.to_string())
        .unwrap_or_else(|| Uuid::new_v4().to_string())
}

fn sanitize_path(name: &str) -> String {
    name.chars()
        .map(|c| match c {
            c if c.is_ascii_alphanumeric() || c == '_' || c == '-' || c == '.' => c,
            _ => '_',
        })
        .collect()
}

impl Drop for TestContext {
    fn drop(&mut self) {
        let keep = !self.cleanup || thread::panicking() || is_cleanup_disabled_by_env();
        if keep {
            if let Some(dir) = self.dir.take() {
                let path = dir.keep();
                log::info!(
                    "keeping harness directory for {}: {}",
                    self.test_name,
                    path.display()
                );
            }
        }
        // A still-held TempDir removes the tree when it drops here.
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sanitize_replaces_path_separators() {
        assert_eq!(sanitize_path("test::foo::bar"), "test__foo__bar");
        assert_eq!(sanitize_path("my/test"), "my_test");
        assert_eq!(sanitize_path("plain-name.1"), "plain-name.1");
    }

    #[test]
    fn context_creates_scoped_directory() {
        let ctx = TestContext::new(Some("ctx_create".to_string()), true).unwrap();
        assert!(ctx.base_dir().is_dir());
        assert!(ctx.broker_stdout_path().ends_with("broker_stdout.log"));
        assert!(ctx.broker_stderr_path().ends_with("broker_stderr.log"));
    }

    #[test]
    fn directory_is_removed_on_drop() {
        let path;
        {
            let ctx = TestContext::new(Some("ctx_drop".to_string()), true).unwrap();
            path = ctx.base_dir().to_path_buf();
            assert!(path.is_dir());
        }
        assert!(!path.exists());
    }

    #[test]
    fn two_contexts_never_share_a_directory() {
        let a = TestContext::new(Some("ctx_iso".to_string()), true).unwrap();
        let b = TestContext::new(Some("ctx_iso".to_string()), true).unwrap();
        assert_ne!(a.base_dir(), b.base_dir());
    }
}
