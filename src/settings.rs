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

//! Per-invocation option resolution.
//!
//! Every option resolves in the same order: explicit call-site override, else
//! a `RABBITMQ_TEST_*` environment override, else the built-in default.
//! Environment lookup is injected so resolution can be tested without
//! mutating the process environment.

use std::path::PathBuf;

use crate::port::PortSpec;

pub const DEFAULT_HOST: &str = "127.0.0.1";
pub const DEFAULT_SERVER_PATH: &str = "/usr/lib/rabbitmq/bin/rabbitmq-server";
pub const DEFAULT_CTL_PATH: &str = "/usr/lib/rabbitmq/bin/rabbitmqctl";

pub const HOST_ENV_VAR: &str = "RABBITMQ_TEST_HOST";
pub const PORT_ENV_VAR: &str = "RABBITMQ_TEST_PORT";
pub const DIST_PORT_ENV_VAR: &str = "RABBITMQ_TEST_DIST_PORT";
pub const SERVER_ENV_VAR: &str = "RABBITMQ_TEST_SERVER";
pub const CTL_ENV_VAR: &str = "RABBITMQ_TEST_CTL";
pub const NODE_ENV_VAR: &str = "RABBITMQ_TEST_NODE";
pub const PLUGINDIR_ENV_VAR: &str = "RABBITMQ_TEST_PLUGINDIR";
pub const LOGSDIR_ENV_VAR: &str = "RABBITMQ_TEST_LOGSDIR";

/// Ordered option resolution: explicit value, else override, else default.
pub fn resolve<T>(explicit: Option<T>, flag: Option<T>, default: T) -> T {
    explicit.or(flag).unwrap_or(default)
}

/// Explicit overrides supplied at the call site. Unset fields fall through to
/// the environment layer and then the defaults.
#[derive(Debug, Clone, Default)]
pub struct Overrides {
    pub host: Option<String>,
    pub port: Option<PortSpec>,
    pub distribution_port: Option<PortSpec>,
    pub server_path: Option<PathBuf>,
    pub ctl_path: Option<PathBuf>,
    pub node_name: Option<String>,
    pub plugin_dir: Option<PathBuf>,
    pub logs_dir: Option<PathBuf>,
}

/// Fully resolved option set for one harness invocation.
///
/// `node_name`, `plugin_dir` and `logs_dir` stay optional here; the
/// orchestrator fills them in from the allocated port and the per-run
/// directory once those exist.
#[derive(Debug, Clone)]
pub struct Settings {
    pub host: String,
    pub port: PortSpec,
    pub distribution_port: PortSpec,
    pub server_path: PathBuf,
    pub ctl_path: PathBuf,
    pub node_name: Option<String>,
    pub plugin_dir: Option<PathBuf>,
    pub logs_dir: Option<PathBuf>,
}

impl Settings {
    /// Resolve against the real process environment.
    pub fn resolve(overrides: Overrides) -> Self {
        Self::resolve_with(overrides, |name| std::env::var(name).ok())
    }

    /// Resolve with an injected environment lookup.
    pub fn resolve_with(overrides: Overrides, env: impl Fn(&str) -> Option<String>) -> Self {
        let env_port = |name: &str| env(name).and_then(|value| value.parse::<PortSpec>().ok());
        let env_path = |name: &str| env(name).map(PathBuf::from);

        Self {
            host: resolve(overrides.host, env(HOST_ENV_VAR), DEFAULT_HOST.to_string()),
            port: resolve(overrides.port, env_port(PORT_ENV_VAR), PortSpec::Any),
            distribution_port: resolve(
                overrides.distribution_port,
                env_port(DIST_PORT_ENV_VAR),
                PortSpec::Any,
            ),
            server_path: resolve(
                overrides.server_path,
                env_path(SERVER_ENV_VAR),
                PathBuf::from(DEFAULT_SERVER_PATH),
            ),
            ctl_path: resolve(
                overrides.ctl_path,
                env_path(CTL_ENV_VAR),
                PathBuf::from(DEFAULT_CTL_PATH),
            ),
            node_name: overrides.node_name.or_else(|| env(NODE_ENV_VAR)),
            plugin_dir: overrides.plugin_dir.or_else(|| env_path(PLUGINDIR_ENV_VAR)),
            logs_dir: overrides.logs_dir.or_else(|| env_path(LOGSDIR_ENV_VAR)),
        }
    }
}
