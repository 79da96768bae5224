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

use std::path::PathBuf;
use std::sync::Arc;

use super::harness::RabbitMqHarness;
use crate::context::TestContext;
use crate::error::HarnessError;
use crate::port::{BindProbe, PortProbe, PortSpec};
use crate::settings::{Overrides, Settings};

/// Builder for [`RabbitMqHarness`] with fluent per-option overrides.
///
/// Anything left unset resolves through the `RABBITMQ_TEST_*` environment
/// overrides and then the built-in defaults.
pub struct RabbitMqHarnessBuilder {
    test_name: Option<String>,
    overrides: Overrides,
    cleanup: bool,
    probe: Box<dyn PortProbe>,
}

impl Default for RabbitMqHarnessBuilder {
    fn default() -> Self {
        Self {
            test_name: None,
            overrides: Overrides::default(),
            cleanup: true,
            probe: Box::new(BindProbe),
        }
    }
}

impl RabbitMqHarnessBuilder {
    /// Override the test name (defaults to the thread name or a UUID).
    pub fn test_name(mut self, name: impl Into<String>) -> Self {
        self.test_name = Some(name.into());
        self
    }

    pub fn host(mut self, host: impl Into<String>) -> Self {
        self.overrides.host = Some(host.into());
        self
    }

    pub fn port(mut self, spec: PortSpec) -> Self {
        self.overrides.port = Some(spec);
        self
    }

    pub fn distribution_port(mut self, spec: PortSpec) -> Self {
        self.overrides.distribution_port = Some(spec);
        self
    }

    pub fn server_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.overrides.server_path = Some(path.into());
        self
    }

    pub fn ctl_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.overrides.ctl_path = Some(path.into());
        self
    }

    pub fn node_name(mut self, name: impl Into<String>) -> Self {
        self.overrides.node_name = Some(name.into());
        self
    }

    pub fn plugin_dir(mut self, path: impl Into<PathBuf>) -> Self {
        self.overrides.plugin_dir = Some(path.into());
        self
    }

    pub fn logs_dir(mut self, path: impl Into<PathBuf>) -> Self {
        self.overrides.logs_dir = Some(path.into());
        self
    }

    /// Whether the per-run directory is removed on successful completion.
    pub fn cleanup(mut self, cleanup: bool) -> Self {
        self.cleanup = cleanup;
        self
    }

    /// Replace the free-port oracle. Tests use this to make allocation
    /// deterministic.
    pub fn port_probe(mut self, probe: impl PortProbe + 'static) -> Self {
        self.probe = Box::new(probe);
        self
    }

    /// Resolve settings and create the scoped directory. Does not start the
    /// broker.
    pub fn build(self) -> Result<RabbitMqHarness, HarnessError> {
        let settings = Settings::resolve(self.overrides);
        let context = Arc::new(TestContext::new(self.test_name, self.cleanup)?);
        Ok(RabbitMqHarness::new(settings, context, self.probe))
    }
}
