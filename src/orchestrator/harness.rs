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

use std::path::Path;
use std::sync::Arc;

use super::builder::RabbitMqHarnessBuilder;
use crate::client::BrokerClient;
use crate::context::TestContext;
use crate::error::HarnessError;
use crate::handle::{BrokerConfig, BrokerHandle};
use crate::port::{self, PortProbe};
use crate::settings::Settings;

/// Orchestrates one broker instance for a test: resolves options, allocates
/// ports, builds the process environment, starts the broker and guarantees
/// its teardown.
pub struct RabbitMqHarness {
    context: Arc<TestContext>,
    settings: Settings,
    probe: Box<dyn PortProbe>,
    broker: Option<BrokerHandle>,
}

impl std::fmt::Debug for RabbitMqHarness {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RabbitMqHarness")
            .field("test_name", &self.context.test_name())
            .field("started", &self.broker.is_some())
            .finish_non_exhaustive()
    }
}

impl RabbitMqHarness {
    pub fn builder() -> RabbitMqHarnessBuilder {
        RabbitMqHarnessBuilder::default()
    }

    pub(super) fn new(
        settings: Settings,
        context: Arc<TestContext>,
        probe: Box<dyn PortProbe>,
    ) -> Self {
        Self {
            context,
            settings,
            probe,
            broker: None,
        }
    }

    pub fn is_started(&self) -> bool {
        self.broker.is_some()
    }

    /// Allocate ports, build the broker configuration and start the process,
    /// blocking until it accepts connections. A second call on a started
    /// harness is a no-op.
    pub fn start(&mut self) -> Result<(), HarnessError> {
        if self.broker.is_some() {
            return Ok(());
        }

        let config = self.build_config()?;
        let mut broker = BrokerHandle::new(config, self.context.clone());
        match broker.start() {
            Ok(()) => {
                self.broker = Some(broker);
                Ok(())
            }
            Err(err) => {
                // Reap whatever did spawn before surfacing the failure.
                let _ = broker.stop();
                Err(err)
            }
        }
    }

    /// Stop the broker. Safe to call repeatedly; a broker that already exited
    /// counts as stopped.
    pub fn stop(&mut self) -> Result<(), HarnessError> {
        if let Some(mut broker) = self.broker.take() {
            broker.stop()?;
        }
        Ok(())
    }

    /// The running broker handle. Panics when called before `start`.
    pub fn broker(&self) -> &BrokerHandle {
        self.broker.as_ref().expect("Broker not started")
    }

    pub fn broker_mut(&mut self) -> &mut BrokerHandle {
        self.broker.as_mut().expect("Broker not started")
    }

    /// Open an AMQP connection to the running broker.
    pub async fn connect(&self) -> Result<BrokerClient, HarnessError> {
        BrokerClient::connect(self.broker()).await
    }

    pub fn test_dir(&self) -> &Path {
        self.context.base_dir()
    }

    pub fn collect_logs(&self) -> Option<(String, String)> {
        self.broker.as_ref().map(BrokerHandle::collect_logs)
    }

    /// Resolve ports and paths into the immutable per-invocation record.
    ///
    /// The distribution port is allocated with the primary excluded; an equal
    /// pair is a hard failure, never silently retried. An unset node name
    /// embeds the resolved port so concurrently started instances never share
    /// a node identity.
    pub(crate) fn build_config(&self) -> Result<BrokerConfig, HarnessError> {
        let settings = &self.settings;
        let probe = self.probe.as_ref();

        let port = port::allocate(&settings.host, &settings.port, &[], probe)?;
        let distribution_port = port::allocate(
            &settings.host,
            &settings.distribution_port,
            &[port],
            probe,
        )?;
        if distribution_port == port {
            return Err(HarnessError::PortCollision { port });
        }

        let node_name = settings
            .node_name
            .clone()
            .unwrap_or_else(|| format!("rabbitmq-test-{port}"));

        let base = self.context.base_dir();
        let logs_dir = settings
            .logs_dir
            .clone()
            .unwrap_or_else(|| base.join("logs"));
        let plugins_file = settings
            .plugin_dir
            .clone()
            .unwrap_or_else(|| base.to_path_buf())
            .join("plugins");

        Ok(BrokerConfig::builder()
            .server_path(settings.server_path.clone())
            .ctl_path(settings.ctl_path.clone())
            .host(settings.host.clone())
            .port(port)
            .distribution_port(distribution_port)
            .node_name(node_name)
            .log_path(logs_dir.join(format!("rabbit-server.{port}.log")))
            .mnesia_path(base.join("mnesia"))
            .plugins_file(plugins_file)
            .build())
    }
}

impl Drop for RabbitMqHarness {
    fn drop(&mut self) {
        let _ = self.stop();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::port::{PortProbe, PortSpec};
    use std::cell::Cell;

    /// Oracle that treats every port as free and hands out sequential
    /// ephemeral picks.
    struct SequentialProbe {
        next: Cell<u16>,
    }

    impl SequentialProbe {
        fn from(start: u16) -> Self {
            Self {
                next: Cell::new(start),
            }
        }
    }

    impl PortProbe for SequentialProbe {
        fn is_free(&self, _host: &str, _port: u16) -> bool {
            true
        }

        fn ephemeral(&self, _host: &str) -> Option<u16> {
            let port = self.next.get();
            self.next.set(port + 1);
            Some(port)
        }
    }

    fn harness() -> RabbitMqHarnessBuilder {
        RabbitMqHarness::builder()
            .host("127.0.0.1")
            .port_probe(SequentialProbe::from(20000))
    }

    #[test]
    fn explicit_node_name_overrides_port_derived_default() {
        let harness = harness()
            .test_name("explicit_node")
            .port(PortSpec::Exact(5674))
            .node_name("test2")
            .build()
            .unwrap();

        let config = harness.build_config().unwrap();
        assert_eq!(config.node_name, "test2");
        assert_eq!(config.port, 5674);
    }

    #[test]
    fn default_node_name_embeds_the_resolved_port() {
        let harness = harness()
            .test_name("derived_node")
            .port(PortSpec::Exact(5674))
            .build()
            .unwrap();

        let config = harness.build_config().unwrap();
        assert_eq!(config.node_name, "rabbitmq-test-5674");
    }

    #[test]
    fn two_invocations_on_different_ports_never_share_a_node_identity() {
        let first = harness()
            .test_name("node_identity_1")
            .build()
            .unwrap()
            .build_config()
            .unwrap();
        let second = harness()
            .test_name("node_identity_2")
            .port_probe(SequentialProbe::from(21000))
            .build()
            .unwrap()
            .build_config()
            .unwrap();

        assert_ne!(first.port, second.port);
        assert_ne!(first.node_name, second.node_name);
    }

    #[test]
    fn distribution_port_is_distinct_from_primary() {
        let config = harness()
            .test_name("dist_distinct")
            .build()
            .unwrap()
            .build_config()
            .unwrap();

        assert_ne!(config.port, config.distribution_port);
    }

    #[test]
    fn equal_explicit_ports_fail_instead_of_colliding() {
        let harness = harness()
            .test_name("dist_collision")
            .port(PortSpec::Exact(5672))
            .distribution_port(PortSpec::Exact(5672))
            .build()
            .unwrap();

        // The exclusion of the primary turns the identical exact spec into an
        // unsatisfiable one.
        let result = harness.build_config();
        assert!(matches!(
            result,
            Err(HarnessError::PortUnavailable { .. })
        ));
    }

    #[test]
    fn plugin_dir_override_maps_to_the_plugins_file_env_entry() {
        let harness = harness()
            .test_name("plugin_dir")
            .plugin_dir("/etc")
            .build()
            .unwrap();

        let config = harness.build_config().unwrap();
        assert_eq!(config.plugins_file, Path::new("/etc/plugins"));
        assert_eq!(
            config.env_map().get("RABBITMQ_ENABLED_PLUGINS_FILE"),
            Some(&"/etc/plugins".to_string())
        );
    }

    #[test]
    fn default_paths_live_under_the_scoped_directory() {
        let harness = harness().test_name("scoped_paths").build().unwrap();
        let base = harness.test_dir().to_path_buf();
        let config = harness.build_config().unwrap();

        assert!(config.mnesia_path.starts_with(&base));
        assert!(config.plugins_file.starts_with(&base));
        assert!(config.log_path.starts_with(&base));
        assert!(config
            .log_path
            .ends_with(format!("rabbit-server.{}.log", config.port)));
    }

    #[test]
    fn stop_before_start_is_a_no_op() {
        let mut harness = harness().test_name("stop_noop").build().unwrap();
        harness.stop().unwrap();
        harness.stop().unwrap();
        assert!(!harness.is_started());
    }
}
