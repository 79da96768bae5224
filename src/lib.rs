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

//! Test harness for external RabbitMQ broker processes.
//!
//! Starts a real `rabbitmq-server` on conflict-free ports with an isolated
//! per-run directory, blocks until it accepts TCP connections, exposes its
//! `rabbitmqctl` control channel, and guarantees teardown of both the process
//! and the broker-side state tests leave behind.
//!
//! # Example
//!
//! ```ignore
//! use rabbitmq_harness::{teardown, RabbitMqHarness};
//!
//! #[tokio::test]
//! async fn publishes_and_consumes() {
//!     let mut harness = RabbitMqHarness::builder().build().unwrap();
//!     harness.start().unwrap();
//!
//!     let client = harness.connect().await.unwrap();
//!     // declare queues, publish, consume...
//!
//!     teardown(harness.broker(), client).await.unwrap();
//!     harness.stop().unwrap();
//! }
//! ```

pub mod client;
pub mod context;
pub mod control;
pub mod error;
pub mod handle;
pub mod orchestrator;
pub mod port;
pub mod settings;

pub use client::{teardown, BrokerClient};
pub use context::TestContext;
pub use control::{filter_exchange_lines, filter_queue_lines, is_reserved, RESERVED_PREFIX};
pub use error::HarnessError;
pub use handle::{BrokerConfig, BrokerHandle};
pub use orchestrator::{RabbitMqHarness, RabbitMqHarnessBuilder};
pub use port::{allocate, BindProbe, PortProbe, PortSpec};
pub use settings::{resolve, Overrides, Settings};
