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

use std::io;
use std::path::PathBuf;

use thiserror::Error;

use crate::port::PortSpec;

/// Errors produced while allocating ports, launching the broker, querying it
/// through the control utility, or tearing it down.
///
/// Setup failures (`PortUnavailable`, `PortCollision`, `ProcessSpawn`,
/// `ProcessCrashed`, `StartupTimeout`, `ConnectionFailed`) abort the fixture
/// before any test runs. A broker process that already exited at stop time and
/// a connection close racing the broker's own shutdown are recovered in place
/// and never surface here.
#[derive(Debug, Error)]
pub enum HarnessError {
    #[error("no free port satisfies {spec:?}")]
    PortUnavailable { spec: PortSpec },

    #[error("port {port} was resolved for both the broker and distribution listeners")]
    PortCollision { port: u16 },

    #[error("failed to spawn {binary}: {source}")]
    ProcessSpawn {
        binary: String,
        #[source]
        source: io::Error,
    },

    #[error(
        "{binary} exited with code {exit_code:?} before accepting connections\n\
         === STDOUT ===\n{stdout}\n=== STDERR ===\n{stderr}"
    )]
    ProcessCrashed {
        binary: String,
        exit_code: Option<i32>,
        stdout: String,
        stderr: String,
    },

    #[error("{binary} did not accept connections on {address} within {timeout_secs} seconds")]
    StartupTimeout {
        binary: String,
        address: String,
        timeout_secs: u64,
    },

    #[error("failed to reap {binary} during shutdown: {source}")]
    ProcessStop {
        binary: String,
        #[source]
        source: io::Error,
    },

    #[error("control command {command:?} exited with code {exit_code:?}: {stderr}")]
    ControlInvocationFailed {
        command: Vec<String>,
        exit_code: Option<i32>,
        stderr: String,
    },

    #[error("failed to connect to {uri}: {source}")]
    ConnectionFailed {
        uri: String,
        #[source]
        source: lapin::Error,
    },

    #[error("AMQP operation failed while {context}: {source}")]
    Amqp {
        context: String,
        #[source]
        source: lapin::Error,
    },

    #[error("filesystem error for {path:?}: {source}")]
    FileSystem {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
}
