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

//! AMQP connection and teardown helper.
//!
//! The client owns its connection and borrows the [`BrokerHandle`] only to
//! enumerate resources during teardown. Teardown order is fixed: broker-side
//! cleanup first, then connection close.

use lapin::options::{ExchangeDeleteOptions, QueueDeleteOptions};
use lapin::{Channel, Connection, ConnectionProperties};

use crate::control;
use crate::error::HarnessError;
use crate::handle::BrokerHandle;

const CLOSE_REPLY_CODE: u16 = 200;

/// Open connection to a running broker.
pub struct BrokerClient {
    uri: String,
    connection: Connection,
}

impl BrokerClient {
    /// Connect to a broker that has already reached readiness.
    pub async fn connect(broker: &BrokerHandle) -> Result<Self, HarnessError> {
        let uri = broker.amqp_uri();
        let connection = Connection::connect(&uri, ConnectionProperties::default())
            .await
            .map_err(|source| HarnessError::ConnectionFailed {
                uri: uri.clone(),
                source,
            })?;
        Ok(Self { uri, connection })
    }

    pub fn connection(&self) -> &Connection {
        &self.connection
    }

    pub fn uri(&self) -> &str {
        &self.uri
    }

    pub async fn channel(&self) -> Result<Channel, HarnessError> {
        self.connection
            .create_channel()
            .await
            .map_err(|source| HarnessError::Amqp {
                context: "opening channel".to_string(),
                source,
            })
    }

    /// Delete every non-reserved exchange and queue currently declared on the
    /// broker. Names under the broker-reserved prefix are skipped; deleting
    /// them is refused by the broker.
    pub async fn clear(&self, broker: &BrokerHandle) -> Result<(), HarnessError> {
        let channel = self.channel().await?;

        for exchange in broker.list_exchanges()? {
            if control::is_reserved(&exchange) {
                continue;
            }
            channel
                .exchange_delete(&exchange, ExchangeDeleteOptions::default())
                .await
                .map_err(|source| HarnessError::Amqp {
                    context: format!("deleting exchange {exchange}"),
                    source,
                })?;
        }

        for queue in broker.list_queues()? {
            if control::is_reserved(&queue) {
                continue;
            }
            channel
                .queue_delete(&queue, QueueDeleteOptions::default())
                .await
                .map_err(|source| HarnessError::Amqp {
                    context: format!("deleting queue {queue}"),
                    source,
                })?;
        }

        Ok(())
    }

    /// Close the connection. A close racing the broker's own channel shutdown
    /// is logged and swallowed; any other failure propagates.
    pub async fn close(self) -> Result<(), HarnessError> {
        match self
            .connection
            .close(CLOSE_REPLY_CODE, "rabbitmq-harness teardown")
            .await
        {
            Ok(()) => Ok(()),
            Err(lapin::Error::InvalidChannelState(state)) => {
                log::warn!("channel already in state {state:?} while closing {}", self.uri);
                Ok(())
            }
            Err(lapin::Error::InvalidConnectionState(state)) => {
                log::warn!(
                    "connection already in state {state:?} while closing {}",
                    self.uri
                );
                Ok(())
            }
            Err(source) => Err(HarnessError::Amqp {
                context: format!("closing connection to {}", self.uri),
                source,
            }),
        }
    }
}

/// Clear broker-side state through `client`, then close it, in that order.
pub async fn teardown(broker: &BrokerHandle, client: BrokerClient) -> Result<(), HarnessError> {
    client.clear(broker).await?;
    client.close().await
}
