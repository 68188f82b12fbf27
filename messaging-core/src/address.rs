/********************************************************************************
 * Copyright (c) 2024 Contributors to the Eclipse Foundation
 *
 * See the NOTICE file(s) distributed with this work for additional
 * information regarding copyright ownership.
 *
 * This program and the accompanying materials are made available under the
 * terms of the Apache License Version 2.0 which is available at
 * https://www.apache.org/licenses/LICENSE-2.0
 *
 * SPDX-License-Identifier: Apache-2.0
 ********************************************************************************/

//! Transport-specific reachability descriptors.
//!
//! [`Address`] is a closed sum type; equality and hashing are structural so that an
//! address can key the messaging stub cache directly.

use serde::{Deserialize, Serialize};
use std::fmt::{Display, Formatter};

/// Delivery to a receiver living in the same process.
#[derive(Clone, Debug, Eq, Hash, PartialEq, Serialize, Deserialize)]
pub struct InProcessAddress {
    pub participant_id: String,
}

/// HTTP long-polling channel.
#[derive(Clone, Debug, Eq, Hash, PartialEq, Serialize, Deserialize)]
pub struct ChannelAddress {
    pub messaging_endpoint_url: String,
    pub channel_id: String,
}

#[derive(Clone, Copy, Debug, Eq, Hash, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum WebSocketProtocol {
    Ws,
    Wss,
}

/// WebSocket server endpoint reachable by host, port and path.
#[derive(Clone, Debug, Eq, Hash, PartialEq, Serialize, Deserialize)]
pub struct WebSocketAddress {
    pub protocol: WebSocketProtocol,
    pub host: String,
    pub port: u16,
    pub path: String,
}

/// WebSocket client connected to this runtime, identified by its client id.
#[derive(Clone, Debug, Eq, Hash, PartialEq, Serialize, Deserialize)]
pub struct WebSocketClientAddress {
    pub id: String,
}

/// Binder IPC endpoint of another application.
#[derive(Clone, Debug, Eq, Hash, PartialEq, Serialize, Deserialize)]
pub struct BinderAddress {
    pub package_name: String,
    pub user_id: u32,
}

/// MQTT broker and topic.
#[derive(Clone, Debug, Eq, Hash, PartialEq, Serialize, Deserialize)]
pub struct MqttAddress {
    pub broker_uri: String,
    pub topic: String,
}

/// Communication endpoint of a participant.
#[derive(Clone, Debug, Eq, Hash, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Address {
    InProcess(InProcessAddress),
    HttpChannel(ChannelAddress),
    WebSocketServer(WebSocketAddress),
    WebSocketClient(WebSocketClientAddress),
    Binder(BinderAddress),
    Mqtt(MqttAddress),
}

/// Variant tag of an [`Address`], used to select the stub factory.
#[derive(Clone, Copy, Debug, Eq, Hash, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AddressKind {
    InProcess,
    HttpChannel,
    WebSocketServer,
    WebSocketClient,
    Binder,
    Mqtt,
}

impl Address {
    pub fn kind(&self) -> AddressKind {
        match self {
            Address::InProcess(_) => AddressKind::InProcess,
            Address::HttpChannel(_) => AddressKind::HttpChannel,
            Address::WebSocketServer(_) => AddressKind::WebSocketServer,
            Address::WebSocketClient(_) => AddressKind::WebSocketClient,
            Address::Binder(_) => AddressKind::Binder,
            Address::Mqtt(_) => AddressKind::Mqtt,
        }
    }

    pub fn in_process(participant_id: impl Into<String>) -> Self {
        Address::InProcess(InProcessAddress {
            participant_id: participant_id.into(),
        })
    }

    pub fn http_channel(
        messaging_endpoint_url: impl Into<String>,
        channel_id: impl Into<String>,
    ) -> Self {
        Address::HttpChannel(ChannelAddress {
            messaging_endpoint_url: messaging_endpoint_url.into(),
            channel_id: channel_id.into(),
        })
    }

    pub fn websocket_server(
        protocol: WebSocketProtocol,
        host: impl Into<String>,
        port: u16,
        path: impl Into<String>,
    ) -> Self {
        Address::WebSocketServer(WebSocketAddress {
            protocol,
            host: host.into(),
            port,
            path: path.into(),
        })
    }

    pub fn websocket_client(id: impl Into<String>) -> Self {
        Address::WebSocketClient(WebSocketClientAddress { id: id.into() })
    }

    pub fn binder(package_name: impl Into<String>, user_id: u32) -> Self {
        Address::Binder(BinderAddress {
            package_name: package_name.into(),
            user_id,
        })
    }

    pub fn mqtt(broker_uri: impl Into<String>, topic: impl Into<String>) -> Self {
        Address::Mqtt(MqttAddress {
            broker_uri: broker_uri.into(),
            topic: topic.into(),
        })
    }

    /// In-process addresses never leave the runtime.
    pub fn is_local(&self) -> bool {
        matches!(self, Address::InProcess(_))
    }
}

impl Display for AddressKind {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            AddressKind::InProcess => "in_process",
            AddressKind::HttpChannel => "http_channel",
            AddressKind::WebSocketServer => "websocket_server",
            AddressKind::WebSocketClient => "websocket_client",
            AddressKind::Binder => "binder",
            AddressKind::Mqtt => "mqtt",
        };
        f.write_str(name)
    }
}

impl Display for Address {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Address::InProcess(address) => write!(f, "inprocess://{}", address.participant_id),
            Address::HttpChannel(address) => write!(
                f,
                "{}#{}",
                address.messaging_endpoint_url, address.channel_id
            ),
            Address::WebSocketServer(address) => {
                let scheme = match address.protocol {
                    WebSocketProtocol::Ws => "ws",
                    WebSocketProtocol::Wss => "wss",
                };
                write!(
                    f,
                    "{scheme}://{}:{}{}",
                    address.host, address.port, address.path
                )
            }
            Address::WebSocketClient(address) => write!(f, "wsclient://{}", address.id),
            Address::Binder(address) => {
                write!(f, "binder://{}@{}", address.package_name, address.user_id)
            }
            Address::Mqtt(address) => write!(f, "{}/{}", address.broker_uri, address.topic),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::{Address, AddressKind, WebSocketProtocol};
    use std::collections::HashSet;

    #[test]
    fn equality_is_structural() {
        let a = Address::mqtt("tcp://broker:1883", "joynr/p1");
        let b = Address::mqtt("tcp://broker:1883", "joynr/p1");
        let c = Address::mqtt("tcp://broker:1883", "joynr/p2");

        assert_eq!(a, b);
        assert_ne!(a, c);

        let set: HashSet<Address> = [a, b, c].into_iter().collect();
        assert_eq!(set.len(), 2);
    }

    #[test]
    fn kind_matches_variant() {
        assert_eq!(Address::in_process("p").kind(), AddressKind::InProcess);
        assert_eq!(
            Address::http_channel("http://bounceproxy/", "ch").kind(),
            AddressKind::HttpChannel
        );
        assert_eq!(
            Address::websocket_server(WebSocketProtocol::Ws, "localhost", 4242, "/").kind(),
            AddressKind::WebSocketServer
        );
        assert_eq!(
            Address::websocket_client("client-1").kind(),
            AddressKind::WebSocketClient
        );
        assert_eq!(Address::binder("io.joynr.app", 0).kind(), AddressKind::Binder);
        assert_eq!(Address::mqtt("tcp://b", "t").kind(), AddressKind::Mqtt);
    }

    #[test]
    fn display_renders_websocket_url() {
        let address = Address::websocket_server(WebSocketProtocol::Wss, "cc.local", 4243, "/ws");

        assert_eq!(address.to_string(), "wss://cc.local:4243/ws");
    }

    #[test]
    fn deserializes_tagged_json5() {
        let address: Address =
            json5::from_str("{ kind: 'binder', package_name: 'io.joynr.app', user_id: 10 }")
                .expect("binder address should parse");

        assert_eq!(address, Address::binder("io.joynr.app", 10));
    }
}
