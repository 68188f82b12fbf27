/********************************************************************************
 * Copyright (c) 2025 Contributors to the Eclipse Foundation
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

use crate::address::Address;
use crate::runtime::scheduler_runtime::DEFAULT_SCHEDULER_THREAD_NAME;
use serde::{Deserialize, Serialize};
use std::error::Error;
use std::fmt::{Display, Formatter};
use std::path::Path;

#[derive(Debug)]
pub enum ConfigError {
    Io(std::io::Error),
    Parse(json5::Error),
    Invalid { reason: String },
}

impl Display for ConfigError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            ConfigError::Io(err) => write!(f, "unable to read messaging config: {err}"),
            ConfigError::Parse(err) => write!(f, "unable to parse messaging config: {err}"),
            ConfigError::Invalid { reason } => write!(f, "invalid messaging config: {reason}"),
        }
    }
}

impl Error for ConfigError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            ConfigError::Io(err) => Some(err),
            ConfigError::Parse(err) => Some(err),
            ConfigError::Invalid { .. } => None,
        }
    }
}

impl From<std::io::Error> for ConfigError {
    fn from(err: std::io::Error) -> Self {
        ConfigError::Io(err)
    }
}

impl From<json5::Error> for ConfigError {
    fn from(err: json5::Error) -> Self {
        ConfigError::Parse(err)
    }
}

#[derive(Deserialize, Serialize, Debug, Clone, Default, PartialEq)]
#[serde(deny_unknown_fields)]
pub struct MessagingConfig {
    #[serde(default)]
    pub router: RouterConfig,
    #[serde(default)]
    pub scheduler: SchedulerConfig,
}

#[derive(Deserialize, Serialize, Debug, Clone, PartialEq)]
#[serde(deny_unknown_fields, default)]
pub struct RouterConfig {
    pub send_msg_retry_interval_ms: u64,
    pub max_retry_delay_ms: u64,
    pub max_retry_count: Option<u32>,
    /// 0 disables the periodic purge.
    pub routing_table_cleanup_interval_ms: u64,
    pub static_routes: Vec<StaticRoute>,
}

impl Default for RouterConfig {
    fn default() -> Self {
        Self {
            send_msg_retry_interval_ms: 1_000,
            max_retry_delay_ms: 60_000,
            max_retry_count: None,
            routing_table_cleanup_interval_ms: 60_000,
            static_routes: Vec::new(),
        }
    }
}

/// Next hop pinned at router construction.
#[derive(Deserialize, Serialize, Debug, Clone, PartialEq)]
#[serde(deny_unknown_fields)]
pub struct StaticRoute {
    pub participant_id: String,
    pub address: Address,
    #[serde(default)]
    pub is_globally_visible: bool,
}

#[derive(Deserialize, Serialize, Debug, Clone, PartialEq)]
#[serde(deny_unknown_fields, default)]
pub struct SchedulerConfig {
    pub worker_threads: usize,
    pub thread_name: String,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            worker_threads: 2,
            thread_name: DEFAULT_SCHEDULER_THREAD_NAME.to_string(),
        }
    }
}

impl MessagingConfig {
    pub fn from_json5_str(contents: &str) -> Result<Self, ConfigError> {
        let config: MessagingConfig = json5::from_str(contents)?;
        config.validate()?;
        Ok(config)
    }

    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let contents = std::fs::read_to_string(path)?;
        Self::from_json5_str(&contents)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        let router = &self.router;
        if router.send_msg_retry_interval_ms == 0 || router.max_retry_delay_ms == 0 {
            return Err(ConfigError::Invalid {
                reason: "send_msg_retry_interval_ms and max_retry_delay_ms must be positive"
                    .to_string(),
            });
        }
        if router.max_retry_delay_ms < router.send_msg_retry_interval_ms {
            return Err(ConfigError::Invalid {
                reason: format!(
                    "max_retry_delay_ms ({}) is smaller than send_msg_retry_interval_ms ({})",
                    router.max_retry_delay_ms, router.send_msg_retry_interval_ms
                ),
            });
        }
        if self.scheduler.worker_threads == 0 {
            return Err(ConfigError::Invalid {
                reason: "scheduler.worker_threads must be at least 1".to_string(),
            });
        }
        if let Some(route) = router
            .static_routes
            .iter()
            .find(|route| route.participant_id.is_empty())
        {
            return Err(ConfigError::Invalid {
                reason: format!("static route to {} has an empty participant id", route.address),
            });
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::{ConfigError, MessagingConfig};
    use crate::address::Address;
    use std::io::Write;

    #[test]
    fn empty_document_yields_defaults() {
        let config = MessagingConfig::from_json5_str("{}").expect("defaults are valid");

        assert_eq!(config, MessagingConfig::default());
        assert_eq!(config.router.send_msg_retry_interval_ms, 1_000);
        assert_eq!(config.router.max_retry_delay_ms, 60_000);
        assert_eq!(config.router.max_retry_count, None);
        assert_eq!(config.scheduler.worker_threads, 2);
        assert_eq!(config.scheduler.thread_name, "msg-scheduler");
    }

    #[test]
    fn parses_static_routes_and_overrides() {
        let config = MessagingConfig::from_json5_str(
            r#"{
                // comments are allowed
                router: {
                    send_msg_retry_interval_ms: 50,
                    max_retry_delay_ms: 400,
                    max_retry_count: 3,
                    static_routes: [
                        {
                            participant_id: "discovery",
                            address: { kind: "mqtt", broker_uri: "tcp://broker:1883", topic: "discovery" },
                            is_globally_visible: true,
                        },
                    ],
                },
                scheduler: { worker_threads: 1 },
            }"#,
        )
        .expect("config should parse");

        assert_eq!(config.router.max_retry_count, Some(3));
        assert_eq!(config.router.static_routes.len(), 1);
        assert_eq!(
            config.router.static_routes[0].address,
            Address::mqtt("tcp://broker:1883", "discovery")
        );
        assert_eq!(config.scheduler.thread_name, "msg-scheduler");
    }

    #[test]
    fn unknown_fields_are_rejected() {
        let result = MessagingConfig::from_json5_str("{ router: { retry_forever: true } }");

        assert!(matches!(result, Err(ConfigError::Parse(_))));
    }

    #[test]
    fn inconsistent_backoff_is_invalid() {
        let result = MessagingConfig::from_json5_str(
            "{ router: { send_msg_retry_interval_ms: 5000, max_retry_delay_ms: 100 } }",
        );

        assert!(matches!(result, Err(ConfigError::Invalid { .. })));
    }

    #[test]
    fn zero_backoff_is_invalid() {
        for document in [
            "{ router: { send_msg_retry_interval_ms: 0 } }",
            "{ router: { max_retry_delay_ms: 0 } }",
        ] {
            let result = MessagingConfig::from_json5_str(document);

            assert!(
                matches!(result, Err(ConfigError::Invalid { .. })),
                "{document} should be rejected"
            );
        }
    }

    #[test]
    fn zero_worker_threads_is_invalid() {
        let result = MessagingConfig::from_json5_str("{ scheduler: { worker_threads: 0 } }");

        assert!(matches!(result, Err(ConfigError::Invalid { .. })));
    }

    #[test]
    fn loads_from_file() {
        let path = std::env::temp_dir().join(format!(
            "messaging-core-config-{}.json5",
            std::process::id()
        ));
        let mut file = std::fs::File::create(&path).expect("temp file");
        file.write_all(b"{ router: { routing_table_cleanup_interval_ms: 0 } }")
            .expect("write config");

        let config = MessagingConfig::from_file(&path).expect("config should load");
        let _ = std::fs::remove_file(&path);

        assert_eq!(config.router.routing_table_cleanup_interval_ms, 0);
    }

    #[test]
    fn missing_file_is_an_io_error() {
        let result = MessagingConfig::from_file("/nonexistent/messaging.json5");

        assert!(matches!(result, Err(ConfigError::Io(_))));
    }
}
