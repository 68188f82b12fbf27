/********************************************************************************
 * Copyright (c) 2026 Contributors to the Eclipse Foundation
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

//! Canonical structured field values and value-format helpers.

use crate::address::Address;
use crate::message::Message;

pub const NONE: &str = "none";
pub const REASON_CHANNEL_CLOSED: &str = "channel_closed";
pub const REASON_INVALID_THREAD_NAME: &str = "invalid_thread_name";
pub const DEFAULT_WORKER_THREAD: &str = "unknown-thread";

/// Pre-rendered message fields, built once per log site.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct FormattedMessageFields {
    pub msg_id: String,
    pub msg_type: &'static str,
    pub sender: String,
    pub recipient: String,
}

impl FormattedMessageFields {
    pub fn from_message(message: &Message) -> Self {
        Self {
            msg_id: message.id.clone(),
            msg_type: message.message_type.as_str(),
            sender: format_participant(&message.sender),
            recipient: format_participant(&message.recipient),
        }
    }
}

pub fn format_participant(participant_id: &str) -> String {
    if participant_id.is_empty() {
        NONE.to_string()
    } else {
        participant_id.to_string()
    }
}

pub fn format_address(address: Option<&Address>) -> String {
    address
        .map(|address| address.to_string())
        .unwrap_or_else(|| NONE.to_string())
}

pub fn thread_name_or_default(thread_name: Option<&str>) -> String {
    thread_name.unwrap_or(DEFAULT_WORKER_THREAD).to_string()
}

pub fn current_thread_name_or_default() -> String {
    thread_name_or_default(std::thread::current().name())
}
