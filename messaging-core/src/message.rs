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

//! Message envelope as seen by the routing core.
//!
//! The payload stays opaque; only the header fields below are read while routing.

use crate::address::Address;
use crate::expiry::ExpiryDate;
use std::fmt::{Display, Formatter};
use std::time::Duration;
use uuid::Uuid;

#[derive(Clone, Copy, Debug, Eq, Hash, PartialEq)]
pub enum MessageType {
    Request,
    OneWay,
    Reply,
    SubscriptionRequest,
    BroadcastSubscriptionRequest,
    SubscriptionReply,
    SubscriptionStop,
    Publication,
}

impl MessageType {
    /// Message types that expect an answer and may carry a reply-to address.
    pub fn is_request(&self) -> bool {
        matches!(
            self,
            MessageType::Request
                | MessageType::SubscriptionRequest
                | MessageType::BroadcastSubscriptionRequest
        )
    }

    pub fn is_reply(&self) -> bool {
        matches!(self, MessageType::Reply | MessageType::SubscriptionReply)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            MessageType::Request => "request",
            MessageType::OneWay => "one_way",
            MessageType::Reply => "reply",
            MessageType::SubscriptionRequest => "subscription_request",
            MessageType::BroadcastSubscriptionRequest => "broadcast_subscription_request",
            MessageType::SubscriptionReply => "subscription_reply",
            MessageType::SubscriptionStop => "subscription_stop",
            MessageType::Publication => "publication",
        }
    }
}

impl Display for MessageType {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Immutable message envelope.
#[derive(Clone, Debug, PartialEq)]
pub struct Message {
    pub id: String,
    pub sender: String,
    pub recipient: String,
    pub expiry_date: ExpiryDate,
    pub message_type: MessageType,
    pub reply_to: Option<Address>,
    /// Set by the publishing side for [`MessageType::Publication`].
    pub subscription_id: Option<String>,
    /// Whether the message arrived over a global (off-runtime) transport.
    pub received_from_global: bool,
    pub payload: Vec<u8>,
}

impl Message {
    pub fn builder(
        message_type: MessageType,
        sender: impl Into<String>,
        recipient: impl Into<String>,
    ) -> MessageBuilder {
        MessageBuilder::new(message_type, sender, recipient)
    }

    pub fn is_expired(&self) -> bool {
        self.expiry_date.is_expired()
    }

    /// Short identification used in logs.
    pub fn tracking_info(&self) -> String {
        format!(
            "id={} type={} sender={} recipient={} expiry={}",
            self.id, self.message_type, self.sender, self.recipient, self.expiry_date
        )
    }
}

pub struct MessageBuilder {
    message: Message,
}

impl MessageBuilder {
    fn new(
        message_type: MessageType,
        sender: impl Into<String>,
        recipient: impl Into<String>,
    ) -> Self {
        Self {
            message: Message {
                id: Uuid::new_v4().to_string(),
                sender: sender.into(),
                recipient: recipient.into(),
                expiry_date: ExpiryDate::Never,
                message_type,
                reply_to: None,
                subscription_id: None,
                received_from_global: false,
                payload: Vec::new(),
            },
        }
    }

    pub fn id(mut self, id: impl Into<String>) -> Self {
        self.message.id = id.into();
        self
    }

    pub fn ttl(mut self, ttl: Duration) -> Self {
        self.message.expiry_date = ExpiryDate::from_now(ttl);
        self
    }

    pub fn expiry_date(mut self, expiry_date: ExpiryDate) -> Self {
        self.message.expiry_date = expiry_date;
        self
    }

    pub fn reply_to(mut self, address: Address) -> Self {
        self.message.reply_to = Some(address);
        self
    }

    pub fn subscription_id(mut self, subscription_id: impl Into<String>) -> Self {
        self.message.subscription_id = Some(subscription_id.into());
        self
    }

    pub fn received_from_global(mut self, received_from_global: bool) -> Self {
        self.message.received_from_global = received_from_global;
        self
    }

    pub fn payload(mut self, payload: impl Into<Vec<u8>>) -> Self {
        self.message.payload = payload.into();
        self
    }

    pub fn build(self) -> Message {
        self.message
    }
}

#[cfg(test)]
mod tests {
    use super::{Message, MessageType};
    use crate::expiry::ExpiryDate;
    use std::time::Duration;

    #[test]
    fn builder_generates_unique_ids() {
        let a = Message::builder(MessageType::Request, "consumer", "provider").build();
        let b = Message::builder(MessageType::Request, "consumer", "provider").build();

        assert_ne!(a.id, b.id);
        assert_eq!(a.expiry_date, ExpiryDate::Never);
    }

    #[test]
    fn elapsed_deadline_is_expired() {
        let message = Message::builder(MessageType::OneWay, "a", "b")
            .expiry_date(ExpiryDate::at_millis(1))
            .build();

        assert!(message.is_expired());

        let fresh = Message::builder(MessageType::OneWay, "a", "b")
            .ttl(Duration::from_secs(30))
            .build();
        assert!(!fresh.is_expired());
    }

    #[test]
    fn request_classification() {
        assert!(MessageType::Request.is_request());
        assert!(MessageType::BroadcastSubscriptionRequest.is_request());
        assert!(!MessageType::Publication.is_request());
        assert!(MessageType::SubscriptionReply.is_reply());
    }
}
