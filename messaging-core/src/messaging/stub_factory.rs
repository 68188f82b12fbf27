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

//! Stub factories and the registry that selects one per address kind.

use crate::address::{Address, AddressKind};
use crate::messaging::stub::MessagingStub;
use crate::observability::events;
use arc_swap::ArcSwap;
use std::collections::HashMap;
use std::error::Error;
use std::fmt::{Display, Formatter};
use std::sync::Arc;
use tracing::{debug, warn};

const COMPONENT: &str = "stub_factory_registry";

#[derive(Clone, Debug, Eq, PartialEq)]
pub enum StubFactoryError {
    /// No transport registered a factory for this address kind.
    NoFactoryForKind(AddressKind),
    /// The factory cannot build a stub for this address at all.
    Configuration { reason: String },
}

impl Display for StubFactoryError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            StubFactoryError::NoFactoryForKind(kind) => {
                write!(f, "no messaging stub factory registered for address kind {kind}")
            }
            StubFactoryError::Configuration { reason } => {
                write!(f, "messaging stub factory configuration error: {reason}")
            }
        }
    }
}

impl Error for StubFactoryError {}

/// Builds stubs for addresses of a single kind.
pub trait MessagingStubFactory: Send + Sync {
    fn create(&self, address: &Address) -> Result<Arc<dyn MessagingStub>, StubFactoryError>;
}

type FactoryTable = HashMap<AddressKind, Arc<dyn MessagingStubFactory>>;

/// Address-kind to factory map, read lock-free on the routing path.
///
/// Registration publishes a new immutable snapshot; it happens during setup.
#[derive(Default)]
pub struct StubFactoryRegistry {
    factories: ArcSwap<FactoryTable>,
}

impl StubFactoryRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers `factory` for `kind`, returning the one it replaced.
    pub fn register(
        &self,
        kind: AddressKind,
        factory: Arc<dyn MessagingStubFactory>,
    ) -> Option<Arc<dyn MessagingStubFactory>> {
        let mut replaced = None;
        self.factories.rcu(|current| {
            let mut next = FactoryTable::clone(current);
            replaced = next.insert(kind, factory.clone());
            next
        });

        debug!(
            event = events::STUB_FACTORY_REGISTER,
            component = COMPONENT,
            address_kind = %kind,
            replaced = replaced.is_some(),
            "registered messaging stub factory"
        );
        replaced
    }

    pub fn is_registered(&self, kind: AddressKind) -> bool {
        self.factories.load().contains_key(&kind)
    }

    /// Builds a stub for `address` through the factory of its kind.
    pub fn create(&self, address: &Address) -> Result<Arc<dyn MessagingStub>, StubFactoryError> {
        let kind = address.kind();
        let factory = self.factories.load().get(&kind).cloned();
        let Some(factory) = factory else {
            warn!(
                event = events::STUB_CREATE_FAILED,
                component = COMPONENT,
                address_kind = %kind,
                "no messaging stub factory for address kind"
            );
            return Err(StubFactoryError::NoFactoryForKind(kind));
        };
        factory.create(address)
    }
}
