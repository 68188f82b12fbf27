//! Transport-facing contracts: outbound stubs, their factories and inbound skeletons.

pub mod in_process;
pub mod skeleton;
pub mod stub;
pub mod stub_factory;
