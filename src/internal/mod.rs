//! Internal building blocks of the purchases bridge.

pub mod decoder;
pub mod registry;
