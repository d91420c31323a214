//! Persistent inputs: the operator's settings file and the host list.

pub mod hostlist;
pub mod settings;

pub use settings::default_settings;
