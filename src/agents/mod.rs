// Agent lifecycle

pub mod service;

pub use service::*;
