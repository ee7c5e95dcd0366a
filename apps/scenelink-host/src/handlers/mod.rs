//! Handlers 模块

pub mod bindings;
pub mod health;
pub mod metrics;
pub mod profiles;
pub mod streaming;

pub use bindings::*;
pub use health::*;
pub use metrics::*;
pub use profiles::*;
pub use streaming::*;
