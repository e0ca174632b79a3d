pub mod address;
pub mod config;
pub mod context;
pub mod error;
pub mod report;
pub mod trigger;

pub use address::{Address, AddressSpec, Protocol};
pub use config::{ConfigLoader, ServiceConfig, Stage};
pub use context::Context;
pub use error::{ErrorKind, ServiceError, ServiceResult};
pub use report::ErrorReporter;
pub use trigger::*;
