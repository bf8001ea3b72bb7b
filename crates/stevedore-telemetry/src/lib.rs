//! Stevedore Telemetry - logging setup for the stevedore deployer.
//!
//! # Example
//!
//! ```rust,no_run
//! use stevedore_telemetry::{LogConfig, LogFormat, setup_logging};
//!
//! # fn main() -> Result<(), stevedore_telemetry::TelemetryError> {
//! let config = LogConfig::new("debug")
//!     .with_format(LogFormat::Json)
//!     .with_directive("stevedore_deployer=trace");
//!
//! setup_logging(&config)?;
//! tracing::info!("Deployer activated");
//! # Ok(())
//! # }
//! ```

#![deny(unsafe_code)]
#![deny(missing_docs)]
#![deny(clippy::all)]
#![warn(unreachable_pub)]
#![deny(clippy::unwrap_used)]
#![cfg_attr(test, allow(clippy::unwrap_used))]

mod error;
mod logging;

pub use error::{TelemetryError, TelemetryResult};
pub use logging::{LogConfig, LogFormat, LogTarget, setup_default_logging, setup_logging};
