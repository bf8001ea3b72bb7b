//! Shared test utilities for the stevedore deployer.
//!
//! Provides a recording [`MockRegistry`], an in-memory [`MemoryUnit`] and
//! fixtures for descriptors and unit directories. Intended as a
//! dev-dependency.
//!
//! ```rust,ignore
//! use std::sync::Arc;
//! use stevedore_test::{MockRegistry, test_capability, test_managed_unit};
//!
//! let (unit, descriptor) = test_managed_unit("web", &[test_capability("http")]);
//! let registry = Arc::new(MockRegistry::new().with_descriptor(descriptor));
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs)]
#![deny(clippy::all)]
#![warn(unreachable_pub)]

pub mod fixtures;
pub mod harness;
pub mod mocks;

pub use fixtures::*;
pub use harness::*;
pub use mocks::*;
