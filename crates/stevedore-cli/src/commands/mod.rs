//! CLI command handlers.

pub(crate) mod check;
pub(crate) mod config;
pub(crate) mod ledger;
pub(crate) mod scan;
