//! CLI command implementations.

pub mod profitability;
pub mod run;
pub mod strategies;
pub mod template;
pub mod validate;
