//! Built-in transforms for specific data sources.

mod fund_compare;

use super::transform::TransformRegistry;

pub use fund_compare::process_fund_compare;

/// Register all built-in transforms with the registry.
pub fn register_builtin(registry: &mut TransformRegistry) {
    registry.register(fund_compare::JOB_NAME, process_fund_compare);
}
