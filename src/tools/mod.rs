/// Tools Module
///
/// Each tool lives in its own module exporting a `register` function that
/// adds it to the registry during server initialization.

pub mod analyze;
pub mod document;
pub mod format;
pub mod python;

use crate::core::config::ToolSettings;
use crate::core::registry::ToolRegistry;

/// Register every tool, in the order `tools/list` reports them.
pub fn register_all(registry: &mut ToolRegistry, settings: &ToolSettings) {
    analyze::register(registry);
    format::register(registry, &settings.format_code);
    document::register(registry, &settings.document_code);
}
