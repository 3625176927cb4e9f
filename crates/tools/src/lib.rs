pub mod descriptions;
pub mod file_tools;
pub mod registry;
pub mod traits;

pub use file_tools::{CheckFileSafetyTool, ListFilesTool, ReadFileTool};
pub use registry::{ToolInfo, ToolRegistry};
pub use traits::{Tool, ToolError};

use poisonlab_policy::{PathMediator, Variant};
use std::sync::Arc;

/// Register the demo tools with the descriptions for `variant`.
pub fn build_registry(variant: Variant, mediator: Arc<PathMediator>) -> ToolRegistry {
    let (read, check, list) = match variant {
        Variant::Vulnerable => (
            descriptions::vulnerable::READ_FILE,
            descriptions::vulnerable::CHECK_FILE_SAFETY,
            descriptions::vulnerable::LIST_FILES,
        ),
        Variant::Secure => (
            descriptions::secure::READ_FILE,
            descriptions::secure::CHECK_FILE_SAFETY,
            descriptions::secure::LIST_FILES,
        ),
    };

    let mut registry = ToolRegistry::new();
    registry
        .register(Arc::new(ReadFileTool::new(mediator.clone(), read)))
        .register(Arc::new(CheckFileSafetyTool::new(mediator.clone(), check)))
        .register(Arc::new(ListFilesTool::new(mediator, list)));

    tracing::info!(
        "Registered {} tools for {} variant",
        registry.count(),
        variant
    );
    registry
}
