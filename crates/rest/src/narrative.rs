//! Narrative generation hook.
//!
//! The templating engine that renders human-readable summaries lives outside
//! this crate. The server only knows the [`NarrativeGenerator`] contract and
//! applies it to outgoing resources that carry no narrative of their own.

use serde_json::Value;
use tracing::debug;

/// Renders the `text` element of a resource.
pub trait NarrativeGenerator: Send + Sync {
    /// Returns the XHTML `div` for the resource, or `None` if the generator
    /// has no template for it.
    fn generate(&self, resource: &Value) -> Option<String>;
}

/// Adds a generated narrative to `resource` if it has none.
///
/// Returns true if a narrative was added.
pub fn apply_narrative(generator: &dyn NarrativeGenerator, resource: &mut Value) -> bool {
    if resource.get("text").is_some() {
        return false;
    }

    let Some(div) = generator.generate(resource) else {
        return false;
    };

    match resource.as_object_mut() {
        Some(object) => {
            debug!(
                resource_type = object.get("resourceType").and_then(|t| t.as_str()).unwrap_or("unknown"),
                "Generated narrative"
            );
            object.insert(
                "text".to_string(),
                serde_json::json!({
                    "status": "generated",
                    "div": div
                }),
            );
            true
        }
        None => false,
    }
}
