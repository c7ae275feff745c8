use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::app::config::MatchingOptions;
use crate::app::error::AppError;
use crate::app::matching::generator::generate_smart_conditions;
use crate::app::models::SmartMatchingConditions;
use crate::app::ui_dump::parse::parse_ui_dump;
use crate::app::ui_dump::tree::{NodeId, UiTree};

/// Loose description of an element captured earlier (from a previous dump or
/// a persisted automation step), used to re-locate it in a fresh snapshot.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct ElementHint {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub resource_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub text: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub content_desc: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub class_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub bounds: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub path: Option<String>,
}

/// Re-locate a hinted element. Tries the positional path first, then an
/// exact bounds match, then a scored attribute match where at least half of
/// the provided hint fields must agree. `None` is the normal "not on this
/// screen" outcome, not an error.
pub fn find_element(tree: &UiTree, hint: &ElementHint) -> Option<NodeId> {
    if let Some(path) = hint.path.as_deref() {
        if let Some(id) = tree.find_by_path(path) {
            return Some(id);
        }
    }

    if let Some(bounds) = hint.bounds.as_deref() {
        if let Some(id) = tree.find_by_bounds(bounds) {
            return Some(id);
        }
    }

    tree.ids().find(|&id| hint_matches(tree, id, hint))
}

fn hint_matches(tree: &UiTree, id: NodeId, hint: &ElementHint) -> bool {
    let attrs = &tree.node(id).attrs;
    let wanted = [
        ("resource-id", hint.resource_id.as_deref()),
        ("text", hint.text.as_deref()),
        ("content-desc", hint.content_desc.as_deref()),
        ("class", hint.class_name.as_deref()),
        ("bounds", hint.bounds.as_deref()),
    ];

    let mut checks = 0;
    let mut matched = 0;
    for (name, value) in wanted {
        if let Some(value) = value {
            checks += 1;
            if attrs.get(name) == Some(value) {
                matched += 1;
            }
        }
    }
    checks > 0 && matched * 2 >= checks
}

/// Top-level convenience: clean and parse a raw dump, re-locate the hinted
/// element and generate matching conditions for it.
pub fn build_conditions_from_hint(
    xml: &str,
    hint: &ElementHint,
    options: &MatchingOptions,
    trace_id: &str,
) -> Result<SmartMatchingConditions, AppError> {
    let tree =
        parse_ui_dump(xml).map_err(|err| AppError::parse(err, trace_id))?;
    let Some(id) = find_element(&tree, hint) else {
        return Err(AppError::validation(
            "Target element not found in dump",
            trace_id,
        ));
    };
    debug!(node = id.index(), trace_id, "located target element");
    Ok(generate_smart_conditions(&tree, id, options))
}
