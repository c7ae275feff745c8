use crate::app::models::{FieldHierarchy, NodeAttributes, NodeHierarchyAnalysis, NodeLevel};
use crate::app::ui_dump::tree::{NodeId, UiTree};

/// Attributes that identify an element by meaning rather than position.
pub const SEMANTIC_FIELDS: &[&str] = &["resource-id", "content-desc", "text", "class"];

/// Snapshot one node's surroundings: own attributes, parent, children,
/// descendants, siblings, depth and a synthesized path.
///
/// Pure derivation over the given tree; a dangling id panics on the arena
/// index (caller contract violation, not a runtime condition).
pub fn analyze_node_hierarchy(tree: &UiTree, id: NodeId) -> NodeHierarchyAnalysis {
    let current = extract_node_attributes(tree, id);
    let parent = tree
        .parent(id)
        .map(|parent| extract_node_attributes(tree, parent));
    let children = tree
        .children(id)
        .iter()
        .map(|&child| extract_node_attributes(tree, child))
        .collect();
    let descendants = tree
        .descendants(id)
        .into_iter()
        .map(|descendant| extract_node_attributes(tree, descendant))
        .collect();
    let siblings = tree
        .siblings(id)
        .into_iter()
        .map(|sibling| extract_node_attributes(tree, sibling))
        .collect();

    NodeHierarchyAnalysis {
        current,
        parent,
        children,
        descendants,
        siblings,
        depth: tree.depth(id),
        path: node_path(tree, id),
    }
}

/// Flatten a node's XML attributes. Non-empty subtree text overrides an
/// explicit `text` attribute, matching how a dump viewer presents the node.
pub fn extract_node_attributes(tree: &UiTree, id: NodeId) -> NodeAttributes {
    let mut attrs = tree.node(id).attrs.clone();
    let text = tree.text_content(id);
    if !text.is_empty() {
        attrs.text = Some(text);
    }
    attrs
}

/// Positional identity of a node inside one snapshot: `tag[n]` per ancestor,
/// n being the 1-based position among same-tag siblings.
pub fn node_path(tree: &UiTree, id: NodeId) -> String {
    let mut parts = Vec::new();
    let mut current = Some(id);
    while let Some(node) = current {
        parts.push(format!(
            "{}[{}]",
            tree.node(node).tag,
            tree.position_among_same_tag(node)
        ));
        current = tree.parent(node);
    }
    parts.reverse();
    format!("/{}", parts.join("/"))
}

/// Attribute the first level at which `field_name == value` holds. Priority:
/// self, parent, first matching child, first matching descendant, first
/// matching sibling — so a value present at several levels is always pinned
/// to the closest one.
pub fn classify_field_hierarchy(
    analysis: &NodeHierarchyAnalysis,
    field_name: &str,
    value: &str,
) -> Option<FieldHierarchy> {
    if analysis.current.get(field_name) == Some(value) {
        return Some(FieldHierarchy {
            level: NodeLevel::Current,
            field_name: field_name.to_string(),
            display_name: format!("self.{field_name}"),
            description: format!("{field_name} attribute of the current node"),
            depth: Some(0),
        });
    }

    if let Some(parent) = &analysis.parent {
        if parent.get(field_name) == Some(value) {
            return Some(FieldHierarchy {
                level: NodeLevel::Parent,
                field_name: field_name.to_string(),
                display_name: format!("parent.{field_name}"),
                description: format!("{field_name} attribute of the parent node"),
                depth: Some(-1),
            });
        }
    }

    if let Some(index) = analysis
        .children
        .iter()
        .position(|child| child.get(field_name) == Some(value))
    {
        return Some(FieldHierarchy {
            level: NodeLevel::Child,
            field_name: field_name.to_string(),
            display_name: format!("child[{index}].{field_name}"),
            description: format!("{} attribute of child {}", field_name, index + 1),
            depth: Some(1),
        });
    }

    if let Some(index) = analysis
        .descendants
        .iter()
        .position(|descendant| descendant.get(field_name) == Some(value))
    {
        return Some(FieldHierarchy {
            level: NodeLevel::Descendant,
            field_name: field_name.to_string(),
            display_name: format!("descendant[{index}].{field_name}"),
            description: format!("{field_name} attribute of a descendant node"),
            depth: Some(-1),
        });
    }

    if let Some(index) = analysis
        .siblings
        .iter()
        .position(|sibling| sibling.get(field_name) == Some(value))
    {
        return Some(FieldHierarchy {
            level: NodeLevel::Sibling,
            field_name: field_name.to_string(),
            display_name: format!("sibling[{index}].{field_name}"),
            description: format!("{} attribute of sibling {}", field_name, index + 1),
            depth: Some(0),
        });
    }

    None
}

/// Locate where a text value actually lives below the node: direct children
/// first, then deeper descendants with an estimated depth.
pub fn find_text_field_location(
    analysis: &NodeHierarchyAnalysis,
    target_text: &str,
) -> Option<FieldHierarchy> {
    for (index, child) in analysis.children.iter().enumerate() {
        if child.get("text") == Some(target_text) {
            return Some(FieldHierarchy {
                level: NodeLevel::Child,
                field_name: "text".to_string(),
                display_name: format!("child[{index}].text"),
                description: format!("text content of child {}", index + 1),
                depth: Some(1),
            });
        }
    }

    for (index, descendant) in analysis.descendants.iter().enumerate() {
        if descendant.get("text") == Some(target_text) {
            let depth = estimate_descendant_depth(descendant);
            return Some(FieldHierarchy {
                level: NodeLevel::Descendant,
                field_name: "text".to_string(),
                display_name: format!("descendant[{index}].text"),
                description: format!(
                    "text content of a descendant node (estimated depth {depth})"
                ),
                depth: Some(depth),
            });
        }
    }

    None
}

/// Rough depth guess from the widget class name. Best effort only; -1 means
/// unknown.
fn estimate_descendant_depth(attrs: &NodeAttributes) -> i32 {
    match attrs.get("class") {
        Some(class_name) if class_name.contains("TextView") => 2,
        Some(class_name) if class_name.contains("Button") => 1,
        _ => -1,
    }
}

#[derive(Debug, Clone)]
pub struct FieldCombinationPreferences {
    pub prefer_parent_fields: bool,
    pub prefer_child_fields: bool,
}

impl Default for FieldCombinationPreferences {
    fn default() -> Self {
        Self {
            prefer_parent_fields: true,
            prefer_child_fields: true,
        }
    }
}

/// Seed a small, level-consistent field set for condition generation: own
/// semantic fields first, parent fields if the node is semantically thin,
/// child fields as a last resort, never more than four entries.
pub fn generate_intelligent_field_combination(
    analysis: &NodeHierarchyAnalysis,
    preferences: &FieldCombinationPreferences,
) -> Vec<FieldHierarchy> {
    let mut result = Vec::new();

    for &field in SEMANTIC_FIELDS {
        if non_empty(&analysis.current, field) {
            result.push(FieldHierarchy {
                level: NodeLevel::Current,
                field_name: field.to_string(),
                display_name: format!("self.{field}"),
                description: format!("{field} attribute of the current node"),
                depth: Some(0),
            });
        }
    }

    if result.len() < 2 && preferences.prefer_parent_fields {
        if let Some(parent) = &analysis.parent {
            for &field in SEMANTIC_FIELDS {
                if non_empty(parent, field) {
                    result.push(FieldHierarchy {
                        level: NodeLevel::Parent,
                        field_name: field.to_string(),
                        display_name: format!("parent.{field}"),
                        description: format!("{field} attribute of the parent node"),
                        depth: Some(-1),
                    });
                }
            }
        }
    }

    if result.len() < 2 && preferences.prefer_child_fields {
        for (index, child) in analysis.children.iter().enumerate() {
            for &field in SEMANTIC_FIELDS {
                if non_empty(child, field) && result.len() < 4 {
                    result.push(FieldHierarchy {
                        level: NodeLevel::Child,
                        field_name: field.to_string(),
                        display_name: format!("child[{index}].{field}"),
                        description: format!("{} attribute of child {}", field, index + 1),
                        depth: Some(1),
                    });
                }
            }
        }
    }

    result
}

fn non_empty(attrs: &NodeAttributes, field: &str) -> bool {
    attrs.get(field).is_some_and(|value| !value.is_empty())
}
