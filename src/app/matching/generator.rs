use std::cmp::Ordering;
use std::collections::{HashMap, HashSet};

use tracing::debug;

use crate::app::config::MatchingOptions;
use crate::app::matching::analyzer::{analyze_node_hierarchy, extract_node_attributes};
use crate::app::models::{
    EnhancedMatchField, MatchStrategy, NodeAttributes, NodeHierarchyAnalysis, NodeLevel,
    SmartMatchingConditions,
};
use crate::app::ui_dump::tree::{NodeId, UiTree};

/// Attributes the generator considers as matching signals, strongest first.
const TRACKED_FIELDS: &[&str] = &[
    "resource-id",
    "content-desc",
    "text",
    "class",
    "clickable",
    "enabled",
    "selected",
    "package",
    "checkable",
    "scrollable",
];

/// Device-specific position attributes. Only scanned when the caller opts in.
const POSITIONAL_FIELDS: &[&str] = &["bounds", "index"];

const MIN_FIELD_CONFIDENCE: f64 = 0.3;
const HIGH_CONFIDENCE_KEEP: f64 = 0.8;
const MAX_FIELD_CONFIDENCE: f64 = 0.95;
const MAX_OVERALL_CONFIDENCE: f64 = 0.98;

/// Produce a ranked, deduplicated matching condition set for one node.
///
/// Deterministic for an unchanged tree, node and options; never fails for a
/// valid attached node — a node without usable signals yields empty `fields`
/// and confidence 0.
pub fn generate_smart_conditions(
    tree: &UiTree,
    id: NodeId,
    options: &MatchingOptions,
) -> SmartMatchingConditions {
    let analysis = analyze_node_hierarchy(tree, id);
    let hierarchy = generate_enhanced_fields(tree, id, &analysis, options);
    let (strategy, fields, values) = build_matching_conditions(&hierarchy, options);
    let confidence = calculate_overall_confidence(&hierarchy);

    debug!(
        strategy = strategy.as_str(),
        fields = fields.len(),
        confidence,
        path = %analysis.path,
        "generated matching conditions"
    );

    SmartMatchingConditions {
        strategy,
        fields,
        values,
        includes: HashMap::new(),
        excludes: HashMap::new(),
        hierarchy,
        confidence,
        analysis,
    }
}

fn generate_enhanced_fields(
    tree: &UiTree,
    id: NodeId,
    analysis: &NodeHierarchyAnalysis,
    options: &MatchingOptions,
) -> Vec<EnhancedMatchField> {
    let mut fields = Vec::new();

    add_semantic_fields(&mut fields, &analysis.current, NodeLevel::Current, None, options);

    if options.enable_parent_context {
        if let Some(parent) = &analysis.parent {
            add_semantic_fields(&mut fields, parent, NodeLevel::Parent, None, options);
        }
    }

    if options.enable_child_context {
        for (index, child) in analysis.children.iter().enumerate() {
            add_semantic_fields(
                &mut fields,
                child,
                NodeLevel::Child,
                Some(index as i32),
                options,
            );
        }
    }

    if options.enable_descendant_search {
        add_descendant_fields(&mut fields, tree, id, options);
    }

    optimize_field_selection(fields, options)
}

/// Collect tracked attributes of one node at the given level. For child
/// fields `depth` carries the child index, for descendant fields the true
/// tree distance.
fn add_semantic_fields(
    fields: &mut Vec<EnhancedMatchField>,
    attrs: &NodeAttributes,
    level: NodeLevel,
    depth: Option<i32>,
    options: &MatchingOptions,
) {
    for (field_name, value) in attrs.entries() {
        if value.is_empty() || !is_tracked(field_name, level, options) {
            continue;
        }
        let confidence = calculate_field_confidence(field_name, value, level);
        if confidence <= MIN_FIELD_CONFIDENCE {
            continue;
        }
        let resolved_depth = depth.unwrap_or(match level {
            NodeLevel::Parent => -1,
            NodeLevel::Child => 1,
            _ => 0,
        });
        fields.push(EnhancedMatchField {
            level,
            field_name: field_name.to_string(),
            display_name: display_name(level, field_name, depth),
            description: field_description(level, field_name, depth),
            value: value.to_string(),
            confidence,
            depth: Some(resolved_depth),
            is_user_defined: false,
        });
    }
}

/// Depth-limited scan below the direct children (those are the child
/// context's job), realizing the descendant extension of the options
/// contract.
fn add_descendant_fields(
    fields: &mut Vec<EnhancedMatchField>,
    tree: &UiTree,
    id: NodeId,
    options: &MatchingOptions,
) {
    let max_depth = options.max_depth.max(1) as usize;
    let mut pending: Vec<(NodeId, usize)> = tree
        .children(id)
        .iter()
        .rev()
        .map(|&child| (child, 1))
        .collect();
    while let Some((node, depth)) = pending.pop() {
        if depth >= 2 {
            let attrs = extract_node_attributes(tree, node);
            add_semantic_fields(
                fields,
                &attrs,
                NodeLevel::Descendant,
                Some(depth as i32),
                options,
            );
        }
        if depth < max_depth {
            pending.extend(tree.children(node).iter().rev().map(|&child| (child, depth + 1)));
        }
    }
}

fn is_tracked(field_name: &str, level: NodeLevel, options: &MatchingOptions) -> bool {
    if TRACKED_FIELDS.contains(&field_name) {
        return true;
    }
    !options.exclude_positional_fields
        && level == NodeLevel::Current
        && POSITIONAL_FIELDS.contains(&field_name)
}

/// Heuristic reliability of one attribute as a re-identification signal.
/// Base score per field, adjusted for context, damped by level distance,
/// capped at 0.95.
fn calculate_field_confidence(field_name: &str, value: &str, level: NodeLevel) -> f64 {
    let base = match field_name {
        "resource-id" => 0.95,
        "content-desc" => 0.90,
        // Single-character or empty text is a weak signal.
        "text" => {
            if value.chars().count() > 1 {
                0.85
            } else {
                0.60
            }
        }
        "class" => 0.70,
        "clickable" => {
            if level == NodeLevel::Current && value == "true" {
                0.80
            } else if level == NodeLevel::Parent && value == "true" {
                0.60
            } else {
                0.40
            }
        }
        _ => 0.70,
    };

    let leveled: f64 = base
        * match level {
            NodeLevel::Current => 1.0,
            NodeLevel::Parent => 0.85,
            NodeLevel::Child => 0.90,
            _ => 0.75,
        };

    leveled.min(MAX_FIELD_CONFIDENCE)
}

/// Rank by confidence, then drop weak duplicates of a field name already
/// kept. A high-confidence duplicate is still worth keeping; a weak
/// redundant one is not.
fn optimize_field_selection(
    mut fields: Vec<EnhancedMatchField>,
    options: &MatchingOptions,
) -> Vec<EnhancedMatchField> {
    fields.sort_by(|a, b| {
        b.confidence
            .partial_cmp(&a.confidence)
            .unwrap_or(Ordering::Equal)
    });

    let mut kept = Vec::new();
    let mut seen: HashSet<String> = HashSet::new();
    for field in fields {
        if field.confidence > HIGH_CONFIDENCE_KEEP || !seen.contains(&field.field_name) {
            seen.insert(field.field_name.clone());
            kept.push(field);
        }
    }

    let max_fields = if options.prioritize_semantic_fields { 6 } else { 4 };
    kept.truncate(max_fields);
    kept
}

/// Turn surviving fields into level-prefixed condition keys and pick the
/// strategy.
fn build_matching_conditions(
    fields: &[EnhancedMatchField],
    options: &MatchingOptions,
) -> (MatchStrategy, Vec<String>, HashMap<String, String>) {
    let mut keys = Vec::new();
    let mut values = HashMap::new();

    for field in fields {
        let key = match field.level {
            NodeLevel::Current => field.field_name.clone(),
            NodeLevel::Parent => format!("parent_{}", field.field_name),
            NodeLevel::Child => match field.depth {
                Some(depth) if depth >= 0 => format!("child_{}_{}", depth, field.field_name),
                _ => format!("first_child_{}", field.field_name),
            },
            other => format!("{}_{}", other.as_str(), field.field_name),
        };
        values.insert(key.clone(), field.value.clone());
        keys.push(key);
    }

    (select_optimal_strategy(fields, options), keys, values)
}

/// Positional exactness (when allowed) beats everything; a plentiful
/// high-confidence set earns `strict`; any cross-level field makes
/// `standard` the portable choice; `relaxed` is the fallback for thin
/// signal sets.
fn select_optimal_strategy(
    fields: &[EnhancedMatchField],
    options: &MatchingOptions,
) -> MatchStrategy {
    if fields.is_empty() {
        return MatchStrategy::Relaxed;
    }

    if !options.exclude_positional_fields
        && fields
            .iter()
            .any(|field| POSITIONAL_FIELDS.contains(&field.field_name.as_str()))
    {
        return MatchStrategy::Absolute;
    }

    let average = fields.iter().map(|field| field.confidence).sum::<f64>() / fields.len() as f64;
    if average > 0.8 && fields.len() >= 3 {
        return MatchStrategy::Strict;
    }

    if fields
        .iter()
        .any(|field| matches!(field.level, NodeLevel::Parent | NodeLevel::Child))
    {
        return MatchStrategy::Standard;
    }

    MatchStrategy::Relaxed
}

/// Average field confidence plus a small bonus for level diversity, capped
/// at 0.98. No fields means no confidence.
fn calculate_overall_confidence(fields: &[EnhancedMatchField]) -> f64 {
    if fields.is_empty() {
        return 0.0;
    }
    let average = fields.iter().map(|field| field.confidence).sum::<f64>() / fields.len() as f64;
    let unique_levels = fields
        .iter()
        .map(|field| field.level)
        .collect::<HashSet<_>>()
        .len();
    let diversity_bonus = (unique_levels as f64 * 0.05).min(0.15);
    (average + diversity_bonus).min(MAX_OVERALL_CONFIDENCE)
}

fn display_name(level: NodeLevel, field_name: &str, index: Option<i32>) -> String {
    match (level, index) {
        (NodeLevel::Child, Some(index)) => format!("child[{index}].{field_name}"),
        (NodeLevel::Descendant, Some(depth)) => format!("descendant({depth}).{field_name}"),
        _ => format!("{}.{}", level.as_str(), field_name),
    }
}

fn field_description(level: NodeLevel, field_name: &str, index: Option<i32>) -> String {
    let field_label = match field_name {
        "resource-id" => "Android resource id",
        "content-desc" => "accessibility description",
        "text" => "text content",
        "class" => "widget class",
        "clickable" => "clickable flag",
        "enabled" => "enabled state",
        "selected" => "selected state",
        "package" => "application package",
        "checkable" => "checkable flag",
        "scrollable" => "scrollable flag",
        "bounds" => "screen bounds",
        "index" => "sibling index",
        other => other,
    };
    match (level, index) {
        (NodeLevel::Child, Some(index)) => {
            format!("{} of child {}", field_label, index + 1)
        }
        (NodeLevel::Descendant, Some(depth)) => {
            format!("{field_label} of a descendant node at depth {depth}")
        }
        _ => format!("{} of the {}", field_label, level.label()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::app::ui_dump::parse::parse_ui_dump;

    fn conditions_for(
        xml: &str,
        path: &str,
        options: &MatchingOptions,
    ) -> SmartMatchingConditions {
        let tree = parse_ui_dump(xml).expect("parse");
        let id = tree.find_by_path(path).expect("path");
        generate_smart_conditions(&tree, id, options)
    }

    #[test]
    fn confidence_bases_and_level_multipliers() {
        assert_eq!(
            calculate_field_confidence("resource-id", "id/x", NodeLevel::Current),
            0.95
        );
        assert_eq!(
            calculate_field_confidence("resource-id", "id/x", NodeLevel::Parent),
            0.95 * 0.85
        );
        assert_eq!(
            calculate_field_confidence("content-desc", "Back", NodeLevel::Child),
            0.90 * 0.90
        );
        assert_eq!(
            calculate_field_confidence("text", "OK", NodeLevel::Current),
            0.85
        );
        assert_eq!(
            calculate_field_confidence("text", "X", NodeLevel::Current),
            0.60
        );
        assert_eq!(
            calculate_field_confidence("enabled", "true", NodeLevel::Descendant),
            0.70 * 0.75
        );
    }

    #[test]
    fn clickable_confidence_depends_on_context() {
        assert_eq!(
            calculate_field_confidence("clickable", "true", NodeLevel::Current),
            0.80
        );
        assert_eq!(
            calculate_field_confidence("clickable", "true", NodeLevel::Parent),
            0.60 * 0.85
        );
        assert_eq!(
            calculate_field_confidence("clickable", "false", NodeLevel::Current),
            0.40
        );
    }

    #[test]
    fn field_confidence_never_exceeds_cap() {
        for field in TRACKED_FIELDS {
            for level in [
                NodeLevel::Current,
                NodeLevel::Parent,
                NodeLevel::Child,
                NodeLevel::Descendant,
            ] {
                let confidence = calculate_field_confidence(field, "some value", level);
                assert!(confidence > 0.0 && confidence <= MAX_FIELD_CONFIDENCE);
            }
        }
    }

    #[test]
    fn weak_duplicates_are_suppressed_but_strong_ones_survive() {
        let make = |level, name: &str, confidence| EnhancedMatchField {
            level,
            field_name: name.to_string(),
            display_name: name.to_string(),
            description: String::new(),
            value: "v".to_string(),
            confidence,
            depth: Some(0),
            is_user_defined: false,
        };
        let fields = vec![
            make(NodeLevel::Current, "resource-id", 0.95),
            make(NodeLevel::Parent, "resource-id", 0.81),
            make(NodeLevel::Current, "class", 0.70),
            make(NodeLevel::Parent, "class", 0.60),
        ];
        let kept = optimize_field_selection(fields, &MatchingOptions::default());
        let names: Vec<&str> = kept.iter().map(|f| f.field_name.as_str()).collect();
        // Both resource-id entries clear the 0.8 bar; the weaker class copy
        // is dropped as redundant.
        assert_eq!(names, vec!["resource-id", "resource-id", "class"]);
    }

    #[test]
    fn selection_caps_depend_on_semantic_priority() {
        let make = |index: usize| EnhancedMatchField {
            level: NodeLevel::Current,
            field_name: format!("field-{index}"),
            display_name: format!("field-{index}"),
            description: String::new(),
            value: "v".to_string(),
            confidence: 0.5,
            depth: Some(0),
            is_user_defined: false,
        };
        let fields: Vec<EnhancedMatchField> = (0..10).map(make).collect();
        let semantic = optimize_field_selection(fields.clone(), &MatchingOptions::default());
        assert_eq!(semantic.len(), 6);
        let plain = optimize_field_selection(
            fields,
            &MatchingOptions {
                prioritize_semantic_fields: false,
                ..MatchingOptions::default()
            },
        );
        assert_eq!(plain.len(), 4);
    }

    #[test]
    fn condition_keys_are_level_prefixed() {
        let make = |level, name: &str, depth| EnhancedMatchField {
            level,
            field_name: name.to_string(),
            display_name: name.to_string(),
            description: String::new(),
            value: "v".to_string(),
            confidence: 0.9,
            depth,
            is_user_defined: false,
        };
        let fields = vec![
            make(NodeLevel::Current, "text", Some(0)),
            make(NodeLevel::Parent, "resource-id", Some(-1)),
            make(NodeLevel::Child, "text", Some(2)),
            make(NodeLevel::Child, "class", None),
            make(NodeLevel::Descendant, "text", Some(2)),
        ];
        let (_, keys, values) = build_matching_conditions(&fields, &MatchingOptions::default());
        assert_eq!(
            keys,
            vec![
                "text",
                "parent_resource-id",
                "child_2_text",
                "first_child_class",
                "descendant_text"
            ]
        );
        assert_eq!(values.get("child_2_text").map(String::as_str), Some("v"));
    }

    #[test]
    fn absolute_strategy_requires_opting_into_positional_fields() {
        let xml = r#"<hierarchy>
  <node text="OK" bounds="[10,10][50,50]" />
</hierarchy>"#;
        let allowed = conditions_for(
            xml,
            "/hierarchy[1]/node[1]",
            &MatchingOptions {
                exclude_positional_fields: false,
                ..MatchingOptions::default()
            },
        );
        assert_eq!(allowed.strategy, MatchStrategy::Absolute);
        assert!(allowed.fields.iter().any(|key| key == "bounds"));

        let excluded = conditions_for(xml, "/hierarchy[1]/node[1]", &MatchingOptions::default());
        assert!(excluded.fields.iter().all(|key| key != "bounds"));
        assert_ne!(excluded.strategy, MatchStrategy::Absolute);
    }

    #[test]
    fn rich_self_signals_win_strict() {
        let xml = r#"<hierarchy>
  <node resource-id="com.app:id/send" content-desc="Send" text="Send now" />
</hierarchy>"#;
        let conditions = conditions_for(xml, "/hierarchy[1]/node[1]", &MatchingOptions::default());
        assert_eq!(conditions.strategy, MatchStrategy::Strict);
        assert_eq!(conditions.fields.len(), 3);
    }

    #[test]
    fn lone_parent_field_falls_back_to_standard() {
        let xml = r#"<hierarchy>
  <node resource-id="com.app:id/row">
    <node />
  </node>
</hierarchy>"#;
        let conditions = conditions_for(
            xml,
            "/hierarchy[1]/node[1]/node[1]",
            &MatchingOptions::default(),
        );
        // avg 0.8075 > 0.8 but only one field, so strict is out of reach.
        assert_eq!(conditions.fields, vec!["parent_resource-id"]);
        assert_eq!(conditions.strategy, MatchStrategy::Standard);
    }

    #[test]
    fn thin_self_only_signals_relax() {
        let xml = r#"<hierarchy>
  <node class="android.widget.View" />
</hierarchy>"#;
        let conditions = conditions_for(xml, "/hierarchy[1]/node[1]", &MatchingOptions::default());
        assert_eq!(conditions.strategy, MatchStrategy::Relaxed);
        assert_eq!(conditions.fields, vec!["class"]);
    }

    #[test]
    fn empty_field_set_is_a_valid_output() {
        let xml = "<hierarchy><node /></hierarchy>";
        let conditions = conditions_for(xml, "/hierarchy[1]/node[1]", &MatchingOptions::default());
        assert!(conditions.fields.is_empty());
        assert_eq!(conditions.confidence, 0.0);
        assert_eq!(conditions.strategy, MatchStrategy::Relaxed);
        assert!(conditions.includes.is_empty());
        assert!(conditions.excludes.is_empty());
    }

    #[test]
    fn overall_confidence_rewards_level_diversity_and_clamps() {
        let make = |level, confidence| EnhancedMatchField {
            level,
            field_name: "resource-id".to_string(),
            display_name: String::new(),
            description: String::new(),
            value: "v".to_string(),
            confidence,
            depth: Some(0),
            is_user_defined: false,
        };
        let single = vec![make(NodeLevel::Current, 0.70)];
        assert!((calculate_overall_confidence(&single) - 0.75).abs() < 1e-9);

        let diverse = vec![
            make(NodeLevel::Current, 0.70),
            make(NodeLevel::Parent, 0.70),
            make(NodeLevel::Child, 0.70),
        ];
        assert!((calculate_overall_confidence(&diverse) - 0.85).abs() < 1e-9);

        // A saturated set clamps at the overall cap.
        let saturated = vec![
            make(NodeLevel::Current, 0.95),
            make(NodeLevel::Parent, 0.95),
            make(NodeLevel::Child, 0.95),
        ];
        assert_eq!(
            calculate_overall_confidence(&saturated),
            MAX_OVERALL_CONFIDENCE
        );
        assert_eq!(calculate_overall_confidence(&[]), 0.0);
    }

    #[test]
    fn generation_is_deterministic() {
        let xml = r#"<hierarchy>
  <node resource-id="com.app:id/item" class="android.widget.LinearLayout">
    <node text="Follow" clickable="true" class="android.widget.TextView" />
    <node content-desc="Avatar" class="android.widget.ImageView" />
  </node>
</hierarchy>"#;
        let first = conditions_for(xml, "/hierarchy[1]/node[1]", &MatchingOptions::default());
        let second = conditions_for(xml, "/hierarchy[1]/node[1]", &MatchingOptions::default());
        assert_eq!(first.fields, second.fields);
        assert_eq!(first.values, second.values);
        assert_eq!(first.strategy, second.strategy);
        assert_eq!(first.confidence, second.confidence);
    }

    #[test]
    fn descendant_search_is_depth_limited() {
        let xml = r#"<hierarchy>
  <node resource-id="com.app:id/row">
    <node class="android.widget.FrameLayout">
      <node text="Nearby" />
      <node>
        <node text="Too deep" />
      </node>
    </node>
  </node>
</hierarchy>"#;
        let options = MatchingOptions {
            enable_descendant_search: true,
            max_depth: 2,
            ..MatchingOptions::default()
        };
        let conditions = conditions_for(xml, "/hierarchy[1]/node[1]", &options);
        assert!(conditions
            .hierarchy
            .iter()
            .any(|field| field.level == NodeLevel::Descendant && field.value == "Nearby"));
        assert!(conditions
            .hierarchy
            .iter()
            .all(|field| field.value != "Too deep"));

        let default_run = conditions_for(xml, "/hierarchy[1]/node[1]", &MatchingOptions::default());
        assert!(default_run
            .hierarchy
            .iter()
            .all(|field| field.level != NodeLevel::Descendant));
    }
}
