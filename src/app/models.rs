use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Attribute names the matching engine knows by field. Everything else a dump
/// carries lands in `extra`.
pub const WELL_KNOWN_ATTRIBUTES: &[&str] = &[
    "resource-id",
    "text",
    "content-desc",
    "class",
    "package",
    "clickable",
    "enabled",
    "selected",
    "checkable",
    "scrollable",
    "bounds",
    "index",
];

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct NodeAttributes {
    #[serde(rename = "resource-id", skip_serializing_if = "Option::is_none")]
    pub resource_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub text: Option<String>,
    #[serde(rename = "content-desc", skip_serializing_if = "Option::is_none")]
    pub content_desc: Option<String>,
    #[serde(rename = "class", skip_serializing_if = "Option::is_none")]
    pub class_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub package: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub clickable: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub enabled: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub selected: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub checkable: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub scrollable: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub bounds: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub index: Option<String>,
    #[serde(flatten)]
    pub extra: HashMap<String, String>,
}

impl NodeAttributes {
    pub fn get(&self, name: &str) -> Option<&str> {
        let slot = match name {
            "resource-id" => &self.resource_id,
            "text" => &self.text,
            "content-desc" => &self.content_desc,
            "class" => &self.class_name,
            "package" => &self.package,
            "clickable" => &self.clickable,
            "enabled" => &self.enabled,
            "selected" => &self.selected,
            "checkable" => &self.checkable,
            "scrollable" => &self.scrollable,
            "bounds" => &self.bounds,
            "index" => &self.index,
            _ => return self.extra.get(name).map(String::as_str),
        };
        slot.as_deref()
    }

    pub fn set(&mut self, name: &str, value: String) {
        let slot = match name {
            "resource-id" => &mut self.resource_id,
            "text" => &mut self.text,
            "content-desc" => &mut self.content_desc,
            "class" => &mut self.class_name,
            "package" => &mut self.package,
            "clickable" => &mut self.clickable,
            "enabled" => &mut self.enabled,
            "selected" => &mut self.selected,
            "checkable" => &mut self.checkable,
            "scrollable" => &mut self.scrollable,
            "bounds" => &mut self.bounds,
            "index" => &mut self.index,
            _ => {
                self.extra.insert(name.to_string(), value);
                return;
            }
        };
        *slot = Some(value);
    }

    /// Present attributes as (name, value) pairs: well-known names first in
    /// their fixed order, then residual attributes sorted by name so the
    /// result is deterministic.
    pub fn entries(&self) -> Vec<(&str, &str)> {
        let mut pairs: Vec<(&str, &str)> = WELL_KNOWN_ATTRIBUTES
            .iter()
            .filter_map(|name| self.get(name).map(|value| (*name, value)))
            .collect();
        let mut residual: Vec<(&str, &str)> = self
            .extra
            .iter()
            .map(|(name, value)| (name.as_str(), value.as_str()))
            .collect();
        residual.sort_by_key(|(name, _)| *name);
        pairs.extend(residual);
        pairs
    }

    pub fn is_empty(&self) -> bool {
        self.entries().is_empty()
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum NodeLevel {
    #[serde(rename = "self")]
    Current,
    Parent,
    Child,
    Descendant,
    Ancestor,
    Sibling,
}

impl NodeLevel {
    pub fn as_str(&self) -> &'static str {
        match self {
            NodeLevel::Current => "self",
            NodeLevel::Parent => "parent",
            NodeLevel::Child => "child",
            NodeLevel::Descendant => "descendant",
            NodeLevel::Ancestor => "ancestor",
            NodeLevel::Sibling => "sibling",
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            NodeLevel::Current => "current node",
            NodeLevel::Parent => "parent node",
            NodeLevel::Child => "child node",
            NodeLevel::Descendant => "descendant node",
            NodeLevel::Ancestor => "ancestor node",
            NodeLevel::Sibling => "sibling node",
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum MatchStrategy {
    Absolute,
    Strict,
    Relaxed,
    Positionless,
    Standard,
}

impl MatchStrategy {
    pub fn as_str(&self) -> &'static str {
        match self {
            MatchStrategy::Absolute => "absolute",
            MatchStrategy::Strict => "strict",
            MatchStrategy::Relaxed => "relaxed",
            MatchStrategy::Positionless => "positionless",
            MatchStrategy::Standard => "standard",
        }
    }
}

/// Where a candidate matching field actually lives relative to the inspected
/// node.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct FieldHierarchy {
    pub level: NodeLevel,
    pub field_name: String,
    pub display_name: String,
    pub description: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub depth: Option<i32>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct EnhancedMatchField {
    pub level: NodeLevel,
    pub field_name: String,
    pub display_name: String,
    pub description: String,
    pub value: String,
    pub confidence: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub depth: Option<i32>,
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub is_user_defined: bool,
}

/// Read-only snapshot of one node's surroundings inside a parsed dump.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct NodeHierarchyAnalysis {
    #[serde(rename = "self")]
    pub current: NodeAttributes,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub parent: Option<NodeAttributes>,
    pub children: Vec<NodeAttributes>,
    pub descendants: Vec<NodeAttributes>,
    pub siblings: Vec<NodeAttributes>,
    pub depth: usize,
    pub path: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SmartMatchingConditions {
    pub strategy: MatchStrategy,
    pub fields: Vec<String>,
    pub values: HashMap<String, String>,
    pub includes: HashMap<String, Vec<String>>,
    pub excludes: HashMap<String, Vec<String>>,
    pub hierarchy: Vec<EnhancedMatchField>,
    pub confidence: f64,
    pub analysis: NodeHierarchyAnalysis,
}
