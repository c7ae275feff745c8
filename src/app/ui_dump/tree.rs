use serde::{Deserialize, Serialize};

use crate::app::models::NodeAttributes;

/// Index of a node inside its owning [`UiTree`] arena. Ids are only
/// meaningful for the tree that produced them; handing a stale id to a tree
/// accessor is a caller bug and panics on the arena index.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct NodeId(pub(crate) usize);

impl NodeId {
    pub fn index(&self) -> usize {
        self.0
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UiNode {
    pub tag: String,
    pub attrs: NodeAttributes,
    /// Direct character data of this element, entity-decoded.
    pub text: String,
    pub parent: Option<NodeId>,
    pub children: Vec<NodeId>,
}

/// Arena-backed snapshot of one parsed UI dump. Nodes own their children by
/// id; `parent` is a plain back-reference.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UiTree {
    nodes: Vec<UiNode>,
}

impl UiTree {
    pub(crate) fn empty() -> Self {
        Self { nodes: Vec::new() }
    }

    pub(crate) fn push_node(&mut self, node: UiNode) -> NodeId {
        let id = NodeId(self.nodes.len());
        self.nodes.push(node);
        id
    }

    pub(crate) fn node_mut(&mut self, id: NodeId) -> &mut UiNode {
        &mut self.nodes[id.0]
    }

    pub fn node(&self, id: NodeId) -> &UiNode {
        &self.nodes[id.0]
    }

    /// First element of the document. The parser never produces an empty
    /// tree, so this is always valid.
    pub fn root(&self) -> NodeId {
        NodeId(0)
    }

    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    pub fn ids(&self) -> impl Iterator<Item = NodeId> {
        (0..self.nodes.len()).map(NodeId)
    }

    pub fn parent(&self, id: NodeId) -> Option<NodeId> {
        self.node(id).parent
    }

    pub fn children(&self, id: NodeId) -> &[NodeId] {
        &self.node(id).children
    }

    /// All other children of this node's parent, in document order.
    pub fn siblings(&self, id: NodeId) -> Vec<NodeId> {
        match self.parent(id) {
            Some(parent) => self
                .children(parent)
                .iter()
                .copied()
                .filter(|&sibling| sibling != id)
                .collect(),
            None => Vec::new(),
        }
    }

    /// Every node strictly below `id`, pre-order.
    pub fn descendants(&self, id: NodeId) -> Vec<NodeId> {
        let mut result = Vec::new();
        let mut pending: Vec<NodeId> = self.children(id).iter().rev().copied().collect();
        while let Some(next) = pending.pop() {
            result.push(next);
            pending.extend(self.children(next).iter().rev().copied());
        }
        result
    }

    pub fn depth(&self, id: NodeId) -> usize {
        let mut depth = 0;
        let mut current = self.parent(id);
        while let Some(ancestor) = current {
            depth += 1;
            current = self.parent(ancestor);
        }
        depth
    }

    /// Concatenated character data of this node and its subtree, trimmed.
    pub fn text_content(&self, id: NodeId) -> String {
        let mut buffer = String::new();
        buffer.push_str(&self.node(id).text);
        for descendant in self.descendants(id) {
            buffer.push_str(&self.node(descendant).text);
        }
        buffer.trim().to_string()
    }

    /// 1-based position of `id` among its parent's children that share the
    /// same tag. The root counts as position 1.
    pub fn position_among_same_tag(&self, id: NodeId) -> usize {
        let tag = &self.node(id).tag;
        let Some(parent) = self.parent(id) else {
            return 1;
        };
        let mut position = 0;
        for &sibling in self.children(parent) {
            if &self.node(sibling).tag == tag {
                position += 1;
            }
            if sibling == id {
                return position;
            }
        }
        position.max(1)
    }

    /// Resolve a synthesized path of the form `/hierarchy[1]/node[2]/node[1]`.
    /// A segment without an index means position 1.
    pub fn find_by_path(&self, path: &str) -> Option<NodeId> {
        let mut segments = path.split('/').filter(|segment| !segment.is_empty());
        let (root_tag, root_position) = parse_path_segment(segments.next()?)?;
        let root = self.root();
        if self.node(root).tag != root_tag || root_position != 1 {
            return None;
        }
        let mut current = root;
        for segment in segments {
            let (tag, position) = parse_path_segment(segment)?;
            let mut seen = 0;
            let mut matched = None;
            for &child in self.children(current) {
                if self.node(child).tag == tag {
                    seen += 1;
                    if seen == position {
                        matched = Some(child);
                        break;
                    }
                }
            }
            current = matched?;
        }
        Some(current)
    }

    /// First node (pre-order) whose `bounds` attribute equals `bounds`.
    pub fn find_by_bounds(&self, bounds: &str) -> Option<NodeId> {
        self.ids()
            .find(|&id| self.node(id).attrs.get("bounds") == Some(bounds))
    }
}

fn parse_path_segment(segment: &str) -> Option<(&str, usize)> {
    match segment.split_once('[') {
        Some((tag, rest)) => {
            let position = rest.strip_suffix(']')?.parse::<usize>().ok()?;
            if tag.is_empty() || position == 0 {
                return None;
            }
            Some((tag, position))
        }
        None => {
            if segment.is_empty() {
                return None;
            }
            Some((segment, 1))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn attrs(pairs: &[(&str, &str)]) -> NodeAttributes {
        let mut attrs = NodeAttributes::default();
        for (name, value) in pairs {
            attrs.set(name, value.to_string());
        }
        attrs
    }

    fn leaf(tag: &str, parent: Option<NodeId>, pairs: &[(&str, &str)]) -> UiNode {
        UiNode {
            tag: tag.to_string(),
            attrs: attrs(pairs),
            text: String::new(),
            parent,
            children: Vec::new(),
        }
    }

    /// hierarchy > [node#a, node#b > [node#c, node#d]]
    fn sample_tree() -> UiTree {
        let mut tree = UiTree::empty();
        let root = tree.push_node(leaf("hierarchy", None, &[]));
        let a = tree.push_node(leaf("node", Some(root), &[("resource-id", "id/a")]));
        let b = tree.push_node(leaf("node", Some(root), &[("bounds", "[0,0][10,10]")]));
        let c = tree.push_node(leaf("node", Some(b), &[("text", "first")]));
        let d = tree.push_node(leaf("node", Some(b), &[("text", "second")]));
        tree.node_mut(root).children = vec![a, b];
        tree.node_mut(b).children = vec![c, d];
        tree
    }

    #[test]
    fn descendants_are_preorder() {
        let tree = sample_tree();
        let order: Vec<usize> = tree
            .descendants(tree.root())
            .iter()
            .map(NodeId::index)
            .collect();
        assert_eq!(order, vec![1, 2, 3, 4]);
    }

    #[test]
    fn siblings_exclude_the_node_itself() {
        let tree = sample_tree();
        let b = NodeId(2);
        let siblings = tree.siblings(b);
        assert_eq!(siblings, vec![NodeId(1)]);
        assert!(tree.siblings(tree.root()).is_empty());
    }

    #[test]
    fn depth_counts_ancestor_hops() {
        let tree = sample_tree();
        assert_eq!(tree.depth(tree.root()), 0);
        assert_eq!(tree.depth(NodeId(1)), 1);
        assert_eq!(tree.depth(NodeId(3)), 2);
    }

    #[test]
    fn same_tag_position_is_one_based() {
        let tree = sample_tree();
        assert_eq!(tree.position_among_same_tag(tree.root()), 1);
        assert_eq!(tree.position_among_same_tag(NodeId(1)), 1);
        assert_eq!(tree.position_among_same_tag(NodeId(2)), 2);
        assert_eq!(tree.position_among_same_tag(NodeId(4)), 2);
    }

    #[test]
    fn resolves_paths_with_and_without_indices() {
        let tree = sample_tree();
        assert_eq!(
            tree.find_by_path("/hierarchy[1]/node[2]/node[2]"),
            Some(NodeId(4))
        );
        assert_eq!(tree.find_by_path("/hierarchy/node[2]/node"), Some(NodeId(3)));
        assert_eq!(tree.find_by_path("/hierarchy[1]/node[3]"), None);
        assert_eq!(tree.find_by_path("/other[1]"), None);
    }

    #[test]
    fn finds_nodes_by_bounds_attribute() {
        let tree = sample_tree();
        assert_eq!(tree.find_by_bounds("[0,0][10,10]"), Some(NodeId(2)));
        assert_eq!(tree.find_by_bounds("[1,1][2,2]"), None);
    }

    #[test]
    fn text_content_gathers_subtree_text() {
        let mut tree = sample_tree();
        tree.node_mut(NodeId(3)).text = "Follow ".to_string();
        tree.node_mut(NodeId(4)).text = "me".to_string();
        assert_eq!(tree.text_content(NodeId(2)), "Follow me");
        assert_eq!(tree.text_content(NodeId(1)), "");
    }
}
