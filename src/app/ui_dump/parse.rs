use tracing::debug;

use crate::app::models::NodeAttributes;
use crate::app::ui_dump::tree::{NodeId, UiNode, UiTree};

/// Strip BOM and any leading noise before the first `<`. Dumps pulled over
/// adb frequently carry shell banners or stray whitespace in front of the
/// document.
pub fn clean_xml_content(xml: &str) -> &str {
    let trimmed = xml.trim_start_matches('\u{feff}').trim();
    match trimmed.find('<') {
        Some(position) => &trimmed[position..],
        None => trimmed,
    }
}

/// Parse a UiAutomator dump into an arena tree.
///
/// Single pass over the raw bytes: elements, quoted attributes, comments and
/// processing instructions. Unclosed elements at end of input are tolerated,
/// structural errors in tags and attributes are not.
pub fn parse_ui_dump(xml: &str) -> Result<UiTree, String> {
    let xml = clean_xml_content(xml);
    if xml.is_empty() {
        return Err("XML input is empty".to_string());
    }

    let bytes = xml.as_bytes();
    let mut index: usize = 0;
    let mut tree = UiTree::empty();
    let mut stack: Vec<NodeId> = Vec::new();
    let mut has_root = false;

    while index < bytes.len() {
        if bytes[index] != b'<' {
            let start = index;
            while index < bytes.len() && bytes[index] != b'<' {
                index += 1;
            }
            if let Some(&open) = stack.last() {
                let chunk = &xml[start..index];
                if !chunk.trim().is_empty() {
                    tree.node_mut(open).text.push_str(&decode_entities(chunk));
                }
            }
            continue;
        }

        if index + 1 >= bytes.len() {
            break;
        }
        match bytes[index + 1] {
            b'/' => {
                index += 2;
                while index < bytes.len() && bytes[index] != b'>' {
                    index += 1;
                }
                if index < bytes.len() {
                    index += 1;
                }
                stack.pop();
            }
            b'!' => {
                index += 2;
                while index + 2 < bytes.len()
                    && !(bytes[index] == b'-'
                        && bytes[index + 1] == b'-'
                        && bytes[index + 2] == b'>')
                {
                    index += 1;
                }
                index = (index + 3).min(bytes.len());
            }
            b'?' => {
                index += 2;
                while index + 1 < bytes.len()
                    && !(bytes[index] == b'?' && bytes[index + 1] == b'>')
                {
                    index += 1;
                }
                index = (index + 2).min(bytes.len());
            }
            _ => {
                let start = index + 1;
                let mut cursor = start;
                while cursor < bytes.len() {
                    let ch = bytes[cursor];
                    if ch == b'/' || ch == b'>' || ch.is_ascii_whitespace() {
                        break;
                    }
                    cursor += 1;
                }
                if cursor == start {
                    return Err("Malformed XML tag".to_string());
                }
                let tag = xml[start..cursor].to_string();

                let mut attrs = NodeAttributes::default();
                let mut self_closing = false;
                let mut attr_cursor = cursor;
                while attr_cursor < bytes.len() {
                    while attr_cursor < bytes.len() && bytes[attr_cursor].is_ascii_whitespace() {
                        attr_cursor += 1;
                    }
                    if attr_cursor >= bytes.len() {
                        break;
                    }
                    let ch = bytes[attr_cursor];
                    if ch == b'>' {
                        attr_cursor += 1;
                        break;
                    }
                    if ch == b'/' {
                        self_closing = true;
                        attr_cursor += 1;
                        if attr_cursor < bytes.len() && bytes[attr_cursor] == b'>' {
                            attr_cursor += 1;
                        }
                        break;
                    }

                    let name_start = attr_cursor;
                    while attr_cursor < bytes.len()
                        && bytes[attr_cursor] != b'='
                        && !bytes[attr_cursor].is_ascii_whitespace()
                    {
                        attr_cursor += 1;
                    }
                    if attr_cursor >= bytes.len() {
                        return Err("Malformed attribute".to_string());
                    }
                    let name_end = attr_cursor;
                    while attr_cursor < bytes.len() && bytes[attr_cursor].is_ascii_whitespace() {
                        attr_cursor += 1;
                    }
                    if attr_cursor >= bytes.len() || bytes[attr_cursor] != b'=' {
                        return Err("Malformed attribute assignment".to_string());
                    }
                    attr_cursor += 1;
                    while attr_cursor < bytes.len() && bytes[attr_cursor].is_ascii_whitespace() {
                        attr_cursor += 1;
                    }
                    if attr_cursor >= bytes.len() {
                        return Err("Missing attribute value".to_string());
                    }
                    let quote = bytes[attr_cursor];
                    if quote != b'"' && quote != b'\'' {
                        return Err("Attribute value must be quoted".to_string());
                    }
                    attr_cursor += 1;
                    let value_start = attr_cursor;
                    while attr_cursor < bytes.len() && bytes[attr_cursor] != quote {
                        attr_cursor += 1;
                    }
                    if attr_cursor >= bytes.len() {
                        return Err("Unterminated attribute value".to_string());
                    }
                    let value_end = attr_cursor;
                    attr_cursor += 1;
                    let name = &xml[name_start..name_end];
                    let value = decode_entities(&xml[value_start..value_end]);
                    attrs.set(name, value);
                }
                index = attr_cursor;

                let parent = stack.last().copied();
                let id = tree.push_node(UiNode {
                    tag,
                    attrs,
                    text: String::new(),
                    parent,
                    children: Vec::new(),
                });
                if let Some(parent_id) = parent {
                    tree.node_mut(parent_id).children.push(id);
                } else {
                    has_root = true;
                }
                if !self_closing {
                    stack.push(id);
                }
            }
        }
    }

    if !has_root {
        return Err("XML contains no elements".to_string());
    }
    debug!(nodes = tree.node_count(), "parsed ui dump");
    Ok(tree)
}

/// Decode the predefined XML entities plus numeric character references.
/// Unknown entities pass through untouched.
fn decode_entities(raw: &str) -> String {
    if !raw.contains('&') {
        return raw.to_string();
    }
    let mut decoded = String::with_capacity(raw.len());
    let mut rest = raw;
    while let Some(position) = rest.find('&') {
        decoded.push_str(&rest[..position]);
        rest = &rest[position..];
        let Some(end) = rest.find(';') else {
            decoded.push_str(rest);
            return decoded;
        };
        let entity = &rest[1..end];
        match entity {
            "lt" => decoded.push('<'),
            "gt" => decoded.push('>'),
            "amp" => decoded.push('&'),
            "quot" => decoded.push('"'),
            "apos" => decoded.push('\''),
            _ => {
                let numeric = entity
                    .strip_prefix("#x")
                    .or_else(|| entity.strip_prefix("#X"))
                    .and_then(|hex| u32::from_str_radix(hex, 16).ok())
                    .or_else(|| {
                        entity
                            .strip_prefix('#')
                            .and_then(|dec| dec.parse::<u32>().ok())
                    })
                    .and_then(char::from_u32);
                match numeric {
                    Some(ch) => decoded.push(ch),
                    None => {
                        decoded.push('&');
                        decoded.push_str(entity);
                        decoded.push(';');
                    }
                }
            }
        }
        rest = &rest[end + 1..];
    }
    decoded.push_str(rest);
    decoded
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = r#"<?xml version='1.0' encoding='UTF-8' standalone='yes' ?>
<hierarchy rotation="0">
  <node index="0" class="android.widget.FrameLayout" package="com.example.app" bounds="[0,0][1080,1920]">
    <node index="0" resource-id="com.example.app:id/list_item" class="android.widget.LinearLayout" bounds="[0,100][1080,300]">
      <node index="0" text="Follow" class="android.widget.TextView" clickable="true" bounds="[900,150][1060,250]" />
    </node>
  </node>
</hierarchy>
"#;

    #[test]
    fn parses_nested_dump() {
        let tree = parse_ui_dump(SAMPLE).expect("parse");
        assert_eq!(tree.node_count(), 4);
        let root = tree.root();
        assert_eq!(tree.node(root).tag, "hierarchy");
        assert_eq!(tree.node(root).attrs.get("rotation"), Some("0"));
        assert_eq!(tree.children(root).len(), 1);

        let leaves = tree.descendants(root);
        let leaf = *leaves.last().expect("leaf");
        assert_eq!(tree.node(leaf).attrs.get("text"), Some("Follow"));
        assert_eq!(tree.node(leaf).attrs.get("clickable"), Some("true"));
        assert_eq!(tree.depth(leaf), 3);
    }

    #[test]
    fn links_parents_and_children() {
        let tree = parse_ui_dump(SAMPLE).expect("parse");
        for id in tree.ids() {
            for &child in tree.children(id) {
                assert_eq!(tree.parent(child), Some(id));
            }
        }
        assert_eq!(tree.parent(tree.root()), None);
    }

    #[test]
    fn strips_noise_before_document() {
        let noisy = format!("\u{feff}adb: warning\n{SAMPLE}");
        let tree = parse_ui_dump(&noisy).expect("parse");
        assert_eq!(tree.node(tree.root()).tag, "hierarchy");
    }

    #[test]
    fn decodes_entities_in_attributes_and_text() {
        let xml = "<root><node text=\"a &amp; b &#33;\">tail &lt;x&gt;</node></root>";
        let tree = parse_ui_dump(xml).expect("parse");
        let node = tree.children(tree.root())[0];
        assert_eq!(tree.node(node).attrs.get("text"), Some("a & b !"));
        assert_eq!(tree.text_content(node), "tail <x>");
    }

    #[test]
    fn keeps_unknown_entities_verbatim() {
        assert_eq!(decode_entities("a &unknown; b"), "a &unknown; b");
        assert_eq!(decode_entities("broken &amp"), "broken &amp");
    }

    #[test]
    fn rejects_empty_and_element_free_input() {
        assert!(parse_ui_dump("").is_err());
        assert!(parse_ui_dump("   \n  ").is_err());
        assert!(parse_ui_dump("just text, no markup").is_err());
    }

    #[test]
    fn rejects_unquoted_attribute_values() {
        let err = parse_ui_dump("<root><node text=oops /></root>").expect_err("must fail");
        assert!(err.contains("quoted"));
    }

    #[test]
    fn rejects_unterminated_attribute_value() {
        let err = parse_ui_dump("<root text=\"never closed></root>").expect_err("must fail");
        assert!(err.contains("Unterminated"));
    }

    #[test]
    fn tolerates_missing_close_tags() {
        let tree = parse_ui_dump("<hierarchy><node text=\"open\">").expect("parse");
        assert_eq!(tree.node_count(), 2);
    }
}
