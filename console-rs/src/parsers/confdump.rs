//! Block-structured daemon configuration parser
//!
//! Recognizes `key = value` lines, `key {` / `}` block delimiters and
//! `#` comments, with arbitrary nesting. An explicit line state machine
//! tracks quoting, so `=` or braces inside single or double quotes never
//! split a line or open a section. Unparsable fragments are logged and
//! skipped; daemon dumps are large and partially decorative.

use std::collections::BTreeMap;
use tracing::debug;

/// One node of the parsed configuration tree.
#[derive(Debug, Clone, PartialEq)]
pub enum ConfNode {
    Leaf(String),
    Section(BTreeMap<String, ConfNode>),
}

impl ConfNode {
    pub fn section() -> Self {
        ConfNode::Section(BTreeMap::new())
    }

    /// Descend a path of section keys, returning the node at the end.
    pub fn get_path(&self, path: &[&str]) -> Option<&ConfNode> {
        let mut node = self;
        for key in path {
            match node {
                ConfNode::Section(children) => node = children.get(*key)?,
                ConfNode::Leaf(_) => return None,
            }
        }
        Some(node)
    }

    /// Leaf value at a path, if the path ends in a leaf.
    pub fn leaf_at(&self, path: &[&str]) -> Option<&str> {
        match self.get_path(path)? {
            ConfNode::Leaf(value) => Some(value),
            ConfNode::Section(_) => None,
        }
    }

    /// Child entries when this node is a section.
    pub fn entries(&self) -> Option<&BTreeMap<String, ConfNode>> {
        match self {
            ConfNode::Section(children) => Some(children),
            ConfNode::Leaf(_) => None,
        }
    }
}

/// Split a line at the first unquoted occurrence of `needle`.
fn split_unquoted(line: &str, needle: char) -> Option<(&str, &str)> {
    let mut in_single = false;
    let mut in_double = false;
    for (i, c) in line.char_indices() {
        match c {
            '\'' if !in_double => in_single = !in_single,
            '"' if !in_single => in_double = !in_double,
            c if c == needle && !in_single && !in_double => {
                return Some((&line[..i], &line[i + c.len_utf8()..]));
            }
            _ => {}
        }
    }
    None
}

/// True when the line ends with an unquoted `{`.
fn opens_section(line: &str) -> bool {
    if !line.ends_with('{') {
        return false;
    }
    let mut in_single = false;
    let mut in_double = false;
    let mut last_unquoted_brace = false;
    for c in line.chars() {
        match c {
            '\'' if !in_double => in_single = !in_single,
            '"' if !in_single => in_double = !in_double,
            '{' => last_unquoted_brace = !in_single && !in_double,
            _ => last_unquoted_brace = false,
        }
    }
    last_unquoted_brace
}

/// Strip one layer of matching surrounding quotes.
fn unquote(value: &str) -> &str {
    let bytes = value.as_bytes();
    if bytes.len() >= 2
        && (bytes[0] == b'"' || bytes[0] == b'\'')
        && bytes[bytes.len() - 1] == bytes[0]
    {
        &value[1..value.len() - 1]
    } else {
        value
    }
}

/// Parse a configuration dump into a tree.
///
/// Duplicate sections merge; duplicate leaves take the last value.
pub fn parse(text: &str) -> ConfNode {
    let mut root = BTreeMap::new();
    // Path of section keys from the root to the current block
    let mut path: Vec<String> = Vec::new();

    for (lineno, raw) in text.lines().enumerate() {
        let line = raw.trim();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }

        if line == "}" {
            if path.pop().is_none() {
                debug!("conf dump line {}: unbalanced closing brace", lineno + 1);
            }
            continue;
        }

        if opens_section(line) {
            let key = line[..line.len() - 1].trim();
            if key.is_empty() {
                debug!("conf dump line {}: anonymous block skipped", lineno + 1);
                path.push(String::new());
                continue;
            }
            enter_section(&mut root, &path, key);
            path.push(key.to_string());
            continue;
        }

        if let Some((key, value)) = split_unquoted(line, '=') {
            let key = key.trim();
            let value = unquote(value.trim()).to_string();
            if key.is_empty() {
                debug!("conf dump line {}: empty key skipped", lineno + 1);
                continue;
            }
            insert_leaf(&mut root, &path, key, value);
            continue;
        }

        debug!("conf dump line {}: unparsable fragment skipped", lineno + 1);
    }

    ConfNode::Section(root)
}

fn resolve_section<'a>(
    root: &'a mut BTreeMap<String, ConfNode>,
    path: &[String],
) -> Option<&'a mut BTreeMap<String, ConfNode>> {
    let mut current = root;
    for key in path {
        if key.is_empty() {
            // Inside an anonymous (skipped) block
            return None;
        }
        let node = current
            .entry(key.clone())
            .or_insert_with(ConfNode::section);
        match node {
            ConfNode::Section(children) => current = children,
            // A leaf shadowing a section name; the section wins
            leaf => {
                *leaf = ConfNode::section();
                match leaf {
                    ConfNode::Section(children) => current = children,
                    ConfNode::Leaf(_) => unreachable!(),
                }
            }
        }
    }
    Some(current)
}

fn enter_section(root: &mut BTreeMap<String, ConfNode>, path: &[String], key: &str) {
    if let Some(parent) = resolve_section(root, path) {
        match parent.get(key) {
            Some(ConfNode::Section(_)) => {} // merge into the existing section
            _ => {
                parent.insert(key.to_string(), ConfNode::section());
            }
        }
    }
}

fn insert_leaf(root: &mut BTreeMap<String, ConfNode>, path: &[String], key: &str, value: String) {
    if let Some(parent) = resolve_section(root, path) {
        parent.insert(key.to_string(), ConfNode::Leaf(value));
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_flat_key_values() {
        let tree = parse("mail_plugins = quota fts\nlog_path = /var/log/mail.log\n");
        assert_eq!(tree.leaf_at(&["mail_plugins"]), Some("quota fts"));
        assert_eq!(tree.leaf_at(&["log_path"]), Some("/var/log/mail.log"));
    }

    #[test]
    fn test_nested_blocks() {
        let dump = r#"
namespace inbox {
  inbox = yes
  mailbox Drafts {
    special_use = \Drafts
  }
}
"#;
        let tree = parse(dump);
        assert_eq!(tree.leaf_at(&["namespace inbox", "inbox"]), Some("yes"));
        assert_eq!(
            tree.leaf_at(&["namespace inbox", "mailbox Drafts", "special_use"]),
            Some("\\Drafts")
        );
    }

    #[test]
    fn test_quoted_equals_and_braces() {
        let dump = r#"
plugin {
  sieve_vacation_default_subject = "Out of office = true"
  fts_filters = "normalizer {icu}"
}
"#;
        let tree = parse(dump);
        assert_eq!(
            tree.leaf_at(&["plugin", "sieve_vacation_default_subject"]),
            Some("Out of office = true")
        );
        assert_eq!(
            tree.leaf_at(&["plugin", "fts_filters"]),
            Some("normalizer {icu}")
        );
    }

    #[test]
    fn test_comments_and_garbage_skipped() {
        let dump = "# comment\nkey = value\n<<< decorative banner >>>\nother = 1\n";
        let tree = parse(dump);
        assert_eq!(tree.leaf_at(&["key"]), Some("value"));
        assert_eq!(tree.leaf_at(&["other"]), Some("1"));
        // Garbage neither aborts nor appears in the tree
        assert_eq!(tree.entries().unwrap().len(), 2);
    }

    #[test]
    fn test_unbalanced_braces_tolerated() {
        let tree = parse("}\n}\nkey = value\n");
        assert_eq!(tree.leaf_at(&["key"]), Some("value"));
    }

    #[test]
    fn test_duplicate_sections_merge() {
        let dump = "plugin {\n  a = 1\n}\nplugin {\n  b = 2\n}\n";
        let tree = parse(dump);
        assert_eq!(tree.leaf_at(&["plugin", "a"]), Some("1"));
        assert_eq!(tree.leaf_at(&["plugin", "b"]), Some("2"));
    }

    #[test]
    fn test_duplicate_leaves_last_wins() {
        let tree = parse("key = first\nkey = second\n");
        assert_eq!(tree.leaf_at(&["key"]), Some("second"));
    }

    #[test]
    fn test_deep_nesting() {
        let mut dump = String::new();
        for i in 0..16 {
            dump.push_str(&format!("level{i} {{\n"));
        }
        dump.push_str("deep = yes\n");
        for _ in 0..16 {
            dump.push_str("}\n");
        }

        let tree = parse(&dump);
        let path: Vec<String> = (0..16).map(|i| format!("level{i}")).collect();
        let mut refs: Vec<&str> = path.iter().map(|s| s.as_str()).collect();
        refs.push("deep");
        assert_eq!(tree.leaf_at(&refs), Some("yes"));
    }
}
