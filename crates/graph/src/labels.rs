use gitreader_protocol::paths::basename;
use gitreader_protocol::{NodeKind, SymbolNode};
use serde::Serialize;

/// Label data attached to each canvas node and reused by the tooltip.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct NodeLabel {
    pub label: String,
    pub full_label: String,
    pub path: String,
    pub kind_label: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Tooltip {
    pub title: String,
    pub meta: String,
}

pub fn format_node_label(node: &SymbolNode, line_length: usize) -> NodeLabel {
    let path = node.path().unwrap_or_default().to_string();
    let full_label = if node.name.is_empty() {
        path.clone()
    } else {
        node.name.clone()
    };
    let display = display_name(node, &full_label, &path);
    let label = wrap_label(&format!("[{}]", kind_badge(node.kind)), &display, line_length);
    NodeLabel {
        label,
        full_label,
        path,
        kind_label: kind_label(node.kind).to_string(),
    }
}

pub fn tooltip(label: &NodeLabel) -> Tooltip {
    let meta = if label.path.is_empty() {
        label.kind_label.clone()
    } else {
        format!("{} - {}", label.kind_label, label.path)
    };
    Tooltip {
        title: label.full_label.clone(),
        meta,
    }
}

fn display_name(node: &SymbolNode, full_label: &str, path: &str) -> String {
    let fallback = if path.is_empty() { full_label } else { path };
    match node.kind {
        NodeKind::File => basename(fallback),
        NodeKind::Folder if !node.name.is_empty() => node.name.clone(),
        NodeKind::Folder => basename(fallback),
        _ => full_label.to_string(),
    }
}

/// Two-line label: `prefix name...` then the remainder, truncated with `...`.
pub fn wrap_label(prefix: &str, name: &str, line_length: usize) -> String {
    let normalized = name.split_whitespace().collect::<Vec<_>>().join(" ");
    if normalized.is_empty() {
        return prefix.to_string();
    }
    let max_len = line_length.max(8);
    let prefix_text = if prefix.is_empty() {
        String::new()
    } else {
        format!("{prefix} ")
    };
    let first_limit = max_len.saturating_sub(prefix_text.chars().count()).max(4);

    let chars: Vec<char> = normalized.chars().collect();
    let split = first_limit.min(chars.len());
    let first: String = chars[..split].iter().collect();
    let remaining: String = chars[split..].iter().collect::<String>().trim_start().to_string();

    let mut label = format!("{prefix_text}{first}");
    if !remaining.is_empty() {
        let rest: Vec<char> = remaining.chars().collect();
        let second: String = if rest.len() > max_len {
            let keep = max_len.saturating_sub(3);
            format!("{}...", rest[..keep].iter().collect::<String>())
        } else {
            remaining
        };
        label.push('\n');
        label.push_str(&second);
    }
    label
}

pub fn kind_badge(kind: NodeKind) -> &'static str {
    match kind {
        NodeKind::File => "F",
        NodeKind::Folder => "dir",
        NodeKind::Class => "C",
        NodeKind::Function => "fn",
        NodeKind::Method => "m",
        NodeKind::Blueprint => "bp",
        NodeKind::External => "ext",
    }
}

pub fn kind_label(kind: NodeKind) -> &'static str {
    match kind {
        NodeKind::File => "File",
        NodeKind::Folder => "Folder",
        NodeKind::Class => "Class",
        NodeKind::Function => "Function",
        NodeKind::Method => "Method",
        NodeKind::Blueprint => "Blueprint",
        NodeKind::External => "External",
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn short_names_stay_on_one_line() {
        assert_eq!(wrap_label("[fn]", "run", 18), "[fn] run");
        assert_eq!(wrap_label("[fn]", "   ", 18), "[fn]");
    }

    #[test]
    fn long_names_wrap_and_truncate() {
        let label = wrap_label("[C]", "AuthenticationServiceFactoryBuilderRegistry", 18);
        let lines: Vec<&str> = label.lines().collect();
        assert_eq!(lines.len(), 2);
        assert_eq!(lines[0], "[C] Authentication");
        assert!(lines[1].ends_with("..."));
        assert_eq!(lines[1].chars().count(), 18);
    }

    #[test]
    fn files_use_basename_and_tooltip_shows_path() {
        let node = SymbolNode::new("f", "app/routes/users.py", NodeKind::File)
            .with_path("app/routes/users.py");
        let label = format_node_label(&node, 18);
        assert_eq!(label.label, "[F] users.py");
        assert_eq!(label.kind_label, "File");
        let tip = tooltip(&label);
        assert_eq!(tip.title, "app/routes/users.py");
        assert_eq!(tip.meta, "File - app/routes/users.py");
    }

    #[test]
    fn pathless_tooltip_is_kind_only() {
        let node = SymbolNode::new("x", "requests", NodeKind::External);
        let tip = tooltip(&format_node_label(&node, 18));
        assert_eq!(tip.meta, "External");
    }
}
