/// Normalizes a repo-relative path: forward slashes, no `./` prefix, no empty segments.
pub fn normalize_path(raw: &str) -> String {
    let mut value = raw.trim().replace('\\', "/");
    while value.starts_with("./") {
        value = value[2..].to_string();
    }
    let value = value.trim_matches('/');
    if value == "." {
        return String::new();
    }
    value
        .split('/')
        .filter(|segment| !segment.is_empty() && *segment != ".")
        .collect::<Vec<_>>()
        .join("/")
}

pub fn basename(raw: &str) -> String {
    let normalized = normalize_path(raw);
    match normalized.rsplit_once('/') {
        Some((_, name)) => name.to_string(),
        None if normalized.is_empty() => raw.to_string(),
        None => normalized,
    }
}

/// Every proper directory prefix of `raw`, shallowest first.
///
/// `a/b/c.py` yields `["a", "a/b"]`.
pub fn ancestor_paths(raw: &str) -> Vec<String> {
    let normalized = normalize_path(raw);
    let parts: Vec<&str> = normalized.split('/').filter(|p| !p.is_empty()).collect();
    let mut out = Vec::with_capacity(parts.len().saturating_sub(1));
    let mut current = String::new();
    for part in parts.iter().take(parts.len().saturating_sub(1)) {
        if !current.is_empty() {
            current.push('/');
        }
        current.push_str(part);
        out.push(current.clone());
    }
    out
}

/// True when `path` equals `prefix` or lives underneath it.
pub fn path_has_prefix(prefix: &str, path: &str) -> bool {
    if path == prefix {
        return true;
    }
    if !path.starts_with(prefix) {
        return false;
    }
    path.as_bytes().get(prefix.len()) == Some(&b'/')
}
