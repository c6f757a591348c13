//! Translation of virtual names into backend object keys.
//!
//! A virtual name is gated by an optional mount prefix, which is stripped
//! together with the separator that follows it. The remainder is joined
//! onto an optional base path inside the bucket.

pub const SEPARATOR: char = '/';

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct KeyResolver {
    mount: Option<String>,
    base_path: Option<String>,
}

impl KeyResolver {
    /// Empty strings are treated the same as an absent mount or base path.
    pub fn new(mount: Option<&str>, base_path: Option<&str>) -> Self {
        Self {
            mount: mount.filter(|m| !m.is_empty()).map(str::to_string),
            base_path: base_path.filter(|p| !p.is_empty()).map(str::to_string),
        }
    }

    pub fn mount(&self) -> Option<&str> {
        self.mount.as_deref()
    }

    pub fn base_path(&self) -> Option<&str> {
        self.base_path.as_deref()
    }

    /// Whether a name falls under this resolver's mount. Without a mount
    /// every name is accepted.
    pub fn handles(&self, name: &str) -> bool {
        match &self.mount {
            Some(mount) => name.starts_with(mount.as_str()),
            None => true,
        }
    }

    /// Resolve a virtual name to its backend key, or `None` when the name
    /// lies outside the mount.
    pub fn resolve(&self, name: &str) -> Option<String> {
        if !self.handles(name) {
            return None;
        }

        let relative = match &self.mount {
            Some(mount) => strip_segment(mount, name),
            None => name,
        };

        Some(match &self.base_path {
            Some(base) => normalize(&format!("{}{}{}", base, SEPARATOR, relative)),
            None => relative.to_string(),
        })
    }

    /// Strip the base path (and its separator) from a backend key, for display.
    pub fn display_key<'a>(&self, key: &'a str) -> &'a str {
        match &self.base_path {
            Some(base) => strip_segment(base, key),
            None => key,
        }
    }
}

/// Drop `prefix` plus the single character following it from the front of
/// `name`. Positional: the caller is responsible for `name` starting with
/// `prefix`.
pub fn strip_segment<'a>(prefix: &str, name: &'a str) -> &'a str {
    let rest = name.get(prefix.len()..).unwrap_or("");
    let mut chars = rest.chars();
    chars.next();
    chars.as_str()
}

/// Lexically normalize a slash-separated path: collapse repeated
/// separators, drop `.` segments and resolve `..` against preceding
/// segments. Leading and trailing separators are preserved.
pub fn normalize(path: &str) -> String {
    if path.is_empty() {
        return ".".to_string();
    }

    let absolute = path.starts_with(SEPARATOR);
    let trailing = path.ends_with(SEPARATOR);

    let mut segments: Vec<&str> = Vec::new();
    for segment in path.split(SEPARATOR) {
        match segment {
            "" | "." => {}
            ".." => match segments.last() {
                Some(&last) if last != ".." => {
                    segments.pop();
                }
                _ if absolute => {}
                _ => segments.push(".."),
            },
            other => segments.push(other),
        }
    }

    let mut out = segments.join("/");
    if out.is_empty() && !absolute {
        out.push('.');
    }
    if trailing && !out.is_empty() {
        out.push(SEPARATOR);
    }
    if absolute {
        out.insert(0, SEPARATOR);
    }
    out
}
