//! URL to cache file name mapping.
//!
//! File names are `hash32(url) + extension`. The hash is a 32-bit rolling
//! hash, so two URLs can map to the same file; such collisions silently
//! alias and are accepted.

/// How a URL relates to the cache.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ResolvedPath {
    /// Not an `http(s)://` or `file://` URL; served unchanged, never cached.
    Relative,
    /// Cacheable URL and the file name it is stored under.
    Cacheable { file_name: String },
}

impl ResolvedPath {
    pub fn is_relative(&self) -> bool {
        matches!(self, ResolvedPath::Relative)
    }

    pub fn file_name(&self) -> Option<&str> {
        match self {
            ResolvedPath::Relative => None,
            ResolvedPath::Cacheable { file_name } => Some(file_name),
        }
    }
}

/// Map a URL to its cache file name.
pub fn resolve(url: &str, fallback_extension: &str) -> ResolvedPath {
    if is_relative(url) {
        return ResolvedPath::Relative;
    }

    ResolvedPath::Cacheable {
        file_name: file_name_for(url, fallback_extension),
    }
}

/// `true` unless the URL starts with `http://`, `https://` or `file://`
/// (case-insensitive).
pub fn is_relative(url: &str) -> bool {
    const SCHEMES: [&str; 3] = ["http://", "https://", "file://"];

    !SCHEMES.iter().any(|scheme| {
        url.get(..scheme.len())
            .is_some_and(|prefix| prefix.eq_ignore_ascii_case(scheme))
    })
}

/// Deterministic cache file name for a URL.
pub fn file_name_for(url: &str, fallback_extension: &str) -> String {
    format!("{}{}", hash32(url), extension_of(url, fallback_extension))
}

/// 32-bit rolling hash (`h = h * 31 + unit`) over the UTF-16 code units of `s`.
pub fn hash32(s: &str) -> i32 {
    s.encode_utf16()
        .fold(0i32, |hash, unit| hash.wrapping_mul(31).wrapping_add(i32::from(unit)))
}

/// Everything from the last `.` of the URL, query string and fragment
/// ignored.
///
/// Falls back to `fallback` when there is no `.` or when the last one sits
/// before a `/` (`https://a.com/photo` would otherwise yield `.com/photo`).
pub fn extension_of<'a>(url: &'a str, fallback: &'a str) -> &'a str {
    let without_params = url.split(['?', '#']).next().unwrap_or(url);

    match without_params.rfind('.') {
        Some(dot) if !without_params[dot..].contains('/') => &without_params[dot..],
        _ => fallback,
    }
}
