use regex::Regex;

pub const MAX_NAME_LEN: usize = 100;
const LAST_RESORT_NAME: &str = "target";

lazy_static! {
    static ref UNSAFE_RUN: Regex = Regex::new(r"[^A-Za-z0-9 _\-]+").unwrap();
}

/// Reduces an arbitrary (possibly hostile) string to `[A-Za-z0-9_-]`, at most
/// `MAX_NAME_LEN` characters. May return an empty string.
pub fn sanitize(name: &str) -> String {
    let name = UNSAFE_RUN.replace_all(name, "_");
    let mut name = name.trim().replace(' ', "_");
    // ascii only at this point, byte truncation is safe
    name.truncate(MAX_NAME_LEN);
    name
}

/// Base file name for a target's artifacts: the sanitized title, else the
/// sanitized target identifier. Never empty.
pub fn base_name(title: &str, fallback: &str) -> String {
    let name = sanitize(title);
    if !name.is_empty() {
        return name;
    }
    let name = sanitize(fallback);
    if !name.is_empty() {
        return name;
    }
    LAST_RESORT_NAME.into()
}

pub fn artifact_name(base: &str, timestamp: &str, ext: &str) -> String {
    format!("{}_{}.{}", base, timestamp, ext)
}
