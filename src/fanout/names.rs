//! Static target-name -> display-name table.
//!
//! Used as the default alias when a selection does not provide one. Unknown
//! names fall back to the raw target name.

const DISPLAY_NAMES: &[(&str, &str)] = &[
    ("main", "Main"),
    ("primary", "Primary"),
    ("replica", "Replica"),
    ("analytics", "Analytics"),
    ("archive", "Archive"),
    ("staging", "Staging"),
];

/// Human-friendly display name for a target, falling back to `name`.
pub fn display_name(name: &str) -> &str {
    DISPLAY_NAMES
        .iter()
        .find(|(key, _)| *key == name)
        .map(|(_, title)| *title)
        .unwrap_or(name)
}
