//! Helpers for the textual domain names the cache and the walk work
//! with.
//!
//! A canonical name is lowercase and has no terminating dot.  The
//! root is the empty string.

use hickory_proto::rr::Name;

/// Lowercase a name and strip one terminating dot.
pub fn canonical_name(name: &str) -> String {
    name.strip_suffix('.').unwrap_or(name).to_ascii_lowercase()
}

/// Split a canonical name into its labels, most specific first.  The
/// root has no labels.
pub fn split_labels(name: &str) -> Vec<&str> {
    if name.is_empty() {
        Vec::new()
    } else {
        name.split('.').collect()
    }
}

/// Number of labels in a canonical name.
pub fn label_count(name: &str) -> usize {
    if name.is_empty() {
        0
    } else {
        name.split('.').count()
    }
}

/// The name one label longer than `ancestor` on the way down to the
/// name made of `labels`, or `None` if `ancestor` already has as many
/// labels.
pub fn extend_by_one_label(labels: &[&str], ancestor: &str) -> Option<String> {
    let depth = label_count(ancestor);
    if depth >= labels.len() {
        None
    } else {
        Some(labels[labels.len() - depth - 1..].join("."))
    }
}

/// Join a label onto the front of a canonical name.
pub fn prepend_label(label: &str, name: &str) -> String {
    if name.is_empty() {
        label.to_string()
    } else {
        format!("{label}.{name}")
    }
}

/// The fully-qualified wire form of a canonical name.
pub fn fqdn(name: &str) -> String {
    format!("{name}.")
}

/// Whether a canonical name can be put on the wire: no empty labels,
/// and within the length limits.  The root is valid.
pub fn is_valid_name(name: &str) -> bool {
    name.is_empty()
        || (!split_labels(name).contains(&"") && Name::from_ascii(fqdn(name)).is_ok())
}

/// Canonical form of a wire name.
pub fn from_wire_name(name: &Name) -> String {
    canonical_name(&name.to_ascii())
}
