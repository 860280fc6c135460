//! Counter label rendering.
//!
//! A counter's name is `"<base>: <count>"` where the base label is chosen by
//! the operator (it is whatever precedes the first `:` in the current name).
//! Rendering must be idempotent so that re-rendering an already rendered
//! name with the same count reproduces it byte-for-byte — otherwise every
//! pass would look like a change and trigger a write.

/// Derive the new display name for a counter.
///
/// The portion of `current_name` before the first `:` (trimmed) is preserved
/// verbatim as the base label; if there is no `:` the whole trimmed name is
/// the base. An empty base renders as `": <count>"` rather than failing —
/// configuration validation is the caller's job.
#[must_use]
pub fn render_label(current_name: &str, count: usize) -> String {
    let base = match current_name.split_once(':') {
        Some((base, _)) => base.trim(),
        None => current_name.trim(),
    };
    format!("{base}: {count}")
}
