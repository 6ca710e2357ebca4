//! `query_mirror`: declared by scenario files but without defined comparison
//! semantics, so it never succeeds.

/// Always `false`. The dispatcher records why in the trace.
pub fn evaluate() -> bool {
    false
}
