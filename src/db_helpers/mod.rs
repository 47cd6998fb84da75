mod admin_helpers;
mod comment_helpers;
mod follow_helpers;
mod post_helpers;
mod profile_helpers;
mod session_helpers;
mod user_helpers;

pub use admin_helpers::*;
pub use comment_helpers::*;
pub use follow_helpers::*;
pub use post_helpers::*;
pub use profile_helpers::*;
pub use session_helpers::*;
pub use user_helpers::*;

/// Wraps a user search term for a `LIKE` comparison. Blank terms become `None`
/// so the `?1 IS NULL` branch of the query matches everything.
pub(crate) fn like_pattern(term: Option<&str>) -> Option<String> {
    term.map(str::trim)
        .filter(|t| !t.is_empty())
        .map(|t| format!("%{}%", t))
}
