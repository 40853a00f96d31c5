// handlers/mod.rs - Route handlers grouped by access area
//
// Public (no session) → Dashboard (any signed-in caller) → role areas
// (admin, instructor, student). The access policy middleware in `app`
// decides who reaches which area; handlers read the resolved `Caller`.

pub mod admin;
pub mod dashboard;
pub mod instructor;
pub mod public;
pub mod student;

use url::form_urlencoded;

/// `path?message=...` for form actions that report back through a redirect.
pub(crate) fn with_message(path: &str, message: &str) -> String {
    let query: String = form_urlencoded::Serializer::new(String::new())
        .append_pair("message", message)
        .finish();
    format!("{}?{}", path, query)
}

/// Treat blank form fields as absent.
pub(crate) fn non_blank(value: Option<String>) -> Option<String> {
    value.map(|v| v.trim().to_string()).filter(|v| !v.is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn message_is_query_encoded() {
        assert_eq!(
            with_message("/login", "Invalid email or password"),
            "/login?message=Invalid+email+or+password"
        );
        assert_eq!(
            with_message("/login", "Account created successfully! Please sign in."),
            "/login?message=Account+created+successfully%21+Please+sign+in."
        );
    }

    #[test]
    fn blank_fields_are_absent() {
        assert_eq!(non_blank(Some("  ".into())), None);
        assert_eq!(non_blank(Some(" Austin ".into())), Some("Austin".into()));
        assert_eq!(non_blank(None), None);
    }
}
