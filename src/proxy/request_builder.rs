//! Joins a target's base path with the (possibly rewritten) request path,
//! and assembles the full outbound URL.

use url::Url;

/// Exactly one `/` between `a` and `b`, regardless of which side already
/// carries one.
#[must_use]
pub fn single_joining_slash(a: &str, b: &str) -> String {
    let a_slash = a.ends_with('/');
    let b_slash = b.starts_with('/');
    match (a_slash, b_slash) {
        (true, true) => format!("{a}{}", &b[1..]),
        (false, false) => format!("{a}/{b}"),
        _ => format!("{a}{b}"),
    }
}

/// Builds the full upstream URL by joining the target's base path with the
/// request path, preserving the target's query string semantics: request
/// query parameters are forwarded verbatim.
#[must_use]
pub fn build_upstream_url(target: &Url, request_path: &str, query: Option<&str>) -> Url {
    let mut out = target.clone();
    let joined = single_joining_slash(target.path(), request_path);
    out.set_path(&joined);
    out.set_query(query);
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn both_sides_have_slash() {
        assert_eq!(single_joining_slash("/x/", "/y"), "/x/y");
    }

    #[test]
    fn neither_side_has_slash() {
        assert_eq!(single_joining_slash("/x", "y"), "/x/y");
    }

    #[test]
    fn only_left_has_slash() {
        assert_eq!(single_joining_slash("/x/", "y"), "/x/y");
    }

    #[test]
    fn only_right_has_slash() {
        assert_eq!(single_joining_slash("/x", "/y"), "/x/y");
    }

    #[test]
    fn build_upstream_url_joins_and_preserves_query() {
        let target = Url::parse("http://example.com/base/").unwrap();
        let out = build_upstream_url(&target, "/x", Some("a=1"));
        assert_eq!(out.as_str(), "http://example.com/base/x?a=1");
    }
}
