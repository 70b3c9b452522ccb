//! Request path -> route template resolution.
//!
//! Templates are scanned in registration order on every request and the
//! first match wins. Overlapping templates are the host's problem: the result
//! is deterministic given the order, nothing more.

use crate::template::{RouteTemplate, TemplateSegment};

/// Label used when no template matches.
pub const DEFAULT_UNRESOLVED_LABEL: &str = "unresolved";

/// Method part of the label for anything outside the standard set. Clients
/// may send arbitrary method tokens; labels must not follow them.
pub const OTHER_METHOD: &str = "OTHER";

const STANDARD_METHODS: [&str; 9] = ["GET", "HEAD", "POST", "PUT", "DELETE", "PATCH", "OPTIONS", "CONNECT", "TRACE"];

/// Standard methods pass through as is (method tokens are case-sensitive);
/// everything else collapses to [`OTHER_METHOD`].
pub fn label_method(method: &str) -> &str {
    if STANDARD_METHODS.iter().any(|m| *m == method) {
        method
    } else {
        OTHER_METHOD
    }
}

#[derive(Debug, Clone)]
pub struct MatchOptions {
    pub case_sensitive: bool,
    pub unresolved_label: String,
}

impl Default for MatchOptions {
    fn default() -> Self {
        Self {
            case_sensitive: true,
            unresolved_label: DEFAULT_UNRESOLVED_LABEL.to_string(),
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct RouteTemplateMatcher {
    opts: MatchOptions,
}

impl RouteTemplateMatcher {
    pub fn new(opts: MatchOptions) -> Self {
        Self { opts }
    }

    pub fn unresolved_label(&self) -> &str {
        &self.opts.unresolved_label
    }

    /// First template (registration order) matching `path`.
    pub fn resolve_template<'r>(&self, path: &str, routes: &'r [RouteTemplate]) -> Option<&'r RouteTemplate> {
        let segments = split_path(path);
        routes.iter().find(|t| self.matches(t.segments(), &segments))
    }

    /// Metric label for a request: `"{METHOD} {template}"`, or the sentinel.
    pub fn resolve(&self, method: &str, path: &str, routes: &[RouteTemplate]) -> String {
        match self.resolve_template(path, routes) {
            Some(t) => format!("{} {}", label_method(method), t.pattern()),
            None => self.opts.unresolved_label.clone(),
        }
    }

    fn matches(&self, template: &[TemplateSegment], path: &[&str]) -> bool {
        // Only a trailing defaulted parameter may be absent from the path.
        let required = match template.last() {
            Some(last) if last.can_be_omitted() && path.len() + 1 == template.len() => path.len(),
            _ if path.len() == template.len() => template.len(),
            _ => return false,
        };

        template[..required]
            .iter()
            .zip(path)
            .all(|(seg, actual)| self.segment_matches(seg, actual))
    }

    fn segment_matches(&self, seg: &TemplateSegment, actual: &str) -> bool {
        match seg {
            TemplateSegment::Literal(lit) if self.opts.case_sensitive => lit == actual,
            TemplateSegment::Literal(lit) => lit.eq_ignore_ascii_case(actual),
            TemplateSegment::Parameter { .. } => !actual.is_empty(),
        }
    }
}

/// Split a request path into segments. Leading and trailing `/` are ignored;
/// interior empty segments are kept so that `//` never matches a parameter.
fn split_path(path: &str) -> Vec<&str> {
    let trimmed = path.trim_matches('/');
    if trimmed.is_empty() {
        return Vec::new();
    }
    trimmed.split('/').collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::template::RouteDescriptor;

    fn routes(patterns: &[&str]) -> Vec<RouteTemplate> {
        patterns.iter().map(|p| RouteTemplate::parse(p).unwrap()).collect()
    }

    #[test]
    fn literal_and_parameter_match() {
        let m = RouteTemplateMatcher::default();
        let r = routes(&["/users", "/users/{id}"]);
        assert_eq!(m.resolve("GET", "/users/42", &r), "GET /users/{id}");
        assert_eq!(m.resolve("GET", "/users", &r), "GET /users");
        assert_eq!(m.resolve("GET", "/users/42/", &r), "GET /users/{id}");
    }

    #[test]
    fn unmatched_path_is_sentinel() {
        let m = RouteTemplateMatcher::default();
        let r = routes(&["/users/{id}"]);
        assert_eq!(m.resolve("GET", "/foo/bar", &r), "unresolved");
        assert_eq!(m.resolve("GET", "/users/42/extra", &r), "unresolved");
        assert_eq!(m.resolve("GET", "/users//", &r), "unresolved");
        assert_eq!(m.resolve("GET", "/foo", &[]), "unresolved");
    }

    #[test]
    fn empty_interior_segment_does_not_bind_parameter() {
        let m = RouteTemplateMatcher::default();
        let r = routes(&["/a/{x}/b"]);
        assert!(m.resolve_template("/a//b", &r).is_none());
        assert!(m.resolve_template("/a/1/b", &r).is_some());
    }

    #[test]
    fn trailing_default_may_be_omitted() {
        let m = RouteTemplateMatcher::default();
        let desc = RouteDescriptor::new("/orders/{page}").with_default("page", "1");
        let r = vec![RouteTemplate::compile(&desc).unwrap()];
        assert_eq!(m.resolve("GET", "/orders", &r), "GET /orders/{page}");
        assert_eq!(m.resolve("GET", "/orders/7", &r), "GET /orders/{page}");
        assert_eq!(m.resolve("GET", "/", &r), "unresolved");
    }

    #[test]
    fn non_trailing_default_is_required() {
        let m = RouteTemplateMatcher::default();
        let r = routes(&["/{section=home}/list"]);
        assert_eq!(m.resolve("GET", "/list", &r), "unresolved");
        assert_eq!(m.resolve("GET", "/news/list", &r), "GET /{section=home}/list");
    }

    #[test]
    fn first_registered_wins() {
        let m = RouteTemplateMatcher::default();
        let r = routes(&["/items/{id}", "/items/special"]);
        assert_eq!(m.resolve("GET", "/items/special", &r), "GET /items/{id}");
        let r = routes(&["/items/special", "/items/{id}"]);
        assert_eq!(m.resolve("GET", "/items/special", &r), "GET /items/special");
    }

    #[test]
    fn case_sensitivity_is_configurable() {
        let r = routes(&["/Users/{id}"]);
        let strict = RouteTemplateMatcher::default();
        assert_eq!(strict.resolve("GET", "/users/1", &r), "unresolved");

        let relaxed = RouteTemplateMatcher::new(MatchOptions { case_sensitive: false, ..Default::default() });
        assert_eq!(relaxed.resolve("GET", "/users/1", &r), "GET /Users/{id}");
    }

    #[test]
    fn root_template_matches_root_path() {
        let m = RouteTemplateMatcher::default();
        let r = routes(&["/"]);
        assert_eq!(m.resolve("GET", "/", &r), "GET /");
        assert_eq!(m.resolve("GET", "", &r), "GET /");
    }

    #[test]
    fn extension_methods_share_one_label() {
        let m = RouteTemplateMatcher::default();
        let r = routes(&["/users/{id}"]);
        assert_eq!(m.resolve("DELETE", "/users/1", &r), "DELETE /users/{id}");
        assert_eq!(m.resolve("PURGE", "/users/1", &r), "OTHER /users/{id}");
        assert_eq!(m.resolve("get", "/users/1", &r), "OTHER /users/{id}");
        assert_eq!(m.resolve("X42", "/nope", &r), "unresolved");
    }

    #[test]
    fn resolution_is_deterministic() {
        let m = RouteTemplateMatcher::default();
        let r = routes(&["/a/{x}", "/a/b", "/{y}/b"]);
        let first = m.resolve("POST", "/a/b", &r);
        for _ in 0..100 {
            assert_eq!(m.resolve("POST", "/a/b", &r), first);
        }
    }
}
