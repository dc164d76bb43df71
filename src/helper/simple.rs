use crate::links::{LinkResolver, LinkType, parse_rendered_link};

use super::RenderHelper;

/// Helper for standalone documents that only know a base link.
///
/// Every non-root link type resolves against the same base. With an empty
/// base, relative links stay relative and rooted links resolve against the
/// application root.
#[derive(Debug, Clone, Default)]
pub struct SimpleDocumentHelper {
    base_link: String,
}

impl SimpleDocumentHelper {
    pub fn new(base_link: impl Into<String>) -> Self {
        Self {
            base_link: base_link.into(),
        }
    }
}

impl RenderHelper for SimpleDocumentHelper {
    fn resolve_link(&self, resolver: &LinkResolver, link: &str, preferred: LinkType) -> String {
        let (link_type, link) = parse_rendered_link(link, preferred);
        if link_type == LinkType::Root || (self.base_link.is_empty() && link.starts_with('/')) {
            return resolver.resolve_root(link);
        }
        resolver.resolve_relative(&self.base_link, "", link)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::MarkupSettings;

    #[test]
    fn test_simple_document_links() {
        // Arrange
        let resolver = LinkResolver::new(&MarkupSettings::default(), None, false);
        let helper = SimpleDocumentHelper::new("/docs/guide");

        // Act & Assert
        assert_eq!(
            helper.resolve_link(&resolver, "intro.md", LinkType::Default),
            "/docs/guide/intro.md"
        );
        assert_eq!(
            helper.resolve_link(&resolver, "logo.png", LinkType::Media),
            "/docs/guide/logo.png"
        );
        assert_eq!(
            helper.resolve_link(&resolver, "https://example.com/x", LinkType::Default),
            "https://example.com/x"
        );
    }

    #[test]
    fn test_empty_base_keeps_relative_links() {
        // Arrange
        let resolver = LinkResolver::new(&MarkupSettings::default(), None, false);
        let helper = SimpleDocumentHelper::default();

        // Act & Assert
        assert_eq!(helper.resolve_link(&resolver, "a/b.md", LinkType::Default), "a/b.md");
        assert_eq!(helper.resolve_link(&resolver, "/user2", LinkType::Default), "/user2");
    }
}
