//! Slug generation for titles, tags and heading ids.

/// Convert a string to a URL-safe slug
///
/// Rules:
/// - Lowercase
/// - Every run of characters that are not letters or digits becomes one hyphen
/// - Apostrophes are dropped instead of splitting words
/// - Leading/trailing hyphens are trimmed
///
/// # Examples
///
/// ```
/// use quire_core::slugify;
///
/// assert_eq!(slugify("Hello World"), "hello-world");
/// assert_eq!(slugify("SwiftUI & UIKit"), "swiftui-uikit");
/// assert_eq!(slugify("What's a View?"), "whats-a-view");
/// ```
pub fn slugify(input: &str) -> String {
    let mut slug = String::with_capacity(input.len());
    let mut pending_hyphen = false;

    for c in input.chars() {
        if c == '\'' || c == '\u{2019}' {
            continue;
        }
        if c.is_alphanumeric() {
            if pending_hyphen && !slug.is_empty() {
                slug.push('-');
            }
            pending_hyphen = false;
            slug.extend(c.to_lowercase());
        } else {
            pending_hyphen = true;
        }
    }

    slug
}

/// Turn a slug back into a readable title ("collection-views" -> "Collection views")
pub fn unslugify(slug: &str) -> String {
    let spaced = slug.replace(['-', '_'], " ");
    let mut chars = spaced.trim().chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}
