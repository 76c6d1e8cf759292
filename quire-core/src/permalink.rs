//! Permalink styles and output path normalization.

use crate::slug::slugify;
use chrono::{Datelike, NaiveDate};

/// Values substituted into a permalink pattern
#[derive(Debug, Clone)]
pub struct PermalinkVars<'a> {
    pub date: Option<NaiveDate>,
    /// Filename slug (`:title`)
    pub title: &'a str,
    pub categories: &'a [String],
}

/// Expand a named style (`date`, `pretty`, `ordinal`, `none`) to its pattern
pub fn style_pattern(style: &str) -> &str {
    match style.trim() {
        "date" => "/:categories/:year/:month/:day/:title:output_ext",
        "pretty" => "/:categories/:year/:month/:day/:title/",
        "ordinal" => "/:categories/:year/:y_day/:title:output_ext",
        "none" => "/:categories/:title:output_ext",
        custom => custom,
    }
}

/// Substitute placeholders in a permalink pattern, producing a URL path
///
/// # Example
///
/// ```
/// use chrono::NaiveDate;
/// use quire_core::permalink::{expand_permalink, PermalinkVars};
///
/// let vars = PermalinkVars {
///     date: NaiveDate::from_ymd_opt(2021, 3, 4),
///     title: "collection-views",
///     categories: &[],
/// };
/// assert_eq!(expand_permalink("date", &vars), "/2021/03/04/collection-views.html");
/// ```
pub fn expand_permalink(style_or_pattern: &str, vars: &PermalinkVars) -> String {
    let pattern = style_pattern(style_or_pattern);
    let categories = vars
        .categories
        .iter()
        .map(|c| slugify(c))
        .filter(|c| !c.is_empty())
        .collect::<Vec<_>>()
        .join("/");

    let mut replacements: Vec<(&str, String)> = vec![
        (":categories", categories),
        (":output_ext", ".html".to_string()),
        (":short_year", String::new()),
        (":i_month", String::new()),
        (":i_day", String::new()),
        (":y_day", String::new()),
        (":year", String::new()),
        (":month", String::new()),
        (":day", String::new()),
        (":title", vars.title.to_string()),
        (":slug", slugify(vars.title)),
    ];

    if let Some(date) = vars.date {
        for (key, value) in replacements.iter_mut() {
            *value = match *key {
                ":short_year" => format!("{:02}", date.year() % 100),
                ":i_month" => date.month().to_string(),
                ":i_day" => date.day().to_string(),
                ":y_day" => format!("{:03}", date.ordinal()),
                ":year" => date.year().to_string(),
                ":month" => format!("{:02}", date.month()),
                ":day" => format!("{:02}", date.day()),
                _ => continue,
            };
        }
    }

    let mut url = pattern.to_string();
    for (key, value) in &replacements {
        url = url.replace(key, value);
    }

    collapse_slashes(&format!("/{}", url.trim_start_matches('/')))
}

/// Relative output file for a URL path (no leading slash)
///
/// A trailing slash writes `index.html` in that directory; a last segment
/// without an extension gets `.html` appended. `.` and `..` segments are
/// dropped, so the result always stays inside the destination.
pub fn output_path_for(url: &str) -> String {
    let p = sanitize_url(url);
    let p = p.trim_start_matches('/');

    if p.is_empty() {
        return "index.html".to_string();
    }
    if p.ends_with('/') {
        return format!("{}index.html", p);
    }

    let last = p.rsplit('/').next().unwrap_or(p);
    if last.contains('.') {
        p.to_string()
    } else {
        format!("{}.html", p)
    }
}

/// Whether a URL contains `.` or `..` segments
pub fn has_dot_segments(url: &str) -> bool {
    url.trim().split('/').any(|s| s == "." || s == "..")
}

/// Output path of a tag page, relative to the destination
pub fn tag_output_path(tag: &str) -> String {
    let slug = slugify(tag);
    if slug.is_empty() {
        "tags/tag.html".to_string()
    } else {
        format!("tags/{}.html", slug)
    }
}

/// Output file for a page that has no permalink: its source path as `.html`
pub fn page_output_path(rel_source: &str) -> String {
    match rel_source.rsplit_once('.') {
        Some((stem, _ext)) if !stem.is_empty() => format!("{}.html", stem),
        _ => format!("{}.html", rel_source),
    }
}

fn sanitize_url(url: &str) -> String {
    let url = url.trim();
    let segments: Vec<&str> = url
        .split('/')
        .filter(|s| !s.is_empty() && *s != "." && *s != "..")
        .collect();
    let mut out = format!("/{}", segments.join("/"));
    if url.ends_with('/') && !segments.is_empty() {
        out.push('/');
    }
    out
}

fn collapse_slashes(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    for c in s.chars() {
        if c == '/' && out.ends_with('/') {
            continue;
        }
        out.push(c);
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    fn vars<'a>(categories: &'a [String]) -> PermalinkVars<'a> {
        PermalinkVars {
            date: NaiveDate::from_ymd_opt(2021, 2, 9),
            title: "sizing-rules",
            categories,
        }
    }

    #[test]
    fn test_styles() {
        let none: Vec<String> = vec![];
        assert_eq!(
            expand_permalink("date", &vars(&none)),
            "/2021/02/09/sizing-rules.html"
        );
        assert_eq!(
            expand_permalink("pretty", &vars(&none)),
            "/2021/02/09/sizing-rules/"
        );
        assert_eq!(
            expand_permalink("ordinal", &vars(&none)),
            "/2021/040/sizing-rules.html"
        );
        assert_eq!(expand_permalink("none", &vars(&none)), "/sizing-rules.html");
    }

    #[test]
    fn test_categories_are_included() {
        let cats = vec!["iOS Dev".to_string(), "swift".to_string()];
        assert_eq!(
            expand_permalink("date", &vars(&cats)),
            "/ios-dev/swift/2021/02/09/sizing-rules.html"
        );
    }

    #[test]
    fn test_custom_pattern() {
        let none: Vec<String> = vec![];
        assert_eq!(
            expand_permalink("/blog/:short_year/:i_month/:i_day/:slug", &vars(&none)),
            "/blog/21/2/9/sizing-rules"
        );
    }

    #[test]
    fn test_output_path_for() {
        assert_eq!(output_path_for("/2021/02/09/x.html"), "2021/02/09/x.html");
        assert_eq!(output_path_for("/about/"), "about/index.html");
        assert_eq!(output_path_for("/about"), "about.html");
        assert_eq!(output_path_for("/"), "index.html");
        assert_eq!(output_path_for("feed.xml"), "feed.xml");
        assert_eq!(output_path_for("//a//b/"), "a/b/index.html");
    }

    #[test]
    fn test_dot_segments_stay_inside_destination() {
        assert_eq!(output_path_for("/../../escaped/"), "escaped/index.html");
        assert_eq!(output_path_for("/a/./b/../c.html"), "a/b/c.html");
        assert_eq!(output_path_for("/.."), "index.html");
        assert!(has_dot_segments("/../../escaped/"));
        assert!(has_dot_segments("./about"));
        assert!(!has_dot_segments("/v1.2/notes/"));
    }

    #[test]
    fn test_tag_output_path() {
        assert_eq!(tag_output_path("Swift UI"), "tags/swift-ui.html");
        assert_eq!(tag_output_path("swift-ui"), "tags/swift-ui.html");
        assert_eq!(tag_output_path("!!!"), "tags/tag.html");
    }

    #[test]
    fn test_page_output_path() {
        assert_eq!(page_output_path("about.md"), "about.html");
        assert_eq!(page_output_path("docs/index.markdown"), "docs/index.html");
    }
}
