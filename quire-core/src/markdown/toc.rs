//! Table of contents built from document headings.

use super::html_escape;
use serde::Serialize;

/// A heading found while rendering a document
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Heading {
    pub level: u32,
    pub title: String,
    pub id: String,
    /// False when the heading was marked `{: .no_toc}`
    pub in_toc: bool,
}

/// Render nested `<ul id="markdown-toc">` markup, or `None` without headings
pub fn render_toc(headings: &[Heading]) -> Option<String> {
    let mut html = String::new();
    // heading levels of the currently open lists, outermost first
    let mut open: Vec<u32> = Vec::new();

    for heading in headings.iter().filter(|h| h.in_toc) {
        match open.last().copied() {
            None => {
                html.push_str("<ul id=\"markdown-toc\">\n");
                open.push(heading.level);
            }
            Some(current) if heading.level > current => {
                html.push_str("\n<ul>\n");
                open.push(heading.level);
            }
            Some(_) => {
                html.push_str("</li>\n");
                while open.len() > 1 && heading.level < open[open.len() - 1] {
                    html.push_str("</ul>\n</li>\n");
                    open.pop();
                }
            }
        }

        html.push_str(&format!(
            "<li><a href=\"#{}\" id=\"markdown-toc-{}\">{}</a>",
            html_escape(&heading.id),
            html_escape(&heading.id),
            html_escape(&heading.title)
        ));
    }

    if open.is_empty() {
        return None;
    }

    html.push_str("</li>\n");
    while open.len() > 1 {
        html.push_str("</ul>\n</li>\n");
        open.pop();
    }
    html.push_str("</ul>\n");

    Some(html)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn heading(level: u32, title: &str) -> Heading {
        Heading {
            level,
            title: title.to_string(),
            id: crate::slugify(title),
            in_toc: true,
        }
    }

    #[test]
    fn test_nested_toc() {
        let toc = render_toc(&[
            heading(2, "Intro"),
            heading(3, "Detail"),
            heading(2, "Outro"),
        ])
        .unwrap();

        insta::assert_snapshot!(toc, @r###"
        <ul id="markdown-toc">
        <li><a href="#intro" id="markdown-toc-intro">Intro</a>
        <ul>
        <li><a href="#detail" id="markdown-toc-detail">Detail</a></li>
        </ul>
        </li>
        <li><a href="#outro" id="markdown-toc-outro">Outro</a></li>
        </ul>
        "###);
    }

    #[test]
    fn test_skipped_levels_close_cleanly() {
        let toc = render_toc(&[heading(2, "A"), heading(4, "B"), heading(3, "C")]).unwrap();
        assert_eq!(toc.matches("<ul").count(), toc.matches("</ul>").count());
        assert_eq!(toc.matches("<li>").count(), toc.matches("</li>").count());
    }

    #[test]
    fn test_excluded_headings() {
        let mut hidden = heading(2, "Contents");
        hidden.in_toc = false;
        assert!(render_toc(&[hidden.clone()]).is_none());
        let toc = render_toc(&[hidden, heading(2, "Body")]).unwrap();
        assert!(!toc.contains("contents"));
    }
}
