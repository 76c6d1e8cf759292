//! Markdown processing pipeline with kramdown-compatible extensions.

pub mod highlight;
pub mod toc;

use crate::slug::slugify;
use once_cell::sync::Lazy;
use pulldown_cmark::{html, CowStr, Event, HeadingLevel, Options, Parser, Tag, TagEnd};
use regex::Regex;
use std::collections::HashSet;

pub use highlight::HighlightTransformer;
pub use toc::{render_toc, Heading};

const TOC_MARKER: &str = "<!-- quire:toc -->";

/// kramdown's `* TOC` list item followed by `{:toc}`
static TOC_DIRECTIVE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?m)^[ \t]*[*+\-][ \t]+[^\n]*\r?\n[ \t]*\{:[ \t]*toc[ \t]*\}[ \t]*$").unwrap()
});

/// A standalone kramdown attribute list like `{: .no_toc}`
static ATTRIBUTE_LIST: Lazy<Regex> = Lazy::new(|| Regex::new(r"^\{:[^}]*\}$").unwrap());

/// Output of [`MarkdownProcessor::convert`]
#[derive(Debug, Clone, Default)]
pub struct Rendered {
    pub html: String,
    /// Table of contents, when the document has headings
    pub toc_html: Option<String>,
    /// Plain text of the first paragraph
    pub excerpt: Option<String>,
    pub headings: Vec<Heading>,
}

/// Markdown processor with custom extensions
pub struct MarkdownProcessor {
    options: Options,
}

impl MarkdownProcessor {
    pub fn new() -> Self {
        let mut options = Options::empty();
        options.insert(Options::ENABLE_TABLES);
        options.insert(Options::ENABLE_FOOTNOTES);
        options.insert(Options::ENABLE_STRIKETHROUGH);
        options.insert(Options::ENABLE_TASKLISTS);
        options.insert(Options::ENABLE_HEADING_ATTRIBUTES);

        Self { options }
    }

    /// Convert markdown to HTML with all custom transforms
    pub fn convert(&self, markdown: &str) -> Rendered {
        let (markdown, has_toc_directive) = replace_toc_directive(markdown);

        let events: Vec<Event<'static>> = Parser::new_ext(&markdown, self.options)
            .map(Event::into_static)
            .collect();

        // Drop attribute lists, remembering which headings opted out of the TOC
        let (events, no_toc) = strip_attribute_lists(events);

        let headings = collect_headings(&events, &no_toc);
        let excerpt = first_paragraph_text(&events);

        let events = attach_heading_ids(events, &headings);
        let events = add_heading_anchors(events);

        let highlight_transformer = HighlightTransformer::new();
        let events = highlight_transformer.transform(events);

        let mut html_output = String::new();
        html::push_html(&mut html_output, events.into_iter());

        let toc_html = render_toc(&headings);

        if has_toc_directive {
            html_output = html_output.replace(TOC_MARKER, toc_html.as_deref().unwrap_or(""));
        }

        Rendered {
            html: html_output,
            toc_html,
            excerpt,
            headings,
        }
    }

    /// Convert markdown to HTML, discarding the TOC and excerpt
    pub fn convert_simple(&self, markdown: &str) -> String {
        self.convert(markdown).html
    }
}

impl Default for MarkdownProcessor {
    fn default() -> Self {
        Self::new()
    }
}

fn replace_toc_directive(markdown: &str) -> (String, bool) {
    if !TOC_DIRECTIVE.is_match(markdown) {
        return (markdown.to_string(), false);
    }
    let replaced = TOC_DIRECTIVE.replace(markdown, format!("\n{}\n", TOC_MARKER).as_str());
    (replaced.into_owned(), true)
}

/// Remove standalone `{: ...}` paragraphs.
///
/// Returns the events and the indices (in document order) of headings that
/// were followed by `{: .no_toc}`.
fn strip_attribute_lists(events: Vec<Event<'static>>) -> (Vec<Event<'static>>, HashSet<usize>) {
    let mut result = Vec::with_capacity(events.len());
    let mut no_toc = HashSet::new();
    let mut heading_count = 0usize;
    let mut after_heading = false;
    let mut i = 0;

    while i < events.len() {
        match &events[i] {
            Event::Start(Tag::Paragraph) => {
                // paragraphs never nest, so the next End(Paragraph) closes this one
                let end = events[i..]
                    .iter()
                    .position(|e| matches!(e, Event::End(TagEnd::Paragraph)))
                    .map(|offset| i + offset);

                if let Some(end) = end {
                    if let Some(text) = plain_text(&events[i + 1..end]) {
                        let text = text.trim();
                        if ATTRIBUTE_LIST.is_match(text) {
                            if after_heading && text.contains("no_toc") {
                                no_toc.insert(heading_count - 1);
                            }
                            i = end + 1;
                            after_heading = false;
                            continue;
                        }
                    }
                }
                after_heading = false;
                result.push(events[i].clone());
            }
            Event::End(TagEnd::Heading(_)) => {
                heading_count += 1;
                after_heading = true;
                result.push(events[i].clone());
            }
            other => {
                result.push(other.clone());
            }
        }
        i += 1;
    }

    (result, no_toc)
}

/// Concatenated text if the slice holds only text and soft breaks
fn plain_text(events: &[Event]) -> Option<String> {
    let mut text = String::new();
    for event in events {
        match event {
            Event::Text(t) => text.push_str(t),
            Event::SoftBreak => text.push(' '),
            _ => return None,
        }
    }
    Some(text)
}

fn collect_headings(events: &[Event], no_toc: &HashSet<usize>) -> Vec<Heading> {
    let mut headings = Vec::new();
    let mut current: Option<(HeadingLevel, Option<String>, String)> = None;
    // explicit `{#id}`s are reserved before any id is generated
    let mut used: HashSet<String> = events
        .iter()
        .filter_map(|event| match event {
            Event::Start(Tag::Heading { id: Some(id), .. }) => Some(id.to_string()),
            _ => None,
        })
        .collect();

    for event in events {
        match event {
            Event::Start(Tag::Heading { level, id, .. }) => {
                current = Some((*level, id.as_ref().map(|s| s.to_string()), String::new()));
            }
            Event::Text(text) | Event::Code(text) => {
                if let Some((_, _, ref mut title)) = current {
                    title.push_str(text.as_ref());
                }
            }
            Event::End(TagEnd::Heading(_)) => {
                if let Some((level, explicit_id, title)) = current.take() {
                    let id = match explicit_id {
                        Some(id) => id,
                        None => unique_id(&title, &mut used),
                    };
                    headings.push(Heading {
                        level: level as u32,
                        in_toc: !no_toc.contains(&headings.len()),
                        title,
                        id,
                    });
                }
            }
            _ => {}
        }
    }

    headings
}

fn unique_id(title: &str, used: &mut HashSet<String>) -> String {
    let mut base = slugify(title);
    if base.is_empty() {
        base = "section".to_string();
    }
    let mut id = base.clone();
    let mut suffix = 1;
    while used.contains(&id) {
        id = format!("{}-{}", base, suffix);
        suffix += 1;
    }
    used.insert(id.clone());
    id
}

fn first_paragraph_text(events: &[Event]) -> Option<String> {
    let mut inside = false;
    let mut text = String::new();

    for event in events {
        match event {
            Event::Start(Tag::Paragraph) => inside = true,
            Event::End(TagEnd::Paragraph) if inside => {
                let trimmed = text.split_whitespace().collect::<Vec<_>>().join(" ");
                return if trimmed.is_empty() {
                    None
                } else {
                    Some(trimmed)
                };
            }
            Event::Text(t) | Event::Code(t) if inside => text.push_str(t),
            Event::SoftBreak | Event::HardBreak if inside => text.push(' '),
            _ => {}
        }
    }

    None
}

fn attach_heading_ids(
    mut events: Vec<Event<'static>>,
    headings: &[Heading],
) -> Vec<Event<'static>> {
    let mut heading_iter = headings.iter();
    let mut result = Vec::with_capacity(events.len());

    for event in events.drain(..) {
        match event {
            Event::Start(Tag::Heading {
                level,
                mut id,
                classes,
                attrs,
            }) => {
                if let Some(next) = heading_iter.next() {
                    if id.is_none() {
                        id = Some(CowStr::Boxed(next.id.clone().into_boxed_str()));
                    }
                }
                result.push(Event::Start(Tag::Heading {
                    level,
                    id,
                    classes,
                    attrs,
                }));
            }
            _ => result.push(event),
        }
    }

    result
}

fn add_heading_anchors(events: Vec<Event<'static>>) -> Vec<Event<'static>> {
    let mut result = Vec::with_capacity(events.len());
    let mut current_id: Option<String> = None;

    for event in events {
        match event {
            Event::Start(Tag::Heading {
                level,
                id,
                classes,
                attrs,
            }) => {
                current_id = id.as_ref().map(|s| s.to_string());
                result.push(Event::Start(Tag::Heading {
                    level,
                    id,
                    classes,
                    attrs,
                }));
            }
            Event::End(TagEnd::Heading(level)) => {
                if let Some(id) = current_id.take() {
                    let anchor = format!(
                        "<a class=\"heading-anchor\" href=\"#{}\" aria-label=\"Link to heading\">#</a>",
                        html_escape(&id)
                    );
                    result.push(Event::Html(CowStr::Boxed(anchor.into_boxed_str())));
                }
                result.push(Event::End(TagEnd::Heading(level)));
            }
            other => result.push(other),
        }
    }

    result
}

pub(crate) fn html_escape(text: &str) -> String {
    text.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
        .replace('\'', "&#39;")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_basic_markdown() {
        let processor = MarkdownProcessor::new();
        let html = processor.convert_simple("# Hello World\n\nThis is a **test**.");
        assert!(html.contains("<h1 id=\"hello-world\""));
        assert!(html.contains("<strong>test</strong>"));
        assert!(html.contains("href=\"#hello-world\""));
    }

    #[test]
    fn test_tables() {
        let processor = MarkdownProcessor::new();
        let md = "| Modifier | Sizing |\n|----------|--------|\n| frame    | fixed  |\n";
        let html = processor.convert_simple(md);
        assert!(html.contains("<table>"));
        assert!(html.contains("<th>Modifier</th>"));
    }

    #[test]
    fn test_footnotes() {
        let processor = MarkdownProcessor::new();
        let html = processor.convert_simple("Swizzling[^1] is risky.\n\n[^1]: Method exchange.\n");
        assert!(html.contains("footnote-reference"));
        assert!(html.contains("footnote-definition"));
    }

    #[test]
    fn test_duplicate_heading_ids() {
        let processor = MarkdownProcessor::new();
        let rendered = processor.convert("## Setup\n\n## Setup\n\n## Setup {#custom}\n");
        let ids: Vec<_> = rendered.headings.iter().map(|h| h.id.as_str()).collect();
        assert_eq!(ids, vec!["setup", "setup-1", "custom"]);
    }

    #[test]
    fn test_generated_ids_skip_explicit_ones() {
        let processor = MarkdownProcessor::new();
        let rendered = processor.convert("## Intro {#setup}\n\n## Setup\n");
        let ids: Vec<_> = rendered.headings.iter().map(|h| h.id.as_str()).collect();
        assert_eq!(ids, vec!["setup", "setup-1"]);
        assert_eq!(rendered.html.matches("id=\"setup\"").count(), 1);
    }

    #[test]
    fn test_suffixed_id_does_not_clash_with_later_heading() {
        let processor = MarkdownProcessor::new();
        let rendered = processor.convert("## Setup\n\n## Setup\n\n## Setup 1\n");
        let ids: Vec<_> = rendered.headings.iter().map(|h| h.id.as_str()).collect();
        assert_eq!(ids, vec!["setup", "setup-1", "setup-1-1"]);
        assert_eq!(rendered.html.matches("id=\"setup-1\"").count(), 1);
    }

    #[test]
    fn test_toc_directive_is_replaced() {
        let processor = MarkdownProcessor::new();
        let md = "* TOC\n{:toc}\n\n## First\n\n### Nested\n\n## Second\n";
        let rendered = processor.convert(md);
        assert!(!rendered.html.contains("{:toc}"));
        assert!(!rendered.html.contains(TOC_MARKER));
        assert!(rendered.html.contains("<ul id=\"markdown-toc\">"));
        assert!(rendered.toc_html.is_some());
    }

    #[test]
    fn test_no_toc_heading_is_excluded() {
        let processor = MarkdownProcessor::new();
        let md = "## Contents\n{: .no_toc}\n\n## Real\n";
        let rendered = processor.convert(md);
        assert!(!rendered.html.contains("no_toc"));
        assert!(!rendered.headings[0].in_toc);
        assert!(rendered.headings[1].in_toc);
        let toc = rendered.toc_html.unwrap();
        assert!(!toc.contains("#contents"));
        assert!(toc.contains("#real"));
    }

    #[test]
    fn test_excerpt_is_first_paragraph() {
        let processor = MarkdownProcessor::new();
        let rendered =
            processor.convert("# Title\n\nWrapping a `UICollectionView`\nfor SwiftUI.\n\nMore.");
        assert_eq!(
            rendered.excerpt.as_deref(),
            Some("Wrapping a UICollectionView for SwiftUI.")
        );
    }

    #[test]
    fn test_no_headings_means_no_toc() {
        let processor = MarkdownProcessor::new();
        let rendered = processor.convert("Just text.");
        assert!(rendered.toc_html.is_none());
        assert!(rendered.headings.is_empty());
    }
}
