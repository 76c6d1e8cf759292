//! The subset of Liquid that article bodies use.
//!
//! Runs before markdown. Supported: `raw`, `comment`, `highlight`,
//! `post_url`, `link`, and `{{ site.x }}` / `{{ page.x }}` / string literal
//! outputs with the `relative_url` and `absolute_url` filters. Anything else
//! is left in place and reported.

use crate::config::{normalize_base_url, Config};
use crate::models::Diagnostic;
use once_cell::sync::Lazy;
use regex::Regex;
use std::collections::BTreeMap;

static MARKUP: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?s)\{%-?\s*(.*?)\s*-?%\}|\{\{-?\s*(.*?)\s*-?\}\}").unwrap()
});

/// Resolves link tags to URLs (base path included)
pub trait LinkResolver {
    /// URL of the post whose filename stem is `post_id`
    fn post_url(&self, post_id: &str) -> Option<String>;

    /// URL of the content file at `source_path` (relative to the site root)
    fn link(&self, source_path: &str) -> Option<String>;
}

/// What went wrong with a piece of Liquid markup
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IssueKind {
    /// `post_url` / `link` target does not exist
    BrokenLink,
    /// Tag, filter or variable quire does not implement
    Unsupported,
    /// `raw` or `highlight` without its closing tag
    Unterminated,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LiquidIssue {
    pub kind: IssueKind,
    pub message: String,
    /// 1-based line in the file
    pub line: usize,
    pub markup: String,
}

impl LiquidIssue {
    pub fn into_diagnostic(self, source_path: &str) -> Diagnostic {
        let diag = match self.kind {
            IssueKind::BrokenLink => Diagnostic::error("link.broken", self.message),
            IssueKind::Unsupported => Diagnostic::warning("liquid.unsupported", self.message),
            IssueKind::Unterminated => Diagnostic::error("liquid.unterminated", self.message),
        };
        diag.with_source(source_path)
            .at_line(self.line)
            .with_context(self.markup)
    }
}

/// Inputs available to a template
pub struct LiquidContext<'a> {
    pub config: &'a Config,
    /// `page.*` variables
    pub page: &'a BTreeMap<String, String>,
    pub resolver: &'a dyn LinkResolver,
    /// Line of the file on which the rendered text starts
    pub first_line: usize,
}

#[derive(Debug, Clone, Default)]
pub struct LiquidOutput {
    pub text: String,
    pub issues: Vec<LiquidIssue>,
}

enum State {
    Normal,
    Raw,
    Comment,
    Highlight { lang: String, start: usize },
}

/// Render the supported Liquid subset
pub fn render(input: &str, ctx: &LiquidContext) -> LiquidOutput {
    let mut out = LiquidOutput::default();
    let mut state = State::Normal;
    let mut last = 0usize;
    let mut open_at = 0usize;
    let line_of = |offset: usize| input[..offset].matches('\n').count() + ctx.first_line;

    for caps in MARKUP.captures_iter(input) {
        let Some(whole) = caps.get(0) else { continue };
        let tag = caps.get(1).map(|m| m.as_str());
        let tag_name = tag.and_then(|t| t.split_whitespace().next()).unwrap_or("");

        match &state {
            State::Raw => {
                if tag_name == "endraw" {
                    out.text.push_str(&input[last..whole.start()]);
                    state = State::Normal;
                } else {
                    out.text.push_str(&input[last..whole.end()]);
                }
                last = whole.end();
                continue;
            }
            State::Comment => {
                if tag_name == "endcomment" {
                    state = State::Normal;
                }
                last = whole.end();
                continue;
            }
            State::Highlight { lang, start } => {
                if tag_name == "endhighlight" {
                    let code = input[*start..whole.start()].trim_matches('\n');
                    out.text.push_str(&format!("```{}\n{}\n```", lang, code));
                    state = State::Normal;
                    last = whole.end();
                }
                continue;
            }
            State::Normal => {}
        }

        out.text.push_str(&input[last..whole.start()]);
        last = whole.end();
        let line = line_of(whole.start());

        match tag {
            Some(tag) => {
                let args = tag[tag_name.len()..].trim();
                match tag_name {
                    "raw" => {
                        state = State::Raw;
                        open_at = whole.start();
                    }
                    "comment" => {
                        state = State::Comment;
                        open_at = whole.start();
                    }
                    "highlight" => {
                        let lang = args.split_whitespace().next().unwrap_or("").to_string();
                        state = State::Highlight {
                            lang,
                            start: whole.end(),
                        };
                        open_at = whole.start();
                    }
                    "post_url" | "link" => {
                        let target = args.trim_matches(|c| c == '"' || c == '\'');
                        let resolved = if tag_name == "post_url" {
                            ctx.resolver.post_url(target)
                        } else {
                            ctx.resolver.link(target)
                        };
                        match resolved {
                            Some(url) => out.text.push_str(&url),
                            None => {
                                out.issues.push(LiquidIssue {
                                    kind: IssueKind::BrokenLink,
                                    message: format!(
                                        "{} target '{}' does not exist",
                                        tag_name, target
                                    ),
                                    line,
                                    markup: whole.as_str().to_string(),
                                });
                                out.text.push('#');
                            }
                        }
                    }
                    other => {
                        out.issues.push(LiquidIssue {
                            kind: IssueKind::Unsupported,
                            message: format!("Unsupported liquid tag '{}'", other),
                            line,
                            markup: whole.as_str().to_string(),
                        });
                        out.text.push_str(whole.as_str());
                    }
                }
            }
            None => {
                let expr = caps.get(2).map_or("", |m| m.as_str());
                match evaluate(expr, ctx) {
                    Ok(value) => out.text.push_str(&value),
                    Err(message) => {
                        out.issues.push(LiquidIssue {
                            kind: IssueKind::Unsupported,
                            message,
                            line,
                            markup: whole.as_str().to_string(),
                        });
                        out.text.push_str(whole.as_str());
                    }
                }
            }
        }
    }

    match state {
        State::Normal => out.text.push_str(&input[last..]),
        State::Raw | State::Comment | State::Highlight { .. } => {
            let name = match state {
                State::Raw => "raw",
                State::Comment => "comment",
                _ => "highlight",
            };
            out.issues.push(LiquidIssue {
                kind: IssueKind::Unterminated,
                message: format!("'{}' block is never closed", name),
                line: line_of(open_at),
                markup: name.to_string(),
            });
            if !matches!(state, State::Comment) {
                out.text.push_str(&input[last..]);
            }
        }
    }

    out
}

fn evaluate(expr: &str, ctx: &LiquidContext) -> Result<String, String> {
    let mut parts = expr.split('|').map(str::trim);
    let base = parts.next().unwrap_or("");

    let mut value = if let Some(literal) = string_literal(base) {
        literal.to_string()
    } else if let Some(key) = base.strip_prefix("site.") {
        ctx.config
            .get(key)
            .ok_or_else(|| format!("Unknown variable 'site.{}'", key))?
    } else if let Some(key) = base.strip_prefix("page.") {
        ctx.page
            .get(key)
            .cloned()
            .ok_or_else(|| format!("Unknown variable 'page.{}'", key))?
    } else {
        return Err(format!("Unsupported liquid expression '{}'", base));
    };

    for filter in parts {
        value = match filter {
            "relative_url" => relative_url(&ctx.config.baseurl, &value),
            "absolute_url" => absolute_url(&ctx.config.url, &ctx.config.baseurl, &value),
            "" => value,
            other => return Err(format!("Unsupported liquid filter '{}'", other)),
        };
    }

    Ok(value)
}

fn string_literal(s: &str) -> Option<&str> {
    let s = s.trim();
    if s.len() >= 2
        && ((s.starts_with('"') && s.ends_with('"')) || (s.starts_with('\'') && s.ends_with('\'')))
    {
        Some(&s[1..s.len() - 1])
    } else {
        None
    }
}

/// Prefix a site path with the base path
pub fn relative_url(baseurl: &str, path: &str) -> String {
    if path.contains("://") {
        return path.to_string();
    }
    format!(
        "{}{}",
        normalize_base_url(baseurl),
        path.trim_start_matches('/')
    )
}

/// Prefix a site path with the site URL and base path
pub fn absolute_url(site_url: &str, baseurl: &str, path: &str) -> String {
    if path.contains("://") {
        return path.to_string();
    }
    format!(
        "{}{}",
        site_url.trim_end_matches('/'),
        relative_url(baseurl, path)
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Posts;

    impl LinkResolver for Posts {
        fn post_url(&self, post_id: &str) -> Option<String> {
            (post_id == "2021-03-14-part-1").then(|| "/blog/2021/03/14/part-1.html".to_string())
        }

        fn link(&self, source_path: &str) -> Option<String> {
            (source_path == "about.md").then(|| "/blog/about.html".to_string())
        }
    }

    fn config() -> Config {
        Config::from_yaml("title: Notes\nurl: https://example.com\nbaseurl: /blog\n").unwrap()
    }

    fn run(input: &str) -> LiquidOutput {
        let config = config();
        let mut page = BTreeMap::new();
        page.insert("title".to_string(), "Part 2".to_string());
        let ctx = LiquidContext {
            config: &config,
            page: &page,
            resolver: &Posts,
            first_line: 1,
        };
        render(input, &ctx)
    }

    #[test]
    fn test_post_url_resolves() {
        let out = run("See [part 1]({% post_url 2021-03-14-part-1 %}).");
        assert_eq!(out.text, "See [part 1](/blog/2021/03/14/part-1.html).");
        assert!(out.issues.is_empty());
    }

    #[test]
    fn test_broken_post_url_is_reported_with_line() {
        let out = run("intro\n\nSee {% post_url 2020-01-01-gone %}.");
        assert_eq!(out.text, "intro\n\nSee #.");
        assert_eq!(out.issues.len(), 1);
        assert_eq!(out.issues[0].kind, IssueKind::BrokenLink);
        assert_eq!(out.issues[0].line, 3);
    }

    #[test]
    fn test_link_tag() {
        let out = run("{% link about.md %}");
        assert_eq!(out.text, "/blog/about.html");
    }

    #[test]
    fn test_outputs_and_filters() {
        let out = run(concat!(
            "{{ site.title }} / {{ page.title }} / ",
            "{{ '/img/a.png' | relative_url }} / {{ \"feed.xml\" | absolute_url }}"
        ));
        assert_eq!(
            out.text,
            "Notes / Part 2 / /blog/img/a.png / https://example.com/blog/feed.xml"
        );
    }

    #[test]
    fn test_raw_blocks_are_verbatim() {
        let out = run("{% raw %}{{ not.evaluated }} {% include x %}{% endraw %} done");
        assert_eq!(out.text, "{{ not.evaluated }} {% include x %} done");
        assert!(out.issues.is_empty());
    }

    #[test]
    fn test_highlight_becomes_fence() {
        let out = run("{% highlight swift %}\nlet x = 1\n{% endhighlight %}");
        assert_eq!(out.text, "```swift\nlet x = 1\n```");
    }

    #[test]
    fn test_comment_is_dropped() {
        let out = run("a{% comment %} hidden {{ x }} {% endcomment %}b");
        assert_eq!(out.text, "ab");
    }

    #[test]
    fn test_unsupported_markup_is_left_in_place() {
        let out = run("{% include footer.html %} {{ content | markdownify }}");
        assert_eq!(out.text, "{% include footer.html %} {{ content | markdownify }}");
        assert_eq!(out.issues.len(), 2);
        assert!(out.issues.iter().all(|i| i.kind == IssueKind::Unsupported));
    }

    #[test]
    fn test_unterminated_raw() {
        let out = run("x {% raw %} y");
        assert_eq!(out.text, "x  y");
        assert_eq!(out.issues[0].kind, IssueKind::Unterminated);
    }

    #[test]
    fn test_issue_to_diagnostic() {
        let out = run("{% post_url nope %}");
        let diag = out.issues[0].clone().into_diagnostic("_posts/2021-01-01-x.md");
        assert_eq!(diag.code, "link.broken");
        assert_eq!(diag.line, Some(1));
        assert_eq!(diag.context.as_deref(), Some("{% post_url nope %}"));
    }

    #[test]
    fn test_url_helpers() {
        assert_eq!(relative_url("", "/a"), "/a");
        assert_eq!(relative_url("/blog", "a"), "/blog/a");
        assert_eq!(relative_url("/blog", "https://x.dev/a"), "https://x.dev/a");
        assert_eq!(absolute_url("https://x.dev/", "", "/"), "https://x.dev/");
    }
}
