//! Code syntax highlighting using syntect.

use super::html_escape;
use pulldown_cmark::{CodeBlockKind, CowStr, Event, Tag, TagEnd};
use std::sync::OnceLock;
use syntect::highlighting::{Theme, ThemeSet};
use syntect::html::highlighted_html_for_string;
use syntect::parsing::{SyntaxReference, SyntaxSet};

static SYNTAX_SET: OnceLock<SyntaxSet> = OnceLock::new();
static THEME: OnceLock<Theme> = OnceLock::new();

/// Fence labels that mean "no highlighting"
const PLAIN_LANGUAGES: &[&str] = &["text", "plaintext", "plain", "none", "txt"];

pub(crate) fn syntax_set() -> &'static SyntaxSet {
    SYNTAX_SET.get_or_init(SyntaxSet::load_defaults_newlines)
}

fn theme() -> &'static Theme {
    THEME.get_or_init(|| {
        let mut theme_set = ThemeSet::load_defaults();
        theme_set
            .themes
            .remove("InspiredGitHub")
            .or_else(|| theme_set.themes.remove("base16-ocean.light"))
            .unwrap_or_default()
    })
}

/// Map common fence labels onto syntect's tokens
fn syntax_token(lang: &str) -> &str {
    match lang {
        "objc" | "objective-c" | "objectivec" => "m",
        "objc++" | "objective-c++" => "mm",
        "shell" | "bash" | "zsh" | "console" => "sh",
        "yml" => "yaml",
        other => other,
    }
}

/// Find a syntax for a fence label, if syntect knows one
pub fn find_syntax(lang: &str) -> Option<&'static SyntaxReference> {
    let ss = syntax_set();
    let token = syntax_token(lang);
    ss.find_syntax_by_token(token)
        .or_else(|| ss.find_syntax_by_extension(token))
}

/// Whether a fence label asks for an unhighlighted block
pub fn is_plain_language(lang: &str) -> bool {
    PLAIN_LANGUAGES.contains(&lang.to_ascii_lowercase().as_str())
}

/// Transformer for syntax highlighting code blocks
pub struct HighlightTransformer;

impl HighlightTransformer {
    pub fn new() -> Self {
        Self
    }

    /// Transform events, adding syntax highlighting to fenced code blocks
    pub fn transform(&self, events: Vec<Event<'static>>) -> Vec<Event<'static>> {
        let mut result = Vec::with_capacity(events.len());
        let mut code_lang: Option<String> = None;
        let mut in_code_block = false;
        let mut code_content = String::new();

        for event in events {
            match event {
                Event::Start(Tag::CodeBlock(CodeBlockKind::Fenced(lang))) => {
                    in_code_block = true;
                    // info strings may carry attributes after the language
                    code_lang = lang
                        .split_whitespace()
                        .next()
                        .map(|l| l.to_string())
                        .filter(|l| !l.is_empty());
                    code_content.clear();
                }
                Event::Text(text) if in_code_block => {
                    code_content.push_str(text.as_ref());
                }
                Event::End(TagEnd::CodeBlock) if in_code_block => {
                    in_code_block = false;
                    let html = match code_lang.take() {
                        Some(lang) if !is_plain_language(&lang) => {
                            self.highlight_code(&code_content, &lang)
                        }
                        _ => plain_block(&code_content, None),
                    };
                    result.push(Event::Html(CowStr::Boxed(html.into_boxed_str())));
                }
                other => result.push(other),
            }
        }

        result
    }

    fn highlight_code(&self, code: &str, lang: &str) -> String {
        let ss = syntax_set();
        let syntax = find_syntax(lang).unwrap_or_else(|| ss.find_syntax_plain_text());

        match highlighted_html_for_string(code, ss, syntax, theme()) {
            Ok(html) => format!(
                "<div class=\"highlight language-{}\">{}</div>\n",
                html_escape(lang),
                html
            ),
            Err(err) => {
                tracing::debug!(lang, error = %err, "highlighting failed, emitting plain block");
                plain_block(code, Some(lang))
            }
        }
    }
}

impl Default for HighlightTransformer {
    fn default() -> Self {
        Self::new()
    }
}

fn plain_block(code: &str, lang: Option<&str>) -> String {
    match lang {
        Some(lang) => format!(
            "<pre><code class=\"language-{}\">{}</code></pre>\n",
            html_escape(lang),
            html_escape(code)
        ),
        None => format!("<pre><code>{}</code></pre>\n", html_escape(code)),
    }
}
