//! Line-oriented parser for the Gemfile subset.

use super::platform::PlatformGuard;
use super::version::Requirement;
use super::{Dependency, Group, Manifest, ManifestError};
use once_cell::sync::Lazy;
use regex::Regex;

/// `install_if -> { ... } do`, `install_if -> () { ... } do`, `install_if proc { ... } do`
static INSTALL_IF: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^(?:->\s*(?:\(\s*\))?|lambda|proc)\s*\{(.*)\}$").unwrap()
});

/// `:key => value`
static HASH_ROCKET: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^:([A-Za-z_]\w*)\s*=>\s*(.+)$").unwrap());

/// `key: value`
static KEYWORD_ARG: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^([A-Za-z_]\w*):\s+(.+)$").unwrap());

/// A literal argument value
#[derive(Debug, Clone, PartialEq)]
enum Value {
    Str(String),
    Sym(String),
    List(Vec<Value>),
    Bool(bool),
    Nil,
}

impl Value {
    /// Names from a symbol, string or list of either
    fn names(&self) -> Vec<String> {
        match self {
            Value::Str(s) | Value::Sym(s) => vec![s.clone()],
            Value::List(items) => items.iter().flat_map(Value::names).collect(),
            Value::Bool(_) | Value::Nil => Vec::new(),
        }
    }
}

enum Arg {
    Positional(Value),
    Keyword(String, Value),
}

/// Open `do ... end` block
enum Block {
    Group(Group),
    Platforms(Vec<String>),
    InstallIf(String),
    /// `source "..." do`: no effect on grouping
    Source,
}

struct Frame {
    block: Block,
    line: usize,
}

pub(super) fn parse(text: &str) -> Result<Manifest, ManifestError> {
    let mut manifest = Manifest::default();
    let mut stack: Vec<Frame> = Vec::new();

    for (index, raw_line) in text.lines().enumerate() {
        let line = index + 1;
        let statement = strip_comment(raw_line).trim();
        if statement.is_empty() {
            continue;
        }

        if statement == "end" {
            if stack.pop().is_none() {
                return Err(ManifestError::StrayEnd { line });
            }
            continue;
        }

        let (statement, opens_block) = match statement.strip_suffix(" do") {
            Some(head) => (head.trim_end(), true),
            None => (statement, false),
        };

        let (keyword, rest) = split_keyword(statement);
        let rest = strip_call_parens(rest);

        match keyword {
            "source" => {
                let args = parse_args(rest, line)?;
                if let Some(Arg::Positional(Value::Str(url))) = args.first() {
                    if manifest.source.is_none() {
                        manifest.source = Some(url.clone());
                    }
                } else {
                    return Err(syntax(line, "source expects a URL string"));
                }
                if opens_block {
                    stack.push(Frame {
                        block: Block::Source,
                        line,
                    });
                }
            }
            "ruby" => {
                let args = parse_args(rest, line)?;
                match args.first() {
                    Some(Arg::Positional(Value::Str(version))) => {
                        manifest.ruby = Some(version.clone());
                    }
                    _ => return Err(syntax(line, "ruby expects a version string")),
                }
            }
            "gem" if !opens_block => {
                let dependency = parse_gem(rest, line, &stack)?;
                manifest.dependencies.push(dependency);
            }
            "group" | "groups" if opens_block => {
                let names: Vec<String> = parse_args(rest, line)?
                    .into_iter()
                    .filter_map(|arg| match arg {
                        Arg::Positional(value) => Some(value.names()),
                        Arg::Keyword(..) => None,
                    })
                    .flatten()
                    .collect();
                if names.is_empty() {
                    return Err(syntax(line, "group needs at least one name"));
                }
                stack.push(Frame {
                    block: Block::Group(Group::from_names(&names)),
                    line,
                });
            }
            "platforms" | "platform" if opens_block => {
                let names: Vec<String> = parse_args(rest, line)?
                    .into_iter()
                    .filter_map(|arg| match arg {
                        Arg::Positional(value) => Some(value.names()),
                        Arg::Keyword(..) => None,
                    })
                    .flatten()
                    .collect();
                if names.is_empty() {
                    return Err(syntax(line, "platforms needs at least one platform"));
                }
                stack.push(Frame {
                    block: Block::Platforms(names),
                    line,
                });
            }
            "install_if" if opens_block => {
                let condition = INSTALL_IF
                    .captures(rest.trim())
                    .and_then(|caps| caps.get(1))
                    .map(|m| m.as_str().trim().to_string())
                    .ok_or_else(|| syntax(line, "install_if expects a lambda"))?;
                stack.push(Frame {
                    block: Block::InstallIf(condition),
                    line,
                });
            }
            _ => {
                return Err(ManifestError::UnknownStatement {
                    line,
                    statement: statement.to_string(),
                });
            }
        }
    }

    if let Some(frame) = stack.last() {
        return Err(ManifestError::Unterminated { line: frame.line });
    }

    Ok(manifest)
}

fn parse_gem(rest: &str, line: usize, stack: &[Frame]) -> Result<Dependency, ManifestError> {
    let args = parse_args(rest, line)?;
    let mut positional = Vec::new();
    let mut keywords = Vec::new();
    for arg in args {
        match arg {
            Arg::Positional(value) => positional.push(value),
            Arg::Keyword(key, value) => keywords.push((key, value)),
        }
    }

    let mut positional = positional.into_iter();
    let name = match positional.next() {
        Some(Value::Str(name)) if !name.trim().is_empty() => name,
        _ => return Err(syntax(line, "gem expects a name string")),
    };

    let mut requirements = Vec::new();
    for value in positional {
        let Value::Str(text) = value else {
            return Err(syntax(line, "gem requirements must be strings"));
        };
        // "~> 1.2, >= 1.2.3" style strings carry several constraints
        for part in text.split(',') {
            let requirement =
                Requirement::parse(part).ok_or_else(|| ManifestError::MalformedRequirement {
                    line,
                    requirement: part.trim().to_string(),
                })?;
            requirements.push(requirement);
        }
    }

    // innermost enclosing blocks first
    let mut group = stack
        .iter()
        .rev()
        .find_map(|frame| match &frame.block {
            Block::Group(group) => Some(group.clone()),
            _ => None,
        })
        .unwrap_or(Group::Default);
    let mut platform = stack.iter().rev().find_map(|frame| match &frame.block {
        Block::Platforms(names) => Some(PlatformGuard::Platforms(names.clone())),
        Block::InstallIf(expr) => Some(PlatformGuard::InstallIf(expr.clone())),
        _ => None,
    });
    let mut require = true;

    for (key, value) in keywords {
        match key.as_str() {
            "group" | "groups" => group = Group::from_names(&value.names()),
            "platform" | "platforms" => platform = Some(PlatformGuard::Platforms(value.names())),
            "require" => require = !matches!(value, Value::Bool(false) | Value::Nil),
            // git/path/branch and friends do not affect resolution here
            other => tracing::debug!("Ignoring gem option '{}' on line {}", other, line),
        }
    }

    Ok(Dependency {
        name,
        requirements,
        group,
        platform,
        require,
        line,
    })
}

fn syntax(line: usize, message: &str) -> ManifestError {
    ManifestError::Syntax {
        line,
        message: message.to_string(),
    }
}

/// Remove a trailing `# comment` that is not inside a string
fn strip_comment(line: &str) -> &str {
    let mut quote: Option<char> = None;
    for (i, c) in line.char_indices() {
        match (quote, c) {
            (Some(q), c) if c == q => quote = None,
            (Some(_), _) => {}
            (None, '"') | (None, '\'') => quote = Some(c),
            (None, '#') => return &line[..i],
            _ => {}
        }
    }
    line
}

fn split_keyword(statement: &str) -> (&str, &str) {
    let end = statement
        .find(|c: char| !(c.is_ascii_alphanumeric() || c == '_'))
        .unwrap_or(statement.len());
    (&statement[..end], statement[end..].trim())
}

/// `gem("x", "1.0")` -> `"x", "1.0"`
fn strip_call_parens(rest: &str) -> &str {
    rest.strip_prefix('(')
        .and_then(|inner| inner.strip_suffix(')'))
        .map(str::trim)
        .unwrap_or(rest)
}

/// Split on commas outside strings and brackets
fn split_top_level(input: &str) -> Option<Vec<&str>> {
    let mut parts = Vec::new();
    let mut depth = 0i32;
    let mut quote: Option<char> = None;
    let mut start = 0;

    for (i, c) in input.char_indices() {
        match (quote, c) {
            (Some(q), c) if c == q => quote = None,
            (Some(_), _) => {}
            (None, '"') | (None, '\'') => quote = Some(c),
            (None, '[') | (None, '{') | (None, '(') => depth += 1,
            (None, ']') | (None, '}') | (None, ')') => depth -= 1,
            (None, ',') if depth == 0 => {
                parts.push(input[start..i].trim());
                start = i + 1;
            }
            _ => {}
        }
    }

    if quote.is_some() || depth != 0 {
        return None;
    }
    let last = input[start..].trim();
    if !last.is_empty() || !parts.is_empty() {
        parts.push(last);
    }
    Some(parts)
}

fn parse_args(input: &str, line: usize) -> Result<Vec<Arg>, ManifestError> {
    let parts = split_top_level(input)
        .ok_or_else(|| syntax(line, "unbalanced quotes or brackets"))?;

    parts
        .into_iter()
        .map(|part| {
            if part.is_empty() {
                return Err(syntax(line, "empty argument"));
            }
            if let Some(caps) = HASH_ROCKET.captures(part).or_else(|| KEYWORD_ARG.captures(part)) {
                let value = parse_value(caps[2].trim())
                    .ok_or_else(|| syntax(line, &format!("unsupported value '{}'", &caps[2])))?;
                return Ok(Arg::Keyword(caps[1].to_string(), value));
            }
            parse_value(part)
                .map(Arg::Positional)
                .ok_or_else(|| syntax(line, &format!("unsupported argument '{}'", part)))
        })
        .collect()
}

fn parse_value(input: &str) -> Option<Value> {
    let input = input.trim();
    match input {
        "true" => return Some(Value::Bool(true)),
        "false" => return Some(Value::Bool(false)),
        "nil" => return Some(Value::Nil),
        _ => {}
    }

    if let Some(inner) = input.strip_prefix('[').and_then(|s| s.strip_suffix(']')) {
        let items = split_top_level(inner)?
            .into_iter()
            .map(parse_value)
            .collect::<Option<Vec<_>>>()?;
        return Some(Value::List(items));
    }

    // %i[a b] / %w[a b]
    if let Some(inner) = input
        .strip_prefix("%i[")
        .or_else(|| input.strip_prefix("%w["))
        .and_then(|s| s.strip_suffix(']'))
    {
        return Some(Value::List(
            inner
                .split_whitespace()
                .map(|s| Value::Sym(s.to_string()))
                .collect(),
        ));
    }

    if let Some(symbol) = input.strip_prefix(':') {
        let valid = !symbol.is_empty()
            && symbol
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || c == '_');
        return valid.then(|| Value::Sym(symbol.to_string()));
    }

    for quote in ['"', '\''] {
        if input.len() >= 2 && input.starts_with(quote) && input.ends_with(quote) {
            let inner = &input[1..input.len() - 1];
            if !inner.contains(quote) {
                return Some(Value::Str(inner.to_string()));
            }
        }
    }

    None
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_strip_comment_respects_strings() {
        assert_eq!(strip_comment("gem \"a#b\" # note"), "gem \"a#b\" ");
        assert_eq!(strip_comment("# whole line"), "");
    }

    #[test]
    fn test_parse_values() {
        assert_eq!(parse_value(":mingw"), Some(Value::Sym("mingw".into())));
        assert_eq!(parse_value("'x'"), Some(Value::Str("x".into())));
        assert_eq!(
            parse_value("[:a, \"b\"]"),
            Some(Value::List(vec![Value::Sym("a".into()), Value::Str("b".into())]))
        );
        assert_eq!(
            parse_value("%i[mingw mswin]"),
            Some(Value::List(vec![Value::Sym("mingw".into()), Value::Sym("mswin".into())]))
        );
        assert_eq!(parse_value("false"), Some(Value::Bool(false)));
        assert_eq!(parse_value("Gem::Version"), None);
    }

    #[test]
    fn test_split_top_level() {
        let parts = split_top_level("\"a\", platforms: [:x, :y], \"b,c\"").unwrap();
        assert_eq!(parts, vec!["\"a\"", "platforms: [:x, :y]", "\"b,c\""]);
        assert!(split_top_level("\"open").is_none());
    }
}
