//! Gem versions and version requirements.

use serde::{Serialize, Serializer};
use std::cmp::Ordering;
use std::fmt;

/// A dotted numeric version with an optional prerelease suffix
///
/// `1.0.0.pre` and `1.0.0-rc1` are prereleases of `1.0.0` and sort before it.
/// Missing trailing segments compare as zero, so `4.3 == 4.3.0`.
#[derive(Debug, Clone)]
pub struct Version {
    segments: Vec<u64>,
    prerelease: Option<String>,
    raw: String,
}

impl Version {
    pub fn parse(input: &str) -> Option<Self> {
        let raw = input.trim();
        if raw.is_empty() {
            return None;
        }

        let (release, dash_pre) = match raw.split_once('-') {
            Some((release, pre)) if !pre.is_empty() => (release, Some(pre)),
            Some(_) => return None,
            None => (raw, None),
        };

        let parts: Vec<&str> = release.split('.').collect();
        if parts.iter().any(|p| p.is_empty()) {
            return None;
        }

        // the first non-numeric segment starts the prerelease: `1.0.0.pre`
        let numeric = parts
            .iter()
            .take_while(|p| p.parse::<u64>().is_ok())
            .count();
        let segments: Vec<u64> = parts[..numeric]
            .iter()
            .filter_map(|p| p.parse().ok())
            .collect();
        let dot_pre = (numeric < parts.len()).then(|| parts[numeric..].join("."));

        let prerelease = match (dot_pre, dash_pre) {
            (Some(_), Some(_)) => return None,
            (Some(pre), None) => Some(pre),
            (None, Some(pre)) => Some(pre.to_string()),
            (None, None) => None,
        };

        if segments.is_empty() {
            return None;
        }

        Some(Self {
            segments,
            prerelease,
            raw: raw.to_string(),
        })
    }

    pub fn segments(&self) -> &[u64] {
        &self.segments
    }

    pub fn is_prerelease(&self) -> bool {
        self.prerelease.is_some()
    }

    /// The version without its prerelease suffix
    fn release(&self) -> Version {
        Version {
            segments: self.segments.clone(),
            prerelease: None,
            raw: String::new(),
        }
    }

    /// Upper bound for `~>`: drop the last segment and bump the one before
    fn pessimistic_bound(&self) -> Version {
        let mut segments = self.segments.clone();
        if segments.len() > 1 {
            segments.pop();
        }
        if let Some(last) = segments.last_mut() {
            *last += 1;
        }
        let raw = segments
            .iter()
            .map(|s| s.to_string())
            .collect::<Vec<_>>()
            .join(".");
        Version {
            segments,
            prerelease: None,
            raw,
        }
    }
}

impl Ord for Version {
    fn cmp(&self, other: &Self) -> Ordering {
        let len = self.segments.len().max(other.segments.len());
        for i in 0..len {
            let a = self.segments.get(i).copied().unwrap_or(0);
            let b = other.segments.get(i).copied().unwrap_or(0);
            match a.cmp(&b) {
                Ordering::Equal => continue,
                unequal => return unequal,
            }
        }

        match (&self.prerelease, &other.prerelease) {
            (None, None) => Ordering::Equal,
            (Some(_), None) => Ordering::Less,
            (None, Some(_)) => Ordering::Greater,
            (Some(a), Some(b)) => compare_prerelease(a, b),
        }
    }
}

#[derive(Debug, PartialEq, Eq)]
enum PreToken<'a> {
    Num(u64),
    Word(&'a str),
}

/// Split `rc10` or `beta.2` into letter and number runs
fn prerelease_tokens(pre: &str) -> Vec<PreToken<'_>> {
    let mut tokens = Vec::new();
    for part in pre.split(['.', '-']).filter(|p| !p.is_empty()) {
        let mut start = 0;
        let bytes = part.as_bytes();
        for i in 1..=bytes.len() {
            let boundary =
                i == bytes.len() || bytes[i].is_ascii_digit() != bytes[i - 1].is_ascii_digit();
            if boundary {
                let run = &part[start..i];
                tokens.push(match run.parse() {
                    Ok(n) => PreToken::Num(n),
                    Err(_) => PreToken::Word(run),
                });
                start = i;
            }
        }
    }
    tokens
}

/// Numbers compare numerically, words lexically, and a word sorts before a number
fn compare_prerelease(a: &str, b: &str) -> Ordering {
    let (a, b) = (prerelease_tokens(a), prerelease_tokens(b));
    for i in 0..a.len().max(b.len()) {
        let x = a.get(i).unwrap_or(&PreToken::Num(0));
        let y = b.get(i).unwrap_or(&PreToken::Num(0));
        let ord = match (x, y) {
            (PreToken::Num(x), PreToken::Num(y)) => x.cmp(y),
            (PreToken::Word(x), PreToken::Word(y)) => x.cmp(y),
            (PreToken::Word(_), PreToken::Num(_)) => Ordering::Less,
            (PreToken::Num(_), PreToken::Word(_)) => Ordering::Greater,
        };
        if ord != Ordering::Equal {
            return ord;
        }
    }
    Ordering::Equal
}

impl PartialOrd for Version {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl PartialEq for Version {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for Version {}

impl fmt::Display for Version {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.raw)
    }
}

impl Serialize for Version {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

/// Comparison operator of a requirement
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Op {
    Eq,
    NotEq,
    Gt,
    Ge,
    Lt,
    Le,
    /// `~>`
    Pessimistic,
}

impl Op {
    pub fn as_str(&self) -> &'static str {
        match self {
            Op::Eq => "=",
            Op::NotEq => "!=",
            Op::Gt => ">",
            Op::Ge => ">=",
            Op::Lt => "<",
            Op::Le => "<=",
            Op::Pessimistic => "~>",
        }
    }
}

/// A single version constraint such as `~> 4.3.2`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Requirement {
    pub op: Op,
    pub version: Version,
}

impl Requirement {
    /// Parse `">= 1.2"`; a bare version means `=`
    pub fn parse(input: &str) -> Option<Self> {
        let input = input.trim();
        // two-character operators must be tried first
        const OPS: [(&str, Op); 7] = [
            ("~>", Op::Pessimistic),
            (">=", Op::Ge),
            ("<=", Op::Le),
            ("!=", Op::NotEq),
            (">", Op::Gt),
            ("<", Op::Lt),
            ("=", Op::Eq),
        ];

        let (op, rest) = OPS
            .iter()
            .find_map(|(token, op)| input.strip_prefix(token).map(|rest| (*op, rest)))
            .unwrap_or((Op::Eq, input));

        Version::parse(rest).map(|version| Self { op, version })
    }

    pub fn matches(&self, version: &Version) -> bool {
        match self.op {
            Op::Eq => version == &self.version,
            Op::NotEq => version != &self.version,
            Op::Gt => version > &self.version,
            Op::Ge => version >= &self.version,
            Op::Lt => version < &self.version,
            Op::Le => version <= &self.version,
            Op::Pessimistic => {
                version >= &self.version
                    && version.release() < self.version.pessimistic_bound()
            }
        }
    }
}

impl fmt::Display for Requirement {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.op.as_str(), self.version)
    }
}

impl Serialize for Requirement {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}
