//! Device name filtering

use anyhow::{Context, Result};
use regex::Regex;

/// Selects device names by prefix or shell-style glob.
///
/// A pattern that does not start with a glob metacharacter matches any name
/// it is a prefix of. Otherwise the pattern is matched as a glob against the
/// whole name, ignoring case. An absent or empty pattern matches everything.
#[derive(Debug, Clone, Default)]
pub struct NameFilter {
    prefix: Option<String>,
    glob: Option<Regex>,
}

impl NameFilter {
    pub fn new(pattern: Option<&str>) -> Result<Self> {
        let pattern = match pattern {
            Some(p) if !p.is_empty() => p,
            _ => return Ok(Self::default()),
        };

        let prefix = match pattern.chars().next() {
            Some(c) if is_glob_meta(c) => None,
            _ => Some(pattern.to_string()),
        };
        let glob = Regex::new(&glob_to_regex(&pattern.to_lowercase()))
            .with_context(|| format!("Invalid device pattern \"{}\"", pattern))?;

        Ok(Self {
            prefix,
            glob: Some(glob),
        })
    }

    pub fn matches(&self, name: &str) -> bool {
        let glob = match &self.glob {
            Some(glob) => glob,
            None => return true,
        };

        if let Some(prefix) = &self.prefix {
            if name.starts_with(prefix.as_str()) {
                return true;
            }
        }

        glob.is_match(&name.to_lowercase())
    }
}

fn is_glob_meta(c: char) -> bool {
    matches!(c, '*' | '?' | '[' | ']')
}

/// Translate a shell glob into an anchored regular expression
fn glob_to_regex(pattern: &str) -> String {
    let chars: Vec<char> = pattern.chars().collect();
    let mut out = String::from("(?s)^");
    let mut i = 0;

    while i < chars.len() {
        let c = chars[i];
        i += 1;
        match c {
            '*' => out.push_str(".*"),
            '?' => out.push('.'),
            '[' => {
                let mut j = i;
                if j < chars.len() && chars[j] == '!' {
                    j += 1;
                }
                if j < chars.len() && chars[j] == ']' {
                    j += 1;
                }
                while j < chars.len() && chars[j] != ']' {
                    j += 1;
                }

                if j >= chars.len() {
                    // Unterminated class, take the bracket literally
                    out.push_str(r"\[");
                    continue;
                }

                let mut body = &chars[i..j];
                i = j + 1;
                out.push('[');
                if body.first() == Some(&'!') {
                    out.push('^');
                    body = &body[1..];
                }
                for &ch in body {
                    if matches!(ch, '\\' | '[' | ']' | '^' | '&' | '~') {
                        out.push('\\');
                    }
                    out.push(ch);
                }
                out.push(']');
            }
            _ => out.push_str(&regex::escape(c.encode_utf8(&mut [0; 4]))),
        }
    }

    out.push('$');
    out
}
