//! Turns example SQL files into parameterized statements.
//!
//! A template is an ordinary, runnable query whose parameter sites are written
//! as literal defaults followed by a marker comment:
//!
//! ```sql
//! SELECT
//!      date('2025-04-01') AS DateFrom /* @param */
//!     ,'^(53|55|57)' AS AccountCodes /* @param */
//! ```
//!
//! [`parameterize`] swaps each annotated literal for a `:Name` placeholder and
//! leaves every other byte in place, so the same file serves as a hand-runnable
//! example and as the production statement.

use std::sync::OnceLock;

use regex::Regex;

use crate::error::{Error, Result};

#[derive(Debug, Clone, PartialEq)]
pub struct Template {
    pub body: String,
    pub parameters: Vec<String>,
}

fn param_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(concat!(
            r"(?m)(?:^|[\s(,=])",
            r"(?P<lit>[A-Za-z_][A-Za-z0-9_]*\([^()]*\)|'(?:[^']|'')*'|-?\d+(?:\.\d+)?|(?i:null))",
            r"[ \t]+(?i:as)[ \t]+",
            r"(?P<name>[A-Za-z_][A-Za-z0-9_]*)",
            r"(?P<tail>[ \t]*/\*\s*@param\s*\*/)",
        ))
        .unwrap()
    })
}

fn marker_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"/\*\s*@param\s*\*/").unwrap())
}

fn line_of(text: &str, offset: usize) -> usize {
    text[..offset].bytes().filter(|b| *b == b'\n').count() + 1
}

pub fn parameterize(name: &str, raw: &str) -> Result<Template> {
    let mut body = String::with_capacity(raw.len());
    let mut parameters: Vec<String> = Vec::new();
    let mut covered = Vec::new();
    let mut last = 0;

    for caps in param_regex().captures_iter(raw) {
        let lit = caps.name("lit").unwrap();
        let param = caps.name("name").unwrap().as_str();
        covered.push(caps.name("tail").unwrap().end());

        body.push_str(&raw[last..lit.start()]);
        body.push(':');
        body.push_str(param);
        last = lit.end();

        if !parameters.iter().any(|p| p == param) {
            parameters.push(param.to_string());
        }
    }
    body.push_str(&raw[last..]);

    for marker in marker_regex().find_iter(raw) {
        if !covered.contains(&marker.end()) {
            return Err(Error::Template {
                name: name.to_string(),
                message: format!(
                    "line {}: unsupported literal before /* @param */",
                    line_of(raw, marker.start())
                ),
            });
        }
    }

    if parameters.is_empty() {
        return Err(Error::Template {
            name: name.to_string(),
            message: "no parameters found".to_string(),
        });
    }

    Ok(Template { body, parameters })
}
