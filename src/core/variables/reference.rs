//! Reference expression parsing.
//!
//! A reference is a string whose trimmed form starts with `$`. After the
//! sigil, optional `{{ }}` delimiters are stripped and the remainder is
//! dispatched by namespace prefix, in this order: `env.`, `input.`, `var.`,
//! `step.`. Anything without the sigil is a literal.

use serde_json::Value;

pub(crate) const ENV_PREFIX: &str = "env.";
pub(crate) const INPUT_PREFIX: &str = "input.";
pub(crate) const VAR_PREFIX: &str = "var.";
pub(crate) const STEP_PREFIX: &str = "step.";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Reference<'a> {
    Env(&'a str),
    Input(&'a str),
    Var(&'a str),
    /// `step.<id>.<path...>`; the path descends into the step's result record.
    Step { id: &'a str, path: Vec<&'a str> },
    Unknown(&'a str),
}

pub fn is_reference(raw: &str) -> bool {
    raw.trim().starts_with('$')
}

/// Parse a raw parameter. Returns `None` for literals.
pub fn parse(raw: &str) -> Option<Reference<'_>> {
    let trimmed = raw.trim();
    let body = trimmed.strip_prefix('$')?.trim();
    let body = strip_braces(body);

    let reference = if let Some(name) = body.strip_prefix(ENV_PREFIX) {
        Reference::Env(name)
    } else if let Some(id) = body.strip_prefix(INPUT_PREFIX) {
        Reference::Input(id)
    } else if let Some(id) = body.strip_prefix(VAR_PREFIX) {
        Reference::Var(id)
    } else if let Some(rest) = body.strip_prefix(STEP_PREFIX) {
        let mut segments = rest.split('.');
        let id = segments.next().unwrap_or("");
        Reference::Step {
            id,
            path: segments.collect(),
        }
    } else {
        Reference::Unknown(body)
    };

    Some(reference)
}

fn strip_braces(body: &str) -> &str {
    if body.len() >= 4 && body.starts_with("{{") && body.ends_with("}}") {
        body[2..body.len() - 2].trim()
    } else {
        body
    }
}

/// Walk `path` through nested objects (by key) and arrays (by index).
pub fn descend<'v>(value: &'v Value, path: &[&str]) -> Option<&'v Value> {
    let Some((head, rest)) = path.split_first() else {
        return Some(value);
    };

    let next = match value {
        Value::Object(map) => map.get(*head),
        Value::Array(items) => head.parse::<usize>().ok().and_then(|i| items.get(i)),
        _ => None,
    }?;

    descend(next, rest)
}
