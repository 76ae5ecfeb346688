//! `${name}` template scanning.
//!
//! A template is scanned once into literal and variable segments, so that
//! rendering is a fold over the segments rather than a fresh scan. Spans
//! that are not a well-formed `${identifier}` stay in the literal text.

use crate::Value;
use serde::Serialize;

/// One piece of a scanned template.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", content = "text", rename_all = "lowercase")]
pub enum Segment {
    Literal(String),
    Var(String),
}

/// A pre-scanned interpolation template.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct Template {
    segments: Vec<Segment>,
}

fn is_ident_byte(b: u8) -> bool {
    b.is_ascii_alphanumeric() || b == b'_'
}

impl Template {
    /// Scan `source` into segments. Never fails.
    pub fn parse(source: &str) -> Self {
        let bytes = source.as_bytes();
        let mut segments = Vec::new();
        let mut literal = String::new();
        let mut pos = 0;
        let mut literal_start = 0;

        while pos < bytes.len() {
            if bytes[pos] == b'$' && bytes.get(pos + 1) == Some(&b'{') {
                let name_start = pos + 2;
                let mut end = name_start;
                while end < bytes.len() && is_ident_byte(bytes[end]) {
                    end += 1;
                }
                if end > name_start && bytes.get(end) == Some(&b'}') {
                    literal.push_str(&source[literal_start..pos]);
                    if !literal.is_empty() {
                        segments.push(Segment::Literal(std::mem::take(&mut literal)));
                    }
                    segments.push(Segment::Var(source[name_start..end].to_string()));
                    pos = end + 1;
                    literal_start = pos;
                    continue;
                }
            }
            pos += 1;
        }
        literal.push_str(&source[literal_start..]);
        if !literal.is_empty() {
            segments.push(Segment::Literal(literal));
        }
        Self { segments }
    }

    pub fn segments(&self) -> &[Segment] {
        &self.segments
    }

    /// True when the template holds no variable references.
    pub fn is_literal(&self) -> bool {
        self.segments.iter().all(|s| matches!(s, Segment::Literal(_)))
    }

    /// Names referenced by the template, in order of appearance.
    pub fn variables(&self) -> impl Iterator<Item = &str> {
        self.segments.iter().filter_map(|s| match s {
            Segment::Var(name) => Some(name.as_str()),
            Segment::Literal(_) => None,
        })
    }

    /// Substitute each variable with `lookup(name)`.
    ///
    /// Unset (`None`) and `null` values render as the empty string.
    /// Substituted text is never re-scanned.
    pub fn render<F>(&self, lookup: F) -> String
    where
        F: Fn(&str) -> Option<Value>,
    {
        self.segments.iter().fold(String::new(), |mut out, segment| {
            match segment {
                Segment::Literal(text) => out.push_str(text),
                Segment::Var(name) => {
                    if let Some(value) = lookup(name) {
                        out.push_str(&value.render());
                    }
                }
            }
            out
        })
    }
}
