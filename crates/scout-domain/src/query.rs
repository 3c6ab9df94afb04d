//! Query templates and query normalization
//!
//! Templates use `{name}` placeholders that are filled from an entity's
//! attributes. `{{` and `}}` produce literal braces. The same template type is
//! used for search queries and for extraction prompts.

use crate::error::TemplateError;
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

#[derive(Debug, Clone, PartialEq, Eq)]
enum Segment {
    Literal(String),
    Placeholder(String),
}

/// A parsed `{placeholder}` template
///
/// # Examples
///
/// ```
/// use scout_domain::{Entity, QueryTemplate};
///
/// let template = QueryTemplate::parse("{company} contact email").unwrap();
/// let entity = Entity::new("1").with_attribute("company", "Acme");
/// assert_eq!(template.render(&entity.attributes).unwrap(), "Acme contact email");
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QueryTemplate {
    source: String,
    segments: Vec<Segment>,
}

impl QueryTemplate {
    /// Parse a template string
    ///
    /// # Errors
    ///
    /// Returns error for unbalanced braces or empty placeholders.
    pub fn parse(source: impl Into<String>) -> Result<Self, TemplateError> {
        let source = source.into();
        let mut segments = Vec::new();
        let mut literal = String::new();
        let mut chars = source.char_indices().peekable();

        while let Some((position, c)) = chars.next() {
            match c {
                '{' => {
                    if matches!(chars.peek(), Some((_, '{'))) {
                        chars.next();
                        literal.push('{');
                        continue;
                    }

                    let mut name = String::new();
                    let mut closed = false;
                    for (_, inner) in chars.by_ref() {
                        match inner {
                            '}' => {
                                closed = true;
                                break;
                            }
                            '{' => return Err(TemplateError::Unclosed { position }),
                            other => name.push(other),
                        }
                    }
                    if !closed {
                        return Err(TemplateError::Unclosed { position });
                    }

                    let name = name.trim();
                    if name.is_empty() {
                        return Err(TemplateError::EmptyPlaceholder { position });
                    }
                    if !literal.is_empty() {
                        segments.push(Segment::Literal(std::mem::take(&mut literal)));
                    }
                    segments.push(Segment::Placeholder(name.to_string()));
                }
                '}' => {
                    if matches!(chars.peek(), Some((_, '}'))) {
                        chars.next();
                        literal.push('}');
                    } else {
                        return Err(TemplateError::UnexpectedClose { position });
                    }
                }
                other => literal.push(other),
            }
        }

        if !literal.is_empty() {
            segments.push(Segment::Literal(literal));
        }

        Ok(Self { source, segments })
    }

    /// Substitute attributes into the template
    ///
    /// # Errors
    ///
    /// Returns [`TemplateError::MissingAttribute`] if a placeholder has no
    /// matching attribute.
    pub fn render(&self, attributes: &BTreeMap<String, String>) -> Result<String, TemplateError> {
        let mut out = String::with_capacity(self.source.len());
        for segment in &self.segments {
            match segment {
                Segment::Literal(text) => out.push_str(text),
                Segment::Placeholder(name) => {
                    let value = attributes
                        .get(name)
                        .ok_or_else(|| TemplateError::MissingAttribute(name.clone()))?;
                    out.push_str(value);
                }
            }
        }
        Ok(out)
    }

    /// Names of all placeholders, in order of appearance
    pub fn placeholders(&self) -> impl Iterator<Item = &str> {
        self.segments.iter().filter_map(|segment| match segment {
            Segment::Placeholder(name) => Some(name.as_str()),
            Segment::Literal(_) => None,
        })
    }

    /// The original template text
    pub fn as_str(&self) -> &str {
        &self.source
    }
}

impl FromStr for QueryTemplate {
    type Err = TemplateError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl fmt::Display for QueryTemplate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.source)
    }
}

/// Normalize a query before it is hashed into a cache key
///
/// Trims the ends and collapses whitespace runs to one space. Case is kept
/// because search providers may treat it as significant.
///
/// # Examples
///
/// ```
/// use scout_domain::normalize_query;
///
/// assert_eq!(normalize_query("  Acme   contact\temail "), "Acme contact email");
/// ```
pub fn normalize_query(query: &str) -> String {
    query.split_whitespace().collect::<Vec<_>>().join(" ")
}
