//! Run file-name templates.
//!
//! A template has one numeric slot (`{value}` or `{value:.N}`) and one
//! method slot (`{method}`). `{{` and `}}` are literal braces.

use crate::models::join_results_path;
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// A template that cannot be expanded.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TemplateError {
    #[error("template `{template}` has no {slot} slot")]
    MissingSlot {
        template: String,
        slot: &'static str,
    },
    #[error("template `{template}` has more than one {slot} slot")]
    DuplicateSlot {
        template: String,
        slot: &'static str,
    },
    #[error("template `{template}` has an unknown placeholder `{{{name}}}`")]
    UnknownPlaceholder { template: String, name: String },
    #[error("template `{template}` has an invalid precision `{spec}`")]
    BadPrecision { template: String, spec: String },
    #[error("template `{template}` has an unbalanced brace at byte {pos}")]
    UnbalancedBrace { template: String, pos: usize },
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum Segment {
    Literal(String),
    Value { precision: Option<usize> },
    Method,
}

/// Parsed run file-name template.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NameTemplate {
    source: String,
    segments: Vec<Segment>,
}

impl NameTemplate {
    /// Parse a template string.
    pub fn parse(template: &str) -> Result<Self, TemplateError> {
        let mut segments = Vec::new();
        let mut literal = String::new();
        let mut chars = template.char_indices().peekable();

        while let Some((pos, ch)) = chars.next() {
            match ch {
                '{' if chars.peek().map(|&(_, c)| c) == Some('{') => {
                    chars.next();
                    literal.push('{');
                }
                '{' => {
                    let mut name = String::new();
                    let mut closed = false;
                    for (_, c) in chars.by_ref() {
                        match c {
                            '}' => {
                                closed = true;
                                break;
                            }
                            '{' => break,
                            c => name.push(c),
                        }
                    }
                    if !closed {
                        return Err(TemplateError::UnbalancedBrace {
                            template: template.to_string(),
                            pos,
                        });
                    }
                    if !literal.is_empty() {
                        segments.push(Segment::Literal(std::mem::take(&mut literal)));
                    }
                    segments.push(parse_placeholder(template, &name)?);
                }
                '}' if chars.peek().map(|&(_, c)| c) == Some('}') => {
                    chars.next();
                    literal.push('}');
                }
                '}' => {
                    return Err(TemplateError::UnbalancedBrace {
                        template: template.to_string(),
                        pos,
                    });
                }
                c => literal.push(c),
            }
        }

        if !literal.is_empty() {
            segments.push(Segment::Literal(literal));
        }

        let values = segments
            .iter()
            .filter(|s| matches!(s, Segment::Value { .. }))
            .count();
        let methods = segments
            .iter()
            .filter(|s| matches!(s, Segment::Method))
            .count();
        check_slot_count(template, "value", values)?;
        check_slot_count(template, "method", methods)?;

        Ok(Self {
            source: template.to_string(),
            segments,
        })
    }

    /// Substitute both slots.
    pub fn render(&self, value: f64, method: &str) -> String {
        let mut out = String::new();
        for segment in &self.segments {
            match segment {
                Segment::Literal(s) => out.push_str(s),
                Segment::Value { precision: None } => out.push_str(&value.to_string()),
                Segment::Value {
                    precision: Some(p),
                } => out.push_str(&format!("{:.*}", *p, value)),
                Segment::Method => out.push_str(method),
            }
        }
        out
    }
}

impl FromStr for NameTemplate {
    type Err = TemplateError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl fmt::Display for NameTemplate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.source)
    }
}

fn parse_placeholder(template: &str, name: &str) -> Result<Segment, TemplateError> {
    match name.split_once(':') {
        None if name == "value" => Ok(Segment::Value { precision: None }),
        None if name == "method" => Ok(Segment::Method),
        Some(("value", spec)) => spec
            .strip_prefix('.')
            .and_then(|digits| digits.parse::<usize>().ok())
            .map(|p| Segment::Value { precision: Some(p) })
            .ok_or_else(|| TemplateError::BadPrecision {
                template: template.to_string(),
                spec: spec.to_string(),
            }),
        _ => Err(TemplateError::UnknownPlaceholder {
            template: template.to_string(),
            name: name.to_string(),
        }),
    }
}

fn check_slot_count(template: &str, slot: &'static str, count: usize) -> Result<(), TemplateError> {
    match count {
        1 => Ok(()),
        0 => Err(TemplateError::MissingSlot {
            template: template.to_string(),
            slot,
        }),
        _ => Err(TemplateError::DuplicateSlot {
            template: template.to_string(),
            slot,
        }),
    }
}

/// Escape text so it is taken literally inside a template.
pub fn escape(text: &str) -> String {
    text.replace('{', "{{").replace('}', "}}")
}

/// Expand a template over every method and value.
///
/// Names are method-major, value-minor and prefixed with `dir`.
pub fn file_list<S: AsRef<str>>(
    template: &str,
    values: &[f64],
    methods: &[S],
    dir: &str,
) -> Result<Vec<String>, TemplateError> {
    let template = NameTemplate::parse(template)?;

    let mut names = Vec::with_capacity(methods.len() * values.len());
    for method in methods {
        for &value in values {
            names.push(join_results_path(dir, &template.render(value, method.as_ref())));
        }
    }

    Ok(names)
}

#[cfg(test)]
mod tests {
    use super::*;

    const TEMPLATE: &str = "Line(01Hz,00s,1)({value:.1},1m,0.10).{method}.*.csv";

    #[test]
    fn test_file_list_is_method_major() {
        let names = file_list(TEMPLATE, &[0.1, 0.2, 0.3], &["CV", "ZG"], "res").unwrap();

        assert_eq!(names.len(), 6);
        assert_eq!(names[0], "res/Line(01Hz,00s,1)(0.1,1m,0.10).CV.*.csv");
        assert_eq!(names[2], "res/Line(01Hz,00s,1)(0.3,1m,0.10).CV.*.csv");
        assert_eq!(names[3], "res/Line(01Hz,00s,1)(0.1,1m,0.10).ZG.*.csv");
        assert_eq!(names[5], "res/Line(01Hz,00s,1)(0.3,1m,0.10).ZG.*.csv");
    }

    #[test]
    fn test_file_list_empty_inputs() {
        let methods: [&str; 0] = [];
        assert!(file_list(TEMPLATE, &[0.1], &methods, "res").unwrap().is_empty());
        assert!(file_list(TEMPLATE, &[], &["CV"], "res").unwrap().is_empty());
    }

    #[test]
    fn test_value_without_precision() {
        let t = NameTemplate::parse("{method}-{value}").unwrap();
        assert_eq!(t.render(2.5, "HT"), "HT-2.5");
        assert_eq!(t.render(3.0, "HT"), "HT-3");
    }

    #[test]
    fn test_escaped_braces() {
        let t = NameTemplate::parse("{{x}}{value:.2}{method}").unwrap();
        assert_eq!(t.render(0.5, "CV"), "{x}0.50CV");
        assert_eq!(escape("a{b}"), "a{{b}}");
    }

    #[test]
    fn test_malformed_templates() {
        assert!(matches!(
            NameTemplate::parse("{value}.csv"),
            Err(TemplateError::MissingSlot { slot: "method", .. })
        ));
        assert!(matches!(
            NameTemplate::parse("{value}{value}{method}"),
            Err(TemplateError::DuplicateSlot { slot: "value", .. })
        ));
        assert!(matches!(
            NameTemplate::parse("{value}{method}{sigma}"),
            Err(TemplateError::UnknownPlaceholder { .. })
        ));
        assert!(matches!(
            NameTemplate::parse("{value:3}{method}"),
            Err(TemplateError::BadPrecision { .. })
        ));
        assert!(matches!(
            NameTemplate::parse("{value{method}"),
            Err(TemplateError::UnbalancedBrace { pos: 0, .. })
        ));
        assert!(matches!(
            NameTemplate::parse("{value}{method}}"),
            Err(TemplateError::UnbalancedBrace { .. })
        ));
    }
}
