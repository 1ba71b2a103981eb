//! `{key}` placeholder substitution against a workflow context.
//!
//! Syntax: `{name}` is replaced by the context value stored under `name`,
//! `{{` and `}}` are literal braces. Field names must be identifier-like;
//! positional (`{}`, `{0}`) and formatted (`{x:>4}`) fields are rejected.

use thiserror::Error;
use tracing::warn;

use concord_contracts::workflow::WorkflowContext;

/// Why a template could not be rendered.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TemplateError {
    /// A placeholder names a key the context does not hold.
    #[error("missing context key: '{0}'")]
    MissingKey(String),

    /// A brace with no partner.
    #[error("unmatched '{brace}' at byte {position}")]
    UnbalancedBrace { brace: char, position: usize },

    /// A placeholder that is not a plain identifier.
    #[error("unsupported placeholder '{{{0}}}'")]
    UnsupportedField(String),
}

fn is_identifier(field: &str) -> bool {
    let mut chars = field.chars();
    match chars.next() {
        Some(c) if c.is_alphabetic() || c == '_' => {}
        _ => return false,
    }
    chars.all(|c| c.is_alphanumeric() || c == '_')
}

/// Substitute every placeholder in `template`.
///
/// Errors are reported for the first offending placeholder, scanning left to
/// right.
pub fn render(template: &str, context: &WorkflowContext) -> Result<String, TemplateError> {
    let mut out = String::with_capacity(template.len());
    let mut chars = template.char_indices().peekable();

    while let Some((position, c)) = chars.next() {
        match c {
            '{' => {
                if matches!(chars.peek(), Some((_, '{'))) {
                    chars.next();
                    out.push('{');
                    continue;
                }

                let mut field = String::new();
                let mut closed = false;
                for (_, fc) in chars.by_ref() {
                    match fc {
                        '}' => {
                            closed = true;
                            break;
                        }
                        '{' => return Err(TemplateError::UnbalancedBrace { brace: '{', position }),
                        other => field.push(other),
                    }
                }
                if !closed {
                    return Err(TemplateError::UnbalancedBrace { brace: '{', position });
                }
                if !is_identifier(&field) {
                    return Err(TemplateError::UnsupportedField(field));
                }
                match context.get(&field) {
                    Some(value) => out.push_str(value),
                    None => return Err(TemplateError::MissingKey(field)),
                }
            }
            '}' => {
                if matches!(chars.peek(), Some((_, '}'))) {
                    chars.next();
                    out.push('}');
                } else {
                    return Err(TemplateError::UnbalancedBrace { brace: '}', position });
                }
            }
            other => out.push(other),
        }
    }

    Ok(out)
}

/// Like [`render`], but falls back to the unsubstituted text on any error.
pub fn render_or_original(template: &str, context: &WorkflowContext) -> String {
    match render(template, context) {
        Ok(rendered) => rendered,
        Err(e) => {
            warn!(task = %template, error = %e, "could not format task, using original text");
            template.to_string()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ctx(pairs: &[(&str, &str)]) -> WorkflowContext {
        let mut c = WorkflowContext::new();
        for (k, v) in pairs {
            c.insert(*k, *v);
        }
        c
    }

    #[test]
    fn substitutes_known_key() {
        let c = ctx(&[("top_product", "Widget")]);
        assert_eq!(
            render("Find the supplier for {top_product}.", &c).unwrap(),
            "Find the supplier for Widget."
        );
    }

    #[test]
    fn text_without_placeholders_is_unchanged() {
        let c = WorkflowContext::new();
        assert_eq!(render("Check inventory levels.", &c).unwrap(), "Check inventory levels.");
    }

    #[test]
    fn missing_key_is_reported_by_name() {
        let c = ctx(&[("a", "1")]);
        assert_eq!(
            render("Use {a} and {turnover_rates}", &c),
            Err(TemplateError::MissingKey("turnover_rates".to_string()))
        );
    }

    #[test]
    fn doubled_braces_are_literals() {
        let c = ctx(&[("k", "v")]);
        assert_eq!(render("{{\"k\": \"{k}\"}}", &c).unwrap(), "{\"k\": \"v\"}");
    }

    #[test]
    fn stray_closing_brace_is_an_error() {
        let c = WorkflowContext::new();
        assert_eq!(
            render("oops }", &c),
            Err(TemplateError::UnbalancedBrace { brace: '}', position: 5 })
        );
    }

    #[test]
    fn unclosed_placeholder_is_an_error() {
        let c = WorkflowContext::new();
        assert!(matches!(
            render("Find {top", &c),
            Err(TemplateError::UnbalancedBrace { brace: '{', .. })
        ));
    }

    #[test]
    fn positional_fields_are_unsupported() {
        let c = WorkflowContext::new();
        assert_eq!(render("{}", &c), Err(TemplateError::UnsupportedField(String::new())));
        assert_eq!(render("{0}", &c), Err(TemplateError::UnsupportedField("0".to_string())));
    }

    #[test]
    fn render_or_original_falls_back() {
        let c = WorkflowContext::new();
        assert_eq!(render_or_original("Analyze {missing}", &c), "Analyze {missing}");
    }

    #[test]
    fn values_containing_braces_are_not_reexpanded() {
        let c = ctx(&[("raw", "{other}")]);
        assert_eq!(render("x={raw}", &c).unwrap(), "x={other}");
    }
}
