//! Prompt assembly: template selection and placeholder substitution.
//!
//! Substitution is a single left-to-right scan. Bound values are emitted,
//! never rescanned, so a value containing a placeholder token does not expand
//! recursively. An empty value leaves its placeholder in the template, and
//! tokens with no binding pass through verbatim.

mod templates;

pub use templates::{TemplateKind, default_template};

// ---------------------------------------------------------------------------
// Bindings
// ---------------------------------------------------------------------------

/// A named value substituted for `<key>` tokens in a template.
#[derive(Debug, Clone)]
pub struct Binding {
    key: String,
    value: String,
}

impl Binding {
    /// Bind a plain text value.
    pub fn new(key: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            value: value.into(),
        }
    }

    /// Bind a value serialized to JSON text.
    pub fn json<T: serde::Serialize>(key: impl Into<String>, value: &T) -> serde_json::Result<Self> {
        Ok(Self {
            key: key.into(),
            value: serde_json::to_string(value)?,
        })
    }
}

// ---------------------------------------------------------------------------
// Rendering
// ---------------------------------------------------------------------------

/// Fill a template's `<key>` placeholders from the given bindings.
///
/// When two bindings could match at the same position, the earlier one in the
/// slice wins. Every occurrence of a bound token is replaced.
pub fn render(template: &str, bindings: &[Binding]) -> String {
    let tokens: Vec<String> = bindings.iter().map(|b| format!("<{}>", b.key)).collect();

    let mut out = String::with_capacity(template.len());
    let mut rest = template;

    'scan: while let Some(pos) = rest.find('<') {
        out.push_str(&rest[..pos]);
        let tail = &rest[pos..];

        for (binding, token) in bindings.iter().zip(&tokens) {
            if tail.starts_with(token.as_str()) {
                if binding.value.is_empty() {
                    // Unfilled slots stay visible in the output.
                    out.push_str(token);
                } else {
                    out.push_str(&binding.value);
                }
                rest = &tail[token.len()..];
                continue 'scan;
            }
        }

        // Not a bound token; emit the '<' and keep scanning after it.
        out.push('<');
        rest = &tail[1..];
    }

    out.push_str(rest);
    out
}
