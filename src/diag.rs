//! Diagnostics returned by provider operations

use serde::Serialize;
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Error,
    Warning,
}

/// A single error or warning, optionally tied to an attribute path
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Diagnostic {
    pub severity: Severity,
    pub summary: String,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub detail: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub attribute: Option<String>,
}

impl Diagnostic {
    pub fn error(summary: impl Into<String>) -> Self {
        Self {
            severity: Severity::Error,
            summary: summary.into(),
            detail: String::new(),
            attribute: None,
        }
    }

    pub fn warning(summary: impl Into<String>) -> Self {
        Self {
            severity: Severity::Warning,
            ..Self::error(summary)
        }
    }

    pub fn with_detail(mut self, detail: impl Into<String>) -> Self {
        self.detail = detail.into();
        self
    }

    pub fn with_attribute(mut self, attribute: impl Into<String>) -> Self {
        self.attribute = Some(attribute.into());
        self
    }
}

impl fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if let Some(attribute) = &self.attribute {
            write!(f, "{}: ", attribute)?;
        }
        write!(f, "{}", self.summary)?;
        if !self.detail.is_empty() {
            write!(f, " ({})", self.detail)?;
        }
        Ok(())
    }
}

/// An ordered list of diagnostics
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct Diagnostics(Vec<Diagnostic>);

/// Result of a provider callback
pub type DiagResult<T> = Result<T, Diagnostics>;

impl Diagnostics {
    pub fn new() -> Self {
        Self::default()
    }

    /// A single error diagnostic
    pub fn errorf(message: impl Into<String>) -> Self {
        Self(vec![Diagnostic::error(message)])
    }

    /// A single error diagnostic from any displayable error
    pub fn from_err(err: impl fmt::Display) -> Self {
        Self::errorf(err.to_string())
    }

    pub fn warning(message: impl Into<String>) -> Self {
        Self(vec![Diagnostic::warning(message)])
    }

    pub fn push(&mut self, diagnostic: Diagnostic) {
        self.0.push(diagnostic);
    }

    pub fn extend(&mut self, other: Diagnostics) {
        self.0.extend(other.0);
    }

    pub fn has_error(&self) -> bool {
        self.0.iter().any(|d| d.severity == Severity::Error)
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Diagnostic> {
        self.0.iter()
    }

    /// `Err(self)` when any error is present, otherwise `Ok(value)`
    pub fn into_result<T>(self, value: T) -> DiagResult<T> {
        if self.has_error() {
            Err(self)
        } else {
            Ok(value)
        }
    }
}

impl From<Diagnostic> for Diagnostics {
    fn from(diagnostic: Diagnostic) -> Self {
        Self(vec![diagnostic])
    }
}

impl FromIterator<Diagnostic> for Diagnostics {
    fn from_iter<I: IntoIterator<Item = Diagnostic>>(iter: I) -> Self {
        Self(iter.into_iter().collect())
    }
}

impl IntoIterator for Diagnostics {
    type Item = Diagnostic;
    type IntoIter = std::vec::IntoIter<Diagnostic>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.into_iter()
    }
}

impl fmt::Display for Diagnostics {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let lines: Vec<String> = self.0.iter().map(ToString::to_string).collect();
        write!(f, "{}", lines.join("; "))
    }
}

impl std::error::Error for Diagnostics {}

/// Shorthand for `Err(Diagnostics::errorf(format!(...)))`
#[macro_export]
macro_rules! diag_errorf {
    ($($arg:tt)*) => {
        Err($crate::diag::Diagnostics::errorf(format!($($arg)*)))
    };
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_errorf_has_error() {
        let diags = Diagnostics::errorf("boom");
        assert!(diags.has_error());
        assert_eq!(diags.to_string(), "boom");
    }

    #[test]
    fn test_warnings_are_not_errors() {
        let diags = Diagnostics::warning("careful");
        assert!(!diags.has_error());
        assert_eq!(diags.into_result(1).unwrap(), 1);
    }

    #[test]
    fn test_display_includes_attribute() {
        let diag = Diagnostic::error("expected string").with_attribute("tags.0.key");
        assert_eq!(diag.to_string(), "tags.0.key: expected string");
    }

    #[test]
    fn test_macro_formats() {
        let result: DiagResult<()> = diag_errorf!("Unable to create tenant '{}': {}", "dev", "500");
        assert_eq!(result.unwrap_err().to_string(), "Unable to create tenant 'dev': 500");
    }
}
