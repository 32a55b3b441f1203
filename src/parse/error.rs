use std::fmt;

/// A literal (address, network or port) that does not have the expected form.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LiteralError {
    literal: String,
    expected: &'static str,
}

impl LiteralError {
    pub(crate) fn new(literal: impl Into<String>, expected: &'static str) -> Self {
        Self {
            literal: literal.into(),
            expected,
        }
    }

    #[must_use]
    pub fn literal(&self) -> &str {
        &self.literal
    }
}

impl fmt::Display for LiteralError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "invalid literal '{}': expected {}", self.literal, self.expected)
    }
}

impl std::error::Error for LiteralError {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn error_display() {
        let err = LiteralError::new("10.0.0.300", "an IPv4 address");
        assert_eq!(
            err.to_string(),
            "invalid literal '10.0.0.300': expected an IPv4 address"
        );
        assert_eq!(err.literal(), "10.0.0.300");
    }
}
