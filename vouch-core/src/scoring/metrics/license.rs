//! License classification and scoring for SPDX identifiers and expressions.

use crate::error::MetricError;
use crate::scoring::MetricKind;
use crate::scoring::evaluator::{Measurement, MetricEvaluator};
use crate::types::ArtifactSnapshot;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};

/// License classification.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum LicenseClass {
    /// MIT, Apache-2.0, BSD-2/3, ISC, Unlicense, 0BSD, CC0, CC-BY.
    Permissive,
    /// LGPL, MPL, EPL, CC-BY-SA.
    WeakCopyleft,
    /// GPL, AGPL.
    StrongCopyleft,
    /// Non-commercial, no-derivatives or use-restricted (RAIL, Llama) terms.
    Restricted,
    Unknown,
}

impl LicenseClass {
    pub fn score(self) -> f64 {
        match self {
            LicenseClass::Permissive => 1.0,
            LicenseClass::WeakCopyleft => 0.7,
            LicenseClass::StrongCopyleft => 0.2,
            LicenseClass::Restricted | LicenseClass::Unknown => 0.0,
        }
    }
}

impl std::fmt::Display for LicenseClass {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            LicenseClass::Permissive => write!(f, "permissive"),
            LicenseClass::WeakCopyleft => write!(f, "weak copyleft"),
            LicenseClass::StrongCopyleft => write!(f, "strong copyleft"),
            LicenseClass::Restricted => write!(f, "restricted"),
            LicenseClass::Unknown => write!(f, "unknown"),
        }
    }
}

/// Classify a single SPDX identifier.
pub fn classify(spdx_id: &str) -> LicenseClass {
    let upper = spdx_id
        .trim()
        .trim_matches(|c| c == '(' || c == ')')
        .to_uppercase();
    match upper.as_str() {
        "MIT" | "APACHE-2.0" | "BSD-2-CLAUSE" | "BSD-3-CLAUSE" | "ISC" | "UNLICENSE" | "0BSD"
        | "CC0-1.0" | "ZLIB" | "BSL-1.0" | "WTFPL" | "PSF-2.0" | "PYTHON-2.0" | "BSD-3-CLAUSE-CLEAR" => {
            LicenseClass::Permissive
        }
        s if s.contains("-NC") || s.contains("-ND") => LicenseClass::Restricted,
        s if s.contains("OPENRAIL") || s.starts_with("LLAMA") || s.contains("RAIL-") => {
            LicenseClass::Restricted
        }
        s if s.starts_with("CC-BY-SA") => LicenseClass::WeakCopyleft,
        s if s.starts_with("CC-BY") => LicenseClass::Permissive,
        s if s.starts_with("LGPL") || s.starts_with("MPL") || s.starts_with("EPL") => {
            LicenseClass::WeakCopyleft
        }
        s if s.starts_with("GPL") || s.starts_with("AGPL") => LicenseClass::StrongCopyleft,
        _ => LicenseClass::Unknown,
    }
}

/// Score an SPDX expression.
///
/// Operators are case-insensitive. Parentheses bind first, then `AND` (the
/// worst term), then `OR` (the best alternative). A `WITH <exception>` suffix
/// is ignored. Malformed expressions score 0.
pub fn license_score(expression: &str) -> f64 {
    let tokens = tokenize(expression);
    if tokens.is_empty() {
        return 0.0;
    }
    let mut parser = ExpressionParser { tokens, pos: 0 };
    match parser.any_of() {
        Some(score) if parser.pos == parser.tokens.len() => score,
        _ => 0.0,
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Token<'a> {
    Open,
    Close,
    And,
    Or,
    With,
    Id(&'a str),
}

impl<'a> Token<'a> {
    fn word(word: &'a str) -> Self {
        match word.to_ascii_lowercase().as_str() {
            "and" => Token::And,
            "or" => Token::Or,
            "with" => Token::With,
            _ => Token::Id(word),
        }
    }
}

fn tokenize(expression: &str) -> Vec<Token<'_>> {
    let mut tokens = Vec::new();
    let mut start = None;
    for (i, c) in expression.char_indices() {
        if c == '(' || c == ')' || c.is_whitespace() {
            if let Some(s) = start.take() {
                tokens.push(Token::word(&expression[s..i]));
            }
            match c {
                '(' => tokens.push(Token::Open),
                ')' => tokens.push(Token::Close),
                _ => {}
            }
        } else if start.is_none() {
            start = Some(i);
        }
    }
    if let Some(s) = start {
        tokens.push(Token::word(&expression[s..]));
    }
    tokens
}

/// Recursive descent over `or-expr := and-expr (OR and-expr)*`,
/// `and-expr := term (AND term)*`, `term := '(' or-expr ')' | id [WITH id]`.
struct ExpressionParser<'a> {
    tokens: Vec<Token<'a>>,
    pos: usize,
}

impl<'a> ExpressionParser<'a> {
    fn peek(&self) -> Option<Token<'a>> {
        self.tokens.get(self.pos).copied()
    }

    fn advance(&mut self) -> Option<Token<'a>> {
        let token = self.peek();
        if token.is_some() {
            self.pos += 1;
        }
        token
    }

    fn any_of(&mut self) -> Option<f64> {
        let mut best = self.all_of()?;
        while self.peek() == Some(Token::Or) {
            self.pos += 1;
            best = best.max(self.all_of()?);
        }
        Some(best)
    }

    fn all_of(&mut self) -> Option<f64> {
        let mut worst = self.term()?;
        while self.peek() == Some(Token::And) {
            self.pos += 1;
            worst = worst.min(self.term()?);
        }
        Some(worst)
    }

    fn term(&mut self) -> Option<f64> {
        match self.advance()? {
            Token::Open => {
                let score = self.any_of()?;
                (self.advance()? == Token::Close).then_some(score)
            }
            Token::Id(id) => {
                if self.peek() == Some(Token::With) {
                    self.pos += 1;
                    matches!(self.advance()?, Token::Id(_)).then_some(())?;
                }
                Some(classify(id).score())
            }
            _ => None,
        }
    }
}

/// How freely the artifact may be reused under its declared license.
pub struct LicenseMetric;

#[async_trait]
impl MetricEvaluator for LicenseMetric {
    fn metric(&self) -> MetricKind {
        MetricKind::License
    }

    async fn measure(&self, snapshot: &ArtifactSnapshot) -> Result<Measurement, MetricError> {
        if snapshot.license.trim().is_empty() {
            return Err(MetricError::MissingInput {
                metric: MetricKind::License,
                input: "license",
            });
        }
        Ok(Measurement::Scalar(license_score(&snapshot.license)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_classify() {
        assert_eq!(classify("mit"), LicenseClass::Permissive);
        assert_eq!(classify("Apache-2.0"), LicenseClass::Permissive);
        assert_eq!(classify("LGPL-2.1-only"), LicenseClass::WeakCopyleft);
        assert_eq!(classify("GPL-3.0-or-later"), LicenseClass::StrongCopyleft);
        assert_eq!(classify("CC-BY-NC-4.0"), LicenseClass::Restricted);
        assert_eq!(classify("creativeml-openrail-m"), LicenseClass::Restricted);
        assert_eq!(classify("llama2"), LicenseClass::Restricted);
        assert_eq!(classify("CC-BY-4.0"), LicenseClass::Permissive);
        assert_eq!(classify("CC-BY-SA-4.0"), LicenseClass::WeakCopyleft);
        assert_eq!(classify("other"), LicenseClass::Unknown);
    }

    #[test]
    fn test_expression_scoring() {
        assert_eq!(license_score("MIT OR GPL-3.0"), 1.0);
        assert_eq!(license_score("MIT AND GPL-3.0"), 0.2);
        assert_eq!(license_score("(MPL-2.0)"), 0.7);
        assert_eq!(license_score(""), 0.0);
    }

    #[test]
    fn test_parentheses_bind_before_and() {
        assert_eq!(license_score("(MIT OR Apache-2.0) AND GPL-3.0-only"), 0.2);
        assert_eq!(license_score("MIT OR (Apache-2.0 AND GPL-3.0-only)"), 1.0);
        assert_eq!(license_score("MIT AND (LGPL-2.1-only OR GPL-3.0-only)"), 0.7);
    }

    #[test]
    fn test_operators_are_case_insensitive() {
        assert_eq!(license_score("mit or gpl-3.0"), 1.0);
        assert_eq!(license_score("mit and gpl-3.0"), 0.2);
    }

    #[test]
    fn test_with_exception_is_ignored() {
        assert_eq!(license_score("Apache-2.0 WITH LLVM-exception"), 1.0);
        assert_eq!(license_score("GPL-2.0-or-later with Classpath-exception-2.0"), 0.2);
    }

    #[test]
    fn test_malformed_expressions_score_zero() {
        assert_eq!(license_score("(MIT OR"), 0.0);
        assert_eq!(license_score("MIT Apache-2.0"), 0.0);
        assert_eq!(license_score("AND MIT"), 0.0);
        assert_eq!(license_score("MIT WITH"), 0.0);
        assert_eq!(license_score(")"), 0.0);
    }

    #[tokio::test]
    async fn test_missing_license_is_an_error() {
        let snapshot = ArtifactSnapshot::new("m", crate::types::ArtifactType::Model);
        assert!(matches!(
            LicenseMetric.measure(&snapshot).await,
            Err(MetricError::MissingInput { .. })
        ));
    }
}
