//! Formula parsing for R-style model specifications.
//!
//! This module parses formulas like "y ~ x * C(group) + I(x^2)"
//! into structured terms for design matrix construction.
//!
//! Supported syntax:
//! - Main effects: `x`, `C(group)` (forced categorical)
//! - Powers: `I(x^2)`
//! - Interactions: `x:z` (product only), `x*z` (x + z + x:z, any number of factors)
//! - Intercept control: `1`, `0 + ...`, `... + 0`, `... - 1`

use std::collections::HashSet;

use crate::error::{Result, RustyLmError};

/// How a variable enters the design matrix.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum VariableKind {
    /// Numeric or categorical depending on the data column's type.
    Auto,
    /// Wrapped in `C(...)`: always treated as a factor.
    Categorical,
    /// `I(v^k)`: the k-th power of a numeric column.
    Power(i32),
}

/// One variable inside a term, e.g. `C(group)` in `x:C(group)`.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct TermVariable {
    /// Column name in the data frame.
    pub name: String,
    /// Text as written in the formula; used for column naming.
    pub label: String,
    pub kind: VariableKind,
}

/// A model term: a single variable or an interaction of several.
#[derive(Debug, Clone, PartialEq)]
pub struct Term {
    pub variables: Vec<TermVariable>,
}

impl Term {
    /// Label as R prints it: variable labels joined by ':'.
    pub fn label(&self) -> String {
        self.variables
            .iter()
            .map(|v| v.label.as_str())
            .collect::<Vec<_>>()
            .join(":")
    }

    /// Interaction order (1 for main effects).
    pub fn order(&self) -> usize {
        self.variables.len()
    }

    fn key(&self) -> Vec<String> {
        let mut labels: Vec<String> = self.variables.iter().map(|v| v.label.clone()).collect();
        labels.sort();
        labels
    }
}

/// Result of parsing a formula
#[derive(Debug, Clone)]
pub struct ParsedFormula {
    pub response: String,
    pub terms: Vec<Term>,
    pub has_intercept: bool,
    /// Variables wrapped in `C(...)` anywhere in the formula.
    pub categorical_vars: HashSet<String>,
    /// The formula text as given, for printing in summaries.
    pub text: String,
}

impl ParsedFormula {
    /// All distinct column names used on the right-hand side, in first-use order.
    pub fn predictor_names(&self) -> Vec<String> {
        let mut seen = Vec::new();
        for term in &self.terms {
            for var in &term.variables {
                if !seen.contains(&var.name) {
                    seen.push(var.name.clone());
                }
            }
        }
        seen
    }

    pub fn term_labels(&self) -> Vec<String> {
        self.terms.iter().map(Term::label).collect()
    }
}

fn formula_err(msg: impl Into<String>) -> RustyLmError {
    RustyLmError::Formula(msg.into())
}

fn is_identifier(s: &str) -> bool {
    !s.is_empty()
        && s.chars()
            .all(|c| c.is_alphanumeric() || c == '_' || c == '.')
        && !s.chars().next().is_some_and(|c| c.is_ascii_digit())
}

/// Split formula RHS on top-level '+' and '-', respecting parentheses.
///
/// Returns (is_negated, term_text) pairs.
fn split_terms(rhs: &str) -> Result<Vec<(bool, String)>> {
    let mut terms = Vec::new();
    let mut current = String::new();
    let mut negated = false;
    let mut depth: i32 = 0;

    for c in rhs.chars() {
        match c {
            '(' => {
                depth += 1;
                current.push(c);
            }
            ')' => {
                depth -= 1;
                if depth < 0 {
                    return Err(formula_err("unbalanced ')'"));
                }
                current.push(c);
            }
            '+' | '-' if depth == 0 => {
                let term = current.trim().to_string();
                if !term.is_empty() {
                    terms.push((negated, term));
                } else if !terms.is_empty() || negated {
                    return Err(formula_err(format!("empty term before '{}'", c)));
                }
                negated = c == '-';
                current = String::new();
            }
            _ => current.push(c),
        }
    }

    if depth != 0 {
        return Err(formula_err("unbalanced '('"));
    }

    let term = current.trim().to_string();
    if term.is_empty() {
        return Err(formula_err("formula ends with an operator or has no terms"));
    }
    terms.push((negated, term));
    Ok(terms)
}

/// Split on a top-level operator character.
fn split_top_level(s: &str, op: char) -> Vec<String> {
    let mut parts = Vec::new();
    let mut current = String::new();
    let mut depth = 0;
    for c in s.chars() {
        match c {
            '(' => {
                depth += 1;
                current.push(c);
            }
            ')' => {
                depth -= 1;
                current.push(c);
            }
            _ if c == op && depth == 0 => {
                parts.push(current.trim().to_string());
                current = String::new();
            }
            _ => current.push(c),
        }
    }
    parts.push(current.trim().to_string());
    parts
}

/// Parse "x", "C(x)", "I(x^2)" into a variable.
fn parse_variable(text: &str) -> Result<TermVariable> {
    let text = text.trim();
    if text.is_empty() {
        return Err(formula_err("empty variable in term"));
    }

    if let Some(inner) = text.strip_prefix("C(").and_then(|t| t.strip_suffix(')')) {
        let name = inner.trim();
        if !is_identifier(name) {
            return Err(formula_err(format!("invalid variable in '{}'", text)));
        }
        return Ok(TermVariable {
            name: name.to_string(),
            label: format!("C({})", name),
            kind: VariableKind::Categorical,
        });
    }

    if let Some(inner) = text.strip_prefix("I(").and_then(|t| t.strip_suffix(')')) {
        let inner = inner.trim();
        let (name, power) = match inner.split_once('^') {
            Some((base, exp)) => {
                let power: i32 = exp.trim().parse().map_err(|_| {
                    formula_err(format!("exponent in '{}' must be an integer", text))
                })?;
                (base.trim(), power)
            }
            None => (inner, 1),
        };
        if !is_identifier(name) {
            return Err(formula_err(format!(
                "I() supports only 'I(var)' or 'I(var^k)', got '{}'",
                text
            )));
        }
        if power == 1 {
            return Ok(TermVariable {
                name: name.to_string(),
                label: name.to_string(),
                kind: VariableKind::Auto,
            });
        }
        return Ok(TermVariable {
            name: name.to_string(),
            label: format!("I({}^{})", name, power),
            kind: VariableKind::Power(power),
        });
    }

    if !is_identifier(text) {
        return Err(formula_err(format!("cannot parse term '{}'", text)));
    }
    Ok(TermVariable {
        name: text.to_string(),
        label: text.to_string(),
        kind: VariableKind::Auto,
    })
}

/// Expand `a*b*c` into every non-empty subset, lower orders first.
fn expand_crossing(factors: &[TermVariable]) -> Vec<Term> {
    let k = factors.len();
    let mut terms: Vec<Term> = (1u32..(1u32 << k))
        .map(|mask| Term {
            variables: (0..k)
                .filter(|j| mask & (1 << j) != 0)
                .map(|j| factors[j].clone())
                .collect(),
        })
        .collect();
    terms.sort_by_key(Term::order);
    terms
}

/// Parse a formula string into structured components.
///
/// # Arguments
/// * `formula` - R-style formula like "y ~ x * C(group)"
///
/// # Returns
/// Parsed formula with terms ordered by interaction order, duplicates removed.
pub fn parse_formula(formula: &str) -> Result<ParsedFormula> {
    let parts: Vec<&str> = formula.split('~').collect();
    if parts.len() != 2 {
        return Err(formula_err(format!(
            "formula must contain exactly one '~': {}",
            formula
        )));
    }

    let response = parts[0].trim().to_string();
    if response.is_empty() {
        return Err(formula_err("missing response on the left of '~'"));
    }
    if !is_identifier(&response) {
        return Err(formula_err(format!(
            "response must be a column name, got '{}'",
            response
        )));
    }

    let mut has_intercept = true;
    let mut terms: Vec<Term> = Vec::new();

    for (negated, text) in split_terms(parts[1])? {
        match (negated, text.as_str()) {
            (false, "1") => has_intercept = true,
            (false, "0") | (true, "1") => has_intercept = false,
            (true, _) => {
                return Err(formula_err(format!(
                    "only the intercept can be removed with '-', got '- {}'",
                    text
                )))
            }
            (false, _) => {
                let crossed = split_top_level(&text, '*');
                if crossed.len() > 1 {
                    let factors = crossed
                        .iter()
                        .map(|f| parse_variable(f))
                        .collect::<Result<Vec<_>>>()?;
                    terms.extend(expand_crossing(&factors));
                } else {
                    let variables = split_top_level(&text, ':')
                        .iter()
                        .map(|f| parse_variable(f))
                        .collect::<Result<Vec<_>>>()?;
                    terms.push(Term { variables });
                }
            }
        }
    }

    // Collapse repeated variables inside a term first (x:x -> x)
    for term in &mut terms {
        let mut seen_vars = HashSet::new();
        term.variables.retain(|v| seen_vars.insert(v.label.clone()));
    }

    // Then drop duplicate terms (x:z and z:x are the same), keep first occurrence
    let mut seen = HashSet::new();
    terms.retain(|t| seen.insert(t.key()));

    terms.sort_by_key(Term::order);

    let categorical_vars = terms
        .iter()
        .flat_map(|t| t.variables.iter())
        .filter(|v| v.kind == VariableKind::Categorical)
        .map(|v| v.name.clone())
        .collect();

    Ok(ParsedFormula {
        response,
        terms,
        has_intercept,
        categorical_vars,
        text: formula.trim().to_string(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_simple_formula() {
        let parsed = parse_formula("y ~ x1 + x2").unwrap();
        assert_eq!(parsed.response, "y");
        assert_eq!(parsed.term_labels(), vec!["x1", "x2"]);
        assert!(parsed.has_intercept);
    }

    #[test]
    fn test_parse_categorical() {
        let parsed = parse_formula("y ~ x1 + C(region)").unwrap();
        assert_eq!(parsed.term_labels(), vec!["x1", "C(region)"]);
        assert!(parsed.categorical_vars.contains("region"));
        assert_eq!(parsed.predictor_names(), vec!["x1", "region"]);
    }

    #[test]
    fn test_parse_interaction() {
        let parsed = parse_formula("y ~ x1*x2").unwrap();
        assert_eq!(parsed.term_labels(), vec!["x1", "x2", "x1:x2"]);
    }

    #[test]
    fn test_three_way_crossing() {
        let parsed = parse_formula("y ~ a*b*c").unwrap();
        assert_eq!(
            parsed.term_labels(),
            vec!["a", "b", "c", "a:b", "a:c", "b:c", "a:b:c"]
        );
    }

    #[test]
    fn test_terms_ordered_by_degree() {
        let parsed = parse_formula("y ~ x:g + z + x*g").unwrap();
        assert_eq!(parsed.term_labels(), vec!["z", "x", "g", "x:g"]);
    }

    #[test]
    fn test_duplicate_interaction_removed() {
        let parsed = parse_formula("y ~ x + x + x:z + z:x").unwrap();
        assert_eq!(parsed.term_labels(), vec!["x", "x:z"]);
    }

    #[test]
    fn test_self_interaction_collapses_to_main_effect() {
        assert_eq!(parse_formula("y ~ x*x").unwrap().term_labels(), vec!["x"]);
        assert_eq!(parse_formula("y ~ x + x:x").unwrap().term_labels(), vec!["x"]);
        assert_eq!(
            parse_formula("y ~ x*z + x:x:z").unwrap().term_labels(),
            vec!["x", "z", "x:z"]
        );
    }

    #[test]
    fn test_power_term() {
        let parsed = parse_formula("y ~ x + I(x^2)").unwrap();
        assert_eq!(parsed.term_labels(), vec!["x", "I(x^2)"]);
        assert_eq!(parsed.terms[1].variables[0].kind, VariableKind::Power(2));
        assert_eq!(parsed.terms[1].variables[0].name, "x");
    }

    #[test]
    fn test_no_intercept() {
        assert!(!parse_formula("y ~ 0 + x1 + x2").unwrap().has_intercept);
        assert!(!parse_formula("y ~ x1 + x2 - 1").unwrap().has_intercept);
        assert!(!parse_formula("y ~ x1 + 0").unwrap().has_intercept);
        assert!(parse_formula("y ~ 1 + x1").unwrap().has_intercept);
    }

    #[test]
    fn test_intercept_only() {
        let parsed = parse_formula("y ~ 1").unwrap();
        assert!(parsed.terms.is_empty());
        assert!(parsed.has_intercept);
    }

    #[test]
    fn test_errors() {
        assert!(parse_formula("y x").is_err());
        assert!(parse_formula("y ~ x ~ z").is_err());
        assert!(parse_formula(" ~ x").is_err());
        assert!(parse_formula("y ~ x +").is_err());
        assert!(parse_formula("y ~ C(x").is_err());
        assert!(parse_formula("y ~ x - z").is_err());
        assert!(parse_formula("y ~ I(x^two)").is_err());
        assert!(parse_formula("log(y) ~ x").is_err());
    }
}
