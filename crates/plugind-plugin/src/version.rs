// SPDX-FileCopyrightText: 2026 Plugind Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Loose version ordering and version constraint expressions.
//!
//! A version string is split into numeric and textual components: digit runs
//! become numbers, letter runs and runs of other characters (`-`, `+`, `~`)
//! become text, and dots only separate. Numbers sort before text, so
//! `1.0.0-2 < 1.0.0-10` and `17.09 < 17.10`.
//!
//! Constraint expressions are comma-separated conjunctions of clauses such as
//! `>=1.0,<2`. A clause without an operator means `=`.

use std::cmp::Ordering;
use std::fmt;
use std::str::FromStr;

use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
enum Component {
    Number(u64),
    Text(String),
}

#[derive(Clone, Copy, PartialEq, Eq)]
enum CharClass {
    Digit,
    Letter,
    Separator,
    Other,
}

fn classify(c: char) -> CharClass {
    if c.is_ascii_digit() {
        CharClass::Digit
    } else if c.is_alphabetic() {
        CharClass::Letter
    } else if c == '.' {
        CharClass::Separator
    } else {
        CharClass::Other
    }
}

/// A version compared component by component.
#[derive(Debug, Clone)]
pub struct LooseVersion {
    raw: String,
    components: Vec<Component>,
}

impl LooseVersion {
    pub fn parse(raw: &str) -> Self {
        let mut components = Vec::new();
        let mut current = String::new();
        let mut current_class = CharClass::Separator;

        for c in raw.chars() {
            let class = classify(c);
            if class != current_class || class == CharClass::Separator {
                push_component(&mut components, &current, current_class);
                current.clear();
            }
            current_class = class;
            if class != CharClass::Separator {
                current.push(c);
            }
        }
        push_component(&mut components, &current, current_class);

        Self {
            raw: raw.to_string(),
            components,
        }
    }

    pub fn as_str(&self) -> &str {
        &self.raw
    }
}

fn push_component(components: &mut Vec<Component>, chunk: &str, class: CharClass) {
    if chunk.is_empty() {
        return;
    }
    let component = match class {
        CharClass::Digit => match chunk.parse::<u64>() {
            Ok(n) => Component::Number(n),
            Err(_) => Component::Text(chunk.to_string()),
        },
        _ => Component::Text(chunk.to_string()),
    };
    components.push(component);
}

impl PartialEq for LooseVersion {
    fn eq(&self, other: &Self) -> bool {
        self.components == other.components
    }
}

impl Eq for LooseVersion {}

impl PartialOrd for LooseVersion {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for LooseVersion {
    fn cmp(&self, other: &Self) -> Ordering {
        self.components.cmp(&other.components)
    }
}

impl fmt::Display for LooseVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.raw)
    }
}

impl From<&str> for LooseVersion {
    fn from(raw: &str) -> Self {
        Self::parse(raw)
    }
}

/// `left < right`, where a missing or empty version sorts before every
/// concrete version and two missing versions are unordered.
pub fn less_than(left: Option<&str>, right: Option<&str>) -> bool {
    let left = left.filter(|v| !v.is_empty());
    let right = right.filter(|v| !v.is_empty());
    match (left, right) {
        (None, _) => true,
        (Some(_), None) => false,
        (Some(l), Some(r)) => LooseVersion::parse(l) < LooseVersion::parse(r),
    }
}

/// Failure to parse a constraint expression.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum VersionError {
    #[error("unknown version operator `{0}`")]
    UnknownOperator(String),
    #[error("missing version after operator `{0}`")]
    MissingVersion(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Operator {
    Eq,
    Lt,
    Le,
    Gt,
    Ge,
}

impl Operator {
    fn from_symbol(symbol: &str) -> Result<Self, VersionError> {
        match symbol {
            "" | "=" | "==" => Ok(Self::Eq),
            "<" => Ok(Self::Lt),
            "<=" => Ok(Self::Le),
            ">" => Ok(Self::Gt),
            ">=" => Ok(Self::Ge),
            other => Err(VersionError::UnknownOperator(other.to_string())),
        }
    }

    fn holds(self, ordering: Ordering) -> bool {
        match self {
            Self::Eq => ordering == Ordering::Equal,
            Self::Lt => ordering == Ordering::Less,
            Self::Le => ordering != Ordering::Greater,
            Self::Gt => ordering == Ordering::Greater,
            Self::Ge => ordering != Ordering::Less,
        }
    }
}

/// A conjunction of `{operator, version}` clauses.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VersionConstraint {
    clauses: Vec<(Operator, LooseVersion)>,
}

impl VersionConstraint {
    /// The constraint every version satisfies.
    pub fn any() -> Self {
        Self { clauses: Vec::new() }
    }

    pub fn matches(&self, version: &LooseVersion) -> bool {
        self.clauses
            .iter()
            .all(|(op, bound)| op.holds(version.cmp(bound)))
    }

    pub fn matches_str(&self, version: &str) -> bool {
        self.matches(&LooseVersion::parse(version))
    }

    pub fn is_any(&self) -> bool {
        self.clauses.is_empty()
    }
}

impl FromStr for VersionConstraint {
    type Err = VersionError;

    fn from_str(expression: &str) -> Result<Self, Self::Err> {
        let compact: String = expression.chars().filter(|c| !c.is_whitespace()).collect();
        let mut clauses = Vec::new();
        for clause in compact.split(',').filter(|c| !c.is_empty()) {
            let split = clause
                .find(|c| !matches!(c, '=' | '<' | '>'))
                .unwrap_or(clause.len());
            let (symbol, version) = clause.split_at(split);
            let op = Operator::from_symbol(symbol)?;
            if version.is_empty() {
                return Err(VersionError::MissingVersion(symbol.to_string()));
            }
            clauses.push((op, LooseVersion::parse(version)));
        }
        Ok(Self { clauses })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn missing_versions_sort_first() {
        assert!(less_than(None, Some("17.10")));
        assert!(!less_than(Some("17.10"), None));
        assert!(less_than(Some(""), None));
        assert!(less_than(None, None));
    }

    #[test]
    fn numeric_components_compare_numerically() {
        assert!(!less_than(Some("17.10"), Some("17.10")));
        assert!(less_than(Some("17.09"), Some("17.10")));
        assert!(less_than(Some("1.0.0-2"), Some("1.0.0-10")));
        assert!(less_than(Some("1.9"), Some("1.10")));
    }

    #[test]
    fn numbers_sort_before_text() {
        assert!(LooseVersion::parse("1.0.0") < LooseVersion::parse("1.0.0-rc1"));
        assert!(LooseVersion::parse("1.0") < LooseVersion::parse("1.0.0"));
        assert!(LooseVersion::parse("2.0.a") > LooseVersion::parse("2.0.9"));
    }

    #[test]
    fn dots_only_separate() {
        assert_eq!(LooseVersion::parse("1.2"), LooseVersion::parse("1..2"));
        assert_eq!(LooseVersion::parse("17.10").as_str(), "17.10");
    }

    #[test]
    fn bare_version_means_equality() {
        let constraint: VersionConstraint = "0.0.1".parse().unwrap();
        assert!(constraint.matches_str("0.0.1"));
        assert!(!constraint.matches_str("0.0.2"));
    }

    #[test]
    fn clauses_are_a_conjunction() {
        let constraint: VersionConstraint = ">= 1.0, <2".parse().unwrap();
        assert!(constraint.matches_str("1.0"));
        assert!(constraint.matches_str("1.9.3"));
        assert!(!constraint.matches_str("2"));
        assert!(!constraint.matches_str("0.9"));
    }

    #[test]
    fn each_operator() {
        let v = LooseVersion::parse("1.5");
        for (expr, expected) in [
            ("=1.5", true),
            ("==1.5", true),
            ("<1.5", false),
            ("<=1.5", true),
            (">1.5", false),
            (">=1.5", true),
            (">1.4", true),
            ("<1.10", true),
        ] {
            let constraint: VersionConstraint = expr.parse().unwrap();
            assert_eq!(constraint.matches(&v), expected, "{expr}");
        }
    }

    #[test]
    fn empty_expression_matches_everything() {
        let constraint: VersionConstraint = "".parse().unwrap();
        assert!(constraint.is_any());
        assert!(constraint.matches_str("42"));
    }

    #[test]
    fn malformed_expressions_are_rejected() {
        assert_eq!(
            "=>1.0".parse::<VersionConstraint>().unwrap_err(),
            VersionError::UnknownOperator("=>".to_string())
        );
        assert_eq!(
            ">=".parse::<VersionConstraint>().unwrap_err(),
            VersionError::MissingVersion(">=".to_string())
        );
    }

    fn version_strategy() -> impl Strategy<Value = String> {
        "[0-9a-c.\\-]{0,8}"
    }

    proptest! {
        #[test]
        fn ordering_is_irreflexive(a in version_strategy()) {
            prop_assert!(!less_than(Some(&a), Some(&a)) || a.is_empty());
        }

        #[test]
        fn ordering_is_antisymmetric(a in version_strategy(), b in version_strategy()) {
            prop_assume!(!a.is_empty() && !b.is_empty());
            prop_assert!(!(less_than(Some(&a), Some(&b)) && less_than(Some(&b), Some(&a))));
        }

        #[test]
        fn ordering_is_transitive(
            a in version_strategy(),
            b in version_strategy(),
            c in version_strategy(),
        ) {
            prop_assume!(!a.is_empty() && !b.is_empty() && !c.is_empty());
            if less_than(Some(&a), Some(&b)) && less_than(Some(&b), Some(&c)) {
                prop_assert!(less_than(Some(&a), Some(&c)));
            }
        }
    }
}
