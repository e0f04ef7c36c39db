//! View search expressions.
//!
//! A view's search is a `;`-separated list of `field=value` clauses. A
//! value may list `|`-separated alternatives, and an alternative ending in
//! `~` matches anything. A record matches when every clause matches.
//!
//! ```text
//! status=open|pending;owner=alice
//! customer=acme;region=~
//! ```

use thiserror::Error;

use tidings_proto::{FieldValue, Record};

/// Errors from parsing or evaluating a search expression.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SearchError {
    /// A clause has no `=`.
    #[error("clause '{0}' is not of the form field=value")]
    MissingEquals(String),

    /// A clause has an empty field name.
    #[error("clause '{0}' has an empty field name")]
    EmptyField(String),

    /// The record snapshot does not carry a field the search names.
    #[error("record has no field '{0}'")]
    UnknownField(String),
}

/// One alternative of a clause value.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Alternative {
    /// Matches any value.
    Wildcard,
    /// Matches a value equal to (or, for strings, containing) the text.
    Literal(String),
}

/// A single `field=value` clause.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Clause {
    pub field: String,
    pub alternatives: Vec<Alternative>,
}

impl Clause {
    fn parse(text: &str) -> Result<Self, SearchError> {
        let (field, value) = text
            .split_once('=')
            .ok_or_else(|| SearchError::MissingEquals(text.to_string()))?;
        let field = field.trim();
        if field.is_empty() {
            return Err(SearchError::EmptyField(text.to_string()));
        }

        // Blank alternatives are dropped; only an entirely blank value
        // stands for the empty string.
        let mut alternatives: Vec<Alternative> = value
            .split('|')
            .map(str::trim)
            .filter(|alt| !alt.is_empty())
            .map(|alt| {
                if alt.ends_with('~') {
                    Alternative::Wildcard
                } else {
                    Alternative::Literal(alt.to_string())
                }
            })
            .collect();
        if alternatives.is_empty() {
            alternatives.push(Alternative::Literal(String::new()));
        }

        Ok(Self {
            field: field.to_string(),
            alternatives,
        })
    }

    fn matches(&self, field: &FieldValue, case_insensitive: bool) -> bool {
        let raw = field.raw.to_raw_string();
        let display = field.display.as_deref();
        let containment = field.raw.is_string();

        self.alternatives.iter().any(|alt| match alt {
            Alternative::Wildcard => true,
            Alternative::Literal(text) => {
                let candidates = std::iter::once(raw.as_str()).chain(display);
                candidates
                    .into_iter()
                    .any(|candidate| text_matches(candidate, text, containment, case_insensitive))
            }
        })
    }
}

fn text_matches(candidate: &str, wanted: &str, containment: bool, case_insensitive: bool) -> bool {
    if case_insensitive {
        let candidate = candidate.to_lowercase();
        let wanted = wanted.to_lowercase();
        candidate == wanted || (containment && candidate.contains(&wanted))
    } else {
        candidate == wanted || (containment && candidate.contains(wanted))
    }
}

/// A parsed search expression.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct SearchExpr {
    clauses: Vec<Clause>,
}

impl SearchExpr {
    /// Parse a search string. Empty segments are ignored, so `""` and
    /// `";"` both parse to the match-all expression.
    pub fn parse(text: &str) -> Result<Self, SearchError> {
        let clauses = text
            .split(';')
            .map(str::trim)
            .filter(|segment| !segment.is_empty())
            .map(Clause::parse)
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Self { clauses })
    }

    /// Whether this expression matches everything.
    pub fn is_empty(&self) -> bool {
        self.clauses.is_empty()
    }

    pub fn clauses(&self) -> &[Clause] {
        &self.clauses
    }

    /// Evaluate against a record snapshot. Every clause must match.
    pub fn matches(&self, record: &Record, case_insensitive: bool) -> Result<bool, SearchError> {
        for clause in &self.clauses {
            let field = record
                .get(&clause.field)
                .ok_or_else(|| SearchError::UnknownField(clause.field.clone()))?;
            if !clause.matches(field, case_insensitive) {
                return Ok(false);
            }
        }
        Ok(true)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn order(status: &str) -> Record {
        Record::new()
            .with_field("status", FieldValue::new(status))
            .with_field("total", FieldValue::displayed(1250i64, "12.50"))
            .with_field("customer", FieldValue::displayed(7i64, "ACME Corp"))
            .with_field("note", FieldValue::new("Rush delivery"))
    }

    #[test]
    fn test_parse() {
        let expr = SearchExpr::parse("status=open|pending ; region=~").unwrap();
        assert_eq!(expr.clauses().len(), 2);
        assert_eq!(expr.clauses()[0].field, "status");
        assert_eq!(
            expr.clauses()[0].alternatives,
            vec![
                Alternative::Literal("open".into()),
                Alternative::Literal("pending".into())
            ]
        );
        assert_eq!(expr.clauses()[1].alternatives, vec![Alternative::Wildcard]);
    }

    #[test]
    fn test_parse_empty() {
        assert!(SearchExpr::parse("").unwrap().is_empty());
        assert!(SearchExpr::parse(" ; ").unwrap().is_empty());
    }

    #[test]
    fn test_parse_errors() {
        assert_eq!(
            SearchExpr::parse("status").unwrap_err(),
            SearchError::MissingEquals("status".into())
        );
        assert_eq!(
            SearchExpr::parse("=open").unwrap_err(),
            SearchError::EmptyField("=open".into())
        );
    }

    #[test]
    fn test_equality_on_raw_and_display() {
        let record = order("open");
        let eval = |s: &str| SearchExpr::parse(s).unwrap().matches(&record, true).unwrap();

        assert!(eval("status=open"));
        assert!(!eval("status=closed"));
        assert!(eval("total=1250"));
        assert!(eval("total=12.50"));
        assert!(eval("customer=acme corp"));
        // numeric fields do not match on substrings
        assert!(!eval("total=125"));
    }

    #[test]
    fn test_string_containment() {
        let record = order("open");
        let eval = |s: &str| SearchExpr::parse(s).unwrap().matches(&record, true).unwrap();

        assert!(eval("note=rush"));
        assert!(eval("note=DELIVERY"));
        assert!(!eval("note=pickup"));
    }

    #[test]
    fn test_case_sensitive() {
        let record = order("open");
        let expr = SearchExpr::parse("note=rush").unwrap();
        assert!(!expr.matches(&record, false).unwrap());
        assert!(expr.matches(&record, true).unwrap());
    }

    #[test]
    fn test_alternatives_and_wildcard() {
        let record = order("pending");
        let eval = |s: &str| SearchExpr::parse(s).unwrap().matches(&record, true).unwrap();

        assert!(eval("status=open|pending"));
        assert!(!eval("status=open|closed"));
        assert!(eval("status=closed|anything~"));
        assert!(eval("status=~"));
    }

    #[test]
    fn test_all_clauses_must_match() {
        let record = order("open");
        let eval = |s: &str| SearchExpr::parse(s).unwrap().matches(&record, true).unwrap();

        assert!(eval("status=open;note=rush"));
        assert!(!eval("status=open;note=pickup"));
    }

    #[test]
    fn test_unknown_field_is_an_error() {
        let record = order("open");
        let err = SearchExpr::parse("region=eu")
            .unwrap()
            .matches(&record, true)
            .unwrap_err();
        assert_eq!(err, SearchError::UnknownField("region".into()));
    }

    #[test]
    fn test_blank_alternatives_are_ignored() {
        let expr = SearchExpr::parse("status=open|").unwrap();
        assert_eq!(
            expr.clauses()[0].alternatives,
            vec![Alternative::Literal("open".into())]
        );
        assert!(!expr.matches(&order("closed"), false).unwrap());
        assert!(expr.matches(&order("open"), false).unwrap());

        let expr = SearchExpr::parse("status=| |pending").unwrap();
        assert_eq!(
            expr.clauses()[0].alternatives,
            vec![Alternative::Literal("pending".into())]
        );
    }

    #[test]
    fn test_empty_alternative_matches_null() {
        let record = Record::new().with_field("closed_at", FieldValue::new(tidings_proto::Value::Null));
        assert!(SearchExpr::parse("closed_at=")
            .unwrap()
            .matches(&record, true)
            .unwrap());
    }
}
