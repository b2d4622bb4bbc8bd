//! Query predicates and field updates
//!
//! A deliberately small language: equality, strict less-than, field absence,
//! and boolean combinators. It is enough to express a compare-and-swap on a
//! single document.

use crate::document::Document;
use serde_json::Value;
use std::cmp::Ordering;

/// Predicate over a single document
#[derive(Debug, Clone, PartialEq)]
pub enum Filter {
    /// Matches every document
    All,
    /// Field equals value
    Eq(String, Value),
    /// Field is strictly less than value (numbers or strings)
    Lt(String, Value),
    /// Field is absent
    Missing(String),
    /// All sub-filters match
    And(Vec<Filter>),
    /// At least one sub-filter matches
    Or(Vec<Filter>),
}

impl Filter {
    /// Field equals value
    #[inline]
    pub fn eq(field: impl Into<String>, value: impl Into<Value>) -> Self {
        Self::Eq(field.into(), value.into())
    }

    /// Field is strictly less than value
    #[inline]
    pub fn lt(field: impl Into<String>, value: impl Into<Value>) -> Self {
        Self::Lt(field.into(), value.into())
    }

    /// Field is absent
    #[inline]
    pub fn missing(field: impl Into<String>) -> Self {
        Self::Missing(field.into())
    }

    /// Conjunction, flattening nested `And`
    #[must_use]
    pub fn and(self, other: Filter) -> Self {
        match (self, other) {
            (Self::All, f) | (f, Self::All) => f,
            (Self::And(mut left), Self::And(right)) => {
                left.extend(right);
                Self::And(left)
            }
            (Self::And(mut left), f) => {
                left.push(f);
                Self::And(left)
            }
            (f, Self::And(mut right)) => {
                right.insert(0, f);
                Self::And(right)
            }
            (a, b) => Self::And(vec![a, b]),
        }
    }

    /// Disjunction of the given alternatives
    #[must_use]
    pub fn any_of(alternatives: Vec<Filter>) -> Self {
        Self::Or(alternatives)
    }

    /// Evaluate against a document
    #[must_use]
    pub fn matches(&self, document: &Document) -> bool {
        match self {
            Self::All => true,
            Self::Eq(field, value) => document.get(field) == Some(value),
            Self::Lt(field, bound) => document
                .get(field)
                .and_then(|v| compare_values(v, bound))
                .is_some_and(Ordering::is_lt),
            Self::Missing(field) => !document.contains_key(field),
            Self::And(filters) => filters.iter().all(|f| f.matches(document)),
            Self::Or(filters) => filters.iter().any(|f| f.matches(document)),
        }
    }

    /// Equality constraints that hold for every match
    ///
    /// Used to seed the document created by an upsert.
    #[must_use]
    pub fn implied_fields(&self) -> Vec<(&str, &Value)> {
        match self {
            Self::Eq(field, value) => vec![(field.as_str(), value)],
            Self::And(filters) => filters.iter().flat_map(Filter::implied_fields).collect(),
            _ => Vec::new(),
        }
    }
}

fn compare_values(left: &Value, right: &Value) -> Option<Ordering> {
    match (left, right) {
        (Value::Number(a), Value::Number(b)) => match (a.as_i64(), b.as_i64()) {
            (Some(a), Some(b)) => Some(a.cmp(&b)),
            _ => a.as_f64()?.partial_cmp(&b.as_f64()?),
        },
        (Value::String(a), Value::String(b)) => Some(a.cmp(b)),
        _ => None,
    }
}

/// Field assignments applied by [`DocumentStore::update_one`](crate::DocumentStore::update_one)
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Update {
    sets: Vec<(String, Value)>,
}

impl Update {
    /// Create empty update
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Assign a field
    #[inline]
    #[must_use]
    pub fn set(mut self, field: impl Into<String>, value: impl Into<Value>) -> Self {
        self.sets.push((field.into(), value.into()));
        self
    }

    /// Assigned fields in declaration order
    #[inline]
    #[must_use]
    pub fn fields(&self) -> &[(String, Value)] {
        &self.sets
    }

    /// Apply to a document, returning whether anything changed
    pub fn apply(&self, document: &mut Document) -> bool {
        let mut changed = false;
        for (field, value) in &self.sets {
            if document.get(field) != Some(value) {
                document.insert(field.clone(), value.clone());
                changed = true;
            }
        }
        changed
    }
}
