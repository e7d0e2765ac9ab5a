use std::cmp::Ordering;

use serde_json::Value;

use super::document::{instant_millis, Document};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    Ascending,
    Descending,
}

/// Range filters are only reached through [`Query::filter`].
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(not(test), allow(dead_code))]
pub enum Filter {
    Eq(String, Value),
    ArrayContains(String, Value),
    Gt(String, Value),
    Ge(String, Value),
    Lt(String, Value),
    Le(String, Value),
}

impl Filter {
    fn matches(&self, doc: &Document) -> bool {
        match self {
            Self::Eq(field, expected) => doc
                .get(field)
                .is_some_and(|actual| same_value(actual, expected)),
            Self::ArrayContains(field, expected) => doc
                .get(field)
                .and_then(Value::as_array)
                .is_some_and(|items| items.iter().any(|item| same_value(item, expected))),
            Self::Gt(field, bound) => range_match(doc, field, bound, |o| o == Ordering::Greater),
            Self::Ge(field, bound) => range_match(doc, field, bound, |o| o != Ordering::Less),
            Self::Lt(field, bound) => range_match(doc, field, bound, |o| o == Ordering::Less),
            Self::Le(field, bound) => range_match(doc, field, bound, |o| o != Ordering::Greater),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Limit {
    First(usize),
    Last(usize),
}

/// Collection query: filters, at most one ordering, and an optional limit.
#[derive(Debug, Clone, PartialEq)]
pub struct Query {
    collection: String,
    filters: Vec<Filter>,
    order_by: Option<(String, Direction)>,
    limit: Option<Limit>,
}

impl Query {
    pub fn collection(name: impl Into<String>) -> Self {
        Self {
            collection: name.into(),
            filters: Vec::new(),
            order_by: None,
            limit: None,
        }
    }

    pub fn collection_name(&self) -> &str {
        &self.collection
    }

    pub fn filter(mut self, filter: Filter) -> Self {
        self.filters.push(filter);
        self
    }

    pub fn where_eq(self, field: &str, value: impl Into<Value>) -> Self {
        self.filter(Filter::Eq(field.to_owned(), value.into()))
    }

    pub fn where_array_contains(self, field: &str, value: impl Into<Value>) -> Self {
        self.filter(Filter::ArrayContains(field.to_owned(), value.into()))
    }

    pub fn order_by(mut self, field: &str, direction: Direction) -> Self {
        self.order_by = Some((field.to_owned(), direction));
        self
    }

    /// Keeps the first `n` results in query order.
    pub fn limit(mut self, n: usize) -> Self {
        self.limit = Some(Limit::First(n));
        self
    }

    /// Keeps the last `n` results in query order.
    pub fn limit_to_last(mut self, n: usize) -> Self {
        self.limit = Some(Limit::Last(n));
        self
    }

    /// Evaluates the query over `docs`.
    ///
    /// Ties in the ordering field are broken by document id so repeated
    /// evaluation over the same data yields the same sequence.
    pub fn evaluate<'a, I>(&self, docs: I) -> Vec<Document>
    where
        I: IntoIterator<Item = &'a Document>,
    {
        let mut matched: Vec<Document> = docs
            .into_iter()
            .filter(|doc| self.filters.iter().all(|filter| filter.matches(doc)))
            .cloned()
            .collect();

        match &self.order_by {
            Some((field, direction)) => matched.sort_by(|a, b| {
                let ordering = compare_fields(a.get(field), b.get(field));
                let ordering = match direction {
                    Direction::Ascending => ordering,
                    Direction::Descending => ordering.reverse(),
                };
                ordering.then_with(|| a.id.cmp(&b.id))
            }),
            None => matched.sort_by(|a, b| a.id.cmp(&b.id)),
        }

        match self.limit {
            Some(Limit::First(n)) => matched.truncate(n),
            Some(Limit::Last(n)) => {
                let skip = matched.len().saturating_sub(n);
                matched.drain(..skip);
            }
            None => {}
        }

        matched
    }
}

fn range_match(doc: &Document, field: &str, bound: &Value, accept: fn(Ordering) -> bool) -> bool {
    match doc.get(field) {
        Some(actual) if type_rank(actual) == type_rank(bound) => {
            accept(compare_present(actual, bound))
        }
        _ => false,
    }
}

fn same_value(a: &Value, b: &Value) -> bool {
    type_rank(a) == type_rank(b) && compare_present(a, b) == Ordering::Equal && {
        // Arrays and maps compare structurally.
        !matches!(a, Value::Array(_) | Value::Object(_)) || a == b
    }
}

/// Orders optional field values. Missing fields sort before present ones.
///
/// RFC 3339 strings order together with numbers by the instant they name, so
/// timestamps written as either epoch milliseconds or text share one order.
pub fn compare_fields(a: Option<&Value>, b: Option<&Value>) -> Ordering {
    match (a, b) {
        (None, None) => Ordering::Equal,
        (None, Some(_)) => Ordering::Less,
        (Some(_), None) => Ordering::Greater,
        (Some(a), Some(b)) => compare_present(a, b),
    }
}

const NUMBER_RANK: u8 = 2;

fn compare_present(a: &Value, b: &Value) -> Ordering {
    let rank = type_rank(a);
    let by_rank = rank.cmp(&type_rank(b));
    if by_rank != Ordering::Equal {
        return by_rank;
    }

    match (a, b) {
        (Value::Bool(a), Value::Bool(b)) => a.cmp(b),
        (Value::Number(a), Value::Number(b)) => match (a.as_i64(), b.as_i64()) {
            (Some(a), Some(b)) => a.cmp(&b),
            _ => compare_floats(a.as_f64(), b.as_f64()),
        },
        _ if rank == NUMBER_RANK => compare_floats(numeric_key(a), numeric_key(b)),
        (Value::String(a), Value::String(b)) => a.cmp(b),
        _ => Ordering::Equal,
    }
}

fn numeric_key(value: &Value) -> Option<f64> {
    match value {
        Value::Number(number) => number.as_f64(),
        other => instant_millis(other).map(|millis| millis as f64),
    }
}

fn compare_floats(a: Option<f64>, b: Option<f64>) -> Ordering {
    let a = a.unwrap_or(f64::NAN);
    let b = b.unwrap_or(f64::NAN);
    a.partial_cmp(&b).unwrap_or(Ordering::Equal)
}

fn type_rank(value: &Value) -> u8 {
    match value {
        Value::Null => 0,
        Value::Bool(_) => 1,
        Value::Number(_) => NUMBER_RANK,
        Value::String(_) if instant_millis(value).is_some() => NUMBER_RANK,
        Value::String(_) => 3,
        Value::Array(_) => 4,
        Value::Object(_) => 5,
    }
}
