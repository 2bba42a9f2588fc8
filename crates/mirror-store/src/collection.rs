//! Collection names, ordering and the merge rule shared by all backends.

use serde_json::{
    Map,
    Value,
};
use std::{
    cmp::Ordering,
    fmt,
};

/// A stored record. Records are flat JSON objects.
pub type Document = Map<String, Value>;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Collection {
    Blocks,
    Transactions,
    Contracts,
}

impl Collection {
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Blocks => "blocks",
            Self::Transactions => "transactions",
            Self::Contracts => "contracts",
        }
    }
}

impl fmt::Display for Collection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Direction {
    #[default]
    Ascending,
    Descending,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct UpsertOptions {
    pub merge: bool,
}

impl UpsertOptions {
    pub const REPLACE: Self = Self { merge: false };
    pub const MERGE: Self = Self { merge: true };
}

/// Combine an incoming record with whatever is already stored under its key.
pub fn apply_upsert(existing: Option<Document>, record: Document, options: UpsertOptions) -> Document {
    match existing {
        Some(mut stored) if options.merge => {
            stored.extend(record);
            stored
        }
        _ => record,
    }
}

/// Sort documents by a single field. Documents without the field go last.
pub fn sort_documents(documents: &mut [Document], order_by: &str, direction: Direction) {
    documents.sort_by(|a, b| {
        match (a.get(order_by), b.get(order_by)) {
            (Some(left), Some(right)) => {
                let ordering = compare_values(left, right);
                match direction {
                    Direction::Ascending => ordering,
                    Direction::Descending => ordering.reverse(),
                }
            }
            (Some(_), None) => Ordering::Less,
            (None, Some(_)) => Ordering::Greater,
            (None, None) => Ordering::Equal,
        }
    });
}

fn compare_values(left: &Value, right: &Value) -> Ordering {
    match (left, right) {
        (Value::Number(l), Value::Number(r)) => {
            match (l.as_u64(), r.as_u64()) {
                (Some(l), Some(r)) => l.cmp(&r),
                _ => {
                    l.as_f64()
                        .partial_cmp(&r.as_f64())
                        .unwrap_or(Ordering::Equal)
                }
            }
        }
        (Value::String(l), Value::String(r)) => l.cmp(r),
        (Value::Bool(l), Value::Bool(r)) => l.cmp(r),
        // Mixed types keep their relative order.
        _ => Ordering::Equal,
    }
}
