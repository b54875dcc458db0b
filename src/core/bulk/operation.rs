//! Item write operations submitted to a bulk executor

use super::context::OperationContext;
use serde::{Deserialize, Serialize};
use serde_json::{Number, Value};
use std::fmt;
use std::str::FromStr;

/// Kind of item write
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OperationKind {
    /// Create a new item; fails with 409 if it already exists
    Create,
    /// Create or replace an item
    Upsert,
    /// Delete an item by id
    Delete,
}

impl fmt::Display for OperationKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            OperationKind::Create => write!(f, "create"),
            OperationKind::Upsert => write!(f, "upsert"),
            OperationKind::Delete => write!(f, "delete"),
        }
    }
}

impl FromStr for OperationKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "create" => Ok(OperationKind::Create),
            "upsert" => Ok(OperationKind::Upsert),
            "delete" => Ok(OperationKind::Delete),
            _ => Err(format!(
                "Invalid operation kind '{s}'. Must be one of: create, upsert, delete"
            )),
        }
    }
}

/// Partition key value of a document
///
/// Numeric keys stay numeric; the store compares the key sent with the
/// request against the value inside the document, type included.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PartitionKeyValue {
    String(String),
    Number(Number),
}

impl PartitionKeyValue {
    /// Reads a partition key from a JSON value
    ///
    /// Only non-empty strings and numbers are usable as keys.
    pub fn from_json(value: &Value) -> Option<Self> {
        match value {
            Value::String(s) if !s.is_empty() => Some(PartitionKeyValue::String(s.clone())),
            Value::Number(n) => Some(PartitionKeyValue::Number(n.clone())),
            _ => None,
        }
    }
}

impl fmt::Display for PartitionKeyValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PartitionKeyValue::String(s) => f.write_str(s),
            PartitionKeyValue::Number(n) => write!(f, "{n}"),
        }
    }
}

impl From<&str> for PartitionKeyValue {
    fn from(value: &str) -> Self {
        PartitionKeyValue::String(value.to_string())
    }
}

impl From<String> for PartitionKeyValue {
    fn from(value: String) -> Self {
        PartitionKeyValue::String(value)
    }
}

impl From<i64> for PartitionKeyValue {
    fn from(value: i64) -> Self {
        PartitionKeyValue::Number(Number::from(value))
    }
}

impl PartialEq<str> for PartitionKeyValue {
    fn eq(&self, other: &str) -> bool {
        matches!(self, PartitionKeyValue::String(s) if s == other)
    }
}

impl PartialEq<&str> for PartitionKeyValue {
    fn eq(&self, other: &&str) -> bool {
        self == *other
    }
}

/// A single write against the store
///
/// The operation is immutable; the retry path builds a new one of the same
/// kind through [`ItemOperation::for_retry`].
#[derive(Debug, Clone, PartialEq)]
pub struct ItemOperation {
    kind: OperationKind,
    partition_key: PartitionKeyValue,
    document: Value,
    context: OperationContext,
}

impl ItemOperation {
    /// Creates an operation of the given kind
    pub fn new(
        kind: OperationKind,
        partition_key: impl Into<PartitionKeyValue>,
        document: Value,
        context: OperationContext,
    ) -> Self {
        Self {
            kind,
            partition_key: partition_key.into(),
            document,
            context,
        }
    }

    /// Create operation
    pub fn create(partition_key: impl Into<PartitionKeyValue>, document: Value, context: OperationContext) -> Self {
        Self::new(OperationKind::Create, partition_key, document, context)
    }

    /// Upsert operation
    pub fn upsert(partition_key: impl Into<PartitionKeyValue>, document: Value, context: OperationContext) -> Self {
        Self::new(OperationKind::Upsert, partition_key, document, context)
    }

    /// Delete operation
    pub fn delete(partition_key: impl Into<PartitionKeyValue>, document: Value, context: OperationContext) -> Self {
        Self::new(OperationKind::Delete, partition_key, document, context)
    }

    /// Builds the next attempt of this operation
    pub fn for_retry(&self) -> Self {
        Self {
            kind: self.kind,
            partition_key: self.partition_key.clone(),
            document: self.document.clone(),
            context: self.context.for_retry(),
        }
    }

    pub fn kind(&self) -> OperationKind {
        self.kind
    }

    pub fn partition_key(&self) -> &PartitionKeyValue {
        &self.partition_key
    }

    pub fn document(&self) -> &Value {
        &self.document
    }

    pub fn context(&self) -> &OperationContext {
        &self.context
    }

    /// Document id, taken from the context
    pub fn id(&self) -> &str {
        self.context.id()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn context() -> OperationContext {
        OperationContext::new("doc1", "import").unwrap()
    }

    #[test]
    fn test_operation_kind_from_str() {
        assert_eq!(OperationKind::from_str("create").unwrap(), OperationKind::Create);
        assert_eq!(OperationKind::from_str("UPSERT").unwrap(), OperationKind::Upsert);
        assert_eq!(OperationKind::from_str("Delete").unwrap(), OperationKind::Delete);
        assert!(OperationKind::from_str("replace").is_err());
    }

    #[test]
    fn test_for_retry_keeps_kind_and_payload() {
        let op = ItemOperation::delete("pk1", json!({"id": "doc1"}), context());
        let retry = op.for_retry();

        assert_eq!(retry.kind(), OperationKind::Delete);
        assert_eq!(retry.partition_key(), "pk1");
        assert_eq!(retry.document(), op.document());
        assert_eq!(retry.context().retry_count(), 1);
        assert_eq!(retry.id(), "doc1");
    }

    #[test]
    fn test_partition_key_from_json() {
        assert_eq!(
            PartitionKeyValue::from_json(&json!("tenant")),
            Some(PartitionKeyValue::from("tenant"))
        );
        assert_eq!(
            PartitionKeyValue::from_json(&json!(7)),
            Some(PartitionKeyValue::from(7_i64))
        );
        assert!(matches!(
            PartitionKeyValue::from_json(&json!(2.5)),
            Some(PartitionKeyValue::Number(n)) if n.as_f64() == Some(2.5)
        ));
        assert_eq!(PartitionKeyValue::from_json(&json!("")), None);
        assert_eq!(PartitionKeyValue::from_json(&json!(true)), None);
        assert_eq!(PartitionKeyValue::from_json(&json!(null)), None);
    }

    #[test]
    fn test_numeric_partition_key_is_not_a_string() {
        let key = PartitionKeyValue::from(7_i64);
        assert_eq!(key.to_string(), "7");
        assert_ne!(key, PartitionKeyValue::from("7"));
        assert!(key != "7");
    }
}
