//! Request types for table store operations
//!
//! These mirror the logical request shapes of the remote store, so the same
//! values flow through the HTTP API, the cache and the backend.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use super::value::{AttributeValue, Item};

/// Which item image a write returns.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ReturnValues {
    #[default]
    None,
    AllOld,
    UpdatedOld,
    AllNew,
    UpdatedNew,
}

/// Attribute selection for queries and scans.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Select {
    AllAttributes,
    AllProjectedAttributes,
    SpecificAttributes,
    Count,
}

impl Select {
    pub fn as_str(&self) -> &'static str {
        match self {
            Select::AllAttributes => "ALL_ATTRIBUTES",
            Select::AllProjectedAttributes => "ALL_PROJECTED_ATTRIBUTES",
            Select::SpecificAttributes => "SPECIFIC_ATTRIBUTES",
            Select::Count => "COUNT",
        }
    }
}

// == Key Conditions ==
/// Comparison operators allowed in key conditions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ComparisonOperator {
    Eq,
    Lt,
    Le,
    Gt,
    Ge,
    BeginsWith,
    Between,
}

impl ComparisonOperator {
    pub fn as_str(&self) -> &'static str {
        match self {
            ComparisonOperator::Eq => "EQ",
            ComparisonOperator::Lt => "LT",
            ComparisonOperator::Le => "LE",
            ComparisonOperator::Gt => "GT",
            ComparisonOperator::Ge => "GE",
            ComparisonOperator::BeginsWith => "BEGINS_WITH",
            ComparisonOperator::Between => "BETWEEN",
        }
    }

    /// Number of operands the operator takes.
    pub fn arity(&self) -> usize {
        match self {
            ComparisonOperator::Between => 2,
            _ => 1,
        }
    }
}

/// A single key condition: operator plus literal operands.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct Condition {
    pub comparison_operator: ComparisonOperator,
    pub attribute_value_list: Vec<AttributeValue>,
}

impl Condition {
    pub fn new(comparison_operator: ComparisonOperator, values: Vec<AttributeValue>) -> Self {
        Self {
            comparison_operator,
            attribute_value_list: values,
        }
    }

    pub fn eq(value: impl Into<AttributeValue>) -> Self {
        Self::new(ComparisonOperator::Eq, vec![value.into()])
    }

    pub fn between(low: impl Into<AttributeValue>, high: impl Into<AttributeValue>) -> Self {
        Self::new(ComparisonOperator::Between, vec![low.into(), high.into()])
    }
}

// == Point Operations ==
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct GetItemRequest {
    pub table_name: String,
    pub key: Item,
    #[serde(default)]
    pub consistent_read: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub projection_expression: Option<String>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub expression_attribute_names: BTreeMap<String, String>,
}

impl GetItemRequest {
    pub fn new(table_name: impl Into<String>, key: Item) -> Self {
        Self {
            table_name: table_name.into(),
            key,
            ..Default::default()
        }
    }

    pub fn consistent(mut self) -> Self {
        self.consistent_read = true;
        self
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct PutItemRequest {
    pub table_name: String,
    pub item: Item,
    #[serde(default)]
    pub return_values: ReturnValues,
}

impl PutItemRequest {
    pub fn new(table_name: impl Into<String>, item: Item) -> Self {
        Self {
            table_name: table_name.into(),
            item,
            return_values: ReturnValues::None,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct DeleteItemRequest {
    pub table_name: String,
    pub key: Item,
    #[serde(default)]
    pub return_values: ReturnValues,
}

impl DeleteItemRequest {
    pub fn new(table_name: impl Into<String>, key: Item) -> Self {
        Self {
            table_name: table_name.into(),
            key,
            return_values: ReturnValues::None,
        }
    }
}

/// What an update does to one attribute.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum AttributeAction {
    #[serde(rename = "PUT")]
    Put(AttributeValue),
    #[serde(rename = "DELETE")]
    Delete,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct UpdateItemRequest {
    pub table_name: String,
    pub key: Item,
    #[serde(default)]
    pub attribute_updates: BTreeMap<String, AttributeAction>,
    #[serde(default)]
    pub return_values: ReturnValues,
}

impl UpdateItemRequest {
    pub fn new(table_name: impl Into<String>, key: Item) -> Self {
        Self {
            table_name: table_name.into(),
            key,
            ..Default::default()
        }
    }

    pub fn set(mut self, attribute: impl Into<String>, value: impl Into<AttributeValue>) -> Self {
        self.attribute_updates
            .insert(attribute.into(), AttributeAction::Put(value.into()));
        self
    }

    pub fn remove(mut self, attribute: impl Into<String>) -> Self {
        self.attribute_updates
            .insert(attribute.into(), AttributeAction::Delete);
        self
    }

    pub fn returning(mut self, return_values: ReturnValues) -> Self {
        self.return_values = return_values;
        self
    }
}

/// The request key merged with every value an update assigns.
///
/// This is the most that can be said about the post-update item without
/// reading it back.
pub fn assigned_image(key: &Item, updates: &BTreeMap<String, AttributeAction>) -> Item {
    let mut image = key.clone();
    for (name, action) in updates {
        if let AttributeAction::Put(value) = action {
            image.insert(name.clone(), value.clone());
        }
    }
    image
}

// == Batch Operations ==
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct KeysAndAttributes {
    pub keys: Vec<Item>,
    #[serde(default)]
    pub consistent_read: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub projection_expression: Option<String>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub expression_attribute_names: BTreeMap<String, String>,
}

impl KeysAndAttributes {
    pub fn new(keys: Vec<Item>) -> Self {
        Self {
            keys,
            ..Default::default()
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct BatchGetItemRequest {
    pub request_items: BTreeMap<String, KeysAndAttributes>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct PutRequest {
    pub item: Item,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct DeleteRequest {
    pub key: Item,
}

/// One sub-operation of a batch write.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum WriteRequest {
    #[serde(rename = "PutRequest")]
    Put(PutRequest),
    #[serde(rename = "DeleteRequest")]
    Delete(DeleteRequest),
}

impl WriteRequest {
    pub fn put(item: Item) -> Self {
        WriteRequest::Put(PutRequest { item })
    }

    pub fn delete(key: Item) -> Self {
        WriteRequest::Delete(DeleteRequest { key })
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct BatchWriteItemRequest {
    pub request_items: BTreeMap<String, Vec<WriteRequest>>,
}

// == Transactions ==
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct TransactPut {
    pub table_name: String,
    pub item: Item,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct TransactDelete {
    pub table_name: String,
    pub key: Item,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct TransactUpdate {
    pub table_name: String,
    pub key: Item,
    #[serde(default)]
    pub attribute_updates: BTreeMap<String, AttributeAction>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum TransactWriteItem {
    Put(TransactPut),
    Delete(TransactDelete),
    Update(TransactUpdate),
}

impl TransactWriteItem {
    pub fn table_name(&self) -> &str {
        match self {
            TransactWriteItem::Put(put) => &put.table_name,
            TransactWriteItem::Delete(delete) => &delete.table_name,
            TransactWriteItem::Update(update) => &update.table_name,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct TransactWriteItemsRequest {
    pub transact_items: Vec<TransactWriteItem>,
}

// == Query / Scan ==
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct QueryRequest {
    pub table_name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub index_name: Option<String>,
    pub key_conditions: BTreeMap<String, Condition>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub select: Option<Select>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub projection_expression: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub filter_expression: Option<String>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub expression_attribute_names: BTreeMap<String, String>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub expression_attribute_values: BTreeMap<String, AttributeValue>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub scan_index_forward: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub exclusive_start_key: Option<Item>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub limit: Option<u32>,
    #[serde(default)]
    pub consistent_read: bool,
}

impl QueryRequest {
    pub fn new(table_name: impl Into<String>) -> Self {
        Self {
            table_name: table_name.into(),
            ..Default::default()
        }
    }

    pub fn on_index(mut self, index_name: impl Into<String>) -> Self {
        self.index_name = Some(index_name.into());
        self
    }

    pub fn with_condition(mut self, attribute: impl Into<String>, condition: Condition) -> Self {
        self.key_conditions.insert(attribute.into(), condition);
        self
    }

    pub fn with_limit(mut self, limit: u32) -> Self {
        self.limit = Some(limit);
        self
    }

    /// Forward unless explicitly reversed.
    pub fn is_forward(&self) -> bool {
        self.scan_index_forward.unwrap_or(true)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct ScanRequest {
    pub table_name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub index_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub select: Option<Select>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub projection_expression: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub filter_expression: Option<String>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub expression_attribute_names: BTreeMap<String, String>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub expression_attribute_values: BTreeMap<String, AttributeValue>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub exclusive_start_key: Option<Item>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub limit: Option<u32>,
    #[serde(default)]
    pub consistent_read: bool,
}

impl ScanRequest {
    pub fn new(table_name: impl Into<String>) -> Self {
        Self {
            table_name: table_name.into(),
            ..Default::default()
        }
    }
}

// == Admin Requests ==
/// Request body for `PUT /debug`
#[derive(Debug, Clone, Deserialize)]
pub struct DebugRequest {
    pub enabled: bool,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_write_request_deserialize() {
        let json = r#"[
            {"PutRequest": {"Item": {"id": {"S": "a"}}}},
            {"DeleteRequest": {"Key": {"id": {"S": "b"}}}}
        ]"#;
        let reqs: Vec<WriteRequest> = serde_json::from_str(json).unwrap();
        assert!(matches!(reqs[0], WriteRequest::Put(_)));
        assert!(matches!(reqs[1], WriteRequest::Delete(_)));
    }

    #[test]
    fn test_query_request_defaults() {
        let json = r#"{
            "TableName": "orders",
            "KeyConditions": {"customer": {"ComparisonOperator": "EQ", "AttributeValueList": [{"S": "c1"}]}}
        }"#;
        let req: QueryRequest = serde_json::from_str(json).unwrap();
        assert!(req.is_forward());
        assert!(req.index_name.is_none());
        assert!(!req.consistent_read);
        assert_eq!(
            req.key_conditions["customer"].comparison_operator,
            ComparisonOperator::Eq
        );
    }

    #[test]
    fn test_update_request_deserialize() {
        let json = r#"{
            "TableName": "users",
            "Key": {"id": {"S": "u1"}},
            "AttributeUpdates": {"name": {"PUT": {"S": "Ann"}}, "nick": "DELETE"},
            "ReturnValues": "ALL_NEW"
        }"#;
        let req: UpdateItemRequest = serde_json::from_str(json).unwrap();
        assert_eq!(req.return_values, ReturnValues::AllNew);
        assert_eq!(req.attribute_updates["nick"], AttributeAction::Delete);
    }

    #[test]
    fn test_assigned_image_merges_puts_only() {
        let mut key = Item::new();
        key.insert("id".to_string(), AttributeValue::from("u1"));
        let req = UpdateItemRequest::new("users", key.clone())
            .set("email", "a@example.com")
            .remove("nick");

        let image = assigned_image(&req.key, &req.attribute_updates);
        assert_eq!(image.len(), 2);
        assert_eq!(image["email"], AttributeValue::from("a@example.com"));
        assert!(!image.contains_key("nick"));
    }

    #[test]
    fn test_operator_arity() {
        assert_eq!(ComparisonOperator::Between.arity(), 2);
        assert_eq!(ComparisonOperator::BeginsWith.arity(), 1);
        assert_eq!(ComparisonOperator::BeginsWith.as_str(), "BEGINS_WITH");
    }
}
