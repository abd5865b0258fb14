//! In-memory table store
//!
//! A complete `TableStore` kept in process memory. It backs the development
//! server and the test suites. Filter expressions are not evaluated.

use std::cmp::Ordering;
use std::collections::{BTreeMap, BTreeSet, HashMap};

use async_trait::async_trait;
use tokio::sync::RwLock;
use tracing::debug;

use super::TableStore;
use crate::error::{CacheError, RemoteError, Result};
use crate::keys::{item_key, key_only, target_key_schema};
use crate::models::{
    AttributeAction, AttributeValue, BatchGetItemOutput, BatchGetItemRequest,
    BatchWriteItemOutput, BatchWriteItemRequest, ComparisonOperator, Condition,
    DeleteItemOutput, DeleteItemRequest, GetItemOutput, GetItemRequest, Item, KeySchema,
    PutItemOutput, PutItemRequest, QueryOutput, QueryRequest, ReturnValues, ScanOutput,
    ScanRequest, Select, TableSchema, TransactWriteItem, TransactWriteItemsOutput,
    TransactWriteItemsRequest, UpdateItemOutput, UpdateItemRequest, WriteRequest,
};

/// Most keys a single batch get may carry
pub const MAX_BATCH_GET_KEYS: usize = 100;

/// Most sub-operations a single batch write may carry
pub const MAX_BATCH_WRITE_ITEMS: usize = 25;

/// Most sub-operations a single transaction may carry
pub const MAX_TRANSACT_ITEMS: usize = 100;

#[derive(Debug)]
struct MemoryTable {
    schema: TableSchema,
    /// Items by encoded primary key
    items: BTreeMap<String, Item>,
}

impl MemoryTable {
    fn storage_key(&self, item: &Item) -> Result<String> {
        item_key(&self.schema.table_name, item, &self.schema.key_schema).map_err(as_validation)
    }

    /// Storage key for a request key, which must hold exactly the key attributes.
    fn exact_key(&self, key: &Item) -> Result<String> {
        if let Some(extra) = key.keys().find(|k| !self.schema.key_schema.contains(k)) {
            return Err(validation(format!(
                "key for table {} carries non-key attribute '{}'",
                self.schema.table_name, extra
            )));
        }
        self.storage_key(key)
    }
}

// == Memory Table Store ==
#[derive(Debug, Default)]
pub struct MemoryTableStore {
    tables: RwLock<HashMap<String, MemoryTable>>,
}

impl MemoryTableStore {
    pub fn new() -> Self {
        Self::default()
    }

    // == Create Table ==
    /// Registers a new, empty table.
    pub async fn create_table(&self, schema: TableSchema) -> Result<()> {
        for lsi in &schema.local_indexes {
            if lsi.key_schema.hash_attribute != schema.key_schema.hash_attribute
                || lsi.key_schema.range_attribute.is_none()
            {
                return Err(validation(format!(
                    "local index {} must share the table hash attribute and define a range attribute",
                    lsi.index_name
                )));
            }
        }

        let mut tables = self.tables.write().await;
        if tables.contains_key(&schema.table_name) {
            return Err(validation(format!(
                "table {} already exists",
                schema.table_name
            )));
        }
        debug!("Creating table {}", schema.table_name);
        tables.insert(
            schema.table_name.clone(),
            MemoryTable {
                schema,
                items: BTreeMap::new(),
            },
        );
        Ok(())
    }

    /// Number of items stored in a table.
    pub async fn item_count(&self, table: &str) -> Result<usize> {
        let tables = self.tables.read().await;
        Ok(lookup(&tables, table)?.items.len())
    }
}

#[async_trait]
impl TableStore for MemoryTableStore {
    async fn describe_table(&self, table: &str) -> Result<TableSchema> {
        let tables = self.tables.read().await;
        Ok(lookup(&tables, table)?.schema.clone())
    }

    async fn get_item(&self, req: GetItemRequest) -> Result<GetItemOutput> {
        let tables = self.tables.read().await;
        let table = lookup(&tables, &req.table_name)?;
        let key = table.exact_key(&req.key)?;

        let item = table.items.get(&key).map(|item| {
            project(
                item,
                req.projection_expression.as_deref(),
                &req.expression_attribute_names,
            )
        });
        Ok(GetItemOutput { item })
    }

    async fn put_item(&self, req: PutItemRequest) -> Result<PutItemOutput> {
        check_old_image_only(req.return_values)?;
        let mut tables = self.tables.write().await;
        let table = lookup_mut(&mut tables, &req.table_name)?;
        let key = table.storage_key(&req.item)?;

        let old = table.items.insert(key, req.item);
        Ok(PutItemOutput {
            attributes: old.filter(|_| req.return_values == ReturnValues::AllOld),
        })
    }

    async fn delete_item(&self, req: DeleteItemRequest) -> Result<DeleteItemOutput> {
        check_old_image_only(req.return_values)?;
        let mut tables = self.tables.write().await;
        let table = lookup_mut(&mut tables, &req.table_name)?;
        let key = table.exact_key(&req.key)?;

        let old = table.items.remove(&key);
        Ok(DeleteItemOutput {
            attributes: old.filter(|_| req.return_values == ReturnValues::AllOld),
        })
    }

    async fn update_item(&self, req: UpdateItemRequest) -> Result<UpdateItemOutput> {
        let mut tables = self.tables.write().await;
        let table = lookup_mut(&mut tables, &req.table_name)?;
        let key = table.exact_key(&req.key)?;
        check_updates(&table.schema, &req.attribute_updates)?;

        let old = table.items.get(&key).cloned();
        let new = apply_updates(old.clone().unwrap_or_else(|| req.key.clone()), &req.attribute_updates);
        table.items.insert(key, new.clone());

        let updated = |image: &Item| -> Option<Item> {
            let picked: Item = image
                .iter()
                .filter(|(name, _)| req.attribute_updates.contains_key(*name))
                .map(|(k, v)| (k.clone(), v.clone()))
                .collect();
            (!picked.is_empty()).then_some(picked)
        };
        let attributes = match req.return_values {
            ReturnValues::None => None,
            ReturnValues::AllOld => old,
            ReturnValues::AllNew => Some(new),
            ReturnValues::UpdatedOld => old.as_ref().and_then(updated),
            ReturnValues::UpdatedNew => updated(&new),
        };
        Ok(UpdateItemOutput { attributes })
    }

    async fn batch_get_item(&self, req: BatchGetItemRequest) -> Result<BatchGetItemOutput> {
        let total: usize = req.request_items.values().map(|k| k.keys.len()).sum();
        if total == 0 || total > MAX_BATCH_GET_KEYS {
            return Err(validation(format!(
                "batch get must request between 1 and {} keys, got {}",
                MAX_BATCH_GET_KEYS, total
            )));
        }

        let tables = self.tables.read().await;
        let mut output = BatchGetItemOutput::default();
        for (name, kaa) in &req.request_items {
            let table = lookup(&tables, name)?;
            let mut found = Vec::new();
            for key in &kaa.keys {
                let key = table.exact_key(key)?;
                if let Some(item) = table.items.get(&key) {
                    found.push(project(
                        item,
                        kaa.projection_expression.as_deref(),
                        &kaa.expression_attribute_names,
                    ));
                }
            }
            output.responses.insert(name.clone(), found);
        }
        Ok(output)
    }

    async fn batch_write_item(&self, req: BatchWriteItemRequest) -> Result<BatchWriteItemOutput> {
        let total: usize = req.request_items.values().map(Vec::len).sum();
        if total == 0 || total > MAX_BATCH_WRITE_ITEMS {
            return Err(validation(format!(
                "batch write must carry between 1 and {} requests, got {}",
                MAX_BATCH_WRITE_ITEMS, total
            )));
        }

        let mut tables = self.tables.write().await;
        // Validate everything before touching any table.
        for (name, writes) in &req.request_items {
            let table = lookup(&tables, name)?;
            for write in writes {
                match write {
                    WriteRequest::Put(put) => table.storage_key(&put.item)?,
                    WriteRequest::Delete(delete) => table.exact_key(&delete.key)?,
                };
            }
        }

        for (name, writes) in req.request_items {
            let table = lookup_mut(&mut tables, &name)?;
            for write in writes {
                match write {
                    WriteRequest::Put(put) => {
                        let key = table.storage_key(&put.item)?;
                        table.items.insert(key, put.item);
                    }
                    WriteRequest::Delete(delete) => {
                        let key = table.exact_key(&delete.key)?;
                        table.items.remove(&key);
                    }
                }
            }
        }
        Ok(BatchWriteItemOutput::default())
    }

    async fn transact_write_items(
        &self,
        req: TransactWriteItemsRequest,
    ) -> Result<TransactWriteItemsOutput> {
        let total = req.transact_items.len();
        if total == 0 || total > MAX_TRANSACT_ITEMS {
            return Err(validation(format!(
                "transaction must carry between 1 and {} items, got {}",
                MAX_TRANSACT_ITEMS, total
            )));
        }

        let mut tables = self.tables.write().await;
        let mut touched = BTreeSet::new();
        for op in &req.transact_items {
            let table = lookup(&tables, op.table_name())?;
            let key = match op {
                TransactWriteItem::Put(put) => table.storage_key(&put.item)?,
                TransactWriteItem::Delete(delete) => table.exact_key(&delete.key)?,
                TransactWriteItem::Update(update) => {
                    check_updates(&table.schema, &update.attribute_updates)?;
                    table.exact_key(&update.key)?
                }
            };
            if !touched.insert(key.clone()) {
                return Err(validation(format!(
                    "transaction touches {} more than once",
                    key
                )));
            }
        }

        for op in req.transact_items {
            let table = lookup_mut(&mut tables, op.table_name())?;
            match op {
                TransactWriteItem::Put(put) => {
                    let key = table.storage_key(&put.item)?;
                    table.items.insert(key, put.item);
                }
                TransactWriteItem::Delete(delete) => {
                    let key = table.exact_key(&delete.key)?;
                    table.items.remove(&key);
                }
                TransactWriteItem::Update(update) => {
                    let key = table.exact_key(&update.key)?;
                    let base = table
                        .items
                        .get(&key)
                        .cloned()
                        .unwrap_or_else(|| update.key.clone());
                    table
                        .items
                        .insert(key, apply_updates(base, &update.attribute_updates));
                }
            }
        }
        Ok(TransactWriteItemsOutput::default())
    }

    async fn query(&self, req: QueryRequest) -> Result<QueryOutput> {
        if req.filter_expression.is_some() {
            return Err(unsupported_filter());
        }

        let tables = self.tables.read().await;
        let table = lookup(&tables, &req.table_name)?;
        let key_schema =
            target_key_schema(&table.schema, req.index_name.as_deref()).map_err(as_validation)?;

        let hash_attr = &key_schema.hash_attribute;
        let hash = match req.key_conditions.get(hash_attr) {
            Some(cond) if cond.comparison_operator == ComparisonOperator::Eq => cond
                .attribute_value_list
                .first()
                .ok_or_else(|| validation(format!("missing operand for {}", hash_attr)))?,
            _ => {
                return Err(validation(format!(
                    "query requires an EQ condition on {}",
                    hash_attr
                )))
            }
        };
        let range_cond = key_schema
            .range_attribute
            .as_ref()
            .and_then(|attr| req.key_conditions.get(attr).map(|c| (attr, c)));

        let mut matches: Vec<(String, &Item)> = Vec::new();
        for (storage_key, item) in &table.items {
            if !has_key_attributes(item, key_schema) || item.get(hash_attr) != Some(hash) {
                continue;
            }
            if let Some((attr, cond)) = range_cond {
                let value = item.get(attr.as_str());
                if !value.is_some_and(|v| condition_holds(v, cond)) {
                    continue;
                }
            }
            matches.push((storage_key.clone(), item));
        }

        let range_attr = key_schema.range_attribute.as_deref();
        matches.sort_by(|a, b| {
            let by_range = match range_attr {
                Some(attr) => compare_optional(a.1.get(attr), b.1.get(attr)),
                None => Ordering::Equal,
            };
            by_range.then_with(|| a.0.cmp(&b.0))
        });
        if !req.is_forward() {
            matches.reverse();
        }

        if let Some(cursor) = &req.exclusive_start_key {
            let cursor_key = table.storage_key(cursor)?;
            let cursor_range = range_attr.and_then(|attr| cursor.get(attr));
            let forward = req.is_forward();
            matches.retain(|(storage_key, item)| {
                let order = match range_attr {
                    Some(attr) => compare_optional(item.get(attr), cursor_range),
                    None => Ordering::Equal,
                }
                .then_with(|| storage_key.cmp(&cursor_key));
                if forward {
                    order == Ordering::Greater
                } else {
                    order == Ordering::Less
                }
            });
        }

        let items: Vec<&Item> = matches.into_iter().map(|(_, item)| item).collect();
        Ok(page(
            &table.schema,
            key_schema,
            items,
            req.limit,
            req.select,
            req.projection_expression.as_deref(),
            &req.expression_attribute_names,
        )
        .into())
    }

    async fn scan(&self, req: ScanRequest) -> Result<ScanOutput> {
        if req.filter_expression.is_some() {
            return Err(unsupported_filter());
        }

        let tables = self.tables.read().await;
        let table = lookup(&tables, &req.table_name)?;
        let key_schema =
            target_key_schema(&table.schema, req.index_name.as_deref()).map_err(as_validation)?;

        let cursor_key = match &req.exclusive_start_key {
            Some(cursor) => Some(table.storage_key(cursor)?),
            None => None,
        };
        let items: Vec<&Item> = table
            .items
            .iter()
            .filter(|(storage_key, _)| cursor_key.as_ref().map_or(true, |c| *storage_key > c))
            .filter(|(_, item)| has_key_attributes(item, key_schema))
            .map(|(_, item)| item)
            .collect();

        Ok(page(
            &table.schema,
            key_schema,
            items,
            req.limit,
            req.select,
            req.projection_expression.as_deref(),
            &req.expression_attribute_names,
        )
        .into())
    }
}

// == Paging ==
struct Page {
    items: Vec<Item>,
    count: usize,
    last_evaluated_key: Option<Item>,
}

impl From<Page> for QueryOutput {
    fn from(page: Page) -> Self {
        QueryOutput {
            items: page.items,
            count: page.count,
            last_evaluated_key: page.last_evaluated_key,
        }
    }
}

impl From<Page> for ScanOutput {
    fn from(page: Page) -> Self {
        ScanOutput {
            items: page.items,
            count: page.count,
            last_evaluated_key: page.last_evaluated_key,
        }
    }
}

fn page(
    schema: &TableSchema,
    key_schema: &KeySchema,
    items: Vec<&Item>,
    limit: Option<u32>,
    select: Option<Select>,
    projection: Option<&str>,
    names: &BTreeMap<String, String>,
) -> Page {
    let limit = limit.map_or(usize::MAX, |l| l as usize);
    let truncated = items.len() > limit;
    let taken: Vec<&Item> = items.into_iter().take(limit).collect();

    let last_evaluated_key = if truncated {
        taken.last().map(|last| {
            let mut key = key_only(last, &schema.key_schema);
            key.extend(key_only(last, key_schema));
            key
        })
    } else {
        None
    };

    let count = taken.len();
    let items = if select == Some(Select::Count) {
        Vec::new()
    } else {
        taken
            .into_iter()
            .map(|item| project(item, projection, names))
            .collect()
    };
    Page {
        items,
        count,
        last_evaluated_key,
    }
}

// == Helpers ==
fn lookup<'a>(tables: &'a HashMap<String, MemoryTable>, name: &str) -> Result<&'a MemoryTable> {
    tables
        .get(name)
        .ok_or_else(|| RemoteError::ResourceNotFound(format!("table {}", name)).into())
}

fn lookup_mut<'a>(
    tables: &'a mut HashMap<String, MemoryTable>,
    name: &str,
) -> Result<&'a mut MemoryTable> {
    tables
        .get_mut(name)
        .ok_or_else(|| RemoteError::ResourceNotFound(format!("table {}", name)).into())
}

fn validation(message: String) -> CacheError {
    RemoteError::Validation(message).into()
}

fn as_validation(err: CacheError) -> CacheError {
    match err {
        CacheError::Encoding(msg) => validation(msg),
        CacheError::IndexNotFound { table, index } => {
            validation(format!("table {} has no index {}", table, index))
        }
        other => other,
    }
}

fn unsupported_filter() -> CacheError {
    validation("filter expressions are not supported by the in-memory store".to_string())
}

fn check_old_image_only(return_values: ReturnValues) -> Result<()> {
    match return_values {
        ReturnValues::None | ReturnValues::AllOld => Ok(()),
        other => Err(validation(format!(
            "return values {:?} are only valid for updates",
            other
        ))),
    }
}

fn check_updates(schema: &TableSchema, updates: &BTreeMap<String, AttributeAction>) -> Result<()> {
    match updates.keys().find(|name| schema.key_schema.contains(name)) {
        Some(name) => Err(validation(format!(
            "cannot update key attribute '{}'",
            name
        ))),
        None => Ok(()),
    }
}

fn apply_updates(mut item: Item, updates: &BTreeMap<String, AttributeAction>) -> Item {
    for (name, action) in updates {
        match action {
            AttributeAction::Put(value) => {
                item.insert(name.clone(), value.clone());
            }
            AttributeAction::Delete => {
                item.remove(name);
            }
        }
    }
    item
}

fn has_key_attributes(item: &Item, key_schema: &KeySchema) -> bool {
    key_schema.attributes().all(|attr| item.contains_key(attr))
}

/// Keeps only the attributes named in a comma-separated projection.
fn project(item: &Item, projection: Option<&str>, names: &BTreeMap<String, String>) -> Item {
    let Some(projection) = projection else {
        return item.clone();
    };
    let wanted: BTreeSet<&str> = projection
        .split(',')
        .map(str::trim)
        .map(|name| names.get(name).map(String::as_str).unwrap_or(name))
        .collect();
    item.iter()
        .filter(|(name, _)| wanted.contains(name.as_str()))
        .map(|(k, v)| (k.clone(), v.clone()))
        .collect()
}

fn compare_values(a: &AttributeValue, b: &AttributeValue) -> Option<Ordering> {
    match (a, b) {
        (AttributeValue::S(a), AttributeValue::S(b)) => Some(a.cmp(b)),
        (AttributeValue::B(a), AttributeValue::B(b)) => Some(a.cmp(b)),
        (AttributeValue::N(a), AttributeValue::N(b)) => {
            let a: f64 = a.parse().ok()?;
            let b: f64 = b.parse().ok()?;
            a.partial_cmp(&b)
        }
        _ => None,
    }
}

fn compare_optional(a: Option<&AttributeValue>, b: Option<&AttributeValue>) -> Ordering {
    match (a, b) {
        (Some(a), Some(b)) => compare_values(a, b).unwrap_or(Ordering::Equal),
        (None, Some(_)) => Ordering::Less,
        (Some(_), None) => Ordering::Greater,
        (None, None) => Ordering::Equal,
    }
}

fn condition_holds(value: &AttributeValue, cond: &Condition) -> bool {
    let operands = &cond.attribute_value_list;
    let against = |i: usize| operands.get(i).and_then(|op| compare_values(value, op));
    match cond.comparison_operator {
        ComparisonOperator::Eq => against(0) == Some(Ordering::Equal),
        ComparisonOperator::Lt => against(0) == Some(Ordering::Less),
        ComparisonOperator::Le => matches!(against(0), Some(Ordering::Less | Ordering::Equal)),
        ComparisonOperator::Gt => against(0) == Some(Ordering::Greater),
        ComparisonOperator::Ge => matches!(against(0), Some(Ordering::Greater | Ordering::Equal)),
        ComparisonOperator::BeginsWith => match (value, operands.first()) {
            (AttributeValue::S(v), Some(AttributeValue::S(prefix))) => v.starts_with(prefix.as_str()),
            (AttributeValue::B(v), Some(AttributeValue::B(prefix))) => v.starts_with(prefix),
            _ => false,
        },
        ComparisonOperator::Between => {
            matches!(against(0), Some(Ordering::Greater | Ordering::Equal))
                && matches!(against(1), Some(Ordering::Less | Ordering::Equal))
        }
    }
}
