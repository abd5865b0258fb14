//! Cache keys for items, query/scan groups and request shapes

use std::collections::BTreeMap;
use std::fmt;

use super::encode::{encode_key_value, encode_tagged_value, encode_value, write_member};
use crate::error::{CacheError, Result};
use crate::models::{
    AttributeValue, ComparisonOperator, Condition, Item, KeySchema, QueryRequest, ScanRequest,
    Select, TableSchema,
};

// == Item Keys ==
/// Fully qualified primary key: `table$hash:len:value[/range:len:value]`.
///
/// Values are length-prefixed, so separators inside a value cannot make two
/// keys meet.
pub fn item_key(table: &str, item: &Item, key_schema: &KeySchema) -> Result<String> {
    let mut key = String::with_capacity(table.len() + 32);
    key.push_str(table);
    key.push('$');
    write_key_part(&mut key, item, &key_schema.hash_attribute)?;
    if let Some(range) = &key_schema.range_attribute {
        key.push('/');
        write_key_part(&mut key, item, range)?;
    }
    Ok(key)
}

fn write_key_part(out: &mut String, item: &Item, attribute: &str) -> Result<()> {
    out.push_str(attribute);
    out.push(':');
    write_member(out, &encode_key_value(attribute, item.get(attribute))?);
    Ok(())
}

/// Projects an item down to its key attributes.
pub fn key_only(item: &Item, key_schema: &KeySchema) -> Item {
    key_schema
        .attributes()
        .filter_map(|attr| item.get(attr).map(|v| (attr.to_string(), v.clone())))
        .collect()
}

// == Group Keys ==
/// Invalidation unit for query and scan results.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct GroupKey {
    pub table: String,
    pub index: Option<String>,
    /// Encoded hash value; `None` covers the whole table or index
    pub hash: Option<String>,
}

impl GroupKey {
    pub fn new(table: &str, index: Option<&str>, hash: Option<String>) -> Self {
        Self {
            table: table.to_string(),
            index: index.map(str::to_string),
            hash,
        }
    }

    pub fn scan(table: &str, index: Option<&str>) -> Self {
        Self::new(table, index, None)
    }

    /// True for any group on the given table and index, whatever its hash value.
    pub fn is_within(&self, table: &str, index: Option<&str>) -> bool {
        self.table == table && self.index.as_deref() == index
    }
}

impl fmt::Display for GroupKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.table)?;
        if let Some(hash) = &self.hash {
            write!(f, "&{}", hash)?;
        }
        if let Some(index) = &self.index {
            write!(f, "#{}", index)?;
        }
        Ok(())
    }
}

/// Resolves the key schema a query or scan runs against.
pub fn target_key_schema<'a>(schema: &'a TableSchema, index: Option<&str>) -> Result<&'a KeySchema> {
    match index {
        None => Ok(&schema.key_schema),
        Some(name) => schema
            .index(name)
            .map(|idx| &idx.key_schema)
            .ok_or_else(|| CacheError::IndexNotFound {
                table: schema.table_name.clone(),
                index: name.to_string(),
            }),
    }
}

/// Group a query's results belong to.
///
/// Two-component schemas are narrowed by the hash value from the equality
/// condition; hash-only schemas share one group per table or index.
pub fn query_group(schema: &TableSchema, req: &QueryRequest) -> Result<GroupKey> {
    let key_schema = target_key_schema(schema, req.index_name.as_deref())?;
    let index = req.index_name.as_deref();
    if key_schema.is_single_component() {
        return Ok(GroupKey::new(&schema.table_name, index, None));
    }
    let hash = hash_condition_value(key_schema, &req.key_conditions)?;
    Ok(GroupKey::new(
        &schema.table_name,
        index,
        Some(encode_key_value(&key_schema.hash_attribute, Some(hash))?),
    ))
}

fn hash_condition_value<'a>(
    key_schema: &KeySchema,
    conditions: &'a BTreeMap<String, Condition>,
) -> Result<&'a AttributeValue> {
    let attr = &key_schema.hash_attribute;
    let cond = conditions.get(attr).ok_or_else(|| {
        CacheError::Encoding(format!("query has no condition on hash attribute '{}'", attr))
    })?;
    match (cond.comparison_operator, cond.attribute_value_list.as_slice()) {
        (ComparisonOperator::Eq, [value]) => Ok(value),
        _ => Err(CacheError::Encoding(format!(
            "hash attribute '{}' requires a single EQ operand",
            attr
        ))),
    }
}

// == Request Shapes ==
/// Inner cache key for a query: every input that can change the result.
pub fn query_shape(schema: &TableSchema, req: &QueryRequest) -> Result<String> {
    let key_schema = target_key_schema(schema, req.index_name.as_deref())?;
    for attr in req.key_conditions.keys() {
        if !key_schema.contains(attr) {
            return Err(CacheError::Encoding(format!(
                "key condition on non-key attribute '{}'",
                attr
            )));
        }
    }
    hash_condition_value(key_schema, &req.key_conditions)?;

    let mut key = String::new();
    write_select(&mut key, req.select);
    key.push_str(if req.is_forward() { ".f " } else { ".b " });
    if let Some(index) = &req.index_name {
        key.push_str(index);
        key.push('#');
    }

    let hash_attr = &key_schema.hash_attribute;
    key.push_str(hash_attr);
    key.push('`');
    write_condition(&mut key, hash_attr, &req.key_conditions[hash_attr])?;
    if let Some(range_attr) = &key_schema.range_attribute {
        if let Some(cond) = req.key_conditions.get(range_attr) {
            key.push('&');
            key.push_str(range_attr);
            key.push('`');
            write_condition(&mut key, range_attr, cond)?;
        }
    }

    write_tail(
        &mut key,
        schema,
        req.index_name.as_deref(),
        Tail {
            projection: req.projection_expression.as_deref(),
            cursor: req.exclusive_start_key.as_ref(),
            filter: req.filter_expression.as_deref(),
            names: &req.expression_attribute_names,
            values: &req.expression_attribute_values,
            limit: req.limit,
        },
    )?;
    Ok(key)
}

/// Inner cache key for a scan.
pub fn scan_shape(schema: &TableSchema, req: &ScanRequest) -> Result<String> {
    target_key_schema(schema, req.index_name.as_deref())?;

    let mut key = String::new();
    write_select(&mut key, req.select);
    if let Some(index) = &req.index_name {
        key.push_str(index);
        key.push('#');
    }
    write_tail(
        &mut key,
        schema,
        req.index_name.as_deref(),
        Tail {
            projection: req.projection_expression.as_deref(),
            cursor: req.exclusive_start_key.as_ref(),
            filter: req.filter_expression.as_deref(),
            names: &req.expression_attribute_names,
            values: &req.expression_attribute_values,
            limit: req.limit,
        },
    )?;
    Ok(key)
}

struct Tail<'a> {
    projection: Option<&'a str>,
    cursor: Option<&'a Item>,
    filter: Option<&'a str>,
    names: &'a BTreeMap<String, String>,
    values: &'a BTreeMap<String, AttributeValue>,
    limit: Option<u32>,
}

fn write_tail(out: &mut String, schema: &TableSchema, index: Option<&str>, tail: Tail<'_>) -> Result<()> {
    if let Some(projection) = tail.projection {
        out.push('^');
        write_member(out, &resolve_expression(projection, tail.names, tail.values));
    }
    if let Some(cursor) = tail.cursor.filter(|c| !c.is_empty()) {
        out.push('@');
        write_member(out, &cursor_key(schema, index, cursor)?);
    }
    if let Some(filter) = tail.filter {
        out.push('?');
        write_member(out, &resolve_expression(filter, tail.names, tail.values));
    }
    if let Some(limit) = tail.limit {
        out.push('|');
        out.push_str(&limit.to_string());
    }
    Ok(())
}

fn write_select(out: &mut String, select: Option<Select>) {
    match select {
        Some(select) => out.push_str(select.as_str()),
        None => out.push('*'),
    }
}

fn write_condition(out: &mut String, attr: &str, cond: &Condition) -> Result<()> {
    let op = cond.comparison_operator;
    if cond.attribute_value_list.len() != op.arity() {
        return Err(CacheError::Encoding(format!(
            "condition {} on '{}' takes {} operand(s), got {}",
            op.as_str(),
            attr,
            op.arity(),
            cond.attribute_value_list.len()
        )));
    }
    out.push_str(op.as_str());
    out.push(' ');
    for (i, value) in cond.attribute_value_list.iter().enumerate() {
        if i > 0 {
            out.push('~');
        }
        write_member(out, &encode_value(value));
    }
    Ok(())
}

/// Continuation cursor, encoded as the table's item key followed by any
/// index key attributes the table key does not already cover.
fn cursor_key(schema: &TableSchema, index: Option<&str>, cursor: &Item) -> Result<String> {
    let mut key = item_key(&schema.table_name, cursor, &schema.key_schema)?;
    if index.is_some() {
        let index_schema = target_key_schema(schema, index)?;
        for attr in index_schema.attributes() {
            if !schema.key_schema.contains(attr) {
                key.push('/');
                write_key_part(&mut key, cursor, attr)?;
            }
        }
    }
    Ok(key)
}

// == Expressions ==
/// Substitutes `#name` and `:value` placeholders with their literals.
///
/// Placeholders are matched whole, so `:v1` never rewrites part of `:v10`.
/// Unknown placeholders are left as written. Values carry their type tag.
pub fn resolve_expression(
    expr: &str,
    names: &BTreeMap<String, String>,
    values: &BTreeMap<String, AttributeValue>,
) -> String {
    let mut out = String::with_capacity(expr.len());
    let mut rest = expr;

    while let Some(pos) = rest.find(|c: char| c == '#' || c == ':') {
        out.push_str(&rest[..pos]);
        let tail = &rest[pos + 1..];
        let len = tail
            .find(|c: char| !(c.is_ascii_alphanumeric() || c == '_'))
            .unwrap_or(tail.len());
        let placeholder = &rest[pos..pos + 1 + len];

        let replacement = if placeholder.starts_with('#') {
            names.get(placeholder).cloned()
        } else {
            values.get(placeholder).map(encode_tagged_value)
        };
        out.push_str(replacement.as_deref().unwrap_or(placeholder));
        rest = &rest[pos + 1 + len..];
    }
    out.push_str(rest);
    out
}
