//! Invalidation planning
//!
//! Works out which query and scan groups a mutation of one item can affect.
//! Planning is pure; the proxy applies the plan to its grouped stores.

use crate::error::Result;
use crate::keys::{encode_key_value, GroupKey};
use crate::models::{Item, KeySchema, TableSchema};

/// What is known about the item a mutation touched.
#[derive(Debug, Clone, Copy)]
pub enum Snapshot<'a> {
    /// A complete image: an attribute it lacks is absent from the item.
    Full(&'a Item),
    /// A key or fragment: other attributes are unknown.
    Partial(&'a Item),
}

impl<'a> Snapshot<'a> {
    pub fn item(&self) -> &'a Item {
        match self {
            Snapshot::Full(item) | Snapshot::Partial(item) => item,
        }
    }

    pub fn is_partial(&self) -> bool {
        matches!(self, Snapshot::Partial(_))
    }
}

/// One query-group purge.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GroupSelector {
    Exact(GroupKey),
    /// Every group of the table (`index: None`) or of one index
    WholeIndex {
        table: String,
        index: Option<String>,
    },
}

impl GroupSelector {
    pub fn matches(&self, group: &GroupKey) -> bool {
        match self {
            GroupSelector::Exact(key) => key == group,
            GroupSelector::WholeIndex { table, index } => group.is_within(table, index.as_deref()),
        }
    }
}

/// Groups to purge for one snapshot.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InvalidationPlan {
    /// Every scan group of this table goes
    pub scan_table: String,
    pub query_groups: Vec<GroupSelector>,
}

impl InvalidationPlan {
    /// One `(event, group)` pair per purge, scans first, for debug logging.
    pub fn log_lines(&self) -> Vec<(&'static str, GroupKey)> {
        let mut lines = vec![("invalidate-scans", GroupKey::scan(&self.scan_table, None))];
        for selector in &self.query_groups {
            lines.push(match selector {
                GroupSelector::Exact(group) => ("invalidate", group.clone()),
                GroupSelector::WholeIndex { table, index } => {
                    ("invalidate-all", GroupKey::new(table, index.as_deref(), None))
                }
            });
        }
        lines
    }
}

// == Planning ==
/// Computes the purge set for a mutation of the item described by `snapshot`.
///
/// Scans of the table are always purged. Query groups are purged for the
/// table and for each secondary index the item can belong to. A partial
/// snapshot that does not reveal an index's hash value purges the whole index.
pub fn plan(schema: &TableSchema, snapshot: Snapshot<'_>) -> Result<InvalidationPlan> {
    let table = schema.table_name.as_str();
    let mut query_groups = Vec::new();

    if schema.key_schema.is_single_component() {
        query_groups.push(GroupSelector::Exact(GroupKey::new(table, None, None)));
    } else if let Some(selector) = hashed_group(table, None, &schema.key_schema, snapshot)? {
        query_groups.push(selector);
    }

    for gsi in &schema.global_indexes {
        let index = Some(gsi.index_name.as_str());
        if gsi.key_schema.is_single_component() {
            query_groups.push(GroupSelector::Exact(GroupKey::new(table, index, None)));
        } else if let Some(selector) = hashed_group(table, index, &gsi.key_schema, snapshot)? {
            query_groups.push(selector);
        }
    }

    for lsi in &schema.local_indexes {
        let index = Some(lsi.index_name.as_str());
        if let Some(selector) = hashed_group(table, index, &lsi.key_schema, snapshot)? {
            query_groups.push(selector);
        }
    }

    Ok(InvalidationPlan {
        scan_table: table.to_string(),
        query_groups,
    })
}

/// Group keyed by the snapshot's hash value for `key_schema`, if it has one.
fn hashed_group(
    table: &str,
    index: Option<&str>,
    key_schema: &KeySchema,
    snapshot: Snapshot<'_>,
) -> Result<Option<GroupSelector>> {
    let attr = &key_schema.hash_attribute;
    match snapshot.item().get(attr) {
        Some(value) if value.is_key_scalar() => {
            let hash = encode_key_value(attr, Some(value))?;
            Ok(Some(GroupSelector::Exact(GroupKey::new(table, index, Some(hash)))))
        }
        // A non-scalar value keeps the item out of the index.
        Some(_) => Ok(None),
        None if snapshot.is_partial() => Ok(Some(GroupSelector::WholeIndex {
            table: table.to_string(),
            index: index.map(str::to_string),
        })),
        None => Ok(None),
    }
}
