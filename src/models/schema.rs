//! Table and index key schemas

use serde::{Deserialize, Serialize};

/// Hash attribute plus optional range attribute.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct KeySchema {
    pub hash_attribute: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub range_attribute: Option<String>,
}

impl KeySchema {
    pub fn new(hash_attribute: impl Into<String>, range_attribute: Option<&str>) -> Self {
        Self {
            hash_attribute: hash_attribute.into(),
            range_attribute: range_attribute.map(str::to_string),
        }
    }

    /// True when the schema has only a hash attribute.
    pub fn is_single_component(&self) -> bool {
        self.range_attribute.is_none()
    }

    /// Key attribute names in schema order.
    pub fn attributes(&self) -> impl Iterator<Item = &str> {
        std::iter::once(self.hash_attribute.as_str()).chain(self.range_attribute.as_deref())
    }

    pub fn contains(&self, attribute: &str) -> bool {
        self.attributes().any(|a| a == attribute)
    }
}

/// A secondary index over a table.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct IndexSchema {
    pub index_name: String,
    pub key_schema: KeySchema,
}

impl IndexSchema {
    pub fn new(index_name: impl Into<String>, key_schema: KeySchema) -> Self {
        Self {
            index_name: index_name.into(),
            key_schema,
        }
    }
}

// == Table Schema ==
/// Key layout of a table and its secondary indexes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct TableSchema {
    pub table_name: String,
    pub key_schema: KeySchema,
    #[serde(default)]
    pub global_indexes: Vec<IndexSchema>,
    #[serde(default)]
    pub local_indexes: Vec<IndexSchema>,
}

impl TableSchema {
    pub fn new(table_name: impl Into<String>, key_schema: KeySchema) -> Self {
        Self {
            table_name: table_name.into(),
            key_schema,
            global_indexes: Vec::new(),
            local_indexes: Vec::new(),
        }
    }

    pub fn with_global_index(mut self, index: IndexSchema) -> Self {
        self.global_indexes.push(index);
        self
    }

    pub fn with_local_index(mut self, index: IndexSchema) -> Self {
        self.local_indexes.push(index);
        self
    }

    /// Looks up a global or local index by name.
    pub fn index(&self, name: &str) -> Option<&IndexSchema> {
        self.global_indexes
            .iter()
            .chain(self.local_indexes.iter())
            .find(|idx| idx.index_name == name)
    }

    pub fn has_secondary_indexes(&self) -> bool {
        !self.global_indexes.is_empty() || !self.local_indexes.is_empty()
    }
}
