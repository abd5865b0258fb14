//! Pre-mutation prefetch
//!
//! Before a write whose effect on secondary indexes is unknown, the current
//! images of the affected items are read with strong consistency and used to
//! purge the groups those items sit in now. The images are kept and purged
//! again once the write has gone through.

use std::collections::{BTreeMap, HashMap, HashSet};
use std::sync::Arc;

use tracing::{debug, warn};

use super::{CachedTableStore, Snapshot};
use crate::backend::TableStore;
use crate::error::Result;
use crate::keys::{item_key, key_only};
use crate::models::{BatchGetItemRequest, Item, KeysAndAttributes, TableSchema};

/// Keys per batch read
const PREFETCH_CHUNK: usize = 100;

/// Batch reads per chunk, counting re-requests of unprocessed keys
const PREFETCH_ATTEMPTS: usize = 3;

// == Prefetch Set ==
/// Keys to prefetch, deduplicated by item key.
#[derive(Debug, Default)]
pub struct PrefetchSet {
    keys: Vec<(Arc<TableSchema>, Item)>,
    seen: HashSet<String>,
}

impl PrefetchSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds the key of `item` (a key or a full item).
    pub fn add(&mut self, schema: &Arc<TableSchema>, item: &Item) -> Result<()> {
        let key = item_key(&schema.table_name, item, &schema.key_schema)?;
        if self.seen.insert(key) {
            self.keys
                .push((schema.clone(), key_only(item, &schema.key_schema)));
        }
        Ok(())
    }

    pub fn len(&self) -> usize {
        self.keys.len()
    }

    pub fn is_empty(&self) -> bool {
        self.keys.is_empty()
    }
}

/// A current item image read ahead of a write.
#[derive(Debug, Clone)]
pub struct PrefetchedImage {
    pub schema: Arc<TableSchema>,
    /// Item key of the image
    pub key: String,
    pub item: Item,
}

impl<S: TableStore> CachedTableStore<S> {
    // == Prefetch ==
    /// Reads the current images of every key in `set` and purges the groups
    /// they belong to.
    ///
    /// Keys the store still reports unprocessed after the last attempt are
    /// purged as partial snapshots. Keys with no stored item are skipped.
    pub(crate) async fn prefetch(&self, op: &str, set: PrefetchSet) -> Result<Vec<PrefetchedImage>> {
        let mut images = Vec::new();
        if set.is_empty() {
            return Ok(images);
        }
        debug!("Prefetching {} keys before {}", set.len(), op);

        let schemas: HashMap<String, Arc<TableSchema>> = set
            .keys
            .iter()
            .map(|(schema, _)| (schema.table_name.clone(), schema.clone()))
            .collect();

        for chunk in set.keys.chunks(PREFETCH_CHUNK) {
            let mut pending = BatchGetItemRequest::default();
            for (schema, key) in chunk {
                pending
                    .request_items
                    .entry(schema.table_name.clone())
                    .or_insert_with(|| consistent(Vec::new()))
                    .keys
                    .push(key.clone());
            }

            for attempt in 1..=PREFETCH_ATTEMPTS {
                let out = self.inner.batch_get_item(pending).await?;

                for (table, items) in out.responses {
                    let Some(schema) = schemas.get(&table) else {
                        continue;
                    };
                    for item in items {
                        self.invalidate(op, schema, Snapshot::Full(&item)).await?;
                        images.push(PrefetchedImage {
                            schema: schema.clone(),
                            key: item_key(&table, &item, &schema.key_schema)?,
                            item,
                        });
                    }
                }

                pending = BatchGetItemRequest {
                    request_items: out
                        .unprocessed_keys
                        .into_iter()
                        .map(|(table, kaa)| (table, consistent(kaa.keys)))
                        .collect::<BTreeMap<_, _>>(),
                };
                if pending.request_items.is_empty() {
                    break;
                }
                debug!(
                    "Prefetch attempt {} left {} tables unprocessed",
                    attempt,
                    pending.request_items.len()
                );
            }

            for (table, kaa) in &pending.request_items {
                let Some(schema) = schemas.get(table) else {
                    continue;
                };
                warn!(
                    "Prefetch gave up on {} keys of {}, purging their indexes wholesale",
                    kaa.keys.len(),
                    table
                );
                for key in &kaa.keys {
                    self.invalidate(op, schema, Snapshot::Partial(key)).await?;
                }
            }
        }
        Ok(images)
    }

    // == Replay ==
    /// Purges the groups of prefetched images again after the write, except
    /// for keys in `skip`.
    pub(crate) async fn replay(
        &self,
        op: &str,
        images: &[PrefetchedImage],
        skip: &HashSet<String>,
    ) -> Result<()> {
        for image in images.iter().filter(|image| !skip.contains(&image.key)) {
            self.invalidate(op, &image.schema, Snapshot::Full(&image.item))
                .await?;
        }
        Ok(())
    }
}

fn consistent(keys: Vec<Item>) -> KeysAndAttributes {
    KeysAndAttributes {
        keys,
        consistent_read: true,
        ..KeysAndAttributes::default()
    }
}
