//! Behaviour of the caching proxy against a recording store
//!
//! Each test counts the calls that reach the backing store to check when the
//! proxy answers from cache and when it must go remote.

mod common;

use std::sync::Arc;
use std::time::Duration;

use common::{order, order_key, orders_schema, user, user_key, users_schema, RecordingStore};
use tablecache::models::{
    AttributeValue, BatchGetItemRequest, BatchWriteItemRequest, ComparisonOperator, Condition,
    DeleteItemRequest, GetItemRequest, KeysAndAttributes, PutItemRequest, QueryRequest,
    ReturnValues, ScanRequest, TransactPut, TransactUpdate, TransactWriteItem,
    TransactWriteItemsRequest, UpdateItemRequest, WriteRequest,
};
use tablecache::{CacheError, CachedTableStore, ProxySettings, RemoteError, TableStore};
use tokio_test::{assert_err, assert_ok};

type Proxy = CachedTableStore<Arc<RecordingStore>>;

// == Helper Functions ==

async fn setup(settings: ProxySettings) -> (Arc<RecordingStore>, Proxy) {
    let store = Arc::new(RecordingStore::with_tables().await);
    let proxy = CachedTableStore::new(store.clone(), settings);
    (store, proxy)
}

async fn seed_users(store: &RecordingStore) {
    for (id, name, team) in [("u1", "Ann", "red"), ("u2", "Bob", "red"), ("u3", "Cy", "blue")] {
        store
            .inner
            .put_item(PutItemRequest::new("users", user(id, name, team)))
            .await
            .unwrap();
    }
}

async fn seed_orders(store: &RecordingStore) {
    for (customer, id, placed) in [("c1", 1, 10), ("c1", 2, 20), ("c2", 1, 30)] {
        store
            .inner
            .put_item(PutItemRequest::new("orders", order(customer, id, placed)))
            .await
            .unwrap();
    }
}

fn team_query(team: &str) -> QueryRequest {
    QueryRequest::new("users")
        .on_index("by_team")
        .with_condition("team", Condition::eq(team))
}

fn customer_query(customer: &str) -> QueryRequest {
    QueryRequest::new("orders").with_condition("customer", Condition::eq(customer))
}

fn no_upgrade() -> ProxySettings {
    ProxySettings {
        upgrade_return_values: false,
        ..ProxySettings::default()
    }
}

// == Point Reads ==

#[tokio::test]
async fn test_repeated_get_goes_remote_once() {
    let (store, proxy) = setup(ProxySettings::default()).await;
    seed_users(&store).await;

    let first = proxy.get_item(GetItemRequest::new("users", user_key("u1"))).await.unwrap();
    let second = proxy.get_item(GetItemRequest::new("users", user_key("u1"))).await.unwrap();

    assert_eq!(first, second);
    assert_eq!(first.item.unwrap()["name"], AttributeValue::from("Ann"));
    assert_eq!(store.count("get_item"), 1);
    assert_eq!(store.count("describe_table"), 1);
}

#[tokio::test]
async fn test_missing_item_is_negatively_cached() {
    let (store, proxy) = setup(ProxySettings::default()).await;

    for _ in 0..3 {
        let out = proxy.get_item(GetItemRequest::new("users", user_key("ghost"))).await.unwrap();
        assert!(out.item.is_none());
    }
    assert_eq!(store.count("get_item"), 1);
}

#[tokio::test]
async fn test_put_replaces_absent_sentinel() {
    let (store, proxy) = setup(ProxySettings::default()).await;

    let miss = proxy.get_item(GetItemRequest::new("users", user_key("u5"))).await.unwrap();
    assert!(miss.item.is_none());
    proxy
        .put_item(PutItemRequest::new("users", user("u5", "Eli", "red")))
        .await
        .unwrap();
    store.reset_calls();

    let hit = proxy.get_item(GetItemRequest::new("users", user_key("u5"))).await.unwrap();
    assert_eq!(hit.item.unwrap()["name"], AttributeValue::from("Eli"));
    assert!(store.calls().is_empty());
}

#[tokio::test]
async fn test_separators_in_key_values_do_not_alias() {
    let (store, proxy) = setup(ProxySettings::default()).await;

    let first = common::item(&[
        ("customer", "c/order_id:1".into()),
        ("order_id", "2".into()),
    ]);
    let second = common::item(&[
        ("customer", "c".into()),
        ("order_id", "1/order_id:2".into()),
    ]);
    proxy.put_item(PutItemRequest::new("orders", first)).await.unwrap();

    let out = proxy.get_item(GetItemRequest::new("orders", second)).await.unwrap();
    assert!(out.item.is_none());
    assert_eq!(store.count("get_item"), 1);
}

#[tokio::test]
async fn test_consistent_get_always_goes_remote_but_populates() {
    let (store, proxy) = setup(ProxySettings::default()).await;
    seed_users(&store).await;

    let consistent = GetItemRequest::new("users", user_key("u1")).consistent();
    proxy.get_item(consistent.clone()).await.unwrap();
    proxy.get_item(consistent).await.unwrap();
    assert_eq!(store.count("get_item"), 2);

    proxy.get_item(GetItemRequest::new("users", user_key("u1"))).await.unwrap();
    assert_eq!(store.count("get_item"), 2);
}

#[tokio::test]
async fn test_projected_get_is_not_cached() {
    let (store, proxy) = setup(ProxySettings::default()).await;
    seed_users(&store).await;

    let mut req = GetItemRequest::new("users", user_key("u1"));
    req.projection_expression = Some("#n".to_string());
    req.expression_attribute_names.insert("#n".to_string(), "name".to_string());

    let out = proxy.get_item(req.clone()).await.unwrap();
    proxy.get_item(req).await.unwrap();
    assert_eq!(out.item.unwrap().len(), 1);
    assert_eq!(store.count("get_item"), 2);

    // The full item was never cached from the projection.
    let full = proxy.get_item(GetItemRequest::new("users", user_key("u1"))).await.unwrap();
    assert_eq!(full.item.unwrap().len(), 4);
}

#[tokio::test]
async fn test_item_ttl_expiry() {
    let (store, proxy) = setup(ProxySettings {
        item_ttl: Duration::from_millis(50),
        ..ProxySettings::default()
    })
    .await;
    seed_users(&store).await;

    proxy.get_item(GetItemRequest::new("users", user_key("u1"))).await.unwrap();
    tokio::time::sleep(Duration::from_millis(80)).await;
    proxy.get_item(GetItemRequest::new("users", user_key("u1"))).await.unwrap();
    assert_eq!(store.count("get_item"), 2);
}

#[tokio::test]
async fn test_item_capacity_evicts_least_recent() {
    let (store, proxy) = setup(ProxySettings {
        max_item_entries: 2,
        ..ProxySettings::default()
    })
    .await;
    seed_users(&store).await;

    for id in ["u1", "u2", "u3"] {
        proxy.get_item(GetItemRequest::new("users", user_key(id))).await.unwrap();
    }
    proxy.get_item(GetItemRequest::new("users", user_key("u3"))).await.unwrap();
    assert_eq!(store.count("get_item"), 3);

    proxy.get_item(GetItemRequest::new("users", user_key("u1"))).await.unwrap();
    assert_eq!(store.count("get_item"), 4);
}

// == Batch Reads ==

#[tokio::test]
async fn test_batch_get_only_requests_misses() {
    let (store, proxy) = setup(ProxySettings::default()).await;
    seed_users(&store).await;

    // u1 cached present, ghost cached absent
    proxy.get_item(GetItemRequest::new("users", user_key("u1"))).await.unwrap();
    proxy.get_item(GetItemRequest::new("users", user_key("ghost"))).await.unwrap();

    let mut req = BatchGetItemRequest::default();
    req.request_items.insert(
        "users".to_string(),
        KeysAndAttributes::new(vec![
            user_key("u1"),
            user_key("ghost"),
            user_key("u2"),
            user_key("nobody"),
        ]),
    );
    let out = proxy.batch_get_item(req).await.unwrap();

    let ids: Vec<&AttributeValue> = out.responses["users"].iter().map(|i| &i["id"]).collect();
    assert_eq!(ids, vec![&AttributeValue::from("u1"), &AttributeValue::from("u2")]);

    let sent = store.batch_gets();
    assert_eq!(sent.len(), 1);
    assert_eq!(
        sent[0].request_items["users"].keys,
        vec![user_key("u2"), user_key("nobody")]
    );

    // Both misses are now cached, including the absent one.
    proxy.get_item(GetItemRequest::new("users", user_key("u2"))).await.unwrap();
    let nobody = proxy.get_item(GetItemRequest::new("users", user_key("nobody"))).await.unwrap();
    assert!(nobody.item.is_none());
    assert_eq!(store.count("get_item"), 2);
}

#[tokio::test]
async fn test_batch_get_all_hits_makes_no_call() {
    let (store, proxy) = setup(ProxySettings::default()).await;
    seed_users(&store).await;
    proxy.get_item(GetItemRequest::new("users", user_key("u1"))).await.unwrap();

    let mut req = BatchGetItemRequest::default();
    req.request_items
        .insert("users".to_string(), KeysAndAttributes::new(vec![user_key("u1")]));
    let out = proxy.batch_get_item(req).await.unwrap();

    assert_eq!(out.responses["users"].len(), 1);
    assert_eq!(store.count("batch_get_item"), 0);
}

#[tokio::test]
async fn test_unprocessed_batch_keys_are_not_cached_absent() {
    let (store, proxy) = setup(ProxySettings::default()).await;
    seed_users(&store).await;
    store.withhold("u3");

    let mut req = BatchGetItemRequest::default();
    req.request_items.insert(
        "users".to_string(),
        KeysAndAttributes::new(vec![user_key("u1"), user_key("u3")]),
    );
    let out = proxy.batch_get_item(req).await.unwrap();
    assert_eq!(out.unprocessed_keys["users"].keys, vec![user_key("u3")]);

    store.release_all();
    let u3 = proxy.get_item(GetItemRequest::new("users", user_key("u3"))).await.unwrap();
    assert!(u3.item.is_some());
    assert_eq!(store.count("get_item"), 1);
}

// == Query and Scan ==

#[tokio::test]
async fn test_write_purges_only_its_hash_group() {
    let (store, proxy) = setup(ProxySettings::default()).await;
    seed_orders(&store).await;

    proxy.query(customer_query("c1")).await.unwrap();
    proxy.query(customer_query("c2")).await.unwrap();
    assert_eq!(store.count("query"), 2);

    proxy
        .put_item(PutItemRequest::new("orders", order("c1", 3, 40)))
        .await
        .unwrap();

    proxy.query(customer_query("c2")).await.unwrap();
    assert_eq!(store.count("query"), 2, "c2 is still cached");

    let c1 = proxy.query(customer_query("c1")).await.unwrap();
    assert_eq!(store.count("query"), 3);
    assert_eq!(c1.count, 3);
}

#[tokio::test]
async fn test_hash_only_table_query_purged_by_any_put() {
    let (store, proxy) = setup(ProxySettings::default()).await;
    seed_users(&store).await;

    let by_id = QueryRequest::new("users").with_condition("id", Condition::eq("u1"));
    proxy.query(by_id.clone()).await.unwrap();
    proxy
        .put_item(PutItemRequest::new("users", user("u42", "Max", "green")))
        .await
        .unwrap();

    proxy.query(by_id).await.unwrap();
    assert_eq!(store.count("query"), 2);
}

#[tokio::test]
async fn test_between_operands_with_separator_are_cached_apart() {
    let (store, proxy) = setup(ProxySettings::default()).await;
    seed_orders(&store).await;

    let range = |low: &str, high: &str| {
        customer_query("c1").with_condition("order_id", Condition::between(low, high))
    };
    proxy.query(range("a~b", "c")).await.unwrap();
    proxy.query(range("a", "b~c")).await.unwrap();
    assert_eq!(store.count("query"), 2);
}

#[tokio::test]
async fn test_local_index_group_is_purged() {
    let (store, proxy) = setup(ProxySettings::default()).await;
    seed_orders(&store).await;

    let placed = QueryRequest::new("orders")
        .on_index("by_placed")
        .with_condition("customer", Condition::eq("c1"))
        .with_condition(
            "placed",
            Condition::new(ComparisonOperator::Ge, vec![AttributeValue::from(15)]),
        );
    let before = proxy.query(placed.clone()).await.unwrap();
    assert_eq!(before.count, 1);

    proxy
        .update_item(UpdateItemRequest::new("orders", order_key("c1", 1)).set("placed", 99))
        .await
        .unwrap();

    let after = proxy.query(placed).await.unwrap();
    assert_eq!(store.count("query"), 2);
    assert_eq!(after.count, 2);
}

#[tokio::test]
async fn test_any_write_purges_table_scans() {
    let (store, proxy) = setup(ProxySettings::default()).await;
    seed_users(&store).await;
    seed_orders(&store).await;

    proxy.scan(ScanRequest::new("users")).await.unwrap();
    proxy.scan(ScanRequest::new("orders")).await.unwrap();
    proxy.scan(ScanRequest::new("users")).await.unwrap();
    assert_eq!(store.count("scan"), 2);

    proxy
        .put_item(PutItemRequest::new("users", user("u9", "Zed", "green")))
        .await
        .unwrap();

    let users = proxy.scan(ScanRequest::new("users")).await.unwrap();
    proxy.scan(ScanRequest::new("orders")).await.unwrap();
    assert_eq!(users.count, 4);
    assert_eq!(store.count("scan"), 3, "only the users scan is refetched");
}

#[tokio::test]
async fn test_query_pages_are_cached_separately() {
    let (store, proxy) = setup(ProxySettings::default()).await;
    seed_orders(&store).await;

    let first = proxy.query(customer_query("c1").with_limit(1)).await.unwrap();
    let mut next = customer_query("c1").with_limit(1);
    next.exclusive_start_key = first.last_evaluated_key.clone();
    let second = proxy.query(next.clone()).await.unwrap();
    assert_ne!(first.items, second.items);

    proxy.query(next).await.unwrap();
    assert_eq!(store.count("query"), 2);
}

// == Writes ==

#[tokio::test]
async fn test_delete_prefetches_when_old_image_unknown() {
    let (store, proxy) = setup(no_upgrade()).await;
    seed_users(&store).await;

    proxy.query(team_query("red")).await.unwrap();
    store.reset_calls();

    proxy
        .delete_item(DeleteItemRequest::new("users", user_key("u1")))
        .await
        .unwrap();

    assert_eq!(store.calls(), vec!["batch_get_item", "delete_item"]);
    let prefetch = &store.batch_gets()[0];
    assert!(prefetch.request_items["users"].consistent_read);

    // The prefetched image named the red group, so it was purged.
    let red = proxy.query(team_query("red")).await.unwrap();
    assert_eq!(store.count("query"), 1);
    assert_eq!(red.count, 1);

    let gone = proxy.get_item(GetItemRequest::new("users", user_key("u1"))).await.unwrap();
    assert!(gone.item.is_none());
    assert_eq!(store.count("get_item"), 0);
}

#[tokio::test]
async fn test_upgraded_delete_needs_no_prefetch() {
    let (store, proxy) = setup(ProxySettings::default()).await;
    seed_users(&store).await;
    proxy.query(team_query("red")).await.unwrap();
    store.reset_calls();

    let out = proxy
        .delete_item(DeleteItemRequest::new("users", user_key("u1")))
        .await
        .unwrap();

    assert!(out.attributes.is_none(), "old image is not leaked to the caller");
    assert_eq!(store.calls(), vec!["delete_item"]);
    proxy.query(team_query("red")).await.unwrap();
    assert_eq!(store.count("query"), 1);
}

#[tokio::test]
async fn test_update_moving_index_hash_purges_both_groups() {
    let (store, proxy) = setup(ProxySettings::default()).await;
    seed_users(&store).await;

    proxy.query(team_query("red")).await.unwrap();
    proxy.query(team_query("blue")).await.unwrap();
    assert_eq!(store.count("query"), 2);

    let out = proxy
        .update_item(UpdateItemRequest::new("users", user_key("u1")).set("team", "blue"))
        .await
        .unwrap();
    assert!(out.attributes.is_none());

    let red = proxy.query(team_query("red")).await.unwrap();
    let blue = proxy.query(team_query("blue")).await.unwrap();
    assert_eq!(store.count("query"), 4);
    assert_eq!(red.count, 1);
    assert_eq!(blue.count, 2);
}

#[tokio::test]
async fn test_update_without_new_image_evicts_item() {
    let (store, proxy) = setup(no_upgrade()).await;
    seed_users(&store).await;
    proxy.get_item(GetItemRequest::new("users", user_key("u1"))).await.unwrap();

    proxy
        .update_item(UpdateItemRequest::new("users", user_key("u1")).set("name", "Anna"))
        .await
        .unwrap();

    let fresh = proxy.get_item(GetItemRequest::new("users", user_key("u1"))).await.unwrap();
    assert_eq!(fresh.item.unwrap()["name"], AttributeValue::from("Anna"));
    assert_eq!(store.count("get_item"), 2);
}

#[tokio::test]
async fn test_update_returning_old_image_keeps_callers_choice() {
    let (store, proxy) = setup(ProxySettings::default()).await;
    seed_users(&store).await;

    let out = proxy
        .update_item(
            UpdateItemRequest::new("users", user_key("u1"))
                .set("name", "Anna")
                .returning(ReturnValues::AllOld),
        )
        .await
        .unwrap();
    assert_eq!(out.attributes.unwrap()["name"], AttributeValue::from("Ann"));
}

#[tokio::test]
async fn test_failed_write_leaves_cache_untouched() {
    let (store, proxy) = setup(ProxySettings::default()).await;
    seed_users(&store).await;
    proxy.get_item(GetItemRequest::new("users", user_key("u1"))).await.unwrap();

    store.fail_writes(true);
    let err = proxy
        .put_item(PutItemRequest::new("users", user("u1", "Changed", "red")))
        .await
        .unwrap_err();
    assert!(matches!(err, CacheError::Remote(RemoteError::Unavailable(_))));

    let cached = proxy.get_item(GetItemRequest::new("users", user_key("u1"))).await.unwrap();
    assert_eq!(cached.item.unwrap()["name"], AttributeValue::from("Ann"));
    assert_eq!(store.count("get_item"), 1);
}

#[tokio::test]
async fn test_key_without_schema_attributes_fails_before_remote_call() {
    let (store, proxy) = setup(ProxySettings::default()).await;

    let result = proxy.get_item(GetItemRequest::new("users", common::item(&[]))).await;
    assert!(matches!(result, Err(CacheError::Encoding(_))));
    assert_eq!(store.count("get_item"), 0);
}

#[tokio::test]
async fn test_unprocessed_batch_writes_keep_cached_state() {
    let (store, proxy) = setup(ProxySettings::default()).await;
    seed_users(&store).await;
    proxy.get_item(GetItemRequest::new("users", user_key("u1"))).await.unwrap();
    store.withhold("u1");

    let mut req = BatchWriteItemRequest::default();
    req.request_items.insert(
        "users".to_string(),
        vec![
            WriteRequest::put(user("u1", "Changed", "red")),
            WriteRequest::put(user("u7", "New", "blue")),
        ],
    );
    let out = proxy.batch_write_item(req).await.unwrap();
    assert_eq!(out.unprocessed_items["users"].len(), 1);
    store.release_all();

    let u1 = proxy.get_item(GetItemRequest::new("users", user_key("u1"))).await.unwrap();
    let u7 = proxy.get_item(GetItemRequest::new("users", user_key("u7"))).await.unwrap();
    assert_eq!(u1.item.unwrap()["name"], AttributeValue::from("Ann"));
    assert_eq!(u7.item.unwrap()["name"], AttributeValue::from("New"));
    assert_eq!(store.count("get_item"), 1, "both answered from cache");
}

#[tokio::test]
async fn test_unresolved_prefetch_purges_whole_index() {
    let (store, proxy) = setup(no_upgrade()).await;
    seed_users(&store).await;
    proxy.query(team_query("red")).await.unwrap();
    proxy.query(team_query("green")).await.unwrap();
    store.withhold("u1");

    assert_ok!(
        proxy
            .delete_item(DeleteItemRequest::new("users", user_key("u1")))
            .await
    );
    assert_eq!(store.count("batch_get_item"), 3, "prefetch retries unprocessed keys");

    proxy.query(team_query("green")).await.unwrap();
    assert_eq!(store.count("query"), 3, "unknown team: every team group is purged");
}

#[tokio::test]
async fn test_transaction_writes_update_caches() {
    let (store, proxy) = setup(ProxySettings::default()).await;
    seed_users(&store).await;
    proxy.get_item(GetItemRequest::new("users", user_key("u2"))).await.unwrap();
    proxy.query(team_query("red")).await.unwrap();

    let req = TransactWriteItemsRequest {
        transact_items: vec![
            TransactWriteItem::Put(TransactPut {
                table_name: "users".to_string(),
                item: user("u8", "Eve", "red"),
            }),
            TransactWriteItem::Update(TransactUpdate {
                table_name: "users".to_string(),
                key: user_key("u2"),
                attribute_updates: UpdateItemRequest::new("users", user_key("u2"))
                    .set("team", "blue")
                    .attribute_updates,
            }),
        ],
    };
    proxy.transact_write_items(req).await.unwrap();

    let u8 = proxy.get_item(GetItemRequest::new("users", user_key("u8"))).await.unwrap();
    assert!(u8.item.is_some());
    let u2 = proxy.get_item(GetItemRequest::new("users", user_key("u2"))).await.unwrap();
    assert_eq!(u2.item.unwrap()["team"], AttributeValue::from("blue"));
    assert_eq!(store.count("get_item"), 2, "u8 cached by the put, u2 evicted by the update");

    let red = proxy.query(team_query("red")).await.unwrap();
    assert_eq!(red.count, 2);
    assert_eq!(store.count("query"), 2);
}

#[tokio::test]
async fn test_failed_transaction_caches_nothing() {
    let (store, proxy) = setup(ProxySettings::default()).await;

    let put = |id: &str| {
        TransactWriteItem::Put(TransactPut {
            table_name: "users".to_string(),
            item: user(id, "X", "red"),
        })
    };
    let req = TransactWriteItemsRequest {
        transact_items: vec![put("u1"), put("u1")],
    };
    assert_err!(proxy.transact_write_items(req).await);

    let u1 = proxy.get_item(GetItemRequest::new("users", user_key("u1"))).await.unwrap();
    assert!(u1.item.is_none());
    assert_eq!(store.count("get_item"), 1);
}

// == Schema Cache ==

#[tokio::test]
async fn test_concurrent_misses_share_one_schema_fetch() {
    let (store, proxy) = setup(ProxySettings::default()).await;
    seed_users(&store).await;
    store.set_describe_delay(Duration::from_millis(50));
    let proxy = Arc::new(proxy);

    let handles: Vec<_> = ["u1", "u2", "u3", "u4", "u5", "u6"]
        .into_iter()
        .map(|id| {
            let proxy = proxy.clone();
            tokio::spawn(async move {
                proxy
                    .get_item(GetItemRequest::new("users", user_key(id)))
                    .await
            })
        })
        .collect();
    for handle in handles {
        assert_ok!(handle.await.unwrap());
    }

    assert_eq!(store.count("describe_table"), 1);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_late_callers_reuse_finished_schema_fetch() {
    let (store, proxy) = setup(ProxySettings::default()).await;
    seed_users(&store).await;
    store.set_describe_delay(Duration::from_millis(20));
    let proxy = Arc::new(proxy);

    // Arrivals straddle the moment the fetch completes and its slot is freed.
    let handles: Vec<_> = (0..40u64)
        .map(|i| {
            let proxy = proxy.clone();
            tokio::spawn(async move {
                tokio::time::sleep(Duration::from_millis(i)).await;
                proxy.describe_table("users").await
            })
        })
        .collect();
    for handle in handles {
        assert_ok!(handle.await.unwrap());
    }

    assert_eq!(store.count("describe_table"), 1);
}

#[tokio::test]
async fn test_cancelled_schema_fetch_is_retried() {
    let (store, proxy) = setup(ProxySettings::default()).await;
    store.set_describe_delay(Duration::from_millis(200));

    let cancelled = tokio::time::timeout(
        Duration::from_millis(20),
        proxy.get_item(GetItemRequest::new("users", user_key("u1"))),
    )
    .await;
    assert!(cancelled.is_err());

    store.set_describe_delay(Duration::ZERO);
    assert_ok!(proxy.describe_table("users").await);
    assert_eq!(store.count("describe_table"), 2);
}

#[tokio::test]
async fn test_schema_errors_are_shared_not_cached() {
    let (store, proxy) = setup(ProxySettings::default()).await;

    let err = proxy
        .get_item(GetItemRequest::new("missing", user_key("u1")))
        .await
        .unwrap_err();
    assert!(matches!(err, CacheError::Remote(RemoteError::ResourceNotFound(_))));
    assert_err!(proxy.describe_table("missing").await);
    assert_eq!(store.count("describe_table"), 2);
    assert_eq!(store.count("get_item"), 0);
}

#[tokio::test]
async fn test_describe_serves_schema_from_cache() {
    let (store, proxy) = setup(ProxySettings::default()).await;
    assert_eq!(proxy.describe_table("users").await.unwrap(), users_schema());
    assert_eq!(proxy.describe_table("orders").await.unwrap(), orders_schema());
    proxy.describe_table("users").await.unwrap();
    assert_eq!(store.count("describe_table"), 2);
}

// == Administration ==

#[tokio::test]
async fn test_allow_list_passes_other_tables_through() {
    let (store, proxy) = setup(ProxySettings::default()).await;
    seed_users(&store).await;
    proxy.allow("orders").await;

    proxy.get_item(GetItemRequest::new("users", user_key("u1"))).await.unwrap();
    proxy.get_item(GetItemRequest::new("users", user_key("u1"))).await.unwrap();
    proxy.put_item(PutItemRequest::new("users", user("u4", "Di", "red"))).await.unwrap();

    assert_eq!(store.count("get_item"), 2);
    assert_eq!(store.count("describe_table"), 0);
    assert_eq!(store.count("batch_get_item"), 0);
}

#[tokio::test]
async fn test_hit_ratio_counts_items_and_queries() {
    let (store, proxy) = setup(ProxySettings::default()).await;
    seed_users(&store).await;
    assert_eq!(proxy.hit_ratio().await, 0.0);

    // item: miss, hit, hit; query: miss, hit
    for _ in 0..3 {
        proxy.get_item(GetItemRequest::new("users", user_key("u1"))).await.unwrap();
    }
    for _ in 0..2 {
        proxy.query(team_query("red")).await.unwrap();
    }

    let ratio = proxy.hit_ratio().await;
    assert!((ratio - 0.6).abs() < 1e-9, "ratio was {}", ratio);

    proxy.purge_all().await;
    assert!((proxy.hit_ratio().await - 0.6).abs() < 1e-9);
    proxy.get_item(GetItemRequest::new("users", user_key("u1"))).await.unwrap();
    assert_eq!(store.count("get_item"), 2);
}

#[tokio::test]
async fn test_debug_logging_does_not_change_behaviour() {
    let (store, proxy) = setup(ProxySettings::default()).await;
    seed_users(&store).await;
    proxy.set_debug(true);

    proxy.get_item(GetItemRequest::new("users", user_key("u1"))).await.unwrap();
    proxy.get_item(GetItemRequest::new("users", user_key("u1"))).await.unwrap();
    proxy
        .update_item(UpdateItemRequest::new("users", user_key("u1")).set("team", "green"))
        .await
        .unwrap();

    assert_eq!(store.count("get_item"), 1);
    proxy.set_debug(false);
    assert!(!proxy.debug_enabled());
}
