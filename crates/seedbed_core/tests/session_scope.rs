use seedbed_core::{
    Column, DbError, Entity, EntityType, Row, Store, StoreConfig, StoreError, ValidationError,
};
use serde_json::{json, Value};
use std::sync::{Arc, Barrier};
use std::thread;

fn row(value: Value) -> Row {
    value.as_object().cloned().unwrap()
}

fn tags() -> EntityType {
    EntityType::builder("tags")
        .natural_key("label")
        .column(Column::integer("id").primary_key())
        .column(Column::text("label", 40).not_null().unique())
        .build()
        .unwrap()
}

#[test]
fn body_error_rolls_back_queued_and_flushed_rows() {
    let store = Store::connect(&StoreConfig::in_memory(), [tags()]).unwrap();
    store.init_db().unwrap();

    let result: Result<(), StoreError> = store.sessions().with_session(|session| {
        session.add(Entity::new("tags", row(json!({"label": "flushed"}))));
        session.flush()?;
        session.add(Entity::new("tags", row(json!({"label": "queued"}))));
        Err(StoreError::Db(DbError::InvalidIdentifier("boom".to_string())))
    });

    assert!(matches!(
        result,
        Err(StoreError::Db(DbError::InvalidIdentifier(ref name))) if name == "boom"
    ));
    assert_eq!(store.count_rows("tags").unwrap(), 0);
}

#[test]
fn queued_entities_are_written_when_scope_succeeds() {
    let config = StoreConfig::in_memory().with_echo_sql(true);
    let store = Store::connect(&config, [tags()]).unwrap();
    store.init_db().unwrap();

    store
        .sessions()
        .with_session(|session| {
            session.add_all([
                Entity::new("tags", row(json!({"label": "one"}))),
                Entity::new("tags", row(json!({"label": "two"}))),
            ]);
            assert_eq!(session.pending_count(), 2);
            Ok::<_, DbError>(())
        })
        .unwrap();

    assert_eq!(store.count_rows("tags").unwrap(), 2);
}

#[test]
fn failed_rollback_keeps_the_body_error() {
    let store = Store::connect(&StoreConfig::in_memory(), [tags()]).unwrap();
    store.init_db().unwrap();

    let result: Result<(), StoreError> = store.sessions().with_session(|session| {
        session.add(Entity::new("tags", row(json!({"label": "gone"}))));
        session.flush()?;
        session.execute_batch("ROLLBACK;")?;
        Err(StoreError::Db(DbError::InvalidIdentifier("body".to_string())))
    });

    assert!(matches!(
        result,
        Err(StoreError::Db(DbError::InvalidIdentifier(ref name))) if name == "body"
    ));
    assert_eq!(store.count_rows("tags").unwrap(), 0);
    store.insert("tags", row(json!({"label": "after"}))).unwrap();
    assert_eq!(store.count_rows("tags").unwrap(), 1);
}

#[test]
fn concurrent_batches_on_memory_store_all_commit() {
    let store = Arc::new(Store::connect(&StoreConfig::in_memory(), [tags()]).unwrap());
    store.init_db().unwrap();
    let barrier = Arc::new(Barrier::new(4));

    let workers = (0..4)
        .map(|worker| {
            let store = Arc::clone(&store);
            let barrier = Arc::clone(&barrier);
            thread::spawn(move || {
                let rows = (0..50).map(|index| row(json!({ "label": format!("m{worker}-{index}") })));
                barrier.wait();
                store.insert_many("tags", rows)
            })
        })
        .collect::<Vec<_>>();

    for handle in workers {
        assert_eq!(handle.join().unwrap().unwrap(), 50);
    }
    assert_eq!(store.count_rows("tags").unwrap(), 200);
}

#[test]
fn concurrent_duplicate_inserts_on_memory_store_keep_exactly_one_row() {
    let store = Arc::new(Store::connect(&StoreConfig::in_memory(), [tags()]).unwrap());
    store.init_db().unwrap();
    let barrier = Arc::new(Barrier::new(4));

    let workers = (0..4)
        .map(|_| {
            let store = Arc::clone(&store);
            let barrier = Arc::clone(&barrier);
            thread::spawn(move || {
                barrier.wait();
                store.insert("tags", row(json!({"label": "same"})))
            })
        })
        .collect::<Vec<_>>();

    let results = workers
        .into_iter()
        .map(|handle| handle.join().unwrap())
        .collect::<Vec<_>>();
    assert_eq!(results.iter().filter(|result| result.is_ok()).count(), 1);
    assert!(results
        .iter()
        .filter_map(|result| result.as_ref().err())
        .all(StoreError::is_validation));
    assert_eq!(store.count_rows("tags").unwrap(), 1);
}

#[test]
fn concurrent_batches_on_file_store_are_isolated() {
    let dir = tempfile::tempdir().unwrap();
    let url = format!("sqlite://{}", dir.path().join("tags.db").display());
    let store = Arc::new(Store::connect(&StoreConfig::new(url), [tags()]).unwrap());
    store.init_db().unwrap();

    let workers = (0..4)
        .map(|worker| {
            let store = Arc::clone(&store);
            thread::spawn(move || {
                let rows = (0..10).map(|index| row(json!({ "label": format!("w{worker}-{index}") })));
                store.insert_many("tags", rows).unwrap()
            })
        })
        .collect::<Vec<_>>();

    let inserted: usize = workers.into_iter().map(|handle| handle.join().unwrap()).sum();
    assert_eq!(inserted, 40);
    assert_eq!(store.count_rows("tags").unwrap(), 40);
}

#[test]
fn concurrent_duplicate_inserts_keep_exactly_one_row() {
    let dir = tempfile::tempdir().unwrap();
    let url = format!("sqlite://{}", dir.path().join("dupes.db").display());
    let store = Arc::new(Store::connect(&StoreConfig::new(url), [tags()]).unwrap());
    store.init_db().unwrap();

    let workers = (0..4)
        .map(|_| {
            let store = Arc::clone(&store);
            thread::spawn(move || store.insert("tags", row(json!({"label": "same"}))))
        })
        .collect::<Vec<_>>();

    let results = workers
        .into_iter()
        .map(|handle| handle.join().unwrap())
        .collect::<Vec<_>>();

    assert_eq!(results.iter().filter(|result| result.is_ok()).count(), 1);
    for err in results.into_iter().filter_map(Result::err) {
        assert!(matches!(
            err,
            StoreError::Validation(ValidationError::ElementAlreadyExists { .. })
        ));
    }
    assert_eq!(store.count_rows("tags").unwrap(), 1);
}
