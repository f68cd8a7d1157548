//! Transaction-wrapper semantics against the mock driver.

use querymap::mock::{MockDriver, MockHandle, MockResult};
use querymap::{Database, DbError, DbResult, Dialect, Options, spec};

fn open() -> (Database, MockHandle) {
    let (driver, handle) = MockDriver::new();
    let db = Database::open(driver, Options::new(Dialect::Sqlite)).unwrap();
    (db, handle)
}

#[test]
fn commit_on_ok() -> DbResult<()> {
    let (mut db, handle) = open();
    let inserted = db.action(|db| {
        db.insert("accounts", spec! { "owner" => "ann", "balance" => 100 })?;
        db.insert("accounts", spec! { "owner" => "bob", "balance" => 50 })
    })?;
    assert_eq!(inserted, 0); // mock default result
    assert_eq!(handle.transactions(), vec!["BEGIN", "COMMIT"]);
    assert_eq!(handle.statements().len(), 2);
    Ok(())
}

#[test]
fn rollback_on_execution_failure() {
    let (mut db, handle) = open();
    handle.push_result(MockResult::error("constraint violated"));
    let err = db
        .action(|db| db.insert("accounts", spec! { "owner" => "ann" }))
        .unwrap_err();
    assert!(err.is_execution());
    assert_eq!(handle.transactions(), vec!["BEGIN", "ROLLBACK"]);
    assert_eq!(db.error(), Some("constraint violated"));
}

#[test]
fn rollback_on_unit_of_work_failure_signal() {
    let (mut db, handle) = open();
    let err = db
        .action(|db| -> DbResult<u64> {
            db.insert("accounts", spec! { "owner" => "ann" })?;
            // The unit of work decides the outcome is unacceptable.
            Err(DbError::compile("insufficient funds"))
        })
        .unwrap_err();
    assert!(err.is_compile());
    assert_eq!(handle.transactions(), vec!["BEGIN", "ROLLBACK"]);
}

#[test]
fn only_one_transaction_per_connection() {
    let (mut db, _handle) = open();
    let err = db.action(|db| db.action(|_| Ok(()))).unwrap_err();
    assert!(matches!(err, DbError::Transaction(_)));
}

#[test]
fn connection_is_usable_after_rollback() -> DbResult<()> {
    let (mut db, handle) = open();
    let _ = db.action(|_| -> DbResult<()> { Err(DbError::compile("abort")) });
    db.select("accounts", "*", None)?;
    assert_eq!(
        handle.transactions(),
        vec!["BEGIN", "ROLLBACK"]
    );
    assert!(handle.last_sql().unwrap().starts_with("SELECT"));
    Ok(())
}
