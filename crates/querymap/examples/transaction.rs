//! Run a unit of work under the transaction wrapper.

use querymap::mock::MockDriver;
use querymap::{Database, DbError, DbResult, Dialect, Options, spec};

fn main() -> DbResult<()> {
    let (driver, handle) = MockDriver::new();
    let mut db = Database::open(driver, Options::new(Dialect::Postgres))?;

    // Commits: both statements run inside BEGIN … COMMIT.
    db.action(|db| {
        db.insert("accounts", spec! { "owner" => "ann", "balance" => 100 })?;
        db.insert("accounts", spec! { "owner" => "bob", "balance" => 50 })
    })?;
    println!("after success: {:?}", handle.transactions());

    // Rolls back: the unit of work signals failure.
    let outcome = db.action(|db| -> DbResult<u64> {
        db.update(
            "accounts",
            &spec! { "balance[-]" => 500 },
            Some(&spec! { "owner" => "ann" }),
        )?;
        Err(DbError::compile("insufficient funds"))
    });
    println!("after failure: {outcome:?}");
    println!("events:        {:?}", handle.transactions());
    Ok(())
}
