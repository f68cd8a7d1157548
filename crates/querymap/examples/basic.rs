//! Compile a few queries against the mock driver and print the SQL the
//! backend would receive.

use querymap::mock::{MockDriver, MockResult};
use querymap::{Database, DbResult, Dialect, Options, Raw, Value, seq, spec};

fn main() -> DbResult<()> {
    let (driver, handle) = MockDriver::new();
    let mut db = Database::open(
        driver,
        Options::new(Dialect::MySql).prefix("app_").logging(true),
    )?;

    handle.push_result(MockResult::rows(vec![
        spec! { "id" => 1, "name" => "ann", "settings" => r#"{"theme":"dark"}"# },
    ]));
    let users = db.select(
        "users",
        seq!["id[Int]", "name", "settings[JSON]"],
        Some(&spec! {
            "status" => "active",
            "age[>=]" => 21,
            "name[~]" => "an",
            "ORDER" => Value::Map(spec! { "id" => "DESC" }),
            "LIMIT" => 10,
        }),
    )?;
    println!("sent:    {}", handle.last_sql().unwrap());
    println!("decoded: {users:?}");

    db.insert(
        "users",
        seq![
            Value::Map(spec! { "name" => "carol", "email" => "c@example.org" }),
            Value::Map(spec! { "name" => "dave" }),
        ],
    )?;
    println!("sent:    {}", handle.last_sql().unwrap());

    db.update(
        "users",
        &spec! { "visits[+]" => 1, "seen_at" => Raw::new("NOW()") },
        Some(&spec! { "id" => 1 }),
    )?;
    println!("sent:    {}", handle.last_sql().unwrap());

    println!("log:");
    for entry in db.log() {
        println!("  {entry}");
    }
    Ok(())
}
