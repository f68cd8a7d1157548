//! # querymap
//!
//! A nested-map dynamic SQL compiler and micro result-mapper.
//!
//! Declarative query specifications (insertion-ordered maps of condition,
//! column, and join entries) compile into dialect-correct parameterized SQL
//! for six backends: MySQL, PostgreSQL, SQLite, MSSQL, Oracle, and Sybase.
//! Statements run through an abstract driver interface, and flat result rows
//! decode back into typed, possibly nested records.
//!
//! ## Features
//!
//! - **One specification language**: condition trees with operator suffixes
//!   (`age[>=]`, `name[~]`), nested `AND`/`OR` groups, column specs with
//!   aliases and type tags, join specs with direction tokens
//! - **Dialect-correct output**: quoting, LIMIT/OFFSET, full-text MATCH, and
//!   regex comparisons all follow the connection's [`Dialect`]
//! - **Parameterized throughout**: every literal binds through a named
//!   placeholder; identifiers pass a strict validation grammar
//! - **Raw escape hatch**: [`Raw`] fragments carry hand-written SQL with
//!   their own parameters and `<identifier>` markers
//! - **Driver-agnostic**: bring any backend that can prepare, bind, execute,
//!   and fetch; a scriptable [`mock`] driver ships for tests
//!
//! ## Example
//!
//! ```
//! use querymap::mock::MockDriver;
//! use querymap::{Database, Dialect, Options, seq, spec};
//!
//! # fn main() -> querymap::DbResult<()> {
//! let (driver, handle) = MockDriver::new();
//! let mut db = Database::open(driver, Options::new(Dialect::Postgres))?;
//!
//! db.select(
//!     "users",
//!     seq!["id[Int]", "name"],
//!     Some(&spec! {
//!         "status" => "active",
//!         "age[>=]" => 21,
//!         "ORDER" => "name",
//!         "LIMIT" => 10,
//!     }),
//! )?;
//!
//! assert_eq!(
//!     handle.last_sql().unwrap(),
//!     "SELECT \"id\", \"name\" FROM \"users\" \
//!      WHERE \"status\" = :p0 AND \"age\" >= :p1 ORDER BY \"name\" LIMIT 10"
//! );
//! # Ok(()) }
//! ```

pub mod bind;
pub mod clause;
pub mod client;
pub mod condition;
pub mod dialect;
pub mod driver;
pub mod error;
pub mod ident;
pub mod join;
pub mod mock;
pub mod projection;
pub mod raw;
pub mod syntax;
pub mod value;

mod executor;
mod row;

pub use client::{Database, Options};
pub use dialect::Dialect;
pub use driver::{Driver, DriverError, Row, Statement};
pub use error::{DbError, DbResult};
pub use ident::Quoter;
pub use raw::Raw;
pub use value::{BindKind, BoundParam, Map, Value};
