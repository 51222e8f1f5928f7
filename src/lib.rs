//! # TypeDB Client
//!
//! A blocking Rust client for concept-oriented databases that speak the
//! TypeQL query protocol.
//!
//! ## Features
//!
//! - **Blocking API** - Every call returns once the server answered; no async runtime required
//! - **Multiplexed connection** - Many transactions share one socket, correlated by request id
//! - **Transactions** - READ, WRITE and SCHEMA transactions with an explicit state machine
//! - **Lazy answers** - Rows and documents are pulled from the server in prefetch batches
//! - **Typed concepts** - Entities, relations, attributes and values with checked conversion
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use typedb_client::{Connection, DriverResult, TransactionType};
//!
//! fn main() -> DriverResult<()> {
//!     let connection = Connection::open("127.0.0.1:1729")?;
//!
//!     let databases = connection.databases();
//!     if !databases.contains("social")? {
//!         databases.create("social")?;
//!     }
//!
//!     let tx = connection.transaction("social", TransactionType::Schema)?;
//!     tx.run("define entity person, owns name, owns age; \
//!             attribute name, value string; attribute age, value long;")?;
//!     tx.commit()?;
//!
//!     let tx = connection.transaction("social", TransactionType::Write)?;
//!     tx.run("insert $p isa person, has name \"John\", has age 15;")?;
//!     tx.commit()?;
//!
//!     connection.close()
//! }
//! ```
//!
//! ## Reading Rows
//!
//! ```rust,no_run
//! # use typedb_client::{Connection, TransactionType};
//! # fn example() -> typedb_client::DriverResult<()> {
//! # let connection = Connection::open("127.0.0.1:1729")?;
//! let tx = connection.transaction("social", TransactionType::Read)?;
//! let rows = tx.query("match $p isa person, has age $a;")?.resolve()?.into_rows()?;
//! for row in rows {
//!     let age: i64 = row?.get_value("a")?;
//!     println!("age = {}", age);
//! }
//! # Ok(())
//! # }
//! ```
//!
//! ## Fetching Documents
//!
//! ```rust,no_run
//! # use typedb_client::{Connection, TransactionType};
//! # fn example() -> typedb_client::DriverResult<()> {
//! # let connection = Connection::open("127.0.0.1:1729")?;
//! let documents: Vec<serde_json::Value> = connection.with_transaction("social", TransactionType::Read, |tx| {
//!     tx.run("match $p isa person; fetch { \"name\": $p.name };")?
//!         .into_documents()?
//!         .map(|document| document.map(|d| d.into_json()))
//!         .collect()
//! })?;
//! # Ok(())
//! # }
//! ```
//!
//! ## Configuration
//!
//! ```rust
//! use typedb_client::{ConnectionConfig, Credentials};
//! use std::time::Duration;
//!
//! let config = ConnectionConfig::builder("db.internal:1729")
//!     .unwrap()
//!     .with_credentials(Credentials::new("admin", "password"))
//!     .with_connection_timeout(Duration::from_secs(5))
//!     .with_request_timeout(Duration::from_secs(30))
//!     .build();
//! assert!(config.validate().is_ok());
//! ```
//!
//! ## Error Handling
//!
//! ```rust,no_run
//! use typedb_client::{Connection, DriverError};
//!
//! match Connection::open("localhost") {
//!     Ok(_) => println!("Connected!"),
//!     Err(DriverError::Connection(msg)) => eprintln!("Connection failed: {}", msg),
//!     Err(e) => eprintln!("Error: {}", e),
//! }
//! ```
//!
//! ## Modules
//!
//! - [`driver`] - Connection, database and user registries, transactions and answers
//! - [`concept`] - Concepts and values carried by answers
//! - [`protocol`] - Wire messages and framing
//!

#![cfg_attr(docsrs, feature(doc_cfg))]
#![warn(missing_docs)]
#![warn(rustdoc::missing_crate_level_docs)]

pub mod concept;
pub mod driver;
pub mod protocol;

// Re-exports for convenience
pub use concept::{Concept, Node, Value, ValueType};
pub use driver::{
    ConceptDocument, ConceptDocumentIterator, ConceptRow, ConceptRowIterator, Connection,
    ConnectionConfig, ConnectionConfigBuilder, Credentials, Database, DatabaseManager,
    DriverError, DriverResult, QueryAnswer, QueryExecution, QueryOptions, QueryType,
    ServerAddress, Transaction, TransactionOptions, TransactionState, TransactionType, User,
    UserManager,
};
