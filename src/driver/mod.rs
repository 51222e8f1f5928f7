//! Driver Module
//!
//! 블로킹 클라이언트 API
//!
//! # Components
//!
//! - 연결: [`Connection`], [`ConnectionConfig`], [`Credentials`]
//! - 데이터베이스 관리: [`DatabaseManager`], [`Database`]
//! - 사용자 관리: [`UserManager`], [`User`]
//! - 트랜잭션: [`Transaction`], [`TransactionType`], [`TransactionState`]
//! - 쿼리: [`QueryExecution`], [`QueryAnswer`], [`ConceptRow`], [`ConceptDocument`]
//!
//! # Example
//!
//! ```no_run
//! use typedb_client::driver::{Connection, TransactionType};
//!
//! # fn main() -> typedb_client::driver::DriverResult<()> {
//! let connection = Connection::open("127.0.0.1:1729")?;
//! connection.databases().recreate("social")?;
//!
//! // 스키마 정의
//! let tx = connection.transaction("social", TransactionType::Schema)?;
//! tx.query("define entity person, owns name; attribute name, value string;")?.resolve()?;
//! tx.commit()?;
//!
//! // 데이터 쓰기
//! let tx = connection.transaction("social", TransactionType::Write)?;
//! tx.run("insert $p isa person, has name \"John\";")?;
//! tx.commit()?;
//!
//! // 조회
//! let tx = connection.transaction("social", TransactionType::Read)?;
//! for row in tx.run("match $p isa person, has name $n;")?.into_rows()? {
//!     let row = row?;
//!     println!("{}", row.get("n")?.map(|c| c.to_string()).unwrap_or_default());
//! }
//! # Ok(())
//! # }
//! ```

mod answer;
mod config;
mod connection;
mod database;
mod error;
mod query;
mod rpc;
mod transaction;
mod user;

// Re-exports
pub use answer::{ConceptDocument, ConceptDocumentIterator, ConceptRow, ConceptRowIterator, QueryAnswer};
pub use config::{ConnectionConfig, ConnectionConfigBuilder, Credentials, ServerAddress, DEFAULT_PORT};
pub use connection::Connection;
pub use database::{Database, DatabaseManager};
pub use error::{DriverError, DriverResult};
pub use query::{QueryExecution, QueryOptions, QueryType};
pub use transaction::{Transaction, TransactionOptions, TransactionState};
pub use user::{User, UserManager};
pub use crate::protocol::TransactionType;
