//! Database Registry
//!
//! 데이터베이스 생성, 조회, 삭제

use std::fmt;
use std::sync::Arc;

use tracing::debug;

use super::connection::{unexpected_response, ConnectionShared};
use super::error::{DriverError, DriverResult};
use crate::protocol::{Request, Response};

fn check_name(name: &str) -> DriverResult<()> {
    if name.is_empty() {
        Err(DriverError::configuration("database name must not be empty"))
    } else {
        Ok(())
    }
}

// ============================================================================
// DatabaseManager - 데이터베이스 관리자
// ============================================================================

/// 데이터베이스 관리자
///
/// 같은 연결에서 나온 관리 연산은 하나씩 실행되므로, 테스트 준비 코드가
/// 서로 경쟁해 "이미 존재"와 "없음"을 동시에 보는 일이 없습니다.
#[derive(Clone)]
pub struct DatabaseManager {
    connection: Arc<ConnectionShared>,
}

impl DatabaseManager {
    pub(crate) fn new(connection: Arc<ConnectionShared>) -> Self {
        Self { connection }
    }

    /// 존재 여부
    pub fn contains(&self, name: &str) -> DriverResult<bool> {
        check_name(name)?;
        self.connection.ensure_open()?;
        let _guard = self.connection.registry_lock();
        self.contains_locked(name)
    }

    /// 생성 (이미 있으면 `DatabaseExists`)
    pub fn create(&self, name: &str) -> DriverResult<()> {
        check_name(name)?;
        self.connection.ensure_open()?;
        let _guard = self.connection.registry_lock();
        self.create_locked(name)
    }

    /// 조회 (없으면 `DatabaseNotFound`)
    pub fn get(&self, name: &str) -> DriverResult<Database> {
        check_name(name)?;
        self.connection.ensure_open()?;
        let _guard = self.connection.registry_lock();

        let request = Request::DatabasesGet { name: name.to_string() };
        match self.connection.request(request)? {
            Response::Database { name } => Ok(Database::new(name, Arc::clone(&self.connection))),
            other => Err(unexpected_response("DATABASE", &other)),
        }
    }

    /// 전체 목록
    pub fn all(&self) -> DriverResult<Vec<Database>> {
        self.connection.ensure_open()?;
        let _guard = self.connection.registry_lock();

        match self.connection.request(Request::DatabasesAll)? {
            Response::Databases { names } => Ok(names
                .into_iter()
                .map(|name| Database::new(name, Arc::clone(&self.connection)))
                .collect()),
            other => Err(unexpected_response("DATABASES", &other)),
        }
    }

    /// 있으면 삭제한 뒤 새로 생성
    ///
    /// 삭제와 생성 사이에 같은 연결의 다른 관리 연산이 끼어들지 않습니다.
    pub fn recreate(&self, name: &str) -> DriverResult<Database> {
        check_name(name)?;
        self.connection.ensure_open()?;
        let _guard = self.connection.registry_lock();

        if self.contains_locked(name)? {
            delete_locked(&self.connection, name)?;
        }
        self.create_locked(name)?;
        Ok(Database::new(name.to_string(), Arc::clone(&self.connection)))
    }

    fn contains_locked(&self, name: &str) -> DriverResult<bool> {
        let request = Request::DatabasesContains { name: name.to_string() };
        match self.connection.request(request)? {
            Response::Contains { value } => Ok(value),
            other => Err(unexpected_response("CONTAINS", &other)),
        }
    }

    fn create_locked(&self, name: &str) -> DriverResult<()> {
        let request = Request::DatabasesCreate { name: name.to_string() };
        match self.connection.request(request)? {
            Response::Done => {
                debug!(database = name, "database created");
                Ok(())
            }
            other => Err(unexpected_response("DONE", &other)),
        }
    }
}

impl fmt::Debug for DatabaseManager {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DatabaseManager")
            .field("address", &self.connection.config().address)
            .finish()
    }
}

fn delete_locked(connection: &ConnectionShared, name: &str) -> DriverResult<()> {
    let request = Request::DatabaseDelete { name: name.to_string() };
    match connection.request(request)? {
        Response::Done => {
            debug!(database = name, "database deleted");
            Ok(())
        }
        other => Err(unexpected_response("DONE", &other)),
    }
}

// ============================================================================
// Database - 데이터베이스
// ============================================================================

/// 이름이 붙은 데이터베이스 핸들
#[derive(Clone)]
pub struct Database {
    name: String,
    connection: Arc<ConnectionShared>,
}

impl Database {
    fn new(name: String, connection: Arc<ConnectionShared>) -> Self {
        Self { name, connection }
    }

    /// 이름
    pub fn name(&self) -> &str {
        &self.name
    }

    /// 삭제 (동시에 삭제되었으면 `DatabaseNotFound`)
    pub fn delete(self) -> DriverResult<()> {
        self.connection.ensure_open()?;
        let _guard = self.connection.registry_lock();
        delete_locked(&self.connection, &self.name)
    }

    /// 스키마 전체 (define 쿼리 텍스트)
    pub fn schema(&self) -> DriverResult<String> {
        self.fetch_schema(Request::DatabaseSchema { name: self.name.clone() })
    }

    /// 타입 스키마 (define 쿼리 텍스트)
    pub fn type_schema(&self) -> DriverResult<String> {
        self.fetch_schema(Request::DatabaseTypeSchema { name: self.name.clone() })
    }

    fn fetch_schema(&self, request: Request) -> DriverResult<String> {
        self.connection.ensure_open()?;
        match self.connection.request(request)? {
            Response::Schema { schema } => Ok(schema),
            other => Err(unexpected_response("SCHEMA", &other)),
        }
    }
}

impl fmt::Debug for Database {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Database").field("name", &self.name).finish()
    }
}

impl fmt::Display for Database {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.name)
    }
}
