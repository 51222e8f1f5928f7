//! Transaction API
//!
//! 트랜잭션 상태 머신
//!
//! ```text
//!            commit()            rollback()           close() / drop
//!   OPEN ─────────────▶ COMMITTED   OPEN ─────▶ ROLLED_BACK   OPEN ─────▶ CLOSED
//! ```
//!
//! 종료 상태에서는 쿼리, 커밋, 롤백이 모두 거부됩니다. `close()`는
//! 어떤 상태에서든 호출할 수 있고 여러 번 호출해도 안전합니다.

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use parking_lot::{Mutex, MutexGuard};
use tracing::{debug, warn};

use super::answer::QueryAnswer;
use super::connection::{unexpected_response, ConnectionShared, SHUTDOWN_GRACE};
use super::error::{DriverError, DriverResult};
use super::query::{QueryExecution, QueryOptions};
use crate::protocol::{Request, Response, TransactionId, TransactionParameters, TransactionType};

// ============================================================================
// TransactionOptions - 트랜잭션 옵션
// ============================================================================

/// 트랜잭션 옵션
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TransactionOptions {
    /// 서버 측 트랜잭션 타임아웃
    pub transaction_timeout: Option<Duration>,
    /// 스키마 락 획득 타임아웃
    pub schema_lock_acquire_timeout: Option<Duration>,
}

impl TransactionOptions {
    /// 기본 옵션
    pub fn new() -> Self {
        Self::default()
    }

    /// 트랜잭션 타임아웃 설정
    pub fn with_transaction_timeout(mut self, timeout: Duration) -> Self {
        self.transaction_timeout = Some(timeout);
        self
    }

    /// 스키마 락 타임아웃 설정
    pub fn with_schema_lock_acquire_timeout(mut self, timeout: Duration) -> Self {
        self.schema_lock_acquire_timeout = Some(timeout);
        self
    }

    /// 옵션 검증 (타임아웃은 최소 1ms)
    pub fn validate(&self) -> DriverResult<()> {
        let too_short = |timeout: Option<Duration>| timeout.map_or(false, |t| t.as_millis() < 1);
        if too_short(self.transaction_timeout) {
            return Err(DriverError::configuration(
                "transaction timeout must be at least 1 millisecond",
            ));
        }
        if too_short(self.schema_lock_acquire_timeout) {
            return Err(DriverError::configuration(
                "schema lock acquire timeout must be at least 1 millisecond",
            ));
        }
        Ok(())
    }

    pub(crate) fn to_parameters(&self) -> TransactionParameters {
        let millis = |timeout: Option<Duration>| timeout.map(|t| t.as_millis() as u64);
        TransactionParameters {
            transaction_timeout_millis: millis(self.transaction_timeout),
            schema_lock_acquire_timeout_millis: millis(self.schema_lock_acquire_timeout),
        }
    }
}

// ============================================================================
// TransactionState - 트랜잭션 상태
// ============================================================================

/// 트랜잭션 상태
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TransactionState {
    /// 활성 상태
    Open,
    /// 커밋됨
    Committed,
    /// 롤백됨
    RolledBack,
    /// 닫힘
    Closed,
}

impl TransactionState {
    /// 종료 상태 여부
    pub fn is_terminal(&self) -> bool {
        !matches!(self, Self::Open)
    }
}

impl fmt::Display for TransactionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Open => write!(f, "open"),
            Self::Committed => write!(f, "committed"),
            Self::RolledBack => write!(f, "rolled back"),
            Self::Closed => write!(f, "closed"),
        }
    }
}

// ============================================================================
// TransactionShared - 트랜잭션 공유 상태
// ============================================================================

/// 종료 콜백 (에러로 끝났으면 원인을 받음)
type CloseCallback = Box<dyn FnOnce(Option<&DriverError>) + Send>;

/// 트랜잭션 핸들, 쿼리 실행 핸들, 응답 스트림이 공유하는 상태
pub(crate) struct TransactionShared {
    id: TransactionId,
    database: String,
    transaction_type: TransactionType,
    options: TransactionOptions,
    state: Mutex<TransactionState>,
    /// 쿼리 해석과 종료 연산 직렬화
    operation_lock: Mutex<()>,
    /// 종료 상태 진입 시 한 번 실행
    close_callbacks: Mutex<Vec<CloseCallback>>,
    connection: Arc<ConnectionShared>,
}

impl TransactionShared {
    pub(crate) fn new(
        id: TransactionId,
        database: String,
        transaction_type: TransactionType,
        options: TransactionOptions,
        connection: Arc<ConnectionShared>,
    ) -> Self {
        Self {
            id,
            database,
            transaction_type,
            options,
            state: Mutex::new(TransactionState::Open),
            operation_lock: Mutex::new(()),
            close_callbacks: Mutex::new(Vec::new()),
            connection,
        }
    }

    pub(crate) fn id(&self) -> TransactionId {
        self.id
    }

    pub(crate) fn connection(&self) -> &Arc<ConnectionShared> {
        &self.connection
    }

    pub(crate) fn state(&self) -> TransactionState {
        *self.state.lock()
    }

    pub(crate) fn is_open(&self) -> bool {
        self.state() == TransactionState::Open && self.connection.is_open()
    }

    pub(crate) fn lock_operations(&self) -> MutexGuard<'_, ()> {
        self.operation_lock.lock()
    }

    /// 사용 가능 여부 확인 (로컬 검사, 네트워크 왕복 없음)
    pub(crate) fn ensure_open(&self) -> DriverResult<()> {
        if !self.connection.is_open() {
            self.invalidate();
            return Err(self.connection.closed_error());
        }
        match self.state() {
            TransactionState::Open => Ok(()),
            state => Err(DriverError::TransactionClosed(state)),
        }
    }

    /// OPEN 상태에서만 전이, 전이했으면 true
    fn transition(&self, to: TransactionState) -> bool {
        let mut state = self.state.lock();
        if *state == TransactionState::Open {
            *state = to;
            true
        } else {
            false
        }
    }

    /// 요청이 중간에 해제되어 끝났을 때의 에러
    ///
    /// 트랜잭션이나 연결이 닫히면서 응답 슬롯이 제거된 경우를 구분합니다.
    pub(crate) fn interrupted_error(&self, err: DriverError) -> DriverError {
        if !self.connection.is_open() {
            self.connection.closed_error()
        } else if self.state().is_terminal() {
            DriverError::TransactionClosed(self.state())
        } else {
            err
        }
    }

    /// 트랜잭션 범위 요청
    pub(crate) fn request(&self, body: Request) -> DriverResult<Response> {
        self.connection
            .request(body)
            .map_err(|e| self.interrupted_error(e))
    }

    /// 치명적 에러 후 트랜잭션 정리
    pub(crate) fn fail_on_fatal(&self, err: &DriverError) {
        if err.is_fatal() {
            debug!(transaction = self.id, error = %err, "fatal error, closing transaction");
            self.terminate(TransactionState::Closed, true, Some(err));
        }
    }

    /// 연결 종료 시 호출 (네트워크 없음)
    pub(crate) fn invalidate(&self) {
        if self.transition(TransactionState::Closed) {
            self.connection.channel().release_transaction(self.id);
            let cause = self.connection.closed_error();
            self.run_close_callbacks(Some(&cause));
        }
    }

    fn add_close_callback(&self, callback: CloseCallback) {
        let mut callbacks = self.close_callbacks.lock();
        // 상태 전이는 콜백 목록을 비우기 전에 일어나므로 여기서 보이는 종료 상태는 확정적
        if self.state().is_terminal() {
            drop(callbacks);
            callback(None);
        } else {
            callbacks.push(callback);
        }
    }

    fn run_close_callbacks(&self, cause: Option<&DriverError>) {
        let callbacks = std::mem::take(&mut *self.close_callbacks.lock());
        for callback in callbacks {
            callback(cause);
        }
    }

    /// 종료 상태로 전이하고 자원 해제
    ///
    /// `release_remote`가 참이면 서버 측 트랜잭션도 닫습니다. 서버 응답은
    /// `SHUTDOWN_GRACE`까지만 기다립니다.
    fn terminate(&self, final_state: TransactionState, release_remote: bool, cause: Option<&DriverError>) -> bool {
        if !self.transition(final_state) {
            return false;
        }
        self.connection.channel().release_transaction(self.id);
        self.connection.unregister_transaction(self.id);

        if release_remote && self.connection.is_open() {
            let request = Request::TransactionClose { transaction: self.id };
            if let Err(e) = self.connection.request_within(request, SHUTDOWN_GRACE) {
                debug!(transaction = self.id, error = %e, "server-side close failed");
            }
        }
        self.run_close_callbacks(cause);
        true
    }
}

// ============================================================================
// Transaction - 트랜잭션
// ============================================================================

/// 트랜잭션
///
/// 하나의 데이터베이스와 접근 모드에 묶인 서버 측 트랜잭션 컨텍스트.
/// `Send + Sync`이므로 `Arc<Transaction>`으로 여러 스레드에서 공유할 수 있으며,
/// 쿼리 해석과 커밋/롤백은 내부적으로 직렬화됩니다.
pub struct Transaction {
    shared: Arc<TransactionShared>,
}

impl Transaction {
    pub(crate) fn new(shared: Arc<TransactionShared>) -> Self {
        Self { shared }
    }

    /// 서버가 부여한 트랜잭션 ID
    pub fn id(&self) -> TransactionId {
        self.shared.id
    }

    /// 데이터베이스 이름
    pub fn database(&self) -> &str {
        &self.shared.database
    }

    /// 접근 모드
    pub fn transaction_type(&self) -> TransactionType {
        self.shared.transaction_type
    }

    /// 옵션
    pub fn options(&self) -> &TransactionOptions {
        &self.shared.options
    }

    /// 현재 상태
    pub fn state(&self) -> TransactionState {
        self.shared.state()
    }

    /// 열린 상태 여부
    pub fn is_open(&self) -> bool {
        self.shared.is_open()
    }

    /// 쿼리 제출
    ///
    /// 상태 검사만 하고 즉시 반환합니다. 실제 전송은
    /// [`QueryExecution::resolve`]에서 일어납니다.
    pub fn query(&self, query: impl Into<String>) -> DriverResult<QueryExecution> {
        self.query_with_options(query, QueryOptions::default())
    }

    /// 옵션을 지정해 쿼리 제출
    pub fn query_with_options(
        &self,
        query: impl Into<String>,
        options: QueryOptions,
    ) -> DriverResult<QueryExecution> {
        self.shared.ensure_open()?;
        options.validate()?;
        Ok(QueryExecution::new(Arc::clone(&self.shared), query.into(), options))
    }

    /// 쿼리 제출 후 바로 해석
    pub fn run(&self, query: impl Into<String>) -> DriverResult<QueryAnswer> {
        self.query(query)?.resolve()
    }

    /// 트랜잭션 커밋
    ///
    /// 실패하면 트랜잭션은 CLOSED가 되고 변경 사항은 적용되지 않습니다.
    /// READ 트랜잭션은 커밋할 수 없으며 닫힙니다.
    pub fn commit(&self) -> DriverResult<()> {
        let _guard = self.shared.lock_operations();
        self.shared.ensure_open()?;

        if !self.shared.transaction_type.is_writable() {
            let err = DriverError::transaction("Cannot commit a read transaction");
            self.shared.terminate(TransactionState::Closed, true, Some(&err));
            return Err(err);
        }

        match self.shared.request(Request::TransactionCommit { transaction: self.shared.id }) {
            Ok(Response::Done) => {
                // 커밋 성공 시 서버가 트랜잭션을 닫음
                if self.shared.terminate(TransactionState::Committed, false, None) {
                    debug!(transaction = self.shared.id, database = %self.shared.database, "transaction committed");
                    Ok(())
                } else {
                    Err(DriverError::TransactionClosed(self.shared.state()))
                }
            }
            Ok(other) => {
                let err = unexpected_response("DONE", &other);
                self.shared.terminate(TransactionState::Closed, true, Some(&err));
                Err(err)
            }
            Err(e) => {
                debug!(transaction = self.shared.id, error = %e, "commit failed");
                self.shared.terminate(TransactionState::Closed, true, Some(&e));
                Err(e)
            }
        }
    }

    /// 트랜잭션 롤백
    ///
    /// WRITE/SCHEMA는 변경 사항을 버리고 서버 트랜잭션을 해제합니다.
    /// READ는 버릴 변경 사항이 없으므로 롤백 요청 없이 닫기만 합니다.
    pub fn rollback(&self) -> DriverResult<()> {
        let _guard = self.shared.lock_operations();
        self.shared.ensure_open()?;

        if !self.shared.transaction_type.is_writable() {
            debug!(transaction = self.shared.id, "rollback of read transaction closes it");
            self.shared.terminate(TransactionState::RolledBack, true, None);
            return Ok(());
        }

        match self.shared.request(Request::TransactionRollback { transaction: self.shared.id }) {
            Ok(Response::Done) => {
                if self.shared.terminate(TransactionState::RolledBack, true, None) {
                    debug!(transaction = self.shared.id, "transaction rolled back");
                    Ok(())
                } else {
                    Err(DriverError::TransactionClosed(self.shared.state()))
                }
            }
            Ok(other) => {
                let err = unexpected_response("DONE", &other);
                self.shared.terminate(TransactionState::Closed, true, Some(&err));
                Err(err)
            }
            Err(e) => {
                self.shared.terminate(TransactionState::Closed, true, Some(&e));
                Err(e)
            }
        }
    }

    /// 트랜잭션 닫기
    ///
    /// 어떤 상태에서든 호출할 수 있으며 여러 번 호출해도 안전합니다.
    /// 진행 중인 쿼리 해석과 스트림은 즉시 실패합니다.
    /// 서버 측 해제 실패는 로그로만 남깁니다.
    pub fn close(&self) -> DriverResult<()> {
        if self.shared.terminate(TransactionState::Closed, true, None) {
            debug!(transaction = self.shared.id, "transaction closed");
        }
        Ok(())
    }

    /// 종료 콜백 등록
    ///
    /// 트랜잭션이 커밋, 롤백, 닫기, 연결 끊김 중 어느 경로로든 종료되면
    /// 정확히 한 번 실행됩니다. 에러로 끝났으면 그 원인을 받습니다.
    /// 이미 종료된 트랜잭션에 등록하면 `None`으로 즉시 실행됩니다.
    /// 콜백 안에서 같은 트랜잭션의 커밋이나 롤백을 호출하면 안 됩니다.
    pub fn on_close<F>(&self, callback: F)
    where
        F: FnOnce(Option<&DriverError>) + Send + 'static,
    {
        self.shared.add_close_callback(Box::new(callback));
    }
}

impl Drop for Transaction {
    fn drop(&mut self) {
        if self.shared.state() == TransactionState::Open {
            if let Err(e) = self.close() {
                warn!(transaction = self.shared.id, error = %e, "failed to close transaction on drop");
            }
        }
    }
}

impl fmt::Debug for Transaction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Transaction")
            .field("id", &self.shared.id)
            .field("database", &self.shared.database)
            .field("type", &self.shared.transaction_type)
            .field("state", &self.shared.state())
            .finish()
    }
}

// ============================================================================
// Tests
// ============================================================================
