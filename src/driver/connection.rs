//! Connection
//!
//! 서버 연결: 채널 소유, 트랜잭션 생성, 데이터베이스 관리자 접근

use std::collections::HashMap;
use std::fmt;
use std::future::Future;
use std::sync::{Arc, Weak};
use std::time::Duration;

use parking_lot::{Mutex, MutexGuard};
use tokio::runtime::Runtime;
use tracing::{debug, warn};

use super::config::{ConnectionConfig, ServerAddress};
use super::database::DatabaseManager;
use super::error::{DriverError, DriverResult};
use super::rpc::{ChannelOptions, RpcChannel};
use super::transaction::{Transaction, TransactionOptions, TransactionShared};
use super::user::UserManager;
use crate::protocol::{Request, Response, TransactionId, TransactionType};

/// 정리 단계의 서버 응답 대기 한도 (goodbye 전송, 트랜잭션 해제)
pub(crate) const SHUTDOWN_GRACE: Duration = Duration::from_millis(500);

/// 예상하지 못한 응답에 대한 프로토콜 에러
pub(crate) fn unexpected_response(expected: &str, response: &Response) -> DriverError {
    DriverError::protocol(format!(
        "expected {} response, received {}",
        expected,
        response.name()
    ))
}

// ============================================================================
// ConnectionShared - 연결 공유 상태
// ============================================================================

/// 연결, 트랜잭션, 데이터베이스 핸들이 공유하는 상태
pub(crate) struct ConnectionShared {
    config: ConnectionConfig,
    channel: RpcChannel,
    /// 열린 트랜잭션 (연결 종료 시 무효화)
    transactions: Mutex<HashMap<TransactionId, Weak<TransactionShared>>>,
    /// 데이터베이스 관리 연산 직렬화
    registry_lock: Mutex<()>,
    // 채널보다 나중에 해제되어야 함
    runtime: Runtime,
}

impl ConnectionShared {
    pub(crate) fn config(&self) -> &ConnectionConfig {
        &self.config
    }

    pub(crate) fn channel(&self) -> &RpcChannel {
        &self.channel
    }

    /// I/O 런타임에서 future를 완료까지 실행
    pub(crate) fn block_on<F: Future>(&self, future: F) -> F::Output {
        self.runtime.block_on(future)
    }

    pub(crate) fn request_timeout(&self) -> Option<Duration> {
        self.config.request_timeout
    }

    /// 단일 요청/응답 왕복
    pub(crate) fn request(&self, body: Request) -> DriverResult<Response> {
        self.block_on(self.channel.request(body, self.request_timeout()))
    }

    /// 응답 대기를 `limit` 이내로 제한한 요청
    pub(crate) fn request_within(&self, body: Request, limit: Duration) -> DriverResult<Response> {
        let limit = self.request_timeout().map_or(limit, |timeout| timeout.min(limit));
        self.block_on(self.channel.request(body, Some(limit)))
    }

    pub(crate) fn is_open(&self) -> bool {
        self.channel.is_open()
    }

    pub(crate) fn closed_error(&self) -> DriverError {
        self.channel.closed_error()
    }

    pub(crate) fn ensure_open(&self) -> DriverResult<()> {
        if self.is_open() {
            Ok(())
        } else {
            Err(self.closed_error())
        }
    }

    pub(crate) fn registry_lock(&self) -> MutexGuard<'_, ()> {
        self.registry_lock.lock()
    }

    fn register_transaction(&self, transaction: &Arc<TransactionShared>) {
        let mut transactions = self.transactions.lock();
        transactions.retain(|_, t| t.strong_count() > 0);
        transactions.insert(transaction.id(), Arc::downgrade(transaction));
    }

    pub(crate) fn unregister_transaction(&self, id: TransactionId) {
        self.transactions.lock().remove(&id);
    }

    /// 채널을 닫고 남은 트랜잭션을 무효화, 처음 닫을 때만 true
    fn close(&self) -> bool {
        let was_open = self.channel.is_open();
        self.block_on(self.channel.shutdown(SHUTDOWN_GRACE));

        // 트랜잭션 상태 락은 맵 락을 놓은 뒤에 잡음
        let transactions: Vec<_> = self.transactions.lock().drain().map(|(_, t)| t).collect();
        for transaction in transactions.iter().filter_map(Weak::upgrade) {
            transaction.invalidate();
        }
        was_open
    }
}

// ============================================================================
// Connection - 연결
// ============================================================================

/// 서버 연결
///
/// 하나의 채널 위에서 여러 트랜잭션을 요청 ID로 다중화합니다.
/// 모든 호출은 블로킹이며, 비동기 런타임 안에서 호출하면 안 됩니다.
pub struct Connection {
    shared: Arc<ConnectionShared>,
}

impl Connection {
    /// 기본 설정으로 연결 (`host:port`)
    ///
    /// 주소가 잘못되었거나 (포트 누락 포함) 서버에 닿을 수 없으면
    /// 연결 에러를 반환합니다.
    pub fn open(address: &str) -> DriverResult<Self> {
        Self::open_with_config(ConnectionConfig::new(address)?)
    }

    /// 설정으로 연결
    pub fn open_with_config(config: ConnectionConfig) -> DriverResult<Self> {
        config.validate()?;

        let runtime = tokio::runtime::Builder::new_multi_thread()
            .worker_threads(config.worker_threads)
            .thread_name("typedb-client-io")
            .enable_all()
            .build()?;

        let options = ChannelOptions {
            address: config.address.to_socket_addr(),
            username: config.credentials.username().to_string(),
            password: config.credentials.password().to_string(),
            user_agent: config.user_agent.clone(),
            connect_timeout: config.connection_timeout,
            max_frame_size: config.max_frame_size,
        };
        let channel = runtime.block_on(RpcChannel::connect(options))?;

        debug!(
            address = %config.address,
            connection_id = %channel.handshake_result().connection_id,
            "connection opened"
        );

        Ok(Self {
            shared: Arc::new(ConnectionShared {
                config,
                channel,
                transactions: Mutex::new(HashMap::new()),
                registry_lock: Mutex::new(()),
                runtime,
            }),
        })
    }

    /// 열린 상태 여부 (네트워크 왕복 없음)
    pub fn is_open(&self) -> bool {
        self.shared.is_open()
    }

    /// 연결 종료
    ///
    /// 파생된 트랜잭션은 모두 무효화되고, 진행 중인 호출은 즉시 실패합니다.
    /// 여러 번 호출해도 안전합니다.
    pub fn close(&self) -> DriverResult<()> {
        if self.shared.close() {
            debug!(address = %self.shared.config.address, "connection closed");
        }
        Ok(())
    }

    /// 데이터베이스 관리자
    pub fn databases(&self) -> DatabaseManager {
        DatabaseManager::new(Arc::clone(&self.shared))
    }

    /// 사용자 관리자
    pub fn users(&self) -> UserManager {
        UserManager::new(Arc::clone(&self.shared))
    }

    /// 트랜잭션 열기
    pub fn transaction(&self, database: &str, transaction_type: TransactionType) -> DriverResult<Transaction> {
        self.transaction_with_options(database, transaction_type, TransactionOptions::default())
    }

    /// 옵션을 지정해 트랜잭션 열기
    pub fn transaction_with_options(
        &self,
        database: &str,
        transaction_type: TransactionType,
        options: TransactionOptions,
    ) -> DriverResult<Transaction> {
        self.shared.ensure_open()?;
        if database.is_empty() {
            return Err(DriverError::configuration("database name must not be empty"));
        }
        options.validate()?;

        let request = Request::TransactionOpen {
            database: database.to_string(),
            transaction_type,
            parameters: options.to_parameters(),
        };
        let id = match self.shared.request(request)? {
            Response::TransactionOpened { transaction } => transaction,
            other => return Err(unexpected_response("TRANSACTION_OPENED", &other)),
        };

        let shared = Arc::new(TransactionShared::new(
            id,
            database.to_string(),
            transaction_type,
            options,
            Arc::clone(&self.shared),
        ));
        self.shared.register_transaction(&shared);

        // 등록 직전에 연결이 닫혔으면 여기서 무효화
        if !self.shared.is_open() {
            shared.invalidate();
            return Err(self.shared.closed_error());
        }

        debug!(transaction = id, database, %transaction_type, "transaction opened");
        Ok(Transaction::new(shared))
    }

    /// 트랜잭션 범위 안에서 함수 실행
    ///
    /// 함수가 성공하든 실패하든 트랜잭션을 닫습니다. 커밋은 함수가 직접
    /// 호출해야 하며, 재시도는 하지 않습니다.
    pub fn with_transaction<T, F>(&self, database: &str, transaction_type: TransactionType, work: F) -> DriverResult<T>
    where
        F: FnOnce(&Transaction) -> DriverResult<T>,
    {
        let transaction = self.transaction(database, transaction_type)?;
        let result = work(&transaction);
        if let Err(e) = transaction.close() {
            warn!(transaction = transaction.id(), error = %e, "failed to close scoped transaction");
        }
        result
    }

    /// 서버 주소
    pub fn address(&self) -> &ServerAddress {
        &self.shared.config.address
    }

    /// 서버가 부여한 연결 ID
    pub fn connection_id(&self) -> &str {
        &self.shared.channel.handshake_result().connection_id
    }

    /// 서버 버전
    pub fn server_version(&self) -> &str {
        &self.shared.channel.handshake_result().server_version
    }

    /// 연결 설정
    pub fn config(&self) -> &ConnectionConfig {
        self.shared.config()
    }
}

impl Drop for Connection {
    fn drop(&mut self) {
        if let Err(e) = self.close() {
            warn!(error = %e, "failed to close connection on drop");
        }
    }
}

impl fmt::Debug for Connection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Connection")
            .field("address", &self.shared.config.address)
            .field("connection_id", &self.connection_id())
            .field("open", &self.is_open())
            .finish()
    }
}
