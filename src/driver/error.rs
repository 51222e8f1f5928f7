//! Driver Error Types
//!
//! 드라이버 에러 정의

use std::io;
use thiserror::Error;

use super::transaction::TransactionState;
use crate::protocol::{ErrorCode, ProtocolError, ServerFailure};

// ============================================================================
// DriverError - 드라이버 에러
// ============================================================================

/// 드라이버 에러
#[derive(Error, Debug)]
pub enum DriverError {
    /// 연결 에러 (주소 오류, 접속 불가, 채널 끊김)
    #[error("Connection error: {0}")]
    Connection(String),

    /// 이미 닫힌 연결에서 호출
    #[error("Connection is closed")]
    ConnectionClosed,

    /// 인증 에러
    #[error("Authentication error: {0}")]
    Authentication(String),

    /// 데이터베이스가 이미 존재
    #[error("Database '{0}' already exists")]
    DatabaseExists(String),

    /// 데이터베이스가 존재하지 않음
    #[error("Database '{0}' does not exist")]
    DatabaseNotFound(String),

    /// 사용자가 이미 존재
    #[error("User '{0}' already exists")]
    UserExists(String),

    /// 사용자가 존재하지 않음
    #[error("User '{0}' does not exist")]
    UserNotFound(String),

    /// 트랜잭션 에러
    #[error("Transaction error: {0}")]
    Transaction(String),

    /// 종료된 트랜잭션에서 호출
    #[error("Transaction is closed (state: {0})")]
    TransactionClosed(TransactionState),

    /// 쿼리 에러 (서버 진단 메시지 포함)
    #[error("Query error: {code} - {message}")]
    Query {
        /// 서버 에러 코드
        code: String,
        /// 서버 진단 메시지
        message: String,
    },

    /// 프로토콜 에러
    #[error("Protocol error: {0}")]
    Protocol(String),

    /// 타임아웃 에러
    #[error("Timeout: {0}")]
    Timeout(String),

    /// 설정 에러
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// 타입 변환 에러
    #[error("Type conversion error: {0}")]
    TypeConversion(String),

    /// 서버 에러
    #[error("Server error: {code} - {message}")]
    Server {
        /// 서버 에러 코드
        code: String,
        /// 서버 진단 메시지
        message: String,
    },

    /// I/O 에러
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    /// 내부 에러
    #[error("Internal error: {0}")]
    Internal(String),
}

impl DriverError {
    /// 연결 에러 생성
    pub fn connection(msg: impl Into<String>) -> Self {
        Self::Connection(msg.into())
    }

    /// 인증 에러 생성
    pub fn authentication(msg: impl Into<String>) -> Self {
        Self::Authentication(msg.into())
    }

    /// 트랜잭션 에러 생성
    pub fn transaction(msg: impl Into<String>) -> Self {
        Self::Transaction(msg.into())
    }

    /// 쿼리 에러 생성
    pub fn query(code: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Query {
            code: code.into(),
            message: message.into(),
        }
    }

    /// 프로토콜 에러 생성
    pub fn protocol(msg: impl Into<String>) -> Self {
        Self::Protocol(msg.into())
    }

    /// 타임아웃 에러 생성
    pub fn timeout(msg: impl Into<String>) -> Self {
        Self::Timeout(msg.into())
    }

    /// 설정 에러 생성
    pub fn configuration(msg: impl Into<String>) -> Self {
        Self::Configuration(msg.into())
    }

    /// 타입 변환 에러 생성
    pub fn type_conversion(msg: impl Into<String>) -> Self {
        Self::TypeConversion(msg.into())
    }

    /// 서버 에러 생성
    pub fn server(code: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Server {
            code: code.into(),
            message: message.into(),
        }
    }

    /// 내부 에러 생성
    pub fn internal(msg: impl Into<String>) -> Self {
        Self::Internal(msg.into())
    }

    /// 연결 계층 에러 여부
    pub fn is_connection_error(&self) -> bool {
        matches!(
            self,
            Self::Connection(_) | Self::ConnectionClosed | Self::Io(_) | Self::Protocol(_)
        )
    }

    /// 치명적 에러 여부
    ///
    /// 치명적 에러가 발생하면 진행 중인 트랜잭션은 더 이상 쓸 수 없습니다.
    pub fn is_fatal(&self) -> bool {
        self.is_connection_error() || matches!(self, Self::Timeout(_) | Self::Internal(_))
    }

    /// 클라이언트 에러 여부
    pub fn is_client_error(&self) -> bool {
        matches!(
            self,
            Self::Authentication(_)
                | Self::Configuration(_)
                | Self::TypeConversion(_)
                | Self::Query { .. }
                | Self::DatabaseExists(_)
                | Self::DatabaseNotFound(_)
                | Self::UserExists(_)
                | Self::UserNotFound(_)
                | Self::TransactionClosed(_)
        )
    }

    /// 쿼리 에러 여부
    pub fn is_query_error(&self) -> bool {
        matches!(self, Self::Query { .. })
    }
}

// ============================================================================
// Result Type
// ============================================================================

/// 드라이버 결과 타입
pub type DriverResult<T> = Result<T, DriverError>;

// ============================================================================
// Conversions
// ============================================================================

/// 레지스트리 실패를 이름이 붙은 변형으로 변환
fn registry_error(code: &str, subject: &str) -> Option<DriverError> {
    let subject = subject.to_string();
    match code {
        ErrorCode::DATABASE_EXISTS => Some(DriverError::DatabaseExists(subject)),
        ErrorCode::DATABASE_NOT_FOUND => Some(DriverError::DatabaseNotFound(subject)),
        ErrorCode::USER_EXISTS => Some(DriverError::UserExists(subject)),
        ErrorCode::USER_NOT_FOUND => Some(DriverError::UserNotFound(subject)),
        _ => None,
    }
}

/// 이름을 담는 변형은 `subject`가 있을 때만 사용하고, 없으면 진단 메시지를
/// 그대로 `Server`에 담습니다.
impl From<ServerFailure> for DriverError {
    fn from(failure: ServerFailure) -> Self {
        let named = failure
            .subject
            .as_deref()
            .and_then(|subject| registry_error(&failure.code, subject));

        if failure.is_authentication_error() {
            DriverError::Authentication(failure.message)
        } else if failure.is_connection_error() {
            DriverError::Connection(failure.message)
        } else if let Some(err) = named {
            err
        } else if failure.code == ErrorCode::INTERNAL {
            DriverError::Internal(failure.message)
        } else if failure.is_transaction_error() {
            DriverError::Transaction(failure.message)
        } else if failure.is_query_error() {
            DriverError::Query {
                code: failure.code,
                message: failure.message,
            }
        } else {
            DriverError::Server {
                code: failure.code,
                message: failure.message,
            }
        }
    }
}

impl From<ProtocolError> for DriverError {
    fn from(err: ProtocolError) -> Self {
        match err {
            ProtocolError::Io(e) => DriverError::Io(e),
            ProtocolError::ConnectionClosed => DriverError::connection("connection closed by server"),
            ProtocolError::Handshake(msg) => DriverError::Connection(msg),
            other => DriverError::Protocol(other.to_string()),
        }
    }
}

// ============================================================================
// Tests
// ============================================================================
