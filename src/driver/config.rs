//! Connection Config
//!
//! 서버 주소, 인증 정보 및 연결 설정

use std::fmt;
use std::time::Duration;

use super::error::{DriverError, DriverResult};
use crate::protocol::handshake::DRIVER_LANG;
use crate::protocol::DEFAULT_MAX_FRAME_SIZE;

/// 기본 서버 포트
pub const DEFAULT_PORT: u16 = 1729;

// ============================================================================
// Credentials - 인증 정보
// ============================================================================

/// 사용자 인증 정보
#[derive(Clone, PartialEq, Eq)]
pub struct Credentials {
    username: String,
    password: String,
}

impl Credentials {
    /// 새 인증 정보 생성
    pub fn new(username: impl Into<String>, password: impl Into<String>) -> Self {
        Self {
            username: username.into(),
            password: password.into(),
        }
    }

    /// 사용자명
    pub fn username(&self) -> &str {
        &self.username
    }

    /// 비밀번호
    pub fn password(&self) -> &str {
        &self.password
    }
}

impl Default for Credentials {
    fn default() -> Self {
        Self::new("admin", "password")
    }
}

// 비밀번호는 로그에 남기지 않음
impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("username", &self.username)
            .field("password", &"***")
            .finish()
    }
}

// ============================================================================
// ServerAddress - 서버 주소
// ============================================================================

/// 서버 주소
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ServerAddress {
    /// 호스트
    pub host: String,
    /// 포트
    pub port: u16,
}

impl ServerAddress {
    /// 새 서버 주소 생성
    pub fn new(host: impl Into<String>, port: u16) -> Self {
        Self {
            host: host.into(),
            port,
        }
    }

    /// `host:port` 문자열 파싱
    ///
    /// 포트는 생략할 수 없습니다. `"localhost"`처럼 포트가 없는 주소는
    /// 연결 에러로 거부합니다.
    pub fn parse(address: &str) -> DriverResult<Self> {
        let trimmed = address.trim();
        let trimmed = trimmed.strip_prefix("typedb://").unwrap_or(trimmed);

        let (host, port) = trimmed.rsplit_once(':').ok_or_else(|| {
            DriverError::connection(format!("Missing port in server address '{}'", address))
        })?;
        if host.is_empty() {
            return Err(DriverError::connection(format!(
                "Missing host in server address '{}'",
                address
            )));
        }
        let port: u16 = port.parse().map_err(|_| {
            DriverError::connection(format!("Invalid port in server address '{}'", address))
        })?;
        if port == 0 {
            return Err(DriverError::connection(format!(
                "Invalid port in server address '{}'",
                address
            )));
        }

        Ok(Self::new(host, port))
    }

    /// 소켓 주소로 변환
    pub fn to_socket_addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

impl fmt::Display for ServerAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.host, self.port)
    }
}

impl Default for ServerAddress {
    fn default() -> Self {
        Self::new("127.0.0.1", DEFAULT_PORT)
    }
}

// ============================================================================
// ConnectionConfig - 연결 설정
// ============================================================================

/// 연결 설정
#[derive(Debug, Clone)]
pub struct ConnectionConfig {
    /// 서버 주소
    pub address: ServerAddress,
    /// 인증 정보
    pub credentials: Credentials,
    /// 연결(핸드셰이크 포함) 타임아웃
    pub connection_timeout: Duration,
    /// 요청별 응답 대기 한도 (`None`이면 서버 응답까지 대기)
    pub request_timeout: Option<Duration>,
    /// I/O 런타임 워커 스레드 수
    pub worker_threads: usize,
    /// 최대 프레임 크기
    pub max_frame_size: usize,
    /// 핸드셰이크에서 서버에 보고할 드라이버 식별자
    pub user_agent: String,
}

impl ConnectionConfig {
    /// 새 설정 생성
    pub fn new(address: &str) -> DriverResult<Self> {
        Ok(Self {
            address: ServerAddress::parse(address)?,
            ..Self::default()
        })
    }

    /// 빌더 시작
    pub fn builder(address: &str) -> DriverResult<ConnectionConfigBuilder> {
        let config = Self::new(address)?;
        Ok(ConnectionConfigBuilder { config })
    }

    /// 설정 검증
    pub fn validate(&self) -> DriverResult<()> {
        if self.connection_timeout.is_zero() {
            return Err(DriverError::configuration("connection timeout must be positive"));
        }
        if self.request_timeout.map_or(false, |t| t.is_zero()) {
            return Err(DriverError::configuration("request timeout must be positive"));
        }
        if self.worker_threads == 0 {
            return Err(DriverError::configuration("at least one worker thread is required"));
        }
        if self.max_frame_size == 0 {
            return Err(DriverError::configuration("max frame size must be positive"));
        }
        if self.user_agent.trim().is_empty() {
            return Err(DriverError::configuration("user agent must not be empty"));
        }
        Ok(())
    }
}

impl Default for ConnectionConfig {
    fn default() -> Self {
        Self {
            address: ServerAddress::default(),
            credentials: Credentials::default(),
            connection_timeout: Duration::from_secs(10),
            request_timeout: None,
            worker_threads: 2,
            max_frame_size: DEFAULT_MAX_FRAME_SIZE,
            user_agent: DRIVER_LANG.to_string(),
        }
    }
}

// ============================================================================
// ConnectionConfigBuilder - 설정 빌더
// ============================================================================

/// 연결 설정 빌더
pub struct ConnectionConfigBuilder {
    config: ConnectionConfig,
}

impl ConnectionConfigBuilder {
    /// 인증 정보 설정
    pub fn with_credentials(mut self, credentials: Credentials) -> Self {
        self.config.credentials = credentials;
        self
    }

    /// 연결 타임아웃 설정
    pub fn with_connection_timeout(mut self, timeout: Duration) -> Self {
        self.config.connection_timeout = timeout;
        self
    }

    /// 요청 타임아웃 설정
    pub fn with_request_timeout(mut self, timeout: Duration) -> Self {
        self.config.request_timeout = Some(timeout);
        self
    }

    /// 워커 스레드 수 설정
    pub fn with_worker_threads(mut self, threads: usize) -> Self {
        self.config.worker_threads = threads;
        self
    }

    /// 최대 프레임 크기 설정
    pub fn with_max_frame_size(mut self, size: usize) -> Self {
        self.config.max_frame_size = size;
        self
    }

    /// 드라이버 식별자 설정
    pub fn with_user_agent(mut self, user_agent: impl Into<String>) -> Self {
        self.config.user_agent = user_agent.into();
        self
    }

    /// 빌드
    pub fn build(self) -> ConnectionConfig {
        self.config
    }
}

// ============================================================================
// Tests
// ============================================================================
