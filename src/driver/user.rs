//! User Management
//!
//! 서버 사용자 생성, 조회, 비밀번호 변경, 삭제

use std::fmt;
use std::sync::Arc;

use tracing::debug;

use super::connection::{unexpected_response, ConnectionShared};
use super::error::{DriverError, DriverResult};
use crate::protocol::{Request, Response};

fn check_username(username: &str) -> DriverResult<()> {
    if username.is_empty() {
        Err(DriverError::configuration("username must not be empty"))
    } else {
        Ok(())
    }
}

fn check_password(password: &str) -> DriverResult<()> {
    if password.is_empty() {
        Err(DriverError::configuration("password must not be empty"))
    } else {
        Ok(())
    }
}

// ============================================================================
// UserManager - 사용자 관리자
// ============================================================================

/// 사용자 관리자
#[derive(Clone)]
pub struct UserManager {
    connection: Arc<ConnectionShared>,
}

impl UserManager {
    pub(crate) fn new(connection: Arc<ConnectionShared>) -> Self {
        Self { connection }
    }

    /// 존재 여부
    pub fn contains(&self, username: &str) -> DriverResult<bool> {
        check_username(username)?;
        self.connection.ensure_open()?;
        let request = Request::UsersContains {
            name: username.to_string(),
        };
        match self.connection.request(request)? {
            Response::Contains { value } => Ok(value),
            other => Err(unexpected_response("CONTAINS", &other)),
        }
    }

    /// 생성 (이미 있으면 `UserExists`)
    pub fn create(&self, username: &str, password: &str) -> DriverResult<()> {
        check_username(username)?;
        check_password(password)?;
        self.connection.ensure_open()?;
        let request = Request::UsersCreate {
            name: username.to_string(),
            password: password.to_string(),
        };
        match self.connection.request(request)? {
            Response::Done => {
                debug!(user = username, "user created");
                Ok(())
            }
            other => Err(unexpected_response("DONE", &other)),
        }
    }

    /// 조회 (없으면 `UserNotFound`)
    pub fn get(&self, username: &str) -> DriverResult<User> {
        check_username(username)?;
        self.connection.ensure_open()?;
        let request = Request::UsersGet {
            name: username.to_string(),
        };
        match self.connection.request(request)? {
            Response::User { name } => Ok(User::new(name, Arc::clone(&self.connection))),
            other => Err(unexpected_response("USER", &other)),
        }
    }

    /// 전체 목록
    pub fn all(&self) -> DriverResult<Vec<User>> {
        self.connection.ensure_open()?;
        match self.connection.request(Request::UsersAll)? {
            Response::Users { names } => Ok(names
                .into_iter()
                .map(|name| User::new(name, Arc::clone(&self.connection)))
                .collect()),
            other => Err(unexpected_response("USERS", &other)),
        }
    }

    /// 이 연결로 인증한 사용자 이름 (네트워크 왕복 없음)
    pub fn current_username(&self) -> &str {
        self.connection.config().credentials.username()
    }
}

impl fmt::Debug for UserManager {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("UserManager")
            .field("current_username", &self.current_username())
            .finish()
    }
}

// ============================================================================
// User - 사용자
// ============================================================================

/// 이름이 붙은 사용자 핸들
#[derive(Clone)]
pub struct User {
    name: String,
    connection: Arc<ConnectionShared>,
}

impl User {
    fn new(name: String, connection: Arc<ConnectionShared>) -> Self {
        Self { name, connection }
    }

    /// 사용자 이름
    pub fn name(&self) -> &str {
        &self.name
    }

    /// 비밀번호 변경
    ///
    /// 이미 열린 연결에는 영향이 없고, 다음 연결부터 새 비밀번호로 인증합니다.
    pub fn update_password(&self, password: &str) -> DriverResult<()> {
        check_password(password)?;
        self.connection.ensure_open()?;
        let request = Request::UserUpdatePassword {
            name: self.name.clone(),
            password: password.to_string(),
        };
        match self.connection.request(request)? {
            Response::Done => {
                debug!(user = %self.name, "password updated");
                Ok(())
            }
            other => Err(unexpected_response("DONE", &other)),
        }
    }

    /// 삭제 (동시에 삭제되었으면 `UserNotFound`)
    pub fn delete(self) -> DriverResult<()> {
        self.connection.ensure_open()?;
        let request = Request::UserDelete { name: self.name.clone() };
        match self.connection.request(request)? {
            Response::Done => {
                debug!(user = %self.name, "user deleted");
                Ok(())
            }
            other => Err(unexpected_response("DONE", &other)),
        }
    }
}

impl fmt::Debug for User {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("User").field("name", &self.name).finish()
    }
}

impl fmt::Display for User {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.name)
    }
}
