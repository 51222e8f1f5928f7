//! Query Execution
//!
//! 쿼리 옵션과 쿼리 실행 핸들

use std::fmt;
use std::sync::Arc;

use tracing::trace;

use super::answer::{AnswerStream, ConceptDocumentIterator, ConceptRowIterator, QueryAnswer};
use super::connection::unexpected_response;
use super::error::{DriverError, DriverResult};
use super::rpc::receive;
use super::transaction::TransactionShared;
use crate::protocol::{QueryParameters, Request, Response};

pub use crate::protocol::QueryType;

// ============================================================================
// QueryOptions - 쿼리 옵션
// ============================================================================

/// 쿼리 옵션
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QueryOptions {
    /// 인스턴스에 타입 정보 포함
    pub include_instance_types: bool,
    /// 서버가 한 번에 미리 보내는 응답 수
    pub prefetch_size: usize,
}

impl QueryOptions {
    /// 기본 prefetch 크기
    pub const DEFAULT_PREFETCH_SIZE: usize = 32;

    /// 기본 옵션
    pub fn new() -> Self {
        Self::default()
    }

    /// 타입 정보 포함 여부 설정
    pub fn with_include_instance_types(mut self, include: bool) -> Self {
        self.include_instance_types = include;
        self
    }

    /// prefetch 크기 설정
    pub fn with_prefetch_size(mut self, size: usize) -> Self {
        self.prefetch_size = size;
        self
    }

    /// 옵션 검증
    pub fn validate(&self) -> DriverResult<()> {
        if self.prefetch_size == 0 {
            return Err(DriverError::configuration("prefetch size must be at least 1"));
        }
        Ok(())
    }

    pub(crate) fn to_parameters(&self) -> QueryParameters {
        QueryParameters {
            include_instance_types: self.include_instance_types,
            prefetch_size: self.prefetch_size,
        }
    }
}

impl Default for QueryOptions {
    fn default() -> Self {
        Self {
            include_instance_types: true,
            prefetch_size: Self::DEFAULT_PREFETCH_SIZE,
        }
    }
}

// ============================================================================
// QueryExecution - 쿼리 실행 핸들
// ============================================================================

/// 제출된 쿼리
///
/// [`resolve`](Self::resolve)로 한 번만 소비됩니다. 핸들이 존재하는 동안이
/// 대기(pending) 상태이며, 해석 결과는 응답([`QueryAnswer`]) 또는 에러입니다.
pub struct QueryExecution {
    transaction: Arc<TransactionShared>,
    query: String,
    options: QueryOptions,
}

impl QueryExecution {
    pub(crate) fn new(transaction: Arc<TransactionShared>, query: String, options: QueryOptions) -> Self {
        Self {
            transaction,
            query,
            options,
        }
    }

    /// 쿼리 텍스트
    pub fn query(&self) -> &str {
        &self.query
    }

    /// 쿼리 옵션
    pub fn options(&self) -> &QueryOptions {
        &self.options
    }

    /// 쿼리를 전송하고 응답 헤더를 받을 때까지 대기
    ///
    /// 헤더가 응답 형태(Ok, 행 스트림, 문서 스트림)를 결정합니다.
    /// 서버가 보고한 쿼리 에러는 트랜잭션 상태를 바꾸지 않습니다.
    pub fn resolve(self) -> DriverResult<QueryAnswer> {
        let transaction = self.transaction;
        let _guard = transaction.lock_operations();
        transaction.ensure_open()?;

        let connection = Arc::clone(transaction.connection());
        let request = Request::Query {
            transaction: transaction.id(),
            query: self.query,
            parameters: self.options.to_parameters(),
        };
        let (request_id, mut receiver) = connection
            .channel()
            .submit(request)
            .map_err(|e| transaction.interrupted_error(e))?;

        let header = match connection.block_on(receive(&mut receiver, connection.request_timeout())) {
            Ok(Some(header)) => header,
            Ok(None) => {
                let err = transaction.interrupted_error(connection.closed_error());
                transaction.fail_on_fatal(&err);
                return Err(err);
            }
            Err(e) => {
                connection.channel().forget(request_id);
                transaction.fail_on_fatal(&e);
                return Err(e);
            }
        };
        trace!(transaction = transaction.id(), request_id, header = header.name(), "query resolved");

        match header {
            Response::QueryOk { query_type } => Ok(QueryAnswer::Ok(query_type)),
            Response::QueryRows { query_type, columns } => {
                let stream = AnswerStream::new(Arc::clone(&transaction), request_id, receiver);
                Ok(QueryAnswer::ConceptRows(ConceptRowIterator::new(stream, query_type, columns)))
            }
            Response::QueryDocuments { query_type } => {
                let stream = AnswerStream::new(Arc::clone(&transaction), request_id, receiver);
                Ok(QueryAnswer::ConceptDocuments(ConceptDocumentIterator::new(stream, query_type)))
            }
            Response::Failure(failure) => Err(failure.into()),
            other => {
                connection.channel().forget(request_id);
                Err(unexpected_response("query header", &other))
            }
        }
    }
}

impl fmt::Debug for QueryExecution {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("QueryExecution")
            .field("transaction", &self.transaction.id())
            .field("query", &self.query)
            .field("options", &self.options)
            .finish()
    }
}
