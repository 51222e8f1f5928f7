//! Query Answers
//!
//! 쿼리 응답: Ok, 개념 행(ConceptRow) 스트림, 개념 문서(ConceptDocument) 스트림

use std::collections::{HashMap, VecDeque};
use std::fmt;
use std::sync::Arc;

use tracing::trace;

use super::connection::unexpected_response;
use super::error::{DriverError, DriverResult};
use super::rpc::{receive, ResponseReceiver};
use super::transaction::TransactionShared;
use crate::concept::{Concept, Node, Value};
use crate::protocol::{QueryType, Request, RequestId, Response};

// ============================================================================
// QueryAnswer - 쿼리 응답
// ============================================================================

/// 쿼리 응답
///
/// 응답 형태는 해석 시점에 서버가 보낸 헤더로 정해집니다.
#[derive(Debug)]
pub enum QueryAnswer {
    /// 출력 없는 쿼리 (define 등)
    Ok(QueryType),
    /// 변수 바인딩 행 스트림
    ConceptRows(ConceptRowIterator),
    /// 구조화된 문서 스트림 (fetch)
    ConceptDocuments(ConceptDocumentIterator),
}

impl QueryAnswer {
    /// 쿼리 종류
    pub fn query_type(&self) -> QueryType {
        match self {
            QueryAnswer::Ok(query_type) => *query_type,
            QueryAnswer::ConceptRows(rows) => rows.query_type(),
            QueryAnswer::ConceptDocuments(documents) => documents.query_type(),
        }
    }

    /// Ok 응답 여부
    pub fn is_ok(&self) -> bool {
        matches!(self, QueryAnswer::Ok(_))
    }

    /// 행 스트림 여부
    pub fn is_row_stream(&self) -> bool {
        matches!(self, QueryAnswer::ConceptRows(_))
    }

    /// 문서 스트림 여부
    pub fn is_document_stream(&self) -> bool {
        matches!(self, QueryAnswer::ConceptDocuments(_))
    }

    /// 행 스트림으로 변환
    pub fn into_rows(self) -> DriverResult<ConceptRowIterator> {
        match self {
            QueryAnswer::ConceptRows(rows) => Ok(rows),
            other => Err(DriverError::type_conversion(format!(
                "Cannot convert {} answer to concept rows",
                other.shape()
            ))),
        }
    }

    /// 문서 스트림으로 변환
    pub fn into_documents(self) -> DriverResult<ConceptDocumentIterator> {
        match self {
            QueryAnswer::ConceptDocuments(documents) => Ok(documents),
            other => Err(DriverError::type_conversion(format!(
                "Cannot convert {} answer to concept documents",
                other.shape()
            ))),
        }
    }

    fn shape(&self) -> &'static str {
        match self {
            QueryAnswer::Ok(_) => "ok",
            QueryAnswer::ConceptRows(_) => "concept row",
            QueryAnswer::ConceptDocuments(_) => "concept document",
        }
    }
}

// ============================================================================
// AnswerStream - 응답 스트림
// ============================================================================

/// 서버에서 받은 응답 묶음
pub(crate) enum Batch {
    Rows(Vec<Vec<Option<Concept>>>),
    Documents(Vec<Node>),
}

/// 트랜잭션 채널에서 응답 묶음을 지연 수신
///
/// 서버가 prefetch 한도에 도달해 CONTINUE를 보내면, 소비자가 버퍼를 다 읽은
/// 뒤에야 다음 묶음을 요청합니다.
pub(crate) struct AnswerStream {
    transaction: Arc<TransactionShared>,
    request_id: RequestId,
    receiver: ResponseReceiver,
    finished: bool,
}

impl AnswerStream {
    pub(crate) fn new(
        transaction: Arc<TransactionShared>,
        request_id: RequestId,
        receiver: ResponseReceiver,
    ) -> Self {
        Self {
            transaction,
            request_id,
            receiver,
            finished: false,
        }
    }

    fn finish(&mut self) {
        if !self.finished {
            self.finished = true;
            self.transaction.connection().channel().forget(self.request_id);
        }
    }

    fn fail(&mut self, err: DriverError) -> Option<DriverResult<Batch>> {
        self.finish();
        Some(Err(err))
    }

    /// 소유 트랜잭션이 닫혔으면 스트림을 끝내고 에러 반환
    fn check_open(&mut self) -> DriverResult<()> {
        self.transaction.ensure_open().map_err(|e| {
            self.finish();
            e
        })
    }

    /// 다음 묶음 (끝이면 `None`, 에러 후에는 항상 `None`)
    fn next_batch(&mut self) -> Option<DriverResult<Batch>> {
        loop {
            if self.finished {
                return None;
            }
            if let Err(e) = self.check_open() {
                return Some(Err(e));
            }

            let connection = Arc::clone(self.transaction.connection());
            let received = connection.block_on(receive(&mut self.receiver, connection.request_timeout()));
            match received {
                Ok(Some(Response::RowsPart { rows })) => {
                    trace!(request_id = self.request_id, rows = rows.len(), "received rows");
                    return Some(Ok(Batch::Rows(rows)));
                }
                Ok(Some(Response::DocumentsPart { documents })) => {
                    trace!(request_id = self.request_id, documents = documents.len(), "received documents");
                    return Some(Ok(Batch::Documents(documents)));
                }
                Ok(Some(Response::Continue)) => {
                    let resume = Request::StreamContinue {
                        transaction: self.transaction.id(),
                    };
                    if let Err(e) = connection.channel().resume(self.request_id, resume) {
                        let err = self.transaction.interrupted_error(e);
                        self.transaction.fail_on_fatal(&err);
                        return self.fail(err);
                    }
                }
                Ok(Some(Response::StreamDone)) => {
                    self.finish();
                    return None;
                }
                Ok(Some(Response::Failure(failure))) => return self.fail(failure.into()),
                Ok(Some(other)) => return self.fail(unexpected_response("answer part", &other)),
                Ok(None) => {
                    let err = self.transaction.interrupted_error(connection.closed_error());
                    self.transaction.fail_on_fatal(&err);
                    return self.fail(err);
                }
                Err(e) => {
                    self.transaction.fail_on_fatal(&e);
                    return self.fail(e);
                }
            }
        }
    }
}

impl Drop for AnswerStream {
    fn drop(&mut self) {
        self.finish();
    }
}

// ============================================================================
// ConceptRow - 개념 행
// ============================================================================

/// 행 스트림의 컬럼 정보 (응답마다 한 번만 할당)
#[derive(Debug)]
struct RowHeader {
    columns: Vec<String>,
    column_index: HashMap<String, usize>,
    query_type: QueryType,
}

/// 변수 바인딩 한 행
#[derive(Debug, Clone)]
pub struct ConceptRow {
    header: Arc<RowHeader>,
    /// 컬럼별 개념 (바인딩되지 않은 optional 변수는 `None`)
    row: Vec<Option<Concept>>,
}

impl ConceptRow {
    /// 새 행 생성
    pub fn new(columns: Vec<String>, row: Vec<Option<Concept>>, query_type: QueryType) -> DriverResult<Self> {
        Self::with_header(Arc::new(RowHeader::new(columns, query_type)), row)
    }

    fn with_header(header: Arc<RowHeader>, row: Vec<Option<Concept>>) -> DriverResult<Self> {
        if row.len() != header.columns.len() {
            return Err(DriverError::protocol(format!(
                "row has {} values for {} columns",
                row.len(),
                header.columns.len()
            )));
        }
        Ok(Self { header, row })
    }

    /// 컬럼 이름 목록
    pub fn column_names(&self) -> &[String] {
        &self.header.columns
    }

    /// 쿼리 종류
    pub fn query_type(&self) -> QueryType {
        self.header.query_type
    }

    /// 컬럼 수
    pub fn len(&self) -> usize {
        self.row.len()
    }

    /// 빈 행 여부
    pub fn is_empty(&self) -> bool {
        self.row.is_empty()
    }

    /// 컬럼 이름으로 개념 가져오기
    ///
    /// 없는 컬럼이면 에러, 바인딩되지 않았으면 `Ok(None)`.
    pub fn get(&self, column: &str) -> DriverResult<Option<&Concept>> {
        let index = self
            .header
            .column_index
            .get(column)
            .ok_or_else(|| DriverError::type_conversion(format!("Column '{}' not found", column)))?;
        Ok(self.row[*index].as_ref())
    }

    /// 인덱스로 개념 가져오기
    pub fn get_index(&self, index: usize) -> DriverResult<Option<&Concept>> {
        self.row
            .get(index)
            .map(Option::as_ref)
            .ok_or_else(|| {
                DriverError::type_conversion(format!(
                    "Column index {} out of range ({} columns)",
                    index,
                    self.row.len()
                ))
            })
    }

    /// 컬럼 값을 타입 변환해서 가져오기
    pub fn get_value<T>(&self, column: &str) -> DriverResult<T>
    where
        T: TryFrom<Value, Error = DriverError>,
    {
        let concept = self
            .get(column)?
            .ok_or_else(|| DriverError::type_conversion(format!("Column '{}' is not bound", column)))?;
        let value = concept.try_get_value().cloned().ok_or_else(|| {
            DriverError::type_conversion(format!("Column '{}' holds a {} without a value", column, concept.label()))
        })?;
        T::try_from(value)
    }

    /// 바인딩된 개념 순회
    pub fn concepts(&self) -> impl Iterator<Item = &Concept> {
        self.row.iter().filter_map(Option::as_ref)
    }
}

impl RowHeader {
    fn new(columns: Vec<String>, query_type: QueryType) -> Self {
        let column_index = columns
            .iter()
            .enumerate()
            .map(|(i, c)| (c.clone(), i))
            .collect();
        Self {
            columns,
            column_index,
            query_type,
        }
    }
}

impl fmt::Display for ConceptRow {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "|")?;
        for (column, concept) in self.header.columns.iter().zip(&self.row) {
            match concept {
                Some(concept) => write!(f, " ${}: {} |", column, concept)?,
                None => write!(f, " ${}: empty |", column)?,
            }
        }
        Ok(())
    }
}

// ============================================================================
// ConceptRowIterator - 행 스트림
// ============================================================================

/// 개념 행 스트림
///
/// 한 번만 소비할 수 있고 지연 수신합니다. 에러를 한 번 돌려준 뒤에는
/// `None`만 반환합니다.
pub struct ConceptRowIterator {
    stream: AnswerStream,
    header: Arc<RowHeader>,
    buffer: VecDeque<Vec<Option<Concept>>>,
}

impl ConceptRowIterator {
    pub(crate) fn new(stream: AnswerStream, query_type: QueryType, columns: Vec<String>) -> Self {
        Self {
            stream,
            header: Arc::new(RowHeader::new(columns, query_type)),
            buffer: VecDeque::new(),
        }
    }

    /// 컬럼 이름 목록
    pub fn column_names(&self) -> &[String] {
        &self.header.columns
    }

    /// 쿼리 종류
    pub fn query_type(&self) -> QueryType {
        self.header.query_type
    }
}

impl Iterator for ConceptRowIterator {
    type Item = DriverResult<ConceptRow>;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            if !self.buffer.is_empty() {
                if let Err(e) = self.stream.check_open() {
                    self.buffer.clear();
                    return Some(Err(e));
                }
                let row = self.buffer.pop_front()?;
                let result = ConceptRow::with_header(Arc::clone(&self.header), row);
                if result.is_err() {
                    self.buffer.clear();
                    self.stream.finish();
                }
                return Some(result);
            }

            match self.stream.next_batch()? {
                Ok(Batch::Rows(rows)) => self.buffer.extend(rows),
                Ok(Batch::Documents(_)) => {
                    self.stream.finish();
                    return Some(Err(DriverError::protocol("documents received on a row stream")));
                }
                Err(e) => return Some(Err(e)),
            }
        }
    }
}

impl fmt::Debug for ConceptRowIterator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ConceptRowIterator")
            .field("columns", &self.header.columns)
            .field("query_type", &self.header.query_type)
            .field("buffered", &self.buffer.len())
            .finish()
    }
}

// ============================================================================
// ConceptDocument - 개념 문서
// ============================================================================

/// fetch 쿼리 결과 문서
#[derive(Debug, Clone, PartialEq)]
pub struct ConceptDocument {
    root: Node,
    query_type: QueryType,
}

impl ConceptDocument {
    /// 새 문서 생성
    pub fn new(root: Node, query_type: QueryType) -> Self {
        Self { root, query_type }
    }

    /// 루트 노드
    pub fn root(&self) -> &Node {
        &self.root
    }

    /// 쿼리 종류
    pub fn query_type(&self) -> QueryType {
        self.query_type
    }

    /// 최상위 키로 노드 가져오기
    pub fn get(&self, key: &str) -> Option<&Node> {
        self.root.as_map().and_then(|map| map.get(key))
    }

    /// 최상위 키 목록 (순서 유지)
    pub fn keys(&self) -> Vec<&str> {
        self.root
            .as_map()
            .map(|map| map.keys().collect())
            .unwrap_or_default()
    }

    /// JSON 값으로 변환
    pub fn to_json(&self) -> serde_json::Value {
        self.root.to_json()
    }

    /// JSON 값으로 변환 (소비)
    pub fn into_json(self) -> serde_json::Value {
        self.to_json()
    }
}

impl fmt::Display for ConceptDocument {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_json())
    }
}

// ============================================================================
// ConceptDocumentIterator - 문서 스트림
// ============================================================================

/// 개념 문서 스트림
pub struct ConceptDocumentIterator {
    stream: AnswerStream,
    query_type: QueryType,
    buffer: VecDeque<Node>,
}

impl ConceptDocumentIterator {
    pub(crate) fn new(stream: AnswerStream, query_type: QueryType) -> Self {
        Self {
            stream,
            query_type,
            buffer: VecDeque::new(),
        }
    }

    /// 쿼리 종류
    pub fn query_type(&self) -> QueryType {
        self.query_type
    }
}

impl Iterator for ConceptDocumentIterator {
    type Item = DriverResult<ConceptDocument>;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            if !self.buffer.is_empty() {
                if let Err(e) = self.stream.check_open() {
                    self.buffer.clear();
                    return Some(Err(e));
                }
                let root = self.buffer.pop_front()?;
                return Some(Ok(ConceptDocument::new(root, self.query_type)));
            }

            match self.stream.next_batch()? {
                Ok(Batch::Documents(documents)) => self.buffer.extend(documents),
                Ok(Batch::Rows(_)) => {
                    self.stream.finish();
                    return Some(Err(DriverError::protocol("rows received on a document stream")));
                }
                Err(e) => return Some(Err(e)),
            }
        }
    }
}

impl fmt::Debug for ConceptDocumentIterator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ConceptDocumentIterator")
            .field("query_type", &self.query_type)
            .field("buffered", &self.buffer.len())
            .finish()
    }
}

// ============================================================================
// Tests
// ============================================================================
