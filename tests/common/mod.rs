//! In-process test server speaking the client wire protocol.
//!
//! Each [`TestServer`] binds a loopback port and runs on its own runtime, so
//! tests drive the blocking client exactly as an application would.

#![allow(dead_code)]

pub mod engine;

use std::collections::{BTreeMap, HashMap, VecDeque};
use std::sync::atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use futures::{SinkExt, StreamExt};
use parking_lot::Mutex;
use tokio::net::{TcpListener, TcpStream};
use tokio::runtime::Runtime;
use tokio::sync::watch;
use tokio_util::codec::Framed;
use tracing::{debug, trace};

use typedb_client::protocol::handshake;
use typedb_client::protocol::{
    ErrorCode, Request, RequestFrame, RequestId, Response, ResponseFrame, ServerCodec, ServerFailure,
    TransactionId, TransactionType,
};
use typedb_client::{Connection, ConnectionConfig, Credentials};

use engine::{Outcome, ServerTransaction, Store};

pub const SERVER_VERSION: &str = "3.0.0-test";

/// Install a test subscriber once; `RUST_LOG` controls verbosity.
pub fn init_logging() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

/// Define `person` with `name` and `age` in `database`.
pub fn define_person_schema(connection: &Connection, database: &str) {
    let tx = connection
        .transaction(database, TransactionType::Schema)
        .expect("open schema transaction");
    tx.run("define entity person, owns name, owns age; attribute name, value string; attribute age, value long;")
        .expect("define schema");
    tx.commit().expect("commit schema");
}

/// Poll `condition` until it holds or `limit` elapses.
pub fn wait_until(limit: Duration, mut condition: impl FnMut() -> bool) -> bool {
    let deadline = Instant::now() + limit;
    while Instant::now() < deadline {
        if condition() {
            return true;
        }
        std::thread::sleep(Duration::from_millis(10));
    }
    condition()
}

// ---------------------------------------------------------------------------
// Server state
// ---------------------------------------------------------------------------

#[derive(Default)]
struct ServerData {
    databases: BTreeMap<String, Store>,
    transactions: HashMap<TransactionId, ServerTransaction>,
    /// username -> password
    users: BTreeMap<String, String>,
}

struct ServerState {
    data: Mutex<ServerData>,
    /// Swallow every request after the handshake
    stalled: AtomicBool,
    next_transaction: AtomicU64,
    next_connection: AtomicU64,
    iids: AtomicU64,
    continue_requests: AtomicUsize,
    queries: AtomicUsize,
}

/// Answer parts waiting for the client to ask for more.
struct PausedStream {
    transaction: TransactionId,
    parts: VecDeque<Response>,
}

/// Per-socket bookkeeping.
#[derive(Default)]
struct Session {
    streams: HashMap<RequestId, PausedStream>,
    transactions: Vec<TransactionId>,
}

impl ServerState {
    fn authenticate(&self, username: &str, password: &str) -> Result<(), ServerFailure> {
        let data = self.data.lock();
        if data.users.get(username).map_or(false, |expected| expected == password) {
            Ok(())
        } else {
            Err(ServerFailure::new(
                ErrorCode::UNAUTHENTICATED,
                format!("Invalid credentials for user '{}'", username),
            ))
        }
    }

    fn handle(&self, session: &mut Session, id: RequestId, request: Request) -> Vec<Response> {
        match request {
            Request::Query {
                transaction,
                query,
                parameters,
            } => {
                self.queries.fetch_add(1, Ordering::SeqCst);
                self.query(session, id, transaction, &query, parameters.include_instance_types, parameters.prefetch_size)
            }
            Request::StreamContinue { transaction } => {
                self.continue_requests.fetch_add(1, Ordering::SeqCst);
                match session.streams.remove(&id) {
                    Some(stream) if stream.transaction == transaction => {
                        let mut responses = Vec::new();
                        resume_stream(session, id, stream, &mut responses);
                        responses
                    }
                    _ => vec![failure(ErrorCode::QUERY_RUNTIME, "No paused answer stream")],
                }
            }
            other => vec![self.handle_simple(session, other).unwrap_or_else(Response::Failure)],
        }
    }

    fn handle_simple(&self, session: &mut Session, request: Request) -> Result<Response, ServerFailure> {
        let mut data = self.data.lock();
        match request {
            Request::DatabasesContains { name } => Ok(Response::Contains {
                value: data.databases.contains_key(&name),
            }),
            Request::DatabasesCreate { name } => {
                if data.databases.contains_key(&name) {
                    return Err(database_exists(name));
                }
                data.databases.insert(name, Store::default());
                Ok(Response::Done)
            }
            Request::DatabasesGet { name } => {
                if data.databases.contains_key(&name) {
                    Ok(Response::Database { name })
                } else {
                    Err(database_not_found(name))
                }
            }
            Request::DatabasesAll => Ok(Response::Databases {
                names: data.databases.keys().cloned().collect(),
            }),
            Request::DatabaseDelete { name } => match data.databases.remove(&name) {
                Some(_) => Ok(Response::Done),
                None => Err(database_not_found(name)),
            },
            Request::DatabaseSchema { name } | Request::DatabaseTypeSchema { name } => {
                match data.databases.get(&name) {
                    Some(store) => Ok(Response::Schema {
                        schema: store.schema.define_text(),
                    }),
                    None => Err(database_not_found(name)),
                }
            }
            Request::UsersContains { name } => Ok(Response::Contains {
                value: data.users.contains_key(&name),
            }),
            Request::UsersCreate { name, password } => {
                if data.users.contains_key(&name) {
                    return Err(
                        ServerFailure::new(ErrorCode::USER_EXISTS, format!("User '{}' already exists", name))
                            .with_subject(name),
                    );
                }
                data.users.insert(name, password);
                Ok(Response::Done)
            }
            Request::UsersGet { name } => {
                if data.users.contains_key(&name) {
                    Ok(Response::User { name })
                } else {
                    Err(user_not_found(name))
                }
            }
            Request::UsersAll => Ok(Response::Users {
                names: data.users.keys().cloned().collect(),
            }),
            Request::UserUpdatePassword { name, password } => match data.users.get_mut(&name) {
                Some(stored) => {
                    *stored = password;
                    Ok(Response::Done)
                }
                None => Err(user_not_found(name)),
            },
            Request::UserDelete { name } => match data.users.remove(&name) {
                Some(_) => Ok(Response::Done),
                None => Err(user_not_found(name)),
            },
            Request::TransactionOpen {
                database,
                transaction_type,
                ..
            } => {
                let snapshot = data
                    .databases
                    .get(&database)
                    .cloned()
                    .ok_or_else(|| database_not_found(database.clone()))?;
                let id = self.next_transaction.fetch_add(1, Ordering::SeqCst);
                data.transactions
                    .insert(id, ServerTransaction::new(database, transaction_type, snapshot));
                session.transactions.push(id);
                Ok(Response::TransactionOpened { transaction: id })
            }
            Request::TransactionCommit { transaction } => {
                let tx = data.transactions.remove(&transaction).ok_or_else(transaction_closed)?;
                session.streams.retain(|_, s| s.transaction != transaction);
                if tx.transaction_type == TransactionType::Read {
                    return Err(ServerFailure::new(
                        ErrorCode::TRANSACTION_INVALID_OPERATION,
                        "Read transactions cannot be committed",
                    ));
                }
                let store = data
                    .databases
                    .get_mut(&tx.database)
                    .ok_or_else(|| database_not_found(tx.database.clone()))?;
                // First committer wins
                if tx.has_changes() && store.version != tx.base_version {
                    return Err(ServerFailure::new(
                        ErrorCode::TRANSACTION_CONFLICT,
                        "Database changed since the transaction opened",
                    ));
                }
                tx.apply_to(store);
                Ok(Response::Done)
            }
            Request::TransactionRollback { transaction } => {
                let database = data
                    .transactions
                    .get(&transaction)
                    .map(|tx| tx.database.clone())
                    .ok_or_else(transaction_closed)?;
                let snapshot = data.databases.get(&database).cloned().unwrap_or_default();
                if let Some(tx) = data.transactions.get_mut(&transaction) {
                    tx.reset(snapshot);
                }
                session.streams.retain(|_, s| s.transaction != transaction);
                Ok(Response::Done)
            }
            Request::TransactionClose { transaction } => {
                data.transactions.remove(&transaction);
                session.streams.retain(|_, s| s.transaction != transaction);
                session.transactions.retain(|t| *t != transaction);
                Ok(Response::Done)
            }
            other => Err(ServerFailure::new(
                ErrorCode::INTERNAL,
                format!("Unexpected request {}", other.name()),
            )),
        }
    }

    fn query(
        &self,
        session: &mut Session,
        id: RequestId,
        transaction: TransactionId,
        query: &str,
        include_instance_types: bool,
        prefetch_size: usize,
    ) -> Vec<Response> {
        let mut data = self.data.lock();
        let tx = match data.transactions.get_mut(&transaction) {
            Some(tx) => tx,
            None => return vec![Response::Failure(transaction_closed())],
        };

        let outcome = match engine::execute(tx, query, include_instance_types, &self.iids) {
            Ok(outcome) => outcome,
            Err(failure) => return vec![Response::Failure(failure)],
        };
        let prefetch_size = prefetch_size.max(1);
        let (header, parts): (Response, VecDeque<Response>) = match outcome {
            Outcome::Ok(query_type) => return vec![Response::QueryOk { query_type }],
            Outcome::Rows {
                query_type,
                columns,
                rows,
            } => (
                Response::QueryRows { query_type, columns },
                rows.chunks(prefetch_size)
                    .map(|chunk| Response::RowsPart { rows: chunk.to_vec() })
                    .collect(),
            ),
            Outcome::Documents { query_type, documents } => (
                Response::QueryDocuments { query_type },
                documents
                    .chunks(prefetch_size)
                    .map(|chunk| Response::DocumentsPart {
                        documents: chunk.to_vec(),
                    })
                    .collect(),
            ),
        };

        let mut responses = vec![header];
        resume_stream(session, id, PausedStream { transaction, parts }, &mut responses);
        responses
    }

    fn release(&self, session: Session) {
        let mut data = self.data.lock();
        for transaction in session.transactions {
            data.transactions.remove(&transaction);
        }
    }
}

/// Emit the next part, then pause or finish.
fn resume_stream(session: &mut Session, id: RequestId, mut stream: PausedStream, responses: &mut Vec<Response>) {
    if let Some(part) = stream.parts.pop_front() {
        responses.push(part);
    }
    if stream.parts.is_empty() {
        responses.push(Response::StreamDone);
    } else {
        responses.push(Response::Continue);
        session.streams.insert(id, stream);
    }
}

fn database_exists(name: String) -> ServerFailure {
    ServerFailure::new(ErrorCode::DATABASE_EXISTS, format!("Database '{}' already exists", name)).with_subject(name)
}

fn database_not_found(name: String) -> ServerFailure {
    ServerFailure::new(ErrorCode::DATABASE_NOT_FOUND, format!("Database '{}' not found", name)).with_subject(name)
}

fn user_not_found(name: String) -> ServerFailure {
    ServerFailure::new(ErrorCode::USER_NOT_FOUND, format!("User '{}' not found", name)).with_subject(name)
}

fn transaction_closed() -> ServerFailure {
    ServerFailure::new(ErrorCode::TRANSACTION_CLOSED, "Transaction is not open")
}

fn failure(code: &str, message: &str) -> Response {
    Response::Failure(ServerFailure::new(code, message))
}

// ---------------------------------------------------------------------------
// Socket handling
// ---------------------------------------------------------------------------

async fn accept_loop(listener: TcpListener, state: Arc<ServerState>, mut shutdown: watch::Receiver<bool>) {
    loop {
        tokio::select! {
            accepted = listener.accept() => match accepted {
                Ok((stream, peer)) => {
                    trace!(%peer, "accepted connection");
                    tokio::spawn(serve_connection(stream, Arc::clone(&state), shutdown.clone()));
                }
                Err(e) => {
                    debug!(error = %e, "accept failed");
                    break;
                }
            },
            _ = shutdown.changed() => break,
        }
    }
}

async fn serve_connection(stream: TcpStream, state: Arc<ServerState>, mut shutdown: watch::Receiver<bool>) {
    let mut framed = Framed::new(stream, ServerCodec::default());

    let first = tokio::select! {
        frame = framed.next() => frame,
        _ = shutdown.changed() => return,
    };
    let (id, open) = match first {
        Some(Ok(RequestFrame {
            id,
            body: Request::ConnectionOpen(open),
        })) => (id, open),
        _ => return,
    };
    let accepted = handshake::check_version(&open).and_then(|()| state.authenticate(&open.username, &open.password));
    let reply = match &accepted {
        Ok(()) => Response::ConnectionOpened {
            connection_id: format!("conn-{}", state.next_connection.fetch_add(1, Ordering::SeqCst)),
            server_version: SERVER_VERSION.to_string(),
        },
        Err(failure) => Response::Failure(failure.clone()),
    };
    if framed.send(ResponseFrame::new(id, reply)).await.is_err() || accepted.is_err() {
        return;
    }

    let mut session = Session::default();
    'connection: loop {
        let frame = tokio::select! {
            frame = framed.next() => frame,
            _ = shutdown.changed() => break,
        };
        let frame = match frame {
            Some(Ok(frame)) => frame,
            _ => break,
        };
        if matches!(frame.body, Request::ConnectionClose) {
            break;
        }
        if state.stalled.load(Ordering::SeqCst) {
            trace!(request = frame.body.name(), "stalled, dropping request");
            continue;
        }

        for response in state.handle(&mut session, frame.id, frame.body) {
            if framed.send(ResponseFrame::new(frame.id, response)).await.is_err() {
                break 'connection;
            }
        }
    }
    state.release(session);
}

// ---------------------------------------------------------------------------
// TestServer
// ---------------------------------------------------------------------------

/// Loopback server with an in-memory engine.
pub struct TestServer {
    address: String,
    state: Arc<ServerState>,
    shutdown: watch::Sender<bool>,
    runtime: Option<Runtime>,
}

impl TestServer {
    pub fn start() -> Self {
        Self::start_with_credentials(Credentials::default())
    }

    pub fn start_with_credentials(credentials: Credentials) -> Self {
        init_logging();

        let runtime = tokio::runtime::Builder::new_multi_thread()
            .worker_threads(2)
            .thread_name("test-server")
            .enable_all()
            .build()
            .expect("build server runtime");
        let listener = runtime
            .block_on(TcpListener::bind("127.0.0.1:0"))
            .expect("bind loopback listener");
        let address = listener.local_addr().expect("listener address").to_string();

        let mut data = ServerData::default();
        data.users
            .insert(credentials.username().to_string(), credentials.password().to_string());

        let state = Arc::new(ServerState {
            data: Mutex::new(data),
            stalled: AtomicBool::new(false),
            next_transaction: AtomicU64::new(1),
            next_connection: AtomicU64::new(1),
            iids: AtomicU64::new(0x1e00),
            continue_requests: AtomicUsize::new(0),
            queries: AtomicUsize::new(0),
        });
        let (shutdown, shutdown_rx) = watch::channel(false);
        runtime.spawn(accept_loop(listener, Arc::clone(&state), shutdown_rx));

        Self {
            address,
            state,
            shutdown,
            runtime: Some(runtime),
        }
    }

    pub fn address(&self) -> &str {
        &self.address
    }

    pub fn config(&self) -> ConnectionConfig {
        ConnectionConfig::new(&self.address).expect("valid loopback address")
    }

    pub fn connect(&self) -> Connection {
        Connection::open(&self.address).expect("connect to test server")
    }

    /// Connect and create `database` with the person schema.
    pub fn connect_with_schema(&self, database: &str) -> Connection {
        let connection = self.connect();
        connection.databases().create(database).expect("create database");
        define_person_schema(&connection, database);
        connection
    }

    /// Drop every socket and stop accepting.
    pub fn kill(&self) {
        let _ = self.shutdown.send(true);
    }

    /// Stop answering requests; sockets stay open.
    pub fn stall(&self) {
        self.state.stalled.store(true, Ordering::SeqCst);
    }

    pub fn continue_requests(&self) -> usize {
        self.state.continue_requests.load(Ordering::SeqCst)
    }

    pub fn queries(&self) -> usize {
        self.state.queries.load(Ordering::SeqCst)
    }

    pub fn open_transactions(&self) -> usize {
        self.state.data.lock().transactions.len()
    }
}

impl Drop for TestServer {
    fn drop(&mut self) {
        self.kill();
        if let Some(runtime) = self.runtime.take() {
            runtime.shutdown_background();
        }
    }
}
