//! In-process mock Postgres backend for protocol-level tests.
//!
//! Speaks just enough of the v3 protocol to exercise the client: startup
//! (with optional cleartext or SCRAM-SHA-256 authentication), the simple
//! query protocol, and the extended Parse/Bind/Describe/Execute/Sync
//! pipeline. Session-management statements (`RESET`/`SET`) are answered
//! generically; everything else is routed to a per-test handler.

#![allow(dead_code)]

use base64::{engine::general_purpose::STANDARD as BASE64, Engine};
use hmac::{Hmac, Mac};
use sha2::{Digest, Sha256};
use std::collections::HashMap;
use std::io::{Read, Write};
use std::net::{TcpListener, TcpStream};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::thread::JoinHandle;

type HmacSha256 = Hmac<Sha256>;

/// How the mock authenticates clients
#[derive(Clone)]
pub enum MockAuth {
    /// AuthenticationOk immediately
    Trust,
    /// Request a cleartext password and compare
    Cleartext(String),
    /// Full SCRAM-SHA-256 exchange against this password
    Scram(String),
}

/// Scripted response for one statement
#[derive(Clone)]
pub enum MockResponse {
    /// RowDescription + DataRows + CommandComplete("SELECT <n>")
    Select {
        columns: Vec<String>,
        rows: Vec<Vec<Option<String>>>,
    },
    /// CommandComplete with this tag
    Command(String),
    /// EmptyQueryResponse
    Empty,
    /// ErrorResponse with the given severity/code/message
    Error {
        severity: String,
        code: String,
        message: String,
    },
    /// Pre-encoded backend messages, sent verbatim (ReadyForQuery is
    /// still appended by the server loop)
    Raw(Vec<u8>),
}

impl MockResponse {
    pub fn select_one(column: &str, value: &str) -> Self {
        MockResponse::Select {
            columns: vec![column.to_string()],
            rows: vec![vec![Some(value.to_string())]],
        }
    }

    pub fn error(message: &str) -> Self {
        MockResponse::Error {
            severity: "ERROR".to_string(),
            code: "XX000".to_string(),
            message: message.to_string(),
        }
    }
}

pub type Handler = Arc<dyn Fn(&str) -> MockResponse + Send + Sync>;

/// Route client-side tracing through the test writer; RUST_LOG selects
/// the level
pub fn init_tracing() {
    use tracing_subscriber::EnvFilter;
    let _ = tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

/// Mock server handle; stops on drop
pub struct MockServer {
    port: u16,
    stop: Arc<AtomicBool>,
    accept_thread: Option<JoinHandle<()>>,
    queries: Arc<Mutex<Vec<String>>>,
    parses: Arc<Mutex<Vec<(String, String)>>>,
}

impl MockServer {
    /// Start a trust-auth server with the given statement handler
    pub fn start(handler: impl Fn(&str) -> MockResponse + Send + Sync + 'static) -> Self {
        Self::start_with_auth(MockAuth::Trust, handler)
    }

    pub fn start_with_auth(
        auth: MockAuth,
        handler: impl Fn(&str) -> MockResponse + Send + Sync + 'static,
    ) -> Self {
        init_tracing();
        let listener = TcpListener::bind("127.0.0.1:0").expect("bind mock server");
        let port = listener.local_addr().unwrap().port();
        let stop = Arc::new(AtomicBool::new(false));
        let queries = Arc::new(Mutex::new(Vec::new()));
        let parses = Arc::new(Mutex::new(Vec::new()));

        let handler: Handler = Arc::new(handler);
        let accept_stop = Arc::clone(&stop);
        let accept_queries = Arc::clone(&queries);
        let accept_parses = Arc::clone(&parses);

        let accept_thread = std::thread::spawn(move || {
            for stream in listener.incoming() {
                if accept_stop.load(Ordering::SeqCst) {
                    break;
                }
                let Ok(stream) = stream else { break };
                let auth = auth.clone();
                let handler = Arc::clone(&handler);
                let queries = Arc::clone(&accept_queries);
                let parses = Arc::clone(&accept_parses);
                std::thread::spawn(move || {
                    let _ = serve_connection(stream, auth, handler, queries, parses);
                });
            }
        });

        Self {
            port,
            stop,
            accept_thread: Some(accept_thread),
            queries,
            parses,
        }
    }

    pub fn port(&self) -> u16 {
        self.port
    }

    /// Every simple-protocol SQL string received so far
    pub fn queries(&self) -> Vec<String> {
        self.queries.lock().unwrap().clone()
    }

    /// Every (name, sql) received in a Parse message so far
    pub fn parses(&self) -> Vec<(String, String)> {
        self.parses.lock().unwrap().clone()
    }
}

impl Drop for MockServer {
    fn drop(&mut self) {
        self.stop.store(true, Ordering::SeqCst);
        // Unblock the accept loop
        let _ = TcpStream::connect(("127.0.0.1", self.port));
        if let Some(handle) = self.accept_thread.take() {
            let _ = handle.join();
        }
    }
}

fn serve_connection(
    mut stream: TcpStream,
    auth: MockAuth,
    handler: Handler,
    queries: Arc<Mutex<Vec<String>>>,
    parses: Arc<Mutex<Vec<(String, String)>>>,
) -> std::io::Result<()> {
    // Startup phase; answer SSLRequest with 'N' (no TLS in the mock)
    loop {
        let len = read_i32(&mut stream)?;
        let body = read_exact(&mut stream, (len - 4) as usize)?;
        if len == 8 && body == [0x04, 0xD2, 0x16, 0x2F] {
            stream.write_all(b"N")?;
            continue;
        }
        break;
    }

    if !authenticate(&mut stream, &auth)? {
        return Ok(());
    }

    let mut out = Vec::new();
    write_msg(&mut out, b'K', &{
        let mut b = Vec::new();
        b.extend_from_slice(&4242i32.to_be_bytes());
        b.extend_from_slice(&7777i32.to_be_bytes());
        b
    });
    push_parameter_status(&mut out, "server_version", "16.0");
    push_ready_for_query(&mut out);
    stream.write_all(&out)?;

    // Request loop
    let mut statements: HashMap<String, String> = HashMap::new();
    let mut bound_sql: Option<String> = None;
    let mut pending: Vec<u8> = Vec::new();

    loop {
        let Ok((tag, body)) = read_message(&mut stream) else {
            return Ok(());
        };

        match tag {
            b'Q' => {
                let sql = read_cstr(&body, 0).0;
                queries.lock().unwrap().push(sql.clone());
                let mut out = Vec::new();
                push_response(&mut out, route(&sql, &handler));
                push_ready_for_query(&mut out);
                stream.write_all(&out)?;
            }
            b'P' => {
                let (name, off) = read_cstr(&body, 0);
                let (sql, _) = read_cstr(&body, off);
                statements.insert(name.clone(), sql.clone());
                parses.lock().unwrap().push((name, sql));
                write_msg(&mut pending, b'1', &[]);
            }
            b'B' => {
                let (_portal, off) = read_cstr(&body, 0);
                let (stmt, _) = read_cstr(&body, off);
                bound_sql = statements.get(&stmt).cloned();
                write_msg(&mut pending, b'2', &[]);
            }
            b'D' => {
                // Describe: the client tolerates the absence of
                // ParameterDescription/RowDescription here
            }
            b'E' => {
                let sql = bound_sql.clone().unwrap_or_default();
                push_response(&mut pending, route(&sql, &handler));
            }
            b'S' => {
                push_ready_for_query(&mut pending);
                stream.write_all(&pending)?;
                pending.clear();
            }
            b'X' => return Ok(()),
            _ => {}
        }
    }
}

/// Session-management statements are answered generically; everything
/// else goes to the test handler.
fn route(sql: &str, handler: &Handler) -> MockResponse {
    let trimmed = sql.trim();
    if trimmed.is_empty() {
        MockResponse::Empty
    } else if trimmed.to_ascii_uppercase().starts_with("RESET") {
        MockResponse::Command("RESET".to_string())
    } else if trimmed.to_ascii_uppercase().starts_with("SET") {
        MockResponse::Command("SET".to_string())
    } else {
        handler(trimmed)
    }
}

fn authenticate(stream: &mut TcpStream, auth: &MockAuth) -> std::io::Result<bool> {
    match auth {
        MockAuth::Trust => {
            let mut out = Vec::new();
            push_auth(&mut out, 0, &[]);
            stream.write_all(&out)?;
            Ok(true)
        }
        MockAuth::Cleartext(expected) => {
            let mut out = Vec::new();
            push_auth(&mut out, 3, &[]);
            stream.write_all(&out)?;

            let (tag, body) = read_message(stream)?;
            let password = read_cstr(&body, 0).0;
            if tag != b'p' || &password != expected {
                send_auth_failure(stream)?;
                return Ok(false);
            }
            let mut out = Vec::new();
            push_auth(&mut out, 0, &[]);
            stream.write_all(&out)?;
            Ok(true)
        }
        MockAuth::Scram(password) => scram_exchange(stream, password),
    }
}

/// Server side of SCRAM-SHA-256, built from the same primitives the
/// client uses
fn scram_exchange(stream: &mut TcpStream, password: &str) -> std::io::Result<bool> {
    let mut out = Vec::new();
    push_auth(&mut out, 10, b"SCRAM-SHA-256\0\0");
    stream.write_all(&out)?;

    // SASLInitialResponse: mechanism cstr, i32 length, payload
    let (tag, body) = read_message(stream)?;
    assert_eq!(tag, b'p', "expected SASLInitialResponse");
    let (mechanism, off) = read_cstr(&body, 0);
    assert_eq!(mechanism, "SCRAM-SHA-256");
    let payload = &body[off + 4..];
    let client_first = String::from_utf8_lossy(payload).into_owned();
    let client_first_bare = client_first
        .strip_prefix("n,,")
        .expect("gs2 header")
        .to_string();
    let client_nonce = client_first_bare
        .split(',')
        .find_map(|p| p.strip_prefix("r="))
        .expect("client nonce")
        .to_string();

    let server_nonce = format!("{}mockserverext", client_nonce);
    let salt = b"mock-salt-0123";
    let iterations = 4096u32;
    let server_first = format!(
        "r={},s={},i={}",
        server_nonce,
        BASE64.encode(salt),
        iterations
    );

    let mut out = Vec::new();
    push_auth(&mut out, 11, server_first.as_bytes());
    stream.write_all(&out)?;

    // SASLResponse: `c=biws,r=<nonce>,p=<proof>`
    let (tag, body) = read_message(stream)?;
    assert_eq!(tag, b'p', "expected SASLResponse");
    let client_final = String::from_utf8_lossy(&body).into_owned();
    let (without_proof, proof_b64) = client_final
        .rsplit_once(",p=")
        .expect("client proof attribute");

    let auth_message = format!("{},{},{}", client_first_bare, server_first, without_proof);

    let mut salted = [0u8; 32];
    let _ = pbkdf2::pbkdf2::<HmacSha256>(password.as_bytes(), salt, iterations, &mut salted);
    let client_key = hmac(&salted, b"Client Key");
    let stored_key = Sha256::digest(&client_key);
    let client_signature = hmac(&stored_key, auth_message.as_bytes());
    let expected_proof: Vec<u8> = client_key
        .iter()
        .zip(client_signature.iter())
        .map(|(k, s)| k ^ s)
        .collect();

    if BASE64.decode(proof_b64).ok().as_deref() != Some(&expected_proof[..]) {
        send_auth_failure(stream)?;
        return Ok(false);
    }

    let server_key = hmac(&salted, b"Server Key");
    let server_signature = hmac(&server_key, auth_message.as_bytes());
    let server_final = format!("v={}", BASE64.encode(&server_signature));

    let mut out = Vec::new();
    push_auth(&mut out, 12, server_final.as_bytes());
    push_auth(&mut out, 0, &[]);
    stream.write_all(&out)?;
    Ok(true)
}

fn hmac(key: &[u8], data: &[u8]) -> Vec<u8> {
    let mut mac = HmacSha256::new_from_slice(key).unwrap();
    mac.update(data);
    mac.finalize().into_bytes().to_vec()
}

fn send_auth_failure(stream: &mut TcpStream) -> std::io::Result<()> {
    let mut out = Vec::new();
    push_error_response(
        &mut out,
        "FATAL",
        "28P01",
        "password authentication failed",
    );
    stream.write_all(&out)
}

// ── Backend message writers ──────────────────────────────────────────

pub fn write_msg(out: &mut Vec<u8>, tag: u8, body: &[u8]) {
    out.push(tag);
    out.extend_from_slice(&((body.len() as i32 + 4).to_be_bytes()));
    out.extend_from_slice(body);
}

fn push_auth(out: &mut Vec<u8>, code: i32, extra: &[u8]) {
    let mut body = Vec::new();
    body.extend_from_slice(&code.to_be_bytes());
    body.extend_from_slice(extra);
    write_msg(out, b'R', &body);
}

pub fn push_ready_for_query(out: &mut Vec<u8>) {
    write_msg(out, b'Z', b"I");
}

pub fn push_parameter_status(out: &mut Vec<u8>, name: &str, value: &str) {
    let mut body = Vec::new();
    body.extend_from_slice(name.as_bytes());
    body.push(0);
    body.extend_from_slice(value.as_bytes());
    body.push(0);
    write_msg(out, b'S', &body);
}

pub fn push_row_description(out: &mut Vec<u8>, columns: &[String]) {
    let mut body = Vec::new();
    body.extend_from_slice(&(columns.len() as i16).to_be_bytes());
    for name in columns {
        body.extend_from_slice(name.as_bytes());
        body.push(0);
        body.extend_from_slice(&0i32.to_be_bytes()); // table oid
        body.extend_from_slice(&0i16.to_be_bytes()); // column attr
        body.extend_from_slice(&25i32.to_be_bytes()); // type oid: text
        body.extend_from_slice(&(-1i16).to_be_bytes()); // type size
        body.extend_from_slice(&(-1i32).to_be_bytes()); // type modifier
        body.extend_from_slice(&0i16.to_be_bytes()); // format: text
    }
    write_msg(out, b'T', &body);
}

pub fn push_data_row(out: &mut Vec<u8>, values: &[Option<String>]) {
    let mut body = Vec::new();
    body.extend_from_slice(&(values.len() as i16).to_be_bytes());
    for value in values {
        match value {
            Some(v) => {
                body.extend_from_slice(&(v.len() as i32).to_be_bytes());
                body.extend_from_slice(v.as_bytes());
            }
            None => body.extend_from_slice(&(-1i32).to_be_bytes()),
        }
    }
    write_msg(out, b'D', &body);
}

pub fn push_command_complete(out: &mut Vec<u8>, tag: &str) {
    let mut body = Vec::new();
    body.extend_from_slice(tag.as_bytes());
    body.push(0);
    write_msg(out, b'C', &body);
}

pub fn push_notice(out: &mut Vec<u8>, message: &str) {
    let mut body = Vec::new();
    body.extend_from_slice(b"SNOTICE\0");
    body.extend_from_slice(b"C01000\0");
    body.push(b'M');
    body.extend_from_slice(message.as_bytes());
    body.push(0);
    body.push(0);
    write_msg(out, b'N', &body);
}

pub fn push_error_response(out: &mut Vec<u8>, severity: &str, code: &str, message: &str) {
    let mut body = Vec::new();
    body.push(b'S');
    body.extend_from_slice(severity.as_bytes());
    body.push(0);
    body.push(b'C');
    body.extend_from_slice(code.as_bytes());
    body.push(0);
    body.push(b'M');
    body.extend_from_slice(message.as_bytes());
    body.push(0);
    body.push(0);
    write_msg(out, b'E', &body);
}

fn push_response(out: &mut Vec<u8>, response: MockResponse) {
    match response {
        MockResponse::Select { columns, rows } => {
            push_row_description(out, &columns);
            let count = rows.len();
            for row in &rows {
                push_data_row(out, row);
            }
            push_command_complete(out, &format!("SELECT {}", count));
        }
        MockResponse::Command(tag) => push_command_complete(out, &tag),
        MockResponse::Empty => write_msg(out, b'I', &[]),
        MockResponse::Error {
            severity,
            code,
            message,
        } => push_error_response(out, &severity, &code, &message),
        MockResponse::Raw(bytes) => out.extend_from_slice(&bytes),
    }
}

// ── Frontend message readers ─────────────────────────────────────────

fn read_exact(stream: &mut TcpStream, len: usize) -> std::io::Result<Vec<u8>> {
    let mut buf = vec![0u8; len];
    stream.read_exact(&mut buf)?;
    Ok(buf)
}

fn read_i32(stream: &mut TcpStream) -> std::io::Result<i32> {
    let buf = read_exact(stream, 4)?;
    Ok(i32::from_be_bytes([buf[0], buf[1], buf[2], buf[3]]))
}

fn read_message(stream: &mut TcpStream) -> std::io::Result<(u8, Vec<u8>)> {
    let head = read_exact(stream, 5)?;
    let len = i32::from_be_bytes([head[1], head[2], head[3], head[4]]);
    let body = read_exact(stream, (len - 4) as usize)?;
    Ok((head[0], body))
}

fn read_cstr(body: &[u8], offset: usize) -> (String, usize) {
    let end = body[offset..]
        .iter()
        .position(|&b| b == 0)
        .map(|p| offset + p)
        .unwrap_or(body.len());
    (
        String::from_utf8_lossy(&body[offset..end]).into_owned(),
        end + 1,
    )
}
