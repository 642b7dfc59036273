//! A tiny blocking HTTP/1.1 server for the integration tests.
//!
//! Routes:
//! - `/status/<code>` answers with that status and an empty body
//! - `/echo` answers with the request body
//! - `/headers` answers with the request header block
//! - `/stall` waits a second before answering
//! - anything else answers `200 hello world`
//!
//! Every response carries `Connection: close`.

#![allow(dead_code)]

use std::io::{BufRead, BufReader, Read, Write};
use std::net::{SocketAddr, TcpListener, TcpStream};
use std::thread;
use std::time::Duration;

pub const HELLO: &[u8] = b"hello world";

pub struct TestServer {
    addr: SocketAddr,
}

impl TestServer {
    pub fn start() -> Self {
        let listener = TcpListener::bind("127.0.0.1:0").expect("bind");
        let addr = listener.local_addr().expect("local addr");

        thread::spawn(move || {
            for stream in listener.incoming() {
                let Ok(stream) = stream else { break };
                thread::spawn(move || {
                    let _ = serve(stream);
                });
            }
        });

        Self { addr }
    }

    pub fn url(&self, path: &str) -> String {
        format!("http://{}{}", self.addr, path)
    }
}

struct Request {
    path: String,
    head: String,
    body: Vec<u8>,
}

fn serve(stream: TcpStream) -> std::io::Result<()> {
    let mut writer = stream.try_clone()?;
    let mut reader = BufReader::new(stream);

    let request = read_request(&mut reader, &mut writer)?;

    if request.path == "/stall" {
        thread::sleep(Duration::from_secs(1));
    }

    let (status, body) = match request.path.as_str() {
        path if path.starts_with("/status/") => {
            let code = path["/status/".len()..].parse().unwrap_or(500);
            (code, Vec::new())
        }
        "/echo" => (200, request.body),
        "/headers" => (200, request.head.into_bytes()),
        _ => (200, HELLO.to_vec()),
    };

    let head = format!(
        "HTTP/1.1 {} {}\r\nContent-Length: {}\r\nConnection: close\r\n\r\n",
        status,
        reason(status),
        body.len()
    );
    writer.write_all(head.as_bytes())?;
    writer.write_all(&body)?;
    writer.flush()
}

fn read_request(
    reader: &mut BufReader<TcpStream>,
    writer: &mut TcpStream,
) -> std::io::Result<Request> {
    let mut request_line = String::new();
    reader.read_line(&mut request_line)?;
    let path = request_line
        .split_whitespace()
        .nth(1)
        .unwrap_or("/")
        .to_owned();

    let mut head = String::new();
    let mut content_length = 0usize;
    let mut chunked = false;
    let mut expect_continue = false;

    loop {
        let mut line = String::new();
        if reader.read_line(&mut line)? == 0 || line == "\r\n" {
            break;
        }

        let lower = line.to_ascii_lowercase();
        if let Some(value) = lower.strip_prefix("content-length:") {
            content_length = value.trim().parse().unwrap_or(0);
        } else if lower.starts_with("transfer-encoding:") && lower.contains("chunked") {
            chunked = true;
        } else if lower.starts_with("expect:") && lower.contains("100-continue") {
            expect_continue = true;
        }
        head.push_str(&line);
    }

    if expect_continue {
        writer.write_all(b"HTTP/1.1 100 Continue\r\n\r\n")?;
        writer.flush()?;
    }

    let body = if chunked {
        read_chunked(reader)?
    } else {
        let mut body = vec![0; content_length];
        reader.read_exact(&mut body)?;
        body
    };

    Ok(Request { path, head, body })
}

fn read_chunked(reader: &mut BufReader<TcpStream>) -> std::io::Result<Vec<u8>> {
    let mut body = Vec::new();

    loop {
        let mut size_line = String::new();
        reader.read_line(&mut size_line)?;
        let size_field = size_line.trim().split(';').next().unwrap_or("0");
        let size = usize::from_str_radix(size_field, 16).unwrap_or(0);

        if size == 0 {
            // Trailers end with an empty line.
            loop {
                let mut line = String::new();
                if reader.read_line(&mut line)? == 0 || line == "\r\n" {
                    return Ok(body);
                }
            }
        }

        let start = body.len();
        body.resize(start + size, 0);
        reader.read_exact(&mut body[start..])?;

        let mut crlf = [0u8; 2];
        reader.read_exact(&mut crlf)?;
    }
}

fn reason(status: u16) -> &'static str {
    match status {
        200 => "OK",
        201 => "Created",
        404 => "Not Found",
        500 => "Internal Server Error",
        _ => "Unknown",
    }
}

/// Installs a test subscriber once; engine logs show up with `--nocapture`.
pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_test_writer()
        .with_max_level(tracing::Level::DEBUG)
        .try_init();
}
