//! A scripted Hawk server running on a background thread.
//!
//! Each accepted connection is served until the client hangs up. Every call is decoded,
//! recorded and handed to the test's handler, which decides what goes back.
#![allow(dead_code)]

use hawkc_core::client::{HawkInstanceNotFound, Instance};
use hawkc_core::protocol::{
    CompactProtocol, IntoValue, List, MessageHeader, MessageType, Struct, TType, Value,
};
use hawkc_core::transport::{Endpoint, MemoryTransport, Transport, TransportError};
use std::io::{BufRead, BufReader, Read, Write};
use std::net::{Shutdown, TcpListener, TcpStream};
use std::sync::{Arc, Mutex};
use std::thread;

/// What the server sends back for one call.
pub enum Reply {
    /// An encoded message.
    Message(MessageHeader, Struct),
    /// An empty HTTP response with this status. Only meaningful over HTTP.
    HttpStatus(u16),
    /// These bytes, verbatim, after which the connection is closed.
    Raw(Vec<u8>),
}

impl Reply {
    /// A successful reply to `call`.
    pub fn to(call: &MessageHeader, body: Struct) -> Self {
        Reply::Message(
            MessageHeader::new(call.name.clone(), MessageType::Reply, call.seq_id),
            body,
        )
    }
}

/// One call as seen by the server.
#[derive(Debug, Clone)]
pub struct Recorded {
    pub header: MessageHeader,
    pub args: Struct,
    /// Request target and headers, for calls that came over HTTP.
    pub http: Option<HttpRequest>,
}

#[derive(Debug, Clone)]
pub struct HttpRequest {
    pub method: String,
    pub path: String,
    pub headers: Vec<(String, String)>,
}

impl HttpRequest {
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(n, _)| n.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }
}

type Handler = Box<dyn FnMut(&MessageHeader, Struct) -> Reply + Send>;

#[derive(Clone, Copy, PartialEq, Eq)]
enum Mode {
    Http,
    Socket,
}

pub struct FakeHawk {
    endpoint: Endpoint,
    recorded: Arc<Mutex<Vec<Recorded>>>,
}

impl FakeHawk {
    pub fn http(handler: impl FnMut(&MessageHeader, Struct) -> Reply + Send + 'static) -> Self {
        Self::spawn(Mode::Http, Box::new(handler))
    }

    pub fn socket(handler: impl FnMut(&MessageHeader, Struct) -> Reply + Send + 'static) -> Self {
        Self::spawn(Mode::Socket, Box::new(handler))
    }

    fn spawn(mode: Mode, mut handler: Handler) -> Self {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let port = listener.local_addr().unwrap().port();
        let recorded = Arc::new(Mutex::new(Vec::new()));

        let log = Arc::clone(&recorded);
        thread::spawn(move || {
            for stream in listener.incoming() {
                let Ok(stream) = stream else { break };
                match mode {
                    Mode::Http => serve_http(stream, &mut handler, &log),
                    Mode::Socket => serve_socket(stream, &mut handler, &log),
                }
            }
        });

        Self {
            endpoint: Endpoint::new("127.0.0.1", port),
            recorded,
        }
    }

    pub fn endpoint(&self) -> Endpoint {
        self.endpoint.clone()
    }

    pub fn port(&self) -> u16 {
        self.endpoint.port()
    }

    pub fn recorded(&self) -> Vec<Recorded> {
        self.recorded.lock().unwrap().clone()
    }
}

/// Answers the Hawk operations from a fixed set of instances.
pub fn hawk(instances: Vec<Instance>) -> impl FnMut(&MessageHeader, Struct) -> Reply + Send + 'static {
    move |call: &MessageHeader, mut args: Struct| match call.name.as_str() {
        "listInstances" => Reply::to(call, Struct::new().with_field(0, instance_list(&instances))),
        "listBackends" => Reply::to(
            call,
            Struct::new().with_field(0, vec!["org.hawk.orientdb.OrientDatabase".to_string()]),
        ),
        "listPlugins" => Reply::to(call, Struct::new().with_field(0, Vec::<String>::new())),
        "startInstance" | "stopInstance" | "removeInstance" => {
            let name = args.take::<String>(1).ok().flatten().unwrap_or_default();
            if instances.iter().any(|i| i.name == name) {
                Reply::to(call, Struct::new())
            } else {
                Reply::to(call, Struct::new().with_field(1, HawkInstanceNotFound))
            }
        }
        other => application_exception(call, &format!("Invalid method name: '{other}'"), 1),
    }
}

/// An `Exception` message as a Thrift server runtime sends it.
pub fn application_exception(call: &MessageHeader, message: &str, kind: i32) -> Reply {
    Reply::Message(
        MessageHeader::new(call.name.clone(), MessageType::Exception, call.seq_id),
        Struct::new().with_field(1, message).with_field(2, kind),
    )
}

fn instance_list(instances: &[Instance]) -> Value {
    let items = instances.iter().cloned().map(IntoValue::into_value).collect();
    Value::List(List::with_items(TType::Struct, items))
}

pub fn encode(header: &MessageHeader, body: &Struct) -> Vec<u8> {
    let mut transport = MemoryTransport::new();
    transport.open().unwrap();
    let mut protocol = CompactProtocol::new(&mut transport);
    protocol.write_message(header, body).unwrap();
    protocol.flush().unwrap();
    transport.take_written().to_vec()
}

fn serve_http(stream: TcpStream, handler: &mut Handler, log: &Mutex<Vec<Recorded>>) {
    let mut writer = stream.try_clone().unwrap();
    let mut reader = BufReader::new(stream);

    while let Some((request, body)) = read_http_request(&mut reader) {
        let mut transport = MemoryTransport::with_input(&body);
        transport.open().unwrap();
        let (header, args) = CompactProtocol::new(&mut transport).read_message().unwrap();

        log.lock().unwrap().push(Recorded {
            header: header.clone(),
            args: args.clone(),
            http: Some(request),
        });

        match handler(&header, args) {
            Reply::Message(header, body) => {
                let payload = encode(&header, &body);
                let head = format!(
                    "HTTP/1.1 200 OK\r\nContent-Type: application/x-thrift\r\nContent-Length: {}\r\n\r\n",
                    payload.len()
                );
                writer.write_all(head.as_bytes()).unwrap();
                writer.write_all(&payload).unwrap();
            }
            Reply::HttpStatus(code) => {
                let head = format!("HTTP/1.1 {code} Fake\r\nContent-Length: 0\r\n\r\n");
                writer.write_all(head.as_bytes()).unwrap();
            }
            Reply::Raw(bytes) => {
                writer.write_all(&bytes).unwrap();
                let _ = writer.shutdown(Shutdown::Both);
                return;
            }
        }
        writer.flush().unwrap();
    }
}

fn read_http_request(reader: &mut BufReader<TcpStream>) -> Option<(HttpRequest, Vec<u8>)> {
    let mut line = String::new();
    if reader.read_line(&mut line).ok()? == 0 {
        return None;
    }
    let mut parts = line.split_whitespace();
    let method = parts.next()?.to_string();
    let path = parts.next()?.to_string();

    let mut headers = Vec::new();
    loop {
        line.clear();
        reader.read_line(&mut line).ok()?;
        let trimmed = line.trim_end();
        if trimmed.is_empty() {
            break;
        }
        let (name, value) = trimmed.split_once(':')?;
        headers.push((name.trim().to_string(), value.trim().to_string()));
    }

    let request = HttpRequest {
        method,
        path,
        headers,
    };
    let length: usize = request.header("content-length")?.parse().ok()?;
    let mut body = vec![0u8; length];
    reader.read_exact(&mut body).ok()?;
    Some((request, body))
}

/// Server side of a raw socket connection.
struct StreamTransport {
    stream: TcpStream,
}

impl Transport for StreamTransport {
    fn open(&mut self) -> Result<(), TransportError> {
        Ok(())
    }

    fn close(&mut self) {
        let _ = self.stream.shutdown(Shutdown::Both);
    }

    fn is_open(&self) -> bool {
        true
    }

    fn read(&mut self, buf: &mut [u8]) -> Result<(), TransportError> {
        self.stream.read_exact(buf)?;
        Ok(())
    }

    fn write(&mut self, buf: &[u8]) -> Result<(), TransportError> {
        self.stream.write_all(buf)?;
        Ok(())
    }

    fn flush(&mut self) -> Result<(), TransportError> {
        self.stream.flush()?;
        Ok(())
    }
}

fn serve_socket(stream: TcpStream, handler: &mut Handler, log: &Mutex<Vec<Recorded>>) {
    let mut transport = StreamTransport { stream };

    loop {
        let Ok((header, args)) = CompactProtocol::new(&mut transport).read_message() else {
            return;
        };

        log.lock().unwrap().push(Recorded {
            header: header.clone(),
            args: args.clone(),
            http: None,
        });

        match handler(&header, args) {
            Reply::Message(header, body) => {
                transport.write(&encode(&header, &body)).unwrap();
            }
            Reply::HttpStatus(_) => panic!("HTTP status reply on a raw socket"),
            Reply::Raw(bytes) => {
                transport.write(&bytes).unwrap();
                transport.close();
                return;
            }
        }
    }
}
