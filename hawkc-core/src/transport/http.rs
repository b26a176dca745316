//! # HTTP Tunnelling
//!
//! [`HttpTransport`] decorates another [`Transport`] so that every flushed batch of
//! bytes travels as the body of an HTTP/1.1 `POST` to a fixed path, and every read is
//! served from the body of the matching response.
//!
//! ## Request
//!
//! ```text
//! POST /thrift/hawk/compact HTTP/1.1
//! host: localhost:8080
//! content-type: application/x-thrift
//! accept: application/x-thrift
//! user-agent: hawkc/0.1.0
//! content-length: 42
//!
//! <42 bytes of payload>
//! ```
//!
//! ## Response
//!
//! The status line and headers are consumed and discarded before the first read. Only
//! `Content-Length` bytes of body are exposed; anything after them stays unread on the
//! wrapped transport. Problems with the envelope are reported as [`FramingError`]s,
//! never as plain I/O errors.
//!
//! The body of a non-success response is read and dropped so the connection can carry
//! the next request. A response whose body cannot be delimited closes the wrapped
//! transport.
use super::{Endpoint, Transport, TransportError};
use bytes::{Buf, Bytes, BytesMut};
use http::{
    HeaderMap, HeaderName, HeaderValue, Method, Request, Response, StatusCode, Version,
    header::{ACCEPT, CONTENT_LENGTH, CONTENT_TYPE, HOST, USER_AGENT},
    uri::PathAndQuery,
};

/// Media type used for both the request body and the accepted response body.
pub const THRIFT_CONTENT_TYPE: &str = "application/x-thrift";

/// Longest status or header line accepted, terminator included.
pub const MAX_HEADER_LINE: usize = 8 * 1024;

/// Most header lines accepted in a single response.
pub const MAX_HEADERS: usize = 64;

/// Default upper bound for a response body.
pub const DEFAULT_MAX_BODY_LEN: usize = 64 * 1024 * 1024;

/// The HTTP envelope around a payload could not be built or understood.
#[derive(Debug, thiserror::Error)]
pub enum FramingError {
    #[error("Malformed status line: '{0}'")]
    MalformedStatusLine(String),
    #[error("Malformed header line: '{0}'")]
    MalformedHeader(String),
    #[error("Response has no Content-Length header")]
    MissingContentLength,
    #[error("Invalid Content-Length header: '{0}'")]
    InvalidContentLength(String),
    #[error("Server answered with non-success status {0}")]
    UnsuccessfulStatus(StatusCode),
    #[error("Header line longer than {MAX_HEADER_LINE} bytes")]
    HeaderLineTooLong,
    #[error("Response has more than {MAX_HEADERS} headers")]
    TooManyHeaders,
    #[error("Response body of {length} bytes exceeds the limit of {limit} bytes")]
    BodyTooLarge { length: usize, limit: usize },
    #[error("Connection ended inside the HTTP response envelope")]
    Truncated,
    #[error("Could not build HTTP request: {0}")]
    InvalidRequest(#[from] http::Error),
}

/// Tunnels a byte stream through HTTP requests against `path`.
#[derive(Debug)]
pub struct HttpTransport<T> {
    inner: T,
    endpoint: Endpoint,
    path: PathAndQuery,
    extra_headers: HeaderMap,
    max_body_len: usize,
    write_buf: BytesMut,
    body: Option<Bytes>,
}

impl<T: Transport> HttpTransport<T> {
    /// Wraps `inner`. `endpoint` only feeds the `Host` header; `inner` decides where the
    /// bytes actually go.
    pub fn new(inner: T, endpoint: Endpoint, path: PathAndQuery) -> Self {
        Self {
            inner,
            endpoint,
            path,
            extra_headers: HeaderMap::new(),
            max_body_len: DEFAULT_MAX_BODY_LEN,
            write_buf: BytesMut::new(),
            body: None,
        }
    }

    /// Adds a header sent with every request, replacing any previous value.
    pub fn with_header(mut self, name: HeaderName, value: HeaderValue) -> Self {
        self.extra_headers.insert(name, value);
        self
    }

    pub fn with_max_body_len(mut self, max_body_len: usize) -> Self {
        self.max_body_len = max_body_len;
        self
    }

    pub fn inner(&self) -> &T {
        &self.inner
    }

    pub fn inner_mut(&mut self) -> &mut T {
        &mut self.inner
    }

    pub fn into_inner(self) -> T {
        self.inner
    }

    fn build_request(&self, body_len: usize) -> Result<Request<()>, FramingError> {
        let mut builder = Request::builder()
            .method(Method::POST)
            .uri(self.path.clone())
            .version(Version::HTTP_11)
            .header(HOST, self.endpoint.to_string())
            .header(CONTENT_TYPE, THRIFT_CONTENT_TYPE)
            .header(ACCEPT, THRIFT_CONTENT_TYPE)
            .header(
                USER_AGENT,
                concat!(env!("CARGO_PKG_NAME"), "/", env!("CARGO_PKG_VERSION")),
            );

        for (name, value) in &self.extra_headers {
            builder = builder.header(name.clone(), value.clone());
        }

        Ok(builder.header(CONTENT_LENGTH, body_len).body(())?)
    }

    fn read_response(&mut self) -> Result<Bytes, TransportError> {
        let response = read_response_head(&mut self.inner).map_err(|err| self.abandon(err))?;
        let status = response.status();
        let length = content_length(response.headers()).and_then(|length| self.within_limit(length));

        if !status.is_success() {
            // The error body still has to leave the wire before the next request.
            let drained = length
                .map_err(TransportError::from)
                .and_then(|length| self.read_body(length));
            if let Err(err) = drained {
                self.abandon(err);
            }
            return Err(FramingError::UnsuccessfulStatus(status).into());
        }

        let length = length.map_err(|err| self.abandon(err.into()))?;
        tracing::debug!(%status, length, "received HTTP response");

        self.read_body(length).map_err(|err| self.abandon(err))
    }

    fn within_limit(&self, length: usize) -> Result<usize, FramingError> {
        if length > self.max_body_len {
            return Err(FramingError::BodyTooLarge {
                length,
                limit: self.max_body_len,
            });
        }
        Ok(length)
    }

    fn read_body(&mut self, length: usize) -> Result<Bytes, TransportError> {
        let mut body = vec![0u8; length];
        self.inner.read(&mut body).map_err(end_of_stream_as_truncated)?;
        Ok(Bytes::from(body))
    }

    /// Closes the wrapped transport, whose position in the response stream is now unknown.
    fn abandon(&mut self, err: TransportError) -> TransportError {
        tracing::warn!(error = %err, "closing connection after unreadable HTTP response");
        self.inner.close();
        err
    }
}

impl<T: Transport> Transport for HttpTransport<T> {
    fn open(&mut self) -> Result<(), TransportError> {
        self.inner.open()
    }

    fn close(&mut self) {
        self.write_buf.clear();
        self.body = None;
        self.inner.close();
    }

    fn is_open(&self) -> bool {
        self.inner.is_open()
    }

    fn read(&mut self, buf: &mut [u8]) -> Result<(), TransportError> {
        if !self.inner.is_open() {
            return Err(TransportError::NotOpen);
        }

        let body = match self.body.take() {
            Some(body) => body,
            None => self.read_response()?,
        };
        let body = self.body.insert(body);

        if body.remaining() < buf.len() {
            return Err(TransportError::EndOfStream {
                wanted: buf.len(),
                available: body.remaining(),
            });
        }

        body.copy_to_slice(buf);
        Ok(())
    }

    fn write(&mut self, buf: &[u8]) -> Result<(), TransportError> {
        if !self.inner.is_open() {
            return Err(TransportError::NotOpen);
        }
        self.write_buf.extend_from_slice(buf);
        Ok(())
    }

    fn flush(&mut self) -> Result<(), TransportError> {
        if !self.inner.is_open() {
            return Err(TransportError::NotOpen);
        }

        let payload = self.write_buf.split();
        let request = self.build_request(payload.len())?;

        tracing::debug!(path = %self.path, length = payload.len(), "sending HTTP request");

        self.inner.write(&encode_request_head(&request))?;
        self.inner.write(&payload)?;
        self.inner.flush()?;

        // Whatever was left of the previous response belongs to an earlier exchange.
        self.body = None;
        Ok(())
    }
}

fn encode_request_head(request: &Request<()>) -> Vec<u8> {
    let path = request
        .uri()
        .path_and_query()
        .map(PathAndQuery::as_str)
        .unwrap_or("/");

    let mut head = format!("{} {} HTTP/1.1\r\n", request.method(), path).into_bytes();
    for (name, value) in request.headers() {
        head.extend_from_slice(name.as_str().as_bytes());
        head.extend_from_slice(b": ");
        head.extend_from_slice(value.as_bytes());
        head.extend_from_slice(b"\r\n");
    }
    head.extend_from_slice(b"\r\n");
    head
}

fn read_response_head<T: Transport>(inner: &mut T) -> Result<Response<()>, TransportError> {
    let status_line = read_line(inner)?;
    let status = parse_status_line(&status_line)?;

    let mut builder = Response::builder().status(status);
    let mut header_count = 0;

    loop {
        let line = read_line(inner)?;
        if line.is_empty() {
            break;
        }

        header_count += 1;
        if header_count > MAX_HEADERS {
            return Err(FramingError::TooManyHeaders.into());
        }

        let (name, value) = parse_header_line(&line)?;
        builder = builder.header(name, value);
    }

    Ok(builder.body(()).map_err(FramingError::from)?)
}

/// Reads one CRLF (or bare LF) terminated line, without the terminator.
fn read_line<T: Transport>(inner: &mut T) -> Result<Vec<u8>, TransportError> {
    let mut line = Vec::new();
    let mut byte = [0u8; 1];

    loop {
        inner.read(&mut byte).map_err(end_of_stream_as_truncated)?;

        if byte[0] == b'\n' {
            if line.last() == Some(&b'\r') {
                line.pop();
            }
            return Ok(line);
        }

        line.push(byte[0]);
        if line.len() >= MAX_HEADER_LINE {
            return Err(FramingError::HeaderLineTooLong.into());
        }
    }
}

fn parse_status_line(line: &[u8]) -> Result<StatusCode, FramingError> {
    let malformed = || FramingError::MalformedStatusLine(String::from_utf8_lossy(line).into_owned());

    let text = std::str::from_utf8(line).map_err(|_| malformed())?;
    let mut parts = text.splitn(3, ' ');

    let version = parts.next().ok_or_else(malformed)?;
    if version != "HTTP/1.1" && version != "HTTP/1.0" {
        return Err(malformed());
    }

    let code = parts.next().ok_or_else(malformed)?;
    if code.len() != 3 {
        return Err(malformed());
    }

    StatusCode::from_bytes(code.as_bytes()).map_err(|_| malformed())
}

fn parse_header_line(line: &[u8]) -> Result<(HeaderName, HeaderValue), FramingError> {
    let malformed = || FramingError::MalformedHeader(String::from_utf8_lossy(line).into_owned());

    let colon = line.iter().position(|&b| b == b':').ok_or_else(malformed)?;
    let (name, value) = (&line[..colon], &line[colon + 1..]);

    let name = HeaderName::from_bytes(name).map_err(|_| malformed())?;
    let value = HeaderValue::from_bytes(value.trim_ascii()).map_err(|_| malformed())?;

    Ok((name, value))
}

fn content_length(headers: &HeaderMap) -> Result<usize, FramingError> {
    let mut values = headers.get_all(CONTENT_LENGTH).iter();
    let first = values.next().ok_or(FramingError::MissingContentLength)?;

    let invalid = |value: &HeaderValue| {
        FramingError::InvalidContentLength(String::from_utf8_lossy(value.as_bytes()).into_owned())
    };

    // Repeated Content-Length headers are only acceptable when they all agree.
    if let Some(other) = values.find(|value| *value != first) {
        return Err(invalid(other));
    }

    first
        .to_str()
        .ok()
        .filter(|text| !text.is_empty() && text.bytes().all(|b| b.is_ascii_digit()))
        .and_then(|text| text.parse::<usize>().ok())
        .ok_or_else(|| invalid(first))
}

fn end_of_stream_as_truncated(err: TransportError) -> TransportError {
    match err {
        TransportError::EndOfStream { .. } => FramingError::Truncated.into(),
        other => other,
    }
}
