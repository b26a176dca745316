//! # Service Client
//!
//! This module implements the request/reply cycle shared by every remote procedure.
//!
//! A remote method is described by a [`Procedure`]: its wire name, how its arguments are
//! laid out and how its result struct is projected onto a Rust type. [`ServiceClient`]
//! runs any procedure over a borrowed [`Transport`]:
//!
//! 1. Writes a `Call` message with a fresh sequence id and flushes it.
//! 2. Reads the reply and checks it answers that call (same sequence id, same method).
//! 3. Turns `Exception` replies into a [`RemoteError`], and hands `Reply` bodies to
//!    [`Procedure::decode_result`].
//!
//! [`HawkClient`] is the typed façade over the Hawk service.
//!
//! ## Example
//!
//! ```rust,no_run
//! use hawkc_core::client::HawkClient;
//! use hawkc_core::transport::{Endpoint, HttpTransport, TcpTransport, Transport};
//!
//! # fn run() -> Result<(), Box<dyn std::error::Error>> {
//! let endpoint = Endpoint::new("localhost", 8080);
//! let socket = TcpTransport::new(endpoint.clone());
//! let mut transport = HttpTransport::new(socket, endpoint, "/thrift/hawk/compact".parse()?);
//!
//! let mut session = transport.open_scoped()?;
//! let mut client = HawkClient::new(&mut *session);
//! for instance in client.list_instances()? {
//!     println!("{} {}", instance.name, instance.state);
//! }
//! # Ok(())
//! # }
//! ```
mod hawk;
mod types;

pub use hawk::*;
pub use types::*;

use crate::error::{ApplicationExceptionKind, CallError, RemoteError, RpcError};
use crate::protocol::{
    CompactProtocol, DecodeError, DecodeLimits, FromValue, MessageHeader, MessageType, Struct,
};
use crate::transport::Transport;

/// Field id of the success value in a result struct. Declared exceptions use 1 and up.
pub const SUCCESS_FIELD: i16 = 0;

/// One remote method.
pub trait Procedure {
    /// Method name as sent on the wire.
    const NAME: &'static str;

    type Output;

    /// Builds the argument struct.
    fn args(&self) -> Struct;

    /// Projects the body of a `Reply` message.
    fn decode_result(&self, result: Struct) -> Result<Self::Output, RpcError>;
}

/// Projects the success field of a non-void result.
///
/// A result with neither a success value nor a declared exception is a
/// [`DecodeError::MissingField`]; callers check their exception fields first.
pub fn take_success<T: FromValue>(result: &mut Struct) -> Result<T, DecodeError> {
    result.take_required(SUCCESS_FIELD)
}

/// Issues calls over a borrowed transport.
///
/// The transport must already be open. Calls are strictly sequential: each one waits
/// for its reply before returning.
///
/// Sequence ids start at 1 and increase by one per call. After `i32::MAX` they start
/// over at 1, so an id is never zero or negative.
#[derive(Debug)]
pub struct ServiceClient<'t, T: Transport> {
    protocol: CompactProtocol<'t, T>,
    next_seq_id: i32,
}

impl<'t, T: Transport> ServiceClient<'t, T> {
    pub fn new(transport: &'t mut T) -> Self {
        Self {
            protocol: CompactProtocol::new(transport),
            next_seq_id: 1,
        }
    }

    pub fn with_limits(mut self, limits: DecodeLimits) -> Self {
        self.protocol = self.protocol.with_limits(limits);
        self
    }

    /// Invokes `procedure` and waits for its result.
    pub fn invoke<P: Procedure>(&mut self, procedure: &P) -> Result<P::Output, CallError> {
        self.call(procedure)
            .map_err(|source| CallError::new(P::NAME, source))
    }

    fn call<P: Procedure>(&mut self, procedure: &P) -> Result<P::Output, RpcError> {
        let seq_id = self.take_seq_id();
        tracing::debug!(method = P::NAME, seq_id, "Sending call");

        let header = MessageHeader::new(P::NAME, MessageType::Call, seq_id);
        self.protocol.write_message(&header, &procedure.args())?;
        self.protocol.flush()?;

        let (reply, body) = self.protocol.read_message()?;
        tracing::debug!(
            method = %reply.name,
            seq_id = reply.seq_id,
            kind = ?reply.kind,
            "Received reply"
        );

        if reply.seq_id != seq_id {
            tracing::warn!(expected = seq_id, received = reply.seq_id, "Discarding out of sequence reply");
            return Err(RpcError::SequenceMismatch {
                expected: seq_id,
                received: reply.seq_id,
            });
        }

        if reply.name != P::NAME {
            tracing::warn!(expected = P::NAME, received = %reply.name, "Discarding reply for another method");
            return Err(RpcError::MethodMismatch {
                expected: P::NAME.to_string(),
                received: reply.name,
            });
        }

        match reply.kind {
            MessageType::Reply => procedure.decode_result(body),
            MessageType::Exception => Err(application_exception(body)?.into()),
            other => Err(RpcError::UnexpectedMessageType(other)),
        }
    }

    fn take_seq_id(&mut self) -> i32 {
        let seq_id = self.next_seq_id;
        self.next_seq_id = seq_id.checked_add(1).unwrap_or(1);
        seq_id
    }
}

/// Reads the body of an `Exception` message: `1: message`, `2: type`, both optional.
fn application_exception(mut body: Struct) -> Result<RemoteError, DecodeError> {
    let message = body.take::<String>(1)?.unwrap_or_default();
    let kind = body
        .take::<i32>(2)?
        .map(ApplicationExceptionKind::from)
        .unwrap_or(ApplicationExceptionKind::Unknown);

    Ok(RemoteError::application(kind, message))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::{ErrorKind, RemoteErrorKind};
    use crate::protocol::Value;
    use crate::transport::MemoryTransport;

    struct Echo(String);

    impl Procedure for Echo {
        const NAME: &'static str = "echo";
        type Output = String;

        fn args(&self) -> Struct {
            Struct::new().with_field(1, self.0.as_str())
        }

        fn decode_result(&self, mut result: Struct) -> Result<String, RpcError> {
            Ok(take_success(&mut result)?)
        }
    }

    fn reply_bytes(header: &MessageHeader, body: &Struct) -> Vec<u8> {
        let mut transport = MemoryTransport::new();
        transport.open().unwrap();
        let mut protocol = CompactProtocol::new(&mut transport);
        protocol.write_message(header, body).unwrap();
        protocol.flush().unwrap();
        transport.take_written().to_vec()
    }

    fn invoke_with_reply(header: MessageHeader, body: Struct) -> (Result<String, CallError>, Vec<u8>) {
        let mut transport = MemoryTransport::with_input(reply_bytes(&header, &body));
        transport.open().unwrap();
        let result = ServiceClient::new(&mut transport).invoke(&Echo("hi".to_string()));
        (result, transport.take_written().to_vec())
    }

    #[test]
    fn call_is_written_with_first_sequence_id() {
        let header = MessageHeader::new("echo", MessageType::Reply, 1);
        let (result, written) = invoke_with_reply(header, Struct::new().with_field(0, "hi"));

        assert_eq!(result.unwrap(), "hi");

        let mut sent = MemoryTransport::with_input(written);
        sent.open().unwrap();
        let (header, args) = CompactProtocol::new(&mut sent).read_message().unwrap();
        assert_eq!(header, MessageHeader::new("echo", MessageType::Call, 1));
        assert_eq!(args.get(1).and_then(Value::as_str), Some("hi"));
    }

    #[test]
    fn sequence_ids_increase_per_call() {
        let first = reply_bytes(
            &MessageHeader::new("echo", MessageType::Reply, 1),
            &Struct::new().with_field(0, "a"),
        );
        let second = reply_bytes(
            &MessageHeader::new("echo", MessageType::Reply, 2),
            &Struct::new().with_field(0, "b"),
        );
        let mut transport = MemoryTransport::with_input([first, second].concat());
        transport.open().unwrap();

        let mut client = ServiceClient::new(&mut transport);
        assert_eq!(client.invoke(&Echo("x".into())).unwrap(), "a");
        assert_eq!(client.invoke(&Echo("y".into())).unwrap(), "b");
    }

    #[test]
    fn sequence_ids_start_over_at_one_after_the_maximum() {
        let mut transport = MemoryTransport::new();
        let mut client = ServiceClient::new(&mut transport);
        client.next_seq_id = i32::MAX;

        assert_eq!(client.take_seq_id(), i32::MAX);
        assert_eq!(client.take_seq_id(), 1);
        assert_eq!(client.take_seq_id(), 2);
    }

    #[test]
    fn mismatched_sequence_id_is_rejected() {
        let header = MessageHeader::new("echo", MessageType::Reply, 7);
        let (result, _) = invoke_with_reply(header, Struct::new().with_field(0, "hi"));

        let err = result.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::ProtocolSequence);
        assert_eq!(err.method, "echo");
        assert!(matches!(
            err.source,
            RpcError::SequenceMismatch {
                expected: 1,
                received: 7
            }
        ));
    }

    #[test]
    fn reply_for_another_method_is_rejected() {
        let header = MessageHeader::new("other", MessageType::Reply, 1);
        let (result, _) = invoke_with_reply(header, Struct::new().with_field(0, "hi"));

        assert_eq!(result.unwrap_err().kind(), ErrorKind::ProtocolSequence);
    }

    #[test]
    fn application_exception_becomes_remote_error() {
        let header = MessageHeader::new("echo", MessageType::Exception, 1);
        let body = Struct::new()
            .with_field(1, "Invalid method name: 'echo'")
            .with_field(2, 1i32);
        let (result, _) = invoke_with_reply(header, body);

        let err = result.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::RemoteApplication);
        match err.source {
            RpcError::Remote(remote) => {
                assert_eq!(remote.message, "Invalid method name: 'echo'");
                assert_eq!(
                    remote.kind,
                    RemoteErrorKind::Application(ApplicationExceptionKind::UnknownMethod)
                );
            }
            other => panic!("unexpected error {other:?}"),
        }
    }

    #[test]
    fn missing_success_field_is_a_decode_error() {
        let header = MessageHeader::new("echo", MessageType::Reply, 1);
        let (result, _) = invoke_with_reply(header, Struct::new());

        let err = result.unwrap_err();
        assert!(matches!(err.source, RpcError::Decode(DecodeError::MissingField(0))));
    }

    #[test]
    fn mistyped_success_field_is_a_decode_error() {
        let header = MessageHeader::new("echo", MessageType::Reply, 1);
        let (result, _) = invoke_with_reply(header, Struct::new().with_field(0, 5i64));

        assert_eq!(result.unwrap_err().kind(), ErrorKind::Decode);
    }

    #[test]
    fn truncated_reply_is_a_decode_error() {
        let mut bytes = reply_bytes(
            &MessageHeader::new("echo", MessageType::Reply, 1),
            &Struct::new().with_field(0, "hello"),
        );
        bytes.truncate(bytes.len() - 3);
        let mut transport = MemoryTransport::with_input(bytes);
        transport.open().unwrap();

        let err = ServiceClient::new(&mut transport)
            .invoke(&Echo("hi".into()))
            .unwrap_err();
        assert!(matches!(err.source, RpcError::Decode(DecodeError::Truncated)));
    }
}
