/// Wire protocol: message framing and request/reply bodies
///
/// Every message starts with a 16-byte little-endian header
/// (`length, request_id, response_to, op_code`). The client sends query and
/// get-more requests and reads reply messages; decoders for the request side
/// exist as well so the same codec can back an in-process server.
pub mod port;

pub use port::{MessagingPort, Stream};

use crate::core::{Document, QueryOptions};
use crate::error::{TandemError, TandemResult};
use bytes::{Buf, BufMut, Bytes, BytesMut};
use std::io::{self, Read, Write};

pub const HEADER_LEN: usize = 16;
pub const MAX_MESSAGE_LEN: usize = 48 * 1024 * 1024;

/// Message operation codes
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OpCode {
    Reply = 1,
    Query = 2004,
    GetMore = 2005,
}

impl TryFrom<i32> for OpCode {
    type Error = TandemError;

    fn try_from(value: i32) -> TandemResult<Self> {
        match value {
            1 => Ok(OpCode::Reply),
            2004 => Ok(OpCode::Query),
            2005 => Ok(OpCode::GetMore),
            other => Err(TandemError::protocol(format!("unknown op code {}", other))),
        }
    }
}

/// Reply result flags
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ResponseFlags(i32);

impl ResponseFlags {
    pub const NONE: ResponseFlags = ResponseFlags(0);
    /// Get-more named a cursor the server no longer has
    pub const CURSOR_NOT_FOUND: ResponseFlags = ResponseFlags(1);
    /// The query failed; the single returned document is a `$err` document
    pub const QUERY_FAILURE: ResponseFlags = ResponseFlags(2);

    pub fn from_bits(bits: i32) -> Self {
        Self(bits)
    }

    pub fn bits(self) -> i32 {
        self.0
    }

    pub fn contains(self, other: ResponseFlags) -> bool {
        self.0 & other.0 == other.0
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MsgHeader {
    pub message_length: i32,
    pub request_id: i32,
    pub response_to: i32,
    pub op_code: OpCode,
}

/// One framed message. The body is owned and handed to whoever consumes it.
#[derive(Debug, Clone)]
pub struct Message {
    pub header: MsgHeader,
    pub body: Bytes,
}

impl Message {
    pub fn new(op_code: OpCode, body: Bytes) -> Self {
        Self {
            header: MsgHeader {
                message_length: (HEADER_LEN + body.len()) as i32,
                request_id: 0,
                response_to: 0,
                op_code,
            },
            body,
        }
    }

    /// Message carrying `body`, rejected when it would exceed
    /// [`MAX_MESSAGE_LEN`] on the wire
    pub fn framed(op_code: OpCode, body: Bytes) -> TandemResult<Self> {
        if HEADER_LEN + body.len() > MAX_MESSAGE_LEN {
            return Err(TandemError::protocol(format!(
                "message of {} bytes exceeds the {} byte limit",
                HEADER_LEN + body.len(),
                MAX_MESSAGE_LEN
            )));
        }
        Ok(Self::new(op_code, body))
    }

    pub fn write_to<W: Write>(&self, writer: &mut W) -> io::Result<()> {
        if HEADER_LEN + self.body.len() > MAX_MESSAGE_LEN {
            return Err(io::Error::new(
                io::ErrorKind::InvalidInput,
                format!("message body of {} bytes is too large", self.body.len()),
            ));
        }
        let mut buf = BytesMut::with_capacity(HEADER_LEN + self.body.len());
        buf.put_i32_le((HEADER_LEN + self.body.len()) as i32);
        buf.put_i32_le(self.header.request_id);
        buf.put_i32_le(self.header.response_to);
        buf.put_i32_le(self.header.op_code as i32);
        buf.put_slice(&self.body);
        writer.write_all(&buf)?;
        writer.flush()
    }

    /// Read exactly one message. Framing problems surface as `InvalidData`.
    pub fn read_from<R: Read>(reader: &mut R) -> io::Result<Message> {
        let mut header = [0u8; HEADER_LEN];
        reader.read_exact(&mut header)?;
        let mut hdr = &header[..];
        let message_length = hdr.get_i32_le();
        let request_id = hdr.get_i32_le();
        let response_to = hdr.get_i32_le();
        let op_code = OpCode::try_from(hdr.get_i32_le())
            .map_err(|e| io::Error::new(io::ErrorKind::InvalidData, e.to_string()))?;

        let total = usize::try_from(message_length).unwrap_or(0);
        if !(HEADER_LEN..=MAX_MESSAGE_LEN).contains(&total) {
            return Err(io::Error::new(
                io::ErrorKind::InvalidData,
                format!("bad message length {}", message_length),
            ));
        }

        let mut body = vec![0u8; total - HEADER_LEN];
        reader.read_exact(&mut body)?;

        Ok(Message {
            header: MsgHeader {
                message_length,
                request_id,
                response_to,
                op_code,
            },
            body: Bytes::from(body),
        })
    }
}

/// Query request body
#[derive(Debug, Clone, PartialEq)]
pub struct QueryRequest {
    pub options: QueryOptions,
    pub ns: String,
    pub n_to_skip: i32,
    pub n_to_return: i32,
    pub query: Document,
    pub fields: Option<Document>,
}

impl QueryRequest {
    pub fn to_message(&self) -> TandemResult<Message> {
        let mut buf = BytesMut::new();
        buf.put_i32_le(self.options.bits());
        put_cstring(&mut buf, &self.ns)?;
        buf.put_i32_le(self.n_to_skip);
        buf.put_i32_le(self.n_to_return);
        self.query.encode_into(&mut buf)?;
        if let Some(fields) = &self.fields {
            fields.encode_into(&mut buf)?;
        }
        Message::framed(OpCode::Query, buf.freeze())
    }

    pub fn from_message(message: &Message) -> TandemResult<Self> {
        expect_op(message, OpCode::Query)?;
        let mut body = message.body.clone();
        let options = QueryOptions::from_bits_truncate(get_i32(&mut body)?);
        let ns = get_cstring(&mut body)?;
        let n_to_skip = get_i32(&mut body)?;
        let n_to_return = get_i32(&mut body)?;
        let query = Document::decode_from(&mut body)?;
        let fields = if body.has_remaining() {
            Some(Document::decode_from(&mut body)?)
        } else {
            None
        };
        Ok(Self {
            options,
            ns,
            n_to_skip,
            n_to_return,
            query,
            fields,
        })
    }
}

/// Get-more request body
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GetMoreRequest {
    pub ns: String,
    pub n_to_return: i32,
    pub cursor_id: i64,
}

impl GetMoreRequest {
    pub fn to_message(&self) -> TandemResult<Message> {
        let mut buf = BytesMut::new();
        buf.put_i32_le(0);
        put_cstring(&mut buf, &self.ns)?;
        buf.put_i32_le(self.n_to_return);
        buf.put_i64_le(self.cursor_id);
        Message::framed(OpCode::GetMore, buf.freeze())
    }

    pub fn from_message(message: &Message) -> TandemResult<Self> {
        expect_op(message, OpCode::GetMore)?;
        let mut body = message.body.clone();
        let _reserved = get_i32(&mut body)?;
        let ns = get_cstring(&mut body)?;
        let n_to_return = get_i32(&mut body)?;
        if body.remaining() < 8 {
            return Err(TandemError::protocol("truncated cursor id"));
        }
        let cursor_id = body.get_i64_le();
        Ok(Self {
            ns,
            n_to_return,
            cursor_id,
        })
    }
}

/// Reply body. `documents` holds `n_returned` encoded documents back-to-back
/// and is moved, not copied, into the cursor that reads it.
#[derive(Debug, Clone)]
pub struct QueryReply {
    pub flags: ResponseFlags,
    pub cursor_id: i64,
    pub starting_from: i32,
    pub n_returned: i32,
    pub documents: Bytes,
}

impl QueryReply {
    /// Reply carrying `docs`; a zero `cursor_id` closes the cursor
    pub fn batch(cursor_id: i64, starting_from: i32, docs: &[Document]) -> TandemResult<Self> {
        let mut buf = BytesMut::new();
        for doc in docs {
            doc.encode_into(&mut buf)?;
        }
        Ok(Self {
            flags: ResponseFlags::NONE,
            cursor_id,
            starting_from,
            n_returned: docs.len() as i32,
            documents: buf.freeze(),
        })
    }

    pub fn cursor_not_found() -> Self {
        Self {
            flags: ResponseFlags::CURSOR_NOT_FOUND,
            cursor_id: 0,
            starting_from: 0,
            n_returned: 0,
            documents: Bytes::new(),
        }
    }

    /// Failed query: a single `$err` document and the failure flag
    pub fn query_failure(message: &str) -> TandemResult<Self> {
        let mut reply = Self::batch(0, 0, &[Document::with("$err", message)])?;
        reply.flags = ResponseFlags::QUERY_FAILURE;
        Ok(reply)
    }

    pub fn to_message(&self, response_to: i32) -> Message {
        let mut buf = BytesMut::with_capacity(20 + self.documents.len());
        buf.put_i32_le(self.flags.bits());
        buf.put_i64_le(self.cursor_id);
        buf.put_i32_le(self.starting_from);
        buf.put_i32_le(self.n_returned);
        buf.put_slice(&self.documents);
        let mut message = Message::new(OpCode::Reply, buf.freeze());
        message.header.response_to = response_to;
        message
    }

    pub fn from_message(message: Message) -> TandemResult<Self> {
        expect_op(&message, OpCode::Reply)?;
        let mut body = message.body;
        if body.remaining() < 20 {
            return Err(TandemError::protocol("truncated reply header"));
        }
        let flags = ResponseFlags::from_bits(body.get_i32_le());
        let cursor_id = body.get_i64_le();
        let starting_from = body.get_i32_le();
        let n_returned = body.get_i32_le();
        if n_returned < 0 {
            return Err(TandemError::protocol(format!(
                "negative document count {}",
                n_returned
            )));
        }
        Ok(Self {
            flags,
            cursor_id,
            starting_from,
            n_returned,
            documents: body,
        })
    }
}

fn expect_op(message: &Message, op_code: OpCode) -> TandemResult<()> {
    if message.header.op_code != op_code {
        return Err(TandemError::protocol(format!(
            "expected {:?} message, got {:?}",
            op_code, message.header.op_code
        )));
    }
    Ok(())
}

fn put_cstring(buf: &mut BytesMut, s: &str) -> TandemResult<()> {
    if s.as_bytes().contains(&0) {
        return Err(TandemError::protocol("string contains a NUL byte"));
    }
    buf.put_slice(s.as_bytes());
    buf.put_u8(0);
    Ok(())
}

fn get_cstring(buf: &mut Bytes) -> TandemResult<String> {
    let end = buf
        .iter()
        .position(|&b| b == 0)
        .ok_or_else(|| TandemError::protocol("unterminated string"))?;
    let raw = buf.split_to(end);
    buf.advance(1);
    String::from_utf8(raw.to_vec()).map_err(|e| TandemError::protocol(e.to_string()))
}

fn get_i32(buf: &mut Bytes) -> TandemResult<i32> {
    if buf.remaining() < 4 {
        return Err(TandemError::protocol("truncated integer"));
    }
    Ok(buf.get_i32_le())
}
