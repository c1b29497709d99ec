//! CBOR message framing.
//!
//! Messages are written as a single CBOR item with no length prefix. The
//! decoder reads exactly one item, so a request and its response can share
//! one full-duplex connection.

use crate::error::{ProtocolError, ProtocolResult};
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::io::{Cursor, Read, Write};

/// Writes one message to `writer` and flushes it.
///
/// # Errors
///
/// Returns an error if serialization fails or the writer fails.
pub fn write_message<T, W>(writer: &mut W, message: &T) -> ProtocolResult<()>
where
    T: Serialize + ?Sized,
    W: Write + ?Sized,
{
    ciborium::into_writer(message, &mut *writer)?;
    writer.flush()?;
    Ok(())
}

/// Reads exactly one message from `reader`.
///
/// # Errors
///
/// Returns [`ProtocolError::Truncated`] if the stream ends before a whole
/// message arrived, [`ProtocolError::Malformed`] if the bytes do not decode
/// into `T`, and [`ProtocolError::Io`] for stream failures.
pub fn read_message<T, R>(reader: &mut R) -> ProtocolResult<T>
where
    T: DeserializeOwned,
    R: Read + ?Sized,
{
    Ok(ciborium::from_reader(&mut *reader)?)
}

/// Encodes one message into a byte vector.
pub fn encode<T: Serialize + ?Sized>(message: &T) -> ProtocolResult<Vec<u8>> {
    let mut bytes = Vec::new();
    ciborium::into_writer(message, &mut bytes).map_err(|e| match e {
        ciborium::ser::Error::Io(e) => ProtocolError::encoding_failed(e.to_string()),
        ciborium::ser::Error::Value(msg) => ProtocolError::encoding_failed(msg),
    })?;
    Ok(bytes)
}

/// Decodes a buffer holding exactly one message.
///
/// Trailing bytes after the message are rejected.
pub fn decode<T: DeserializeOwned>(bytes: &[u8]) -> ProtocolResult<T> {
    let mut cursor = Cursor::new(bytes);
    let message = read_message(&mut cursor)?;
    let consumed = cursor.position() as usize;
    if consumed != bytes.len() {
        return Err(ProtocolError::malformed(format!(
            "{} trailing bytes after message",
            bytes.len() - consumed
        )));
    }
    Ok(message)
}

/// A protocol message with CBOR encoding helpers.
pub trait Message: Serialize + DeserializeOwned {
    /// Encodes to CBOR.
    fn encode(&self) -> ProtocolResult<Vec<u8>> {
        encode(self)
    }

    /// Decodes from CBOR.
    fn decode(bytes: &[u8]) -> ProtocolResult<Self> {
        decode(bytes)
    }

    /// Writes this message to a stream.
    fn write_to<W: Write + ?Sized>(&self, writer: &mut W) -> ProtocolResult<()> {
        write_message(writer, self)
    }

    /// Reads one message of this type from a stream.
    fn read_from<R: Read + ?Sized>(reader: &mut R) -> ProtocolResult<Self> {
        read_message(reader)
    }
}
