//! # MineSync Protocol
//!
//! Wire types and CBOR framing for MineSync.
//!
//! This crate provides:
//! - `SyncEnvelope`, the named-payload unit used for uploads and downloads
//! - `SaveManifest`, the remote save listing served by the manifest endpoint
//! - The archive naming scheme shared by client and server
//! - Length-implicit message framing over any `Read`/`Write`
//!
//! Every message is exactly one CBOR data item. CBOR items carry their own
//! lengths, so no extra framing is written: a reader decodes one item and
//! stops at its end, leaving the stream positioned for the next exchange.
//!
//! This is a pure protocol crate; it never opens connections itself.

#![deny(unsafe_code)]
#![warn(missing_docs)]

mod archive_name;
mod codec;
mod error;
mod messages;

pub use archive_name::{archive_name, is_archive_name, ARCHIVE_PREFIX, ARCHIVE_SUFFIX};
pub use codec::{decode, encode, read_message, write_message, Message};
pub use error::{ProtocolError, ProtocolResult};
pub use messages::{SaveManifest, SaveRecord, SyncEnvelope};
