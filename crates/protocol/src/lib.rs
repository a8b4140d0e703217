//! # OTSrv Protocol Library
//!
//! Client frame bodies as seen by the game layer.
//!
//! The transport strips framing, checksums and encryption before a body
//! reaches [`NetworkMessage`]. The first byte of an inbound body is the
//! opcode ("recvbyte") that selects a handler; everything after it is
//! handler-specific payload.
//!
//! ## Usage Example
//!
//! ```rust
//! use otsrv_protocol::NetworkMessage;
//!
//! let mut msg = NetworkMessage::from_bytes(&[0x0A, 0x02, 0x00, b'h', b'i']);
//! let recvbyte = msg.get_byte().unwrap();
//! assert_eq!(recvbyte, 0x0A);
//! assert_eq!(msg.get_string().unwrap(), "hi");
//! ```

pub mod message;

pub use message::{NetworkMessage, MAX_BODY_LENGTH};
