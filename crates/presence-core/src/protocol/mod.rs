//! Protocol module: message codes and the JSON envelope codec.

pub mod codes;
pub mod envelope;

pub use codes::MessageCode;
pub use envelope::{decode_inbound, encode_outbound, Envelope, InboundEvent, ProtocolError};
