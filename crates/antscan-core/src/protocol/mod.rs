//! Protocol module containing the device command kinds and the JSON codec.

pub mod codec;
pub mod messages;

pub use codec::{decode_response, encode_request, ProtocolError};
pub use messages::*;
