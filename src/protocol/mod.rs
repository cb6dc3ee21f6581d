//! Push protocol: message model and wire framing

pub mod codec;
pub mod message;

pub use codec::{FrameDecoder, FrameEncoder, DEFAULT_MAX_FRAME_SIZE};
pub use message::{ClientMessage, ServerMessage, SubscribeMessage, UnsubscribeMessage};
