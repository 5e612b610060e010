//! Wire protocol spoken to the display
//!
//! - `frame`: framing, checksum, and a streaming decoder
//! - `messages`: payload builders for each message type

pub mod frame;
pub mod messages;

pub use frame::{Frame, MessageType};
pub use messages::ArtFormat;
