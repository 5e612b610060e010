//! Frame encoding and decoding for the display link.
//!
//! Frame format:
//! - SOF (1 byte): 0x7E synchronization byte
//! - TYPE (1 byte): message type identifier
//! - LEN_LOW, LEN_HIGH (2 bytes): payload length, little-endian
//! - PAYLOAD (0-65535 bytes): type-specific data
//! - CHECKSUM (1 byte): XOR of every preceding byte, SOF included
//!
//! The checksum catches every single-bit error but not flips that cancel
//! out in pairs. The receiving firmware only has to keep a running XOR.

use thiserror::Error;

/// Frame synchronization byte
pub const SOF: u8 = 0x7E;

/// SOF + TYPE + LEN_LOW + LEN_HIGH
pub const HEADER_LEN: usize = 4;

/// Maximum payload size in bytes (16-bit length field)
pub const MAX_PAYLOAD_SIZE: usize = u16::MAX as usize;

/// Errors that can occur during frame parsing or encoding
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum FrameError {
    #[error("payload of {0} bytes exceeds the 16-bit length field")]
    PayloadTooLarge(usize),
    #[error("checksum mismatch: expected {expected:#04x}, got {actual:#04x}")]
    InvalidChecksum { expected: u8, actual: u8 },
    #[error("unknown message type {0:#04x}")]
    UnknownType(u8),
}

/// Message type identifiers understood by the display
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum MessageType {
    Meta = 0x01,
    PlaybackState = 0x02,
    Timeline = 0x03,
    ArtBegin = 0x10,
    ArtChunk = 0x11,
    ArtEnd = 0x12,
}

impl MessageType {
    pub const ALL: [MessageType; 6] = [
        MessageType::Meta,
        MessageType::PlaybackState,
        MessageType::Timeline,
        MessageType::ArtBegin,
        MessageType::ArtChunk,
        MessageType::ArtEnd,
    ];

    pub fn code(self) -> u8 {
        self as u8
    }
}

impl TryFrom<u8> for MessageType {
    type Error = FrameError;

    fn try_from(code: u8) -> Result<Self, Self::Error> {
        Self::ALL
            .into_iter()
            .find(|t| t.code() == code)
            .ok_or(FrameError::UnknownType(code))
    }
}

/// One complete unit of the wire protocol. Immutable once built.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Frame {
    msg_type: MessageType,
    payload: Vec<u8>,
}

impl Frame {
    /// Create a new frame with the given message type and payload
    pub fn new(msg_type: MessageType, payload: Vec<u8>) -> Result<Self, FrameError> {
        if payload.len() > MAX_PAYLOAD_SIZE {
            return Err(FrameError::PayloadTooLarge(payload.len()));
        }
        Ok(Self { msg_type, payload })
    }

    /// Create a frame with no payload
    pub fn empty(msg_type: MessageType) -> Self {
        Self {
            msg_type,
            payload: Vec::new(),
        }
    }

    pub fn msg_type(&self) -> MessageType {
        self.msg_type
    }

    pub fn payload(&self) -> &[u8] {
        &self.payload
    }

    /// Size of the frame on the wire
    pub fn encoded_len(&self) -> usize {
        HEADER_LEN + self.payload.len() + 1
    }

    /// Encode this frame into its wire representation
    pub fn encode(&self) -> Vec<u8> {
        let len = self.payload.len() as u16;
        let mut out = Vec::with_capacity(self.encoded_len());
        out.push(SOF);
        out.push(self.msg_type.code());
        out.extend_from_slice(&len.to_le_bytes());
        out.extend_from_slice(&self.payload);
        out.push(checksum(&out));
        out
    }
}

/// Running XOR over `bytes`
pub fn checksum(bytes: &[u8]) -> u8 {
    bytes.iter().fold(0, |acc, &b| acc ^ b)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ParseState {
    /// Waiting for SOF
    WaitingForStart,
    WaitingForType,
    WaitingForLenLow,
    WaitingForLenHigh,
    ReadingPayload,
    WaitingForChecksum,
}

/// Streaming parser for incoming frames, fed one byte at a time.
///
/// Mirrors what the display firmware does: bytes before SOF are skipped,
/// and a bad checksum or unknown type drops the frame and resynchronizes.
#[derive(Debug, Clone)]
pub struct FrameDecoder {
    state: ParseState,
    msg_type: u8,
    expected_len: usize,
    payload: Vec<u8>,
    running: u8,
}

impl Default for FrameDecoder {
    fn default() -> Self {
        Self::new()
    }
}

impl FrameDecoder {
    pub fn new() -> Self {
        Self {
            state: ParseState::WaitingForStart,
            msg_type: 0,
            expected_len: 0,
            payload: Vec::new(),
            running: 0,
        }
    }

    pub fn reset(&mut self) {
        self.state = ParseState::WaitingForStart;
        self.msg_type = 0;
        self.expected_len = 0;
        self.payload.clear();
        self.running = 0;
    }

    /// Feed a single byte to the parser
    ///
    /// Returns `Ok(Some(frame))` when a complete valid frame is parsed,
    /// `Ok(None)` when more bytes are needed, or `Err` on parse error.
    pub fn feed(&mut self, byte: u8) -> Result<Option<Frame>, FrameError> {
        match self.state {
            ParseState::WaitingForStart => {
                if byte == SOF {
                    self.running = byte;
                    self.state = ParseState::WaitingForType;
                }
                Ok(None)
            }
            ParseState::WaitingForType => {
                self.msg_type = byte;
                self.running ^= byte;
                self.state = ParseState::WaitingForLenLow;
                Ok(None)
            }
            ParseState::WaitingForLenLow => {
                self.expected_len = byte as usize;
                self.running ^= byte;
                self.state = ParseState::WaitingForLenHigh;
                Ok(None)
            }
            ParseState::WaitingForLenHigh => {
                self.expected_len |= (byte as usize) << 8;
                self.running ^= byte;
                self.payload.clear();
                self.payload.reserve(self.expected_len);
                self.state = if self.expected_len == 0 {
                    ParseState::WaitingForChecksum
                } else {
                    ParseState::ReadingPayload
                };
                Ok(None)
            }
            ParseState::ReadingPayload => {
                self.payload.push(byte);
                self.running ^= byte;
                if self.payload.len() == self.expected_len {
                    self.state = ParseState::WaitingForChecksum;
                }
                Ok(None)
            }
            ParseState::WaitingForChecksum => {
                let expected = self.running;
                let code = self.msg_type;
                let payload = std::mem::take(&mut self.payload);
                self.reset();

                if byte != expected {
                    return Err(FrameError::InvalidChecksum {
                        expected,
                        actual: byte,
                    });
                }
                let msg_type = MessageType::try_from(code)?;
                Ok(Some(Frame { msg_type, payload }))
            }
        }
    }
}

/// Decode every complete frame in `bytes`, stopping at the first error.
pub fn decode_frames(bytes: &[u8]) -> Result<Vec<Frame>, FrameError> {
    let mut decoder = FrameDecoder::new();
    let mut frames = Vec::new();
    for &byte in bytes {
        if let Some(frame) = decoder.feed(byte)? {
            frames.push(frame);
        }
    }
    Ok(frames)
}
