//! Payload builders for each message type.
//!
//! All multi-byte integers are little-endian.

use std::time::Duration;

use super::frame::{Frame, FrameError, MessageType};

/// Longest string a META field can carry (single length byte)
pub const MAX_META_FIELD: usize = u8::MAX as usize;

/// Pixel formats the display knows how to blit
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum ArtFormat {
    Rgb565 = 0x03,
}

/// Truncate to at most `max` bytes without splitting a UTF-8 sequence.
fn truncate_utf8(s: &str, max: usize) -> &str {
    if s.len() <= max {
        return s;
    }
    let mut end = max;
    while !s.is_char_boundary(end) {
        end -= 1;
    }
    &s[..end]
}

fn push_short_str(buf: &mut Vec<u8>, s: &str) {
    let s = truncate_utf8(s, MAX_META_FIELD);
    buf.push(s.len() as u8);
    buf.extend_from_slice(s.as_bytes());
}

/// Whole seconds, saturated to `u32::MAX`
pub fn saturating_secs(d: Duration) -> u32 {
    u32::try_from(d.as_secs()).unwrap_or(u32::MAX)
}

/// `[len][title][len][artist][len][album]`
pub fn meta(title: &str, artist: &str, album: &str) -> Frame {
    let mut payload = Vec::with_capacity(3 + title.len() + artist.len() + album.len());
    push_short_str(&mut payload, title);
    push_short_str(&mut payload, artist);
    push_short_str(&mut payload, album);
    // At most 3 * 256 bytes, always fits
    Frame::new(MessageType::Meta, payload).unwrap_or_else(|_| Frame::empty(MessageType::Meta))
}

pub fn playback_state(code: u8) -> Frame {
    Frame::new(MessageType::PlaybackState, vec![code])
        .unwrap_or_else(|_| Frame::empty(MessageType::PlaybackState))
}

/// `[position u32][duration u32]`, floored to whole seconds
pub fn timeline(position: Duration, duration: Duration) -> Frame {
    let mut payload = Vec::with_capacity(8);
    payload.extend_from_slice(&saturating_secs(position).to_le_bytes());
    payload.extend_from_slice(&saturating_secs(duration).to_le_bytes());
    Frame::new(MessageType::Timeline, payload)
        .unwrap_or_else(|_| Frame::empty(MessageType::Timeline))
}

/// `[total bytes u32][width u16][height u16][format u8]`
pub fn art_begin(total_bytes: u32, width: u16, height: u16, format: ArtFormat) -> Frame {
    let mut payload = Vec::with_capacity(9);
    payload.extend_from_slice(&total_bytes.to_le_bytes());
    payload.extend_from_slice(&width.to_le_bytes());
    payload.extend_from_slice(&height.to_le_bytes());
    payload.push(format as u8);
    Frame::new(MessageType::ArtBegin, payload)
        .unwrap_or_else(|_| Frame::empty(MessageType::ArtBegin))
}

/// `[offset u32][data...]`
pub fn art_chunk(offset: u32, data: &[u8]) -> Result<Frame, FrameError> {
    let mut payload = Vec::with_capacity(4 + data.len());
    payload.extend_from_slice(&offset.to_le_bytes());
    payload.extend_from_slice(data);
    Frame::new(MessageType::ArtChunk, payload)
}

pub fn art_end() -> Frame {
    Frame::empty(MessageType::ArtEnd)
}
