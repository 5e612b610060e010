//! Album art to display bitmap: decode, center-crop, resize, RGB565, chunk.

use image::{imageops::FilterType, DynamicImage, RgbImage};
use thiserror::Error;

use crate::protocol::frame::FrameError;
use crate::protocol::{messages, ArtFormat, Frame};

#[derive(Debug, Error)]
pub enum ArtworkError {
    #[error("could not decode image: {0}")]
    Decode(#[from] image::ImageError),
    #[error("image has no pixels")]
    EmptyImage,
    #[error("target size {0}x{1} does not fit the protocol")]
    BadTarget(u32, u32),
    #[error(transparent)]
    Frame(#[from] FrameError),
    #[error("encoder task failed: {0}")]
    Task(String),
}

/// Target bitmap geometry and transfer chunking
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ArtworkSpec {
    pub width: u32,
    pub height: u32,
    pub chunk_size: usize,
}

impl Default for ArtworkSpec {
    fn default() -> Self {
        Self {
            width: 240,
            height: 200,
            chunk_size: 3072,
        }
    }
}

/// Crop the largest centered region with the target aspect ratio.
pub fn center_crop(img: &DynamicImage, target_width: u32, target_height: u32) -> DynamicImage {
    let (w, h) = (img.width() as u64, img.height() as u64);
    let (tw, th) = (target_width as u64, target_height as u64);

    // w/h > tw/th  <=>  w*th > tw*h
    if w * th > tw * h {
        let new_w = (h * tw / th).clamp(1, w);
        let x = (w - new_w) / 2;
        img.crop_imm(x as u32, 0, new_w as u32, h as u32)
    } else if w * th < tw * h {
        let new_h = (w * th / tw).clamp(1, h);
        let y = (h - new_h) / 2;
        img.crop_imm(0, y as u32, w as u32, new_h as u32)
    } else {
        img.clone()
    }
}

/// Pack 8-bit RGB into 5-6-5 by dropping low bits
pub fn rgb565(r: u8, g: u8, b: u8) -> u16 {
    ((r as u16 >> 3) << 11) | ((g as u16 >> 2) << 5) | (b as u16 >> 3)
}

/// Row-major little-endian RGB565 samples
pub fn to_rgb565_bytes(img: &RgbImage) -> Vec<u8> {
    let mut out = Vec::with_capacity(img.width() as usize * img.height() as usize * 2);
    for pixel in img.pixels() {
        let [r, g, b] = pixel.0;
        out.extend_from_slice(&rgb565(r, g, b).to_le_bytes());
    }
    out
}

/// Decode, crop and resize `source` to the exact target size
pub fn normalize(source: &[u8], spec: &ArtworkSpec) -> Result<RgbImage, ArtworkError> {
    let img = image::load_from_memory(source)?;
    if img.width() == 0 || img.height() == 0 {
        return Err(ArtworkError::EmptyImage);
    }
    let cropped = center_crop(&img, spec.width, spec.height);
    let resized = cropped.resize_exact(spec.width, spec.height, FilterType::Lanczos3);
    Ok(resized.to_rgb8())
}

/// Wrap a finished bitmap as ART_BEGIN, ART_CHUNK x N, ART_END.
pub fn transfer_frames(bitmap: &[u8], spec: &ArtworkSpec) -> Result<Vec<Frame>, ArtworkError> {
    let (width, height) = match (u16::try_from(spec.width), u16::try_from(spec.height)) {
        (Ok(w), Ok(h)) if w > 0 && h > 0 => (w, h),
        _ => return Err(ArtworkError::BadTarget(spec.width, spec.height)),
    };
    let total = u32::try_from(bitmap.len())
        .map_err(|_| ArtworkError::BadTarget(spec.width, spec.height))?;
    let chunk_size = spec.chunk_size.max(1);

    let mut frames = Vec::with_capacity(bitmap.len().div_ceil(chunk_size) + 2);
    frames.push(messages::art_begin(total, width, height, ArtFormat::Rgb565));
    for (i, chunk) in bitmap.chunks(chunk_size).enumerate() {
        let offset = (i * chunk_size) as u32;
        frames.push(messages::art_chunk(offset, chunk)?);
    }
    frames.push(messages::art_end());
    Ok(frames)
}

/// Full pipeline on raw thumbnail bytes. CPU bound, keep it off the event loop.
pub fn encode_artwork(source: &[u8], spec: &ArtworkSpec) -> Result<Vec<Frame>, ArtworkError> {
    let img = normalize(source, spec)?;
    let bitmap = to_rgb565_bytes(&img);
    transfer_frames(&bitmap, spec)
}

/// Run [`encode_artwork`] on the blocking pool.
pub async fn encode_artwork_offloaded(
    source: Vec<u8>,
    spec: ArtworkSpec,
) -> Result<Vec<Frame>, ArtworkError> {
    tokio::task::spawn_blocking(move || encode_artwork(&source, &spec))
        .await
        .map_err(|e| ArtworkError::Task(e.to_string()))?
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::protocol::MessageType;
    use image::{ImageBuffer, ImageFormat, Rgb};
    use std::io::Cursor;

    fn solid_png(width: u32, height: u32, color: [u8; 3]) -> Vec<u8> {
        let img: RgbImage = ImageBuffer::from_pixel(width, height, Rgb(color));
        let mut out = Cursor::new(Vec::new());
        DynamicImage::ImageRgb8(img)
            .write_to(&mut out, ImageFormat::Png)
            .unwrap();
        out.into_inner()
    }

    /// Left third red, middle green, right third blue
    fn striped(width: u32, height: u32) -> DynamicImage {
        let img: RgbImage = ImageBuffer::from_fn(width, height, |x, _| {
            if x < width / 3 {
                Rgb([255, 0, 0])
            } else if x < 2 * width / 3 {
                Rgb([0, 255, 0])
            } else {
                Rgb([0, 0, 255])
            }
        });
        DynamicImage::ImageRgb8(img)
    }

    #[test]
    fn test_rgb565_reference_colors() {
        assert_eq!(rgb565(255, 255, 255), 0xFFFF);
        assert_eq!(rgb565(0, 0, 0), 0x0000);
        assert_eq!(rgb565(255, 0, 0), 0xF800);
        assert_eq!(rgb565(0, 255, 0), 0x07E0);
        assert_eq!(rgb565(0, 0, 255), 0x001F);
    }

    #[test]
    fn test_rgb565_truncates() {
        // 7 -> 0 in 5 bits, 3 -> 0 in 6 bits
        assert_eq!(rgb565(7, 3, 7), 0);
        assert_eq!(rgb565(8, 4, 8), (1 << 11) | (1 << 5) | 1);
    }

    #[test]
    fn test_rgb565_bytes_little_endian() {
        let img: RgbImage = ImageBuffer::from_pixel(2, 1, Rgb([255, 0, 0]));
        assert_eq!(to_rgb565_bytes(&img), vec![0x00, 0xF8, 0x00, 0xF8]);
    }

    #[test]
    fn test_center_crop_wide_source() {
        let img = striped(300, 100);
        let cropped = center_crop(&img, 100, 100);

        assert_eq!((cropped.width(), cropped.height()), (100, 100));
        // Only the green middle band survives
        let rgb = cropped.to_rgb8();
        assert_eq!(rgb.get_pixel(0, 0).0, [0, 255, 0]);
        assert_eq!(rgb.get_pixel(99, 99).0, [0, 255, 0]);
    }

    #[test]
    fn test_center_crop_tall_source() {
        let img = DynamicImage::ImageRgb8(ImageBuffer::from_pixel(100, 400, Rgb([1, 2, 3])));
        let cropped = center_crop(&img, 240, 200);

        assert_eq!((cropped.width(), cropped.height()), (100, 83));
    }

    #[test]
    fn test_center_crop_matching_ratio_is_untouched() {
        let img = striped(480, 400);
        let cropped = center_crop(&img, 240, 200);
        assert_eq!((cropped.width(), cropped.height()), (480, 400));
    }

    #[test]
    fn test_encode_artwork_frame_sequence() {
        let spec = ArtworkSpec {
            width: 40,
            height: 20,
            chunk_size: 512,
        };
        let frames = encode_artwork(&solid_png(64, 64, [255, 255, 255]), &spec).unwrap();
        let total = 40 * 20 * 2;

        assert_eq!(frames.first().unwrap().msg_type(), MessageType::ArtBegin);
        assert_eq!(frames.last().unwrap().msg_type(), MessageType::ArtEnd);
        let chunks: Vec<_> = frames[1..frames.len() - 1].iter().collect();
        assert_eq!(chunks.len(), (total as usize).div_ceil(512));

        let begin = frames[0].payload();
        assert_eq!(u32::from_le_bytes(begin[0..4].try_into().unwrap()), total);
        assert_eq!(u16::from_le_bytes([begin[4], begin[5]]), 40);
        assert_eq!(u16::from_le_bytes([begin[6], begin[7]]), 20);
        assert_eq!(begin[8], ArtFormat::Rgb565 as u8);

        let mut expected_offset = 0u32;
        let mut data = Vec::new();
        for chunk in chunks {
            assert_eq!(chunk.msg_type(), MessageType::ArtChunk);
            let payload = chunk.payload();
            let offset = u32::from_le_bytes(payload[0..4].try_into().unwrap());
            assert_eq!(offset, expected_offset);
            expected_offset += (payload.len() - 4) as u32;
            data.extend_from_slice(&payload[4..]);
        }
        assert_eq!(data.len(), total as usize);
        assert!(data.iter().all(|&b| b == 0xFF));
    }

    #[test]
    fn test_encode_artwork_rejects_garbage() {
        let result = encode_artwork(b"definitely not an image", &ArtworkSpec::default());
        assert!(matches!(result, Err(ArtworkError::Decode(_))));
    }

    #[test]
    fn test_transfer_frames_rejects_oversized_target() {
        let spec = ArtworkSpec {
            width: 70_000,
            height: 1,
            chunk_size: 16,
        };
        assert!(matches!(
            transfer_frames(&[0; 4], &spec),
            Err(ArtworkError::BadTarget(70_000, 1))
        ));
    }

    #[tokio::test]
    async fn test_offloaded_encode() {
        let spec = ArtworkSpec::default();
        let frames = encode_artwork_offloaded(solid_png(300, 300, [0, 0, 0]), spec)
            .await
            .unwrap();
        // 240 * 200 * 2 = 96000 bytes in 3072-byte chunks
        assert_eq!(frames.len(), 2 + 32);
    }
}
