//! Binary sniffing of native pixel dimensions for common raster formats.
//!
//! Word-processing containers store images without any normalised size
//! metadata, and the assembler needs the native dimensions to scale images
//! proportionally. Rather than pulling in a full image decoder, this module
//! reads the handful of fixed header offsets that PNG, JPEG, and GIF
//! define. Anything it cannot understand resolves to a safe fallback —
//! this function must never fail, because a bad image header should cost
//! one caption's worth of accuracy, not the whole document.

use tracing::warn;

/// Fallback dimensions used whenever the real ones cannot be determined.
pub const FALLBACK_DIMENSIONS: (u32, u32) = (600, 400);

/// Dimensions above this on either axis are treated as header corruption.
const MAX_SANE_DIMENSION: u32 = 10_000;

/// Coarse raster-format classification of an embedded image.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MimeClass {
    Png,
    Jpeg,
    Gif,
    Bmp,
    Other,
}

impl MimeClass {
    /// Classify a media entry by its package path extension.
    pub fn from_media_path(path: &str) -> Self {
        let lower = path.to_ascii_lowercase();
        if lower.ends_with(".png") {
            MimeClass::Png
        } else if lower.ends_with(".jpg") || lower.ends_with(".jpeg") {
            MimeClass::Jpeg
        } else if lower.ends_with(".gif") {
            MimeClass::Gif
        } else if lower.ends_with(".bmp") {
            MimeClass::Bmp
        } else {
            MimeClass::Other
        }
    }

    /// Whether a media path names a raster format worth extracting.
    pub fn is_raster_path(path: &str) -> bool {
        !matches!(Self::from_media_path(path), MimeClass::Other)
    }

    /// The IANA media type sent to the vision model.
    pub fn as_mime_type(&self) -> &'static str {
        match self {
            MimeClass::Png => "image/png",
            MimeClass::Jpeg => "image/jpeg",
            MimeClass::Gif => "image/gif",
            MimeClass::Bmp => "image/bmp",
            MimeClass::Other => "image/png",
        }
    }
}

/// Read the native `(width, height)` of an image buffer.
///
/// Supports PNG (big-endian pair in the IHDR chunk), JPEG (scan marker
/// segments for the first SOF0/SOF2 frame header), and GIF (little-endian
/// pair in the logical screen descriptor). Any format mismatch, truncated
/// buffer, or out-of-range value yields [`FALLBACK_DIMENSIONS`].
pub fn sniff_dimensions(buffer: &[u8], mime: MimeClass) -> (u32, u32) {
    if buffer.len() < 24 {
        warn!("image buffer too small to carry a header ({} bytes)", buffer.len());
        return FALLBACK_DIMENSIONS;
    }

    let sniffed = match mime {
        MimeClass::Png => png_dimensions(buffer),
        MimeClass::Jpeg => jpeg_dimensions(buffer),
        MimeClass::Gif => gif_dimensions(buffer),
        MimeClass::Bmp | MimeClass::Other => None,
    };

    match sniffed {
        Some(dims) => dims,
        None => {
            warn!("could not read image dimensions, using fallback");
            FALLBACK_DIMENSIONS
        }
    }
}

fn plausible(width: u32, height: u32) -> bool {
    width > 0 && width < MAX_SANE_DIMENSION && height > 0 && height < MAX_SANE_DIMENSION
}

fn read_u32_be(buffer: &[u8], offset: usize) -> Option<u32> {
    let bytes = buffer.get(offset..offset + 4)?;
    Some(u32::from_be_bytes([bytes[0], bytes[1], bytes[2], bytes[3]]))
}

fn read_u16_be(buffer: &[u8], offset: usize) -> Option<u16> {
    let bytes = buffer.get(offset..offset + 2)?;
    Some(u16::from_be_bytes([bytes[0], bytes[1]]))
}

fn read_u16_le(buffer: &[u8], offset: usize) -> Option<u16> {
    let bytes = buffer.get(offset..offset + 2)?;
    Some(u16::from_le_bytes([bytes[0], bytes[1]]))
}

/// PNG stores the IHDR width/height as big-endian u32s at bytes 16 and 20.
fn png_dimensions(buffer: &[u8]) -> Option<(u32, u32)> {
    let width = read_u32_be(buffer, 16)?;
    let height = read_u32_be(buffer, 20)?;
    plausible(width, height).then_some((width, height))
}

/// JPEG is a sequence of `0xFF`-prefixed marker segments; the frame header
/// (SOF0 baseline or SOF2 progressive) carries big-endian height/width at
/// fixed offsets past the marker. Non-frame segments are skipped by their
/// declared length.
fn jpeg_dimensions(buffer: &[u8]) -> Option<(u32, u32)> {
    let mut offset = 2usize;
    while offset + 10 < buffer.len() {
        if buffer[offset] != 0xFF {
            break;
        }
        let marker = buffer[offset + 1];
        let size = read_u16_be(buffer, offset + 2)? as usize;

        if marker == 0xC0 || marker == 0xC2 {
            let height = u32::from(read_u16_be(buffer, offset + 5)?);
            let width = u32::from(read_u16_be(buffer, offset + 7)?);
            return plausible(width, height).then_some((width, height));
        }
        offset = offset.checked_add(size + 2)?;
    }
    None
}

/// GIF stores the screen width/height as little-endian u16s at bytes 6 and 8.
fn gif_dimensions(buffer: &[u8]) -> Option<(u32, u32)> {
    if buffer.len() <= 10 {
        return None;
    }
    let width = u32::from(read_u16_le(buffer, 6)?);
    let height = u32::from(read_u16_le(buffer, 8)?);
    plausible(width, height).then_some((width, height))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn png_header(width: u32, height: u32) -> Vec<u8> {
        let mut buf = vec![
            0x89, b'P', b'N', b'G', 0x0D, 0x0A, 0x1A, 0x0A, // signature
            0x00, 0x00, 0x00, 0x0D, b'I', b'H', b'D', b'R', // IHDR length + tag
        ];
        buf.extend_from_slice(&width.to_be_bytes());
        buf.extend_from_slice(&height.to_be_bytes());
        buf.extend_from_slice(&[8, 6, 0, 0, 0]); // bit depth / colour / etc.
        buf
    }

    fn jpeg_with_sof(width: u16, height: u16) -> Vec<u8> {
        let mut buf = vec![0xFF, 0xD8]; // SOI
        // APP0 segment, 16 bytes declared (includes the length field)
        buf.extend_from_slice(&[0xFF, 0xE0, 0x00, 0x10]);
        buf.extend_from_slice(&[0u8; 14]);
        // SOF0: length 17, precision, height, width
        buf.extend_from_slice(&[0xFF, 0xC0, 0x00, 0x11, 0x08]);
        buf.extend_from_slice(&height.to_be_bytes());
        buf.extend_from_slice(&width.to_be_bytes());
        buf.extend_from_slice(&[0u8; 12]);
        buf
    }

    fn gif_header(width: u16, height: u16) -> Vec<u8> {
        let mut buf = b"GIF89a".to_vec();
        buf.extend_from_slice(&width.to_le_bytes());
        buf.extend_from_slice(&height.to_le_bytes());
        buf.extend_from_slice(&[0u8; 16]);
        buf
    }

    #[test]
    fn png_exact_dimensions() {
        let buf = png_header(800, 600);
        assert_eq!(sniff_dimensions(&buf, MimeClass::Png), (800, 600));
    }

    #[test]
    fn jpeg_sof_scan() {
        let buf = jpeg_with_sof(1024, 768);
        assert_eq!(sniff_dimensions(&buf, MimeClass::Jpeg), (1024, 768));
    }

    #[test]
    fn jpeg_progressive_sof2() {
        let mut buf = jpeg_with_sof(320, 240);
        // Rewrite the SOF0 marker to SOF2
        let pos = buf.windows(2).position(|w| w == [0xFF, 0xC0]).unwrap();
        buf[pos + 1] = 0xC2;
        assert_eq!(sniff_dimensions(&buf, MimeClass::Jpeg), (320, 240));
    }

    #[test]
    fn gif_little_endian() {
        let buf = gif_header(400, 300);
        assert_eq!(sniff_dimensions(&buf, MimeClass::Gif), (400, 300));
    }

    #[test]
    fn truncated_buffer_falls_back() {
        assert_eq!(sniff_dimensions(&[0u8; 5], MimeClass::Png), FALLBACK_DIMENSIONS);
        assert_eq!(sniff_dimensions(&[], MimeClass::Jpeg), FALLBACK_DIMENSIONS);
    }

    #[test]
    fn corrupt_png_dimensions_fall_back() {
        // Width of zero and height past the sane cap both fail validation
        assert_eq!(
            sniff_dimensions(&png_header(0, 600), MimeClass::Png),
            FALLBACK_DIMENSIONS
        );
        assert_eq!(
            sniff_dimensions(&png_header(800, 60_000), MimeClass::Png),
            FALLBACK_DIMENSIONS
        );
    }

    #[test]
    fn jpeg_without_sof_falls_back() {
        let mut buf = vec![0xFF, 0xD8, 0xFF, 0xE0, 0x00, 0x10];
        buf.extend_from_slice(&[0u8; 40]);
        assert_eq!(sniff_dimensions(&buf, MimeClass::Jpeg), FALLBACK_DIMENSIONS);
    }

    #[test]
    fn unsupported_formats_fall_back() {
        let buf = vec![0u8; 64];
        assert_eq!(sniff_dimensions(&buf, MimeClass::Bmp), FALLBACK_DIMENSIONS);
        assert_eq!(sniff_dimensions(&buf, MimeClass::Other), FALLBACK_DIMENSIONS);
    }

    #[test]
    fn garbage_never_panics() {
        for len in [0usize, 3, 11, 24, 25, 64, 200] {
            let buf: Vec<u8> = (0..len).map(|i| (i * 37 % 251) as u8).collect();
            for mime in [
                MimeClass::Png,
                MimeClass::Jpeg,
                MimeClass::Gif,
                MimeClass::Bmp,
                MimeClass::Other,
            ] {
                let _ = sniff_dimensions(&buf, mime);
            }
        }
    }

    #[test]
    fn mime_class_from_path() {
        assert_eq!(MimeClass::from_media_path("word/media/image1.PNG"), MimeClass::Png);
        assert_eq!(MimeClass::from_media_path("word/media/photo.jpeg"), MimeClass::Jpeg);
        assert_eq!(MimeClass::from_media_path("a.gif"), MimeClass::Gif);
        assert_eq!(MimeClass::from_media_path("a.bmp"), MimeClass::Bmp);
        assert_eq!(MimeClass::from_media_path("a.emf"), MimeClass::Other);
        assert!(MimeClass::is_raster_path("media/img.jpg"));
        assert!(!MimeClass::is_raster_path("media/drawing.wmf"));
    }
}
