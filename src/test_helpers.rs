//! In-memory image builders shared by the unit tests and `tests/parse_images.rs`.
//!
//! Only depends on third-party crates so the integration tests can include it by
//! path.

use flate2::Compression;
use flate2::write::GzEncoder;
use image::{DynamicImage, ImageFormat, RgbImage, Rgba, RgbaImage};
use img_parts::jpeg::Jpeg;
use img_parts::png::{Png, PngChunk};
use img_parts::{Bytes, ImageEXIF};
use std::io::{Cursor, Write};

fn encode(image: DynamicImage, format: ImageFormat) -> Vec<u8> {
    let mut out = Cursor::new(Vec::new());
    image.write_to(&mut out, format).unwrap();
    out.into_inner()
}

// UserComment character code markers
pub const UNICODE: &[u8; 8] = b"UNICODE\0";
pub const ASCII: &[u8; 8] = b"ASCII\0\0\0";

// TIFF field types
pub const FORMAT_ASCII: u16 = 2;
pub const FORMAT_UNDEFINED: u16 = 7;

/// A UserComment value: 8-byte character code marker, then the text (UTF-16BE
/// behind [`UNICODE`], raw bytes otherwise).
pub fn user_comment(marker: &[u8; 8], text: &str) -> Vec<u8> {
    let mut raw = marker.to_vec();
    if marker == UNICODE {
        raw.extend(text.encode_utf16().flat_map(u16::to_be_bytes));
    } else {
        raw.extend_from_slice(text.as_bytes());
    }
    raw
}

/// A TIFF structure holding one UNDEFINED UserComment entry.
pub fn build_tiff(big_endian: bool, comment: &[u8]) -> Vec<u8> {
    build_tiff_entry(big_endian, 0x9286, FORMAT_UNDEFINED, comment)
}

/// A TIFF structure whose Exif IFD holds a single byte-sized entry.
///
/// IFD0 at 8 has a single Exif IFD pointer to 26, the Exif IFD holds the entry,
/// and values longer than 4 bytes start at 44.
pub fn build_tiff_entry(big_endian: bool, tag: u16, format: u16, value: &[u8]) -> Vec<u8> {
    let u16b = |v: u16| if big_endian { v.to_be_bytes() } else { v.to_le_bytes() };
    let u32b = |v: u32| if big_endian { v.to_be_bytes() } else { v.to_le_bytes() };

    let mut tiff = Vec::new();
    tiff.extend_from_slice(if big_endian { b"MM" } else { b"II" });
    tiff.extend_from_slice(&u16b(42));
    tiff.extend_from_slice(&u32b(8));

    // IFD0
    tiff.extend_from_slice(&u16b(1));
    tiff.extend_from_slice(&u16b(0x8769));
    tiff.extend_from_slice(&u16b(4));
    tiff.extend_from_slice(&u32b(1));
    tiff.extend_from_slice(&u32b(26));
    tiff.extend_from_slice(&u32b(0));

    // Exif IFD
    tiff.extend_from_slice(&u16b(1));
    tiff.extend_from_slice(&u16b(tag));
    tiff.extend_from_slice(&u16b(format));
    tiff.extend_from_slice(&u32b(value.len() as u32));
    if value.len() <= 4 {
        let mut inline = value.to_vec();
        inline.resize(4, 0);
        tiff.extend_from_slice(&inline);
    } else {
        tiff.extend_from_slice(&u32b(44));
    }
    tiff.extend_from_slice(&u32b(0));

    assert_eq!(tiff.len(), 44);
    if value.len() > 4 {
        tiff.extend_from_slice(value);
    }
    tiff
}

/// A 1x1 JPEG without an EXIF segment.
pub fn plain_jpeg() -> Vec<u8> {
    encode(DynamicImage::ImageRgb8(RgbImage::new(1, 1)), ImageFormat::Jpeg)
}

/// A 1x1 JPEG whose APP1 segment carries `tiff`.
pub fn jpeg_with_exif(tiff: &[u8]) -> Vec<u8> {
    let mut jpeg = Jpeg::from_bytes(Bytes::from(plain_jpeg())).unwrap();
    jpeg.set_exif(Some(Bytes::copy_from_slice(tiff)));
    jpeg.encoder().bytes().to_vec()
}

/// A 1x1 RGB PNG with no ancillary chunks.
pub fn plain_png() -> Vec<u8> {
    encode(DynamicImage::ImageRgb8(RgbImage::new(1, 1)), ImageFormat::Png)
}

/// [`plain_png`] with extra chunks inserted right after IHDR.
fn png_with_chunks(chunks: Vec<PngChunk>) -> Vec<u8> {
    let mut png = Png::from_bytes(Bytes::from(plain_png())).unwrap();
    for (i, chunk) in chunks.into_iter().enumerate() {
        png.chunks_mut().insert(1 + i, chunk);
    }
    png.encoder().bytes().to_vec()
}

pub fn png_with_chunk(kind: [u8; 4], data: &[u8]) -> Vec<u8> {
    png_with_chunks(vec![PngChunk::new(kind, Bytes::copy_from_slice(data))])
}

/// A PNG with one `tEXt` chunk per keyword/value pair.
pub fn png_with_text(entries: &[(&str, &str)]) -> Vec<u8> {
    let chunks = entries
        .iter()
        .map(|(keyword, text)| {
            let mut data = keyword.as_bytes().to_vec();
            data.push(0);
            data.extend_from_slice(text.as_bytes());
            PngChunk::new(*b"tEXt", Bytes::from(data))
        })
        .collect();
    png_with_chunks(chunks)
}

/// Flip the CRC of the first chunk of type `kind`.
pub fn corrupt_chunk_crc(png: &mut [u8], kind: [u8; 4]) {
    let mut offset = 8;
    while offset + 8 <= png.len() {
        let len = u32::from_be_bytes([png[offset], png[offset + 1], png[offset + 2], png[offset + 3]]) as usize;
        let crc = offset + 8 + len;
        if png[offset + 4..offset + 8] == kind {
            for b in &mut png[crc..crc + 4] {
                *b ^= 0xFF;
            }
            return;
        }
        offset = crc + 4;
    }
    panic!("no {} chunk", String::from_utf8_lossy(&kind));
}

/// An RGBA PNG hiding `payload` in the alpha LSBs, column by column, behind the
/// stealth signature and its bit length.
pub fn stealth_png(payload: &[u8], gzip: bool) -> Vec<u8> {
    let (signature, body): (&[u8], Vec<u8>) = if gzip {
        let mut encoder = GzEncoder::new(Vec::new(), Compression::default());
        encoder.write_all(payload).unwrap();
        (&b"stealth_pngcomp"[..], encoder.finish().unwrap())
    } else {
        (&b"stealth_pnginfo"[..], payload.to_vec())
    };

    let mut bytes = signature.to_vec();
    bytes.extend_from_slice(&((body.len() * 8) as u32).to_be_bytes());
    bytes.extend_from_slice(&body);
    let bits: Vec<u8> = bytes
        .iter()
        .flat_map(|byte| (0..8).rev().map(move |i| (byte >> i) & 1))
        .collect();

    let height = 8u32;
    let width = (bits.len() as u32).div_ceil(height) + 1;
    let mut image = RgbaImage::from_pixel(width, height, Rgba([10, 20, 30, 255]));
    for (i, bit) in bits.into_iter().enumerate() {
        let x = i as u32 / height;
        let y = i as u32 % height;
        image.get_pixel_mut(x, y).0[3] = 254 | bit;
    }
    encode(DynamicImage::ImageRgba8(image), ImageFormat::Png)
}
