use flate2::read::GzDecoder;
use image::{ImageFormat, RgbaImage};
use img_parts::Bytes;
use img_parts::png::Png;
use std::io::Read;

use super::Extractor;
use crate::data::{Generator, MetadataValue, RawMetadata};
use crate::error::{Error, Result};

const CHUNK_TEXT: [u8; 4] = *b"tEXt";
const CHUNK_ZTXT: [u8; 4] = *b"zTXt";
const CHUNK_ITXT: [u8; 4] = *b"iTXt";
const CHUNK_PHYS: [u8; 4] = *b"pHYs";

const PHYS_UNIT_METRE: u8 = 1;
const INCHES_PER_METRE: f64 = 39.3701;

const STEALTH_PLAIN: &[u8] = b"stealth_pnginfo";
const STEALTH_GZIP: &[u8] = b"stealth_pngcomp";

fn decode_png(image: &[u8]) -> std::result::Result<Png, img_parts::Error> {
    Png::from_bytes(Bytes::copy_from_slice(image))
}

/// Decode latin-1 text (PNG `tEXt` payloads).
fn latin1(bytes: &[u8]) -> String {
    bytes.iter().map(|&b| b as char).collect()
}

/// Physical pixel density from the `pHYs` chunk, as `dpi_x` / `dpi_y`.
///
/// Best effort: an undecodable stream or a missing/unitless chunk yields `None`.
/// Corruption is reported by [`PngImageText`] instead.
pub struct PngImageInfo;

#[async_trait::async_trait]
impl Extractor for PngImageInfo {
    fn name(&self) -> &str {
        "png_image_info"
    }

    async fn extract(&self, image: &[u8], _generator: Generator) -> Result<Option<RawMetadata>> {
        let png = match decode_png(image) {
            Ok(png) => png,
            Err(e) => {
                log::trace!("png_image_info: skipping undecodable PNG: {e}");
                return Ok(None);
            }
        };

        let Some(phys) = png.chunks().iter().find(|c| c.kind() == CHUNK_PHYS) else {
            return Ok(None);
        };
        let contents = phys.contents();
        if contents.len() < 9 || contents[8] != PHYS_UNIT_METRE {
            return Ok(None);
        }

        let x = u32::from_be_bytes([contents[0], contents[1], contents[2], contents[3]]);
        let y = u32::from_be_bytes([contents[4], contents[5], contents[6], contents[7]]);
        let dpi = |ppm: u32| (f64::from(ppm) / INCHES_PER_METRE).round() as i64;

        let mut raw = RawMetadata::new();
        raw.insert("dpi_x", dpi(x));
        raw.insert("dpi_y", dpi(y));
        Ok(Some(raw))
    }
}

/// Keyword/value pairs from uncompressed PNG text chunks.
///
/// A `parameters` keyword (any case) is also stored under the canonical
/// `parameters` key. Compressed (`zTXt`) and international (`iTXt`) chunks add
/// nothing.
pub struct PngImageText;

#[async_trait::async_trait]
impl Extractor for PngImageText {
    fn name(&self) -> &str {
        "png_image_text"
    }

    async fn extract(&self, image: &[u8], _generator: Generator) -> Result<Option<RawMetadata>> {
        let png = decode_png(image)
            .map_err(|e| Error::metadata(format!("Error reading PNG text chunks: {e}")))?;

        let mut raw = RawMetadata::new();

        for chunk in png.chunks() {
            match chunk.kind() {
                CHUNK_TEXT => {}
                CHUNK_ZTXT | CHUNK_ITXT => {
                    log::trace!("png_image_text: skipping compressed/international text chunk");
                    continue;
                }
                _ => continue,
            }

            let data = chunk.contents();
            let Some(nul) = data.iter().position(|&b| b == 0) else {
                continue;
            };
            let keyword = latin1(&data[..nul]);
            let text = latin1(&data[nul + 1..]);
            if keyword.is_empty() || text.is_empty() {
                continue;
            }

            if keyword.eq_ignore_ascii_case("parameters") {
                raw.insert("parameters", text.clone());
            }
            raw.insert(keyword, text);
        }

        Ok((!raw.is_empty()).then_some(raw))
    }
}

/// NovelAI "stealth" metadata hidden in the least-significant bit of the alpha
/// channel.
///
/// Bits are read column by column. The payload starts with a 15-byte signature
/// (`stealth_pnginfo` for plain text, `stealth_pngcomp` for gzip), followed by the
/// payload length in bits as a big-endian `u32`, then the payload: a JSON object
/// whose entries become the bag.
pub struct PngStealthAlpha;

#[async_trait::async_trait]
impl Extractor for PngStealthAlpha {
    fn name(&self) -> &str {
        "png_stealth_alpha"
    }

    async fn extract(&self, image: &[u8], _generator: Generator) -> Result<Option<RawMetadata>> {
        let decoded = image::load_from_memory_with_format(image, ImageFormat::Png)
            .map_err(|e| Error::metadata(format!("Error reading stealth alpha channel: {e}")))?;

        if !decoded.color().has_alpha() {
            return Ok(None);
        }

        let Some(payload) = read_stealth_payload(&decoded.to_rgba8())? else {
            return Ok(None);
        };

        let json: serde_json::Value = match serde_json::from_str(&payload) {
            Ok(json) => json,
            Err(e) => {
                log::debug!("png_stealth_alpha: payload is not JSON: {e}");
                return Ok(None);
            }
        };
        let Some(object) = json.as_object() else {
            log::debug!("png_stealth_alpha: payload is not a JSON object");
            return Ok(None);
        };

        let raw = object
            .iter()
            .map(|(key, value)| {
                let value = match value {
                    serde_json::Value::String(s) => MetadataValue::Text(s.clone()),
                    other => MetadataValue::Text(other.to_string()),
                };
                (key.clone(), value)
            })
            .collect::<RawMetadata>();

        Ok((!raw.is_empty()).then_some(raw))
    }
}

/// Column-major alpha LSB reader.
struct AlphaBits<'a> {
    image: &'a RgbaImage,
    index: u64,
}

impl AlphaBits<'_> {
    fn next_bit(&mut self) -> Option<u8> {
        let (width, height) = self.image.dimensions();
        let total = u64::from(width) * u64::from(height);
        if height == 0 || self.index >= total {
            return None;
        }
        let x = (self.index / u64::from(height)) as u32;
        let y = (self.index % u64::from(height)) as u32;
        self.index += 1;
        Some(self.image.get_pixel(x, y).0[3] & 1)
    }

    fn next_byte(&mut self) -> Option<u8> {
        let mut byte = 0u8;
        for _ in 0..8 {
            byte = (byte << 1) | self.next_bit()?;
        }
        Some(byte)
    }

    fn read_bytes(&mut self, count: usize) -> Option<Vec<u8>> {
        (0..count).map(|_| self.next_byte()).collect()
    }
}

fn read_stealth_payload(image: &RgbaImage) -> Result<Option<String>> {
    let mut bits = AlphaBits { image, index: 0 };

    let Some(signature) = bits.read_bytes(STEALTH_PLAIN.len()) else {
        return Ok(None);
    };
    let compressed = match signature.as_slice() {
        STEALTH_PLAIN => false,
        STEALTH_GZIP => true,
        _ => return Ok(None),
    };

    let length = bits
        .read_bytes(4)
        .map(|b| u32::from_be_bytes([b[0], b[1], b[2], b[3]]))
        .ok_or_else(|| Error::metadata("Stealth payload length is truncated"))?;
    let payload = bits
        .read_bytes(length as usize / 8)
        .ok_or_else(|| Error::metadata("Stealth payload is truncated"))?;

    if !compressed {
        return Ok(Some(String::from_utf8_lossy(&payload).into_owned()));
    }

    let mut text = String::new();
    GzDecoder::new(payload.as_slice())
        .read_to_string(&mut text)
        .map_err(|e| Error::metadata(format!("Error decompressing stealth payload: {e}")))?;
    Ok(Some(text))
}
