use jpeg_decoder::Decoder;

use super::frame::PixelFormat;
use crate::error::DecodeError;

/// Interleaved BGR24 pixels produced from a raw device buffer
#[derive(Debug)]
pub struct Decoded {
    pub data: Vec<u8>,
    pub width: u32,
    pub height: u32,
}

/// Convert a raw device buffer into BGR24.
///
/// `width`/`height` are the negotiated capture size; MJPEG frames carry their
/// own size, which wins.
pub fn decode_to_bgr(
    data: &[u8],
    format: PixelFormat,
    width: u32,
    height: u32,
) -> Result<Decoded, DecodeError> {
    if let Some(expected) = format.frame_len(width, height) {
        // Drivers may pad the last buffer; anything shorter is a torn frame
        if data.len() < expected {
            return Err(DecodeError::Length {
                expected,
                actual: data.len(),
                width,
                height,
            });
        }
    }

    let data = match format {
        PixelFormat::Mjpeg => return decode_mjpeg(data),
        PixelFormat::Bgr24 => data[..width as usize * height as usize * 3].to_vec(),
        PixelFormat::Rgb24 => swap_rb(&data[..width as usize * height as usize * 3]),
        PixelFormat::Yuyv4 => yuyv_to_bgr(&data[..width as usize * height as usize * 2]),
        PixelFormat::Nv12 => nv12_to_bgr(data, width, height)?,
    };

    Ok(Decoded {
        data,
        width,
        height,
    })
}

fn decode_mjpeg(data: &[u8]) -> Result<Decoded, DecodeError> {
    let mut decoder = Decoder::new(data);
    let pixels = decoder.decode()?;
    let info = decoder
        .info()
        .ok_or_else(|| DecodeError::Unsupported("jpeg without header".into()))?;

    let data = match info.pixel_format {
        jpeg_decoder::PixelFormat::RGB24 => swap_rb(&pixels),
        jpeg_decoder::PixelFormat::L8 => pixels.iter().flat_map(|&l| [l, l, l]).collect(),
        other => return Err(DecodeError::Unsupported(format!("jpeg {:?}", other))),
    };

    Ok(Decoded {
        data,
        width: info.width as u32,
        height: info.height as u32,
    })
}

fn swap_rb(src: &[u8]) -> Vec<u8> {
    let mut out = Vec::with_capacity(src.len());
    for px in src.chunks_exact(3) {
        out.extend_from_slice(&[px[2], px[1], px[0]]);
    }
    out
}

/// BT.601 limited-range integer conversion
#[inline]
fn yuv_to_bgr(y: u8, u: u8, v: u8) -> [u8; 3] {
    let c = y as i32 - 16;
    let d = u as i32 - 128;
    let e = v as i32 - 128;

    let r = (298 * c + 409 * e + 128) >> 8;
    let g = (298 * c - 100 * d - 208 * e + 128) >> 8;
    let b = (298 * c + 516 * d + 128) >> 8;

    [b.clamp(0, 255) as u8, g.clamp(0, 255) as u8, r.clamp(0, 255) as u8]
}

fn yuyv_to_bgr(src: &[u8]) -> Vec<u8> {
    let mut out = Vec::with_capacity(src.len() / 2 * 3);
    for chunk in src.chunks_exact(4) {
        let (y0, u, y1, v) = (chunk[0], chunk[1], chunk[2], chunk[3]);
        out.extend_from_slice(&yuv_to_bgr(y0, u, v));
        out.extend_from_slice(&yuv_to_bgr(y1, u, v));
    }
    out
}

fn nv12_to_bgr(src: &[u8], width: u32, height: u32) -> Result<Vec<u8>, DecodeError> {
    if width % 2 != 0 || height % 2 != 0 {
        return Err(DecodeError::Unsupported(format!(
            "nv12 with odd size {}x{}",
            width, height
        )));
    }

    let (w, h) = (width as usize, height as usize);
    let (luma, chroma) = src.split_at(w * h);
    let mut out = Vec::with_capacity(w * h * 3);

    for row in 0..h {
        for col in 0..w {
            let y = luma[row * w + col];
            let uv = (row / 2) * w + (col & !1);
            out.extend_from_slice(&yuv_to_bgr(y, chroma[uv], chroma[uv + 1]));
        }
    }
    Ok(out)
}
