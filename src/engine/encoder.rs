//! Per-format image encoders
//!
//! Dispatch is driven by the registry's encoder id. `quality` arrives
//! already gated by the descriptor's `supports_quality` flag: formats
//! without lossy support always encode at their lossless/default setting.

use std::io::Cursor;

use image::DynamicImage;
use rgb::FromSlice;

use crate::error::EngineError;
use crate::formats::MediaFormat;

/// AVIF encoding effort (1 slowest/best .. 10 fastest)
const AVIF_SPEED: u8 = 4;

/// Quality used when a lossy format is requested without an explicit value
const AVIF_DEFAULT_QUALITY: f32 = 100.0;

pub fn encode(
    format: &MediaFormat,
    img: &DynamicImage,
    quality: Option<u8>,
) -> Result<Vec<u8>, EngineError> {
    match format.encoder {
        "jpeg" => encode_jpeg(img, quality),
        "png" => encode_png(img),
        "gif" => encode_gif(img),
        "webp" => encode_webp(img, quality),
        "avif" => encode_avif(img, quality),
        other => Err(encode_err(other, "no encoder registered")),
    }
}

fn encode_err(format: &str, message: impl std::fmt::Display) -> EngineError {
    EngineError::ImageTransformFailed(format!("failed to encode to {format}: {message}"))
}

fn encode_jpeg(img: &DynamicImage, quality: Option<u8>) -> Result<Vec<u8>, EngineError> {
    use image::codecs::jpeg::JpegEncoder;
    use image::ImageEncoder as _;

    // JPEG has no alpha channel
    let rgb = img.to_rgb8();
    let (width, height) = (rgb.width(), rgb.height());

    let mut output = Cursor::new(Vec::new());
    let encoder = match quality {
        Some(q) => JpegEncoder::new_with_quality(&mut output, q),
        None => JpegEncoder::new(&mut output),
    };
    encoder
        .write_image(rgb.as_raw(), width, height, image::ColorType::Rgb8)
        .map_err(|e| encode_err("jpeg", e))?;

    Ok(output.into_inner())
}

fn encode_png(img: &DynamicImage) -> Result<Vec<u8>, EngineError> {
    use image::codecs::png::PngEncoder;
    use image::ImageEncoder as _;

    let rgba = img.to_rgba8();
    let (width, height) = (rgba.width(), rgba.height());

    let mut output = Cursor::new(Vec::new());
    PngEncoder::new(&mut output)
        .write_image(rgba.as_raw(), width, height, image::ColorType::Rgba8)
        .map_err(|e| encode_err("png", e))?;

    Ok(output.into_inner())
}

fn encode_gif(img: &DynamicImage) -> Result<Vec<u8>, EngineError> {
    use image::codecs::gif::GifEncoder;

    let rgba = img.to_rgba8();
    let (width, height) = (rgba.width(), rgba.height());

    let mut output = Vec::new();
    {
        let mut encoder = GifEncoder::new(&mut output);
        encoder
            .encode(rgba.as_raw(), width, height, image::ColorType::Rgba8)
            .map_err(|e| encode_err("gif", e))?;
    }

    Ok(output)
}

fn encode_webp(img: &DynamicImage, quality: Option<u8>) -> Result<Vec<u8>, EngineError> {
    let rgba = img.to_rgba8();
    let (width, height) = (rgba.width(), rgba.height());

    let encoder = webp::Encoder::from_rgba(rgba.as_raw(), width, height);
    let memory = match quality {
        Some(q) => encoder.encode(q as f32),
        None => encoder.encode_lossless(),
    };

    Ok(memory.to_vec())
}

fn encode_avif(img: &DynamicImage, quality: Option<u8>) -> Result<Vec<u8>, EngineError> {
    let rgba = img.to_rgba8();
    let (width, height) = (rgba.width() as usize, rgba.height() as usize);

    let pixels = rgba.as_raw().as_rgba();
    let quality = quality.map(|q| q as f32).unwrap_or(AVIF_DEFAULT_QUALITY);

    let encoded = ravif::Encoder::new()
        .with_quality(quality)
        .with_alpha_quality(quality)
        .with_speed(AVIF_SPEED)
        .encode_rgba(imgref::Img::new(pixels, width, height))
        .map_err(|e| encode_err("avif", e))?;

    Ok(encoded.avif_file)
}
