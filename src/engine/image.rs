//! Image transformation routine
//!
//! decode → bake EXIF orientation → resize → encode. The target format is
//! the directive's format when it resolves against the image registry;
//! otherwise the source format passes through unchanged (never a silent
//! JPEG default). Quality is applied only when the target format declares
//! `supports_quality`.

use std::io::Cursor;
use std::num::NonZeroU32;

use fast_image_resize::{FilterType, Image, PixelType, ResizeAlg, Resizer};
use image::io::Reader as ImageReader;
use image::DynamicImage;

use super::encoder;
use crate::directives::TransformDirectives;
use crate::error::EngineError;
use crate::formats::{self, MediaFormat};
use crate::storage::StoredObject;

/// Transform one image object. Returns the encoded bytes and their
/// content type.
pub fn transform(
    object: &StoredObject,
    directives: &TransformDirectives,
) -> Result<(Vec<u8>, String), EngineError> {
    let data = &object.body;
    let mut img = decode(data)?;

    // Bake non-identity EXIF orientation into pixel data before resizing,
    // since re-encoding drops the orientation tag.
    if let Some(orientation) = exif_orientation(data) {
        img = apply_orientation(img, orientation);
    }

    let (src_width, src_height) = (img.width(), img.height());
    let (target_width, target_height) =
        target_dimensions(src_width, src_height, directives.width, directives.height);

    if target_width != src_width || target_height != src_height {
        img = resize(&img, target_width, target_height)?;
    }

    let target_format = resolve_target_format(object, directives, data);
    let quality = directives
        .quality
        .filter(|_| target_format.supports_quality);

    let encoded = encoder::encode(target_format, &img, quality)?;
    Ok((encoded, target_format.content_type.to_string()))
}

fn decode(data: &[u8]) -> Result<DynamicImage, EngineError> {
    ImageReader::new(Cursor::new(data))
        .with_guessed_format()
        .map_err(|e| EngineError::ImageTransformFailed(format!("failed to read image: {e}")))?
        .decode()
        .map_err(|e| EngineError::ImageTransformFailed(format!("failed to decode image: {e}")))
}

/// Target format policy: directive format if registered, else the source
/// format (by declared content type, falling back to magic-byte sniffing).
fn resolve_target_format(
    object: &StoredObject,
    directives: &TransformDirectives,
    data: &[u8],
) -> &'static MediaFormat {
    if let Some(format) = directives
        .format
        .as_deref()
        .and_then(formats::lookup_image)
    {
        return format;
    }
    if let Some(format) = object
        .content_type
        .as_deref()
        .and_then(formats::image_format_for_content_type)
    {
        return format;
    }
    sniff_source_format(data)
}

fn sniff_source_format(data: &[u8]) -> &'static MediaFormat {
    let name = match image::guess_format(data) {
        Ok(image::ImageFormat::Png) => "png",
        Ok(image::ImageFormat::WebP) => "webp",
        Ok(image::ImageFormat::Gif) => "gif",
        Ok(image::ImageFormat::Avif) => "avif",
        _ => "jpeg",
    };
    formats::lookup_image(name).unwrap_or(&formats::IMAGE_FORMATS[2])
}

/// Orientation value from the EXIF block, if it is non-identity.
fn exif_orientation(data: &[u8]) -> Option<u32> {
    let exif = exif::Reader::new()
        .read_from_container(&mut Cursor::new(data))
        .ok()?;
    let orientation = exif
        .get_field(exif::Tag::Orientation, exif::In::PRIMARY)?
        .value
        .get_uint(0)?;
    (orientation > 1 && orientation <= 8).then_some(orientation)
}

/// Bake an EXIF orientation (2-8) into the pixel data.
fn apply_orientation(img: DynamicImage, orientation: u32) -> DynamicImage {
    match orientation {
        2 => img.fliph(),
        3 => img.rotate180(),
        4 => img.flipv(),
        5 => img.rotate90().fliph(),
        6 => img.rotate90(),
        7 => img.rotate270().fliph(),
        8 => img.rotate270(),
        _ => img,
    }
}

/// Only the specified dimensions constrain the resize; an unspecified
/// dimension follows the source aspect ratio.
fn target_dimensions(
    src_width: u32,
    src_height: u32,
    width: Option<u32>,
    height: Option<u32>,
) -> (u32, u32) {
    match (width, height) {
        (Some(w), Some(h)) => (w, h),
        (Some(w), None) => {
            let h = (src_height as u64 * w as u64) / src_width.max(1) as u64;
            (w, (h as u32).max(1))
        }
        (None, Some(h)) => {
            let w = (src_width as u64 * h as u64) / src_height.max(1) as u64;
            ((w as u32).max(1), h)
        }
        (None, None) => (src_width, src_height),
    }
}

/// Lanczos3 resize on RGBA pixels.
fn resize(img: &DynamicImage, target_w: u32, target_h: u32) -> Result<DynamicImage, EngineError> {
    let resize_err = |msg: String| EngineError::ImageTransformFailed(msg);

    let src_width = NonZeroU32::new(img.width())
        .ok_or_else(|| resize_err("source width is 0".to_string()))?;
    let src_height = NonZeroU32::new(img.height())
        .ok_or_else(|| resize_err("source height is 0".to_string()))?;
    let dst_width =
        NonZeroU32::new(target_w).ok_or_else(|| resize_err("target width is 0".to_string()))?;
    let dst_height =
        NonZeroU32::new(target_h).ok_or_else(|| resize_err("target height is 0".to_string()))?;

    let src_image = Image::from_vec_u8(
        src_width,
        src_height,
        img.to_rgba8().into_raw(),
        PixelType::U8x4,
    )
    .map_err(|e| resize_err(format!("failed to create source image: {e:?}")))?;

    let mut dst_image = Image::new(dst_width, dst_height, PixelType::U8x4);
    let mut resizer = Resizer::new(ResizeAlg::Convolution(FilterType::Lanczos3));
    resizer
        .resize(&src_image.view(), &mut dst_image.view_mut())
        .map_err(|e| resize_err(format!("resize operation failed: {e:?}")))?;

    let rgba_image = image::RgbaImage::from_raw(target_w, target_h, dst_image.into_vec())
        .ok_or_else(|| resize_err("failed to assemble output buffer".to_string()))?;

    Ok(DynamicImage::ImageRgba8(rgba_image))
}
