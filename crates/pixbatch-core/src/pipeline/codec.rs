//! Image codec boundary: decode bytes, encode results, persist outputs.

use image::codecs::jpeg::JpegEncoder;
use image::{DynamicImage, GenericImageView, ImageFormat};
use std::ffi::OsString;
use std::io::Cursor;
use std::path::{Path, PathBuf};

use crate::error::{PipelineError, PipelineResult};

/// Result of decoding an image.
pub struct DecodedImage {
    /// The decoded image data
    pub image: DynamicImage,
    /// Detected image format
    pub format: ImageFormat,
    /// Image width in pixels
    pub width: u32,
    /// Image height in pixels
    pub height: u32,
}

/// A written output file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WrittenOutput {
    pub bytes_written: u64,
    /// BLAKE3 hex digest of the encoded bytes
    pub hash: String,
}

/// Decode an image from an in-memory byte buffer.
///
/// The format is sniffed from the content first; the extension of `path` is
/// only consulted when the content is not recognized.
pub fn decode(bytes: Vec<u8>, path: &Path) -> PipelineResult<DecodedImage> {
    let mut reader = image::ImageReader::new(Cursor::new(bytes))
        .with_guessed_format()
        .map_err(|e| PipelineError::Decode {
            path: path.to_path_buf(),
            message: format!("Cannot detect image format: {}", e),
        })?;
    let format = match reader.format() {
        Some(f) => f,
        None => ImageFormat::from_path(path).map_err(|_| PipelineError::Decode {
            path: path.to_path_buf(),
            message: format!(
                "Unrecognized image format ({})",
                path.extension()
                    .and_then(|e| e.to_str())
                    .unwrap_or("unknown")
            ),
        })?,
    };
    reader.set_format(format);
    let image = reader.decode().map_err(|e| PipelineError::Decode {
        path: path.to_path_buf(),
        message: e.to_string(),
    })?;

    let (width, height) = image.dimensions();
    Ok(DecodedImage {
        image,
        format,
        width,
        height,
    })
}

/// Encode `image` in the format implied by `destination`'s extension.
///
/// JPEG output is converted to 8-bit RGB when needed, since the encoder does
/// not accept alpha or wide channels.
pub fn encode(
    image: &DynamicImage,
    destination: &Path,
    jpeg_quality: u8,
) -> PipelineResult<Vec<u8>> {
    let encode_err = |message: String| PipelineError::Encode {
        path: destination.to_path_buf(),
        message,
    };

    let format = ImageFormat::from_path(destination)
        .map_err(|e| encode_err(format!("Cannot pick output format: {}", e)))?;

    let mut buffer = Vec::new();
    match format {
        ImageFormat::Jpeg => {
            let encoder = JpegEncoder::new_with_quality(&mut buffer, jpeg_quality);
            let result = match image {
                DynamicImage::ImageRgb8(_) | DynamicImage::ImageLuma8(_) => {
                    image.write_with_encoder(encoder)
                }
                _ => DynamicImage::ImageRgb8(image.to_rgb8()).write_with_encoder(encoder),
            };
            result.map_err(|e| encode_err(e.to_string()))?;
        }
        ImageFormat::Png => {
            image
                .write_to(&mut Cursor::new(&mut buffer), format)
                .map_err(|e| encode_err(e.to_string()))?;
        }
        _ => {
            let result = match image {
                DynamicImage::ImageRgb8(_) | DynamicImage::ImageRgba8(_) => {
                    image.write_to(&mut Cursor::new(&mut buffer), format)
                }
                _ => DynamicImage::ImageRgba8(image.to_rgba8())
                    .write_to(&mut Cursor::new(&mut buffer), format),
            };
            result.map_err(|e| encode_err(e.to_string()))?;
        }
    }
    Ok(buffer)
}

/// Write `bytes` to `destination` through a sibling `.partial` file so a
/// reader never observes a half-written output.
pub fn persist(bytes: &[u8], destination: &Path) -> PipelineResult<WrittenOutput> {
    let access_err = |e: std::io::Error| PipelineError::Access {
        path: destination.to_path_buf(),
        message: e.to_string(),
    };

    let partial = partial_path(destination);
    std::fs::write(&partial, bytes).map_err(access_err)?;
    if let Err(e) = std::fs::rename(&partial, destination) {
        let _ = std::fs::remove_file(&partial);
        return Err(access_err(e));
    }

    Ok(WrittenOutput {
        bytes_written: bytes.len() as u64,
        hash: blake3::hash(bytes).to_hex().to_string(),
    })
}

fn partial_path(destination: &Path) -> PathBuf {
    let mut name = OsString::from(destination.as_os_str());
    name.push(".partial");
    PathBuf::from(name)
}

/// Convert an ImageFormat to a string representation.
pub fn format_to_string(format: ImageFormat) -> String {
    match format {
        ImageFormat::Jpeg => "jpeg".to_string(),
        ImageFormat::Png => "png".to_string(),
        ImageFormat::Gif => "gif".to_string(),
        ImageFormat::Bmp => "bmp".to_string(),
        ImageFormat::WebP => "webp".to_string(),
        ImageFormat::Tiff => "tiff".to_string(),
        _ => "unknown".to_string(),
    }
}
