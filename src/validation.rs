// validation.rs - Upload checks and image normalisation
use crate::config::UploadPolicy;
use crate::error::ValidationError;
use crate::types::MediaKind;
use crate::utils::file_extension;
use axum::body::Bytes;
use image::codecs::jpeg::JpegEncoder;
use image::imageops::FilterType;
use image::ImageReader;
use std::io::{BufRead, Cursor, Seek, SeekFrom};

/// Longest side, in pixels, of an image forwarded to the model API.
pub const PREPROCESS_MAX_SIDE: u32 = 1024;
pub const PREPROCESS_JPEG_QUALITY: u8 = 90;

/// An upload that passed validation.
#[derive(Debug, Clone)]
pub struct UploadedMedia {
    pub filename: String,
    pub extension: String,
    pub kind: MediaKind,
    pub bytes: Bytes,
}

/// Check extension and size (and, when the policy says so, that the bytes
/// decode as an image). Checks run in that order; the first failure wins.
pub fn validate_upload(
    filename: &str,
    bytes: Bytes,
    policy: &UploadPolicy,
) -> Result<UploadedMedia, ValidationError> {
    let extension = file_extension(filename);
    if !policy.allowed_extensions.iter().any(|e| *e == extension) {
        return Err(ValidationError::InvalidType(format!(
            "Invalid file type '.{}'. Allowed: {}",
            extension,
            policy.allowed_extensions.join(", ")
        )));
    }

    if bytes.len() > policy.max_bytes {
        return Err(ValidationError::TooLarge(format!(
            "File too large. Maximum size is {}MB.",
            policy.max_megabytes_label()
        )));
    }

    if policy.sniff_content {
        let mut cursor = Cursor::new(bytes.as_ref());
        sniff_image(&mut cursor)?;
    }

    Ok(UploadedMedia {
        filename: filename.to_string(),
        kind: MediaKind::from_extension(&extension),
        extension,
        bytes,
    })
}

/// Decode the stream as an image to prove it is one, then rewind it so the
/// caller can read it again from the start.
pub fn sniff_image<R: BufRead + Seek>(reader: &mut R) -> Result<(), ValidationError> {
    let decoded = ImageReader::new(&mut *reader)
        .with_guessed_format()
        .map_err(|_| ValidationError::Undecodable)
        .and_then(|r| r.decode().map_err(|_| ValidationError::Undecodable));

    reader
        .seek(SeekFrom::Start(0))
        .map_err(|_| ValidationError::Undecodable)?;

    decoded.map(|_| ())
}

/// Re-encode an image as RGB JPEG, shrinking it so neither side exceeds
/// `PREPROCESS_MAX_SIDE` while keeping the aspect ratio.
pub fn preprocess_image(bytes: &[u8]) -> Result<Vec<u8>, ValidationError> {
    let image = ImageReader::new(Cursor::new(bytes))
        .with_guessed_format()
        .map_err(|_| ValidationError::Undecodable)?
        .decode()
        .map_err(|_| ValidationError::Undecodable)?;

    let image = if image.width().max(image.height()) > PREPROCESS_MAX_SIDE {
        image.resize(PREPROCESS_MAX_SIDE, PREPROCESS_MAX_SIDE, FilterType::Lanczos3)
    } else {
        image
    };
    let rgb = image.to_rgb8();

    let mut out = Vec::new();
    JpegEncoder::new_with_quality(&mut out, PREPROCESS_JPEG_QUALITY)
        .encode_image(&rgb)
        .map_err(|e| {
            tracing::warn!("JPEG re-encode failed: {}", e);
            ValidationError::Undecodable
        })?;
    Ok(out)
}
