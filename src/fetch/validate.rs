//! Content validation for fetched items.

use std::io::Cursor;

use image::ImageReader;
use tracing::debug;

use super::FetchError;
use super::constants::MIN_ITEM_BYTES;

/// Phrases that mark a short body as a block or error page.
const BLOCK_MARKERS: [&str; 4] = ["blocked", "access denied", "forbidden", "error"];

/// Rejects bodies that are not usable images.
///
/// Short bodies are rejected outright: as [`FetchError::Blocked`] when they
/// read like a block page, as [`FetchError::InvalidContent`] otherwise. Longer
/// bodies must carry a recognizable image header with non-zero dimensions.
///
/// # Errors
///
/// Returns [`FetchError::Blocked`] or [`FetchError::InvalidContent`].
pub fn validate_item(url: &str, bytes: &[u8]) -> Result<(), FetchError> {
    if bytes.len() < MIN_ITEM_BYTES {
        let text = String::from_utf8_lossy(bytes).to_lowercase();
        if BLOCK_MARKERS.iter().any(|marker| text.contains(marker)) {
            return Err(FetchError::blocked(url, bytes.len()));
        }
        return Err(FetchError::invalid_content(
            url,
            format!("body too small ({} bytes)", bytes.len()),
        ));
    }

    let reader = ImageReader::new(Cursor::new(bytes))
        .with_guessed_format()
        .map_err(|e| FetchError::invalid_content(url, e.to_string()))?;
    let Some(format) = reader.format() else {
        return Err(FetchError::invalid_content(url, "unrecognized image format"));
    };
    let (width, height) = reader
        .into_dimensions()
        .map_err(|e| FetchError::invalid_content(url, format!("undecodable image: {e}")))?;
    if width == 0 || height == 0 {
        return Err(FetchError::invalid_content(url, "image has no pixels"));
    }
    debug!(?format, width, height, "item validated");
    Ok(())
}
