//! Shapes the value handed back for a cached file.

use crate::error::{MediaCacheError, Result};
use base64::engine::general_purpose::STANDARD;
use base64::Engine as _;
use std::path::Path;
use url::Url;

/// `file://` URL for an absolute cached file path.
pub fn file_uri(path: &Path) -> Result<String> {
    Url::from_file_path(path)
        .map(String::from)
        .map_err(|_| {
            MediaCacheError::FilesystemFailure(format!(
                "Cached file path is not absolute: {}",
                path.display()
            ))
        })
}

/// `data:<mime>;base64,<payload>` URL for file contents.
pub fn data_url(file_name: &str, contents: &[u8]) -> String {
    format!(
        "data:{};base64,{}",
        mime_for(file_name),
        STANDARD.encode(contents)
    )
}

/// MIME type for a cached file name, `*/*` when the extension is unknown.
pub fn mime_for(file_name: &str) -> &'static str {
    let extension = file_name
        .rsplit_once('.')
        .map(|(_, ext)| ext.to_ascii_lowercase())
        .unwrap_or_default();

    match extension.as_str() {
        "jpg" | "jpeg" | "jfif" => "image/jpeg",
        "png" => "image/png",
        "gif" => "image/gif",
        "webp" => "image/webp",
        "avif" => "image/avif",
        "bmp" => "image/bmp",
        "ico" => "image/x-icon",
        "svg" => "image/svg+xml",
        "tif" | "tiff" => "image/tiff",
        "mp4" | "m4v" => "video/mp4",
        "webm" => "video/webm",
        "mov" => "video/quicktime",
        "ogv" => "video/ogg",
        "mp3" => "audio/mpeg",
        "m4a" => "audio/mp4",
        "aac" => "audio/aac",
        "wav" => "audio/wav",
        "ogg" | "oga" => "audio/ogg",
        "flac" => "audio/flac",
        "pdf" => "application/pdf",
        _ => "*/*",
    }
}
