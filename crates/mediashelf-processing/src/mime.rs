//! Mime type helpers

use std::path::Path;

use image::ImageFormat;
use mediashelf_core::constants::FALLBACK_MIME_TYPE;

/// Guess a mime type from the extension of `file_name`
pub fn guess_mime_type(file_name: &str) -> String {
    let extension = Path::new(file_name)
        .extension()
        .and_then(|ext| ext.to_str())
        .map(|ext| ext.to_ascii_lowercase());

    let mime = match extension.as_deref() {
        Some("jpg") | Some("jpeg") => "image/jpeg",
        Some("png") => "image/png",
        Some("gif") => "image/gif",
        Some("webp") => "image/webp",
        Some("svg") => "image/svg+xml",
        Some("pdf") => "application/pdf",
        Some("txt") => "text/plain",
        Some("csv") => "text/csv",
        Some("json") => "application/json",
        Some("mp4") => "video/mp4",
        Some("webm") => "video/webm",
        Some("mp3") => "audio/mpeg",
        Some("wav") => "audio/wav",
        Some("zip") => "application/zip",
        _ => FALLBACK_MIME_TYPE,
    };
    mime.to_string()
}

/// Encoder format for a raster mime type; `None` for anything we cannot re-encode
pub fn image_format_for(mime_type: &str) -> Option<ImageFormat> {
    match mime_type.to_ascii_lowercase().as_str() {
        "image/jpeg" | "image/jpg" => Some(ImageFormat::Jpeg),
        "image/png" => Some(ImageFormat::Png),
        "image/gif" => Some(ImageFormat::Gif),
        "image/webp" => Some(ImageFormat::WebP),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_guess_mime_type() {
        assert_eq!(guess_mime_type("photo.JPG"), "image/jpeg");
        assert_eq!(guess_mime_type("report.pdf"), "application/pdf");
        assert_eq!(guess_mime_type("archive.tar.unknown"), FALLBACK_MIME_TYPE);
        assert_eq!(guess_mime_type("no-extension"), FALLBACK_MIME_TYPE);
    }

    #[test]
    fn test_image_format_for() {
        assert_eq!(image_format_for("image/png"), Some(ImageFormat::Png));
        assert_eq!(image_format_for("IMAGE/JPEG"), Some(ImageFormat::Jpeg));
        assert_eq!(image_format_for("image/svg+xml"), None);
    }
}
