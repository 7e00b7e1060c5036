//! MIME type detection based on file extensions.

pub const OCTET_STREAM: &str = "application/octet-stream";

/// Returns everything after the last `.` in `location`, or `None` when
/// there is no dot.
///
/// ```
/// # use sentinel_httpd::http::mime::extension_of;
/// assert_eq!(extension_of("/www/app.min.JS"), Some("JS"));
/// assert_eq!(extension_of("/www/README"), None);
/// ```
pub fn extension_of(location: &str) -> Option<&str> {
    location.rsplit_once('.').map(|(_, ext)| ext)
}

/// Content type for a file extension, matched case-insensitively.
pub fn content_type_for(extension: &str) -> &'static str {
    match extension.to_ascii_lowercase().as_str() {
        "html" | "htm" => "text/html; charset=utf-8",
        "css" => "text/css; charset=utf-8",
        "js" | "mjs" => "application/javascript; charset=utf-8",
        "json" => "application/json",
        "xml" => "application/xml",
        "txt" => "text/plain; charset=utf-8",
        "csv" => "text/csv",
        "png" => "image/png",
        "jpg" | "jpeg" => "image/jpeg",
        "gif" => "image/gif",
        "svg" => "image/svg+xml",
        "ico" => "image/x-icon",
        "webp" => "image/webp",
        "woff" => "font/woff",
        "woff2" => "font/woff2",
        "ttf" => "font/ttf",
        "otf" => "font/otf",
        "pdf" => "application/pdf",
        "zip" => "application/zip",
        "wasm" => "application/wasm",
        "mp3" => "audio/mpeg",
        "mp4" => "video/mp4",
        _ => OCTET_STREAM,
    }
}
