/// Map a declared content type to a file extension.
///
/// Lookup is exact-string only: a value carrying parameters
/// (`image/png; charset=utf-8`) does not match. Anything unknown
/// falls back to `txt`.
pub fn extension_for(content_type: &str) -> &'static str {
    match content_type {
        "video/mp4" => "mp4",
        "video/mpeg" => "mpeg",
        "video/webm" => "webm",
        "video/ogg" => "ogv",
        "video/3gpp" => "3gp",
        "video/quicktime" => "mov",
        "video/x-flv" => "flv",
        "video/x-matroska" => "mkv",
        "video/x-msvideo" => "avi",
        "video/x-m4v" => "m4v",
        "video/x-ms-wmv" => "wmv",
        "image/png" => "png",
        "image/jpeg" => "jpg",
        "image/gif" => "gif",
        "image/webp" => "webp",
        "image/bmp" => "bmp",
        "image/tiff" => "tiff",
        "image/svg+xml" => "svg",
        "audio/mpeg" => "mp3",
        "audio/ogg" => "ogg",
        "audio/wav" => "wav",
        "audio/flac" => "flac",
        "audio/aac" => "aac",
        "application/pdf" => "pdf",
        "application/json" => "json",
        "application/xml" => "xml",
        "application/msword" => "doc",
        "application/zip" => "zip",
        "application/gzip" => "gz",
        "application/x-tar" => "tar",
        "application/x-7z-compressed" => "7z",
        "text/plain" => "txt",
        "text/html" => "html",
        "text/csv" => "csv",
        _ => "txt",
    }
}
