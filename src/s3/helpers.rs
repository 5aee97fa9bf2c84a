use std::path::Path;

/// Detect Content-Type for a plain file upload from its extension
///
/// Returns `None` for unknown extensions so the store applies its own
/// default instead of a guessed type.
pub fn detect_content_type(path: &Path) -> Option<&'static str> {
    let ext = path.extension()?.to_str()?.to_ascii_lowercase();
    let content_type = match ext.as_str() {
        "jpg" | "jpeg" => "image/jpeg",
        "png" => "image/png",
        "gif" => "image/gif",
        "pdf" => "application/pdf",
        "txt" | "log" => "text/plain",
        "csv" => "text/csv",
        "json" => "application/json",
        "html" | "htm" => "text/html",
        "gz" => "application/gzip",
        "zip" => "application/zip",
        "mp4" => "video/mp4",
        "mov" => "video/quicktime",
        _ => return None,
    };
    Some(content_type)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    #[test]
    fn test_detect_content_type_known() {
        assert_eq!(
            detect_content_type(&PathBuf::from("photo.JPG")),
            Some("image/jpeg")
        );
        assert_eq!(
            detect_content_type(&PathBuf::from("app.log")),
            Some("text/plain")
        );
        assert_eq!(
            detect_content_type(&PathBuf::from("archive.gz")),
            Some("application/gzip")
        );
    }

    #[test]
    fn test_detect_content_type_unknown() {
        assert_eq!(detect_content_type(&PathBuf::from("file.unknown")), None);
        assert_eq!(detect_content_type(&PathBuf::from("no_extension")), None);
    }
}
