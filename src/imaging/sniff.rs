//! Content-type classification for image payloads.
//!
//! Classification is permissive: anything that is not
//! recognisably JPEG or GIF is treated as PNG. A payload that is not really
//! PNG then fails at decode time with `IngestError::Decode`, not here.

use base64::{Engine as _, engine::general_purpose::STANDARD};
use image::ImageFormat;
use std::fmt;

use crate::s3::error::{IngestError, Result};

/// Image content types the pipeline understands
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ImageContentType {
    Png,
    /// Declared as `image/jpeg`, stored with a `.jpeg` extension
    Jpeg,
    /// Declared as `image/jpg` or sniffed from bytes, stored as `.jpg`
    Jpg,
    Gif,
}

impl ImageContentType {
    /// MIME type sent to the store; both JPEG spellings normalise to `image/jpeg`
    pub fn mime(self) -> &'static str {
        match self {
            Self::Png => "image/png",
            Self::Jpeg | Self::Jpg => "image/jpeg",
            Self::Gif => "image/gif",
        }
    }

    pub fn extension(self) -> &'static str {
        match self {
            Self::Png => ".png",
            Self::Jpeg => ".jpeg",
            Self::Jpg => ".jpg",
            Self::Gif => ".gif",
        }
    }

    pub fn is_jpeg(self) -> bool {
        matches!(self, Self::Jpeg | Self::Jpg)
    }

    pub(crate) fn image_format(self) -> ImageFormat {
        match self {
            Self::Png => ImageFormat::Png,
            Self::Jpeg | Self::Jpg => ImageFormat::Jpeg,
            Self::Gif => ImageFormat::Gif,
        }
    }

    /// Classify a declared MIME type, falling back to PNG
    pub fn from_mime(mime: &str) -> Self {
        match mime.trim().to_ascii_lowercase().as_str() {
            "image/jpeg" => Self::Jpeg,
            "image/jpg" => Self::Jpg,
            "image/gif" => Self::Gif,
            _ => Self::Png,
        }
    }

    /// Classify leading bytes by magic number, falling back to PNG
    pub fn sniff(bytes: &[u8]) -> Self {
        match image::guess_format(bytes) {
            Ok(ImageFormat::Jpeg) => Self::Jpg,
            Ok(ImageFormat::Gif) => Self::Gif,
            _ => Self::Png,
        }
    }
}

impl fmt::Display for ImageContentType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.mime())
    }
}

/// An inline image of the form `data:<mime>;base64,<payload>`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DataUri<'a> {
    mime: &'a str,
    payload: &'a str,
}

impl<'a> DataUri<'a> {
    /// Split a data URI into its declared MIME type and encoded payload
    ///
    /// # Errors
    ///
    /// Returns `IngestError::MalformedDataUri` if the `data:` scheme or the
    /// comma separating header from payload is missing.
    pub fn parse(input: &'a str) -> Result<Self> {
        let rest = input.strip_prefix("data:").ok_or_else(|| {
            IngestError::MalformedDataUri("missing 'data:' scheme".to_string())
        })?;
        let (header, payload) = rest.split_once(',').ok_or_else(|| {
            IngestError::MalformedDataUri("missing ',' before payload".to_string())
        })?;
        let mime = header.strip_suffix(";base64").unwrap_or(header);

        Ok(Self { mime, payload })
    }

    /// Declared MIME type, exactly as written
    pub fn mime(&self) -> &'a str {
        self.mime
    }

    pub fn content_type(&self) -> ImageContentType {
        ImageContentType::from_mime(self.mime)
    }

    pub fn extension(&self) -> &'static str {
        self.content_type().extension()
    }

    /// The base64 payload with the `data:...;base64,` prefix stripped
    pub fn raw_payload(&self) -> &'a str {
        self.payload
    }

    /// Decode the payload into image bytes
    pub fn decode_payload(&self) -> Result<Vec<u8>> {
        STANDARD
            .decode(self.payload.trim())
            .map_err(|e| IngestError::MalformedDataUri(format!("invalid base64 payload: {}", e)))
    }
}

/// Payload of a data URI without parsing anything else
pub fn raw_payload(data_uri: &str) -> Result<&str> {
    DataUri::parse(data_uri).map(|uri| uri.raw_payload())
}
