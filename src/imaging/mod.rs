pub mod sniff;
pub mod transform;

pub use sniff::{DataUri, ImageContentType, raw_payload};
pub use transform::{
    DEFAULT_THUMBNAIL_WIDTH, ImageDescriptor, decode, encode, is_transformable, resize,
    thumbnail_dimensions,
};
