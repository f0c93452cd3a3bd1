//! Encoder and Image Loading
//!
//! Seams for the external embedding model and for reading images off disk.

use bytes::Bytes;
use std::fs;
use std::io;
use std::path::Path;

use crate::error::{EncoderError, Error, Result};

const JPEG_SIGNATURE: &[u8] = &[0xFF, 0xD8, 0xFF];
const PNG_SIGNATURE: &[u8] = &[0x89, b'P', b'N', b'G', 0x0D, 0x0A, 0x1A, 0x0A];

/// Image container formats recognized by the default loader
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ImageFormat {
    Jpeg,
    Png,
}

impl ImageFormat {
    /// Detect the format from the leading bytes
    pub fn sniff(data: &[u8]) -> Option<Self> {
        if data.starts_with(PNG_SIGNATURE) {
            Some(ImageFormat::Png)
        } else if data.starts_with(JPEG_SIGNATURE) {
            Some(ImageFormat::Jpeg)
        } else {
            None
        }
    }
}

/// Encoded image content handed to the encoder
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImageData {
    pub format: ImageFormat,
    pub bytes: Bytes,
}

impl ImageData {
    /// Wrap raw file content, rejecting anything that is not JPEG or PNG
    pub fn from_bytes(path: &Path, bytes: Bytes) -> Result<Self> {
        let format = ImageFormat::sniff(&bytes).ok_or_else(|| Error::ImageDecode {
            path: path.to_path_buf(),
            reason: "not a JPEG or PNG image".to_string(),
        })?;
        Ok(Self { format, bytes })
    }
}

/// Embedding model shared by text and images.
///
/// Both methods must return vectors of the same dimension, comparable
/// across modalities.
pub trait Encoder {
    fn encode_text(&self, text: &str) -> std::result::Result<Vec<f32>, EncoderError>;

    fn encode_image(&self, image: &ImageData) -> std::result::Result<Vec<f32>, EncoderError>;
}

impl<E: Encoder + ?Sized> Encoder for &E {
    fn encode_text(&self, text: &str) -> std::result::Result<Vec<f32>, EncoderError> {
        (**self).encode_text(text)
    }

    fn encode_image(&self, image: &ImageData) -> std::result::Result<Vec<f32>, EncoderError> {
        (**self).encode_image(image)
    }
}

impl<E: Encoder + ?Sized> Encoder for Box<E> {
    fn encode_text(&self, text: &str) -> std::result::Result<Vec<f32>, EncoderError> {
        (**self).encode_text(text)
    }

    fn encode_image(&self, image: &ImageData) -> std::result::Result<Vec<f32>, EncoderError> {
        (**self).encode_image(image)
    }
}

/// Reads an image file into memory
pub trait ImageLoader {
    fn load(&self, path: &Path) -> Result<ImageData>;
}

/// Default loader: reads the whole file and checks its signature
#[derive(Debug, Clone, Copy, Default)]
pub struct FileImageLoader;

impl ImageLoader for FileImageLoader {
    fn load(&self, path: &Path) -> Result<ImageData> {
        let data = match fs::read(path) {
            Ok(data) => data,
            Err(e) if e.kind() == io::ErrorKind::NotFound => {
                return Err(Error::ImageNotFound(path.to_path_buf()));
            }
            Err(e) => {
                return Err(Error::ImageDecode {
                    path: path.to_path_buf(),
                    reason: e.to_string(),
                });
            }
        };
        ImageData::from_bytes(path, Bytes::from(data))
    }
}
