use crate::diagnostic::{DecodeStage, Severity};
use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum DecodeError {
    #[error("Chunk at {offset:#x} declares length {length}, smaller than its own header")]
    ChunkTooSmall { offset: usize, length: u32 },
    #[error("Chunk '{tag}' at {offset:#x} extends past the end of the file")]
    TruncatedChunk { offset: usize, tag: String },
    #[error("Chunk '{tag}' is too short to hold its fields ({length} bytes)")]
    ShortChunk { tag: String, length: usize },
    #[error("Invalid bit depth code {0} in preamble")]
    InvalidDepthCode(u32),
    #[error("Uncoded pixels need 8 or 16 bits per pixel, got {0}")]
    UncodedDepth(u32),
    #[error("Invalid image dimensions {width}x{height}")]
    InvalidDimensions { width: i64, height: i64 },
    #[error("Pixel data is missing its preamble")]
    MissingPreamble,
    #[error("Pixel data without a preceding CCB header")]
    MissingHeader,
    #[error("Unpacked pixel data needs known dimensions")]
    UnknownDimensions,
    #[error("No image data found")]
    NoImageData,
    #[error("Indexed image has no palette")]
    MissingPalette,
}

impl DecodeError {
    pub fn stage(&self) -> DecodeStage {
        match self {
            DecodeError::ChunkTooSmall { .. }
            | DecodeError::TruncatedChunk { .. }
            | DecodeError::NoImageData => DecodeStage::Container,
            DecodeError::ShortChunk { .. }
            | DecodeError::InvalidDepthCode(_)
            | DecodeError::UncodedDepth(_)
            | DecodeError::InvalidDimensions { .. }
            | DecodeError::MissingPreamble
            | DecodeError::MissingHeader => DecodeStage::Header,
            DecodeError::UnknownDimensions => DecodeStage::Dispatch,
            DecodeError::MissingPalette => DecodeStage::Materialize,
        }
    }

    /// Every decode error only affects the file being decoded.
    pub fn severity(&self) -> Severity {
        Severity::Error
    }
}
