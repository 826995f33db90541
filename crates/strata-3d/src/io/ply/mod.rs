mod parser;
mod writer;

pub use parser::read_ply_binary;
pub use writer::write_ply_binary;

/// Error types for the PLY module.
#[derive(Debug, thiserror::Error)]
pub enum PlyError {
    /// Failed to read or write the PLY file
    #[error("Failed to access PLY file")]
    Io(#[from] std::io::Error),

    /// Malformed PLY header
    #[error("Malformed PLY header: {0}")]
    InvalidHeader(String),

    /// Unsupported PLY property layout
    #[error("Unsupported PLY property: {0}")]
    UnsupportedProperty(String),
}
