//! Error types for `BrresKit`

use thiserror::Error;

/// The error type for `BrresKit` operations.
#[non_exhaustive]
#[derive(Error, Debug)]
pub enum Error {
    // ==================== IO Errors ====================
    /// IO error from file operations or a truncated stream.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    // ==================== MDL0 Container Errors ====================
    /// The data is not an MDL0 model (missing MDL0 magic).
    #[error("invalid MDL0 magic: expected MDL0, found {0:?}")]
    InvalidMdl0Magic([u8; 4]),

    /// Only revision 11 models are understood.
    #[error("MDL0 is version {version}. Only MDL0 version 11 is supported.")]
    UnsupportedMdl0Version {
        /// The revision found in the header.
        version: u32,
    },

    /// A relative offset points outside of the input buffer.
    #[error("offset {offset:#x} is outside of the {len} byte buffer")]
    OffsetOutOfRange {
        /// The resolved absolute offset.
        offset: i64,
        /// Length of the buffer being read.
        len: usize,
    },

    /// A name dictionary is malformed or cannot be built.
    #[error("invalid dictionary: {message}")]
    InvalidDictionary {
        /// Description of what is invalid.
        message: String,
    },

    /// A bone record is malformed.
    #[error("invalid bone '{name}': {message}")]
    InvalidBone {
        /// Name of the bone, if known.
        name: String,
        /// Description of what is invalid.
        message: String,
    },

    /// A vertex buffer is malformed or its quantization is inconsistent.
    #[error("invalid buffer '{name}': {message}")]
    InvalidBuffer {
        /// Name of the buffer, if known.
        name: String,
        /// Description of what is invalid.
        message: String,
    },

    /// A material record is malformed.
    #[error("invalid material '{name}': {message}")]
    InvalidMaterial {
        /// Name of the material, if known.
        name: String,
        /// Description of what is invalid.
        message: String,
    },

    /// A mesh record is malformed.
    #[error("invalid mesh '{name}': {message}")]
    InvalidPolygon {
        /// Name of the mesh, if known.
        name: String,
        /// Description of what is invalid.
        message: String,
    },

    /// A mesh uses vertex features that cannot be represented.
    #[error("mesh '{name}' unsupported: {message}")]
    UnsupportedMesh {
        /// Name of the mesh.
        name: String,
        /// Description of the unsupported feature.
        message: String,
    },

    /// A render tree bytecode stream is malformed.
    #[error("invalid render tree '{name}': {message}")]
    InvalidRenderTree {
        /// Name of the bytecode method.
        name: String,
        /// Description of what is invalid.
        message: String,
    },

    // ==================== GPU Errors ====================
    /// A register field holds a value with no hardware meaning.
    #[error("invalid {register} register: field {field} has value {value}")]
    InvalidRegister {
        /// Register name.
        register: &'static str,
        /// Field name inside the register.
        field: &'static str,
        /// The raw field value.
        value: u32,
    },

    /// A display list could not be interpreted.
    #[error("display list error: {message}")]
    DisplayList {
        /// Description of the failure.
        message: String,
    },

    // ==================== MDL0 Writer Errors ====================
    /// The in-memory model cannot be encoded.
    #[error("invalid model: {message}")]
    InvalidModel {
        /// Description of what is invalid.
        message: String,
    },

    /// A relocation targets a label that was never placed.
    #[error("unresolved relocation target: {label}")]
    UnresolvedLabel {
        /// The missing label.
        label: String,
    },

    // ==================== RHST Errors ====================
    /// The RHST stream does not match the scene grammar.
    #[error("RHST grammar error at {offset:#x}: {message}")]
    RhstGrammar {
        /// Byte offset of the offending token.
        offset: u64,
        /// Description of the mismatch.
        message: String,
    },

    // ==================== Parsing Errors ====================
    /// JSON parsing or serialization error.
    #[error("JSON error: {0}")]
    JsonError(#[from] serde_json::Error),

    /// UTF-8 conversion error.
    #[error("UTF-8 conversion error: {0}")]
    Utf8Error(#[from] std::string::FromUtf8Error),

    // ==================== File System Errors ====================
    /// Directory traversal error.
    #[error("directory walk error: {0}")]
    WalkDirError(String),
}

// Add conversion from walkdir::Error
impl From<walkdir::Error> for Error {
    fn from(err: walkdir::Error) -> Self {
        Error::WalkDirError(err.to_string())
    }
}

impl Error {
    pub(crate) fn buffer(name: &str, message: impl Into<String>) -> Self {
        Error::InvalidBuffer {
            name: name.to_string(),
            message: message.into(),
        }
    }

    pub(crate) fn polygon(name: &str, message: impl Into<String>) -> Self {
        Error::InvalidPolygon {
            name: name.to_string(),
            message: message.into(),
        }
    }

    pub(crate) fn model(message: impl Into<String>) -> Self {
        Error::InvalidModel {
            message: message.into(),
        }
    }
}

/// A specialized Result type for `BrresKit` operations.
pub type Result<T> = std::result::Result<T, Error>;
