//! Minimal ROOT file I/O: flat TTree branches and TH1F histograms.
//!
//! Reading covers the subset the scorer needs (top-level keys, TTree/TBranch
//! metadata, fixed-size leaves, ZL/L4/ZS compressed blocks). Writing covers
//! uncompressed keyed objects in a small (32-bit seek) file.

pub mod basket;
pub mod decompress;
pub mod file;
pub mod key;
pub mod rbuffer;
pub mod th1;
pub mod ttree;
pub mod wbuffer;
pub mod writer;

pub use file::RootFile;
pub use ttree::Tree;
pub use writer::RootWriter;

/// Set on the leading u32 of a streamed object when a byte count follows.
pub const K_BYTE_COUNT_MASK: u32 = 0x4000_0000;
/// Introduces a class name the first time it appears in a buffer.
pub const K_NEW_CLASS_TAG: u32 = 0xFFFF_FFFF;
/// Marks a back-reference to a class already registered in the buffer.
pub const K_CLASS_MASK: u32 = 0x8000_0000;
/// Offset ROOT adds to buffer positions stored in its reference map.
pub const K_MAP_OFFSET: usize = 2;

pub type Result<T> = std::result::Result<T, RootError>;

#[derive(Debug, thiserror::Error)]
pub enum RootError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("not a ROOT file (bad magic)")]
    BadMagic,
    #[error("buffer underflow at offset {offset}: need {need} bytes, have {have}")]
    BufferUnderflow {
        offset: usize,
        need: usize,
        have: usize,
    },
    #[error("decompression failed: {0}")]
    Decompression(String),
    #[error("malformed ROOT data: {0}")]
    Deserialization(String),
    #[error("object '{0}' not found")]
    KeyNotFound(String),
    #[error("object '{name}' is a {found}, expected {expected}")]
    ClassMismatch {
        name: String,
        expected: &'static str,
        found: String,
    },
    #[error("branch '{branch}' has unsupported leaf class {class}")]
    UnsupportedLeaf { branch: String, class: String },
    #[error("file exceeds the 2 GB small-file layout")]
    FileTooLarge,
}

#[cfg(test)]
#[path = "../../tests/src_inline/rootio/fixture.rs"]
pub(crate) mod fixture;

#[cfg(test)]
#[path = "../../tests/src_inline/rootio/tests.rs"]
mod tests;
