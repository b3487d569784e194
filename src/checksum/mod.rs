//! Content checksums for walked entries.
//!
//! Files hash their full contents. Directories hash the digests of their
//! children, taken in discovery order and joined by [`DIGEST_SEPARATOR`].

mod algorithm;
mod entry_checksum;

pub use algorithm::{DIGEST_SEPARATOR, HashAlgorithm, UnsupportedAlgorithmError};
pub use entry_checksum::ChecksumError;
