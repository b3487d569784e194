use std::str::FromStr;

use derive_more::Display;
use digest::Digest;
use md5::Md5;
use sha1::Sha1;
use sha2::Sha256;
use snafu::Snafu;

/// Separator placed between child digests before a directory is hashed.
/// Hex digests never contain it.
pub const DIGEST_SEPARATOR: &str = "|";

/// Content hash used for file bodies and directory aggregates.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Display)]
pub enum HashAlgorithm {
    #[display("md5")]
    Md5,
    #[default]
    #[display("sha1")]
    Sha1,
    #[display("sha256")]
    Sha256,
}

impl HashAlgorithm {
    /// Hashes `data` and returns the lowercase hex digest.
    pub fn hex_digest(&self, data: &[u8]) -> String {
        match self {
            HashAlgorithm::Md5 => hex_digest::<Md5>(data),
            HashAlgorithm::Sha1 => hex_digest::<Sha1>(data),
            HashAlgorithm::Sha256 => hex_digest::<Sha256>(data),
        }
    }

    /// Length of the hex digest produced by this algorithm.
    pub fn hex_len(&self) -> usize {
        match self {
            HashAlgorithm::Md5 => 32,
            HashAlgorithm::Sha1 => 40,
            HashAlgorithm::Sha256 => 64,
        }
    }
}

fn hex_digest<D: Digest>(data: &[u8]) -> String {
    hex::encode(D::digest(data))
}

impl FromStr for HashAlgorithm {
    type Err = UnsupportedAlgorithmError;

    fn from_str(name: &str) -> Result<Self, Self::Err> {
        match name.to_ascii_lowercase().as_str() {
            "md5" => Ok(HashAlgorithm::Md5),
            "sha1" => Ok(HashAlgorithm::Sha1),
            "sha256" => Ok(HashAlgorithm::Sha256),
            _ => Err(UnsupportedAlgorithmError {
                name: name.to_string(),
            }),
        }
    }
}

#[derive(Debug, Snafu)]
#[snafu(display("Unsupported hash algorithm '{}'", name))]
pub struct UnsupportedAlgorithmError {
    name: String,
}

impl UnsupportedAlgorithmError {
    pub fn name(&self) -> &str {
        &self.name
    }
}
