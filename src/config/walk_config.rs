use std::{borrow::Cow, path::Path};

use compio::fs;
use hashlink::LinkedHashMap;
use saphyr::{LoadableYamlNode, Scalar, Yaml};
use snafu::prelude::*;
use tracing::debug;

use crate::checksum::{HashAlgorithm, UnsupportedAlgorithmError};
use crate::ext::BestEffortPathExt;

const CHECKSUM_SECTION: &str = "checksum";
const FILE_ALGORITHM_KEY: &str = "file";
const DIRECTORY_ALGORITHM_KEY: &str = "directory";

/// Settings shared by every entry of one walk.
///
/// The algorithms are fixed once a walk starts; entries keep a shared handle
/// to the config of the walk that created them.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct WalkConfig {
    /// Hash over the full bytes of a file.
    pub file_algorithm: HashAlgorithm,
    /// Hash over the joined child digests of a directory.
    pub directory_algorithm: HashAlgorithm,
}

impl WalkConfig {
    pub fn new(file_algorithm: HashAlgorithm, directory_algorithm: HashAlgorithm) -> Self {
        Self {
            file_algorithm,
            directory_algorithm,
        }
    }

    /// Uses the same algorithm for files and directories.
    pub fn with_algorithm(algorithm: HashAlgorithm) -> Self {
        Self::new(algorithm, algorithm)
    }

    pub async fn from_path(path: impl AsRef<Path>) -> Result<Self, WalkConfigError> {
        let path = path.as_ref();
        debug!("Opening config file: {}", path.best_effort_path_display());
        let bytes = fs::read(path).await.context(ReadSnafu {
            file_path: path.best_effort_path_display(),
        })?;
        debug!("Successfully read config file: {} bytes", bytes.len());

        let contents = String::from_utf8(bytes).context(EncodingSnafu {
            file_path: path.best_effort_path_display(),
        })?;
        contents.as_str().try_into()
    }

    fn parse_algorithm(
        section: &LinkedHashMap<Yaml, Yaml>,
        key: &'static str,
    ) -> Result<Option<HashAlgorithm>, WalkConfigError> {
        let Some(value) = section.get(&Yaml::Value(Scalar::String(Cow::Borrowed(key)))) else {
            return Ok(None);
        };

        let name = value
            .as_str()
            .ok_or(WalkConfigError::InvalidValue { key })?;
        let algorithm = name.parse::<HashAlgorithm>().context(AlgorithmSnafu { key })?;
        Ok(Some(algorithm))
    }
}

impl TryFrom<&str> for WalkConfig {
    type Error = WalkConfigError;

    fn try_from(contents: &str) -> Result<Self, Self::Error> {
        let documents = Yaml::load_from_str(contents).context(ParseSnafu)?;
        let document = documents
            .first()
            .ok_or(WalkConfigError::MalformedConfig)?;

        let top_level = document
            .as_mapping()
            .ok_or(WalkConfigError::TopLevelNotMap)?;

        let mut config = WalkConfig::default();
        let Some(section) =
            top_level.get(&Yaml::Value(Scalar::String(Cow::Borrowed(CHECKSUM_SECTION))))
        else {
            debug!("No '{}' section in config, using defaults", CHECKSUM_SECTION);
            return Ok(config);
        };

        let section = section
            .as_mapping()
            .ok_or(WalkConfigError::SectionNotMap {
                section: CHECKSUM_SECTION,
            })?;

        if let Some(algorithm) = Self::parse_algorithm(section, FILE_ALGORITHM_KEY)? {
            config.file_algorithm = algorithm;
        }
        if let Some(algorithm) = Self::parse_algorithm(section, DIRECTORY_ALGORITHM_KEY)? {
            config.directory_algorithm = algorithm;
        }

        debug!("Loaded walk config: {:?}", config);
        Ok(config)
    }
}

#[derive(Debug, Snafu)]
pub enum WalkConfigError {
    #[snafu(display("Failed to read the config file: {}", file_path))]
    ReadError {
        file_path: String,
        source: std::io::Error,
    },
    #[snafu(display("Config file {} is not valid UTF-8", file_path))]
    EncodingError {
        file_path: String,
        source: std::string::FromUtf8Error,
    },
    #[snafu(display("Failed to parse the config file"))]
    ParseError { source: saphyr::ScanError },
    #[snafu(display("Improperly formatted config file"))]
    MalformedConfig,
    #[snafu(display("Top level of config should be a map"))]
    TopLevelNotMap,
    #[snafu(display("Section '{}' should be a map", section))]
    SectionNotMap { section: &'static str },
    #[snafu(display("Value of '{}' should be a string", key))]
    InvalidValue { key: &'static str },
    #[snafu(display("Invalid algorithm for '{}'", key))]
    AlgorithmError {
        key: &'static str,
        source: UnsupportedAlgorithmError,
    },
}
