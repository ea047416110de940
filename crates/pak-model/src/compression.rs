//! Compression settings carried per bundle through the archival phase.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// Default block size for streamed compression (128 KiB).
pub const DEFAULT_BLOCK_SIZE: u32 = 131072;

/// Payload codec of an archive.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum CompressionType {
    /// Members are stored verbatim.
    #[default]
    None,
    Lzma,
    Lz4,
    Lz4hc,
    Lzham,
}

/// Effort/ratio trade-off of the codec.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum CompressionLevel {
    /// Only valid together with `CompressionType::None`.
    None,
    Fastest,
    Fast,
    #[default]
    Normal,
    High,
    Maximum,
}

/// Invalid compression configuration.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum SettingsError {
    #[error("level 'none' is invalid with codec '{0}'")]
    LevelNoneWithCodec(CompressionType),

    #[error("block size must be greater than zero")]
    ZeroBlockSize,
}

/// Per-bundle compression configuration for the archival phase.
///
/// Not persisted beyond a single archive call; the same raw resource files
/// may be re-archived repeatedly with different settings.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct CompressionSettings {
    pub compression: CompressionType,

    pub level: CompressionLevel,

    /// Block granularity for streamed compression, in bytes.
    #[serde(default = "default_block_size")]
    pub block_size: u32,

    /// Compress in independent blocks so a reader can decompress and discard
    /// one block at a time. `false` compresses the whole payload as one unit
    /// (higher ratio, no random access).
    #[serde(default)]
    pub streamed: bool,
}

fn default_block_size() -> u32 {
    DEFAULT_BLOCK_SIZE
}

impl Default for CompressionSettings {
    fn default() -> Self {
        Self::uncompressed()
    }
}

impl CompressionSettings {
    /// Store members verbatim.
    pub fn uncompressed() -> Self {
        Self {
            compression: CompressionType::None,
            level: CompressionLevel::None,
            block_size: DEFAULT_BLOCK_SIZE,
            streamed: false,
        }
    }

    /// LZ4 at normal level, whole-payload.
    pub fn lz4() -> Self {
        Self {
            compression: CompressionType::Lz4,
            level: CompressionLevel::Normal,
            block_size: DEFAULT_BLOCK_SIZE,
            streamed: false,
        }
    }

    /// LZMA at maximum level, whole-payload.
    pub fn lzma() -> Self {
        Self {
            compression: CompressionType::Lzma,
            level: CompressionLevel::Maximum,
            block_size: DEFAULT_BLOCK_SIZE,
            streamed: false,
        }
    }

    /// Switch to streamed block compression.
    pub fn streamed(mut self) -> Self {
        self.streamed = true;
        self
    }

    /// Check the level/codec and block-size rules.
    pub fn validate(&self) -> Result<(), SettingsError> {
        if self.block_size == 0 {
            return Err(SettingsError::ZeroBlockSize);
        }
        if self.compression != CompressionType::None && self.level == CompressionLevel::None {
            return Err(SettingsError::LevelNoneWithCodec(self.compression));
        }
        Ok(())
    }
}

impl fmt::Display for CompressionType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            CompressionType::None => "none",
            CompressionType::Lzma => "lzma",
            CompressionType::Lz4 => "lz4",
            CompressionType::Lz4hc => "lz4hc",
            CompressionType::Lzham => "lzham",
        };
        write!(f, "{}", s)
    }
}

impl FromStr for CompressionType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "none" => Ok(CompressionType::None),
            "lzma" => Ok(CompressionType::Lzma),
            "lz4" => Ok(CompressionType::Lz4),
            "lz4hc" => Ok(CompressionType::Lz4hc),
            "lzham" => Ok(CompressionType::Lzham),
            other => Err(format!(
                "unknown codec '{}' (expected none, lzma, lz4, lz4hc, lzham)",
                other
            )),
        }
    }
}

impl fmt::Display for CompressionLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            CompressionLevel::None => "none",
            CompressionLevel::Fastest => "fastest",
            CompressionLevel::Fast => "fast",
            CompressionLevel::Normal => "normal",
            CompressionLevel::High => "high",
            CompressionLevel::Maximum => "maximum",
        };
        write!(f, "{}", s)
    }
}

impl FromStr for CompressionLevel {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "none" => Ok(CompressionLevel::None),
            "fastest" => Ok(CompressionLevel::Fastest),
            "fast" => Ok(CompressionLevel::Fast),
            "normal" => Ok(CompressionLevel::Normal),
            "high" => Ok(CompressionLevel::High),
            "maximum" => Ok(CompressionLevel::Maximum),
            other => Err(format!(
                "unknown level '{}' (expected none, fastest, fast, normal, high, maximum)",
                other
            )),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_level_none_with_codec_is_invalid() {
        let settings = CompressionSettings {
            compression: CompressionType::Lz4,
            level: CompressionLevel::None,
            block_size: DEFAULT_BLOCK_SIZE,
            streamed: false,
        };
        assert_eq!(
            settings.validate(),
            Err(SettingsError::LevelNoneWithCodec(CompressionType::Lz4))
        );
    }

    #[test]
    fn test_zero_block_size_is_invalid() {
        let settings = CompressionSettings {
            block_size: 0,
            ..CompressionSettings::lz4()
        };
        assert_eq!(settings.validate(), Err(SettingsError::ZeroBlockSize));
    }

    #[test]
    fn test_uncompressed_with_level_none_is_valid() {
        assert!(CompressionSettings::uncompressed().validate().is_ok());
    }

    #[test]
    fn test_codec_parse_roundtrip() {
        for codec in ["none", "lzma", "lz4", "lz4hc", "lzham"] {
            let parsed: CompressionType = codec.parse().unwrap();
            assert_eq!(parsed.to_string(), codec);
        }
        assert!("deflate".parse::<CompressionType>().is_err());
    }
}
