//! Codec backends for the archive payload.
//!
//! LZ4 and LZ4HC share the LZ4 block format, so one decode path serves both.
//! The compression level tunes LZMA effort; the LZ4 backend has a single
//! entry point.

use super::ArchiveError;
use pak_model::{CompressionLevel, CompressionType};
use std::io::{Read, Write};

pub(crate) fn compress_chunk(
    codec: CompressionType,
    level: CompressionLevel,
    data: &[u8],
) -> Result<Vec<u8>, ArchiveError> {
    match codec {
        CompressionType::None => Ok(data.to_vec()),
        CompressionType::Lz4 | CompressionType::Lz4hc => Ok(lz4_flex::block::compress(data)),
        CompressionType::Lzma => {
            let mut encoder = xz2::write::XzEncoder::new(Vec::new(), lzma_preset(level));
            encoder
                .write_all(data)
                .map_err(|e| ArchiveError::Codec(e.to_string()))?;
            encoder.finish().map_err(|e| ArchiveError::Codec(e.to_string()))
        }
        CompressionType::Lzham => Err(ArchiveError::InvalidCompressionSettings(
            "codec 'lzham' is not supported by this archiver".to_string(),
        )),
    }
}

pub(crate) fn decompress_chunk(
    codec: CompressionType,
    data: &[u8],
    uncompressed_len: usize,
) -> Result<Vec<u8>, ArchiveError> {
    let out = match codec {
        CompressionType::None => data.to_vec(),
        CompressionType::Lz4 | CompressionType::Lz4hc => {
            lz4_flex::block::decompress(data, uncompressed_len)
                .map_err(|e| ArchiveError::Codec(e.to_string()))?
        }
        CompressionType::Lzma => {
            let mut out = Vec::with_capacity(uncompressed_len);
            xz2::read::XzDecoder::new(data)
                .read_to_end(&mut out)
                .map_err(|e| ArchiveError::Codec(e.to_string()))?;
            out
        }
        CompressionType::Lzham => {
            return Err(ArchiveError::Codec(
                "codec 'lzham' is not supported by this archiver".to_string(),
            ))
        }
    };

    if out.len() != uncompressed_len {
        return Err(ArchiveError::Corrupt(format!(
            "block decompressed to {} bytes, expected {}",
            out.len(),
            uncompressed_len
        )));
    }
    Ok(out)
}

fn lzma_preset(level: CompressionLevel) -> u32 {
    match level {
        CompressionLevel::None | CompressionLevel::Fastest => 0,
        CompressionLevel::Fast => 2,
        CompressionLevel::Normal => 6,
        CompressionLevel::High => 8,
        CompressionLevel::Maximum => 9,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_data() -> Vec<u8> {
        // Compressible but not trivial.
        (0..4096u32).flat_map(|i| (i / 7).to_le_bytes()).collect()
    }

    #[test]
    fn test_lz4_roundtrip() {
        let data = sample_data();
        let compressed =
            compress_chunk(CompressionType::Lz4, CompressionLevel::Normal, &data).unwrap();
        let restored = decompress_chunk(CompressionType::Lz4, &compressed, data.len()).unwrap();
        assert_eq!(restored, data);
    }

    #[test]
    fn test_lzma_roundtrip_at_each_level() {
        let data = sample_data();
        for level in [
            CompressionLevel::Fastest,
            CompressionLevel::Normal,
            CompressionLevel::Maximum,
        ] {
            let compressed = compress_chunk(CompressionType::Lzma, level, &data).unwrap();
            let restored =
                decompress_chunk(CompressionType::Lzma, &compressed, data.len()).unwrap();
            assert_eq!(restored, data);
        }
    }

    #[test]
    fn test_lz4hc_decodes_with_lz4_path() {
        let data = sample_data();
        let compressed =
            compress_chunk(CompressionType::Lz4hc, CompressionLevel::High, &data).unwrap();
        let restored = decompress_chunk(CompressionType::Lz4, &compressed, data.len()).unwrap();
        assert_eq!(restored, data);
    }

    #[test]
    fn test_lzham_unsupported() {
        assert!(matches!(
            compress_chunk(CompressionType::Lzham, CompressionLevel::Normal, b"x"),
            Err(ArchiveError::InvalidCompressionSettings(_))
        ));
    }

    #[test]
    fn test_length_mismatch_is_corrupt() {
        let data = sample_data();
        let compressed =
            compress_chunk(CompressionType::Lzma, CompressionLevel::Fast, &data).unwrap();
        assert!(matches!(
            decompress_chunk(CompressionType::Lzma, &compressed, data.len() + 1),
            Err(ArchiveError::Corrupt(_))
        ));
    }
}
