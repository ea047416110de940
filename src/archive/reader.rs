//! Archive reading.
//!
//! Opens an archive by parsing its header, then extracts members on demand.
//! For block-compressed archives only the blocks overlapping the requested
//! member are decompressed; a single block can be decoded in isolation,
//! which is what progressive loading and mid-file seeks rely on.

use super::codec;
use super::format::{ArchiveHeader, MemberEntry};
use super::ArchiveError;
use pak_model::CompressionType;
use std::fs::File;
use std::io::{Read, Seek, SeekFrom};
use std::path::Path;

pub struct ArchiveReader {
    file: File,
    header: ArchiveHeader,
    /// Absolute file offset of each compressed block; one past the end as a
    /// sentinel. Empty for whole-unit and uncompressed archives.
    block_offsets: Vec<u64>,
    body_start: u64,
}

impl ArchiveReader {
    pub fn open(path: &Path) -> Result<Self, ArchiveError> {
        let mut file = File::open(path)?;
        let header = ArchiveHeader::decode(&mut file)?;
        let body_start = file.stream_position()?;

        let mut block_offsets = Vec::with_capacity(header.blocks.len() + 1);
        let mut offset = body_start;
        for block in &header.blocks {
            block_offsets.push(offset);
            offset += u64::from(block.compressed_len);
        }
        block_offsets.push(offset);

        Ok(Self {
            file,
            header,
            block_offsets,
            body_start,
        })
    }

    pub fn codec(&self) -> CompressionType {
        self.header.codec
    }

    pub fn is_streamed(&self) -> bool {
        self.header.streamed
    }

    pub fn block_size(&self) -> u32 {
        self.header.block_size
    }

    pub fn block_count(&self) -> u32 {
        self.header.blocks.len() as u32
    }

    pub fn payload_len(&self) -> u64 {
        self.header.payload_len
    }

    pub fn members(&self) -> &[MemberEntry] {
        &self.header.members
    }

    /// Extracts one member by name.
    pub fn read_member(&mut self, name: &str) -> Result<Vec<u8>, ArchiveError> {
        let member = self
            .header
            .members
            .iter()
            .find(|m| m.name == name)
            .cloned()
            .ok_or_else(|| ArchiveError::MemberNotFound(name.to_string()))?;

        if member.size == 0 {
            return Ok(Vec::new());
        }

        if self.header.codec == CompressionType::None {
            return self.read_raw(self.body_start + member.offset, member.size as usize);
        }

        if !self.header.streamed {
            let payload = self.read_payload()?;
            let start = member.offset as usize;
            let end = start + member.size as usize;
            if end > payload.len() {
                return Err(ArchiveError::Corrupt(format!(
                    "member '{}' exceeds payload",
                    member.name
                )));
            }
            return Ok(payload[start..end].to_vec());
        }

        // Only the blocks the member overlaps are touched.
        let block_size = u64::from(self.header.block_size);
        let first = (member.offset / block_size) as u32;
        let last = ((member.offset + member.size - 1) / block_size) as u32;

        let mut assembled = Vec::with_capacity(member.size as usize);
        for index in first..=last {
            assembled.extend_from_slice(&self.read_block(index)?);
        }

        let start = (member.offset - u64::from(first) * block_size) as usize;
        let end = start + member.size as usize;
        if end > assembled.len() {
            return Err(ArchiveError::Corrupt(format!(
                "member '{}' exceeds block range",
                member.name
            )));
        }
        Ok(assembled[start..end].to_vec())
    }

    /// Decompresses one block in isolation. Only valid for block-compressed
    /// archives.
    pub fn read_block(&mut self, index: u32) -> Result<Vec<u8>, ArchiveError> {
        if self.header.codec == CompressionType::None || !self.header.streamed {
            return Err(ArchiveError::NotStreamed);
        }
        let count = self.header.blocks.len() as u32;
        if index >= count {
            return Err(ArchiveError::BlockOutOfRange { index, count });
        }

        let entry = self.header.blocks[index as usize];
        let compressed =
            self.read_raw(self.block_offsets[index as usize], entry.compressed_len as usize)?;
        codec::decompress_chunk(
            self.header.codec,
            &compressed,
            entry.uncompressed_len as usize,
        )
    }

    /// The whole uncompressed payload, in member directory order.
    pub fn read_payload(&mut self) -> Result<Vec<u8>, ArchiveError> {
        match self.header.codec {
            CompressionType::None => {
                self.read_raw(self.body_start, self.header.payload_len as usize)
            }
            _ if self.header.streamed => {
                let mut payload = Vec::with_capacity(self.header.payload_len as usize);
                for index in 0..self.block_count() {
                    payload.extend_from_slice(&self.read_block(index)?);
                }
                Ok(payload)
            }
            codec_type => {
                self.file.seek(SeekFrom::Start(self.body_start))?;
                let mut compressed = Vec::new();
                self.file.read_to_end(&mut compressed)?;
                codec::decompress_chunk(
                    codec_type,
                    &compressed,
                    self.header.payload_len as usize,
                )
            }
        }
    }

    fn read_raw(&mut self, offset: u64, len: usize) -> Result<Vec<u8>, ArchiveError> {
        self.file.seek(SeekFrom::Start(offset))?;
        let mut buf = vec![0u8; len];
        self.file.read_exact(&mut buf)?;
        Ok(buf)
    }
}
