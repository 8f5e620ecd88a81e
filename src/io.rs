//! Block storage for indexed files
//!
//! A [`BlockStore`] reads and writes whole fixed-size blocks by absolute
//! index, plus the 12-byte header in front of them. Every failure is
//! explicit: a short read, an index past the end or a misaligned file length
//! is an error, never silently ignored.

use crate::error::{IsamError, Result};
use crate::header::{FileHeader, HEADER_SIZE};
use std::fs::{File, OpenOptions};
use std::io::{ErrorKind, Read, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};

/// Fixed-size block device
pub trait BlockStore {
    /// Bytes per block
    fn block_size(&self) -> usize;

    /// Number of whole blocks currently stored
    fn block_count(&self) -> u64;

    fn read_header(&mut self) -> Result<FileHeader>;

    fn write_header(&mut self, header: &FileHeader) -> Result<()>;

    /// Read block `index`; fails if `index >= block_count()`
    fn read_block(&mut self, index: u64) -> Result<Vec<u8>>;

    /// Write block `index`; `index == block_count()` appends
    fn write_block(&mut self, index: u64, data: &[u8]) -> Result<()>;

    /// Push buffered writes to stable storage
    fn sync(&mut self) -> Result<()> {
        Ok(())
    }

    /// Backing file, if any
    fn path(&self) -> Option<&Path> {
        None
    }
}

fn check_block_size(block_size: usize) -> Result<()> {
    if block_size == 0 {
        return Err(IsamError::InvalidArgument(
            "block size must be at least one byte".to_string(),
        ));
    }
    Ok(())
}

fn check_write(index: u64, data: &[u8], block_size: usize, count: u64) -> Result<()> {
    if data.len() != block_size {
        return Err(IsamError::InvalidArgument(format!(
            "Block data must be exactly {} bytes, got {}",
            block_size,
            data.len()
        )));
    }
    if index > count {
        return Err(IsamError::BlockOutOfRange { index, count });
    }
    Ok(())
}

/// Disk-backed block storage
pub struct DiskStore {
    file: File,
    path: PathBuf,
    block_size: usize,
    blocks: u64,
}

impl DiskStore {
    /// Create (or truncate) a file holding an all-zero header and no blocks
    pub fn create<P: AsRef<Path>>(path: P, block_size: usize) -> Result<Self> {
        check_block_size(block_size)?;
        let mut file = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .truncate(true)
            .open(&path)?;

        file.write_all(&FileHeader::new().to_bytes())?;
        file.flush()?;

        Ok(DiskStore {
            file,
            path: path.as_ref().to_path_buf(),
            block_size,
            blocks: 0,
        })
    }

    /// Open an existing file
    pub fn open<P: AsRef<Path>>(path: P, block_size: usize) -> Result<Self> {
        check_block_size(block_size)?;
        let file = OpenOptions::new().read(true).write(true).open(&path)?;
        let len = file.metadata()?.len();

        if len < HEADER_SIZE as u64 {
            return Err(IsamError::CorruptHeader(format!(
                "file is {} bytes, shorter than the {}-byte header",
                len, HEADER_SIZE
            )));
        }

        let body = len - HEADER_SIZE as u64;
        if body % block_size as u64 != 0 {
            return Err(IsamError::CorruptHeader(format!(
                "file length {} is not the header plus whole {}-byte blocks",
                len, block_size
            )));
        }

        Ok(DiskStore {
            file,
            path: path.as_ref().to_path_buf(),
            block_size,
            blocks: body / block_size as u64,
        })
    }

    /// Read into `buf` until it is full or the file ends, returning bytes read
    fn fill(&mut self, buf: &mut [u8]) -> Result<usize> {
        let mut filled = 0;
        while filled < buf.len() {
            match self.file.read(&mut buf[filled..]) {
                Ok(0) => break,
                Ok(n) => filled += n,
                Err(e) if e.kind() == ErrorKind::Interrupted => continue,
                Err(e) => return Err(e.into()),
            }
        }
        Ok(filled)
    }
}

impl BlockStore for DiskStore {
    fn block_size(&self) -> usize {
        self.block_size
    }

    fn block_count(&self) -> u64 {
        self.blocks
    }

    fn read_header(&mut self) -> Result<FileHeader> {
        self.file.seek(SeekFrom::Start(0))?;
        let mut buffer = [0u8; HEADER_SIZE];
        let read = self.fill(&mut buffer)?;
        if read < HEADER_SIZE {
            return Err(IsamError::CorruptHeader(format!(
                "read {} of {} header bytes",
                read, HEADER_SIZE
            )));
        }
        FileHeader::from_bytes(&buffer)
    }

    fn write_header(&mut self, header: &FileHeader) -> Result<()> {
        header.validate()?;
        self.file.seek(SeekFrom::Start(0))?;
        self.file.write_all(&header.to_bytes())?;
        self.file.flush()?;
        Ok(())
    }

    fn read_block(&mut self, index: u64) -> Result<Vec<u8>> {
        if index >= self.blocks {
            return Err(IsamError::BlockOutOfRange {
                index,
                count: self.blocks,
            });
        }

        let offset = HEADER_SIZE as u64 + index * self.block_size as u64;
        self.file.seek(SeekFrom::Start(offset))?;

        let mut buffer = vec![0u8; self.block_size];
        let read = self.fill(&mut buffer)?;
        if read < self.block_size {
            return Err(IsamError::ShortRead {
                index,
                expected: self.block_size,
                actual: read,
            });
        }

        Ok(buffer)
    }

    fn write_block(&mut self, index: u64, data: &[u8]) -> Result<()> {
        check_write(index, data, self.block_size, self.blocks)?;

        let offset = HEADER_SIZE as u64 + index * self.block_size as u64;
        self.file.seek(SeekFrom::Start(offset))?;
        self.file.write_all(data)?;
        self.file.flush()?;

        if index == self.blocks {
            self.blocks += 1;
        }

        Ok(())
    }

    fn sync(&mut self) -> Result<()> {
        self.file.sync_all()?;
        Ok(())
    }

    fn path(&self) -> Option<&Path> {
        Some(&self.path)
    }
}

/// In-memory block storage
#[derive(Debug, Clone)]
pub struct MemoryStore {
    header: [u8; HEADER_SIZE],
    blocks: Vec<Vec<u8>>,
    block_size: usize,
}

impl MemoryStore {
    pub fn new(block_size: usize) -> Self {
        MemoryStore {
            header: FileHeader::new().to_bytes(),
            blocks: Vec::new(),
            block_size,
        }
    }

    /// Rebuild a store from a file image (header followed by blocks)
    pub fn from_bytes(image: &[u8], block_size: usize) -> Result<Self> {
        check_block_size(block_size)?;
        if image.len() < HEADER_SIZE || (image.len() - HEADER_SIZE) % block_size != 0 {
            return Err(IsamError::CorruptHeader(format!(
                "image length {} is not the header plus whole {}-byte blocks",
                image.len(),
                block_size
            )));
        }

        let mut header = [0u8; HEADER_SIZE];
        header.copy_from_slice(&image[..HEADER_SIZE]);

        Ok(MemoryStore {
            header,
            blocks: image[HEADER_SIZE..]
                .chunks(block_size)
                .map(|chunk| chunk.to_vec())
                .collect(),
            block_size,
        })
    }

    /// The byte image a [`DiskStore`] would hold
    pub fn to_bytes(&self) -> Vec<u8> {
        let mut image = Vec::with_capacity(HEADER_SIZE + self.blocks.len() * self.block_size);
        image.extend_from_slice(&self.header);
        for block in &self.blocks {
            image.extend_from_slice(block);
        }
        image
    }
}

impl BlockStore for MemoryStore {
    fn block_size(&self) -> usize {
        self.block_size
    }

    fn block_count(&self) -> u64 {
        self.blocks.len() as u64
    }

    fn read_header(&mut self) -> Result<FileHeader> {
        FileHeader::from_bytes(&self.header)
    }

    fn write_header(&mut self, header: &FileHeader) -> Result<()> {
        header.validate()?;
        self.header = header.to_bytes();
        Ok(())
    }

    fn read_block(&mut self, index: u64) -> Result<Vec<u8>> {
        self.blocks
            .get(index as usize)
            .cloned()
            .ok_or(IsamError::BlockOutOfRange {
                index,
                count: self.blocks.len() as u64,
            })
    }

    fn write_block(&mut self, index: u64, data: &[u8]) -> Result<()> {
        check_write(index, data, self.block_size, self.blocks.len() as u64)?;

        if index as usize == self.blocks.len() {
            self.blocks.push(data.to_vec());
        } else {
            self.blocks[index as usize].copy_from_slice(data);
        }

        Ok(())
    }
}
