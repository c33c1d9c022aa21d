//! Compound File Binary container used by legacy .xls workbooks and by
//! password-encrypted OOXML packages.

use crate::error::BentoError;
use crate::helpers::bytes::to_u16;
use crate::helpers::bytes::to_u64;
use crate::helpers::bytes::to_usize;
use crate::helpers::bytes::to_usize_iter;
use encoding_rs::UTF_16LE;
use std::collections::HashMap;
use thiserror::Error;

// const FREE_SECT: usize = 0xFFFFFFFF;
// const END_OF_CHAIN: usize = 0xFFFFFFFE;
// const FAT_SECT: usize = 0xFFFFFFFD;
// const DIF_SECT: usize = 0xFFFFFFFC;
const MAX_REG_SECT: usize = 0xFFFFFFFB;
const HEADER_SIZE: usize = 512;
const MINI_SECTOR_SIZE: usize = 64;
const MINI_STREAM_CUTOFF: usize = 4096;
const SIGNATURE: u64 = 0xE11A_B1A1_E011_CFD0;

#[derive(Error, Debug)]
pub enum CfbError {
    #[error("The file is corrupted or has an invalid CFB structure")]
    FileFormatError,

    #[error("Invalid OLE signature (not an office document?)")]
    OleSignatureError,

    #[error("Invalid Sector size '2 ^ {1}' for major version '{0}'")]
    SectorSizeError(u16, u16),

    #[error("The number of double indirect file allocation table error: expect '{0}', actual '{1}'")]
    DoubleIndirectFileAllocationTableError(usize, usize),

    #[error("The number of file allocation table error: expect '{0}', actual '{1}'")]
    FileAllocationTableError(usize, usize),

    #[error("Sector chain broken at sector {0}")]
    SectorChainError(usize),

    #[error("Empty Root directory")]
    RootDirectoryError,
}

/// A parsed compound file: directory index plus both allocation tables.
pub(crate) struct Cfb {
    directories: HashMap<String, Directory>,
    file_allocation_table: Vec<usize>,
    sectors: Sectors,
    mini_file_allocation_table: Vec<usize>,
    mini_sectors: Sectors,
}

impl Cfb {
    pub(crate) fn new(data: Vec<u8>) -> Result<Cfb, BentoError> {
        if data.len() < HEADER_SIZE {
            Err(CfbError::FileFormatError)?;
        }
        let header = Header::new(&data[..HEADER_SIZE])?;
        let sectors = Sectors { data, size: header.sector_size()? };
        let file_allocation_table = Self::load_file_allocation_table(&sectors, &header)?;
        let directories = Self::load_directories(&file_allocation_table, &sectors, header.directory_shift)?;
        let mini_file_allocation_table = Self::load_mini_file_allocation_table(&file_allocation_table, &sectors, &header)?;
        let mini_sectors = match directories.get("Root Entry") {
            Some(root) => Self::load_mini_sectors(&file_allocation_table, &sectors, root)?,
            None => Sectors { data: Vec::new(), size: MINI_SECTOR_SIZE },
        };

        Ok(Cfb {
            directories,
            file_allocation_table,
            sectors,
            mini_file_allocation_table,
            mini_sectors,
        })
    }

    pub(crate) fn exists(&self, name: &str) -> bool {
        self.directories.contains_key(name)
    }

    /// Reads a whole stream by name; small streams live in the mini stream.
    pub(crate) fn read(&self, name: &str) -> Result<Option<Vec<u8>>, BentoError> {
        if let Some(directory) = self.directories.get(name) {
            let mut bytes = if directory.count < MINI_STREAM_CUTOFF {
                Self::read_bytes(&self.mini_file_allocation_table, &self.mini_sectors, directory.index)?
            } else {
                Self::read_bytes(&self.file_allocation_table, &self.sectors, directory.index)?
            };
            bytes.truncate(directory.count);
            Ok(Some(bytes))
        } else {
            Ok(None)
        }
    }

    fn load_file_allocation_table(sectors: &Sectors, header: &Header) -> Result<Vec<usize>, BentoError> {
        let mut double_indirect_file_allocation_table: Vec<usize> = to_usize_iter(&sectors.data[76..HEADER_SIZE]).collect();

        let mut count = 0usize;
        let mut index = header.double_indirect_file_allocation_table_shift;
        while index < MAX_REG_SECT {
            if count >= header.double_indirect_file_allocation_table_count {
                Err(CfbError::DoubleIndirectFileAllocationTableError(header.double_indirect_file_allocation_table_count, count + 1))?
            }
            double_indirect_file_allocation_table.extend(to_usize_iter(sectors.get(index)?));
            // The last entry of each DIFAT sector links to the next one
            index = double_indirect_file_allocation_table.pop().ok_or(CfbError::FileFormatError)?;
            count += 1;
        }
        if count != header.double_indirect_file_allocation_table_count {
            Err(CfbError::DoubleIndirectFileAllocationTableError(header.double_indirect_file_allocation_table_count, count))?
        }

        let mut file_allocation_table: Vec<usize> = Vec::new();
        let mut count = 0usize;
        for index in double_indirect_file_allocation_table {
            if index < MAX_REG_SECT {
                file_allocation_table.extend(to_usize_iter(sectors.get(index)?));
                count += 1;
            }
        }
        if count != header.file_allocation_table_count {
            Err(CfbError::FileAllocationTableError(header.file_allocation_table_count, count))?
        }

        Ok(file_allocation_table)
    }

    fn load_directories(file_allocation_table: &[usize], sectors: &Sectors, index: usize) -> Result<HashMap<String, Directory>, BentoError> {
        let bytes = Self::read_bytes(file_allocation_table, sectors, index)?;
        let directories: HashMap<String, Directory> = bytes
            .chunks_exact(128)
            .map(Directory::new)
            .filter(|(name, _)| !name.is_empty())
            .collect();
        if directories.is_empty() {
            Err(CfbError::RootDirectoryError)?
        }
        Ok(directories)
    }

    fn load_mini_file_allocation_table(file_allocation_table: &[usize], sectors: &Sectors, header: &Header) -> Result<Vec<usize>, BentoError> {
        Ok(if header.mini_file_allocation_table_sector_count > 0 {
            let bytes = Self::read_bytes(file_allocation_table, sectors, header.mini_file_allocation_table_sector_shift)?;
            to_usize_iter(&bytes).collect()
        } else {
            Vec::new()
        })
    }

    /// The root entry's stream holds every mini sector back to back.
    fn load_mini_sectors(file_allocation_table: &[usize], sectors: &Sectors, root: &Directory) -> Result<Sectors, BentoError> {
        let mut data = Self::read_bytes(file_allocation_table, sectors, root.index)?;
        data.truncate(root.count);
        // Mini sectors are addressed from offset 0, not after a header
        let mut padded = vec![0u8; MINI_SECTOR_SIZE];
        padded.extend(data);
        Ok(Sectors { data: padded, size: MINI_SECTOR_SIZE })
    }

    /// Follows a sector chain until END_OF_CHAIN. A chain longer than the table is a loop.
    fn read_bytes(file_allocation_table: &[usize], sectors: &Sectors, index: usize) -> Result<Vec<u8>, BentoError> {
        let mut content: Vec<u8> = Vec::new();
        let mut index = index;
        let mut steps = 0usize;
        while index < MAX_REG_SECT {
            if steps > file_allocation_table.len() {
                Err(CfbError::SectorChainError(index))?
            }
            content.extend_from_slice(sectors.get(index)?);
            index = *file_allocation_table.get(index).ok_or(CfbError::SectorChainError(index))?;
            steps += 1;
        }
        Ok(content)
    }
}

/// Fixed-size sectors laid out after a one-sector prefix
struct Sectors {
    data: Vec<u8>,
    size: usize,
}

impl Sectors {
    fn get(&self, index: usize) -> Result<&[u8], CfbError> {
        let source = index
            .checked_add(1)
            .and_then(|next| next.checked_mul(self.size))
            .ok_or(CfbError::SectorChainError(index))?;
        if source >= self.data.len() {
            return Err(CfbError::SectorChainError(index));
        }
        let target = self.data.len().min(source + self.size);
        Ok(&self.data[source..target])
    }
}

struct Header {
    major_version: u16,
    sector_shift: u16,
    file_allocation_table_count: usize,
    directory_shift: usize,
    mini_file_allocation_table_sector_shift: usize,
    mini_file_allocation_table_sector_count: usize,
    double_indirect_file_allocation_table_shift: usize,
    double_indirect_file_allocation_table_count: usize,
}

impl Header {
    fn new(data: &[u8]) -> Result<Self, CfbError> {
        if to_u64(&data[0..8]) != SIGNATURE {
            return Err(CfbError::OleSignatureError);
        }
        Ok(Header {
            major_version: to_u16(&data[26..28]),
            sector_shift: to_u16(&data[30..32]),
            file_allocation_table_count: to_usize(&data[44..48]),
            directory_shift: to_usize(&data[48..52]),
            mini_file_allocation_table_sector_shift: to_usize(&data[60..64]),
            mini_file_allocation_table_sector_count: to_usize(&data[64..68]),
            double_indirect_file_allocation_table_shift: to_usize(&data[68..72]),
            double_indirect_file_allocation_table_count: to_usize(&data[72..76]),
        })
    }

    /// Version 3 uses 512-byte sectors, version 4 uses 4096-byte sectors.
    fn sector_size(&self) -> Result<usize, CfbError> {
        match (self.major_version, self.sector_shift) {
            (3, 0x0009) => Ok(512),
            (4, 0x000C) => Ok(4096),
            (version, shift) => Err(CfbError::SectorSizeError(version, shift)),
        }
    }
}

/// Start sector and byte size of one stream
struct Directory {
    index: usize,
    count: usize,
}

impl Directory {
    fn new(bytes: &[u8]) -> (String, Directory) {
        let size = (to_u16(&bytes[64..66]) as usize).min(64);
        let (name, _, _) = UTF_16LE.decode(&bytes[..size]);
        let name = match name.find('\0') {
            Some(position) => name[..position].to_owned(),
            None => name.to_string(),
        };

        let index = to_usize(&bytes[116..120]);
        let count = to_u64(&bytes[120..128]) as usize;
        (name, Directory { index, count })
    }
}

/// Writes a version 3 compound file holding `streams` (at most three) in regular sectors.
/// Streams shorter than the mini stream cutoff are zero-padded up to it.
#[cfg(test)]
pub(crate) fn compound_file(streams: &[(&str, &[u8])]) -> Vec<u8> {
    const END_OF_CHAIN: u32 = 0xFFFF_FFFE;
    const FREE: u32 = 0xFFFF_FFFF;
    const FAT: u32 = 0xFFFF_FFFD;

    let mut header = vec![0u8; HEADER_SIZE];
    header[0..8].copy_from_slice(&SIGNATURE.to_le_bytes());
    header[24..26].copy_from_slice(&0x3Eu16.to_le_bytes());
    header[26..28].copy_from_slice(&3u16.to_le_bytes());
    header[28..30].copy_from_slice(&0xFFFEu16.to_le_bytes());
    header[30..32].copy_from_slice(&9u16.to_le_bytes());
    header[32..34].copy_from_slice(&6u16.to_le_bytes());
    header[44..48].copy_from_slice(&1u32.to_le_bytes());
    header[48..52].copy_from_slice(&1u32.to_le_bytes());
    header[56..60].copy_from_slice(&(MINI_STREAM_CUTOFF as u32).to_le_bytes());
    header[60..64].copy_from_slice(&END_OF_CHAIN.to_le_bytes());
    header[68..72].copy_from_slice(&END_OF_CHAIN.to_le_bytes());
    for slot in header[76..].chunks_exact_mut(4) {
        slot.copy_from_slice(&FREE.to_le_bytes());
    }
    header[76..80].copy_from_slice(&0u32.to_le_bytes());

    let mut fat = vec![FREE; 128];
    fat[0] = FAT;
    fat[1] = END_OF_CHAIN;
    let mut directory = vec![0u8; 512];
    let mut entry = |slot: usize, name: &str, kind: u8, start: u32, size: u64| {
        let bytes = &mut directory[slot * 128..(slot + 1) * 128];
        let units: Vec<u16> = name.encode_utf16().chain([0]).collect();
        for (position, unit) in units.iter().enumerate() {
            bytes[position * 2..position * 2 + 2].copy_from_slice(&unit.to_le_bytes());
        }
        bytes[64..66].copy_from_slice(&((units.len() * 2) as u16).to_le_bytes());
        bytes[66] = kind;
        bytes[116..120].copy_from_slice(&start.to_le_bytes());
        bytes[120..128].copy_from_slice(&size.to_le_bytes());
    };
    entry(0, "Root Entry", 5, END_OF_CHAIN, 0);

    let mut body = Vec::<u8>::new();
    let mut next = 2usize;
    for (slot, (name, data)) in streams.iter().enumerate() {
        let mut data = data.to_vec();
        data.resize(data.len().max(MINI_STREAM_CUTOFF), 0);
        let count = data.len().div_ceil(512);
        for offset in 0..count {
            fat[next + offset] = if offset + 1 == count { END_OF_CHAIN } else { (next + offset + 1) as u32 };
        }
        entry(slot + 1, name, 2, next as u32, data.len() as u64);
        data.resize(count * 512, 0);
        body.extend(data);
        next += count;
    }

    let mut bytes = header;
    bytes.extend(fat.iter().flat_map(|value| value.to_le_bytes()));
    bytes.extend(directory);
    bytes.extend(body);
    bytes
}
