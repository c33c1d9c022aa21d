//! Record reader for the BIFF8 stream inside a legacy .xls workbook.
//! A record is a 2-byte type, a 2-byte size and its payload; CONTINUE records
//! extend the payload of the record before them.

use crate::error::BentoError;
use crate::helpers::bytes::to_f64;
use crate::helpers::bytes::to_u16;
use crate::helpers::bytes::to_u32;
use crate::helpers::bytes::to_u64;
use crate::helpers::bytes::to_usize;
use encoding_rs::Encoding;
use thiserror::Error;

const CONTINUE: u16 = 60;

#[derive(Error, Debug)]
pub enum Biff8Error {
    #[error("Fewer than {0} bytes remaining")]
    NoEnoughDataError(usize),
}

pub(crate) struct Biff8Reader {
    /// Decoder for uncompressed strings, set from the CODEPAGE record
    pub(crate) encoding: &'static Encoding,
    buffer: Vec<u8>,
    /// Start of the next record header
    pointer: usize,
    /// Payload ranges of the current record and its CONTINUE records
    chunks: Vec<(usize, usize)>,
    index: usize,
    offset: usize,
}

impl Biff8Reader {
    pub(crate) fn new(data: Vec<u8>) -> Biff8Reader {
        Biff8Reader {
            encoding: encoding_rs::UTF_16LE,
            buffer: data,
            pointer: 0,
            chunks: Vec::new(),
            index: 0,
            offset: 0,
        }
    }

    /// Advances to the next record and returns its type, or `None` at the end of the stream.
    pub(crate) fn next(&mut self) -> Result<Option<u16>, BentoError> {
        if self.pointer + 4 > self.buffer.len() {
            return Ok(None);
        }
        self.index = 0;
        self.offset = 0;

        let kind = self.get_u16_at(self.pointer)?;
        let (lower, upper) = self.chunk_at(self.pointer)?;
        self.pointer = upper;
        self.chunks.clear();
        self.chunks.push((lower, upper));
        while self.pointer + 4 <= self.buffer.len() && self.get_u16_at(self.pointer)? == CONTINUE {
            let (lower, upper) = self.chunk_at(self.pointer)?;
            self.pointer = upper;
            self.chunks.push((lower, upper));
        }
        Ok(Some(kind))
    }

    fn chunk_at(&self, pointer: usize) -> Result<(usize, usize), BentoError> {
        let size = self.get_u16_at(pointer + 2)? as usize;
        let lower = pointer + 4;
        let upper = lower + size;
        if upper > self.buffer.len() {
            Err(Biff8Error::NoEnoughDataError(size))?
        }
        Ok((lower, upper))
    }

    /// Moves to an absolute stream offset, such as a sheet's BOF record.
    pub(crate) fn goto(&mut self, pointer: usize) {
        self.pointer = pointer;
        self.chunks.clear();
    }

    fn read_extract(&mut self, length: usize) -> Result<&[u8], BentoError> {
        let (data, size) = self.read(length);
        if size == length {
            Ok(data)
        } else {
            Err(Biff8Error::NoEnoughDataError(length))?
        }
    }

    /// Reads up to `length` bytes without crossing into the next chunk.
    fn read(&mut self, length: usize) -> (&[u8], usize) {
        if let Some((lower, upper)) = self.chunks.get(self.index).copied() {
            let source = upper.min(lower + self.offset);
            let target = upper.min(source + length);
            let size = target - source;
            if source < upper {
                if target == upper {
                    self.index += 1;
                    self.offset = 0;
                } else {
                    self.offset += size;
                }
                return (&self.buffer[source..target], size);
            }
        }
        (&[], 0)
    }

    pub(crate) fn skip(&mut self, length: usize) -> Result<(), BentoError> {
        let mut remaining = length;
        while remaining > 0 {
            let (_, size) = self.read(remaining);
            if size == 0 {
                Err(Biff8Error::NoEnoughDataError(remaining))?
            }
            remaining -= size;
        }
        Ok(())
    }

    pub(crate) fn read_u8(&mut self) -> Result<u8, BentoError> {
        self.read_extract(1).map(|data| data[0])
    }

    pub(crate) fn read_u16(&mut self) -> Result<u16, BentoError> {
        self.read_extract(2).map(to_u16)
    }

    /// Reads the u16 that ends `offset` bytes before the end of the current record.
    pub(crate) fn get_u16_back(&self, offset: usize) -> Result<u16, BentoError> {
        let mut offset = offset;
        for (lower, upper) in self.chunks.iter().rev() {
            if *lower + offset <= *upper {
                return self.get_u16_at(*upper - offset);
            }
            offset -= *upper - *lower;
        }
        Err(Biff8Error::NoEnoughDataError(2))?
    }

    fn get_u16_at(&self, index: usize) -> Result<u16, BentoError> {
        if index + 2 <= self.buffer.len() {
            Ok(to_u16(&self.buffer[index..index + 2]))
        } else {
            Err(Biff8Error::NoEnoughDataError(2))?
        }
    }

    pub(crate) fn read_u32(&mut self) -> Result<u32, BentoError> {
        self.read_extract(4).map(to_u32)
    }

    pub(crate) fn read_usize(&mut self) -> Result<usize, BentoError> {
        self.read_extract(4).map(to_usize)
    }

    pub(crate) fn read_u64(&mut self) -> Result<u64, BentoError> {
        self.read_extract(8).map(to_u64)
    }

    pub(crate) fn read_f64(&mut self) -> Result<f64, BentoError> {
        self.read_extract(8).map(to_f64)
    }

    /// Reads an RK value: a 30-bit integer or the top 30 bits of a double,
    /// optionally scaled down by 100.
    pub(crate) fn read_rk_number(&mut self) -> Result<String, BentoError> {
        Ok(decode_rk_number(self.read_u32()?))
    }

    /// ShortXLUnicodeString: 1-byte character count
    pub(crate) fn read_short_xl_unicode_string(&mut self) -> Result<String, BentoError> {
        let chars = self.read_u8()? as usize;
        let flag = self.read_u8()?;
        self.read_characters(chars, flag)
    }

    /// XLUnicodeString: 2-byte character count
    pub(crate) fn read_xl_unicode_string(&mut self) -> Result<String, BentoError> {
        let chars = self.read_u16()? as usize;
        let flag = self.read_u8()?;
        self.read_characters(chars, flag)
    }

    /// XLUnicodeRichExtendedString, as stored in the shared string table.
    /// Formatting runs and phonetic data follow the characters and are skipped.
    pub(crate) fn read_xl_unicode_rich_extended_string(&mut self) -> Result<String, BentoError> {
        let chars = self.read_u16()? as usize;
        let flag = self.read_u8()?;
        let rich_string_count = if (flag & 0x8) > 0 { self.read_u16()? as usize } else { 0 };
        let phonetic_size = if (flag & 0x4) > 0 { self.read_usize()? } else { 0 };
        let string = self.read_characters(chars, flag)?;
        self.skip(4 * rich_string_count)?;
        self.skip(phonetic_size)?;
        Ok(string)
    }

    /// Reads `chars` characters. A string cut by a CONTINUE record resumes with a
    /// fresh option byte, so the width may change between chunks.
    fn read_characters(&mut self, chars: usize, flag: u8) -> Result<String, BentoError> {
        let mut content = String::new();
        let mut remaining = chars;
        let mut is_high_byte = (flag & 0x1) > 0;
        loop {
            let expected = if is_high_byte { remaining << 1 } else { remaining };
            let encoding = self.encoding;
            let (bytes, actual) = self.read(expected);
            if is_high_byte {
                let (string, _) = encoding.decode_without_bom_handling(bytes);
                content.push_str(&string);
            } else {
                // Compressed characters are the low bytes of UTF-16 code units
                content.extend(bytes.iter().map(|byte| *byte as char));
            }
            remaining -= if is_high_byte { actual >> 1 } else { actual };
            if remaining == 0 {
                return Ok(content);
            }
            if actual == 0 && self.index >= self.chunks.len() {
                Err(Biff8Error::NoEnoughDataError(remaining))?
            }
            is_high_byte = (self.read_u8()? & 0x1) > 0;
        }
    }
}

fn decode_rk_number(value: u32) -> String {
    let is_percentage = (value & 0x01) != 0;
    let is_integer = (value & 0x02) != 0;
    if is_integer {
        let integer = ((value as i32) >> 2) as i64;
        if !is_percentage {
            return integer.to_string();
        }
        return (integer as f64 / 100.0).to_string();
    }
    let mut number = f64::from_bits(((value & 0xFFFF_FFFC) as u64) << 32);
    if is_percentage {
        number /= 100.0;
    }
    number.to_string()
}

/// Loops over the remaining records, dispatching on the record type.
#[macro_export]
macro_rules! match_biff8_record {
    ($reader:expr => { $($arms:tt)* }) => {
        while let Some(kind) = $reader.next()? {
            match kind {
                $($arms)*
                _ => (),
            }
        }
    };
}
