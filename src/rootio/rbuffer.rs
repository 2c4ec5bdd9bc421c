//! Cursor over ROOT's big-endian serialization.

use crate::rootio::{K_BYTE_COUNT_MASK, K_CLASS_MASK, K_MAP_OFFSET, K_NEW_CLASS_TAG};
use crate::rootio::{Result, RootError};

const K_IS_REFERENCED: u32 = 1 << 4;

pub struct RBuffer<'a> {
    data: &'a [u8],
    pos: usize,
    /// Length of the key header that precedes `data` in ROOT's own buffer.
    /// Class references are encoded relative to the key start.
    displacement: usize,
}

impl<'a> RBuffer<'a> {
    pub fn new(data: &'a [u8]) -> Self {
        Self {
            data,
            pos: 0,
            displacement: 0,
        }
    }

    pub fn with_displacement(data: &'a [u8], displacement: usize) -> Self {
        Self {
            data,
            pos: 0,
            displacement,
        }
    }

    #[inline]
    pub fn pos(&self) -> usize {
        self.pos
    }

    #[inline]
    pub fn displaced_pos(&self) -> usize {
        self.pos + self.displacement
    }

    #[inline]
    pub fn remaining(&self) -> usize {
        self.data.len().saturating_sub(self.pos)
    }

    pub fn set_pos(&mut self, pos: usize) {
        self.pos = pos;
    }

    pub fn skip(&mut self, n: usize) -> Result<()> {
        self.ensure(n)?;
        self.pos += n;
        Ok(())
    }

    pub fn read_bytes(&mut self, n: usize) -> Result<&'a [u8]> {
        self.ensure(n)?;
        let slice = &self.data[self.pos..self.pos + n];
        self.pos += n;
        Ok(slice)
    }

    fn read_array<const N: usize>(&mut self) -> Result<[u8; N]> {
        let bytes = self.read_bytes(N)?;
        let mut out = [0u8; N];
        out.copy_from_slice(bytes);
        Ok(out)
    }

    pub fn read_u8(&mut self) -> Result<u8> {
        Ok(self.read_array::<1>()?[0])
    }

    pub fn read_u16(&mut self) -> Result<u16> {
        Ok(u16::from_be_bytes(self.read_array()?))
    }

    pub fn read_i16(&mut self) -> Result<i16> {
        Ok(i16::from_be_bytes(self.read_array()?))
    }

    pub fn read_u32(&mut self) -> Result<u32> {
        Ok(u32::from_be_bytes(self.read_array()?))
    }

    pub fn read_i32(&mut self) -> Result<i32> {
        Ok(i32::from_be_bytes(self.read_array()?))
    }

    pub fn read_u64(&mut self) -> Result<u64> {
        Ok(u64::from_be_bytes(self.read_array()?))
    }

    pub fn read_i64(&mut self) -> Result<i64> {
        Ok(i64::from_be_bytes(self.read_array()?))
    }

    pub fn read_f32(&mut self) -> Result<f32> {
        Ok(f32::from_be_bytes(self.read_array()?))
    }

    pub fn read_f64(&mut self) -> Result<f64> {
        Ok(f64::from_be_bytes(self.read_array()?))
    }

    /// TString: one length byte, or 255 followed by a u32 length.
    pub fn read_string(&mut self) -> Result<String> {
        let first = self.read_u8()?;
        let len = if first == 255 {
            self.read_u32()? as usize
        } else {
            first as usize
        };
        let bytes = self.read_bytes(len)?;
        Ok(String::from_utf8_lossy(bytes).into_owned())
    }

    /// NUL-terminated class name as written after `kNewClassTag`.
    pub fn read_cstring(&mut self) -> Result<String> {
        let rest = &self.data[self.pos.min(self.data.len())..];
        let Some(nul) = rest.iter().position(|&b| b == 0) else {
            return Err(RootError::Deserialization(format!(
                "unterminated class name at offset {}",
                self.pos
            )));
        };
        let name = String::from_utf8_lossy(&rest[..nul]).into_owned();
        self.pos += nul + 1;
        Ok(name)
    }

    /// Returns `(version, end_pos)`; `end_pos` is `None` for objects written
    /// without a byte count.
    pub fn read_version(&mut self) -> Result<(u16, Option<usize>)> {
        let start = self.pos;
        let raw = self.read_u32()?;
        if raw & K_BYTE_COUNT_MASK != 0 {
            let byte_count = (raw & !K_BYTE_COUNT_MASK) as usize;
            let version = self.read_u16()?;
            Ok((version, Some(start + 4 + byte_count)))
        } else {
            self.pos = start;
            let version = self.read_u16()?;
            Ok((version, None))
        }
    }

    pub fn skip_versioned(&mut self) -> Result<()> {
        let (_version, end) = self.read_version()?;
        match end {
            Some(end) => {
                if end > self.data.len() {
                    return Err(RootError::BufferUnderflow {
                        offset: self.pos,
                        need: end - self.pos,
                        have: self.remaining(),
                    });
                }
                self.pos = end;
                Ok(())
            }
            None => Err(RootError::Deserialization(format!(
                "cannot skip object without byte count at offset {}",
                self.pos
            ))),
        }
    }

    /// TObject: version, fUniqueID, fBits (+ pidf when referenced).
    pub fn read_tobject(&mut self) -> Result<(u32, u32)> {
        let version = self.read_u16()?;
        if version & 0x4000 != 0 {
            self.skip(4)?;
        }
        let unique_id = self.read_u32()?;
        let bits = self.read_u32()?;
        if bits & K_IS_REFERENCED != 0 {
            self.skip(2)?;
        }
        Ok((unique_id, bits))
    }

    pub fn read_tnamed(&mut self) -> Result<(String, String)> {
        let (_version, end) = self.read_version()?;
        self.read_tobject()?;
        let name = self.read_string()?;
        let title = self.read_string()?;
        if let Some(end) = end {
            self.pos = end;
        }
        Ok((name, title))
    }

    /// Basic-type array behind a counted pointer: a presence byte, then
    /// `n` values when the byte is non-zero.
    pub fn read_counted_i64s(&mut self, n: usize) -> Result<Vec<i64>> {
        if self.read_u8()? == 0 {
            return Ok(Vec::new());
        }
        (0..n).map(|_| self.read_i64()).collect()
    }

    pub fn read_counted_i32s(&mut self, n: usize) -> Result<Vec<i32>> {
        if self.read_u8()? == 0 {
            return Ok(Vec::new());
        }
        (0..n).map(|_| self.read_i32()).collect()
    }

    fn ensure(&self, n: usize) -> Result<()> {
        if self.pos + n > self.data.len() {
            return Err(RootError::BufferUnderflow {
                offset: self.pos,
                need: n,
                have: self.data.len().saturating_sub(self.pos),
            });
        }
        Ok(())
    }
}

/// Class names seen so far in one object buffer, keyed by the reference
/// value ROOT uses for them.
#[derive(Debug, Default)]
pub struct ClassRegistry {
    classes: Vec<(usize, String)>,
}

impl ClassRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    fn lookup(&self, reference: usize) -> Option<&str> {
        self.classes
            .iter()
            .find(|(tag, _)| *tag == reference)
            .map(|(_, name)| name.as_str())
    }

    /// Reads the header of an object written through a pointer
    /// (`WriteObjectAny`). Returns `None` for a null pointer, otherwise the
    /// class name and the absolute position where the object ends.
    pub fn read_object_header(&mut self, r: &mut RBuffer) -> Result<Option<(String, usize)>> {
        let start = r.pos();
        let bcnt = r.read_u32()?;
        if bcnt == 0 {
            return Ok(None);
        }
        if bcnt & K_BYTE_COUNT_MASK == 0 || bcnt == K_NEW_CLASS_TAG {
            return Err(RootError::Deserialization(format!(
                "object without byte count at offset {start} (tag {bcnt:#010x})"
            )));
        }
        let end = start + 4 + (bcnt & !K_BYTE_COUNT_MASK) as usize;

        let tag_pos = r.displaced_pos();
        let tag = r.read_u32()?;
        let class_name = if tag == K_NEW_CLASS_TAG {
            let name = r.read_cstring()?;
            self.classes.push((tag_pos + K_MAP_OFFSET, name.clone()));
            name
        } else if tag & K_CLASS_MASK != 0 {
            let reference = (tag & !K_CLASS_MASK) as usize;
            self.lookup(reference)
                .ok_or_else(|| {
                    RootError::Deserialization(format!(
                        "unknown class reference {reference} at offset {}",
                        r.pos() - 4
                    ))
                })?
                .to_string()
        } else {
            return Err(RootError::Deserialization(format!(
                "object reference {tag:#010x} where a new object was expected"
            )));
        };

        Ok(Some((class_name, end)))
    }
}
