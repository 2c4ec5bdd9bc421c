//! TKey records: the header ROOT puts in front of every stored object.

use std::borrow::Cow;

use crate::rootio::decompress::decompress;
use crate::rootio::rbuffer::RBuffer;
use crate::rootio::wbuffer::WBuffer;
use crate::rootio::{Result, RootError};

/// Key class version written for small (32-bit seek) files.
pub const KEY_VERSION: u16 = 4;
/// Key versions above this carry 64-bit seek pointers.
pub const LARGE_KEY_VERSION: u16 = 1000;

#[derive(Debug, Clone)]
pub struct Key {
    pub n_bytes: u32,
    pub version: u16,
    pub obj_len: u32,
    pub datime: u32,
    pub key_len: u16,
    pub cycle: u16,
    pub seek_key: u64,
    pub seek_pdir: u64,
    pub class_name: String,
    pub name: String,
    pub title: String,
}

impl Key {
    pub fn read(r: &mut RBuffer) -> Result<Self> {
        let n_bytes = r.read_u32()?;
        let version = r.read_u16()?;
        let obj_len = r.read_u32()?;
        let datime = r.read_u32()?;
        let key_len = r.read_u16()?;
        let cycle = r.read_u16()?;

        // Each key records its own seek width, even inside a large file.
        let (seek_key, seek_pdir) = if version > LARGE_KEY_VERSION {
            (r.read_u64()?, r.read_u64()?)
        } else {
            (r.read_u32()? as u64, r.read_u32()? as u64)
        };

        let class_name = r.read_string()?;
        let name = r.read_string()?;
        let title = r.read_string()?;

        Ok(Key {
            n_bytes,
            version,
            obj_len,
            datime,
            key_len,
            cycle,
            seek_key,
            seek_pdir,
            class_name,
            name,
            title,
        })
    }

    pub fn write(&self, w: &mut WBuffer) {
        w.write_u32(self.n_bytes);
        w.write_u16(self.version);
        w.write_u32(self.obj_len);
        w.write_u32(self.datime);
        w.write_u16(self.key_len);
        w.write_u16(self.cycle);
        w.write_u32(self.seek_key as u32);
        w.write_u32(self.seek_pdir as u32);
        w.write_string(&self.class_name);
        w.write_string(&self.name);
        w.write_string(&self.title);
    }

    /// Header length of a small-file key with these strings.
    pub fn header_len(class_name: &str, name: &str, title: &str) -> usize {
        let fixed = 4 + 2 + 4 + 4 + 2 + 2 + 4 + 4;
        fixed + tstring_len(class_name) + tstring_len(name) + tstring_len(title)
    }

    pub fn is_compressed(&self) -> bool {
        self.obj_len != self.n_bytes.saturating_sub(self.key_len as u32)
    }

    /// The object bytes behind this key, decompressed when needed.
    pub fn read_object<'a>(&self, file_data: &'a [u8]) -> Result<Cow<'a, [u8]>> {
        let start = self.seek_key as usize + self.key_len as usize;
        let end = self.seek_key as usize + self.n_bytes as usize;
        if end > file_data.len() || start > end {
            return Err(RootError::BufferUnderflow {
                offset: start,
                need: end.saturating_sub(start),
                have: file_data.len().saturating_sub(start),
            });
        }
        let stored = &file_data[start..end];
        if self.is_compressed() {
            Ok(Cow::Owned(decompress(stored, self.obj_len as usize)?))
        } else {
            Ok(Cow::Borrowed(stored))
        }
    }
}

pub fn tstring_len(s: &str) -> usize {
    if s.len() < 255 { 1 + s.len() } else { 5 + s.len() }
}
