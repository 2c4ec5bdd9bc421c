//! Write side: builds a complete small-format ROOT file in memory.
//!
//! ```text
//!   0 file header (padded to fBEGIN = 100)
//! 100 top directory record (TFile key, TNamed strings, TDirectory)
//!     object records, in write order
//!     StreamerInfo (empty TList)
//!     keys list
//!     free segments
//! ```

use std::fs;
use std::path::Path;
use std::time::{SystemTime, UNIX_EPOCH};

use crate::histogram::Histogram1D;
use crate::rootio::file::ROOT_MAGIC;
use crate::rootio::key::{KEY_VERSION, Key, tstring_len};
use crate::rootio::th1::{TH1F_CLASS, write_th1f};
use crate::rootio::wbuffer::WBuffer;
use crate::rootio::{Result, RootError};

pub const FILE_VERSION: u32 = 62206;
pub const BEGIN: usize = 100;
const DIRECTORY_VERSION: u16 = 5;
/// Small-file TDirectory record: fixed fields, UUID and the padding ROOT
/// reserves for a later switch to 64-bit seeks.
const DIRECTORY_LEN: usize = 60;
const TLIST_VERSION: u16 = 5;
const TFREE_VERSION: u16 = 1;
const FREE_LAST: u32 = 2_000_000_000;
const MAX_SMALL_SEEK: usize = i32::MAX as usize;

pub struct RootWriter {
    file_name: String,
    title: String,
    buf: WBuffer,
    keys: Vec<Key>,
    datime: u32,
    nbytes_name: usize,
}

impl RootWriter {
    /// `file_name` is what ROOT shows as the top directory name, normally
    /// the output file's base name.
    pub fn new(file_name: &str) -> Self {
        let datime = datime_now();
        let title = String::new();
        let mut buf = WBuffer::new();
        buf.write_bytes(&[0u8; BEGIN]);

        let key_len = Key::header_len("TFile", file_name, &title);
        let nbytes_name = key_len + tstring_len(file_name) + tstring_len(&title);
        let n_bytes = nbytes_name + DIRECTORY_LEN;
        let top = Key {
            n_bytes: n_bytes as u32,
            version: KEY_VERSION,
            obj_len: (n_bytes - key_len) as u32,
            datime,
            key_len: key_len as u16,
            cycle: 1,
            seek_key: BEGIN as u64,
            seek_pdir: 0,
            class_name: "TFile".to_string(),
            name: file_name.to_string(),
            title: title.clone(),
        };
        top.write(&mut buf);
        buf.write_string(file_name);
        buf.write_string(&title);
        // Directory fields are patched by `finish` once fSeekKeys is known.
        buf.write_bytes(&[0u8; DIRECTORY_LEN]);

        Self {
            file_name: file_name.to_string(),
            title,
            buf,
            keys: Vec::new(),
            datime,
            nbytes_name,
        }
    }

    /// Appends one uncompressed record: key header, `extra_header` (counted
    /// in the key length, as TBasket does), then `payload`.
    pub fn write_record(
        &mut self,
        class_name: &str,
        name: &str,
        title: &str,
        extra_header: &[u8],
        payload: &[u8],
    ) -> Result<Key> {
        self.write_stored(class_name, name, title, extra_header, payload, payload.len())
    }

    /// Appends a record whose object is `stored` on disk and `obj_len` bytes
    /// once decompressed. The two lengths differ exactly when `stored` is a
    /// chain of compression blocks. Returns the key written.
    pub fn write_stored(
        &mut self,
        class_name: &str,
        name: &str,
        title: &str,
        extra_header: &[u8],
        stored: &[u8],
        obj_len: usize,
    ) -> Result<Key> {
        let seek = self.buf.len();
        let key_len = Key::header_len(class_name, name, title) + extra_header.len();
        let n_bytes = key_len + stored.len();
        if seek + n_bytes > MAX_SMALL_SEEK {
            return Err(RootError::FileTooLarge);
        }
        let cycle = self.keys.iter().filter(|k| k.name == name).count() as u16 + 1;
        let key = Key {
            n_bytes: n_bytes as u32,
            version: KEY_VERSION,
            obj_len: obj_len as u32,
            datime: self.datime,
            key_len: key_len as u16,
            cycle,
            seek_key: seek as u64,
            seek_pdir: BEGIN as u64,
            class_name: class_name.to_string(),
            name: name.to_string(),
            title: title.to_string(),
        };
        key.write(&mut self.buf);
        self.buf.write_bytes(extra_header);
        self.buf.write_bytes(stored);
        Ok(key)
    }

    /// Lists an already written record in the top directory.
    pub fn list_key(&mut self, key: Key) {
        self.keys.push(key);
    }

    /// Writes an object and lists it in the top directory.
    pub fn write_object(
        &mut self,
        class_name: &str,
        name: &str,
        title: &str,
        payload: &[u8],
    ) -> Result<()> {
        let key = self.write_record(class_name, name, title, &[], payload)?;
        self.list_key(key);
        Ok(())
    }

    pub fn write_histogram(&mut self, h: &Histogram1D) -> Result<()> {
        let mut w = WBuffer::new();
        write_th1f(&mut w, h);
        self.write_object(TH1F_CLASS, &h.name, &h.title, &w.into_inner())
    }

    /// Appends the trailing records and patches the header and directory.
    pub fn finish(mut self) -> Result<Vec<u8>> {
        let mut info = WBuffer::new();
        let list = info.start_object(TLIST_VERSION);
        info.write_tobject(0);
        info.write_string("");
        info.write_i32(0);
        info.end_object(list);
        let info_key = self.write_record(
            "TList",
            "StreamerInfo",
            "Doubly linked list",
            &[],
            &info.into_inner(),
        )?;

        let mut list = WBuffer::new();
        list.write_i32(self.keys.len() as i32);
        for key in &self.keys {
            key.write(&mut list);
        }
        let file_name = self.file_name.clone();
        let title = self.title.clone();
        let keys_key = self.write_record("TFile", &file_name, &title, &[], &list.into_inner())?;

        // The free list describes the gap after the file end, which is only
        // known once its own size is: key header plus the 10-byte TFree.
        let free_key_len = Key::header_len("TFile", &file_name, &title);
        let seek_free = self.buf.len();
        let end = seek_free + free_key_len + 10;
        let mut free = WBuffer::new();
        free.write_u16(TFREE_VERSION);
        free.write_u32(end as u32);
        free.write_u32(FREE_LAST);
        let free_key = self.write_record("TFile", &file_name, &title, &[], &free.into_inner())?;

        let end = self.buf.len();
        if end > MAX_SMALL_SEEK {
            return Err(RootError::FileTooLarge);
        }

        let mut bytes = self.buf.into_inner();
        write_header(
            &mut bytes,
            &FileHeaderFields {
                end: end as u32,
                seek_free: free_key.seek_key as u32,
                nbytes_free: free_key.n_bytes,
                nbytes_name: self.nbytes_name as u32,
                seek_info: info_key.seek_key as u32,
                nbytes_info: info_key.n_bytes,
            },
        );
        write_directory(
            &mut bytes,
            BEGIN + self.nbytes_name,
            self.datime,
            keys_key.n_bytes,
            self.nbytes_name as u32,
            keys_key.seek_key as u32,
        );
        Ok(bytes)
    }

    /// Finishes the file and writes it with a single filesystem call.
    pub fn write_to(self, path: impl AsRef<Path>) -> Result<()> {
        let bytes = self.finish()?;
        fs::write(path, bytes)?;
        Ok(())
    }
}

struct FileHeaderFields {
    end: u32,
    seek_free: u32,
    nbytes_free: u32,
    nbytes_name: u32,
    seek_info: u32,
    nbytes_info: u32,
}

fn write_header(bytes: &mut [u8], f: &FileHeaderFields) {
    let mut w = WBuffer::new();
    w.write_bytes(ROOT_MAGIC);
    w.write_u32(FILE_VERSION);
    w.write_u32(BEGIN as u32);
    w.write_u32(f.end);
    w.write_u32(f.seek_free);
    w.write_u32(f.nbytes_free);
    w.write_u32(1); // nfree
    w.write_u32(f.nbytes_name);
    w.write_u8(4); // fUnits
    w.write_i32(0); // fCompress
    w.write_u32(f.seek_info);
    w.write_u32(f.nbytes_info);
    w.write_u16(1); // UUID version
    w.write_bytes(&[0u8; 16]);
    let header = w.into_inner();
    bytes[..header.len()].copy_from_slice(&header);
}

fn write_directory(
    bytes: &mut [u8],
    offset: usize,
    datime: u32,
    nbytes_keys: u32,
    nbytes_name: u32,
    seek_keys: u32,
) {
    let mut w = WBuffer::new();
    w.write_u16(DIRECTORY_VERSION);
    w.write_u32(datime); // fDatimeC
    w.write_u32(datime); // fDatimeM
    w.write_u32(nbytes_keys);
    w.write_u32(nbytes_name);
    w.write_u32(BEGIN as u32); // fSeekDir
    w.write_u32(0); // fSeekParent
    w.write_u32(seek_keys);
    w.write_u16(1); // UUID version
    w.write_bytes(&[0u8; 16]);
    let dir = w.into_inner();
    bytes[offset..offset + dir.len()].copy_from_slice(&dir);
}

/// ROOT TDatime packing of the current UTC time.
pub fn datime_now() -> u32 {
    let secs = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or(0);
    datime_from_unix(secs)
}

pub fn datime_from_unix(secs: u64) -> u32 {
    let days = (secs / 86_400) as i64;
    let rem = secs % 86_400;
    let (year, month, day) = civil_from_days(days);
    let year = year.max(1995) as u32;
    let hour = (rem / 3600) as u32;
    let minute = (rem % 3600 / 60) as u32;
    let second = (rem % 60) as u32;
    (year - 1995) << 26 | month << 22 | day << 17 | hour << 12 | minute << 6 | second
}

/// Days since 1970-01-01 to (year, month, day), proleptic Gregorian.
fn civil_from_days(days: i64) -> (i64, u32, u32) {
    let z = days + 719_468;
    let era = z.div_euclid(146_097);
    let doe = z.rem_euclid(146_097);
    let yoe = (doe - doe / 1460 + doe / 36_524 - doe / 146_096) / 365;
    let doy = doe - (365 * yoe + yoe / 4 - yoe / 100);
    let mp = (5 * doy + 2) / 153;
    let day = (doy - (153 * mp + 2) / 5 + 1) as u32;
    let month = (if mp < 10 { mp + 3 } else { mp - 9 }) as u32;
    let year = yoe + era * 400 + i64::from(month <= 2);
    (year, month, day)
}
