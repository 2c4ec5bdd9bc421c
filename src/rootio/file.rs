//! Read side: file header, top-level key list and object lookup.

use std::fs;
use std::ops::Deref;
use std::path::{Path, PathBuf};

use crate::histogram::Histogram1D;
use crate::rootio::basket::read_basket;
use crate::rootio::key::Key;
use crate::rootio::rbuffer::RBuffer;
use crate::rootio::th1::{TH1F_CLASS, read_th1f};
use crate::rootio::ttree::{BranchInfo, Tree, read_ttree};
use crate::rootio::{Result, RootError};

pub const ROOT_MAGIC: &[u8; 4] = b"root";
/// File versions at or above this use 64-bit seek pointers.
pub const LARGE_FILE_VERSION: u32 = 1_000_000;

enum Source {
    #[cfg(test)]
    Owned(Vec<u8>),
    Mmap(memmap2::Mmap),
}

impl Deref for Source {
    type Target = [u8];

    fn deref(&self) -> &[u8] {
        match self {
            #[cfg(test)]
            Source::Owned(v) => v,
            Source::Mmap(m) => m,
        }
    }
}

pub struct RootFile {
    data: Source,
    keys: Vec<Key>,
    path: PathBuf,
}

impl RootFile {
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        let file = fs::File::open(&path)?;
        // SAFETY: the mapping is read-only and dropped with the RootFile;
        // input files are not modified while a run is in progress.
        let mmap = unsafe { memmap2::Mmap::map(&file)? };
        Self::from_source(Source::Mmap(mmap), path)
    }

    #[cfg(test)]
    pub fn from_bytes(data: Vec<u8>, path: PathBuf) -> Result<Self> {
        Self::from_source(Source::Owned(data), path)
    }

    fn from_source(data: Source, path: PathBuf) -> Result<Self> {
        if data.len() < 64 || &data[0..4] != ROOT_MAGIC {
            return Err(RootError::BadMagic);
        }
        let seek_keys = parse_header(&data)?;
        let keys = read_key_list(&data, seek_keys)?;
        Ok(Self {
            data,
            keys,
            path,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn keys(&self) -> &[Key] {
        &self.keys
    }

    /// Highest cycle of the object called `name`.
    pub fn find_key(&self, name: &str) -> Option<&Key> {
        self.keys
            .iter()
            .filter(|k| k.name == name)
            .max_by_key(|k| k.cycle)
    }

    fn require_key(&self, name: &str, class: &'static str) -> Result<&Key> {
        let key = self
            .find_key(name)
            .ok_or_else(|| RootError::KeyNotFound(name.to_string()))?;
        if key.class_name != class {
            return Err(RootError::ClassMismatch {
                name: name.to_string(),
                expected: class,
                found: key.class_name.clone(),
            });
        }
        Ok(key)
    }

    pub fn get_tree(&self, name: &str) -> Result<Tree> {
        let key = self.require_key(name, "TTree")?;
        let payload = key.read_object(&self.data)?;
        read_ttree(&payload, key.key_len as usize)
    }

    pub fn get_th1f(&self, name: &str) -> Result<Histogram1D> {
        let key = self.require_key(name, TH1F_CLASS)?;
        let payload = key.read_object(&self.data)?;
        read_th1f(&payload)
    }

    /// First `entry_stop` values of a scalar branch as `f32`. Baskets that
    /// start at or after `entry_stop` are never decompressed.
    pub fn read_branch(&self, branch: &BranchInfo, entry_stop: u64) -> Result<Vec<f32>> {
        let leaf = branch.leaf_type.ok_or_else(|| RootError::UnsupportedLeaf {
            branch: branch.name.clone(),
            class: branch.leaf_class.clone(),
        })?;
        if branch.leaf_len != 1 {
            return Err(RootError::UnsupportedLeaf {
                branch: branch.name.clone(),
                class: format!("{}[{}]", branch.leaf_class, branch.leaf_len),
            });
        }

        let stop = entry_stop.min(branch.entries) as usize;
        let mut out = Vec::with_capacity(stop);
        for (i, &seek) in branch.basket_seek.iter().enumerate() {
            if out.len() >= stop {
                break;
            }
            if branch.basket_entry.get(i).is_some_and(|&first| first as usize >= stop) {
                break;
            }
            let data = read_basket(&self.data, seek as u64)?;
            leaf.decode_into(&data, &mut out)?;
        }
        tracing::trace!(
            "branch {}: {} values from {} baskets ({} bytes on disk)",
            branch.name,
            out.len(),
            branch.n_baskets(),
            branch.basket_bytes.iter().map(|&b| b as i64).sum::<i64>()
        );

        if out.len() < stop {
            return Err(RootError::Deserialization(format!(
                "branch '{}' decoded {} of {} entries",
                branch.name,
                out.len(),
                stop
            )));
        }
        out.truncate(stop);
        Ok(out)
    }
}

/// Header layout (small file):
/// ```text
///  0 "root"        4 fVersion     8 fBEGIN      12 fEND
/// 16 fSeekFree    20 fNbytesFree 24 nfree       28 fNbytesName
/// 32 fUnits       33 fCompress   37 fSeekInfo   41 fNbytesInfo   45 fUUID
/// ```
/// Large files widen fEND, fSeekFree and fSeekInfo to 8 bytes. Returns the
/// position of the top directory's key list.
fn parse_header(data: &[u8]) -> Result<u64> {
    let mut r = RBuffer::new(data);
    r.skip(4)?;
    let version = r.read_u32()?;
    let is_large = version >= LARGE_FILE_VERSION;
    let begin = r.read_u32()? as usize;
    if is_large {
        r.skip(16)?;
    } else {
        r.skip(8)?;
    }
    let _nbytes_free = r.read_u32()?;
    let _nfree = r.read_u32()?;
    let nbytes_name = r.read_u32()? as usize;

    let dir_offset = begin + nbytes_name;
    if dir_offset >= data.len() {
        return Err(RootError::Deserialization(
            "top directory lies past the end of the file".to_string(),
        ));
    }
    r.set_pos(dir_offset);
    let dir_version = r.read_u16()?;
    let _datime_c = r.read_u32()?;
    let _datime_m = r.read_u32()?;
    let _nbytes_keys = r.read_u32()?;
    let _nbytes_name = r.read_u32()?;
    let seek_keys = if dir_version > 1000 {
        let _seek_dir = r.read_u64()?;
        let _seek_parent = r.read_u64()?;
        r.read_u64()?
    } else {
        let _seek_dir = r.read_u32()?;
        let _seek_parent = r.read_u32()?;
        r.read_u32()? as u64
    };

    Ok(seek_keys)
}

/// The key list is itself stored behind a key: header, nkeys, key headers.
fn read_key_list(data: &[u8], seek_keys: u64) -> Result<Vec<Key>> {
    if seek_keys == 0 {
        return Ok(Vec::new());
    }
    let mut r = RBuffer::new(data);
    r.set_pos(seek_keys as usize);
    let _list_key = Key::read(&mut r)?;
    let n_keys = r.read_i32()?.max(0) as usize;
    let mut keys = Vec::with_capacity(n_keys);
    for _ in 0..n_keys {
        keys.push(Key::read(&mut r)?);
    }
    Ok(keys)
}
