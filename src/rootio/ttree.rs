//! TTree / TBranch / TLeaf streamers, reduced to what flat branch reads need.

use crate::rootio::rbuffer::{ClassRegistry, RBuffer};
use crate::rootio::{Result, RootError};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LeafType {
    F32,
    F64,
    I32,
    I64,
    I16,
    I8,
    Bool,
}

impl LeafType {
    pub fn from_class(class_name: &str) -> Option<Self> {
        match class_name {
            "TLeafF" => Some(LeafType::F32),
            "TLeafD" => Some(LeafType::F64),
            "TLeafI" => Some(LeafType::I32),
            "TLeafL" => Some(LeafType::I64),
            "TLeafS" => Some(LeafType::I16),
            "TLeafB" => Some(LeafType::I8),
            "TLeafO" => Some(LeafType::Bool),
            _ => None,
        }
    }

    pub fn class_name(self) -> &'static str {
        match self {
            LeafType::F32 => "TLeafF",
            LeafType::F64 => "TLeafD",
            LeafType::I32 => "TLeafI",
            LeafType::I64 => "TLeafL",
            LeafType::I16 => "TLeafS",
            LeafType::I8 => "TLeafB",
            LeafType::Bool => "TLeafO",
        }
    }

    pub fn byte_size(self) -> usize {
        match self {
            LeafType::F64 | LeafType::I64 => 8,
            LeafType::F32 | LeafType::I32 => 4,
            LeafType::I16 => 2,
            LeafType::I8 | LeafType::Bool => 1,
        }
    }

    /// Appends the big-endian values in `data` to `out` as `f32`.
    pub fn decode_into(self, data: &[u8], out: &mut Vec<f32>) -> Result<()> {
        let size = self.byte_size();
        if data.len() % size != 0 {
            return Err(RootError::Deserialization(format!(
                "basket of {} bytes is not a whole number of {} values",
                data.len(),
                self.class_name()
            )));
        }
        out.reserve(data.len() / size);
        for chunk in data.chunks_exact(size) {
            let v = match self {
                LeafType::F32 => f32::from_be_bytes([chunk[0], chunk[1], chunk[2], chunk[3]]),
                LeafType::F64 => f64::from_be_bytes([
                    chunk[0], chunk[1], chunk[2], chunk[3], chunk[4], chunk[5], chunk[6], chunk[7],
                ]) as f32,
                LeafType::I32 => i32::from_be_bytes([chunk[0], chunk[1], chunk[2], chunk[3]]) as f32,
                LeafType::I64 => i64::from_be_bytes([
                    chunk[0], chunk[1], chunk[2], chunk[3], chunk[4], chunk[5], chunk[6], chunk[7],
                ]) as f32,
                LeafType::I16 => i16::from_be_bytes([chunk[0], chunk[1]]) as f32,
                LeafType::I8 => chunk[0] as i8 as f32,
                LeafType::Bool => {
                    if chunk[0] != 0 {
                        1.0
                    } else {
                        0.0
                    }
                }
            };
            out.push(v);
        }
        Ok(())
    }
}

#[derive(Debug, Clone)]
pub struct BranchInfo {
    pub name: String,
    pub leaf_class: String,
    pub leaf_type: Option<LeafType>,
    /// Static element count of the leaf (1 for scalars).
    pub leaf_len: i32,
    pub entries: u64,
    pub basket_bytes: Vec<i32>,
    /// First entry of each basket.
    pub basket_entry: Vec<i64>,
    pub basket_seek: Vec<i64>,
}

impl BranchInfo {
    pub fn n_baskets(&self) -> usize {
        self.basket_seek.len()
    }
}

#[derive(Debug, Clone)]
pub struct Tree {
    pub name: String,
    pub entries: u64,
    pub branches: Vec<BranchInfo>,
}

impl Tree {
    pub fn find_branch(&self, name: &str) -> Option<&BranchInfo> {
        self.branches.iter().find(|b| b.name == name)
    }

    pub fn branch_names(&self) -> Vec<&str> {
        self.branches.iter().map(|b| b.name.as_str()).collect()
    }
}

/// Parses a TTree from its key payload. `key_len` is needed to resolve the
/// class references inside the branch and leaf arrays.
pub fn read_ttree(payload: &[u8], key_len: usize) -> Result<Tree> {
    let mut r = RBuffer::with_displacement(payload, key_len);
    let mut classes = ClassRegistry::new();

    let (version, end) = r.read_version()?;
    let end = end.ok_or_else(|| RootError::Deserialization("TTree without byte count".into()))?;
    if version < 16 {
        return Err(RootError::Deserialization(format!(
            "unsupported TTree version {version}"
        )));
    }

    let (name, _title) = r.read_tnamed()?;
    r.skip_versioned()?; // TAttLine
    r.skip_versioned()?; // TAttFill
    r.skip_versioned()?; // TAttMarker

    let entries = r.read_i64()?.max(0) as u64;
    let _tot_bytes = r.read_i64()?;
    let _zip_bytes = r.read_i64()?;
    let _saved_bytes = r.read_i64()?;
    if version >= 18 {
        let _flushed_bytes = r.read_i64()?;
    }
    let _weight = r.read_f64()?;
    let _timer_interval = r.read_i32()?;
    let _scan_field = r.read_i32()?;
    let _update = r.read_i32()?;
    if version >= 18 {
        let _default_entry_offset_len = r.read_i32()?;
    }
    let n_cluster_range = if version >= 19 { r.read_i32()?.max(0) } else { 0 };
    let _max_entries = r.read_i64()?;
    let _max_entry_loop = r.read_i64()?;
    let _max_virtual_size = r.read_i64()?;
    let _auto_save = r.read_i64()?;
    if version >= 18 {
        let _auto_flush = r.read_i64()?;
    }
    let _estimate = r.read_i64()?;
    if version >= 19 {
        r.read_counted_i64s(n_cluster_range as usize)?; // fClusterRangeEnd
        r.read_counted_i64s(n_cluster_range as usize)?; // fClusterSize
    }
    if version >= 20 {
        r.skip_versioned()?; // fIOFeatures
    }

    let branches = read_branch_array(&mut r, &mut classes)?;

    if end > r.pos() {
        r.set_pos(end);
    }
    Ok(Tree {
        name,
        entries,
        branches,
    })
}

/// TObjArray header: version, TObject, name, size, lower bound.
fn read_objarray_header(r: &mut RBuffer) -> Result<(i32, usize)> {
    let (_version, end) = r.read_version()?;
    let end =
        end.ok_or_else(|| RootError::Deserialization("TObjArray without byte count".into()))?;
    r.read_tobject()?;
    let _name = r.read_string()?;
    let count = r.read_i32()?;
    let _lower_bound = r.read_i32()?;
    Ok((count, end))
}

fn read_branch_array(r: &mut RBuffer, classes: &mut ClassRegistry) -> Result<Vec<BranchInfo>> {
    let (count, end) = read_objarray_header(r)?;
    let mut branches = Vec::new();
    for _ in 0..count {
        let Some((class_name, obj_end)) = classes.read_object_header(r)? else {
            continue;
        };
        if class_name == "TBranch" {
            branches.push(read_tbranch(r, classes)?);
        } else {
            tracing::debug!("skipping branch of class {class_name}");
        }
        r.set_pos(obj_end);
    }
    r.set_pos(end);
    Ok(branches)
}

fn read_tbranch(r: &mut RBuffer, classes: &mut ClassRegistry) -> Result<BranchInfo> {
    let (version, end) = r.read_version()?;
    let end = end.ok_or_else(|| RootError::Deserialization("TBranch without byte count".into()))?;
    if version < 10 {
        return Err(RootError::Deserialization(format!(
            "unsupported TBranch version {version}"
        )));
    }

    let (name, _title) = r.read_tnamed()?;
    r.skip_versioned()?; // TAttFill

    let _compress = r.read_i32()?;
    let _basket_size = r.read_i32()?;
    let _entry_offset_len = r.read_i32()?;
    let write_basket = r.read_i32()?.max(0) as usize;
    let _entry_number = r.read_i64()?;
    if version >= 13 {
        r.skip_versioned()?; // fIOFeatures
    }
    let _offset = r.read_i32()?;
    let max_baskets = r.read_i32()?.max(0) as usize;
    let _split_level = r.read_i32()?;
    let entries = r.read_i64()?.max(0) as u64;
    if version >= 11 {
        let _first_entry = r.read_i64()?;
    }
    let _tot_bytes = r.read_i64()?;
    let _zip_bytes = r.read_i64()?;

    let sub_branches = read_branch_array(r, classes)?;
    if !sub_branches.is_empty() {
        tracing::debug!("branch {name} has {} sub-branches", sub_branches.len());
    }
    let (leaf_class, leaf_len) = read_leaf_array(r, classes)?.unwrap_or_default();

    // fBaskets holds in-memory baskets only; flushed trees leave it empty.
    let (_count, baskets_end) = read_objarray_header(r)?;
    r.set_pos(baskets_end);

    let mut basket_bytes = r.read_counted_i32s(max_baskets)?;
    let mut basket_entry = r.read_counted_i64s(max_baskets)?;
    let mut basket_seek = r.read_counted_i64s(max_baskets)?;
    basket_bytes.truncate(write_basket);
    basket_entry.truncate(write_basket + 1);
    basket_seek.truncate(write_basket);

    r.set_pos(end);

    Ok(BranchInfo {
        name,
        leaf_type: LeafType::from_class(&leaf_class),
        leaf_class,
        leaf_len,
        entries,
        basket_bytes,
        basket_entry,
        basket_seek,
    })
}

/// Class name and fLen of the first leaf.
fn read_leaf_array(r: &mut RBuffer, classes: &mut ClassRegistry) -> Result<Option<(String, i32)>> {
    let (count, end) = read_objarray_header(r)?;
    let mut first = None;
    for _ in 0..count {
        let Some((class_name, obj_end)) = classes.read_object_header(r)? else {
            continue;
        };
        if first.is_none() {
            let _leaf_version = r.read_version()?;
            let _tleaf_version = r.read_version()?;
            let _named = r.read_tnamed()?;
            let len = r.read_i32()?;
            first = Some((class_name, len));
        }
        r.set_pos(obj_end);
    }
    r.set_pos(end);
    Ok(first)
}
