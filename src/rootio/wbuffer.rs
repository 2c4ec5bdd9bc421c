//! Big-endian writer mirroring `RBuffer`.

use crate::rootio::K_BYTE_COUNT_MASK;
#[cfg(test)]
use crate::rootio::{K_CLASS_MASK, K_MAP_OFFSET, K_NEW_CLASS_TAG};

#[derive(Debug, Default)]
pub struct WBuffer {
    data: Vec<u8>,
    /// Class-tag state; only tree fixtures stream objects through pointers.
    #[cfg(test)]
    displacement: usize,
    #[cfg(test)]
    classes: Vec<(String, usize)>,
}

impl WBuffer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Buffer for an object that will follow a key header of `key_len` bytes.
    #[cfg(test)]
    pub fn with_displacement(key_len: usize) -> Self {
        Self {
            displacement: key_len,
            ..Self::default()
        }
    }

    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn into_inner(self) -> Vec<u8> {
        self.data
    }

    pub fn write_bytes(&mut self, bytes: &[u8]) {
        self.data.extend_from_slice(bytes);
    }

    pub fn write_u8(&mut self, v: u8) {
        self.data.push(v);
    }

    pub fn write_i16(&mut self, v: i16) {
        self.write_bytes(&v.to_be_bytes());
    }

    pub fn write_u16(&mut self, v: u16) {
        self.write_bytes(&v.to_be_bytes());
    }

    pub fn write_i32(&mut self, v: i32) {
        self.write_bytes(&v.to_be_bytes());
    }

    pub fn write_u32(&mut self, v: u32) {
        self.write_bytes(&v.to_be_bytes());
    }

    #[cfg(test)]
    pub fn write_i64(&mut self, v: i64) {
        self.write_bytes(&v.to_be_bytes());
    }

    pub fn write_f32(&mut self, v: f32) {
        self.write_bytes(&v.to_be_bytes());
    }

    pub fn write_f64(&mut self, v: f64) {
        self.write_bytes(&v.to_be_bytes());
    }

    pub fn write_string(&mut self, s: &str) {
        let bytes = s.as_bytes();
        if bytes.len() < 255 {
            self.write_u8(bytes.len() as u8);
        } else {
            self.write_u8(255);
            self.write_u32(bytes.len() as u32);
        }
        self.write_bytes(bytes);
    }

    pub fn patch_u32(&mut self, pos: usize, v: u32) {
        self.data[pos..pos + 4].copy_from_slice(&v.to_be_bytes());
    }

    /// Starts a versioned object; pair with `end_object`.
    pub fn start_object(&mut self, version: u16) -> usize {
        let pos = self.len();
        self.write_u32(0);
        self.write_u16(version);
        pos
    }

    pub fn end_object(&mut self, start: usize) {
        let byte_count = (self.len() - start - 4) as u32;
        self.patch_u32(start, byte_count | K_BYTE_COUNT_MASK);
    }

    pub fn write_tobject(&mut self, bits: u32) {
        self.write_u16(1);
        self.write_u32(0);
        self.write_u32(bits);
    }

    pub fn write_tnamed(&mut self, name: &str, title: &str) {
        let start = self.start_object(1);
        self.write_tobject(0);
        self.write_string(name);
        self.write_string(title);
        self.end_object(start);
    }

    pub fn write_null_pointer(&mut self) {
        self.write_u32(0);
    }

    /// Writes an object through a pointer: byte count, class tag (new or
    /// back-reference), then whatever `body` streams.
    #[cfg(test)]
    pub fn write_object_any(&mut self, class_name: &str, body: impl FnOnce(&mut Self)) {
        let start = self.len();
        self.write_u32(0);
        let known = self
            .classes
            .iter()
            .find(|(name, _)| name == class_name)
            .map(|(_, reference)| *reference);
        match known {
            Some(reference) => self.write_u32(K_CLASS_MASK | reference as u32),
            None => {
                let reference = self.len() + self.displacement + K_MAP_OFFSET;
                self.write_u32(K_NEW_CLASS_TAG);
                self.write_bytes(class_name.as_bytes());
                self.write_u8(0);
                self.classes.push((class_name.to_string(), reference));
            }
        }
        body(self);
        let byte_count = (self.len() - start - 4) as u32;
        self.patch_u32(start, byte_count | K_BYTE_COUNT_MASK);
    }
}
