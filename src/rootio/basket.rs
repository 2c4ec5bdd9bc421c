//! TBasket records holding branch data.

use std::borrow::Cow;

use crate::rootio::key::Key;
use crate::rootio::rbuffer::RBuffer;
#[cfg(test)]
use crate::rootio::wbuffer::WBuffer;
use crate::rootio::{Result, RootError};

#[cfg(test)]
pub const BASKET_VERSION: u16 = 3;
/// Bytes the TBasket header adds after the TKey fields.
#[cfg(test)]
pub const BASKET_HEADER_LEN: usize = 2 + 4 + 4 + 4 + 4 + 1;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BasketHeader {
    pub version: u16,
    pub buffer_size: i32,
    pub nev_buf_size: i32,
    pub nev_buf: i32,
    /// End of the entry data, measured from the key start.
    pub last: i32,
    pub flag: u8,
}

impl BasketHeader {
    pub fn read(r: &mut RBuffer) -> Result<Self> {
        Ok(Self {
            version: r.read_u16()?,
            buffer_size: r.read_i32()?,
            nev_buf_size: r.read_i32()?,
            nev_buf: r.read_i32()?,
            last: r.read_i32()?,
            flag: r.read_u8()?,
        })
    }

    #[cfg(test)]
    pub fn write(&self, w: &mut WBuffer) {
        w.write_u16(self.version);
        w.write_i32(self.buffer_size);
        w.write_i32(self.nev_buf_size);
        w.write_i32(self.nev_buf);
        w.write_i32(self.last);
        w.write_u8(self.flag);
    }
}

/// Entry data of the basket at `seek`, without the trailing entry-offset
/// table that variable-size branches carry.
pub fn read_basket(file_data: &[u8], seek: u64) -> Result<Cow<'_, [u8]>> {
    let mut r = RBuffer::new(file_data);
    r.set_pos(seek as usize);
    let key = Key::read(&mut r)?;
    let header = BasketHeader::read(&mut r)?;

    let payload = key.read_object(file_data)?;
    let border = (header.last as i64 - key.key_len as i64).max(0) as usize;
    if border > payload.len() {
        return Err(RootError::Deserialization(format!(
            "basket at {seek} claims {border} data bytes but holds {}",
            payload.len()
        )));
    }

    Ok(match payload {
        Cow::Borrowed(bytes) => Cow::Borrowed(&bytes[..border]),
        Cow::Owned(mut bytes) => {
            bytes.truncate(border);
            Cow::Owned(bytes)
        }
    })
}
