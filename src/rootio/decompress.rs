//! ROOT compression blocks.
//!
//! Compressed payloads are a sequence of blocks, each with a 9-byte header:
//! ```text
//! bytes 0-1  algorithm ("ZL", "L4", "ZS", ...)
//! byte  2    method
//! bytes 3-5  compressed size   (little-endian u24)
//! bytes 6-8  uncompressed size (little-endian u24)
//! ```

use std::io::Read;

use crate::rootio::{Result, RootError};

pub const BLOCK_HEADER_LEN: usize = 9;

pub fn decompress(src: &[u8], expected_len: usize) -> Result<Vec<u8>> {
    let mut out = Vec::with_capacity(expected_len);
    let mut offset = 0usize;

    while out.len() < expected_len && offset + BLOCK_HEADER_LEN <= src.len() {
        let tag = &src[offset..offset + 2];
        let c_size = read_le24(&src[offset + 3..offset + 6]);
        let u_size = read_le24(&src[offset + 6..offset + 9]);
        offset += BLOCK_HEADER_LEN;

        let end = offset + c_size;
        if end > src.len() {
            return Err(RootError::Decompression(format!(
                "block claims {} compressed bytes but only {} remain",
                c_size,
                src.len() - offset
            )));
        }
        let block = &src[offset..end];

        let decoded = match tag {
            b"ZL" => inflate(block, u_size)?,
            b"L4" => lz4_block(block, u_size)?,
            b"ZS" => zstd_block(block, u_size)?,
            other => {
                return Err(RootError::Decompression(format!(
                    "unsupported compression algorithm {:?}",
                    String::from_utf8_lossy(other)
                )));
            }
        };
        if decoded.len() != u_size {
            return Err(RootError::Decompression(format!(
                "block decoded to {} bytes, header says {}",
                decoded.len(),
                u_size
            )));
        }
        out.extend_from_slice(&decoded);
        offset = end;
    }

    if out.len() != expected_len {
        return Err(RootError::Decompression(format!(
            "decoded {} bytes, expected {}",
            out.len(),
            expected_len
        )));
    }
    Ok(out)
}

fn inflate(data: &[u8], expected: usize) -> Result<Vec<u8>> {
    let mut decoder = flate2::read::ZlibDecoder::new(data);
    let mut out = Vec::with_capacity(expected);
    decoder
        .read_to_end(&mut out)
        .map_err(|e| RootError::Decompression(format!("zlib: {e}")))?;
    Ok(out)
}

// ROOT prefixes LZ4 blocks with an 8-byte xxhash64 of the payload.
fn lz4_block(data: &[u8], expected: usize) -> Result<Vec<u8>> {
    if data.len() < 8 {
        return Err(RootError::Decompression(
            "lz4 block shorter than its checksum".to_string(),
        ));
    }
    lz4_flex::block::decompress(&data[8..], expected)
        .map_err(|e| RootError::Decompression(format!("lz4: {e}")))
}

fn zstd_block(data: &[u8], expected: usize) -> Result<Vec<u8>> {
    let mut decoder = ruzstd::decoding::StreamingDecoder::new(data)
        .map_err(|e| RootError::Decompression(format!("zstd: {e}")))?;
    let mut out = Vec::with_capacity(expected);
    decoder
        .read_to_end(&mut out)
        .map_err(|e| RootError::Decompression(format!("zstd: {e}")))?;
    Ok(out)
}

fn read_le24(b: &[u8]) -> usize {
    b[0] as usize | ((b[1] as usize) << 8) | ((b[2] as usize) << 16)
}
