//! TH1F streamer (class version 3 over TH1 version 8).
//!
//! ```text
//! TH1F
//!   TH1
//!     TNamed, TAttLine, TAttFill, TAttMarker
//!     fNcells, fXaxis, fYaxis, fZaxis
//!     fBarOffset, fBarWidth, fEntries, fTsumw, fTsumw2, fTsumwx, fTsumwx2
//!     fMaximum, fMinimum, fNormFactor, fContour, fSumw2, fOption
//!     fFunctions, fBufferSize, fBuffer, fBinStatErrOpt, fStatOverflows
//!   TArrayF (fN + values, no version header)
//! ```

use crate::histogram::Histogram1D;
use crate::rootio::rbuffer::RBuffer;
use crate::rootio::wbuffer::WBuffer;
use crate::rootio::{Result, RootError};

pub const TH1F_CLASS: &str = "TH1F";

const TH1F_VERSION: u16 = 3;
const TH1_VERSION: u16 = 8;
const TAXIS_VERSION: u16 = 10;
const TATTAXIS_VERSION: u16 = 4;
const TLIST_VERSION: u16 = 5;
const UNSET_EXTREMUM: f64 = -1111.0;
const STAT_OVERFLOWS_NEUTRAL: i32 = 2;

pub fn write_th1f(w: &mut WBuffer, h: &Histogram1D) {
    let th1f = w.start_object(TH1F_VERSION);

    let th1 = w.start_object(TH1_VERSION);
    w.write_tnamed(&h.name, &h.title);

    let line = w.start_object(2);
    w.write_i16(602);
    w.write_i16(1);
    w.write_i16(1);
    w.end_object(line);

    let fill = w.start_object(2);
    w.write_i16(0);
    w.write_i16(1001);
    w.end_object(fill);

    let marker = w.start_object(2);
    w.write_i16(1);
    w.write_i16(1);
    w.write_f32(1.0);
    w.end_object(marker);

    w.write_i32(h.cells.len() as i32);
    write_taxis(w, "xaxis", h.n_bins as i32, h.x_min, h.x_max);
    write_taxis(w, "yaxis", 1, 0.0, 1.0);
    write_taxis(w, "zaxis", 1, 0.0, 1.0);

    w.write_i16(0); // fBarOffset
    w.write_i16(1000); // fBarWidth
    w.write_f64(h.entries);
    w.write_f64(h.tsumw);
    w.write_f64(h.tsumw2);
    w.write_f64(h.tsumwx);
    w.write_f64(h.tsumwx2);
    w.write_f64(UNSET_EXTREMUM);
    w.write_f64(UNSET_EXTREMUM);
    w.write_f64(0.0); // fNormFactor
    w.write_i32(0); // fContour
    w.write_i32(0); // fSumw2, unweighted fills
    w.write_string("");

    let functions = w.start_object(TLIST_VERSION);
    w.write_tobject(0);
    w.write_string("");
    w.write_i32(0);
    w.end_object(functions);

    w.write_i32(0); // fBufferSize
    w.write_u8(0); // fBuffer absent
    w.write_i32(0); // fBinStatErrOpt
    w.write_i32(STAT_OVERFLOWS_NEUTRAL);
    w.end_object(th1);

    w.write_i32(h.cells.len() as i32);
    for &c in &h.cells {
        w.write_f32(c as f32);
    }
    w.end_object(th1f);
}

fn write_taxis(w: &mut WBuffer, name: &str, n_bins: i32, x_min: f64, x_max: f64) {
    let axis = w.start_object(TAXIS_VERSION);
    w.write_tnamed(name, "");

    let att = w.start_object(TATTAXIS_VERSION);
    w.write_i32(510); // fNdivisions
    w.write_i16(1); // fAxisColor
    w.write_i16(1); // fLabelColor
    w.write_i16(42); // fLabelFont
    w.write_f32(0.005); // fLabelOffset
    w.write_f32(0.035); // fLabelSize
    w.write_f32(0.03); // fTickLength
    w.write_f32(1.0); // fTitleOffset
    w.write_f32(0.035); // fTitleSize
    w.write_i16(1); // fTitleColor
    w.write_i16(42); // fTitleFont
    w.end_object(att);

    w.write_i32(n_bins);
    w.write_f64(x_min);
    w.write_f64(x_max);
    w.write_i32(0); // fXbins
    w.write_i32(0); // fFirst
    w.write_i32(0); // fLast
    w.write_u16(0); // fBits2
    w.write_u8(0); // fTimeDisplay
    w.write_string("");
    w.write_null_pointer(); // fLabels
    w.write_null_pointer(); // fModLabs
    w.end_object(axis);
}

pub fn read_th1f(payload: &[u8]) -> Result<Histogram1D> {
    let mut r = RBuffer::new(payload);

    let (_th1f_version, _end) = r.read_version()?;
    let (_th1_version, th1_end) = r.read_version()?;
    let (name, title) = r.read_tnamed()?;
    r.skip_versioned()?; // TAttLine
    r.skip_versioned()?; // TAttFill
    r.skip_versioned()?; // TAttMarker

    let n_cells = r.read_i32()?.max(0) as usize;
    let (n_bins, x_min, x_max) = read_taxis(&mut r)?;
    r.skip_versioned()?; // fYaxis
    r.skip_versioned()?; // fZaxis

    let _bar_offset = r.read_i16()?;
    let _bar_width = r.read_i16()?;
    let entries = r.read_f64()?;
    let tsumw = r.read_f64()?;
    let tsumw2 = r.read_f64()?;
    let tsumwx = r.read_f64()?;
    let tsumwx2 = r.read_f64()?;

    let th1_end = th1_end.ok_or_else(|| RootError::Deserialization("TH1 without byte count".into()))?;
    r.set_pos(th1_end);

    let n = r.read_i32()?.max(0) as usize;
    if n != n_cells || n != n_bins + 2 {
        return Err(RootError::Deserialization(format!(
            "TH1F '{name}' stores {n} cells for {n_bins} bins (fNcells {n_cells})"
        )));
    }
    let mut cells = Vec::with_capacity(n);
    for _ in 0..n {
        cells.push(r.read_f32()? as f64);
    }

    Ok(Histogram1D {
        name,
        title,
        n_bins,
        x_min,
        x_max,
        cells,
        entries,
        tsumw,
        tsumw2,
        tsumwx,
        tsumwx2,
    })
}

fn read_taxis(r: &mut RBuffer) -> Result<(usize, f64, f64)> {
    let (_version, end) = r.read_version()?;
    r.read_tnamed()?;
    r.skip_versioned()?; // TAttAxis
    let n_bins = r.read_i32()?.max(0) as usize;
    let x_min = r.read_f64()?;
    let x_max = r.read_f64()?;
    if let Some(end) = end {
        r.set_pos(end);
    }
    Ok((n_bins, x_min, x_max))
}
