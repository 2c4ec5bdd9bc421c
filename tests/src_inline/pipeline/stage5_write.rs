use std::fs;

use super::*;
use crate::histogram::Histogram1D;
use crate::rootio::RootFile;
use crate::rootio::fixture::make_temp_dir;

fn histograms() -> Stage4Output {
    let mut sig = Histogram1D::new("sig", "", 50, 0.0, 1.0);
    let mut bkg = Histogram1D::new("bkg", "", 50, 0.0, 1.0);
    sig.fill_all([0.9f32, 0.95, 0.8]);
    bkg.fill_all([0.1f32, 0.2]);
    Stage4Output { sig, bkg }
}

#[test]
fn test_writes_sig_and_bkg() {
    let dir = make_temp_dir();
    let path = dir.join("ResTopDNN.root");
    run_stage5(&histograms(), &path).unwrap();

    let file = RootFile::open(&path).unwrap();
    let names: Vec<&str> = file.keys().iter().map(|k| k.name.as_str()).collect();
    assert_eq!(names, vec!["sig", "bkg"]);
    assert_eq!(file.get_th1f("sig").unwrap().entries, 3.0);
    assert_eq!(file.get_th1f("bkg").unwrap().entries, 2.0);
}

#[test]
fn test_overwrites_existing_output() {
    let dir = make_temp_dir();
    let path = dir.join("ResTopDNN.root");
    fs::write(&path, vec![0xAB; 10_000]).unwrap();
    run_stage5(&histograms(), &path).unwrap();

    let file = RootFile::open(&path).unwrap();
    assert_eq!(file.keys().len(), 2);
    assert_eq!(file.get_th1f("sig").unwrap().cells[48], 1.0);
}
