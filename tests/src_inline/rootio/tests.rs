use std::path::PathBuf;

use super::decompress::decompress;
use super::fixture::{
    Compression, FixtureTree, feature_tree, make_temp_dir, root_block, tree_file_bytes,
    write_tree_file, zlib,
};
use super::key::{KEY_VERSION, Key};
use super::rbuffer::RBuffer;
use super::wbuffer::WBuffer;
use super::writer::datime_from_unix;
use super::ttree::LeafType;
use super::{RootError, RootFile, RootWriter};
use crate::histogram::Histogram1D;

fn open_bytes(bytes: Vec<u8>) -> RootFile {
    RootFile::from_bytes(bytes, PathBuf::from("memory.root")).unwrap()
}

fn key_at(bytes: &[u8], seek: i64) -> Key {
    let mut r = RBuffer::new(bytes);
    r.set_pos(seek as usize);
    Key::read(&mut r).unwrap()
}

#[test]
fn test_rbuffer_reads_big_endian_and_strings() {
    let mut w = WBuffer::new();
    w.write_u16(0xBEEF);
    w.write_i32(-7);
    w.write_f64(2.5);
    w.write_string("treeS");
    let long = "x".repeat(300);
    w.write_string(&long);
    let bytes = w.into_inner();

    let mut r = RBuffer::new(&bytes);
    assert_eq!(r.read_u16().unwrap(), 0xBEEF);
    assert_eq!(r.read_i32().unwrap(), -7);
    assert_eq!(r.read_f64().unwrap(), 2.5);
    assert_eq!(r.read_string().unwrap(), "treeS");
    assert_eq!(r.read_string().unwrap(), long);
    assert_eq!(r.remaining(), 0);
    assert!(matches!(
        r.read_u8(),
        Err(RootError::BufferUnderflow { need: 1, .. })
    ));
}

#[test]
fn test_versioned_objects_report_their_end() {
    let mut w = WBuffer::new();
    let pos = w.start_object(7);
    w.write_i32(1);
    w.write_i32(2);
    w.end_object(pos);
    w.write_u8(0xAA);
    let bytes = w.into_inner();

    let mut r = RBuffer::new(&bytes);
    let (version, end) = r.read_version().unwrap();
    assert_eq!(version, 7);
    assert_eq!(end, Some(14));

    let mut r = RBuffer::new(&bytes);
    r.skip_versioned().unwrap();
    assert_eq!(r.read_u8().unwrap(), 0xAA);
}

#[test]
fn test_tnamed_round_trip() {
    let mut w = WBuffer::new();
    w.write_tnamed("sig", "signal scores");
    let bytes = w.into_inner();
    let mut r = RBuffer::new(&bytes);
    let (name, title) = r.read_tnamed().unwrap();
    assert_eq!(name, "sig");
    assert_eq!(title, "signal scores");
    assert_eq!(r.remaining(), 0);
}

#[test]
fn test_decompress_zlib_block() {
    let original = b"treeS treeS treeS treeS treeS treeS treeS";
    let block = root_block(b"ZL", 8, &zlib(original), original.len());
    assert_eq!(decompress(&block, original.len()).unwrap(), original);
}

#[test]
fn test_decompress_lz4_block_skips_checksum() {
    let original = b"bjetMass bjetMass bjetMass bjetMass bjetMass";
    let mut payload = vec![0u8; 8];
    payload.extend_from_slice(&lz4_flex::compress(original));
    let block = root_block(b"L4", 4, &payload, original.len());
    assert_eq!(decompress(&block, original.len()).unwrap(), original);
}

#[test]
fn test_decompress_zstd_block() {
    let original = b"cosW_Jet1Jet2 cosW_Jet1Jet2 cosW_Jet1Jet2 cosW_Jet1Jet2";
    let compressed = ruzstd::encoding::compress_to_vec(
        &original[..],
        ruzstd::encoding::CompressionLevel::Fastest,
    );
    let block = root_block(b"ZS", 5, &compressed, original.len());
    assert_eq!(decompress(&block, original.len()).unwrap(), original);
}

#[test]
fn test_decompress_concatenated_blocks() {
    let first = vec![1u8; 40];
    let second = vec![2u8; 24];
    let mut src = root_block(b"ZL", 8, &zlib(&first), first.len());
    src.extend(root_block(b"ZL", 8, &zlib(&second), second.len()));
    let out = decompress(&src, 64).unwrap();
    assert_eq!(&out[..40], &first[..]);
    assert_eq!(&out[40..], &second[..]);
}

#[test]
fn test_decompress_rejects_unknown_algorithm() {
    let block = root_block(b"XX", 1, &[0u8; 4], 16);
    let err = decompress(&block, 16).unwrap_err();
    assert!(matches!(err, RootError::Decompression(msg) if msg.contains("XX")));
}

#[test]
fn test_key_read_object_decompresses_payload() {
    let object = (0u8..200).collect::<Vec<_>>();
    let stored = root_block(b"ZL", 8, &zlib(&object), object.len());
    let key_len = Key::header_len("TObject", "obj", "");
    let key = Key {
        n_bytes: (key_len + stored.len()) as u32,
        version: KEY_VERSION,
        obj_len: object.len() as u32,
        datime: 0,
        key_len: key_len as u16,
        cycle: 1,
        seek_key: 0,
        seek_pdir: 100,
        class_name: "TObject".to_string(),
        name: "obj".to_string(),
        title: String::new(),
    };
    let mut w = WBuffer::new();
    key.write(&mut w);
    w.write_bytes(&stored);
    let bytes = w.into_inner();

    let read = Key::read(&mut RBuffer::new(&bytes)).unwrap();
    assert_eq!(read.key_len as usize, key_len);
    assert!(read.is_compressed());
    assert_eq!(read.read_object(&bytes).unwrap().as_ref(), &object[..]);
}

#[test]
fn test_bad_magic_is_rejected() {
    let err = RootFile::from_bytes(vec![0u8; 128], PathBuf::from("x")).err().unwrap();
    assert!(matches!(err, RootError::BadMagic));
}

#[test]
fn test_written_file_lists_keys_and_hides_streamer_info() {
    let mut writer = RootWriter::new("ResTopDNN.root");
    writer.write_histogram(&Histogram1D::new("sig", "", 50, 0.0, 1.0)).unwrap();
    writer.write_histogram(&Histogram1D::new("bkg", "", 50, 0.0, 1.0)).unwrap();
    let bytes = writer.finish().unwrap();

    assert_eq!(&bytes[0..4], b"root");
    let end = u32::from_be_bytes([bytes[12], bytes[13], bytes[14], bytes[15]]);
    assert_eq!(end as usize, bytes.len());

    let file = open_bytes(bytes);
    let names: Vec<&str> = file.keys().iter().map(|k| k.name.as_str()).collect();
    assert_eq!(names, vec!["sig", "bkg"]);
    assert!(file.keys().iter().all(|k| k.class_name == "TH1F"));
    assert!(file.find_key("StreamerInfo").is_none());
}

#[test]
fn test_th1f_round_trip_through_file() {
    let mut h = Histogram1D::new("sig", "", 50, 0.0, 1.0);
    h.fill_all([0.01f32, 0.5, 0.5, 0.999, -0.2, 1.0, f32::NAN]);

    let mut writer = RootWriter::new("ResTopDNN.root");
    writer.write_histogram(&h).unwrap();
    let file = open_bytes(writer.finish().unwrap());

    let back = file.get_th1f("sig").unwrap();
    assert_eq!(back.name, "sig");
    assert_eq!(back.n_bins, 50);
    assert_eq!(back.x_min, 0.0);
    assert_eq!(back.x_max, 1.0);
    assert_eq!(back.cells, h.cells);
    assert_eq!(back.entries, 7.0);
    assert_eq!(back.tsumw, 4.0);
    assert!((back.tsumwx - h.tsumwx).abs() < 1e-12);
    assert_eq!(back.underflow(), 1.0);
    assert_eq!(back.overflow(), 2.0);
}

#[test]
fn test_rewriting_an_object_bumps_the_cycle() {
    let mut writer = RootWriter::new("cycles.root");
    let mut old = Histogram1D::new("sig", "", 50, 0.0, 1.0);
    old.fill(0.1);
    let mut new = Histogram1D::new("sig", "", 50, 0.0, 1.0);
    new.fill(0.9);
    new.fill(0.9);
    writer.write_histogram(&old).unwrap();
    writer.write_histogram(&new).unwrap();
    let file = open_bytes(writer.finish().unwrap());

    assert_eq!(file.find_key("sig").unwrap().cycle, 2);
    assert_eq!(file.get_th1f("sig").unwrap().entries, 2.0);
}

#[test]
fn test_tree_spread_over_baskets_reads_back() {
    let values: Vec<f64> = (0..37).map(|i| i as f64 * 0.25).collect();
    let tree = FixtureTree::new("treeS", 8).branch("bjetMass", LeafType::F32, values.clone());
    let file = open_bytes(tree_file_bytes(&[tree]));

    let tree = file.get_tree("treeS").unwrap();
    assert_eq!(tree.entries, 37);
    let branch = tree.find_branch("bjetMass").unwrap();
    assert_eq!(branch.leaf_type, Some(LeafType::F32));
    assert_eq!(branch.leaf_len, 1);
    assert_eq!(branch.n_baskets(), 5);
    assert_eq!(branch.basket_entry, vec![0, 8, 16, 24, 32, 37]);

    let read = file.read_branch(branch, u64::MAX).unwrap();
    let expected: Vec<f32> = values.iter().map(|&v| v as f32).collect();
    assert_eq!(read, expected);
}

#[test]
fn test_entry_stop_truncates_inside_a_basket() {
    let values: Vec<f64> = (0..30).map(f64::from).collect();
    let tree = FixtureTree::new("treeB", 10).branch("dijetMass", LeafType::F64, values);
    let file = open_bytes(tree_file_bytes(&[tree]));

    let tree = file.get_tree("treeB").unwrap();
    let branch = tree.find_branch("dijetMass").unwrap();
    let read = file.read_branch(branch, 13).unwrap();
    assert_eq!(read.len(), 13);
    assert_eq!(read[12], 12.0);
}

#[test]
fn test_integer_and_bool_leaves_widen_to_f32() {
    let tree = FixtureTree::new("treeS", 4)
        .branch("LdgJetMult", LeafType::I32, vec![3.0, 7.0, -2.0])
        .branch("nJets", LeafType::I16, vec![1.0, 2.0, 3.0])
        .branch("flag", LeafType::Bool, vec![1.0, 0.0, 1.0])
        .branch("big", LeafType::I64, vec![10.0, 20.0, 30.0])
        .branch("tiny", LeafType::I8, vec![-1.0, 0.0, 1.0]);
    let file = open_bytes(tree_file_bytes(&[tree]));
    let tree = file.get_tree("treeS").unwrap();

    let read = |name: &str| file.read_branch(tree.find_branch(name).unwrap(), 3).unwrap();
    assert_eq!(read("LdgJetMult"), vec![3.0, 7.0, -2.0]);
    assert_eq!(read("nJets"), vec![1.0, 2.0, 3.0]);
    assert_eq!(read("flag"), vec![1.0, 0.0, 1.0]);
    assert_eq!(read("big"), vec![10.0, 20.0, 30.0]);
    assert_eq!(read("tiny"), vec![-1.0, 0.0, 1.0]);
}

#[test]
fn test_two_trees_share_one_file() {
    let dir = make_temp_dir();
    let path = dir.join("input.root");
    write_tree_file(&path, &[feature_tree("treeS", 20, 0.0), feature_tree("treeB", 30, 100.0)]);

    let file = RootFile::open(&path).unwrap();
    let sig = file.get_tree("treeS").unwrap();
    let bkg = file.get_tree("treeB").unwrap();
    assert_eq!(sig.entries, 20);
    assert_eq!(bkg.entries, 30);
    assert_eq!(sig.branches.len(), 33);
    assert_eq!(sig.branch_names()[0], "trijetPtDR");

    let cos = file
        .read_branch(bkg.find_branch("cosW_Jet2BJet").unwrap(), 30)
        .unwrap();
    assert!((cos[0] - 100.32).abs() < 1e-4);
    assert!((cos[29] - 129.32).abs() < 1e-3);
}

#[test]
fn test_missing_tree_and_wrong_class() {
    let mut writer = RootWriter::new("mixed.root");
    writer.write_histogram(&Histogram1D::new("treeS", "", 5, 0.0, 1.0)).unwrap();
    let file = open_bytes(writer.finish().unwrap());

    assert!(matches!(
        file.get_tree("treeB"),
        Err(RootError::KeyNotFound(name)) if name == "treeB"
    ));
    assert!(matches!(
        file.get_tree("treeS"),
        Err(RootError::ClassMismatch { found, .. }) if found == "TH1F"
    ));
}

#[test]
fn test_unsupported_leaf_is_reported() {
    let tree = FixtureTree::new("treeS", 4).branch("x", LeafType::F32, vec![1.0, 2.0]);
    let file = open_bytes(tree_file_bytes(&[tree]));
    let tree = file.get_tree("treeS").unwrap();
    let mut branch = tree.find_branch("x").unwrap().clone();
    branch.leaf_type = None;
    branch.leaf_class = "TLeafElement".to_string();
    assert!(matches!(
        file.read_branch(&branch, 2),
        Err(RootError::UnsupportedLeaf { class, .. }) if class == "TLeafElement"
    ));
}

#[test]
fn test_datime_packing() {
    // 2024-03-15 12:34:56 UTC
    let packed = datime_from_unix(1_710_506_096);
    assert_eq!(packed >> 26, 2024 - 1995);
    assert_eq!((packed >> 22) & 0xF, 3);
    assert_eq!((packed >> 17) & 0x1F, 15);
    assert_eq!((packed >> 12) & 0x1F, 12);
    assert_eq!((packed >> 6) & 0x3F, 34);
    assert_eq!(packed & 0x3F, 56);
}

#[test]
fn test_key_version_decides_seek_width() {
    let mut small = Key {
        n_bytes: 120,
        version: KEY_VERSION,
        obj_len: 80,
        datime: 0,
        key_len: 40,
        cycle: 3,
        seek_key: 5000,
        seek_pdir: 100,
        class_name: "TBasket".to_string(),
        name: "bjetMass".to_string(),
        title: "treeS".to_string(),
    };
    let mut w = WBuffer::new();
    small.write(&mut w);
    let read = Key::read(&mut RBuffer::new(&w.into_inner())).unwrap();
    assert_eq!(read.seek_key, 5000);
    assert_eq!(read.name, "bjetMass");

    // Same fields with 64-bit seeks, as a large-file writer emits them.
    small.version = KEY_VERSION + 1000;
    let mut w = WBuffer::new();
    w.write_u32(small.n_bytes);
    w.write_u16(small.version);
    w.write_u32(small.obj_len);
    w.write_u32(small.datime);
    w.write_u16(small.key_len);
    w.write_u16(small.cycle);
    w.write_bytes(&(3u64 << 32).to_be_bytes());
    w.write_bytes(&100u64.to_be_bytes());
    w.write_string(&small.class_name);
    w.write_string(&small.name);
    w.write_string(&small.title);
    let bytes = w.into_inner();
    let mut r = RBuffer::new(&bytes);
    let read = Key::read(&mut r).unwrap();
    assert_eq!(read.version, 1004);
    assert_eq!(read.seek_key, 3u64 << 32);
    assert_eq!(read.seek_pdir, 100);
    assert_eq!(read.class_name, "TBasket");
    assert_eq!(read.name, "bjetMass");
    assert_eq!(read.title, "treeS");
    assert_eq!(r.remaining(), 0);
}

#[test]
fn test_compressed_trees_read_back() {
    for compression in [Compression::Zlib, Compression::Lz4] {
        let values: Vec<f64> = (0..300).map(|i| (i % 7) as f64 * 0.5).collect();
        let tree = FixtureTree::new("treeS", 100)
            .compressed(compression)
            .branch("bjetMass", LeafType::F32, values.clone())
            .branch("nJets", LeafType::I32, values.iter().map(|v| v.floor()).collect());
        let bytes = tree_file_bytes(&[tree]);
        let file = open_bytes(bytes.clone());

        assert!(file.find_key("treeS").unwrap().is_compressed(), "{compression:?}");
        let tree = file.get_tree("treeS").unwrap();
        assert_eq!(tree.entries, 300);
        let branch = tree.find_branch("bjetMass").unwrap();
        assert_eq!(branch.n_baskets(), 3);
        for &seek in &branch.basket_seek {
            assert!(key_at(&bytes, seek).is_compressed(), "{compression:?}");
        }

        let read = file.read_branch(branch, u64::MAX).unwrap();
        let expected: Vec<f32> = values.iter().map(|&v| v as f32).collect();
        assert_eq!(read, expected);
        let jets = file
            .read_branch(tree.find_branch("nJets").unwrap(), 150)
            .unwrap();
        assert_eq!(jets.len(), 150);
        assert_eq!(jets[13], 3.0);
    }
}

#[test]
fn test_corrupt_basket_past_the_cap_is_never_decompressed() {
    let values: Vec<f64> = (0..30).map(f64::from).collect();
    let tree = FixtureTree::new("treeS", 10)
        .compressed(Compression::Zlib)
        .branch("dijetMass", LeafType::F32, values);
    let mut bytes = tree_file_bytes(&[tree]);

    let branch = open_bytes(bytes.clone())
        .get_tree("treeS")
        .unwrap()
        .find_branch("dijetMass")
        .unwrap()
        .clone();
    assert_eq!(branch.basket_entry, vec![0, 10, 20, 30]);
    let last = key_at(&bytes, branch.basket_seek[2]);
    let start = last.seek_key as usize + last.key_len as usize;
    let end = last.seek_key as usize + last.n_bytes as usize;
    bytes[start..end].fill(0xFF);

    let file = open_bytes(bytes);
    let read = file.read_branch(&branch, 20).unwrap();
    assert_eq!(read.len(), 20);
    assert_eq!(read[19], 19.0);
    assert!(matches!(
        file.read_branch(&branch, 21),
        Err(RootError::Decompression(_))
    ));
}
