use std::io::Cursor;

use gcfst::filesystem::{
    AddFileError, DirectoryNode, FileSystem, FileSystemNode, NODE_RECORD_SIZE, RawNode,
};

fn build(entries: &[(&str, &[u8])]) -> FileSystem {
    let mut fs = FileSystem::new();
    for (path, data) in entries {
        fs.add_file(path, data.to_vec(), false)
            .expect("add file");
    }
    fs
}

fn sample_entries() -> Vec<(&'static str, &'static [u8])> {
    vec![
        ("sys/main.dol", b"\x7fDOL" as &[u8]),
        ("audio/bgm/title.adp", b"title music"),
        ("audio/se.pkg", b""),
        ("Zelda.tpl", b"texture"),
        ("audio/bgm/boss.adp", b"boss music, longer than the rest"),
        ("opening.bnr", b"banner"),
        ("data/levels/1/map.bin", &[1, 2, 3, 4, 5, 6, 7]),
    ]
}

fn sorted_pairs(fs: &FileSystem) -> Vec<(String, Vec<u8>)> {
    let mut pairs = fs
        .file_entries()
        .into_iter()
        .map(|entry| (entry.path, entry.file.data().to_vec()))
        .collect::<Vec<_>>();
    pairs.sort();
    pairs
}

fn reparse(bytes: &[u8]) -> FileSystem {
    FileSystem::deserialize_with_files(&mut Cursor::new(bytes)).expect("reparse")
}

fn assert_subtree_bounds(directory: &DirectoryNode, index: &mut u32) {
    let own = *index;
    assert_eq!(
        directory.last_child_index(),
        own + 1 + directory.descendant_count() as u32,
        "directory '{}' at {own}",
        directory.name()
    );
    *index += 1;
    for child in directory.children() {
        match child {
            FileSystemNode::Directory(sub) => assert_subtree_bounds(sub, index),
            FileSystemNode::File(_) => *index += 1,
        }
    }
}

#[test]
fn serialize_then_deserialize_preserves_paths_and_data() {
    let mut built = build(&sample_entries());

    let bytes = built.to_bytes().unwrap();
    let parsed = reparse(&bytes);

    assert_eq!(sorted_pairs(&parsed), sorted_pairs(&built));
    assert_eq!(parsed.node_count(), built.node_count());
}

#[test]
fn reserializing_a_parsed_table_is_byte_identical() {
    let mut built = build(&sample_entries());
    let first = built.to_bytes().unwrap();

    let mut parsed = reparse(&first);
    let second = parsed.to_bytes().unwrap();

    assert_eq!(first, second);
    assert_eq!(parsed.raw(), &first[..parsed.raw().len()]);
}

#[test]
fn insertion_order_does_not_change_output() {
    let entries = sample_entries();
    let mut reversed_entries = entries.clone();
    reversed_entries.reverse();

    let forward = build(&entries).to_bytes().unwrap();
    let backward = build(&reversed_entries).to_bytes().unwrap();

    assert_eq!(forward, backward);
}

#[test]
fn every_directory_bound_matches_its_descendants() {
    let mut fs = build(&sample_entries());
    let bytes = fs.to_bytes().unwrap();

    assert_subtree_bounds(fs.root(), &mut 0);
    assert_subtree_bounds(reparse(&bytes).root(), &mut 0);
}

#[test]
fn alignment_survives_the_round_trip() {
    let mut fs = build(&sample_entries()).with_alignment(0x20).unwrap();

    let bytes = fs.to_bytes().unwrap();
    let parsed = reparse(&bytes);

    for file in parsed.files() {
        assert_eq!(file.offset() % 0x20, 0, "{}", file.name());
    }
}

#[test]
fn duplicate_add_fails_and_keeps_prior_entry() {
    let mut fs = build(&sample_entries());
    let before = fs.clone().to_bytes().unwrap();

    let result = fs.add_file("audio/bgm/title.adp", b"other".to_vec(), false);

    assert!(matches!(
        result,
        Err(AddFileError::DuplicateEntryError { .. })
    ));
    assert_eq!(fs.to_bytes().unwrap(), before);
}

#[test]
fn removing_a_missing_path_changes_nothing() {
    let mut fs = build(&sample_entries());
    let before = fs.to_bytes().unwrap();

    assert!(!fs.remove_node("missing/path"));

    assert_eq!(fs.to_bytes().unwrap(), before);
}

#[test]
fn removing_a_directory_drops_its_subtree_from_the_table() {
    let mut fs = build(&sample_entries());

    assert!(fs.remove_node("audio"));
    let parsed = reparse(&fs.to_bytes().unwrap());

    assert!(parsed.find("audio").is_none());
    assert!(
        sorted_pairs(&parsed)
            .iter()
            .all(|(path, _)| !path.starts_with("audio/"))
    );
    assert_eq!(parsed.node_count(), fs.node_count());
}

#[test]
fn two_file_scenario_produces_documented_layout() {
    let mut fs = FileSystem::new();
    fs.add_file("docs/readme.txt", vec![b'r'; 5], false).unwrap();
    fs.add_file("main.dol", vec![b'm'; 100], false).unwrap();

    let bytes = fs.to_bytes().unwrap();

    assert_eq!(fs.files().len(), 2);
    assert_eq!(fs.directories().len(), 1);
    assert_eq!(fs.directories()[0].name(), "docs");

    let mut cursor = Cursor::new(&bytes);
    let root = RawNode::read_from(&mut cursor).unwrap();
    assert_eq!(root.second, 4);

    let names_start = (4 * NODE_RECORD_SIZE) as usize;
    let names = b"docs\0readme.txt\0main.dol\0";
    assert_eq!(&bytes[names_start..names_start + names.len()], names);
}

#[test]
fn table_embedded_in_a_larger_image_round_trips() {
    let mut fs = build(&sample_entries());
    let mut cursor = Cursor::new(vec![0xFF; 0x440]);
    cursor.set_position(0x440);
    fs.serialize(&mut cursor).unwrap();

    let image = cursor.into_inner();
    let mut reader = Cursor::new(&image);
    reader.set_position(0x440);
    let parsed = FileSystem::deserialize_with_files(&mut reader).unwrap();

    assert_eq!(parsed.address_range(), fs.address_range());
    assert_eq!(sorted_pairs(&parsed), sorted_pairs(&fs));
}

#[test]
fn parsed_table_edited_in_place_keeps_remaining_payloads() {
    let mut built = build(&sample_entries());
    let bytes = built.to_bytes().unwrap();

    let mut unloaded = FileSystem::deserialize(&mut Cursor::new(&bytes)).unwrap();
    assert!(unloaded.to_bytes().is_err());

    let mut parsed = reparse(&bytes);
    assert!(parsed.remove_node("audio/bgm"));
    parsed.add_file("sys/extra.bin", vec![5; 9], false).unwrap();
    assert_subtree_bounds(parsed.root(), &mut 0);

    let edited = reparse(&parsed.to_bytes().unwrap());

    let mut expected = sorted_pairs(&built)
        .into_iter()
        .filter(|(path, _)| !path.starts_with("audio/bgm/"))
        .collect::<Vec<_>>();
    expected.push(("sys/extra.bin".to_string(), vec![5; 9]));
    expected.sort();
    assert_eq!(sorted_pairs(&edited), expected);
}
