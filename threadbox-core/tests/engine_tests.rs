//! End-to-end scenarios from the storage engine's spec (§8 S1–S6).

use threadbox_core::engine::Engine;
use threadbox_core::error::StorageError;

fn engine() -> Engine {
    Engine::open_in_memory().expect("open in-memory engine")
}

#[test]
fn s1_versioned_overwrite() {
    let mut e = engine();
    let v1 = e.write_file("/docs/readme.md", b"V1", None).unwrap();
    assert_eq!(v1.version, Some(1));
    let v2 = e.write_file("/docs/readme.md", b"V2", None).unwrap();
    assert_eq!(v2.version, Some(2));

    let read = e.read_file("/docs/readme.md", None).unwrap().unwrap();
    assert_eq!(read.content.as_deref(), Some(&b"V2"[..]));
    assert_eq!(read.version, Some(2));

    let history = e.get_file_history("/docs/readme.md", None).unwrap();
    assert_eq!(history.iter().map(|v| v.version).collect::<Vec<_>>(), vec![2, 1]);
}

#[test]
fn s2_session_isolation() {
    let mut e = engine();
    e.write_file("/shared.txt", b"Alpha", Some("alpha")).unwrap();
    e.write_file("/shared.txt", b"Beta", Some("beta")).unwrap();

    let alpha = e.read_file("/shared.txt", Some("alpha")).unwrap().unwrap();
    let beta = e.read_file("/shared.txt", Some("beta")).unwrap().unwrap();
    assert_eq!(alpha.content.as_deref(), Some(&b"Alpha"[..]));
    assert_eq!(beta.content.as_deref(), Some(&b"Beta"[..]));
}

#[test]
fn s3_directory_listing() {
    let mut e = engine();
    e.write_file("/dir/a.txt", b"A", None).unwrap();
    e.write_file("/dir/nested/b.txt", b"B", None).unwrap();

    let listing = e.list_directory("/dir", None).unwrap();
    assert_eq!(listing.directories.len(), 1);
    assert_eq!(listing.directories[0].name, "nested");
    assert_eq!(listing.files.len(), 1);
    assert_eq!(listing.files[0].name, "a.txt");
}

#[test]
fn s4_rename_conflict_leaves_both_nodes_intact() {
    let mut e = engine();
    e.write_file("/a.txt", b"A", None).unwrap();
    e.write_file("/b.txt", b"B", None).unwrap();

    let err = e.rename_node("/a.txt", "b.txt", None).unwrap_err();
    assert!(matches!(err, StorageError::AlreadyExists { .. }));

    assert_eq!(
        e.read_file("/a.txt", None).unwrap().unwrap().content.as_deref(),
        Some(&b"A"[..])
    );
    assert_eq!(
        e.read_file("/b.txt", None).unwrap().unwrap().content.as_deref(),
        Some(&b"B"[..])
    );
}

#[test]
fn s5_move_preserves_node_identity() {
    let mut e = engine();
    let created = e.write_file("/drafts/idea.md", b"draft", None).unwrap();
    let moved = e.move_node("/drafts/idea.md", "/archive", None).unwrap();

    assert_eq!(moved.path, "/archive/idea.md");
    assert_eq!(moved.id, created.id);
    assert!(e.read_file("/drafts/idea.md", None).unwrap().is_none());
    assert_eq!(
        e.read_file("/archive/idea.md", None).unwrap().unwrap().content.as_deref(),
        Some(&b"draft"[..])
    );
}

#[test]
fn s6_zip_export_contains_exactly_one_member() {
    use std::io::Read;
    use zip::ZipArchive;

    let mut e = engine();
    e.write_file("/docs/readme.md", b"export me", Some("s1")).unwrap();

    let dir = tempfile::tempdir().unwrap();
    let zip_path = e.export_session_zip(Some("s1"), Some(dir.path())).unwrap();
    assert!(zip_path.exists());

    let file = std::fs::File::open(&zip_path).unwrap();
    let mut archive = ZipArchive::new(file).unwrap();
    assert_eq!(archive.len(), 1);
    let mut member = archive.by_name("docs/readme.md").unwrap();
    let mut contents = String::new();
    member.read_to_string(&mut contents).unwrap();
    assert_eq!(contents, "export me");
}

#[test]
fn rename_round_trip_restores_original_path_and_history() {
    let mut e = engine();
    let created = e.write_file("/notes/x.txt", b"v1", None).unwrap();
    e.write_file("/notes/x.txt", b"v2", None).unwrap();

    let renamed = e.rename_node("/notes/x.txt", "y.txt", None).unwrap();
    assert_eq!(renamed.path, "/notes/y.txt");

    let restored = e.rename_node("/notes/y.txt", "x.txt", None).unwrap();
    assert_eq!(restored.path, "/notes/x.txt");
    assert_eq!(restored.id, created.id);

    let history = e.get_file_history("/notes/x.txt", None).unwrap();
    assert_eq!(history.len(), 2);
}

#[test]
fn write_then_rename_preserves_version_at_new_path() {
    let mut e = engine();
    e.write_file("/a.txt", b"hello", None).unwrap();
    let written = e.write_file("/a.txt", b"hello again", None).unwrap();
    let renamed = e.rename_node("/a.txt", "q.txt", None).unwrap();

    let read = e.read_file("/q.txt", None).unwrap().unwrap();
    assert_eq!(read.content.as_deref(), Some(&b"hello again"[..]));
    assert_eq!(read.version, written.version);
    assert_eq!(renamed.version, written.version);
}

#[test]
fn empty_content_is_a_valid_file() {
    let mut e = engine();
    e.write_file("/empty.txt", b"", None).unwrap();
    let read = e.read_file("/empty.txt", None).unwrap().unwrap();
    assert_eq!(read.content, Some(Vec::new()));
}

#[test]
fn special_characters_round_trip_unchanged() {
    let mut e = engine();
    let path = "/weird dir/caf\u{e9} \u{2603} (draft)!.txt";
    e.write_file(path, b"payload", None).unwrap();
    let read = e.read_file(path, None).unwrap().unwrap();
    assert_eq!(read.path, path);
    assert_eq!(read.content.as_deref(), Some(&b"payload"[..]));
}

#[test]
fn path_comparison_is_case_sensitive() {
    let mut e = engine();
    e.write_file("/Foo.txt", b"upper", None).unwrap();
    assert!(e.read_file("/foo.txt", None).unwrap().is_none());
}

#[test]
fn writing_same_bytes_twice_still_bumps_version() {
    let mut e = engine();
    let first = e.write_file("/dup.txt", b"same", None).unwrap();
    let second = e.write_file("/dup.txt", b"same", None).unwrap();
    assert_ne!(first.version, second.version);
    assert_eq!(second.version, first.version.map(|v| v + 1));
}

#[test]
fn writing_onto_a_directory_is_an_error() {
    let mut e = engine();
    e.write_file("/dir/a.txt", b"A", None).unwrap();
    let err = e.write_file("/dir", b"oops", None).unwrap_err();
    assert!(matches!(err, StorageError::IsDirectory { .. }));
}

#[test]
fn listing_a_file_is_not_a_directory_error() {
    let mut e = engine();
    e.write_file("/a.txt", b"A", None).unwrap();
    let err = e.list_directory("/a.txt", None).unwrap_err();
    assert!(matches!(err, StorageError::NotADirectory { .. }));
}

#[test]
fn listing_a_missing_nonroot_path_is_an_error() {
    let mut e = engine();
    let err = e.list_directory("/never/created", None).unwrap_err();
    assert!(matches!(err, StorageError::NotADirectory { .. }));
}

#[test]
fn listing_root_auto_creates_it() {
    let mut e = engine();
    let listing = e.list_directory("/", Some("brand-new-session")).unwrap();
    assert!(listing.directories.is_empty());
    assert!(listing.files.is_empty());
}

#[test]
fn renaming_root_is_rejected() {
    let mut e = engine();
    let err = e.rename_node("/", "whatever", None).unwrap_err();
    assert!(matches!(err, StorageError::InvalidOperation { .. }));
}

#[test]
fn moving_a_directory_is_unsupported() {
    let mut e = engine();
    e.write_file("/dir/a.txt", b"A", None).unwrap();
    let err = e.move_node("/dir", "/elsewhere", None).unwrap_err();
    assert!(matches!(err, StorageError::UnsupportedKind { .. }));
}

#[test]
fn moving_onto_self_is_rejected() {
    let mut e = engine();
    e.write_file("/a.txt", b"A", None).unwrap();
    let err = e.move_node("/a.txt", "/", None).unwrap_err();
    assert!(matches!(err, StorageError::InvalidOperation { .. }));
}

#[test]
fn history_of_missing_file_is_empty() {
    let e = engine();
    assert!(e.get_file_history("/nope.txt", None).unwrap().is_empty());
}
