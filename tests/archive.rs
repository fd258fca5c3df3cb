//! Loading and writing tome archives.

mod common;

use common::{FixtureEntry, build_zip, build_zip_from, comic_volume};
use flate2::Compression;
use flate2::write::DeflateEncoder;
use std::io::Write;
use tomekit::{ArchiveStore, CanonicalPath, Error, LoadLimits};

fn deflate(data: &[u8]) -> Vec<u8> {
    let mut encoder = DeflateEncoder::new(Vec::new(), Compression::default());
    encoder.write_all(data).unwrap();
    encoder.finish().unwrap()
}

#[tokio::test]
async fn test_untouched_archive_round_trips_exactly() {
    let bytes = comic_volume();
    let store = ArchiveStore::from_bytes(bytes.clone()).await.unwrap();
    assert_eq!(store.len(), 7);
    assert_eq!(store.serialize().unwrap(), bytes);
}

#[tokio::test]
async fn test_edit_preserves_other_entries() {
    let bytes = comic_volume();
    let mut store = ArchiveStore::from_bytes(bytes).await.unwrap();
    let original_page = store.stored_bytes("ch2/a.jpg").unwrap().to_vec();
    let original_header = store.header("ch2/a.jpg").unwrap().clone();

    store
        .put("tome.json", br#"{"type":"comic_volume","title":"Renamed"}"#.to_vec())
        .unwrap();
    store.put("extras/notes.md", b"# Notes".to_vec()).unwrap();

    let reloaded = ArchiveStore::from_bytes(store.serialize().unwrap())
        .await
        .unwrap();
    assert_eq!(
        reloaded.get("tome.json").unwrap(),
        br#"{"type":"comic_volume","title":"Renamed"}"#
    );
    assert_eq!(reloaded.stored_bytes("ch2/a.jpg").unwrap(), original_page);

    let header = reloaded.header("ch2/a.jpg").unwrap();
    assert_eq!(header.crc32, original_header.crc32);
    assert_eq!(header.last_mod_date, original_header.last_mod_date);
    assert_eq!(header.last_mod_time, original_header.last_mod_time);

    // load order first, new entries appended
    let order: Vec<_> = reloaded
        .archive_order()
        .into_iter()
        .map(CanonicalPath::as_str)
        .collect();
    assert_eq!(order.first(), Some(&"tome.json"));
    assert_eq!(order.last(), Some(&"extras/notes.md"));
}

#[tokio::test]
async fn test_directory_records_are_dropped() {
    let bytes = build_zip_from(&[
        FixtureEntry::stored("tome.json", br#"{"type":"comic_chapter"}"#),
        FixtureEntry::directory("pages"),
        FixtureEntry::stored("pages/a.jpg", b"a"),
    ]);
    let store = ArchiveStore::from_bytes(bytes).await.unwrap();
    let paths: Vec<_> = store.list().iter().map(|p| p.to_string()).collect();
    assert_eq!(paths, vec!["pages/a.jpg", "tome.json"]);
    assert!(store.is_dir(&CanonicalPath::normalize("pages").unwrap()));
}

#[tokio::test]
async fn test_corrupt_inputs() {
    let cases = vec![
        (
            "bad crc",
            build_zip_from(&[FixtureEntry::stored("a.txt", b"abc").with_crc(1)]),
        ),
        (
            "encrypted",
            build_zip_from(&[FixtureEntry::stored("a.txt", b"abc").with_flags(0x0001)]),
        ),
        (
            "bzip2",
            build_zip_from(&[FixtureEntry::stored("a.txt", b"abc").with_method(12)]),
        ),
        (
            "escaping name",
            build_zip(&[("../evil.txt", b"x")]),
        ),
        ("not a zip", b"tome.json is not here".to_vec()),
        (
            "zip64 size overflow",
            build_zip_from(&[FixtureEntry::stored("big.txt", &deflate(b"abc"))
                .with_method(8)
                .with_zip64_uncompressed(u64::MAX)]),
        ),
        (
            "zip64 offset overflow",
            build_zip_from(&[FixtureEntry::stored("a.txt", b"abc").with_zip64_offset(u64::MAX)]),
        ),
        (
            "bad utf-8 name",
            build_zip_from(&[FixtureEntry::raw_named(b"\xFF.txt", b"x").with_flags(0x0800)]),
        ),
        (
            "colliding names",
            build_zip(&[("pages/a.jpg", b"1"), ("pages/./a.jpg", b"2")]),
        ),
    ];

    for (label, bytes) in cases {
        let result = ArchiveStore::from_bytes(bytes).await;
        assert!(
            matches!(result, Err(Error::CorruptArchive(_))),
            "{label}: expected CorruptArchive, got {result:?}"
        );
    }
}

#[tokio::test]
async fn test_legacy_names_round_trip_exactly() {
    // CP437 names without the UTF-8 flag
    let bytes = build_zip_from(&[
        FixtureEntry::stored("tome.json", br#"{"type":"comic_chapter"}"#),
        FixtureEntry::raw_named(b"pages/\x82.jpg", b"e"),
        FixtureEntry::raw_named(b"pages/\x81.jpg", b"u"),
    ]);
    let mut store = ArchiveStore::from_bytes(bytes.clone()).await.unwrap();
    assert_eq!(store.len(), 3);
    assert_eq!(store.get("pages/\u{e9}.jpg").unwrap(), b"e");
    assert_eq!(store.get("pages/\u{fc}.jpg").unwrap(), b"u");
    assert_eq!(store.serialize().unwrap(), bytes);

    store.rename("pages/\u{e9}.jpg", "pages/\u{e8}.jpg").unwrap();
    let reloaded = ArchiveStore::from_bytes(store.serialize().unwrap())
        .await
        .unwrap();
    assert_eq!(reloaded.get("pages/\u{e8}.jpg").unwrap(), b"e");
    assert_eq!(
        reloaded.stored_bytes("pages/\u{fc}.jpg").unwrap(),
        store.stored_bytes("pages/\u{fc}.jpg").unwrap()
    );
}

#[tokio::test]
async fn test_open_path_applies_limits() {
    let dir = tempfile::tempdir().unwrap();
    let tome = dir.path().join("vol1.tome");
    let zip = dir.path().join("vol1.zip");
    std::fs::write(&tome, comic_volume()).unwrap();
    std::fs::write(&zip, comic_volume()).unwrap();

    let limits = LoadLimits::default();
    assert!(ArchiveStore::open_path(&tome, &limits).await.is_ok());
    assert!(matches!(
        ArchiveStore::open_path(&zip, &limits).await,
        Err(Error::InvalidFileType { .. })
    ));
    assert!(
        ArchiveStore::open_path(&zip, &limits.clone().with_tome_extension(false))
            .await
            .is_ok()
    );
    assert!(matches!(
        ArchiveStore::open_path(&tome, &limits.with_max_archive_size(16)).await,
        Err(Error::FileTooLarge { .. })
    ));
}

#[tokio::test]
async fn test_write_to_and_reload() {
    let dir = tempfile::tempdir().unwrap();
    let out = dir.path().join("copy.tome");

    let mut store = ArchiveStore::from_bytes(comic_volume()).await.unwrap();
    store.remove("ch2/b.jpg").unwrap();
    store.rename("ch2/a.jpg", "ch2/cover.jpg").unwrap();
    store.write_to(&out).await.unwrap();

    let reloaded = ArchiveStore::open_path(&out, &LoadLimits::default())
        .await
        .unwrap();
    assert!(!reloaded.contains("ch2/b.jpg"));
    assert!(!reloaded.contains("ch2/a.jpg"));
    assert_eq!(reloaded.get("ch2/cover.jpg").unwrap(), b"\xFF\xD8a");
}
