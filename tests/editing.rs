//! Edit sessions over loaded archives.

mod common;

use chrono::NaiveDate;
use common::comic_volume;
use tomekit::{ArchiveStore, EditSession, Error, ManifestCascade, TemplateCatalog};

async fn session() -> EditSession {
    EditSession::new(ArchiveStore::from_bytes(comic_volume()).await.unwrap())
}

#[tokio::test]
async fn test_broken_manifest_blocks_serialize_until_discarded() {
    let mut session = session().await;
    let original = session.serialize().unwrap();

    session.open("tome.json").unwrap();
    let file = session.update("tome.json", "{\"type\": ").unwrap();
    assert!(file.is_dirty());
    assert!(!file.is_valid());

    let err = session.serialize().unwrap_err();
    assert!(matches!(&err, Error::InvalidEditState { paths } if paths == &["tome.json"]));
    assert!(matches!(
        session.commit("tome.json"),
        Err(Error::InvalidEditState { .. })
    ));

    session.discard("tome.json").unwrap();
    assert!(!session.has_unsaved_changes());
    assert_eq!(session.serialize().unwrap(), original);
}

#[tokio::test]
async fn test_committed_edit_reaches_the_graph() {
    let mut session = session().await;
    session.open("chapters.json").unwrap();
    session
        .update(
            "chapters.json",
            r#"[{"path":"ch1/pages.json","chapter_number":1},{"path":"ch2","chapter_number":2}]"#,
        )
        .unwrap();

    // uncommitted: graph still shows the stored order
    let leaves: Vec<String> = session
        .graph()
        .unwrap()
        .leaves()
        .iter()
        .map(|n| n.path.to_string())
        .collect();
    assert_eq!(leaves[0], "ch2/a.jpg");

    session.commit("chapters.json").unwrap();
    let graph = session.graph().unwrap();
    let leaves: Vec<_> = graph.leaves().iter().map(|n| n.path.as_str()).collect();
    assert_eq!(
        leaves,
        vec!["ch1/p1.jpg", "ch1/p2.jpg", "ch2/a.jpg", "ch2/b.jpg"]
    );

    let reloaded = ArchiveStore::from_bytes(session.serialize().unwrap())
        .await
        .unwrap();
    assert_eq!(
        reloaded.get("chapters.json").unwrap(),
        session.store().get("chapters.json").unwrap()
    );
}

#[tokio::test]
async fn test_commit_all_leaves_invalid_files_open() {
    let mut session = session().await;
    session.open("tome.json").unwrap();
    session.open("ch1/pages.json").unwrap();
    session
        .update("tome.json", r#"{"type":"comic_volume","chapters_file":"/chapters.json","title":"New"}"#)
        .unwrap();
    session.update("ch1/pages.json", "[{]").unwrap();

    let report = session.commit_all().unwrap();
    assert_eq!(report.committed.len(), 1);
    assert_eq!(report.invalid.len(), 1);
    assert_eq!(report.invalid[0].as_str(), "ch1/pages.json");
    assert!(session.serialize().is_err());

    session.close("ch1/pages.json").unwrap();
    let store = ArchiveStore::from_bytes(session.serialize().unwrap())
        .await
        .unwrap();
    let graph = ManifestCascade::build(&store).unwrap();
    assert_eq!(graph.manifest.title(), Some("New"));
}

#[tokio::test]
async fn test_new_tome_from_builtin_template() {
    let catalog = TemplateCatalog::builtin();
    let today = NaiveDate::from_ymd_opt(2026, 10, 16).unwrap();
    let mut session = EditSession::create(catalog.default_template(), today).unwrap();

    session.add_file("pages/001.png", vec![0x89u8, b'P', b'N', b'G']).unwrap();
    let bytes = session.serialize().unwrap();

    let store = ArchiveStore::from_bytes(bytes).await.unwrap();
    let manifest = String::from_utf8(store.get("tome.json").unwrap().to_vec()).unwrap();
    assert!(manifest.contains("\"created\": \"2026-10-16\""));

    let graph = ManifestCascade::build(&store).unwrap();
    let leaves: Vec<_> = graph.leaves().iter().map(|n| n.path.as_str()).collect();
    assert_eq!(leaves, vec!["pages/001.png"]);
}
