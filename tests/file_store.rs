use pretty_assertions::assert_eq;
use tackle::{
    CatalogData, CatalogStore, Creature, EntityKind, FileFormat, FileStore, LineEnding, Lure,
    StoreError, statics,
};

type Result<T> = std::result::Result<T, Box<dyn std::error::Error>>;

#[test]
fn hand_edited_json5_loads() -> Result<()> {
    let dir = tempfile::tempdir()?;
    std::fs::write(
        dir.path().join("creatures.json5"),
        "// edited by hand\n[\n  { id: 1, name: 'Pike', bait_ids: [2, 3], },\n  { id: 2, name: \"Carp\" },\n]\n",
    )?;

    let store = FileStore::new(dir.path(), FileFormat::Json5);
    let creatures = store.load_records::<Creature>()?.expect("has data");

    assert_eq!(creatures.len(), 2);
    assert_eq!(creatures[0].name, "Pike");
    assert_eq!(creatures[0].bait_ids, vec![2, 3]);
    assert_eq!(creatures[1].notes, "");
    Ok(())
}

#[test]
fn missing_and_blank_files_have_no_data() -> Result<()> {
    let dir = tempfile::tempdir()?;
    std::fs::write(dir.path().join("lures.json5"), "  \n")?;

    let store = FileStore::new(dir.path(), FileFormat::Json5);
    assert!(store.load_collection(EntityKind::Creature)?.is_none());
    assert!(store.load_collection(EntityKind::Lure)?.is_none());
    Ok(())
}

#[test]
fn malformed_file_names_the_kind_and_path() -> Result<()> {
    let dir = tempfile::tempdir()?;
    let path = dir.path().join("baits.json5");
    std::fs::write(&path, "[ { id: 1, name: ")?;

    let store = FileStore::new(dir.path(), FileFormat::Json5);
    match store.load_collection(EntityKind::Bait) {
        Err(StoreError::Malformed { kind, path: p, .. }) => {
            assert_eq!(kind, EntityKind::Bait);
            assert_eq!(p, path);
        }
        other => panic!("expected malformed error, got {other:?}"),
    }
    Ok(())
}

#[test]
fn crlf_files_are_written_back_with_crlf() -> Result<()> {
    let dir = tempfile::tempdir()?;
    let path = dir.path().join("lures.json5");
    std::fs::write(&path, "[\r\n  { id: 10, name: 'Spinner' },\r\n]\r\n")?;

    let store = FileStore::new(dir.path(), FileFormat::Json5);
    let mut lures = store.load_records::<Lure>()?.expect("has data");
    assert_eq!(store.line_ending(EntityKind::Lure), LineEnding::CrLf);

    lures[0].name = "Silver spinner".to_string();
    store.save_collection(&CatalogData::Lures(lures))?;

    let text = std::fs::read_to_string(&path)?;
    assert!(text.contains(statics::NL_CRLF));
    assert!(!text.replace(statics::NL_CRLF, "").contains('\n'));
    assert!(text.contains("Silver spinner"));
    Ok(())
}

#[test]
fn transient_marker_is_not_written() -> Result<()> {
    let dir = tempfile::tempdir()?;
    let store = FileStore::new(dir.path(), FileFormat::Json5);
    let lure = Lure {
        id: 10,
        name: "Spinner".to_string(),
        applicable: true,
        ..Default::default()
    };
    store.save_records(&[lure])?;

    let text = std::fs::read_to_string(store.path_for(EntityKind::Lure))?;
    assert!(!text.contains("applicable"));
    Ok(())
}

#[test]
fn gzip_store_round_trips_and_falls_back_to_plain_files() -> Result<()> {
    let dir = tempfile::tempdir()?;
    std::fs::write(dir.path().join("creatures.json5"), "[{ id: 7, name: 'Tench' }]")?;

    let store = FileStore::new(dir.path(), FileFormat::GzipJson5);
    // Plain file is still found when no compressed one exists.
    let mut creatures = store.load_records::<Creature>()?.expect("has data");
    assert_eq!(creatures[0].name, "Tench");

    creatures[0].bite_activity = vec![0; statics::HOURS_PER_DAY];
    store.save_records(&creatures)?;

    let gz_path = store.path_for(EntityKind::Creature);
    assert!(gz_path.to_string_lossy().ends_with(".json5.gz"));
    let bytes = std::fs::read(&gz_path)?;
    assert_eq!(&bytes[..2], &[0x1f, 0x8b]);

    let reloaded = FileStore::new(dir.path(), FileFormat::GzipJson5)
        .load_records::<Creature>()?
        .expect("has data");
    assert_eq!(reloaded, creatures);
    Ok(())
}
