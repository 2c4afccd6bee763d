use geodb_core::{
    ChannelFilter, Database, DatabaseOptions, ElementType, Fiducial, LineCategory, NewChannel,
    ReadOptions,
};
use ndarray::array;
use std::path::PathBuf;

fn database_path(dir: &tempfile::TempDir) -> PathBuf {
    dir.path().join("survey")
}

#[test]
fn create_adds_the_database_extension() {
    let dir = tempfile::tempdir().unwrap();

    let db = Database::create(database_path(&dir), &DatabaseOptions::default()).unwrap();

    let file = db.file_name().unwrap();
    assert_eq!(file, dir.path().join("survey.gdb"));
    assert!(file.exists());
}

#[test]
fn committed_changes_survive_reopening() {
    let dir = tempfile::tempdir().unwrap();
    let data = array![[1.0, 10.0], [2.0, 20.0], [3.0, 30.0]];
    let fid = Fiducial::new(100.0, 0.25).unwrap();

    let instance_id = {
        let db = Database::create(database_path(&dir), &DatabaseOptions::default()).unwrap();
        db.write_data_line("L100", data.view().into_dyn(), ["X", "Y"], fid)
            .unwrap();
        db.new_channel("ARR", &NewChannel::array(ElementType::Float, 4))
            .unwrap();
        db.commit().unwrap();
        db.instance_id()
    };

    let db = Database::open(dir.path().join("survey.gdb"), &DatabaseOptions::default()).unwrap();
    assert_eq!(db.instance_id(), instance_id);
    assert_eq!(db.chan_array("ARR").unwrap(), 4);
    assert_eq!(db.channels(ChannelFilter::Array).unwrap().len(), 1);

    let line = db
        .read_line::<f64>("L100", &ReadOptions::channels(["X", "Y"]))
        .unwrap();
    assert_eq!(line.data, data);
    assert_eq!(line.fiducial, fid);
}

#[test]
fn uncommitted_changes_are_lost_on_drop() {
    let dir = tempfile::tempdir().unwrap();
    {
        let db = Database::create(database_path(&dir), &DatabaseOptions::default()).unwrap();
        db.new_line("L1", LineCategory::Flight, "").unwrap();
    }

    let db = Database::open(dir.path().join("survey.gdb"), &DatabaseOptions::default()).unwrap();
    assert!(db.lines(false).unwrap().is_empty());
}

#[test]
fn discard_rolls_back_to_the_last_commit() {
    let dir = tempfile::tempdir().unwrap();
    let db = Database::create(database_path(&dir), &DatabaseOptions::default()).unwrap();
    let kept = db.new_line("L1", LineCategory::Flight, "").unwrap();
    db.commit().unwrap();

    let dropped = db.new_line("L2", LineCategory::Flight, "").unwrap();
    db.discard().unwrap();
    let replacement = db.new_line("L3", LineCategory::Flight, "").unwrap();

    let lines = db.lines(false).unwrap();
    assert_eq!(lines.len(), 2);
    assert_eq!(lines.get("L1"), Some(&kept));
    assert!(!lines.contains_key("L2"));
    assert!(replacement.raw() > dropped.raw());
}

#[test]
fn stored_capacities_override_open_options() {
    let dir = tempfile::tempdir().unwrap();
    drop(
        Database::create(
            database_path(&dir),
            &DatabaseOptions::with_capacity(40, 60),
        )
        .unwrap(),
    );

    let db = Database::open(
        dir.path().join("survey.gdb"),
        &DatabaseOptions::with_capacity(1000, 1000),
    )
    .unwrap();

    assert_eq!(db.options().max_lines, 40);
    assert_eq!(db.options().max_channels, 60);
}

#[test]
fn create_refuses_existing_files_and_open_missing_ones() {
    let dir = tempfile::tempdir().unwrap();
    drop(Database::create(database_path(&dir), &DatabaseOptions::default()).unwrap());

    let err = Database::create(database_path(&dir), &DatabaseOptions::default())
        .err()
        .unwrap();
    assert_eq!(err.code(), "store_error");

    let err = Database::open(dir.path().join("other.gdb"), &DatabaseOptions::default())
        .err()
        .unwrap();
    assert_eq!(err.code(), "store_error");
}
