use geodb_core::{
    Database, Fiducial, LineCategory, MemoryStore, NoopObserver, ScanObserver, ValueScan,
};
use ndarray::Array1;

#[derive(Default)]
struct Recorder {
    messages: Vec<(String, f64)>,
    stop_after: Option<usize>,
}

impl ScanObserver for Recorder {
    fn progress(&mut self, message: &str, percent: f64) {
        self.messages.push((message.to_string(), percent));
    }

    fn should_stop(&mut self) -> bool {
        self.stop_after
            .map_or(false, |limit| self.messages.len() >= limit)
    }
}

fn write_values(db: &Database<MemoryStore>, line: &str, values: &[f64]) {
    let data = Array1::from(values.to_vec());
    db.write_data_line(line, data.view().into_dyn(), "CODE", Fiducial::INDEX)
        .unwrap();
}

fn stalling_database() -> Database<MemoryStore> {
    let db = Database::in_memory().unwrap();
    write_values(&db, "L1", &[1.0]);
    write_values(&db, "L2", &[1.0, 2.0]);
    write_values(&db, "L3", &[2.0, 1.0]);
    write_values(&db, "L4", &[3.0]);
    write_values(&db, "L5", &[3.0, 2.0]);
    db
}

#[test]
fn values_are_distinct_and_rendered_with_channel_format() {
    let db = Database::in_memory().unwrap();
    write_values(&db, "L1", &[2.0, 1.0, 2.0]);
    write_values(&db, "L2", &[3.0, 1.0]);

    let values = db
        .list_values("CODE", &ValueScan::default(), &mut NoopObserver)
        .unwrap();

    assert_eq!(values, vec!["1.00", "2.00", "3.00"]);
}

#[test]
fn dummies_are_never_values() {
    let db = Database::in_memory().unwrap();
    write_values(
        &db,
        "L1",
        &[geodb_core::model::element::DOUBLE_DUMMY, 4.0],
    );

    let values = db
        .list_values("CODE", &ValueScan::default(), &mut NoopObserver)
        .unwrap();

    assert_eq!(values, vec!["4.00"]);
}

#[test]
fn result_is_truncated_to_max() {
    let db = Database::in_memory().unwrap();
    write_values(&db, "L1", &[5.0, 4.0, 3.0, 2.0, 1.0]);
    let scan = ValueScan {
        max: 2,
        ..ValueScan::default()
    };

    let values = db.list_values("CODE", &scan, &mut NoopObserver).unwrap();

    assert_eq!(values, vec!["1.00", "2.00"]);
}

#[test]
fn scan_ends_after_too_many_stalled_lines() {
    let db = stalling_database();
    let scan = ValueScan {
        max_stalled_lines: 0,
        ..ValueScan::default()
    };
    let mut all = Recorder::default();
    let values = db.list_values("CODE", &scan, &mut all).unwrap();
    assert_eq!(values, vec!["1.00", "2.00", "3.00"]);
    assert_eq!(all.messages.len(), 5);

    let scan = ValueScan {
        max_stalled_lines: 1,
        ..ValueScan::default()
    };
    let mut recorder = Recorder::default();
    let values = db.list_values("CODE", &scan, &mut recorder).unwrap();
    assert_eq!(values, vec!["1.00", "2.00", "3.00"]);
    assert_eq!(recorder.messages.len(), 5);
}

#[test]
fn consecutive_stalls_stop_the_scan() {
    let db = Database::in_memory().unwrap();
    write_values(&db, "L1", &[1.0]);
    write_values(&db, "L2", &[1.0]);
    write_values(&db, "L3", &[1.0]);
    write_values(&db, "L4", &[9.0]);
    let scan = ValueScan {
        max_stalled_lines: 1,
        ..ValueScan::default()
    };
    let mut recorder = Recorder::default();

    let values = db.list_values("CODE", &scan, &mut recorder).unwrap();

    assert_eq!(values, vec!["1.00"]);
    assert_eq!(recorder.messages.len(), 2);
}

#[test]
fn progress_reports_each_line_in_name_order() {
    let db = stalling_database();
    let mut recorder = Recorder::default();

    db.list_values("CODE", &ValueScan::default(), &mut recorder)
        .unwrap();

    let (first, percent) = &recorder.messages[0];
    assert_eq!(first, "Scanning unique values in \"CODE\", L1");
    assert_eq!(*percent, 20.0);
    let (last, percent) = recorder.messages.last().unwrap();
    assert!(last.ends_with(", L5"));
    assert_eq!(*percent, 100.0);
}

#[test]
fn stopping_returns_the_values_gathered_so_far() {
    let db = stalling_database();
    let mut recorder = Recorder {
        stop_after: Some(2),
        ..Recorder::default()
    };
    let values = db
        .list_values("CODE", &ValueScan::default(), &mut recorder)
        .unwrap();
    assert_eq!(recorder.messages.len(), 2);
    assert_eq!(values, vec!["1.00", "2.00"]);
}

#[test]
fn unselected_lines_are_skipped_unless_requested() {
    let db = stalling_database();
    db.new_line("L9", LineCategory::Flight, "").unwrap();
    db.select_lines("L4:5", false).unwrap();

    let selected = db
        .list_values("CODE", &ValueScan::default(), &mut NoopObserver)
        .unwrap();
    assert_eq!(selected, vec!["1.00", "2.00"]);

    let scan = ValueScan {
        selected_only: false,
        ..ValueScan::default()
    };
    let everything = db.list_values("CODE", &scan, &mut NoopObserver).unwrap();
    assert_eq!(everything, vec!["1.00", "2.00", "3.00"]);
}
