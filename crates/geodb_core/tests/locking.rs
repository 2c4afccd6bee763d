use geodb_core::{
    Database, DatabaseOptions, ElementType, Fiducial, GdbError, LockMode, LockWait, MemoryStore,
    NewChannel, ReadOptions,
};
use ndarray::Array1;
use std::thread;
use std::time::Duration;

fn database_with_wait(wait: LockWait) -> Database<MemoryStore> {
    let options = DatabaseOptions::default().with_lock_wait(wait);
    let db = Database::with_store(MemoryStore::new(), &options).unwrap();
    let values = Array1::from(vec![1.0, 2.0, 3.0]);
    db.write_data_line("L1", values.view().into_dyn(), "X", Fiducial::INDEX)
        .unwrap();
    db
}

#[test]
fn operations_leave_no_locks_behind() {
    let db = database_with_wait(LockWait::Infinite);

    db.read_line::<f64>("L1", &ReadOptions::default()).unwrap();
    db.chan_details("X").unwrap();
    let _ = db.read_line::<f64>("L1", &ReadOptions::channels(["missing"]));

    assert_eq!(db.lock_manager().locked_count(), 0);
}

#[test]
fn shared_handle_times_out_behind_a_writer() {
    let db = database_with_wait(LockWait::Timeout(Duration::from_millis(50)));
    let other = db.share();
    let (_, channel) = db.resolve_channel("X").unwrap();

    let manager = db.lock_manager();
    let writer = manager.register_holder();
    let guard = manager
        .acquire(writer, channel, LockMode::Write, LockWait::Infinite)
        .unwrap();

    let err = other
        .read_line::<f64>("L1", &ReadOptions::default())
        .unwrap_err();
    assert!(matches!(err, GdbError::LockFailure { .. }));
    assert_eq!(manager.mode_of(channel), Some(LockMode::Write));

    drop(guard);
    assert_eq!(manager.locked_count(), 0);
    other.read_line::<f64>("L1", &ReadOptions::default()).unwrap();
}

#[test]
fn readers_wait_until_the_writer_releases() {
    let db = database_with_wait(LockWait::Infinite);
    let reader = db.share();
    let (_, channel) = db.resolve_channel("X").unwrap();
    let manager = db.lock_manager();
    let writer = manager.register_holder();
    let guard = manager
        .acquire(writer, channel, LockMode::Write, LockWait::Infinite)
        .unwrap();

    thread::scope(|scope| {
        let handle = scope.spawn(move || {
            reader
                .read_line::<f64>("L1", &ReadOptions::default())
                .map(|line| line.rows())
        });
        thread::sleep(Duration::from_millis(30));
        assert!(!handle.is_finished());

        drop(guard);
        assert_eq!(handle.join().unwrap().unwrap(), 3);
    });
    assert_eq!(manager.locked_count(), 0);
}

#[test]
fn shared_handles_see_the_same_catalog() {
    let db = Database::in_memory().unwrap();
    let other = db.share();

    other
        .new_channel("MAG", &NewChannel::of(ElementType::Float))
        .unwrap();

    assert_eq!(db.chan_element_type("MAG").unwrap(), ElementType::Float);
    assert_eq!(db.instance_id(), other.instance_id());
}

