use geodb_core::{
    ChannelFilter, ChannelPatch, CoordinateAxis, Database, DatabaseOptions, DeleteMode,
    ElementType, GdbError, LineCategory, LinePatch, LineType, MemoryStore, NewChannel, SymbolKind,
};

#[test]
fn new_line_is_strict_about_existing_names() {
    let db = Database::in_memory().unwrap();

    let symbol = db.new_line("L100", LineCategory::Flight, "").unwrap();
    let err = db.new_line("l100", LineCategory::Normal, "").unwrap_err();

    assert!(matches!(
        err,
        GdbError::AlreadyExists {
            kind: SymbolKind::Line,
            ..
        }
    ));
    assert_eq!(db.resolve_line("L100", false).unwrap().1, symbol);
}

#[test]
fn flight_lines_need_a_type_letter_and_number() {
    let db = Database::in_memory().unwrap();

    let err = db.new_line("north", LineCategory::Flight, "").unwrap_err();
    assert_eq!(err.code(), "invalid_name");

    db.new_line("T20.3", LineCategory::Flight, "").unwrap();
    let details = db.line_details("T20.3").unwrap();
    assert_eq!(details.record.line_type, LineType::Tie);
    assert_eq!(details.record.number, 20);
    assert_eq!(details.record.version, 3);
}

#[test]
fn group_name_forces_group_category() {
    let db = Database::in_memory().unwrap();

    db.new_line("grid_a", LineCategory::Normal, "gridding").unwrap();
    let record = db.line_details("grid_a").unwrap().record;

    assert_eq!(record.category, LineCategory::Group);
    assert_eq!(record.group_class.as_deref(), Some("gridding"));
}

#[test]
fn line_details_patch_with_group_class_moves_line_to_group() {
    let db = Database::in_memory().unwrap();
    db.new_line("L10", LineCategory::Flight, "").unwrap();

    db.line_set_details(
        "L10",
        &LinePatch {
            flight: Some(7),
            date: Some(2024.5),
            ..LinePatch::default()
        },
    )
    .unwrap();
    let record = db.line_details("L10").unwrap().record;
    assert_eq!(record.flight, 7);
    assert_eq!(record.date, 2024.5);
    assert_eq!(record.category, LineCategory::Flight);

    db.line_set_details(
        "L10",
        &LinePatch {
            group_class: Some("mag".to_string()),
            ..LinePatch::default()
        },
    )
    .unwrap();
    assert_eq!(
        db.line_details("L10").unwrap().record.category,
        LineCategory::Group
    );
}

#[test]
fn clearing_the_group_class_restores_the_line_category() {
    let db = Database::in_memory().unwrap();
    db.new_line("L10", LineCategory::Flight, "mag").unwrap();
    db.new_line("grid_a", LineCategory::Normal, "gridding").unwrap();
    let clear = LinePatch {
        group_class: Some(String::new()),
        ..LinePatch::default()
    };

    db.line_set_details("L10", &clear).unwrap();
    db.line_set_details("grid_a", &clear).unwrap();

    let flight = db.line_details("L10").unwrap().record;
    assert_eq!(flight.category, LineCategory::Flight);
    assert_eq!(flight.group_class, None);
    let plain = db.line_details("grid_a").unwrap().record;
    assert_eq!(plain.category, LineCategory::Normal);
    assert_eq!(plain.group_class, None);
}

#[test]
fn channel_names_are_validated() {
    let db = Database::in_memory().unwrap();

    let err = db
        .new_channel("1bad", &NewChannel::of(ElementType::Double))
        .unwrap_err();
    assert!(matches!(
        err,
        GdbError::InvalidName {
            kind: SymbolKind::Channel,
            ..
        }
    ));
}

#[test]
fn new_channel_reuses_matching_channels_and_applies_details() {
    let db = Database::in_memory().unwrap();

    let first = db
        .new_channel("MAG", &NewChannel::of(ElementType::Double))
        .unwrap();
    let second = db
        .new_channel(
            "mag",
            &NewChannel::of(ElementType::Float).with_details(ChannelPatch {
                unit: Some("nT".to_string()),
                ..ChannelPatch::default()
            }),
        )
        .unwrap();

    assert_eq!(first, second);
    let record = db.chan_details("MAG").unwrap().record;
    assert_eq!(record.unit, "nT");
    assert_eq!(record.element_type, ElementType::Double);
}

#[test]
fn new_channel_rejects_a_different_array_width() {
    let db = Database::in_memory().unwrap();
    db.new_channel("ARR", &NewChannel::array(ElementType::Double, 3))
        .unwrap();

    let err = db
        .new_channel("ARR", &NewChannel::array(ElementType::Double, 4))
        .unwrap_err();
    assert_eq!(err.code(), "already_exists");

    let err = db
        .new_channel("ZERO", &NewChannel::array(ElementType::Double, 0))
        .unwrap_err();
    assert_eq!(err.code(), "invalid_argument");
}

#[test]
fn channel_listing_filters_by_array_width() {
    let db = Database::in_memory().unwrap();
    db.new_channel("X", &NewChannel::of(ElementType::Double))
        .unwrap();
    db.new_channel("ARR", &NewChannel::array(ElementType::Double, 3))
        .unwrap();

    let all = db.channels(ChannelFilter::All).unwrap();
    let normal = db.channels(ChannelFilter::Normal).unwrap();
    let array = db.channels(ChannelFilter::Array).unwrap();

    assert_eq!(all.len(), 2);
    assert!(normal.contains_key("X"));
    assert!(!normal.contains_key("ARR"));
    assert!(array.contains_key("ARR"));
    assert!(db.channels(ChannelFilter::Displayed).unwrap().is_empty());
    assert_eq!(db.chan_array("ARR").unwrap(), 3);
    assert_eq!(db.chan_array("X").unwrap(), 1);
}

#[test]
fn column_names_resolve_to_their_array_channel() {
    let db = Database::in_memory().unwrap();
    let symbol = db
        .new_channel("ARR", &NewChannel::array(ElementType::Double, 3))
        .unwrap();

    let (name, resolved) = db.resolve_channel("arr[2]").unwrap();
    assert_eq!(name, "ARR[2]");
    assert_eq!(resolved, symbol);

    let err = db.resolve_channel("ARR[3]").unwrap_err();
    assert_eq!(err.code(), "not_found");
}

#[test]
fn protected_channels_reject_changes_until_unprotected() {
    let db = Database::in_memory().unwrap();
    db.new_channel("GPS", &NewChannel::of(ElementType::Double))
        .unwrap();
    db.chan_set_details(
        "GPS",
        &ChannelPatch {
            protect: Some(true),
            ..ChannelPatch::default()
        },
    )
    .unwrap();

    let err = db
        .chan_set_details(
            "GPS",
            &ChannelPatch {
                label: Some("gps".to_string()),
                ..ChannelPatch::default()
            },
        )
        .unwrap_err();
    assert!(matches!(err, GdbError::ChannelProtected { .. }));

    db.chan_set_details(
        "GPS",
        &ChannelPatch {
            protect: Some(false),
            label: Some("gps".to_string()),
            ..ChannelPatch::default()
        },
    )
    .unwrap();
    let record = db.chan_details("GPS").unwrap().record;
    assert!(!record.protect);
    assert_eq!(record.label, "gps");
}

#[test]
fn deletion_modes_differ_on_unknown_names() {
    let db = Database::in_memory().unwrap();
    db.new_channel("A", &NewChannel::of(ElementType::Double))
        .unwrap();
    db.new_channel("B", &NewChannel::of(ElementType::Double))
        .unwrap();
    db.new_line("L1", LineCategory::Normal, "").unwrap();

    let err = db
        .delete_channels(["A", "missing"], DeleteMode::Strict)
        .unwrap_err();
    assert_eq!(err.code(), "not_found");

    let deleted = db
        .delete_channels(["B", "missing"], DeleteMode::BestEffort)
        .unwrap();
    assert_eq!(deleted, 1);
    assert!(db.resolve_channel("B").is_err());

    assert!(!db.delete_line("nope", DeleteMode::BestEffort).unwrap());
    assert!(db.delete_line("L1", DeleteMode::Strict).unwrap());
    assert!(db.lines(false).unwrap().is_empty());
    assert_eq!(db.lock_manager().locked_count(), 0);
}

#[test]
fn select_lines_applies_selectors_left_to_right() {
    let db = Database::in_memory().unwrap();
    for name in ["L100", "L200", "L300", "T10"] {
        db.new_line(name, LineCategory::Flight, "").unwrap();
    }
    db.new_line("extra", LineCategory::Normal, "").unwrap();
    db.line_set_details(
        "T10",
        &LinePatch {
            flight: Some(4),
            ..LinePatch::default()
        },
    )
    .unwrap();

    assert_eq!(db.select_lines("", false).unwrap(), 5);
    assert!(db.lines(true).unwrap().is_empty());

    assert_eq!(db.select_lines("L150:300", true).unwrap(), 2);
    let selected = db.lines(true).unwrap();
    assert!(selected.contains_key("L200"));
    assert!(selected.contains_key("L300"));

    assert_eq!(db.select_lines("F4,extra", true).unwrap(), 2);
    assert_eq!(db.lines(true).unwrap().len(), 4);

    assert_eq!(db.select_lines("L", false).unwrap(), 2);
    assert_eq!(db.lines(true).unwrap().len(), 2);
}

#[test]
fn unknown_selector_changes_nothing() {
    let db = Database::in_memory().unwrap();
    db.new_line("L1", LineCategory::Flight, "").unwrap();

    let err = db.select_lines("L,nowhere", false).unwrap_err();

    assert_eq!(err.code(), "invalid_argument");
    assert_eq!(db.lines(true).unwrap().len(), 1);
}

#[test]
fn capacity_limits_new_symbols() {
    let options = DatabaseOptions::with_capacity(1, 1);
    let db = Database::with_store(MemoryStore::new(), &options).unwrap();

    for index in 0..10 {
        db.new_line(&format!("L{index}"), LineCategory::Flight, "")
            .unwrap();
    }
    let err = db.new_line("L10", LineCategory::Flight, "").unwrap_err();
    assert!(matches!(
        err,
        GdbError::CapacityExceeded {
            kind: SymbolKind::Line,
            limit: 10
        }
    ));
}

#[test]
fn xyz_designation_requires_the_channel_to_exist() {
    let db = Database::in_memory().unwrap();
    assert_eq!(db.xyz_channel(CoordinateAxis::X).unwrap(), None);

    db.new_channel("x", &NewChannel::of(ElementType::Double))
        .unwrap();
    db.new_channel("Easting", &NewChannel::of(ElementType::Double))
        .unwrap();
    assert_eq!(
        db.xyz_channel(CoordinateAxis::X).unwrap().as_deref(),
        Some("x")
    );

    db.set_xyz_channel(CoordinateAxis::X, "easting").unwrap();
    assert_eq!(
        db.xyz_channel(CoordinateAxis::X).unwrap().as_deref(),
        Some("Easting")
    );
    assert!(db.set_xyz_channel(CoordinateAxis::Y, "Northing").is_err());
}

#[test]
fn details_serialize_with_flattened_records() {
    let db = Database::in_memory().unwrap();
    let symbol = db.new_line("B3", LineCategory::Flight, "").unwrap();

    let value = serde_json::to_value(db.line_details("B3").unwrap()).unwrap();

    assert_eq!(value["symbol"], serde_json::json!(symbol.raw()));
    assert_eq!(value["name"], "B3");
    assert_eq!(value["selected"], true);
}
