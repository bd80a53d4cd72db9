use lh_core::provenance::{RunProvenance, SchemaVersion};
use lh_core::{LhError, Slot, TransferRow, Volume, WellId, Worklist};

#[test]
fn well_ids_parse_and_display() {
    let well: WellId = "h12".parse().expect("well");
    assert_eq!(well.row(), 7);
    assert_eq!(well.column(), 12);
    assert_eq!(well.to_string(), "H12");

    let wide: WellId = "AB3".parse().expect("two letter row");
    assert_eq!(wide.row(), 27);
    assert_eq!(wide.to_string(), "AB3");
}

#[test]
fn malformed_well_ids_are_parse_errors() {
    for raw in ["", "12", "A", "A0", "1A", "A1B", "ABC1"] {
        let err = raw.parse::<WellId>().expect_err(raw);
        assert!(matches!(err, LhError::Parse(_)), "{raw}: {err}");
    }
}

#[test]
fn volumes_must_be_positive() {
    assert!(Volume::new(0.5).is_ok());
    for raw in [0.0, -1.0, f64::NAN, f64::INFINITY] {
        let err = Volume::new(raw).expect_err("invalid volume");
        assert!(matches!(err, LhError::Configuration(_)));
    }
}

#[test]
fn slots_are_bounded() {
    assert_eq!(Slot::new(11).expect("slot").number(), 11);
    assert!(Slot::new(0).is_err());
    assert!(Slot::new(12).is_err());
    assert!(serde_json::from_str::<Slot>("12").is_err());
}

#[test]
fn worklist_round_trip_json() {
    let rows = vec![
        TransferRow {
            source: "A1".parse().unwrap(),
            destination: "B2".parse().unwrap(),
            volume: Volume::new(12.5).unwrap(),
        },
        TransferRow {
            source: "C3".parse().unwrap(),
            destination: "D4".parse().unwrap(),
            volume: Volume::new(4.0).unwrap(),
        },
    ];
    let worklist = Worklist::new(rows);

    let json = serde_json::to_string_pretty(&worklist).expect("serialize");
    assert!(json.contains("\"A1\""));
    let decoded: Worklist = serde_json::from_str(&json).expect("deserialize");
    assert_eq!(decoded, worklist);
    assert_eq!(decoded.total_volume(), 16.5);
}

#[test]
fn negative_volume_rejected_on_deserialize() {
    let json = r#"{"source":"A1","destination":"A2","volume":-3.0}"#;
    assert!(serde_json::from_str::<TransferRow>(json).is_err());
}

#[test]
fn provenance_round_trip_json() {
    let provenance = RunProvenance {
        worklist_hash: "worklist".into(),
        config_hash: "config".into(),
        worklist_id: Some("WL-42".into()),
        created_at: "2024-05-01T00:00:00Z".into(),
        tool_versions: [("lh-core".into(), "0.1.0".into())].into_iter().collect(),
    };
    let json = serde_json::to_string(&provenance).expect("serialize");
    let decoded: RunProvenance = serde_json::from_str(&json).expect("deserialize");
    assert_eq!(decoded, provenance);
    assert_eq!(SchemaVersion::default(), SchemaVersion::new(1, 0, 0));
}
