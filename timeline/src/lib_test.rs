use super::*;

fn record(request_type: RequestType, had_fatal_error: bool) -> EventRecord {
    EventRecord {
        session: "s".to_owned(),
        start_time: 1.0,
        end_time: 2.0,
        request_type,
        path: "/x".to_owned(),
        had_fatal_error,
        peak_memory_mb: 3,
        db_query_count: 4,
    }
}

#[test]
fn palette_matches_request_types() {
    assert_eq!(type_display(RequestType::Page), TypeDisplay { label: "page", color: "#68f" });
    assert_eq!(type_display(RequestType::NotFound).label, "404");
    assert_eq!(type_display(RequestType::Cron).color, "#999");
    let colors = RequestType::ALL.map(|t| type_display(t).color);
    let mut unique = colors.to_vec();
    unique.sort_unstable();
    unique.dedup();
    assert_eq!(unique.len(), colors.len());
}

#[test]
fn fatal_error_overrides_type_color() {
    assert_eq!(TimelineEvent::from(&record(RequestType::Ajax, false)).color, "#cc0");
    assert_eq!(TimelineEvent::from(&record(RequestType::Ajax, true)).color, ERROR_COLOR);
}

#[test]
fn payload_json_uses_display_names() {
    let payload = build_timeline(&[record(RequestType::NotFound, false)], 0.0, false);
    let json = to_json(&payload).unwrap();
    let value: serde_json::Value = serde_json::from_str(&json).unwrap();

    let event = &value["sessions"][0]["lanes"][0]["events"][0];
    assert_eq!(event["request_type"], "404");
    assert_eq!(event["color"], "#c8c");
    assert_eq!(value["sessions"][0]["lanes"][0]["label"], "s..");
    assert_eq!(value["ticks"], 1);
    assert_eq!(value["truncated"], false);
}
