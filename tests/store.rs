use chrono::Utc;
use wildlife::{
    database::{PostRecord, ReportRecord, ReportStore, ScanFilters, is_unique_violation},
    ids::{ID_RANGE, IdAllocator},
};

fn report(report_id: i64, animal_type: &str, severity: i64) -> ReportRecord {
    ReportRecord {
        report_id,
        user_id: Some("000000000001".to_string()),
        location_lat: Some(47.6062),
        location_lon: Some(-122.3321),
        location_name: Some("Union Bay Natural Area".to_string()),
        severity,
        animal_type: animal_type.to_string(),
        description: format!("{animal_type} sighting"),
        date_reported: "2025-06-01".to_string(),
        date_created: Utc::now(),
        image_exists: false,
    }
}

fn post(post_id: i64, title: &str) -> PostRecord {
    PostRecord {
        post_id,
        user_id: None,
        title: title.to_string(),
        message: "seen near the trailhead".to_string(),
        date_created: Utc::now(),
    }
}

#[tokio::test]
async fn inserted_report_round_trips() {
    let store = ReportStore::in_memory().await.unwrap();
    store.insert_report(&report(12345678, "deer", 2)).await.unwrap();

    let fetched = store.get_report(12345678).await.unwrap().unwrap();

    assert_eq!(fetched.report_id, 12345678);
    assert_eq!(fetched.animal_type, "deer");
    assert_eq!(fetched.severity, 2);
    assert_eq!(fetched.location_name.as_deref(), Some("Union Bay Natural Area"));
    assert!(!fetched.image_exists);
}

#[tokio::test]
async fn missing_report_is_none() {
    let store = ReportStore::in_memory().await.unwrap();

    assert!(store.get_report(12345678).await.unwrap().is_none());
    assert!(!store.report_id_exists(12345678).await.unwrap());
}

#[tokio::test]
async fn duplicate_id_surfaces_unique_violation() {
    let store = ReportStore::in_memory().await.unwrap();
    store.insert_report(&report(12345678, "deer", 2)).await.unwrap();

    let err = store
        .insert_report(&report(12345678, "bear", 1))
        .await
        .unwrap_err();

    assert!(is_unique_violation(&err));
}

#[tokio::test]
async fn latest_reports_order_newest_first() {
    let store = ReportStore::in_memory().await.unwrap();
    for id in [20000001, 90000002, 50000003] {
        store.insert_report(&report(id, "deer", 2)).await.unwrap();
    }

    let latest = store
        .latest_reports(&ScanFilters::default(), 2)
        .await
        .unwrap();

    let ids: Vec<i64> = latest.iter().map(|r| r.report_id).collect();
    assert_eq!(ids, vec![90000002, 50000003]);
}

#[tokio::test]
async fn filters_apply_to_latest_and_count() {
    let store = ReportStore::in_memory().await.unwrap();
    store.insert_report(&report(20000001, "Deer", 2)).await.unwrap();
    store.insert_report(&report(20000002, "bear", 1)).await.unwrap();
    store.insert_report(&report(20000003, "deer", 3)).await.unwrap();

    let filters = ScanFilters {
        animal_type: Some("DEER".to_string()),
        severity: None,
    };

    assert_eq!(store.count_reports(&filters).await.unwrap(), 2);

    let latest = store.latest_reports(&filters, 10).await.unwrap();
    assert_eq!(latest.len(), 2);
    assert!(latest.iter().all(|r| r.animal_type.eq_ignore_ascii_case("deer")));
}

#[tokio::test]
async fn report_pages_hold_ten_rows() {
    let store = ReportStore::in_memory().await.unwrap();
    for i in 0..12 {
        store
            .insert_report(&report(10_000_000 + i, "deer", 2))
            .await
            .unwrap();
    }

    let filters = ScanFilters::default();

    let first = store.page_reports(&filters, 1).await.unwrap();
    let second = store.page_reports(&filters, 2).await.unwrap();

    assert_eq!(first.len(), 10);
    assert_eq!(second.len(), 2);
    assert_eq!(first[0].report_id, 10_000_011);
    assert_eq!(second[1].report_id, 10_000_000);
}

#[tokio::test]
async fn posts_round_trip_and_paginate() {
    let store = ReportStore::in_memory().await.unwrap();
    for id in [30000001, 30000002, 30000003] {
        store.insert_post(&post(id, "coyote on the burke gilman")).await.unwrap();
    }

    let fetched = store.get_post(30000002).await.unwrap().unwrap();
    assert_eq!(fetched.title, "coyote on the burke gilman");

    assert_eq!(store.count_posts().await.unwrap(), 3);

    let page = store.page_posts(1).await.unwrap();
    let ids: Vec<i64> = page.iter().map(|p| p.post_id).collect();
    assert_eq!(ids, vec![30000003, 30000002, 30000001]);

    let err = store
        .insert_post(&post(30000001, "duplicate"))
        .await
        .unwrap_err();
    assert!(is_unique_violation(&err));
}

#[tokio::test]
async fn allocator_avoids_ids_already_stored() {
    let store = ReportStore::in_memory().await.unwrap();
    store.insert_report(&report(12345678, "deer", 2)).await.unwrap();

    let allocator = IdAllocator::default();

    let id = allocator
        .allocate(|id| store.report_id_exists(id))
        .await
        .unwrap();

    assert!(ID_RANGE.contains(&id));
    assert_ne!(id, 12345678);
    assert!(!store.report_id_exists(id).await.unwrap());
}
