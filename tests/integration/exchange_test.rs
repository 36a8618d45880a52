// End-to-end tests for ExchangeOrchestrator::handle

use crate::common::{
    create_fixture, create_fixture_with_store, data_exchange, generic_punch, FailingStore,
    COMPANY_ID, EMPLOYEE_ID, PHOTO, TIME_ZONE,
};
use chrono::NaiveDate;
use flowexchange::{
    attendance::{AttendanceStatus, MemoryAttendanceStore},
    platform, Error,
};
use serde_json::{json, Value};
use std::sync::Arc;

#[tokio::test]
async fn test_ping_round_trip_has_no_side_effects() {
    let fixture = create_fixture();
    let (sealed, body) = fixture.seal(&json!({"version": "3.0", "action": "ping"}));

    let reply = fixture
        .orchestrator
        .handle(&body)
        .await
        .expect("Ping returned no reply");
    let opened: Value = platform::open_response(&reply, &sealed.session_key, &sealed.iv)
        .expect("Failed to open ping reply");

    assert_eq!(opened, json!({"version": "3.0", "data": {"status": "active"}}));
    assert!(fixture.store.attendance_for(EMPLOYEE_ID).unwrap().is_empty());
    assert!(fixture.stored_files().is_empty());
    assert!(fixture.notifier.sent().is_empty());
}

#[tokio::test]
async fn test_generic_in_records_on_time_check_in() {
    let fixture = create_fixture();
    let images = fixture.attach("in.jpg", PHOTO);

    let response = fixture.exchange(generic_punch("in", "09:00", images)).await;

    assert_eq!(response.screen.as_deref(), Some("Screen_Eight"));
    assert_eq!(response.get_str("responseText"), Some("✅️ Check In Success - Lena"));
    assert_eq!(response.get_str("companyId"), Some(COMPANY_ID));
    assert_eq!(response.get_str("timeZone"), Some(TIME_ZONE));

    let records = fixture.store.attendance_for(EMPLOYEE_ID).unwrap();
    assert_eq!(records.len(), 1);
    assert_eq!(records[0].status, AttendanceStatus::OnTime);
    assert_eq!(records[0].check_in_pic, "https://files.example/in.jpg");

    let stored = std::fs::read(fixture.artifact_dir.path().join("in.jpg")).unwrap();
    assert_eq!(stored, PHOTO);
}

#[tokio::test]
async fn test_generic_in_after_shift_start_is_late() {
    let fixture = create_fixture();
    let images = fixture.attach("late.jpg", PHOTO);

    let response = fixture.exchange(generic_punch("in", "09:30", images)).await;

    assert_eq!(response.get_str("responseText"), Some("✅️ Check In Success - Lena"));
    let records = fixture.store.attendance_for(EMPLOYEE_ID).unwrap();
    assert_eq!(records[0].status, AttendanceStatus::Late);
}

#[tokio::test]
async fn test_second_check_in_same_day_fails() {
    let fixture = create_fixture();

    let first = fixture.attach("first.jpg", PHOTO);
    let response = fixture.exchange(generic_punch("in", "09:00", first)).await;
    assert_eq!(response.get_str("responseText"), Some("✅️ Check In Success - Lena"));

    let second = fixture.attach("second.jpg", PHOTO);
    let response = fixture.exchange(generic_punch("in", "09:10", second)).await;
    assert_eq!(response.get_str("responseText"), Some("❌ Check In Failed - Lena"));
    assert_eq!(fixture.store.attendance_for(EMPLOYEE_ID).unwrap().len(), 1);
}

#[tokio::test]
async fn test_generic_out_closes_the_day() {
    let fixture = create_fixture();

    let check_in = fixture.attach("in.jpg", PHOTO);
    fixture.exchange(generic_punch("in", "09:00", check_in)).await;

    let check_out = fixture.attach("out.jpg", PHOTO);
    let response = fixture.exchange(generic_punch("out", "18:00", check_out)).await;

    assert_eq!(response.screen.as_deref(), Some("Screen_Eight"));
    assert_eq!(response.get_str("responseText"), Some("✅️ Check Out Success - Lena"));

    let records = fixture.store.attendance_for(EMPLOYEE_ID).unwrap();
    assert_eq!(records[0].date, NaiveDate::from_ymd_opt(2024, 3, 4).unwrap());
    assert_eq!(records[0].status, AttendanceStatus::FullDay);
    let closed = records[0].check_out.as_ref().expect("attendance still open");
    assert_eq!(closed.time_spent, "9hr 0m");
    assert_eq!(closed.check_out_pic, "https://files.example/out.jpg");
}

#[tokio::test]
async fn test_generic_out_without_check_in_fails() {
    let fixture = create_fixture();
    let images = fixture.attach("out.jpg", PHOTO);

    let response = fixture.exchange(generic_punch("out", "18:00", images)).await;

    assert_eq!(response.get_str("responseText"), Some("❌ Check Out Failed - Lena"));
}

#[tokio::test]
async fn test_unknown_employee_gets_failure_text() {
    let fixture = create_fixture();
    let images = fixture.attach("ghost.jpg", PHOTO);
    let mut payload = generic_punch("in", "09:00", images);
    payload["data"]["employeeId"] = json!("99:Ghost");

    let response = fixture.exchange(payload).await;

    assert_eq!(response.get_str("responseText"), Some("❌ Check In Failed - Ghost"));
    assert!(fixture.store.attendance_for("99").unwrap().is_empty());
}

#[tokio::test]
async fn test_tampered_media_is_never_stored() {
    let fixture = create_fixture();
    let images = fixture.attach("in.jpg", PHOTO);

    // Same URL now serves a blob the metadata does not describe.
    let (other, _) = platform::seal_media(b"someone else's photo").unwrap();
    fixture.media.insert("https://cdn.example/media/in.jpg", other);

    let response = fixture.exchange(generic_punch("in", "09:00", images)).await;

    assert_eq!(response.get_str("responseText"), Some("❌ Check In Failed - Lena"));
    assert!(fixture.stored_files().is_empty());
    assert!(fixture.store.attendance_for(EMPLOYEE_ID).unwrap().is_empty());
}

#[tokio::test]
async fn test_missing_media_gets_failure_text() {
    let fixture = create_fixture();
    let mut images = fixture.attach("in.jpg", PHOTO);
    images[0]["cdn_url"] = json!("https://cdn.example/media/gone.jpg");

    let response = fixture.exchange(generic_punch("in", "09:00", images)).await;

    assert_eq!(response.get_str("responseText"), Some("❌ Check In Failed - Lena"));
}

#[tokio::test]
async fn test_store_failure_still_sends_encrypted_reply() {
    let fixture =
        create_fixture_with_store(MemoryAttendanceStore::new(), Arc::new(FailingStore));
    let images = fixture.attach("in.jpg", PHOTO);

    let response = fixture.exchange(generic_punch("in", "09:00", images)).await;

    assert_eq!(response.screen.as_deref(), Some("Screen_Eight"));
    assert_eq!(response.get_str("responseText"), Some("❌ Check In Failed - Lena"));
}

#[tokio::test]
async fn test_manual_check_in_notifies_owners() {
    let fixture = create_fixture();
    let images = fixture.attach("manual.jpg", PHOTO);

    let response = fixture
        .exchange(data_exchange(json!({
            "type": "manual_checkin",
            "employeeId": "5_@_Lena",
            "employeeList": [{"id": "5_@_Lena", "title": "Lena"}],
            "companyId": COMPANY_ID,
            "timeZone": TIME_ZONE,
            "checkInTime": "09:15",
            "checkInStatus": "late",
            "nextScreen": "MANUAL_DONE",
            "ownerNumbers": "911111_@_922222",
            "images": images,
        })))
        .await;

    assert_eq!(response.screen.as_deref(), Some("MANUAL_DONE"));
    assert_eq!(response.get_str("checkInResponseText"), Some("✅️ Check In Success - Lena"));
    assert_eq!(response.get_str("employeeId"), Some("5_@_Lena"));
    assert!(response.data.contains_key("employeeList"));
    assert_eq!(response.get_str("companyId"), Some(COMPANY_ID));
    assert_eq!(response.get_str("timeZone"), Some(TIME_ZONE));

    let records = fixture.store.attendance_for(EMPLOYEE_ID).unwrap();
    assert_eq!(records.len(), 1);
    assert_eq!(records[0].status, AttendanceStatus::Late);

    let sent = fixture.notifier.wait_for(2).await;
    assert_eq!(sent.len(), 2);
    assert_eq!(sent[0].0, "911111");
    assert_eq!(sent[1].0, "922222");
    assert_eq!(sent[0].1, "https://files.example/manual.jpg");
    assert!(sent[0].2.contains("Lena has checked in at 9:15 AM"));
}

#[tokio::test]
async fn test_manual_check_in_with_store_down_does_not_notify() {
    let fixture =
        create_fixture_with_store(MemoryAttendanceStore::new(), Arc::new(FailingStore));
    let images = fixture.attach("manual.jpg", PHOTO);

    let response = fixture
        .exchange(data_exchange(json!({
            "type": "manual_checkin",
            "employeeId": "5_@_Lena",
            "companyId": COMPANY_ID,
            "timeZone": TIME_ZONE,
            "checkInTime": "09:15",
            "checkInStatus": "onTime",
            "nextScreen": "MANUAL_DONE",
            "ownerNumbers": "911111",
            "images": images,
        })))
        .await;

    assert_eq!(response.get_str("checkInResponseText"), Some("❌ Check In Failed - Lena"));
    tokio::time::sleep(std::time::Duration::from_millis(50)).await;
    assert!(fixture.notifier.sent().is_empty());
}

#[tokio::test]
async fn test_manual_punch_routes_by_status() {
    let fixture = create_fixture();

    let check_in = fixture
        .exchange(data_exchange(json!({
            "type": "manual_punching",
            "employee1": "",
            "employee2": "5_@_Lena_@_",
            "companyId": COMPANY_ID,
            "timeZone": TIME_ZONE,
        })))
        .await;
    assert_eq!(check_in.screen.as_deref(), Some("MANUAL_PUNCHING_IN"));
    assert_eq!(check_in.get_str("employeeId"), Some("5:Lena:"));
    assert_eq!(check_in.get_str("attendanceType"), Some("in"));
    assert_eq!(check_in.get_str("companyId"), Some(COMPANY_ID));

    let check_out = fixture
        .exchange(data_exchange(json!({
            "type": "manual_punching",
            "employee1": "5_@_Lena_@_onTime",
            "companyId": COMPANY_ID,
            "timeZone": TIME_ZONE,
        })))
        .await;
    assert_eq!(check_out.screen.as_deref(), Some("MANUAL_PUNCHING_OUT"));
    assert_eq!(check_out.get_str("employeeId"), Some("5:Lena:onTime"));
    assert_eq!(check_out.get_str("attendanceType"), Some("out"));
    assert_eq!(check_out.get_str("photoLabel"), Some("Upload Check Out Photo"));
}

#[tokio::test]
async fn test_unsupported_type_gets_error_screen() {
    let fixture = create_fixture();

    let response = fixture
        .exchange(data_exchange(json!({"type": "leave_request"})))
        .await;

    assert_eq!(response.version, "3.0");
    assert_eq!(response.screen.as_deref(), Some("WELCOME"));
    assert!(response.get_str("error_message").is_some());
    assert!(fixture.store.attendance_for(EMPLOYEE_ID).unwrap().is_empty());
}

#[tokio::test]
async fn test_request_version_is_echoed() {
    let fixture = create_fixture();
    let images = fixture.attach("in.jpg", PHOTO);
    let mut payload = generic_punch("in", "09:00", images);
    payload["version"] = json!("4.1");

    let response = fixture.exchange(payload).await;
    assert_eq!(response.version, "4.1");

    let mut unversioned = data_exchange(json!({"type": "leave_request"}));
    unversioned
        .as_object_mut()
        .expect("payload is an object")
        .remove("version");
    let response = fixture.exchange(unversioned).await;
    assert_eq!(response.version, fixture.orchestrator.config().flow_version);
}

#[tokio::test]
async fn test_tampered_envelope_is_rejected() {
    let fixture = create_fixture();
    let (mut sealed, _) = fixture.seal(&json!({"version": "3.0", "action": "ping"}));
    sealed.envelope.ciphertext[0] ^= 0x01;
    let body = serde_json::to_vec(&sealed.envelope.to_wire()).unwrap();

    let error = fixture
        .orchestrator
        .handle(&body)
        .await
        .expect_err("Tampered envelope produced a reply");

    assert!(matches!(error, Error::IntegrityFailed));
    assert!(error.is_transport_level());
}

#[tokio::test]
async fn test_garbage_body_is_rejected() {
    let fixture = create_fixture();

    for body in [&b"not json"[..], &br#"{"encrypted_aes_key": "@@@"}"#[..]] {
        let error = fixture
            .orchestrator
            .handle(body)
            .await
            .expect_err("Garbage produced a reply");
        assert!(error.is_transport_level(), "{:?} is not transport level", error);
    }
}

#[tokio::test]
async fn test_employee_id_from_punching_screen_keeps_plain_name() {
    let fixture = create_fixture();

    // The manual punching screen hands back `id:name:status`.
    let check_in = fixture.attach("in.jpg", PHOTO);
    let mut payload = generic_punch("in", "09:00", check_in);
    payload["data"]["employeeId"] = json!("5:Lena:");
    let response = fixture.exchange(payload).await;
    assert_eq!(response.get_str("responseText"), Some("✅️ Check In Success - Lena"));

    let check_out = fixture.attach("out.jpg", PHOTO);
    let mut payload = generic_punch("out", "18:00", check_out);
    payload["data"]["employeeId"] = json!("5:Lena:onTime");
    let response = fixture.exchange(payload).await;
    assert_eq!(response.get_str("responseText"), Some("✅️ Check Out Success - Lena"));
}

#[tokio::test]
async fn test_generic_punch_without_image_gets_failure_text() {
    let fixture = create_fixture();

    for (kind, text) in [
        ("in", "❌ Check In Failed - Lena"),
        ("out", "❌ Check Out Failed - Lena"),
    ] {
        let response = fixture.exchange(generic_punch(kind, "09:00", json!([]))).await;

        assert_eq!(response.screen.as_deref(), Some("Screen_Eight"));
        assert_eq!(response.get_str("responseText"), Some(text));
        assert_eq!(response.get_str("companyId"), Some(COMPANY_ID));
        assert_eq!(response.get_str("timeZone"), Some(TIME_ZONE));
        assert!(response.get_str("error_message").is_none());
    }
    assert!(fixture.store.attendance_for(EMPLOYEE_ID).unwrap().is_empty());
}

#[tokio::test]
async fn test_generic_punch_with_malformed_time_gets_failure_text() {
    let fixture = create_fixture();

    for (kind, text) in [
        ("in", "❌ Check In Failed - Lena"),
        ("out", "❌ Check Out Failed - Lena"),
    ] {
        let images = fixture.attach("in.jpg", PHOTO);
        let response = fixture.exchange(generic_punch(kind, "9am", images)).await;

        assert_eq!(response.screen.as_deref(), Some("Screen_Eight"));
        assert_eq!(response.get_str("responseText"), Some(text));
    }
    assert!(fixture.stored_files().is_empty());
}

#[tokio::test]
async fn test_generic_punch_with_unknown_zone_gets_failure_text() {
    let fixture = create_fixture();
    let images = fixture.attach("in.jpg", PHOTO);
    let mut payload = generic_punch("in", "09:00", images);
    payload["data"]["timeZone"] = json!("Mars/Olympus");

    let response = fixture.exchange(payload).await;

    assert_eq!(response.screen.as_deref(), Some("Screen_Eight"));
    assert_eq!(response.get_str("responseText"), Some("❌ Check In Failed - Lena"));
    assert_eq!(response.get_str("timeZone"), Some("Mars/Olympus"));
}

#[tokio::test]
async fn test_incomplete_manual_check_in_gets_failure_text() {
    let fixture = create_fixture();
    let images = fixture.attach("manual.jpg", PHOTO);
    let manual_check_in = |check_in_time: &str, images: Value| {
        data_exchange(json!({
            "type": "manual_checkin",
            "employeeId": "5_@_Lena",
            "employeeList": [{"id": "5_@_Lena", "title": "Lena"}],
            "companyId": COMPANY_ID,
            "timeZone": TIME_ZONE,
            "checkInTime": check_in_time,
            "checkInStatus": "onTime",
            "nextScreen": "MANUAL_DONE",
            "ownerNumbers": "911111",
            "images": images,
        }))
    };

    for payload in [
        manual_check_in("09:15", json!([])),
        manual_check_in("quarter past nine", images),
    ] {
        let response = fixture.exchange(payload).await;

        assert_eq!(response.screen.as_deref(), Some("MANUAL_DONE"));
        assert_eq!(
            response.get_str("checkInResponseText"),
            Some("❌ Check In Failed - Lena")
        );
        assert_eq!(response.get_str("employeeId"), Some("5_@_Lena"));
        assert!(response.data.contains_key("employeeList"));
        assert_eq!(response.get_str("companyId"), Some(COMPANY_ID));
    }

    assert!(fixture.store.attendance_for(EMPLOYEE_ID).unwrap().is_empty());
    tokio::time::sleep(std::time::Duration::from_millis(50)).await;
    assert!(fixture.notifier.sent().is_empty());
}

#[tokio::test]
async fn test_manual_punch_without_selection_gets_failure_text() {
    let fixture = create_fixture();

    let response = fixture
        .exchange(data_exchange(json!({
            "type": "manual_punching",
            "employee1": "",
            "companyId": COMPANY_ID,
        })))
        .await;

    assert_eq!(response.screen.as_deref(), Some("WELCOME"));
    assert_eq!(response.get_str("checkInResponseText"), Some("❌ Check In Failed - "));
    assert!(response.get_str("error_message").is_none());
}
