//! End-to-end binding scenarios: mount, retarget, missing engine, unmount

use crate::integration::test_utils::{record_writes, Harness};
use querybind::binding::{EvalContext, SessionState};
use querybind::host::{Element, Signal};
use querybind::transport::Method;
use querybind::{BindError, FetchError, QueryKey, QueryStatus};
use serde_json::json;

#[test]
fn test_mount_writes_pending_then_success() {
    let h = Harness::new();
    let element = h.root.child("user");
    let writes = record_writes(&element, "query");

    let bound = h
        .plugin
        .directive(|_: &EvalContext<'_>| Ok("/users/1".into()))
        .bind(&element)
        .unwrap();

    {
        let writes = writes.lock();
        assert_eq!(writes.len(), 1, "optimistic result must be written synchronously");
        assert_eq!(writes[0].status, QueryStatus::Pending);
        assert!(writes[0].is_fetching);
        assert_eq!(writes[0].key, QueryKey::for_target("/users/1"));
    }
    assert_eq!(bound.session_state(), SessionState::Subscribed);
    assert!(h.transport.requests().is_empty());

    h.resolve("/users/1", Ok(json!({ "id": 1, "name": "Ada" })));

    let writes = writes.lock();
    assert_eq!(writes.len(), 2);
    assert_eq!(writes[1].status, QueryStatus::Success);
    assert!(!writes[1].is_fetching);
    assert_eq!(writes[1].data, Some(json!({ "id": 1, "name": "Ada" })));

    let requests = h.transport.requests();
    assert_eq!(requests.len(), 1);
    assert_eq!(requests[0].method, Method::Get);
    assert_eq!(requests[0].target, "/users/1");
}

#[test]
fn test_retarget_reflects_only_new_key() {
    let h = Harness::new();
    let element = h.root.child("user");
    let writes = record_writes(&element, "query");
    let target = Signal::new("/users/1".to_string());

    let _bound = {
        let target = target.clone();
        h.plugin
            .directive(move |cx: &EvalContext<'_>| Ok(cx.get(target.get()).into()))
            .bind(&element)
            .unwrap()
    };
    h.run();
    assert_eq!(h.transport.parked("/users/1"), 1);

    target.set("/users/2".to_string());
    h.run();
    assert_eq!(h.transport.parked("/users/2"), 1);
    {
        // While /users/2 is in flight the element shows it loading, not /users/1.
        let writes = writes.lock();
        let shown = writes.last().unwrap();
        assert_eq!(shown.key, QueryKey::for_target("/users/2"));
        assert_eq!(shown.status, QueryStatus::Pending);
        assert!(shown.is_fetching);
    }

    // The superseded request finishes last-but-one; its result must not land.
    assert!(h.transport.respond("/users/1", Ok(json!({ "id": 1 }))));
    h.run();
    h.resolve("/users/2", Ok(json!({ "id": 2 })));

    let writes = writes.lock();
    assert!(writes
        .iter()
        .all(|r| r.data != Some(json!({ "id": 1 }))));
    let last = writes.last().unwrap();
    assert_eq!(last.key, QueryKey::for_target("/users/2"));
    assert_eq!(last.data, Some(json!({ "id": 2 })));

    let stats = h.client.stats();
    assert_eq!(stats.observers_created, 1);
    assert_eq!(stats.subscriptions, 1);
}

#[test]
fn test_bind_without_reachable_engine_is_rejected() {
    let h = Harness::new();
    let orphan = Element::root("detached");
    let writes = record_writes(&orphan, "query");

    let result = h
        .plugin
        .directive(|_: &EvalContext<'_>| Ok("/users/1".into()))
        .bind(&orphan);

    assert!(matches!(result, Err(BindError::EngineUnavailable(_))));
    assert!(writes.lock().is_empty());
    assert_eq!(h.client.stats().observers_created, 0);
    assert_eq!(orphan.cleanup_count(), 0);
}

#[test]
fn test_unmount_unsubscribes_once_and_stops_writes() {
    let h = Harness::new();
    let element = h.root.child("user");
    let writes = record_writes(&element, "query");

    let bound = h
        .plugin
        .directive(|_: &EvalContext<'_>| Ok("/users/1".into()))
        .bind(&element)
        .unwrap();
    h.run();

    element.destroy();
    element.destroy();
    assert_eq!(bound.session_state(), SessionState::Unsubscribed);
    assert_eq!(h.client.stats().unsubscriptions, 1);
    assert_eq!(h.client.observer_count(&QueryKey::for_target("/users/1")), 0);

    assert!(h.transport.respond("/users/1", Ok(json!({ "id": 1 }))));
    h.run();
    assert_eq!(writes.lock().len(), 1);
    assert_eq!(h.client.stats().unsubscriptions, 1);
}

#[test]
fn test_transport_failure_is_delivered_as_error_result() {
    let h = Harness::new();
    let element = h.root.child("user");
    let writes = record_writes(&element, "query");

    h.plugin
        .directive(|_: &EvalContext<'_>| Ok("/users/404".into()))
        .bind(&element)
        .unwrap();
    h.resolve(
        "/users/404",
        Err(FetchError::Status {
            status: 404,
            body: "not found".to_string(),
        }),
    );

    let writes = writes.lock();
    let last = writes.last().unwrap();
    assert_eq!(last.status, QueryStatus::Error);
    assert!(!last.is_fetching);
    assert!(matches!(last.error, Some(FetchError::Status { status: 404, .. })));
    assert!(element.errors().is_empty());
}
