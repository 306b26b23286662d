//! Session lifecycle: subscription count, teardown, option updates, cache interplay

use crate::integration::test_utils::{record_writes, Harness};
use querybind::binding::{BindingSession, EvalContext, SessionState};
use querybind::engine::QueryEngine;
use querybind::host::{LocalValue, Signal};
use querybind::options::{QueryDefaults, QueryOptionsPatch};
use querybind::result::FetchStatus;
use querybind::transport::FetchOptions;
use querybind::{DescriptorBuilder, QueryKey, QueryStatus};
use serde_json::json;
use std::sync::Arc;
use std::time::Duration;

#[test]
fn test_reevaluations_share_one_subscription() {
    let h = Harness::new();
    let element = h.root.child("list");
    let page = Signal::new(1_i64);

    let bound = {
        let page = page.clone();
        h.plugin
            .directive(move |cx: &EvalContext<'_>| {
                Ok(cx.get(format!("/items?page={}", page.get())).into())
            })
            .bind(&element)
            .unwrap()
    };
    for next in 2..=6 {
        page.set(next);
        h.run();
    }

    assert_eq!(bound.evaluations(), 6);
    let stats = h.client.stats();
    assert_eq!(stats.observers_created, 1);
    assert_eq!(stats.subscriptions, 1);
    assert_eq!(stats.unsubscriptions, 0);
    assert_eq!(h.client.observer_count(&QueryKey::for_target("/items?page=6")), 1);
    assert_eq!(h.client.observer_count(&QueryKey::for_target("/items?page=1")), 0);
}

#[test]
fn test_session_unsubscribe_is_idempotent() {
    let h = Harness::new();
    let descriptor = h.plugin.descriptor("/users/1").unwrap();
    let engine: Arc<dyn QueryEngine> = Arc::new(h.client.clone());

    let session = BindingSession::start(Some(engine), descriptor, |_| {}).unwrap();
    assert_eq!(session.state(), SessionState::Subscribed);

    assert!(session.unsubscribe());
    assert!(!session.unsubscribe());
    assert_eq!(session.state(), SessionState::Unsubscribed);
    assert_eq!(h.client.stats().unsubscriptions, 1);

    // Teardown handed out after the fact is harmless.
    assert!(session.teardown().dispose());
    assert_eq!(h.client.stats().unsubscriptions, 1);
}

#[test]
fn test_option_change_under_same_key_is_used_on_next_fetch() {
    let h = Harness::new();
    let element = h.root.child("profile");
    let token = Signal::new("first".to_string());
    let key = QueryKey::for_target("/me");

    let bound = {
        let token = token.clone();
        h.plugin
            .directive(move |cx: &EvalContext<'_>| {
                let options = FetchOptions::new().header("authorization", token.get());
                Ok(cx.get("/me").fetch_options(options).into())
            })
            .bind(&element)
            .unwrap()
    };
    h.resolve("/me", Ok(json!({ "name": "Ada" })));

    token.set("second".to_string());
    h.run();
    assert_eq!(bound.evaluations(), 2);
    assert_eq!(h.transport.request_count("/me"), 1);

    h.client.invalidate(&key);
    h.resolve("/me", Ok(json!({ "name": "Ada" })));

    let requests = h.transport.requests();
    assert_eq!(requests.len(), 2);
    assert_eq!(
        requests[0].options.headers.get("authorization").map(String::as_str),
        Some("first")
    );
    assert_eq!(
        requests[1].options.headers.get("authorization").map(String::as_str),
        Some("second")
    );
    assert_eq!(h.client.stats().subscriptions, 1);
}

#[test]
fn test_disabled_query_stays_idle() {
    let h = Harness::new();
    let element = h.root.child("lazy");
    let writes = record_writes(&element, "query");

    h.plugin
        .directive(|cx: &EvalContext<'_>| {
            Ok(cx
                .get("/reports")
                .query_options(QueryOptionsPatch::new().enabled(false))
                .into())
        })
        .bind(&element)
        .unwrap();
    h.run();

    let writes = writes.lock();
    assert_eq!(writes.len(), 1);
    assert_eq!(writes[0].status, QueryStatus::Pending);
    assert_eq!(writes[0].fetch_status, FetchStatus::Idle);
    assert!(!writes[0].is_fetching);
    assert!(h.transport.requests().is_empty());
}

#[test]
fn test_fresh_cached_data_is_delivered_without_fetch() {
    let h = Harness::with_defaults(QueryDefaults {
        stale_time: Duration::from_secs(3600),
        ..QueryDefaults::default()
    });
    h.client
        .set_query_data(&QueryKey::for_target("/config"), json!({ "theme": "dark" }));
    let element = h.root.child("settings");
    let writes = record_writes(&element, "query");

    h.plugin
        .directive(|_: &EvalContext<'_>| Ok("/config".into()))
        .bind(&element)
        .unwrap();
    h.run();

    let writes = writes.lock();
    assert_eq!(writes.len(), 1);
    assert_eq!(writes[0].status, QueryStatus::Success);
    assert!(!writes[0].is_fetching);
    assert_eq!(writes[0].data, Some(json!({ "theme": "dark" })));
    assert!(h.transport.requests().is_empty());
}

#[test]
fn test_stale_cached_data_is_shown_while_refetching() {
    let h = Harness::new();
    h.client
        .set_query_data(&QueryKey::for_target("/config"), json!({ "theme": "dark" }));
    let element = h.root.child("settings");
    let writes = record_writes(&element, "query");

    h.plugin
        .directive(|_: &EvalContext<'_>| Ok(DescriptorBuilder::get("/config").into()))
        .bind(&element)
        .unwrap();

    {
        let writes = writes.lock();
        assert_eq!(writes[0].status, QueryStatus::Success);
        assert!(writes[0].is_fetching);
        assert_eq!(writes[0].data, Some(json!({ "theme": "dark" })));
    }

    h.resolve("/config", Ok(json!({ "theme": "light" })));
    let writes = writes.lock();
    let last = writes.last().unwrap();
    assert!(!last.is_fetching);
    assert_eq!(last.data, Some(json!({ "theme": "light" })));
}

#[test]
fn test_remove_keeps_element_alive() {
    let h = Harness::new();
    let element = h.root.child("widget");
    let bound = h
        .plugin
        .directive(|_: &EvalContext<'_>| Ok("/widgets".into()))
        .bind(&element)
        .unwrap();

    bound.remove();
    assert_eq!(bound.session_state(), SessionState::Unsubscribed);
    assert!(!element.is_destroyed());
    assert_eq!(h.client.observer_count(&QueryKey::for_target("/widgets")), 0);
}

#[test]
fn test_state_watcher_write_retargets_binding() {
    let h = Harness::new();
    let element = h.root.child("pager");
    let page = Signal::new(1_i64);

    // Jump to page 2 as soon as page 1's first result lands.
    let _jump = {
        let page = page.clone();
        element.state().on_change(move |_, value| {
            if let LocalValue::Query(result) = value {
                if result.key == QueryKey::for_target("/items/1") {
                    page.set(2);
                }
            }
        })
    };

    let bound = {
        let page = page.clone();
        h.plugin
            .directive(move |cx: &EvalContext<'_>| {
                Ok(cx.get(format!("/items/{}", page.get())).into())
            })
            .bind(&element)
            .unwrap()
    };

    assert_eq!(bound.evaluations(), 2);
    assert_eq!(bound.session_state(), SessionState::Subscribed);
    h.resolve("/items/2", Ok(json!({ "page": 2 })));

    let latest = element.state().query("query").unwrap();
    assert_eq!(latest.key, QueryKey::for_target("/items/2"));
    assert_eq!(latest.data, Some(json!({ "page": 2 })));
    assert_eq!(h.client.stats().subscriptions, 1);
}
