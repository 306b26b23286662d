//! Descriptors built through the plugin primitives and the requests they produce

use crate::integration::test_utils::{record_writes, Harness};
use querybind::binding::EvalContext;
use querybind::options::QueryOptionsPatch;
use querybind::plugin::QueryPlugin;
use querybind::transport::{FetchOptions, Method, ResponseFormat};
use querybind::{BindError, QueryKey, QueryStatus};
use serde_json::json;

#[test]
fn test_plugin_registers_primitives() {
    assert_eq!(QueryPlugin::PRIMITIVES, ["get", "post", "query"]);
}

#[test]
fn test_post_descriptor_sends_body_and_options() {
    let h = Harness::new();
    let element = h.root.child("search");
    let writes = record_writes(&element, "query");

    h.plugin
        .directive(|cx: &EvalContext<'_>| {
            let options = FetchOptions::new()
                .header("x-client", "querybind")
                .query_param("limit", "10")
                .format(ResponseFormat::Text);
            Ok(cx
                .post("/search", Some(json!({ "term": "ada" })))
                .fetch_options(options)
                .into())
        })
        .bind(&element)
        .unwrap();
    h.resolve("/search", Ok(json!("plain body")));

    let requests = h.transport.requests();
    assert_eq!(requests.len(), 1);
    let request = &requests[0];
    assert_eq!(request.method, Method::Post);
    assert_eq!(request.body, Some(json!({ "term": "ada" })));
    assert_eq!(request.options.format, ResponseFormat::Text);
    assert_eq!(
        request.options.query.get("limit").map(String::as_str),
        Some("10")
    );
    assert_eq!(
        request.options.headers.get("x-client").map(String::as_str),
        Some("querybind")
    );

    let writes = writes.lock();
    assert_eq!(writes.last().unwrap().data, Some(json!("plain body")));
}

#[test]
fn test_post_without_body_sends_none() {
    let h = Harness::new();
    let element = h.root.child("ping");
    h.plugin
        .directive(|cx: &EvalContext<'_>| Ok(cx.post("/ping", None).into()))
        .bind(&element)
        .unwrap();
    h.resolve("/ping", Ok(json!({ "ok": true })));

    let requests = h.transport.requests();
    assert_eq!(requests[0].method, Method::Post);
    assert_eq!(requests[0].body, None);
}

#[test]
fn test_key_override_shares_cache_between_targets() {
    let h = Harness::new();
    let shared = QueryKey::new(["users", "current"]);
    let first = h.root.child("header");
    let second = h.root.child("sidebar");
    let second_writes = record_writes(&second, "query");

    for (element, target) in [(&first, "/me"), (&second, "/users/me")] {
        let key = shared.clone();
        h.plugin
            .directive(move |cx: &EvalContext<'_>| {
                Ok(cx
                    .get(target)
                    .query_options(QueryOptionsPatch::new().key(key.clone()))
                    .into())
            })
            .bind(element)
            .unwrap();
    }
    h.resolve("/me", Ok(json!({ "id": 7 })));

    assert_eq!(h.transport.requests().len(), 1);
    assert_eq!(h.client.observer_count(&shared), 2);
    assert_eq!(h.client.stats().fetches_deduplicated, 0);
    let writes = second_writes.lock();
    let last = writes.last().unwrap();
    assert_eq!(last.status, QueryStatus::Success);
    assert_eq!(last.key, shared);
}

#[test]
fn test_invalid_target_is_reported_on_error_channel() {
    let h = Harness::new();
    let element = h.root.child("broken");
    let writes = record_writes(&element, "query");

    assert!(matches!(
        h.plugin.descriptor(""),
        Err(BindError::InvalidDescriptor(_))
    ));

    h.plugin
        .directive(|cx: &EvalContext<'_>| Ok(cx.get("  ").into()))
        .bind(&element)
        .unwrap();

    let errors = element.errors().take();
    assert_eq!(errors.len(), 1);
    assert!(matches!(errors[0], BindError::InvalidDescriptor(_)));
    assert!(writes.lock().is_empty());
    assert_eq!(h.client.stats().observers_created, 0);
}
