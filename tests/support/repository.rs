//! Mock repository API built on wiremock.

use std::time::Duration;

use libsafe_export::{Credentials, RepositoryClient, RetryPolicy};
use url::Url;
use wiremock::matchers::{method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

pub const API_PREFIX: &str = "/server/api";

/// Deterministic UUID for a numeric record suffix and object kind.
pub fn uuid_for(kind: u8, suffix: u32) -> String {
    format!("{kind:08x}-0000-4000-8000-{suffix:012x}")
}

pub fn item_uuid(suffix: u32) -> String {
    uuid_for(1, suffix)
}

pub fn bundle_uuid(suffix: u32) -> String {
    uuid_for(2, suffix)
}

pub fn bitstream_uuid(suffix: u32) -> String {
    uuid_for(3, suffix)
}

pub fn content_path(suffix: u32) -> String {
    content_path_for(&bitstream_uuid(suffix))
}

/// Client pointed at the mock with millisecond backoff.
pub fn client_for(server: &MockServer) -> RepositoryClient {
    let base = Url::parse(&format!("{}{API_PREFIX}/", server.uri())).unwrap();
    RepositoryClient::new(base)
        .unwrap()
        .with_retry_policy(RetryPolicy::new(
            3,
            Duration::from_millis(1),
            Duration::from_millis(5),
            2.0,
        ))
        .with_credentials(Credentials::new("archivist@example.edu", "secret"))
}

/// Mounts the handle lookup for `10754/<suffix>`.
pub async fn mount_item(server: &MockServer, suffix: u32, title: &str) {
    Mock::given(method("GET"))
        .and(path(format!("{API_PREFIX}/pid/find")))
        .and(query_param("id", format!("10754/{suffix}")))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "uuid": item_uuid(suffix),
            "handle": format!("10754/{suffix}"),
            "metadata": {
                "dc.title": [{"value": title, "place": 0}],
                "dc.type": [{"value": "Article", "place": 0}],
                "dc.contributor.author": [
                    {"value": "Doe, Jane", "place": 0},
                    {"value": "Roe, Richard", "place": 1}
                ],
                "dc.date.issued": [{"value": "2023-05-01", "place": 0}]
            }
        })))
        .mount(server)
        .await;
}

/// Mounts one ORIGINAL bundle holding a single PDF of `size_bytes`.
pub async fn mount_listing(server: &MockServer, suffix: u32, size_bytes: u64) {
    mount_bitstreams(server, suffix, &[(bitstream_uuid(suffix), size_bytes)]).await;
}

/// Mounts one ORIGINAL bundle listing `bitstreams` (uuid, size) in order.
pub async fn mount_bitstreams(server: &MockServer, suffix: u32, bitstreams: &[(String, u64)]) {
    Mock::given(method("GET"))
        .and(path(format!(
            "{API_PREFIX}/core/items/{}/bundles",
            item_uuid(suffix)
        )))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "_embedded": {"bundles": [
                {"uuid": bundle_uuid(suffix), "name": "ORIGINAL"},
                {"uuid": uuid_for(9, suffix), "name": "LICENSE"}
            ]}
        })))
        .mount(server)
        .await;
    let listed: Vec<serde_json::Value> = bitstreams
        .iter()
        .enumerate()
        .map(|(index, (uuid, size_bytes))| {
            serde_json::json!({
                "uuid": uuid,
                "name": format!("{suffix}-{index}.pdf"),
                "sizeBytes": size_bytes
            })
        })
        .collect();
    Mock::given(method("GET"))
        .and(path(format!(
            "{API_PREFIX}/core/bundles/{}/bitstreams",
            bundle_uuid(suffix)
        )))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "_embedded": {"bitstreams": listed}
        })))
        .mount(server)
        .await;
}

/// Content path of an arbitrary bitstream uuid.
pub fn content_path_for(uuid: &str) -> String {
    format!("{API_PREFIX}/core/bitstreams/{uuid}/content")
}

/// Mounts item, listing and a public content response for one record.
pub async fn mount_public_record(server: &MockServer, suffix: u32, body: &[u8]) {
    mount_item(server, suffix, &format!("Record {suffix}")).await;
    mount_listing(server, suffix, body.len() as u64).await;
    Mock::given(method("GET"))
        .and(path(content_path(suffix)))
        .respond_with(ResponseTemplate::new(200).set_body_bytes(body.to_vec()))
        .mount(server)
        .await;
}

/// Mounts the two-step login, answering with `token`.
pub async fn mount_login(server: &MockServer, token: &str, expected_logins: u64) {
    Mock::given(method("GET"))
        .and(path(format!("{API_PREFIX}/authn/status")))
        .respond_with(
            ResponseTemplate::new(200).insert_header("DSPACE-XSRF-TOKEN", "xsrf-token"),
        )
        .mount(server)
        .await;
    Mock::given(method("POST"))
        .and(path(format!("{API_PREFIX}/authn/login")))
        .respond_with(
            ResponseTemplate::new(200).insert_header("Authorization", format!("Bearer {token}")),
        )
        .expect(expected_logins)
        .mount(server)
        .await;
}
