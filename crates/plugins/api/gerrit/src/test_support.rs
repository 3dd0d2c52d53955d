//! Shared fixtures for the httpmock-based tests.

use gerrit_review_core::{GerritConfig, GerritSettings};
use httpmock::prelude::*;
use httpmock::Mock;
use serde::Serialize;

use crate::client::MAGIC_PREFIX;
use crate::provider::GerritProvider;

/// Resolve a config pointing at `base_url` as user `alice` with HTTP
/// password `secret`, plus any extra `GERRIT_*` settings.
pub(crate) fn config_for(base_url: &str, extra: &[(&str, &str)]) -> GerritConfig {
    let mut vars = vec![
        ("GERRIT_HOST", base_url),
        ("GERRIT_USER", "alice"),
        ("GERRIT_HTTP_PASSWORD", "secret"),
    ];
    vars.extend_from_slice(extra);
    let settings = GerritSettings::from_vars(vars.iter().map(|(k, v)| (*k, v.to_string())));
    GerritConfig::resolve(&settings).unwrap()
}

pub(crate) fn test_provider(server: &MockServer, extra: &[(&str, &str)]) -> GerritProvider {
    GerritProvider::new(config_for(&server.base_url(), extra)).unwrap()
}

/// JSON body with Gerrit's guard line in front.
pub(crate) fn gerrit_body<T: Serialize>(value: &T) -> String {
    format!("{}{}", MAGIC_PREFIX, serde_json::to_string(value).unwrap())
}

/// Accept the default credentials on the auth probe.
pub(crate) fn mock_auth(server: &MockServer) -> Mock<'_> {
    server.mock(|when, then| {
        when.method(GET)
            .path("/a/accounts/self")
            .header("authorization", basic_auth_header("alice", "secret"));
        then.status(200)
            .body(gerrit_body(&serde_json::json!({"_account_id": 1000, "username": "alice"})));
    })
}

/// `ChangeInfo` body with the given `(sha, patchset number)` revisions.
pub(crate) fn change_detail(revisions: &[(&str, u32)]) -> String {
    let revisions: serde_json::Map<String, serde_json::Value> = revisions
        .iter()
        .map(|(sha, number)| {
            (
                sha.to_string(),
                serde_json::json!({
                    "_number": number,
                    "kind": "REWORK",
                    "ref": format!("refs/changes/00/100/{}", number)
                }),
            )
        })
        .collect();

    gerrit_body(&serde_json::json!({
        "id": "demo~main~I0123456789abcdef",
        "project": "demo",
        "branch": "main",
        "change_id": "I0123456789abcdef",
        "subject": "Fix the thing",
        "status": "NEW",
        "owner": {"_account_id": 1000, "name": "Jane Doe", "email": "jane@example.com"},
        "_number": 100,
        "revisions": revisions
    }))
}

pub(crate) fn basic_auth_header(user: &str, secret: &str) -> String {
    format!("Basic {}", base64_encode(&format!("{}:{}", user, secret)))
}

fn base64_encode(input: &str) -> String {
    const CHARSET: &[u8] = b"ABCDEFGHIJKLMNOPQRSTUVWXYZabcdefghijklmnopqrstuvwxyz0123456789+/";
    let mut result = String::new();

    for chunk in input.as_bytes().chunks(3) {
        let b0 = chunk[0] as u32;
        let b1 = chunk.get(1).copied().unwrap_or(0) as u32;
        let b2 = chunk.get(2).copied().unwrap_or(0) as u32;
        let triple = (b0 << 16) | (b1 << 8) | b2;

        result.push(CHARSET[((triple >> 18) & 0x3F) as usize] as char);
        result.push(CHARSET[((triple >> 12) & 0x3F) as usize] as char);
        result.push(if chunk.len() > 1 {
            CHARSET[((triple >> 6) & 0x3F) as usize] as char
        } else {
            '='
        });
        result.push(if chunk.len() > 2 {
            CHARSET[(triple & 0x3F) as usize] as char
        } else {
            '='
        });
    }

    result
}

#[test]
fn test_base64_encode() {
    assert_eq!(base64_encode("user:pass"), "dXNlcjpwYXNz");
    assert_eq!(base64_encode("a"), "YQ==");
    assert_eq!(basic_auth_header("alice", "secret"), "Basic YWxpY2U6c2VjcmV0");
}
