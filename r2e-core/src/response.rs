//! Response construction helpers shared by the specializer and pipeline.

use bytes::Bytes;
use http::{Response as HttpResponse, StatusCode};

/// The engine's response type: a standard `http::Response` over an owned
/// byte buffer. The transport adapter is the only place that streams it out.
pub type Response = HttpResponse<Bytes>;

pub const TEXT_PLAIN: &str = "text/plain; charset=utf-8";
pub const APPLICATION_JSON: &str = "application/json; charset=utf-8";

pub fn text(status: StatusCode, body: impl Into<String>) -> Response {
    HttpResponse::builder()
        .status(status)
        .header("content-type", TEXT_PLAIN)
        .body(Bytes::from(body.into()))
        .expect("status/header values are always valid")
}

pub fn json_bytes(status: StatusCode, body: Bytes) -> Response {
    HttpResponse::builder()
        .status(status)
        .header("content-type", APPLICATION_JSON)
        .body(body)
        .expect("status/header values are always valid")
}

pub fn json_value(status: StatusCode, value: &serde_json::Value) -> Response {
    json_bytes(
        status,
        Bytes::from(serde_json::to_vec(value).unwrap_or_default()),
    )
}

pub fn empty(status: StatusCode) -> Response {
    HttpResponse::builder()
        .status(status)
        .body(Bytes::new())
        .expect("status is always valid")
}

/// Auto-serialize a dynamic handler return value per §4.3: scalar JSON
/// values (`string`/`number`/`bool`/`null`) become `text/plain`, anything
/// else (object/array) becomes `application/json`.
pub fn auto_serialize(status: StatusCode, value: &serde_json::Value) -> Response {
    match value {
        serde_json::Value::String(s) => text(status, s.clone()),
        serde_json::Value::Number(n) => text(status, n.to_string()),
        serde_json::Value::Bool(b) => text(status, b.to_string()),
        serde_json::Value::Null => text(status, String::new()),
        other => json_value(status, other),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn auto_serialize_scalars_are_text_plain() {
        for value in [
            serde_json::json!("hello"),
            serde_json::json!(42),
            serde_json::json!(true),
            serde_json::Value::Null,
        ] {
            let resp = auto_serialize(StatusCode::OK, &value);
            assert_eq!(resp.headers().get("content-type").unwrap(), TEXT_PLAIN);
        }
    }

    #[test]
    fn auto_serialize_object_is_json() {
        let value = serde_json::json!({"a": 1});
        let resp = auto_serialize(StatusCode::OK, &value);
        assert_eq!(
            resp.headers().get("content-type").unwrap(),
            APPLICATION_JSON
        );
        assert_eq!(resp.body().as_ref(), br#"{"a":1}"#);
    }

    #[test]
    fn auto_serialize_array_is_json() {
        let value = serde_json::json!([1, 2, 3]);
        let resp = auto_serialize(StatusCode::OK, &value);
        assert_eq!(
            resp.headers().get("content-type").unwrap(),
            APPLICATION_JSON
        );
    }
}
