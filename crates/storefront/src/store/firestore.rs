//! Firestore REST API client.
//!
//! Talks to `projects/{project}/databases/(default)/documents` using the v1
//! REST surface. Only three calls are used:
//!
//! - `GET {collection}/{key}` to read a document (404 means absent)
//! - `PATCH {collection}/{key}` without a mask to create or replace
//! - `PATCH {collection}/{key}?updateMask.fieldPaths=...` to merge fields
//!
//! Values use Firestore's typed JSON encoding (`stringValue`,
//! `timestampValue`, `integerValue` as a decimal string, ...).

use chrono::{DateTime, SecondsFormat, Utc};
use reqwest::StatusCode;
use secrecy::{ExposeSecret, SecretString};
use serde::Deserialize;
use serde_json::{Map, Value, json};
use tracing::instrument;
use url::Url;

use super::{Document, DocumentStore, FieldValue, Fields, StoreError};
use crate::config::FirestoreConfig;

/// Production Firestore endpoint.
const FIRESTORE_URL: &str = "https://firestore.googleapis.com/v1/";

/// Access token accepted by the Firestore emulator for admin access.
const EMULATOR_OWNER_TOKEN: &str = "owner";

/// Firestore document store.
#[derive(Clone)]
pub struct FirestoreClient {
    client: reqwest::Client,
    documents_url: Url,
    access_token: Option<SecretString>,
}

impl std::fmt::Debug for FirestoreClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FirestoreClient")
            .field("documents_url", &self.documents_url.as_str())
            .field("access_token", &self.access_token.as_ref().map(|_| "[REDACTED]"))
            .finish()
    }
}

#[derive(Deserialize)]
struct WireDocument {
    #[serde(default)]
    fields: Map<String, Value>,
}

#[derive(Deserialize)]
struct WireError {
    error: WireErrorBody,
}

#[derive(Deserialize)]
struct WireErrorBody {
    message: String,
}

impl FirestoreClient {
    /// Create a client for the configured project.
    ///
    /// When `FIRESTORE_EMULATOR_HOST` is set, requests go to the emulator over
    /// plain HTTP and fall back to the emulator's owner token.
    ///
    /// # Errors
    ///
    /// Returns an error if the endpoint URL is invalid or the HTTP client
    /// fails to build.
    pub fn new(config: &FirestoreConfig) -> Result<Self, StoreError> {
        let base = match &config.emulator_host {
            Some(host) => format!("http://{host}/v1/"),
            None => FIRESTORE_URL.to_owned(),
        };
        let documents_url = Url::parse(&base)
            .and_then(|url| {
                url.join(&format!(
                    "projects/{}/databases/(default)/documents/",
                    config.project_id
                ))
            })
            .map_err(|e| StoreError::Unavailable(format!("invalid Firestore URL: {e}")))?;

        let access_token = config.access_token.clone().or_else(|| {
            config
                .emulator_host
                .as_ref()
                .map(|_| SecretString::from(EMULATOR_OWNER_TOKEN))
        });

        let client = reqwest::Client::builder()
            .timeout(std::time::Duration::from_secs(10))
            .build()?;

        Ok(Self {
            client,
            documents_url,
            access_token,
        })
    }

    fn document_url(&self, collection: &str, key: &str) -> Result<Url, StoreError> {
        let mut url = self.documents_url.clone();
        url.path_segments_mut()
            .map_err(|()| StoreError::Unavailable("Firestore URL cannot be a base".to_owned()))?
            .pop_if_empty()
            .push(collection)
            .push(key);
        Ok(url)
    }

    fn authorize(&self, request: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        match &self.access_token {
            Some(token) => request.bearer_auth(token.expose_secret()),
            None => request,
        }
    }

    async fn patch(&self, url: Url, fields: &Fields) -> Result<(), StoreError> {
        let body = json!({ "fields": encode_fields(fields) });
        let response = self
            .authorize(self.client.patch(url))
            .json(&body)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            return Err(api_error(status, response).await);
        }
        Ok(())
    }
}

async fn api_error(status: StatusCode, response: reqwest::Response) -> StoreError {
    let body = response.text().await.unwrap_or_default();
    let message = serde_json::from_str::<WireError>(&body)
        .map(|e| e.error.message)
        .unwrap_or(body);

    if status == StatusCode::SERVICE_UNAVAILABLE {
        return StoreError::Unavailable(message);
    }
    StoreError::Api {
        status: status.as_u16(),
        message,
    }
}

#[async_trait::async_trait]
impl DocumentStore for FirestoreClient {
    #[instrument(skip(self))]
    async fn get(&self, collection: &str, key: &str) -> Result<Option<Document>, StoreError> {
        let url = self.document_url(collection, key)?;
        let response = self.authorize(self.client.get(url)).send().await?;

        let status = response.status();
        if status == StatusCode::NOT_FOUND {
            return Ok(None);
        }
        if !status.is_success() {
            return Err(api_error(status, response).await);
        }

        let body = response.text().await?;
        let wire: WireDocument = serde_json::from_str(&body)?;
        Ok(Some(Document::from_fields(decode_fields(&wire.fields)?)))
    }

    #[instrument(skip(self, document))]
    async fn set(
        &self,
        collection: &str,
        key: &str,
        document: Document,
    ) -> Result<(), StoreError> {
        let url = self.document_url(collection, key)?;
        self.patch(url, document.fields()).await
    }

    #[instrument(skip(self, fields))]
    async fn merge(&self, collection: &str, key: &str, fields: Fields) -> Result<(), StoreError> {
        let mut url = self.document_url(collection, key)?;
        {
            let mut query = url.query_pairs_mut();
            for name in fields.keys() {
                query.append_pair("updateMask.fieldPaths", name);
            }
        }
        self.patch(url, &fields).await
    }
}

// =============================================================================
// Value encoding
// =============================================================================

fn encode_fields(fields: &Fields) -> Value {
    Value::Object(
        fields
            .iter()
            .map(|(name, value)| (name.clone(), encode_value(value)))
            .collect(),
    )
}

fn encode_value(value: &FieldValue) -> Value {
    match value {
        FieldValue::Null => json!({ "nullValue": null }),
        FieldValue::Boolean(b) => json!({ "booleanValue": b }),
        // 64-bit integers travel as decimal strings
        FieldValue::Integer(i) => json!({ "integerValue": i.to_string() }),
        FieldValue::Double(d) => json!({ "doubleValue": d }),
        FieldValue::String(s) => json!({ "stringValue": s }),
        FieldValue::Timestamp(ts) => {
            json!({ "timestampValue": ts.to_rfc3339_opts(SecondsFormat::Micros, true) })
        }
        FieldValue::Array(values) => json!({
            "arrayValue": { "values": values.iter().map(encode_value).collect::<Vec<_>>() }
        }),
        FieldValue::Map(fields) => json!({ "mapValue": { "fields": encode_fields(fields) } }),
    }
}

fn decode_fields(fields: &Map<String, Value>) -> Result<Fields, StoreError> {
    fields
        .iter()
        .map(|(name, value)| Ok((name.clone(), decode_value(value)?)))
        .collect()
}

fn decode_value(value: &Value) -> Result<FieldValue, StoreError> {
    let Some((kind, inner)) = value.as_object().and_then(|o| o.iter().next()) else {
        return Err(StoreError::DataCorruption(format!(
            "expected typed value, got {value}"
        )));
    };

    let corrupt = || StoreError::DataCorruption(format!("invalid {kind}: {inner}"));

    match kind.as_str() {
        "nullValue" => Ok(FieldValue::Null),
        "booleanValue" => inner.as_bool().map(FieldValue::Boolean).ok_or_else(corrupt),
        "integerValue" => match inner {
            Value::String(s) => s.parse().map(FieldValue::Integer).map_err(|_| corrupt()),
            Value::Number(n) => n.as_i64().map(FieldValue::Integer).ok_or_else(corrupt),
            _ => Err(corrupt()),
        },
        "doubleValue" => inner.as_f64().map(FieldValue::Double).ok_or_else(corrupt),
        "stringValue" | "referenceValue" | "bytesValue" => inner
            .as_str()
            .map(|s| FieldValue::String(s.to_owned()))
            .ok_or_else(corrupt),
        "timestampValue" => inner
            .as_str()
            .and_then(|s| DateTime::parse_from_rfc3339(s).ok())
            .map(|ts| FieldValue::Timestamp(ts.with_timezone(&Utc)))
            .ok_or_else(corrupt),
        "arrayValue" => inner
            .get("values")
            .and_then(Value::as_array)
            .map_or(Ok(Vec::new()), |values| {
                values.iter().map(decode_value).collect()
            })
            .map(FieldValue::Array),
        "mapValue" => inner
            .get("fields")
            .and_then(Value::as_object)
            .map_or(Ok(Fields::new()), decode_fields)
            .map(FieldValue::Map),
        // { "latitude": f64, "longitude": f64 }
        "geoPointValue" => {
            let object = inner.as_object().ok_or_else(corrupt)?;
            let mut fields = Fields::new();
            for (name, degrees) in object {
                let degrees = degrees.as_f64().ok_or_else(corrupt)?;
                fields.insert(name.clone(), FieldValue::Double(degrees));
            }
            Ok(FieldValue::Map(fields))
        }
        other => Err(StoreError::DataCorruption(format!(
            "unsupported value type {other}"
        ))),
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn config(emulator: Option<&str>) -> FirestoreConfig {
        FirestoreConfig {
            project_id: "demo-shop".to_owned(),
            access_token: None,
            emulator_host: emulator.map(str::to_owned),
        }
    }

    #[test]
    fn test_document_url_production() {
        let client = FirestoreClient::new(&config(None)).unwrap();
        let url = client.document_url("users", "abc123").unwrap();
        assert_eq!(
            url.as_str(),
            "https://firestore.googleapis.com/v1/projects/demo-shop/databases/(default)/documents/users/abc123"
        );
        assert!(client.access_token.is_none());
    }

    #[test]
    fn test_document_url_emulator_uses_owner_token() {
        let client = FirestoreClient::new(&config(Some("localhost:8080"))).unwrap();
        let url = client.document_url("users", "abc").unwrap();
        assert!(url.as_str().starts_with("http://localhost:8080/v1/projects/demo-shop/"));
        assert_eq!(
            client.access_token.as_ref().unwrap().expose_secret(),
            EMULATOR_OWNER_TOKEN
        );
    }

    #[test]
    fn test_document_key_is_escaped() {
        let client = FirestoreClient::new(&config(None)).unwrap();
        let url = client.document_url("users", "a b").unwrap();
        assert!(url.as_str().ends_with("/users/a%20b"));
    }

    #[test]
    fn test_encode_profile_fields() {
        let ts = Utc.with_ymd_and_hms(2024, 5, 1, 12, 0, 0).unwrap();
        let mut fields = Fields::new();
        fields.insert("role".to_owned(), FieldValue::from("admin"));
        fields.insert("updatedAt".to_owned(), FieldValue::from(ts));
        fields.insert("logins".to_owned(), FieldValue::Integer(3));

        let encoded = encode_fields(&fields);
        assert_eq!(
            encoded,
            json!({
                "role": { "stringValue": "admin" },
                "updatedAt": { "timestampValue": "2024-05-01T12:00:00.000000Z" },
                "logins": { "integerValue": "3" },
            })
        );
    }

    #[test]
    fn test_decode_firestore_document() {
        let body = json!({
            "name": "projects/demo-shop/databases/(default)/documents/users/u1",
            "fields": {
                "email": { "stringValue": "a@b.com" },
                "createdAt": { "timestampValue": "2024-05-01T12:00:00.123456Z" },
                "tags": { "arrayValue": { "values": [ { "stringValue": "x" } ] } },
                "empty": { "arrayValue": {} },
                "prefs": { "mapValue": { "fields": { "dark": { "booleanValue": true } } } },
                "gone": { "nullValue": null }
            },
            "createTime": "2024-05-01T12:00:00.123456Z",
            "updateTime": "2024-05-01T12:00:00.123456Z"
        });
        let wire: WireDocument = serde_json::from_value(body).unwrap();
        let doc = Document::from_fields(decode_fields(&wire.fields).unwrap());

        assert_eq!(doc.get_str("email"), Some("a@b.com"));
        assert!(doc.get_timestamp("createdAt").is_some());
        assert_eq!(
            doc.get("tags"),
            Some(&FieldValue::Array(vec![FieldValue::from("x")]))
        );
        assert_eq!(doc.get("empty"), Some(&FieldValue::Array(Vec::new())));
        assert_eq!(doc.get("gone"), Some(&FieldValue::Null));
        let Some(FieldValue::Map(prefs)) = doc.get("prefs") else {
            panic!("expected map");
        };
        assert_eq!(prefs.get("dark"), Some(&FieldValue::Boolean(true)));
    }

    #[test]
    fn test_decode_document_without_fields() {
        let wire: WireDocument = serde_json::from_value(json!({ "name": "x" })).unwrap();
        assert!(decode_fields(&wire.fields).unwrap().is_empty());
    }

    #[test]
    fn test_decode_rejects_malformed_values() {
        assert!(matches!(
            decode_value(&json!("plain")),
            Err(StoreError::DataCorruption(_))
        ));
        assert!(matches!(
            decode_value(&json!({ "integerValue": "twelve" })),
            Err(StoreError::DataCorruption(_))
        ));
        assert!(matches!(
            decode_value(&json!({ "timestampValue": "yesterday" })),
            Err(StoreError::DataCorruption(_))
        ));
    }

    #[test]
    fn test_decode_integer_accepts_number() {
        assert_eq!(
            decode_value(&json!({ "integerValue": 7 })).unwrap(),
            FieldValue::Integer(7)
        );
    }
}
