//! Wire envelope for the obs-websocket 4.x request/response protocol.
//!
//! Requests are JSON objects `{"request-type", "message-id", ...fields}`.
//! Responses echo `message-id` and carry `status: "ok"` plus fields, or
//! `status: "error"` plus an `error` message.

use crate::error::{RequestError, RequestResult};
use crate::model::ItemRef;
use base64::Engine;
use rand::Rng;
use serde_json::{Map, Value};
use sha2::{Digest, Sha256};

/// A parsed request.
#[derive(Debug, Clone, PartialEq)]
pub struct Request {
    pub request_type: String,
    pub message_id: Value,
    fields: Map<String, Value>,
}

impl Request {
    /// Build a request in code, mostly for tests and the binary.
    pub fn new(request_type: &str, message_id: &str) -> Self {
        Self {
            request_type: request_type.to_string(),
            message_id: Value::String(message_id.to_string()),
            fields: Map::new(),
        }
    }

    pub fn with(mut self, key: &str, value: Value) -> Self {
        self.fields.insert(key.to_string(), value);
        self
    }

    pub fn from_json(value: Value) -> RequestResult<Self> {
        let Value::Object(mut fields) = value else {
            return Err(RequestError::invalid_request("request must be a JSON object"));
        };
        let request_type = match fields.remove("request-type") {
            Some(Value::String(s)) => s,
            _ => return Err(RequestError::invalid_request("missing request-type")),
        };
        let message_id = match fields.remove("message-id") {
            Some(id @ (Value::String(_) | Value::Number(_))) => id,
            _ => return Err(RequestError::invalid_request("missing message-id")),
        };
        Ok(Self {
            request_type,
            message_id,
            fields,
        })
    }

    pub fn to_json(&self) -> Value {
        let mut obj = self.fields.clone();
        obj.insert("request-type".to_string(), Value::String(self.request_type.clone()));
        obj.insert("message-id".to_string(), self.message_id.clone());
        Value::Object(obj)
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.fields.get(key).filter(|v| !v.is_null())
    }

    fn required(&self, key: &str) -> RequestResult<&Value> {
        self.get(key)
            .ok_or_else(|| RequestError::invalid_request(format!("missing request parameter: {}", key)))
    }

    fn wrong_type(key: &str, expected: &str) -> RequestError {
        RequestError::invalid_request(format!("{} must be {}", key, expected))
    }

    pub fn str(&self, key: &str) -> RequestResult<&str> {
        self.required(key)?
            .as_str()
            .ok_or_else(|| Self::wrong_type(key, "a string"))
    }

    pub fn opt_str(&self, key: &str) -> RequestResult<Option<&str>> {
        match self.get(key) {
            None => Ok(None),
            Some(v) => v.as_str().map(Some).ok_or_else(|| Self::wrong_type(key, "a string")),
        }
    }

    pub fn bool(&self, key: &str) -> RequestResult<bool> {
        self.required(key)?
            .as_bool()
            .ok_or_else(|| Self::wrong_type(key, "a boolean"))
    }

    pub fn opt_bool(&self, key: &str) -> RequestResult<Option<bool>> {
        match self.get(key) {
            None => Ok(None),
            Some(v) => v.as_bool().map(Some).ok_or_else(|| Self::wrong_type(key, "a boolean")),
        }
    }

    pub fn f64(&self, key: &str) -> RequestResult<f64> {
        self.required(key)?
            .as_f64()
            .ok_or_else(|| Self::wrong_type(key, "a number"))
    }

    pub fn opt_f64(&self, key: &str) -> RequestResult<Option<f64>> {
        match self.get(key) {
            None => Ok(None),
            Some(v) => v.as_f64().map(Some).ok_or_else(|| Self::wrong_type(key, "a number")),
        }
    }

    pub fn u64(&self, key: &str) -> RequestResult<u64> {
        self.required(key)?
            .as_u64()
            .ok_or_else(|| Self::wrong_type(key, "a non-negative integer"))
    }

    pub fn opt_u64(&self, key: &str) -> RequestResult<Option<u64>> {
        match self.get(key) {
            None => Ok(None),
            Some(v) => v
                .as_u64()
                .map(Some)
                .ok_or_else(|| Self::wrong_type(key, "a non-negative integer")),
        }
    }

    pub fn object(&self, key: &str) -> RequestResult<&Map<String, Value>> {
        self.required(key)?
            .as_object()
            .ok_or_else(|| Self::wrong_type(key, "an object"))
    }

    pub fn opt_object(&self, key: &str) -> RequestResult<Option<&Map<String, Value>>> {
        match self.get(key) {
            None => Ok(None),
            Some(v) => v.as_object().map(Some).ok_or_else(|| Self::wrong_type(key, "an object")),
        }
    }

    /// Scene item reference: either a source name or `{"name"?, "id"?}`, id
    /// taking precedence.
    pub fn item(&self, key: &str) -> RequestResult<ItemRef> {
        match self.required(key)? {
            Value::String(name) => Ok(ItemRef::Name(name.clone())),
            Value::Object(obj) => {
                if let Some(id) = obj.get("id").and_then(Value::as_u64) {
                    return Ok(ItemRef::Id(id));
                }
                match obj.get("name").and_then(Value::as_str) {
                    Some(name) => Ok(ItemRef::Name(name.to_string())),
                    None => Err(Self::wrong_type(key, "a name or {name, id}")),
                }
            }
            _ => Err(Self::wrong_type(key, "a name or {name, id}")),
        }
    }
}

/// `message-id` of a raw request, for error responses to requests that
/// failed to parse.
pub fn message_id_of(raw: &Value) -> Value {
    raw.get("message-id").cloned().unwrap_or(Value::Null)
}

pub fn ok_response(message_id: &Value, body: Map<String, Value>) -> Value {
    let mut obj = body;
    obj.insert("message-id".to_string(), message_id.clone());
    obj.insert("status".to_string(), Value::String("ok".to_string()));
    Value::Object(obj)
}

pub fn error_response(message_id: &Value, err: &RequestError) -> Value {
    let mut obj = Map::new();
    obj.insert("message-id".to_string(), message_id.clone());
    obj.insert("status".to_string(), Value::String("error".to_string()));
    obj.insert("error".to_string(), Value::String(err.to_string()));
    Value::Object(obj)
}

/// Whether a response carries `status: "ok"`.
pub fn is_ok(response: &Value) -> bool {
    response.get("status").and_then(Value::as_str) == Some("ok")
}

/// Generate authentication string per obs-websocket protocol
pub fn generate_auth_string(password: &str, challenge: &str, salt: &str) -> String {
    // Step 1: Concatenate password + salt, then SHA256
    let secret_string = format!("{}{}", password, salt);
    let secret_hash = Sha256::digest(secret_string.as_bytes());
    let secret_base64 = base64::engine::general_purpose::STANDARD.encode(secret_hash);

    // Step 2: Concatenate secret_base64 + challenge, then SHA256
    let auth_string = format!("{}{}", secret_base64, challenge);
    let auth_hash = Sha256::digest(auth_string.as_bytes());
    base64::engine::general_purpose::STANDARD.encode(auth_hash)
}

/// Random base64 token used for salts and challenges.
pub fn random_token() -> String {
    let bytes: [u8; 32] = rand::thread_rng().gen();
    base64::engine::general_purpose::STANDARD.encode(bytes)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_auth_string_matches_protocol_reference() {
        let auth = generate_auth_string(
            "supersecretpassword",
            "+IxH4CnCiqpX1rM9scsNynZzbOe4KhDeYcTNS3PDaeY=",
            "lM1GncleQOaCu9lT1yeUZhFYnqhsLLP1G5lAGo3ixaI=",
        );
        assert_eq!(auth, "1Ct943GAT+6YQUUX47Ia/ncufilbe6+oD6lY+5kaCu4=");
    }

    #[test]
    fn test_random_tokens_differ() {
        let a = random_token();
        assert_eq!(a.len(), 44);
        assert_ne!(a, random_token());
    }

    #[test]
    fn test_parse_request() {
        let req = Request::from_json(json!({
            "request-type": "SetVolume",
            "message-id": "7",
            "source": "Mic/Aux",
            "volume": 0.5,
        }))
        .unwrap();
        assert_eq!(req.request_type, "SetVolume");
        assert_eq!(req.message_id, json!("7"));
        assert_eq!(req.str("source").unwrap(), "Mic/Aux");
        assert_eq!(req.f64("volume").unwrap(), 0.5);
        assert_eq!(req.opt_bool("useDecibel").unwrap(), None);
    }

    #[test]
    fn test_missing_and_ill_typed_fields() {
        let req = Request::new("SetMute", "1").with("mute", json!("yes"));
        assert!(matches!(req.str("source"), Err(RequestError::InvalidRequest(_))));
        assert!(matches!(req.bool("mute"), Err(RequestError::InvalidRequest(_))));
    }

    #[test]
    fn test_parse_rejects_missing_envelope() {
        assert!(Request::from_json(json!({"message-id": "1"})).is_err());
        assert!(Request::from_json(json!({"request-type": "GetVersion"})).is_err());
        assert!(Request::from_json(json!([1, 2])).is_err());
        assert_eq!(message_id_of(&json!({"message-id": "x"})), json!("x"));
    }

    #[test]
    fn test_item_reference_forms() {
        let by_name = Request::new("X", "1").with("item", json!("Webcam"));
        assert_eq!(by_name.item("item").unwrap(), ItemRef::Name("Webcam".into()));

        let by_id = Request::new("X", "1").with("item", json!({"name": "Webcam", "id": 4}));
        assert_eq!(by_id.item("item").unwrap(), ItemRef::Id(4));
    }

    #[test]
    fn test_envelopes() {
        let mut body = Map::new();
        body.insert("name".into(), json!("Live"));
        let ok = ok_response(&json!("3"), body);
        assert!(is_ok(&ok));
        assert_eq!(ok["message-id"], json!("3"));

        let err = error_response(&json!("4"), &RequestError::NotConnected);
        assert!(!is_ok(&err));
        assert_eq!(err["error"], json!("not connected"));
    }
}
