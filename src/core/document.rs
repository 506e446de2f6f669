/// Documents exchanged with the server
///
/// On the wire a document is a little-endian `i32` total length (including the
/// four length bytes) followed by a UTF-8 JSON object. Field order is
/// preserved, so the first field of a document is well defined.
use crate::error::{TandemError, TandemResult};
use bytes::{Buf, BufMut, Bytes, BytesMut};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::fmt;

const LENGTH_PREFIX: usize = 4;

/// Ordered field map
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Document(Map<String, Value>);

impl Document {
    pub fn new() -> Self {
        Self(Map::new())
    }

    /// Single-field document, e.g. `{ismaster: 1}`
    pub fn with<K: Into<String>, V: Into<Value>>(key: K, value: V) -> Self {
        let mut doc = Self::new();
        doc.insert(key, value);
        doc
    }

    pub fn insert<K: Into<String>, V: Into<Value>>(&mut self, key: K, value: V) -> Option<Value> {
        self.0.insert(key.into(), value.into())
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.0.get(key)
    }

    pub fn get_str(&self, key: &str) -> Option<&str> {
        self.0.get(key).and_then(Value::as_str)
    }

    pub fn contains_key(&self, key: &str) -> bool {
        self.0.contains_key(key)
    }

    pub fn first_key(&self) -> Option<&str> {
        self.0.keys().next().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Bool-like reading of a field: `true`, non-zero numbers and non-empty
    /// strings are true; missing fields and `null` are false.
    pub fn truthy(&self, key: &str) -> bool {
        match self.0.get(key) {
            Some(Value::Bool(b)) => *b,
            Some(Value::Number(n)) => n.as_f64().map(|f| f != 0.0).unwrap_or(false),
            Some(Value::String(s)) => !s.is_empty(),
            Some(Value::Null) | None => false,
            Some(_) => true,
        }
    }

    /// `ok` field of a command reply
    pub fn is_ok(&self) -> bool {
        self.truthy("ok")
    }

    /// Error message carried by an error document (`$err` first field).
    /// A non-string `$err` is rendered as JSON.
    pub fn error_message(&self) -> Option<String> {
        if self.first_key() != Some("$err") {
            return None;
        }
        self.0.get("$err").map(|value| match value.as_str() {
            Some(s) => s.to_string(),
            None => value.to_string(),
        })
    }

    pub fn into_inner(self) -> Map<String, Value> {
        self.0
    }

    /// Append the wire form of this document to `buf`
    pub fn encode_into(&self, buf: &mut BytesMut) -> TandemResult<()> {
        let body = serde_json::to_vec(&self.0)?;
        let total = i32::try_from(body.len() + LENGTH_PREFIX)
            .map_err(|_| TandemError::protocol("document too large"))?;
        buf.reserve(body.len() + LENGTH_PREFIX);
        buf.put_i32_le(total);
        buf.put_slice(&body);
        Ok(())
    }

    /// Split one document off the front of `buf`
    pub fn decode_from(buf: &mut Bytes) -> TandemResult<Self> {
        if buf.remaining() < LENGTH_PREFIX {
            return Err(TandemError::protocol("truncated document length"));
        }
        let total = buf.get_i32_le();
        let body_len = usize::try_from(total)
            .ok()
            .and_then(|t| t.checked_sub(LENGTH_PREFIX))
            .ok_or_else(|| TandemError::protocol(format!("invalid document length {}", total)))?;
        if buf.remaining() < body_len {
            return Err(TandemError::protocol(format!(
                "document claims {} bytes, {} available",
                body_len,
                buf.remaining()
            )));
        }
        let body = buf.split_to(body_len);
        let map: Map<String, Value> = serde_json::from_slice(&body)?;
        Ok(Self(map))
    }
}

impl TryFrom<Value> for Document {
    type Error = TandemError;

    fn try_from(value: Value) -> TandemResult<Self> {
        match value {
            Value::Object(map) => Ok(Self(map)),
            other => Err(TandemError::protocol(format!(
                "expected a JSON object, got {}",
                other
            ))),
        }
    }
}

impl From<Map<String, Value>> for Document {
    fn from(map: Map<String, Value>) -> Self {
        Self(map)
    }
}

impl From<Document> for Value {
    fn from(doc: Document) -> Self {
        Value::Object(doc.0)
    }
}

impl fmt::Display for Document {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match serde_json::to_string(&self.0) {
            Ok(s) => f.write_str(&s),
            Err(_) => f.write_str("{}"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn doc(value: Value) -> Document {
        Document::try_from(value).unwrap()
    }

    #[test]
    fn test_field_order_preserved() {
        let d = doc(json!({"zeta": 1, "alpha": 2, "$err": "late"}));
        assert_eq!(d.first_key(), Some("zeta"));
        assert_eq!(d.error_message(), None);

        let e = doc(json!({"$err": "not master", "code": 10107}));
        assert_eq!(e.error_message().as_deref(), Some("not master"));
    }

    #[test]
    fn test_non_string_err_is_still_an_error() {
        let d = doc(json!({"$err": {"code": 13435, "msg": "not master"}}));
        let message = d.error_message().unwrap();
        assert!(message.contains("13435"));
        assert!(message.contains("not master"));

        assert_eq!(doc(json!({"$err": 123})).error_message().as_deref(), Some("123"));
        assert_eq!(doc(json!({"$err": null})).error_message().as_deref(), Some("null"));
    }

    #[test]
    fn test_back_to_back_decoding() {
        let mut buf = BytesMut::new();
        doc(json!({"a": 1})).encode_into(&mut buf).unwrap();
        doc(json!({"b": "two"})).encode_into(&mut buf).unwrap();
        let mut bytes = buf.freeze();

        let first = Document::decode_from(&mut bytes).unwrap();
        let second = Document::decode_from(&mut bytes).unwrap();
        assert_eq!(first.get("a"), Some(&json!(1)));
        assert_eq!(second.get_str("b"), Some("two"));
        assert!(bytes.is_empty());
    }

    #[test]
    fn test_truncated_document_rejected() {
        let mut buf = BytesMut::new();
        doc(json!({"a": 1})).encode_into(&mut buf).unwrap();
        let mut bytes = buf.freeze().slice(..6);
        assert!(matches!(
            Document::decode_from(&mut bytes),
            Err(TandemError::Protocol(_))
        ));

        let mut negative = Bytes::from_static(&[0xff, 0xff, 0xff, 0xff]);
        assert!(Document::decode_from(&mut negative).is_err());
    }

    #[test]
    fn test_truthy() {
        let d = doc(json!({
            "t": true, "one": 1.0, "zero": 0, "s": "x", "empty": "", "nil": null
        }));
        assert!(d.truthy("t"));
        assert!(d.truthy("one"));
        assert!(!d.truthy("zero"));
        assert!(d.truthy("s"));
        assert!(!d.truthy("empty"));
        assert!(!d.truthy("nil"));
        assert!(!d.truthy("missing"));
    }

    #[test]
    fn test_non_object_rejected() {
        assert!(Document::try_from(json!([1, 2])).is_err());
    }
}
