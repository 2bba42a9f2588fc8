//! Record normalization applied before anything is persisted.

use mirror_store::Document;
use serde::Serialize;
use serde_json::Value;

/// Drop every null-valued field. Falsy but present values (`0`, `false`,
/// `""`) are kept.
pub fn strip_nulls(mut document: Document) -> Document {
    document.retain(|_, value| !value.is_null());
    document
}

/// Serialize `record` into a document and strip its null fields.
///
/// Non-object serializations (a bare number, a list) yield an empty document.
pub fn sanitize<T: Serialize>(record: &T) -> Result<Document, serde_json::Error> {
    match serde_json::to_value(record)? {
        Value::Object(document) => Ok(strip_nulls(document)),
        _ => Ok(Document::new()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_strip_nulls_keeps_falsy_values() {
        let document = json!({ "a": 1, "b": null, "d": 0, "e": false, "f": "" })
            .as_object()
            .cloned()
            .unwrap();

        let sanitized = strip_nulls(document);
        assert_eq!(
            Value::Object(sanitized),
            json!({ "a": 1, "d": 0, "e": false, "f": "" })
        );
    }

    #[test]
    fn test_sanitize_drops_absent_options() {
        #[derive(Serialize)]
        struct Record {
            a: u64,
            b: Option<u64>,
            c: Option<String>,
            d: u64,
        }

        let sanitized = sanitize(&Record {
            a: 1,
            b: None,
            c: None,
            d: 0,
        })
        .unwrap();
        assert_eq!(Value::Object(sanitized), json!({ "a": 1, "d": 0 }));
    }

    #[test]
    fn test_sanitize_is_shallow() {
        let sanitized = sanitize(&json!({ "receipt": { "contractAddress": null } })).unwrap();
        assert_eq!(
            Value::Object(sanitized),
            json!({ "receipt": { "contractAddress": null } })
        );
    }
}
