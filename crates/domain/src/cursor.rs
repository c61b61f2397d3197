use base64::Engine;
use base64::engine::general_purpose::URL_SAFE;

use crate::DomainResult;
use crate::error::DomainError;

/// Opaque pagination token: URL-safe base64 over `<occurred_at_ms>:<id>`.
///
/// Decoding is strict. A token that fails any stage is reported as
/// `MalformedCursor`, never silently truncated and never treated as
/// "no more results".
pub fn encode(occurred_at_ms: i64, activity_id: &str) -> String {
    URL_SAFE.encode(format!("{occurred_at_ms}:{activity_id}"))
}

pub fn decode(token: &str) -> DomainResult<(i64, String)> {
    let bytes = URL_SAFE
        .decode(token)
        .map_err(|_| DomainError::MalformedCursor("cursor is not valid base64".into()))?;
    let decoded = String::from_utf8(bytes)
        .map_err(|_| DomainError::MalformedCursor("cursor is not valid utf-8".into()))?;
    let (occurred_raw, id) = decoded.split_once(':').ok_or_else(|| {
        DomainError::MalformedCursor("expected <occurred_at_ms>:<activity_id>".into())
    })?;
    let occurred_at_ms = occurred_raw
        .parse::<i64>()
        .map_err(|_| DomainError::MalformedCursor("cursor timestamp is not a number".into()))?;
    if id.trim().is_empty() {
        return Err(DomainError::MalformedCursor(
            "cursor activity id is empty".into(),
        ));
    }
    Ok((occurred_at_ms, id.to_string()))
}

pub fn decode_optional(token: Option<&str>) -> DomainResult<(Option<i64>, Option<String>)> {
    match token.filter(|token| !token.is_empty()) {
        None => Ok((None, None)),
        Some(token) => {
            let (occurred_at_ms, id) = decode(token)?;
            Ok((Some(occurred_at_ms), Some(id)))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn round_trips_exactly() {
        let token = encode(1_739_750_400_000, "018f9b2cd4f1aa11bbee223344556677");
        let (occurred_at_ms, id) = decode(&token).expect("decode");
        assert_eq!(occurred_at_ms, 1_739_750_400_000);
        assert_eq!(id, "018f9b2cd4f1aa11bbee223344556677");
    }

    #[test]
    fn round_trips_negative_timestamps() {
        let token = encode(-5, "a");
        assert_eq!(decode(&token).expect("decode"), (-5, "a".to_string()));
    }

    #[test]
    fn rejects_invalid_base64() {
        let err = decode("not base64 at all!!").unwrap_err();
        assert!(matches!(err, DomainError::MalformedCursor(_)));
    }

    #[test]
    fn rejects_non_utf8_payload() {
        let token = URL_SAFE.encode([0xff, 0xfe, 0xfd]);
        let err = decode(&token).unwrap_err();
        assert!(matches!(err, DomainError::MalformedCursor(_)));
    }

    #[test]
    fn rejects_missing_separator() {
        let token = URL_SAFE.encode("123456789");
        let err = decode(&token).unwrap_err();
        assert!(matches!(err, DomainError::MalformedCursor(_)));
    }

    #[test]
    fn rejects_non_numeric_timestamp() {
        let token = URL_SAFE.encode("soon:id-1");
        let err = decode(&token).unwrap_err();
        assert!(matches!(err, DomainError::MalformedCursor(_)));
    }

    #[test]
    fn rejects_blank_id() {
        let token = URL_SAFE.encode("100:");
        let err = decode(&token).unwrap_err();
        assert!(matches!(err, DomainError::MalformedCursor(_)));
    }

    #[test]
    fn optional_absent_cursor_starts_from_top() {
        assert_eq!(decode_optional(None).expect("decode"), (None, None));
        assert_eq!(decode_optional(Some("")).expect("decode"), (None, None));
    }
}
