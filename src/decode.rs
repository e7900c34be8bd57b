//! Response decoding: raw success payloads → typed results.
//!
//! Anything that does not match the backend contract (missing required
//! fields, wrong types, negative counters, confidence outside `[0, 1]`) is an
//! [`Error::Validation`]. Validation errors are never retried.

use serde::Deserialize;
use serde_json::{Map, Value};

use crate::types::{
    CatalogEntry, Conversation, ConversationSummary, FeedbackAck, HealthStatus, QueryResponse,
    Source, SourceKind, ThinkingStep, Timing, TokenUsage,
};
use crate::{Error, ErrorContext, Result};

/// Tag the backend puts on web results inside `docs`.
const WEB_TAG: &str = "internet";

fn invalid(source: &str, field: &str, msg: impl Into<String>) -> Error {
    Error::validation_with_context(
        msg,
        ErrorContext::new()
            .with_field_path(field)
            .with_source(source),
    )
}

/// Parse a body as a JSON object.
pub(crate) fn parse_object(body: &[u8], source: &str) -> Result<Map<String, Value>> {
    let value: Value = serde_json::from_slice(body).map_err(|e| {
        Error::validation_with_context(
            format!("Failed to parse response JSON: {}", e),
            ErrorContext::new().with_source(source),
        )
    })?;
    match value {
        Value::Object(map) => Ok(map),
        other => Err(invalid(
            source,
            "$",
            format!("Expected a JSON object, got {}", type_name(&other)),
        )),
    }
}

fn type_name(v: &Value) -> &'static str {
    match v {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

/// A field, with JSON `null` treated as absent.
fn field<'a>(obj: &'a Map<String, Value>, name: &str) -> Option<&'a Value> {
    obj.get(name).filter(|v| !v.is_null())
}

fn opt_string(obj: &Map<String, Value>, name: &str, source: &str) -> Result<Option<String>> {
    match field(obj, name) {
        None => Ok(None),
        Some(Value::String(s)) => Ok(Some(s.clone())),
        Some(other) => Err(invalid(
            source,
            name,
            format!("Expected string, got {}", type_name(other)),
        )),
    }
}

fn req_string(obj: &Map<String, Value>, name: &str, source: &str) -> Result<String> {
    opt_string(obj, name, source)?
        .ok_or_else(|| invalid(source, name, format!("Missing required field '{}'", name)))
}

fn string_list(obj: &Map<String, Value>, name: &str, source: &str) -> Result<Vec<String>> {
    match field(obj, name) {
        None => Ok(Vec::new()),
        Some(Value::Array(items)) => items
            .iter()
            .enumerate()
            .map(|(i, v)| match v {
                Value::String(s) => Ok(s.clone()),
                other => Err(invalid(
                    source,
                    &format!("{}[{}]", name, i),
                    format!("Expected string, got {}", type_name(other)),
                )),
            })
            .collect(),
        Some(other) => Err(invalid(
            source,
            name,
            format!("Expected array, got {}", type_name(other)),
        )),
    }
}

fn array<'a>(obj: &'a Map<String, Value>, name: &str, source: &str) -> Result<&'a [Value]> {
    match field(obj, name) {
        None => Ok(&[]),
        Some(Value::Array(items)) => Ok(items.as_slice()),
        Some(other) => Err(invalid(
            source,
            name,
            format!("Expected array, got {}", type_name(other)),
        )),
    }
}

/// A non-negative integer counter. Integral floats (`12.0`) are accepted.
fn counter(value: &Value, path: &str, source: &str) -> Result<u64> {
    if let Some(n) = value.as_u64() {
        return Ok(n);
    }
    match value.as_f64() {
        Some(f) if f.is_finite() && f >= 0.0 && f.fract() == 0.0 => Ok(f as u64),
        Some(f) if f < 0.0 => Err(invalid(source, path, format!("Must be non-negative, got {}", f))),
        _ => Err(invalid(
            source,
            path,
            format!("Expected non-negative integer, got {}", value),
        )),
    }
}

/// Confidence must be a finite number within `[0, 1]`; it is never clamped.
fn confidence(value: Option<&Value>, path: &str, source: &str) -> Result<Option<f64>> {
    let Some(value) = value.filter(|v| !v.is_null()) else {
        return Ok(None);
    };
    let c = value
        .as_f64()
        .ok_or_else(|| invalid(source, path, format!("Expected number, got {}", type_name(value))))?;
    if !(0.0..=1.0).contains(&c) {
        return Err(Error::validation_with_context(
            "Confidence must be within [0, 1]",
            ErrorContext::new()
                .with_field_path(path)
                .with_details(c.to_string())
                .with_source(source),
        ));
    }
    Ok(Some(c))
}

/// Wire form of `timing`: a list of single-entry maps, or one map.
#[derive(Deserialize)]
#[serde(untagged)]
pub(crate) enum TimingWire {
    List(Vec<Map<String, Value>>),
    Map(Map<String, Value>),
}

impl TryFrom<TimingWire> for Timing {
    type Error = Error;

    fn try_from(wire: TimingWire) -> Result<Self> {
        let entries: Vec<(String, Value)> = match wire {
            TimingWire::List(steps) => steps.into_iter().flatten().collect(),
            TimingWire::Map(map) => map.into_iter().collect(),
        };
        let mut stages = Vec::with_capacity(entries.len());
        for (name, value) in entries {
            let secs = value.as_f64().ok_or_else(|| {
                invalid(
                    "timing",
                    &format!("timing.{}", name),
                    format!("Expected number, got {}", type_name(&value)),
                )
            })?;
            stages.push((name, secs));
        }
        Timing::from_stages(stages)
    }
}

fn decode_timing(value: Option<&Value>) -> Result<Timing> {
    match value.filter(|v| !v.is_null()) {
        None => Ok(Timing::default()),
        Some(v) => {
            let wire = TimingWire::deserialize(v)
                .map_err(|e| invalid("decode_query", "timing", format!("Malformed timing: {}", e)))?;
            Timing::try_from(wire)
        }
    }
}

fn decode_tokens(value: Option<&Value>) -> Result<TokenUsage> {
    let Some(value) = value.filter(|v| !v.is_null()) else {
        return Ok(TokenUsage::default());
    };
    let obj = value
        .as_object()
        .ok_or_else(|| invalid("decode_query", "token_counts", "Expected object"))?;
    let read = |key: &str| -> Result<u64> {
        match field(obj, key) {
            None => Ok(0),
            Some(v) => counter(v, &format!("token_counts.{}", key), "decode_query"),
        }
    };
    Ok(TokenUsage::new(read("input")?, read("output")?))
}

fn decode_source(value: &Value, path: &str, default_kind: SourceKind) -> Result<Source> {
    const SRC: &str = "decode_query";
    let obj = value
        .as_object()
        .ok_or_else(|| invalid(SRC, path, format!("Expected object, got {}", type_name(value))))?;
    let tag = opt_string(obj, "tag", SRC)?;
    let page = match field(obj, "page") {
        None => None,
        Some(v) => {
            let n = counter(v, &format!("{}.page", path), SRC)?;
            Some(u32::try_from(n).map_err(|_| invalid(SRC, &format!("{}.page", path), "Page out of range"))?)
        }
    };
    let kind = if tag.as_deref() == Some(WEB_TAG) {
        SourceKind::Web
    } else {
        default_kind
    };
    Ok(Source {
        kind,
        title: opt_string(obj, "title", SRC)?,
        source: opt_string(obj, "source", SRC)?,
        environment: opt_string(obj, "environment", SRC)?,
        tag,
        page,
    })
}

fn decode_thinking(items: &[Value]) -> Result<Vec<ThinkingStep>> {
    items
        .iter()
        .enumerate()
        .map(|(index, v)| {
            let content = match v {
                Value::String(s) => s.clone(),
                Value::Object(obj) => ["content", "text", "step"]
                    .iter()
                    .find_map(|k| field(obj, k).and_then(|v| v.as_str()))
                    .map(str::to_string)
                    .ok_or_else(|| {
                        invalid(
                            "decode_query",
                            &format!("thinking_process[{}]", index),
                            "Thinking step has no text content",
                        )
                    })?,
                other => {
                    return Err(invalid(
                        "decode_query",
                        &format!("thinking_process[{}]", index),
                        format!("Expected string or object, got {}", type_name(other)),
                    ))
                }
            };
            Ok(ThinkingStep { index, content })
        })
        .collect()
}

/// Decode a `/query_complete` payload.
///
/// `success` and `conversation_id` are required. A payload with
/// `success: false` or an `error` message is returned as a response whose
/// [`QueryResponse::is_error`] is true.
pub fn decode_query(body: &[u8], sent_query: &str) -> Result<QueryResponse> {
    const SRC: &str = "decode_query";
    let obj = parse_object(body, SRC)?;

    let success = match field(&obj, "success") {
        Some(Value::Bool(b)) => *b,
        Some(other) => {
            return Err(invalid(SRC, "success", format!("Expected boolean, got {}", type_name(other))))
        }
        None => return Err(invalid(SRC, "success", "Missing required field 'success'")),
    };
    let conversation_id = req_string(&obj, "conversation_id", SRC)?;

    let error = match field(&obj, "error") {
        None => None,
        Some(Value::String(s)) => Some(s.clone()),
        Some(other) => Some(other.to_string()),
    };

    let docs = array(&obj, "docs", SRC)?
        .iter()
        .enumerate()
        .map(|(i, v)| decode_source(v, &format!("docs[{}]", i), SourceKind::Document))
        .collect::<Result<Vec<_>>>()?;
    let webs = array(&obj, "webs", SRC)?
        .iter()
        .enumerate()
        .map(|(i, v)| decode_source(v, &format!("webs[{}]", i), SourceKind::Web))
        .collect::<Result<Vec<_>>>()?;

    let links = array(&obj, "links", SRC)?
        .iter()
        .map(|v| match v {
            Value::String(s) => s.clone(),
            other => other.to_string(),
        })
        .collect();

    Ok(QueryResponse {
        success,
        error,
        conversation_id,
        message_id: opt_string(&obj, "message_id", SRC)?.unwrap_or_default(),
        query: opt_string(&obj, "query", SRC)?.unwrap_or_else(|| sent_query.to_string()),
        text: opt_string(&obj, "response_text", SRC)?.unwrap_or_default(),
        confidence: confidence(obj.get("confidence"), "confidence", SRC)?,
        recommended_response: opt_string(&obj, "recommended_response", SRC)?,
        query_extended: opt_string(&obj, "query_extended", SRC)?,
        token_usage: decode_tokens(obj.get("token_counts"))?,
        timing: decode_timing(obj.get("timing"))?,
        inferred_environments: string_list(&obj, "inferred_environments", SRC)?,
        docs,
        webs,
        links,
        thinking: decode_thinking(array(&obj, "thinking_process", SRC)?)?,
    })
}

pub fn decode_health(body: &[u8]) -> Result<HealthStatus> {
    let obj = parse_object(body, "decode_health")?;
    serde_json::from_value(Value::Object(obj))
        .map_err(|e| invalid("decode_health", "status", format!("Malformed health payload: {}", e)))
}

/// `GET /get_env` → `environment`, in server order.
pub fn decode_environments(body: &[u8]) -> Result<Vec<String>> {
    let obj = parse_object(body, "decode_environments")?;
    string_list(&obj, "environment", "decode_environments")
}

/// `GET /get_env` → `conversations`, in server order.
pub fn decode_conversation_list(body: &[u8]) -> Result<Vec<ConversationSummary>> {
    const SRC: &str = "decode_conversation_list";
    let obj = parse_object(body, SRC)?;
    array(&obj, "conversations", SRC)?
        .iter()
        .enumerate()
        .map(|(i, v)| {
            ConversationSummary::deserialize(v)
                .map_err(|e| invalid(SRC, &format!("conversations[{}]", i), e.to_string()))
        })
        .collect()
}

pub fn decode_conversation(body: &[u8]) -> Result<Conversation> {
    const SRC: &str = "decode_conversation";
    let obj = parse_object(body, SRC)?;
    let conversation = Conversation::deserialize(Value::Object(obj))
        .map_err(|e| invalid(SRC, "$", format!("Malformed conversation: {}", e)))?;
    for (i, m) in conversation.messages.iter().enumerate() {
        let value = m.confidence.map(Value::from);
        confidence(value.as_ref(), &format!("messages[{}].confidence", i), SRC)?;
    }
    Ok(conversation)
}

/// `POST /new-workspace` → the new conversation id.
pub fn decode_created_conversation(body: &[u8]) -> Result<String> {
    const SRC: &str = "decode_created_conversation";
    let obj = parse_object(body, SRC)?;
    let id = req_string(&obj, "conversation_id", SRC)?;
    if id.trim().is_empty() {
        return Err(invalid(SRC, "conversation_id", "Server returned an empty conversation id"));
    }
    Ok(id)
}

/// A prompt or style listing under `key`, in server order.
pub fn decode_catalog(body: &[u8], key: &str) -> Result<Vec<CatalogEntry>> {
    let source = format!("decode_{}", key);
    let obj = parse_object(body, &source)?;
    array(&obj, key, &source)?
        .iter()
        .enumerate()
        .map(|(i, v)| {
            let path = format!("{}[{}]", key, i);
            match v {
                Value::String(s) => Ok(CatalogEntry {
                    id: s.clone(),
                    description: None,
                    extra: Map::new(),
                }),
                Value::Object(entry) => {
                    let id = opt_string(entry, "id", &source)?
                        .or(opt_string(entry, "name", &source)?)
                        .ok_or_else(|| invalid(&source, &path, "Entry has neither 'id' nor 'name'"))?;
                    let description = opt_string(entry, "description", &source)?;
                    let mut extra = entry.clone();
                    extra.remove("id");
                    extra.remove("description");
                    Ok(CatalogEntry {
                        id,
                        description,
                        extra,
                    })
                }
                other => Err(invalid(
                    &source,
                    &path,
                    format!("Expected object or string, got {}", type_name(other)),
                )),
            }
        })
        .collect()
}

pub fn decode_feedback_ack(body: &[u8]) -> Result<FeedbackAck> {
    const SRC: &str = "decode_feedback";
    let obj = parse_object(body, SRC)?;
    Ok(FeedbackAck {
        success: opt_string(&obj, "status", SRC)?.as_deref() == Some("success"),
        message: opt_string(&obj, "message", SRC)?.unwrap_or_default(),
    })
}

/// Human-readable detail from an error body: `detail` (or `message`) when the
/// body is JSON, the raw text otherwise.
pub(crate) fn error_detail(body: &[u8]) -> String {
    if let Ok(Value::Object(obj)) = serde_json::from_slice::<Value>(body) {
        for key in ["detail", "message", "error"] {
            match field(&obj, key) {
                Some(Value::String(s)) => return s.clone(),
                Some(other) => return other.to_string(),
                None => {}
            }
        }
    }
    let text = String::from_utf8_lossy(body);
    let text = text.trim();
    if text.chars().count() > 500 {
        format!("{}...", text.chars().take(500).collect::<String>())
    } else {
        text.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn api_response() -> Value {
        json!({
            "success": true,
            "conversation_id": "conv-123",
            "message_id": "msg-456",
            "query": "What is BGP?",
            "response_text": "BGP is a path vector protocol...",
            "confidence": 0.85,
            "recommended_response": null,
            "query_extended": null,
            "token_counts": {"input": 500, "output": 200},
            "timing": [{"retrieve": 0.5}, {"textual": 2.1}, {"analyze": 0.3}],
            "inferred_environments": ["networking"],
            "docs": [{"title": "BGP Guide", "source": "bgp.pdf", "environment": "networking"}],
            "webs": [],
            "links": [],
            "thinking_process": [],
            "error": null
        })
    }

    fn decode(v: &Value) -> Result<QueryResponse> {
        decode_query(&serde_json::to_vec(v).unwrap(), "sent")
    }

    #[test]
    fn decodes_complete_query_response() {
        let resp = decode(&api_response()).unwrap();
        assert_eq!(resp.text, "BGP is a path vector protocol...");
        assert_eq!(resp.confidence, Some(0.85));
        assert_eq!(resp.conversation_id, "conv-123");
        assert_eq!(resp.message_id, "msg-456");
        assert_eq!(resp.token_usage.total(), 700);
        assert!((resp.timing.total_seconds() - 2.9).abs() < 1e-9);
        assert_eq!(resp.timing.get("retrieve"), Some(0.5));
        assert!(!resp.is_error());
        assert_eq!(resp.source_count(), 1);
        assert_eq!(resp.docs[0].kind, SourceKind::Document);
        assert!(resp.thinking.is_empty());
    }

    #[test]
    fn timing_map_form_is_accepted() {
        let mut v = api_response();
        v["timing"] = json!({"retrieve": 0.5, "textual": 2.0});
        let resp = decode(&v).unwrap();
        assert!((resp.timing.total_seconds() - 2.5).abs() < 1e-9);
        assert_eq!(resp.timing.summary().len(), 2);
    }

    #[test]
    fn timing_summary_matches_received_mapping() {
        let resp = decode(&api_response()).unwrap();
        let summary = resp.timing.summary();
        assert_eq!(summary.len(), 3);
        assert_eq!(summary["retrieve"], 0.5);
        assert_eq!(summary["textual"], 2.1);
        assert_eq!(summary["analyze"], 0.3);
    }

    #[test]
    fn confidence_out_of_range_is_rejected_not_clamped() {
        for bad in [json!(1.5), json!(-0.1)] {
            let mut v = api_response();
            v["confidence"] = bad;
            let err = decode(&v).unwrap_err();
            assert!(matches!(err, Error::Validation { .. }), "{err}");
        }
        let mut v = api_response();
        v["confidence"] = json!(1.0);
        assert_eq!(decode(&v).unwrap().confidence, Some(1.0));
        v["confidence"] = Value::Null;
        assert_eq!(decode(&v).unwrap().confidence, None);
    }

    #[test]
    fn negative_counters_and_durations_are_rejected() {
        let mut v = api_response();
        v["token_counts"] = json!({"input": -1, "output": 2});
        assert!(matches!(decode(&v), Err(Error::Validation { .. })));

        let mut v = api_response();
        v["timing"] = json!([{"retrieve": -0.5}]);
        assert!(matches!(decode(&v), Err(Error::Validation { .. })));
    }

    #[test]
    fn missing_required_fields_are_rejected() {
        let mut v = api_response();
        v.as_object_mut().unwrap().remove("conversation_id");
        let err = decode(&v).unwrap_err();
        assert_eq!(
            err.context().and_then(|c| c.field_path.as_deref()),
            Some("conversation_id")
        );

        let mut v = api_response();
        v.as_object_mut().unwrap().remove("success");
        assert!(matches!(decode(&v), Err(Error::Validation { .. })));
    }

    #[test]
    fn malformed_json_is_validation_error() {
        let err = decode_query(b"<html>oops</html>", "q").unwrap_err();
        assert!(matches!(err, Error::Validation { .. }));
    }

    #[test]
    fn backend_error_payload_is_not_raised() {
        let body = json!({"success": false, "conversation_id": "c", "error": "Timeout"});
        let resp = decode(&body).unwrap();
        assert!(resp.is_error());
        assert_eq!(resp.error.as_deref(), Some("Timeout"));
        assert_eq!(resp.query, "sent");
    }

    #[test]
    fn web_sources_and_thinking_steps() {
        let mut v = api_response();
        v["docs"] = json!([{"title": "A", "tag": "internet"}, {"title": "B", "tag": "bookshelf", "page": 4}]);
        v["webs"] = json!([{"title": "W", "source": "https://example.com"}]);
        v["thinking_process"] = json!(["first", {"content": "second"}]);
        let resp = decode(&v).unwrap();
        let kinds: Vec<_> = resp.sources().map(|s| s.is_web()).collect();
        assert_eq!(kinds, vec![true, false, true]);
        assert_eq!(resp.docs[1].page, Some(4));
        assert_eq!(resp.thinking.len(), 2);
        assert_eq!(resp.thinking[1].index, 1);
        assert_eq!(resp.thinking[1].content, "second");
    }

    #[test]
    fn catalog_entries_keep_order_and_fall_back_to_name() {
        let body = json!({"prompts": [
            {"id": "default", "description": "General"},
            {"name": "expert", "level": 3},
            "plain"
        ]});
        let entries = decode_catalog(&serde_json::to_vec(&body).unwrap(), "prompts").unwrap();
        let ids: Vec<_> = entries.iter().map(|e| e.id.as_str()).collect();
        assert_eq!(ids, vec!["default", "expert", "plain"]);
        assert_eq!(entries[0].description.as_deref(), Some("General"));
        assert_eq!(entries[1].extra["level"], 3);
    }

    #[test]
    fn environments_and_conversations_share_get_env() {
        let body = serde_json::to_vec(&json!({
            "environment": ["retail", "banking"],
            "conversations": [{"conversation_id": "abc", "title": "Test"}]
        }))
        .unwrap();
        assert_eq!(decode_environments(&body).unwrap(), vec!["retail", "banking"]);
        let convs = decode_conversation_list(&body).unwrap();
        assert_eq!(convs[0].conversation_id, "abc");
        assert_eq!(convs[0].title, "Test");
    }

    #[test]
    fn health_and_feedback_payloads() {
        let health = decode_health(br#"{"status":"healthy"}"#).unwrap();
        assert!(health.is_healthy());
        assert_eq!(health.backend, "unknown");
        assert!(!decode_health(br#"{"status":"degraded"}"#).unwrap().is_healthy());
        let qdrant = decode_health(br#"{"status":"healthy","qdrant":"ok"}"#).unwrap();
        assert_eq!(qdrant.vector_store, "ok");
        let aliased = decode_health(br#"{"status":"healthy","vector_store":"down"}"#).unwrap();
        assert_eq!(aliased.vector_store, "down");

        let ack = decode_feedback_ack(br#"{"status":"success","message":"Feedback saved"}"#).unwrap();
        assert!(ack.success);
        assert_eq!(ack.message, "Feedback saved");
    }

    #[test]
    fn conversation_message_confidence_is_checked() {
        let body = br#"{"conversation_id":"c","messages":[{"role":"assistant","content":"x","confidence":2.0}]}"#;
        assert!(matches!(decode_conversation(body), Err(Error::Validation { .. })));
    }

    #[test]
    fn error_detail_prefers_json_detail() {
        assert_eq!(error_detail(br#"{"detail":"Invalid token"}"#), "Invalid token");
        assert_eq!(error_detail(b"Bad Gateway"), "Bad Gateway");
    }
}
