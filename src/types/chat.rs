//! Chat request/response bodies.

use serde::{Deserialize, Serialize};

/// Body of `POST /chat`.
///
/// `session_id: null` asks the backend to create a new session.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ChatRequest {
    pub query: String,
    pub session_id: Option<String>,
    pub request_id: String,
}

/// Reply to a chat request.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ChatReply {
    pub session_id: String,
    #[serde(alias = "response")]
    pub reply: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub request_id: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn missing_session_serializes_as_null() {
        let req = ChatRequest {
            query: "hello".into(),
            session_id: None,
            request_id: "r1".into(),
        };
        assert_eq!(
            serde_json::to_value(&req).unwrap(),
            json!({ "query": "hello", "session_id": null, "request_id": "r1" })
        );
    }

    #[test]
    fn reply_accepts_response_alias_and_extra_fields() {
        let reply: ChatReply = serde_json::from_value(json!({
            "session_id": "s1",
            "response": "hi",
            "request_id": "r1",
            "elapsed_ms": 12
        }))
        .unwrap();
        assert_eq!(reply.reply, "hi");
        assert_eq!(reply.request_id.as_deref(), Some("r1"));
    }
}
