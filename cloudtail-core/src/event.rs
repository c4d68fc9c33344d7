use chrono::{DateTime, Utc};
use serde::Serialize;

/// One normalized record handed to the publisher.
///
/// `event_type` duplicates the prospector id under the wire name `type`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Event {
    pub timestamp: DateTime<Utc>,
    pub prospector: String,
    #[serde(rename = "type")]
    pub event_type: String,
    pub message: String,
    pub group: String,
    pub stream: String,
}

#[cfg(test)]
mod tests {
    use chrono::TimeZone;

    use super::*;

    #[test]
    fn serializes_with_wire_field_names() {
        let event = Event {
            timestamp: Utc.timestamp_millis_opt(1_497_262_186_650).single().expect("timestamp"),
            prospector: "lambda".to_string(),
            event_type: "lambda".to_string(),
            message: "hello\n".to_string(),
            group: "/aws/lambda/api".to_string(),
            stream: "2017/06/12/[$LATEST]deadbeef".to_string(),
        };

        let json = serde_json::to_value(&event).expect("encode");
        assert_eq!(json["prospector"], "lambda");
        assert_eq!(json["type"], "lambda");
        assert_eq!(json["message"], "hello\n");
        assert_eq!(json["group"], "/aws/lambda/api");
        assert_eq!(json["stream"], "2017/06/12/[$LATEST]deadbeef");
        assert!(json["timestamp"].is_string());
    }
}
