use serde_json::Value;
use tracing::debug;

use crate::clients::printer::Printer;
use crate::error::DispatchError;
use crate::models::message::{BodyType, NotificationMessage, TIMESTAMP_FORMAT};

/// Blank rows fed between the last receipt line and the cut.
const RECEIPT_FEED_LINES: u16 = 5;

/// Renders one message into the fixed receipt layout: separator, title, body
/// lines, origin, timestamp.
///
/// A `KeyValue` body must be a flat JSON object; it renders as one
/// `key: value` line per entry, in the order the keys appear in the payload.
/// A `PlainText` body renders as a single `body:` line.
pub fn render(message: &NotificationMessage, separator: &str) -> Result<Vec<String>, DispatchError> {
    let mut lines = Vec::new();

    lines.push(separator.to_string());
    lines.push(format!("title: {}", message.title));

    match message.body_type {
        BodyType::KeyValue => {
            for (key, value) in parse_key_value_body(&message.body)? {
                lines.push(format!("{key}: {value}"));
            }
        }
        BodyType::PlainText => lines.push(format!("body: {}", message.body)),
    }

    lines.push(format!("origin: {}", message.origin));
    lines.push(format!(
        "timestamp: {}",
        message.timestamp.format(TIMESTAMP_FORMAT)
    ));

    Ok(lines)
}

fn parse_key_value_body(body: &str) -> Result<Vec<(String, String)>, DispatchError> {
    let parsed: Value = serde_json::from_str(body)
        .map_err(|e| DispatchError::MalformedKeyValueBody(e.to_string()))?;

    let Value::Object(entries) = parsed else {
        return Err(DispatchError::MalformedKeyValueBody(
            "expected a json object".to_string(),
        ));
    };

    Ok(entries.into_iter().map(|(k, v)| (k, flatten(v))).collect())
}

fn flatten(value: Value) -> String {
    match value {
        Value::String(s) => s,
        other => other.to_string(),
    }
}

/// Prints one message: rendered lines, a paper feed, then the cut. Any
/// failure along the way is a single dispatch failure for the whole message;
/// rows already on paper stay there, and the caller dead-letters the payload.
pub async fn dispatch(
    printer: &impl Printer,
    message: &NotificationMessage,
    separator: &str,
) -> Result<(), DispatchError> {
    let lines = render(message, separator)?;

    printer.write_lines(&lines).await?;
    printer.feed(RECEIPT_FEED_LINES).await?;
    printer.cut().await?;

    debug!(id = %message.id, origin = %message.origin, "Receipt printed");

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDateTime;
    use uuid::Uuid;

    const SEPARATOR: &str = "--------------------------------";

    fn message(body: &str, body_type: BodyType) -> NotificationMessage {
        NotificationMessage {
            id: Uuid::new_v4(),
            title: "Order".to_string(),
            body: body.to_string(),
            body_type,
            origin: "POS1".to_string(),
            timestamp: NaiveDateTime::parse_from_str("2024-01-01 10:00:00", TIMESTAMP_FORMAT)
                .unwrap(),
        }
    }

    #[test]
    fn key_value_message_renders_receipt_lines() {
        let lines = render(&message(r#"{"qty":"3"}"#, BodyType::KeyValue), SEPARATOR).unwrap();

        assert_eq!(
            lines,
            vec![
                SEPARATOR,
                "title: Order",
                "qty: 3",
                "origin: POS1",
                "timestamp: 2024-01-01 10:00:00",
            ]
        );
    }

    #[test]
    fn key_value_entries_keep_payload_order() {
        let body = r#"{"zebra":"1","apple":"2","mango":"3"}"#;
        let lines = render(&message(body, BodyType::KeyValue), SEPARATOR).unwrap();

        assert_eq!(lines[2..5], ["zebra: 1", "apple: 2", "mango: 3"]);
    }

    #[test]
    fn non_string_values_render_as_json() {
        let body = r#"{"qty":3,"paid":true}"#;
        let lines = render(&message(body, BodyType::KeyValue), SEPARATOR).unwrap();

        assert_eq!(lines[2..4], ["qty: 3", "paid: true"]);
    }

    #[test]
    fn plain_text_renders_single_body_line() {
        let lines = render(
            &message("ready for pickup", BodyType::PlainText),
            SEPARATOR,
        )
        .unwrap();

        assert_eq!(
            lines,
            vec![
                SEPARATOR,
                "title: Order",
                "body: ready for pickup",
                "origin: POS1",
                "timestamp: 2024-01-01 10:00:00",
            ]
        );
    }

    #[test]
    fn malformed_key_value_body_fails_dispatch() {
        let result = render(&message("not json", BodyType::KeyValue), SEPARATOR);
        assert!(matches!(
            result,
            Err(DispatchError::MalformedKeyValueBody(_))
        ));

        let result = render(&message(r#"["a","b"]"#, BodyType::KeyValue), SEPARATOR);
        assert!(matches!(
            result,
            Err(DispatchError::MalformedKeyValueBody(_))
        ));
    }
}
