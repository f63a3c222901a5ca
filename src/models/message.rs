use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Fixed wire pattern for `timestamp`, on the HTTP surface and on both queues.
pub const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// Inbound publish request, before validation. Every field is optional here so
/// that validation can report all missing fields at once instead of failing on
/// the first. A caller-supplied `id` is deliberately absent: ids are assigned
/// by the gateway at publish time, and any `id` key in the inbound JSON is
/// dropped during deserialization.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct PublishRequest {
    pub title: Option<String>,
    pub body: Option<String>,
    #[serde(rename = "bodyType")]
    pub body_type: Option<String>,
    pub origin: Option<String>,
    pub timestamp: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "String", into = "&'static str")]
pub enum BodyType {
    PlainText,
    KeyValue,
}

/// A validated message as it travels on the primary and dead-letter queues.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NotificationMessage {
    pub id: Uuid,
    pub title: String,
    pub body: String,
    #[serde(rename = "bodyType")]
    pub body_type: BodyType,
    pub origin: String,
    #[serde(with = "wire_timestamp")]
    pub timestamp: NaiveDateTime,
}

impl TryFrom<String> for BodyType {
    type Error = String;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        if value.eq_ignore_ascii_case("plaintext") {
            Ok(BodyType::PlainText)
        } else if value.eq_ignore_ascii_case("keyvalue") {
            Ok(BodyType::KeyValue)
        } else {
            Err(format!("unknown bodyType '{value}'"))
        }
    }
}

impl From<BodyType> for &'static str {
    fn from(value: BodyType) -> Self {
        match value {
            BodyType::PlainText => "PlainText",
            BodyType::KeyValue => "KeyValue",
        }
    }
}

impl PublishRequest {
    /// Returns every validation error at once, using the same wording the
    /// HTTP surface reports to callers.
    pub fn validate(&self) -> Vec<String> {
        let mut errors = Vec::new();

        if is_none_or_blank(&self.title) {
            errors.push("Required: 'title'".to_string());
        }

        if is_none_or_blank(&self.body) {
            errors.push("Required: 'body'".to_string());
        }

        match &self.body_type {
            Some(raw) if !raw.trim().is_empty() => {
                if BodyType::try_from(raw.clone()).is_err() {
                    errors.push(
                        "Invalid 'bodyType': should be 'PlainText' or 'KeyValue'".to_string(),
                    );
                }
            }
            _ => errors.push("Required: 'bodyType'".to_string()),
        }

        if is_none_or_blank(&self.origin) {
            errors.push("Required: 'origin'".to_string());
        }

        match &self.timestamp {
            None => errors.push("Required: 'timestamp'".to_string()),
            Some(raw) => {
                if NaiveDateTime::parse_from_str(raw, TIMESTAMP_FORMAT).is_err() {
                    errors.push(
                        "Invalid 'timestamp': expected format 'YYYY-MM-DD HH:MM:SS'".to_string(),
                    );
                }
            }
        }

        errors
    }

    /// Validates and, on success, builds the queue-bound message with a fresh
    /// server-generated id.
    pub fn into_message(self) -> Result<NotificationMessage, Vec<String>> {
        let errors = self.validate();
        if !errors.is_empty() {
            return Err(errors);
        }

        let body_type = self
            .body_type
            .and_then(|raw| BodyType::try_from(raw).ok())
            .ok_or_else(|| vec!["Required: 'bodyType'".to_string()])?;

        let timestamp = self
            .timestamp
            .as_deref()
            .and_then(|raw| NaiveDateTime::parse_from_str(raw, TIMESTAMP_FORMAT).ok())
            .ok_or_else(|| vec!["Required: 'timestamp'".to_string()])?;

        Ok(NotificationMessage {
            id: Uuid::new_v4(),
            title: self.title.unwrap_or_default(),
            body: self.body.unwrap_or_default(),
            body_type,
            origin: self.origin.unwrap_or_default(),
            timestamp,
        })
    }
}

fn is_none_or_blank(value: &Option<String>) -> bool {
    value.as_deref().is_none_or(|s| s.trim().is_empty())
}

mod wire_timestamp {
    use chrono::NaiveDateTime;
    use serde::{self, Deserialize, Deserializer, Serializer};

    use super::TIMESTAMP_FORMAT;

    pub fn serialize<S>(value: &NaiveDateTime, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_str(&value.format(TIMESTAMP_FORMAT).to_string())
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<NaiveDateTime, D::Error>
    where
        D: Deserializer<'de>,
    {
        let raw = String::deserialize(deserializer)?;
        NaiveDateTime::parse_from_str(&raw, TIMESTAMP_FORMAT).map_err(serde::de::Error::custom)
    }
}
