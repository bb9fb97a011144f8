use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Body the backend writes alongside any non-2xx status.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorDocument {
    #[serde(default)]
    pub errors: Vec<ErrorObject>,
}

impl ErrorDocument {
    pub fn single(status: u16, title: impl Into<String>) -> Self {
        Self {
            errors: vec![ErrorObject::new(status, title)],
        }
    }

    pub fn first_title(&self) -> Option<&str> {
        self.errors.first().map(|error| error.title.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Error)]
#[error("{title}")]
pub struct ErrorObject {
    /// The backend encodes the status as a JSON string.
    #[serde(
        default,
        skip_serializing_if = "Option::is_none",
        with = "status_string"
    )]
    pub status: Option<u16>,
    #[serde(default)]
    pub title: String,
}

impl ErrorObject {
    pub fn new(status: u16, title: impl Into<String>) -> Self {
        Self {
            status: Some(status),
            title: title.into(),
        }
    }
}

mod status_string {
    use serde::{Deserialize, Deserializer, Serializer};

    #[derive(Deserialize)]
    #[serde(untagged)]
    enum RawStatus {
        Text(String),
        Number(u16),
    }

    pub fn serialize<S: Serializer>(status: &Option<u16>, serializer: S) -> Result<S::Ok, S::Error> {
        match status {
            Some(value) => serializer.serialize_str(&value.to_string()),
            None => serializer.serialize_none(),
        }
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Option<u16>, D::Error> {
        Ok(match Option::<RawStatus>::deserialize(deserializer)? {
            Some(RawStatus::Text(value)) => value.trim().parse().ok(),
            Some(RawStatus::Number(value)) => Some(value),
            None => None,
        })
    }
}
