use non_empty_string::NonEmptyString;
use serde_yaml::Value;

/// The part of a domain record the reference engine cares about.
///
/// Records carry arbitrary extra content; only the ID, the required `name`,
/// and the optional `title` are decoded.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Record {
    id: String,
    name: NonEmptyString,
    title: Option<String>,
}

/// Errors raised while decoding a single record.
#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum RecordError {
    /// The record is not a mapping.
    #[error("record is not a mapping")]
    NotAMapping,

    /// The record has no non-empty `name` string.
    #[error("record has no non-empty 'name'")]
    MissingName,
}

impl Record {
    /// Creates a record from its parts.
    ///
    /// # Errors
    ///
    /// Returns [`RecordError::MissingName`] if `name` is blank.
    pub fn new(
        id: impl Into<String>,
        name: impl Into<String>,
        title: Option<String>,
    ) -> Result<Self, RecordError> {
        let name = name.into();
        if name.trim().is_empty() {
            return Err(RecordError::MissingName);
        }
        let name = NonEmptyString::new(name).map_err(|_| RecordError::MissingName)?;

        Ok(Self {
            id: id.into(),
            name,
            title: title.filter(|title| !title.trim().is_empty()),
        })
    }

    /// Decodes a record from the YAML value stored under `id`.
    ///
    /// # Errors
    ///
    /// Returns an error if the value is not a mapping or has no non-empty
    /// `name` string.
    pub fn decode(id: &str, value: &Value) -> Result<Self, RecordError> {
        let mapping = value.as_mapping().ok_or(RecordError::NotAMapping)?;
        let name = mapping
            .get("name")
            .and_then(Value::as_str)
            .ok_or(RecordError::MissingName)?;
        let title = mapping
            .get("title")
            .and_then(Value::as_str)
            .map(str::to_string);

        Self::new(id, name, title)
    }

    /// The record ID, unique within its domain.
    #[must_use]
    pub fn id(&self) -> &str {
        &self.id
    }

    /// The display name.
    #[must_use]
    pub fn name(&self) -> &str {
        self.name.as_str()
    }

    /// The title, falling back to the name when none is set.
    #[must_use]
    pub fn title(&self) -> &str {
        self.title.as_deref().unwrap_or_else(|| self.name())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn yaml(source: &str) -> Value {
        serde_yaml::from_str(source).unwrap()
    }

    #[test]
    fn decodes_name_and_title() {
        let record = Record::decode(
            "rust-contamination",
            &yaml("name: Rust\ntitle: Rust Removal\ncategory: oxide\n"),
        )
        .unwrap();

        assert_eq!(record.id(), "rust-contamination");
        assert_eq!(record.name(), "Rust");
        assert_eq!(record.title(), "Rust Removal");
    }

    #[test]
    fn title_falls_back_to_name() {
        let record = Record::decode("aluminum", &yaml("name: Aluminum\ntitle: ''\n")).unwrap();
        assert_eq!(record.title(), "Aluminum");
    }

    #[test]
    fn missing_name_is_rejected() {
        assert_eq!(
            Record::decode("aluminum", &yaml("title: Aluminum\n")),
            Err(RecordError::MissingName)
        );
        assert_eq!(
            Record::decode("aluminum", &yaml("name: '   '\n")),
            Err(RecordError::MissingName)
        );
        assert_eq!(
            Record::decode("aluminum", &yaml("name: 42\n")),
            Err(RecordError::MissingName)
        );
    }

    #[test]
    fn non_mapping_is_rejected() {
        assert_eq!(
            Record::decode("aluminum", &yaml("- a\n- b\n")),
            Err(RecordError::NotAMapping)
        );
    }
}
