use thiserror::Error;

#[derive(Error, Debug)]
pub enum ModelError {
    #[error("{class}.{attribute}: type mismatch: {reason}")]
    TypeMismatch {
        class: String,
        attribute: String,
        reason: String,
    },

    #[error("{class}: attribute {attribute} is missing")]
    AttributeMissing { class: String, attribute: String },

    #[error("{class}: unknown attribute {attribute}")]
    UnknownAttribute { class: String, attribute: String },

    #[error("unknown model class: {name}")]
    UnknownClass { name: String },

    #[error("model class already defined: {name}")]
    DuplicateClass { name: String },

    #[error("{tag}: schema does not match model {class}: {reason}")]
    SchemaMismatch {
        tag: String,
        class: String,
        reason: String,
    },

    #[error("no binding registered for {target}")]
    MissingBinding { target: String },

    #[error("{tag}: invalid value {text:?}")]
    InvalidValue { tag: String, text: String },

    #[error("{class}: more than one record has identity {id}")]
    AmbiguousIdentity { class: String, id: String },

    #[error("{class}: no record has identity {id}")]
    UnknownIdentity { class: String, id: String },

    #[error("record in collection {collection} has no type tag")]
    MissingTypeTag { collection: String },

    #[error("type tag {tag:?} does not resolve to a model class")]
    UnknownTypeTag { tag: String },

    #[error("{class}.{attribute}: invalid record value: {reason}")]
    InvalidRecord {
        class: String,
        attribute: String,
        reason: String,
    },

    #[error("Document store error: {message}")]
    StoreError { message: String },

    #[error("XML error: {0}")]
    XmlError(#[from] quick_xml::Error),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    SerializationError(#[from] serde_json::Error),

    #[error("Configuration error: {message}")]
    ConfigError { message: String },

    #[error("Invalid value for {field}: {value:?} ({reason})")]
    InvalidConfigValueError {
        field: String,
        value: String,
        reason: String,
    },

    #[error("Missing required configuration: {field}")]
    MissingConfigError { field: String },

    #[error("Configuration validation failed for {field}: {message}")]
    ConfigValidationError { field: String, message: String },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCategory {
    Model,
    Binding,
    Persistence,
    Document,
    Configuration,
}

impl ModelError {
    pub fn category(&self) -> ErrorCategory {
        match self {
            ModelError::TypeMismatch { .. }
            | ModelError::AttributeMissing { .. }
            | ModelError::UnknownAttribute { .. }
            | ModelError::UnknownClass { .. }
            | ModelError::DuplicateClass { .. } => ErrorCategory::Model,
            ModelError::SchemaMismatch { .. }
            | ModelError::MissingBinding { .. }
            | ModelError::InvalidValue { .. } => ErrorCategory::Binding,
            ModelError::AmbiguousIdentity { .. }
            | ModelError::UnknownIdentity { .. }
            | ModelError::MissingTypeTag { .. }
            | ModelError::UnknownTypeTag { .. }
            | ModelError::InvalidRecord { .. }
            | ModelError::StoreError { .. } => ErrorCategory::Persistence,
            ModelError::XmlError(_) | ModelError::IoError(_) | ModelError::SerializationError(_) => {
                ErrorCategory::Document
            }
            ModelError::ConfigError { .. }
            | ModelError::InvalidConfigValueError { .. }
            | ModelError::MissingConfigError { .. }
            | ModelError::ConfigValidationError { .. } => ErrorCategory::Configuration,
        }
    }

    /// 給終端使用者看的簡短訊息
    pub fn user_friendly_message(&self) -> String {
        match self.category() {
            ErrorCategory::Model => format!("Model object is invalid: {}", self),
            ErrorCategory::Binding => format!("Document does not fit the bound model: {}", self),
            ErrorCategory::Persistence => format!("Stored record could not be resolved: {}", self),
            ErrorCategory::Document => format!("Could not read or write the document: {}", self),
            ErrorCategory::Configuration => format!("Definitions are invalid: {}", self),
        }
    }
}

pub type Result<T> = std::result::Result<T, ModelError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_messages_carry_context() {
        let err = ModelError::AttributeMissing {
            class: "Person".to_string(),
            attribute: "first".to_string(),
        };
        assert_eq!(err.to_string(), "Person: attribute first is missing");
        assert_eq!(err.category(), ErrorCategory::Model);

        let err = ModelError::SchemaMismatch {
            tag: "{urn:cms}clip".to_string(),
            class: "Playlist".to_string(),
            reason: "no attribute named clip".to_string(),
        };
        assert!(err.to_string().contains("{urn:cms}clip"));
        assert!(err.user_friendly_message().starts_with("Document does not fit"));
    }
}
