use crate::utils::error::{ModelError, Result};
use std::collections::HashSet;

pub trait Validate {
    fn validate(&self) -> Result<()>;
}

/// 名稱必須以字母或底線開頭，之後只能是字母、數字、底線或連字號
pub fn validate_identifier(field_name: &str, value: &str) -> Result<()> {
    validate_non_empty_string(field_name, value)?;

    let mut chars = value.chars();
    let first_ok = chars
        .next()
        .map(|c| c.is_alphabetic() || c == '_')
        .unwrap_or(false);
    if !first_ok || !chars.all(|c| c.is_alphanumeric() || c == '_' || c == '-') {
        return Err(ModelError::InvalidConfigValueError {
            field: field_name.to_string(),
            value: value.to_string(),
            reason: "Names must start with a letter or '_' and contain only letters, digits, '_' or '-'"
                .to_string(),
        });
    }
    Ok(())
}

pub fn validate_non_empty_string(field_name: &str, value: &str) -> Result<()> {
    if value.trim().is_empty() {
        return Err(ModelError::InvalidConfigValueError {
            field: field_name.to_string(),
            value: value.to_string(),
            reason: "Value cannot be empty or whitespace-only".to_string(),
        });
    }
    Ok(())
}

pub fn validate_one_of(field_name: &str, value: &str, allowed: &[&str]) -> Result<()> {
    if !allowed.contains(&value) {
        return Err(ModelError::InvalidConfigValueError {
            field: field_name.to_string(),
            value: value.to_string(),
            reason: format!("Expected one of: {}", allowed.join(", ")),
        });
    }
    Ok(())
}

pub fn validate_unique_names<'a, I>(field_name: &str, names: I) -> Result<()>
where
    I: IntoIterator<Item = &'a str>,
{
    let mut seen = HashSet::new();
    for name in names {
        if !seen.insert(name) {
            return Err(ModelError::InvalidConfigValueError {
                field: field_name.to_string(),
                value: name.to_string(),
                reason: "Name is declared more than once".to_string(),
            });
        }
    }
    Ok(())
}

/// 驗證基數上下限 (min <= max)
pub fn validate_cardinality(field_name: &str, min: Option<usize>, max: Option<usize>) -> Result<()> {
    if let (Some(min), Some(max)) = (min, max) {
        if min > max {
            return Err(ModelError::InvalidConfigValueError {
                field: field_name.to_string(),
                value: format!("{}..{}", min, max),
                reason: "Minimum number of elements exceeds the maximum".to_string(),
            });
        }
    }
    Ok(())
}

pub fn validate_required_field<'a, T>(field_name: &str, value: &'a Option<T>) -> Result<&'a T> {
    value.as_ref().ok_or_else(|| ModelError::MissingConfigError {
        field: field_name.to_string(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validate_identifier() {
        assert!(validate_identifier("models.name", "Person").is_ok());
        assert!(validate_identifier("models.name", "_private").is_ok());
        assert!(validate_identifier("schemas.tag", "my-model").is_ok());
        assert!(validate_identifier("models.name", "").is_err());
        assert!(validate_identifier("models.name", "1st").is_err());
        assert!(validate_identifier("models.name", "a b").is_err());
    }

    #[test]
    fn test_validate_unique_names() {
        assert!(validate_unique_names("attributes", ["a", "b"]).is_ok());
        assert!(validate_unique_names("attributes", ["a", "b", "a"]).is_err());
    }

    #[test]
    fn test_validate_cardinality() {
        assert!(validate_cardinality("elements", Some(0), Some(1)).is_ok());
        assert!(validate_cardinality("elements", None, Some(1)).is_ok());
        assert!(validate_cardinality("elements", Some(2), Some(1)).is_err());
    }

    #[test]
    fn test_validate_required_field() {
        let present = Some("kind".to_string());
        assert_eq!(validate_required_field("kind", &present).unwrap(), "kind");
        let absent: Option<String> = None;
        assert!(validate_required_field("kind", &absent).is_err());
    }
}
