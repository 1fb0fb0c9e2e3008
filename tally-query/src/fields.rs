//! Display and search field selection.

use tally_core::{
    is_reserved_field, FieldDataType, ObjectSchema, TallyResult, ValidationError,
    CREATED_AT_FIELD,
};

/// Default display fields: visible, non-reserved, in definition order, capped
/// at `limit`. When fewer than `limit` remain, `created_at` fills the next slot.
pub fn default_display_fields(schema: &ObjectSchema, limit: usize) -> Vec<String> {
    let mut fields: Vec<String> = schema
        .visible_fields()
        .filter(|f| !is_reserved_field(&f.api_name))
        .take(limit)
        .map(|f| f.api_name.clone())
        .collect();
    if fields.len() < limit {
        fields.push(CREATED_AT_FIELD.to_string());
    }
    fields
}

/// Default search fields: visible `text` fields or the field named `name`,
/// in definition order, capped at `limit`.
pub fn default_search_fields(schema: &ObjectSchema, limit: usize) -> Vec<String> {
    schema
        .visible_fields()
        .filter(|f| f.data_type == FieldDataType::Text || f.api_name == "name")
        .take(limit)
        .map(|f| f.api_name.clone())
        .collect()
}

/// Explicit display fields, each checked against the schema; defaults otherwise.
pub fn resolve_display_fields(
    schema: &ObjectSchema,
    explicit: Option<&[String]>,
    limit: usize,
) -> TallyResult<Vec<String>> {
    match explicit {
        Some(names) if !names.is_empty() => {
            for name in names {
                schema.field(name)?;
            }
            Ok(names.to_vec())
        }
        _ => Ok(default_display_fields(schema, limit)),
    }
}

/// Explicit search fields (which must exist and hold text); defaults otherwise.
/// An explicit empty list stays empty, which turns search off.
pub fn resolve_search_fields(
    schema: &ObjectSchema,
    explicit: Option<&[String]>,
    limit: usize,
) -> TallyResult<Vec<String>> {
    let Some(names) = explicit else {
        return Ok(default_search_fields(schema, limit));
    };
    for name in names {
        let field = schema.field(name)?;
        if !field.data_type.is_textual() {
            return Err(ValidationError::invalid_field(
                name,
                format!("cannot search a {} field", field.data_type),
            )
            .into());
        }
    }
    Ok(names.to_vec())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tally_core::{ErrorKind, FieldDefinition, ObjectDefinition};

    fn schema(extra: Vec<FieldDefinition>) -> ObjectSchema {
        let mut fields = vec![
            FieldDefinition::new("id", "ID", FieldDataType::Text).hidden(),
            FieldDefinition::new("owner_id", "Owner", FieldDataType::Reference),
        ];
        fields.extend(extra);
        fields.push(FieldDefinition::new("created_at", "Created", FieldDataType::Datetime));
        fields.push(FieldDefinition::new("updated_at", "Updated", FieldDataType::Datetime));
        ObjectSchema::new(
            ObjectDefinition {
                api_name: "clients".to_string(),
                label: "Client".to_string(),
                plural_label: "Clients".to_string(),
            },
            fields,
        )
    }

    fn text_fields(n: usize) -> Vec<FieldDefinition> {
        (0..n)
            .map(|i| FieldDefinition::new(format!("f{i}"), format!("F{i}"), FieldDataType::Text))
            .collect()
    }

    #[test]
    fn test_eight_visible_fields_select_six_without_padding() {
        let schema = schema(text_fields(8));
        let fields = default_display_fields(&schema, 6);
        assert_eq!(fields, vec!["f0", "f1", "f2", "f3", "f4", "f5"]);
    }

    #[test]
    fn test_three_visible_fields_pad_with_created_at() {
        let schema = schema(text_fields(3));
        let fields = default_display_fields(&schema, 6);
        assert_eq!(fields, vec!["f0", "f1", "f2", "created_at"]);
    }

    #[test]
    fn test_hidden_fields_are_skipped() {
        let mut extra = text_fields(2);
        extra[0] = extra[0].clone().hidden();
        let schema = schema(extra);
        assert_eq!(default_display_fields(&schema, 6), vec!["f1", "created_at"]);
    }

    #[test]
    fn test_default_search_fields() {
        let schema = schema(vec![
            FieldDefinition::new("amount", "Amount", FieldDataType::Currency),
            FieldDefinition::new("name", "Name", FieldDataType::Textarea),
            FieldDefinition::new("email", "Email", FieldDataType::Email),
            FieldDefinition::new("company", "Company", FieldDataType::Text),
            FieldDefinition::new("secret", "Secret", FieldDataType::Text).hidden(),
        ]);
        assert_eq!(default_search_fields(&schema, 4), vec!["name", "company"]);
    }

    #[test]
    fn test_search_fields_capped() {
        let schema = schema(text_fields(6));
        assert_eq!(default_search_fields(&schema, 4).len(), 4);
    }

    #[test]
    fn test_explicit_display_fields_validated() {
        let schema = schema(text_fields(2));
        let names = vec!["f1".to_string(), "nope".to_string()];
        let err = resolve_display_fields(&schema, Some(names.as_slice()), 6).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidField);

        let names = vec!["f1".to_string()];
        assert_eq!(resolve_display_fields(&schema, Some(names.as_slice()), 6).unwrap(), vec!["f1"]);
    }

    #[test]
    fn test_explicit_search_fields_must_be_textual() {
        let schema = schema(vec![FieldDefinition::new(
            "amount",
            "Amount",
            FieldDataType::Number,
        )]);
        let names = vec!["amount".to_string()];
        let err = resolve_search_fields(&schema, Some(names.as_slice()), 4).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidField);

        let empty: Vec<String> = Vec::new();
        assert!(resolve_search_fields(&schema, Some(empty.as_slice()), 4).unwrap().is_empty());
    }
}
