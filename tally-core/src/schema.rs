//! Object and field definitions authored by tenant administrators.

use serde::{Deserialize, Serialize};

use crate::{TallyResult, ValidationError};

/// Record identity field present on every object.
pub const ID_FIELD: &str = "id";
/// Creation timestamp present on every object.
pub const CREATED_AT_FIELD: &str = "created_at";
/// Modification timestamp present on every object.
pub const UPDATED_AT_FIELD: &str = "updated_at";

/// Fields never picked as default display columns.
pub const RESERVED_FIELDS: [&str; 5] = [
    ID_FIELD,
    CREATED_AT_FIELD,
    UPDATED_AT_FIELD,
    "owner_id",
    "organization_id",
];

/// Returns true if `api_name` belongs to the reserved bookkeeping set.
pub fn is_reserved_field(api_name: &str) -> bool {
    RESERVED_FIELDS.contains(&api_name)
}

/// Data type of a field. Drives comparison semantics and operator applicability.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FieldDataType {
    Text,
    Textarea,
    Email,
    Phone,
    Url,
    Number,
    Currency,
    Percent,
    Boolean,
    Date,
    Datetime,
    Select,
    Reference,
}

impl FieldDataType {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Text => "text",
            Self::Textarea => "textarea",
            Self::Email => "email",
            Self::Phone => "phone",
            Self::Url => "url",
            Self::Number => "number",
            Self::Currency => "currency",
            Self::Percent => "percent",
            Self::Boolean => "boolean",
            Self::Date => "date",
            Self::Datetime => "datetime",
            Self::Select => "select",
            Self::Reference => "reference",
        }
    }

    /// Values aggregate with sum/avg/min/max and compare numerically.
    pub fn is_numeric(&self) -> bool {
        matches!(self, Self::Number | Self::Currency | Self::Percent)
    }

    /// Values compare as instants and accept relative date windows.
    pub fn is_temporal(&self) -> bool {
        matches!(self, Self::Date | Self::Datetime)
    }

    /// Values support substring / prefix / suffix matching.
    pub fn is_textual(&self) -> bool {
        matches!(
            self,
            Self::Text
                | Self::Textarea
                | Self::Email
                | Self::Phone
                | Self::Url
                | Self::Select
                | Self::Reference
        )
    }
}

impl std::fmt::Display for FieldDataType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A tenant-defined record type, analogous to a table.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ObjectDefinition {
    /// Unique, immutable identifier (also the storage table name).
    pub api_name: String,
    pub label: String,
    pub plural_label: String,
}

/// One attribute of an object.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FieldDefinition {
    pub api_name: String,
    pub label: String,
    pub data_type: FieldDataType,
    #[serde(default = "default_visible")]
    pub is_visible: bool,
}

fn default_visible() -> bool {
    true
}

impl FieldDefinition {
    pub fn new(api_name: impl Into<String>, label: impl Into<String>, data_type: FieldDataType) -> Self {
        Self {
            api_name: api_name.into(),
            label: label.into(),
            data_type,
            is_visible: true,
        }
    }

    pub fn hidden(mut self) -> Self {
        self.is_visible = false;
        self
    }
}

/// An object definition together with its ordered field definitions.
///
/// Field order is significant: default display and search fields are picked
/// in definition order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ObjectSchema {
    pub object: ObjectDefinition,
    pub fields: Vec<FieldDefinition>,
}

impl ObjectSchema {
    pub fn new(object: ObjectDefinition, fields: Vec<FieldDefinition>) -> Self {
        Self { object, fields }
    }

    pub fn api_name(&self) -> &str {
        &self.object.api_name
    }

    /// Look up a field by api_name without failing.
    pub fn find_field(&self, api_name: &str) -> Option<&FieldDefinition> {
        self.fields.iter().find(|f| f.api_name == api_name)
    }

    /// Validated field lookup. Unknown names are rejected with InvalidField.
    pub fn field(&self, api_name: &str) -> TallyResult<&FieldDefinition> {
        self.find_field(api_name).ok_or_else(|| {
            ValidationError::invalid_field(
                api_name,
                format!("not a field of {}", self.object.api_name),
            )
            .into()
        })
    }

    pub fn visible_fields(&self) -> impl Iterator<Item = &FieldDefinition> {
        self.fields.iter().filter(|f| f.is_visible)
    }
}
