use uuid::Uuid;

use crate::domain::cid::random_alphanumeric;
use crate::domain::subscription_input::is_falsy_value;

/// Columns owned by the subscription row itself. Custom fields can never write to them.
pub const RESERVED_COLUMNS: [&str; 9] = [
    "id",
    "cid",
    "list_id",
    "email",
    "first_name",
    "last_name",
    "tz",
    "status",
    "attributes",
];

const COLUMN_SUFFIX_LENGTH: usize = 6;

#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FieldType {
    Text,
    Website,
    Longtext,
    Gpg,
    Json,
    Number,
    Date,
    Birthday,
    /// Boolean-like value; also the type of a group's child options.
    Option,
    Checkbox,
    Radio,
    Dropdown,
}

impl FieldType {
    /// Grouping types own child options instead of a column.
    pub fn is_group(&self) -> bool {
        matches!(
            self,
            FieldType::Checkbox | FieldType::Radio | FieldType::Dropdown
        )
    }

    pub fn is_boolean(&self) -> bool {
        matches!(self, FieldType::Option)
    }

    pub fn parse(field_type: &str) -> Result<FieldType, String> {
        match field_type.trim().to_lowercase().as_str() {
            "text" => Ok(FieldType::Text),
            "website" => Ok(FieldType::Website),
            "longtext" => Ok(FieldType::Longtext),
            "gpg" => Ok(FieldType::Gpg),
            "json" => Ok(FieldType::Json),
            "number" => Ok(FieldType::Number),
            "date" => Ok(FieldType::Date),
            "birthday" => Ok(FieldType::Birthday),
            "option" => Ok(FieldType::Option),
            "checkbox" => Ok(FieldType::Checkbox),
            "radio" => Ok(FieldType::Radio),
            "dropdown" => Ok(FieldType::Dropdown),
            unknown => Err(format!("{} is not a valid field type", unknown)),
        }
    }

    /// Canonical stored value for raw input written to a column of this type.
    pub fn coerce(&self, raw: &str) -> String {
        if !self.is_boolean() {
            return raw.to_string();
        }

        if is_falsy_value(raw) {
            String::new()
        } else {
            String::from("1")
        }
    }
}

impl AsRef<str> for FieldType {
    fn as_ref(&self) -> &str {
        match self {
            FieldType::Text => "text",
            FieldType::Website => "website",
            FieldType::Longtext => "longtext",
            FieldType::Gpg => "gpg",
            FieldType::Json => "json",
            FieldType::Number => "number",
            FieldType::Date => "date",
            FieldType::Birthday => "birthday",
            FieldType::Option => "option",
            FieldType::Checkbox => "checkbox",
            FieldType::Radio => "radio",
            FieldType::Dropdown => "dropdown",
        }
    }
}

/// A field definition as persisted: flat, with options pointing at their group.
#[derive(Debug, Clone, PartialEq)]
pub struct FieldRecord {
    pub id: Uuid,
    pub list_id: Uuid,
    pub name: String,
    pub key: String,
    pub description: String,
    pub column: Option<String>,
    pub field_type: FieldType,
    pub group: Option<Uuid>,
    /// How a group's selected options are rendered in mail. Stored, never rendered here.
    pub group_template: Option<String>,
    pub default_value: Option<String>,
    pub visible: bool,
}

#[derive(Debug, Clone, PartialEq)]
pub struct FieldOption {
    pub id: Uuid,
    pub name: String,
    pub key: String,
    pub column: String,
    pub field_type: FieldType,
}

#[derive(Debug, Clone, PartialEq)]
pub enum FieldKind {
    /// Writes one column.
    Plain { column: String },
    /// Writes one column per matched option.
    Group { options: Vec<FieldOption> },
}

/// A list-scoped custom attribute definition, ready for resolution.
#[derive(Debug, Clone, PartialEq)]
pub struct Field {
    pub id: Uuid,
    pub name: String,
    pub key: String,
    pub field_type: FieldType,
    pub default_value: Option<String>,
    pub visible: bool,
    pub kind: FieldKind,
}

impl Field {
    /// Builds the field tree from flat records, keeping record order. Options whose
    /// group is missing and non-group records without a column are dropped.
    pub fn assemble(records: Vec<FieldRecord>) -> Vec<Field> {
        let mut fields: Vec<Field> = Vec::new();
        let (options, top_level): (Vec<FieldRecord>, Vec<FieldRecord>) =
            records.into_iter().partition(|record| record.group.is_some());

        for record in top_level {
            let kind = if record.field_type.is_group() {
                FieldKind::Group { options: vec![] }
            } else {
                match record.column.clone() {
                    Some(column) => FieldKind::Plain { column },
                    None => continue,
                }
            };

            fields.push(Field {
                id: record.id,
                name: record.name,
                key: record.key,
                field_type: record.field_type,
                default_value: record.default_value,
                visible: record.visible,
                kind,
            });
        }

        for option in options {
            let (Some(group_id), Some(column)) = (option.group, option.column) else {
                continue;
            };
            let parent = fields.iter_mut().find(|field| field.id == group_id);

            if let Some(Field {
                kind: FieldKind::Group { options },
                ..
            }) = parent
            {
                options.push(FieldOption {
                    id: option.id,
                    name: option.name,
                    key: option.key,
                    column,
                    field_type: option.field_type,
                });
            }
        }

        fields
    }
}

/// Validated request to declare a new field on a list.
#[derive(Debug, Clone, PartialEq)]
pub struct NewField {
    pub name: String,
    pub key: String,
    pub description: String,
    pub default_value: Option<String>,
    pub field_type: FieldType,
    pub group: Option<Uuid>,
    pub group_template: Option<String>,
    pub visible: bool,
}

impl NewField {
    pub fn parse(
        name: &str,
        key: &str,
        description: &str,
        default_value: &str,
        field_type: &str,
        group: Option<&str>,
        visible: &str,
    ) -> Result<NewField, String> {
        let name = name.trim();

        if name.is_empty() {
            return Err(String::from("NAME argument is required"));
        }

        let field_type = FieldType::parse(field_type)?;
        let key = normalize_key(key, name)?;
        let group = match group.map(str::trim).filter(|group| !group.is_empty()) {
            Some(group) => Some(
                Uuid::parse_str(group).map_err(|_| format!("{} is not a valid group id", group))?,
            ),
            None => None,
        };

        if field_type == FieldType::Option && group.is_none() {
            return Err(String::from("Options must belong to a group field"));
        }

        if field_type != FieldType::Option && group.is_some() {
            return Err(String::from("Only options can belong to a group field"));
        }

        let default_value = Some(default_value.trim())
            .filter(|value| !value.is_empty())
            .map(String::from);

        Ok(NewField {
            name: name.to_string(),
            key,
            description: description.trim().to_string(),
            default_value,
            field_type,
            group,
            group_template: None,
            visible: !is_falsy_value(visible),
        })
    }

    /// Trimmed and lower-cased. A blank template clears it.
    pub fn with_group_template(mut self, template: &str) -> Self {
        self.group_template = Some(template.trim().to_lowercase()).filter(|t| !t.is_empty());
        self
    }

    /// Storage column for this field, `None` for grouping fields.
    pub fn generate_column(&self) -> Option<String> {
        if self.field_type.is_group() {
            return None;
        }

        Some(format!(
            "custom_{}_{}",
            self.key.to_lowercase(),
            random_alphanumeric(COLUMN_SUFFIX_LENGTH).to_lowercase()
        ))
    }

    pub fn into_record(self, list_id: Uuid) -> FieldRecord {
        let column = self.generate_column();

        FieldRecord {
            id: Uuid::new_v4(),
            list_id,
            name: self.name,
            key: self.key,
            description: self.description,
            column,
            field_type: self.field_type,
            group: self.group,
            group_template: self.group_template,
            default_value: self.default_value,
            visible: self.visible,
        }
    }
}

/// Upper-case merge key restricted to `[A-Z0-9_]`, derived from the name when empty.
fn normalize_key(key: &str, name: &str) -> Result<String, String> {
    let key = key.trim().to_uppercase();

    if key.is_empty() {
        return Ok(format!("MERGE_{}", slugify(name).to_uppercase()));
    }

    if !key
        .chars()
        .all(|c| c.is_ascii_uppercase() || c.is_ascii_digit() || c == '_')
    {
        return Err(format!("{} is not a valid field key", key));
    }

    Ok(key)
}

fn slugify(name: &str) -> String {
    let slug: Vec<String> = name
        .split(|c: char| !c.is_ascii_alphanumeric())
        .filter(|part| !part.is_empty())
        .map(|part| part.to_lowercase())
        .collect();

    slug.join("_")
}
