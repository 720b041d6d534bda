//! Schema validation for implementation-specific TOML tables.
//!
//! Each pluggable implementation (storage backend, chain type) describes the
//! table it expects as a [`Schema`]. The schema is checked before the
//! implementation is constructed so that typos and out-of-range values fail
//! at startup with a field path in the message.

use thiserror::Error;

/// Errors reported by schema validation.
#[derive(Debug, Error)]
pub enum ValidationError {
	#[error("Missing required field: {0}")]
	MissingField(String),
	#[error("Invalid value for field '{field}': {message}")]
	InvalidValue { field: String, message: String },
	#[error("Type mismatch for field '{field}': expected {expected}, got {actual}")]
	TypeMismatch {
		field: String,
		expected: String,
		actual: String,
	},
	#[error("Failed to deserialize config: {0}")]
	DeserializationError(String),
}

impl ValidationError {
	/// Prefixes the field path with `parent.`, used for nested tables.
	fn nested_in(self, parent: &str) -> Self {
		match self {
			Self::MissingField(f) => Self::MissingField(format!("{}.{}", parent, f)),
			Self::InvalidValue { field, message } => Self::InvalidValue {
				field: format!("{}.{}", parent, field),
				message,
			},
			Self::TypeMismatch {
				field,
				expected,
				actual,
			} => Self::TypeMismatch {
				field: format!("{}.{}", parent, field),
				expected,
				actual,
			},
			other => other,
		}
	}
}

/// Expected type of a configuration field.
#[derive(Debug)]
pub enum FieldType {
	String,
	/// Integer with optional inclusive bounds.
	Integer { min: Option<i64>, max: Option<i64> },
	Boolean,
	/// Homogeneous array.
	Array(Box<FieldType>),
	/// Nested table with its own schema.
	Table(Schema),
}

/// Custom check run after the type check passes.
pub type FieldValidator = Box<dyn Fn(&toml::Value) -> Result<(), String> + Send + Sync>;

pub struct Field {
	pub name: String,
	pub field_type: FieldType,
	pub validator: Option<FieldValidator>,
}

impl std::fmt::Debug for Field {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		f.debug_struct("Field")
			.field("name", &self.name)
			.field("field_type", &self.field_type)
			.field("validator", &self.validator.is_some())
			.finish()
	}
}

impl Field {
	pub fn new(name: impl Into<String>, field_type: FieldType) -> Self {
		Self {
			name: name.into(),
			field_type,
			validator: None,
		}
	}

	/// Attaches a custom check returning an error message on failure.
	pub fn with_validator<F>(mut self, validator: F) -> Self
	where
		F: Fn(&toml::Value) -> Result<(), String> + Send + Sync + 'static,
	{
		self.validator = Some(Box::new(validator));
		self
	}

	fn check(&self, value: &toml::Value) -> Result<(), ValidationError> {
		check_type(&self.name, value, &self.field_type)?;
		if let Some(validator) = &self.validator {
			validator(value).map_err(|message| ValidationError::InvalidValue {
				field: self.name.clone(),
				message,
			})?;
		}
		Ok(())
	}
}

/// Required and optional fields of one TOML table.
///
/// Unknown keys are ignored.
#[derive(Debug)]
pub struct Schema {
	pub required: Vec<Field>,
	pub optional: Vec<Field>,
}

impl Schema {
	pub fn new(required: Vec<Field>, optional: Vec<Field>) -> Self {
		Self { required, optional }
	}

	/// Validates `config`, which must be a table.
	pub fn validate(&self, config: &toml::Value) -> Result<(), ValidationError> {
		let table = config
			.as_table()
			.ok_or_else(|| mismatch("root", "table", config))?;

		for field in &self.required {
			let value = table
				.get(&field.name)
				.ok_or_else(|| ValidationError::MissingField(field.name.clone()))?;
			field.check(value)?;
		}

		for field in &self.optional {
			if let Some(value) = table.get(&field.name) {
				field.check(value)?;
			}
		}

		Ok(())
	}
}

fn mismatch(field: &str, expected: &str, value: &toml::Value) -> ValidationError {
	ValidationError::TypeMismatch {
		field: field.to_string(),
		expected: expected.to_string(),
		actual: value.type_str().to_string(),
	}
}

fn check_type(name: &str, value: &toml::Value, expected: &FieldType) -> Result<(), ValidationError> {
	match expected {
		FieldType::String => {
			if !value.is_str() {
				return Err(mismatch(name, "string", value));
			}
		},
		FieldType::Boolean => {
			if !value.is_bool() {
				return Err(mismatch(name, "boolean", value));
			}
		},
		FieldType::Integer { min, max } => {
			let n = value
				.as_integer()
				.ok_or_else(|| mismatch(name, "integer", value))?;
			if let Some(min) = min.filter(|min| n < *min) {
				return Err(ValidationError::InvalidValue {
					field: name.to_string(),
					message: format!("Value {} is less than minimum {}", n, min),
				});
			}
			if let Some(max) = max.filter(|max| n > *max) {
				return Err(ValidationError::InvalidValue {
					field: name.to_string(),
					message: format!("Value {} is greater than maximum {}", n, max),
				});
			}
		},
		FieldType::Array(inner) => {
			let items = value
				.as_array()
				.ok_or_else(|| mismatch(name, "array", value))?;
			for (i, item) in items.iter().enumerate() {
				check_type(&format!("{}[{}]", name, i), item, inner)?;
			}
		},
		FieldType::Table(schema) => {
			schema.validate(value).map_err(|e| e.nested_in(name))?;
		},
	}

	Ok(())
}

/// A validator for one implementation's configuration table.
pub trait ConfigSchema: Send + Sync {
	fn validate(&self, config: &toml::Value) -> Result<(), ValidationError>;
}

#[cfg(test)]
mod tests {
	use super::*;

	fn schema() -> Schema {
		Schema::new(
			vec![
				Field::new("name", FieldType::String),
				Field::new(
					"limit",
					FieldType::Integer {
						min: Some(1),
						max: Some(10),
					},
				),
			],
			vec![
				Field::new("tags", FieldType::Array(Box::new(FieldType::String))),
				Field::new(
					"inner",
					FieldType::Table(Schema::new(
						vec![Field::new("flag", FieldType::Boolean)],
						vec![],
					)),
				),
				Field::new("url", FieldType::String).with_validator(|v| {
					match v.as_str() {
						Some(s) if s.starts_with("http") => Ok(()),
						_ => Err("must be an http url".to_string()),
					}
				}),
			],
		)
	}

	fn parse(s: &str) -> toml::Value {
		toml::from_str(s).unwrap()
	}

	#[test]
	fn test_valid_config() {
		let config = parse(
			r#"
name = "a"
limit = 3
tags = ["x", "y"]
url = "http://localhost"
[inner]
flag = true
"#,
		);
		assert!(schema().validate(&config).is_ok());
	}

	#[test]
	fn test_missing_required() {
		let err = schema().validate(&parse("name = \"a\"")).unwrap_err();
		assert!(matches!(err, ValidationError::MissingField(f) if f == "limit"));
	}

	#[test]
	fn test_out_of_range() {
		let err = schema()
			.validate(&parse("name = \"a\"\nlimit = 11"))
			.unwrap_err();
		assert!(err.to_string().contains("greater than maximum 10"));
	}

	#[test]
	fn test_array_element_type() {
		let err = schema()
			.validate(&parse("name = \"a\"\nlimit = 1\ntags = [\"x\", 2]"))
			.unwrap_err();
		assert!(matches!(err, ValidationError::TypeMismatch { field, .. } if field == "tags[1]"));
	}

	#[test]
	fn test_nested_field_path() {
		let err = schema()
			.validate(&parse("name = \"a\"\nlimit = 1\n[inner]\n"))
			.unwrap_err();
		assert!(matches!(err, ValidationError::MissingField(f) if f == "inner.flag"));
	}

	#[test]
	fn test_custom_validator() {
		let err = schema()
			.validate(&parse("name = \"a\"\nlimit = 1\nurl = \"ftp://x\""))
			.unwrap_err();
		assert!(err.to_string().contains("must be an http url"));
	}
}
