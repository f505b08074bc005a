//! Sensitive-field schema and JSON record traversal.
//!
//! Records are JSON objects handed over by the persistence layer. A
//! [`FieldSchema`] names which dot-notation paths hold banking credentials and
//! how each is masked. Array fields use the `[]` suffix, e.g.
//! `"accounts[].routing_number"`.

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// What a sensitive field holds; decides its mask and its audit data type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FieldKind {
    RoutingNumber,
    AccountNumber,
}

impl FieldKind {
    /// Name used as `data_type` in audit entries.
    pub fn data_type(self) -> &'static str {
        match self {
            FieldKind::RoutingNumber => "routing_number",
            FieldKind::AccountNumber => "account_number",
        }
    }
}

/// One sensitive field location within a record.
#[derive(Debug, Clone)]
pub struct SensitiveField {
    pub path: String,
    pub kind: FieldKind,
    segments: Vec<PathSegment>,
}

impl SensitiveField {
    pub fn new(path: impl Into<String>, kind: FieldKind) -> Self {
        let path = path.into();
        let segments = parse_path(&path);
        Self { path, kind, segments }
    }
}

/// The set of sensitive fields the vault transforms. Everything else in a
/// record passes through untouched.
#[derive(Debug, Clone)]
pub struct FieldSchema {
    fields: Vec<SensitiveField>,
}

impl FieldSchema {
    pub fn new(fields: Vec<SensitiveField>) -> Self {
        Self { fields }
    }

    pub fn fields(&self) -> &[SensitiveField] {
        &self.fields
    }

    /// Visit every non-empty string value at a schema path in `record`.
    ///
    /// `visit` receives the concrete path (array indices filled in, e.g.
    /// `accounts[1].routing_number`), the field kind, and the value. Missing
    /// paths, non-string leaves, and empty strings are skipped.
    ///
    /// # Errors
    ///
    /// Stops at and returns the first error produced by `visit`.
    pub fn try_for_each_mut<E, F>(&self, record: &mut Value, mut visit: F) -> Result<(), E>
    where
        F: FnMut(&str, FieldKind, &mut String) -> Result<(), E>,
    {
        for field in &self.fields {
            visit_at_path(record, &field.segments, String::new(), field.kind, &mut visit)?;
        }
        Ok(())
    }

    /// Infallible variant of [`FieldSchema::try_for_each_mut`].
    pub fn for_each_mut<F>(&self, record: &mut Value, mut visit: F)
    where
        F: FnMut(&str, FieldKind, &mut String),
    {
        let _ = self.try_for_each_mut::<std::convert::Infallible, _>(record, |path, kind, value| {
            visit(path, kind, value);
            Ok(())
        });
    }
}

impl Default for FieldSchema {
    /// `routing_number` and `account_number` at the top level of the record.
    fn default() -> Self {
        Self::new(vec![
            SensitiveField::new("routing_number", FieldKind::RoutingNumber),
            SensitiveField::new("account_number", FieldKind::AccountNumber),
        ])
    }
}

// ---------------------------------------------------------------------------
// Path traversal helpers
// ---------------------------------------------------------------------------

/// Segments of a dot-notation field path.
#[derive(Debug, Clone, PartialEq, Eq)]
enum PathSegment {
    /// Navigate into an object property by name.
    Key(String),
    /// Expand into every element of a JSON array.
    ArrayItem,
}

/// Parse a dot-notation path into a list of [`PathSegment`]s.
///
/// `"accounts[].routing_number"` → `[Key("accounts"), ArrayItem, Key("routing_number")]`.
fn parse_path(path: &str) -> Vec<PathSegment> {
    let mut segments = Vec::new();
    for part in path.split('.') {
        if let Some(key) = part.strip_suffix("[]") {
            segments.push(PathSegment::Key(key.to_owned()));
            segments.push(PathSegment::ArrayItem);
        } else {
            segments.push(PathSegment::Key(part.to_owned()));
        }
    }
    segments
}

/// Recursively navigate `value` following `segments`, calling `visit` on any
/// non-empty string leaf found at the end of the path.
fn visit_at_path<E, F>(
    value: &mut Value,
    segments: &[PathSegment],
    path: String,
    kind: FieldKind,
    visit: &mut F,
) -> Result<(), E>
where
    F: FnMut(&str, FieldKind, &mut String) -> Result<(), E>,
{
    let Some((head, rest)) = segments.split_first() else {
        if let Value::String(s) = value {
            if !s.is_empty() {
                visit(&path, kind, s)?;
            }
        }
        return Ok(());
    };

    match head {
        PathSegment::Key(key) => {
            if let Value::Object(map) = value {
                if let Some(child) = map.get_mut(key) {
                    let child_path = if path.is_empty() {
                        key.clone()
                    } else {
                        format!("{path}.{key}")
                    };
                    visit_at_path(child, rest, child_path, kind, visit)?;
                }
            }
        }
        PathSegment::ArrayItem => {
            if let Value::Array(items) = value {
                for (i, item) in items.iter_mut().enumerate() {
                    visit_at_path(item, rest, format!("{path}[{i}]"), kind, visit)?;
                }
            }
        }
    }
    Ok(())
}
