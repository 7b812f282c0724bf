//! Update payload parsing
//!
//! An update arrives as a JSON object. Top-level keys are checked against
//! [`AccessibleAttributes`] before anything else; the request subtree is kept
//! raw here and judged separately by the
//! [`NestedUpdateFilter`](crate::nested::NestedUpdateFilter).

use serde_json::{Map, Value};
use std::str::FromStr;

use core_kernel::AttachmentId;

use crate::attributes::{AccessibleAttributes, ACCESSIBLE_ATTRIBUTES, DESTROY_KEY};
use crate::error::ReimbursementError;
use crate::nested::REQUEST_ATTRIBUTES;

pub const ATTACHMENTS_ATTRIBUTES: &str = "attachments_attributes";

/// Changes to the reimbursement's own text fields
///
/// `None` leaves a field untouched, `Some(None)` clears it.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FieldChanges {
    pub description: Option<Option<String>>,
    pub requester_notes: Option<Option<String>>,
    pub tsp_notes: Option<Option<String>>,
    pub administrative_notes: Option<Option<String>>,
}

impl FieldChanges {
    pub fn is_empty(&self) -> bool {
        self.description.is_none()
            && self.requester_notes.is_none()
            && self.tsp_notes.is_none()
            && self.administrative_notes.is_none()
    }
}

/// One entry of `attachments_attributes`
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AttachmentChange {
    Add {
        title: Option<String>,
        file_name: Option<String>,
    },
    Update {
        id: AttachmentId,
        title: Option<Option<String>>,
        file_name: Option<Option<String>>,
    },
    Remove {
        id: AttachmentId,
    },
}

/// A parsed update, split into its three independently handled parts
#[derive(Debug, Clone, Default)]
pub struct UpdatePayload {
    pub fields: FieldChanges,
    pub attachments: Vec<AttachmentChange>,
    /// Raw request subtree, still to be filtered
    pub request_attributes: Option<Value>,
}

impl UpdatePayload {
    /// Parses a payload against the default attribute table
    pub fn parse(payload: &Value) -> Result<Self, ReimbursementError> {
        Self::parse_with(payload, &ACCESSIBLE_ATTRIBUTES)
    }

    /// Parses a payload against an explicit attribute table
    ///
    /// # Errors
    ///
    /// - `ProtectedAttribute` if a top-level key is not writable
    /// - `MalformedPayload` if a text field or attachment entry has the wrong shape
    pub fn parse_with(
        payload: &Value,
        attributes: &AccessibleAttributes,
    ) -> Result<Self, ReimbursementError> {
        let object = payload
            .as_object()
            .ok_or_else(|| ReimbursementError::malformed("update payload must be an object"))?;

        if let Some(key) = attributes.first_protected(object) {
            return Err(ReimbursementError::ProtectedAttribute(key));
        }

        let fields = FieldChanges {
            description: text_field(object, "description")?,
            requester_notes: text_field(object, "requester_notes")?,
            tsp_notes: text_field(object, "tsp_notes")?,
            administrative_notes: text_field(object, "administrative_notes")?,
        };

        let attachments = match object.get(ATTACHMENTS_ATTRIBUTES) {
            Some(value) => attachment_changes(value, attributes)?,
            None => Vec::new(),
        };

        Ok(Self {
            fields,
            attachments,
            request_attributes: object.get(REQUEST_ATTRIBUTES).cloned(),
        })
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty() && self.attachments.is_empty() && self.request_attributes.is_none()
    }
}

fn text_field(
    object: &Map<String, Value>,
    key: &str,
) -> Result<Option<Option<String>>, ReimbursementError> {
    match object.get(key) {
        None => Ok(None),
        Some(Value::Null) => Ok(Some(None)),
        Some(Value::String(s)) => Ok(Some(Some(s.clone()))),
        Some(other) => Err(ReimbursementError::malformed(format!(
            "{} must be a string or null, got {}",
            key, other
        ))),
    }
}

fn attachment_changes(
    value: &Value,
    attributes: &AccessibleAttributes,
) -> Result<Vec<AttachmentChange>, ReimbursementError> {
    let entries: Vec<&Value> = match value {
        Value::Object(map) => map.values().collect(),
        Value::Array(items) => items.iter().collect(),
        _ => {
            return Err(ReimbursementError::malformed(
                "attachments_attributes must be an object or a list",
            ))
        }
    };

    let mut changes = Vec::with_capacity(entries.len());
    for entry in entries {
        let entry = entry.as_object().ok_or_else(|| {
            ReimbursementError::malformed("attachment entries must be objects")
        })?;

        let disallowed = AccessibleAttributes::disallowed_keys(attributes.attachment, entry);
        if !disallowed.is_empty() {
            return Err(ReimbursementError::malformed(format!(
                "attachment keys not allowed: {}",
                disallowed.join(", ")
            )));
        }

        let id = match entry.get("id") {
            None | Some(Value::Null) => None,
            Some(Value::String(s)) => Some(AttachmentId::from_str(s).map_err(|_| {
                ReimbursementError::malformed(format!("invalid attachment id: {}", s))
            })?),
            Some(other) => {
                return Err(ReimbursementError::malformed(format!(
                    "invalid attachment id: {}",
                    other
                )))
            }
        };
        let destroy = entry.get(DESTROY_KEY).is_some_and(is_truthy);
        let title = text_field(entry, "title")?;
        let file_name = text_field(entry, "file_name")?;

        match (id, destroy) {
            (Some(id), true) => changes.push(AttachmentChange::Remove { id }),
            // Marking a not-yet-created attachment for removal is a no-op
            (None, true) => {}
            (Some(id), false) => changes.push(AttachmentChange::Update { id, title, file_name }),
            (None, false) => changes.push(AttachmentChange::Add {
                title: title.flatten(),
                file_name: file_name.flatten(),
            }),
        }
    }

    Ok(changes)
}

/// Form-style booleans: `true`, `1`, `"1"`, `"true"`
fn is_truthy(value: &Value) -> bool {
    match value {
        Value::Bool(b) => *b,
        Value::Number(n) => n.as_i64() == Some(1),
        Value::String(s) => matches!(s.as_str(), "1" | "true"),
        _ => false,
    }
}
