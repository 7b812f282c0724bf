//! Writable attributes per entity
//!
//! Update payloads are checked against this table before anything is
//! applied. A key that is not listed for its entity is never written.

use serde_json::{Map, Value};

/// Key marking a nested entry for removal
pub const DESTROY_KEY: &str = "_destroy";

/// Statically declared writable attribute names
#[derive(Debug, Clone, Copy)]
pub struct AccessibleAttributes {
    /// Top-level keys of a reimbursement update
    pub reimbursement: &'static [&'static str],
    /// Keys allowed inside `request_attributes`
    pub request: &'static [&'static str],
    /// Keys allowed inside each `expenses_attributes` entry
    pub expense: &'static [&'static str],
    /// Keys allowed inside each `attachments_attributes` entry
    pub attachment: &'static [&'static str],
}

pub const ACCESSIBLE_ATTRIBUTES: AccessibleAttributes = AccessibleAttributes {
    reimbursement: &[
        "description",
        "requester_notes",
        "tsp_notes",
        "administrative_notes",
        "request_attributes",
        "attachments_attributes",
    ],
    request: &["id", "expenses_attributes"],
    expense: &["id", "total_amount", "authorized_amount"],
    attachment: &["id", "title", "file_name", DESTROY_KEY],
};

impl AccessibleAttributes {
    /// Returns the keys of `object` not present in `allowed`, in key order
    pub fn disallowed_keys(allowed: &[&str], object: &Map<String, Value>) -> Vec<String> {
        object
            .keys()
            .filter(|key| !allowed.contains(&key.as_str()))
            .cloned()
            .collect()
    }

    /// Returns the first top-level key that is not writable, if any
    pub fn first_protected(&self, payload: &Map<String, Value>) -> Option<String> {
        Self::disallowed_keys(self.reimbursement, payload).into_iter().next()
    }
}
