//! Supporting documents attached to a reimbursement
//!
//! Only metadata lives here; file contents are kept by an external store and
//! referenced by `file_name`.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use core_kernel::AttachmentId;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Attachment {
    pub id: AttachmentId,
    pub title: Option<String>,
    pub file_name: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl Attachment {
    pub fn new(title: Option<String>, file_name: Option<String>, created_at: DateTime<Utc>) -> Self {
        Self {
            id: AttachmentId::new_v7(),
            title,
            file_name,
            created_at,
        }
    }
}
