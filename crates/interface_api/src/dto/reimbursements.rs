//! Reimbursement DTOs

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use validator::Validate;

use core_kernel::Money;
use domain_reimbursement::{
    Attachment, ExpenseAmount, Reimbursement, ReimbursementEvent, ReimbursementState, Role,
    StateTimestamps,
};

#[derive(Debug, Deserialize, Validate)]
pub struct CreateReimbursementRequest {
    /// Id of the request to reimburse, e.g. `REQ-0191...`
    #[validate(length(min = 1, message = "request_id is required"))]
    pub request_id: String,
}

#[derive(Debug, Serialize)]
pub struct AttachmentResponse {
    pub id: String,
    pub title: Option<String>,
    pub file_name: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl From<&Attachment> for AttachmentResponse {
    fn from(attachment: &Attachment) -> Self {
        Self {
            id: attachment.id.to_string(),
            title: attachment.title.clone(),
            file_name: attachment.file_name.clone(),
            created_at: attachment.created_at,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct ReimbursementResponse {
    pub id: String,
    pub request_id: String,
    pub user_id: String,
    pub state: ReimbursementState,
    pub description: Option<String>,
    pub requester_notes: Option<String>,
    pub tsp_notes: Option<String>,
    pub administrative_notes: Option<String>,
    pub attachments: Vec<AttachmentResponse>,
    pub timestamps: StateTimestamps,
    pub available_events: Vec<ReimbursementEvent>,
    pub version: u64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl From<&Reimbursement> for ReimbursementResponse {
    fn from(r: &Reimbursement) -> Self {
        Self {
            id: r.id.to_string(),
            request_id: r.request_id.to_string(),
            user_id: r.user_id().to_string(),
            state: r.state(),
            description: r.description.clone(),
            requester_notes: r.requester_notes.clone(),
            tsp_notes: r.tsp_notes.clone(),
            administrative_notes: r.administrative_notes.clone(),
            attachments: r.attachments.iter().map(AttachmentResponse::from).collect(),
            timestamps: r.timestamps().clone(),
            available_events: r.available_events(),
            version: r.version,
            created_at: r.created_at,
            updated_at: r.updated_at,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct RoleEditable {
    pub role: Role,
    pub editable: bool,
}

/// Edit permissions of the caller's roles in the current state
#[derive(Debug, Serialize)]
pub struct EditableResponse {
    pub state: ReimbursementState,
    /// True if any of the caller's roles may edit
    pub editable: bool,
    pub roles: Vec<RoleEditable>,
}

#[derive(Debug, Serialize)]
pub struct EventsResponse {
    pub state: ReimbursementState,
    pub events: Vec<ReimbursementEvent>,
}

#[derive(Debug, Default, Deserialize)]
pub struct ExpenseSumQuery {
    /// Which amount to sum; defaults to `total`
    pub kind: Option<ExpenseAmount>,
}

#[derive(Debug, Serialize)]
pub struct MoneyResponse {
    pub amount: Decimal,
    pub currency: String,
    pub formatted: String,
}

impl From<&Money> for MoneyResponse {
    fn from(money: &Money) -> Self {
        Self {
            amount: money.amount(),
            currency: money.currency().code().to_string(),
            formatted: money.to_string(),
        }
    }
}

#[derive(Debug, Serialize)]
pub struct ExpenseSumResponse {
    pub kind: ExpenseAmount,
    pub sums: Vec<MoneyResponse>,
}
