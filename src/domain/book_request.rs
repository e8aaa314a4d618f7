use crate::domain::book::Book;
use crate::domain::user::PublicUser;
use crate::error::{AppError, Result};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use time::OffsetDateTime;
use uuid::Uuid;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RequestStatus {
    #[default]
    Pending,
    Approved,
    Rejected,
}

impl RequestStatus {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Approved => "approved",
            Self::Rejected => "rejected",
        }
    }

    /// Parses the owner's answer to a request. Only a final status is accepted.
    ///
    /// # Errors
    /// Returns `AppError::BadRequest` for anything but `approved` or `rejected`.
    pub fn decision(raw: &str) -> Result<Self> {
        match raw.parse() {
            Ok(status @ (Self::Approved | Self::Rejected)) => Ok(status),
            _ => Err(AppError::BadRequest("Invalid status value. Only 'approved' or 'rejected' allowed".to_string())),
        }
    }
}

impl fmt::Display for RequestStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for RequestStatus {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.trim() {
            "pending" => Ok(Self::Pending),
            "approved" => Ok(Self::Approved),
            "rejected" => Ok(Self::Rejected),
            other => Err(format!("unknown request status: {other}")),
        }
    }
}

/// A user's request for someone else's book.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BookRequest {
    pub id: Uuid,
    pub book_id: Uuid,
    pub requester_id: Uuid,
    /// The book's uploader at the time of the request.
    pub owner_id: Uuid,
    pub status: RequestStatus,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
    #[serde(with = "time::serde::rfc3339")]
    pub updated_at: OffsetDateTime,
}

impl BookRequest {
    #[must_use]
    pub fn involves(&self, user_id: Uuid) -> bool {
        self.requester_id == user_id || self.owner_id == user_id
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewBookRequest {
    pub book_id: Uuid,
    pub requester_id: Uuid,
    pub owner_id: Uuid,
}

/// A request with its book and both parties resolved.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RequestListing {
    #[serde(flatten)]
    pub request: BookRequest,
    pub book: Option<Book>,
    pub requester: Option<PublicUser>,
    pub owner: Option<PublicUser>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_decision_only_accepts_final_states() {
        assert_eq!(RequestStatus::decision("approved").unwrap(), RequestStatus::Approved);
        assert_eq!(RequestStatus::decision("rejected").unwrap(), RequestStatus::Rejected);
        for raw in ["pending", "APPROVED", "", "maybe"] {
            let err = RequestStatus::decision(raw).unwrap_err();
            assert!(matches!(err, AppError::BadRequest(ref m) if m.starts_with("Invalid status value")));
        }
    }
}
