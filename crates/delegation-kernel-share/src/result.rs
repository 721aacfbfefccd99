//! Per-entity results of a bulk share.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

use delegation_kernel_core::{EntityId, Revision, SecuredEntity};

/// Why a request was rejected, as an HTTP-like status code.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(into = "u16", try_from = "u16")]
pub enum RejectionCode {
    /// Malformed or semantically invalid request.
    BadRequest,
    /// The requester lacks the needed access.
    Forbidden,
    /// Entity or delegation not found.
    NotFound,
    /// Conflicts with the current state of the entity.
    Conflict,
}

impl RejectionCode {
    pub const fn as_u16(self) -> u16 {
        match self {
            RejectionCode::BadRequest => 400,
            RejectionCode::Forbidden => 403,
            RejectionCode::NotFound => 404,
            RejectionCode::Conflict => 409,
        }
    }
}

impl From<RejectionCode> for u16 {
    fn from(code: RejectionCode) -> Self {
        code.as_u16()
    }
}

impl TryFrom<u16> for RejectionCode {
    type Error = String;

    fn try_from(value: u16) -> Result<Self, Self::Error> {
        match value {
            400 => Ok(RejectionCode::BadRequest),
            403 => Ok(RejectionCode::Forbidden),
            404 => Ok(RejectionCode::NotFound),
            409 => Ok(RejectionCode::Conflict),
            other => Err(format!("unknown rejection code {}", other)),
        }
    }
}

impl fmt::Display for RejectionCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_u16())
    }
}

/// A request that could not be applied.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RejectedRequest {
    pub code: RejectionCode,
    /// True if re-issuing the same request after re-reading may succeed.
    #[serde(default)]
    pub should_retry: bool,
    pub reason: String,
}

impl RejectedRequest {
    pub fn new(code: RejectionCode, should_retry: bool, reason: impl Into<String>) -> Self {
        Self {
            code,
            should_retry,
            reason: reason.into(),
        }
    }

    pub fn bad_request(reason: impl Into<String>) -> Self {
        Self::new(RejectionCode::BadRequest, false, reason)
    }

    pub fn forbidden(reason: impl Into<String>) -> Self {
        Self::new(RejectionCode::Forbidden, false, reason)
    }

    /// Conflicts are always worth retrying after a re-read.
    pub fn conflict(reason: impl Into<String>) -> Self {
        Self::new(RejectionCode::Conflict, true, reason)
    }

    pub fn not_found(should_retry: bool, reason: impl Into<String>) -> Self {
        Self::new(RejectionCode::NotFound, should_retry, reason)
    }
}

/// Outcome of a bulk share for one entity.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EntityBulkShareResult {
    /// The saved entity, if at least one request was applied.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub updated_entity: Option<SecuredEntity>,

    pub entity_id: EntityId,

    /// Revision of the entity as read before any update, if it exists.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub entity_rev: Option<Revision>,

    /// Rejected requests by request id.
    #[serde(default)]
    pub rejected_requests: BTreeMap<String, RejectedRequest>,
}

impl EntityBulkShareResult {
    /// Every request rejected, nothing saved.
    pub fn rejected(
        entity_id: EntityId,
        entity_rev: Option<Revision>,
        rejected_requests: BTreeMap<String, RejectedRequest>,
    ) -> Self {
        Self {
            updated_entity: None,
            entity_id,
            entity_rev,
            rejected_requests,
        }
    }

    pub fn is_success(&self) -> bool {
        self.updated_entity.is_some()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_code_wire_form() {
        let rejected = RejectedRequest::conflict("key already used");
        let json = serde_json::to_value(&rejected).unwrap();
        assert_eq!(json["code"], 409);
        assert_eq!(json["shouldRetry"], true);

        let back: RejectedRequest = serde_json::from_value(json).unwrap();
        assert_eq!(back, rejected);
    }

    #[test]
    fn test_unknown_code_rejected() {
        let json = serde_json::json!({ "code": 418, "reason": "teapot" });
        assert!(serde_json::from_value::<RejectedRequest>(json).is_err());
    }

    #[test]
    fn test_constructors() {
        assert!(!RejectedRequest::bad_request("x").should_retry);
        assert_eq!(RejectedRequest::forbidden("x").code.as_u16(), 403);
        assert!(RejectedRequest::not_found(true, "x").should_retry);
    }
}
