use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::core::errors::SitecheckError;
use crate::core::models::activity_entry::ActivityAction;

/// Lifecycle state of a checklist.
///
/// `Checking` is part of the stored vocabulary but no operation enters it;
/// it is treated as equivalent to `Submitted` when checking.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ChecklistStatus {
    Draft,
    Submitted,
    Checking,
    Checked,
    Approving,
    Approved,
    Rejected,
}

impl ChecklistStatus {
    pub const ALL: [ChecklistStatus; 7] = [
        Self::Draft,
        Self::Submitted,
        Self::Checking,
        Self::Checked,
        Self::Approving,
        Self::Approved,
        Self::Rejected,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Draft => "Draft",
            Self::Submitted => "Submitted",
            Self::Checking => "Checking",
            Self::Checked => "Checked",
            Self::Approving => "Approving",
            Self::Approved => "Approved",
            Self::Rejected => "Rejected",
        }
    }
}

impl fmt::Display for ChecklistStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ChecklistStatus {
    type Err = SitecheckError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|status| status.as_str() == s)
            .ok_or_else(|| SitecheckError::validation(format!("unknown checklist status '{s}'")))
    }
}

/// The four role-gated steps of the Maker → Checker → Approver workflow.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WorkflowStep {
    Submit,
    Check,
    SubmitApproval,
    Approve,
}

impl WorkflowStep {
    /// Whether this step is valid from `from` under strict transitions.
    pub fn accepts(self, from: ChecklistStatus) -> bool {
        use ChecklistStatus::*;
        matches!(
            (self, from),
            (Self::Submit, Draft)
                | (Self::Check, Submitted | Checking)
                | (Self::SubmitApproval, Checked)
                | (Self::Approve, Approving)
        )
    }

    pub fn action(self) -> ActivityAction {
        match self {
            Self::Submit => ActivityAction::Submit,
            Self::Check => ActivityAction::Check,
            Self::SubmitApproval => ActivityAction::SubmitApproval,
            Self::Approve => ActivityAction::Approve,
        }
    }

    /// Verb used in error messages.
    pub fn verb(self) -> &'static str {
        match self {
            Self::Submit => "submit",
            Self::Check => "check",
            Self::SubmitApproval => "submit for approval",
            Self::Approve => "approve",
        }
    }
}

/// Outcome chosen by a checker or approver.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Decision {
    Approved,
    Rejected,
}

impl Decision {
    /// `"Approved"` approves; any other value rejects.
    pub fn parse(status: &str) -> Self {
        if status == "Approved" {
            Self::Approved
        } else {
            Self::Rejected
        }
    }

    pub fn past_tense(self) -> &'static str {
        match self {
            Self::Approved => "approved",
            Self::Rejected => "rejected",
        }
    }
}

/// One line of a checklist.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChecklistItem {
    pub text: String,
    #[serde(default)]
    pub checked: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub photo_url: Option<String>,
}

impl ChecklistItem {
    pub fn unchecked(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            checked: false,
            photo_url: None,
        }
    }
}

/// An inspection checklist moving through the sign-off workflow.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Checklist {
    pub id: String,
    pub project_id: String,
    pub format_id: String,
    pub location: String,
    pub maker_id: String,
    #[serde(default)]
    pub checker_id: Option<String>,
    #[serde(default)]
    pub approver_id: Option<String>,
    pub items: Vec<ChecklistItem>,
    pub status: ChecklistStatus,
    #[serde(default)]
    pub checker_comments: Option<String>,
    #[serde(default)]
    pub approver_comments: Option<String>,
    pub created_at: DateTime<Utc>,
    #[serde(default)]
    pub submitted_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub checked_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub approved_at: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub updated_at: Option<DateTime<Utc>>,
}

impl Checklist {
    /// Build a fresh `Draft` checklist.
    pub fn draft(
        id: String,
        project_id: String,
        format_id: String,
        location: String,
        maker_id: String,
        items: Vec<ChecklistItem>,
        now: DateTime<Utc>,
    ) -> Self {
        Self {
            id,
            project_id,
            format_id,
            location,
            maker_id,
            checker_id: None,
            approver_id: None,
            items,
            status: ChecklistStatus::Draft,
            checker_comments: None,
            approver_comments: None,
            created_at: now,
            submitted_at: None,
            checked_at: None,
            approved_at: None,
            updated_at: None,
        }
    }

    /// Assign the checker and move to `Submitted`.
    pub fn submit(&mut self, checker_id: &str, now: DateTime<Utc>) {
        self.checker_id = Some(checker_id.to_string());
        self.status = ChecklistStatus::Submitted;
        self.submitted_at = Some(now);
    }

    /// Replace the items with the checker's copy and record the decision.
    pub fn check(
        &mut self,
        items: Vec<ChecklistItem>,
        decision: Decision,
        comments: Option<String>,
        now: DateTime<Utc>,
    ) {
        self.items = items;
        self.status = match decision {
            Decision::Approved => ChecklistStatus::Checked,
            Decision::Rejected => ChecklistStatus::Rejected,
        };
        self.checked_at = Some(now);
        self.checker_comments = comments;
    }

    /// Assign the approver and move to `Approving`.
    pub fn submit_for_approval(&mut self, approver_id: &str) {
        self.approver_id = Some(approver_id.to_string());
        self.status = ChecklistStatus::Approving;
    }

    /// Record the approver's final decision.
    pub fn approve(&mut self, decision: Decision, comments: Option<String>, now: DateTime<Utc>) {
        self.status = match decision {
            Decision::Approved => ChecklistStatus::Approved,
            Decision::Rejected => ChecklistStatus::Rejected,
        };
        self.approved_at = Some(now);
        self.approver_comments = comments;
    }
}

/// Direct field corrections that bypass the state machine.
///
/// Identity, authorship and transition timestamps are not patchable;
/// unknown fields are rejected.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct ChecklistPatch {
    pub project_id: Option<String>,
    pub format_id: Option<String>,
    pub location: Option<String>,
    pub items: Option<Vec<ChecklistItem>>,
    pub status: Option<ChecklistStatus>,
    pub checker_id: Option<String>,
    pub approver_id: Option<String>,
    pub checker_comments: Option<String>,
    pub approver_comments: Option<String>,
}

impl ChecklistPatch {
    /// Merge every present field into `checklist`.
    pub fn apply_to(self, checklist: &mut Checklist, now: DateTime<Utc>) {
        if let Some(v) = self.project_id {
            checklist.project_id = v;
        }
        if let Some(v) = self.format_id {
            checklist.format_id = v;
        }
        if let Some(v) = self.location {
            checklist.location = v;
        }
        if let Some(v) = self.items {
            checklist.items = v;
        }
        if let Some(v) = self.status {
            checklist.status = v;
        }
        if let Some(v) = self.checker_id {
            checklist.checker_id = Some(v);
        }
        if let Some(v) = self.approver_id {
            checklist.approver_id = Some(v);
        }
        if let Some(v) = self.checker_comments {
            checklist.checker_comments = Some(v);
        }
        if let Some(v) = self.approver_comments {
            checklist.approver_comments = Some(v);
        }
        checklist.updated_at = Some(now);
    }
}
