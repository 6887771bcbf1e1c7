use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::Serialize;
use tracing::info;

use crate::core::errors::{Result, SitecheckError};
use crate::core::models::activity_entry::{ActivityAction, ActivityEntry, EntityType, SYSTEM_ACTOR};
use crate::core::models::catalog::{CatalogRecord, Format};
use crate::core::models::checklist::{
    Checklist, ChecklistItem, ChecklistPatch, ChecklistStatus, Decision, WorkflowStep,
};
use crate::core::services::checklist_repository::ChecklistRepository;
use crate::core::services::entity_store::EntityStore;
use crate::core::traits::activity_log::ActivityLog;
use crate::core::traits::kv_store::WriteBatch;

/// How strictly the engine guards transitions.
///
/// Both flags default to off, which accepts every step from any state and
/// from any caller.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct WorkflowPolicy {
    /// Only accept each step from its predecessor state.
    pub strict_transitions: bool,
    /// Require the caller to be the maker, checker or approver the step belongs to.
    pub enforce_roles: bool,
}

/// Input for `WorkflowService::create`.
#[derive(Debug, Clone, PartialEq)]
pub struct NewChecklist {
    pub project_id: String,
    pub format_id: String,
    pub location: String,
    pub maker_id: String,
    /// When absent, the item texts are copied from the format.
    pub items: Option<Vec<ChecklistItem>>,
}

/// Input for `WorkflowService::check`.
#[derive(Debug, Clone, PartialEq)]
pub struct CheckRequest {
    pub checker_id: String,
    pub items: Vec<ChecklistItem>,
    pub decision: Decision,
    pub comments: Option<String>,
}

/// Input for `WorkflowService::approve`.
#[derive(Debug, Clone, PartialEq)]
pub struct ApproveRequest {
    pub approver_id: String,
    pub decision: Decision,
    pub comments: Option<String>,
}

/// Optional filters for `WorkflowService::list`.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ChecklistFilter {
    pub project_id: Option<String>,
    pub status: Option<ChecklistStatus>,
    pub maker_id: Option<String>,
}

impl ChecklistFilter {
    fn matches(&self, checklist: &Checklist) -> bool {
        self.project_id
            .as_deref()
            .is_none_or(|p| checklist.project_id == p)
            && self.status.is_none_or(|s| checklist.status == s)
            && self.maker_id.as_deref().is_none_or(|m| checklist.maker_id == m)
    }
}

/// Checklists waiting on one user, grouped by the step they owe.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Worklist {
    pub drafts: Vec<Checklist>,
    pub to_check: Vec<Checklist>,
    pub to_submit_for_approval: Vec<Checklist>,
    pub to_approve: Vec<Checklist>,
}

/// Which assigned role a caller must hold for a step.
#[derive(Debug, Clone, Copy)]
enum Role {
    Maker,
    Checker,
    Approver,
}

impl Role {
    fn name(self) -> &'static str {
        match self {
            Self::Maker => "maker",
            Self::Checker => "checker",
            Self::Approver => "approver",
        }
    }

    fn assignee(self, checklist: &Checklist) -> Option<&str> {
        match self {
            Self::Maker => Some(checklist.maker_id.as_str()),
            Self::Checker => checklist.checker_id.as_deref(),
            Self::Approver => checklist.approver_id.as_deref(),
        }
    }
}

/// The Maker → Checker → Approver sign-off engine.
///
/// Every mutation loads the checklist, validates the step, stages the new
/// record and exactly one activity entry in a single batch, and commits it.
pub struct WorkflowService {
    store: EntityStore,
    checklists: ChecklistRepository,
    activities: Arc<dyn ActivityLog>,
    policy: WorkflowPolicy,
}

impl WorkflowService {
    pub fn new(store: EntityStore, activities: Arc<dyn ActivityLog>, policy: WorkflowPolicy) -> Self {
        Self {
            checklists: ChecklistRepository::new(store.clone()),
            store,
            activities,
            policy,
        }
    }

    pub fn policy(&self) -> WorkflowPolicy {
        self.policy
    }

    /// All checklists in creation order, filtered.
    pub fn list(&self, filter: &ChecklistFilter) -> Result<Vec<Checklist>> {
        Ok(self
            .checklists
            .list()?
            .into_iter()
            .filter(|c| filter.matches(c))
            .collect())
    }

    pub fn get(&self, id: &str) -> Result<Checklist> {
        self.checklists
            .get(id)?
            .ok_or_else(|| SitecheckError::ChecklistNotFound { id: id.to_string() })
    }

    /// Create a `Draft` checklist. Project and format ids are not checked
    /// for existence.
    pub fn create(&self, caller: Option<&str>, new: NewChecklist) -> Result<Checklist> {
        if self.policy.enforce_roles && caller != Some(new.maker_id.as_str()) {
            return Err(SitecheckError::Forbidden {
                id: "(new)".into(),
                actor: caller.unwrap_or("anonymous").to_string(),
                role: Role::Maker.name().into(),
            });
        }

        let items = match new.items {
            Some(items) => items,
            None => self.format_items(&new.format_id)?,
        };

        let now = Utc::now();
        let checklist = Checklist::draft(
            format!("cl_{}", uuid::Uuid::new_v4().simple()),
            new.project_id,
            new.format_id,
            new.location,
            new.maker_id,
            items,
            now,
        );

        let entry = ActivityEntry::new(
            checklist.maker_id.clone(),
            ActivityAction::Create,
            EntityType::Checklist,
            checklist.id.clone(),
            format!("Created checklist for project {}", checklist.project_id),
            now,
        );

        let mut batch = WriteBatch::new();
        self.checklists.stage_insert(&mut batch, &checklist)?;
        self.activities.record(&mut batch, &entry)?;
        self.store.commit(batch)?;

        info!(
            checklist = %checklist.id,
            project = %checklist.project_id,
            items = checklist.items.len(),
            actor = %checklist.maker_id,
            "Checklist created"
        );
        Ok(checklist)
    }

    /// Maker hands the checklist to a checker.
    pub fn submit(&self, caller: Option<&str>, id: &str, checker_id: &str) -> Result<Checklist> {
        self.transition(id, WorkflowStep::Submit, |checklist, now| {
            self.authorize(caller, checklist, Role::Maker, WorkflowStep::Submit)?;
            checklist.submit(checker_id, now);
            Ok((
                checklist.maker_id.clone(),
                format!("Submitted checklist to checker {checker_id}"),
            ))
        })
    }

    /// Checker replaces the items with their reviewed copy and decides.
    ///
    /// The activity is attributed to the supplied `checker_id`, which is not
    /// compared with the assigned checker unless roles are enforced.
    pub fn check(&self, caller: Option<&str>, id: &str, request: CheckRequest) -> Result<Checklist> {
        self.transition(id, WorkflowStep::Check, |checklist, now| {
            self.require_assigned(checklist, Role::Checker, WorkflowStep::Check)?;
            self.authorize(caller, checklist, Role::Checker, WorkflowStep::Check)?;
            checklist.check(request.items, request.decision, request.comments, now);
            Ok((
                request.checker_id,
                format!("Checker {} checklist", request.decision.past_tense()),
            ))
        })
    }

    /// Checker hands a checked checklist to an approver.
    pub fn submit_for_approval(
        &self,
        caller: Option<&str>,
        id: &str,
        approver_id: &str,
    ) -> Result<Checklist> {
        self.transition(id, WorkflowStep::SubmitApproval, |checklist, _now| {
            self.authorize(caller, checklist, Role::Checker, WorkflowStep::SubmitApproval)?;
            checklist.submit_for_approval(approver_id);
            let actor = checklist
                .checker_id
                .clone()
                .unwrap_or_else(|| SYSTEM_ACTOR.to_string());
            Ok((actor, format!("Submitted checklist to approver {approver_id}")))
        })
    }

    /// Approver gives the final decision.
    pub fn approve(&self, caller: Option<&str>, id: &str, request: ApproveRequest) -> Result<Checklist> {
        self.transition(id, WorkflowStep::Approve, |checklist, now| {
            self.require_assigned(checklist, Role::Approver, WorkflowStep::Approve)?;
            self.authorize(caller, checklist, Role::Approver, WorkflowStep::Approve)?;
            checklist.approve(request.decision, request.comments, now);
            Ok((
                request.approver_id,
                format!("Approver {} checklist", request.decision.past_tense()),
            ))
        })
    }

    /// Merge field corrections without consulting the state machine.
    pub fn update(&self, id: &str, patch: ChecklistPatch) -> Result<Checklist> {
        let mut checklist = self.get(id)?;
        let now = Utc::now();
        patch.apply_to(&mut checklist, now);
        self.commit_change(
            &checklist,
            SYSTEM_ACTOR.to_string(),
            ActivityAction::Update,
            "Updated checklist".to_string(),
            now,
        )?;

        info!(checklist = %checklist.id, status = %checklist.status, "Checklist updated");
        Ok(checklist)
    }

    /// Checklists on which `user_id` owes the next step.
    pub fn worklist(&self, user_id: &str) -> Result<Worklist> {
        let mut worklist = Worklist::default();
        let is = |assignee: &Option<String>| assignee.as_deref() == Some(user_id);

        for checklist in self.checklists.list()? {
            match checklist.status {
                ChecklistStatus::Draft if checklist.maker_id == user_id => {
                    worklist.drafts.push(checklist)
                }
                ChecklistStatus::Submitted | ChecklistStatus::Checking
                    if is(&checklist.checker_id) =>
                {
                    worklist.to_check.push(checklist)
                }
                ChecklistStatus::Checked if is(&checklist.checker_id) => {
                    worklist.to_submit_for_approval.push(checklist)
                }
                ChecklistStatus::Approving if is(&checklist.approver_id) => {
                    worklist.to_approve.push(checklist)
                }
                _ => {}
            }
        }
        Ok(worklist)
    }

    fn format_items(&self, format_id: &str) -> Result<Vec<ChecklistItem>> {
        let formats: Vec<Format> = self.store.get_list(Format::LIST_KEY)?;
        Ok(formats
            .into_iter()
            .find(|f| f.id == format_id)
            .map(|f| f.items.into_iter().map(ChecklistItem::unchecked).collect())
            .unwrap_or_default())
    }

    /// Load, guard, mutate, then commit the record with one activity entry.
    ///
    /// `mutate` returns the actor and details for the activity entry.
    fn transition<F>(&self, id: &str, step: WorkflowStep, mutate: F) -> Result<Checklist>
    where
        F: FnOnce(&mut Checklist, DateTime<Utc>) -> Result<(String, String)>,
    {
        let mut checklist = self.get(id)?;

        if self.policy.strict_transitions && !step.accepts(checklist.status) {
            return Err(SitecheckError::InvalidTransition {
                id: id.to_string(),
                operation: step.verb().to_string(),
                status: checklist.status.to_string(),
            });
        }

        let from = checklist.status;
        let now = Utc::now();
        let (actor, details) = mutate(&mut checklist, now)?;
        self.commit_change(&checklist, actor.clone(), step.action(), details, now)?;

        info!(
            checklist = %checklist.id,
            from = %from,
            status = %checklist.status,
            actor = %actor,
            "Checklist {}",
            step.action()
        );
        Ok(checklist)
    }

    fn commit_change(
        &self,
        checklist: &Checklist,
        actor: String,
        action: ActivityAction,
        details: String,
        now: DateTime<Utc>,
    ) -> Result<()> {
        let entry = ActivityEntry::new(
            actor,
            action,
            EntityType::Checklist,
            checklist.id.clone(),
            details,
            now,
        );

        let mut batch = WriteBatch::new();
        self.checklists.stage_update(&mut batch, checklist)?;
        self.activities.record(&mut batch, &entry)?;
        self.store.commit(batch)
    }

    /// A step performed by a role needs that role to have been assigned.
    fn require_assigned(&self, checklist: &Checklist, role: Role, step: WorkflowStep) -> Result<()> {
        if role.assignee(checklist).is_none() {
            return Err(SitecheckError::RoleNotAssigned {
                id: checklist.id.clone(),
                operation: step.verb().to_string(),
                role: role.name().to_string(),
            });
        }
        Ok(())
    }

    fn authorize(
        &self,
        caller: Option<&str>,
        checklist: &Checklist,
        role: Role,
        step: WorkflowStep,
    ) -> Result<()> {
        if !self.policy.enforce_roles {
            return Ok(());
        }
        self.require_assigned(checklist, role, step)?;
        match caller {
            Some(actor) if role.assignee(checklist) == Some(actor) => Ok(()),
            other => Err(SitecheckError::Forbidden {
                id: checklist.id.clone(),
                actor: other.unwrap_or("anonymous").to_string(),
                role: role.name().to_string(),
            }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::activity::kv_activity_log::{DEFAULT_RETAIN, KvActivityLog};
    use crate::adapters::kv::memory_kv_store::MemoryKvStore;
    use crate::core::errors::ErrorKind;
    use crate::core::traits::kv_store::KvStore;
    use serde_json::Value;
    use std::sync::atomic::{AtomicBool, Ordering};

    struct Fixture {
        workflow: WorkflowService,
        activities: Arc<KvActivityLog>,
    }

    fn fixture_on(kv: Arc<dyn KvStore>, policy: WorkflowPolicy) -> Fixture {
        let store = EntityStore::new(kv.clone());
        let activities = Arc::new(KvActivityLog::new(kv, DEFAULT_RETAIN));
        let workflow = WorkflowService::new(store, activities.clone(), policy);
        Fixture {
            workflow,
            activities,
        }
    }

    fn fixture(policy: WorkflowPolicy) -> Fixture {
        fixture_on(Arc::new(MemoryKvStore::new()), policy)
    }

    fn new_checklist(items: Option<Vec<ChecklistItem>>) -> NewChecklist {
        NewChecklist {
            project_id: "proj1".into(),
            format_id: "fmt1".into(),
            location: "Building A".into(),
            maker_id: "maker1".into(),
            items,
        }
    }

    fn rebar() -> Vec<ChecklistItem> {
        vec![ChecklistItem::unchecked("Check rebar")]
    }

    fn checked(items: &[ChecklistItem]) -> Vec<ChecklistItem> {
        items
            .iter()
            .map(|i| ChecklistItem {
                checked: true,
                ..i.clone()
            })
            .collect()
    }

    fn check_request(decision: Decision, comments: &str) -> CheckRequest {
        CheckRequest {
            checker_id: "checker1".into(),
            items: checked(&rebar()),
            decision,
            comments: Some(comments.into()),
        }
    }

    fn approve_request(decision: Decision, comments: &str) -> ApproveRequest {
        ApproveRequest {
            approver_id: "approver1".into(),
            decision,
            comments: Some(comments.into()),
        }
    }

    fn activity_count(f: &Fixture) -> usize {
        f.activities.list(usize::MAX).unwrap().len()
    }

    /// Fields other than the ones a step is documented to touch.
    fn without(checklist: &Checklist, fields: &[&str]) -> Value {
        let mut value = serde_json::to_value(checklist).unwrap();
        let object = value.as_object_mut().unwrap();
        for field in fields {
            object.remove(*field);
        }
        value
    }

    #[test]
    fn create_starts_in_draft_with_items_in_order() {
        let f = fixture(WorkflowPolicy::default());
        let items = vec![
            ChecklistItem::unchecked("first"),
            ChecklistItem::unchecked("second"),
            ChecklistItem::unchecked("third"),
        ];
        let cl = f.workflow.create(None, new_checklist(Some(items.clone()))).unwrap();

        assert_eq!(cl.status, ChecklistStatus::Draft);
        assert_eq!(cl.items, items);
        assert!(cl.id.starts_with("cl_"));
        assert!(cl.checker_id.is_none() && cl.approver_id.is_none());
        assert!(cl.submitted_at.is_none() && cl.checked_at.is_none() && cl.approved_at.is_none());
        assert_eq!(f.workflow.get(&cl.id).unwrap(), cl);

        let log = f.activities.list(1).unwrap();
        assert_eq!(log[0].action, ActivityAction::Create);
        assert_eq!(log[0].user_id, "maker1");
        assert_eq!(log[0].details, "Created checklist for project proj1");
    }

    #[test]
    fn create_copies_items_from_format() {
        let f = fixture(WorkflowPolicy::default());
        let format = Format {
            id: "fmt1".into(),
            name: "Electrical Rough-in".into(),
            category: "MEP".into(),
            items: vec!["Conduit installation".into(), "Box placement".into()],
            created_at: Utc::now(),
            updated_at: None,
        };
        f.workflow.store.set_list(Format::LIST_KEY, &[format]).unwrap();

        let cl = f.workflow.create(None, new_checklist(None)).unwrap();
        let texts: Vec<_> = cl.items.iter().map(|i| i.text.as_str()).collect();
        assert_eq!(texts, vec!["Conduit installation", "Box placement"]);
        assert!(cl.items.iter().all(|i| !i.checked));
    }

    #[test]
    fn create_with_unknown_format_has_no_items() {
        let f = fixture(WorkflowPolicy::default());
        let cl = f.workflow.create(None, new_checklist(None)).unwrap();
        assert!(cl.items.is_empty());
    }

    #[test]
    fn full_lifecycle_ends_rejected_by_approver() {
        let f = fixture(WorkflowPolicy::default());
        let cl = f.workflow.create(None, new_checklist(Some(rebar()))).unwrap();
        assert_eq!(cl.status, ChecklistStatus::Draft);

        let cl = f.workflow.submit(None, &cl.id, "checker1").unwrap();
        assert_eq!(cl.status, ChecklistStatus::Submitted);
        assert!(cl.submitted_at.is_some());

        let cl = f
            .workflow
            .check(None, &cl.id, check_request(Decision::Approved, "looks fine"))
            .unwrap();
        assert_eq!(cl.status, ChecklistStatus::Checked);
        assert_eq!(cl.checker_comments.as_deref(), Some("looks fine"));
        assert!(cl.items[0].checked);

        let cl = f.workflow.submit_for_approval(None, &cl.id, "approver1").unwrap();
        assert_eq!(cl.status, ChecklistStatus::Approving);

        let cl = f
            .workflow
            .approve(None, &cl.id, approve_request(Decision::Rejected, "missing photo"))
            .unwrap();
        assert_eq!(cl.status, ChecklistStatus::Rejected);
        assert_eq!(cl.approver_comments.as_deref(), Some("missing photo"));
        assert!(cl.approved_at.is_some());

        let actions: Vec<_> = f
            .activities
            .list(10)
            .unwrap()
            .into_iter()
            .map(|e| (e.action, e.user_id))
            .collect();
        assert_eq!(
            actions,
            vec![
                (ActivityAction::Approve, "approver1".to_string()),
                (ActivityAction::SubmitApproval, "checker1".to_string()),
                (ActivityAction::Check, "checker1".to_string()),
                (ActivityAction::Submit, "maker1".to_string()),
                (ActivityAction::Create, "maker1".to_string()),
            ]
        );
    }

    #[test]
    fn each_step_touches_only_its_documented_fields() {
        let f = fixture(WorkflowPolicy::default());
        let draft = f.workflow.create(None, new_checklist(Some(rebar()))).unwrap();

        let submitted = f.workflow.submit(None, &draft.id, "checker1").unwrap();
        let touched = ["checkerId", "status", "submittedAt"];
        assert_eq!(without(&draft, &touched), without(&submitted, &touched));

        let checked_cl = f
            .workflow
            .check(None, &draft.id, check_request(Decision::Approved, "ok"))
            .unwrap();
        let touched = ["items", "status", "checkedAt", "checkerComments"];
        assert_eq!(without(&submitted, &touched), without(&checked_cl, &touched));

        let approving = f.workflow.submit_for_approval(None, &draft.id, "approver1").unwrap();
        let touched = ["approverId", "status"];
        assert_eq!(without(&checked_cl, &touched), without(&approving, &touched));

        let approved = f
            .workflow
            .approve(None, &draft.id, approve_request(Decision::Approved, "signed off"))
            .unwrap();
        let touched = ["status", "approvedAt", "approverComments"];
        assert_eq!(without(&approving, &touched), without(&approved, &touched));
        assert_eq!(approved.status, ChecklistStatus::Approved);
    }

    #[test]
    fn every_operation_logs_exactly_one_checklist_entry() {
        let f = fixture(WorkflowPolicy::default());
        let cl = f.workflow.create(None, new_checklist(Some(rebar()))).unwrap();
        let id = cl.id.clone();

        let steps: Vec<Box<dyn Fn() -> Result<Checklist>>> = vec![
            Box::new(|| f.workflow.submit(None, &id, "checker1")),
            Box::new(|| f.workflow.check(None, &id, check_request(Decision::Approved, ""))),
            Box::new(|| f.workflow.submit_for_approval(None, &id, "approver1")),
            Box::new(|| f.workflow.approve(None, &id, approve_request(Decision::Approved, ""))),
            Box::new(|| f.workflow.update(&id, ChecklistPatch::default())),
        ];

        for step in steps {
            let before = activity_count(&f);
            step().unwrap();
            assert_eq!(activity_count(&f), before + 1);

            let newest = &f.activities.list(1).unwrap()[0];
            assert_eq!(newest.entity_type, EntityType::Checklist);
            assert_eq!(newest.entity_id, id);
        }
    }

    #[test]
    fn check_twice_is_accepted_without_strict_transitions() {
        let f = fixture(WorkflowPolicy::default());
        let cl = f.workflow.create(None, new_checklist(Some(rebar()))).unwrap();
        f.workflow.submit(None, &cl.id, "checker1").unwrap();

        let first = f
            .workflow
            .check(None, &cl.id, check_request(Decision::Approved, "first pass"))
            .unwrap();
        let second = f
            .workflow
            .check(None, &cl.id, check_request(Decision::Approved, "second pass"))
            .unwrap();

        assert_eq!(second.status, ChecklistStatus::Checked);
        assert_eq!(second.checker_comments.as_deref(), Some("second pass"));
        assert!(second.checked_at >= first.checked_at);
    }

    #[test]
    fn rejection_with_empty_comments_is_allowed() {
        let f = fixture(WorkflowPolicy::default());
        let cl = f.workflow.create(None, new_checklist(Some(rebar()))).unwrap();
        f.workflow.submit(None, &cl.id, "checker1").unwrap();

        let request = CheckRequest {
            comments: Some(String::new()),
            ..check_request(Decision::Rejected, "")
        };
        let cl = f.workflow.check(None, &cl.id, request).unwrap();
        assert_eq!(cl.status, ChecklistStatus::Rejected);
        assert_eq!(cl.checker_comments.as_deref(), Some(""));
    }

    #[test]
    fn check_attributes_to_supplied_checker() {
        let f = fixture(WorkflowPolicy::default());
        let cl = f.workflow.create(None, new_checklist(Some(rebar()))).unwrap();
        f.workflow.submit(None, &cl.id, "checker1").unwrap();

        let request = CheckRequest {
            checker_id: "someone_else".into(),
            ..check_request(Decision::Approved, "")
        };
        f.workflow.check(None, &cl.id, request).unwrap();
        assert_eq!(f.activities.list(1).unwrap()[0].user_id, "someone_else");
    }

    #[test]
    fn submit_for_approval_attributes_to_checker() {
        let f = fixture(WorkflowPolicy::default());
        let cl = f.workflow.create(None, new_checklist(Some(rebar()))).unwrap();
        f.workflow.submit(None, &cl.id, "checker1").unwrap();
        f.workflow
            .check(None, &cl.id, check_request(Decision::Approved, "ok"))
            .unwrap();

        f.workflow
            .submit_for_approval(None, &cl.id, "approver1")
            .unwrap();
        let entry = &f.activities.list(1).unwrap()[0];
        assert_eq!(entry.action, ActivityAction::SubmitApproval);
        assert_eq!(entry.user_id, "checker1");
    }

    #[test]
    fn submit_for_approval_without_checker_attributes_to_system() {
        let f = fixture(WorkflowPolicy::default());
        let cl = f.workflow.create(None, new_checklist(Some(rebar()))).unwrap();
        assert!(cl.checker_id.is_none());

        let approving = f
            .workflow
            .submit_for_approval(None, &cl.id, "approver1")
            .unwrap();
        assert_eq!(approving.status, ChecklistStatus::Approving);
        assert_eq!(approving.approver_id.as_deref(), Some("approver1"));

        let entry = &f.activities.list(1).unwrap()[0];
        assert_eq!(entry.action, ActivityAction::SubmitApproval);
        assert_eq!(entry.user_id, SYSTEM_ACTOR);
        assert_eq!(entry.entity_id, cl.id);
        assert_eq!(entry.details, "Submitted checklist to approver approver1");
    }

    #[test]
    fn terminal_states_are_overwritable_without_strict_transitions() {
        let f = fixture(WorkflowPolicy::default());
        let cl = f.workflow.create(None, new_checklist(Some(rebar()))).unwrap();
        f.workflow.submit(None, &cl.id, "checker1").unwrap();
        f.workflow
            .check(None, &cl.id, check_request(Decision::Rejected, "redo"))
            .unwrap();

        let resubmitted = f.workflow.submit(None, &cl.id, "checker2").unwrap();
        assert_eq!(resubmitted.status, ChecklistStatus::Submitted);
        assert_eq!(resubmitted.checker_id.as_deref(), Some("checker2"));
    }

    #[test]
    fn strict_transitions_reject_out_of_order_steps() {
        let f = fixture(WorkflowPolicy {
            strict_transitions: true,
            ..WorkflowPolicy::default()
        });
        let cl = f.workflow.create(None, new_checklist(Some(rebar()))).unwrap();
        let before = activity_count(&f);

        let err = f
            .workflow
            .submit_for_approval(None, &cl.id, "approver1")
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Conflict);
        assert_eq!(f.workflow.get(&cl.id).unwrap().status, ChecklistStatus::Draft);
        assert_eq!(activity_count(&f), before);

        f.workflow.submit(None, &cl.id, "checker1").unwrap();
        f.workflow
            .check(None, &cl.id, check_request(Decision::Approved, ""))
            .unwrap();
        let err = f
            .workflow
            .check(None, &cl.id, check_request(Decision::Approved, ""))
            .unwrap_err();
        assert!(matches!(err, SitecheckError::InvalidTransition { .. }));
    }

    #[test]
    fn check_requires_assigned_checker() {
        let f = fixture(WorkflowPolicy::default());
        let cl = f.workflow.create(None, new_checklist(Some(rebar()))).unwrap();

        let err = f
            .workflow
            .check(None, &cl.id, check_request(Decision::Approved, ""))
            .unwrap_err();
        assert!(matches!(err, SitecheckError::RoleNotAssigned { .. }));
        assert_eq!(f.workflow.get(&cl.id).unwrap().status, ChecklistStatus::Draft);
    }

    #[test]
    fn approve_requires_assigned_approver() {
        let f = fixture(WorkflowPolicy::default());
        let cl = f.workflow.create(None, new_checklist(Some(rebar()))).unwrap();
        f.workflow.submit(None, &cl.id, "checker1").unwrap();

        let err = f
            .workflow
            .approve(None, &cl.id, approve_request(Decision::Approved, ""))
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Conflict);
    }

    #[test]
    fn unknown_checklist_is_not_found() {
        let f = fixture(WorkflowPolicy::default());
        let err = f.workflow.submit(None, "cl_missing", "checker1").unwrap_err();
        assert_eq!(err.kind(), ErrorKind::NotFound);
        assert_eq!(activity_count(&f), 0);
    }

    #[test]
    fn enforced_roles_require_matching_caller() {
        let f = fixture(WorkflowPolicy {
            enforce_roles: true,
            ..WorkflowPolicy::default()
        });

        let err = f
            .workflow
            .create(Some("intruder"), new_checklist(Some(rebar())))
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Forbidden);

        let cl = f
            .workflow
            .create(Some("maker1"), new_checklist(Some(rebar())))
            .unwrap();

        let err = f.workflow.submit(None, &cl.id, "checker1").unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Forbidden);
        f.workflow.submit(Some("maker1"), &cl.id, "checker1").unwrap();

        let err = f
            .workflow
            .check(Some("maker1"), &cl.id, check_request(Decision::Approved, ""))
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Forbidden);
        f.workflow
            .check(Some("checker1"), &cl.id, check_request(Decision::Approved, ""))
            .unwrap();

        f.workflow
            .submit_for_approval(Some("checker1"), &cl.id, "approver1")
            .unwrap();

        let err = f
            .workflow
            .approve(Some("checker1"), &cl.id, approve_request(Decision::Approved, ""))
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Forbidden);
        let cl = f
            .workflow
            .approve(Some("approver1"), &cl.id, approve_request(Decision::Approved, ""))
            .unwrap();
        assert_eq!(cl.status, ChecklistStatus::Approved);
    }

    #[test]
    fn update_bypasses_state_machine_and_logs_system() {
        let f = fixture(WorkflowPolicy {
            strict_transitions: true,
            enforce_roles: true,
        });
        let cl = f
            .workflow
            .create(Some("maker1"), new_checklist(Some(rebar())))
            .unwrap();

        let patch = ChecklistPatch {
            status: Some(ChecklistStatus::Approved),
            location: Some("Building B".into()),
            ..ChecklistPatch::default()
        };
        let updated = f.workflow.update(&cl.id, patch).unwrap();
        assert_eq!(updated.status, ChecklistStatus::Approved);
        assert_eq!(updated.location, "Building B");
        assert_eq!(updated.created_at, cl.created_at);
        assert!(updated.updated_at.is_some());

        let entry = &f.activities.list(1).unwrap()[0];
        assert_eq!(entry.action, ActivityAction::Update);
        assert_eq!(entry.user_id, SYSTEM_ACTOR);
    }

    #[test]
    fn worklist_groups_by_owed_step() {
        let f = fixture(WorkflowPolicy::default());
        let draft = f.workflow.create(None, new_checklist(Some(rebar()))).unwrap();
        let to_check = f.workflow.create(None, new_checklist(Some(rebar()))).unwrap();
        f.workflow.submit(None, &to_check.id, "checker1").unwrap();
        let to_approve = f.workflow.create(None, new_checklist(Some(rebar()))).unwrap();
        f.workflow.submit(None, &to_approve.id, "checker1").unwrap();
        f.workflow
            .check(None, &to_approve.id, check_request(Decision::Approved, ""))
            .unwrap();
        f.workflow
            .submit_for_approval(None, &to_approve.id, "approver1")
            .unwrap();

        let maker = f.workflow.worklist("maker1").unwrap();
        assert_eq!(maker.drafts.len(), 1);
        assert_eq!(maker.drafts[0].id, draft.id);

        let checker = f.workflow.worklist("checker1").unwrap();
        assert_eq!(checker.to_check.len(), 1);
        assert_eq!(checker.to_check[0].id, to_check.id);
        assert!(checker.to_submit_for_approval.is_empty());

        let approver = f.workflow.worklist("approver1").unwrap();
        assert_eq!(approver.to_approve.len(), 1);
        assert_eq!(approver.to_approve[0].id, to_approve.id);
    }

    #[test]
    fn list_filters_by_status_and_project() {
        let f = fixture(WorkflowPolicy::default());
        let a = f.workflow.create(None, new_checklist(Some(rebar()))).unwrap();
        f.workflow
            .create(
                None,
                NewChecklist {
                    project_id: "proj2".into(),
                    ..new_checklist(Some(rebar()))
                },
            )
            .unwrap();
        f.workflow.submit(None, &a.id, "checker1").unwrap();

        let all = f.workflow.list(&ChecklistFilter::default()).unwrap();
        assert_eq!(all.len(), 2);

        let submitted = f
            .workflow
            .list(&ChecklistFilter {
                status: Some(ChecklistStatus::Submitted),
                ..ChecklistFilter::default()
            })
            .unwrap();
        assert_eq!(submitted.len(), 1);
        assert_eq!(submitted[0].id, a.id);

        let proj2 = f
            .workflow
            .list(&ChecklistFilter {
                project_id: Some("proj2".into()),
                ..ChecklistFilter::default()
            })
            .unwrap();
        assert_eq!(proj2.len(), 1);
    }

    /// Store whose commits can be made to fail on demand.
    struct FlakyStore {
        inner: MemoryKvStore,
        fail: AtomicBool,
    }

    impl KvStore for FlakyStore {
        fn get(&self, key: &str) -> Result<Option<Value>> {
            self.inner.get(key)
        }

        fn commit(&self, batch: WriteBatch) -> Result<()> {
            if self.fail.load(Ordering::SeqCst) {
                return Err(SitecheckError::storage("simulated write failure"));
            }
            self.inner.commit(batch)
        }
    }

    #[test]
    fn failed_commit_leaves_state_and_log_unchanged() {
        let kv = Arc::new(FlakyStore {
            inner: MemoryKvStore::new(),
            fail: AtomicBool::new(false),
        });
        let f = fixture_on(kv.clone(), WorkflowPolicy::default());
        let cl = f.workflow.create(None, new_checklist(Some(rebar()))).unwrap();
        let before = activity_count(&f);

        kv.fail.store(true, Ordering::SeqCst);
        let err = f.workflow.submit(None, &cl.id, "checker1").unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Storage);

        kv.fail.store(false, Ordering::SeqCst);
        assert_eq!(f.workflow.get(&cl.id).unwrap().status, ChecklistStatus::Draft);
        assert_eq!(activity_count(&f), before);
    }
}
