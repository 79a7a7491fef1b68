//! The audit flow for one checklist.
//!
//! `AuditFlow` owns the checklist while it is being answered. Every mutation
//! re-runs the finding rule where relevant and writes a session snapshot, so
//! reopening the same checklist resumes at the same item and phase.

use crate::finding::{apply_finding_rule, FindingContext};
use crate::submission::{SubmissionFailure, SubmitRequest};
use crate::validation::{first_incomplete, validate_item};
use crate::{AuditError, Clock, Result};
use fieldops_protocol::{
    Answer, Checklist, ChecklistItem, ChecklistStatus, FindingPolicy, MediaRef, QuestionType,
};
use fieldops_session::{AuditPhase, AuditSnapshot, PersistOutcome, SessionStore};
use std::sync::Arc;

/// One edit to an item.
#[derive(Debug, Clone, PartialEq)]
pub enum ItemUpdate {
    SetValue(Option<Answer>),
    SetNote(Option<String>),
    AddEvidence(MediaRef),
    RemoveEvidence(usize),
}

pub struct AuditFlow {
    checklist: Checklist,
    current_index: usize,
    phase: AuditPhase,
    signature: Option<MediaRef>,
    selfie: Option<MediaRef>,
    restored: bool,
    session: SessionStore,
    policy: FindingPolicy,
    clock: Arc<dyn Clock>,
}

impl AuditFlow {
    /// Open a checklist, resuming from its snapshot when one exists.
    pub fn open(
        checklist: Checklist,
        session: SessionStore,
        policy: FindingPolicy,
        clock: Arc<dyn Clock>,
    ) -> Result<Self> {
        // A completed row without a report is a submission that stopped
        // after saving the checklist; it stays open so the report can be retried.
        let report_pending = checklist.is_completed() && checklist.report_url.is_none();
        if checklist.is_completed() && !report_pending {
            session.clear(&checklist.id)?;
            return Err(AuditError::invalid_state(format!(
                "checklist {} is already completed",
                checklist.id
            )));
        }

        let flow = match session.restore(&checklist.id)? {
            Some(snapshot) => {
                let current_index = snapshot
                    .current_index
                    .min(snapshot.checklist.items.len().saturating_sub(1));
                tracing::info!(
                    checklist_id = %checklist.id,
                    index = current_index,
                    phase = snapshot.phase.as_str(),
                    "Resuming audit from snapshot"
                );
                Self {
                    checklist: snapshot.checklist,
                    current_index,
                    phase: snapshot.phase,
                    signature: snapshot.signature,
                    selfie: snapshot.selfie,
                    restored: true,
                    session,
                    policy,
                    clock,
                }
            }
            None if report_pending => {
                tracing::info!(
                    checklist_id = %checklist.id,
                    "Checklist saved without a report; reopening at checkout"
                );
                Self {
                    current_index: checklist.items.len().saturating_sub(1),
                    phase: AuditPhase::Checkout,
                    signature: checklist.auditor_signature.clone(),
                    selfie: checklist.selfie.clone(),
                    checklist,
                    restored: false,
                    session,
                    policy,
                    clock,
                }
            }
            None => {
                let phase = if checklist.check_in_time.is_some() {
                    AuditPhase::InProgress
                } else {
                    AuditPhase::PreCheckIn
                };
                Self {
                    checklist,
                    current_index: 0,
                    phase,
                    signature: None,
                    selfie: None,
                    restored: false,
                    session,
                    policy,
                    clock,
                }
            }
        };
        Ok(flow)
    }

    pub fn checklist(&self) -> &Checklist {
        &self.checklist
    }

    pub fn current_index(&self) -> usize {
        self.current_index
    }

    pub fn current_item(&self) -> Option<&ChecklistItem> {
        self.checklist.items.get(self.current_index)
    }

    pub fn phase(&self) -> AuditPhase {
        self.phase
    }

    pub fn signature(&self) -> Option<&MediaRef> {
        self.signature.as_ref()
    }

    pub fn selfie(&self) -> Option<&MediaRef> {
        self.selfie.as_ref()
    }

    /// Whether this flow was resumed from a snapshot.
    pub fn is_restored(&self) -> bool {
        self.restored
    }

    /// Items currently carrying a finding.
    pub fn open_findings(&self) -> usize {
        self.checklist
            .items
            .iter()
            .filter(|item| item.finding.is_some())
            .count()
    }

    /// Write the current state to the session store.
    pub fn persist(&self) -> Result<PersistOutcome> {
        let snapshot = AuditSnapshot {
            checklist: self.checklist.clone(),
            current_index: self.current_index,
            phase: self.phase,
            signature: self.signature.clone(),
            selfie: self.selfie.clone(),
            saved_at: self.clock.now(),
        };
        let outcome = self.session.persist(&snapshot)?;
        if let PersistOutcome::Degraded { elided } = outcome {
            tracing::warn!(
                checklist_id = %self.checklist.id,
                elided,
                "Snapshot saved without local media; those captures must be retaken after a restart"
            );
        }
        Ok(outcome)
    }

    pub fn check_in(&mut self) -> Result<()> {
        if self.phase != AuditPhase::PreCheckIn {
            return Err(AuditError::invalid_state("already checked in"));
        }
        self.checklist.check_in_time = Some(self.clock.now());
        self.checklist.status = ChecklistStatus::InProgress;
        self.phase = AuditPhase::InProgress;
        tracing::info!(checklist_id = %self.checklist.id, "Checked in");
        self.persist()?;
        Ok(())
    }

    fn require_started(&self) -> Result<()> {
        if self.phase == AuditPhase::PreCheckIn {
            return Err(AuditError::invalid_state("check in before answering"));
        }
        Ok(())
    }

    /// Apply an edit to item `index`. Returns true when its finding changed.
    pub fn update_item(&mut self, index: usize, update: ItemUpdate) -> Result<bool> {
        self.require_started()?;
        let checklist_id = self.checklist.id.clone();
        let assignee = self.checklist.assigned_to.clone();
        let item = self
            .checklist
            .items
            .get_mut(index)
            .ok_or_else(|| AuditError::invalid(format!("no item at position {}", index + 1)))?;
        let before = item.clone();

        match update {
            ItemUpdate::SetValue(value) => {
                if let Some(answer) = &value {
                    let expected = item.question_type();
                    if expected == QuestionType::Photo || answer.question_type() != expected {
                        return Err(AuditError::invalid(format!(
                            "'{}' expects a {} answer",
                            item.definition.question,
                            expected.as_str()
                        )));
                    }
                    if let Answer::Signature(name) = answer {
                        if name.trim_start().starts_with("data:") {
                            return Err(AuditError::invalid(format!(
                                "'{}' takes the signer's typed name, not an image",
                                item.definition.question
                            )));
                        }
                    }
                    if let Answer::Choice(choice) = answer {
                        let options = &item.definition.options;
                        if !options.is_empty() && !options.contains(choice) {
                            return Err(AuditError::invalid(format!(
                                "'{}' is not an option for '{}'",
                                choice, item.definition.question
                            )));
                        }
                    }
                }
                item.value = value;
            }
            ItemUpdate::SetNote(note) => {
                item.note = note.filter(|n| !n.is_empty());
            }
            ItemUpdate::AddEvidence(media) => {
                if !item.definition.collects_evidence() {
                    return Err(AuditError::invalid(format!(
                        "'{}' does not take evidence",
                        item.definition.question
                    )));
                }
                item.evidence.push(media);
            }
            ItemUpdate::RemoveEvidence(position) => {
                if position >= item.evidence.len() {
                    return Err(AuditError::invalid(format!(
                        "no evidence at position {}",
                        position + 1
                    )));
                }
                item.evidence.remove(position);
            }
        }

        let ctx = FindingContext {
            checklist_id: &checklist_id,
            assignee: assignee.as_ref(),
            policy: &self.policy,
            now: self.clock.now(),
        };
        let changed = apply_finding_rule(item, &ctx);
        if changed {
            tracing::debug!(
                checklist_id = %checklist_id,
                item = %item.definition.id,
                finding = item.finding.is_some(),
                "Finding updated"
            );
        }
        if let Err(e) = self.persist() {
            self.checklist.items[index] = before;
            return Err(e);
        }
        Ok(changed)
    }

    /// Jump to an item.
    pub fn go_to(&mut self, index: usize) -> Result<()> {
        self.require_started()?;
        if index >= self.checklist.items.len() {
            return Err(AuditError::invalid(format!("no item at position {}", index + 1)));
        }
        self.current_index = index;
        self.phase = AuditPhase::InProgress;
        self.persist()?;
        Ok(())
    }

    /// Advance past a complete item. From the last item this moves to checkout.
    pub fn next(&mut self) -> Result<()> {
        self.require_started()?;
        if self.phase == AuditPhase::Checkout {
            return Ok(());
        }
        if let Some(item) = self.current_item() {
            let issues = validate_item(item);
            if !issues.is_empty() {
                return Err(AuditError::Incomplete {
                    index: self.current_index,
                    issues,
                });
            }
        }
        if self.current_index + 1 >= self.checklist.items.len() {
            self.phase = AuditPhase::Checkout;
        } else {
            self.current_index += 1;
        }
        self.persist()?;
        Ok(())
    }

    /// Step back one item, or from checkout to the last item.
    pub fn previous(&mut self) -> Result<()> {
        self.require_started()?;
        if self.phase == AuditPhase::Checkout {
            self.phase = AuditPhase::InProgress;
        } else {
            self.current_index = self.current_index.saturating_sub(1);
        }
        self.persist()?;
        Ok(())
    }

    pub fn set_signature(&mut self, signature: Option<MediaRef>) -> Result<()> {
        self.signature = signature;
        self.persist()?;
        Ok(())
    }

    pub fn set_selfie(&mut self, selfie: Option<MediaRef>) -> Result<()> {
        self.selfie = selfie;
        self.persist()?;
        Ok(())
    }

    /// Validate everything and hand back what the submission needs.
    ///
    /// On an incomplete item the flow jumps there and returns the issues.
    pub fn checkout(&mut self) -> Result<SubmitRequest> {
        self.require_started()?;
        if let Some((index, issues)) = first_incomplete(&self.checklist.items) {
            self.current_index = index;
            self.phase = AuditPhase::InProgress;
            self.persist()?;
            return Err(AuditError::Incomplete { index, issues });
        }
        if self.signature.is_none() {
            self.phase = AuditPhase::Checkout;
            self.persist()?;
            return Err(AuditError::MissingSignature);
        }
        self.phase = AuditPhase::Checkout;
        self.persist()?;
        Ok(SubmitRequest {
            checklist: self.checklist.clone(),
            signature: self.signature.clone(),
            selfie: self.selfie.clone(),
        })
    }

    /// Keep the progress of a failed submission so a retry skips finished work.
    pub fn adopt_checkpoint(&mut self, failure: &SubmissionFailure) -> Result<()> {
        let checkpoint = failure.checkpoint.as_ref().clone();
        if checkpoint.id != self.checklist.id {
            return Err(AuditError::invalid_state("checkpoint belongs to another checklist"));
        }
        if checkpoint.auditor_signature.is_some() {
            self.signature = checkpoint.auditor_signature.clone();
        }
        if checkpoint.selfie.is_some() {
            self.selfie = checkpoint.selfie.clone();
        }
        self.checklist = checkpoint;
        self.persist()?;
        Ok(())
    }

    /// The submission went through; drop the snapshot.
    pub fn finish(self) -> Result<()> {
        self.session.clear(&self.checklist.id)?;
        tracing::info!(checklist_id = %self.checklist.id, "Audit finished, snapshot cleared");
        Ok(())
    }

    /// Leave the audit and return to the list, discarding the snapshot.
    pub fn back(self) -> Result<Checklist> {
        self.session.clear(&self.checklist.id)?;
        Ok(self.checklist)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::FixedClock;
    use chrono::{TimeZone, Utc};
    use fieldops_ids::{ChecklistId, ItemId};
    use fieldops_protocol::{ItemDefinition, TaskPriority, YesNo};
    use fieldops_session::{audit_key, KeyValueStore, MemoryKeyStore};

    fn clock() -> Arc<dyn Clock> {
        Arc::new(FixedClock(Utc.with_ymd_and_hms(2024, 3, 1, 8, 0, 0).unwrap()))
    }

    fn checklist() -> Checklist {
        let mut floor = ItemDefinition::new(
            ItemId::parse("q1").unwrap(),
            "Is the floor clean?",
            QuestionType::YesNo,
        );
        floor.required = true;
        floor.min_photos = Some(1);
        let mut remarks =
            ItemDefinition::new(ItemId::parse("q2").unwrap(), "Remarks", QuestionType::Text);
        remarks.required = true;

        Checklist {
            id: ChecklistId::new(),
            title: "Opening".into(),
            location: Some("Jakarta-1".into()),
            assigned_to: None,
            due_date: None,
            status: ChecklistStatus::Pending,
            items: vec![
                ChecklistItem::from_definition(floor),
                ChecklistItem::from_definition(remarks),
            ],
            check_in_time: None,
            check_out_time: None,
            auditor_signature: None,
            selfie: None,
            report_url: None,
            created_at: None,
        }
    }

    fn session(kv: &Arc<MemoryKeyStore>) -> SessionStore {
        SessionStore::new(kv.clone())
    }

    fn open(list: Checklist, kv: &Arc<MemoryKeyStore>) -> AuditFlow {
        AuditFlow::open(list, session(kv), FindingPolicy::default(), clock()).unwrap()
    }

    #[test]
    fn test_answering_requires_check_in() {
        let kv = Arc::new(MemoryKeyStore::unbounded());
        let mut flow = open(checklist(), &kv);
        let err = flow
            .update_item(0, ItemUpdate::SetValue(Some(Answer::YesNo(YesNo::No))))
            .unwrap_err();
        assert!(matches!(err, AuditError::InvalidState(_)));

        flow.check_in().unwrap();
        assert_eq!(flow.checklist().status, ChecklistStatus::InProgress);
        assert!(flow.checklist().check_in_time.is_some());
    }

    #[test]
    fn test_every_edit_runs_finding_rule_and_persists() {
        let kv = Arc::new(MemoryKeyStore::unbounded());
        let list = checklist();
        let id = list.id.clone();
        let mut flow = open(list, &kv);
        flow.check_in().unwrap();

        assert!(flow
            .update_item(0, ItemUpdate::SetValue(Some(Answer::YesNo(YesNo::RedFlag))))
            .unwrap());
        assert_eq!(flow.open_findings(), 1);
        assert_eq!(
            flow.checklist().items[0].finding.as_ref().unwrap().priority,
            TaskPriority::High
        );

        flow.update_item(0, ItemUpdate::SetNote(Some("wet".into())))
            .unwrap();
        let stored = kv.get(&audit_key(&id)).unwrap().unwrap();
        assert!(stored.contains("wet"));

        flow.update_item(0, ItemUpdate::SetValue(Some(Answer::YesNo(YesNo::Yes))))
            .unwrap();
        assert_eq!(flow.open_findings(), 0);
    }

    #[test]
    fn test_mismatched_answer_type_is_rejected() {
        let kv = Arc::new(MemoryKeyStore::unbounded());
        let mut flow = open(checklist(), &kv);
        flow.check_in().unwrap();
        let err = flow
            .update_item(0, ItemUpdate::SetValue(Some(Answer::Text("no".into()))))
            .unwrap_err();
        assert!(matches!(err, AuditError::Invalid(_)));
        assert!(flow.checklist().items[0].value.is_none());
    }

    #[test]
    fn test_next_refuses_incomplete_item() {
        let kv = Arc::new(MemoryKeyStore::unbounded());
        let mut flow = open(checklist(), &kv);
        flow.check_in().unwrap();

        let err = flow.next().unwrap_err();
        assert!(matches!(err, AuditError::Incomplete { index: 0, .. }));

        flow.update_item(0, ItemUpdate::SetValue(Some(Answer::YesNo(YesNo::Yes))))
            .unwrap();
        flow.update_item(0, ItemUpdate::AddEvidence(MediaRef::Local("cGhvdG8=".into())))
            .unwrap();
        flow.next().unwrap();
        assert_eq!(flow.current_index(), 1);
    }

    #[test]
    fn test_checkout_jumps_to_first_incomplete_item() {
        let kv = Arc::new(MemoryKeyStore::unbounded());
        let mut flow = open(checklist(), &kv);
        flow.check_in().unwrap();
        flow.update_item(1, ItemUpdate::SetValue(Some(Answer::Text("ok".into()))))
            .unwrap();
        flow.go_to(1).unwrap();

        let err = flow.checkout().unwrap_err();
        assert!(matches!(err, AuditError::Incomplete { index: 0, .. }));
        assert_eq!(flow.current_index(), 0);

        flow.update_item(0, ItemUpdate::SetValue(Some(Answer::YesNo(YesNo::No))))
            .unwrap();
        flow.update_item(0, ItemUpdate::AddEvidence(MediaRef::Local("cGhvdG8=".into())))
            .unwrap();
        assert!(matches!(flow.checkout(), Err(AuditError::MissingSignature)));

        flow.set_signature(Some(MediaRef::Local("c2ln".into())))
            .unwrap();
        let request = flow.checkout().unwrap();
        assert_eq!(request.checklist.items[1].value, Some(Answer::Text("ok".into())));
        assert_eq!(flow.phase(), AuditPhase::Checkout);
    }

    #[test]
    fn test_reopen_resumes_index_and_values() {
        let kv = Arc::new(MemoryKeyStore::unbounded());
        let list = checklist();
        let mut flow = open(list.clone(), &kv);
        flow.check_in().unwrap();
        flow.update_item(0, ItemUpdate::SetValue(Some(Answer::YesNo(YesNo::No))))
            .unwrap();
        flow.update_item(0, ItemUpdate::AddEvidence(MediaRef::Local("cGhvdG8=".into())))
            .unwrap();
        flow.next().unwrap();
        drop(flow);

        let resumed = open(list, &kv);
        assert!(resumed.is_restored());
        assert_eq!(resumed.current_index(), 1);
        assert_eq!(resumed.phase(), AuditPhase::InProgress);
        assert_eq!(
            resumed.checklist().items[0].value,
            Some(Answer::YesNo(YesNo::No))
        );
        assert!(resumed.checklist().items[0].finding.is_some());
    }

    #[test]
    fn test_back_clears_snapshot() {
        let kv = Arc::new(MemoryKeyStore::unbounded());
        let list = checklist();
        let id = list.id.clone();
        let mut flow = open(list.clone(), &kv);
        flow.check_in().unwrap();
        assert!(kv.get(&audit_key(&id)).unwrap().is_some());

        flow.back().unwrap();
        assert!(kv.get(&audit_key(&id)).unwrap().is_none());
        assert!(!open(list, &kv).is_restored());
    }

    #[test]
    fn test_completed_checklist_cannot_be_opened() {
        let kv = Arc::new(MemoryKeyStore::unbounded());
        let mut list = checklist();
        list.status = ChecklistStatus::Completed;
        list.report_url = Some("https://example.test/report.pdf".into());
        let result = AuditFlow::open(list, session(&kv), FindingPolicy::default(), clock());
        assert!(matches!(result, Err(AuditError::InvalidState(_))));
    }

    #[test]
    fn test_completed_checklist_without_report_opens_at_checkout() {
        let kv = Arc::new(MemoryKeyStore::unbounded());
        let mut list = checklist();
        list.status = ChecklistStatus::Completed;
        list.check_in_time = Some(Utc.with_ymd_and_hms(2024, 3, 1, 7, 0, 0).unwrap());
        list.auditor_signature = Some(MediaRef::Url("https://example.test/sig.jpg".into()));
        list.items[0].value = Some(Answer::YesNo(YesNo::Yes));
        list.items[0].evidence = vec![MediaRef::Url("https://example.test/q1.jpg".into())];
        list.items[1].value = Some(Answer::Text("ok".into()));

        let mut flow = open(list, &kv);
        assert_eq!(flow.phase(), AuditPhase::Checkout);
        assert!(flow.signature().unwrap().is_uploaded());
        let request = flow.checkout().unwrap();
        assert_eq!(request.checklist.status, ChecklistStatus::Completed);
    }

    fn signature_checklist() -> Checklist {
        let mut signed = ItemDefinition::new(
            ItemId::parse("sign").unwrap(),
            "Store manager sign-off",
            QuestionType::Signature,
        );
        signed.required = true;
        let mut list = checklist();
        list.items = vec![ChecklistItem::from_definition(signed)];
        list
    }

    #[test]
    fn test_signature_item_takes_typed_name() {
        let kv = Arc::new(MemoryKeyStore::new(6000));
        let mut flow = open(signature_checklist(), &kv);
        flow.check_in().unwrap();

        let image = format!("data:image/png;base64,{}", "A".repeat(8 * 1024));
        let err = flow
            .update_item(0, ItemUpdate::SetValue(Some(Answer::Signature(image))))
            .unwrap_err();
        assert!(matches!(err, AuditError::Invalid(_)));
        assert!(flow.checklist().items[0].value.is_none());

        flow.update_item(
            0,
            ItemUpdate::SetValue(Some(Answer::Signature("Budi Santoso".into()))),
        )
        .unwrap();
        assert!(validate_item(&flow.checklist().items[0]).is_empty());
    }

    #[test]
    fn test_failed_persist_leaves_item_unchanged() {
        let kv = Arc::new(MemoryKeyStore::new(3000));
        let mut flow = open(signature_checklist(), &kv);
        flow.check_in().unwrap();

        let err = flow
            .update_item(0, ItemUpdate::SetNote(Some("x".repeat(4000))))
            .unwrap_err();
        assert!(matches!(err, AuditError::Session(_)));
        assert!(flow.checklist().items[0].note.is_none());
    }
}
