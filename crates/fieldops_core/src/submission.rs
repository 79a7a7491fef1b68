//! Checklist submission.
//!
//! Steps run strictly in order and the first failure stops the rest:
//!
//! 0. pre-flight checks and stamping a working copy as completed
//! 1. upload local media (signature, selfie, item evidence)
//! 2. create finding rows for items that need one
//! 3. save the checklist row
//! 4. render the PDF report
//! 5. upload the report
//! 6. link the report URL on the checklist row
//!
//! Nothing is rolled back. A failure hands back a checkpoint holding every
//! URL and task id obtained so far; submitting the checkpoint again skips
//! the work already done.

use crate::error::SubmissionStage;
use crate::media::prepare_evidence;
use crate::progress::{Monotonic, ProgressSink};
use crate::report::{fetch_report_images, render_report, ReportContext, ReportImages};
use crate::validation::first_incomplete;
use crate::{AuditError, Result, Services};
use fieldops_backend::UploadOptions;
use fieldops_ids::ChecklistId;
use fieldops_protocol::{
    media_object_path, report_file_name, BackendConfig, Checklist, ChecklistStatus, EvidenceType,
    MediaRef, MediaSlot, NewTask, User,
};
use thiserror::Error;

const REPORT_CACHE_SECONDS: u32 = 3600;

/// A checklist ready to submit, with the sign-off captured at checkout.
#[derive(Debug, Clone, PartialEq)]
pub struct SubmitRequest {
    pub checklist: Checklist,
    pub signature: Option<MediaRef>,
    pub selfie: Option<MediaRef>,
}

impl SubmitRequest {
    /// Resubmit a checkpoint left by a failed attempt.
    pub fn from_checkpoint(checkpoint: Checklist) -> Self {
        Self {
            signature: checkpoint.auditor_signature.clone(),
            selfie: checkpoint.selfie.clone(),
            checklist: checkpoint,
        }
    }
}

#[derive(Debug, Clone)]
pub struct SubmissionOutcome {
    /// The checklist as persisted, report URL included.
    pub checklist: Checklist,
    pub report_url: String,
    pub report_path: String,
    pub report: Vec<u8>,
}

#[derive(Error, Debug)]
#[error("Submission failed during {stage}: {error}")]
pub struct SubmissionFailure {
    pub stage: SubmissionStage,
    #[source]
    pub error: AuditError,
    /// Working copy with every URL and task id obtained before the failure.
    pub checkpoint: Box<Checklist>,
}

impl SubmissionFailure {
    pub fn user_message(&self, backend: &BackendConfig) -> String {
        format!(
            "Submission failed during {}: {}",
            self.stage,
            self.error.user_message_for(backend)
        )
    }
}

fn is_blank(media: &MediaRef) -> bool {
    match media {
        MediaRef::Local(payload) => payload.trim().is_empty(),
        MediaRef::Url(url) => url.trim().is_empty(),
        MediaRef::Elided => true,
    }
}

pub struct SubmissionPipeline<'a> {
    services: &'a Services,
}

impl<'a> SubmissionPipeline<'a> {
    pub fn new(services: &'a Services) -> Self {
        Self { services }
    }

    /// Run every step. The caller's checklist is never modified.
    pub async fn submit(
        &self,
        request: SubmitRequest,
        progress: &dyn ProgressSink,
    ) -> std::result::Result<SubmissionOutcome, SubmissionFailure> {
        let progress = Monotonic::new(progress);
        let mut working = request.checklist.clone();
        let mut stage = SubmissionStage::Preflight;

        match self
            .run(&mut working, request, &mut stage, &progress)
            .await
        {
            Ok(outcome) => {
                tracing::info!(
                    checklist_id = %outcome.checklist.id,
                    report = %outcome.report_url,
                    "Checklist submitted"
                );
                Ok(outcome)
            }
            Err(error) => {
                tracing::warn!(
                    checklist_id = %working.id,
                    stage = %stage,
                    error = %error,
                    "Submission failed"
                );
                Err(SubmissionFailure {
                    stage,
                    error,
                    checkpoint: Box::new(working),
                })
            }
        }
    }

    async fn run(
        &self,
        working: &mut Checklist,
        request: SubmitRequest,
        stage: &mut SubmissionStage,
        progress: &Monotonic<'_>,
    ) -> Result<SubmissionOutcome> {
        self.preflight(working, request)?;
        progress.report(0.0, "Preparing submission");

        *stage = SubmissionStage::UploadMedia;
        let mut images = ReportImages::new();
        self.upload_media(working, &mut images, progress).await?;
        resync_finding_photos(working);

        *stage = SubmissionStage::SaveFindings;
        progress.report(55.0, "Saving findings");
        self.save_findings(working).await?;

        *stage = SubmissionStage::SaveChecklist;
        progress.report(65.0, "Saving checklist");
        self.services.db.update_checklist(working).await?;

        *stage = SubmissionStage::RenderReport;
        progress.report(75.0, "Generating report");
        let auditor = self.resolve_auditor(working).await;
        let logo = self.fetch_logo().await;
        let images =
            fetch_report_images(&*working, self.services.objects.as_ref(), images).await;
        let report = render_report(
            &ReportContext {
                checklist: &*working,
                auditor: auditor.as_ref(),
                logo: logo.as_deref(),
                generated_at: self.services.clock.now(),
            },
            &images,
        )?;

        *stage = SubmissionStage::UploadReport;
        progress.report(90.0, "Uploading report");
        let backend = &self.services.config.backend;
        let date = working
            .check_out_time
            .map(|t| t.date_naive())
            .unwrap_or_else(|| self.services.clock.today());
        let report_path = report_file_name(
            auditor.as_ref().map(User::display_name),
            working.location.as_deref(),
            date,
            &working.id,
        );
        let options = UploadOptions::new("application/pdf")
            .with_upsert()
            .with_cache_control(REPORT_CACHE_SECONDS);
        self.services
            .objects
            .upload(&backend.reports_bucket, &report_path, report.clone(), &options)
            .await?;
        let report_url = self
            .services
            .objects
            .public_url(&backend.reports_bucket, &report_path);

        *stage = SubmissionStage::LinkReport;
        progress.report(95.0, "Finishing");
        self.services
            .db
            .set_report_url(&working.id, &report_url)
            .await?;
        working.report_url = Some(report_url.clone());

        progress.report(100.0, "Done");
        Ok(SubmissionOutcome {
            checklist: working.clone(),
            report_url,
            report_path,
            report,
        })
    }

    fn preflight(&self, working: &mut Checklist, request: SubmitRequest) -> Result<()> {
        let signature = match request.signature {
            Some(signature) if !is_blank(&signature) => signature,
            _ => return Err(AuditError::MissingSignature),
        };
        if let Some((index, issues)) = first_incomplete(&working.items) {
            return Err(AuditError::Incomplete { index, issues });
        }

        working.status = ChecklistStatus::Completed;
        if working.check_out_time.is_none() {
            working.check_out_time = Some(self.services.clock.now());
        }
        working.auditor_signature = Some(signature);
        working.selfie = request.selfie.filter(|selfie| !is_blank(selfie));
        Ok(())
    }

    async fn upload_media(
        &self,
        working: &mut Checklist,
        images: &mut ReportImages,
        progress: &Monotonic<'_>,
    ) -> Result<()> {
        let total = count_local(working);
        let mut done = 0usize;
        let step = |done: usize| {
            if total > 0 {
                progress.report(50.0 * done as f32 / total as f32, "Uploading media");
            }
        };

        let checklist_id = working.id.clone();
        for slot in [MediaSlot::Signature, MediaSlot::Selfie] {
            let field = match slot {
                MediaSlot::Signature => &mut working.auditor_signature,
                _ => &mut working.selfie,
            };
            match field.take() {
                Some(MediaRef::Local(payload)) => {
                    let media = MediaRef::Local(payload);
                    let uploaded = self
                        .upload_one(&checklist_id, &slot, 0, &media, EvidenceType::Photo, images)
                        .await;
                    match uploaded {
                        Ok(url) => *field = Some(url),
                        Err(e) => {
                            *field = Some(media);
                            return Err(e);
                        }
                    }
                    done += 1;
                    step(done);
                }
                Some(MediaRef::Elided) => {
                    tracing::warn!(slot = %slot, "Dropping media lost from the session snapshot");
                }
                other => *field = other,
            }
        }

        for item in &mut working.items {
            let slot = MediaSlot::Item(item.id().clone());
            let evidence_type = item.definition.evidence_type;
            let mut index = 0;
            while index < item.evidence.len() {
                match item.evidence[index] {
                    MediaRef::Url(_) => index += 1,
                    MediaRef::Elided => {
                        tracing::warn!(item = %slot, index, "Dropping media lost from the session snapshot");
                        item.evidence.remove(index);
                    }
                    MediaRef::Local(_) => {
                        let media = item.evidence[index].clone();
                        let url = self
                            .upload_one(&checklist_id, &slot, index, &media, evidence_type, images)
                            .await?;
                        item.evidence[index] = url;
                        index += 1;
                        done += 1;
                        step(done);
                    }
                }
            }
        }

        tracing::debug!(checklist_id = %checklist_id, uploaded = done, "Media uploaded");
        Ok(())
    }

    async fn upload_one(
        &self,
        checklist_id: &ChecklistId,
        slot: &MediaSlot,
        index: usize,
        media: &MediaRef,
        evidence_type: EvidenceType,
        images: &mut ReportImages,
    ) -> Result<MediaRef> {
        let payload = media.decode().map_err(|source| AuditError::Media {
            slot: slot.to_string(),
            source,
        })?;
        let prepared = prepare_evidence(
            payload,
            evidence_type,
            &slot.to_string(),
            &self.services.config.media,
        )?;

        let bucket = &self.services.config.backend.photos_bucket;
        let path = media_object_path(
            checklist_id,
            slot,
            self.services.clock.now().timestamp_millis(),
            index,
            prepared.extension,
        );
        let options = UploadOptions::new(prepared.content_type.clone());
        let size = prepared.bytes.len();
        let keep_for_report = evidence_type == EvidenceType::Photo;
        let bytes = if keep_for_report {
            prepared.bytes.clone()
        } else {
            Vec::new()
        };
        self.services
            .objects
            .upload(bucket, &path, prepared.bytes, &options)
            .await?;

        let url = self.services.objects.public_url(bucket, &path);
        tracing::debug!(path = %path, size, "Media uploaded");
        if keep_for_report {
            images.insert(url.clone(), bytes);
        }
        Ok(MediaRef::Url(url))
    }

    async fn save_findings(&self, working: &mut Checklist) -> Result<()> {
        let db = &self.services.db;
        let mut pending = Vec::new();

        for (index, item) in working.items.iter_mut().enumerate() {
            let Some(finding) = item.finding.as_mut() else {
                continue;
            };
            if let Some(id) = finding.id.clone().or_else(|| item.finding_id.clone()) {
                finding.id = Some(id.clone());
                item.finding_id = Some(id);
                continue;
            }
            if let Some(task) = db.find_task_for_item(&working.id, &item.definition.id).await? {
                tracing::debug!(task_id = %task.id, item = %item.definition.id, "Reusing existing task");
                finding.id = Some(task.id.clone());
                item.finding_id = Some(task.id);
                continue;
            }
            pending.push((index, NewTask::from(&*finding)));
        }

        if pending.is_empty() {
            return Ok(());
        }

        let rows: Vec<NewTask> = pending.iter().map(|(_, task)| task.clone()).collect();
        let created = db.insert_tasks(&rows).await?;
        if created.len() != rows.len() {
            return Err(AuditError::invalid_state(format!(
                "expected {} task rows back, got {}",
                rows.len(),
                created.len()
            )));
        }
        for ((index, _), task) in pending.into_iter().zip(created) {
            let item = &mut working.items[index];
            if let Some(finding) = item.finding.as_mut() {
                finding.id = Some(task.id.clone());
            }
            item.finding_id = Some(task.id);
        }
        Ok(())
    }

    async fn resolve_auditor(&self, checklist: &Checklist) -> Option<User> {
        let id = checklist.assigned_to.as_ref()?;
        match self.services.db.get_user(id).await {
            Ok(user) => Some(user),
            Err(e) => {
                tracing::warn!(user_id = %id, error = %e, "Auditor not found for report");
                None
            }
        }
    }

    async fn fetch_logo(&self) -> Option<Vec<u8>> {
        let url = self.services.config.backend.logo_url.as_deref()?;
        match self.services.objects.download(url).await {
            Ok(bytes) => Some(bytes),
            Err(e) => {
                tracing::warn!(url, error = %e, "Logo unavailable, rendering report without it");
                None
            }
        }
    }
}

fn count_local(checklist: &Checklist) -> usize {
    let sign_off = [&checklist.auditor_signature, &checklist.selfie]
        .into_iter()
        .flatten()
        .filter(|m| m.is_local())
        .count();
    let evidence: usize = checklist
        .items
        .iter()
        .map(|item| item.evidence.iter().filter(|m| m.is_local()).count())
        .sum();
    sign_off + evidence
}

/// Point each finding's photo at the item's first uploaded evidence.
fn resync_finding_photos(checklist: &mut Checklist) {
    for item in &mut checklist.items {
        let first = item.evidence.first().cloned();
        if let Some(finding) = item.finding.as_mut() {
            finding.photo = match item.definition.evidence_type {
                EvidenceType::Photo => first,
                EvidenceType::Video => None,
            };
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use fieldops_ids::ItemId;
    use fieldops_protocol::{ChecklistItem, Finding, ItemDefinition, QuestionType, TaskPriority};

    fn checklist() -> Checklist {
        let mut item = ChecklistItem::from_definition(ItemDefinition::new(
            ItemId::parse("q1").unwrap(),
            "Floor clean?",
            QuestionType::YesNo,
        ));
        item.evidence = vec![
            MediaRef::Local("aGVsbG8=".into()),
            MediaRef::Url("https://cdn/x.jpg".into()),
            MediaRef::Elided,
        ];
        Checklist {
            id: ChecklistId::new(),
            title: "Opening".into(),
            location: None,
            assigned_to: None,
            due_date: None,
            status: ChecklistStatus::InProgress,
            items: vec![item],
            check_in_time: None,
            check_out_time: None,
            auditor_signature: Some(MediaRef::Local("c2ln".into())),
            selfie: Some(MediaRef::Url("https://cdn/selfie.jpg".into())),
            report_url: None,
            created_at: None,
        }
    }

    #[test]
    fn test_count_local_ignores_urls_and_elided() {
        assert_eq!(count_local(&checklist()), 2);
    }

    #[test]
    fn test_resync_uses_first_evidence() {
        let mut list = checklist();
        let id = list.id.clone();
        list.items[0].evidence.remove(0);
        list.items[0].finding = Some(Finding {
            id: None,
            title: "Issue with: Floor clean?".into(),
            checklist_item_id: ItemId::parse("q1").unwrap(),
            checklist_id: id,
            priority: TaskPriority::Medium,
            assigned_to: None,
            due_date: chrono::NaiveDate::from_ymd_opt(2024, 3, 8).unwrap(),
            status: Default::default(),
            description: String::new(),
            photo: Some(MediaRef::Local("aGVsbG8=".into())),
            proof_of_fix: None,
            created_at: chrono::Utc::now(),
        });

        resync_finding_photos(&mut list);
        assert_eq!(
            list.items[0].finding.as_ref().unwrap().photo,
            Some(MediaRef::Url("https://cdn/x.jpg".into()))
        );
    }

    #[test]
    fn test_blank_signature_detection() {
        assert!(is_blank(&MediaRef::Local("  ".into())));
        assert!(is_blank(&MediaRef::Elided));
        assert!(!is_blank(&MediaRef::Url("https://cdn/sig.jpg".into())));
    }
}
