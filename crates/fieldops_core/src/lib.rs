//! Field Ops audit engine.
//!
//! Everything between a checklist row and a finished audit lives here: the
//! finding rule, answer validation, the resumable audit flow, the submission
//! pipeline and the PDF report, plus the admin and dashboard operations that
//! sit on top of the backend.
//!
//! # Usage
//!
//! ```rust,ignore
//! use fieldops_core::{AuditFlow, Services, SubmissionPipeline};
//!
//! let services = Services::new(db, objects, auth, functions, config);
//! let policy = services.config.findings;
//! let mut flow = AuditFlow::open(checklist, session, policy, services.clock.clone())?;
//! flow.check_in()?;
//! flow.update_item(0, ItemUpdate::SetValue(Some(Answer::YesNo(YesNo::No))))?;
//! flow.set_signature(Some(signature))?;
//! let request = flow.checkout()?;
//! let outcome = SubmissionPipeline::new(&services).submit(request, &NoProgress).await?;
//! flow.finish()?;
//! ```

pub mod admin;
pub mod assignment;
pub mod bootstrap;
pub mod clock;
mod error;
pub mod finding;
pub mod flow;
pub mod media;
pub mod notify;
pub mod progress;
pub mod queries;
pub mod report;
pub mod submission;
pub mod validation;

pub use admin::{require_admin, Admin};
pub use assignment::{create_assignments, plan_assignments, AssignmentRequest};
pub use bootstrap::{bootstrap_profile, check_session, sign_in};
pub use clock::{Clock, FixedClock, SystemClock};
pub use error::{bucket_hint, AuditError, Result, SubmissionStage};
pub use finding::{apply_finding_rule, FindingContext};
pub use flow::{AuditFlow, ItemUpdate};
pub use progress::{NoProgress, Progress, ProgressLog, ProgressSink};
pub use submission::{SubmissionFailure, SubmissionOutcome, SubmissionPipeline, SubmitRequest};
pub use validation::{first_incomplete, is_complete, validate_item, ItemIssue};

use fieldops_backend::{AuthProvider, FieldOpsDb, FunctionInvoker, ObjectStore};
use fieldops_protocol::AppConfig;
use std::sync::Arc;

/// Handles to the backing service shared by every operation.
#[derive(Clone)]
pub struct Services {
    pub db: FieldOpsDb,
    pub objects: Arc<dyn ObjectStore>,
    pub auth: Arc<dyn AuthProvider>,
    pub functions: Arc<dyn FunctionInvoker>,
    pub config: Arc<AppConfig>,
    pub clock: Arc<dyn Clock>,
}

impl Services {
    pub fn new(
        db: FieldOpsDb,
        objects: Arc<dyn ObjectStore>,
        auth: Arc<dyn AuthProvider>,
        functions: Arc<dyn FunctionInvoker>,
        config: AppConfig,
    ) -> Self {
        Self {
            db,
            objects,
            auth,
            functions,
            config: Arc::new(config),
            clock: Arc::new(SystemClock),
        }
    }

    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }
}
