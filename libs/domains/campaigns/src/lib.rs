//! Campaigns Domain
//!
//! The batch dispatch engine behind bulk-email campaigns: durable,
//! resumable, rate-limited sending with per-recipient status tracking and
//! partial-failure isolation.
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────────┐
//! │   API Handler    │  ← create / start / advance / pause / cancel
//! └────────┬─────────┘
//!          │
//! ┌────────▼─────────┐
//! │ JobService       │  ← intake: suppression filter + batch partitioning
//! │ DispatchDriver   │  ← one advance = select batch → render → send → commit
//! └────────┬─────────┘
//!          │
//! ┌────────▼─────────┐
//! │   PostgreSQL     │  ← jobs, recipient ledger, settings, history
//! └────────┬─────────┘
//!          │
//! ┌────────▼─────────┐
//! │   BatchMailer    │  ← one call per batch (Resend)
//! └──────────────────┘
//! ```
//!
//! Progression is pull-driven: there is no background worker. The caller
//! invokes the advance endpoint repeatedly, waiting `next_batch_in`
//! milliseconds between calls. Overlapping advances on the same job are
//! excluded by a short-lived dispatch lease on the job row.
//!
//! # Usage
//!
//! ```rust,ignore
//! use domain_campaigns::{
//!     handlers, DispatchDriver, JobService, PgJobRepository,
//!     PgSettingsRepository, PgSuppressionRepository, ResendMailer,
//!     CredentialVault,
//! };
//! use std::sync::Arc;
//!
//! let jobs = Arc::new(PgJobRepository::new(db.clone()));
//! let suppressions = Arc::new(PgSuppressionRepository::new(db.clone()));
//! let service = JobService::new(jobs.clone(), suppressions);
//! let router = handlers::jobs_router(service);
//! ```

pub mod dispatch;
pub mod entity;
pub mod error;
pub mod handlers;
pub mod models;
pub mod placeholder;
pub mod postgres;
pub mod repository;
pub mod service;
pub mod transport;
pub mod vault;

// Re-export commonly used types
pub use dispatch::{DispatchDriver, DISPATCH_LEASE_SECS};
pub use error::{CampaignError, CampaignResult};
pub use models::{
    BatchReport, CreateJob, CreateJobReceipt, Job, JobAction, JobStatus, Recipient,
    RecipientStatus,
};
pub use postgres::{
    PgHistoryRepository, PgJobRepository, PgSettingsRepository, PgSuppressionRepository,
};
pub use repository::{
    BatchOutcome, DispatchLease, HistoryRepository, JobRepository, SettingsRepository,
    SuppressionRepository,
};
pub use service::{HistoryService, JobService, SettingsService, SuppressionService};
pub use transport::{BatchMailer, OutboundEmail, ResendMailer};
pub use vault::CredentialVault;
