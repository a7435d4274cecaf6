//! Background jobs processed by the apalis worker.

mod email_delivery_job;
mod notification_job;
mod worker;

pub use email_delivery_job::{email_delivery_handler, EmailDeliveryJob};
pub use notification_job::{notification_handler, NotificationJob, NotifyTargets};
pub use worker::{clear_failed_jobs, list_jobs, run_worker, worker_monitor};
