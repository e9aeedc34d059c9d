use std::sync::Arc;

use anyhow::Result;
use teloxide::types::ChatId;
use tokio_cron_scheduler::{Job, JobScheduler};

use crate::{
    domain::{DigestRequest, RequestKind, RequestOrigin},
    tasks::queue::{Priority, RequestQueue},
};

/// Register one job per cron spec (evaluated in UTC); each firing queues a
/// news digest for every configured chat.
pub async fn configure_digest_jobs(
    cron_specs: &[String],
    chat_ids: &[i64],
    queue: Arc<RequestQueue<DigestRequest>>,
) -> Result<JobScheduler> {
    let scheduler = JobScheduler::new().await?;
    if chat_ids.is_empty() && !cron_specs.is_empty() {
        tracing::warn!(
            target: "scheduler",
            "DIGEST_CRONS is set but DIGEST_CHAT_IDS is empty; scheduled digests disabled"
        );
    }
    if !chat_ids.is_empty() {
        for spec in cron_specs {
            let label = spec.clone();
            let chats: Arc<[i64]> = chat_ids.into();
            let queue = queue.clone();
            let job = Job::new_async(spec.as_str(), move |_id, _l| {
                let cron_label = label.clone();
                let chats = chats.clone();
                let queue = queue.clone();
                Box::pin(async move {
                    let queued = enqueue_scheduled(&queue, &chats);
                    tracing::info!(
                        target: "scheduler",
                        cron = %cron_label,
                        queued,
                        "scheduled digest triggered"
                    );
                })
            })?;
            scheduler.add(job).await?;
            tracing::info!(target: "scheduler", cron = %spec, chats = chat_ids.len(), "digest job registered");
        }
    }
    scheduler.start().await?;
    Ok(scheduler)
}

/// Queue a scheduled news digest per chat, skipping chats that already have
/// one waiting. Returns how many were queued.
pub fn enqueue_scheduled(queue: &RequestQueue<DigestRequest>, chat_ids: &[i64]) -> usize {
    chat_ids
        .iter()
        .filter(|&&id| {
            let chat_id = ChatId(id);
            queue.push_unique(
                Priority::Normal,
                DigestRequest::news(chat_id, None, RequestOrigin::Scheduled),
                |queued| queued.chat_id == chat_id && matches!(queued.kind, RequestKind::DailyNews),
            )
        })
        .count()
}
