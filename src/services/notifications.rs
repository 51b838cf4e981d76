//! Feeds object-created notifications from the local object store into the
//! thumbnail pipeline.
//!
//! Thumbnails written back by the pipeline produce notifications too; the
//! pipeline's skip rule is what stops that loop.
//!
//! The channel is bounded and the store never waits on it, so a write made
//! from inside a dispatched task cannot stall the dispatcher.

use super::pipeline::{CreateOutcome, ThumbnailPipeline};
use crate::models::event::ObjectCreated;
use std::sync::Arc;
use tokio::{
    sync::{Semaphore, mpsc::Receiver},
    task::{JoinHandle, JoinSet},
};
use tracing::{debug, info, warn};

/// Buffered notifications before the store starts dropping them.
pub const CHANNEL_CAPACITY: usize = 1024;

/// Notifications processed at the same time.
pub const MAX_IN_FLIGHT: usize = 4;

/// Run until every sender is dropped and in-flight work has finished.
/// Returns how many notifications were handled.
pub fn spawn_dispatcher(
    pipeline: Arc<ThumbnailPipeline>,
    mut rx: Receiver<ObjectCreated>,
    max_in_flight: usize,
) -> JoinHandle<usize> {
    let permits = Arc::new(Semaphore::new(max_in_flight.max(1)));

    tokio::spawn(async move {
        let mut tasks = JoinSet::new();
        let mut handled = 0;

        while let Some(created) = rx.recv().await {
            // Wait for a free slot so the backlog stays in the channel.
            let Ok(permit) = permits.clone().acquire_owned().await else {
                break;
            };
            let pipeline = pipeline.clone();
            tasks.spawn(async move {
                handle(&pipeline, created).await;
                drop(permit);
            });

            while let Some(joined) = tasks.try_join_next() {
                handled += finished(joined);
            }
        }

        while let Some(joined) = tasks.join_next().await {
            handled += finished(joined);
        }
        info!(handled, "notification channel closed");
        handled
    })
}

async fn handle(pipeline: &ThumbnailPipeline, created: ObjectCreated) {
    let (bucket, key) = (created.bucket.clone(), created.key.clone());
    match pipeline.process_upload(created).await {
        Ok(CreateOutcome::Created { url }) => {
            info!(%bucket, %key, %url, "notification produced thumbnail")
        }
        Ok(CreateOutcome::Skipped) => debug!(%bucket, %key, "notification skipped"),
        Err(err) => warn!(%bucket, %key, "notification failed: {}", err),
    }
}

fn finished(joined: Result<(), tokio::task::JoinError>) -> usize {
    match joined {
        Ok(()) => 1,
        Err(err) => {
            warn!("notification task aborted: {}", err);
            0
        }
    }
}
