//! Job revocation: cancel a running job across all three stages.

use task_broker::Broker;
use tracing::info;

use crate::status::ChordIds;

/// Revokes the init task; once init has completed, revokes the wrapup task
/// and every review shard reachable from the init result. Idempotent, and
/// never fails if some subtask is already terminal.
pub fn revoke_job(broker: &Broker, job_id: &str) {
    let init = broker.result(job_id);

    if !init.ready() {
        info!("[{job_id}] revoking init");
        broker.revoke(job_id, true);
        return;
    }

    let Some(ids) = init
        .result
        .and_then(|v| serde_json::from_value::<ChordIds>(v).ok())
    else {
        // Failed init stores a message, not chord ids; nothing left to stop.
        return;
    };

    let wrapup = broker.result(&ids.wrapup_id);
    if !wrapup.ready() {
        info!("[{job_id}] revoking wrapup {}", ids.wrapup_id);
        broker.revoke(&ids.wrapup_id, true);
    }

    for review_id in &ids.review_ids {
        broker.revoke(review_id, true);
    }
}
