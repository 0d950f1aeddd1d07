//! Best-effort notification of the external rating collaborator.
//!
//! A completed match fires one fire-and-forget POST; transport failures are
//! logged and never surface to the request that completed the match.

use tracing::debug;

use crate::{dao::models::MatchEntity, state::SharedState};

/// Notify the rating collaborator that `entity` completed.
#[cfg(feature = "rating-hook")]
pub fn notify_match_completed(state: &SharedState, entity: &MatchEntity) {
    use tracing::warn;

    let Some(url) = state.config().rating_hook_url().map(str::to_string) else {
        debug!(match_id = %entity.id, "no rating hook configured");
        return;
    };
    let Some(winner) = entity.winner else {
        return;
    };
    let (Some(winner_id), Some(loser_id)) =
        (entity.player(winner), entity.player(winner.opponent()))
    else {
        return;
    };

    let payload = serde_json::json!({
        "match_id": entity.id,
        "winner": winner_id,
        "loser": loser_id,
        "reason": entity.end_reason,
        "wins_a": entity.wins_a,
        "wins_b": entity.wins_b,
        "best_of": entity.best_of,
    });
    let match_id = entity.id;

    tokio::spawn(async move {
        let client = reqwest::Client::new();
        match client.post(&url).json(&payload).send().await {
            Ok(response) if response.status().is_success() => {
                debug!(%match_id, "rating hook notified");
            }
            Ok(response) => {
                warn!(%match_id, status = %response.status(), "rating hook rejected the result");
            }
            Err(err) => {
                warn!(%match_id, error = %err, "rating hook unreachable");
            }
        }
    });
}

/// No-op stand-in when the hook is compiled out.
#[cfg(not(feature = "rating-hook"))]
pub fn notify_match_completed(_state: &SharedState, entity: &MatchEntity) {
    debug!(match_id = %entity.id, "rating hook disabled at build time");
}
