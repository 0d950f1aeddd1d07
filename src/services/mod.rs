/// OpenAPI documentation generation.
pub mod documentation;
/// Health check service.
pub mod health_service;
/// Match bootstrap: creation, joining, and lazy stake expiry.
pub mod match_service;
/// Presence transitions and reconnect snapshots.
pub mod presence_service;
/// Signature verification boundary for player-bound actions.
pub mod proof;
/// Best-effort rating collaborator hook.
pub mod rating_service;
/// Forfeit, timeout-claim, and reject resolution.
pub mod resolution_service;
/// Round timing, move intake, and round conclusion.
pub mod round_service;
/// Character selection and race-safe activation.
pub mod selection_service;
/// Typed event publication onto per-match channels.
pub mod sse_events;
/// Server-Sent Events streaming service.
pub mod sse_service;
/// Storage persistence supervisor with reconnect/backoff.
pub mod storage_supervisor;

#[cfg(test)]
pub(crate) mod testing;
