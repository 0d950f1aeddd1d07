use utoipa::OpenApi;

#[derive(OpenApi)]
/// Aggregated OpenAPI specification for Chain Clash Back.
#[openapi(
    paths(
        crate::routes::health::healthcheck,
        crate::routes::matches::create_match,
        crate::routes::matches::get_match,
        crate::routes::matches::join_match,
        crate::routes::matches::forfeit_match,
        crate::routes::selection::submit_selection,
        crate::routes::selection::get_selection,
        crate::routes::rounds::submit_move,
        crate::routes::rounds::apply_round_outcome,
        crate::routes::rounds::claim_timeout,
        crate::routes::rounds::reject_move,
        crate::routes::presence::disconnect,
        crate::routes::presence::reconnect,
        crate::routes::events::match_events,
    ),
    components(
        schemas(
            crate::dto::health::HealthResponse,
            crate::dto::common::MatchSummary,
            crate::dto::common::StakeSummary,
            crate::dto::common::FighterState,
            crate::dto::matches::CreateMatchRequest,
            crate::dto::matches::JoinMatchRequest,
            crate::dto::matches::ForfeitRequest,
            crate::dto::matches::ForfeitResponse,
            crate::dto::selection::SubmitSelectionRequest,
            crate::dto::selection::SelectionResponse,
            crate::dto::selection::SelectionStateResponse,
            crate::dto::rounds::SubmitMoveRequest,
            crate::dto::rounds::MoveReceipt,
            crate::dto::rounds::RoundOutcomeRequest,
            crate::dto::rounds::RoundOutcomeResponse,
            crate::dto::rounds::TimeoutClaimRequest,
            crate::dto::rounds::TimeoutClaimResponse,
            crate::dto::rounds::TimeoutClaimResult,
            crate::dto::rounds::RejectRequest,
            crate::dto::rounds::RejectResponse,
            crate::dto::rounds::RejectResult,
            crate::dto::presence::PresenceRequest,
            crate::dto::presence::ReconnectSnapshot,
            crate::dto::presence::FighterSnapshot,
            crate::dao::models::MatchStatus,
            crate::dao::models::Slot,
            crate::dao::models::MoveAction,
            crate::dao::models::EndReason,
            crate::dao::models::CancelReason,
            crate::dao::models::RoundEndReason,
            crate::dao::models::FighterVitals,
        )
    ),
    tags(
        (name = "health", description = "Health check endpoints"),
        (name = "matches", description = "Match bootstrap and terminal actions"),
        (name = "selection", description = "Character selection and activation"),
        (name = "rounds", description = "Move intake, timeouts, and round outcomes"),
        (name = "presence", description = "Disconnect and reconnect recovery"),
        (name = "events", description = "Per-match server-sent event streams"),
    )
)]
pub struct ApiDoc;
