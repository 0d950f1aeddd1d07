/// Persistence seam for match and round records, with per-backend modules.
pub mod match_store;
/// Entities shared between the storage layer and the services.
pub mod models;
/// Backend-agnostic storage error type.
pub mod storage;
