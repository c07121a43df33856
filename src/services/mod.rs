/// OpenAPI documentation generation.
pub mod documentation;
/// Health check service.
pub mod health_service;
/// Prize pool listing and atomic draws.
pub mod prize_service;
/// Quiz question generation and storage.
pub mod question_service;
/// Session lifecycle, roles and voting.
pub mod session_service;
/// Key-value store connection supervisor toggling degraded mode.
pub mod storage_supervisor;
