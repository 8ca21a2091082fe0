//! API Handlers
//!
//! HTTP request handlers for each cache server endpoint. Engine calls may
//! touch the filesystem, so they run on the blocking pool.

use std::sync::Arc;

use axum::{
    extract::{Path, Query, State},
    Json,
};

use crate::cache::{CacheCoordinator, CacheExport, GroupStats, OptimizeReport};
use crate::config::Config;
use crate::error::{CacheError, Result};
use crate::models::{
    validate_key, DeleteGroupResponse, DeleteResponse, GetQuery, GetResponse, HealthResponse,
    SetRequest, SetResponse, StatsResponse,
};

/// Application state shared across all handlers.
///
/// The coordinator synchronizes internally, so handlers share it through
/// a plain `Arc`.
#[derive(Clone)]
pub struct AppState {
    pub coordinator: Arc<CacheCoordinator>,
}

impl AppState {
    /// Creates a new AppState around an existing coordinator.
    pub fn new(coordinator: CacheCoordinator) -> Self {
        Self {
            coordinator: Arc::new(coordinator),
        }
    }

    /// Creates a new AppState from configuration.
    ///
    /// Validates the config, builds every enabled tier and starts the disk
    /// sweeper on the current runtime.
    pub fn from_config(config: &Config) -> Result<Self> {
        Ok(Self::new(CacheCoordinator::from_config(config)?))
    }

    /// Runs an engine call on the blocking pool.
    async fn run<T, F>(&self, call: F) -> Result<T>
    where
        F: FnOnce(&CacheCoordinator) -> T + Send + 'static,
        T: Send + 'static,
    {
        let coordinator = Arc::clone(&self.coordinator);
        tokio::task::spawn_blocking(move || call(&coordinator))
            .await
            .map_err(|e| CacheError::Internal(format!("engine task failed: {}", e)))
    }
}

/// Handler for PUT /set
///
/// Stores a value in every tier, or in the requested one, with optional
/// TTL, group and metadata.
pub async fn set_handler(
    State(state): State<AppState>,
    Json(req): Json<SetRequest>,
) -> Result<Json<SetResponse>> {
    // Validate request
    if let Some(error_msg) = req.validate() {
        return Err(CacheError::InvalidRequest(error_msg));
    }

    let (key, value, options) = req.into_parts();
    let response_key = key.clone();
    let written = state
        .run(move |coordinator| coordinator.set(&key, value, options))
        .await??;

    Ok(Json(SetResponse::new(response_key, written)))
}

/// Handler for GET /get/:key
///
/// Reads through the tiers; `?group=` records the key in that group on a hit.
pub async fn get_handler(
    State(state): State<AppState>,
    Path(key): Path<String>,
    Query(query): Query<GetQuery>,
) -> Result<Json<GetResponse>> {
    if let Some(error_msg) = validate_key(&key) {
        return Err(CacheError::InvalidRequest(error_msg));
    }

    let lookup_key = key.clone();
    let value = state
        .run(move |coordinator| coordinator.get(&lookup_key, query.group.as_deref()))
        .await?
        .ok_or_else(|| CacheError::NotFound(key.clone()))?;

    Ok(Json(GetResponse::new(key, value)))
}

/// Handler for DELETE /del/:key
///
/// Deletes a key from every tier and every group.
pub async fn delete_handler(
    State(state): State<AppState>,
    Path(key): Path<String>,
) -> Result<Json<DeleteResponse>> {
    let lookup_key = key.clone();
    let removed = state
        .run(move |coordinator| coordinator.delete(&lookup_key))
        .await?;

    if !removed {
        return Err(CacheError::NotFound(key));
    }
    Ok(Json(DeleteResponse::new(key)))
}

/// Handler for GET /group/:name
pub async fn group_stats_handler(
    State(state): State<AppState>,
    Path(name): Path<String>,
) -> Result<Json<GroupStats>> {
    let lookup = name.clone();
    state
        .run(move |coordinator| coordinator.group_stats(&lookup))
        .await?
        .map(Json)
        .ok_or_else(|| CacheError::NotFound(format!("group '{}'", name)))
}

/// Handler for DELETE /group/:name
///
/// Deletes every key tracked under the group, then the group itself.
pub async fn delete_group_handler(
    State(state): State<AppState>,
    Path(name): Path<String>,
) -> Result<Json<DeleteGroupResponse>> {
    let lookup = name.clone();
    let deleted = state
        .run(move |coordinator| {
            coordinator
                .groups()
                .contains(&lookup)
                .then(|| coordinator.delete_group(&lookup))
        })
        .await?
        .ok_or_else(|| CacheError::NotFound(format!("group '{}'", name)))?;

    Ok(Json(DeleteGroupResponse::new(name, deleted)))
}

/// Handler for GET /stats
///
/// Returns aggregate, per-tier and per-group statistics.
pub async fn stats_handler(State(state): State<AppState>) -> Result<Json<StatsResponse>> {
    let stats = state.run(|coordinator| coordinator.stats()).await?;
    Ok(Json(StatsResponse::from(stats)))
}

/// Handler for GET /export
///
/// Returns the loaded configuration with current statistics and group names.
pub async fn export_handler(State(state): State<AppState>) -> Result<Json<CacheExport>> {
    let export = state.run(|coordinator| coordinator.export()).await?;
    Ok(Json(export))
}

/// Handler for POST /optimize
pub async fn optimize_handler(State(state): State<AppState>) -> Result<Json<OptimizeReport>> {
    let report = state.run(|coordinator| coordinator.optimize()).await?;
    Ok(Json(report))
}

/// Handler for GET /health
///
/// Returns health status of the server.
pub async fn health_handler() -> Json<HealthResponse> {
    Json(HealthResponse::healthy())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::{LruPolicy, Metadata, Tier, TieredCache};
    use serde_json::json;

    fn test_state() -> AppState {
        let tiered = TieredCache::new(Box::new(LruPolicy::new(1 << 20)));
        AppState::new(CacheCoordinator::new(tiered))
    }

    fn set_request(key: &str, group: Option<&str>) -> SetRequest {
        SetRequest {
            key: key.to_string(),
            value: json!({"close": 10.5}),
            ttl: None,
            group: group.map(str::to_string),
            tier: None,
            metadata: Metadata::new(),
        }
    }

    #[tokio::test]
    async fn test_set_and_get_handler() {
        let state = test_state();

        let result = set_handler(State(state.clone()), Json(set_request("test_key", None))).await;
        assert_eq!(result.unwrap().tiers_written, 1);

        let response = get_handler(
            State(state.clone()),
            Path("test_key".to_string()),
            Query(GetQuery::default()),
        )
        .await
        .unwrap();
        assert_eq!(response.value, json!({"close": 10.5}));
    }

    #[tokio::test]
    async fn test_get_nonexistent_key() {
        let state = test_state();

        let result = get_handler(
            State(state),
            Path("nonexistent".to_string()),
            Query(GetQuery::default()),
        )
        .await;
        assert!(matches!(result, Err(CacheError::NotFound(_))));
    }

    #[tokio::test]
    async fn test_delete_handler() {
        let state = test_state();
        let written = set_handler(State(state.clone()), Json(set_request("to_delete", None)))
            .await
            .unwrap();
        assert_eq!(written.tiers_written, 1);

        let result = delete_handler(State(state.clone()), Path("to_delete".to_string())).await;
        assert!(result.is_ok());

        let result = delete_handler(State(state), Path("to_delete".to_string())).await;
        assert!(matches!(result, Err(CacheError::NotFound(_))));
    }

    #[tokio::test]
    async fn test_group_handlers() {
        let state = test_state();
        for key in ["600000:a", "600000:b"] {
            let written = set_handler(State(state.clone()), Json(set_request(key, Some("600000"))))
                .await
                .unwrap();
            assert_eq!(written.tiers_written, 1);
        }

        let stats = group_stats_handler(State(state.clone()), Path("600000".to_string()))
            .await
            .unwrap();
        assert_eq!(stats.size, 2);
        assert_eq!(stats.live, 2);

        let deleted = delete_group_handler(State(state.clone()), Path("600000".to_string()))
            .await
            .unwrap();
        assert_eq!(deleted.deleted, 2);

        let missing = delete_group_handler(State(state), Path("600000".to_string())).await;
        assert!(matches!(missing, Err(CacheError::NotFound(_))));
    }

    #[tokio::test]
    async fn test_stats_handler() {
        let state = test_state();

        let response = stats_handler(State(state)).await.unwrap();
        assert_eq!(response.hits, 0);
        assert_eq!(response.misses, 0);
        assert_eq!(response.tiers[0].tier, Tier::Memory);
    }

    #[tokio::test]
    async fn test_optimize_handler() {
        let state = test_state();

        let report = optimize_handler(State(state)).await.unwrap();
        assert!(report.cleared_tiers.is_empty());
    }

    #[tokio::test]
    async fn test_export_handler() {
        let state = test_state();
        let written = set_handler(State(state.clone()), Json(set_request("k", Some("g"))))
            .await
            .unwrap();
        assert_eq!(written.tiers_written, 1);

        let export = export_handler(State(state)).await.unwrap();
        assert!(export.config.is_none());
        assert_eq!(export.groups, vec!["g".to_string()]);
    }

    #[tokio::test]
    async fn test_health_handler() {
        let response = health_handler().await;
        assert_eq!(response.status, "healthy");
    }

    #[tokio::test]
    async fn test_set_invalid_request() {
        let state = test_state();

        let result = set_handler(State(state), Json(set_request("", None))).await;
        assert!(matches!(result, Err(CacheError::InvalidRequest(_))));
    }
}
