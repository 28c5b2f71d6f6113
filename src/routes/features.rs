use axum::extract::{Path, Query, State};
use serde::{Deserialize, Serialize};
use utoipa::{IntoParams, ToSchema};
use utoipa_axum::router::OpenApiRouter;

use crate::{
    app_error::{AppError, StdResponse},
    app_state::AppState,
    flags::{BugFlag, FlagSet},
};

/// Defines the feature flag routes with OpenAPI specs.
pub fn routes_with_openapi() -> OpenApiRouter<AppState> {
    OpenApiRouter::new().nest(
        "/api/features",
        OpenApiRouter::new()
            .routes(utoipa_axum::routes!(get_flags))
            .routes(utoipa_axum::routes!(toggle_bug)),
    )
}

#[derive(Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct FlagsRes {
    pub environment: String,
    pub flags: FlagSet,
}

/// Current flag values.
#[utoipa::path(
    get,
    path = "/flags",
    tags = ["Features"],
    responses(
        (status = 200, description = "Current flags", body = StdResponse<FlagsRes, String>)
    )
)]
async fn get_flags(State(state): State<AppState>) -> StdResponse<FlagsRes, &'static str> {
    StdResponse {
        data: Some(FlagsRes {
            environment: state.environment.clone(),
            flags: state.flags.snapshot(),
        }),
        message: Some("Get flags successfully"),
    }
}

#[derive(Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
struct ToggleQuery {
    /// New value of the toggle.
    enable: bool,
}

#[derive(Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct ToggleRes {
    pub bug: String,
    pub enabled: bool,
}

/// Switch one bug toggle at runtime. Development environments only.
#[utoipa::path(
    post,
    path = "/bugs/{bug}/toggle",
    tags = ["Features"],
    params(
        ("bug" = String, Path, description = "Bug name, e.g. `calculation` or `breakOrderCreation`"),
        ToggleQuery
    ),
    responses(
        (status = 200, description = "Toggle updated", body = StdResponse<ToggleRes, String>),
        (status = 400, description = "Unknown bug"),
        (status = 403, description = "Not a development environment")
    )
)]
async fn toggle_bug(
    Path(bug): Path<String>,
    Query(query): Query<ToggleQuery>,
    State(state): State<AppState>,
) -> Result<StdResponse<ToggleRes, &'static str>, AppError> {
    if !state.allows_flag_toggles() {
        return Err(AppError::ForbiddenResource(
            "Flags can only be toggled in development".into(),
        ));
    }

    let flag: BugFlag = bug
        .parse()
        .map_err(|err: crate::flags::UnknownBugFlag| AppError::BadRequest(err.to_string()))?;

    state.flags.toggle(flag, query.enable);
    tracing::warn!("Bug flag {} set to {}", flag, query.enable);

    Ok(StdResponse {
        data: Some(ToggleRes {
            bug: flag.to_string(),
            enabled: query.enable,
        }),
        message: Some("Bug flag updated"),
    })
}
