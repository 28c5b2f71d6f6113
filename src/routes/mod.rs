pub mod carts;
pub mod features;

use axum::Router;
use tower::ServiceBuilder;
use tower_http::trace::TraceLayer;
use utoipa::openapi::{
    InfoBuilder,
    security::{HttpAuthScheme, HttpBuilder, SecurityScheme},
};
use utoipa_axum::router::OpenApiRouter;
use utoipa_swagger_ui::SwaggerUi;

use crate::app_state::AppState;

/// The whole HTTP surface: cart and feature routes, swagger UI and request tracing.
pub fn router(state: AppState) -> Router {
    let (routes, mut openapi) = OpenApiRouter::new()
        .merge(carts::routes_with_openapi())
        .merge(features::routes_with_openapi())
        .split_for_parts();

    openapi.info = InfoBuilder::new()
        .title("Hits CartService API")
        .version("1.0.0")
        .build();
    if let Some(components) = openapi.components.as_mut() {
        components.add_security_scheme(
            "bearerAuth",
            SecurityScheme::Http(
                HttpBuilder::new()
                    .scheme(HttpAuthScheme::Bearer)
                    .bearer_format("JWT")
                    .build(),
            ),
        );
    }

    Router::new()
        .merge(routes)
        .merge(SwaggerUi::new("/swagger-ui").url("/api-docs/openapi.json", openapi))
        .layer(ServiceBuilder::new().layer(TraceLayer::new_for_http()))
        .with_state(state)
}
