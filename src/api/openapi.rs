//! OpenAPI documentation

use axum::Router;
use utoipa::{
    openapi::security::{HttpAuthScheme, HttpBuilder, SecurityScheme},
    Modify, OpenApi,
};
use utoipa_swagger_ui::SwaggerUi;

use crate::api::{health, visits};

struct BearerAuth;

impl Modify for BearerAuth {
    fn modify(&self, openapi: &mut utoipa::openapi::OpenApi) {
        if let Some(components) = openapi.components.as_mut() {
            components.add_security_scheme(
                "bearer_auth",
                SecurityScheme::Http(
                    HttpBuilder::new()
                        .scheme(HttpAuthScheme::Bearer)
                        .bearer_format("JWT")
                        .build(),
                ),
            );
        }
    }
}

#[derive(OpenApi)]
#[openapi(
    info(
        title = "Visitgate API",
        version = "0.3.0",
        description = "Facility visitor check-in REST API",
        license(name = "AGPL-3.0", url = "https://www.gnu.org/licenses/agpl-3.0.html")
    ),
    servers(
        (url = "/api/v1", description = "API v1")
    ),
    paths(
        // Health
        health::health_check,
        health::readiness_check,
        // Desk
        visits::check_in,
        visits::check_out,
        // Visits
        visits::list_checked_in,
        visits::manual_checkout,
        visits::create_visit,
        visits::get_visit,
        visits::approve_visit,
        visits::reject_visit,
        // Cards
        visits::issue_card,
        visits::print_queue,
        visits::mark_card_printed,
        visits::delete_visit,
    ),
    components(
        schemas(
            crate::models::visit::ScanRequest,
            crate::models::visit::ScanResponse,
            crate::models::visit::CheckedInVisitor,
            crate::models::visit::CreateVisit,
            crate::models::visit::VisitDetails,
            crate::models::visit::WindowStatus,
            crate::models::visit::DaySlotView,
            crate::models::visitor::VisitorSummary,
            crate::models::visit::VisitStatus,
            crate::models::card::IssuedCard,
            crate::models::card::PrintedCard,
            crate::tracker::SlotState,
            health::HealthResponse,
            crate::error::ErrorResponse,
        )
    ),
    modifiers(&BearerAuth),
    tags(
        (name = "health", description = "Health check endpoints"),
        (name = "desk", description = "QR card check-in and check-out"),
        (name = "visits", description = "Visit registration, approval and supervision"),
        (name = "cards", description = "Visitor card printing")
    )
)]
pub struct ApiDoc;

/// Create the OpenAPI documentation router
pub fn create_openapi_router() -> Router {
    Router::new()
        .merge(SwaggerUi::new("/swagger-ui").url("/api-docs/openapi.json", ApiDoc::openapi()))
}
