use actix_web::{HttpRequest, HttpResponse, Responder};

/// Endpoint used by clients to know if the server is working
#[tracing::instrument(name = "Health Check handler", skip(_request))]
pub async fn health_check(_request: HttpRequest) -> impl Responder {
    HttpResponse::Ok()
}
