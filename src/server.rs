//! Native HTTP server: actix-web in front of the same router the Spin
//! component uses, backed by the in-memory store.

use actix_web::{web, HttpRequest, HttpResponse, HttpServer};

use crate::auth::TokenIdentity;
use crate::common::db::init_demo_data;
use crate::common::store::MemoryStore;
use crate::config::Settings;
use crate::handle_request;

pub struct ServerState {
    pub store: MemoryStore,
    pub settings: Settings,
}

impl ServerState {
    pub fn new(settings: Settings) -> Self {
        Self {
            store: MemoryStore::new(),
            settings,
        }
    }
}

mod adapter {
    use actix_web::HttpRequest;
    use spin_sdk::http::{Method, Request, Response};

    pub fn actix_to_spin_request(req: &HttpRequest, body: actix_web::web::Bytes) -> Request {
        let method = match req.method().as_str() {
            "GET" => Method::Get,
            "POST" => Method::Post,
            "PUT" => Method::Put,
            "DELETE" => Method::Delete,
            "HEAD" => Method::Head,
            "OPTIONS" => Method::Options,
            "PATCH" => Method::Patch,
            other => Method::Other(other.to_string()),
        };

        let mut builder = Request::builder();
        builder.method(method).uri(req.uri().to_string());
        for (name, value) in req.headers() {
            if let Ok(val_str) = value.to_str() {
                builder.header(name.as_str(), val_str);
            }
        }
        builder.body(body.to_vec()).build()
    }

    pub fn spin_to_actix_response(spin_resp: Response) -> actix_web::HttpResponse {
        let status = actix_web::http::StatusCode::from_u16(*spin_resp.status())
            .unwrap_or(actix_web::http::StatusCode::INTERNAL_SERVER_ERROR);
        let mut response = actix_web::HttpResponse::build(status);

        for name in ["content-type", "location"] {
            if let Some(value) = spin_resp.header(name).and_then(|h| h.as_str()) {
                response.insert_header((name, value.to_string()));
            }
        }

        response.body(spin_resp.body().to_vec())
    }
}

async fn handle_all(state: web::Data<ServerState>, req: HttpRequest, body: web::Bytes) -> HttpResponse {
    let spin_req = adapter::actix_to_spin_request(&req, body);
    let identity = TokenIdentity::new(state.settings.token_expiration_hours);
    let app = crate::App::new(&state.store, &identity, &state.settings);
    adapter::spin_to_actix_response(handle_request(&app, &spin_req))
}

/// Routes every request to the board router. Expects `web::Data<ServerState>`
/// in app data.
pub fn configure(cfg: &mut web::ServiceConfig) {
    cfg.default_service(web::route().to(handle_all));
}

pub async fn run(settings: Settings) -> std::io::Result<()> {
    let state = web::Data::new(ServerState::new(settings.clone()));

    if settings.seed_demo_data {
        match init_demo_data(&state.store) {
            Ok(created) => {
                for (username, token) in created {
                    tracing::info!(%username, %token, "demo user ready");
                }
            }
            Err(err) => tracing::warn!(error = ?err, "demo data not seeded"),
        }
    }

    tracing::info!(addr = %settings.bind_addr, "server listening");

    HttpServer::new(move || {
        actix_web::App::new()
            .app_data(state.clone())
            .configure(configure)
    })
    .bind(settings.bind_addr.as_str())?
    .run()
    .await
}
