//! HTTP server core: actix-web app assembly and bind/run.

use actix_cors::Cors;
use actix_web::{middleware::DefaultHeaders, web, App, HttpServer as ActixHttpServer};
use tracing::info;
use tracing_actix_web::TracingLogger;

use crate::server::middleware::request_id::RequestIdMiddleware;
use crate::server::routes;
use crate::server::state::AppState;
use crate::utils::error::{Result, RouterError};

pub struct HttpServer {
    host: String,
    port: u16,
    state: AppState,
}

impl HttpServer {
    pub fn new(host: String, port: u16, state: AppState) -> Self {
        Self { host, port, state }
    }

    fn create_app(
        state: web::Data<AppState>,
    ) -> App<
        impl actix_web::dev::ServiceFactory<
            actix_web::dev::ServiceRequest,
            Config = (),
            Response = actix_web::dev::ServiceResponse<impl actix_web::body::MessageBody>,
            Error = actix_web::Error,
            InitError = (),
        >,
    > {
        App::new()
            .app_data(state)
            .wrap(Cors::permissive())
            .wrap(TracingLogger::default())
            .wrap(RequestIdMiddleware)
            .wrap(DefaultHeaders::new().add(("Server", env!("CARGO_PKG_NAME"))))
            .configure(routes::configure)
    }

    pub async fn start(self) -> Result<()> {
        let bind_addr = format!("{}:{}", self.host, self.port);
        info!(address = %bind_addr, "starting HTTP server");

        let state = web::Data::new(self.state);

        let server = ActixHttpServer::new(move || Self::create_app(state.clone()))
            .bind(&bind_addr)
            .map_err(|e| RouterError::Internal(format!("binding {bind_addr}: {e}")))?
            .run();

        info!(address = %bind_addr, "HTTP server listening");

        server
            .await
            .map_err(|e| RouterError::Internal(format!("server error: {e}")))?;

        info!("HTTP server stopped");
        Ok(())
    }
}
