//! Actix Web front end exposing the liveness check, plane detection, and metrics.
//!
//! Each request walks `Received → Validating → Invoking → Decoding → Responded`,
//! or ends in `Failed`; the current stage is recorded on the request span.

use std::{fmt, time::Instant};

use actix_web::{
    App, HttpRequest, HttpResponse, HttpServer, ResponseError, Route,
    dev::ServiceResponse,
    error::QueryPayloadError,
    http::{Method, StatusCode, header},
    middleware::{DefaultHeaders, ErrorHandlerResponse, ErrorHandlers},
    web::{self, Bytes},
};
use anyhow::{Context, Result};
use engine_bridge::{
    DetectError, DetectionParameters, Engine, GridDims, Plane, PointCloudGrid, decode_planes,
};
use metrics::{counter, histogram};
use tracing::{Instrument, Span, debug, error, info, warn};

use crate::service::{
    ServiceConfig,
    data::{ErrorBody, GridQuery, STATUS_MESSAGE, StatusResponse},
    telemetry,
};

/// Shared state backing HTTP handlers.
pub(crate) struct ServiceState {
    pub(crate) engine: Engine,
}

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub(crate) enum RequestStage {
    Received,
    Validating,
    Invoking,
    Decoding,
    Responded,
    Failed,
}

impl RequestStage {
    pub(crate) fn label(self) -> &'static str {
        match self {
            RequestStage::Received => "received",
            RequestStage::Validating => "validating",
            RequestStage::Invoking => "invoking",
            RequestStage::Decoding => "decoding",
            RequestStage::Responded => "responded",
            RequestStage::Failed => "failed",
        }
    }
}

fn enter_stage(stage: RequestStage) {
    Span::current().record("stage", stage.label());
    debug!("Request stage: {}", stage.label());
}

/// HTTP-facing failure: a status code plus a JSON `{error, detail}` body.
#[derive(Debug)]
pub(crate) struct ApiError {
    status: StatusCode,
    kind: &'static str,
    detail: String,
}

impl From<DetectError> for ApiError {
    fn from(err: DetectError) -> Self {
        let status = match &err {
            DetectError::InvalidDimensions { .. } | DetectError::PayloadSizeMismatch { .. } => {
                StatusCode::BAD_REQUEST
            }
            DetectError::EngineTimeout { .. } => StatusCode::GATEWAY_TIMEOUT,
            DetectError::EngineNotFound { .. }
            | DetectError::EngineSpawn { .. }
            | DetectError::EngineIo(_)
            | DetectError::EngineExecutionFailed { .. }
            | DetectError::ResultDecodeFailed { .. } => StatusCode::INTERNAL_SERVER_ERROR,
        };
        Self {
            status,
            kind: err.kind(),
            detail: detail_chain(&err),
        }
    }
}

/// Render an error and its sources as one line.
fn detail_chain(err: &(dyn std::error::Error + 'static)) -> String {
    let mut detail = err.to_string();
    let mut source = err.source();
    while let Some(cause) = source {
        let cause = cause.to_string();
        if !detail.contains(&cause) {
            detail.push_str(": ");
            detail.push_str(&cause);
        }
        source = source.and_then(|s| s.source());
    }
    detail
}

impl fmt::Display for ApiError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.kind, self.detail)
    }
}

impl ResponseError for ApiError {
    fn status_code(&self) -> StatusCode {
        self.status
    }

    fn error_response(&self) -> HttpResponse {
        HttpResponse::build(self.status).json(ErrorBody {
            error: self.kind,
            detail: &self.detail,
        })
    }
}

fn query_error(err: QueryPayloadError, _req: &HttpRequest) -> actix_web::Error {
    ApiError {
        status: StatusCode::BAD_REQUEST,
        kind: "invalid_query",
        detail: err.to_string(),
    }
    .into()
}

/// Permissive cross-origin policy; the service carries no credentials.
pub(crate) fn cors_headers() -> DefaultHeaders {
    DefaultHeaders::new()
        .add((header::ACCESS_CONTROL_ALLOW_ORIGIN, "*"))
        .add((header::ACCESS_CONTROL_ALLOW_METHODS, "*"))
        .add((header::ACCESS_CONTROL_ALLOW_HEADERS, "*"))
}

/// Give framework-generated errors the same JSON body as handler errors.
pub(crate) fn json_errors<B: 'static>() -> ErrorHandlers<B> {
    ErrorHandlers::new().handler(StatusCode::PAYLOAD_TOO_LARGE, payload_too_large)
}

fn payload_too_large<B>(res: ServiceResponse<B>) -> actix_web::Result<ErrorHandlerResponse<B>> {
    let detail = res
        .response()
        .error()
        .map(|err| err.to_string())
        .unwrap_or_else(|| "request body exceeds the configured limit".to_string());
    let (req, _) = res.into_parts();
    let response = HttpResponse::PayloadTooLarge().json(ErrorBody {
        error: "payload_too_large",
        detail: &detail,
    });
    Ok(ErrorHandlerResponse::Response(
        ServiceResponse::new(req, response).map_into_right_body(),
    ))
}

/// Register routes and per-app data; shared by the server and tests.
pub(crate) fn configure(
    engine: Engine,
    max_payload_bytes: usize,
) -> impl Fn(&mut web::ServiceConfig) + Clone {
    move |cfg: &mut web::ServiceConfig| {
        cfg.app_data(web::Data::new(ServiceState {
            engine: engine.clone(),
        }))
        .app_data(web::PayloadConfig::new(max_payload_bytes))
        .app_data(web::QueryConfig::default().error_handler(query_error))
        .service(
            web::resource("/")
                .route(web::get().to(index_route))
                .route(preflight()),
        )
        .service(
            web::resource("/planes")
                .route(web::post().to(planes_handler))
                .route(preflight()),
        )
        .service(
            web::resource("/metrics")
                .route(web::get().to(metrics_handler))
                .route(preflight()),
        );
    }
}

fn preflight() -> Route {
    web::method(Method::OPTIONS).to(|| async { HttpResponse::NoContent().finish() })
}

pub(crate) async fn not_found(req: HttpRequest) -> HttpResponse {
    if req.method() == Method::OPTIONS {
        return HttpResponse::NoContent().finish();
    }
    HttpResponse::NotFound().json(ErrorBody {
        error: "not_found",
        detail: &format!("no route for {} {}", req.method(), req.path()),
    })
}

/// Run the HTTP server until it is stopped by a signal.
pub fn run(config: ServiceConfig) -> Result<()> {
    let _telemetry_guard = telemetry::init(&config.telemetry);
    let _ = telemetry::init_metrics_recorder();

    if !config.engine.path.exists() {
        warn!(
            "Plane engine not found at {}; detection requests will fail until it exists",
            config.engine.path.display()
        );
    }
    info!(
        engine = %config.engine.path.display(),
        timeout_s = config.engine.timeout.as_secs(),
        "Starting plane service on {}:{}",
        config.host,
        config.port
    );

    let routes = configure(Engine::new(config.engine.clone()), config.max_payload_bytes);
    let host = config.host.clone();
    let port = config.port;
    let workers = config.workers;
    actix_web::rt::System::new()
        .block_on(async move {
            let mut server = HttpServer::new(move || {
                App::new()
                    .wrap(json_errors())
                    .wrap(cors_headers())
                    .configure(routes.clone())
                    .default_service(web::to(not_found))
            });
            if let Some(workers) = workers {
                server = server.workers(workers);
            }
            server.bind((host.as_str(), port))?.run().await
        })
        .with_context(|| format!("HTTP server on {}:{} failed", config.host, config.port))
}

/// Static liveness payload.
async fn index_route() -> HttpResponse {
    HttpResponse::Ok().json(StatusResponse {
        message: STATUS_MESSAGE,
    })
}

/// Prometheus text exposition of service metrics.
async fn metrics_handler() -> HttpResponse {
    match telemetry::prometheus_handle() {
        Some(handle) => HttpResponse::Ok()
            .content_type("text/plain; version=0.0.4")
            .body(handle.render()),
        None => HttpResponse::NoContent().finish(),
    }
}

/// Validate the payload, run the engine, and return its planes.
async fn planes_handler(
    grid: web::Query<GridQuery>,
    params: web::Query<DetectionParameters>,
    body: Bytes,
    state: web::Data<ServiceState>,
) -> Result<HttpResponse, ApiError> {
    let GridQuery { width, height } = grid.into_inner();
    let params = params.into_inner();
    let span = tracing::info_span!(
        "planes.request",
        width,
        height,
        body_bytes = body.len(),
        tunables = ?params.supplied_flags(),
        stage = RequestStage::Received.label(),
    );

    async move {
        let started = Instant::now();
        match detect(&state.engine, width, height, &params, body).await {
            Ok(planes) => {
                enter_stage(RequestStage::Responded);
                counter!("planes_requests_total", "outcome" => "ok").increment(1);
                histogram!("planes_returned").record(planes.len() as f64);
                info!(
                    planes = planes.len(),
                    elapsed_ms = started.elapsed().as_millis() as u64,
                    "Detection complete"
                );
                Ok(HttpResponse::Ok().json(planes))
            }
            Err(err) => {
                enter_stage(RequestStage::Failed);
                counter!("planes_requests_total", "outcome" => err.kind()).increment(1);
                if err.is_client_error() {
                    info!("Rejected detection request: {err}");
                } else {
                    error!("Detection failed: {err}");
                }
                Err(err.into())
            }
        }
    }
    .instrument(span)
    .await
}

async fn detect(
    engine: &Engine,
    width: u32,
    height: u32,
    params: &DetectionParameters,
    body: Bytes,
) -> Result<Vec<Plane>, DetectError> {
    enter_stage(RequestStage::Validating);
    let dims = GridDims::new(width, height)?;
    let grid = PointCloudGrid::from_bytes(dims, body)?;

    enter_stage(RequestStage::Invoking);
    let output = engine.run(&grid, params).await?;
    histogram!("engine_duration_seconds").record(output.elapsed.as_secs_f64());

    enter_stage(RequestStage::Decoding);
    decode_planes(&output.stdout)
}
