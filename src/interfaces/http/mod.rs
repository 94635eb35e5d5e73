use actix_cors::Cors;
use actix_multipart::{Multipart, MultipartError};
use actix_web::http::{header, StatusCode};
use actix_web::{dev::Server, get, post, web, App, HttpResponse, HttpServer, ResponseError};
use futures_util::TryStreamExt;
use serde::Deserialize;
use std::sync::Arc;
use tracing::{info, warn};

use crate::application::use_cases::export_prices::ExportPricesUseCase;
use crate::application::use_cases::ingest_prices::IngestPricesUseCase;
use crate::application::use_cases::stats_report::StatsResponse;
use crate::domain::archive::ArchiveFormat;
use crate::domain::error::AppError;
use crate::infrastructure::config::{IngestConfig, ServerConfig};
use crate::infrastructure::db::PriceRepository;

/// Multipart field carrying the archive.
const FILE_FIELD: &str = "file";

pub struct HttpState {
    pub ingest_use_case: IngestPricesUseCase,
    pub export_use_case: ExportPricesUseCase,
    pub repository: Arc<dyn PriceRepository>,
    pub max_upload_bytes: usize,
}

impl HttpState {
    pub fn new(repository: Arc<dyn PriceRepository>, ingest: &IngestConfig) -> Self {
        Self {
            ingest_use_case: IngestPricesUseCase::new(Arc::clone(&repository), ingest.id_policy),
            export_use_case: ExportPricesUseCase::new(Arc::clone(&repository)),
            repository,
            max_upload_bytes: ingest.max_upload_bytes,
        }
    }
}

impl ResponseError for AppError {
    fn status_code(&self) -> StatusCode {
        if self.is_client_error() {
            StatusCode::BAD_REQUEST
        } else {
            StatusCode::INTERNAL_SERVER_ERROR
        }
    }

    fn error_response(&self) -> HttpResponse {
        HttpResponse::build(self.status_code())
            .content_type("text/plain; charset=utf-8")
            .body(self.to_string())
    }
}

#[derive(Deserialize)]
pub struct UploadQuery {
    #[serde(rename = "type")]
    pub archive_type: Option<String>,
}

#[post("/prices")]
async fn upload_prices(
    data: web::Data<HttpState>,
    query: web::Query<UploadQuery>,
    payload: Multipart,
) -> Result<HttpResponse, AppError> {
    let format = match query.archive_type.as_deref() {
        None | Some("") => ArchiveFormat::default(),
        Some(value) => value.parse::<ArchiveFormat>()?,
    };

    let archive = read_file_field(payload, data.max_upload_bytes)
        .await
        .map_err(|e| {
            warn!(error = %e, "Rejected upload");
            e
        })?;
    info!(format = %format, bytes = archive.len(), "Received price archive");

    let delta = data.ingest_use_case.execute(archive, format).await?;
    Ok(HttpResponse::Ok().json(StatsResponse::from(&delta)))
}

#[get("/prices")]
async fn download_prices(data: web::Data<HttpState>) -> Result<HttpResponse, AppError> {
    let archive = data.export_use_case.execute().await?;
    Ok(HttpResponse::Ok()
        .content_type("application/zip")
        .insert_header((header::CONTENT_DISPOSITION, "attachment; filename=data.zip"))
        .body(archive))
}

#[get("/health")]
async fn health(data: web::Data<HttpState>) -> Result<HttpResponse, AppError> {
    data.repository.ping().await?;
    Ok(HttpResponse::Ok().json(serde_json::json!({ "status": "ok" })))
}

/// Collect the `file` field, skipping any other fields.
async fn read_file_field(mut payload: Multipart, limit: usize) -> Result<Vec<u8>, AppError> {
    while let Some(mut field) = payload.try_next().await.map_err(multipart_error)? {
        if field.name() != Some(FILE_FIELD) {
            while field.try_next().await.map_err(multipart_error)?.is_some() {}
            continue;
        }

        let mut bytes = Vec::new();
        while let Some(chunk) = field.try_next().await.map_err(multipart_error)? {
            if bytes.len() + chunk.len() > limit {
                return Err(AppError::BadRequest(format!(
                    "upload exceeds {} bytes",
                    limit
                )));
            }
            bytes.extend_from_slice(&chunk);
        }
        return Ok(bytes);
    }

    Err(AppError::BadRequest(format!(
        "missing multipart field '{}'",
        FILE_FIELD
    )))
}

fn multipart_error(err: MultipartError) -> AppError {
    AppError::BadRequest(format!("Error parsing form: {}", err))
}

pub fn configure(cfg: &mut web::ServiceConfig) {
    cfg.service(health).service(
        web::scope("/api/v0")
            .service(upload_prices)
            .service(download_prices),
    );
}

pub fn start_server(state: web::Data<HttpState>, config: &ServerConfig) -> std::io::Result<Server> {
    let mut server = HttpServer::new(move || {
        let cors = Cors::permissive();

        App::new()
            .wrap(cors)
            .app_data(state.clone())
            .configure(configure)
    });

    if let Some(workers) = config.workers {
        server = server.workers(workers);
    }

    let server = server.bind((config.host.as_str(), config.port))?.run();

    info!(host = %config.host, port = config.port, "HTTP server listening");
    Ok(server)
}
