use crate::config::Settings;
use crate::dashboard::{Dashboard, TableKind};
use crate::data::{RecordFilter, RecordSet};
use crate::error::AnalyticsError;
use crate::report::export_table;
use actix_web::http::{header, StatusCode};
use actix_web::{web, App, HttpResponse, HttpServer, ResponseError};
use serde::Deserialize;
use tracing::info;

const MAX_UPLOAD_BYTES: usize = 16 * 1024 * 1024;

impl ResponseError for AnalyticsError {
    fn status_code(&self) -> StatusCode {
        match self {
            AnalyticsError::UnsupportedFormat(_) => StatusCode::UNSUPPORTED_MEDIA_TYPE,
            AnalyticsError::SchemaError { .. } | AnalyticsError::InvalidRecord { .. } => {
                StatusCode::UNPROCESSABLE_ENTITY
            }
            AnalyticsError::InvalidArgument(_) | AnalyticsError::EmptyInput(_) => {
                StatusCode::BAD_REQUEST
            }
            AnalyticsError::Csv(_) | AnalyticsError::Spreadsheet(_) => {
                StatusCode::UNPROCESSABLE_ENTITY
            }
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    fn error_response(&self) -> HttpResponse {
        HttpResponse::build(self.status_code()).json(serde_json::json!({
            "error": self.kind(),
            "message": self.to_string(),
        }))
    }
}

/// Query string shared by `/analyze` and `/report`. List filters are
/// comma-separated.
#[derive(Debug, Default, Deserialize)]
pub struct UploadQuery {
    pub file_name: Option<String>,
    pub class: Option<String>,
    pub student: Option<String>,
    pub exam: Option<String>,
    pub top_n: Option<usize>,
    pub clusters: Option<usize>,
    pub targets: Option<String>,
    pub table: Option<String>,
    pub title: Option<String>,
}

fn split_list(value: &Option<String>) -> Vec<String> {
    value
        .as_deref()
        .map(|v| {
            v.split(',')
                .map(str::trim)
                .filter(|s| !s.is_empty())
                .map(str::to_string)
                .collect()
        })
        .unwrap_or_default()
}

pub fn parse_targets(raw: &str) -> Result<Vec<f64>, AnalyticsError> {
    raw.split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(|s| {
            s.parse::<f64>()
                .map_err(|_| AnalyticsError::InvalidArgument(format!("target {:?} is not a number", s)))
        })
        .collect()
}

impl UploadQuery {
    fn filter(&self) -> RecordFilter {
        RecordFilter {
            classes: split_list(&self.class),
            students: split_list(&self.student),
            exams: split_list(&self.exam),
        }
    }

    fn settings(&self, base: &Settings) -> Result<Settings, AnalyticsError> {
        let mut settings = base.clone();
        if let Some(n) = self.top_n {
            settings.top_n = n;
        }
        if let Some(k) = self.clusters {
            settings.clusters = k;
        }
        if let Some(raw) = &self.targets {
            settings.targets = parse_targets(raw)?;
        }
        settings.validate()?;
        Ok(settings)
    }

    fn load(&self, body: &[u8]) -> Result<RecordSet, AnalyticsError> {
        let file_name = self.file_name.as_deref().unwrap_or("upload.csv");
        let set = RecordSet::from_bytes(body, file_name)?;
        info!(file_name, records = set.len(), "parsed upload");
        Ok(set.filter(&self.filter()))
    }
}

async fn analyze(
    body: web::Bytes,
    query: web::Query<UploadQuery>,
    settings: web::Data<Settings>,
) -> Result<HttpResponse, AnalyticsError> {
    let settings = query.settings(&settings)?;
    let set = query.load(&body)?;
    let dashboard = Dashboard::run(&set, &settings);
    Ok(HttpResponse::Ok().json(dashboard))
}

async fn report(
    body: web::Bytes,
    query: web::Query<UploadQuery>,
    settings: web::Data<Settings>,
) -> Result<HttpResponse, AnalyticsError> {
    let settings = query.settings(&settings)?;
    let set = query.load(&body)?;
    let kind: TableKind = query.table.as_deref().unwrap_or("records").parse()?;
    let table = kind.build(&set, &settings)?;
    let title = query
        .title
        .clone()
        .unwrap_or_else(|| settings.report_title.clone());

    let bytes = tokio::task::spawn_blocking(move || export_table(&table, &title))
        .await
        .map_err(|e| AnalyticsError::Render(e.to_string()))??;
    info!(?kind, bytes = bytes.len(), "serving pdf report");

    Ok(HttpResponse::Ok()
        .content_type("application/pdf")
        .insert_header((
            header::CONTENT_DISPOSITION,
            format!("attachment; filename=\"{}\"", settings.report_file),
        ))
        .body(bytes))
}

async fn health_check() -> HttpResponse {
    HttpResponse::Ok().body("Student Performance Dashboard API is running!")
}

pub fn configure(cfg: &mut web::ServiceConfig) {
    cfg.app_data(web::PayloadConfig::new(MAX_UPLOAD_BYTES))
        .route("/health", web::get().to(health_check))
        .route("/analyze", web::post().to(analyze))
        .route("/report", web::post().to(report));
}

pub async fn start_api(settings: Settings, host: &str, port: u16) -> std::io::Result<()> {
    let settings = web::Data::new(settings);
    info!(host, port, "starting dashboard api");

    HttpServer::new(move || {
        App::new()
            .app_data(settings.clone())
            .configure(configure)
    })
    .bind((host, port))?
    .run()
    .await
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_codes_follow_error_kind() {
        assert_eq!(
            AnalyticsError::UnsupportedFormat("txt".into()).status_code(),
            StatusCode::UNSUPPORTED_MEDIA_TYPE
        );
        assert_eq!(
            AnalyticsError::SchemaError { missing: vec!["Marks".into()] }.status_code(),
            StatusCode::UNPROCESSABLE_ENTITY
        );
        assert_eq!(
            AnalyticsError::EmptyInput("none".into()).status_code(),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            AnalyticsError::Render("broken".into()).status_code(),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }

    #[test]
    fn query_overrides_settings_and_builds_filter() {
        let query = UploadQuery {
            class: Some("10A, 10B".to_string()),
            exam: Some(String::new()),
            top_n: Some(2),
            targets: Some("50,70".to_string()),
            ..Default::default()
        };
        let settings = query.settings(&Settings::default()).unwrap();
        assert_eq!(settings.top_n, 2);
        assert_eq!(settings.targets, vec![50.0, 70.0]);
        let filter = query.filter();
        assert_eq!(filter.classes, vec!["10A", "10B"]);
        assert!(filter.exams.is_empty());
    }

    #[test]
    fn bad_targets_are_invalid_arguments() {
        assert!(matches!(parse_targets("60,high"), Err(AnalyticsError::InvalidArgument(_))));
        let query = UploadQuery { targets: Some(",".to_string()), ..Default::default() };
        assert!(query.settings(&Settings::default()).is_err());
    }
}
