use axum::{
    extract::{Multipart, State},
    http::{header, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use models::Settings;
use report_pipeline::TableResource;
use std::sync::Arc;
use tracing::{debug, info};

use crate::{error::ApiError, Result};

pub type SettingsState = Arc<Settings>;

/// Fields of the upload form as they arrive.
#[derive(Debug, Default)]
struct UploadForm {
    file1: Option<TableResource>,
    file2: Option<TableResource>,
    file3: Option<TableResource>,
    sheet_name: Option<String>,
    date: Option<String>,
}

/// A form with every field present.
#[derive(Debug)]
struct Upload {
    file1: TableResource,
    file2: TableResource,
    file3: TableResource,
    sheet_name: String,
    date: String,
}

fn multipart_error(err: impl std::fmt::Display) -> ApiError {
    ApiError::Multipart(err.to_string())
}

impl UploadForm {
    async fn read(mut multipart: Multipart) -> Result<Self> {
        let mut form = UploadForm::default();

        while let Some(field) = multipart.next_field().await.map_err(multipart_error)? {
            let name = field.name().unwrap_or_default().to_string();
            match name.as_str() {
                "file1" | "file2" | "file3" => {
                    let file_name = field.file_name().unwrap_or_default().to_string();
                    let bytes = field.bytes().await.map_err(multipart_error)?;
                    debug!(field = %name, file = %file_name, size = bytes.len(), "received upload");
                    let resource = Some(TableResource::new(file_name, bytes.to_vec()));
                    match name.as_str() {
                        "file1" => form.file1 = resource,
                        "file2" => form.file2 = resource,
                        _ => form.file3 = resource,
                    }
                }
                "sheet_name" => form.sheet_name = Some(field.text().await.map_err(multipart_error)?),
                "date" => form.date = Some(field.text().await.map_err(multipart_error)?),
                other => debug!(field = other, "ignoring unknown form field"),
            }
        }
        Ok(form)
    }

    /// A file without a name or a blank text field counts as missing.
    fn complete(self) -> Option<Upload> {
        let file = |f: Option<TableResource>| f.filter(|r| !r.file_name.is_empty());
        let text = |s: Option<String>| s.filter(|v| !v.trim().is_empty());
        Some(Upload {
            file1: file(self.file1)?,
            file2: file(self.file2)?,
            file3: file(self.file3)?,
            sheet_name: text(self.sheet_name)?,
            date: text(self.date)?,
        })
    }
}

/// POST /process
/// Builds the allocation report from the three uploads and returns it as a CSV download
pub async fn process_upload(
    State(settings): State<SettingsState>,
    multipart: Multipart,
) -> Result<Response> {
    let upload = UploadForm::read(multipart)
        .await?
        .complete()
        .ok_or(ApiError::MissingFields)?;
    info!(date = %upload.date, sheet = %upload.sheet_name, "processing upload");

    let task_settings = Arc::clone(&settings);
    let report = tokio::task::spawn_blocking(move || {
        report_pipeline::process(
            &upload.file1,
            &upload.file2,
            &upload.file3,
            &upload.sheet_name,
            &upload.date,
            &task_settings,
        )
    })
    .await
    .map_err(|e| ApiError::Internal(e.to_string()))??;

    let csv = report.to_csv()?;
    let disposition = format!(
        "attachment; filename=\"{}\"",
        report.file_name(&settings.report_prefix)
    );

    Ok((
        StatusCode::OK,
        [
            (header::CONTENT_TYPE, "text/csv; charset=utf-8".to_string()),
            (header::CONTENT_DISPOSITION, disposition),
        ],
        csv,
    )
        .into_response())
}

/// GET /health
/// Health check endpoint
pub async fn health_check() -> impl IntoResponse {
    Json(serde_json::json!({
        "status": "healthy",
        "service": "jainam-report-api"
    }))
}
