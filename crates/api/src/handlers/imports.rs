//! Handlers for CSV upload and import-job reads.
//!
//! Upload streams the multipart body to the staging directory while
//! enforcing the size cap incrementally, then creates the `pending` job
//! row that the worker's import runner will claim. All failure information
//! after the 202 flows through the job row and the progress stream.

use axum::extract::{Multipart, Path, State};
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::Json;
use stockpile_db::models::import_job::CreateImportJob;
use stockpile_db::repositories::ImportJobRepo;
use tokio::io::AsyncWriteExt;
use uuid::Uuid;

use crate::error::{AppError, AppResult};
use crate::response::DataResponse;
use crate::state::AppState;

// ---------------------------------------------------------------------------
// Constants
// ---------------------------------------------------------------------------

/// Upload size cap, enforced while streaming.
pub const MAX_CSV_SIZE_MB: u64 = 200;
pub const MAX_CSV_SIZE_BYTES: u64 = MAX_CSV_SIZE_MB * 1024 * 1024;

/// Transport-level body limit for the upload route. Slightly above the CSV
/// cap (multipart framing overhead) so oversized files hit the streaming
/// check and get the 400 with a clear message, not a bare 413.
pub const UPLOAD_BODY_LIMIT_BYTES: usize = (MAX_CSV_SIZE_BYTES as usize) + 1024 * 1024;

// ---------------------------------------------------------------------------
// Upload
// ---------------------------------------------------------------------------

/// POST /api/v1/products/upload
///
/// Accept a CSV upload and queue a background import job. Responds 202
/// with the pending job.
pub async fn upload_products(
    State(state): State<AppState>,
    mut multipart: Multipart,
) -> AppResult<impl IntoResponse> {
    let field = loop {
        let field = multipart
            .next_field()
            .await
            .map_err(|e| AppError::BadRequest(e.to_string()))?;
        match field {
            Some(field) if field.file_name().is_some() => break field,
            Some(_) => continue,
            None => {
                return Err(AppError::BadRequest(
                    "Multipart upload must include a file field.".into(),
                ))
            }
        }
    };

    let filename = field
        .file_name()
        .map(sanitize_filename)
        .unwrap_or_default();
    if !is_csv_filename(&filename) {
        return Err(AppError::BadRequest("Only CSV files are supported.".into()));
    }
    let content_type = field.content_type().map(str::to_string);

    tokio::fs::create_dir_all(&state.config.upload_dir)
        .await
        .map_err(|e| AppError::InternalError(format!("Failed to create upload dir: {e}")))?;

    let unique_prefix = Uuid::new_v4().simple().to_string();
    let destination = state
        .config
        .upload_dir
        .join(format!("{unique_prefix}_{filename}"));

    // Stream to disk, rejecting as soon as the running byte count passes
    // the cap rather than buffering the whole body.
    let written_bytes = match stream_to_file(field, &destination).await {
        Ok(written) => written,
        Err(e) => {
            let _ = tokio::fs::remove_file(&destination).await;
            return Err(e);
        }
    };

    if written_bytes == 0 {
        let _ = tokio::fs::remove_file(&destination).await;
        return Err(AppError::BadRequest("Uploaded file is empty.".into()));
    }

    let job = ImportJobRepo::create(
        &state.pool,
        Uuid::new_v4(),
        &CreateImportJob {
            file_path: destination.to_string_lossy().to_string(),
            original_filename: Some(filename),
            content_type,
        },
    )
    .await?;

    tracing::info!(
        job_id = %job.id,
        bytes = written_bytes,
        "CSV upload staged, import job queued",
    );

    Ok((StatusCode::ACCEPTED, Json(DataResponse { data: job })))
}

async fn stream_to_file(
    mut field: axum::extract::multipart::Field<'_>,
    destination: &std::path::Path,
) -> Result<u64, AppError> {
    let mut file = tokio::fs::File::create(destination)
        .await
        .map_err(|e| AppError::InternalError(format!("Failed to stage upload: {e}")))?;

    let mut written_bytes: u64 = 0;
    while let Some(chunk) = field
        .chunk()
        .await
        .map_err(|e| AppError::BadRequest(e.to_string()))?
    {
        written_bytes += chunk.len() as u64;
        if written_bytes > MAX_CSV_SIZE_BYTES {
            return Err(AppError::BadRequest(format!(
                "CSV exceeds maximum size of {MAX_CSV_SIZE_MB}MB."
            )));
        }
        file.write_all(&chunk)
            .await
            .map_err(|e| AppError::InternalError(format!("Failed to stage upload: {e}")))?;
    }
    file.flush()
        .await
        .map_err(|e| AppError::InternalError(format!("Failed to stage upload: {e}")))?;

    Ok(written_bytes)
}

// ---------------------------------------------------------------------------
// Job read
// ---------------------------------------------------------------------------

/// GET /api/v1/imports/{id}
pub async fn get_import_job(
    State(state): State<AppState>,
    Path(job_id): Path<Uuid>,
) -> AppResult<impl IntoResponse> {
    let job = ImportJobRepo::find_by_id(&state.pool, job_id)
        .await?
        .ok_or(AppError::NotFound("Import job"))?;
    Ok(Json(DataResponse { data: job }))
}

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

/// Keep only the basename of a client-supplied filename.
fn sanitize_filename(filename: &str) -> String {
    filename
        .rsplit(['/', '\\'])
        .next()
        .unwrap_or(filename)
        .to_string()
}

fn is_csv_filename(filename: &str) -> bool {
    filename.to_lowercase().ends_with(".csv") && filename.len() > ".csv".len()
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn csv_extension_check_is_case_insensitive() {
        assert!(is_csv_filename("products.csv"));
        assert!(is_csv_filename("PRODUCTS.CSV"));
        assert!(is_csv_filename("a.b.csv"));
    }

    #[test]
    fn non_csv_filenames_rejected() {
        assert!(!is_csv_filename("products.txt"));
        assert!(!is_csv_filename("products"));
        assert!(!is_csv_filename(".csv"));
        assert!(!is_csv_filename(""));
    }

    #[test]
    fn sanitize_strips_path_components() {
        assert_eq!(sanitize_filename("../../etc/passwd.csv"), "passwd.csv");
        assert_eq!(sanitize_filename("C:\\uploads\\products.csv"), "products.csv");
        assert_eq!(sanitize_filename("products.csv"), "products.csv");
    }
}
