//! PDF question-answering endpoint

use axum::{
    extract::{Multipart, State},
    Json,
};
use bytes::Bytes;

use crate::error::{Error, Result};
use crate::server::state::AppState;
use crate::types::{ProcessResponse, Question};

/// Fields of a `process-and-query` upload
struct ProcessForm {
    filename: String,
    data: Bytes,
    questions: Vec<String>,
}

async fn read_form(multipart: &mut Multipart) -> Result<ProcessForm> {
    let mut file: Option<(String, Bytes)> = None;
    let mut questions = Vec::new();

    while let Some(field) = multipart.next_field().await.map_err(|e| {
        Error::InvalidRequest(format!("Failed to read multipart field: {}", e))
    })? {
        match field.name().unwrap_or("") {
            "file" => {
                let filename = field
                    .file_name()
                    .map(|s| s.to_string())
                    .unwrap_or_else(|| "upload.pdf".to_string());
                let data = field.bytes().await.map_err(|e| {
                    Error::InvalidRequest(format!("Failed to read file: {}", e))
                })?;
                file = Some((filename, data));
            }
            "questions" => {
                let text = field.text().await.map_err(|e| {
                    Error::InvalidRequest(format!("Failed to read question: {}", e))
                })?;
                questions.push(text);
            }
            other => {
                tracing::debug!("Ignoring multipart field {:?}", other);
            }
        }
    }

    let (filename, data) =
        file.ok_or_else(|| Error::InvalidRequest("field required: file".to_string()))?;

    Ok(ProcessForm {
        filename,
        data,
        questions,
    })
}

/// POST /process-and-query/ - Answer questions about an uploaded PDF
pub async fn process_and_query(
    State(state): State<AppState>,
    mut multipart: Multipart,
) -> Result<Json<ProcessResponse>> {
    let form = read_form(&mut multipart).await.inspect_err(|e| {
        tracing::warn!("Rejected process-and-query request: {}", e);
    })?;

    tracing::info!(
        "Processing {} ({} bytes) with {} questions",
        form.filename,
        form.data.len(),
        form.questions.len()
    );

    let questions = Question::numbered(form.questions);
    let response = state
        .orchestrator()
        .process(&form.filename, form.data, questions)
        .await?;

    Ok(Json(response))
}
