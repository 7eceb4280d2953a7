use crate::output::AnswerSheet;
use reqwest::StatusCode;
use tracing::info;

#[derive(Debug, thiserror::Error)]
pub enum SubmitError {
    #[error("request failed: {0}")]
    Http(#[from] reqwest::Error),
    #[error("evaluation service answered {status}: {body}")]
    Rejected { status: StatusCode, body: String },
}

#[derive(Debug, Clone)]
pub struct SubmissionReceipt {
    pub status: StatusCode,
    pub body: String,
}

/// POSTs the answer sheet as JSON and returns the service's reply.
pub async fn submit_answers(
    client: &reqwest::Client,
    url: &str,
    sheet: &AnswerSheet,
) -> Result<SubmissionReceipt, SubmitError> {
    info!(
        "Submitting {} predictions to {}",
        sheet.predictions.len(),
        url
    );

    let response = client
        .post(url)
        .header(reqwest::header::ACCEPT, "application/json")
        .json(sheet)
        .send()
        .await?;
    let status = response.status();
    let body = response.text().await?;

    if !status.is_success() {
        return Err(SubmitError::Rejected { status, body });
    }
    info!("Submission accepted with status {}", status);
    Ok(SubmissionReceipt { status, body })
}
