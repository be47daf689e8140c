//! Classification of non-success responses.

use reqwest::Response;
use roster_api_models::ProblemDetails;
use roster_core::CatalogError;

/// Turn a non-success response into [`CatalogError::Status`], preferring the
/// problem document's detail, then its title, then the raw body.
pub async fn classify_problem(operation: &'static str, response: Response) -> CatalogError {
    let status = response.status();
    let bytes = response.bytes().await.unwrap_or_default();

    let body_text = String::from_utf8_lossy(&bytes).trim().to_string();
    let problem = serde_json::from_slice::<ProblemDetails>(&bytes).ok();

    let message = problem
        .as_ref()
        .and_then(|p| p.detail.clone())
        .or_else(|| problem.as_ref().map(|p| p.title.clone()))
        .unwrap_or_else(|| {
            if body_text.is_empty() {
                format!("request failed with status {status}")
            } else {
                body_text
            }
        });

    CatalogError::Status {
        operation,
        status: status.as_u16(),
        message,
    }
}
