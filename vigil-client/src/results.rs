//! Result upload endpoint

use crate::BackendClient;
use crate::error::{ClientError, Result};
use reqwest::multipart::{Form, Part};
use std::path::Path;
use vigil_core::dto::result::ResultUpload;

impl BackendClient {
    /// Upload one finished test result
    ///
    /// Sends `POST {base_url}/api/results` as `multipart/form-data` with the
    /// text fields `test_id`, `status`, `logs` and `duration` (seconds), plus
    /// the `video` and `screenshot` files when they exist on disk. Artifact
    /// files are read fully before the request is built, so no file handle is
    /// held while the upload is in flight.
    pub async fn upload_result(&self, upload: &ResultUpload) -> Result<()> {
        let url = format!("{}/api/results", self.base_url);

        let mut form = Form::new()
            .text("test_id", upload.test_id.clone())
            .text("status", upload.status.as_str())
            .text("logs", upload.logs.clone())
            .text("duration", upload.duration.to_string());

        if let Some(part) = file_part(upload.video.as_deref(), "video/mp4").await? {
            form = form.part("video", part);
        }
        if let Some(part) = file_part(upload.screenshot.as_deref(), "image/png").await? {
            form = form.part("screenshot", part);
        }

        let response = self.client.post(&url).multipart(form).send().await?;
        self.handle_empty_response(response).await
    }
}

async fn file_part(path: Option<&Path>, mime: &str) -> Result<Option<Part>> {
    let Some(path) = path else {
        return Ok(None);
    };

    let bytes = match tokio::fs::read(path).await {
        Ok(bytes) => bytes,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            tracing::warn!(path = %path.display(), "Artifact missing, uploading without it");
            return Ok(None);
        }
        Err(e) => return Err(ClientError::Io(e)),
    };

    let file_name = path
        .file_name()
        .map(|n| n.to_string_lossy().to_string())
        .unwrap_or_else(|| "artifact".to_string());

    Ok(Some(Part::bytes(bytes).file_name(file_name).mime_str(mime)?))
}

#[cfg(test)]
mod tests {
    use super::*;
    use vigil_core::domain::outcome::ReportStatus;
    use wiremock::matchers::{body_string_contains, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn upload(video: Option<&Path>, screenshot: Option<&Path>) -> ResultUpload {
        ResultUpload {
            test_id: "t2".to_string(),
            status: ReportStatus::Failed,
            logs: "12:00:00.000 [INFO] opened page\nReason: expected heading".to_string(),
            duration: 3.25,
            video: video.map(Path::to_path_buf),
            screenshot: screenshot.map(Path::to_path_buf),
        }
    }

    #[tokio::test]
    async fn test_upload_sends_fields_and_files() {
        let mock_server = MockServer::start().await;
        let dir = tempfile::tempdir().unwrap();
        let video = dir.path().join("t2.mp4");
        let screenshot = dir.path().join("t2_failure.png");
        std::fs::write(&video, "video bytes").unwrap();
        std::fs::write(&screenshot, "png bytes").unwrap();

        Mock::given(method("POST"))
            .and(path("/api/results"))
            .and(body_string_contains("name=\"test_id\""))
            .and(body_string_contains("failed"))
            .and(body_string_contains("name=\"video\"; filename=\"t2.mp4\""))
            .and(body_string_contains(
                "name=\"screenshot\"; filename=\"t2_failure.png\"",
            ))
            .respond_with(ResponseTemplate::new(200))
            .expect(1)
            .mount(&mock_server)
            .await;

        let client = BackendClient::new(mock_server.uri());
        client
            .upload_result(&upload(Some(&video), Some(&screenshot)))
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn test_upload_skips_missing_files() {
        let mock_server = MockServer::start().await;
        let dir = tempfile::tempdir().unwrap();

        Mock::given(method("POST"))
            .and(path("/api/results"))
            .and(body_string_contains("name=\"duration\""))
            .respond_with(ResponseTemplate::new(201))
            .expect(1)
            .mount(&mock_server)
            .await;

        let client = BackendClient::new(mock_server.uri());
        let missing = dir.path().join("gone.mp4");
        client.upload_result(&upload(Some(&missing), None)).await.unwrap();

        let requests = mock_server.received_requests().await.unwrap();
        let body = String::from_utf8_lossy(&requests[0].body);
        assert!(!body.contains("name=\"video\""));
        assert!(!body.contains("name=\"screenshot\""));
    }

    #[tokio::test]
    async fn test_upload_server_error() {
        let mock_server = MockServer::start().await;

        Mock::given(method("POST"))
            .and(path("/api/results"))
            .respond_with(ResponseTemplate::new(503).set_body_string("maintenance"))
            .mount(&mock_server)
            .await;

        let client = BackendClient::new(mock_server.uri());
        let err = client.upload_result(&upload(None, None)).await.unwrap_err();
        assert!(err.is_server_error());
        assert!(err.to_string().contains("maintenance"));
    }
}
