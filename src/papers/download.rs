//! PDF download

use crate::error::{Error, Result};
use crate::parse::is_pdf;
use std::path::Path;
use tracing::debug;

/// Fetch `url` and write it to `dest` if the body is a PDF.
///
/// Returns the number of bytes written. Nothing is written when the
/// response is not a PDF.
pub async fn download_pdf(client: &reqwest::Client, url: &str, dest: &Path) -> Result<u64> {
    debug!("Downloading {} -> {:?}", url, dest);

    let response = client
        .get(url)
        .send()
        .await
        .map_err(|e| Error::Provider(format!("Download failed for {}: {}", url, e)))?;

    if !response.status().is_success() {
        return Err(Error::Provider(format!(
            "Download of {} returned {}",
            url,
            response.status()
        )));
    }

    let bytes = response.bytes().await?;
    if !is_pdf(&bytes) {
        return Err(Error::Provider(format!("{} did not return a PDF", url)));
    }

    if let Some(parent) = dest.parent() {
        tokio::fs::create_dir_all(parent).await?;
    }
    tokio::fs::write(dest, &bytes).await?;
    Ok(bytes.len() as u64)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    #[tokio::test]
    async fn test_downloads_pdf() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/paper.pdf"))
            .respond_with(ResponseTemplate::new(200).set_body_bytes(b"%PDF-1.5 body".to_vec()))
            .mount(&server)
            .await;

        let tmp = TempDir::new().unwrap();
        let dest = tmp.path().join("s1").join("paper.pdf");
        let n = download_pdf(&reqwest::Client::new(), &format!("{}/paper.pdf", server.uri()), &dest)
            .await
            .unwrap();

        assert_eq!(n, 13);
        assert!(dest.exists());
    }

    #[tokio::test]
    async fn test_rejects_html_landing_page() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(200).set_body_string("<html>captcha</html>"))
            .mount(&server)
            .await;

        let tmp = TempDir::new().unwrap();
        let dest = tmp.path().join("paper.pdf");
        let result = download_pdf(&reqwest::Client::new(), &server.uri(), &dest).await;

        assert!(result.is_err());
        assert!(!dest.exists());
    }
}
