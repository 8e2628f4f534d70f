//! Utility functions for file names and path manipulation

/// Whether `name` names exactly one file inside a directory
///
/// Rejects the empty string, `.`, `..`, and anything containing a path separator
/// or NUL, so joining the name onto a directory can never leave that directory.
///
/// # Examples
///
/// ```
/// use chestxray_dl::utils::is_safe_file_name;
///
/// assert!(is_safe_file_name("covid-19-pneumonia-7-PA.jpg"));
/// assert!(!is_safe_file_name("../metadata.csv"));
/// ```
pub fn is_safe_file_name(name: &str) -> bool {
    !name.is_empty()
        && name != "."
        && name != ".."
        && !name.contains(['/', '\\', '\0'])
}

/// Extract filename from HTTP response
///
/// Tries to extract the filename from Content-Disposition header,
/// falls back to the last URL path segment (percent-decoded) if not found.
/// Names that could escape the destination directory are ignored.
///
/// # Arguments
///
/// * `response` - The reqwest Response object
/// * `url` - The original URL (used as fallback)
///
/// # Returns
///
/// Returns the extracted filename (extension kept) or "download" as last resort
///
/// # Examples
///
/// ```ignore
/// let response = reqwest::get("https://example.com/images/1-s2.0.jpg").await?;
/// let filename = extract_filename_from_response(&response, response.url().as_str());
/// // Returns "1-s2.0.jpg"
/// ```
pub fn extract_filename_from_response(response: &reqwest::Response, url: &str) -> String {
    extract_filename(
        response
            .headers()
            .get(reqwest::header::CONTENT_DISPOSITION)
            .and_then(|v| v.to_str().ok()),
        url,
    )
}

fn extract_filename(content_disposition: Option<&str>, url: &str) -> String {
    if let Some(value) = content_disposition {
        // Format: attachment; filename="file.png" or filename*=UTF-8''file.png
        for part in value.split(';') {
            let part = part.trim();
            if let Some(filename) = part.strip_prefix("filename=") {
                let filename = filename.trim_matches('"');
                if is_safe_file_name(filename) {
                    return filename.to_string();
                }
            } else if let Some(filename) = part.strip_prefix("filename*=") {
                // Format is: charset'lang'encoded-filename
                if let Some(idx) = filename.rfind('\'')
                    && let Ok(decoded) = urlencoding::decode(&filename[idx + 1..])
                    && is_safe_file_name(&decoded)
                {
                    return decoded.into_owned();
                }
            }
        }
    }

    // Fall back to extracting from URL path
    if let Ok(parsed_url) = url::Url::parse(url)
        && let Some(mut segments) = parsed_url.path_segments()
        && let Some(last_segment) = segments.next_back()
        && let Ok(decoded) = urlencoding::decode(last_segment)
        && is_safe_file_name(&decoded)
    {
        return decoded.into_owned();
    }

    // Last resort fallback
    "download".to_string()
}

// unwrap/expect are acceptable in tests for concise failure-on-error assertions
#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::MockServer;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, ResponseTemplate};

    #[test]
    fn safe_file_names() {
        assert!(is_safe_file_name("a.png"));
        assert!(is_safe_file_name("nCoV-radiol.2020200269.fig1-day7.jpeg"));
        assert!(is_safe_file_name("with space.jpg"));
        assert!(is_safe_file_name("..hidden"));
    }

    #[test]
    fn unsafe_file_names() {
        for name in ["", ".", "..", "a/b.png", "/etc/passwd", "..\\x.png", "nul\0.png"] {
            assert!(!is_safe_file_name(name), "{name:?} must be rejected");
        }
    }

    /// Helper: start a mock server, register a response, make a GET request, return the response.
    async fn mock_response(
        path_str: &str,
        template: ResponseTemplate,
    ) -> (reqwest::Response, String) {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path(path_str))
            .respond_with(template)
            .mount(&server)
            .await;

        let url = format!("{}{}", server.uri(), path_str);
        let resp = reqwest::get(&url).await.unwrap();
        (resp, url)
    }

    #[tokio::test]
    async fn extract_filename_from_content_disposition_quoted() {
        let (resp, url) = mock_response(
            "/download/123",
            ResponseTemplate::new(200).insert_header(
                "Content-Disposition",
                r#"attachment; filename="metadata.csv""#,
            ),
        )
        .await;

        let name = extract_filename_from_response(&resp, &url);

        assert_eq!(name, "metadata.csv", "extension must be kept");
    }

    #[tokio::test]
    async fn extract_filename_from_rfc5987_encoded_header() {
        let (resp, url) = mock_response(
            "/download/789",
            ResponseTemplate::new(200).insert_header(
                "Content-Disposition",
                "attachment; filename*=UTF-8''chest%20film%201.png",
            ),
        )
        .await;

        let name = extract_filename_from_response(&resp, &url);

        assert_eq!(name, "chest film 1.png");
    }

    #[tokio::test]
    async fn extract_filename_falls_back_to_url_path_without_header() {
        let (resp, url) =
            mock_response("/images/auntminnie-a-2020_01_28_23_51_6665_2020_01_28_Vietnam_coronavirus.jpeg", ResponseTemplate::new(200)).await;

        let name = extract_filename_from_response(&resp, &url);

        assert_eq!(
            name,
            "auntminnie-a-2020_01_28_23_51_6665_2020_01_28_Vietnam_coronavirus.jpeg"
        );
    }

    #[test]
    fn url_segment_is_percent_decoded() {
        let name = extract_filename(None, "http://example.com/images/x%20ray.png");
        assert_eq!(name, "x ray.png");
    }

    #[test]
    fn header_traversal_falls_back_to_url() {
        let name = extract_filename(
            Some(r#"attachment; filename="../../.bashrc""#),
            "http://example.com/images/safe.png",
        );
        assert_eq!(name, "safe.png");
    }

    #[test]
    fn encoded_separator_in_url_is_rejected() {
        let name = extract_filename(None, "http://example.com/images/..%2Fescape.png");
        assert_eq!(name, "download");
    }

    #[test]
    fn falls_back_to_download_when_no_useful_url() {
        assert_eq!(extract_filename(None, "http://example.com/"), "download");
        assert_eq!(extract_filename(None, "not a url at all"), "download");
    }

    #[test]
    fn content_disposition_takes_priority_over_url() {
        let name = extract_filename(
            Some(r#"attachment; filename="real.png""#),
            "http://example.com/api/v1/blob/generic-id",
        );
        assert_eq!(name, "real.png");
    }
}
