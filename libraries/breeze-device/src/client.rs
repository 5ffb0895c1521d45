//! Device client: directory scanning over the card's HTTP interface.

use crate::error::{DeviceError, Result};
use crate::listing::{parse_day_bucket, parse_listing};
use breeze_core::{DateBucket, RemoteEntry};
use reqwest::Client;
use std::collections::VecDeque;
use std::time::Duration;
use tracing::{debug, info, warn};
use url::Url;

/// Directory nesting is shallow on real cards (root / DATALOG / day folder);
/// anything deeper is a firmware quirk we refuse to chase.
const MAX_SCAN_DEPTH: usize = 8;

/// Client for the wireless SD card's HTTP interface.
///
/// The card exposes an unauthenticated directory listing per folder and a
/// download endpoint per file. Both are served over a flaky wireless link, so
/// callers retry downloads (see [`crate::Downloader`]); the scan itself is not
/// retried — a failed scan fails the pass.
pub struct DeviceClient {
    http: Client,
    base_url: Url,
}

impl DeviceClient {
    /// Create a client for the given listing URL.
    pub fn new(base_url: &str) -> Result<Self> {
        if !base_url.starts_with("http://") && !base_url.starts_with("https://") {
            return Err(DeviceError::InvalidUrl(
                "URL must start with http:// or https://".into(),
            ));
        }

        let base_url = Url::parse(base_url).map_err(|e| DeviceError::InvalidUrl(e.to_string()))?;

        let http = Client::builder()
            .timeout(Duration::from_secs(30))
            .connect_timeout(Duration::from_secs(10))
            .user_agent(format!("Breeze/{}", env!("CARGO_PKG_VERSION")))
            .build()?;

        Ok(Self { http, base_url })
    }

    /// The configured listing URL.
    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    /// A handle to the underlying HTTP client, shared with the downloader.
    pub fn http(&self) -> Client {
        self.http.clone()
    }

    /// Scan the card into a flat list of file entries.
    ///
    /// Walks the directory tree breadth-first, one listing page at a time,
    /// tagging every file with the day bucket of its innermost eight-digit
    /// ancestor folder. Files outside any day folder carry
    /// [`DateBucket::Root`].
    ///
    /// # Errors
    ///
    /// Fails on connection errors and on pages that are not directory
    /// listings; either aborts the scan, since no trustworthy file set exists
    /// to act on.
    pub async fn scan(&self) -> Result<Vec<RemoteEntry>> {
        let mut entries = Vec::new();
        let mut pending: VecDeque<(Url, String, DateBucket, usize)> = VecDeque::new();
        pending.push_back((self.base_url.clone(), String::new(), DateBucket::Root, 0));

        while let Some((page_url, prefix, bucket, depth)) = pending.pop_front() {
            debug!(url = %page_url, depth, "Fetching directory listing");
            let rows = self.fetch_listing(&page_url).await?;

            for row in rows {
                if row.is_directory {
                    if depth >= MAX_SCAN_DEPTH {
                        warn!(
                            name = %row.name,
                            depth,
                            "Directory nesting too deep, skipping"
                        );
                        continue;
                    }
                    let child_url = page_url.join(&row.href).map_err(|e| {
                        DeviceError::Listing {
                            url: page_url.to_string(),
                            reason: format!("unresolvable directory link {}: {}", row.href, e),
                        }
                    })?;
                    let child_bucket = parse_day_bucket(&row.name).unwrap_or(bucket);
                    let child_prefix = format!("{}{}/", prefix, row.name);
                    pending.push_back((child_url, child_prefix, child_bucket, depth + 1));
                } else {
                    let file_url =
                        page_url
                            .join(&row.href)
                            .map_err(|e| DeviceError::Listing {
                                url: page_url.to_string(),
                                reason: format!("unresolvable file link {}: {}", row.href, e),
                            })?;
                    // Older device generations encode the day in the file
                    // name instead of a folder level.
                    let file_bucket = std::path::Path::new(&row.name)
                        .file_stem()
                        .and_then(|s| s.to_str())
                        .and_then(parse_day_bucket)
                        .unwrap_or(bucket);
                    entries.push(RemoteEntry {
                        path: format!("{}{}", prefix, row.name),
                        url: file_url.to_string(),
                        name: row.name,
                        size: row.size,
                        modified: row.modified,
                        bucket: file_bucket,
                    });
                }
            }
        }

        info!(files = entries.len(), "Device scan complete");
        Ok(entries)
    }

    async fn fetch_listing(&self, url: &Url) -> Result<Vec<crate::listing::ListingRow>> {
        let response = self.http.get(url.clone()).send().await.map_err(|e| {
            if e.is_connect() || e.is_timeout() {
                DeviceError::Unreachable(e.to_string())
            } else {
                DeviceError::Request(e)
            }
        })?;

        let status = response.status();
        if !status.is_success() {
            return Err(DeviceError::Status {
                status: status.as_u16(),
                url: url.to_string(),
            });
        }

        let body = response.text().await?;
        parse_listing(&body).ok_or_else(|| DeviceError::Listing {
            url: url.to_string(),
            reason: "page contains no directory entries".into(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;
    use wiremock::matchers::{method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn listing(rows: &[&str]) -> String {
        format!("<html><body><pre>\n{}\n</pre></body></html>", rows.join("\n"))
    }

    async fn mount_page(server: &MockServer, page_path: &str, dir: Option<&str>, body: String) {
        let mut mock = Mock::given(method("GET")).and(path(page_path));
        if let Some(dir) = dir {
            mock = mock.and(query_param("dir", dir));
        }
        mock.respond_with(ResponseTemplate::new(200).set_body_string(body))
            .mount(server)
            .await;
    }

    #[tokio::test]
    async fn test_scan_recurses_and_tags_buckets() {
        let server = MockServer::start().await;

        mount_page(
            &server,
            "/",
            None,
            listing(&[
                r#"2024- 1- 1  12: 0: 0       <a href="dir?dir=DATALOG"> DATALOG</a>"#,
                r#"2024- 1- 1  12: 0: 0        512  <a href="download?file=STR.edf"> STR.edf</a>"#,
                r#"2023-12- 1  23:59: 0        256  <a href="download?file=20231201.edf"> 20231201.edf</a>"#,
            ]),
        )
        .await;

        mount_page(
            &server,
            "/dir",
            Some("DATALOG"),
            listing(&[
                r#"2024- 1- 1  12: 0: 0       <a href="dir?dir=20240101"> 20240101</a>"#,
                r#"2024- 1- 1  12: 0: 0       <a href="dir?dir=20241399"> 20241399</a>"#,
            ]),
        )
        .await;

        mount_page(
            &server,
            "/dir",
            Some("20240101"),
            listing(&[
                r#"2024- 1- 1  22:10: 5        128  <a href="download?file=a.edf"> a.edf</a>"#,
            ]),
        )
        .await;

        mount_page(
            &server,
            "/dir",
            Some("20241399"),
            listing(&[
                r#"2024- 1- 1  22:10: 5        128  <a href="download?file=odd.edf"> odd.edf</a>"#,
            ]),
        )
        .await;

        let client = DeviceClient::new(&server.uri()).unwrap();
        let entries = client.scan().await.unwrap();

        assert_eq!(entries.len(), 4);

        let root = entries.iter().find(|e| e.name == "STR.edf").unwrap();
        assert_eq!(root.bucket, DateBucket::Root);
        assert_eq!(root.path, "STR.edf");
        assert_eq!(root.size, 512);

        let day = entries.iter().find(|e| e.name == "a.edf").unwrap();
        assert_eq!(
            day.bucket,
            DateBucket::Day(NaiveDate::from_ymd_opt(2024, 1, 1).unwrap())
        );
        assert_eq!(day.path, "DATALOG/20240101/a.edf");

        let odd = entries.iter().find(|e| e.name == "odd.edf").unwrap();
        assert_eq!(odd.bucket, DateBucket::Unknown);

        // Day encoded in the file name rather than a folder level.
        let named = entries.iter().find(|e| e.name == "20231201.edf").unwrap();
        assert_eq!(
            named.bucket,
            DateBucket::Day(NaiveDate::from_ymd_opt(2023, 12, 1).unwrap())
        );
    }

    #[tokio::test]
    async fn test_scan_rejects_non_listing_page() {
        let server = MockServer::start().await;
        mount_page(&server, "/", None, "<html>wifi setup</html>".into()).await;

        let client = DeviceClient::new(&server.uri()).unwrap();
        let err = client.scan().await.unwrap_err();
        assert!(matches!(err, DeviceError::Listing { .. }));
    }

    #[tokio::test]
    async fn test_scan_surfaces_http_status() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/"))
            .respond_with(ResponseTemplate::new(503))
            .mount(&server)
            .await;

        let client = DeviceClient::new(&server.uri()).unwrap();
        let err = client.scan().await.unwrap_err();
        assert!(matches!(err, DeviceError::Status { status: 503, .. }));
    }

    #[test]
    fn test_new_rejects_bad_urls() {
        assert!(DeviceClient::new("ftp://192.168.4.1").is_err());
        assert!(DeviceClient::new("not a url").is_err());
        assert!(DeviceClient::new("http://192.168.4.1/dir?dir=A:").is_ok());
    }
}
