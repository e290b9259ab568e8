//! WebDAV client for the remote video archive.
//!
//! Uses `PROPFIND` for listings and existence checks, `GET` for downloads
//! and `PUT` for uploads, all authenticated with HTTP basic auth.

use std::path::Path;
use std::sync::LazyLock;

use async_trait::async_trait;
use lswb_core::config::WebDavSettings;
use lswb_core::paths::{file_name, normalize_remote_path};
use percent_encoding::{percent_decode_str, utf8_percent_encode, AsciiSet, NON_ALPHANUMERIC};
use regex::Regex;
use reqwest::{Method, StatusCode};
use tokio::io::AsyncWriteExt;

use crate::error::RemoteError;
use crate::fs::{RemoteEntry, RemoteFileSystem};

/// Characters escaped inside a single path segment.
const SEGMENT: &AsciiSet = &NON_ALPHANUMERIC
    .remove(b'-')
    .remove(b'_')
    .remove(b'.')
    .remove(b'~');

/// Minimal `PROPFIND` body asking only for the resource type.
const PROPFIND_BODY: &str = r#"<?xml version="1.0" encoding="utf-8"?>
<d:propfind xmlns:d="DAV:"><d:prop><d:resourcetype/></d:prop></d:propfind>"#;

static RESPONSE_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?s)<(?:[A-Za-z0-9_-]+:)?response\b[^>]*>(.*?)</(?:[A-Za-z0-9_-]+:)?response>")
        .expect("valid regex")
});
static HREF_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?s)<(?:[A-Za-z0-9_-]+:)?href\b[^>]*>(.*?)</(?:[A-Za-z0-9_-]+:)?href>")
        .expect("valid regex")
});
static COLLECTION_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"<(?:[A-Za-z0-9_-]+:)?collection\b").expect("valid regex"));

/// One `<response>` of a multistatus body.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DavResource {
    /// Decoded path component of the href.
    pub href_path: String,
    pub is_collection: bool,
}

/// HTTP client for a single WebDAV server.
pub struct WebDavClient {
    client: reqwest::Client,
    base_url: String,
    /// Path prefix of `base_url`, stripped from returned hrefs.
    base_path: String,
    login: String,
    password: String,
}

impl WebDavClient {
    pub fn new(settings: &WebDavSettings) -> Result<Self, RemoteError> {
        Self::with_client(reqwest::Client::new(), settings)
    }

    /// Create a client reusing an existing [`reqwest::Client`].
    pub fn with_client(client: reqwest::Client, settings: &WebDavSettings) -> Result<Self, RemoteError> {
        let parsed = url::Url::parse(&settings.host)
            .map_err(|e| RemoteError::Protocol(format!("invalid WebDAV host '{}': {e}", settings.host)))?;
        let base_path = percent_decode_str(parsed.path())
            .decode_utf8_lossy()
            .trim_end_matches('/')
            .to_string();

        Ok(Self {
            client,
            base_url: settings.host.trim_end_matches('/').to_string(),
            base_path,
            login: settings.login.clone(),
            password: settings.password.clone(),
        })
    }

    /// Full URL of a remote path with each segment percent-encoded.
    pub fn url_for(&self, path: &str) -> String {
        let normalized = normalize_remote_path(path);
        let mut url = self.base_url.clone();
        for segment in normalized.split('/').filter(|s| !s.is_empty()) {
            url.push('/');
            url.extend(utf8_percent_encode(segment, SEGMENT));
        }
        if normalized.ends_with('/') || url == self.base_url {
            url.push('/');
        }
        url
    }

    fn request(&self, method: Method, path: &str) -> reqwest::RequestBuilder {
        let builder = self.client.request(method, self.url_for(path));
        if self.login.is_empty() {
            builder
        } else {
            builder.basic_auth(&self.login, Some(&self.password))
        }
    }

    async fn propfind(&self, path: &str, depth: &str) -> Result<Option<Vec<DavResource>>, RemoteError> {
        let method = Method::from_bytes(b"PROPFIND")
            .map_err(|e| RemoteError::Protocol(e.to_string()))?;
        let response = self
            .request(method, path)
            .header("Depth", depth)
            .header(reqwest::header::CONTENT_TYPE, "application/xml")
            .body(PROPFIND_BODY)
            .send()
            .await?;

        if response.status() == StatusCode::NOT_FOUND {
            return Ok(None);
        }
        let response = Self::ensure_success(response, path).await?;
        let body = response.text().await?;
        Ok(Some(parse_multistatus(&body)))
    }

    /// Remote path of an href returned by the server.
    fn remote_path_of(&self, href_path: &str) -> String {
        let relative = href_path
            .strip_prefix(self.base_path.as_str())
            .filter(|_| !self.base_path.is_empty())
            .unwrap_or(href_path);
        normalize_remote_path(&format!("/{relative}"))
    }

    // ---- private helpers ----

    async fn ensure_success(
        response: reqwest::Response,
        path: &str,
    ) -> Result<reqwest::Response, RemoteError> {
        let status = response.status();
        if status == StatusCode::NOT_FOUND {
            return Err(RemoteError::NotFound(path.to_string()));
        }
        if !status.is_success() {
            let body = response
                .text()
                .await
                .unwrap_or_else(|_| "<unreadable body>".to_string());
            return Err(RemoteError::Status {
                status: status.as_u16(),
                path: path.to_string(),
                body,
            });
        }
        Ok(response)
    }
}

#[async_trait]
impl RemoteFileSystem for WebDavClient {
    async fn list(&self, path: &str) -> Result<Vec<RemoteEntry>, RemoteError> {
        let resources = self
            .propfind(path, "1")
            .await?
            .ok_or_else(|| RemoteError::NotFound(path.to_string()))?;

        let own = normalize_remote_path(&format!("/{path}"));
        let own = own.trim_end_matches('/');

        Ok(resources
            .into_iter()
            .filter_map(|resource| {
                let remote = self.remote_path_of(&resource.href_path);
                let trimmed = remote.trim_end_matches('/');
                if trimmed == own || trimmed.is_empty() {
                    return None;
                }
                Some(RemoteEntry {
                    name: file_name(trimmed).to_string(),
                    path: trimmed.to_string(),
                    is_dir: resource.is_collection,
                })
            })
            .collect())
    }

    async fn is_dir(&self, path: &str) -> Result<bool, RemoteError> {
        Ok(self
            .propfind(path, "0")
            .await?
            .and_then(|resources| resources.into_iter().next())
            .is_some_and(|r| r.is_collection))
    }

    async fn exists(&self, path: &str) -> Result<bool, RemoteError> {
        Ok(self.propfind(path, "0").await?.is_some())
    }

    async fn read(&self, path: &str) -> Result<Vec<u8>, RemoteError> {
        let response = self.request(Method::GET, path).send().await?;
        let response = Self::ensure_success(response, path).await?;
        Ok(response.bytes().await?.to_vec())
    }

    async fn download(&self, remote: &str, local: &Path) -> Result<u64, RemoteError> {
        let response = self.request(Method::GET, remote).send().await?;
        let mut response = Self::ensure_success(response, remote).await?;

        if let Some(parent) = local.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        let mut file = tokio::fs::File::create(local).await?;
        let mut written = 0u64;
        while let Some(chunk) = response.chunk().await? {
            file.write_all(&chunk).await?;
            written += chunk.len() as u64;
        }
        file.flush().await?;

        tracing::debug!(remote, local = %local.display(), bytes = written, "Downloaded remote file");
        Ok(written)
    }

    async fn upload(&self, local: &Path, remote: &str) -> Result<(), RemoteError> {
        let body = tokio::fs::read(local).await?;
        let response = self.request(Method::PUT, remote).body(body).send().await?;
        Self::ensure_success(response, remote).await?;
        Ok(())
    }
}

/// Extract resources from a `207 Multi-Status` body.
pub fn parse_multistatus(body: &str) -> Vec<DavResource> {
    RESPONSE_RE
        .captures_iter(body)
        .filter_map(|caps| {
            let inner = caps.get(1)?.as_str();
            let href = HREF_RE.captures(inner)?.get(1)?.as_str().trim();
            let href = unescape_xml(href);
            let path = match url::Url::parse(&href) {
                Ok(absolute) => absolute.path().to_string(),
                Err(_) => href,
            };
            Some(DavResource {
                href_path: percent_decode_str(&path).decode_utf8_lossy().into_owned(),
                is_collection: COLLECTION_RE.is_match(inner),
            })
        })
        .collect()
}

fn unescape_xml(text: &str) -> String {
    text.replace("&lt;", "<")
        .replace("&gt;", ">")
        .replace("&quot;", "\"")
        .replace("&apos;", "'")
        .replace("&amp;", "&")
}

#[cfg(test)]
mod tests {
    use super::*;

    fn client(host: &str) -> WebDavClient {
        WebDavClient::new(&WebDavSettings {
            host: host.to_string(),
            login: "user".into(),
            password: "secret".into(),
        })
        .unwrap()
    }

    const LISTING: &str = r#"<?xml version="1.0" encoding="utf-8"?>
<d:multistatus xmlns:d="DAV:">
  <d:response>
    <d:href>/remote.php/webdav/Tracker/videos/</d:href>
    <d:propstat><d:prop><d:resourcetype><d:collection/></d:resourcetype></d:prop></d:propstat>
  </d:response>
  <d:response>
    <d:href>/remote.php/webdav/Tracker/videos/R7/</d:href>
    <d:propstat><d:prop><d:resourcetype><d:collection/></d:resourcetype></d:prop></d:propstat>
  </d:response>
  <d:response>
    <d:href>https://dav.example.com/remote.php/webdav/Tracker/videos/R7_2024.1.2%201.2.3-4.5.6.mp4</d:href>
    <d:propstat><d:prop><d:resourcetype/></d:prop></d:propstat>
  </d:response>
</d:multistatus>"#;

    #[test]
    fn parses_multistatus_entries() {
        let resources = parse_multistatus(LISTING);
        assert_eq!(resources.len(), 3);
        assert!(resources[1].is_collection);
        assert_eq!(
            resources[2].href_path,
            "/remote.php/webdav/Tracker/videos/R7_2024.1.2 1.2.3-4.5.6.mp4"
        );
        assert!(!resources[2].is_collection);
    }

    #[test]
    fn strips_base_path_from_hrefs() {
        let c = client("https://dav.example.com/remote.php/webdav/");
        assert_eq!(
            c.remote_path_of("/remote.php/webdav/Tracker/videos/R7/"),
            "/Tracker/videos/R7/"
        );
    }

    #[test]
    fn encodes_each_segment() {
        let c = client("https://dav.example.com/dav");
        assert_eq!(
            c.url_for("/Tracker//Видео выгрузок/a b.mp4"),
            "https://dav.example.com/dav/Tracker/%D0%92%D0%B8%D0%B4%D0%B5%D0%BE%20%D0%B2%D1%8B%D0%B3%D1%80%D1%83%D0%B7%D0%BE%D0%BA/a%20b.mp4"
        );
        assert_eq!(c.url_for("/"), "https://dav.example.com/dav/");
        assert_eq!(c.url_for("/dir/"), "https://dav.example.com/dav/dir/");
    }

    #[test]
    fn unescapes_entities() {
        assert_eq!(unescape_xml("a&amp;b&lt;c"), "a&b<c");
        assert_eq!(unescape_xml("&amp;lt;"), "&lt;");
    }

    #[test]
    fn href_entities_are_decoded_before_percent_decoding() {
        let body = r#"<d:multistatus xmlns:d="DAV:"><d:response>
            <d:href>/dav/Tracker/R&amp;D%20clips/it&apos;s.mp4</d:href>
            <d:propstat><d:prop><d:resourcetype/></d:prop></d:propstat>
        </d:response></d:multistatus>"#;
        let resources = parse_multistatus(body);
        assert_eq!(resources[0].href_path, "/dav/Tracker/R&D clips/it's.mp4");

        let c = client("https://dav.example.com/dav");
        assert_eq!(c.remote_path_of(&resources[0].href_path), "/Tracker/R&D clips/it's.mp4");
    }

    #[test]
    fn rejects_invalid_host() {
        let result = WebDavClient::new(&WebDavSettings {
            host: "not a url".into(),
            login: String::new(),
            password: String::new(),
        });
        assert!(matches!(result, Err(RemoteError::Protocol(_))));
    }
}
