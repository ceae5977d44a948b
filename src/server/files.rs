use axum::{
    body::Body,
    http::{header, Method, Response, StatusCode, Uri},
    response::IntoResponse,
};
use std::ffi::OsStr;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

const INDEX_FILES: [&str; 2] = ["index.html", "index.htm"];

const DEFAULT_CONTENT_TYPE: &str = "application/octet-stream";

const CONTENT_TYPES: &[(&str, &str)] = &[
    ("html", "text/html"),
    ("htm", "text/html"),
    ("css", "text/css"),
    ("js", "application/javascript"),
    ("mjs", "application/javascript"),
    ("json", "application/json"),
    ("map", "application/json"),
    ("svg", "image/svg+xml"),
    ("png", "image/png"),
    ("jpg", "image/jpeg"),
    ("jpeg", "image/jpeg"),
    ("gif", "image/gif"),
    ("ico", "image/vnd.microsoft.icon"),
    ("txt", "text/plain"),
    ("md", "text/markdown"),
    ("wasm", "application/wasm"),
    ("woff", "font/woff"),
    ("woff2", "font/woff2"),
];

pub fn content_type(path: &Path) -> &'static str {
    let Some(ext) = path.extension().and_then(OsStr::to_str) else {
        return DEFAULT_CONTENT_TYPE;
    };
    let ext = ext.to_ascii_lowercase();

    CONTENT_TYPES
        .iter()
        .find(|(known, _)| *known == ext)
        .map(|(_, mime)| *mime)
        .unwrap_or(DEFAULT_CONTENT_TYPE)
}

/// Read-only view of a directory tree served over HTTP.
pub struct StaticFiles {
    root: PathBuf,
}

impl StaticFiles {
    pub fn new(root: PathBuf) -> Self {
        Self { root }
    }

    /// Maps a URL path onto the root. Segments that are empty, `.`, `..`, or
    /// that carry their own separators are dropped, so the result never
    /// leaves the root.
    pub fn translate_path(&self, request_path: &str) -> PathBuf {
        let decoded = percent_decode(request_path);
        let mut path = self.root.clone();

        for segment in decoded.split('/') {
            if Path::new(segment).file_name() == Some(OsStr::new(segment)) {
                path.push(segment);
            }
        }

        path
    }

    pub async fn respond(&self, method: &Method, uri: &Uri) -> Response<Body> {
        if method != Method::GET && method != Method::HEAD {
            return error_page(StatusCode::NOT_IMPLEMENTED, method);
        }

        let request_path = uri.path();
        let path = self.translate_path(request_path);
        let Ok(meta) = tokio::fs::metadata(&path).await else {
            debug!("No such path: {}", path.display());
            return error_page(StatusCode::NOT_FOUND, method);
        };

        if !meta.is_dir() {
            return self.send_file(&path, method).await;
        }

        if !request_path.ends_with('/') {
            let mut location = format!("{}/", request_path);
            if let Some(query) = uri.query() {
                location.push('?');
                location.push_str(query);
            }
            return build(StatusCode::MOVED_PERMANENTLY, "text/html", Vec::new(), method)
                .map(|mut response| {
                    if let Ok(value) = location.parse() {
                        response.headers_mut().insert(header::LOCATION, value);
                    }
                    response
                })
                .unwrap_or_else(|status| status.into_response());
        }

        for index in INDEX_FILES {
            let candidate = path.join(index);
            if candidate.is_file() {
                return self.send_file(&candidate, method).await;
            }
        }

        match list_directory(&path, request_path).await {
            Ok(html) => build(StatusCode::OK, "text/html; charset=utf-8", html.into_bytes(), method)
                .unwrap_or_else(|status| status.into_response()),
            Err(e) => {
                warn!("Failed to list {}: {}", path.display(), e);
                error_page(StatusCode::NOT_FOUND, method)
            }
        }
    }

    async fn send_file(&self, path: &Path, method: &Method) -> Response<Body> {
        match tokio::fs::read(path).await {
            Ok(bytes) => build(StatusCode::OK, content_type(path), bytes, method)
                .unwrap_or_else(|status| status.into_response()),
            Err(e) => {
                warn!("Failed to read {}: {}", path.display(), e);
                error_page(StatusCode::NOT_FOUND, method)
            }
        }
    }
}

fn build(
    status: StatusCode,
    content_type: &str,
    bytes: Vec<u8>,
    method: &Method,
) -> Result<Response<Body>, StatusCode> {
    let length = bytes.len();
    let body = if method == Method::HEAD {
        Body::empty()
    } else {
        Body::from(bytes)
    };

    Response::builder()
        .status(status)
        .header(header::CONTENT_TYPE, content_type)
        .header(header::CONTENT_LENGTH, length)
        .body(body)
        .map_err(|_| StatusCode::INTERNAL_SERVER_ERROR)
}

fn error_page(status: StatusCode, method: &Method) -> Response<Body> {
    let reason = status.canonical_reason().unwrap_or("Error");
    let html = format!(
        "<!DOCTYPE html>\n<html><head><title>{code} {reason}</title></head>\n\
         <body><h1>{code} {reason}</h1></body></html>\n",
        code = status.as_u16(),
    );

    build(status, "text/html; charset=utf-8", html.into_bytes(), method)
        .unwrap_or_else(|status| status.into_response())
}

async fn list_directory(dir: &Path, request_path: &str) -> std::io::Result<String> {
    let mut entries = tokio::fs::read_dir(dir).await?;
    let mut names = Vec::new();

    while let Some(entry) = entries.next_entry().await? {
        let mut name = entry.file_name().to_string_lossy().into_owned();
        if entry.file_type().await.map(|t| t.is_dir()).unwrap_or(false) {
            name.push('/');
        }
        names.push(name);
    }
    names.sort_by_key(|name| name.to_lowercase());

    let title = format!("Directory listing for {}", html_escape(&percent_decode(request_path)));
    let mut html = format!(
        "<!DOCTYPE html>\n<html>\n<head><meta charset=\"utf-8\"><title>{title}</title></head>\n\
         <body>\n<h1>{title}</h1>\n<hr>\n<ul>\n"
    );
    for name in &names {
        html.push_str(&format!(
            "<li><a href=\"{}\">{}</a></li>\n",
            html_escape(&percent_encode(name)),
            html_escape(name)
        ));
    }
    html.push_str("</ul>\n<hr>\n</body>\n</html>\n");

    Ok(html)
}

/// Decodes `%XX` escapes. Malformed escapes are kept as-is.
pub fn percent_decode(input: &str) -> String {
    let bytes = input.as_bytes();
    let mut out: Vec<u8> = Vec::with_capacity(bytes.len());
    let mut i = 0usize;

    while i < bytes.len() {
        if bytes[i] == b'%' {
            let hex = bytes
                .get(i + 1)
                .zip(bytes.get(i + 2))
                .and_then(|(hi, lo)| Some(((*hi as char).to_digit(16)?, (*lo as char).to_digit(16)?)));
            if let Some((hi, lo)) = hex {
                out.push(((hi << 4) | lo) as u8);
                i += 3;
                continue;
            }
        }
        out.push(bytes[i]);
        i += 1;
    }

    String::from_utf8_lossy(&out).into_owned()
}

fn percent_encode(input: &str) -> String {
    let mut out = String::with_capacity(input.len());
    for byte in input.bytes() {
        match byte {
            b'A'..=b'Z' | b'a'..=b'z' | b'0'..=b'9' | b'-' | b'_' | b'.' | b'~' | b'/' => {
                out.push(byte as char)
            }
            _ => out.push_str(&format!("%{:02X}", byte)),
        }
    }
    out
}

fn html_escape(input: &str) -> String {
    let mut out = String::with_capacity(input.len());
    for c in input.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#x27;"),
            _ => out.push(c),
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use std::fs;
    use tempfile::TempDir;

    async fn body_text(response: Response<Body>) -> String {
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX).await.unwrap();
        String::from_utf8(bytes.to_vec()).unwrap()
    }

    fn get(uri: &str) -> (Method, Uri) {
        (Method::GET, uri.parse().unwrap())
    }

    #[test]
    fn test_content_types() {
        assert_eq!(content_type(Path::new("graph.js")), "application/javascript");
        assert_eq!(content_type(Path::new("memory.json")), "application/json");
        assert_eq!(content_type(Path::new("INDEX.HTML")), "text/html");
        assert_eq!(content_type(Path::new("style.css")), "text/css");
        assert_eq!(content_type(Path::new("blob")), "application/octet-stream");
        assert_eq!(content_type(Path::new("archive.tar.xz")), "application/octet-stream");
    }

    #[test]
    fn test_translate_path_stays_in_root() {
        let files = StaticFiles::new(PathBuf::from("/srv"));

        assert_eq!(files.translate_path("/"), PathBuf::from("/srv"));
        assert_eq!(files.translate_path("/a/./b"), PathBuf::from("/srv/a/b"));
        assert_eq!(files.translate_path("/../../etc/passwd"), PathBuf::from("/srv/etc/passwd"));
        assert_eq!(files.translate_path("/%2e%2e/secret"), PathBuf::from("/srv/secret"));
        assert_eq!(files.translate_path("/my%20file.json"), PathBuf::from("/srv/my file.json"));
    }

    #[test]
    fn test_percent_decode() {
        assert_eq!(percent_decode("a%20b"), "a b");
        assert_eq!(percent_decode("100%"), "100%");
        assert_eq!(percent_decode("%zz"), "%zz");
        assert_eq!(percent_decode("%E2%9C%93"), "\u{2713}");
    }

    #[tokio::test]
    async fn test_serves_json_with_content_type() {
        let temp_dir = TempDir::new().unwrap();
        fs::write(temp_dir.path().join("memory.json"), "{\"type\":\"entity\"}\n").unwrap();
        let files = StaticFiles::new(temp_dir.path().to_path_buf());

        let (method, uri) = get("/memory.json");
        let response = files.respond(&method, &uri).await;

        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(response.headers()[header::CONTENT_TYPE], "application/json");
        assert_eq!(body_text(response).await, "{\"type\":\"entity\"}\n");
    }

    #[tokio::test]
    async fn test_head_has_no_body() {
        let temp_dir = TempDir::new().unwrap();
        fs::write(temp_dir.path().join("graph.js"), "let x = 1;").unwrap();
        let files = StaticFiles::new(temp_dir.path().to_path_buf());

        let response = files.respond(&Method::HEAD, &"/graph.js".parse().unwrap()).await;

        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(response.headers()[header::CONTENT_LENGTH], "10");
        assert_eq!(body_text(response).await, "");
    }

    #[tokio::test]
    async fn test_missing_file_is_404() {
        let temp_dir = TempDir::new().unwrap();
        let files = StaticFiles::new(temp_dir.path().to_path_buf());

        let (method, uri) = get("/nope.json");
        assert_eq!(files.respond(&method, &uri).await.status(), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn test_post_not_implemented() {
        let temp_dir = TempDir::new().unwrap();
        let files = StaticFiles::new(temp_dir.path().to_path_buf());

        let response = files.respond(&Method::POST, &"/".parse().unwrap()).await;
        assert_eq!(response.status(), StatusCode::NOT_IMPLEMENTED);
    }

    #[tokio::test]
    async fn test_directory_redirect_keeps_query() {
        let temp_dir = TempDir::new().unwrap();
        fs::create_dir(temp_dir.path().join("assets")).unwrap();
        let files = StaticFiles::new(temp_dir.path().to_path_buf());

        let (method, uri) = get("/assets?v=2");
        let response = files.respond(&method, &uri).await;

        assert_eq!(response.status(), StatusCode::MOVED_PERMANENTLY);
        assert_eq!(response.headers()[header::LOCATION], "/assets/?v=2");
    }

    #[tokio::test]
    async fn test_directory_index() {
        let temp_dir = TempDir::new().unwrap();
        fs::write(temp_dir.path().join("index.html"), "<h1>graph</h1>").unwrap();
        let files = StaticFiles::new(temp_dir.path().to_path_buf());

        let (method, uri) = get("/");
        let response = files.respond(&method, &uri).await;

        assert_eq!(response.headers()[header::CONTENT_TYPE], "text/html");
        assert_eq!(body_text(response).await, "<h1>graph</h1>");
    }

    #[tokio::test]
    async fn test_directory_listing() {
        let temp_dir = TempDir::new().unwrap();
        fs::write(temp_dir.path().join("b <x>.json"), "").unwrap();
        fs::write(temp_dir.path().join("a.js"), "").unwrap();
        fs::create_dir(temp_dir.path().join("lib")).unwrap();
        let files = StaticFiles::new(temp_dir.path().to_path_buf());

        let (method, uri) = get("/");
        let response = files.respond(&method, &uri).await;
        assert_eq!(response.status(), StatusCode::OK);

        let html = body_text(response).await;
        let a = html.find("a.js").unwrap();
        let b = html.find("b &lt;x&gt;.json").unwrap();
        let lib = html.find("href=\"lib/\"").unwrap();
        assert!(a < b && b < lib);
        assert!(html.contains("href=\"b%20%3Cx%3E.json\""));
    }
}
