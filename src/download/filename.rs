//! Filename handling for saved downloads.
//!
//! Blob saves use the caller's target name. Saves that rely on the server
//! (native fallback, new browsing contexts) take the name from
//! `Content-Disposition`, then the URL path, then a timestamp.

use std::io;
use std::path::{Component, Path, PathBuf};

use reqwest::header::{CONTENT_DISPOSITION, CONTENT_TYPE, HeaderMap};
use tokio::fs::{File, OpenOptions};
use tracing::debug;
use url::Url;

use super::constants::DEFAULT_FILE_NAME;

/// Name the server would have the host use for this response.
pub(crate) fn server_file_name(headers: &HeaderMap, url: &Url) -> String {
    if let Some(name) = headers
        .get(CONTENT_DISPOSITION)
        .and_then(|value| value.to_str().ok())
        .and_then(parse_content_disposition)
    {
        return sanitize_filename(&name);
    }

    if let Some(name) = file_name_from_url(url) {
        return name;
    }

    let extension = headers
        .get(CONTENT_TYPE)
        .and_then(|value| value.to_str().ok())
        .map_or(".bin", extension_from_content_type);
    format!("{DEFAULT_FILE_NAME}_{}{extension}", unix_timestamp())
}

/// Last non-empty URL path segment, percent-decoded and sanitized.
pub(crate) fn file_name_from_url(url: &Url) -> Option<String> {
    let last = url.path_segments()?.next_back()?;
    if last.is_empty() {
        return None;
    }
    let decoded = urlencoding::decode(last).unwrap_or_else(|e| {
        debug!(segment = %last, error = %e, "URL decoding failed, using raw segment");
        last.into()
    });
    Some(sanitize_filename(&decoded))
}

/// Guesses a file extension from a Content-Type header value.
pub(crate) fn extension_from_content_type(content_type: &str) -> &'static str {
    let mime = content_type
        .split(';')
        .next()
        .unwrap_or("")
        .trim()
        .to_lowercase();

    match mime.as_str() {
        "application/pdf" => ".pdf",
        "application/zip" => ".zip",
        "application/gzip" => ".gz",
        "application/msword" => ".doc",
        "application/vnd.openxmlformats-officedocument.wordprocessingml.document" => ".docx",
        "application/vnd.openxmlformats-officedocument.presentationml.presentation" => ".pptx",
        "application/vnd.openxmlformats-officedocument.spreadsheetml.sheet" => ".xlsx",
        "application/json" => ".json",
        "text/plain" => ".txt",
        "text/csv" => ".csv",
        "text/html" => ".html",
        "image/jpeg" => ".jpg",
        "image/png" => ".png",
        "image/webp" => ".webp",
        "video/mp4" => ".mp4",
        "audio/mpeg" => ".mp3",
        _ => ".bin",
    }
}

/// Parses a Content-Disposition header value for its filename.
///
/// Accepts `filename="a.pdf"`, `filename=a.pdf` and the RFC 5987
/// `filename*=UTF-8''a.pdf` form, preferring the latter.
pub(crate) fn parse_content_disposition(header: &str) -> Option<String> {
    if let Some(pos) = header.find("filename*=") {
        let value = header[pos + 10..].trim();
        if let Some(quote_pos) = value.find("''") {
            let encoded = &value[quote_pos + 2..];
            let end = encoded.find(';').unwrap_or(encoded.len());
            if let Ok(decoded) = urlencoding::decode(encoded[..end].trim()) {
                return Some(decoded.into_owned());
            }
        }
    }

    if let Some(pos) = header.find("filename=") {
        let value = header[pos + 9..].trim();
        if let Some(stripped) = value.strip_prefix('"') {
            if let Some(end) = stripped.find('"') {
                return Some(stripped[..end].to_string());
            }
        } else {
            let end = value.find(';').unwrap_or(value.len());
            let name = value[..end].trim();
            if !name.is_empty() {
                return Some(name.to_string());
            }
        }
    }

    None
}

/// Replaces characters that are invalid on common filesystems.
pub(crate) fn sanitize_filename(name: &str) -> String {
    let sanitized: String = name
        .chars()
        .map(|c| match c {
            '/' | '\\' | ':' | '*' | '?' | '"' | '<' | '>' | '|' => '_',
            c if c.is_control() => '_',
            c => c,
        })
        .collect();

    if sanitized.trim().is_empty() {
        return DEFAULT_FILE_NAME.to_string();
    }

    if is_safe_filename_segment(&sanitized) {
        sanitized
    } else {
        sanitized.replace('.', "_")
    }
}

/// Creates a new file under `dir`: `a.pdf`, `a_1.pdf`, ...
///
/// Each candidate is opened with `create_new`, so two saves racing for the
/// same name end up in different files and nothing is overwritten.
pub(crate) async fn create_unique_file(dir: &Path, filename: &str) -> io::Result<(PathBuf, File)> {
    let filename = sanitize_filename(filename);
    let (stem, ext) = match filename.rfind('.') {
        Some(pos) if pos > 0 => (&filename[..pos], &filename[pos..]),
        _ => (filename.as_str(), ""),
    };

    for attempt in 0..1000u32 {
        let candidate = if attempt == 0 {
            dir.join(&filename)
        } else {
            dir.join(format!("{stem}_{attempt}{ext}"))
        };
        match create_new(&candidate).await {
            Ok(file) => return Ok((candidate, file)),
            Err(e) if e.kind() == io::ErrorKind::AlreadyExists => {}
            Err(e) => return Err(e),
        }
    }

    let candidate = dir.join(format!("{stem}_{}{ext}", unix_timestamp()));
    let file = create_new(&candidate).await?;
    Ok((candidate, file))
}

async fn create_new(path: &Path) -> io::Result<File> {
    OpenOptions::new()
        .write(true)
        .create_new(true)
        .open(path)
        .await
}

fn is_safe_filename_segment(name: &str) -> bool {
    !Path::new(name).components().any(|component| {
        matches!(
            component,
            Component::CurDir | Component::ParentDir | Component::RootDir | Component::Prefix(_)
        )
    })
}

fn unix_timestamp() -> u64 {
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or(0)
}
