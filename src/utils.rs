//! Utility functions for response inspection, output references and file naming

use base64::Engine as _;
use base64::engine::general_purpose::STANDARD as BASE64;
use serde_json::Value;

/// Keys inside an output object that may hold an artifact reference
const REFERENCE_KEYS: [&str; 5] = ["url", "href", "uri", "base64", "b64_json"];

/// Longest inline payload prefix kept when a reference is echoed in logs or errors
const MAX_REFERENCE_ECHO: usize = 64;

/// Mask a credential for logging, keeping the last four characters
///
/// # Examples
///
/// ```
/// use genjob::utils::redact_token;
///
/// assert_eq!(redact_token("r8_abcdef123456"), "…3456");
/// assert_eq!(redact_token("abc"), "…");
/// assert_eq!(redact_token(""), "<missing>");
/// ```
pub fn redact_token(token: &str) -> String {
    let chars: Vec<char> = token.chars().collect();
    match chars.len() {
        0 => "<missing>".to_string(),
        n if n <= 8 => "…".to_string(),
        n => format!("…{}", chars[n - 4..].iter().collect::<String>()),
    }
}

/// Shorten a string for logs and error messages
pub fn truncate(text: &str, max_chars: usize) -> String {
    if text.chars().count() <= max_chars {
        return text.to_string();
    }
    let mut out: String = text.chars().take(max_chars).collect();
    out.push('…');
    out
}

/// A reference safe to echo: URLs as-is, inline payloads truncated
pub fn describe_reference(reference: &str) -> String {
    if is_http_url(reference) {
        reference.to_string()
    } else {
        truncate(reference, MAX_REFERENCE_ECHO)
    }
}

/// Whether a reference is an http(s) URL
pub fn is_http_url(reference: &str) -> bool {
    let lower = reference.trim_start().get(..8).unwrap_or("").to_ascii_lowercase();
    lower.starts_with("http://") || lower.starts_with("https://")
}

/// Read a string (or number, rendered as a string) at a JSON pointer
pub fn pointer_string(value: &Value, pointer: &str) -> Option<String> {
    match value.pointer(pointer)? {
        Value::String(s) if !s.trim().is_empty() => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

/// Read a number (or numeric string) at a JSON pointer
pub fn pointer_f64(value: &Value, pointer: &str) -> Option<f64> {
    match value.pointer(pointer)? {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}

/// Collect artifact references from a provider's output value
///
/// Accepts a single string, an array, or an object carrying `url`/`href`/`uri`/`base64`/
/// `b64_json`, nested arbitrarily. References keep their order of appearance and duplicates
/// are dropped.
///
/// # Examples
///
/// ```
/// use genjob::utils::extract_references;
/// use serde_json::json;
///
/// let output = json!(["https://cdn.example.com/a.png", {"url": "https://cdn.example.com/b.png"}]);
/// assert_eq!(
///     extract_references(&output),
///     vec!["https://cdn.example.com/a.png", "https://cdn.example.com/b.png"]
/// );
/// ```
pub fn extract_references(value: &Value) -> Vec<String> {
    let mut out = Vec::new();
    collect_references(value, &mut out);
    out
}

fn collect_references(value: &Value, out: &mut Vec<String>) {
    match value {
        Value::String(s) => {
            let trimmed = s.trim();
            if !trimmed.is_empty() && !out.iter().any(|existing| existing == trimmed) {
                out.push(trimmed.to_string());
            }
        }
        Value::Array(items) => {
            for item in items {
                collect_references(item, out);
            }
        }
        Value::Object(obj) => {
            for key in REFERENCE_KEYS {
                if let Some(inner) = obj.get(key) {
                    collect_references(inner, out);
                }
            }
        }
        _ => {}
    }
}

/// Decode an inline artifact: a `data:` URL or bare standard base64
///
/// Returns the bytes and, for data URLs, the declared MIME type.
pub fn decode_inline(reference: &str) -> Result<(Vec<u8>, Option<String>), String> {
    let reference = reference.trim();
    if let Some(rest) = reference.strip_prefix("data:") {
        let (header, payload) = rest
            .split_once(',')
            .ok_or_else(|| "data URL has no payload separator".to_string())?;
        if !header.ends_with(";base64") {
            return Err("only base64 data URLs are supported".to_string());
        }
        let mime = header.trim_end_matches(";base64");
        let mime = (!mime.is_empty()).then(|| mime.to_string());
        let bytes = decode_base64(payload)?;
        return Ok((bytes, mime));
    }
    decode_base64(reference).map(|bytes| (bytes, None))
}

fn decode_base64(payload: &str) -> Result<Vec<u8>, String> {
    let compact: String = payload.chars().filter(|c| !c.is_ascii_whitespace()).collect();
    if compact.is_empty() {
        return Err("empty base64 payload".to_string());
    }
    BASE64
        .decode(compact.as_bytes())
        .map_err(|e| format!("invalid base64 payload: {}", e))
}

/// Infer a file extension (without the dot) for an artifact
///
/// Looks at the URL path suffix first (query strings ignored), then the MIME type,
/// falling back to `"bin"`.
///
/// # Examples
///
/// ```
/// use genjob::utils::infer_extension;
///
/// assert_eq!(infer_extension("https://cdn.example.com/out.JPEG?sig=1", None), "jpg");
/// assert_eq!(infer_extension("https://cdn.example.com/out", Some("video/mp4")), "mp4");
/// assert_eq!(infer_extension("aGVsbG8=", None), "bin");
/// ```
pub fn infer_extension(reference: &str, mime_type: Option<&str>) -> String {
    if is_http_url(reference)
        && let Ok(parsed) = url::Url::parse(reference.trim())
        && let Some(segment) = parsed.path_segments().and_then(|mut s| s.next_back())
        && let Some(ext) = std::path::Path::new(segment)
            .extension()
            .and_then(|e| e.to_str())
        && let Some(known) = normalize_extension(ext)
    {
        return known.to_string();
    }

    mime_type
        .and_then(extension_for_mime)
        .unwrap_or("bin")
        .to_string()
}

fn normalize_extension(ext: &str) -> Option<&'static str> {
    match ext.to_ascii_lowercase().as_str() {
        "jpg" | "jpeg" => Some("jpg"),
        "png" => Some("png"),
        "webp" => Some("webp"),
        "gif" => Some("gif"),
        "mp4" => Some("mp4"),
        "mov" => Some("mov"),
        "webm" => Some("webm"),
        "mp3" => Some("mp3"),
        "wav" => Some("wav"),
        _ => None,
    }
}

fn extension_for_mime(mime: &str) -> Option<&'static str> {
    let essence = mime.split(';').next().unwrap_or("").trim();
    match essence.to_ascii_lowercase().as_str() {
        "image/jpeg" | "image/jpg" => Some("jpg"),
        "image/png" => Some("png"),
        "image/webp" => Some("webp"),
        "image/gif" => Some("gif"),
        "video/mp4" => Some("mp4"),
        "video/quicktime" => Some("mov"),
        "video/webm" => Some("webm"),
        "audio/mpeg" | "audio/mp3" => Some("mp3"),
        "audio/wav" | "audio/x-wav" | "audio/wave" => Some("wav"),
        _ => None,
    }
}
