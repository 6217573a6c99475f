//! `multipart/form-data` parsing for browser-style `POST /{bucket}` uploads
//! (§4.5, §6 "content-type overload for POST uploads"). A synchronous parser
//! over the already-collected body bytes — no streaming, since the form
//! fields (including the `key`) must all be read before the object can be
//! named and stored.

use gateway_common::Error;
use std::collections::HashMap;

/// A parsed `multipart/form-data` submission: the non-file fields and the
/// single file part, which by the S3 POST Object convention is named `file`
/// and must come last.
pub struct MultipartForm {
    pub fields: HashMap<String, String>,
    pub file_data: bytes::Bytes,
    pub file_content_type: Option<String>,
}

pub fn extract_boundary(content_type: &str) -> Result<String, Error> {
    if !content_type.to_ascii_lowercase().starts_with("multipart/form-data") {
        return Err(Error::invalid_parameter(format!("expected multipart/form-data, got {content_type}")));
    }
    for part in content_type.split(';') {
        let trimmed = part.trim();
        if let Some(val) = trimmed.strip_prefix("boundary=") {
            let boundary = val.trim_matches('"').to_owned();
            if boundary.is_empty() {
                return Err(Error::invalid_parameter("empty boundary in Content-Type"));
            }
            return Ok(boundary);
        }
    }
    Err(Error::invalid_parameter("missing boundary in Content-Type"))
}

pub fn parse_multipart(body: &[u8], boundary: &str) -> Result<MultipartForm, Error> {
    let delimiter = format!("--{boundary}");
    let end_delimiter = format!("--{boundary}--");

    let mut fields: HashMap<String, String> = HashMap::new();
    let mut file_data: Option<bytes::Bytes> = None;
    let mut file_content_type: Option<String> = None;

    for part_bytes in split_multipart_parts(body, delimiter.as_bytes(), end_delimiter.as_bytes()) {
        let Some((headers_section, part_body)) = split_headers_body(part_bytes) else { continue };
        let disposition = parse_content_disposition(headers_section);
        let Some(field_name) = disposition.name else { continue };

        if field_name == "file" || disposition.filename.is_some() {
            file_content_type = parse_part_content_type(headers_section);
            file_data = Some(bytes::Bytes::copy_from_slice(part_body));
        } else {
            fields.insert(field_name, String::from_utf8_lossy(part_body).into_owned());
        }
    }

    let file_data = file_data.ok_or_else(|| Error::invalid_parameter("missing file field in multipart form data"))?;
    Ok(MultipartForm { fields, file_data, file_content_type })
}

fn split_multipart_parts<'a>(body: &'a [u8], delimiter: &[u8], end_delimiter: &[u8]) -> Vec<&'a [u8]> {
    let mut parts = Vec::new();
    let mut remaining = body;

    let Some(pos) = find_bytes(remaining, delimiter) else { return parts };
    remaining = skip_crlf(&remaining[pos + delimiter.len()..]);

    loop {
        if remaining.starts_with(end_delimiter) || remaining.strip_prefix(b"\r\n").is_some_and(|r| r.starts_with(end_delimiter)) {
            break;
        }
        match find_bytes(remaining, delimiter) {
            Some(pos) => {
                parts.push(strip_trailing_crlf(&remaining[..pos]));
                remaining = skip_crlf(&remaining[pos + delimiter.len()..]);
            }
            None => {
                let part = strip_trailing_crlf(remaining);
                if !part.is_empty() {
                    parts.push(part);
                }
                break;
            }
        }
    }

    parts
}

fn split_headers_body(part: &[u8]) -> Option<(&[u8], &[u8])> {
    find_bytes(part, b"\r\n\r\n").map(|pos| (&part[..pos], &part[pos + 4..]))
}

struct ContentDisposition {
    name: Option<String>,
    filename: Option<String>,
}

fn parse_content_disposition(headers: &[u8]) -> ContentDisposition {
    let headers_str = String::from_utf8_lossy(headers);
    let mut disposition = ContentDisposition { name: None, filename: None };
    for line in headers_str.split("\r\n") {
        if !line.to_ascii_lowercase().starts_with("content-disposition:") {
            continue;
        }
        disposition.name = extract_quoted_param(line, "name");
        disposition.filename = extract_quoted_param(line, "filename");
    }
    disposition
}

fn parse_part_content_type(headers: &[u8]) -> Option<String> {
    let headers_str = String::from_utf8_lossy(headers);
    headers_str.split("\r\n").find_map(|line| {
        let lower = line.to_ascii_lowercase();
        lower.strip_prefix("content-type:").map(|_| line[lower.find(':').unwrap() + 1..].trim().to_string())
    })
}

fn extract_quoted_param(header_line: &str, param_name: &str) -> Option<String> {
    let lower_line = header_line.to_ascii_lowercase();
    let quoted_pattern = format!("{param_name}=\"");
    if let Some(pos) = lower_line.find(&quoted_pattern) {
        let rest = &header_line[pos + quoted_pattern.len()..];
        if let Some(end) = rest.find('"') {
            return Some(rest[..end].to_owned());
        }
    }
    let unquoted_pattern = format!("{param_name}=");
    let pos = lower_line.find(&unquoted_pattern)?;
    let rest = &header_line[pos + unquoted_pattern.len()..];
    let end = rest.find(';').unwrap_or(rest.len());
    let value = rest[..end].trim();
    (!value.is_empty()).then(|| value.to_owned())
}

fn find_bytes(haystack: &[u8], needle: &[u8]) -> Option<usize> {
    if needle.is_empty() || needle.len() > haystack.len() {
        return None;
    }
    haystack.windows(needle.len()).position(|window| window == needle)
}

fn skip_crlf(data: &[u8]) -> &[u8] {
    data.strip_prefix(b"\r\n").unwrap_or(data)
}

fn strip_trailing_crlf(data: &[u8]) -> &[u8] {
    data.strip_suffix(b"\r\n").unwrap_or(data)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn extracts_quoted_and_bare_boundary() {
        assert_eq!(extract_boundary("multipart/form-data; boundary=abc123").unwrap(), "abc123");
        assert_eq!(extract_boundary(r#"multipart/form-data; boundary="abc123""#).unwrap(), "abc123");
    }

    #[test]
    fn rejects_non_multipart_content_type() {
        assert!(extract_boundary("application/json").is_err());
    }

    #[test]
    fn parses_key_field_and_file_part() {
        let boundary = "----boundary";
        let body = "------boundary\r\n\
             Content-Disposition: form-data; name=\"key\"\r\n\
             \r\n\
             uploads/cat.png\r\n\
             ------boundary\r\n\
             Content-Disposition: form-data; name=\"file\"; filename=\"cat.png\"\r\n\
             Content-Type: image/png\r\n\
             \r\n\
             binarydata\r\n\
             ------boundary--\r\n";

        let form = parse_multipart(body.as_bytes(), boundary).unwrap();
        assert_eq!(form.fields.get("key").map(String::as_str), Some("uploads/cat.png"));
        assert_eq!(form.file_data.as_ref(), b"binarydata");
        assert_eq!(form.file_content_type.as_deref(), Some("image/png"));
    }

    #[test]
    fn missing_file_field_is_rejected() {
        let boundary = "abc";
        let body = "--abc\r\nContent-Disposition: form-data; name=\"key\"\r\n\r\ntest\r\n--abc--\r\n";
        assert!(parse_multipart(body.as_bytes(), boundary).is_err());
    }
}
