use std::collections::HashMap;

use axum::extract::Multipart;
use bytes::Bytes;

use crate::error::AppError;

/// Request body ceiling for multipart product writes.
pub const MAX_BODY_BYTES: usize = 20 * 1024 * 1024;

#[derive(Debug, Clone)]
pub struct UploadedFile {
    pub body: Bytes,
    pub content_type: String,
    pub ext: &'static str,
}

/// Text fields and image files read from one multipart request.
#[derive(Debug, Default)]
pub struct UploadForm {
    pub fields: HashMap<String, String>,
    pub files: Vec<UploadedFile>,
}

impl UploadForm {
    pub fn field(&self, name: &str) -> Option<&str> {
        self.fields.get(name).map(String::as_str)
    }
}

/// Reads a multipart body, treating `file_fields` as image uploads and the
/// rest as text. Images must have an accepted type and fit `max_file_bytes`.
pub async fn read_form(
    mp: &mut Multipart,
    file_fields: &[&str],
    max_file_bytes: usize,
) -> Result<UploadForm, AppError> {
    let mut form = UploadForm::default();

    while let Some(field) = mp.next_field().await.map_err(bad_multipart)? {
        let Some(name) = field.name().map(|s| s.to_string()) else {
            continue;
        };

        if file_fields.contains(&name.as_str()) {
            let content_type = field
                .content_type()
                .map(|s| s.to_string())
                .unwrap_or_else(|| "application/octet-stream".into());
            let body = field.bytes().await.map_err(bad_multipart)?;
            form.files.push(check_image(body, content_type, max_file_bytes)?);
        } else {
            let text = field.text().await.map_err(bad_multipart)?;
            form.fields.insert(name, text);
        }
    }

    Ok(form)
}

pub fn check_image(
    body: Bytes,
    content_type: String,
    max_file_bytes: usize,
) -> Result<UploadedFile, AppError> {
    let ext = ext_from_mime(&content_type).ok_or_else(|| {
        AppError::BadRequest(format!("unsupported image type {content_type}"))
    })?;
    if body.len() > max_file_bytes {
        return Err(AppError::BadRequest(format!(
            "image exceeds {max_file_bytes} bytes"
        )));
    }
    Ok(UploadedFile {
        body,
        content_type,
        ext,
    })
}

pub fn ext_from_mime(ct: &str) -> Option<&'static str> {
    match ct {
        "image/jpeg" | "image/jpg" => Some("jpg"),
        "image/png" => Some("png"),
        "image/webp" => Some("webp"),
        "image/heic" => Some("heic"),
        _ => None,
    }
}

fn bad_multipart(e: axum::extract::multipart::MultipartError) -> AppError {
    AppError::BadRequest(format!("invalid multipart body: {e}"))
}
