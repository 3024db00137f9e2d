use std::collections::HashMap;

use actix_multipart::Multipart;
use actix_web::http::header;
use actix_web::{HttpRequest, web};
use futures_util::StreamExt;
use serde_json::Value;

use crate::utils::error::CustomError;
use crate::utils::uploads::{FileUpload, MAX_UPLOAD_BYTES};

pub const MAX_TEXT_FIELD_BYTES: usize = 64 * 1024;
pub const MAX_JSON_BYTES: usize = 16 * 1024;

/// Text fields and files of a request body, read from either
/// `multipart/form-data` or a flat JSON object.
#[derive(Debug, Default)]
pub struct FormInput {
    fields: HashMap<String, String>,
    files: HashMap<String, FileUpload>,
}

impl FormInput {
    pub async fn from_request(
        req: &HttpRequest,
        payload: web::Payload,
    ) -> Result<Self, CustomError> {
        let is_multipart = req
            .headers()
            .get(header::CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .is_some_and(|ct| ct.starts_with("multipart/form-data"));

        if is_multipart {
            Self::from_multipart(Multipart::new(req.headers(), payload)).await
        } else {
            Self::from_json(payload).await
        }
    }

    async fn from_multipart(mut payload: Multipart) -> Result<Self, CustomError> {
        let mut form = FormInput::default();

        while let Some(item) = payload.next().await {
            let mut field = item.map_err(|e| {
                CustomError::BadRequestError(format!("Error reading multipart field: {}", e))
            })?;

            let (name, file_name) = match field.content_disposition() {
                Some(cd) => (
                    cd.get_name().unwrap_or("").to_string(),
                    cd.get_filename().map(|f| f.to_string()),
                ),
                None => continue,
            };
            if name.is_empty() {
                continue;
            }
            let content_type = field.content_type().map(|ct| ct.to_string());
            let limit = if file_name.is_some() {
                MAX_UPLOAD_BYTES
            } else {
                MAX_TEXT_FIELD_BYTES
            };

            let mut data = Vec::new();
            while let Some(chunk) = field.next().await {
                let chunk = chunk.map_err(|e| {
                    CustomError::BadRequestError(format!("Error reading file chunk: {}", e))
                })?;
                if data.len() + chunk.len() > limit {
                    return Err(CustomError::ValidationError(format!(
                        "Field '{}' exceeds the {} byte limit",
                        name, limit
                    )));
                }
                data.extend_from_slice(&chunk);
            }

            match file_name {
                Some(file_name) if !data.is_empty() => {
                    form.files
                        .insert(name, FileUpload::new(file_name, data, content_type));
                }
                Some(_) => {}
                None => {
                    let text = String::from_utf8(data).map_err(|_| {
                        CustomError::BadRequestError(format!("Field '{}' is not valid UTF-8", name))
                    })?;
                    form.fields.insert(name, text);
                }
            }
        }

        Ok(form)
    }

    async fn from_json(mut payload: web::Payload) -> Result<Self, CustomError> {
        let mut body = web::BytesMut::new();
        while let Some(chunk) = payload.next().await {
            let chunk = chunk.map_err(|e| {
                CustomError::BadRequestError(format!("Error reading request body: {}", e))
            })?;
            if body.len() + chunk.len() > MAX_JSON_BYTES {
                return Err(CustomError::ValidationError(
                    "Request body is too large".to_string(),
                ));
            }
            body.extend_from_slice(&chunk);
        }

        if body.is_empty() {
            return Ok(FormInput::default());
        }

        let value: Value = serde_json::from_slice(&body)
            .map_err(|e| CustomError::ValidationError(format!("Invalid JSON body: {}", e)))?;
        let Value::Object(map) = value else {
            return Err(CustomError::ValidationError(
                "Request body must be a JSON object".to_string(),
            ));
        };

        let mut form = FormInput::default();
        for (key, value) in map {
            let text = match value {
                Value::Null => continue,
                Value::String(s) => s,
                Value::Bool(b) => b.to_string(),
                Value::Number(n) => n.to_string(),
                // tags may arrive as ["a", "b"]
                Value::Array(items) => items
                    .iter()
                    .filter_map(|item| item.as_str())
                    .collect::<Vec<_>>()
                    .join(","),
                Value::Object(_) => {
                    return Err(CustomError::ValidationError(format!(
                        "Field '{}' must not be an object",
                        key
                    )));
                }
            };
            form.fields.insert(key, text);
        }

        Ok(form)
    }

    /// Raw text value of a field.
    pub fn text(&self, key: &str) -> Option<&str> {
        self.fields.get(key).map(String::as_str)
    }

    /// Trimmed value, `None` when absent or blank.
    pub fn non_empty(&self, key: &str) -> Option<String> {
        self.text(key)
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(str::to_string)
    }

    pub fn take_file(&mut self, key: &str) -> Option<FileUpload> {
        self.files.remove(key)
    }

    #[cfg(test)]
    pub fn with_field(mut self, key: &str, value: &str) -> Self {
        self.fields.insert(key.to_string(), value.to_string());
        self
    }
}
