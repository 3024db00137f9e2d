use regex::Regex;
use reqwest::multipart::{Form, Part};
use serde::Deserialize;
use sha1::{Digest, Sha1};
use std::env;

/// Cloudinary configuration loaded from environment variables
#[derive(Debug, Clone)]
pub struct CloudinaryConfig {
    pub cloud_name: String,
    pub api_key: String,
    pub api_secret: String,
    pub upload_preset: Option<String>,
}

impl CloudinaryConfig {
    /// Load Cloudinary configuration from environment variables
    pub fn from_env() -> Result<Self, String> {
        Ok(Self {
            cloud_name: env::var("CLOUDINARY_CLOUD_NAME")
                .map_err(|_| "CLOUDINARY_CLOUD_NAME is required")?,
            api_key: env::var("CLOUDINARY_API_KEY")
                .map_err(|_| "CLOUDINARY_API_KEY is required")?,
            api_secret: env::var("CLOUDINARY_API_SECRET")
                .map_err(|_| "CLOUDINARY_API_SECRET is required")?,
            upload_preset: env::var("CLOUDINARY_UPLOAD_PRESET").ok(),
        })
    }

    fn endpoint(&self, resource_type: &str, action: &str) -> String {
        format!(
            "https://api.cloudinary.com/v1_1/{}/{}/{}",
            self.cloud_name, resource_type, action
        )
    }

    /// Sign request parameters. Cloudinary expects them sorted by key,
    /// joined as `k=v&k=v`, with the API secret appended.
    pub fn generate_signature(&self, params: &[(&str, String)]) -> String {
        let mut sorted: Vec<&(&str, String)> = params.iter().collect();
        sorted.sort_by(|a, b| a.0.cmp(b.0));

        let to_sign = sorted
            .iter()
            .map(|(k, v)| format!("{}={}", k, v))
            .collect::<Vec<_>>()
            .join("&");

        let mut hasher = Sha1::new();
        hasher.update(format!("{}{}", to_sign, self.api_secret).as_bytes());
        format!("{:x}", hasher.finalize())
    }
}

/// Response from Cloudinary upload API
#[derive(Debug, Deserialize)]
pub struct CloudinaryUploadResponse {
    pub public_id: String,
    pub format: Option<String>,
    pub bytes: u64,
    pub url: String,
    pub secure_url: String,
}

#[derive(Debug, Deserialize)]
pub struct CloudinaryError {
    pub message: String,
}

#[derive(Debug, Deserialize)]
pub struct CloudinaryErrorResponse {
    pub error: CloudinaryError,
}

/// Asset folders used by the API.
pub const AVATAR_FOLDER: &str = "blog/avatars";
pub const COVER_FOLDER: &str = "blog/covers";
pub const POST_IMAGE_FOLDER: &str = "blog/posts";

/// Forwards uploaded files to Cloudinary and hands back hosted URLs.
pub struct UploadService {
    config: CloudinaryConfig,
    client: reqwest::Client,
    validator: FileValidator,
}

impl UploadService {
    pub fn new() -> Result<Self, String> {
        Ok(Self::with_config(CloudinaryConfig::from_env()?))
    }

    pub fn with_config(config: CloudinaryConfig) -> Self {
        Self {
            config,
            client: reqwest::Client::new(),
            validator: FileValidator::images(),
        }
    }

    /// Validate and upload an image, returning its HTTPS URL.
    pub async fn upload_image(&self, file: FileUpload, folder: &str) -> Result<String, String> {
        self.validator.validate(&file)?;
        let response = self.upload_file(file, "image", folder).await?;
        log::debug!(
            "Uploaded {} ({} bytes, {:?}) as {}",
            response.url,
            response.bytes,
            response.format,
            response.public_id
        );
        Ok(response.secure_url)
    }

    async fn upload_file(
        &self,
        file: FileUpload,
        resource_type: &str,
        folder: &str,
    ) -> Result<CloudinaryUploadResponse, String> {
        let timestamp = chrono::Utc::now().timestamp();

        let mut params = vec![
            ("folder", folder.to_string()),
            ("timestamp", timestamp.to_string()),
        ];
        if let Some(ref preset) = self.config.upload_preset {
            params.push(("upload_preset", preset.clone()));
        }
        let signature = self.config.generate_signature(&params);

        let mime = file
            .content_type
            .clone()
            .unwrap_or_else(|| "application/octet-stream".to_string());
        let file_part = Part::bytes(file.data)
            .file_name(file.file_name)
            .mime_str(&mime)
            .map_err(|e| format!("Failed to create file part: {}", e))?;

        let mut form = Form::new()
            .part("file", file_part)
            .text("api_key", self.config.api_key.clone())
            .text("signature", signature);
        for (key, value) in params {
            form = form.text(key, value);
        }

        let response = self
            .client
            .post(self.config.endpoint(resource_type, "upload"))
            .multipart(form)
            .send()
            .await
            .map_err(|e| format!("Failed to send upload request: {}", e))?;

        if response.status().is_success() {
            response
                .json::<CloudinaryUploadResponse>()
                .await
                .map_err(|e| format!("Failed to parse upload response: {}", e))
        } else {
            let error_response = response
                .json::<CloudinaryErrorResponse>()
                .await
                .map_err(|e| format!("Failed to parse error response: {}", e))?;
            Err(format!(
                "Cloudinary upload failed: {}",
                error_response.error.message
            ))
        }
    }

    /// Delete an image previously returned by `upload_image`.
    pub async fn delete_image(&self, url: &str) -> Result<(), String> {
        let public_id = public_id_from_url(url)
            .ok_or_else(|| format!("Not a Cloudinary asset URL: {}", url))?;
        self.delete_resource(&public_id, "image").await
    }

    pub async fn delete_resource(&self, public_id: &str, resource_type: &str) -> Result<(), String> {
        let timestamp = chrono::Utc::now().timestamp();
        let params = vec![
            ("public_id", public_id.to_string()),
            ("timestamp", timestamp.to_string()),
        ];
        let signature = self.config.generate_signature(&params);

        let form = Form::new()
            .text("public_id", public_id.to_string())
            .text("api_key", self.config.api_key.clone())
            .text("timestamp", timestamp.to_string())
            .text("signature", signature);

        let response = self
            .client
            .post(self.config.endpoint(resource_type, "destroy"))
            .multipart(form)
            .send()
            .await
            .map_err(|e| format!("Failed to send delete request: {}", e))?;

        if response.status().is_success() {
            Ok(())
        } else {
            Err(format!(
                "Failed to delete resource from Cloudinary ({})",
                response.status()
            ))
        }
    }

    /// Fire-and-log deletion for assets that were just replaced.
    pub async fn discard_image(&self, url: Option<&str>) {
        let Some(url) = url.filter(|u| !u.is_empty()) else {
            return;
        };
        if let Err(e) = self.delete_image(url).await {
            log::warn!("Could not delete asset {}: {}", url, e);
        }
    }

    /// Passes `result` through, deleting freshly uploaded `urls` when it failed.
    pub async fn discard_on_error<T, E>(
        &self,
        result: Result<T, E>,
        urls: &[Option<&str>],
    ) -> Result<T, E> {
        if result.is_err() {
            for url in urls {
                self.discard_image(*url).await;
            }
        }
        result
    }
}

/// `https://res.cloudinary.com/<cloud>/image/upload/v123/blog/avatars/abc.png`
/// yields `blog/avatars/abc`.
pub fn public_id_from_url(url: &str) -> Option<String> {
    let (_, path) = url.split_once("/upload/")?;
    let version = Regex::new(r"^v\d+$").ok()?;

    let mut segments: Vec<&str> = path.split('/').filter(|s| !s.is_empty()).collect();
    if segments.first().is_some_and(|s| version.is_match(s)) {
        segments.remove(0);
    }
    let last = segments.pop()?;
    let stem = last.rsplit_once('.').map(|(stem, _)| stem).unwrap_or(last);
    segments.push(stem);

    let id = segments.join("/");
    if id.is_empty() { None } else { Some(id) }
}

/// Represents a file to be uploaded
#[derive(Debug, Clone)]
pub struct FileUpload {
    pub file_name: String,
    pub data: Vec<u8>,
    pub content_type: Option<String>,
}

impl FileUpload {
    pub fn new(file_name: String, data: Vec<u8>, content_type: Option<String>) -> Self {
        Self {
            file_name,
            data,
            content_type,
        }
    }

    pub fn size(&self) -> usize {
        self.data.len()
    }

    pub fn extension(&self) -> Option<String> {
        self.file_name
            .rsplit_once('.')
            .map(|(_, ext)| ext.to_lowercase())
    }
}

/// File validation configuration
#[derive(Debug, Clone)]
pub struct FileValidator {
    /// Allowed file extensions (e.g., ["jpg", "png", "gif"])
    pub allowed_extensions: Vec<String>,
    /// Maximum file size in bytes
    pub max_file_size: usize,
}

impl FileValidator {
    /// Create validator for images only
    pub fn images() -> Self {
        Self {
            allowed_extensions: ["jpg", "jpeg", "png", "gif", "webp", "svg", "bmp"]
                .iter()
                .map(|s| s.to_string())
                .collect(),
            max_file_size: MAX_UPLOAD_BYTES,
        }
    }

    /// Validate a file
    pub fn validate(&self, file: &FileUpload) -> Result<(), String> {
        if file.data.is_empty() {
            return Err("File is empty".to_string());
        }

        let extension = file.extension().ok_or("File has no extension")?;
        if !self.allowed_extensions.contains(&extension) {
            return Err(format!(
                "Invalid file type '{}'. Allowed types: {}",
                extension,
                self.allowed_extensions.join(", ")
            ));
        }

        if file.size() > self.max_file_size {
            return Err(format!(
                "File too large. Maximum size: {} bytes, file size: {} bytes",
                self.max_file_size,
                file.size()
            ));
        }

        Ok(())
    }
}

pub const MAX_UPLOAD_BYTES: usize = 10 * 1024 * 1024;

#[cfg(test)]
mod tests {
    use super::*;

    fn config() -> CloudinaryConfig {
        CloudinaryConfig {
            cloud_name: "demo".into(),
            api_key: "key".into(),
            api_secret: "shh".into(),
            upload_preset: None,
        }
    }

    #[test]
    fn signature_sorts_parameters() {
        let cfg = config();
        let a = cfg.generate_signature(&[
            ("timestamp", "1700000000".into()),
            ("folder", "blog/posts".into()),
        ]);
        let b = cfg.generate_signature(&[
            ("folder", "blog/posts".into()),
            ("timestamp", "1700000000".into()),
        ]);
        assert_eq!(a, b);

        let mut hasher = Sha1::new();
        hasher.update(b"folder=blog/posts&timestamp=1700000000shh");
        assert_eq!(a, format!("{:x}", hasher.finalize()));
    }

    #[test]
    fn extracts_public_id_from_asset_url() {
        assert_eq!(
            public_id_from_url(
                "https://res.cloudinary.com/demo/image/upload/v1712/blog/avatars/abc123.png"
            )
            .as_deref(),
            Some("blog/avatars/abc123")
        );
        assert_eq!(
            public_id_from_url("https://res.cloudinary.com/demo/image/upload/sample.jpg")
                .as_deref(),
            Some("sample")
        );
        assert_eq!(public_id_from_url("https://example.com/a.png"), None);
    }

    #[test]
    fn validator_rejects_wrong_type_and_empty() {
        let v = FileValidator::images();
        let ok = FileUpload::new("me.PNG".into(), vec![1; 2048], None);
        assert!(v.validate(&ok).is_ok());

        let pdf = FileUpload::new("cv.pdf".into(), vec![1; 2048], None);
        assert!(v.validate(&pdf).unwrap_err().contains("Invalid file type"));

        let empty = FileUpload::new("me.png".into(), Vec::new(), None);
        assert_eq!(v.validate(&empty).unwrap_err(), "File is empty");

        let no_ext = FileUpload::new("avatar".into(), vec![1; 10], None);
        assert!(v.validate(&no_ext).is_err());
    }

    #[actix_web::test]
    async fn failed_step_still_reports_its_error_after_cleanup() {
        let uploads = UploadService::with_config(config());
        // not a Cloudinary URL, so cleanup fails locally and is only logged
        let orphan = Some("https://example.com/orphan.png");

        let failed: Result<(), String> = Err("duplicate username".into());
        assert_eq!(
            uploads.discard_on_error(failed, &[orphan, None]).await,
            Err("duplicate username".to_string())
        );

        let kept: Result<u8, String> = Ok(7);
        assert_eq!(uploads.discard_on_error(kept, &[orphan]).await, Ok(7));
    }
}
