use std::collections::BTreeMap;

use base64::Engine;
use image::ImageFormat;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::json;

use crate::common::helpers::sanitize_text;
use crate::common::store::KvStore;
use crate::config::MAX_IMAGE_BYTES;
use crate::groups::get_group;

pub const REQUIRED: &str = "This field is required.";
pub const INVALID_IMAGE: &str =
    "Upload a valid image. The file you uploaded was either not an image or a corrupted image.";
pub const UNKNOWN_GROUP: &str = "Select a valid choice. That choice is not one of the available choices.";

/// Field name -> messages. `__all__` holds errors not tied to one field.
pub type FormErrors = BTreeMap<String, Vec<String>>;

fn add_error(errors: &mut FormErrors, field: &str, message: &str) {
    errors
        .entry(field.to_string())
        .or_default()
        .push(message.to_string());
}

/// Reads a JSON form body. A missing body is an empty (unbound) form.
pub fn parse_form<T: DeserializeOwned + Default>(body: &[u8]) -> Result<T, FormErrors> {
    if body.iter().all(|b| b.is_ascii_whitespace()) {
        return Ok(T::default());
    }
    serde_json::from_slice(body).map_err(|e| {
        let mut errors = FormErrors::new();
        add_error(&mut errors, "__all__", &format!("Malformed form data: {}", e));
        errors
    })
}

#[derive(Deserialize, Serialize, Debug, Clone)]
pub struct ImageUpload {
    pub name: String,
    /// Base64 encoded file content.
    pub content: String,
}

#[derive(Deserialize, Default, Debug, Clone)]
#[serde(default)]
pub struct PostForm {
    pub text: String,
    pub group: Option<String>,
    pub image: Option<ImageUpload>,
    pub image_clear: bool,
}

#[derive(Debug, Clone)]
pub struct CleanImage {
    pub extension: &'static str,
    pub bytes: Vec<u8>,
}

#[derive(Debug, Clone)]
pub struct CleanPost {
    pub text: String,
    pub group: Option<String>,
    pub image: Option<CleanImage>,
    pub image_clear: bool,
}

fn image_extension(format: ImageFormat) -> Option<&'static str> {
    match format {
        ImageFormat::Gif => Some("gif"),
        ImageFormat::Png => Some("png"),
        ImageFormat::Jpeg => Some("jpg"),
        ImageFormat::WebP => Some("webp"),
        _ => None,
    }
}

/// Accepts only payloads that decode as one of the supported formats.
pub fn clean_image(upload: &ImageUpload) -> Option<CleanImage> {
    let bytes = base64::engine::general_purpose::STANDARD
        .decode(upload.content.trim())
        .ok()?;
    if bytes.is_empty() || bytes.len() > MAX_IMAGE_BYTES {
        return None;
    }
    let format = image::guess_format(&bytes).ok()?;
    let extension = image_extension(format)?;
    image::load_from_memory_with_format(&bytes, format).ok()?;
    Some(CleanImage { extension, bytes })
}

impl PostForm {
    pub fn validate(&self, store: &dyn KvStore) -> anyhow::Result<Result<CleanPost, FormErrors>> {
        let mut errors = FormErrors::new();

        let text = sanitize_text(self.text.trim());
        if text.trim().is_empty() {
            add_error(&mut errors, "text", REQUIRED);
        }

        let group = self
            .group
            .as_deref()
            .map(str::trim)
            .filter(|slug| !slug.is_empty());
        if let Some(slug) = group {
            if get_group(store, slug)?.is_none() {
                add_error(&mut errors, "group", UNKNOWN_GROUP);
            }
        }

        let image = match &self.image {
            Some(upload) => {
                let cleaned = clean_image(upload);
                if cleaned.is_none() {
                    add_error(&mut errors, "image", INVALID_IMAGE);
                }
                cleaned
            }
            None => None,
        };

        if !errors.is_empty() {
            return Ok(Err(errors));
        }
        Ok(Ok(CleanPost {
            text: text.trim().to_string(),
            group: group.map(str::to_string),
            image,
            image_clear: self.image_clear,
        }))
    }

    /// Submitted values plus messages, for re-rendering the form.
    pub fn context(&self, errors: &FormErrors) -> serde_json::Value {
        json!({
            "text": self.text,
            "group": self.group,
            "image": self.image.as_ref().map(|upload| upload.name.clone()),
            "errors": errors,
        })
    }
}

#[derive(Deserialize, Default, Debug, Clone)]
#[serde(default)]
pub struct CommentForm {
    pub text: String,
}

impl CommentForm {
    pub fn validate(&self) -> Result<String, FormErrors> {
        let text = sanitize_text(self.text.trim());
        let text = text.trim();
        if text.is_empty() {
            let mut errors = FormErrors::new();
            add_error(&mut errors, "text", REQUIRED);
            return Err(errors);
        }
        Ok(text.to_string())
    }

    pub fn context(&self, errors: &FormErrors) -> serde_json::Value {
        json!({
            "text": self.text,
            "errors": errors,
        })
    }
}
