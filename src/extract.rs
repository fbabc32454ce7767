//! Extractor wrappers whose rejections flow through `AppError`, so malformed bodies, queries
//! and paths produce the same envelope as every other failure.

use axum::{
    Json,
    extract::{FromRequest, FromRequestParts, Multipart, Request},
    http::header::CONTENT_TYPE,
};
use serde::de::DeserializeOwned;
use serde_json::{Map, Value};
use std::collections::HashMap;

use crate::{
    error::{AppError, AppResult},
    models::parse_flag,
    storage::{UploadedFile, mime_allowed},
};

#[derive(FromRequest)]
#[from_request(via(axum::Json), rejection(AppError))]
pub struct ValidJson<T>(pub T);

#[derive(FromRequestParts)]
#[from_request(via(axum::extract::Query), rejection(AppError))]
pub struct ValidQuery<T>(pub T);

#[derive(FromRequestParts)]
#[from_request(via(axum::extract::Path), rejection(AppError))]
pub struct ValidPath<T>(pub T);

/// FormData
///
/// A fully buffered form submission: text fields by name plus every file part. Accepts
/// `multipart/form-data` and, for file-less clients, a flat JSON object whose nested values
/// are kept as JSON text. Structured sub-fields (`contact`, `services`, ...) arrive as JSON
/// strings either way and are decoded with [`FormData::json`].
#[derive(Debug, Default)]
pub struct FormData {
    fields: HashMap<String, String>,
    files: Vec<UploadedFile>,
}

impl<S> FromRequest<S> for FormData
where
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request(req: Request, state: &S) -> Result<Self, Self::Rejection> {
        let is_json = req
            .headers()
            .get(CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .is_some_and(|ct| ct.starts_with("application/json"));

        if is_json {
            let Json(body) = Json::<Map<String, Value>>::from_request(req, state).await?;
            let fields = body
                .into_iter()
                .filter_map(|(name, value)| match value {
                    Value::Null => None,
                    Value::String(s) => Some((name, s)),
                    other => Some((name, other.to_string())),
                })
                .collect();
            return Ok(Self { fields, files: Vec::new() });
        }

        let mut multipart = Multipart::from_request(req, state)
            .await
            .map_err(|e| AppError::validation(e.body_text()))?;

        let mut form = FormData::default();
        while let Some(field) = multipart.next_field().await? {
            let name = field.name().unwrap_or_default().to_string();
            match field.file_name().map(str::to_string) {
                Some(file_name) => {
                    let content_type = field
                        .content_type()
                        .unwrap_or("application/octet-stream")
                        .to_string();
                    let bytes = field.bytes().await?;
                    // Browsers send an empty part for an untouched file input.
                    if bytes.is_empty() && file_name.is_empty() {
                        continue;
                    }
                    form.files.push(UploadedFile { field: name, file_name, content_type, bytes });
                }
                None => {
                    let text = field.text().await?;
                    form.fields.insert(name, text);
                }
            }
        }
        Ok(form)
    }
}

impl FormData {
    #[cfg(test)]
    pub fn from_parts(fields: &[(&str, &str)], files: Vec<UploadedFile>) -> Self {
        Self {
            fields: fields.iter().map(|(k, v)| (k.to_string(), v.to_string())).collect(),
            files,
        }
    }

    pub fn has(&self, name: &str) -> bool {
        self.fields.contains_key(name)
    }

    /// The raw value of a present field. Passwords are read this way: whitespace is significant.
    pub fn value(&self, name: &str) -> Option<&str> {
        self.fields.get(name).map(String::as_str)
    }

    /// The trimmed value of a present field (possibly empty).
    pub fn text(&self, name: &str) -> Option<String> {
        self.fields.get(name).map(|v| v.trim().to_string())
    }

    /// The trimmed value of a field, `None` when absent or blank.
    pub fn non_empty(&self, name: &str) -> Option<String> {
        self.text(name).filter(|v| !v.is_empty())
    }

    pub fn flag(&self, name: &str) -> AppResult<Option<bool>> {
        match self.non_empty(name) {
            None => Ok(None),
            Some(raw) => parse_flag(&raw).map(Some).ok_or_else(|| {
                AppError::validation(format!("Field '{name}' must be true or false"))
            }),
        }
    }

    pub fn int(&self, name: &str) -> AppResult<Option<i32>> {
        match self.non_empty(name) {
            None => Ok(None),
            Some(raw) => raw.parse().map(Some).map_err(|_| {
                AppError::validation(format!("Field '{name}' must be a whole number"))
            }),
        }
    }

    /// Decodes an embedded JSON sub-field. Malformed JSON fails the whole request.
    pub fn json<T: DeserializeOwned>(&self, name: &str) -> AppResult<Option<T>> {
        match self.non_empty(name) {
            None => Ok(None),
            Some(raw) => serde_json::from_str(&raw).map(Some).map_err(|e| AppError::Validation {
                message: format!("Invalid JSON in field '{name}'"),
                errors: vec![e.to_string()],
            }),
        }
    }

    pub fn files(&self, field: &str) -> Vec<UploadedFile> {
        self.files.iter().filter(|f| f.field == field).cloned().collect()
    }

    /// At most one file for `field`.
    pub fn single_file(&self, field: &str) -> AppResult<Option<UploadedFile>> {
        let mut files = self.files(field);
        if files.len() > 1 {
            return Err(AppError::validation(format!("Only one file is allowed for '{field}'")));
        }
        Ok(files.pop())
    }
}

/// Rejects any upload whose mime type is outside the allow-lists.
pub fn ensure_allowed(files: &[UploadedFile], allow_lists: &[&[&str]]) -> AppResult<()> {
    let rejected: Vec<String> = files
        .iter()
        .filter(|f| !mime_allowed(&f.content_type, allow_lists))
        .map(|f| format!("{} ({})", f.file_name, f.content_type))
        .collect();
    if rejected.is_empty() {
        Ok(())
    } else {
        Err(AppError::Validation {
            message: "Unsupported file type".to_string(),
            errors: rejected,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::{DOCUMENT_MIME_TYPES, IMAGE_MIME_TYPES};
    use axum::body::Bytes;

    fn file(field: &str, mime: &str) -> UploadedFile {
        UploadedFile {
            field: field.into(),
            file_name: "f".into(),
            content_type: mime.into(),
            bytes: Bytes::from_static(b"x"),
        }
    }

    #[test]
    fn typed_accessors_validate() {
        let form = FormData::from_parts(
            &[
                ("order", " 4 "),
                ("isActive", "yes"),
                ("bad", "x"),
                ("services", "[{\"name\":\"A\"}"),
            ],
            Vec::new(),
        );
        assert_eq!(form.int("order").unwrap(), Some(4));
        assert_eq!(form.flag("isActive").unwrap(), Some(true));
        assert!(form.flag("bad").is_err());
        assert!(form.int("bad").is_err());
        assert_eq!(form.int("missing").unwrap(), None);
        let err = form.json::<Vec<Value>>("services").unwrap_err();
        assert!(err.to_string().contains("services"));
    }

    #[test]
    fn single_file_rejects_duplicates() {
        let form = FormData::from_parts(
            &[],
            vec![file("heroImage", "image/png"), file("heroImage", "image/png")],
        );
        assert!(form.single_file("heroImage").is_err());
        assert!(form.single_file("other").unwrap().is_none());
    }

    #[test]
    fn disallowed_mime_types_are_listed() {
        let files = vec![file("doc", "application/pdf"), file("doc", "application/zip")];
        let err = ensure_allowed(&files, &[IMAGE_MIME_TYPES, DOCUMENT_MIME_TYPES]).unwrap_err();
        match err {
            AppError::Validation { errors, .. } => assert_eq!(errors, vec!["f (application/zip)"]),
            other => panic!("unexpected error: {other:?}"),
        }
    }
}
