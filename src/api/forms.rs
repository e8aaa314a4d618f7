//! Multipart bodies shared by the message, book and category handlers.

use crate::error::{AppError, Result};
use crate::services::upload_service::ImageUpload;
use axum::extract::Multipart;
use axum::extract::multipart::Field;
use std::collections::HashMap;
use uuid::Uuid;

/// Text fields by name plus every non-empty file part under one of the accepted image field names.
#[derive(Debug, Default)]
pub(crate) struct FormData {
    fields: HashMap<String, Vec<String>>,
    pub(crate) files: Vec<ImageUpload>,
}

impl FormData {
    pub(crate) async fn read(mut multipart: Multipart, image_fields: &[&str]) -> Result<Self> {
        let mut form = Self::default();

        while let Some(field) =
            multipart.next_field().await.map_err(|e| AppError::BadRequest(format!("Invalid multipart body: {e}")))?
        {
            let name = field.name().unwrap_or_default().to_string();
            if image_fields.contains(&name.as_str()) {
                let file_name = field.file_name().map(ToString::to_string);
                let data =
                    field.bytes().await.map_err(|e| AppError::BadRequest(format!("Invalid image upload: {e}")))?;
                if !data.is_empty() {
                    form.files.push(ImageUpload { file_name, data });
                }
            } else if name.is_empty() {
                tracing::debug!("Ignoring unnamed multipart field");
            } else {
                let value = text_field(field).await?;
                form.fields.entry(name).or_default().push(value);
            }
        }

        Ok(form)
    }

    /// Last value sent for `name`, or `None` when it is missing or blank.
    pub(crate) fn text(&self, name: &str) -> Option<String> {
        self.fields.get(name).and_then(|values| values.last()).filter(|v| !v.trim().is_empty()).cloned()
    }

    /// Every value sent for `name`, in order.
    pub(crate) fn all(&self, name: &str) -> Vec<String> {
        self.fields.get(name).cloned().unwrap_or_default()
    }

    pub(crate) fn number<T: std::str::FromStr>(&self, name: &str) -> Result<Option<T>> {
        self.text(name)
            .map(|raw| raw.trim().parse::<T>().map_err(|_| AppError::BadRequest(format!("Invalid {name}"))))
            .transpose()
    }
}

async fn text_field(field: Field<'_>) -> Result<String> {
    field.text().await.map_err(|e| AppError::BadRequest(format!("Invalid multipart field: {e}")))
}

pub(crate) fn parse_id(raw: &str, what: &str) -> Result<Uuid> {
    Uuid::parse_str(raw.trim()).map_err(|_| AppError::BadRequest(format!("Invalid {what} ID")))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_id_names_the_bad_field() {
        let err = parse_id("not-a-uuid", "message").unwrap_err();
        assert!(matches!(err, AppError::BadRequest(ref m) if m == "Invalid message ID"));

        let id = Uuid::new_v4();
        assert_eq!(parse_id(&format!(" {id} "), "user").unwrap(), id);
    }

    #[test]
    fn test_text_and_number_lookups() {
        let mut form = FormData::default();
        form.fields.insert("title".to_string(), vec!["Old".to_string(), "Dune".to_string()]);
        form.fields.insert("blank".to_string(), vec!["  ".to_string()]);
        form.fields.insert("price".to_string(), vec![" 12.5 ".to_string()]);
        form.fields.insert("pages".to_string(), vec!["many".to_string()]);

        assert_eq!(form.text("title").as_deref(), Some("Dune"));
        assert_eq!(form.all("title").len(), 2);
        assert_eq!(form.text("blank"), None);
        assert_eq!(form.text("missing"), None);
        assert_eq!(form.number::<f64>("price").unwrap(), Some(12.5));
        assert_eq!(form.number::<i32>("missing").unwrap(), None);
        let err = form.number::<i32>("pages").unwrap_err();
        assert!(matches!(err, AppError::BadRequest(ref m) if m == "Invalid pages"));
    }
}
