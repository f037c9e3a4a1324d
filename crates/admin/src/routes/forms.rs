//! Form plumbing shared by the catalog and promo pages.
//!
//! Product and promo forms are multipart because they carry an optional
//! image; everything else in them is plain text fields.

use axum::extract::Multipart;
use tracing::warn;

use brewline_core::Money;
use brewline_core::validation::ValidationError;
use brewline_platform::storage::{ImageUpload, StorageError};

use crate::error::AppError;
use crate::state::AppState;

/// Body limit for routes that accept an image (5 MB image plus fields).
pub const UPLOAD_BODY_LIMIT: usize = 6 * 1024 * 1024;

/// Name of the file input on product and promo forms.
const IMAGE_FIELD: &str = "image";

/// A fully read multipart submission.
#[derive(Debug, Default)]
pub struct MultipartForm {
    fields: Vec<(String, String)>,
    image: Option<Result<ImageUpload, StorageError>>,
}

impl MultipartForm {
    /// Drain the multipart stream. A file input left empty counts as no
    /// image; a rejected image is kept so the form can show why.
    ///
    /// # Errors
    ///
    /// Returns `AppError::BadRequest` for a malformed body.
    pub async fn read(mut multipart: Multipart) -> Result<Self, AppError> {
        let mut form = Self::default();
        while let Some(field) = multipart
            .next_field()
            .await
            .map_err(|e| AppError::BadRequest(format!("invalid form data: {e}")))?
        {
            let name = field.name().unwrap_or_default().to_owned();
            if name == IMAGE_FIELD {
                let file_name = field.file_name().map(str::to_owned);
                let content_type = field.content_type().map(str::to_owned);
                let bytes = field
                    .bytes()
                    .await
                    .map_err(|e| AppError::BadRequest(format!("invalid image upload: {e}")))?;
                if bytes.is_empty() {
                    continue;
                }
                form.image = Some(ImageUpload::new(
                    file_name.as_deref(),
                    content_type.as_deref(),
                    bytes.to_vec(),
                ));
            } else {
                let value = field
                    .text()
                    .await
                    .map_err(|e| AppError::BadRequest(format!("invalid form field: {e}")))?;
                form.fields.push((name, value));
            }
        }
        Ok(form)
    }

    /// First value for `name`, or `""`.
    #[must_use]
    pub fn text(&self, name: &str) -> &str {
        self.fields
            .iter()
            .find(|(key, _)| key == name)
            .map_or("", |(_, value)| value.as_str())
    }

    /// Every value for a repeated field (checkbox lists).
    pub fn all<'a>(&'a self, name: &'a str) -> impl Iterator<Item = &'a str> + 'a {
        self.fields
            .iter()
            .filter(move |(key, _)| key == name)
            .map(|(_, value)| value.as_str())
    }

    /// Whether a checkbox was ticked.
    #[must_use]
    pub fn checked(&self, name: &str) -> bool {
        self.fields.iter().any(|(key, _)| key == name)
    }

    /// Take the uploaded image, if any.
    pub const fn take_image(&mut self) -> Option<Result<ImageUpload, StorageError>> {
        self.image.take()
    }

    #[cfg(test)]
    pub(crate) fn from_pairs(pairs: &[(&str, &str)]) -> Self {
        Self {
            fields: pairs
                .iter()
                .map(|(k, v)| ((*k).to_owned(), (*v).to_owned()))
                .collect(),
            image: None,
        }
    }
}

/// Required money field; records an error and yields zero when invalid.
pub fn money_field(errors: &mut ValidationError, field: &'static str, raw: &str) -> Money {
    if raw.trim().is_empty() {
        errors.push(field, "This field is required");
        return Money::ZERO;
    }
    Money::parse(raw).unwrap_or_else(|e| {
        errors.push(field, format!("Enter an amount like 25.000 ({e})"));
        Money::ZERO
    })
}

/// Optional money field; blank means unset.
pub fn optional_money_field(
    errors: &mut ValidationError,
    field: &'static str,
    raw: &str,
) -> Option<Money> {
    if raw.trim().is_empty() {
        return None;
    }
    Some(money_field(errors, field, raw))
}

/// Integer field with a default for blank input.
pub fn int_field(errors: &mut ValidationError, field: &'static str, raw: &str, default: i32) -> i32 {
    let raw = raw.trim();
    if raw.is_empty() {
        return default;
    }
    raw.parse().unwrap_or_else(|_| {
        errors.push(field, "Enter a whole number");
        default
    })
}

/// Optional id from a `<select>` whose empty option means none.
pub fn optional_id_field<T: std::str::FromStr>(
    errors: &mut ValidationError,
    field: &'static str,
    raw: &str,
) -> Option<T> {
    let raw = raw.trim();
    if raw.is_empty() {
        return None;
    }
    raw.parse().map_or_else(
        |_| {
            errors.push(field, "Pick a valid entry");
            None
        },
        Some,
    )
}

/// Upload an accepted image under `folder` and return its public URL.
///
/// # Errors
///
/// Returns `AppError::Storage` if the upload fails.
pub async fn store_image(
    state: &AppState,
    upload: ImageUpload,
    folder: &str,
) -> Result<String, AppError> {
    let path = upload.object_path(folder);
    let content_type = upload.content_type();
    let url = state
        .storage()
        .upload(&path, upload.into_bytes(), content_type)
        .await?;
    Ok(url)
}

/// Delete a replaced or orphaned image. Only logs on failure: the row
/// change it belongs to has already been committed.
pub async fn discard_image(state: &AppState, url: Option<&str>) {
    let Some(path) = url.and_then(|url| state.storage().path_from_public_url(url)) else {
        return;
    };
    if let Err(e) = state.storage().remove(std::slice::from_ref(&path)).await {
        warn!(path = %path, error = %e, "Failed to remove stored image");
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use axum::body::Body;
    use axum::extract::FromRequest;
    use axum::http::{Request, header};

    use super::*;

    const BOUNDARY: &str = "brewline-test-boundary";

    fn multipart_request(body: String) -> Request<Body> {
        Request::post("/products")
            .header(
                header::CONTENT_TYPE,
                format!("multipart/form-data; boundary={BOUNDARY}"),
            )
            .body(Body::from(body))
            .unwrap()
    }

    fn text_part(name: &str, value: &str) -> String {
        format!(
            "--{BOUNDARY}\r\nContent-Disposition: form-data; name=\"{name}\"\r\n\r\n{value}\r\n"
        )
    }

    #[tokio::test]
    async fn test_reads_repeated_fields_and_skips_empty_file() {
        let body = format!(
            "{}{}{}--{BOUNDARY}\r\nContent-Disposition: form-data; name=\"image\"; \
             filename=\"\"\r\nContent-Type: application/octet-stream\r\n\r\n\r\n--{BOUNDARY}--\r\n",
            text_part("name", "Kopi Susu Gula Aren"),
            text_part("option_group_ids", "1"),
            text_part("option_group_ids", "3"),
        );
        let multipart = Multipart::from_request(multipart_request(body), &())
            .await
            .unwrap();
        let mut form = MultipartForm::read(multipart).await.unwrap();

        assert_eq!(form.text("name"), "Kopi Susu Gula Aren");
        assert_eq!(form.all("option_group_ids").collect::<Vec<_>>(), ["1", "3"]);
        assert!(form.take_image().is_none());
        assert_eq!(form.text("missing"), "");
    }

    #[tokio::test]
    async fn test_unsupported_image_is_kept_as_error() {
        let body = format!(
            "--{BOUNDARY}\r\nContent-Disposition: form-data; name=\"image\"; \
             filename=\"menu.gif\"\r\nContent-Type: image/gif\r\n\r\nGIF89a\r\n--{BOUNDARY}--\r\n"
        );
        let multipart = Multipart::from_request(multipart_request(body), &())
            .await
            .unwrap();
        let mut form = MultipartForm::read(multipart).await.unwrap();

        assert!(matches!(
            form.take_image(),
            Some(Err(StorageError::UnsupportedType(_)))
        ));
    }

    #[test]
    fn test_field_parsers_collect_errors() {
        let form = MultipartForm::from_pairs(&[
            ("price", "25.000"),
            ("discount_price", ""),
            ("stock", "lots"),
            ("is_available", "on"),
        ]);
        let mut errors = ValidationError::default();

        assert_eq!(
            money_field(&mut errors, "price", form.text("price")),
            Money::rupiah(25_000)
        );
        assert_eq!(
            optional_money_field(&mut errors, "discount_price", form.text("discount_price")),
            None
        );
        assert_eq!(int_field(&mut errors, "stock", form.text("stock"), 0), 0);
        assert!(form.checked("is_available"));
        assert!(!form.checked("is_featured"));

        assert_eq!(errors.errors().len(), 1);
        assert_eq!(errors.message_for("stock"), Some("Enter a whole number"));
    }

    #[test]
    fn test_blank_required_money_is_reported() {
        let mut errors = ValidationError::default();
        assert_eq!(money_field(&mut errors, "price", "  "), Money::ZERO);
        assert_eq!(errors.message_for("price"), Some("This field is required"));

        let mut errors = ValidationError::default();
        let id: Option<i32> = optional_id_field(&mut errors, "category_id", "");
        assert_eq!(id, None);
        assert!(errors.is_empty());
    }
}
