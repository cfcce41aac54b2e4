// Multipart form decoding
// Turns a buffered `multipart/form-data` body into a FormSubmission

use bytes::Bytes;
use std::convert::Infallible;

use crate::error::ValidationError;
use crate::gateway::validate::{Attachment, FormSubmission, FormValue};

/// Decode a buffered body
///
/// Parts with a filename become attachments, the rest text fields. A
/// repeated name keeps the last occurrence.
pub async fn parse_form(
    content_type: Option<&str>,
    body: Bytes,
) -> Result<FormSubmission, ValidationError> {
    let content_type = content_type
        .ok_or_else(|| ValidationError::MalformedForm("missing content type".to_string()))?;
    let boundary = multer::parse_boundary(content_type).map_err(malformed)?;

    let stream = futures::stream::once(async move { Ok::<Bytes, Infallible>(body) });
    let mut multipart = multer::Multipart::new(stream, boundary);

    let mut form = FormSubmission::new();
    while let Some(field) = multipart.next_field().await.map_err(malformed)? {
        let Some(name) = field.name().map(ToString::to_string) else {
            continue;
        };
        let file_name = field.file_name().map(ToString::to_string);
        let part_type = field.content_type().map(ToString::to_string);
        let data = field.bytes().await.map_err(malformed)?;

        let value = if file_name.is_some() {
            FormValue::File(Attachment {
                file_name,
                content_type: part_type,
                data,
            })
        } else {
            let text = String::from_utf8(data.to_vec()).map_err(malformed)?;
            FormValue::Text(text)
        };
        form.insert(name, value);
    }
    Ok(form)
}

fn malformed(err: impl std::fmt::Display) -> ValidationError {
    ValidationError::MalformedForm(err.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    const BOUNDARY: &str = "X-GATEWAY-BOUNDARY";

    fn body(parts: &[(&str, Option<(&str, &str)>, &[u8])]) -> Bytes {
        let mut out = Vec::new();
        for (name, file, data) in parts {
            out.extend_from_slice(format!("--{BOUNDARY}\r\n").as_bytes());
            match file {
                Some((file_name, content_type)) => out.extend_from_slice(
                    format!(
                        "Content-Disposition: form-data; name=\"{name}\"; filename=\"{file_name}\"\r\nContent-Type: {content_type}\r\n\r\n"
                    )
                    .as_bytes(),
                ),
                None => out.extend_from_slice(
                    format!("Content-Disposition: form-data; name=\"{name}\"\r\n\r\n").as_bytes(),
                ),
            }
            out.extend_from_slice(data);
            out.extend_from_slice(b"\r\n");
        }
        out.extend_from_slice(format!("--{BOUNDARY}--\r\n").as_bytes());
        Bytes::from(out)
    }

    fn content_type() -> String {
        format!("multipart/form-data; boundary={BOUNDARY}")
    }

    #[tokio::test]
    async fn text_and_file_parts_are_separated() {
        let body = body(&[
            ("name", None, &b"Ana"[..]),
            ("cv", Some(("cv.pdf", "application/pdf")), &b"%PDF-1.4 data"[..]),
        ]);
        let form = parse_form(Some(&content_type()), body).await.unwrap();

        assert!(form.get("email").is_none());
        assert_eq!(form.get("name"), Some(&FormValue::Text("Ana".to_string())));
        let Some(FormValue::File(cv)) = form.get("cv") else {
            panic!("cv should be a file part");
        };
        assert_eq!(cv.file_name.as_deref(), Some("cv.pdf"));
        assert_eq!(cv.content_type.as_deref(), Some("application/pdf"));
        assert_eq!(cv.data, Bytes::from_static(b"%PDF-1.4 data"));
    }

    #[tokio::test]
    async fn last_repeated_field_wins() {
        let body = body(&[("email", None, &b"first@x.com"[..]), ("email", None, &b"second@x.com"[..])]);
        let form = parse_form(Some(&content_type()), body).await.unwrap();
        assert_eq!(
            form.get("email"),
            Some(&FormValue::Text("second@x.com".to_string()))
        );
    }

    #[tokio::test]
    async fn non_multipart_is_malformed() {
        let err = parse_form(Some("application/json"), Bytes::from_static(b"{}"))
            .await
            .unwrap_err();
        assert!(matches!(err, ValidationError::MalformedForm(_)));

        let err = parse_form(None, Bytes::new()).await.unwrap_err();
        assert_eq!(err.to_string(), "Formulario inválido");
    }

    #[tokio::test]
    async fn truncated_body_is_malformed() {
        let truncated = Bytes::from(format!(
            "--{BOUNDARY}\r\nContent-Disposition: form-data; name=\"name\"\r\n\r\nAna"
        ));
        let result = parse_form(Some(&content_type()), truncated).await;
        assert!(matches!(result, Err(ValidationError::MalformedForm(_))));
    }
}
