//! Inbound validation
//!
//! Pure inspection of the request: path keys for read routes, form fields and
//! the attachment for the write route. Nothing here touches the network.

use bytes::Bytes;
use percent_encoding::percent_decode_str;
use std::borrow::Cow;
use std::collections::HashMap;

use crate::error::{AttachmentProblem, ValidationError};

/// 10 MiB, inclusive
pub const MAX_ATTACHMENT_BYTES: usize = 10 * 1024 * 1024;

/// A file part of a multipart form
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Attachment {
    pub file_name: Option<String>,
    pub content_type: Option<String>,
    pub data: Bytes,
}

/// One named value of a submitted form
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FormValue {
    Text(String),
    File(Attachment),
}

/// A decoded `multipart/form-data` body, keyed by field name
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FormSubmission {
    values: HashMap<String, FormValue>,
}

impl FormSubmission {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert a value; a repeated name replaces the earlier one
    pub fn insert(&mut self, name: impl Into<String>, value: FormValue) {
        self.values.insert(name.into(), value);
    }

    pub fn get(&self, name: &str) -> Option<&FormValue> {
        self.values.get(name)
    }
}

/// Requirements on the file part of a write route
#[derive(Debug, Clone, Copy)]
pub struct AttachmentRule {
    pub field: &'static str,
    pub content_type: &'static str,
    pub max_bytes: usize,
}

/// Requirements of a write route
#[derive(Debug, Clone, Copy)]
pub struct SubmitRules {
    /// Text fields, in the order they are forwarded upstream
    pub text_fields: &'static [&'static str],
    pub attachment: AttachmentRule,
}

/// A form that passed [`validate_submission`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidatedForm {
    /// `(name, value)` in forwarding order
    pub fields: Vec<(&'static str, String)>,
    pub attachment_field: &'static str,
    pub attachment: Attachment,
}

/// Require a non-empty path key
///
/// `value` is the raw path segment; it is percent-decoded once here so that
/// upstream and the fallback tables both see the plain key. A segment that is
/// not UTF-8 once decoded counts as missing.
pub fn require_key<'a>(
    name: &'static str,
    value: Option<&'a str>,
) -> Result<Cow<'a, str>, ValidationError> {
    let decoded = value
        .map(|raw| percent_decode_str(raw).decode_utf8())
        .transpose()
        .map_err(|_| ValidationError::MissingParameter(name))?;
    match decoded {
        Some(key) if !key.is_empty() => Ok(key),
        _ => Err(ValidationError::MissingParameter(name)),
    }
}

/// Check a submitted form against the route's rules
///
/// Order of checks: every required field present and non-empty, then the
/// attachment is a file, has the accepted content type, and fits the size cap.
pub fn validate_submission(
    form: &FormSubmission,
    rules: &SubmitRules,
) -> Result<ValidatedForm, ValidationError> {
    let mut fields = Vec::with_capacity(rules.text_fields.len());
    for &name in rules.text_fields {
        match form.get(name) {
            Some(FormValue::Text(v)) if !v.is_empty() => fields.push((name, v.clone())),
            _ => return Err(ValidationError::MissingField(name)),
        }
    }

    let rule = &rules.attachment;
    let attachment = match form.get(rule.field) {
        None => return Err(ValidationError::MissingField(rule.field)),
        Some(FormValue::Text(v)) if v.is_empty() => {
            return Err(ValidationError::MissingField(rule.field))
        }
        Some(FormValue::Text(_)) => {
            return Err(ValidationError::InvalidAttachment(AttachmentProblem::NotAFile))
        }
        Some(FormValue::File(file)) => file,
    };

    if !content_type_matches(attachment.content_type.as_deref(), rule.content_type) {
        return Err(ValidationError::InvalidAttachment(
            AttachmentProblem::WrongContentType,
        ));
    }

    if attachment.data.len() > rule.max_bytes {
        return Err(ValidationError::InvalidAttachment(AttachmentProblem::TooLarge));
    }

    Ok(ValidatedForm {
        fields,
        attachment_field: rule.field,
        attachment: attachment.clone(),
    })
}

/// Compare the media type essence, ignoring parameters and case
fn content_type_matches(actual: Option<&str>, expected: &str) -> bool {
    actual
        .and_then(|ct| ct.split(';').next())
        .is_some_and(|essence| essence.trim().eq_ignore_ascii_case(expected))
}

#[cfg(test)]
mod tests {
    use super::*;

    const RULES: SubmitRules = SubmitRules {
        text_fields: &["name", "email"],
        attachment: AttachmentRule {
            field: "cv",
            content_type: "application/pdf",
            max_bytes: MAX_ATTACHMENT_BYTES,
        },
    };

    fn pdf(size: usize) -> FormValue {
        FormValue::File(Attachment {
            file_name: Some("cv.pdf".to_string()),
            content_type: Some("application/pdf".to_string()),
            data: Bytes::from(vec![0u8; size]),
        })
    }

    fn form_with(cv: Option<FormValue>) -> FormSubmission {
        let mut form = FormSubmission::new();
        form.insert("name", FormValue::Text("Ana".to_string()));
        form.insert("email", FormValue::Text("ana@example.com".to_string()));
        if let Some(cv) = cv {
            form.insert("cv", cv);
        }
        form
    }

    #[test]
    fn accepts_complete_form() {
        let validated = validate_submission(&form_with(Some(pdf(16))), &RULES).unwrap();
        assert_eq!(
            validated.fields,
            vec![
                ("name", "Ana".to_string()),
                ("email", "ana@example.com".to_string())
            ]
        );
        assert_eq!(validated.attachment.data.len(), 16);
    }

    #[test]
    fn empty_text_counts_as_missing() {
        let mut form = form_with(Some(pdf(1)));
        form.insert("email", FormValue::Text(String::new()));
        assert_eq!(
            validate_submission(&form, &RULES),
            Err(ValidationError::MissingField("email"))
        );
    }

    #[test]
    fn missing_attachment_is_missing_field() {
        assert_eq!(
            validate_submission(&form_with(None), &RULES),
            Err(ValidationError::MissingField("cv"))
        );
    }

    #[test]
    fn text_in_place_of_file_is_rejected() {
        let form = form_with(Some(FormValue::Text("cv.pdf".to_string())));
        assert_eq!(
            validate_submission(&form, &RULES),
            Err(ValidationError::InvalidAttachment(AttachmentProblem::NotAFile))
        );
    }

    #[test]
    fn png_is_rejected() {
        let form = form_with(Some(FormValue::File(Attachment {
            file_name: Some("cv.png".to_string()),
            content_type: Some("image/png".to_string()),
            data: Bytes::from_static(b"\x89PNG"),
        })));
        let err = validate_submission(&form, &RULES).unwrap_err();
        assert_eq!(err.to_string(), "El CV debe ser un archivo PDF");
    }

    #[test]
    fn size_boundary_is_inclusive() {
        assert!(validate_submission(&form_with(Some(pdf(MAX_ATTACHMENT_BYTES))), &RULES).is_ok());
        assert_eq!(
            validate_submission(&form_with(Some(pdf(MAX_ATTACHMENT_BYTES + 1))), &RULES),
            Err(ValidationError::InvalidAttachment(AttachmentProblem::TooLarge))
        );
    }

    #[test]
    fn content_type_parameters_are_ignored() {
        assert!(content_type_matches(
            Some("Application/PDF; name=cv.pdf"),
            "application/pdf"
        ));
        assert!(!content_type_matches(None, "application/pdf"));
    }

    #[test]
    fn require_key_rejects_empty() {
        assert_eq!(require_key("slug", Some("ana")).unwrap(), "ana");
        assert_eq!(
            require_key("slug", Some("")),
            Err(ValidationError::MissingParameter("slug"))
        );
        assert_eq!(
            require_key("slug", None),
            Err(ValidationError::MissingParameter("slug"))
        );
    }

    #[test]
    fn require_key_is_percent_decoded_once() {
        assert_eq!(require_key("slug", Some("hola%20mundo")).unwrap(), "hola mundo");
        assert_eq!(require_key("slug", Some("dise%C3%B1o")).unwrap(), "diseño");
        assert_eq!(require_key("slug", Some("100%2525")).unwrap(), "100%25");
        assert_eq!(
            require_key("slug", Some("%FF%FE")),
            Err(ValidationError::MissingParameter("slug"))
        );
    }
}
