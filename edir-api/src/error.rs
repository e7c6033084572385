use std::str::FromStr;

use anyhow::{anyhow, Context};
use serde_json::json;
use uuid::Uuid;

#[derive(Debug, Eq, PartialEq, thiserror::Error)]
pub enum Error {
    #[error("Unknown error: {0}")]
    Unknown(String),

    #[error("Permission denied")]
    PermissionDenied,

    #[error("Missing required field {0:?}")]
    MissingField(String),

    #[error("Invalid identifier {0:?}")]
    InvalidId(String),

    #[error("Invalid member name {0:?}")]
    InvalidName(String),

    #[error("Invalid contact number {0:?}")]
    InvalidContact(String),

    #[error("Invalid role {0:?}")]
    InvalidRole(String),

    #[error("Password is too short")]
    PasswordTooShort,

    #[error("Null byte in string is not allowed {0:?}")]
    NullByteInString(String),

    #[error("Reset token is invalid or expired")]
    ResetTokenInvalid,

    #[error("Contact already used {0}")]
    ContactAlreadyUsed(String),

    #[error("Uuid already used {0}")]
    UuidAlreadyUsed(Uuid),

    #[error("Member not found {0}")]
    MemberNotFound(Uuid),

    #[error("No member with contact {0:?}")]
    ContactNotFound(String),

    #[error("Event not found {0}")]
    EventNotFound(Uuid),

    #[error("Feedback not found {0}")]
    FeedbackNotFound(Uuid),

    #[error("Parent comment not found {0}")]
    ParentCommentNotFound(Uuid),

    #[error("Audio file not found {0:?}")]
    AudioNotFound(String),

    #[error("Unsupported media type {0:?}")]
    UnsupportedMediaType(String),

    #[error("Payload too large ({0} bytes)")]
    PayloadTooLarge(u64),
}

impl Error {
    pub fn status_code(&self) -> http::StatusCode {
        use http::StatusCode;
        match self {
            Error::Unknown(_) => StatusCode::INTERNAL_SERVER_ERROR,
            Error::PermissionDenied => StatusCode::FORBIDDEN,
            Error::MissingField(_) => StatusCode::BAD_REQUEST,
            Error::InvalidId(_) => StatusCode::BAD_REQUEST,
            Error::InvalidName(_) => StatusCode::BAD_REQUEST,
            Error::InvalidContact(_) => StatusCode::BAD_REQUEST,
            Error::InvalidRole(_) => StatusCode::BAD_REQUEST,
            Error::PasswordTooShort => StatusCode::BAD_REQUEST,
            Error::NullByteInString(_) => StatusCode::BAD_REQUEST,
            Error::ResetTokenInvalid => StatusCode::BAD_REQUEST,
            Error::ContactAlreadyUsed(_) => StatusCode::CONFLICT,
            Error::UuidAlreadyUsed(_) => StatusCode::CONFLICT,
            Error::MemberNotFound(_) => StatusCode::NOT_FOUND,
            Error::ContactNotFound(_) => StatusCode::NOT_FOUND,
            Error::EventNotFound(_) => StatusCode::NOT_FOUND,
            Error::FeedbackNotFound(_) => StatusCode::NOT_FOUND,
            Error::ParentCommentNotFound(_) => StatusCode::NOT_FOUND,
            Error::AudioNotFound(_) => StatusCode::NOT_FOUND,
            Error::UnsupportedMediaType(_) => StatusCode::UNSUPPORTED_MEDIA_TYPE,
            Error::PayloadTooLarge(_) => StatusCode::PAYLOAD_TOO_LARGE,
        }
    }

    pub fn contents(&self) -> Vec<u8> {
        serde_json::to_vec(&match self {
            Error::Unknown(msg) => json!({
                "message": msg,
                "type": "unknown",
            }),
            Error::PermissionDenied => json!({
                "message": "permission denied",
                "type": "permission-denied",
            }),
            Error::MissingField(field) => json!({
                "message": "a required field is missing",
                "type": "missing-field",
                "field": field,
            }),
            Error::InvalidId(id) => json!({
                "message": "identifier is not a valid uuid",
                "type": "invalid-id",
                "id": id,
            }),
            Error::InvalidName(n) => json!({
                "message": "there was an invalid character in a member name",
                "type": "invalid-name",
                "name": n,
            }),
            Error::InvalidContact(c) => json!({
                "message": "contact is not a valid phone number",
                "type": "invalid-contact",
                "contact": c,
            }),
            Error::InvalidRole(r) => json!({
                "message": "role must be either member or admin",
                "type": "invalid-role",
                "role": r,
            }),
            Error::PasswordTooShort => json!({
                "message": "password is too short",
                "type": "password-too-short",
            }),
            Error::NullByteInString(s) => json!({
                "message": "there was a null byte in argument string",
                "type": "null-byte",
                "string": s,
            }),
            Error::ResetTokenInvalid => json!({
                "message": "reset token is invalid or expired",
                "type": "reset-token-invalid",
            }),
            Error::ContactAlreadyUsed(c) => json!({
                "message": "contact already used",
                "type": "conflict-contact",
                "contact": c,
            }),
            Error::UuidAlreadyUsed(u) => json!({
                "message": "uuid conflict",
                "type": "conflict-uuid",
                "uuid": u,
            }),
            Error::MemberNotFound(u) => json!({
                "message": "member not found",
                "type": "member-not-found",
                "uuid": u,
            }),
            Error::ContactNotFound(c) => json!({
                "message": "no member has this contact",
                "type": "contact-not-found",
                "contact": c,
            }),
            Error::EventNotFound(u) => json!({
                "message": "event not found",
                "type": "event-not-found",
                "uuid": u,
            }),
            Error::FeedbackNotFound(u) => json!({
                "message": "feedback not found",
                "type": "feedback-not-found",
                "uuid": u,
            }),
            Error::ParentCommentNotFound(u) => json!({
                "message": "parent comment not found",
                "type": "parent-comment-not-found",
                "uuid": u,
            }),
            Error::AudioNotFound(f) => json!({
                "message": "audio file not found",
                "type": "audio-not-found",
                "filename": f,
            }),
            Error::UnsupportedMediaType(m) => json!({
                "message": "only webm and mp3 audio is allowed",
                "type": "unsupported-media-type",
                "mime": m,
            }),
            Error::PayloadTooLarge(size) => json!({
                "message": "uploaded file exceeds the size limit",
                "type": "payload-too-large",
                "size": size,
            }),
        })
        .expect("serializing error contents")
    }

    pub fn parse(body: &[u8]) -> anyhow::Result<Error> {
        let data: serde_json::Value =
            serde_json::from_slice(body).context("parsing error contents")?;
        let get_str = |key: &str| -> anyhow::Result<String> {
            Ok(String::from(
                data.get(key)
                    .and_then(|v| v.as_str())
                    .ok_or_else(|| anyhow!("error contents has no string field {key:?}"))?,
            ))
        };
        let get_uuid = || -> anyhow::Result<Uuid> {
            data.get("uuid")
                .and_then(|u| u.as_str())
                .and_then(|u| Uuid::from_str(u).ok())
                .ok_or_else(|| anyhow!("error contents has no proper uuid"))
        };
        Ok(
            match data
                .get("type")
                .and_then(|t| t.as_str())
                .ok_or_else(|| anyhow!("error type is not a string"))?
            {
                "unknown" => Error::Unknown(String::from(
                    data.get("message")
                        .and_then(|msg| msg.as_str())
                        .unwrap_or(""),
                )),
                "permission-denied" => Error::PermissionDenied,
                "missing-field" => Error::MissingField(get_str("field")?),
                "invalid-id" => Error::InvalidId(get_str("id")?),
                "invalid-name" => Error::InvalidName(get_str("name")?),
                "invalid-contact" => Error::InvalidContact(get_str("contact")?),
                "invalid-role" => Error::InvalidRole(get_str("role")?),
                "password-too-short" => Error::PasswordTooShort,
                "null-byte" => Error::NullByteInString(get_str("string")?),
                "reset-token-invalid" => Error::ResetTokenInvalid,
                "conflict-contact" => Error::ContactAlreadyUsed(get_str("contact")?),
                "conflict-uuid" => Error::UuidAlreadyUsed(get_uuid()?),
                "member-not-found" => Error::MemberNotFound(get_uuid()?),
                "contact-not-found" => Error::ContactNotFound(get_str("contact")?),
                "event-not-found" => Error::EventNotFound(get_uuid()?),
                "feedback-not-found" => Error::FeedbackNotFound(get_uuid()?),
                "parent-comment-not-found" => Error::ParentCommentNotFound(get_uuid()?),
                "audio-not-found" => Error::AudioNotFound(get_str("filename")?),
                "unsupported-media-type" => Error::UnsupportedMediaType(get_str("mime")?),
                "payload-too-large" => Error::PayloadTooLarge(
                    data.get("size")
                        .and_then(|s| s.as_u64())
                        .ok_or_else(|| anyhow!("error contents has no proper size"))?,
                ),
                _ => return Err(anyhow!("error contents has unknown type")),
            },
        )
    }
}
