use edir_api::{Error as ApiError, EventId, FeedbackId, MemberId};

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error(transparent)]
    Anyhow(#[from] anyhow::Error),

    #[error(transparent)]
    Api(#[from] ApiError),
}

impl Error {
    pub fn permission_denied() -> Error {
        Error::Api(ApiError::PermissionDenied)
    }

    pub fn missing_field(field: &str) -> Error {
        Error::Api(ApiError::MissingField(String::from(field)))
    }

    pub fn invalid_id(id: &str) -> Error {
        Error::Api(ApiError::InvalidId(String::from(id)))
    }

    pub fn contact_already_used(contact: String) -> Error {
        Error::Api(ApiError::ContactAlreadyUsed(contact))
    }

    pub fn member_not_found(member: MemberId) -> Error {
        Error::Api(ApiError::MemberNotFound(member.0))
    }

    pub fn event_not_found(event: EventId) -> Error {
        Error::Api(ApiError::EventNotFound(event.0))
    }

    pub fn feedback_not_found(feedback: FeedbackId) -> Error {
        Error::Api(ApiError::FeedbackNotFound(feedback.0))
    }

    pub fn contact_not_found(contact: &str) -> Error {
        Error::Api(ApiError::ContactNotFound(String::from(contact)))
    }

    pub fn reset_token_invalid() -> Error {
        Error::Api(ApiError::ResetTokenInvalid)
    }

    pub fn audio_not_found(filename: &str) -> Error {
        Error::Api(ApiError::AudioNotFound(String::from(filename)))
    }

    pub fn unsupported_media_type(mime: &str) -> Error {
        Error::Api(ApiError::UnsupportedMediaType(String::from(mime)))
    }

    pub fn payload_too_large(size: u64) -> Error {
        Error::Api(ApiError::PayloadTooLarge(size))
    }
}

impl axum::response::IntoResponse for Error {
    fn into_response(self) -> axum::response::Response {
        let err = match self {
            Error::Anyhow(err) => {
                tracing::error!(?err, "internal server error");
                #[cfg(not(test))]
                let err =
                    ApiError::Unknown(String::from("Internal server error, see logs for details"));
                #[cfg(test)]
                let err = ApiError::Unknown(format!("Internal server error: {err:?}"));
                err
            }
            Error::Api(err) => {
                tracing::info!("returning error to client: {err}");
                err
            }
        };
        (err.status_code(), err.contents()).into_response()
    }
}
