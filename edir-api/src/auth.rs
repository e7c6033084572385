use uuid::Uuid;

use crate::{Error, STUB_UUID};

#[derive(Clone, Debug, serde::Deserialize, serde::Serialize)]
pub struct NewSession {
    pub contact: String,
    pub password: String,
    pub device: String,
}

impl NewSession {
    pub fn new(contact: String, password: String, device: String) -> NewSession {
        NewSession {
            contact,
            password,
            device,
        }
    }

    pub fn validate(&self) -> Result<(), Error> {
        crate::validate_string(&self.contact)?;
        crate::validate_string(&self.password)?;
        crate::validate_string(&self.device)?;
        Ok(())
    }
}

#[derive(Clone, Copy, Debug, Eq, Hash, PartialEq, serde::Deserialize, serde::Serialize)]
pub struct AuthToken(pub Uuid);

impl AuthToken {
    pub fn stub() -> AuthToken {
        AuthToken(STUB_UUID)
    }
}

/// Single-use token handed out by the forgot-contact flow.
#[derive(Clone, Copy, Debug, Eq, Hash, PartialEq, serde::Deserialize, serde::Serialize)]
pub struct ResetToken(pub Uuid);

impl ResetToken {
    pub fn stub() -> ResetToken {
        ResetToken(STUB_UUID)
    }
}

#[derive(Clone, Debug, serde::Deserialize, serde::Serialize)]
pub struct ForgotContact {
    pub contact: String,
}

impl ForgotContact {
    pub fn validate(&self) -> Result<(), Error> {
        crate::validate_string(&self.contact)?;
        if self.contact.trim().is_empty() {
            return Err(Error::MissingField(String::from("contact")));
        }
        Ok(())
    }
}

/// The new contact has to pass the same checks as on registration.
#[derive(Clone, Debug, serde::Deserialize, serde::Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ResetContact {
    pub token: ResetToken,
    pub new_contact: String,
}

impl ResetContact {
    pub fn validate(&self) -> Result<(), Error> {
        crate::validate_string(&self.new_contact)?;
        crate::member::validate_contact(&self.new_contact)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reset_requires_a_well_formed_new_contact() {
        let reset = ResetContact {
            token: ResetToken(Uuid::new_v4()),
            new_contact: String::from("0912345678"),
        };
        assert!(reset.validate().is_ok());

        let reset = ResetContact {
            token: ResetToken(Uuid::new_v4()),
            new_contact: String::from("not-a-phone"),
        };
        assert_eq!(
            reset.validate(),
            Err(Error::InvalidContact(String::from("not-a-phone")))
        );
    }

    #[test]
    fn forgot_requires_a_contact() {
        let forgot = ForgotContact {
            contact: String::from("  "),
        };
        assert_eq!(
            forgot.validate(),
            Err(Error::MissingField(String::from("contact")))
        );
    }
}
