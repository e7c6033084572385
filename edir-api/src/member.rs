use std::str::FromStr;

use uuid::Uuid;

use crate::{Error, Time, STUB_UUID};

#[derive(Clone, Copy, Debug, Eq, Hash, PartialEq, serde::Deserialize, serde::Serialize)]
pub struct MemberId(pub Uuid);

impl MemberId {
    pub fn stub() -> MemberId {
        MemberId(STUB_UUID)
    }
}

#[derive(Clone, Copy, Debug, Eq, PartialEq, serde::Deserialize, serde::Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    Member,
    Admin,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::Member => "member",
            Role::Admin => "admin",
        }
    }
}

impl FromStr for Role {
    type Err = Error;

    fn from_str(s: &str) -> Result<Role, Error> {
        match s {
            "member" => Ok(Role::Member),
            "admin" => Ok(Role::Admin),
            _ => Err(Error::InvalidRole(String::from(s))),
        }
    }
}

#[derive(Clone, Debug, Eq, PartialEq, serde::Deserialize, serde::Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Member {
    pub id: MemberId,
    pub name: String,
    pub contact: String,
    pub role: Role,
    pub verified: bool,
    pub created_at: Time,
}

#[derive(Clone, Debug, serde::Deserialize, serde::Serialize)]
#[serde(rename_all = "camelCase")]
pub struct NewMember {
    pub id: MemberId,
    pub name: String,
    pub contact: String,
    pub password: String,
    pub role: Role,
}

impl NewMember {
    pub fn new(name: String, contact: String, password: String, role: Role) -> NewMember {
        NewMember {
            id: MemberId(Uuid::new_v4()),
            name,
            contact,
            password,
            role,
        }
    }

    pub fn validate(&self) -> Result<(), Error> {
        crate::validate_string(&self.name)?;
        crate::validate_string(&self.contact)?;
        crate::validate_string(&self.password)?;
        validate_name(&self.name)?;
        validate_contact(&self.contact)?;
        if self.password.len() < 8 {
            return Err(Error::PasswordTooShort);
        }
        Ok(())
    }
}

/// Partial update; absent fields keep their stored value.
#[derive(Clone, Debug, Default, serde::Deserialize, serde::Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MemberUpdate {
    pub name: Option<String>,
    pub contact: Option<String>,
    pub role: Option<Role>,
    pub verified: Option<bool>,
}

impl MemberUpdate {
    pub fn validate(&self) -> Result<(), Error> {
        if let Some(name) = &self.name {
            crate::validate_string(name)?;
            validate_name(name)?;
        }
        if let Some(contact) = &self.contact {
            crate::validate_string(contact)?;
            validate_contact(contact)?;
        }
        Ok(())
    }
}

/// 2 to 50 characters, letters, spaces, apostrophes and hyphens only.
fn validate_name(name: &str) -> Result<(), Error> {
    let len = name.chars().count();
    if len < 2
        || len > 50
        || !name
            .chars()
            .all(|c| c.is_ascii_alphabetic() || c == ' ' || c == '\'' || c == '-')
    {
        return Err(Error::InvalidName(String::from(name)));
    }
    Ok(())
}

/// Local `09xxxxxxxx` or international `+2519xxxxxxxx` phone numbers.
pub(crate) fn validate_contact(contact: &str) -> Result<(), Error> {
    let rest = contact
        .strip_prefix("09")
        .or_else(|| contact.strip_prefix("+2519"));
    match rest {
        Some(digits) if digits.len() == 8 && digits.chars().all(|c| c.is_ascii_digit()) => Ok(()),
        _ => Err(Error::InvalidContact(String::from(contact))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn new_member(name: &str, contact: &str, password: &str) -> NewMember {
        NewMember::new(
            String::from(name),
            String::from(contact),
            String::from(password),
            Role::Member,
        )
    }

    #[test]
    fn accepts_well_formed_members() {
        assert_eq!(
            new_member("Abebe Bikila", "0912345678", "s3cretpass").validate(),
            Ok(())
        );
        assert_eq!(
            new_member("O'Neil-Taye", "+251912345678", "longenough").validate(),
            Ok(())
        );
    }

    #[test]
    fn rejects_bad_names() {
        assert_eq!(
            new_member("A", "0912345678", "s3cretpass").validate(),
            Err(Error::InvalidName(String::from("A")))
        );
        assert_eq!(
            new_member("Ab3be", "0912345678", "s3cretpass").validate(),
            Err(Error::InvalidName(String::from("Ab3be")))
        );
        let long = "a".repeat(51);
        assert_eq!(
            new_member(&long, "0912345678", "s3cretpass").validate(),
            Err(Error::InvalidName(long))
        );
    }

    #[test]
    fn rejects_bad_contacts() {
        for contact in ["0812345678", "091234567", "09123456789", "+25191234567", "nine"] {
            assert_eq!(
                new_member("Abebe", contact, "s3cretpass").validate(),
                Err(Error::InvalidContact(String::from(contact)))
            );
        }
    }

    #[test]
    fn rejects_short_passwords() {
        assert_eq!(
            new_member("Abebe", "0912345678", "1234567").validate(),
            Err(Error::PasswordTooShort)
        );
    }

    #[test]
    fn role_parses_both_ways() {
        assert_eq!(Role::from_str("member"), Ok(Role::Member));
        assert_eq!(Role::from_str("admin"), Ok(Role::Admin));
        assert_eq!(Role::Admin.as_str(), "admin");
        assert!(Role::from_str("owner").is_err());
    }
}
