use uuid::Uuid;

use crate::{Error, MemberId, Time, STUB_UUID};

#[derive(Clone, Copy, Debug, Eq, Hash, PartialEq, serde::Deserialize, serde::Serialize)]
pub struct EventId(pub Uuid);

impl EventId {
    pub fn stub() -> EventId {
        EventId(STUB_UUID)
    }
}

#[derive(Clone, Debug, Eq, PartialEq, serde::Deserialize, serde::Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Event {
    pub id: EventId,
    pub name: String,
    pub date: Time,
    pub description: String,
    pub requires_contribution: bool,

    /// Members currently marked as attending, in the order they signed up.
    pub attendees: Vec<MemberId>,
}

#[derive(Clone, Debug, serde::Deserialize, serde::Serialize)]
#[serde(rename_all = "camelCase")]
pub struct NewEvent {
    pub name: String,
    pub date: Time,
    pub description: String,
    pub requires_contribution: bool,
}

impl NewEvent {
    pub fn validate(&self) -> Result<(), Error> {
        crate::validate_string(&self.name)?;
        crate::validate_string(&self.description)?;
        if self.name.trim().is_empty() {
            return Err(Error::MissingField(String::from("name")));
        }
        Ok(())
    }
}
