use uuid::Uuid;

use crate::{Error, EventId, MemberId, Time, STUB_UUID};

#[derive(Clone, Copy, Debug, Eq, Hash, PartialEq, serde::Deserialize, serde::Serialize)]
pub struct ContributionId(pub Uuid);

impl ContributionId {
    pub fn stub() -> ContributionId {
        ContributionId(STUB_UUID)
    }
}

#[derive(Clone, Debug, PartialEq, serde::Deserialize, serde::Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Contribution {
    pub id: ContributionId,
    pub member_id: MemberId,
    pub event_id: EventId,
    pub amount: f64,
    pub date: Time,

    /// Free-form contribution kind, e.g. "monthly" or "event".
    #[serde(rename = "type")]
    pub kind: String,
}

#[derive(Clone, Debug, serde::Deserialize, serde::Serialize)]
#[serde(rename_all = "camelCase")]
pub struct NewContribution {
    pub member_id: MemberId,
    pub event_id: EventId,
    pub amount: f64,
    pub date: Time,
    #[serde(rename = "type")]
    pub kind: String,
}

impl NewContribution {
    pub fn validate(&self) -> Result<(), Error> {
        crate::validate_string(&self.kind)?;
        if self.kind.trim().is_empty() {
            return Err(Error::MissingField(String::from("type")));
        }
        Ok(())
    }
}
