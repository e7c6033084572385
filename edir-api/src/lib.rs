use chrono::Utc;

pub use uuid::{uuid, Uuid};
pub type Time = chrono::DateTime<Utc>;

pub const STUB_UUID: Uuid = uuid!("ffffffff-ffff-ffff-ffff-ffffffffffff");

mod auth;
mod contribution;
mod error;
mod event;
mod feedback;
mod member;

pub use auth::{AuthToken, ForgotContact, NewSession, ResetContact, ResetToken};
pub use contribution::{Contribution, ContributionId, NewContribution};
pub use error::Error;
pub use event::{Event, EventId, NewEvent};
pub use feedback::{
    add_comment, coerce_rating, CommentId, CommentNode, EventFeedback, FeedbackId, FeedbackRecord,
    NewComment,
};
pub use member::{Member, MemberId, MemberUpdate, NewMember, Role};

pub fn validate_string(s: &str) -> Result<(), Error> {
    match s.contains('\0') {
        true => Err(Error::NullByteInString(String::from(s))),
        false => Ok(()),
    }
}
