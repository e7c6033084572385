use anyhow::{anyhow, Context};
use chrono::Utc;
use futures::TryStreamExt;
use sqlx::Row;

use edir_api::{
    add_comment, AuthToken, CommentId, CommentNode, Contribution, ContributionId, Event,
    EventFeedback, EventId, FeedbackId, FeedbackRecord, Member, MemberId, MemberUpdate,
    NewContribution, NewEvent, NewMember, NewSession, ResetToken, Role, Uuid,
};

use crate::{extractors::Caller, Error};

/// Optimistic comment appends rarely collide at human interaction rates;
/// a handful of retries is plenty.
const COMMENT_RETRIES: usize = 5;

fn member_from_row(row: &sqlx::postgres::PgRow) -> anyhow::Result<Member> {
    let role: String = row.try_get("role").context("retrieving the role field")?;
    Ok(Member {
        id: MemberId(row.try_get("id").context("retrieving the id field")?),
        name: row.try_get("name").context("retrieving the name field")?,
        contact: row
            .try_get("contact")
            .context("retrieving the contact field")?,
        role: role
            .parse::<Role>()
            .map_err(|_| anyhow!("invalid role {:?} in members table", role))?,
        verified: row
            .try_get("verified")
            .context("retrieving the verified field")?,
        created_at: row
            .try_get("created_at")
            .context("retrieving the created_at field")?,
    })
}

fn event_from_row(row: &sqlx::postgres::PgRow) -> anyhow::Result<Event> {
    Ok(Event {
        id: EventId(row.try_get("id").context("retrieving the id field")?),
        name: row.try_get("name").context("retrieving the name field")?,
        date: row.try_get("date").context("retrieving the date field")?,
        description: row
            .try_get("description")
            .context("retrieving the description field")?,
        requires_contribution: row
            .try_get("requires_contribution")
            .context("retrieving the requires_contribution field")?,
        attendees: row
            .try_get::<Vec<Uuid>, _>("attendees")
            .context("retrieving the attendees field")?
            .into_iter()
            .map(MemberId)
            .collect(),
    })
}

fn contribution_from_row(row: &sqlx::postgres::PgRow) -> anyhow::Result<Contribution> {
    Ok(Contribution {
        id: ContributionId(row.try_get("id").context("retrieving the id field")?),
        member_id: MemberId(
            row.try_get("member_id")
                .context("retrieving the member_id field")?,
        ),
        event_id: EventId(
            row.try_get("event_id")
                .context("retrieving the event_id field")?,
        ),
        amount: row
            .try_get("amount")
            .context("retrieving the amount field")?,
        date: row.try_get("date").context("retrieving the date field")?,
        kind: row.try_get("kind").context("retrieving the kind field")?,
    })
}

fn feedback_from_row(row: &sqlx::postgres::PgRow) -> anyhow::Result<FeedbackRecord> {
    Ok(FeedbackRecord {
        id: FeedbackId(row.try_get("id").context("retrieving the id field")?),
        event_id: EventId(
            row.try_get("event_id")
                .context("retrieving the event_id field")?,
        ),
        member_id: MemberId(
            row.try_get("member_id")
                .context("retrieving the member_id field")?,
        ),
        text: row.try_get("text").context("retrieving the text field")?,
        audio: row.try_get("audio").context("retrieving the audio field")?,
        rating: row
            .try_get("rating")
            .context("retrieving the rating field")?,
        likes: row.try_get("likes").context("retrieving the likes field")?,
        dislikes: row
            .try_get("dislikes")
            .context("retrieving the dislikes field")?,
        comments: serde_json::from_value(
            row.try_get("comments")
                .context("retrieving the comments field")?,
        )
        .context("decoding the comment tree")?,
        created_at: row
            .try_get("created_at")
            .context("retrieving the created_at field")?,
    })
}

pub async fn create_member(
    conn: &mut sqlx::PgConnection,
    m: &NewMember,
    password_hash: String,
) -> Result<Member, Error> {
    if sqlx::query("SELECT 1 FROM members WHERE contact = $1")
        .bind(&m.contact)
        .fetch_optional(&mut *conn)
        .await
        .context("checking for contact conflicts")?
        .is_some()
    {
        return Err(Error::contact_already_used(m.contact.clone()));
    }
    if sqlx::query("SELECT 1 FROM members WHERE id = $1")
        .bind(m.id.0)
        .fetch_optional(&mut *conn)
        .await
        .context("checking for id conflicts")?
        .is_some()
    {
        return Err(Error::Api(edir_api::Error::UuidAlreadyUsed(m.id.0)));
    }
    let row = sqlx::query(
        "
            INSERT INTO members (id, name, contact, password_hash, role)
            VALUES ($1, $2, $3, $4, $5)
            RETURNING created_at
        ",
    )
    .bind(m.id.0)
    .bind(&m.name)
    .bind(&m.contact)
    .bind(password_hash)
    .bind(m.role.as_str())
    .fetch_one(&mut *conn)
    .await
    .with_context(|| format!("inserting member {:?}", m.id))?;
    Ok(Member {
        id: m.id,
        name: m.name.clone(),
        contact: m.contact.clone(),
        role: m.role,
        verified: false,
        created_at: row
            .try_get("created_at")
            .context("retrieving the created_at field")?,
    })
}

pub async fn fetch_members(conn: &mut sqlx::PgConnection) -> anyhow::Result<Vec<Member>> {
    let mut rows = sqlx::query(
        "SELECT id, name, contact, role, verified, created_at FROM members ORDER BY created_at",
    )
    .fetch(&mut *conn);
    let mut members = Vec::new();
    while let Some(row) = rows.try_next().await.context("querying members table")? {
        members.push(member_from_row(&row)?);
    }
    Ok(members)
}

pub async fn update_member(
    conn: &mut sqlx::PgConnection,
    id: MemberId,
    update: &MemberUpdate,
) -> Result<Member, Error> {
    let row = sqlx::query(
        "
            UPDATE members
            SET name = COALESCE($2, name),
                contact = COALESCE($3, contact),
                role = COALESCE($4, role),
                verified = COALESCE($5, verified)
            WHERE id = $1
            RETURNING id, name, contact, role, verified, created_at
        ",
    )
    .bind(id.0)
    .bind(update.name.as_deref())
    .bind(update.contact.as_deref())
    .bind(update.role.map(|r| r.as_str()))
    .bind(update.verified)
    .fetch_optional(&mut *conn)
    .await
    .with_context(|| format!("updating member {:?}", id))?
    .ok_or_else(|| Error::member_not_found(id))?;
    Ok(member_from_row(&row)?)
}

pub async fn delete_member(conn: &mut sqlx::PgConnection, id: MemberId) -> Result<(), Error> {
    let res = sqlx::query("DELETE FROM members WHERE id = $1")
        .bind(id.0)
        .execute(&mut *conn)
        .await
        .with_context(|| format!("deleting member {:?}", id))?;
    match res.rows_affected() {
        0 => Err(Error::member_not_found(id)),
        _ => Ok(()),
    }
}

pub async fn login_member(
    conn: &mut sqlx::PgConnection,
    s: &NewSession,
) -> anyhow::Result<Option<AuthToken>> {
    let row = sqlx::query("SELECT id, password_hash FROM members WHERE contact = $1")
        .bind(&s.contact)
        .fetch_optional(&mut *conn)
        .await
        .context("querying members table")?;
    let row = match row {
        Some(row) => row,
        None => return Ok(None),
    };
    let hash: String = row
        .try_get("password_hash")
        .context("retrieving the password_hash field")?;
    if !bcrypt::verify(&s.password, &hash).context("verifying password hash")? {
        return Ok(None);
    }
    let member: Uuid = row.try_get("id").context("retrieving the id field")?;
    let token = AuthToken(Uuid::new_v4());
    sqlx::query("INSERT INTO sessions (token, member_id, device) VALUES ($1, $2, $3)")
        .bind(token.0)
        .bind(member)
        .bind(&s.device)
        .execute(&mut *conn)
        .await
        .context("inserting session")?;
    Ok(Some(token))
}

pub async fn logout_member(
    conn: &mut sqlx::PgConnection,
    token: &AuthToken,
) -> anyhow::Result<bool> {
    let res = sqlx::query("DELETE FROM sessions WHERE token = $1")
        .bind(token.0)
        .execute(&mut *conn)
        .await
        .context("deleting session")?;
    Ok(res.rows_affected() > 0)
}

pub async fn recover_session(
    conn: &mut sqlx::PgConnection,
    token: AuthToken,
) -> Result<Caller, Error> {
    let row = sqlx::query(
        "
            SELECT m.id, m.role
                FROM sessions s
            INNER JOIN members m
                ON m.id = s.member_id
            WHERE s.token = $1
        ",
    )
    .bind(token.0)
    .fetch_optional(&mut *conn)
    .await
    .context("querying sessions table")?
    .ok_or_else(Error::permission_denied)?;
    let role: String = row.try_get("role").context("retrieving the role field")?;
    Ok(Caller {
        member: MemberId(row.try_get("id").context("retrieving the id field")?),
        role: role
            .parse::<Role>()
            .map_err(|_| anyhow!("invalid role {:?} in members table", role))?,
    })
}

/// Issues a single-use contact-recovery token, valid for one hour.
pub async fn create_contact_reset(
    conn: &mut sqlx::PgConnection,
    contact: &str,
) -> Result<ResetToken, Error> {
    let row = sqlx::query("SELECT id FROM members WHERE contact = $1")
        .bind(contact)
        .fetch_optional(&mut *conn)
        .await
        .context("querying members table")?
        .ok_or_else(|| Error::contact_not_found(contact))?;
    let member: Uuid = row.try_get("id").context("retrieving the id field")?;
    let token = ResetToken(Uuid::new_v4());
    sqlx::query(
        "
            INSERT INTO contact_resets (token, member_id, expires_at)
            VALUES ($1, $2, NOW() + INTERVAL '1 hour')
        ",
    )
    .bind(token.0)
    .bind(member)
    .execute(&mut *conn)
    .await
    .context("inserting contact reset token")?;
    Ok(token)
}

/// Consumes the token and rewrites the member's contact. Expired or unknown
/// tokens are indistinguishable to the caller; a used token is deleted even
/// when the new contact then turns out to be taken.
pub async fn reset_contact(
    conn: &mut sqlx::PgConnection,
    token: ResetToken,
    new_contact: &str,
) -> Result<(), Error> {
    let row = sqlx::query(
        "DELETE FROM contact_resets WHERE token = $1 AND expires_at > NOW() RETURNING member_id",
    )
    .bind(token.0)
    .fetch_optional(&mut *conn)
    .await
    .context("consuming contact reset token")?
    .ok_or_else(Error::reset_token_invalid)?;
    let member: Uuid = row
        .try_get("member_id")
        .context("retrieving the member_id field")?;
    if sqlx::query("SELECT 1 FROM members WHERE contact = $1 AND id <> $2")
        .bind(new_contact)
        .bind(member)
        .fetch_optional(&mut *conn)
        .await
        .context("checking for contact conflicts")?
        .is_some()
    {
        return Err(Error::contact_already_used(String::from(new_contact)));
    }
    sqlx::query("UPDATE members SET contact = $2 WHERE id = $1")
        .bind(member)
        .bind(new_contact)
        .execute(&mut *conn)
        .await
        .with_context(|| format!("rewriting contact of member {:?}", member))?;
    Ok(())
}

pub async fn create_event(conn: &mut sqlx::PgConnection, e: &NewEvent) -> anyhow::Result<Event> {
    let id = EventId(Uuid::new_v4());
    sqlx::query(
        "
            INSERT INTO events (id, name, date, description, requires_contribution)
            VALUES ($1, $2, $3, $4, $5)
        ",
    )
    .bind(id.0)
    .bind(&e.name)
    .bind(e.date)
    .bind(&e.description)
    .bind(e.requires_contribution)
    .execute(&mut *conn)
    .await
    .with_context(|| format!("inserting event {:?}", id))?;
    Ok(Event {
        id,
        name: e.name.clone(),
        date: e.date,
        description: e.description.clone(),
        requires_contribution: e.requires_contribution,
        attendees: Vec::new(),
    })
}

pub async fn fetch_events(conn: &mut sqlx::PgConnection) -> anyhow::Result<Vec<Event>> {
    let mut rows = sqlx::query(
        "
            SELECT id, name, date, description, requires_contribution, attendees
                FROM events
            ORDER BY date
        ",
    )
    .fetch(&mut *conn);
    let mut events = Vec::new();
    while let Some(row) = rows.try_next().await.context("querying events table")? {
        events.push(event_from_row(&row)?);
    }
    Ok(events)
}

pub async fn update_event(
    conn: &mut sqlx::PgConnection,
    id: EventId,
    e: &NewEvent,
) -> Result<Event, Error> {
    let row = sqlx::query(
        "
            UPDATE events
            SET name = $2, date = $3, description = $4, requires_contribution = $5
            WHERE id = $1
            RETURNING id, name, date, description, requires_contribution, attendees
        ",
    )
    .bind(id.0)
    .bind(&e.name)
    .bind(e.date)
    .bind(&e.description)
    .bind(e.requires_contribution)
    .fetch_optional(&mut *conn)
    .await
    .with_context(|| format!("updating event {:?}", id))?
    .ok_or_else(|| Error::event_not_found(id))?;
    Ok(event_from_row(&row)?)
}

pub async fn delete_event(conn: &mut sqlx::PgConnection, id: EventId) -> Result<(), Error> {
    let res = sqlx::query("DELETE FROM events WHERE id = $1")
        .bind(id.0)
        .execute(&mut *conn)
        .await
        .with_context(|| format!("deleting event {:?}", id))?;
    match res.rows_affected() {
        0 => Err(Error::event_not_found(id)),
        _ => Ok(()),
    }
}

/// Adds the member to the attendee list, or removes them if already present.
pub async fn toggle_attendance(
    conn: &mut sqlx::PgConnection,
    id: EventId,
    member: MemberId,
) -> Result<Event, Error> {
    let row = sqlx::query(
        "SELECT id, name, date, description, requires_contribution, attendees FROM events WHERE id = $1",
    )
    .bind(id.0)
    .fetch_optional(&mut *conn)
    .await
    .with_context(|| format!("querying event {:?}", id))?
    .ok_or_else(|| Error::event_not_found(id))?;
    let mut event = event_from_row(&row)?;
    match event.attendees.iter().position(|a| *a == member) {
        Some(idx) => {
            event.attendees.remove(idx);
        }
        None => event.attendees.push(member),
    }
    sqlx::query("UPDATE events SET attendees = $2 WHERE id = $1")
        .bind(id.0)
        .bind(event.attendees.iter().map(|a| a.0).collect::<Vec<Uuid>>())
        .execute(&mut *conn)
        .await
        .with_context(|| format!("updating attendees of event {:?}", id))?;
    Ok(event)
}

pub async fn create_contribution(
    conn: &mut sqlx::PgConnection,
    c: &NewContribution,
) -> anyhow::Result<Contribution> {
    let id = ContributionId(Uuid::new_v4());
    sqlx::query(
        "
            INSERT INTO contributions (id, member_id, event_id, amount, date, kind)
            VALUES ($1, $2, $3, $4, $5, $6)
        ",
    )
    .bind(id.0)
    .bind(c.member_id.0)
    .bind(c.event_id.0)
    .bind(c.amount)
    .bind(c.date)
    .bind(&c.kind)
    .execute(&mut *conn)
    .await
    .with_context(|| format!("inserting contribution {:?}", id))?;
    Ok(Contribution {
        id,
        member_id: c.member_id,
        event_id: c.event_id,
        amount: c.amount,
        date: c.date,
        kind: c.kind.clone(),
    })
}

pub async fn fetch_contributions(
    conn: &mut sqlx::PgConnection,
    event: Option<EventId>,
) -> anyhow::Result<Vec<Contribution>> {
    let query = match event {
        Some(event) => sqlx::query(
            "
                SELECT id, member_id, event_id, amount, date, kind
                    FROM contributions
                WHERE event_id = $1
                ORDER BY date
            ",
        )
        .bind(event.0),
        None => sqlx::query(
            "SELECT id, member_id, event_id, amount, date, kind FROM contributions ORDER BY date",
        ),
    };
    let mut rows = query.fetch(&mut *conn);
    let mut contributions = Vec::new();
    while let Some(row) = rows
        .try_next()
        .await
        .context("querying contributions table")?
    {
        contributions.push(contribution_from_row(&row)?);
    }
    Ok(contributions)
}

/// Persists one feedback submission. The audio file, if any, has already
/// been stored; a failure here leaves it orphaned on disk, which is
/// accepted.
pub async fn create_feedback(
    conn: &mut sqlx::PgConnection,
    event: EventId,
    member: MemberId,
    text: String,
    rating: Option<i32>,
    audio: Option<String>,
) -> Result<FeedbackRecord, Error> {
    if sqlx::query("SELECT 1 FROM events WHERE id = $1")
        .bind(event.0)
        .fetch_optional(&mut *conn)
        .await
        .context("checking the referenced event")?
        .is_none()
    {
        return Err(Error::event_not_found(event));
    }
    if sqlx::query("SELECT 1 FROM members WHERE id = $1")
        .bind(member.0)
        .fetch_optional(&mut *conn)
        .await
        .context("checking the referenced member")?
        .is_none()
    {
        return Err(Error::member_not_found(member));
    }
    let id = FeedbackId(Uuid::new_v4());
    let row = sqlx::query(
        "
            INSERT INTO feedback (id, event_id, member_id, text, audio, rating)
            VALUES ($1, $2, $3, $4, $5, $6)
            RETURNING created_at
        ",
    )
    .bind(id.0)
    .bind(event.0)
    .bind(member.0)
    .bind(&text)
    .bind(&audio)
    .bind(rating)
    .fetch_one(&mut *conn)
    .await
    .with_context(|| format!("inserting feedback {:?}", id))?;
    Ok(FeedbackRecord {
        id,
        event_id: event,
        member_id: member,
        text,
        audio,
        rating,
        likes: 0,
        dislikes: 0,
        comments: Vec::new(),
        created_at: row
            .try_get("created_at")
            .context("retrieving the created_at field")?,
    })
}

pub async fn fetch_feedback(
    conn: &mut sqlx::PgConnection,
    id: FeedbackId,
) -> Result<FeedbackRecord, Error> {
    let row = sqlx::query(
        "
            SELECT id, event_id, member_id, text, audio, rating, likes, dislikes, comments, created_at
                FROM feedback
            WHERE id = $1
        ",
    )
    .bind(id.0)
    .fetch_optional(&mut *conn)
    .await
    .with_context(|| format!("querying feedback {:?}", id))?
    .ok_or_else(|| Error::feedback_not_found(id))?;
    Ok(feedback_from_row(&row)?)
}

pub async fn fetch_feedback_for_event(
    conn: &mut sqlx::PgConnection,
    event: EventId,
) -> anyhow::Result<Vec<EventFeedback>> {
    let mut rows = sqlx::query(
        "
            SELECT
                f.id, f.event_id, f.member_id, f.text, f.audio, f.rating,
                f.likes, f.dislikes, f.comments, f.created_at,
                m.name AS member_name,
                m.verified AS member_verified,
                e.name AS event_name
            FROM feedback f
            INNER JOIN members m
                ON m.id = f.member_id
            INNER JOIN events e
                ON e.id = f.event_id
            WHERE f.event_id = $1
            ORDER BY f.created_at
        ",
    )
    .bind(event.0)
    .fetch(&mut *conn);
    let mut feedbacks = Vec::new();
    while let Some(row) = rows.try_next().await.context("querying feedback table")? {
        feedbacks.push(EventFeedback {
            feedback: feedback_from_row(&row)?,
            member_name: row
                .try_get("member_name")
                .context("retrieving the member_name field")?,
            member_verified: row
                .try_get("member_verified")
                .context("retrieving the member_verified field")?,
            event_name: row
                .try_get("event_name")
                .context("retrieving the event_name field")?,
        });
    }
    Ok(feedbacks)
}

/// Field-level atomic increment; concurrent likes lose no counts.
pub async fn like_feedback(conn: &mut sqlx::PgConnection, id: FeedbackId) -> Result<i64, Error> {
    let row = sqlx::query("UPDATE feedback SET likes = likes + 1 WHERE id = $1 RETURNING likes")
        .bind(id.0)
        .fetch_optional(&mut *conn)
        .await
        .with_context(|| format!("incrementing likes of feedback {:?}", id))?
        .ok_or_else(|| Error::feedback_not_found(id))?;
    Ok(row.try_get("likes").context("retrieving the likes field")?)
}

pub async fn dislike_feedback(
    conn: &mut sqlx::PgConnection,
    id: FeedbackId,
) -> Result<i64, Error> {
    let row =
        sqlx::query("UPDATE feedback SET dislikes = dislikes + 1 WHERE id = $1 RETURNING dislikes")
            .bind(id.0)
            .fetch_optional(&mut *conn)
            .await
            .with_context(|| format!("incrementing dislikes of feedback {:?}", id))?
            .ok_or_else(|| Error::feedback_not_found(id))?;
    Ok(row
        .try_get("dislikes")
        .context("retrieving the dislikes field")?)
}

/// Appends a comment (or reply) to the record's tree under optimistic
/// concurrency: the whole tree is written back only if the version read is
/// still current, otherwise the mutation is re-applied to a fresh copy.
pub async fn add_feedback_comment(
    conn: &mut sqlx::PgConnection,
    id: FeedbackId,
    author: MemberId,
    text: &str,
    parent: Option<CommentId>,
) -> Result<Vec<CommentNode>, Error> {
    for _ in 0..COMMENT_RETRIES {
        let row = sqlx::query("SELECT comments, version FROM feedback WHERE id = $1")
            .bind(id.0)
            .fetch_optional(&mut *conn)
            .await
            .with_context(|| format!("querying feedback {:?}", id))?
            .ok_or_else(|| Error::feedback_not_found(id))?;
        let mut tree: Vec<CommentNode> = serde_json::from_value(
            row.try_get("comments")
                .context("retrieving the comments field")?,
        )
        .context("decoding the comment tree")?;
        let version: i64 = row
            .try_get("version")
            .context("retrieving the version field")?;

        add_comment(&mut tree, parent, String::from(text), author, Utc::now())?;

        let res = sqlx::query(
            "UPDATE feedback SET comments = $2, version = version + 1 WHERE id = $1 AND version = $3",
        )
        .bind(id.0)
        .bind(serde_json::to_value(&tree).context("encoding the comment tree")?)
        .bind(version)
        .execute(&mut *conn)
        .await
        .with_context(|| format!("writing back the comment tree of feedback {:?}", id))?;
        if res.rows_affected() == 1 {
            return Ok(tree);
        }
        // lost the version race, re-fetch and re-apply
    }
    Err(Error::Anyhow(anyhow!(
        "giving up on comment append to feedback {:?} after {} version conflicts",
        id,
        COMMENT_RETRIES
    )))
}

/// Flips the verified flag of the member behind a feedback record. The flag
/// lives on the member, so the toggle is visible through every feedback
/// record they authored.
pub async fn toggle_verification(
    conn: &mut sqlx::PgConnection,
    id: FeedbackId,
) -> Result<bool, Error> {
    let row = sqlx::query("SELECT member_id FROM feedback WHERE id = $1")
        .bind(id.0)
        .fetch_optional(&mut *conn)
        .await
        .with_context(|| format!("querying feedback {:?}", id))?
        .ok_or_else(|| Error::feedback_not_found(id))?;
    let member: Uuid = row
        .try_get("member_id")
        .context("retrieving the member_id field")?;
    let row = sqlx::query("UPDATE members SET verified = NOT verified WHERE id = $1 RETURNING verified")
        .bind(member)
        .fetch_one(&mut *conn)
        .await
        .with_context(|| format!("toggling verification of member {:?}", member))?;
    Ok(row
        .try_get("verified")
        .context("retrieving the verified field")?)
}

// These tests need a real Postgres behind DATABASE_URL; without one they
// pass vacuously. Rows are keyed on fresh uuids so runs do not interfere.
#[cfg(test)]
mod tests {
    use edir_api::Error as ApiError;

    use super::*;

    async fn test_pool() -> Option<sqlx::PgPool> {
        let url = match std::env::var("DATABASE_URL") {
            Ok(url) => url,
            Err(_) => return None,
        };
        let pool = sqlx::postgres::PgPoolOptions::new()
            .connect(&url)
            .await
            .expect("connecting to the test database");
        sqlx::migrate!()
            .run(&pool)
            .await
            .expect("running migrations");
        Some(pool)
    }

    async fn seed_member(conn: &mut sqlx::PgConnection) -> Member {
        let contact = format!("09{:08}", rand::random::<u32>() % 100_000_000);
        let m = NewMember::new(
            String::from("Abebe Bikila"),
            contact,
            String::from("s3cretpass"),
            Role::Member,
        );
        create_member(conn, &m, String::from("not-a-real-hash"))
            .await
            .expect("creating member")
    }

    async fn seed_event(conn: &mut sqlx::PgConnection) -> Event {
        create_event(
            conn,
            &NewEvent {
                name: String::from("Annual meeting"),
                date: Utc::now(),
                description: String::from("yearly gathering"),
                requires_contribution: false,
            },
        )
        .await
        .expect("creating event")
    }

    async fn seed_feedback(conn: &mut sqlx::PgConnection) -> (Event, Member, FeedbackRecord) {
        let event = seed_event(conn).await;
        let member = seed_member(conn).await;
        let feedback = create_feedback(
            conn,
            event.id,
            member.id,
            String::from("great event"),
            Some(5),
            None,
        )
        .await
        .expect("creating feedback");
        (event, member, feedback)
    }

    #[tokio::test]
    async fn counters_only_ever_go_up() {
        let pool = match test_pool().await {
            Some(pool) => pool,
            None => return,
        };
        let mut conn = pool.acquire().await.expect("acquiring connection");
        let (_, _, feedback) = seed_feedback(&mut conn).await;

        let mut last = 0;
        for _ in 0..3 {
            let likes = like_feedback(&mut conn, feedback.id)
                .await
                .expect("incrementing likes");
            assert!(likes > last);
            last = likes;
        }
        assert_eq!(
            dislike_feedback(&mut conn, feedback.id)
                .await
                .expect("incrementing dislikes"),
            1
        );

        let fetched = fetch_feedback(&mut conn, feedback.id)
            .await
            .expect("fetching feedback");
        assert_eq!(fetched.likes, 3);
        assert_eq!(fetched.dislikes, 1);
    }

    #[tokio::test]
    async fn verification_toggle_round_trips_across_records() {
        let pool = match test_pool().await {
            Some(pool) => pool,
            None => return,
        };
        let mut conn = pool.acquire().await.expect("acquiring connection");
        let (event, member, feedback) = seed_feedback(&mut conn).await;
        let second = create_feedback(
            &mut conn,
            event.id,
            member.id,
            String::from("another thought"),
            None,
            None,
        )
        .await
        .expect("creating feedback");

        // the flag lives on the member, so flipping it through one record
        // shows on both
        assert!(toggle_verification(&mut conn, feedback.id)
            .await
            .expect("toggling verification"));
        let listed = fetch_feedback_for_event(&mut conn, event.id)
            .await
            .expect("listing event feedback");
        assert_eq!(listed.len(), 2);
        assert!(listed.iter().all(|f| f.member_verified));

        assert!(!toggle_verification(&mut conn, second.id)
            .await
            .expect("toggling verification back"));
        let listed = fetch_feedback_for_event(&mut conn, event.id)
            .await
            .expect("listing event feedback");
        assert!(listed.iter().all(|f| !f.member_verified));
    }

    #[tokio::test]
    async fn submitted_comments_and_replies_come_back_in_the_listing() {
        let pool = match test_pool().await {
            Some(pool) => pool,
            None => return,
        };
        let mut conn = pool.acquire().await.expect("acquiring connection");
        let (event, member, feedback) = seed_feedback(&mut conn).await;

        let tree = add_feedback_comment(&mut conn, feedback.id, member.id, "first", None)
            .await
            .expect("adding top-level comment");
        let parent = tree[0].id;
        let tree = add_feedback_comment(&mut conn, feedback.id, member.id, "a reply", Some(parent))
            .await
            .expect("adding reply");
        assert_eq!(tree.len(), 1);
        assert_eq!(tree[0].replies.len(), 1);
        assert_eq!(tree[0].replies[0].text, "a reply");

        let listed = fetch_feedback_for_event(&mut conn, event.id)
            .await
            .expect("listing event feedback");
        assert_eq!(listed.len(), 1);
        assert_eq!(listed[0].feedback.comments, tree);
        assert_eq!(listed[0].member_name, member.name);
        assert_eq!(listed[0].event_name, event.name);
    }

    #[tokio::test]
    async fn unknown_reply_parent_leaves_the_stored_tree_alone() {
        let pool = match test_pool().await {
            Some(pool) => pool,
            None => return,
        };
        let mut conn = pool.acquire().await.expect("acquiring connection");
        let (_, member, feedback) = seed_feedback(&mut conn).await;
        add_feedback_comment(&mut conn, feedback.id, member.id, "only comment", None)
            .await
            .expect("adding comment");

        let res = add_feedback_comment(
            &mut conn,
            feedback.id,
            member.id,
            "orphan",
            Some(CommentId(Uuid::new_v4())),
        )
        .await;
        assert!(matches!(
            res,
            Err(Error::Api(ApiError::ParentCommentNotFound(_)))
        ));

        let fetched = fetch_feedback(&mut conn, feedback.id)
            .await
            .expect("fetching feedback");
        assert_eq!(fetched.comments.len(), 1);
        assert_eq!(fetched.comments[0].text, "only comment");
        assert!(fetched.comments[0].replies.is_empty());
    }

    // Each failed optimistic write means another writer committed in
    // between, so with N concurrent appends no writer can lose more than
    // N - 1 rounds.
    #[tokio::test]
    async fn concurrent_comment_appends_all_land() {
        let pool = match test_pool().await {
            Some(pool) => pool,
            None => return,
        };
        let mut conn = pool.acquire().await.expect("acquiring connection");
        let (_, member, feedback) = seed_feedback(&mut conn).await;
        drop(conn);

        let mut handles = Vec::new();
        for i in 0..4 {
            let pool = pool.clone();
            let id = feedback.id;
            let author = member.id;
            handles.push(tokio::spawn(async move {
                let mut conn = pool.acquire().await.expect("acquiring connection");
                add_feedback_comment(&mut conn, id, author, &format!("comment {}", i), None)
                    .await
                    .expect("appending comment")
            }));
        }
        for h in handles {
            h.await.expect("joining comment task");
        }

        let mut conn = pool.acquire().await.expect("acquiring connection");
        let fetched = fetch_feedback(&mut conn, feedback.id)
            .await
            .expect("fetching feedback");
        assert_eq!(fetched.comments.len(), 4);
        assert!(fetched.comments.iter().all(|c| c.replies.is_empty()));
    }

    #[tokio::test]
    async fn contact_reset_is_single_use() {
        let pool = match test_pool().await {
            Some(pool) => pool,
            None => return,
        };
        let mut conn = pool.acquire().await.expect("acquiring connection");
        let member = seed_member(&mut conn).await;
        let new_contact = format!("09{:08}", rand::random::<u32>() % 100_000_000);

        let token = create_contact_reset(&mut conn, &member.contact)
            .await
            .expect("issuing reset token");
        reset_contact(&mut conn, token, &new_contact)
            .await
            .expect("resetting contact");

        // old contact is gone, token is spent
        assert!(matches!(
            create_contact_reset(&mut conn, &member.contact).await,
            Err(Error::Api(ApiError::ContactNotFound(_)))
        ));
        assert!(matches!(
            reset_contact(&mut conn, token, &new_contact).await,
            Err(Error::Api(ApiError::ResetTokenInvalid))
        ));
        create_contact_reset(&mut conn, &new_contact)
            .await
            .expect("issuing token against the new contact");
    }
}
