use anyhow::Context;
use axum::{
    extract::{Multipart, Path, Query, State},
    http::{header, StatusCode},
    Json,
};
use serde_json::json;

use edir_api::{
    coerce_rating, AuthToken, Contribution, Event, EventFeedback, EventId, FeedbackId,
    FeedbackRecord, ForgotContact, Member, MemberId, MemberUpdate, NewComment, NewContribution,
    NewEvent, NewMember, NewSession, ResetContact, Role, Uuid,
};

use crate::{
    assets::{self, AssetStore},
    db,
    extractors::*,
    payment::{InitializePayment, PaymentClient},
    Error,
};

const BCRYPT_COST: u32 = 10;

fn parse_id(raw: &str) -> Result<Uuid, Error> {
    Uuid::try_parse(raw).map_err(|_| Error::invalid_id(raw))
}

pub async fn auth(
    mut conn: PgConn,
    Json(data): Json<NewSession>,
) -> Result<Json<AuthToken>, Error> {
    data.validate()?;
    Ok(Json(
        db::login_member(&mut *conn, &data)
            .await
            .context("logging member in")?
            .ok_or(Error::permission_denied())?,
    ))
}

pub async fn unauth(token: PreAuth, mut conn: PgConn) -> Result<(), Error> {
    match db::logout_member(&mut *conn, &token.0).await {
        Ok(true) => Ok(()),
        Ok(false) => Err(Error::permission_denied()),
        Err(e) => Err(Error::Anyhow(e)),
    }
}

pub async fn whoami(Auth(caller): Auth) -> Json<Caller> {
    Json(caller)
}

/// Issues a recovery token for the member behind a contact. The token and
/// the frontend link are returned in the response body; there is no
/// out-of-band delivery channel.
pub async fn forgot_contact(
    State(reset_links): State<ResetLinkBase>,
    mut conn: PgConn,
    Json(data): Json<ForgotContact>,
) -> Result<Json<serde_json::Value>, Error> {
    data.validate()?;
    let token = db::create_contact_reset(&mut *conn, &data.contact).await?;
    Ok(Json(json!({
        "token": token,
        "resetLink": format!("{}?token={}", reset_links.0, token.0),
    })))
}

pub async fn reset_contact(
    mut conn: PgConn,
    Json(data): Json<ResetContact>,
) -> Result<(), Error> {
    data.validate()?;
    db::reset_contact(&mut *conn, data.token, &data.new_contact).await
}

pub async fn register_member(
    mut conn: PgConn,
    Json(data): Json<NewMember>,
) -> Result<(StatusCode, Json<Member>), Error> {
    data.validate()?;
    let hash = bcrypt::hash(&data.password, BCRYPT_COST).context("hashing password")?;
    let member = db::create_member(&mut *conn, &data, hash).await?;
    Ok((StatusCode::CREATED, Json(member)))
}

pub async fn fetch_members(mut conn: PgConn) -> Result<Json<Vec<Member>>, Error> {
    Ok(Json(
        db::fetch_members(&mut *conn)
            .await
            .context("fetching member list")?,
    ))
}

pub async fn update_member(
    Path(id): Path<String>,
    mut conn: PgConn,
    Json(update): Json<MemberUpdate>,
) -> Result<Json<Member>, Error> {
    update.validate()?;
    let id = MemberId(parse_id(&id)?);
    Ok(Json(db::update_member(&mut *conn, id, &update).await?))
}

pub async fn delete_member(Path(id): Path<String>, mut conn: PgConn) -> Result<(), Error> {
    let id = MemberId(parse_id(&id)?);
    db::delete_member(&mut *conn, id).await
}

pub async fn create_event(
    mut conn: PgConn,
    Json(data): Json<NewEvent>,
) -> Result<(StatusCode, Json<Event>), Error> {
    data.validate()?;
    let event = db::create_event(&mut *conn, &data)
        .await
        .context("creating event")?;
    Ok((StatusCode::CREATED, Json(event)))
}

pub async fn fetch_events(mut conn: PgConn) -> Result<Json<Vec<Event>>, Error> {
    Ok(Json(
        db::fetch_events(&mut *conn)
            .await
            .context("fetching event list")?,
    ))
}

pub async fn update_event(
    Path(id): Path<String>,
    mut conn: PgConn,
    Json(data): Json<NewEvent>,
) -> Result<Json<Event>, Error> {
    data.validate()?;
    let id = EventId(parse_id(&id)?);
    Ok(Json(db::update_event(&mut *conn, id, &data).await?))
}

pub async fn delete_event(Path(id): Path<String>, mut conn: PgConn) -> Result<(), Error> {
    let id = EventId(parse_id(&id)?);
    db::delete_event(&mut *conn, id).await
}

#[derive(serde::Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AttendanceChange {
    member_id: MemberId,
}

pub async fn toggle_attendance(
    Path(id): Path<String>,
    mut conn: PgConn,
    Json(change): Json<AttendanceChange>,
) -> Result<Json<Event>, Error> {
    let id = EventId(parse_id(&id)?);
    Ok(Json(
        db::toggle_attendance(&mut *conn, id, change.member_id).await?,
    ))
}

#[derive(serde::Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ContributionFilter {
    event_id: Option<Uuid>,
}

pub async fn fetch_contributions(
    Query(filter): Query<ContributionFilter>,
    mut conn: PgConn,
) -> Result<Json<Vec<Contribution>>, Error> {
    Ok(Json(
        db::fetch_contributions(&mut *conn, filter.event_id.map(EventId))
            .await
            .context("fetching contribution list")?,
    ))
}

pub async fn record_contribution(
    mut conn: PgConn,
    Json(data): Json<NewContribution>,
) -> Result<(StatusCode, Json<Contribution>), Error> {
    data.validate()?;
    let contribution = db::create_contribution(&mut *conn, &data)
        .await
        .context("recording contribution")?;
    Ok((StatusCode::CREATED, Json(contribution)))
}

pub async fn initialize_payment(
    State(payments): State<PaymentClient>,
    Json(data): Json<InitializePayment>,
) -> Result<Json<serde_json::Value>, Error> {
    data.validate()?;
    Ok(Json(
        payments
            .initialize(&data)
            .await
            .context("initializing payment")?,
    ))
}

pub async fn verify_payment(
    Path(tx_ref): Path<String>,
    State(payments): State<PaymentClient>,
) -> Result<Json<serde_json::Value>, Error> {
    Ok(Json(
        payments
            .verify(&tx_ref)
            .await
            .with_context(|| format!("verifying payment {:?}", tx_ref))?,
    ))
}

/// Multipart feedback submission: `memberId` and `eventId` are required,
/// `text`, `rating` and the `audio` file are optional. The audio file is
/// stored before the record is inserted; if the insert then fails, the file
/// stays behind as an accepted orphan.
pub async fn submit_feedback(
    State(assets): State<AssetStore>,
    mut conn: PgConn,
    mut form: Multipart,
) -> Result<(StatusCode, Json<FeedbackRecord>), Error> {
    let mut member_id = None;
    let mut event_id = None;
    let mut text = None;
    let mut rating = None;
    let mut audio = None;
    while let Some(field) = form
        .next_field()
        .await
        .context("reading multipart field")?
    {
        let name = field.name().map(str::to_string);
        match name.as_deref() {
            Some("memberId") => {
                member_id = Some(field.text().await.context("reading memberId field")?)
            }
            Some("eventId") => {
                event_id = Some(field.text().await.context("reading eventId field")?)
            }
            Some("text") => text = Some(field.text().await.context("reading text field")?),
            Some("rating") => rating = Some(field.text().await.context("reading rating field")?),
            Some("audio") => {
                let filename = field
                    .file_name()
                    .unwrap_or("recording.webm")
                    .to_string();
                let mime = field.content_type().unwrap_or("").to_string();
                let bytes = field.bytes().await.context("reading audio field")?;
                audio = Some((filename, mime, bytes));
            }
            _ => {}
        }
    }

    let event_id = EventId(parse_id(
        event_id.as_deref().ok_or(Error::missing_field("eventId"))?,
    )?);
    let member_id = MemberId(parse_id(
        member_id
            .as_deref()
            .ok_or(Error::missing_field("memberId"))?,
    )?);
    let text = text.unwrap_or_default();
    edir_api::validate_string(&text)?;
    // malformed ratings become absent rather than failing the submission
    let rating = rating.as_deref().and_then(coerce_rating);
    let audio = match audio {
        Some((filename, mime, bytes)) => Some(assets.store(&filename, &mime, &bytes).await?),
        None => None,
    };

    let record = db::create_feedback(&mut *conn, event_id, member_id, text, rating, audio).await?;
    Ok((StatusCode::CREATED, Json(record)))
}

pub async fn fetch_feedback(
    Path(id): Path<String>,
    mut conn: PgConn,
) -> Result<Json<FeedbackRecord>, Error> {
    let id = FeedbackId(parse_id(&id)?);
    Ok(Json(db::fetch_feedback(&mut *conn, id).await?))
}

pub async fn feedback_for_event(
    Path(event_id): Path<String>,
    mut conn: PgConn,
) -> Result<Json<Vec<EventFeedback>>, Error> {
    let event_id = EventId(parse_id(&event_id)?);
    Ok(Json(
        db::fetch_feedback_for_event(&mut *conn, event_id)
            .await
            .with_context(|| format!("fetching feedback for event {:?}", event_id))?,
    ))
}

pub async fn feedback_audio(
    Path(filename): Path<String>,
    State(assets): State<AssetStore>,
) -> Result<([(header::HeaderName, &'static str); 1], Vec<u8>), Error> {
    let bytes = assets.retrieve(&filename).await?;
    Ok((
        [(header::CONTENT_TYPE, assets::content_type_for(&filename))],
        bytes,
    ))
}

pub async fn like_feedback(
    Path(id): Path<String>,
    mut conn: PgConn,
) -> Result<Json<serde_json::Value>, Error> {
    let id = FeedbackId(parse_id(&id)?);
    let likes = db::like_feedback(&mut *conn, id).await?;
    Ok(Json(json!({ "likes": likes })))
}

pub async fn dislike_feedback(
    Path(id): Path<String>,
    mut conn: PgConn,
) -> Result<Json<serde_json::Value>, Error> {
    let id = FeedbackId(parse_id(&id)?);
    let dislikes = db::dislike_feedback(&mut *conn, id).await?;
    Ok(Json(json!({ "dislikes": dislikes })))
}

pub async fn comment_feedback(
    Path(id): Path<String>,
    mut conn: PgConn,
    Json(data): Json<NewComment>,
) -> Result<Json<Vec<edir_api::CommentNode>>, Error> {
    data.validate()?;
    let id = FeedbackId(parse_id(&id)?);
    Ok(Json(
        db::add_feedback_comment(&mut *conn, id, data.author, &data.text, data.parent_comment_id)
            .await?,
    ))
}

/// Admin-only: flips the verified flag of the member behind this feedback.
pub async fn toggle_verification(
    Auth(caller): Auth,
    Path(id): Path<String>,
    mut conn: PgConn,
) -> Result<Json<serde_json::Value>, Error> {
    if caller.role != Role::Admin {
        return Err(Error::permission_denied());
    }
    let id = FeedbackId(parse_id(&id)?);
    let verified = db::toggle_verification(&mut *conn, id).await?;
    Ok(Json(json!({ "verified": verified })))
}
