use uuid::Uuid;

use crate::{Error, EventId, MemberId, Time, STUB_UUID};

#[derive(Clone, Copy, Debug, Eq, Hash, PartialEq, serde::Deserialize, serde::Serialize)]
pub struct FeedbackId(pub Uuid);

impl FeedbackId {
    pub fn stub() -> FeedbackId {
        FeedbackId(STUB_UUID)
    }
}

#[derive(Clone, Copy, Debug, Eq, Hash, PartialEq, serde::Deserialize, serde::Serialize)]
pub struct CommentId(pub Uuid);

impl CommentId {
    pub fn stub() -> CommentId {
        CommentId(STUB_UUID)
    }
}

/// One comment or reply inside a feedback record's tree.
///
/// Ids are unique across the whole tree of one record, not just among
/// siblings: replies target a parent by id lookup over the full tree.
#[derive(Clone, Debug, Eq, PartialEq, serde::Deserialize, serde::Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CommentNode {
    pub id: CommentId,
    pub text: String,
    pub member_id: MemberId,
    pub date: Time,

    /// Child comments, in insertion order.
    #[serde(default)]
    pub replies: Vec<CommentNode>,
}

/// One member's submitted reaction to one event. The comment tree is part of
/// the record itself; comments are only ever persisted with their record.
#[derive(Clone, Debug, PartialEq, serde::Deserialize, serde::Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FeedbackRecord {
    pub id: FeedbackId,
    pub event_id: EventId,
    pub member_id: MemberId,
    pub text: String,
    pub audio: Option<String>,
    pub rating: Option<i32>,
    pub likes: i64,
    pub dislikes: i64,
    pub comments: Vec<CommentNode>,
    pub created_at: Time,
}

/// A feedback record as listed per event, joined with the submitting
/// member's name and verified flag and with the event's name.
#[derive(Clone, Debug, PartialEq, serde::Deserialize, serde::Serialize)]
#[serde(rename_all = "camelCase")]
pub struct EventFeedback {
    #[serde(flatten)]
    pub feedback: FeedbackRecord,
    pub member_name: String,
    pub member_verified: bool,
    pub event_name: String,
}

/// Request body for adding a comment or a reply. `id` names the author, as
/// on the original wire format.
#[derive(Clone, Debug, serde::Deserialize, serde::Serialize)]
#[serde(rename_all = "camelCase")]
pub struct NewComment {
    #[serde(rename = "id")]
    pub author: MemberId,
    pub text: String,
    pub parent_comment_id: Option<CommentId>,
}

impl NewComment {
    pub fn validate(&self) -> Result<(), Error> {
        crate::validate_string(&self.text)?;
        if self.text.trim().is_empty() {
            return Err(Error::MissingField(String::from("text")));
        }
        Ok(())
    }
}

fn find_node<'a>(comments: &'a mut [CommentNode], id: CommentId) -> Option<&'a mut CommentNode> {
    for c in comments.iter_mut() {
        if c.id == id {
            return Some(c);
        }
        if let Some(res) = find_node(&mut c.replies, id) {
            return Some(res);
        }
    }
    None
}

/// Appends a comment to the tree, either at the top level (`parent` absent)
/// or as the last reply of the node with id `parent`, wherever it sits in
/// the tree. An unknown parent id is an error and leaves the tree untouched;
/// it never falls back to a top-level insert.
///
/// O(n) in the number of existing nodes, which per-event comment volume
/// keeps small.
pub fn add_comment(
    comments: &mut Vec<CommentNode>,
    parent: Option<CommentId>,
    text: String,
    author: MemberId,
    date: Time,
) -> Result<CommentId, Error> {
    let node = CommentNode {
        id: CommentId(Uuid::new_v4()),
        text,
        member_id: author,
        date,
        replies: Vec::new(),
    };
    let id = node.id;
    match parent {
        None => comments.push(node),
        Some(parent) => match find_node(comments, parent) {
            Some(target) => target.replies.push(node),
            None => return Err(Error::ParentCommentNotFound(parent.0)),
        },
    }
    Ok(id)
}

/// Lenient rating coercion: anything that does not parse as an integer
/// becomes an absent rating rather than an error.
pub fn coerce_rating(raw: &str) -> Option<i32> {
    raw.trim().parse().ok()
}

#[cfg(test)]
mod tests {
    use chrono::Utc;

    use super::*;

    fn author() -> MemberId {
        MemberId(Uuid::new_v4())
    }

    fn push(comments: &mut Vec<CommentNode>, parent: Option<CommentId>, text: &str) -> CommentId {
        add_comment(comments, parent, String::from(text), author(), Utc::now())
            .expect("adding comment")
    }

    #[test]
    fn top_level_append_preserves_prior_comments() {
        let mut comments = Vec::new();
        let first = push(&mut comments, None, "first");
        let under_first = push(&mut comments, Some(first), "nested under first");
        let before = comments.clone();

        let second = push(&mut comments, None, "second");

        assert_eq!(comments.len(), 2);
        assert_eq!(&comments[..1], &before[..]);
        assert_eq!(comments[1].id, second);
        assert_eq!(comments[0].replies[0].id, under_first);
    }

    #[test]
    fn reply_targets_node_at_any_depth() {
        let mut comments = Vec::new();
        let root = push(&mut comments, None, "root");
        let sibling = push(&mut comments, None, "sibling");
        let mut deepest = root;
        for depth in 0..5 {
            deepest = push(&mut comments, Some(deepest), &format!("depth {}", depth));
        }

        let reply = push(&mut comments, Some(deepest), "reply to the deepest");

        let mut node = &comments[0];
        for _ in 0..5 {
            assert_eq!(node.replies.len(), 1);
            node = &node.replies[0];
        }
        assert_eq!(node.replies.len(), 1);
        assert_eq!(node.replies[0].id, reply);
        // sibling subtree untouched
        assert_eq!(comments[1].id, sibling);
        assert!(comments[1].replies.is_empty());
    }

    #[test]
    fn reply_appends_as_last_child() {
        let mut comments = Vec::new();
        let root = push(&mut comments, None, "root");
        let a = push(&mut comments, Some(root), "a");
        let b = push(&mut comments, Some(root), "b");
        let c = push(&mut comments, Some(root), "c");
        assert_eq!(
            comments[0].replies.iter().map(|r| r.id).collect::<Vec<_>>(),
            vec![a, b, c]
        );
    }

    #[test]
    fn unknown_parent_leaves_tree_unchanged() {
        let mut comments = Vec::new();
        let root = push(&mut comments, None, "root");
        push(&mut comments, Some(root), "child");
        let before = comments.clone();

        let res = add_comment(
            &mut comments,
            Some(CommentId(Uuid::new_v4())),
            String::from("orphan"),
            author(),
            Utc::now(),
        );

        assert!(matches!(res, Err(Error::ParentCommentNotFound(_))));
        assert_eq!(comments, before);
    }

    #[test]
    fn rating_coercion_is_lenient() {
        assert_eq!(coerce_rating("5"), Some(5));
        assert_eq!(coerce_rating(" 3 "), Some(3));
        assert_eq!(coerce_rating("-1"), Some(-1));
        assert_eq!(coerce_rating("abc"), None);
        assert_eq!(coerce_rating(""), None);
        assert_eq!(coerce_rating("4.5"), None);
    }

    #[test]
    fn replies_default_to_empty_on_deserialize() {
        let json = serde_json::json!({
            "id": Uuid::new_v4(),
            "text": "no replies key at all",
            "memberId": Uuid::new_v4(),
            "date": Utc::now(),
        });
        let node: CommentNode = serde_json::from_value(json).expect("deserializing comment");
        assert!(node.replies.is_empty());
    }
}
