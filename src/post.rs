use chrono::naive::NaiveDateTime;
use diesel::prelude::*;

use crate::{db::Connection, error::Result, schema::posts, session::SessionState};

#[derive(Clone, Debug, Queryable, Identifiable)]
pub struct Post {
    /// The post's numeric id
    pub id: i32,
    /// Display name of the author when the post was created
    pub author: String,
    /// The id of the user who created the post
    pub user_id: i32,
    /// The title of the post
    pub title: String,
    /// The post's content/body
    pub body: String,
    pub created_at: NaiveDateTime,
    pub updated_at: NaiveDateTime,
}

impl Post {
    /// Decides which rendering of this post the session is shown.
    pub fn variant(&self, session: &SessionState) -> ViewVariant {
        decide_post_view(session, self)
    }
}

/// The rendering paths of a single post.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ViewVariant {
    /// What every visitor sees
    Public,
    /// Adds controls only the post's creator gets
    Owner,
}

/// Only an authenticated session belonging to the post's creator gets [`ViewVariant::Owner`].
pub fn decide_post_view(session: &SessionState, post: &Post) -> ViewVariant {
    match session.user_id() {
        Some(id) if id == post.user_id => ViewVariant::Owner,
        _ => ViewVariant::Public,
    }
}

#[derive(Clone, Debug, Insertable)]
#[table_name = "posts"]
pub struct NewPost {
    pub author: String,
    pub user_id: i32,
    pub title: String,
    pub body: String,
}

/// The post creation form
#[derive(Deserialize)]
pub struct PostForm {
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub body: String,
}

impl PostForm {
    /// Attaches the form to its author, snapshotting their display name.
    pub fn into_post(self, user_id: i32, author: &str) -> NewPost {
        NewPost {
            author: author.to_owned(),
            user_id,
            title: self.title,
            body: self.body,
        }
    }
}

/// All posts in the order they were created
pub fn list(connection: &Connection) -> Result<Vec<Post>> {
    use crate::schema::posts::dsl::*;

    let list = posts.order(id.asc()).load::<Post>(connection)?;
    Ok(list)
}

pub fn view(connection: &Connection, post_id: i32) -> Result<Post> {
    use crate::schema::posts::dsl::*;

    let post = posts.find(post_id).first(connection)?;
    Ok(post)
}

pub fn submit(connection: &Connection, post: &NewPost) -> Result<()> {
    diesel::insert_into(posts::table)
        .values(post)
        .execute(connection)?;
    Ok(())
}

/// Deletes the post if it exists. Deleting a missing post is not an error.
pub fn delete(connection: &Connection, post_id: i32) -> Result<()> {
    use crate::schema::posts::dsl::*;

    diesel::delete(posts.find(post_id)).execute(connection)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    fn post(user_id: i32) -> Post {
        let now = Utc::now().naive_utc();
        Post {
            id: 1,
            author: "Alice".into(),
            user_id,
            title: "Hello".into(),
            body: "world".into(),
            created_at: now,
            updated_at: now,
        }
    }

    #[test]
    fn anonymous_sessions_see_public() {
        let session = SessionState::default();
        assert_eq!(decide_post_view(&session, &post(1)), ViewVariant::Public);
    }

    #[test]
    fn owners_see_owner() {
        let session = SessionState::signed_in(1, "Alice");
        assert_eq!(decide_post_view(&session, &post(1)), ViewVariant::Owner);
        assert_eq!(post(1).variant(&session), ViewVariant::Owner);
    }

    #[test]
    fn other_users_see_public() {
        let session = SessionState::signed_in(2, "Bob");
        assert_eq!(decide_post_view(&session, &post(1)), ViewVariant::Public);
    }

    #[test]
    fn unauthenticated_ids_are_ignored() {
        // a stale id without the flag is not an identity
        let session = SessionState {
            authenticated: false,
            user_id: Some(1),
            author: Some("Alice".into()),
        };
        assert_eq!(decide_post_view(&session, &post(1)), ViewVariant::Public);
    }

    #[test]
    fn form_snapshots_author() {
        let form: PostForm = serde_urlencoded::from_str("title=Hello&body=Hi+there").unwrap();
        let new = form.into_post(3, "Carol");
        assert_eq!(new.author, "Carol");
        assert_eq!(new.user_id, 3);
        assert_eq!(new.body, "Hi there");
    }
}
