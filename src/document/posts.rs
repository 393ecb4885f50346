//! Templates and request handlers for listing, viewing, writing and deleting posts
use askama::Template;
use gotham::state::{FromState, State};
use gotham_derive::{StateData, StaticResponseExtender};

use crate::{
    config::Settings,
    db::Db,
    document::{DocumentResult, TemplateExt},
    error::Error,
    handler::{form, see_other},
    post::{Post, PostForm, ViewVariant},
    session::SessionState,
};

#[derive(Deserialize, StateData, StaticResponseExtender)]
pub struct PostPath {
    pub id: i32,
}

#[derive(Template)]
#[template(path = "index.html")]
struct IndexTemplate<'a> {
    session: &'a SessionState,
    posts: Vec<Post>,
}

#[derive(Template)]
#[template(path = "posts.html")]
struct PostsTemplate<'a> {
    session: &'a SessionState,
    posts: Vec<Post>,
}

#[derive(Template)]
#[template(path = "post.html")]
struct PostTemplate<'a> {
    session: &'a SessionState,
    post: Post,
}

/// Same post, with the controls only its owner gets
#[derive(Template)]
#[template(path = "owner-post.html")]
struct OwnerPostTemplate<'a> {
    session: &'a SessionState,
    post: Post,
}

#[derive(Template)]
#[template(path = "new-post.html")]
struct NewPostTemplate<'a> {
    session: &'a SessionState,
}

/// The home page
pub fn index(state: &State) -> DocumentResult {
    let posts = Db::from_state(state).posts()?;
    let template = IndexTemplate {
        session: SessionState::borrow_from(state),
        posts,
    };
    Ok(template.to_response(state))
}

pub fn list(state: &State) -> DocumentResult {
    let posts = Db::from_state(state).posts()?;
    let template = PostsTemplate {
        session: SessionState::borrow_from(state),
        posts,
    };
    Ok(template.to_response(state))
}

/// Display a post
pub fn view(state: &State) -> DocumentResult {
    let id = PostPath::borrow_from(state).id;
    let session = SessionState::borrow_from(state);

    let post = Db::from_state(state).post(id)?;
    let response = match post.variant(session) {
        ViewVariant::Owner => OwnerPostTemplate { session, post }.to_response(state),
        ViewVariant::Public => PostTemplate { session, post }.to_response(state),
    };
    Ok(response)
}

pub fn new(state: &State) -> DocumentResult {
    Ok(NewPostTemplate {
        session: SessionState::borrow_from(state),
    }
    .to_response(state))
}

pub fn new_post(state: &State, post: Vec<u8>) -> DocumentResult {
    let submitted: PostForm = form(&post)?;

    let (user_id, author) = match SessionState::borrow_from(state).identity() {
        Some(identity) => identity,
        None => return Ok(see_other(state, "/")),
    };

    let new = submitted.into_post(user_id, author);
    Db::from_state(state).create_post(&new)?;
    info!("{} published '{}'", author, new.title);

    Ok(see_other(state, "/posts"))
}

/// Deletes a post. Missing posts are silently ignored.
///
/// Anyone may delete any post unless `owner_only_delete` is set.
pub fn delete(state: &State) -> DocumentResult {
    let id = PostPath::borrow_from(state).id;
    let storage = Db::from_state(state);

    if Settings::borrow_from(state).posts.owner_only_delete {
        let session = SessionState::borrow_from(state);
        match storage.post(id) {
            Ok(ref post) if post.variant(session) == ViewVariant::Owner => (),
            Ok(_) => return Err(Error::Forbidden.into()),
            Err(Error::NotFound) => (),
            Err(e) => return Err(e.into()),
        }
    }

    storage.delete_post(id)?;
    info!("Deleted post {}", id);

    Ok(see_other(state, "/posts"))
}
