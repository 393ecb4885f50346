//! A small server-rendered blog.
//!
//! It has the following address scheme:
//! * `/` - Home page listing all posts
//! * `/register` - Registration form, creates a user when posted to
//! * `/login` - Login form, signs the session in when posted valid credentials
//! * `/logout` - Signs the session out
//! * `/posts` - Post handling
//!     * `/` - List all posts
//!     * `/<id>` - View the post with the specified `id`, with delete controls for its owner
//!     * `/new` - Post form, publishes the post when posted to by a logged in user
//!     * `/delete/<id>` - Deletes the post with the specified `id`
//! * `/static/*` - Static assets

#![allow(clippy::new_without_default)]

#[macro_use]
extern crate diesel;
#[macro_use]
extern crate diesel_migrations;
#[macro_use]
extern crate log;
#[macro_use]
extern crate serde;

pub mod config;
pub mod db;
pub mod document;
pub mod error;
pub mod handler;
pub mod password;
pub mod post;
pub mod schema;
pub mod session;
pub mod user;


use gotham::{
    middleware::cookie::CookieParser,
    middleware::state::StateMiddleware,
    pipeline::new_pipeline,
    pipeline::single::single_pipeline,
    router::builder::{build_router, DefineSingleRoute, DrawRoutes},
    router::response::extender::ResponseExtender,
    router::Router,
    state::{FromState, State},
};
use http::{
    header::{HeaderValue, CONTENT_TYPE},
    status::StatusCode,
    Method,
};
use hyper::{Body, Response, Uri};

use std::{path::Path, sync::Arc};

use crate::{
    config::Settings,
    db::{Db, PgStorage, Storage},
    document::{posts, users},
    session::{SessionConfig, SessionMiddleware, SessionStore},
};

/// Every standard request method, for routes that don't discriminate between them
const ANY_METHOD: [Method; 9] = [
    Method::GET,
    Method::HEAD,
    Method::POST,
    Method::PUT,
    Method::PATCH,
    Method::DELETE,
    Method::OPTIONS,
    Method::TRACE,
    Method::CONNECT,
];

/// Plain text body for every 404, whether from routing or a handler
pub struct NotFound;

impl ResponseExtender<Body> for NotFound {
    fn extend(&self, state: &mut State, res: &mut Response<Body>) {
        debug!("Nothing found at {}", Uri::borrow_from(state));
        res.headers_mut().insert(
            CONTENT_TYPE,
            HeaderValue::from_static("text/plain; charset=utf-8"),
        );
        *res.body_mut() = "404 File not found".into();
    }
}

/// Builds the request router
fn router(settings: Settings, storage: Arc<dyn Storage>, sessions: SessionStore) -> Router {
    let assets_dir = settings.static_dir.clone();

    // Build pipeline
    let (chain, pipelines) = single_pipeline(
        new_pipeline()
            .add(StateMiddleware::new(Db::new(storage)))
            .add(StateMiddleware::new(settings))
            .add(CookieParser)
            .add(SessionMiddleware::new(sessions))
            .build(),
    );

    build_router(chain, pipelines, |route| {
        route.get("/").to(handler!(posts::index));

        route.get("/register").to(handler!(users::register));
        route
            .post("/register")
            .to(body_handler!(users::register_post));

        route.get("/login").to(handler!(users::login));
        route.post("/login").to(body_handler!(users::login_post));

        route.get("/logout").to(handler!(users::logout));

        route.get("/posts").to(handler!(posts::list));
        route.scope("/posts", |route| {
            route.get("/new").to(handler!(posts::new));
            route.post("/new").to(body_handler!(posts::new_post));
            route
                .get("/:id")
                .with_path_extractor::<posts::PostPath>()
                .to(handler!(posts::view));
            route
                .request(ANY_METHOD.to_vec(), "/delete/:id")
                .with_path_extractor::<posts::PostPath>()
                .to(handler!(posts::delete));
        });

        route.get("/static/*").to_dir(&*assets_dir);

        // Error responders. Also replaces the body of handler 404s.
        route.add_response_extender(StatusCode::NOT_FOUND, NotFound);
    })
}

fn main() -> Result<(), failure::Error> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    // Read settings
    let path = if Path::new("/etc/quill/quill.toml").is_file() {
        Path::new("/etc/quill/quill.toml")
    } else {
        Path::new("quill.toml")
    };
    let data = std::fs::read(path)?;
    let settings = Settings::from_slice(&data)?;

    let session_config = SessionConfig::from_settings(&settings.session)?;
    let sessions = SessionStore::new(&session_config, settings.session.clone())?;
    let pool = db::connect(&settings.database_url, settings.pool_size)?;
    let storage: Arc<dyn Storage> = Arc::new(PgStorage::new(pool));

    let address = settings.host_address.clone();
    info!("Running at {}", address);
    gotham::start(address, router(settings, storage, sessions));
    Ok(())
}
