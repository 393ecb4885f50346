use askama::Template;
use futures::{future, Future, Stream};
use gotham::{
    handler::{HandlerError, HandlerFuture},
    helpers::http::response::create_temporary_redirect as temp_redirect,
    state::{FromState, State},
};
use http::{Response, StatusCode};
use hyper::Body;
use serde::de::DeserializeOwned;

use std::borrow::Cow;

use crate::{
    config::{ErrorPolicy, Settings},
    document::TemplateExt,
    error::Error,
    session::SessionState,
};

#[derive(Template)]
#[template(path = "error.html")]
struct ErrorTemplate<'a> {
    session: &'a SessionState,
    status: StatusCode,
    error: String,
}

/// Collects the request body, then runs `op` on it. A body that can't be read fails the request
/// like any other handler error.
pub fn body_handler<F>(mut state: State, op: F) -> Box<HandlerFuture>
where
    F: FnOnce(&State, Vec<u8>) -> Result<Response<Body>, failure::Error> + Send + 'static,
{
    let collected = Body::take_from(&mut state).concat2().then(move |body| {
        let result = match body {
            Ok(chunk) => op(&state, chunk.to_vec()),
            Err(e) => Err(Error::Validation(format!("unreadable request body: {}", e)).into()),
        };
        let response = response(&state, result);
        future::ok::<_, (State, HandlerError)>((state, response))
    });

    Box::new(collected)
}

/// Decodes an url encoded form. Missing fields are left to the form's serde defaults.
pub fn form<T: DeserializeOwned>(body: &[u8]) -> Result<T, Error> {
    Ok(serde_urlencoded::from_bytes(body)?)
}

/// A `303 See Other` redirect, so the browser follows up with a GET.
pub fn see_other<L: Into<Cow<'static, str>>>(state: &State, location: L) -> Response<Body> {
    let mut response = temp_redirect(state, location);
    *response.status_mut() = StatusCode::SEE_OTHER;
    response
}

fn status_of(error: &failure::Error) -> StatusCode {
    error
        .downcast_ref::<Error>()
        .map(Error::status)
        .unwrap_or(StatusCode::INTERNAL_SERVER_ERROR)
}

/// Whether a handler error must take the process down
fn terminates(policy: ErrorPolicy) -> bool {
    policy == ErrorPolicy::Fatal
}

pub fn error_response(state: &State, error: failure::Error) -> Response<Body> {
    let policy = Settings::try_borrow_from(state)
        .map(|settings| settings.error_policy)
        .unwrap_or_default();
    if terminates(policy) {
        error!("Terminating after handler error: {}", error);
        std::process::exit(1);
    }

    let status = status_of(&error);
    if status.is_server_error() {
        error!("{}", error);
    } else {
        debug!("Request failed with {}: {}", status, error);
    }

    let anonymous = SessionState::default();
    let template = ErrorTemplate {
        session: SessionState::try_borrow_from(state).unwrap_or(&anonymous),
        status,
        error: error.to_string(),
    };
    let mut response = template.to_response(state);
    if response.status() == StatusCode::OK {
        *response.status_mut() = status;
    }
    response
}

pub fn response(state: &State, result: Result<Response<Body>, failure::Error>) -> Response<Body> {
    match result {
        Ok(response) => response,
        Err(error) => error_response(state, error),
    }
}

#[macro_export]
macro_rules! handler {
    ($handler_fn:path) => {
        |state| {
            let r = crate::handler::response(&state, $handler_fn(&state));
            (state, r)
        }
    };
}

#[macro_export]
macro_rules! body_handler {
    ($handler_fn:path) => {
        |state| crate::handler::body_handler(state, $handler_fn)
    };
}
