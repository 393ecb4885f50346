use askama::Template;
use gotham::state::{FromState, State};

use crate::{
    db::Db,
    document::{DocumentResult, TemplateExt},
    handler::{form, see_other},
    session::{self, SessionState},
    user::{Login, Registration},
};

#[derive(Template)]
#[template(path = "register.html")]
struct RegisterTemplate<'a> {
    session: &'a SessionState,
}

#[derive(Template)]
#[template(path = "login.html")]
struct LoginTemplate<'a> {
    session: &'a SessionState,
}

pub fn register(state: &State) -> DocumentResult {
    Ok(RegisterTemplate {
        session: SessionState::borrow_from(state),
    }
    .to_response(state))
}

pub fn register_post(state: &State, post: Vec<u8>) -> DocumentResult {
    let registration: Registration = form(&post)?;
    let user = registration.into_user()?;

    Db::from_state(state).create_user(&user)?;
    info!("Registered user '{}'", user.login);

    Ok(see_other(state, "/"))
}

pub fn login(state: &State) -> DocumentResult {
    Ok(LoginTemplate {
        session: SessionState::borrow_from(state),
    }
    .to_response(state))
}

/// Signs the session in if the credentials are valid. Either way the visitor ends up on the
/// home page.
pub fn login_post(state: &State, post: Vec<u8>) -> DocumentResult {
    let credentials: Login = form(&post)?;
    let mut response = see_other(state, "/");

    match credentials.authenticate(Db::from_state(state))? {
        Some(user) => {
            session::save(state, &mut response, &SessionState::for_user(&user))?;
            info!("User '{}' logged in", user.login);
        }
        None => info!("Failed login attempt for '{}'", credentials.login),
    }

    Ok(response)
}

pub fn logout(state: &State) -> DocumentResult {
    let mut response = see_other(state, "/");
    session::save(state, &mut response, &SessionState::default())?;
    Ok(response)
}
