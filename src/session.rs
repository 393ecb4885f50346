//! Client held sessions.
//!
//! The whole session lives in the `user-session` cookie as base64 encoded JSON followed by an
//! HMAC-SHA256 tag over it. A cookie that is missing, malformed or fails verification reads as an
//! anonymous session.
use cookie::{Cookie, CookieJar, SameSite};
use gotham::{
    handler::HandlerFuture,
    middleware::Middleware,
    state::{FromState, State},
};
use gotham_derive::{NewMiddleware, StateData};
use hmac::{Hmac, Mac, NewMac};
use hyper::{header, Body, Response};
use rand::prelude::*;
use sha2::Sha256;

use std::sync::Arc;

use crate::{config, user::User};

/// Name of the session cookie
pub const COOKIE_NAME: &str = "user-session";
/// Minimum length of a signing key in bytes
pub const KEY_LEN: usize = 32;

const ENCODING: base64::Config = base64::URL_SAFE_NO_PAD;

/// The authentication state of a visitor.
///
/// `user_id` and `author` only identify someone while `authenticated` is set.
#[derive(Clone, Debug, Default, PartialEq, Deserialize, Serialize, StateData)]
pub struct SessionState {
    #[serde(default)]
    pub authenticated: bool,
    #[serde(default, rename = "userId")]
    pub user_id: Option<i32>,
    #[serde(default)]
    pub author: Option<String>,
}

impl SessionState {
    pub fn signed_in(user_id: i32, author: &str) -> Self {
        SessionState {
            authenticated: true,
            user_id: Some(user_id),
            author: Some(author.to_owned()),
        }
    }

    pub fn for_user(user: &User) -> Self {
        Self::signed_in(user.id, &user.name)
    }

    /// The session's user id, if it is authenticated
    pub fn user_id(&self) -> Option<i32> {
        if self.authenticated {
            self.user_id
        } else {
            None
        }
    }

    /// The id and display name of the session's user, if it is authenticated
    pub fn identity(&self) -> Option<(i32, &str)> {
        match (self.authenticated, self.user_id, &self.author) {
            (true, Some(id), Some(author)) => Some((id, author)),
            _ => None,
        }
    }

    pub fn is_authenticated(&self) -> bool {
        self.identity().is_some()
    }

    /// Display name for templates, empty when anonymous
    pub fn author_name(&self) -> &str {
        self.identity().map(|(_, name)| name).unwrap_or("")
    }
}

/// Key material for signing session cookies.
#[derive(Clone)]
pub struct SessionConfig {
    pub signing_key: Vec<u8>,
}

impl SessionConfig {
    /// Reads the key from settings, generating a random one if none is configured.
    pub fn from_settings(settings: &config::Session) -> Result<Self, failure::Error> {
        let signing_key = match settings.key {
            Some(ref key) => base64::decode(key.trim())?,
            None => {
                warn!("No session key configured, sessions will not survive a restart");
                generate_key().to_vec()
            }
        };
        if signing_key.len() < KEY_LEN {
            return Err(failure::format_err!(
                "session key must be at least {} bytes, got {}",
                KEY_LEN,
                signing_key.len()
            ));
        }
        Ok(SessionConfig { signing_key })
    }
}

/// Generates a new random signing key
pub fn generate_key() -> [u8; KEY_LEN] {
    let mut key = [0u8; KEY_LEN];
    StdRng::from_entropy().fill(&mut key[..]);
    key
}

/// Reads and writes signed session cookies.
#[derive(Clone, StateData)]
pub struct SessionStore {
    mac: Arc<Hmac<Sha256>>,
    cookie: Arc<config::Session>,
}

impl SessionStore {
    pub fn new(config: &SessionConfig, cookie: config::Session) -> Result<Self, failure::Error> {
        let mac = Hmac::<Sha256>::new_varkey(&config.signing_key)
            .map_err(|_| failure::err_msg("invalid session key length"))?;
        Ok(SessionStore {
            mac: Arc::new(mac),
            cookie: Arc::new(cookie),
        })
    }

    fn tag(&self, payload: &str) -> Hmac<Sha256> {
        let mut mac = (*self.mac).clone();
        mac.update(payload.as_bytes());
        mac
    }

    /// Serializes and signs a session into a cookie value
    pub fn encode(&self, session: &SessionState) -> Result<String, serde_json::Error> {
        let payload = base64::encode_config(&serde_json::to_vec(session)?, ENCODING);
        let tag = self.tag(&payload).finalize().into_bytes();
        Ok(format!("{}.{}", payload, base64::encode_config(&tag, ENCODING)))
    }

    /// Verifies and deserializes a cookie value. `None` if it fails verification.
    pub fn decode(&self, value: &str) -> Option<SessionState> {
        let mut parts = value.splitn(2, '.');
        let payload = parts.next()?;
        let tag = base64::decode_config(parts.next()?, ENCODING).ok()?;
        self.tag(payload).verify(&tag).ok()?;
        let json = base64::decode_config(payload, ENCODING).ok()?;
        serde_json::from_slice(&json).ok()
    }

    /// The session carried by the request's cookies. Anonymous if there is none or it's invalid.
    pub fn load(&self, jar: Option<&CookieJar>) -> SessionState {
        let value = match jar.and_then(|jar| jar.get(COOKIE_NAME)) {
            Some(cookie) => cookie.value(),
            None => return SessionState::default(),
        };
        match self.decode(value) {
            Some(session) => session,
            None => {
                debug!("Rejected session cookie that failed verification");
                SessionState::default()
            }
        }
    }

    /// Builds the cookie storing `session`
    pub fn cookie(&self, session: &SessionState) -> Result<Cookie<'static>, serde_json::Error> {
        let mut builder = Cookie::build(COOKIE_NAME, self.encode(session)?)
            .path("/")
            .http_only(true)
            .same_site(SameSite::Lax)
            .secure(self.cookie.secure);
        if let Some(ref domain) = self.cookie.domain {
            builder = builder.domain(domain.clone());
        }
        if let Some(days) = self.cookie.max_age_days {
            builder = builder.max_age(time::Duration::days(days));
        }
        Ok(builder.finish())
    }
}

/// Stores `session` in the client's cookie with a single `Set-Cookie` header.
pub fn save(
    state: &State,
    response: &mut Response<Body>,
    session: &SessionState,
) -> Result<(), failure::Error> {
    let cookie = SessionStore::borrow_from(state).cookie(session)?;
    response
        .headers_mut()
        .append(header::SET_COOKIE, cookie.to_string().parse()?);
    Ok(())
}

/// Puts the request's [`SessionState`] and the [`SessionStore`] into the state.
///
/// Must come after gotham's `CookieParser` in the pipeline.
#[derive(Clone, NewMiddleware)]
pub struct SessionMiddleware {
    store: SessionStore,
}

impl SessionMiddleware {
    pub fn new(store: SessionStore) -> Self {
        SessionMiddleware { store }
    }
}

impl Middleware for SessionMiddleware {
    fn call<C>(self, mut state: State, chain: C) -> Box<HandlerFuture>
    where
        C: FnOnce(State) -> Box<HandlerFuture>,
    {
        let session = self.store.load(CookieJar::try_borrow_from(&state));
        state.put(session);
        state.put(self.store);
        chain(state)
    }
}
