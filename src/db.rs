use diesel::r2d2::{ConnectionManager, Pool, PooledConnection};
use diesel_migrations::embed_migrations;
use gotham::state::{FromState, State};
use gotham_derive::StateData;

use std::{panic::RefUnwindSafe, sync::Arc};

use crate::{
    error::Result,
    post::{self, NewPost, Post},
    user::{self, NewUser, User},
};

pub use diesel::pg::PgConnection as Connection;

pub type ConnectionPool = Pool<ConnectionManager<Connection>>;

embed_migrations!();

/// Persistence for users and posts.
///
/// Every call is one independent unit of work; nothing spans calls.
pub trait Storage: Send + Sync + RefUnwindSafe {
    /// Fails if the login is already taken
    fn create_user(&self, user: &NewUser) -> Result<()>;
    fn user_by_login(&self, login: &str) -> Result<User>;
    fn create_post(&self, post: &NewPost) -> Result<()>;
    fn post(&self, id: i32) -> Result<Post>;
    /// All posts in insertion order
    fn posts(&self) -> Result<Vec<Post>>;
    /// Succeeds whether or not the post exists
    fn delete_post(&self, id: i32) -> Result<()>;
}

/// Postgres storage over a connection pool
pub struct PgStorage {
    pool: ConnectionPool,
}

// r2d2 recovers from panics of connection users by discarding the connection.
impl RefUnwindSafe for PgStorage {}

impl PgStorage {
    pub fn new(pool: ConnectionPool) -> Self {
        PgStorage { pool }
    }

    fn get(&self) -> Result<PooledConnection<ConnectionManager<Connection>>> {
        Ok(self.pool.get()?)
    }
}

impl Storage for PgStorage {
    fn create_user(&self, user: &NewUser) -> Result<()> {
        let connection = self.get()?;
        user::create(&connection, user)
    }

    fn user_by_login(&self, login: &str) -> Result<User> {
        let connection = self.get()?;
        user::by_login(&connection, login)
    }

    fn create_post(&self, new: &NewPost) -> Result<()> {
        let connection = self.get()?;
        post::submit(&connection, new)
    }

    fn post(&self, id: i32) -> Result<Post> {
        let connection = self.get()?;
        post::view(&connection, id)
    }

    fn posts(&self) -> Result<Vec<Post>> {
        let connection = self.get()?;
        post::list(&connection)
    }

    fn delete_post(&self, id: i32) -> Result<()> {
        let connection = self.get()?;
        post::delete(&connection, id)
    }
}

/// The storage shared with handlers via gotham's state data
#[derive(Clone, StateData)]
pub struct Db {
    storage: Arc<dyn Storage>,
}

impl Db {
    pub fn new(storage: Arc<dyn Storage>) -> Self {
        Self { storage }
    }

    pub fn from_state(state: &State) -> &dyn Storage {
        &*Self::borrow_from(state).storage
    }
}

/// Opens a connection pool and brings the schema up to date.
pub fn connect(url: &str, size: u32) -> std::result::Result<ConnectionPool, failure::Error> {
    let pool = Pool::builder()
        .max_size(size)
        .build(ConnectionManager::new(url))?;

    // Run migrations.
    let connection = pool.get()?;
    embedded_migrations::run_with_output(&*connection, &mut std::io::stdout())?;

    Ok(pool)
}

#[cfg(test)]
pub use self::memory::MemoryStorage;


/// The ignored tests run against the database in `DATABASE_URL`, each inside a transaction that
/// is never committed. Run them with `cargo test -- --ignored`.
#[cfg(test)]
mod tests {
    use diesel::Connection as _;

    use std::time::Duration;

    use super::*;
    use crate::error::Error;

    fn connection() -> Connection {
        let url = std::env::var("DATABASE_URL").expect("DATABASE_URL must be set");
        let connection = Connection::establish(&url).unwrap();
        embedded_migrations::run(&connection).unwrap();
        connection.begin_test_transaction().unwrap();
        connection
    }

    fn new_user(login: &str, password: &str) -> NewUser {
        NewUser {
            name: login.to_uppercase(),
            login: login.into(),
            hash: crate::password::hash(password).unwrap(),
        }
    }

    fn new_post(user_id: i32, title: &str) -> NewPost {
        NewPost {
            author: "Alice".into(),
            user_id,
            title: title.into(),
            body: String::new(),
        }
    }

    #[test]
    fn unreachable_database_is_a_connection_error() {
        let pool = Pool::builder()
            .max_size(1)
            .min_idle(Some(0))
            .connection_timeout(Duration::from_millis(200))
            .build_unchecked(ConnectionManager::new("postgres://127.0.0.1:1/quill"));
        let storage: Arc<dyn Storage> = Arc::new(PgStorage::new(pool));

        assert!(matches!(storage.posts(), Err(Error::Connection(_))));
        assert!(matches!(storage.post(1), Err(Error::Connection(_))));
        assert!(matches!(storage.delete_post(1), Err(Error::Connection(_))));
        assert!(matches!(
            storage.user_by_login("alice"),
            Err(Error::Connection(_))
        ));
    }

    #[test]
    #[ignore]
    fn created_users_verify() {
        let conn = connection();
        user::create(&conn, &new_user("alice-test", "pw1")).unwrap();

        let user = user::by_login(&conn, "alice-test").unwrap();
        assert_ne!(user.hash, "pw1");
        assert!(user.verify("pw1").unwrap());
        assert!(!user.verify("pw2").unwrap());
    }

    #[test]
    #[ignore]
    fn logins_are_unique() {
        let conn = connection();
        user::create(&conn, &new_user("dup-test", "pw")).unwrap();
        let error = user::create(&conn, &new_user("dup-test", "pw")).unwrap_err();
        assert!(error.is_storage());
    }

    #[test]
    #[ignore]
    fn unknown_login_is_not_found() {
        let conn = connection();
        assert!(matches!(
            user::by_login(&conn, "nobody-test"),
            Err(Error::NotFound)
        ));
    }

    #[test]
    #[ignore]
    fn posts_keep_insertion_order() {
        let conn = connection();
        let before = post::list(&conn).unwrap().len();
        for title in &["first", "second", "third"] {
            post::submit(&conn, &new_post(1, title)).unwrap();
        }
        let titles: Vec<String> = post::list(&conn)
            .unwrap()
            .into_iter()
            .skip(before)
            .map(|p| p.title)
            .collect();
        assert_eq!(titles, vec!["first", "second", "third"]);
    }

    #[test]
    #[ignore]
    fn delete_is_idempotent() {
        let conn = connection();
        post::submit(&conn, &new_post(1, "doomed")).unwrap();
        let id = post::list(&conn).unwrap().last().unwrap().id;

        post::delete(&conn, id).unwrap();
        post::delete(&conn, id).unwrap();
        assert!(matches!(post::view(&conn, id), Err(Error::NotFound)));
    }
}
