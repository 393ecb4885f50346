use diesel::prelude::*;

use crate::{
    db::{Connection, Storage},
    error::{Error, Result},
    password,
    schema::users,
};

#[derive(Clone, Debug, Queryable, Identifiable)]
pub struct User {
    /// The numeric id assigned by the database
    pub id: i32,
    /// The user's display name
    pub name: String,
    /// The unique login
    pub login: String,
    /// The hashed password
    pub hash: String,
}

impl User {
    /// Verify the supplied password matches the users
    pub fn verify(&self, password: &str) -> Result<bool> {
        password::verify(&self.hash, password)
    }
}

/// A user ready to be inserted, with the password already hashed.
#[derive(Clone, Debug, Insertable)]
#[table_name = "users"]
pub struct NewUser {
    pub name: String,
    pub login: String,
    pub hash: String,
}

/// The registration form.
///
/// NOTE: This structure contains the user's unencrypted password, handle it with great care!
#[derive(Deserialize)]
pub struct Registration {
    /// The user's display name
    #[serde(default)]
    pub name: String,
    /// The login
    #[serde(default)]
    pub login: String,
    /// The users raw password
    #[serde(default)]
    password: String,
}

impl Registration {
    /// Converts the form into an insertable user, hashing the password.
    pub fn into_user(self) -> Result<NewUser> {
        Ok(NewUser {
            hash: password::hash(&self.password)?,
            name: self.name,
            login: self.login,
        })
    }
}

/// Login credentials
#[derive(Deserialize)]
pub struct Login {
    #[serde(default)]
    pub login: String,
    #[serde(default)]
    password: String,
}

impl Login {
    /// Returns the user if the login exists and the password is valid
    pub fn authenticate(&self, storage: &dyn Storage) -> Result<Option<User>> {
        let user = match storage.user_by_login(&self.login) {
            Ok(user) => user,
            Err(Error::NotFound) => return Ok(None),
            Err(e) => return Err(e),
        };
        if user.verify(&self.password)? {
            Ok(Some(user))
        } else {
            Ok(None)
        }
    }
}

/// Creates a user
pub fn create(connection: &Connection, user: &NewUser) -> Result<()> {
    diesel::insert_into(users::table)
        .values(user)
        .execute(connection)?;
    Ok(())
}

pub fn by_login(connection: &Connection, login: &str) -> Result<User> {
    use crate::schema::users::dsl;

    let user = dsl::users.filter(dsl::login.eq(login)).first(connection)?;
    Ok(user)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::MemoryStorage;

    fn register(storage: &MemoryStorage, name: &str, login: &str, password: &str) {
        let form = format!("name={}&login={}&password={}", name, login, password);
        let registration: Registration = serde_urlencoded::from_str(&form).unwrap();
        storage
            .create_user(&registration.into_user().unwrap())
            .unwrap();
    }

    #[test]
    fn registration_stores_a_hash() {
        let storage = MemoryStorage::new();
        register(&storage, "Alice", "alice", "pw1");

        let user = storage.user_by_login("alice").unwrap();
        assert_eq!(user.name, "Alice");
        assert_ne!(user.hash, "pw1");
        assert!(user.verify("pw1").unwrap());
    }

    #[test]
    fn missing_fields_are_empty() {
        let registration: Registration = serde_urlencoded::from_str("login=alice").unwrap();
        assert_eq!(registration.name, "");
        assert_eq!(registration.password, "");
    }

    #[test]
    fn authenticate() {
        let storage = MemoryStorage::new();
        register(&storage, "Alice", "alice", "pw1");

        let login = Login {
            login: "alice".into(),
            password: "pw1".into(),
        };
        let user = login.authenticate(&storage).unwrap().unwrap();
        assert_eq!(user.login, "alice");

        let wrong = Login {
            login: "alice".into(),
            password: "pw2".into(),
        };
        assert!(wrong.authenticate(&storage).unwrap().is_none());

        let unknown = Login {
            login: "bob".into(),
            password: "pw1".into(),
        };
        assert!(unknown.authenticate(&storage).unwrap().is_none());
    }
}
