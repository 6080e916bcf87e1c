#![allow(missing_docs)]

pub(crate) mod http;

use std::sync::{Arc, Mutex};

use rusqlite::Connection;

use crate::{
    PasswordHash, ValidatedPassword,
    db::initialize,
    user::{NewUser, User, create_user},
};

pub(crate) use http::{assert_content_type, get_header};

/// The password of every user created by these helpers.
pub(crate) const TEST_PASSWORD: &str = "averysafeandsecurepassword";

/// Create a user named `name` with the password [TEST_PASSWORD].
///
/// The hash uses the lowest bcrypt cost to keep tests fast.
pub(crate) fn create_user_named(name: &str, connection: &Connection) -> User {
    let password_hash =
        PasswordHash::new(ValidatedPassword::new_unchecked(TEST_PASSWORD), 4).unwrap();

    create_user(
        NewUser {
            email: format!("{name}@example.com"),
            username: name.to_owned(),
            nickname: name.to_owned(),
            password_hash,
        },
        connection,
    )
    .unwrap()
}

pub(crate) fn create_test_user(connection: &Connection) -> User {
    create_user_named("tester", connection)
}

/// An initialized in-memory database holding a single test user.
pub(crate) fn get_test_connection_and_user() -> (Arc<Mutex<Connection>>, User) {
    let connection =
        Connection::open_in_memory().expect("Could not create in-memory SQLite database");
    initialize(&connection).expect("Could not initialize database");
    let user = create_test_user(&connection);

    (Arc::new(Mutex::new(connection)), user)
}
