//! Mock authentication with opaque bearer tokens.
//!
//! Credentials are a fixed demo list; sessions are random tokens held in
//! memory and lost on restart. There is no persistence and no token expiry.

use dashmap::DashMap;
use serde::Serialize;
use uuid::Uuid;

/// A demo account.
#[derive(Debug, Clone, Serialize)]
pub struct User {
    pub id: String,
    pub email: String,
    pub name: String,
    pub role: String,
}

struct MockUser {
    id: &'static str,
    email: &'static str,
    password: &'static str,
    name: &'static str,
    role: &'static str,
}

/// Fixed demo accounts. The shared password "demo" is also accepted for all
/// of them.
const MOCK_USERS: &[MockUser] = &[
    MockUser {
        id: "1",
        email: "admin@restaurante.com",
        password: "admin123",
        name: "Admin",
        role: "admin",
    },
    MockUser {
        id: "2",
        email: "maria@restaurante.com",
        password: "maria123",
        name: "Maria Silva",
        role: "owner",
    },
    MockUser {
        id: "3",
        email: "gerente@restaurante.com",
        password: "gerente123",
        name: "Gerente Loja",
        role: "manager",
    },
];

const SHARED_DEMO_PASSWORD: &str = "demo";

impl MockUser {
    fn to_user(&self) -> User {
        User {
            id: self.id.to_string(),
            email: self.email.to_string(),
            name: self.name.to_string(),
            role: self.role.to_string(),
        }
    }
}

/// In-memory session store mapping bearer tokens to user emails.
#[derive(Debug, Default)]
pub struct SessionStore {
    sessions: DashMap<String, String>,
}

impl SessionStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Validate credentials and mint a session token.
    pub fn login(&self, email: &str, password: &str) -> Option<(String, User)> {
        let account = MOCK_USERS
            .iter()
            .find(|u| u.email.eq_ignore_ascii_case(email))?;
        if account.password != password && password != SHARED_DEMO_PASSWORD {
            return None;
        }
        let token = Uuid::new_v4().to_string();
        self.sessions.insert(token.clone(), account.email.to_string());
        Some((token, account.to_user()))
    }

    /// Drop a session. Returns whether the token existed.
    pub fn revoke(&self, token: &str) -> bool {
        self.sessions.remove(token).is_some()
    }

    /// Resolve a bearer token to its user.
    pub fn user_for_token(&self, token: &str) -> Option<User> {
        let email = self.sessions.get(token)?;
        MOCK_USERS
            .iter()
            .find(|u| u.email == email.as_str())
            .map(MockUser::to_user)
    }
}
