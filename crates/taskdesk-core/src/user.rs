use std::fmt;

use serde::{Deserialize, Serialize};

use crate::TaskdeskError;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    Admin,
    #[default]
    Member,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::Admin => "admin",
            Role::Member => "member",
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct User {
    #[serde(rename = "_id")]
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub username: String,
    pub email: String,
    #[serde(default)]
    pub role: Role,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub bio: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub profile_image_url: Option<String>,
}

/// A bearer token together with the user it was issued to.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Credentials {
    pub token: String,
    pub user: User,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
}

impl LoginRequest {
    pub fn validate(&self) -> Result<(), TaskdeskError> {
        if !is_valid_email(&self.email) {
            return Err(invalid("Please enter a valid email address."));
        }
        if self.password.is_empty() {
            return Err(invalid("Please enter the password."));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RegisterUser {
    pub name: String,
    pub username: String,
    pub email: String,
    pub password: String,
    #[serde(default)]
    pub bio: String,
    #[serde(default)]
    pub profile_image_url: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub admin_invite_token: Option<String>,
}

impl RegisterUser {
    pub fn validate(&self) -> Result<(), TaskdeskError> {
        if self.name.trim().is_empty() {
            return Err(invalid("Please enter full name."));
        }
        if self.username.trim().is_empty() {
            return Err(invalid("Please enter unique username."));
        }
        if !is_valid_email(&self.email) {
            return Err(invalid("Please enter a valid email address."));
        }
        if self.password.is_empty() {
            return Err(invalid("Please enter the password."));
        }
        Ok(())
    }
}

/// Admin-side user creation.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CreateUser {
    pub name: String,
    pub username: String,
    pub email: String,
    pub password: String,
    #[serde(default)]
    pub role: Role,
}

impl CreateUser {
    pub fn validate(&self) -> Result<(), TaskdeskError> {
        if self.name.trim().is_empty() {
            return Err(invalid("Name is required"));
        }
        if self.username.trim().is_empty() {
            return Err(invalid("Username is required"));
        }
        if self.email.trim().is_empty() {
            return Err(invalid("Email is required"));
        }
        if self.password.is_empty() {
            return Err(invalid("Password is required"));
        }
        Ok(())
    }
}

/// `local@domain.tld` with no whitespace and exactly one `@`.
pub fn is_valid_email(email: &str) -> bool {
    if email.chars().any(char::is_whitespace) {
        return false;
    }
    let Some((local, domain)) = email.split_once('@') else {
        return false;
    };
    if local.is_empty() || domain.contains('@') {
        return false;
    }
    match domain.rsplit_once('.') {
        Some((host, tld)) => !host.is_empty() && !tld.is_empty(),
        None => false,
    }
}

fn invalid(msg: &str) -> TaskdeskError {
    TaskdeskError::InvalidInput(msg.to_string())
}
