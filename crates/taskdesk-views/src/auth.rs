use taskdesk_core::user::{LoginRequest, RegisterUser};
use taskdesk_core::{Credentials, User};
use taskdesk_service::{AuthService, ServiceError};
use tracing::{error, info};

use crate::{Session, ViewError};

/// Log in and make the returned user current in `session`.
pub async fn login(
    auth: &dyn AuthService,
    session: &Session,
    input: &LoginRequest,
) -> Result<User, ViewError> {
    let resp = auth.login(input).await.map_err(|e| {
        error!("login failed for {}: {e}", input.email);
        ViewError::Auth(e)
    })?;
    let (Some(token), Some(user)) = (resp.token, resp.user) else {
        return Err(ViewError::Auth(ServiceError::Decode(
            "login response carried no token".into(),
        )));
    };
    session.update_user(Credentials {
        token,
        user: user.clone(),
    })?;
    if let Some(msg) = resp.message {
        info!("{msg}");
    }
    Ok(user)
}

/// Register a new account. The user still has to log in afterwards.
pub async fn register(auth: &dyn AuthService, input: &RegisterUser) -> Result<String, ViewError> {
    let resp = auth.register(input).await.map_err(ViewError::Auth)?;
    Ok(resp
        .message
        .unwrap_or_else(|| "Registration successful".to_string()))
}

pub fn logout(session: &Session) -> Result<(), ViewError> {
    session.clear()?;
    Ok(())
}
