//! Login, logout and session status commands

use anyhow::{Context, Result};
use serde::Deserialize;

use super::{Role, Session};
use crate::api::PortalClient;
use crate::chat::wire::WireId;

/// How the user signs in.
pub enum LoginMethod {
    /// POST credentials to `login/`.
    Credentials { email: String, password: String },
    /// Store a token obtained elsewhere (e.g. copied from the web portal).
    Token {
        token: String,
        role: Role,
        user_id: Option<String>,
        user_name: Option<String>,
    },
}

/// `data` of a successful login response. Field names differ between portals.
#[derive(Debug, Default, Deserialize)]
struct LoginData {
    token: Option<String>,
    access: Option<String>,
    role: Option<String>,
    user_id: Option<WireId>,
    id: Option<WireId>,
    user_name: Option<String>,
    name: Option<String>,
    user_image: Option<String>,
    image: Option<String>,
}

fn session_from_login(data: LoginData) -> Result<Session> {
    let token = data
        .token
        .or(data.access)
        .filter(|t| !t.trim().is_empty())
        .context("Login response did not include a token")?;
    let role_str = data.role.context("Login response did not include a role")?;
    let role = Role::parse(&role_str)
        .with_context(|| format!("Unknown role in login response: {}", role_str))?;

    let mut session = Session::new(token, role);
    session.user_id = data.user_id.or(data.id).map(|id| id.to_string());
    session.user_name = data.user_name.or(data.name).filter(|n| !n.trim().is_empty());
    session.user_image = data.user_image.or(data.image).filter(|i| !i.trim().is_empty());
    Ok(session)
}

/// Sign in and persist the session.
pub async fn login(method: LoginMethod) -> Result<()> {
    let client = PortalClient::from_config()?;

    let session = match method {
        LoginMethod::Credentials { email, password } => {
            let body = serde_json::json!({ "email": email, "password": password });
            let env = client
                .post_public::<LoginData>("login/", &body)
                .await
                .context("Login failed")?;
            let data = env.data.context("Login response had no data")?;
            session_from_login(data)?
        }
        LoginMethod::Token {
            token,
            role,
            user_id,
            user_name,
        } => {
            let token = token.trim().to_string();
            if token.is_empty() {
                anyhow::bail!("Token is empty");
            }
            let mut session = Session::new(token, role);
            session.user_id = user_id;
            session.user_name = user_name;
            session
        }
    };

    client
        .session()
        .save(&session)
        .context("Failed to save session")?;
    tracing::debug!("Stored session for role {}", session.role.as_str());

    println!("Login successful.");
    println!(
        "Signed in as {} ({})",
        session.display_name(),
        session.role.as_str()
    );
    Ok(())
}

/// Forget the stored session.
pub async fn logout() -> Result<()> {
    let client = PortalClient::from_config()?;
    client.session().clear().context("Failed to clear session")?;
    println!("Logged out.");
    Ok(())
}

/// Show the API endpoint and the stored session.
pub async fn status() -> Result<()> {
    let client = PortalClient::from_config()?;
    println!("API base:    {}", client.base_url());

    match client.session().load() {
        Some(session) => {
            println!("Role:        {}", session.role.as_str());
            println!("User:        {}", session.display_name());
            println!("User ID:     {}", session.user_id.as_deref().unwrap_or("(unknown)"));
            println!("Token:       present");
        }
        None => {
            println!("Token:       none");
            println!("\nRun 'portal-cli login' to authenticate.");
        }
    }
    Ok(())
}
