//! # Access Guard
//!
//! Decides whether the bearer of a token may reach a resource.
//!
//! ## Rules
//!
//! - No token, a malformed one, a foreign signature or an expired one is always denied
//! - Roles are matched exactly, there is no hierarchy: a chef token never passes where a user is
//!   required and the other way around
//! - The guard keeps no session state, every decision is derived from the token alone
//!
//! ## Views
//!
//! The single page client runs the same decision before rendering a protected view. Instead of a
//! status code a denial becomes a redirect to the sign up form, carrying the page the visitor was
//! trying to reach.
use std::sync::Arc;

use axum::http::HeaderMap;
use serde::Serialize;
use tracing::debug;

use crate::{
    error::{AppError, DenyReason},
    models::{Principal, Role},
    token::TokenIssuer,
};

pub const ACCESS_TOKEN_HEADER: &str = "x-access-token";
pub const SIGN_UP_PATH: &str = "/sign-up-form";

/// Client views that need a signed in principal of a given role. Everything else is public.
pub const PROTECTED_VIEWS: &[(&str, Role)] = &[
    ("/user-profile", Role::User),
    ("/post-new-meal", Role::Chef),
    ("/request-form", Role::Chef),
];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Requirement {
    Role(Role),
    Authenticated,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "action", rename_all = "lowercase")]
pub enum ViewDecision {
    Render {
        path: String,
    },
    Redirect {
        to: &'static str,
        from: String,
    },
}

#[derive(Clone)]
pub struct AccessGuard {
    tokens: Arc<TokenIssuer>,
}

impl AccessGuard {
    pub fn new(tokens: Arc<TokenIssuer>) -> Self {
        Self { tokens }
    }

    pub fn authorize(
        &self,
        token: Option<&str>,
        requirement: Requirement,
    ) -> Result<Principal, AppError> {
        let token = token.ok_or(AppError::Denied(DenyReason::MissingToken))?;
        let principal = self.tokens.verify(token)?;

        match requirement {
            Requirement::Role(role) if principal.role != role => {
                debug!(
                    principal = principal.id,
                    role = %principal.role,
                    required = %role,
                    "Role mismatch"
                );
                Err(AppError::Denied(DenyReason::RoleMismatch))
            }
            _ => Ok(principal),
        }
    }

    pub fn authorize_headers(
        &self,
        headers: &HeaderMap,
        requirement: Requirement,
    ) -> Result<Principal, AppError> {
        self.authorize(extract_bearer_token(headers), requirement)
    }

    pub fn authorize_view(&self, token: Option<&str>, path: &str) -> ViewDecision {
        let Some(role) = required_role(path) else {
            return ViewDecision::Render {
                path: path.to_string(),
            };
        };

        match self.authorize(token, Requirement::Role(role)) {
            Ok(_) => ViewDecision::Render {
                path: path.to_string(),
            },
            Err(_) => ViewDecision::Redirect {
                to: SIGN_UP_PATH,
                from: path.to_string(),
            },
        }
    }
}

pub fn required_role(path: &str) -> Option<Role> {
    let path = match path.trim_end_matches('/') {
        "" => "/",
        trimmed => trimmed,
    };

    PROTECTED_VIEWS
        .iter()
        .find(|(view, _)| *view == path)
        .map(|(_, role)| *role)
}

/// Reads `Bearer <token>` from `x-access-token`, falling back to `Authorization` when the first
/// header is absent or holds no bearer token.
pub fn extract_bearer_token(headers: &HeaderMap) -> Option<&str> {
    [ACCESS_TOKEN_HEADER, "authorization"]
        .into_iter()
        .find_map(|name| {
            headers
                .get(name)?
                .to_str()
                .ok()?
                .strip_prefix("Bearer ")
                .map(str::trim)
                .filter(|v| !v.is_empty())
        })
}
