use std::{collections::HashSet, sync::LazyLock};

use regex::Regex;

use crate::models::Login;

static SEPARATORS: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"[_ ]+").unwrap());
static DISALLOWED: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"[^a-z0-9.-]").unwrap());

/// Usernames are stored lowercase, with separators folded into `.` and anything else dropped.
pub fn sanitize(input: &str) -> String {
    let lowered = input.trim().to_lowercase();
    let joined = SEPARATORS.replace_all(&lowered, ".");

    DISALLOWED
        .replace_all(&joined, "")
        .trim_matches('.')
        .to_string()
}

/// Sanitizes every login and drops empty or repeated usernames, keeping the first.
pub fn sanitize_logins(logins: &mut Vec<Login>) {
    let mut seen = HashSet::new();

    logins.retain_mut(|login| {
        login.username = sanitize(&login.username);
        !login.username.is_empty() && seen.insert(login.username.clone())
    });
}
