//! Reader for the flat `users.txt` credential file that predates the
//! database. Each line is `username,<bcrypt hash>`; the writer put a space
//! after the comma, so fields are trimmed.

use std::path::Path;

use anyhow::Context;
use tracing::warn;

use crate::auth::{password::HashScheme, validation::validate_username};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LegacyUser {
    pub username: String,
    pub password_hash: String,
}

pub fn parse_line(line: &str) -> Option<LegacyUser> {
    let line = line.trim();
    if line.is_empty() {
        return None;
    }
    let (username, hash) = line.split_once(',')?;
    let username = username.trim();
    let hash = hash.trim();
    if validate_username(username).is_err() || HashScheme::detect(hash).is_none() {
        return None;
    }
    Some(LegacyUser {
        username: username.to_string(),
        password_hash: hash.to_string(),
    })
}

pub fn parse(contents: &str) -> Vec<LegacyUser> {
    contents
        .lines()
        .enumerate()
        .filter_map(|(idx, line)| {
            let parsed = parse_line(line);
            if parsed.is_none() && !line.trim().is_empty() {
                warn!(line = idx + 1, "skipping malformed legacy user line");
            }
            parsed
        })
        .collect()
}

pub async fn read_file(path: &Path) -> anyhow::Result<Vec<LegacyUser>> {
    let contents = tokio::fs::read_to_string(path)
        .await
        .with_context(|| format!("read legacy users file {}", path.display()))?;
    Ok(parse(&contents))
}
