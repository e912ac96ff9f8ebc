use lazy_static::lazy_static;
use regex::Regex;

pub const USERNAME_MIN_LEN: usize = 3;
pub const USERNAME_MAX_LEN: usize = 32;
pub const PASSWORD_MIN_LEN: usize = 8;
pub const PASSWORD_MAX_LEN: usize = 128;

lazy_static! {
    static ref USERNAME_RE: Regex = Regex::new(r"^[A-Za-z0-9_]+$").unwrap();
    static ref SPECIAL_RE: Regex = Regex::new(r#"[!@#$%^&*()_+\-=\[\]{};':",.<>/?]"#).unwrap();
}

/// Returns the first rule the username breaks, if any.
pub fn validate_username(username: &str) -> Result<(), String> {
    let len = username.chars().count();
    if len < USERNAME_MIN_LEN {
        return Err(format!(
            "Username must be at least {USERNAME_MIN_LEN} characters long."
        ));
    }
    if len > USERNAME_MAX_LEN {
        return Err(format!(
            "Username must be at most {USERNAME_MAX_LEN} characters long."
        ));
    }
    if username.contains(char::is_whitespace) {
        return Err("Username cannot contain spaces.".into());
    }
    if !USERNAME_RE.is_match(username) {
        return Err("Username can only contain letters, numbers, and underscores.".into());
    }
    Ok(())
}

/// Returns the first complexity rule the password breaks, if any.
pub fn validate_password(password: &str) -> Result<(), String> {
    let len = password.chars().count();
    if len < PASSWORD_MIN_LEN {
        return Err(format!(
            "Password must be at least {PASSWORD_MIN_LEN} characters long."
        ));
    }
    if len > PASSWORD_MAX_LEN {
        return Err(format!(
            "Password must be at most {PASSWORD_MAX_LEN} characters long."
        ));
    }
    if !password.chars().any(|c| c.is_ascii_lowercase()) {
        return Err("Password must contain at least one lowercase letter.".into());
    }
    if !password.chars().any(|c| c.is_ascii_uppercase()) {
        return Err("Password must contain at least one uppercase letter.".into());
    }
    if !password.chars().any(|c| c.is_ascii_digit()) {
        return Err("Password must contain at least one number.".into());
    }
    if !SPECIAL_RE.is_match(password) {
        return Err("Password must contain at least one special character.".into());
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn accepts_reasonable_usernames() {
        assert!(validate_username("alice").is_ok());
        assert!(validate_username("soc_analyst_01").is_ok());
    }

    #[test]
    fn rejects_bad_usernames() {
        assert!(validate_username("al").unwrap_err().contains("at least 3"));
        assert!(validate_username("has space").unwrap_err().contains("spaces"));
        assert!(validate_username("dash-name").unwrap_err().contains("letters"));
        assert!(validate_username(&"a".repeat(33)).unwrap_err().contains("at most"));
    }

    #[test]
    fn accepts_policy_compliant_password() {
        assert!(validate_password("SecurePass123!").is_ok());
    }

    #[test]
    fn rejects_each_missing_class() {
        assert!(validate_password("Sh0rt!").unwrap_err().contains("8 characters"));
        assert!(validate_password("SECUREPASS123!").unwrap_err().contains("lowercase"));
        assert!(validate_password("securepass123!").unwrap_err().contains("uppercase"));
        assert!(validate_password("SecurePassword!").unwrap_err().contains("number"));
        assert!(validate_password("SecurePass1234").unwrap_err().contains("special"));
    }

    #[test]
    fn rejects_oversized_password() {
        let long = format!("Aa1!{}", "x".repeat(PASSWORD_MAX_LEN));
        assert!(validate_password(&long).unwrap_err().contains("at most"));
    }
}
