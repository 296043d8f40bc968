pub mod password;
pub mod token;

pub use token::{create_token, decode_token, Claims};

/// Signup is limited to the campus email domain, compared case-insensitively.
pub fn email_domain_allowed(email: &str, allowed_domain: &str) -> bool {
    email
        .trim()
        .to_lowercase()
        .ends_with(&allowed_domain.to_lowercase())
}
