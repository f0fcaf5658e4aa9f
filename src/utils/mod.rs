// utils/mod.rs
pub mod config;
pub mod helpers;
pub mod security;
pub mod validation;

// Ré-exports pour faciliter l'import
pub use config::Config;
pub use helpers::{format_display_date, sanitize_filename, truncate_string};
pub use security::{
    generate_otp, hash_password, issue_token, otp_digest, verify_password, verify_token,
    TokenClaims, TokenPurpose,
};
pub use validation::{require_otp_input, validate_email, validate_new_password, validate_username};
