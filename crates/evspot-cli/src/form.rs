//! Sign-up form validation, checked before anything is sent to the server.

/// A single field error, keyed by the field it belongs to
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldError {
    pub field: &'static str,
    pub message: &'static str,
}

const MIN_NAME_LENGTH: usize = 2;
const MIN_PASSWORD_LENGTH: usize = 6;

/// Loose email check: some token of the form `x@y.z` with no whitespace
pub fn looks_like_email(email: &str) -> bool {
    email.split_whitespace().any(|token| {
        token.char_indices().any(|(at, c)| {
            c == '@'
                && at > 0
                && token[at + 1..]
                    .char_indices()
                    .any(|(dot, d)| d == '.' && dot > 0 && at + 1 + dot + 1 < token.len())
        })
    })
}

pub fn validate_signup(name: &str, email: &str, password: &str, confirm: &str) -> Vec<FieldError> {
    let mut errors = Vec::new();
    let mut push = |field, message| errors.push(FieldError { field, message });

    if name.trim().is_empty() {
        push("name", "Name is required");
    } else if name.trim().chars().count() < MIN_NAME_LENGTH {
        push("name", "Name must be at least 2 characters");
    }

    if email.trim().is_empty() {
        push("email", "Email is required");
    } else if !looks_like_email(email) {
        push("email", "Please enter a valid email");
    }

    if password.is_empty() {
        push("password", "Password is required");
    } else if password.chars().count() < MIN_PASSWORD_LENGTH {
        push("password", "Password must be at least 6 characters");
    }

    if confirm.is_empty() {
        push("confirm_password", "Please confirm your password");
    } else if password != confirm {
        push("confirm_password", "Passwords do not match");
    }

    errors
}
