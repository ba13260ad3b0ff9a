use lazy_static::lazy_static;
use regex::Regex;
use serde::Deserialize;

pub const USERNAME_MIN: usize = 3;
pub const USERNAME_MAX: usize = 20;
pub const PASSWORD_MIN: usize = 6;
pub const EMAIL_MAX: usize = 120;

pub(crate) fn is_valid_email(email: &str) -> bool {
    lazy_static! {
        static ref EMAIL_RE: Regex = Regex::new(r"^[^@\s]+@[^@\s]+\.[^@\s]+$").unwrap();
    }
    EMAIL_RE.is_match(email)
}

pub(crate) fn normalize_email(email: &str) -> String {
    email.trim().to_lowercase()
}

fn check_email(email: &str, errors: &mut FieldErrors) {
    if email.is_empty() {
        errors.push("email", "Email is required.");
    } else if email.chars().count() > EMAIL_MAX {
        errors.push("email", format!("Email must be at most {EMAIL_MAX} characters."));
    } else if !is_valid_email(email) {
        errors.push("email", "Enter a valid email address.");
    }
}

/// Field-level validation messages in the order they were found.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct FieldErrors(Vec<(&'static str, String)>);

impl FieldErrors {
    pub fn push(&mut self, field: &'static str, message: impl Into<String>) {
        self.0.push((field, message.into()));
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn for_field<'a>(&'a self, field: &'a str) -> impl Iterator<Item = &'a str> + 'a {
        self.0
            .iter()
            .filter(move |(f, _)| *f == field)
            .map(|(_, m)| m.as_str())
    }

    pub fn has(&self, field: &str) -> bool {
        self.for_field(field).next().is_some()
    }
}

/// Body of `POST /login`.
#[derive(Debug, Default, Deserialize)]
pub struct LoginForm {
    #[serde(default)]
    pub email: String,
    #[serde(default)]
    pub password: String,
}

impl LoginForm {
    pub fn validate(&mut self) -> FieldErrors {
        self.email = normalize_email(&self.email);
        let mut errors = FieldErrors::default();
        check_email(&self.email, &mut errors);
        if self.password.is_empty() {
            errors.push("password", "Password is required.");
        }
        errors
    }
}

/// Body of `POST /register`.
#[derive(Debug, Default, Deserialize)]
pub struct RegisterForm {
    #[serde(default)]
    pub username: String,
    #[serde(default)]
    pub email: String,
    #[serde(default)]
    pub password: String,
    #[serde(default)]
    pub confirm_password: String,
}

impl RegisterForm {
    pub fn validate(&mut self) -> FieldErrors {
        self.username = self.username.trim().to_string();
        self.email = normalize_email(&self.email);
        let mut errors = FieldErrors::default();

        let name_len = self.username.chars().count();
        if name_len == 0 {
            errors.push("username", "Username is required.");
        } else if !(USERNAME_MIN..=USERNAME_MAX).contains(&name_len) {
            errors.push(
                "username",
                format!("Username must be between {USERNAME_MIN} and {USERNAME_MAX} characters."),
            );
        }

        check_email(&self.email, &mut errors);

        if self.password.is_empty() {
            errors.push("password", "Password is required.");
        } else if self.password.chars().count() < PASSWORD_MIN {
            errors.push(
                "password",
                format!("Password must be at least {PASSWORD_MIN} characters."),
            );
        }

        if self.confirm_password.is_empty() {
            errors.push("confirm_password", "Please confirm the password.");
        } else if self.confirm_password != self.password {
            errors.push("confirm_password", "Passwords must match.");
        }

        errors
    }
}
