use std::sync::OnceLock;

use regex::Regex;

static EMAIL: OnceLock<Option<Regex>> = OnceLock::new();
static PASSWORD_CHARSET: OnceLock<Option<Regex>> = OnceLock::new();
static NAME: OnceLock<Option<Regex>> = OnceLock::new();
static PHONE: OnceLock<Option<Regex>> = OnceLock::new();
static ZIP: OnceLock<Option<Regex>> = OnceLock::new();
static ADDRESS: OnceLock<Option<Regex>> = OnceLock::new();

const PASSWORD_SPECIALS: &str = "@$!%*?&";

fn matches(cell: &'static OnceLock<Option<Regex>>, pattern: &str, value: &str) -> bool {
    match cell.get_or_init(|| Regex::new(pattern).ok()) {
        Some(regex) => regex.is_match(value),
        None => {
            log::error!("VALIDATOR: invalid pattern {}", pattern);
            false
        }
    }
}

pub fn is_valid_email(email: &str) -> bool {
    matches(
        &EMAIL,
        r#"^(([^<>()\[\]\\.,;:\s@"]+(\.[^<>()\[\]\\.,;:\s@"]+)*)|(".+"))@((\[[0-9]{1,3}\.[0-9]{1,3}\.[0-9]{1,3}\.[0-9]{1,3}\])|(([a-zA-Z\-0-9]+\.)+[a-zA-Z]{2,}))$"#,
        &email.to_lowercase(),
    )
}

/// At least eight characters with a lowercase letter, an uppercase letter,
/// a digit and one of `@$!%*?&`, and nothing outside those classes.
pub fn is_valid_password(password: &str) -> bool {
    matches(&PASSWORD_CHARSET, r"^[A-Za-z0-9@$!%*?&]{8,}$", password)
        && password.chars().any(|c| c.is_ascii_lowercase())
        && password.chars().any(|c| c.is_ascii_uppercase())
        && password.chars().any(|c| c.is_ascii_digit())
        && password.chars().any(|c| PASSWORD_SPECIALS.contains(c))
}

/// First and last name, letters only, two or more each.
pub fn is_valid_name(name: &str) -> bool {
    matches(&NAME, r"^[a-zA-Z]{2,} [a-zA-Z]{2,}$", name)
}

pub fn is_valid_phone(phone: &str) -> bool {
    matches(&PHONE, r"^[0-9]{3}-?[0-9]{3}-?[0-9]{4}$", phone)
}

pub fn is_valid_zip(zip: &str) -> bool {
    matches(&ZIP, r"^[0-9]{5}$", zip)
}

pub fn is_valid_address(address: &str) -> bool {
    matches(&ADDRESS, r"^[0-9]+ [a-zA-Z]+", address)
}

/// Preference inputs may be left blank.
pub fn empty_or(validator: fn(&str) -> bool) -> impl Fn(&String) -> bool + Send + Sync + 'static {
    move |value: &String| value.is_empty() || validator(value)
}
