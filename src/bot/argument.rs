//! Command argument parsing.

use thiserror::Error;

/// Errors for missing or malformed command arguments
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ArgumentError {
    /// The argument was not given at all
    #[error("Missing argument '{0}'")]
    Missing(&'static str),
    /// The argument could not be interpreted
    #[error("Invalid value '{value}' for '{name}': {reason}")]
    Invalid {
        /// Argument name
        name: &'static str,
        /// Value as given
        value: String,
        /// What is wrong with it
        reason: &'static str,
    },
}

/// A user given as `@username` or numeric id
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UserReference {
    /// Telegram user id
    Id(i64),
    /// Username without the leading `@`
    Username(String),
}

/// Parses a probability in `[0, 1]`
///
/// # Errors
///
/// Returns an error if `raw` is empty, not a number or out of range.
pub fn parse_probability(raw: &str) -> Result<f64, ArgumentError> {
    const NAME: &str = "probability";
    let raw = raw.trim();
    if raw.is_empty() {
        return Err(ArgumentError::Missing(NAME));
    }
    let value = raw.parse::<f64>().map_err(|_| ArgumentError::Invalid {
        name: NAME,
        value: raw.to_string(),
        reason: "not a number",
    })?;
    if !(0.0..=1.0).contains(&value) {
        return Err(ArgumentError::Invalid {
            name: NAME,
            value: raw.to_string(),
            reason: "must be between 0 and 1",
        });
    }
    Ok(value)
}

/// Parses `on` or `off`, returning the normalized value
///
/// # Errors
///
/// Returns an error for anything but `on` or `off`.
pub fn parse_switch(raw: &str) -> Result<&'static str, ArgumentError> {
    const NAME: &str = "state";
    match raw.trim().to_lowercase().as_str() {
        "" => Err(ArgumentError::Missing(NAME)),
        "on" => Ok("on"),
        "off" => Ok("off"),
        _ => Err(ArgumentError::Invalid {
            name: NAME,
            value: raw.trim().to_string(),
            reason: "expected 'on' or 'off'",
        }),
    }
}

/// Parses a user reference
///
/// # Errors
///
/// Returns an error if `raw` is neither an id nor a valid username.
pub fn parse_user_reference(raw: &str) -> Result<UserReference, ArgumentError> {
    const NAME: &str = "user";
    let raw = raw.trim();
    if raw.is_empty() {
        return Err(ArgumentError::Missing(NAME));
    }
    if let Ok(id) = raw.parse::<i64>() {
        return Ok(UserReference::Id(id));
    }

    let username = raw.strip_prefix('@').unwrap_or(raw);
    let valid = (3..=32).contains(&username.len())
        && username
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '_');
    if valid {
        Ok(UserReference::Username(username.to_string()))
    } else {
        Err(ArgumentError::Invalid {
            name: NAME,
            value: raw.to_string(),
            reason: "expected @username or a numeric id",
        })
    }
}

/// Error text followed by a usage line
#[must_use]
pub fn usage_message(error: &ArgumentError, usage: &str) -> String {
    format!("{error}\nUsage: {usage}")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_probability() {
        assert_eq!(parse_probability("0.13"), Ok(0.13));
        assert_eq!(parse_probability(" 1 "), Ok(1.0));
        assert_eq!(parse_probability(""), Err(ArgumentError::Missing("probability")));
        assert!(parse_probability("1.5").is_err());
        assert!(parse_probability("-0.1").is_err());
        assert!(parse_probability("NaN").is_err());
        assert!(parse_probability("viel").is_err());
    }

    #[test]
    fn test_parse_switch() {
        assert_eq!(parse_switch("ON"), Ok("on"));
        assert_eq!(parse_switch("off"), Ok("off"));
        assert_eq!(parse_switch(" "), Err(ArgumentError::Missing("state")));
        assert!(parse_switch("maybe").is_err());
    }

    #[test]
    fn test_parse_user_reference() {
        assert_eq!(parse_user_reference("12345"), Ok(UserReference::Id(12345)));
        assert_eq!(
            parse_user_reference("@markus_r"),
            Ok(UserReference::Username("markus_r".to_string()))
        );
        assert_eq!(
            parse_user_reference("markus_r"),
            Ok(UserReference::Username("markus_r".to_string()))
        );
        assert!(parse_user_reference("@a").is_err());
        assert!(parse_user_reference("not a user").is_err());
    }

    #[test]
    fn test_usage_message() {
        let error = ArgumentError::Missing("state");
        assert_eq!(
            usage_message(&error, "/set_antispam on|off"),
            "Missing argument 'state'\nUsage: /set_antispam on|off"
        );
    }
}
