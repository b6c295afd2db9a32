//! Query parameter validation for `GET /messages`

use regex::Regex;

use crate::http::error::HttpError;
use crate::store::MessageFilter;

/// Validated query parameters for the message listing route
#[derive(Debug, Default, Clone, PartialEq)]
pub struct MessagesQuery {
    pub filter: MessageFilter,
    pub count: Option<usize>,
    pub reverse: bool,
}

/// Validates the listing query parameters against their restricted
/// character classes and bounds before any of them reach the store
#[derive(Debug, Clone)]
pub struct QueryValidator {
    message_type: Regex,
    address: Regex,
}

impl QueryValidator {
    pub fn new() -> Self {
        // The patterns cannot fail to compile; they are fixed at build time
        Self {
            message_type: Regex::new(r"^\w+$").expect("invalid messageType pattern"),
            address: Regex::new(r"^[\w\-.@]+$").expect("invalid address pattern"),
        }
    }

    /// Parse decoded name/value pairs into a [`MessagesQuery`].
    /// Unknown parameters are ignored; invalid values are rejected.
    pub fn parse(&self, pairs: &[(String, String)]) -> Result<MessagesQuery, HttpError> {
        let mut query = MessagesQuery::default();

        for (name, value) in pairs {
            match name.as_str() {
                "messageType" => {
                    if !self.message_type.is_match(value) {
                        return Err(invalid(name, value));
                    }
                    query.filter.message_type = Some(value.clone());
                }
                "from" => {
                    if !self.address.is_match(value) {
                        return Err(invalid(name, value));
                    }
                    query.filter.from = Some(value.clone());
                }
                "to" => {
                    if !self.address.is_match(value) {
                        return Err(invalid(name, value));
                    }
                    query.filter.to = Some(value.clone());
                }
                "cc" => {
                    if !self.address.is_match(value) {
                        return Err(invalid(name, value));
                    }
                    query.filter.cc = Some(value.clone());
                }
                "count" => {
                    let count: usize = value.parse().map_err(|_| invalid(name, value))?;
                    if !(1..=100).contains(&count) {
                        return Err(invalid(name, value));
                    }
                    query.count = Some(count);
                }
                "reverse" => {
                    query.reverse = value.parse().map_err(|_| invalid(name, value))?;
                }
                _ => {}
            }
        }

        Ok(query)
    }
}

impl Default for QueryValidator {
    fn default() -> Self {
        Self::new()
    }
}

fn invalid(name: &str, value: &str) -> HttpError {
    HttpError::InvalidQuery(format!("{name}={value}"))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn pairs(entries: &[(&str, &str)]) -> Vec<(String, String)> {
        entries
            .iter()
            .map(|(name, value)| (name.to_string(), value.to_string()))
            .collect()
    }

    #[test]
    fn test_empty_query_selects_everything() {
        let validator = QueryValidator::new();
        let query = validator.parse(&[]).unwrap();
        assert_eq!(query, MessagesQuery::default());
    }

    #[test]
    fn test_all_parameters() {
        let validator = QueryValidator::new();
        let query = validator
            .parse(&pairs(&[
                ("messageType", "myType1"),
                ("from", "sender.name1@somedomain.xyz"),
                ("to", "receiver-1@somedomain.xyz"),
                ("cc", "cc_1@somedomain.xyz"),
                ("count", "42"),
                ("reverse", "true"),
            ]))
            .unwrap();

        assert_eq!(query.filter.message_type.as_deref(), Some("myType1"));
        assert_eq!(
            query.filter.from.as_deref(),
            Some("sender.name1@somedomain.xyz")
        );
        assert_eq!(query.filter.to.as_deref(), Some("receiver-1@somedomain.xyz"));
        assert_eq!(query.filter.cc.as_deref(), Some("cc_1@somedomain.xyz"));
        assert_eq!(query.count, Some(42));
        assert!(query.reverse);
    }

    #[test]
    fn test_message_type_rejects_non_word_characters() {
        let validator = QueryValidator::new();
        assert!(validator.parse(&pairs(&[("messageType", "my-type")])).is_err());
        assert!(validator.parse(&pairs(&[("messageType", "a b")])).is_err());
        assert!(validator.parse(&pairs(&[("messageType", "")])).is_err());
    }

    #[test]
    fn test_address_character_class() {
        let validator = QueryValidator::new();
        assert!(validator.parse(&pairs(&[("from", "a.b-c_d@x.com")])).is_ok());
        assert!(validator.parse(&pairs(&[("from", "a b@x.com")])).is_err());
        assert!(validator.parse(&pairs(&[("to", "<a@x.com>")])).is_err());
        assert!(validator.parse(&pairs(&[("cc", "")])).is_err());
    }

    #[test]
    fn test_count_bounds() {
        let validator = QueryValidator::new();
        assert_eq!(
            validator.parse(&pairs(&[("count", "1")])).unwrap().count,
            Some(1)
        );
        assert_eq!(
            validator.parse(&pairs(&[("count", "100")])).unwrap().count,
            Some(100)
        );
        assert!(validator.parse(&pairs(&[("count", "0")])).is_err());
        assert!(validator.parse(&pairs(&[("count", "101")])).is_err());
        assert!(validator.parse(&pairs(&[("count", "three")])).is_err());
        assert!(validator.parse(&pairs(&[("count", "-1")])).is_err());
    }

    #[test]
    fn test_reverse_boolean() {
        let validator = QueryValidator::new();
        assert!(validator.parse(&pairs(&[("reverse", "true")])).unwrap().reverse);
        assert!(!validator.parse(&pairs(&[("reverse", "false")])).unwrap().reverse);
        assert!(validator.parse(&pairs(&[("reverse", "yes")])).is_err());
    }

    #[test]
    fn test_unknown_parameters_ignored() {
        let validator = QueryValidator::new();
        let query = validator.parse(&pairs(&[("unknown", "whatever")])).unwrap();
        assert_eq!(query, MessagesQuery::default());
    }
}
