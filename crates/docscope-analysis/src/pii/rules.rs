//! The PII rule table.
//!
//! One row per category. Rows are evaluated in order by
//! [`evaluate`](super::detector::evaluate); adding a category means adding a
//! row here, nothing else.

use std::sync::LazyLock;

use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine as _;
use docscope_core::model::PiiCategory;
use regex::Regex;

pub struct PiiRule {
    pub category: PiiCategory,
    /// Normalized field names (lowercase, no `_` / `-`). Keywords of five or
    /// more characters also match as a suffix (`customerEmail`).
    pub field_names: &'static [&'static str],
    pub value_pattern: Option<&'static str>,
    /// Extra check on a value that matched the pattern.
    pub validator: Option<fn(&str) -> bool>,
    pub base_confidence: f64,
    pub requires_review: bool,
}

pub const PII_RULES: &[PiiRule] = &[
    PiiRule {
        category: PiiCategory::Email,
        field_names: &["email", "emailaddress", "mail", "useremail"],
        value_pattern: Some(r"^[A-Za-z0-9._%+-]+@[A-Za-z0-9.-]+\.[A-Za-z]{2,}$"),
        validator: None,
        base_confidence: 0.95,
        requires_review: false,
    },
    PiiRule {
        category: PiiCategory::Phone,
        field_names: &["phone", "phonenumber", "mobile", "cellphone", "telephone", "tel", "fax"],
        value_pattern: Some(r"^\+?[0-9][0-9 ().-]{6,18}[0-9]$"),
        validator: Some(phone_digits),
        base_confidence: 0.85,
        requires_review: false,
    },
    PiiRule {
        category: PiiCategory::Ssn,
        field_names: &["ssn", "socialsecuritynumber", "socialsecurity", "nationalid", "taxid"],
        value_pattern: Some(r"^\d{3}-\d{2}-\d{4}$"),
        validator: None,
        base_confidence: 0.9,
        requires_review: true,
    },
    PiiRule {
        category: PiiCategory::CreditCard,
        field_names: &["creditcard", "creditcardnumber", "cardnumber", "ccnumber", "pan"],
        value_pattern: Some(r"^(?:\d[ -]?){12,18}\d$"),
        validator: Some(luhn_valid),
        base_confidence: 0.9,
        requires_review: true,
    },
    PiiRule {
        category: PiiCategory::Address,
        field_names: &[
            "address",
            "streetaddress",
            "street",
            "addressline1",
            "addressline2",
            "postalcode",
            "zipcode",
            "zip",
        ],
        value_pattern: Some(
            r"(?i)^\d+\s+[a-z0-9 .'-]+\s(?:street|st|avenue|ave|road|rd|boulevard|blvd|lane|ln|drive|dr|court|ct|way)\.?$",
        ),
        validator: None,
        base_confidence: 0.7,
        requires_review: true,
    },
    PiiRule {
        category: PiiCategory::Name,
        field_names: &[
            "firstname",
            "lastname",
            "fullname",
            "surname",
            "givenname",
            "middlename",
            "familyname",
            "customername",
        ],
        value_pattern: None,
        validator: None,
        base_confidence: 0.7,
        requires_review: true,
    },
    PiiRule {
        category: PiiCategory::IpAddress,
        field_names: &["ip", "ipaddress", "clientip", "remoteip", "remoteaddr"],
        value_pattern: Some(
            r"^(?:(?:25[0-5]|2[0-4]\d|1?\d?\d)\.){3}(?:25[0-5]|2[0-4]\d|1?\d?\d)$",
        ),
        validator: None,
        base_confidence: 0.8,
        requires_review: false,
    },
    PiiRule {
        category: PiiCategory::Jwt,
        field_names: &["jwt", "accesstoken", "idtoken", "refreshtoken", "bearertoken"],
        value_pattern: Some(r"^eyJ[A-Za-z0-9_-]+\.[A-Za-z0-9_-]+\.[A-Za-z0-9_-]*$"),
        validator: Some(jwt_header_decodes),
        base_confidence: 0.95,
        requires_review: false,
    },
    PiiRule {
        category: PiiCategory::ApiKey,
        field_names: &["apikey", "secretkey", "clientsecret", "accesskey", "privatekey", "secret"],
        value_pattern: Some(r"^(?:(?:sk|pk|rk)_(?:live|test)_[A-Za-z0-9]{16,}|AKIA[0-9A-Z]{16})$"),
        validator: None,
        base_confidence: 0.85,
        requires_review: true,
    },
    PiiRule {
        category: PiiCategory::Uuid,
        field_names: &["uuid", "guid"],
        value_pattern: Some(
            r"^[0-9a-fA-F]{8}-[0-9a-fA-F]{4}-[0-9a-fA-F]{4}-[0-9a-fA-F]{4}-[0-9a-fA-F]{12}$",
        ),
        validator: None,
        base_confidence: 0.6,
        requires_review: false,
    },
];

/// Compiled value patterns, same order as [`PII_RULES`].
pub static VALUE_PATTERNS: LazyLock<Vec<Option<Regex>>> = LazyLock::new(|| {
    PII_RULES
        .iter()
        .map(|rule| rule.value_pattern.map(|p| Regex::new(p).unwrap()))
        .collect()
});

pub fn normalize_field_name(name: &str) -> String {
    name.chars()
        .filter(|c| !matches!(c, '_' | '-' | ' '))
        .flat_map(char::to_lowercase)
        .collect()
}

impl PiiRule {
    pub fn matches_field_name(&self, normalized: &str) -> Option<&'static str> {
        self.field_names
            .iter()
            .find(|kw| normalized == **kw || (kw.len() >= 5 && normalized.ends_with(**kw)))
            .copied()
    }
}

fn phone_digits(value: &str) -> bool {
    let digits = value.chars().filter(char::is_ascii_digit).count();
    (10..=15).contains(&digits)
}

pub fn luhn_valid(value: &str) -> bool {
    let digits: Vec<u32> = value.chars().filter_map(|c| c.to_digit(10)).collect();
    if !(13..=19).contains(&digits.len()) {
        return false;
    }
    let sum: u32 = digits
        .iter()
        .rev()
        .enumerate()
        .map(|(i, &d)| {
            if i % 2 == 1 {
                let doubled = d * 2;
                if doubled > 9 {
                    doubled - 9
                } else {
                    doubled
                }
            } else {
                d
            }
        })
        .sum();
    sum % 10 == 0
}

/// The first segment must decode to a JSON object with an `alg`.
pub fn jwt_header_decodes(value: &str) -> bool {
    let Some(header) = value.split('.').next() else {
        return false;
    };
    let Ok(bytes) = URL_SAFE_NO_PAD.decode(header.trim_end_matches('=')) else {
        return false;
    };
    serde_json::from_slice::<serde_json::Value>(&bytes)
        .ok()
        .is_some_and(|v| v.get("alg").is_some())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn every_pattern_compiles() {
        assert_eq!(VALUE_PATTERNS.len(), PII_RULES.len());
    }

    #[test]
    fn luhn() {
        assert!(luhn_valid("4111 1111 1111 1111"));
        assert!(luhn_valid("5500-0000-0000-0004"));
        assert!(!luhn_valid("4111 1111 1111 1112"));
        assert!(!luhn_valid("1234"));
    }

    #[test]
    fn jwt_header() {
        let token = "eyJhbGciOiJIUzI1NiIsInR5cCI6IkpXVCJ9.eyJzdWIiOiIxMjM0NTY3ODkwIn0.sig";
        assert!(jwt_header_decodes(token));
        assert!(!jwt_header_decodes("eyJub3Rqc29u.abc.def"));
    }

    #[test]
    fn field_name_matching() {
        let email = &PII_RULES[0];
        assert_eq!(email.matches_field_name(&normalize_field_name("customer_email")), Some("email"));
        assert_eq!(email.matches_field_name(&normalize_field_name("Email")), Some("email"));
        assert_eq!(email.matches_field_name("emailverified"), None);
        let name = PII_RULES.iter().find(|r| r.category == PiiCategory::Name).unwrap();
        assert_eq!(name.matches_field_name("name"), None);
        assert_eq!(name.matches_field_name(&normalize_field_name("first_name")), Some("firstname"));
    }
}
