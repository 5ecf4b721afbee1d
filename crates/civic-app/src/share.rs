// Share links for a bill.

use percent_encoding::{utf8_percent_encode, AsciiSet, NON_ALPHANUMERIC};
use reqwest::Url;
use serde::Serialize;
use thiserror::Error;

use civic_core::model::Bill;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ShareError {
    #[error("invalid site origin {origin:?}: {message}")]
    InvalidOrigin { origin: String, message: String },
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ShareLinks {
    /// `<origin>?bill=<id>`; the link that gets copied.
    pub url: String,
    pub text: String,
    pub twitter: String,
    pub facebook: String,
    pub sms: String,
    pub email: String,
}

pub fn share_text(bill: &Bill) -> String {
    format!("Check out {}: {}", bill.number, bill.title)
}

pub fn share_url(origin: &str, bill_id: &str) -> Result<String, ShareError> {
    let mut url = Url::parse(origin).map_err(|e| ShareError::InvalidOrigin {
        origin: origin.to_string(),
        message: e.to_string(),
    })?;
    if url.cannot_be_a_base() {
        return Err(ShareError::InvalidOrigin {
            origin: origin.to_string(),
            message: "not a web origin".to_string(),
        });
    }
    url.set_query(Some(&format!("bill={}", encode_component(bill_id))));
    url.set_fragment(None);
    Ok(url.to_string())
}

pub fn share_links(origin: &str, bill: &Bill) -> Result<ShareLinks, ShareError> {
    let url = share_url(origin, &bill.id)?;
    let text = share_text(bill);
    let encoded_url = encode_component(&url);
    let encoded_text = encode_component(&text);

    Ok(ShareLinks {
        twitter: format!("https://twitter.com/intent/tweet?text={encoded_text}&url={encoded_url}"),
        facebook: format!("https://www.facebook.com/sharer/sharer.php?u={encoded_url}"),
        sms: format!("sms:?body={encoded_text}%20{encoded_url}"),
        email: format!(
            "mailto:?subject={}&body={encoded_text}%0A%0A{encoded_url}",
            encode_component(&bill.number)
        ),
        url,
        text,
    })
}

/// Everything outside the URI-component unreserved set
/// (`A-Z a-z 0-9 - _ . ! ~ * ' ( )`).
const COMPONENT: &AsciiSet = &NON_ALPHANUMERIC
    .remove(b'-')
    .remove(b'_')
    .remove(b'.')
    .remove(b'!')
    .remove(b'~')
    .remove(b'*')
    .remove(b'\'')
    .remove(b'(')
    .remove(b')');

/// Percent-encode a URI component over its UTF-8 bytes.
pub(crate) fn encode_component(input: &str) -> String {
    utf8_percent_encode(input, COMPONENT).to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use civic_core::model::Level;

    fn bill() -> Bill {
        Bill {
            id: "1762000".to_string(),
            number: "HB 1".to_string(),
            title: "Schools & Taxes".to_string(),
            summary: String::new(),
            level: Level::State,
            jurisdiction: "Florida".to_string(),
            status: "Introduced".to_string(),
            policy_area: "Education".to_string(),
            introduced_date: None,
        }
    }

    #[test]
    fn encodes_like_uri_component() {
        assert_eq!(encode_component("a b&c=d/e"), "a%20b%26c%3Dd%2Fe");
        assert_eq!(encode_component("it's (ok)!~*"), "it's%20(ok)!~*");
        assert_eq!(encode_component("é"), "%C3%A9");
        assert_eq!(encode_component("line\nbreak"), "line%0Abreak");
    }

    #[test]
    fn share_url_appends_bill_query() {
        assert_eq!(
            share_url("https://civic.example", "42").unwrap(),
            "https://civic.example/?bill=42"
        );
        assert_eq!(
            share_url("https://civic.example/?old=1#top", "42").unwrap(),
            "https://civic.example/?bill=42"
        );
    }

    #[test]
    fn share_url_rejects_non_web_origins() {
        assert!(share_url("not a url", "1").is_err());
        assert!(share_url("mailto:someone@example.com", "1").is_err());
    }

    #[test]
    fn share_links_cover_every_target() {
        let links = share_links("https://civic.example", &bill()).unwrap();
        assert_eq!(links.text, "Check out HB 1: Schools & Taxes");
        assert_eq!(links.url, "https://civic.example/?bill=1762000");

        let encoded_url = "https%3A%2F%2Fcivic.example%2F%3Fbill%3D1762000";
        let encoded_text = "Check%20out%20HB%201%3A%20Schools%20%26%20Taxes";
        assert_eq!(
            links.twitter,
            format!("https://twitter.com/intent/tweet?text={encoded_text}&url={encoded_url}")
        );
        assert_eq!(
            links.facebook,
            format!("https://www.facebook.com/sharer/sharer.php?u={encoded_url}")
        );
        assert_eq!(links.sms, format!("sms:?body={encoded_text}%20{encoded_url}"));
        assert_eq!(
            links.email,
            format!("mailto:?subject=HB%201&body={encoded_text}%0A%0A{encoded_url}")
        );
    }
}
