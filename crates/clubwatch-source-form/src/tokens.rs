//! Hidden form state tokens
//!
//! The roster page only answers a search POST that echoes the hidden state
//! fields of the page it was served with.

use clubwatch_core::FetchError;
use scraper::{Html, Selector};

pub const VIEW_STATE: &str = "__VIEWSTATE";
pub const VIEW_STATE_GENERATOR: &str = "__VIEWSTATEGENERATOR";
pub const EVENT_VALIDATION: &str = "__EVENTVALIDATION";

/// Hidden state of one served form
///
/// Valid for a single GET/POST exchange; never stored.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FormTokens {
    pub view_state: String,
    pub view_state_generator: String,
    pub event_validation: String,
}

impl FormTokens {
    /// Tokens as form pairs, values verbatim
    pub fn pairs(&self) -> [(&'static str, &str); 3] {
        [
            (VIEW_STATE, &self.view_state),
            (VIEW_STATE_GENERATOR, &self.view_state_generator),
            (EVENT_VALIDATION, &self.event_validation),
        ]
    }
}

/// Extract the three hidden tokens from a served page
///
/// # Returns
///
/// - `Ok(FormTokens)`: All three inputs present (empty values are kept)
/// - `Err(FetchError::Protocol)`: A token is missing; the message names it
pub fn extract_form_tokens(html: &str) -> Result<FormTokens, FetchError> {
    let document = Html::parse_document(html);
    let inputs = Selector::parse("input[name]")
        .map_err(|e| FetchError::protocol(format!("invalid input selector: {}", e)))?;

    let find = |name: &str| -> Result<String, FetchError> {
        document
            .select(&inputs)
            .find(|input| input.value().attr("name") == Some(name))
            .map(|input| input.value().attr("value").unwrap_or_default().to_string())
            .ok_or_else(|| FetchError::protocol(format!("missing form token: {}", name)))
    };

    Ok(FormTokens {
        view_state: find(VIEW_STATE)?,
        view_state_generator: find(VIEW_STATE_GENERATOR)?,
        event_validation: find(EVENT_VALIDATION)?,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    const PAGE: &str = r#"<html><body><form method="post" action="./Kulup.aspx">
        <input type="hidden" name="__VIEWSTATE" id="__VIEWSTATE" value="dDwtMTA4NzM+Pj4=" />
        <input type="hidden" name="__VIEWSTATEGENERATOR" id="__VIEWSTATEGENERATOR" value="CA0B0334" />
        <input type="hidden" name="__EVENTVALIDATION" id="__EVENTVALIDATION" value="/wEdAAk+&amp;x" />
        <select name="ddlSezon"><option>2025-2026</option></select>
    </form></body></html>"#;

    #[test]
    fn test_extracts_all_tokens() {
        let tokens = extract_form_tokens(PAGE).unwrap();
        assert_eq!(tokens.view_state, "dDwtMTA4NzM+Pj4=");
        assert_eq!(tokens.view_state_generator, "CA0B0334");
        // Entities are decoded; the value is posted as the browser would
        assert_eq!(tokens.event_validation, "/wEdAAk+&x");
    }

    #[test]
    fn test_missing_view_state_is_protocol_error() {
        let page = PAGE.replace(r#"name="__VIEWSTATE" "#, r#"name="other" "#);
        let err = extract_form_tokens(&page).unwrap_err();
        assert_eq!(err, FetchError::protocol("missing form token: __VIEWSTATE"));
    }

    #[test]
    fn test_missing_event_validation_named() {
        let page = PAGE.replace("__EVENTVALIDATION", "__EVENTTARGET");
        let err = extract_form_tokens(&page).unwrap_err();
        assert!(err.to_string().contains("__EVENTVALIDATION"));
        assert_eq!(err.class(), "protocol");
    }

    #[test]
    fn test_empty_value_is_present() {
        let page = PAGE.replace(r#"value="CA0B0334""#, r#"value="""#);
        let tokens = extract_form_tokens(&page).unwrap();
        assert_eq!(tokens.view_state_generator, "");
    }

    #[test]
    fn test_pairs_order() {
        let tokens = extract_form_tokens(PAGE).unwrap();
        let names: Vec<&str> = tokens.pairs().iter().map(|(name, _)| *name).collect();
        assert_eq!(names, vec![VIEW_STATE, VIEW_STATE_GENERATOR, EVENT_VALIDATION]);
    }
}
