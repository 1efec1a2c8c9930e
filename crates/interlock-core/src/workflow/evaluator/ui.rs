//! UI validation against a captured page state.

use interlock_types::domain::{ElementState, UiOutcome, UiValidation};
use interlock_types::result::ValidationResult;

use super::Checks;

pub(super) fn validate(outcome: &UiOutcome, validation: &UiValidation) -> ValidationResult {
    let mut checks = Checks::new();

    if let Some(title) = &validation.title {
        checks.check(
            &outcome.title == title,
            format!("title == '{title}' (got '{}')", outcome.title),
        );
    }
    if let Some(fragment) = &validation.title_contains {
        checks.check(
            outcome.title.contains(fragment.as_str()),
            format!("title contains '{fragment}' (got '{}')", outcome.title),
        );
    }
    if let Some(fragment) = &validation.url_contains {
        checks.check(
            outcome.url.contains(fragment.as_str()),
            format!("url contains '{fragment}' (got '{}')", outcome.url),
        );
    }

    let absent = ElementState::default();
    for expectation in &validation.elements {
        let selector = &expectation.selector;
        let state = outcome.elements.get(selector).unwrap_or(&absent);

        let has_content_check = expectation.visible.is_some()
            || expectation.text.is_some()
            || expectation.text_contains.is_some();
        // A bare selector, or one with content checks, implies presence.
        let present = expectation.present.unwrap_or(true);
        if expectation.present.is_some() || !has_content_check {
            checks.check(
                state.present == present,
                format!("{selector} present == {present}"),
            );
        } else if !state.present {
            checks.fail(format!("{selector} not present"));
            continue;
        }

        if let Some(visible) = expectation.visible {
            checks.check(
                state.visible == visible,
                format!("{selector} visible == {visible}"),
            );
        }
        let text = state.text.as_deref().unwrap_or("");
        if let Some(expected) = &expectation.text {
            checks.check(
                text == expected,
                format!("{selector} text == '{expected}' (got '{text}')"),
            );
        }
        if let Some(fragment) = &expectation.text_contains {
            checks.check(
                text.contains(fragment.as_str()),
                format!("{selector} text contains '{fragment}' (got '{text}')"),
            );
        }
    }

    checks.finish()
}
