//! Local validation run before any network call.

use crate::error::UazError;
use crate::message::{MediaSource, MenuType, OutboundMessage};

/// Shortest accepted phone number (country code + area code + subscriber).
const MIN_PHONE_DIGITS: usize = 10;
/// E.164 maximum.
const MAX_PHONE_DIGITS: usize = 15;
const MAX_BUTTON_CHOICES: usize = 3;
const MAX_CAROUSEL_CARDS: usize = 10;

/// Normalize a destination number to digits only.
///
/// Accepts common formatting (`+`, spaces, dashes, parentheses) and a
/// trailing `@s.whatsapp.net` JID suffix.
pub fn normalize_phone(input: &str) -> Result<String, UazError> {
    let trimmed = input.trim();
    let bare = trimmed.split('@').next().unwrap_or_default();
    if bare
        .chars()
        .any(|c| !(c.is_ascii_digit() || matches!(c, '+' | ' ' | '-' | '(' | ')' | '.')))
    {
        return Err(UazError::Validation(format!(
            "malformed phone number '{trimmed}'"
        )));
    }
    let digits: String = bare.chars().filter(char::is_ascii_digit).collect();
    if !(MIN_PHONE_DIGITS..=MAX_PHONE_DIGITS).contains(&digits.len()) {
        return Err(UazError::Validation(format!(
            "phone number '{trimmed}' must have {MIN_PHONE_DIGITS}-{MAX_PHONE_DIGITS} digits including country code"
        )));
    }
    Ok(digits)
}

fn required(field: &str, value: &str) -> Result<(), UazError> {
    if value.trim().is_empty() {
        return Err(UazError::Validation(format!("{field} is required")));
    }
    Ok(())
}

/// Check required fields and upload sizes of one block.
pub fn validate_message(msg: &OutboundMessage) -> Result<(), UazError> {
    match msg {
        OutboundMessage::Text { text } => required("text", text),
        OutboundMessage::Media { kind, source, .. } => match source {
            MediaSource::Url(url) => {
                required("media url", url)?;
                if !(url.starts_with("http://") || url.starts_with("https://")) {
                    return Err(UazError::Validation(format!(
                        "media url must be http(s): {url}"
                    )));
                }
                Ok(())
            }
            MediaSource::Inline {
                file_name, bytes, ..
            } => {
                required("file name", file_name)?;
                if bytes.is_empty() {
                    return Err(UazError::Validation(format!("{file_name} is empty")));
                }
                let limit = kind.max_bytes();
                if bytes.len() as u64 > limit {
                    return Err(UazError::Validation(format!(
                        "{file_name} is {} bytes; {} uploads are limited to {} MB",
                        bytes.len(),
                        kind.as_str(),
                        limit / (1024 * 1024)
                    )));
                }
                Ok(())
            }
        },
        OutboundMessage::Menu {
            menu_type,
            text,
            choices,
            list_button,
            ..
        } => {
            required("menu text", text)?;
            let count = choices.iter().filter(|c| !c.trim().is_empty()).count();
            if count == 0 {
                return Err(UazError::Validation(
                    "menu needs at least one choice".into(),
                ));
            }
            match menu_type {
                MenuType::Button if count > MAX_BUTTON_CHOICES => Err(UazError::Validation(
                    format!("button menus allow at most {MAX_BUTTON_CHOICES} choices"),
                )),
                MenuType::Poll if count < 2 => Err(UazError::Validation(
                    "polls need at least two options".into(),
                )),
                MenuType::List => required("list button", list_button.as_deref().unwrap_or("")),
                _ => Ok(()),
            }
        }
        OutboundMessage::Carousel { text, cards } => {
            required("carousel text", text)?;
            if cards.is_empty() || cards.len() > MAX_CAROUSEL_CARDS {
                return Err(UazError::Validation(format!(
                    "carousel needs 1-{MAX_CAROUSEL_CARDS} cards"
                )));
            }
            for (i, card) in cards.iter().enumerate() {
                required(&format!("card {} text", i + 1), &card.text)?;
                required(&format!("card {} image", i + 1), &card.image)?;
                if card.buttons.is_empty() {
                    return Err(UazError::Validation(format!(
                        "card {} needs at least one button",
                        i + 1
                    )));
                }
            }
            Ok(())
        }
    }
}
