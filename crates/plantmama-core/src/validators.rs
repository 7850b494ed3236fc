//! Input validation for user-supplied values.

use std::sync::OnceLock;

use regex::Regex;
use thiserror::Error;

use crate::season::Season;

/// Longest accepted plant name, in characters.
pub const MAX_PLANT_NAME_LEN: usize = 100;

/// Longest user message forwarded to the model, in characters.
pub const MAX_INPUT_LEN: usize = 1000;

const POT_SIZES: [&str; 5] = ["small", "medium", "large", "extra large", "xl"];

/// A rejected input with a message suitable for the user.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ValidationError {
    #[error("Plant name cannot be empty")]
    EmptyPlantName,

    #[error("Plant name is too long (max {MAX_PLANT_NAME_LEN} characters)")]
    PlantNameTooLong,

    #[error("Plant name contains invalid characters")]
    PlantNameInvalidChars,

    #[error("Invalid image size")]
    InvalidImageSize,

    #[error("Image too large (max {}MB)", *max_bytes as f64 / (1024.0 * 1024.0))]
    ImageTooLarge { max_bytes: u64 },
}

fn plant_name_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"^[\p{L}\p{N}\s\-'.]+$").expect("Invalid regex pattern"))
}

/// A Telegram user id is 1 to 20 ASCII digits.
pub fn validate_telegram_id(telegram_id: &str) -> bool {
    !telegram_id.is_empty()
        && telegram_id.len() <= 20
        && telegram_id.bytes().all(|b| b.is_ascii_digit())
}

/// Check a plant name: non-blank, short, letters of any script, digits,
/// whitespace and `-'.` only.
pub fn validate_plant_name(name: &str) -> Result<(), ValidationError> {
    if name.trim().is_empty() {
        return Err(ValidationError::EmptyPlantName);
    }
    if name.chars().count() > MAX_PLANT_NAME_LEN {
        return Err(ValidationError::PlantNameTooLong);
    }
    if !plant_name_regex().is_match(name) {
        return Err(ValidationError::PlantNameInvalidChars);
    }
    Ok(())
}

/// Check an upload size against `max` bytes.
pub fn validate_image_size(size: u64, max: u64) -> Result<(), ValidationError> {
    if size == 0 {
        return Err(ValidationError::InvalidImageSize);
    }
    if size > max {
        return Err(ValidationError::ImageTooLarge { max_bytes: max });
    }
    Ok(())
}

/// Normalize free text before it reaches the model.
///
/// Whitespace runs collapse to one space, control characters are dropped and
/// the result is cut at [`MAX_INPUT_LEN`] characters with a trailing `...`.
pub fn sanitize_user_input(text: &str) -> String {
    let collapsed = text
        .split_whitespace()
        .map(|word| word.chars().filter(|c| !c.is_control()).collect::<String>())
        .filter(|word| !word.is_empty())
        .collect::<Vec<_>>()
        .join(" ");

    let truncated = if collapsed.chars().count() > MAX_INPUT_LEN {
        let mut cut: String = collapsed.chars().take(MAX_INPUT_LEN).collect();
        cut.push_str("...");
        cut
    } else {
        collapsed
    };

    truncated.trim().to_string()
}

/// Whether `season` names a season (`autumn` included).
pub fn validate_season(season: &str) -> bool {
    season.parse::<Season>().is_ok()
}

/// Whether `size` is a known pot size.
pub fn validate_pot_size(size: &str) -> bool {
    let size = size.trim().to_lowercase();
    POT_SIZES.contains(&size.as_str())
}
