const MASK_CHAR: char = '*';
const UNMASKED_PREFIX: usize = 4;
const UNMASKED_SUFFIX: usize = 4;

/// Redact a sensitive value for logging.
///
/// The first and last four characters stay visible; the middle is replaced
/// one-for-one with the mask character. Values too short to have a middle
/// are masked entirely.
pub fn mask_value(value: &str) -> String {
    let chars: Vec<char> = value.chars().collect();
    if chars.len() <= UNMASKED_PREFIX + UNMASKED_SUFFIX {
        return MASK_CHAR.to_string().repeat(chars.len());
    }

    let mut masked = String::with_capacity(chars.len());
    masked.extend(&chars[..UNMASKED_PREFIX]);
    masked.extend(std::iter::repeat(MASK_CHAR).take(chars.len() - UNMASKED_PREFIX - UNMASKED_SUFFIX));
    masked.extend(&chars[chars.len() - UNMASKED_SUFFIX..]);
    masked
}
