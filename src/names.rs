// 👤 Name Formatter - Reduce a raw name span to "Nombre Apellido"
//
// Yape writes names in several shapes:
// - "Maria Garcia"                → "Maria Garcia"
// - "JUAN C. PEREZ L."            → "JUAN PEREZ"    (initials skipped)
// - "JUAN CARLOS PEREZ LOPEZ"     → "JUAN PEREZ"    (two given names + two surnames)
// - "J. Lopez"                    → "Lopez"

use crate::transaction::UNKNOWN_COUNTERPARTY;

/// A token is an initial when it is exactly one uppercase letter,
/// optionally followed by a period ("J", "J.").
pub fn is_initial(token: &str) -> bool {
    let mut chars = token.chars();

    let first_is_capital = match chars.next() {
        Some(c) => c.is_alphabetic() && c.is_uppercase(),
        None => return false,
    };

    first_is_capital && matches!(chars.as_str(), "" | ".")
}

/// Format a raw name span as "given surname".
///
/// # Rules
/// - Initials are skipped; every other token is a full word.
/// - First full word = given name, next full word = surname, rest dropped.
/// - With four or more full words the last two are the surnames, so the
///   surname is the second-to-last full word
///   ("JUAN CARLOS ALBERTO PEREZ LOPEZ" → "JUAN PEREZ").
/// - No full words: first raw token verbatim. No tokens: "Desconocido".
pub fn format_name(span: &str) -> String {
    let tokens: Vec<&str> = span.split_whitespace().collect();

    let first_token = match tokens.first() {
        Some(token) => *token,
        None => return UNKNOWN_COUNTERPARTY.to_string(),
    };

    let words: Vec<&str> = tokens.iter().copied().filter(|t| !is_initial(t)).collect();

    match words.as_slice() {
        [] => first_token.to_string(),
        [given] => given.to_string(),
        [given, surname] | [given, surname, _] => format!("{} {}", given, surname),
        [given, .., surname, _] => format!("{} {}", given, surname),
    }
}

// ============================================================================
// TESTS
// ============================================================================
