/// Reduces a full name to its first two tokens (surname and given name),
/// collapsing any extra whitespace. Returns an empty string for blank input.
pub fn normalize_name(full_name: &str) -> String {
    full_name
        .split_whitespace()
        .take(2)
        .collect::<Vec<_>>()
        .join(" ")
}

/// Reads a Roman numeral made of `I`s and `V`s (also Cyrillic look-alikes
/// typed by mistake) and returns its value.
pub fn roman_value(text: &str) -> Option<usize> {
    let digits: Vec<usize> = text
        .chars()
        .map(|c| match c {
            'I' | 'i' | 'І' | 'і' => Some(1),
            'V' | 'v' => Some(5),
            _ => None,
        })
        .collect::<Option<_>>()?;
    if digits.is_empty() {
        return None;
    }

    let mut total = 0;
    for (idx, value) in digits.iter().enumerate() {
        match digits.get(idx + 1) {
            Some(next) if next > value => total -= *value as isize,
            _ => total += *value as isize,
        }
    }
    usize::try_from(total).ok().filter(|v| *v > 0)
}

/// Parses a period number written either in Arabic digits or Roman numerals.
pub fn period_number(token: &str) -> Option<usize> {
    token.parse::<usize>().ok().or_else(|| roman_value(token))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalize_name_drops_patronymic() {
        assert_eq!(normalize_name("Иванов  Пётр Сергеевич"), "Иванов Пётр");
        assert_eq!(normalize_name(" Smith John "), "Smith John");
        assert_eq!(normalize_name("Cher"), "Cher");
        assert_eq!(normalize_name("   "), "");
    }

    #[test]
    fn test_roman_value() {
        assert_eq!(roman_value("I"), Some(1));
        assert_eq!(roman_value("II"), Some(2));
        assert_eq!(roman_value("III"), Some(3));
        assert_eq!(roman_value("IV"), Some(4));
        assert_eq!(roman_value("ІІ"), Some(2));
        assert_eq!(roman_value("X"), None);
        assert_eq!(roman_value(""), None);
    }

    #[test]
    fn test_period_number() {
        assert_eq!(period_number("2"), Some(2));
        assert_eq!(period_number("III"), Some(3));
        assert_eq!(period_number("год"), None);
    }
}
