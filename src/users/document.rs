//! CPF / CNPJ (Brazilian tax id) check-digit validation.

/// Digits of `raw`, punctuation dropped. `None` if `raw` is blank.
pub fn normalize(raw: &str) -> Option<String> {
    let digits: String = raw.chars().filter(char::is_ascii_digit).collect();
    if raw.trim().is_empty() {
        None
    } else {
        Some(digits)
    }
}

pub fn is_valid(raw: &str) -> bool {
    let digits: Vec<u32> = match normalize(raw) {
        Some(d) => d.chars().filter_map(|c| c.to_digit(10)).collect(),
        None => return false,
    };
    // "111.111.111-11" passes the arithmetic but is not a real document
    if digits.windows(2).all(|w| w[0] == w[1]) {
        return false;
    }
    match digits.len() {
        11 => is_valid_cpf(&digits),
        14 => is_valid_cnpj(&digits),
        _ => false,
    }
}

fn is_valid_cpf(d: &[u32]) -> bool {
    let check = |len: usize| {
        let sum: u32 = d[..len]
            .iter()
            .zip((2..=len as u32 + 1).rev())
            .map(|(digit, weight)| digit * weight)
            .sum();
        match sum * 10 % 11 {
            10 => 0,
            r => r,
        }
    };
    check(9) == d[9] && check(10) == d[10]
}

fn is_valid_cnpj(d: &[u32]) -> bool {
    const WEIGHTS: [u32; 13] = [6, 5, 4, 3, 2, 9, 8, 7, 6, 5, 4, 3, 2];
    let check = |len: usize| {
        let sum: u32 = d[..len]
            .iter()
            .zip(&WEIGHTS[13 - len..])
            .map(|(digit, weight)| digit * weight)
            .sum();
        match sum % 11 {
            r if r < 2 => 0,
            r => 11 - r,
        }
    };
    check(12) == d[12] && check(13) == d[13]
}
