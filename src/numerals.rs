//! Page-number formatting: arabic, roman and Chinese numerals.

use std::sync::OnceLock;

use regex::{Captures, Regex};

const ROMAN: [(u32, &str); 13] = [
    (1000, "M"),
    (900, "CM"),
    (500, "D"),
    (400, "CD"),
    (100, "C"),
    (90, "XC"),
    (50, "L"),
    (40, "XL"),
    (10, "X"),
    (9, "IX"),
    (5, "V"),
    (4, "IV"),
    (1, "I"),
];

const CN_DIGITS: [char; 10] = ['零', '一', '二', '三', '四', '五', '六', '七', '八', '九'];
const CN_UNITS: [&str; 4] = ["", "十", "百", "千"];

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum NumeralStyle {
    Arabic,
    Roman,
    RomanLower,
    Chinese,
}

impl NumeralStyle {
    fn from_suffix(s: Option<&str>) -> Option<NumeralStyle> {
        match s {
            None | Some("arabic") => Some(NumeralStyle::Arabic),
            Some("roman") => Some(NumeralStyle::Roman),
            Some("roman_lower") => Some(NumeralStyle::RomanLower),
            Some("chinese") => Some(NumeralStyle::Chinese),
            Some(_) => None,
        }
    }

    pub fn format(self, n: u32) -> String {
        match self {
            NumeralStyle::Arabic => n.to_string(),
            NumeralStyle::Roman => to_roman(n),
            NumeralStyle::RomanLower => to_roman(n).to_lowercase(),
            NumeralStyle::Chinese => to_chinese(n),
        }
    }
}

/// Upper-case roman numeral. Values outside 1..=3999 fall back to arabic digits.
pub fn to_roman(n: u32) -> String {
    if n == 0 || n > 3999 {
        return n.to_string();
    }
    let mut rest = n;
    let mut out = String::new();
    for &(value, sym) in &ROMAN {
        while rest >= value {
            out.push_str(sym);
            rest -= value;
        }
    }
    out
}

pub fn from_roman(s: &str) -> Option<u32> {
    let value = |c: char| match c.to_ascii_uppercase() {
        'I' => Some(1),
        'V' => Some(5),
        'X' => Some(10),
        'L' => Some(50),
        'C' => Some(100),
        'D' => Some(500),
        'M' => Some(1000),
        _ => None,
    };
    let digits: Vec<u32> = s.chars().map(value).collect::<Option<_>>()?;
    if digits.is_empty() {
        return None;
    }
    let mut total = 0u32;
    for (i, &d) in digits.iter().enumerate() {
        match digits.get(i + 1) {
            Some(&next) if next > d => total = total.checked_sub(d)?,
            _ => total += d,
        }
    }
    (to_roman(total).eq_ignore_ascii_case(s)).then_some(total)
}

fn chinese_section(n: u32, out: &mut String) {
    let mut pending_zero = false;
    for pos in (0..4).rev() {
        let d = (n / 10u32.pow(pos as u32)) % 10;
        if d == 0 {
            if !out.is_empty() {
                pending_zero = true;
            }
            continue;
        }
        if pending_zero {
            out.push('零');
            pending_zero = false;
        }
        out.push(CN_DIGITS[d as usize]);
        out.push_str(CN_UNITS[pos]);
    }
}

/// Chinese numeral with 零 marking interior zeros (101 → 一百零一) and the
/// customary short form for 10..=19 (十二 rather than 一十二).
pub fn to_chinese(n: u32) -> String {
    if n == 0 {
        return "零".to_string();
    }
    if n >= 100_000_000 {
        return n.to_string();
    }
    let mut out = String::new();
    let high = n / 10_000;
    let low = n % 10_000;
    if high > 0 {
        chinese_section(high, &mut out);
        out.push('万');
        if low > 0 && low < 1000 {
            out.push('零');
        }
    }
    if low > 0 {
        let mut section = String::new();
        chinese_section(low, &mut section);
        out.push_str(&section);
    }
    if out.starts_with("一十") {
        out.remove(0);
    }
    out
}

fn parse_chinese_section(s: &str) -> Option<u32> {
    let mut total = 0u32;
    let mut digit: Option<u32> = None;
    for c in s.chars() {
        if let Some(d) = CN_DIGITS.iter().position(|&x| x == c) {
            if d != 0 {
                digit = Some(d as u32);
            }
            continue;
        }
        let unit = match c {
            '十' => 10,
            '百' => 100,
            '千' => 1000,
            _ => return None,
        };
        total += digit.take().unwrap_or(1) * unit;
    }
    Some(total + digit.unwrap_or(0))
}

pub fn from_chinese(s: &str) -> Option<u32> {
    if s == "零" {
        return Some(0);
    }
    match s.split_once('万') {
        Some((high, low)) => {
            Some(parse_chinese_section(high)? * 10_000 + parse_chinese_section(low)?)
        }
        None => parse_chinese_section(s),
    }
}

fn token_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| Regex::new(r"\{(page|total)(?::([a-z_]+))?\}").expect("valid regex"))
}

/// Expand `{page}`, `{page:roman}`, `{total}`, `{total:chinese}` and friends.
/// Every occurrence is replaced; tokens with an unknown numeral style stay verbatim.
pub fn format_page_number(page: usize, total: usize, fmt: &str) -> String {
    token_pattern()
        .replace_all(fmt, |caps: &Captures| {
            let n = if &caps[1] == "page" { page } else { total };
            match NumeralStyle::from_suffix(caps.get(2).map(|m| m.as_str())) {
                Some(style) => style.format(n as u32),
                None => caps[0].to_string(),
            }
        })
        .into_owned()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn chinese_interior_zero() {
        assert_eq!(to_chinese(101), "一百零一");
        assert_eq!(to_chinese(110), "一百一十");
        assert_eq!(to_chinese(1005), "一千零五");
        assert_eq!(to_chinese(12), "十二");
        assert_eq!(to_chinese(20), "二十");
        assert_eq!(to_chinese(10_001), "一万零一");
    }

    #[test]
    fn roman_basics() {
        assert_eq!(to_roman(4), "IV");
        assert_eq!(to_roman(1994), "MCMXCIV");
        assert_eq!(from_roman("xlii"), Some(42));
        assert_eq!(from_roman("IIII"), None);
    }

    #[test]
    fn all_tokens_replaced() {
        assert_eq!(format_page_number(3, 12, "{page} / {total}"), "3 / 12");
        assert_eq!(
            format_page_number(4, 9, "{page:roman_lower} of {total:roman}"),
            "iv of IX"
        );
        assert_eq!(format_page_number(2, 5, "第{page:chinese}页"), "第二页");
        assert_eq!(format_page_number(2, 5, "{page:hex}"), "{page:hex}");
    }
}
