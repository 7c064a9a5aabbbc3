//! Open-list state: the style and running counter behind `\list` / `\li`.
//!
//! Each `\list` pushes one of these; every `\li` advances the counter and
//! asks for the marker text of the new item. Definition lists (`\value`
//! under an enum doc) use the `Value` style, which the parser opens
//! implicitly.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ListStyle {
    Bullet,
    Tag,
    Value,
    Numeric,
    UpperAlpha,
    LowerAlpha,
    UpperRoman,
    LowerRoman,
}

impl ListStyle {
    pub fn style_string(self) -> &'static str {
        match self {
            ListStyle::Bullet => "bullet",
            ListStyle::Tag => "tag",
            ListStyle::Value => "value",
            ListStyle::Numeric => "numeric",
            ListStyle::UpperAlpha => "upperalpha",
            ListStyle::LowerAlpha => "loweralpha",
            ListStyle::UpperRoman => "upperroman",
            ListStyle::LowerRoman => "lowerroman",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OpenedList {
    style: ListStyle,
    prefix: String,
    suffix: String,
    start: i64,
    item_count: i64,
}

impl OpenedList {
    pub fn new(style: ListStyle) -> OpenedList {
        OpenedList {
            style,
            prefix: String::new(),
            suffix: String::new(),
            start: 1,
            item_count: 0,
        }
    }

    /// Interprets the optional argument of `\list`: a key character chooses
    /// the numbering style (`1`, `A`, `a`, `I`, `i`), surrounding
    /// punctuation becomes the marker prefix/suffix, and a multi-digit key
    /// sets the starting number. No hint means a bullet list.
    pub fn from_hint(hint: &str) -> OpenedList {
        let prefix: String = hint.chars().take_while(|c| !c.is_alphanumeric()).collect();
        let key: String = hint
            .chars()
            .skip(prefix.chars().count())
            .take_while(|c| c.is_alphanumeric())
            .collect();
        let suffix: String = hint
            .chars()
            .skip(prefix.chars().count() + key.chars().count())
            .collect();

        let (style, start) = if key.is_empty() {
            (ListStyle::Bullet, 1)
        } else if key.chars().all(|c| c.is_ascii_digit()) {
            (ListStyle::Numeric, key.parse().unwrap_or(1))
        } else {
            match key.as_str() {
                "a" => (ListStyle::LowerAlpha, 1),
                "A" => (ListStyle::UpperAlpha, 1),
                "i" => (ListStyle::LowerRoman, 1),
                "I" => (ListStyle::UpperRoman, 1),
                _ => (ListStyle::Bullet, 1),
            }
        };

        OpenedList {
            style,
            prefix,
            suffix,
            start,
            item_count: 0,
        }
    }

    pub fn style(&self) -> ListStyle {
        self.style
    }

    pub fn style_string(&self) -> &'static str {
        self.style.style_string()
    }

    /// Whether any item has been opened yet; decides between appending
    /// `ListLeft` (first item) and `ListItemRight` (subsequent items).
    pub fn is_started(&self) -> bool {
        self.item_count > 0
    }

    pub fn next(&mut self) {
        self.item_count += 1;
    }

    /// Marker text for the current item, in the list's style.
    pub fn number_string(&self) -> String {
        let number = self.start + self.item_count - 1;
        let core = match self.style {
            ListStyle::UpperAlpha => to_alpha(number).to_uppercase(),
            ListStyle::LowerAlpha => to_alpha(number),
            ListStyle::UpperRoman => to_roman(number),
            ListStyle::LowerRoman => to_roman(number).to_lowercase(),
            _ => number.to_string(),
        };
        format!("{}{}{}", self.prefix, core, self.suffix)
    }
}

fn to_alpha(mut n: i64) -> String {
    let mut out = String::new();
    while n > 0 {
        n -= 1;
        out.insert(0, (b'a' + (n % 26) as u8) as char);
        n /= 26;
    }
    out
}

fn to_roman(n: i64) -> String {
    if n <= 0 {
        return n.to_string();
    }
    const DIGITS: &[(i64, &str)] = &[
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
    let mut n = n;
    let mut out = String::new();
    for &(value, digit) in DIGITS {
        while n >= value {
            out.push_str(digit);
            n -= value;
        }
    }
    out
}
