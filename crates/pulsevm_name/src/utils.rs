use std::fmt;

pub const NAME_CHARS: [u8; 32] = *b".12345abcdefghijklmnopqrstuvwxyz";
pub const NAME_MAX_LEN: usize = 13;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ParseNameError {
    /// The name contains a character outside `.1-5a-z`.
    BadChar(u8),
    /// The 13th character must fit in four bits (`.1-5a-j`).
    BadLastChar(u8),
    /// More than 13 characters.
    TooLong,
}

impl fmt::Display for ParseNameError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ParseNameError::BadChar(c) => write!(f, "bad character in name: '{}'", *c as char),
            ParseNameError::BadLastChar(c) => {
                write!(f, "thirteenth character '{}' must be one of .12345abcdefghij", *c as char)
            }
            ParseNameError::TooLong => write!(f, "name is longer than {} characters", NAME_MAX_LEN),
        }
    }
}

#[inline]
const fn symbol_of(c: u8) -> Option<u64> {
    match c {
        b'.' => Some(0),
        b'1'..=b'5' => Some((c - b'1' + 1) as u64),
        b'a'..=b'z' => Some((c - b'a' + 6) as u64),
        _ => None,
    }
}

/// Packs up to 12 five-bit symbols from the high end of the word, and an
/// optional 13th four-bit symbol into the lowest nibble.
pub fn name_from_bytes(bytes: &[u8]) -> Result<u64, ParseNameError> {
    if bytes.len() > NAME_MAX_LEN {
        return Err(ParseNameError::TooLong);
    }

    let mut value = 0u64;
    for (i, &c) in bytes.iter().enumerate() {
        let symbol = symbol_of(c).ok_or(ParseNameError::BadChar(c))?;
        if i < 12 {
            value |= symbol << (64 - 5 * (i as u32 + 1));
        } else {
            if symbol > 0x0F {
                return Err(ParseNameError::BadLastChar(c));
            }
            value |= symbol;
        }
    }

    Ok(value)
}

/// Unpacks all 13 symbol positions; trailing dots are padding.
pub fn name_to_bytes(value: u64) -> [u8; NAME_MAX_LEN] {
    let mut out = [b'.'; NAME_MAX_LEN];
    for (i, slot) in out.iter_mut().enumerate() {
        let symbol = if i < 12 {
            (value >> (64 - 5 * (i as u32 + 1))) & 0x1F
        } else {
            value & 0x0F
        };
        *slot = NAME_CHARS[symbol as usize];
    }
    out
}
