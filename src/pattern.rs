use std::fmt;

use crate::kernel::base58::{ALPHABET, MAX_ENCODED_LEN};

/// Kernel-side pattern buffer bound.
pub const MAX_PATTERN_LEN: usize = 32;

pub const WILDCARD: u8 = b'?';

#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum MatchMode {
    Prefix,
    Suffix,
    Anywhere,
}

impl MatchMode {
    pub fn label(&self) -> &'static str {
        match self {
            MatchMode::Prefix => "prefix",
            MatchMode::Suffix => "suffix",
            MatchMode::Anywhere => "anywhere",
        }
    }

    pub fn parse(s: &str) -> Option<MatchMode> {
        match s.to_ascii_lowercase().as_str() {
            "prefix" => Some(MatchMode::Prefix),
            "suffix" => Some(MatchMode::Suffix),
            "anywhere" => Some(MatchMode::Anywhere),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum PatternError {
    #[error("pattern is empty")]
    Empty,
    #[error("pattern is longer than {MAX_PATTERN_LEN} characters")]
    TooLong,
    #[error("Invalid character '{ch}' at position {pos}")]
    InvalidCharacter { ch: char, pos: usize },
}

/// A vanity pattern: Base58 characters plus '?' wildcards, matched against
/// candidate addresses inside the kernel.
#[derive(Clone, Debug, PartialEq)]
pub struct Pattern {
    bytes: [u8; MAX_PATTERN_LEN],
    len: usize,
    pub mode: MatchMode,
    pub ignore_case: bool,
}

impl Pattern {
    pub fn new(text: &str, mode: MatchMode, ignore_case: bool) -> Result<Pattern, PatternError> {
        if text.is_empty() {
            return Err(PatternError::Empty);
        }
        if text.len() > MAX_PATTERN_LEN {
            return Err(PatternError::TooLong);
        }
        for (pos, ch) in text.chars().enumerate() {
            let valid = ch == WILDCARD as char
                || (ch.is_ascii() && ALPHABET.contains(&(ch as u8)));
            if !valid {
                return Err(PatternError::InvalidCharacter { ch, pos });
            }
        }
        let mut bytes = [0u8; MAX_PATTERN_LEN];
        bytes[..text.len()].copy_from_slice(text.as_bytes());
        Ok(Pattern {
            bytes,
            len: text.len(),
            mode,
            ignore_case,
        })
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.bytes[..self.len]
    }

    #[allow(clippy::len_without_is_empty)] // validation rejects empty patterns
    pub fn len(&self) -> usize {
        self.len
    }

    /// Pattern length minus wildcards: the difficulty-relevant length.
    pub fn effective_len(&self) -> u32 {
        self.as_bytes().iter().filter(|&&b| b != WILDCARD).count() as u32
    }

    /// The kernel predicate. Addresses shorter than the pattern never match.
    pub fn matches(&self, address: &[u8]) -> bool {
        let l = address.len();
        let p = self.len;
        if l < p || l > MAX_ENCODED_LEN {
            return false;
        }
        match self.mode {
            MatchMode::Prefix => self.matches_at(address, 0),
            MatchMode::Suffix => self.matches_at(address, l - p),
            MatchMode::Anywhere => (0..=l - p).any(|anchor| self.matches_at(address, anchor)),
        }
    }

    fn matches_at(&self, address: &[u8], anchor: usize) -> bool {
        self.as_bytes()
            .iter()
            .enumerate()
            .all(|(i, &pb)| pb == WILDCARD || self.fold(address[anchor + i]) == self.fold(pb))
    }

    fn fold(&self, b: u8) -> u8 {
        if self.ignore_case {
            b.to_ascii_lowercase()
        } else {
            b
        }
    }
}

impl fmt::Display for Pattern {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        // patterns are validated ASCII
        f.write_str(std::str::from_utf8(self.as_bytes()).map_err(|_| fmt::Error)?)
    }
}
