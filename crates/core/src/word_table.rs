//! Partitioned identifier interning.
//!
//! Every identifier seen by the parser is interned into one of three
//! append-only partitions of a single id space: natives, keywords, and user
//! words. The partition boundaries are fixed at compile time so that an
//! `IName` can be classified by range alone, with no extra tag.

use crate::error::WordTableError;

/// An interned identifier. Partitioned: `[0, WORD_CAP)` user words,
/// `[KEYWORD_START, KEYWORD_START + KEYWORD_CAP)` keywords,
/// `[NATIVE_START, NATIVE_START + NATIVE_CAP)` natives.
pub type IName = i32;

pub const WORD_START: i32 = 0;
pub const MAX_WORD_LOOKUPS: usize = 128;
pub const KEYWORD_START: i32 = 128;
pub const MAX_KEYWORD_LOOKUPS: usize = 192;
pub const NATIVE_START: i32 = 320;
pub const MAX_NATIVE_LOOKUPS: usize = 128;

/// Sentinel returned by [`WordTable::lookup`] for an unknown name.
pub const NOT_FOUND: IName = -1;

#[derive(Debug, Default)]
pub struct WordTable {
    natives: Vec<String>,
    keywords: Vec<String>,
    words: Vec<String>,
}

impl WordTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Declares a native function name once at startup. Natives and
    /// keywords are never reset between parses.
    pub fn declare_native(&mut self, name: &str) -> Result<IName, WordTableError> {
        if self.natives.len() >= MAX_NATIVE_LOOKUPS {
            return Err(WordTableError::NativePartitionFull {
                max: MAX_NATIVE_LOOKUPS,
            });
        }
        self.natives.push(name.to_string());
        Ok(NATIVE_START + (self.natives.len() as i32 - 1))
    }

    /// Declares a built-in keyword (e.g. `quote`, `fn`, argument labels).
    pub fn declare_keyword(&mut self, name: &str) -> Result<IName, WordTableError> {
        if self.keywords.len() >= MAX_KEYWORD_LOOKUPS {
            return Err(WordTableError::KeywordPartitionFull {
                max: MAX_KEYWORD_LOOKUPS,
            });
        }
        if KEYWORD_START as usize + self.keywords.len() + 1 > NATIVE_START as usize {
            return Err(WordTableError::KeywordRangeOverflowsNatives {
                keyword_start: KEYWORD_START as usize,
                count: self.keywords.len() + 1,
                native_start: NATIVE_START as usize,
            });
        }
        self.keywords.push(name.to_string());
        Ok(KEYWORD_START + (self.keywords.len() as i32 - 1))
    }

    /// Interns a user-level identifier. Natives and keywords shadow user
    /// words: if `name` already names a native or keyword, that id is
    /// returned instead of adding a duplicate user word.
    pub fn intern_user_word(&mut self, name: &str) -> Result<IName, WordTableError> {
        if let Some(id) = self.lookup(name) {
            return Ok(id);
        }
        if self.words.len() >= MAX_WORD_LOOKUPS {
            return Err(WordTableError::UserPartitionFull {
                max: MAX_WORD_LOOKUPS,
            });
        }
        self.words.push(name.to_string());
        Ok(WORD_START + (self.words.len() as i32 - 1))
    }

    /// Clears the user partition only; called at the start of every parse
    /// so each script sees a clean user-word namespace.
    pub fn reset_user_words(&mut self) {
        self.words.clear();
    }

    /// Native-first, then keyword, then user. Returns `None` if unknown.
    pub fn lookup(&self, name: &str) -> Option<IName> {
        if let Some(i) = self.natives.iter().position(|n| n == name) {
            return Some(NATIVE_START + i as i32);
        }
        if let Some(i) = self.keywords.iter().position(|n| n == name) {
            return Some(KEYWORD_START + i as i32);
        }
        if let Some(i) = self.words.iter().position(|n| n == name) {
            return Some(WORD_START + i as i32);
        }
        None
    }

    /// Reverse lookup: total for any id previously returned by this table.
    pub fn reverse_lookup(&self, id: IName) -> Result<&str, WordTableError> {
        if id >= NATIVE_START {
            let idx = (id - NATIVE_START) as usize;
            return self
                .natives
                .get(idx)
                .map(String::as_str)
                .ok_or(WordTableError::UnknownId(id));
        }
        if id >= KEYWORD_START {
            let idx = (id - KEYWORD_START) as usize;
            return self
                .keywords
                .get(idx)
                .map(String::as_str)
                .ok_or(WordTableError::UnknownId(id));
        }
        if id >= WORD_START {
            let idx = (id - WORD_START) as usize;
            return self
                .words
                .get(idx)
                .map(String::as_str)
                .ok_or(WordTableError::UnknownId(id));
        }
        Err(WordTableError::UnknownId(id))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn natives_and_keywords_occupy_fixed_ranges() {
        let mut t = WordTable::new();
        let quote = t.declare_keyword("quote").unwrap();
        let rect = t.declare_native("rect").unwrap();
        assert!(quote >= KEYWORD_START && quote < NATIVE_START);
        assert!(rect >= NATIVE_START);
    }

    #[test]
    fn user_words_are_shadowed_by_keywords() {
        let mut t = WordTable::new();
        let kw = t.declare_keyword("fn").unwrap();
        let user = t.intern_user_word("fn").unwrap();
        assert_eq!(kw, user);
    }

    #[test]
    fn reset_user_words_clears_only_user_partition() {
        let mut t = WordTable::new();
        let native = t.declare_native("line").unwrap();
        t.intern_user_word("my-shape").unwrap();
        t.reset_user_words();
        assert!(t.lookup("my-shape").is_none());
        assert_eq!(t.lookup("line"), Some(native));
    }

    #[test]
    fn reverse_lookup_is_total_for_interned_ids() {
        let mut t = WordTable::new();
        let id = t.intern_user_word("shape").unwrap();
        assert_eq!(t.reverse_lookup(id).unwrap(), "shape");
    }

    #[test]
    fn lookup_unknown_name_is_not_found() {
        let t = WordTable::new();
        assert_eq!(t.lookup("nope"), None);
    }
}
