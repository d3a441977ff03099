use crate::core::{Result, StoreError};
use lru::LruCache;
use regex::Regex;
use std::num::NonZeroUsize;
use std::sync::{Arc, Mutex};

const CACHE_CAPACITY: NonZeroUsize = match NonZeroUsize::new(256) {
    Some(capacity) => capacity,
    None => panic!("cache capacity must be non-zero"),
};

lazy_static::lazy_static! {
    static ref GLOB_CACHE: Arc<Mutex<LruCache<String, Arc<Regex>>>> =
        Arc::new(Mutex::new(LruCache::new(CACHE_CAPACITY)));
}

/// Translates a store MATCH glob into an anchored regex.
///
/// Supports `*`, `?`, `[abc]`, `[^a-z]` and `\` escapes. An unterminated
/// `[` is taken literally.
fn glob_to_regex(glob: &str) -> String {
    let chars: Vec<char> = glob.chars().collect();
    let mut regex = String::with_capacity(glob.len() + 8);
    regex.push_str("(?s)^");

    let mut i = 0;
    while i < chars.len() {
        match chars[i] {
            '*' => regex.push_str(".*"),
            '?' => regex.push('.'),
            '\\' if i + 1 < chars.len() => {
                i += 1;
                regex.push_str(&regex::escape(&chars[i].to_string()));
            }
            '[' => match class_to_regex(&chars[i + 1..]) {
                Some((class, consumed)) => {
                    regex.push_str(&class);
                    i += consumed;
                }
                None => regex.push_str(&regex::escape("[")),
            },
            c => regex.push_str(&regex::escape(&c.to_string())),
        }
        i += 1;
    }

    regex.push('$');
    regex
}

/// Parses the body of a `[...]` class. Returns the regex class and the
/// number of glob characters consumed, closing bracket included.
fn class_to_regex(body: &[char]) -> Option<(String, usize)> {
    let mut i = 0;
    let negated = matches!(body.first(), Some('^'));
    if negated {
        i += 1;
    }

    let mut members: Vec<char> = Vec::new();
    let mut ranges: Vec<(char, char)> = Vec::new();
    loop {
        let c = *body.get(i)?;
        match c {
            ']' => break,
            '\\' => {
                members.push(*body.get(i + 1)?);
                i += 2;
            }
            _ if body.get(i + 1) == Some(&'-') && !matches!(body.get(i + 2), None | Some(']')) => {
                let (mut start, mut end) = (c, body[i + 2]);
                if start > end {
                    std::mem::swap(&mut start, &mut end);
                }
                ranges.push((start, end));
                i += 3;
            }
            _ => {
                members.push(c);
                i += 1;
            }
        }
    }

    let mut class = String::from("[");
    if negated {
        class.push('^');
    }
    for member in members {
        class.push_str(&regex::escape(&member.to_string()));
    }
    for (start, end) in ranges {
        class.push_str(&regex::escape(&start.to_string()));
        class.push('-');
        class.push_str(&regex::escape(&end.to_string()));
    }
    if class.len() == 1 || (negated && class.len() == 2) {
        // "[]" matches nothing, "[^]" anything
        return Some((if negated { "." } else { "[^\\s\\S]" }.to_string(), i + 1));
    }
    class.push(']');
    Some((class, i + 1))
}

fn compiled(glob: &str) -> Result<Arc<Regex>> {
    {
        let mut cache = GLOB_CACHE
            .lock()
            .map_err(|_| StoreError::transport("glob cache lock poisoned"))?;
        if let Some(regex) = cache.get(glob) {
            return Ok(Arc::clone(regex));
        }
    }

    let regex = Regex::new(&glob_to_regex(glob))
        .map_err(|e| StoreError::transport(format!("invalid MATCH pattern {:?}: {}", glob, e)))?;
    let regex = Arc::new(regex);

    let mut cache = GLOB_CACHE
        .lock()
        .map_err(|_| StoreError::transport("glob cache lock poisoned"))?;
    cache.put(glob.to_string(), Arc::clone(&regex));
    Ok(regex)
}

/// Compiled MATCH filter used by a single scan call.
pub struct GlobMatcher {
    regex: Option<Arc<Regex>>,
}

impl GlobMatcher {
    pub fn new(glob: Option<&str>) -> Result<Self> {
        let regex = match glob {
            None | Some("*") => None,
            Some(glob) => Some(compiled(glob)?),
        };
        Ok(Self { regex })
    }

    pub fn matches(&self, key: &str) -> bool {
        self.regex.as_ref().is_none_or(|regex| regex.is_match(key))
    }
}
