//! Hierarchical content names.
//!
//! Content names are `/`-delimited paths such as `/sensor/1/temp`. This module
//! provides the depth and prefix arithmetic used by the forwarding table and
//! the [`NameMapper`] that makes every published reading uniquely named.

use log::{trace, warn};
use std::time::{SystemTime, UNIX_EPOCH};

/// Name component separator.
pub const NAME_SEPARATOR: char = '/';

/// Iterates over the non-empty components of `name`.
pub fn components(name: &str) -> impl Iterator<Item = &str> {
    name.split(NAME_SEPARATOR).filter(|comp| !comp.is_empty())
}

/// Hierarchical depth of a name.
///
/// `""` and `"/"` have depth 0. Any other name has at least depth 1, even when
/// it is made only of separators.
pub fn depth(name: &str) -> usize {
    if name.is_empty() || name == "/" {
        return 0;
    }

    components(name).count().max(1)
}

/// Rebuilds the first `prefix_depth` components of `name`, each prefixed with `/`.
///
/// A depth larger than the number of components clamps to the full name and a
/// depth of 0 yields the empty string.
pub fn extract_prefix(name: &str, prefix_depth: usize) -> String {
    let mut prefix = String::with_capacity(name.len() + 1);
    for comp in components(name).take(prefix_depth) {
        prefix.push(NAME_SEPARATOR);
        prefix.push_str(comp);
    }
    prefix
}

/// Canonical form of a name: single leading `/`, no empty or trailing components.
pub fn canonical(name: &str) -> String {
    extract_prefix(name, depth(name))
}

/// Maps logical sensor names to unique, timestamped ICN names and back.
///
/// Every call to [`NameMapper::add_timestamp`] yields a suffix strictly greater
/// than the previous one, so periodic readings of the same sensor never collide
/// even when two of them land in the same millisecond.
#[derive(Debug, Default)]
pub struct NameMapper {
    last_stamp: Option<u64>,
}

impl NameMapper {
    /// Creates a new name mapper.
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends the current millisecond epoch time to the normalized `name`.
    pub fn add_timestamp(&mut self, name: &str) -> String {
        let now = match SystemTime::now().duration_since(UNIX_EPOCH) {
            Ok(elapsed) => elapsed.as_millis() as u64,
            Err(e) => {
                warn!("System clock is before the epoch: {}", e);
                0
            }
        };
        self.add_timestamp_at(name, now)
    }

    /// Appends `now_ms` (or the next free stamp after the last one issued).
    pub fn add_timestamp_at(&mut self, name: &str, now_ms: u64) -> String {
        let stamp = match self.last_stamp {
            Some(last) if now_ms <= last => {
                trace!("Clock at {} has not passed stamp {}", now_ms, last);
                last + 1
            }
            _ => now_ms,
        };
        self.last_stamp = Some(stamp);

        let name = normalize(name);
        if name.len() == 1 {
            return format!("/{}", stamp);
        }
        format!("{}/{}", name, stamp)
    }

    /// Strips the last component of a timestamped name.
    ///
    /// Names without a separator after position 0 are returned unchanged.
    pub fn remove_timestamp(&self, name: &str) -> String {
        match name.rfind(NAME_SEPARATOR) {
            Some(pos) if pos > 0 => name[..pos].to_string(),
            _ => name.to_string(),
        }
    }
}

/// Ensures exactly one leading `/` and no trailing `/`.
fn normalize(name: &str) -> String {
    let body = name.trim_matches(NAME_SEPARATOR);
    if body.len() + 1 != name.len() || !name.starts_with(NAME_SEPARATOR) {
        trace!("Normalized name {:?} to /{}", name, body);
    }
    format!("/{}", body)
}
