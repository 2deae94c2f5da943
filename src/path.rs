//! Archive-native path handling.
//!
//! NuFX records store one full path per record, with components separated
//! by the byte in the low half of `file_sys_info` (`:` for ProDOS and HFS,
//! `/` or `\` elsewhere). Names are 8-bit and are decoded one byte per
//! character as ISO-8859-1, which keeps every stored name representable
//! and reversible.

/// Split `path` on `separator`, dropping empty components. No case or
/// Unicode normalization is applied.
pub fn split(path: &str, separator: u8) -> Vec<String> {
    let sep = separator as char;
    path.split(sep)
        .filter(|c| !c.is_empty())
        .map(str::to_string)
        .collect()
}

/// Display form of a component list. Components are escaped with
/// [`escape_component`], so [`split_display`] gives them back unchanged.
pub fn join(components: &[String]) -> String {
    components.iter().map(|c| escape_component(c)).collect::<Vec<_>>().join("/")
}

/// Inverse of [`join`].
pub fn split_display(path: &str) -> Vec<String> {
    split(path, b'/').iter().map(|c| unescape_component(c)).collect()
}

/// `%` becomes `%25` and `/` becomes `%2F`. HFS names may contain `/`.
pub fn escape_component(name: &str) -> String {
    let mut out = String::with_capacity(name.len());
    for c in name.chars() {
        match c {
            '%' => out.push_str("%25"),
            '/' => out.push_str("%2F"),
            c => out.push(c),
        }
    }
    out
}

/// Undo [`escape_component`]. Any other `%` sequence is kept as written.
pub fn unescape_component(name: &str) -> String {
    let mut out = String::with_capacity(name.len());
    let mut rest = name;
    while let Some(i) = rest.find('%') {
        out.push_str(&rest[..i]);
        let tail = &rest[i..];
        match tail.get(1..3) {
            Some(code) if code.eq_ignore_ascii_case("2F") => {
                out.push('/');
                rest = &tail[3..];
            }
            Some("25") => {
                out.push('%');
                rest = &tail[3..];
            }
            _ => {
                out.push('%');
                rest = &tail[1..];
            }
        }
    }
    out.push_str(rest);
    out
}

pub fn decode_name(bytes: &[u8]) -> String {
    bytes.iter().map(|&b| b as char).collect()
}

/// Inverse of [`decode_name`]; `None` when a character is above U+00FF.
pub fn encode_name(name: &str) -> Option<Vec<u8>> {
    name.chars().map(|c| u8::try_from(c).ok()).collect()
}

/// A record path classified into directory components and a leaf name.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedPath {
    components:   Vec<String>,
    is_directory: bool,
}

impl ResolvedPath {
    pub fn new(path: &str, separator: u8, is_directory: bool) -> Self {
        Self { components: split(path, separator), is_directory }
    }

    pub fn from_components(components: Vec<String>, is_directory: bool) -> Self {
        Self { components, is_directory }
    }

    pub fn components(&self) -> &[String] {
        &self.components
    }

    pub fn is_directory(&self) -> bool {
        self.is_directory
    }

    pub fn is_empty(&self) -> bool {
        self.components.is_empty()
    }

    /// Every directory the path passes through, including the record
    /// itself when it is a directory.
    pub fn directory_components(&self) -> &[String] {
        if self.is_directory {
            &self.components
        } else {
            let n = self.components.len().saturating_sub(1);
            &self.components[..n]
        }
    }

    /// Last component of a non-directory path.
    pub fn leaf_name(&self) -> Option<&str> {
        if self.is_directory {
            None
        } else {
            self.components.last().map(String::as_str)
        }
    }

    pub fn display(&self) -> String {
        join(&self.components)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn splits_on_native_separator() {
        assert_eq!(split("GAMES:ADVENTURE:SAVE.DAT", b':'), ["GAMES", "ADVENTURE", "SAVE.DAT"]);
        assert_eq!(split("usr/lib/x", b'/'), ["usr", "lib", "x"]);
        // A foreign separator is part of the name.
        assert_eq!(split("A/B", b':'), ["A/B"]);
    }

    #[test]
    fn empty_components_are_dropped() {
        assert!(split("", b':').is_empty());
        assert!(split(":::", b':').is_empty());
        assert_eq!(split(":A::B:", b':'), ["A", "B"]);
    }

    #[test]
    fn classifies_leaf_and_directory() {
        let leaf = ResolvedPath::new("GAMES:ADVENTURE:SAVE.DAT", b':', false);
        assert_eq!(leaf.directory_components(), ["GAMES", "ADVENTURE"]);
        assert_eq!(leaf.leaf_name(), Some("SAVE.DAT"));

        let dir = ResolvedPath::new("GAMES:ADVENTURE", b':', true);
        assert_eq!(dir.directory_components(), ["GAMES", "ADVENTURE"]);
        assert_eq!(dir.leaf_name(), None);
        assert_eq!(dir.display(), "GAMES/ADVENTURE");
    }

    #[test]
    fn display_path_escapes_foreign_slash() {
        let parts = vec!["Mac".to_string(), "My/File".to_string(), "100%".to_string()];
        assert_eq!(join(&parts), "Mac/My%2FFile/100%25");
        assert_eq!(split_display(&join(&parts)), parts);
        assert_eq!(split_display("Mac/My%2fFile"), ["Mac", "My/File"]);
        // Stray escapes are literal.
        assert_eq!(unescape_component("50%off%"), "50%off%");
        assert_eq!(unescape_component("%\u{e9}x"), "%\u{e9}x");
    }

    #[test]
    fn latin1_names_are_reversible() {
        let raw = [b'C', b'A', b'F', 0xC9, 0x80];
        let name = decode_name(&raw);
        assert_eq!(name.chars().count(), 5);
        assert_eq!(encode_name(&name).unwrap(), raw);
        assert_eq!(encode_name("snow \u{2603}"), None);
    }
}
