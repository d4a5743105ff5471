//! Bundle header parsing.
//!
//! A bundle file opens with a textual header terminated by an empty line:
//!
//! ```text
//! # v2 git bundle
//! -<oid> <commit subject>        (prerequisite)
//! @<capability>                  (v3 only; ignored)
//! <oid> <refname>                (ref tip)
//!
//! <binary pack data>
//! ```
//!
//! Only the header is read here; the pack payload is never touched.

use std::collections::HashMap;
use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::Path;

use crate::error::{Error, Result};

const VERSION_PREFIX: &str = "# v";
const VERSION_SUFFIX: &str = " git bundle";

/// Parsed first section of a bundle file.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BundleHeader {
    pub version: i64,

    /// `refs[<refname>] = <oid>` for every ref tip in the bundle.
    pub refs: HashMap<String, String>,

    /// `prereq_commits[<oid>] = <commit subject>` for every prerequisite.
    pub prereq_commits: HashMap<String, String>,
}

/// Read and parse the header of the bundle file at `path`.
pub fn parse_bundle_header(path: &Path) -> Result<BundleHeader> {
    let file = File::open(path).map_err(|e| Error::io(path, e))?;
    parse_header(BufReader::new(file), path)
}

fn parse_header(mut reader: impl BufRead, path: &Path) -> Result<BundleHeader> {
    let mut header = BundleHeader::default();

    let mut buffer = Vec::new();
    loop {
        buffer.clear();
        let n = reader
            .read_until(b'\n', &mut buffer)
            .map_err(|e| Error::io(path, e))?;
        if n == 0 {
            break;
        }
        if buffer == b"\n" {
            // Empty line terminates the header.
            break;
        }

        let line = std::str::from_utf8(&buffer)
            .map_err(|_| Error::MalformedBundle("non-UTF-8 header line".to_string()))?
            .trim_end_matches('\n');
        if line.is_empty() {
            break;
        }

        if let Some(rest) = line.strip_prefix(VERSION_PREFIX) {
            if let Some(version) = rest.strip_suffix(VERSION_SUFFIX) {
                header.version = version.parse().map_err(|_| {
                    Error::MalformedBundle(format!("unparseable version '{line}'"))
                })?;
                continue;
            }
        }

        if header.version == 0 {
            return Err(Error::MalformedBundle("no version".to_string()));
        }

        match line.as_bytes()[0] {
            // Capability; ignored.
            b'@' => continue,
            b'-' => {
                let (oid, subject) = split_on_space(line)?;
                header
                    .prereq_commits
                    .insert(oid.trim_start_matches('-').to_string(), subject.to_string());
            }
            _ => {
                let (oid, refname) = split_on_space(line)?;
                header.refs.insert(refname.to_string(), oid.to_string());
            }
        }
    }

    if header.version == 0 {
        return Err(Error::MalformedBundle("no version".to_string()));
    }

    Ok(header)
}

fn split_on_space(line: &str) -> Result<(&str, &str)> {
    line.split_once(' ')
        .ok_or_else(|| Error::MalformedBundle(line.to_string()))
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    fn parse(content: &[u8]) -> Result<BundleHeader> {
        parse_header(Cursor::new(content.to_vec()), Path::new("test.bundle"))
    }

    #[test]
    fn parses_v2_header_with_tips_and_prereqs() {
        let header = parse(
            b"# v2 git bundle\n\
              -0123456789abcdef0123456789abcdef01234567 initial commit\n\
              89abcdef0123456789abcdef0123456789abcdef refs/heads/main\n\
              \n\
              \x00PACKDATA",
        )
        .unwrap();

        assert_eq!(header.version, 2);
        assert_eq!(
            header.refs.get("refs/heads/main").map(String::as_str),
            Some("89abcdef0123456789abcdef0123456789abcdef")
        );
        assert_eq!(
            header
                .prereq_commits
                .get("0123456789abcdef0123456789abcdef01234567")
                .map(String::as_str),
            Some("initial commit")
        );
    }

    #[test]
    fn parses_v3_capabilities() {
        let header = parse(
            b"# v3 git bundle\n\
              @object-format=sha1\n\
              89abcdef0123456789abcdef0123456789abcdef refs/heads/main\n\
              \n",
        )
        .unwrap();

        assert_eq!(header.version, 3);
        assert_eq!(header.refs.len(), 1);
        assert!(header.prereq_commits.is_empty());
    }

    #[test]
    fn missing_version_line_fails() {
        let err = parse(b"89abcdef refs/heads/main\n\n").unwrap_err();
        assert!(matches!(err, Error::MalformedBundle(msg) if msg == "no version"));
    }

    #[test]
    fn empty_file_fails() {
        let err = parse(b"").unwrap_err();
        assert!(matches!(err, Error::MalformedBundle(msg) if msg == "no version"));
    }

    #[test]
    fn tip_without_space_fails_naming_the_line() {
        let err = parse(b"# v2 git bundle\nnospacehere\n\n").unwrap_err();
        assert!(matches!(err, Error::MalformedBundle(msg) if msg == "nospacehere"));
    }

    #[test]
    fn garbage_version_fails() {
        let err = parse(b"# vX git bundle\n\n").unwrap_err();
        assert!(matches!(err, Error::MalformedBundle(_)));
    }

    #[test]
    fn header_stops_at_blank_line() {
        let header = parse(
            b"# v2 git bundle\n\
              89abcdef0123456789abcdef0123456789abcdef refs/heads/main\n\
              \n\
              thisisnotavalidline\n",
        )
        .unwrap();
        assert_eq!(header.refs.len(), 1);
    }
}
