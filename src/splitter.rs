//! Splitting of the binary transaction feed into records.
//!
//! Records are separated by two consecutive NUL bytes, fields inside a record
//! by a single NUL byte.

/// Record separator in the transaction feed.
pub const RECORD_MARKER: &[u8] = b"\0\0";

/// Field separator in the transaction feed.
pub const FIELD_MARKER: u8 = b'\0';

/// Field delimiter used once a record has been normalized.
pub const FIELD_DELIMITER: char = ';';

/// Lazy iterator over the raw records of a transaction blob.
///
/// Markers are matched left to right without overlap. Input ending in a
/// marker yields a final empty record, so joining every item with
/// [`RECORD_MARKER`] gives back the original bytes.
#[derive(Debug)]
pub struct RecordSplitter<'a> {
    rest: Option<&'a [u8]>,
}

impl<'a> RecordSplitter<'a> {
    pub fn new(blob: &'a [u8]) -> Self {
        RecordSplitter { rest: Some(blob) }
    }
}

impl<'a> Iterator for RecordSplitter<'a> {
    type Item = &'a [u8];

    fn next(&mut self) -> Option<Self::Item> {
        let rest = self.rest?;
        match rest
            .windows(RECORD_MARKER.len())
            .position(|window| window == RECORD_MARKER)
        {
            Some(pos) => {
                self.rest = Some(&rest[pos + RECORD_MARKER.len()..]);
                Some(&rest[..pos])
            }
            None => {
                self.rest = None;
                Some(rest)
            }
        }
    }
}

/// Replaces every field marker with [`FIELD_DELIMITER`].
///
/// Invalid UTF-8 is replaced rather than rejected; the field count check
/// downstream decides whether the record is usable.
pub fn normalize_record(record: &[u8]) -> String {
    String::from_utf8_lossy(record).replace(FIELD_MARKER as char, &FIELD_DELIMITER.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn split(blob: &[u8]) -> Vec<&[u8]> {
        RecordSplitter::new(blob).collect()
    }

    #[test]
    fn test_splits_on_double_marker() {
        let blob = b"a\0b\0\0c\0d";
        assert_eq!(split(blob), vec![&b"a\0b"[..], &b"c\0d"[..]]);
    }

    #[test]
    fn test_trailing_marker_yields_empty_record() {
        let blob = b"a\0\0";
        assert_eq!(split(blob), vec![&b"a"[..], &b""[..]]);
    }

    #[test]
    fn test_empty_blob_yields_single_empty_record() {
        assert_eq!(split(b""), vec![&b""[..]]);
    }

    #[test]
    fn test_triple_marker_leaves_leading_nul() {
        // Left-to-right matching: the first two NULs close the record.
        let blob = b"a\0\0\0b";
        assert_eq!(split(blob), vec![&b"a"[..], &b"\0b"[..]]);
    }

    #[test]
    fn test_split_then_join_round_trips() {
        let blobs: [&[u8]; 6] = [
            b"",
            b"\0",
            b"\0\0",
            b"\0\0\0\0\0",
            b"T1\x001\x00ip\x00dev\x00(p1,p2)\0\0T2\x002\x00ip\x00dev\x00\0\0",
            b"x\0\0\0y\0z\0\0",
        ];
        for blob in blobs {
            let joined = split(blob).join(RECORD_MARKER);
            assert_eq!(joined, blob, "round trip failed for {:?}", blob);
        }
    }

    #[test]
    fn test_normalize_replaces_single_markers() {
        assert_eq!(normalize_record(b"T1\x001\x00ip\x00dev\x00"), "T1;1;ip;dev;");
    }

    #[test]
    fn test_iterator_is_exhausted_after_last_record() {
        let mut it = RecordSplitter::new(b"a\0\0b");
        assert_eq!(it.next(), Some(&b"a"[..]));
        assert_eq!(it.next(), Some(&b"b"[..]));
        assert_eq!(it.next(), None);
        assert_eq!(it.next(), None);
    }
}
