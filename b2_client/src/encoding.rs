//! URL encoding for file names and user metadata carried in headers.

use percent_encoding::{utf8_percent_encode, AsciiSet, NON_ALPHANUMERIC};

// Unreserved characters stay literal; '/' additionally stays literal in file
// names so folder-style names keep their separators.
const INFO_VALUE_ENCODE_SET: &AsciiSet = &NON_ALPHANUMERIC
    .remove(b'-')
    .remove(b'.')
    .remove(b'_')
    .remove(b'~');

const FILE_NAME_ENCODE_SET: &AsciiSet = &INFO_VALUE_ENCODE_SET.remove(b'/');

/// Percent-encode a UTF-8 file name for the `X-Bz-File-Name` header.
pub fn encode_file_name(name: &str) -> String {
    utf8_percent_encode(name, FILE_NAME_ENCODE_SET).to_string()
}

/// Percent-encode a user metadata value for an `X-Bz-Info-*` header.
pub fn encode_info_value(value: &str) -> String {
    utf8_percent_encode(value, INFO_VALUE_ENCODE_SET).to_string()
}
