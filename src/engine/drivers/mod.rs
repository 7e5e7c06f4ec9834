// SPDX-License-Identifier: Apache-2.0

// Database drivers module

pub mod mysql;
pub mod postgres;
pub mod sqlite;

use percent_encoding::{utf8_percent_encode, NON_ALPHANUMERIC};

/// Percent-encodes a credential for embedding in a connection URL.
pub(crate) fn encode_credential(raw: &str) -> String {
    utf8_percent_encode(raw, NON_ALPHANUMERIC).to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn credentials_with_url_metacharacters_are_escaped() {
        assert_eq!(encode_credential("p@ss:w/rd"), "p%40ss%3Aw%2Frd");
        assert_eq!(encode_credential("plain"), "plain");
    }
}
