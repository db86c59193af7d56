// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

/*! Splitting of list values into tokens.

List-valued fields (e.g. `Architectures` and `Components` in `Release`
files, or the component list of a distribution source) are sequences of
tokens delimited by whitespace or by a single delimiter character.
*/

/// Describes what delimits tokens in a list value.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum Separator {
    /// Any whitespace character.
    Whitespace,

    /// A single delimiter character.
    Char(char),
}

impl Separator {
    fn matches(&self, c: char) -> bool {
        match self {
            Self::Whitespace => c.is_whitespace(),
            Self::Char(delimiter) => c == *delimiter,
        }
    }
}

/// Split a raw list value into tokens.
///
/// Runs of separators are collapsed and leading and trailing separators
/// are ignored, so no empty tokens are emitted. Empty input or input
/// consisting only of separators results in an empty [Vec].
pub fn parse_list(raw: &str, separator: Separator) -> Vec<String> {
    raw.split(|c| separator.matches(c))
        .filter(|token| !token.is_empty())
        .map(|token| token.to_string())
        .collect()
}

/// Split a raw list value on whitespace.
pub fn parse_words(raw: &str) -> Vec<String> {
    parse_list(raw, Separator::Whitespace)
}
