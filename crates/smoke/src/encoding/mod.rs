// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Runtime type encodings.
//!
//! Parses the compact textual encoding language (`i`, `^v`, `[4f]`,
//! `{Point="x"i"y"i}`, `@"NSString<NSCopying>"`, `@?<v@?i>`, ...) into
//! [`Type`] trees. Rendering back is [`Type::encoding`].
//!
//! # Example
//!
//! ```rust
//! let ty = smoke::encoding::parse(r#"{Point="x"i"y"i}"#).unwrap();
//! assert_eq!(ty.size(), 8);
//! assert_eq!(ty.alignment(), 4);
//!
//! assert!(smoke::encoding::parse("{Bad=").is_err());
//! ```

mod parser;

pub(crate) use parser::Parser;

use crate::error::EncodingError;
use crate::types::Type;

/// Reserved characters of the encoding language.
pub mod symbol {
    pub const UNKNOWN: u8 = b'?';
    pub const VOID: u8 = b'v';
    pub const OBJECT: u8 = b'@';
    pub const BLOCK_SUFFIX: u8 = b'?';
    pub const CLASS: u8 = b'#';
    pub const BITFIELD: u8 = b'b';
    pub const ARRAY_OPEN: u8 = b'[';
    pub const ARRAY_CLOSE: u8 = b']';
    pub const STRUCT_OPEN: u8 = b'{';
    pub const STRUCT_CLOSE: u8 = b'}';
    pub const UNION_OPEN: u8 = b'(';
    pub const UNION_CLOSE: u8 = b')';
    pub const NAME_SEPARATOR: u8 = b'=';
    pub const QUOTE: u8 = b'"';
    pub const ANGLE_OPEN: u8 = b'<';
    pub const ANGLE_CLOSE: u8 = b'>';
}

/// Parse a complete type encoding.
///
/// Trailing characters after the first complete type are an error; use
/// [`parse_prefix`] to consume a leading type only.
pub fn parse(encoding: &str) -> Result<Type, EncodingError> {
    let (ty, rest) = parse_prefix(encoding)?;
    if !rest.is_empty() {
        return Err(EncodingError::malformed(
            encoding.len() - rest.len(),
            "trailing characters after type",
        ));
    }
    Ok(ty)
}

/// Parse the leading type of `encoding`; returns it with the unparsed rest.
pub fn parse_prefix(encoding: &str) -> Result<(Type, &str), EncodingError> {
    if encoding.is_empty() {
        return Err(EncodingError::Empty);
    }

    let mut parser = Parser::new(encoding);
    let ty = parser.parse_type()?;
    log::trace!("[encoding] parsed {:?} from {:?}", ty, encoding);
    Ok((ty, parser.remainder()))
}
