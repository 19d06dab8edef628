//! Minimal DER reader and writer.
//!
//! Only definite-length, single-byte-tag encodings are accepted, which covers
//! everything a PKCS#7 `SignedData` needs. Values are borrowed from the input
//! so the exact signed bytes of the attribute set survive decoding.

use crate::domain::constants;
use crate::{SigningError, SigningResult};

/// Encode a DER length.
#[must_use]
pub fn encode_len(len: usize) -> Vec<u8> {
    if len < 0x80 {
        return vec![len as u8];
    }
    let bytes = len.to_be_bytes();
    let skip = bytes.iter().take_while(|b| **b == 0).count();
    let significant = &bytes[skip..];
    let mut out = Vec::with_capacity(significant.len() + 1);
    out.push(0x80 | significant.len() as u8);
    out.extend_from_slice(significant);
    out
}

/// Tag-length-value with the given tag.
#[must_use]
pub fn tlv(tag: u8, content: &[u8]) -> Vec<u8> {
    let mut out = vec![tag];
    out.extend_from_slice(&encode_len(content.len()));
    out.extend_from_slice(content);
    out
}

/// Tag-length-value whose content is the concatenation of `parts`.
#[must_use]
pub fn tlv_concat(tag: u8, parts: &[&[u8]]) -> Vec<u8> {
    tlv(tag, &parts.concat())
}

/// OBJECT IDENTIFIER from its content octets.
#[must_use]
pub fn oid(content: &[u8]) -> Vec<u8> {
    tlv(constants::ASN1_OID_TAG, content)
}

/// `AlgorithmIdentifier ::= SEQUENCE { algorithm, parameters NULL? }`
#[must_use]
pub fn algorithm_identifier(oid_content: &[u8], null_params: bool) -> Vec<u8> {
    let mut body = oid(oid_content);
    if null_params {
        body.extend_from_slice(constants::ASN1_NULL);
    }
    tlv(constants::ASN1_SEQUENCE_TAG, &body)
}

/// One decoded element, borrowing from the input.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Tlv<'a> {
    pub tag: u8,
    /// Content octets.
    pub value: &'a [u8],
    /// Full encoding including tag and length.
    pub raw: &'a [u8],
}

impl<'a> Tlv<'a> {
    /// Decode the first element of `input`, returning it and the remainder.
    pub fn parse(input: &'a [u8]) -> SigningResult<(Tlv<'a>, &'a [u8])> {
        let (&tag, after_tag) = input
            .split_first()
            .ok_or_else(|| malformed("unexpected end of data"))?;
        if tag & 0x1f == 0x1f {
            return Err(malformed(format!("multi-byte tag 0x{tag:02x} not supported")));
        }
        let (&first, after_len) = after_tag
            .split_first()
            .ok_or_else(|| malformed("missing length"))?;

        let (len, len_octets) = if first < 0x80 {
            (first as usize, 0)
        } else {
            let count = (first & 0x7f) as usize;
            if count == 0 {
                return Err(malformed("indefinite length is not DER"));
            }
            if count > 4 || after_len.len() < count {
                return Err(malformed(format!("unsupported length of {count} octets")));
            }
            let len = after_len[..count]
                .iter()
                .fold(0usize, |acc, b| (acc << 8) | *b as usize);
            (len, count)
        };

        let header_len = 2 + len_octets;
        let total = header_len
            .checked_add(len)
            .filter(|total| *total <= input.len())
            .ok_or_else(|| {
                malformed(format!(
                    "element of {len} bytes overruns {} available",
                    input.len().saturating_sub(header_len)
                ))
            })?;

        let element = Tlv {
            tag,
            value: &input[header_len..total],
            raw: &input[..total],
        };
        Ok((element, &input[total..]))
    }

    /// Decode the first element and require `tag`.
    pub fn expect(input: &'a [u8], tag: u8, what: &str) -> SigningResult<(Tlv<'a>, &'a [u8])> {
        let (element, rest) = Self::parse(input)?;
        if element.tag != tag {
            return Err(malformed(format!(
                "{what}: expected tag 0x{tag:02x}, found 0x{:02x}",
                element.tag
            )));
        }
        Ok((element, rest))
    }

    /// Iterate over the elements nested in a constructed value.
    #[must_use]
    pub fn children(&self) -> TlvIter<'a> {
        TlvIter { rest: self.value }
    }

    /// All nested elements, failing on the first malformed one.
    pub fn child_vec(&self) -> SigningResult<Vec<Tlv<'a>>> {
        self.children().collect()
    }
}

/// Iterator over consecutive DER elements.
pub struct TlvIter<'a> {
    rest: &'a [u8],
}

impl<'a> Iterator for TlvIter<'a> {
    type Item = SigningResult<Tlv<'a>>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.rest.is_empty() {
            return None;
        }
        match Tlv::parse(self.rest) {
            Ok((element, rest)) => {
                self.rest = rest;
                Some(Ok(element))
            }
            Err(e) => {
                self.rest = &[];
                Some(Err(e))
            }
        }
    }
}

fn malformed(message: impl Into<String>) -> SigningError {
    SigningError::MalformedPkcs7(message.into())
}
