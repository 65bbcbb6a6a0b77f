//! Encryption metadata from `META-INF/encryption.xml`.
//!
//! Each `enc:EncryptedData` element names one protected member (the cipher
//! reference) and the algorithm protecting it. Font obfuscation is the only
//! "encryption" a reader can undo without a DRM system, so the helpers for
//! it live here too.

use crate::common::xml::{XPathEvaluator, attribute};
use crate::ocf::constants::{
    ALGORITHM_QUERY, CIPHER_REFERENCE_QUERY, COMPRESSION_QUERY, KEY_NAME_QUERY, RETRIEVAL_METHOD_QUERY,
};
use phf::{Map, phf_map};
use serde::{Deserialize, Serialize};
use sha1::{Digest, Sha1};
use std::borrow::Cow;
use sxd_document::dom::Element;

/// Bytes of an obfuscated font covered by the IDPF algorithm.
pub const IDPF_OBFUSCATED_LENGTH: usize = 1040;

/// Bytes of an obfuscated font covered by the Adobe algorithm.
pub const ADOBE_OBFUSCATED_LENGTH: usize = 1024;

/// Known values of `EncryptionMethod/@Algorithm`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum EncryptionAlgorithm {
    /// `http://www.idpf.org/2008/embedding`
    IdpfFontObfuscation,
    /// `http://ns.adobe.com/pdf/enc#RC`
    AdobeFontObfuscation,
    Aes128Cbc,
    Aes192Cbc,
    Aes256Cbc,
    /// Anything else; usually a DRM scheme.
    Unknown,
}

static ALGORITHMS: Map<&'static str, EncryptionAlgorithm> = phf_map! {
    "http://www.idpf.org/2008/embedding" => EncryptionAlgorithm::IdpfFontObfuscation,
    "http://ns.adobe.com/pdf/enc#RC" => EncryptionAlgorithm::AdobeFontObfuscation,
    "http://www.w3.org/2001/04/xmlenc#aes128-cbc" => EncryptionAlgorithm::Aes128Cbc,
    "http://www.w3.org/2001/04/xmlenc#aes192-cbc" => EncryptionAlgorithm::Aes192Cbc,
    "http://www.w3.org/2001/04/xmlenc#aes256-cbc" => EncryptionAlgorithm::Aes256Cbc,
};

impl EncryptionAlgorithm {
    /// Classify an algorithm URI.
    pub fn from_uri(uri: &str) -> Self {
        ALGORITHMS
            .get(uri.trim())
            .copied()
            .unwrap_or(EncryptionAlgorithm::Unknown)
    }

    /// Whether the algorithm is one of the font obfuscation schemes.
    pub fn is_font_obfuscation(self) -> bool {
        matches!(self, Self::IdpfFontObfuscation | Self::AdobeFontObfuscation)
    }

    /// Number of leading bytes the obfuscation covers, `None` for real ciphers.
    pub fn obfuscation_key_length(self) -> Option<usize> {
        match self {
            Self::IdpfFontObfuscation => Some(IDPF_OBFUSCATED_LENGTH),
            Self::AdobeFontObfuscation => Some(ADOBE_OBFUSCATED_LENGTH),
            _ => None,
        }
    }
}

/// Compression applied before encryption (`Compression` property).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Compression {
    /// 0 for stored, 8 for deflate.
    pub method: u32,
    /// Size of the member before compression, when declared.
    pub original_length: Option<u64>,
}

/// One `EncryptedData` declaration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EncryptionInfo {
    path: String,
    algorithm: String,
    key_name: Option<String>,
    retrieval_method: Option<String>,
    compression: Option<Compression>,
}

impl EncryptionInfo {
    /// Create a record for the member at `path` protected by `algorithm`.
    pub fn new(path: impl Into<String>, algorithm: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            algorithm: algorithm.into(),
            key_name: None,
            retrieval_method: None,
            compression: None,
        }
    }

    /// Read a record from an `enc:EncryptedData` element.
    ///
    /// A missing algorithm or cipher reference leaves that field empty.
    /// `xpath` must bind the `enc` and `ds` prefixes.
    pub fn from_node<'d>(xpath: &XPathEvaluator<'d>, node: Element<'d>) -> Self {
        let algorithm = first_value(xpath.strings_from(node, ALGORITHM_QUERY)).unwrap_or_default();
        let path = first_value(xpath.strings_from(node, CIPHER_REFERENCE_QUERY))
            .map(|uri| decode_uri(&uri))
            .unwrap_or_default();
        if algorithm.is_empty() || path.is_empty() {
            tracing::debug!(path = %path, algorithm = %algorithm, "incomplete EncryptedData");
        }

        let mut info = Self::new(path, algorithm);
        info.key_name = first_value(xpath.strings_from(node, KEY_NAME_QUERY))
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty());
        info.retrieval_method = first_value(xpath.strings_from(node, RETRIEVAL_METHOD_QUERY)).filter(|s| !s.is_empty());
        info.compression = xpath
            .elements_from(node, COMPRESSION_QUERY)
            .into_iter()
            .find(|e| e.name().local_part() == "Compression")
            .and_then(|e| {
                let method = attribute(e, "Method")?.trim().parse().ok()?;
                let original_length = attribute(e, "OriginalLength").and_then(|v| v.trim().parse().ok());
                Some(Compression {
                    method,
                    original_length,
                })
            });
        info
    }

    /// Archive-relative path of the protected member; empty when the
    /// declaration has no cipher reference.
    pub fn path(&self) -> &str {
        &self.path
    }

    /// Algorithm URI exactly as declared; empty when absent.
    pub fn algorithm(&self) -> &str {
        &self.algorithm
    }

    pub fn algorithm_kind(&self) -> EncryptionAlgorithm {
        EncryptionAlgorithm::from_uri(&self.algorithm)
    }

    /// `ds:KeyInfo/ds:KeyName`, if any.
    pub fn key_name(&self) -> Option<&str> {
        self.key_name.as_deref()
    }

    /// `ds:KeyInfo/ds:RetrievalMethod/@URI`, if any.
    pub fn retrieval_method(&self) -> Option<&str> {
        self.retrieval_method.as_deref()
    }

    pub fn compression(&self) -> Option<Compression> {
        self.compression
    }

    pub fn is_font_obfuscation(&self) -> bool {
        self.algorithm_kind().is_font_obfuscation()
    }

    pub fn obfuscation_key_length(&self) -> Option<usize> {
        self.algorithm_kind().obfuscation_key_length()
    }

    /// Undo font obfuscation in place.
    ///
    /// XORs the leading bytes of `data` with `key`, repeating the key. Returns
    /// `false`, leaving `data` untouched, when the record is not a font
    /// obfuscation or the key is empty. Applying it twice restores the input.
    pub fn deobfuscate(&self, data: &mut [u8], key: &ObfuscationKey) -> bool {
        let Some(length) = self.obfuscation_key_length() else {
            return false;
        };
        let key = key.as_bytes();
        if key.is_empty() {
            return false;
        }
        for (byte, k) in data.iter_mut().take(length).zip(key.iter().cycle()) {
            *byte ^= k;
        }
        true
    }
}

/// Key for undoing font obfuscation, derived from the package's unique identifier.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ObfuscationKey(Vec<u8>);

impl ObfuscationKey {
    /// IDPF key: SHA-1 of the identifier with XML whitespace removed.
    pub fn idpf(identifier: &str) -> Self {
        let mut sha = Sha1::new();
        for part in identifier.split([' ', '\t', '\r', '\n']) {
            sha.update(part.as_bytes());
        }
        Self(sha.finalize().to_vec())
    }

    /// Adobe key: the 16 bytes of a `urn:uuid:` identifier.
    ///
    /// Returns `None` when the identifier does not carry a UUID.
    pub fn adobe(identifier: &str) -> Option<Self> {
        let id = identifier.trim();
        let uuid = id
            .get(..9)
            .filter(|p| p.eq_ignore_ascii_case("urn:uuid:"))
            .map_or(id, |_| &id[9..]);

        let hex: Vec<u8> = uuid.bytes().filter(|&b| b != b'-').collect();
        if hex.len() != 32 {
            return None;
        }
        hex.chunks(2)
            .map(|pair| {
                let pair = std::str::from_utf8(pair).ok()?;
                u8::from_str_radix(pair, 16).ok()
            })
            .collect::<Option<Vec<u8>>>()
            .map(Self)
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }
}

impl From<Vec<u8>> for ObfuscationKey {
    fn from(bytes: Vec<u8>) -> Self {
        Self(bytes)
    }
}

fn first_value(values: Vec<String>) -> Option<String> {
    values.into_iter().next()
}

/// Cipher references are URIs; members are looked up by decoded path.
fn decode_uri(uri: &str) -> String {
    match urlencoding::decode(uri.trim()) {
        Ok(Cow::Borrowed(s)) => s.to_string(),
        Ok(Cow::Owned(s)) => s,
        Err(_) => uri.trim().to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::common::xml::{ParseFlags, XmlDocument};
    use crate::ocf::constants::{ENCRYPTED_DATA_QUERY, encryption_bindings};

    const ENCRYPTION_XML: &str = r##"<?xml version="1.0"?>
<encryption xmlns="urn:oasis:names:tc:opendocument:xmlns:container"
            xmlns:enc="http://www.w3.org/2001/04/xmlenc#"
            xmlns:ds="http://www.w3.org/2000/09/xmldsig#">
  <enc:EncryptedData>
    <enc:EncryptionMethod Algorithm="http://www.idpf.org/2008/embedding"/>
    <enc:CipherData><enc:CipherReference URI="OEBPS/fonts/My%20Font.otf"/></enc:CipherData>
  </enc:EncryptedData>
  <enc:EncryptedData>
    <enc:EncryptionMethod Algorithm="http://www.w3.org/2001/04/xmlenc#aes128-cbc"/>
    <ds:KeyInfo>
      <ds:KeyName> book-key </ds:KeyName>
      <ds:RetrievalMethod URI="#EK"/>
    </ds:KeyInfo>
    <enc:CipherData><enc:CipherReference URI="OEBPS/chapter1.xhtml"/></enc:CipherData>
    <enc:EncryptionProperties>
      <enc:EncryptionProperty>
        <Compression xmlns="http://www.idpf.org/2016/encryption#compression" Method="8" OriginalLength="4096"/>
      </enc:EncryptionProperty>
    </enc:EncryptionProperties>
  </enc:EncryptedData>
  <enc:EncryptedData>
    <enc:CipherData><enc:CipherReference URI="no-algorithm.xhtml"/></enc:CipherData>
  </enc:EncryptedData>
  <enc:EncryptedData>
    <enc:EncryptionMethod Algorithm="http://example.com/drm"/>
  </enc:EncryptedData>
</encryption>"##;

    fn records() -> Vec<EncryptionInfo> {
        let doc = XmlDocument::parse_str(ENCRYPTION_XML, ParseFlags::TOLERANT).unwrap();
        let ns = encryption_bindings();
        doc.with_document(|d| {
            let xpath = XPathEvaluator::new(d, &ns);
            xpath
                .elements(ENCRYPTED_DATA_QUERY)
                .into_iter()
                .map(|node| EncryptionInfo::from_node(&xpath, node))
                .collect()
        })
    }

    #[test]
    fn test_from_node() {
        let records = records();
        assert_eq!(records.len(), 4);

        let font = &records[0];
        assert_eq!(font.path(), "OEBPS/fonts/My Font.otf");
        assert_eq!(font.algorithm(), "http://www.idpf.org/2008/embedding");
        assert_eq!(font.algorithm_kind(), EncryptionAlgorithm::IdpfFontObfuscation);
        assert!(font.is_font_obfuscation());
        assert_eq!(font.key_name(), None);
        assert_eq!(font.compression(), None);

        let chapter = &records[1];
        assert_eq!(chapter.path(), "OEBPS/chapter1.xhtml");
        assert_eq!(chapter.algorithm_kind(), EncryptionAlgorithm::Aes128Cbc);
        assert_eq!(chapter.key_name(), Some("book-key"));
        assert_eq!(chapter.retrieval_method(), Some("#EK"));
        assert_eq!(
            chapter.compression(),
            Some(Compression {
                method: 8,
                original_length: Some(4096)
            })
        );
        assert_eq!(chapter.obfuscation_key_length(), None);

        // incomplete declarations still produce a record
        assert_eq!(records[2].path(), "no-algorithm.xhtml");
        assert_eq!(records[2].algorithm(), "");
        assert_eq!(records[2].algorithm_kind(), EncryptionAlgorithm::Unknown);
        assert_eq!(records[3].path(), "");
        assert_eq!(records[3].algorithm(), "http://example.com/drm");
        assert!(!records[3].is_font_obfuscation());
    }

    #[test]
    fn test_algorithm_classification() {
        assert_eq!(
            EncryptionAlgorithm::from_uri("http://ns.adobe.com/pdf/enc#RC"),
            EncryptionAlgorithm::AdobeFontObfuscation
        );
        assert_eq!(
            EncryptionAlgorithm::from_uri("http://www.w3.org/2001/04/xmlenc#aes256-cbc"),
            EncryptionAlgorithm::Aes256Cbc
        );
        assert_eq!(EncryptionAlgorithm::from_uri("urn:other"), EncryptionAlgorithm::Unknown);
        assert_eq!(
            EncryptionAlgorithm::AdobeFontObfuscation.obfuscation_key_length(),
            Some(ADOBE_OBFUSCATED_LENGTH)
        );
    }

    #[test]
    fn test_idpf_key_ignores_whitespace() {
        let key = ObfuscationKey::idpf(" urn:uuid:1234\n");
        assert_eq!(key.as_bytes().len(), 20);
        assert_eq!(key, ObfuscationKey::idpf("urn:uuid:1234"));
        assert_ne!(key, ObfuscationKey::idpf("urn:uuid:1235"));
    }

    #[test]
    fn test_adobe_key() {
        let key = ObfuscationKey::adobe("urn:uuid:0102030a-0b0c-0d0e-0f10-111213141516").unwrap();
        assert_eq!(
            key.as_bytes(),
            &[1, 2, 3, 10, 11, 12, 13, 14, 15, 16, 17, 18, 19, 20, 21, 22]
        );
        assert!(ObfuscationKey::adobe("isbn:9780000000000").is_none());
        assert!(ObfuscationKey::adobe("urn:uuid:zz02030a-0b0c-0d0e-0f10-111213141516").is_none());
    }

    #[test]
    fn test_deobfuscate_is_an_involution() {
        let info = EncryptionInfo::new("font.otf", "http://www.idpf.org/2008/embedding");
        let key = ObfuscationKey::idpf("urn:uuid:book");
        let original: Vec<u8> = (0..2000u32).map(|i| (i % 251) as u8).collect();

        let mut data = original.clone();
        assert!(info.deobfuscate(&mut data, &key));
        assert_ne!(data[..IDPF_OBFUSCATED_LENGTH], original[..IDPF_OBFUSCATED_LENGTH]);
        assert_eq!(data[IDPF_OBFUSCATED_LENGTH..], original[IDPF_OBFUSCATED_LENGTH..]);

        assert!(info.deobfuscate(&mut data, &key));
        assert_eq!(data, original);
    }

    #[test]
    fn test_deobfuscate_rejects_real_ciphers() {
        let info = EncryptionInfo::new("a.xhtml", "http://www.w3.org/2001/04/xmlenc#aes128-cbc");
        let mut data = vec![1, 2, 3];
        assert!(!info.deobfuscate(&mut data, &ObfuscationKey::from(vec![0xFF])));
        assert_eq!(data, [1, 2, 3]);

        let font = EncryptionInfo::new("f.otf", "http://ns.adobe.com/pdf/enc#RC");
        assert!(!font.deobfuscate(&mut data, &ObfuscationKey::from(Vec::new())));
    }
}
