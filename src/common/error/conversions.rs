//! Error conversion implementations.
//!
//! This module contains From trait implementations to convert from the
//! errors of the XML and ZIP crates to the unified Error type.

use super::types::Error;

impl From<quick_xml::Error> for Error {
    fn from(err: quick_xml::Error) -> Self {
        Error::Xml(err.to_string())
    }
}

impl From<quick_xml::events::attributes::AttrError> for Error {
    fn from(err: quick_xml::events::attributes::AttrError) -> Self {
        Error::Xml(err.to_string())
    }
}

impl From<quick_xml::escape::EscapeError> for Error {
    fn from(err: quick_xml::escape::EscapeError) -> Self {
        Error::Xml(err.to_string())
    }
}

impl From<zip::result::ZipError> for Error {
    fn from(err: zip::result::ZipError) -> Self {
        Error::Zip(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_zip_error_conversion() {
        let err: Error = zip::result::ZipError::FileNotFound.into();
        assert!(matches!(err, Error::Zip(_)));
    }

    #[test]
    fn test_fatal_messages_carry_path() {
        let err = Error::InvalidArchive {
            path: "/tmp/book.epub".to_string(),
        };
        assert_eq!(
            err.to_string(),
            "Path does not point to a recognised archive file: '/tmp/book.epub'"
        );

        let err = Error::MissingContainer {
            path: "/tmp/book.epub".to_string(),
        };
        assert_eq!(err.to_string(), "No container.xml in /tmp/book.epub");
    }
}
