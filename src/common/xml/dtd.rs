//! Internal DTD subset support.
//!
//! Only the two declarations that change what the tree looks like are
//! understood: general `<!ENTITY>` declarations with a literal value (used
//! for entity substitution) and `<!ATTLIST>` default values (applied to
//! elements that omit the attribute). External subsets are never fetched.

use std::collections::HashMap;

/// Declarations collected from `<!DOCTYPE root [ ... ]>`.
#[derive(Debug, Default, Clone)]
pub(crate) struct InternalSubset {
    entities: HashMap<String, String>,
    /// element qname -> (attribute qname, default value)
    attribute_defaults: HashMap<String, Vec<(String, String)>>,
}

impl InternalSubset {
    /// Parse the content of a DOCTYPE declaration.
    ///
    /// Unknown or malformed declarations are skipped.
    pub(crate) fn parse(doctype: &str) -> Self {
        let mut subset = Self::default();
        let Some(open) = doctype.find('[') else {
            return subset;
        };
        let close = doctype.rfind(']').filter(|&c| c > open).unwrap_or(doctype.len());
        let mut cursor = Cursor::new(&doctype[open + 1..close]);

        while !cursor.at_end() {
            if cursor.eat("<!--") {
                cursor.skip_past("-->");
            } else if cursor.eat("<?") {
                cursor.skip_past("?>");
            } else if cursor.eat("<!ENTITY") {
                subset.parse_entity(&mut cursor);
            } else if cursor.eat("<!ATTLIST") {
                subset.parse_attlist(&mut cursor);
            } else if cursor.eat("<!") {
                cursor.skip_declaration();
            } else {
                cursor.bump();
            }
        }

        subset
    }

    /// Value of a general entity declared with a literal.
    pub(crate) fn entity(&self, name: &str) -> Option<&str> {
        self.entities.get(name).map(String::as_str)
    }

    /// Default attributes declared for an element, keyed by its qualified name.
    pub(crate) fn attribute_defaults(&self, element: &str) -> &[(String, String)] {
        self.attribute_defaults
            .get(element)
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }

    pub(crate) fn is_empty(&self) -> bool {
        self.entities.is_empty() && self.attribute_defaults.is_empty()
    }

    fn parse_entity(&mut self, cursor: &mut Cursor<'_>) {
        cursor.skip_ws();
        if cursor.eat("%") {
            // parameter entity
            cursor.skip_declaration();
            return;
        }
        let Some(name) = cursor.name() else {
            cursor.skip_declaration();
            return;
        };
        cursor.skip_ws();
        match cursor.quoted() {
            Some(value) => {
                // The first declaration of an entity is binding.
                self.entities
                    .entry(name.to_string())
                    .or_insert_with(|| value.to_string());
            },
            None => tracing::trace!(entity = name, "skipping external entity declaration"),
        }
        cursor.skip_declaration();
    }

    fn parse_attlist(&mut self, cursor: &mut Cursor<'_>) {
        cursor.skip_ws();
        let Some(element) = cursor.name() else {
            cursor.skip_declaration();
            return;
        };

        loop {
            cursor.skip_ws();
            if cursor.eat(">") || cursor.at_end() {
                return;
            }
            let Some(attribute) = cursor.name() else {
                cursor.skip_declaration();
                return;
            };

            // attribute type
            cursor.skip_ws();
            if cursor.eat("NOTATION") {
                cursor.skip_ws();
            }
            if cursor.peek() == Some('(') {
                cursor.skip_past(")");
            } else if cursor.name().is_none() {
                cursor.skip_declaration();
                return;
            }

            // default declaration
            cursor.skip_ws();
            let default = if cursor.eat("#REQUIRED") || cursor.eat("#IMPLIED") {
                None
            } else {
                if cursor.eat("#FIXED") {
                    cursor.skip_ws();
                }
                match cursor.quoted() {
                    Some(value) => Some(value),
                    None => {
                        cursor.skip_declaration();
                        return;
                    },
                }
            };

            if let Some(value) = default {
                let defaults = self.attribute_defaults.entry(element.to_string()).or_default();
                if !defaults.iter().any(|(name, _)| name == attribute) {
                    defaults.push((attribute.to_string(), value.to_string()));
                }
            }
        }
    }
}

/// Minimal character cursor over the internal subset.
struct Cursor<'a> {
    src: &'a str,
    pos: usize,
}

impl<'a> Cursor<'a> {
    fn new(src: &'a str) -> Self {
        Self { src, pos: 0 }
    }

    fn rest(&self) -> &'a str {
        &self.src[self.pos..]
    }

    fn at_end(&self) -> bool {
        self.pos >= self.src.len()
    }

    fn peek(&self) -> Option<char> {
        self.rest().chars().next()
    }

    fn bump(&mut self) {
        if let Some(c) = self.peek() {
            self.pos += c.len_utf8();
        }
    }

    fn eat(&mut self, token: &str) -> bool {
        if self.rest().starts_with(token) {
            self.pos += token.len();
            true
        } else {
            false
        }
    }

    fn skip_ws(&mut self) {
        let rest = self.rest();
        let trimmed = rest.trim_start_matches(|c: char| c.is_ascii_whitespace());
        self.pos += rest.len() - trimmed.len();
    }

    fn skip_past(&mut self, token: &str) {
        match self.rest().find(token) {
            Some(idx) => self.pos += idx + token.len(),
            None => self.pos = self.src.len(),
        }
    }

    /// Skip to the end of the current declaration, stepping over quoted literals.
    fn skip_declaration(&mut self) {
        while let Some(c) = self.peek() {
            match c {
                '>' => {
                    self.bump();
                    return;
                },
                '"' | '\'' => {
                    if self.quoted().is_none() {
                        self.bump();
                    }
                },
                _ => self.bump(),
            }
        }
    }

    fn name(&mut self) -> Option<&'a str> {
        let rest = self.rest();
        let len = rest
            .find(|c: char| c.is_ascii_whitespace() || matches!(c, '>' | '(' | '"' | '\''))
            .unwrap_or(rest.len());
        if len == 0 {
            return None;
        }
        self.pos += len;
        Some(&rest[..len])
    }

    fn quoted(&mut self) -> Option<&'a str> {
        let quote = self.peek().filter(|c| matches!(c, '"' | '\''))?;
        let rest = &self.rest()[1..];
        let end = rest.find(quote)?;
        self.pos += end + 2;
        Some(&rest[..end])
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_entities_and_defaults() {
        let subset = InternalSubset::parse(
            r#"container [
                <!-- a comment with <!ENTITY fake "no"> inside -->
                <!ENTITY opf "application/oebps-package+xml">
                <!ENTITY opf "ignored">
                <!ENTITY % param "skipped">
                <!ENTITY ext SYSTEM "http://example.com/ext.ent">
                <!ELEMENT rootfile EMPTY>
                <!ATTLIST rootfile
                    full-path CDATA #REQUIRED
                    media-type CDATA "application/oebps-package+xml"
                    kind (main|alt) 'main'
                    fixed CDATA #FIXED "yes">
            ]"#,
        );

        assert_eq!(subset.entity("opf"), Some("application/oebps-package+xml"));
        assert_eq!(subset.entity("fake"), None);
        assert_eq!(subset.entity("param"), None);
        assert_eq!(subset.entity("ext"), None);

        let defaults = subset.attribute_defaults("rootfile");
        assert_eq!(
            defaults,
            &[
                ("media-type".to_string(), "application/oebps-package+xml".to_string()),
                ("kind".to_string(), "main".to_string()),
                ("fixed".to_string(), "yes".to_string()),
            ]
        );
        assert!(subset.attribute_defaults("container").is_empty());
    }

    #[test]
    fn test_no_internal_subset() {
        let subset = InternalSubset::parse(r#"html PUBLIC "-//W3C//DTD XHTML 1.1//EN" "xhtml11.dtd""#);
        assert!(subset.is_empty());
    }

    #[test]
    fn test_truncated_declaration() {
        let subset = InternalSubset::parse(r#"a [ <!ENTITY x "unterminated ]"#);
        assert_eq!(subset.entity("x"), None);
    }
}
