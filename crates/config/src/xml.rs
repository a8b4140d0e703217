//! XML-like configuration documents
//!
//! Module declarations live in small XML documents. This reader covers what
//! those documents use: an optional prolog, comments, `<!DOCTYPE>`, CDATA
//! sections, nested
//! elements, single- or double-quoted attributes and the five predefined
//! entities. Text content is skipped.

use nom::{
    branch::alt,
    bytes::complete::{is_not, tag, take_until, take_while1},
    character::complete::{char, multispace0, multispace1},
    combinator::{eof, map, recognize},
    error::ErrorKind,
    multi::{many0, many0_count},
    sequence::{delimited, preceded, separated_pair, tuple},
    IResult,
};
use otsrv_core::ServerError;

/// Read access to a configuration node
///
/// Attribute keys are matched exactly; callers decide how to treat values.
pub trait ConfigNode {
    /// Tag name
    fn name(&self) -> &str;

    /// Attribute value, if present
    fn attribute(&self, key: &str) -> Option<&str>;
}

/// One parsed element
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct XmlNode {
    name: String,
    attributes: Vec<(String, String)>,
    children: Vec<XmlNode>,
}

impl XmlNode {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            attributes: Vec::new(),
            children: Vec::new(),
        }
    }

    /// Builder-style attribute setter, mostly for tests
    pub fn with_attribute(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.attributes.push((key.into(), value.into()));
        self
    }

    pub fn with_child(mut self, child: XmlNode) -> Self {
        self.children.push(child);
        self
    }

    pub fn attributes(&self) -> impl Iterator<Item = (&str, &str)> {
        self.attributes.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    pub fn children(&self) -> &[XmlNode] {
        &self.children
    }
}

impl ConfigNode for XmlNode {
    fn name(&self) -> &str {
        &self.name
    }

    fn attribute(&self, key: &str) -> Option<&str> {
        self.attributes
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.as_str())
    }
}

/// Document parse failure
#[derive(Debug, thiserror::Error)]
pub enum XmlError {
    #[error("XML syntax error at line {line}, column {column}: unexpected input near `{near}`")]
    Syntax {
        line: usize,
        column: usize,
        near: String,
    },
}

impl XmlError {
    fn at(source: &str, remaining: &str) -> Self {
        let offset = source.len() - remaining.len();
        let consumed = &source[..offset];
        let line = consumed.matches('\n').count() + 1;
        let column = consumed.rfind('\n').map_or(offset, |nl| offset - nl - 1) + 1;
        let near = remaining.chars().take(16).collect();
        XmlError::Syntax { line, column, near }
    }
}

impl From<XmlError> for ServerError {
    fn from(err: XmlError) -> Self {
        ServerError::Config(err.to_string())
    }
}

/// Parse a whole document and return its root element
pub fn parse_document(source: &str) -> Result<XmlNode, XmlError> {
    match tuple((misc, element, misc, eof))(source) {
        Ok((_, (_, root, _, _))) => Ok(root),
        Err(nom::Err::Error(e)) | Err(nom::Err::Failure(e)) => Err(XmlError::at(source, e.input)),
        Err(nom::Err::Incomplete(_)) => Err(XmlError::at(source, "")),
    }
}

/// Decode an integer literal the way attribute values are written
///
/// Accepts an optional sign followed by decimal digits or a `0x` hex number.
pub fn parse_integer(value: &str) -> Option<i64> {
    let value = value.trim();
    let (negative, digits) = match value.as_bytes().first()? {
        b'-' => (true, &value[1..]),
        b'+' => (false, &value[1..]),
        _ => (false, value),
    };

    let (radix, body) = match digits.strip_prefix("0x").or_else(|| digits.strip_prefix("0X")) {
        Some(hex) => (16, hex),
        None => (10, digits),
    };
    if body.is_empty() || !body.chars().all(|c| c.is_digit(radix)) {
        return None;
    }
    let magnitude = i64::from_str_radix(body, radix).ok()?;

    Some(if negative { -magnitude } else { magnitude })
}

fn xml_name(input: &str) -> IResult<&str, &str> {
    take_while1(|c: char| c.is_alphanumeric() || matches!(c, '_' | '-' | ':' | '.'))(input)
}

fn quoted(input: &str) -> IResult<&str, &str> {
    alt((
        delimited(char('"'), take_until("\""), char('"')),
        delimited(char('\''), take_until("'"), char('\'')),
    ))(input)
}

fn attribute(input: &str) -> IResult<&str, (String, String)> {
    map(
        separated_pair(xml_name, tuple((multispace0, char('='), multispace0)), quoted),
        |(key, value)| (key.to_string(), unescape(value)),
    )(input)
}

fn comment(input: &str) -> IResult<&str, &str> {
    recognize(tuple((tag("<!--"), take_until("-->"), tag("-->"))))(input)
}

fn prolog(input: &str) -> IResult<&str, &str> {
    recognize(tuple((tag("<?"), take_until("?>"), tag("?>"))))(input)
}

fn cdata(input: &str) -> IResult<&str, &str> {
    recognize(tuple((tag("<![CDATA["), take_until("]]>"), tag("]]>"))))(input)
}

fn doctype(input: &str) -> IResult<&str, &str> {
    recognize(tuple((tag("<!"), take_until(">"), char('>'))))(input)
}

/// Anything between elements: whitespace, text, comments, declarations
fn misc(input: &str) -> IResult<&str, ()> {
    map(many0_count(alt((comment, cdata, prolog, doctype, is_not("<")))), |_| ())(input)
}

fn element(input: &str) -> IResult<&str, XmlNode> {
    let (input, _) = char('<')(input)?;
    let (input, name) = xml_name(input)?;
    let (input, attributes) = many0(preceded(multispace1, attribute))(input)?;
    let (input, _) = multispace0(input)?;

    let mut node = XmlNode::new(name);
    node.attributes = attributes;

    if let Ok((input, _)) = tag::<_, _, nom::error::Error<&str>>("/>")(input) {
        return Ok((input, node));
    }

    let (input, _) = char('>')(input)?;
    let (input, children) = many0(preceded(misc, element))(input)?;
    let (input, _) = misc(input)?;
    let (input, _) = tag("</")(input)?;
    let (rest, closing) = xml_name(input)?;
    if closing != name {
        return Err(nom::Err::Failure(nom::error::Error::new(input, ErrorKind::Tag)));
    }
    let (rest, _) = multispace0(rest)?;
    let (rest, _) = char('>')(rest)?;

    node.children = children;
    Ok((rest, node))
}

fn unescape(value: &str) -> String {
    if !value.contains('&') {
        return value.to_string();
    }

    value
        .replace("&lt;", "<")
        .replace("&gt;", ">")
        .replace("&quot;", "\"")
        .replace("&apos;", "'")
        .replace("&amp;", "&")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_module_document() {
        let source = r#"<?xml version="1.0" encoding="UTF-8"?>
<!-- recvbyte handlers -->
<modules>
    <module type="recvbyte" byte="10" delay="500" script="trade.lua"/>
    <module type='RecvByte' byte="0x1F">
        inline text is ignored
    </module>
</modules>
"#;
        let root = parse_document(source).unwrap();
        assert_eq!(root.name(), "modules");
        assert_eq!(root.children().len(), 2);

        let first = &root.children()[0];
        assert_eq!(first.name(), "module");
        assert_eq!(first.attribute("type"), Some("recvbyte"));
        assert_eq!(first.attribute("script"), Some("trade.lua"));
        assert_eq!(first.attribute("missing"), None);

        let second = &root.children()[1];
        assert_eq!(second.attribute("type"), Some("RecvByte"));
        assert_eq!(second.attribute("byte"), Some("0x1F"));
    }

    #[test]
    fn test_entities_unescaped() {
        let root = parse_document(r#"<a note="x &lt; y &amp;&amp; &quot;z&quot;"/>"#).unwrap();
        assert_eq!(root.attribute("note"), Some(r#"x < y && "z""#));
    }

    #[test]
    fn test_mismatched_close_reports_line() {
        let err = parse_document("<modules>\n  <module>\n  </modle>\n</modules>").unwrap_err();
        match err {
            XmlError::Syntax { line, .. } => assert_eq!(line, 3),
        }
    }

    #[test]
    fn test_trailing_garbage_rejected() {
        assert!(parse_document("<a/><b/>").is_err());
        assert!(parse_document("").is_err());
    }

    #[test]
    fn test_parse_integer() {
        assert_eq!(parse_integer("10"), Some(10));
        assert_eq!(parse_integer(" 0xFF "), Some(255));
        assert_eq!(parse_integer("-1"), Some(-1));
        assert_eq!(parse_integer("+7"), Some(7));
        assert_eq!(parse_integer("ten"), None);
        assert_eq!(parse_integer(""), None);
        assert_eq!(parse_integer("-"), None);
        assert_eq!(parse_integer("0x"), None);
        assert_eq!(parse_integer("0x-1"), None);
        assert_eq!(parse_integer("0x+1"), None);
        assert_eq!(parse_integer("--5"), None);
        assert_eq!(parse_integer("+-5"), None);
        assert_eq!(parse_integer("-0x10"), Some(-16));
    }

    #[test]
    fn test_cdata_with_angle_brackets() {
        let source = "<modules>\n  <![CDATA[ a > b && c < d ]]>\n  <module type=\"recvbyte\" byte=\"1\"/>\n</modules>";
        let root = parse_document(source).unwrap();
        assert_eq!(root.children().len(), 1);
        assert_eq!(root.children()[0].attribute("byte"), Some("1"));
    }

    #[test]
    fn test_document_matches_built_tree() {
        let root = parse_document(r#"<modules><module type="recvbyte" byte="2"/></modules>"#).unwrap();
        let expected = XmlNode::new("modules").with_child(
            XmlNode::new("module")
                .with_attribute("type", "recvbyte")
                .with_attribute("byte", "2"),
        );
        assert_eq!(root, expected);

        let attributes: Vec<_> = root.children()[0].attributes().collect();
        assert_eq!(attributes, vec![("type", "recvbyte"), ("byte", "2")]);
    }
}
