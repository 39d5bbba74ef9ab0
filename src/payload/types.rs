use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use serde_json::json;
use crate::errors::WafsmithError;

/// Query key, JSON field and XML element that carry the payload.
pub const PAYLOAD_FIELD: &str = "payload";
pub const DEFAULT_HEADER_NAME: &str = "x-payload";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "UPPERCASE")]
pub enum HttpMethod {
    #[default]
    Get,
    Post,
    Put,
    Delete,
}

impl HttpMethod {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Get => "GET",
            Self::Post => "POST",
            Self::Put => "PUT",
            Self::Delete => "DELETE",
        }
    }

    pub fn to_reqwest(self) -> reqwest::Method {
        match self {
            Self::Get => reqwest::Method::GET,
            Self::Post => reqwest::Method::POST,
            Self::Put => reqwest::Method::PUT,
            Self::Delete => reqwest::Method::DELETE,
        }
    }
}

impl fmt::Display for HttpMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for HttpMethod {
    type Err = WafsmithError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_uppercase().as_str() {
            "GET" => Ok(Self::Get),
            "POST" => Ok(Self::Post),
            "PUT" => Ok(Self::Put),
            "DELETE" => Ok(Self::Delete),
            other => Err(WafsmithError::Config(format!("Unsupported HTTP method: {}", other))),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum BodyEncoding {
    #[default]
    Form,
    Json,
    Xml,
}

impl BodyEncoding {
    pub fn content_type(&self) -> &'static str {
        match self {
            Self::Form => "application/x-www-form-urlencoded",
            Self::Json => "application/json",
            Self::Xml => "application/xml",
        }
    }

    /// Request body bytes for `raw`. Form bodies carry the payload verbatim.
    pub fn encode(&self, raw: &str) -> Vec<u8> {
        match self {
            Self::Form => raw.as_bytes().to_vec(),
            Self::Json => json!({ "payload": raw }).to_string().into_bytes(),
            Self::Xml => format!("<{0}>{1}</{0}>", PAYLOAD_FIELD, escape_xml(raw)).into_bytes(),
        }
    }
}

impl FromStr for BodyEncoding {
    type Err = WafsmithError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "form" | "form-urlencoded" | "form_urlencoded" => Ok(Self::Form),
            "json" => Ok(Self::Json),
            "xml" => Ok(Self::Xml),
            other => Err(WafsmithError::Config(format!("Unsupported body encoding: {}", other))),
        }
    }
}

fn escape_xml(raw: &str) -> String {
    let mut escaped = String::with_capacity(raw.len());
    for c in raw.chars() {
        match c {
            '&' => escaped.push_str("&amp;"),
            '<' => escaped.push_str("&lt;"),
            '>' => escaped.push_str("&gt;"),
            '"' => escaped.push_str("&quot;"),
            '\'' => escaped.push_str("&apos;"),
            _ => escaped.push(c),
        }
    }
    escaped
}

/// Where in the HTTP request the payload travels.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum Position {
    #[default]
    UrlParameters,
    Header { name: String },
    Body(BodyEncoding),
}

impl Position {
    /// Build a position from its CLI/config name. Unknown names are rejected
    /// rather than silently treated as URL parameters.
    pub fn parse(kind: &str, encoding: BodyEncoding, header_name: &str) -> Result<Self, WafsmithError> {
        match kind.to_ascii_lowercase().replace('-', "_").as_str() {
            "url_parameters" | "url_parameter" | "query" => Ok(Self::UrlParameters),
            "http_header" | "http_headers" | "header" => Ok(Self::Header {
                name: header_name.to_string(),
            }),
            "http_body" | "body" => Ok(Self::Body(encoding)),
            other => Err(WafsmithError::Config(format!("Unknown payload position: {}", other))),
        }
    }

    /// Name used when describing the position to the rule synthesizer.
    pub fn label(&self) -> &'static str {
        match self {
            Self::UrlParameters => "URL_PARAMETERS",
            Self::Header { .. } => "HTTP_HEADER",
            Self::Body(_) => "HTTP_BODY",
        }
    }
}

impl fmt::Display for Position {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// The endpoint every payload of a run is sent to, and how.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProbeTarget {
    pub endpoint: String,
    pub method: HttpMethod,
    pub position: Position,
}

impl ProbeTarget {
    pub fn new(endpoint: &str, method: HttpMethod, position: Position) -> Self {
        Self {
            endpoint: endpoint.to_string(),
            method,
            position,
        }
    }
}

/// One attack or business-traffic string bound to its transport settings.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Payload {
    pub method: HttpMethod,
    pub endpoint: String,
    pub raw: String,
    pub position: Position,
}

impl Payload {
    pub fn new(target: &ProbeTarget, raw: &str) -> Self {
        Self {
            method: target.method,
            endpoint: target.endpoint.clone(),
            raw: raw.to_string(),
            position: target.position.clone(),
        }
    }
}

impl fmt::Display for Payload {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {} {}", self.method, self.endpoint, self.raw)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_position_parse_accepts_both_separators() {
        let enc = BodyEncoding::Form;
        assert_eq!(Position::parse("url_parameters", enc, "x").unwrap(), Position::UrlParameters);
        assert_eq!(Position::parse("url-parameters", enc, "x").unwrap(), Position::UrlParameters);
        assert_eq!(
            Position::parse("http-headers", enc, "x-attack").unwrap(),
            Position::Header { name: "x-attack".into() }
        );
        assert_eq!(
            Position::parse("http_body", BodyEncoding::Json, "x").unwrap(),
            Position::Body(BodyEncoding::Json)
        );
    }

    #[test]
    fn test_position_parse_rejects_unknown() {
        let err = Position::parse("cookie", BodyEncoding::Form, "x").unwrap_err();
        assert!(matches!(err, WafsmithError::Config(_)));
    }

    #[test]
    fn test_body_encoding_content_types() {
        assert_eq!(BodyEncoding::Form.content_type(), "application/x-www-form-urlencoded");
        assert_eq!(BodyEncoding::Json.content_type(), "application/json");
        assert_eq!(BodyEncoding::Xml.content_type(), "application/xml");
    }

    #[test]
    fn test_form_body_is_raw() {
        assert_eq!(BodyEncoding::Form.encode("a=1&b=' OR 1=1"), b"a=1&b=' OR 1=1".to_vec());
    }

    #[test]
    fn test_json_body_wraps_payload() {
        let body = BodyEncoding::Json.encode("<script>\"x\"</script>");
        let parsed: serde_json::Value = serde_json::from_slice(&body).unwrap();
        assert_eq!(parsed["payload"], "<script>\"x\"</script>");
    }

    #[test]
    fn test_xml_body_escapes_markup() {
        let body = String::from_utf8(BodyEncoding::Xml.encode("<a href='x'>&</a>")).unwrap();
        assert_eq!(body, "<payload>&lt;a href=&apos;x&apos;&gt;&amp;&lt;/a&gt;</payload>");
    }

    #[test]
    fn test_method_parse_case_insensitive() {
        assert_eq!("post".parse::<HttpMethod>().unwrap(), HttpMethod::Post);
        assert!("PATCH".parse::<HttpMethod>().is_err());
    }

    #[test]
    fn test_payload_display() {
        let target = ProbeTarget::new("http://localhost:3000", HttpMethod::Get, Position::UrlParameters);
        let payload = Payload::new(&target, "../../etc/passwd");
        assert_eq!(payload.to_string(), "GET http://localhost:3000 ../../etc/passwd");
    }
}
