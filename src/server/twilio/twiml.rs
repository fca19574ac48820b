//! TwiML call-control documents

const XML_DECLARATION: &str = r#"<?xml version="1.0" encoding="UTF-8"?>"#;

/// Message spoken when the call cannot be bridged to the voice agent
pub const CONNECT_ERROR_MESSAGE: &str = "Sorry, there was an error connecting.";

#[derive(Debug, Clone, PartialEq)]
enum Verb {
    DialSip { uri: String },
    DialNumber { number: String, caller_id: Option<String> },
    Say { text: String },
}

/// Builder for a `<Response>` document
#[derive(Debug, Clone, Default)]
pub struct VoiceResponse {
    verbs: Vec<Verb>,
}

impl VoiceResponse {
    pub fn new() -> Self {
        Self::default()
    }

    /// `<Dial><Sip>uri</Sip></Dial>`
    pub fn dial_sip(mut self, uri: impl Into<String>) -> Self {
        self.verbs.push(Verb::DialSip { uri: uri.into() });
        self
    }

    /// `<Dial callerId="..."><Number>number</Number></Dial>`
    pub fn dial_number(mut self, number: impl Into<String>, caller_id: Option<&str>) -> Self {
        self.verbs.push(Verb::DialNumber {
            number: number.into(),
            caller_id: caller_id.map(str::to_string),
        });
        self
    }

    pub fn say(mut self, text: impl Into<String>) -> Self {
        self.verbs.push(Verb::Say { text: text.into() });
        self
    }

    pub fn build(&self) -> String {
        let mut xml = String::from(XML_DECLARATION);
        xml.push_str("<Response>");

        for verb in &self.verbs {
            match verb {
                Verb::DialSip { uri } => {
                    xml.push_str(&format!("<Dial><Sip>{}</Sip></Dial>", escape_xml(uri)));
                }
                Verb::DialNumber { number, caller_id } => {
                    match caller_id {
                        Some(id) => xml.push_str(&format!(r#"<Dial callerId="{}">"#, escape_xml(id))),
                        None => xml.push_str("<Dial>"),
                    }
                    xml.push_str(&format!("<Number>{}</Number></Dial>", escape_xml(number)));
                }
                Verb::Say { text } => {
                    xml.push_str(&format!("<Say>{}</Say>", escape_xml(text)));
                }
            }
        }

        xml.push_str("</Response>");
        xml
    }

    /// Bridge the call's audio to a SIP endpoint
    pub fn bridge_to_sip(uri: &str) -> String {
        Self::new().dial_sip(uri).build()
    }

    /// Spoken apology for a call that could not be bridged
    pub fn connect_error() -> String {
        Self::new().say(CONNECT_ERROR_MESSAGE).build()
    }
}

fn escape_xml(s: &str) -> String {
    s.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
        .replace('\'', "&apos;")
}
