//! Blustream ASCII control protocol
//!
//! Commands are plain ASCII terminated by CR LF. The matrix answers with
//! free-form text lines: acknowledgements for live changes and, in reply to
//! `STATUS`, a dump made of a few key/value lines followed by a system table,
//! an output table and an input table.
//!
//! ```text
//! FW Version: 1.10
//! MAC Address: 00:1A:2B:3C:4D:5E
//! Model: CMX88AB
//! Power   IR      Key     Beep    LCD
//! On      On      On      Off     On
//!
//! Output  FromIn  HDBTLink  OutputEn  OSP     Name
//! 01      01      Off       Yes       SNK     Lounge
//!
//! Input   Edid                  HDMICon   Name
//! 01      DEFAULT_1080P_2CH     On        AppleTV
//! ==================================================
//! ```
//!
//! Only the subset needed for power, routing and status is understood; other
//! lines are skipped. Names are the last column of a table and may contain
//! spaces.

use std::fmt;
use std::sync::OnceLock;

use regex::Regex;
use tracing::warn;

use crate::error::ProtocolError;

const LINE_ENDING: &[u8] = b"\r\n";

/// Longest unterminated line kept while waiting for its newline
pub const MAX_LINE_LEN: usize = 1024;

/// Matrix power as last reported
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum PowerState {
    On,
    Off,
    #[default]
    Unknown,
}

impl PowerState {
    /// Parse the power column of the system table or an acknowledgement
    pub fn parse(value: &str) -> Self {
        match value.to_ascii_uppercase().as_str() {
            "ON" => PowerState::On,
            "OFF" => PowerState::Off,
            _ => PowerState::Unknown,
        }
    }
}

impl fmt::Display for PowerState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PowerState::On => write!(f, "ON"),
            PowerState::Off => write!(f, "OFF"),
            PowerState::Unknown => write!(f, "UNKNOWN"),
        }
    }
}

/// Commands sent to the matrix
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MatrixCommand {
    PowerOn,
    PowerOff,
    /// Route `input` to `output`
    ChangeSource { output: u8, input: u8 },
    /// Request a full status dump
    Status,
}

impl MatrixCommand {
    /// Encode the command including the CR LF terminator
    pub fn encode(&self) -> Vec<u8> {
        let mut bytes = self.to_string().into_bytes();
        bytes.extend_from_slice(LINE_ENDING);
        bytes
    }
}

impl fmt::Display for MatrixCommand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MatrixCommand::PowerOn => write!(f, "PON"),
            MatrixCommand::PowerOff => write!(f, "POFF"),
            MatrixCommand::ChangeSource { output, input } => {
                write!(f, "OUT{:02}FR{:02}", output, input)
            }
            MatrixCommand::Status => write!(f, "STATUS"),
        }
    }
}

/// A decoded response line
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MatrixResponse {
    FirmwareVersion(String),
    MacAddress(String),
    Model(String),
    /// First row of the system table in a status dump
    SystemPower(PowerState),
    /// A row of the output table
    OutputRow { output: u8, input: u8, name: String },
    /// A row of the input table
    InputRow { input: u8, name: String },
    /// The input table ended, the status dump is complete
    StatusComplete,
    /// `[SUCCESS]Set output NN connect from input MM.`
    SourceChanged { output: u8, input: u8 },
    /// `[SUCCESS]Set system power ON|OFF.`
    PowerChanged(PowerState),
    /// `[ERROR]...`
    Error(String),
}

/// Which status table the parser is in
///
/// Tables carry the number of columns announced by their header.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Section {
    None,
    System,
    Outputs { columns: usize },
    Inputs { columns: usize },
}

fn source_ack_re() -> Option<&'static Regex> {
    static RE: OnceLock<Option<Regex>> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"(?i)^\[SUCCESS\]\s*Set output (\d+) connect from input (\d+)\.?$")
            .ok()
    })
    .as_ref()
}

fn power_ack_re() -> Option<&'static Regex> {
    static RE: OnceLock<Option<Regex>> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"(?i)^\[SUCCESS\]\s*Set system power (ON|OFF)\.?$")
            .ok()
    })
    .as_ref()
}

fn key_value_re() -> Option<&'static Regex> {
    static RE: OnceLock<Option<Regex>> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"(?i)^(FW Version|MAC Address|Model)\s*:\s*(\S.*)$")
            .ok()
    })
    .as_ref()
}

/// Incremental line parser for data read from the matrix
///
/// Bytes are pushed as they arrive; complete lines are decoded on demand.
/// The parser tracks which status table it is in so that table rows can be
/// told apart.
#[derive(Debug)]
pub struct ResponseParser {
    buffer: Vec<u8>,
    section: Section,
}

impl Default for ResponseParser {
    fn default() -> Self {
        Self::new()
    }
}

impl ResponseParser {
    pub fn new() -> Self {
        Self {
            buffer: Vec::with_capacity(1024),
            section: Section::None,
        }
    }

    /// Append raw bytes read from the connection
    ///
    /// An unterminated line growing past [`MAX_LINE_LEN`] is dropped.
    pub fn push_bytes(&mut self, data: &[u8]) {
        self.buffer.extend_from_slice(data);

        let complete = self
            .buffer
            .iter()
            .rposition(|&b| b == b'\n')
            .map_or(0, |pos| pos + 1);
        if self.buffer.len() - complete > MAX_LINE_LEN {
            warn!(
                "Dropping {} bytes of an overlong line",
                self.buffer.len() - complete
            );
            self.buffer.truncate(complete);
        }
    }

    /// Bytes buffered and not yet decoded
    pub fn buffered(&self) -> usize {
        self.buffer.len()
    }

    /// Decode the next meaningful response from the buffered lines
    ///
    /// Returns `None` once no complete line is left.
    pub fn next_response(&mut self) -> Option<Result<MatrixResponse, ProtocolError>> {
        while let Some(line) = self.next_line() {
            match self.parse_line(&line) {
                Ok(Some(response)) => return Some(Ok(response)),
                Ok(None) => continue,
                Err(e) => return Some(Err(e)),
            }
        }
        None
    }

    fn next_line(&mut self) -> Option<String> {
        let pos = self.buffer.iter().position(|&b| b == b'\n')?;
        let line: Vec<u8> = self.buffer.drain(..=pos).collect();
        Some(String::from_utf8_lossy(&line).trim_end().to_string())
    }

    /// Decode one line, `Ok(None)` for lines that carry nothing of interest
    pub fn parse_line(&mut self, line: &str) -> Result<Option<MatrixResponse>, ProtocolError> {
        let line = line.trim();

        if let Some(caps) = source_ack_re().and_then(|re| re.captures(line)) {
            return Ok(Some(MatrixResponse::SourceChanged {
                output: parse_id(&caps[1], "acknowledgement", line)?,
                input: parse_id(&caps[2], "acknowledgement", line)?,
            }));
        }
        if let Some(caps) = power_ack_re().and_then(|re| re.captures(line)) {
            return Ok(Some(MatrixResponse::PowerChanged(PowerState::parse(
                &caps[1],
            ))));
        }
        if let Some(message) = line.strip_prefix("[ERROR]") {
            return Ok(Some(MatrixResponse::Error(message.trim().to_string())));
        }
        if let Some(caps) = key_value_re().and_then(|re| re.captures(line)) {
            let value = caps[2].trim().to_string();
            let response = match caps[1].to_ascii_lowercase().as_str() {
                "fw version" => MatrixResponse::FirmwareVersion(value),
                "mac address" => MatrixResponse::MacAddress(value),
                _ => MatrixResponse::Model(value),
            };
            return Ok(Some(response));
        }

        if line.is_empty() || line.starts_with('=') {
            if matches!(self.section, Section::Inputs { .. }) {
                self.section = Section::None;
                return Ok(Some(MatrixResponse::StatusComplete));
            }
            return Ok(None);
        }

        if let Some(section) = table_header(line) {
            self.section = section;
            return Ok(None);
        }

        let tokens: Vec<&str> = line.split_whitespace().collect();
        match self.section {
            Section::None => Ok(None),
            Section::System => {
                self.section = Section::None;
                Ok(Some(MatrixResponse::SystemPower(PowerState::parse(
                    tokens[0],
                ))))
            }
            Section::Outputs { columns } => {
                let name = name_column(line, columns.max(3) - 1)
                    .ok_or_else(|| malformed("output", line))?;
                Ok(Some(MatrixResponse::OutputRow {
                    output: parse_id(tokens[0], "output", line)?,
                    input: parse_id(tokens[1], "output", line)?,
                    name: name.to_string(),
                }))
            }
            Section::Inputs { columns } => {
                let name = name_column(line, columns.max(2) - 1)
                    .ok_or_else(|| malformed("input", line))?;
                Ok(Some(MatrixResponse::InputRow {
                    input: parse_id(tokens[0], "input", line)?,
                    name: name.to_string(),
                }))
            }
        }
    }
}

fn table_header(line: &str) -> Option<Section> {
    let columns = line.split_whitespace().count();
    if line.starts_with("Power") {
        Some(Section::System)
    } else if line.starts_with("Output") && line.contains("FromIn") {
        Some(Section::Outputs { columns })
    } else if line.starts_with("Input") && line.contains("Edid") {
        Some(Section::Inputs { columns })
    } else {
        None
    }
}

/// The rest of a table row once `fixed` leading fields are skipped
fn name_column(line: &str, fixed: usize) -> Option<&str> {
    let mut rest = line.trim();
    for _ in 0..fixed {
        let end = rest.find(char::is_whitespace)?;
        rest = rest[end..].trim_start();
    }
    (!rest.is_empty()).then_some(rest)
}

fn parse_id(value: &str, section: &'static str, line: &str) -> Result<u8, ProtocolError> {
    value.parse::<u8>().map_err(|_| malformed(section, line))
}

fn malformed(section: &'static str, line: &str) -> ProtocolError {
    ProtocolError::MalformedRow {
        section,
        line: line.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const STATUS_DUMP: &str = "\
================================================================\r\n\
          Blustream CMX88AB Matrix Switch\r\n\
FW Version: 1.10\r\n\
MAC Address: 00:1A:2B:3C:4D:5E\r\n\
Model: CMX88AB\r\n\
Power   IR      Key     Beep    LCD\r\n\
On      On      On      Off     On\r\n\
\r\n\
Output  FromIn  HDBTLink  OutputEn  OSP     Name\r\n\
01      02      Off       Yes       SNK     Lounge\r\n\
02      01      Off       Yes       SNK     Kitchen\r\n\
\r\n\
Input   Edid                  HDMICon   Name\r\n\
01      DEFAULT_1080P_2CH     On        AppleTV\r\n\
02      DEFAULT_4K_2CH        Off       Sky\r\n\
================================================================\r\n";

    fn drain(parser: &mut ResponseParser) -> Vec<MatrixResponse> {
        let mut out = Vec::new();
        while let Some(response) = parser.next_response() {
            out.push(response.unwrap());
        }
        out
    }

    #[test]
    fn test_encode_commands() {
        assert_eq!(MatrixCommand::PowerOn.encode(), b"PON\r\n");
        assert_eq!(MatrixCommand::PowerOff.encode(), b"POFF\r\n");
        assert_eq!(MatrixCommand::Status.encode(), b"STATUS\r\n");
        assert_eq!(
            MatrixCommand::ChangeSource {
                output: 3,
                input: 12
            }
            .encode(),
            b"OUT03FR12\r\n"
        );
    }

    #[test]
    fn test_status_dump() {
        let mut parser = ResponseParser::new();
        parser.push_bytes(STATUS_DUMP.as_bytes());

        assert_eq!(
            drain(&mut parser),
            vec![
                MatrixResponse::FirmwareVersion("1.10".to_string()),
                MatrixResponse::MacAddress("00:1A:2B:3C:4D:5E".to_string()),
                MatrixResponse::Model("CMX88AB".to_string()),
                MatrixResponse::SystemPower(PowerState::On),
                MatrixResponse::OutputRow {
                    output: 1,
                    input: 2,
                    name: "Lounge".to_string()
                },
                MatrixResponse::OutputRow {
                    output: 2,
                    input: 1,
                    name: "Kitchen".to_string()
                },
                MatrixResponse::InputRow {
                    input: 1,
                    name: "AppleTV".to_string()
                },
                MatrixResponse::InputRow {
                    input: 2,
                    name: "Sky".to_string()
                },
                MatrixResponse::StatusComplete,
            ]
        );
    }

    #[test]
    fn test_partial_lines_wait_for_terminator() {
        let mut parser = ResponseParser::new();
        parser.push_bytes(b"[SUCCESS]Set output 02 conn");
        assert!(parser.next_response().is_none());

        parser.push_bytes(b"ect from input 05.\r\n");
        assert_eq!(
            parser.next_response().unwrap().unwrap(),
            MatrixResponse::SourceChanged {
                output: 2,
                input: 5
            }
        );
    }

    #[test]
    fn test_acknowledgements() {
        let mut parser = ResponseParser::new();
        parser.push_bytes(b"[SUCCESS]Set system power OFF.\r\n[ERROR]Invalid command.\r\n");
        assert_eq!(
            drain(&mut parser),
            vec![
                MatrixResponse::PowerChanged(PowerState::Off),
                MatrixResponse::Error("Invalid command.".to_string()),
            ]
        );
    }

    #[test]
    fn test_blank_line_outside_inputs_is_ignored() {
        let mut parser = ResponseParser::new();
        parser.push_bytes(b"\r\nOutput  FromIn  Name\r\n01  01  Lounge\r\n\r\n");
        assert_eq!(drain(&mut parser).len(), 1);
    }

    #[test]
    fn test_malformed_row() {
        let mut parser = ResponseParser::new();
        parser.push_bytes(b"Output  FromIn  Name\r\nxx  01  Lounge\r\n");
        let err = parser.next_response().unwrap().unwrap_err();
        assert!(matches!(
            err,
            ProtocolError::MalformedRow {
                section: "output",
                ..
            }
        ));
    }

    #[test]
    fn test_names_with_spaces() {
        let mut parser = ResponseParser::new();
        parser.push_bytes(
            b"Output  FromIn  HDBTLink  OutputEn  Name\r\n\
01      02      Off       Yes       Living Room\r\n\
\r\n\
Input   Edid                  HDMICon   Name\r\n\
01      DEFAULT_1080P_2CH     On        Apple TV\r\n\
02      DEFAULT_4K_2CH        Off       Sky TV\r\n\
\r\n",
        );

        assert_eq!(
            drain(&mut parser),
            vec![
                MatrixResponse::OutputRow {
                    output: 1,
                    input: 2,
                    name: "Living Room".to_string()
                },
                MatrixResponse::InputRow {
                    input: 1,
                    name: "Apple TV".to_string()
                },
                MatrixResponse::InputRow {
                    input: 2,
                    name: "Sky TV".to_string()
                },
                MatrixResponse::StatusComplete,
            ]
        );
    }

    #[test]
    fn test_row_missing_name_is_malformed() {
        let mut parser = ResponseParser::new();
        parser.push_bytes(b"Input   Edid   HDMICon   Name\r\n01  DEFAULT  On\r\n");
        let err = parser.next_response().unwrap().unwrap_err();
        assert!(matches!(
            err,
            ProtocolError::MalformedRow {
                section: "input",
                ..
            }
        ));
    }

    #[test]
    fn test_overlong_line_is_dropped() {
        let mut parser = ResponseParser::new();
        let chunk = vec![b'x'; 64 * 1024];
        for _ in 0..64 {
            parser.push_bytes(&chunk);
            assert!(parser.buffered() <= MAX_LINE_LEN);
        }
        assert!(parser.next_response().is_none());

        // complete lines ahead of the overlong one survive, and the parser recovers
        parser.push_bytes(b"\r\n[SUCCESS]Set system power ON.\r\n");
        parser.push_bytes(&chunk);
        assert_eq!(
            drain(&mut parser),
            vec![MatrixResponse::PowerChanged(PowerState::On)]
        );
        assert_eq!(parser.buffered(), 0);
    }

    #[test]
    fn test_power_state_parse() {
        assert_eq!(PowerState::parse("on"), PowerState::On);
        assert_eq!(PowerState::parse("Off"), PowerState::Off);
        assert_eq!(PowerState::parse("standby"), PowerState::Unknown);
    }
}
