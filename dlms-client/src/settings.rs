//! Command line settings of the meter reader

use crate::config::SessionConfig;
use crate::protocol::{Authentication, InterfaceType};
use crate::trace::TraceLevel;
use clap::{ArgAction, Parser};
use dlms_core::{DlmsError, DlmsResult, ObisCode};
use dlms_transport::{
    AnyMedia, DataBits, LineSettings, Parity, SerialMedia, SerialSettings, StopBits, TcpMedia,
    TcpSettings,
};
use std::fmt;
use std::str::FromStr;

/// How COSEM attributes are addressed
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Referencing {
    #[default]
    LogicalName,
    ShortName,
}

impl FromStr for Referencing {
    type Err = DlmsError;

    fn from_str(s: &str) -> DlmsResult<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "ln" => Ok(Referencing::LogicalName),
            "sn" => Ok(Referencing::ShortName),
            other => Err(DlmsError::InvalidData(format!(
                "Invalid reference option '{}'. (sn, ln)",
                other
            ))),
        }
    }
}

impl fmt::Display for Referencing {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Referencing::LogicalName => f.write_str("ln"),
            Referencing::ShortName => f.write_str("sn"),
        }
    }
}

/// Raw command line of the reader
#[derive(Debug, Clone, Parser)]
#[command(
    name = "dlms-reader",
    about = "Read a DLMS/COSEM meter over TCP or a serial port",
    disable_help_flag = true
)]
/// Command line of the meter reader
pub struct ReaderArgs {
    /// Host name or IP address of the meter
    #[arg(short = 'h', long)]
    pub host: Option<String>,

    #[arg(short = 'p', long, default_value_t = dlms_transport::DEFAULT_TCP_PORT)]
    pub port: u16,

    /// Serial port, optionally with line settings: COM1 or COM1:9600:8None1
    #[arg(short = 'S', long = "serial")]
    pub serial: Option<String>,

    /// Start with the IEC 62056-21 sign-on
    #[arg(short = 'i', long)]
    pub iec: bool,

    /// None, Low, High, HighMd5, HighSha1, HighGmac, HighSha256
    #[arg(short = 'a', long, default_value = "None")]
    pub authentication: Authentication,

    #[arg(short = 'P', long)]
    pub password: Option<String>,

    #[arg(short = 'c', long, default_value_t = 16)]
    pub client: u16,

    #[arg(short = 's', long, default_value_t = 1)]
    pub server: u32,

    /// ln or sn
    #[arg(short = 'r', long, default_value = "ln")]
    pub referencing: Referencing,

    /// Use the wrapper instead of HDLC framing
    #[arg(short = 'w', long)]
    pub wrapper: bool,

    /// Off, Error, Warning, Info, Verbose
    #[arg(short = 't', long, default_value = "Info")]
    pub trace: TraceLevel,

    /// Attributes to read: "0.0.1.0.0.255:1; 0.0.1.0.0.255:2"
    #[arg(short = 'g', long = "get")]
    pub targets: Option<String>,

    #[arg(long, action = ArgAction::Help)]
    help: Option<bool>,
}

/// Settings a protocol client is built from
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClientSettings {
    pub interface_type: InterfaceType,
    pub authentication: Authentication,
    pub password: Option<String>,
    pub client_address: u16,
    pub server_address: u32,
    pub referencing: Referencing,
}

impl Default for ClientSettings {
    fn default() -> Self {
        Self {
            interface_type: InterfaceType::Hdlc,
            authentication: Authentication::None,
            password: None,
            client_address: 16,
            server_address: 1,
            referencing: Referencing::LogicalName,
        }
    }
}

/// Where the meter is reached
#[derive(Debug, Clone, PartialEq)]
pub enum MediaSettings {
    Tcp { host: String, port: u16 },
    /// `line` is `None` when the command line gave only the port name
    Serial { port: String, line: Option<LineSettings> },
}

/// Validated reader settings
#[derive(Debug, Clone, PartialEq)]
pub struct ReaderSettings {
    pub client: ClientSettings,
    pub media: MediaSettings,
    pub iec: bool,
    pub trace: TraceLevel,
    pub targets: Vec<(ObisCode, u8)>,
}

impl ReaderSettings {
    /// Validate parsed command line arguments
    ///
    /// # Errors
    ///
    /// `InvalidData` when neither a host nor a serial port is given, or a target is
    /// not `A.B.C.D.E.F:index`; `Unsupported` for mark or space parity
    pub fn from_args(args: ReaderArgs) -> DlmsResult<Self> {
        let media = match (args.serial, args.host) {
            (Some(serial), _) => {
                let (port, line) = parse_serial(&serial)?;
                MediaSettings::Serial { port, line }
            }
            (None, Some(host)) => MediaSettings::Tcp {
                host,
                port: args.port,
            },
            (None, None) => {
                return Err(DlmsError::InvalidData(
                    "Missing mandatory connection parameter: host or serial port".to_string(),
                ));
            }
        };
        let targets = match args.targets {
            Some(list) => parse_targets(&list)?,
            None => Vec::new(),
        };
        Ok(Self {
            client: ClientSettings {
                interface_type: if args.wrapper {
                    InterfaceType::Wrapper
                } else {
                    InterfaceType::Hdlc
                },
                authentication: args.authentication,
                password: args.password,
                client_address: args.client,
                server_address: args.server,
                referencing: args.referencing,
            },
            media,
            iec: args.iec,
            trace: args.trace,
            targets,
        })
    }

    /// Media for these settings
    ///
    /// A serial port without explicit line settings starts at 300 7E1 for
    /// the IEC sign-on and at 9600 8N1 otherwise.
    pub fn media(&self) -> AnyMedia {
        match &self.media {
            MediaSettings::Tcp { host, port } => {
                AnyMedia::Tcp(TcpMedia::new(TcpSettings::new(host.clone(), *port)))
            }
            MediaSettings::Serial { port, line } => {
                let line = line.unwrap_or_else(|| {
                    if self.iec {
                        LineSettings::iec_sign_on()
                    } else {
                        LineSettings::default()
                    }
                });
                AnyMedia::Serial(SerialMedia::new(SerialSettings::with_line(port.clone(), line)))
            }
        }
    }

    /// Session settings derived from the command line
    pub fn session_config(&self) -> SessionConfig {
        SessionConfig {
            iec: self.iec,
            trace: self.trace,
            ..SessionConfig::default()
        }
    }
}

/// Split `COM1:9600:8None1` into the port name and its line settings
pub fn parse_serial(value: &str) -> DlmsResult<(String, Option<LineSettings>)> {
    let mut parts = value.split(':');
    let port = parts.next().unwrap_or_default().trim().to_string();
    if port.is_empty() {
        return Err(DlmsError::InvalidData("Missing serial port name".to_string()));
    }
    let Some(baud) = parts.next() else {
        return Ok((port, None));
    };
    let baud_rate = baud
        .trim()
        .parse::<u32>()
        .map_err(|_| DlmsError::InvalidData(format!("Invalid baud rate '{}'", baud)))?;
    let mut line = LineSettings::eight_n_one(baud_rate);
    if let Some(format) = parts.next() {
        let format = format.trim();
        if format.len() < 3 || !format.is_ascii() {
            return Err(DlmsError::InvalidData(format!(
                "Invalid serial line format '{}'",
                format
            )));
        }
        line.data_bits = match &format[..1] {
            "5" => DataBits::Five,
            "6" => DataBits::Six,
            "7" => DataBits::Seven,
            "8" => DataBits::Eight,
            other => {
                return Err(DlmsError::InvalidData(format!("Invalid data bits '{}'", other)));
            }
        };
        line.parity = match format[1..format.len() - 1].to_ascii_lowercase().as_str() {
            "none" => Parity::None,
            "odd" => Parity::Odd,
            "even" => Parity::Even,
            other => {
                return Err(DlmsError::Unsupported(format!("Parity '{}'", other)));
            }
        };
        line.stop_bits = match &format[format.len() - 1..] {
            "1" => StopBits::One,
            "2" => StopBits::Two,
            other => {
                return Err(DlmsError::InvalidData(format!("Invalid stop bits '{}'", other)));
            }
        };
    }
    Ok((port, Some(line)))
}

/// Parse `ln:index` pairs separated by `;` or `,`
pub fn parse_targets(value: &str) -> DlmsResult<Vec<(ObisCode, u8)>> {
    value
        .split([';', ','])
        .map(str::trim)
        .filter(|item| !item.is_empty())
        .map(|item| {
            let (ln, index) = item.rsplit_once(':').ok_or_else(|| {
                DlmsError::InvalidData(format!(
                    "Invalid target '{}', expected logical name and attribute index",
                    item
                ))
            })?;
            let index = index.trim().parse::<u8>().map_err(|_| {
                DlmsError::InvalidData(format!("Invalid attribute index in '{}'", item))
            })?;
            Ok((ln.trim().parse::<ObisCode>()?, index))
        })
        .collect()
}
