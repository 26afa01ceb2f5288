//! Wire formats: JSON location payload and SMS alert text

use super::event::{AlertEvent, Location};
use crate::devices::modem::SMS_TEXT_CAPACITY;
use core::fmt::{self, Write};
use heapless::String;

/// JSON payload capacity
pub const PAYLOAD_CAPACITY: usize = 384;

/// Location text used when there is no fix
pub const NO_FIX_TEXT: &str = "GPS fix not available";

/// Fields of one location push
#[derive(Debug, Clone, Copy)]
pub struct PayloadFields<'a> {
    /// Device identifier
    pub device_id: &'a str,
    /// Reported position
    pub location: Location,
    /// Milliseconds since boot
    pub timestamp_ms: u32,
    /// Alert code, empty for routine pushes
    pub alert_type: &'a str,
    /// `+CSQ` rssi, `None` when unknown
    pub signal: Option<u8>,
    /// Bearer address
    pub local_ip: &'a str,
    /// Modem IMEI
    pub imei: &'a str,
}

/// Render the location payload
///
/// ```text
/// {"deviceId":"..","latitude":14.599500,"longitude":120.984200,"timestamp":"5000",
///  "alertType":"","signalStrength":18,"localIP":"10.64.12.7","imei":".."}
/// ```
///
/// An unknown signal is reported as `-1`.
///
/// # Errors
///
/// `fmt::Error` if the rendered payload exceeds [`PAYLOAD_CAPACITY`].
pub fn location_json(fields: &PayloadFields<'_>) -> Result<String<PAYLOAD_CAPACITY>, fmt::Error> {
    let mut out = String::new();
    out.push_str("{\"deviceId\":\"").map_err(|_| fmt::Error)?;
    write_escaped(&mut out, fields.device_id)?;
    write!(
        out,
        "\",\"latitude\":{:.6},\"longitude\":{:.6},\"timestamp\":\"{}\",\"alertType\":\"",
        fields.location.latitude, fields.location.longitude, fields.timestamp_ms
    )?;
    write_escaped(&mut out, fields.alert_type)?;
    let signal = fields.signal.map(i16::from).unwrap_or(-1);
    write!(out, "\",\"signalStrength\":{},\"localIP\":\"", signal)?;
    write_escaped(&mut out, fields.local_ip)?;
    out.push_str("\",\"imei\":\"").map_err(|_| fmt::Error)?;
    write_escaped(&mut out, fields.imei)?;
    out.push_str("\"}").map_err(|_| fmt::Error)?;
    Ok(out)
}

/// JSON string escaping for quotes, backslashes and control characters
fn write_escaped<W: Write>(out: &mut W, value: &str) -> fmt::Result {
    for ch in value.chars() {
        match ch {
            '"' => out.write_str("\\\"")?,
            '\\' => out.write_str("\\\\")?,
            '\n' => out.write_str("\\n")?,
            '\r' => out.write_str("\\r")?,
            '\t' => out.write_str("\\t")?,
            c if (c as u32) < 0x20 => write!(out, "\\u{:04x}", c as u32)?,
            c => out.write_char(c)?,
        }
    }
    Ok(())
}

/// SMS alert text
///
/// `<LABEL>[\n<message>]\nLocation: <lat,lon>\nTime: <s>s uptime`, truncated
/// to one SMS.
pub fn alert_sms_text(event: &AlertEvent) -> String<SMS_TEXT_CAPACITY> {
    let mut text = String::new();
    // Overflow only truncates the message
    let _ = text.push_str(event.kind.label());
    if !event.message.is_empty() {
        let _ = write!(text, "\n{}", event.message.as_str());
    }
    let _ = match &event.location {
        Some(location) => write!(text, "\nLocation: {}", location),
        None => write!(text, "\nLocation: {}", NO_FIX_TEXT),
    };
    let _ = write!(text, "\nTime: {}s uptime", event.timestamp_ms / 1000);
    text
}
