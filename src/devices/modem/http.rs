//! HTTP client over the modem's `AT+HTTP*` service
//!
//! ```text
//! ensure bearer -> HTTPTERM (stale) -> HTTPINIT -> CID -> URL [-> USERDATA]
//!   [POST: CONTENT -> REDIR -> TIMEOUT -> HTTPDATA / DOWNLOAD / body / OK]
//!   -> HTTPACTION -> +HTTPACTION: <m>,<status>,<len> -> HTTPREAD -> HTTPTERM
//! ```
//!
//! Once the stale session has been terminated, `AT+HTTPTERM` is sent on every
//! exit path, so a failed request never leaves the HTTP service initialized.

use super::{AtStep, ModemError, ModemSession, ProtocolFault, Result};
use crate::core::parameters::bounded_string;
use crate::platform::traits::{TimerInterface, UartInterface};
use core::fmt::Write;
use heapless::String;

/// Response body capacity
pub const HTTP_BODY_CAPACITY: usize = 256;

/// Extra headers capacity (`USERDATA`)
pub const HTTP_USER_DATA_CAPACITY: usize = 96;

/// Timeout for the stale `AT+HTTPTERM`
const STALE_TERM_TIMEOUT_MS: u32 = 2_000;
/// Pause after the stale `AT+HTTPTERM`
const STALE_TERM_SETTLE_MS: u32 = 500;
/// Upload window announced in `AT+HTTPDATA`
const UPLOAD_WINDOW_MS: u32 = 10_000;

/// HTTP method, numbered as `AT+HTTPACTION` expects
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[repr(u8)]
pub enum HttpMethod {
    /// `AT+HTTPACTION=0`
    Get = 0,
    /// `AT+HTTPACTION=1`
    Post = 1,
}

/// Completed HTTP exchange
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HttpResponse {
    /// Status code from `+HTTPACTION:`
    pub status: u16,
    /// Body from `AT+HTTPREAD`, truncated to [`HTTP_BODY_CAPACITY`]
    pub body: String<HTTP_BODY_CAPACITY>,
}

impl<U: UartInterface, T: TimerInterface> ModemSession<U, T> {
    /// Perform an HTTP request through the bearer
    ///
    /// `body` is uploaded for [`HttpMethod::Post`] as `application/json`.
    ///
    /// # Errors
    ///
    /// - bearer errors from [`ensure_gprs_connection`](Self::ensure_gprs_connection)
    /// - [`ModemError::TransportTimeout`] when a step or the completion line
    ///   does not arrive
    /// - [`ProtocolFault::HttpStatus`] for a non-2xx status
    pub fn perform_http_request(
        &mut self,
        method: HttpMethod,
        url: &str,
        body: Option<&str>,
    ) -> Result<HttpResponse> {
        self.ensure_gprs_connection()?;

        let _ = self.send_at_command("AT+HTTPTERM", "OK", STALE_TERM_TIMEOUT_MS)?;
        self.timer.delay_ms(STALE_TERM_SETTLE_MS);

        let result = self.http_exchange(method, url, body);

        let timeout = self.config.http_command_timeout_ms;
        if let Err(e) = self.send_at_command("AT+HTTPTERM", "OK", timeout) {
            crate::log_warn!("Modem: HTTPTERM failed: {:?}", e);
        }

        match &result {
            Ok(response) => {
                self.state.last_activity_ms = self.timer.now_ms();
                crate::log_debug!("Modem: HTTP {} ({} bytes)", response.status, response.body.len());
            }
            Err(e) => crate::log_warn!("Modem: HTTP request failed: {:?}", e),
        }
        result
    }

    /// Extra request headers, applied to every following request
    ///
    /// Sent as `AT+HTTPPARA="USERDATA","<headers>"`; an empty string clears
    /// them.
    pub fn set_http_user_data(&mut self, headers: &str) {
        self.http_user_data = if headers.is_empty() {
            None
        } else {
            Some(bounded_string(headers))
        };
    }

    fn http_exchange(
        &mut self,
        method: HttpMethod,
        url: &str,
        body: Option<&str>,
    ) -> Result<HttpResponse> {
        let timeout = self.config.http_command_timeout_ms;

        let mut url_cmd: String<160> = String::new();
        write!(url_cmd, "AT+HTTPPARA=\"URL\",\"{}\"", url).map_err(|_| ModemError::CommandTooLong)?;

        self.run_script(&[
            AtStep::required("AT+HTTPINIT", timeout),
            AtStep::required("AT+HTTPPARA=\"CID\",1", timeout),
            AtStep::required(&url_cmd, timeout),
        ])?;

        if let Some(headers) = self.http_user_data.clone() {
            let mut cmd: String<128> = String::new();
            write!(cmd, "AT+HTTPPARA=\"USERDATA\",\"{}\"", headers.as_str())
                .map_err(|_| ModemError::CommandTooLong)?;
            self.command(&cmd, "OK", timeout)?;
        }

        if let (HttpMethod::Post, Some(body)) = (method, body) {
            self.upload_body(body)?;
        }

        let mut action: String<24> = String::new();
        let _ = write!(action, "AT+HTTPACTION={}", method as u8);
        self.command(&action, "OK", timeout)?;
        self.wait_for_line("+HTTPACTION:", self.config.http_action_timeout_ms)?
            .into_result()?;

        let status = parse_action_status(self.response())
            .ok_or(ModemError::Protocol(ProtocolFault::UnexpectedResponse))?;
        if !(200..300).contains(&status) {
            return Err(ModemError::Protocol(ProtocolFault::HttpStatus(status)));
        }

        self.command("AT+HTTPREAD", "OK", self.config.http_read_timeout_ms)?;
        let body = parse_read_body(self.response());
        Ok(HttpResponse { status, body })
    }

    fn upload_body(&mut self, body: &str) -> Result<()> {
        let timeout = self.config.http_command_timeout_ms;
        self.run_script(&[
            AtStep::required("AT+HTTPPARA=\"CONTENT\",\"application/json\"", timeout),
            AtStep::optional("AT+HTTPPARA=\"REDIR\",1", timeout),
            AtStep::optional("AT+HTTPPARA=\"TIMEOUT\",30", timeout),
        ])?;

        let mut data: String<40> = String::new();
        let _ = write!(data, "AT+HTTPDATA={},{}", body.len(), UPLOAD_WINDOW_MS);
        self.command(&data, "DOWNLOAD", timeout)?;

        self.write_raw(body.as_bytes())?;
        self.wait_for("OK", UPLOAD_WINDOW_MS)?.into_result()
    }
}

/// Status code from `+HTTPACTION: <method>,<status>,<length>`
fn parse_action_status(response: &str) -> Option<u16> {
    let (_, rest) = response.split_once("+HTTPACTION:")?;
    let line = rest.lines().next()?;
    line.split(',').nth(1)?.trim().parse().ok()
}

/// Body following `+HTTPREAD: <len>`
///
/// Takes `<len>` bytes after the header line; falls back to everything up to
/// the trailing `OK` when the length is missing or too large.
fn parse_read_body(response: &str) -> String<HTTP_BODY_CAPACITY> {
    let Some((_, rest)) = response.split_once("+HTTPREAD:") else {
        return String::new();
    };
    let Some((header, data)) = rest.split_once("\r\n") else {
        return String::new();
    };

    let declared = header.trim().parse::<usize>().ok();
    let text = match declared {
        Some(len) if data.is_char_boundary(len) && len <= data.len() => &data[..len],
        _ => data.split("\r\nOK").next().unwrap_or(""),
    };
    bounded_string(text)
}

#[cfg(test)]
mod tests {
    use super::super::tests::registered;
    use super::*;
    use crate::devices::modem::ApnCredentials;
    use crate::platform::mock::{MockModem, MockTimer};

    const URL: &str = "http://tracker.example.com/api/location";

    fn online(modem: &MockModem, timer: &MockTimer) -> ModemSession<MockModem, MockTimer> {
        let mut s = registered(modem, timer);
        s.initialize_gprs(&ApnCredentials::new("internet", "", "")).unwrap();
        modem.clear_trace();
        s
    }

    #[test]
    fn test_parse_action_status() {
        assert_eq!(parse_action_status("\r\nOK\r\n\r\n+HTTPACTION: 1,200,15\r\n"), Some(200));
        assert_eq!(parse_action_status("+HTTPACTION: 0,603,0\r\n"), Some(603));
        assert_eq!(parse_action_status("+HTTPACTION: 0\r\n"), None);
    }

    #[test]
    fn test_parse_read_body() {
        let body = parse_read_body("\r\n+HTTPREAD: 15\r\n{\"status\":\"ok\"}\r\nOK\r\n");
        assert_eq!(body.as_str(), "{\"status\":\"ok\"}");

        let body = parse_read_body("\r\n+HTTPREAD: 99\r\nshort\r\nOK\r\n");
        assert_eq!(body.as_str(), "short");
    }

    #[test]
    fn test_post_sequence_and_teardown() {
        let modem = MockModem::online();
        let timer = MockTimer::new();
        let mut s = online(&modem, &timer);

        let response = s
            .perform_http_request(HttpMethod::Post, URL, Some("{\"a\":1}"))
            .unwrap();
        assert_eq!(response.status, 200);
        assert_eq!(response.body.as_str(), "{\"status\":\"ok\"}");
        assert_eq!(s.last_activity_ms(), timer.now_ms());

        assert_eq!(
            modem.trace(),
            [
                "AT+SAPBR=2,1",
                "AT+HTTPTERM",
                "AT+HTTPINIT",
                "AT+HTTPPARA=\"CID\",1",
                "AT+HTTPPARA=\"URL\",\"http://tracker.example.com/api/location\"",
                "AT+HTTPPARA=\"CONTENT\",\"application/json\"",
                "AT+HTTPPARA=\"REDIR\",1",
                "AT+HTTPPARA=\"TIMEOUT\",30",
                "AT+HTTPDATA=7,10000",
                "{\"a\":1}",
                "AT+HTTPACTION=1",
                "AT+HTTPREAD",
                "AT+HTTPTERM",
            ]
        );
    }

    #[test]
    fn test_get_skips_upload() {
        let modem = MockModem::online();
        modem.respond("AT+HTTPACTION=", "\r\nOK\r\n\r\n+HTTPACTION: 0,200,15\r\n");
        let timer = MockTimer::new();
        let mut s = online(&modem, &timer);

        s.perform_http_request(HttpMethod::Get, URL, None).unwrap();
        assert!(!modem.sent("AT+HTTPDATA"));
        assert!(modem.sent("AT+HTTPACTION=0"));
    }

    #[test]
    fn test_non_2xx_status_is_protocol_error() {
        let modem = MockModem::online();
        modem.respond("AT+HTTPACTION=", "\r\nOK\r\n\r\n+HTTPACTION: 1,500,0\r\n");
        let timer = MockTimer::new();
        let mut s = online(&modem, &timer);

        assert_eq!(
            s.perform_http_request(HttpMethod::Post, URL, Some("{}")),
            Err(ModemError::Protocol(ProtocolFault::HttpStatus(500)))
        );
        assert!(!modem.sent("AT+HTTPREAD"));
        assert_eq!(modem.last_frame().as_deref(), Some("AT+HTTPTERM"));
    }

    #[test]
    fn test_action_timeout_still_terminates() {
        let modem = MockModem::online();
        modem.respond("AT+HTTPACTION=", "\r\nOK\r\n");
        let timer = MockTimer::new();
        let mut s = online(&modem, &timer);
        let activity = s.last_activity_ms();

        assert_eq!(
            s.perform_http_request(HttpMethod::Post, URL, Some("{}")),
            Err(ModemError::TransportTimeout)
        );
        assert_eq!(modem.last_frame().as_deref(), Some("AT+HTTPTERM"));
        assert_eq!(modem.count("AT+HTTPTERM"), 2);
        assert_eq!(s.last_activity_ms(), activity);
    }

    #[test]
    fn test_init_failure_still_terminates() {
        let modem = MockModem::online();
        modem.respond("AT+HTTPINIT", "\r\nERROR\r\n");
        let timer = MockTimer::new();
        let mut s = online(&modem, &timer);

        assert_eq!(
            s.perform_http_request(HttpMethod::Post, URL, Some("{}")),
            Err(ModemError::Protocol(ProtocolFault::ErrorToken))
        );
        assert_eq!(modem.last_frame().as_deref(), Some("AT+HTTPTERM"));
    }

    #[test]
    fn test_missing_download_prompt() {
        let modem = MockModem::online();
        modem.respond("AT+HTTPDATA=", "");
        let timer = MockTimer::new();
        let mut s = online(&modem, &timer);

        assert_eq!(
            s.perform_http_request(HttpMethod::Post, URL, Some("{}")),
            Err(ModemError::TransportTimeout)
        );
        assert!(!modem.sent("AT+HTTPACTION"));
        assert_eq!(modem.last_frame().as_deref(), Some("AT+HTTPTERM"));
    }

    #[test]
    fn test_request_without_bearer_credentials() {
        let modem = MockModem::online();
        modem.respond("AT+SAPBR=2,1", "\r\n+SAPBR: 1,3,\"0.0.0.0\"\r\n\r\nOK\r\n");
        let timer = MockTimer::new();
        let mut s = registered(&modem, &timer);

        assert_eq!(
            s.perform_http_request(HttpMethod::Get, URL, None),
            Err(ModemError::NoCredentials)
        );
        assert!(!modem.sent("AT+HTTPINIT"));
    }

    #[test]
    fn test_user_data_is_applied() {
        let modem = MockModem::online();
        let timer = MockTimer::new();
        let mut s = online(&modem, &timer);

        s.set_http_user_data("X-Api-Key: abc");
        s.perform_http_request(HttpMethod::Post, URL, Some("{}")).unwrap();
        assert!(modem.sent("AT+HTTPPARA=\"USERDATA\",\"X-Api-Key: abc\""));

        modem.clear_trace();
        s.set_http_user_data("");
        s.perform_http_request(HttpMethod::Post, URL, Some("{}")).unwrap();
        assert!(!modem.sent("AT+HTTPPARA=\"USERDATA\""));
    }
}
