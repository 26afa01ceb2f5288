//! Scripted modem for testing
//!
//! `MockModem` plays the modem side of the AT conversation. Every `write` is
//! treated as one frame: trailing CR/LF is trimmed, the frame is appended to
//! the trace, and the first matching reply is queued on the receive side.
//!
//! Reply lookup order:
//! 1. one-shot rules (oldest first), consumed when they match
//! 2. persistent rules (most recently added wins)
//! 3. the default reply (`"\r\nOK\r\n"`), unless the modem is silent
//!
//! An empty reply string means "say nothing" for that frame.

use crate::platform::{
    PlatformError, Result, UartError,
    traits::UartInterface,
};
use std::cell::RefCell;
use std::collections::VecDeque;
use std::rc::Rc;
use std::string::{String, ToString};
use std::vec::Vec;

const DEFAULT_REPLY: &str = "\r\nOK\r\n";

#[derive(Debug)]
struct Rule {
    prefix: String,
    reply: String,
    once: bool,
}

#[derive(Debug, Default)]
struct Script {
    rules: Vec<Rule>,
    default_reply: Option<String>,
    rx: VecDeque<u8>,
    trace: Vec<String>,
    fail_writes: bool,
}

impl Script {
    fn reply_for(&mut self, frame: &str) -> Option<String> {
        if let Some(pos) = self
            .rules
            .iter()
            .position(|r| r.once && frame.starts_with(r.prefix.as_str()))
        {
            return Some(self.rules.remove(pos).reply);
        }

        if let Some(rule) = self
            .rules
            .iter()
            .rev()
            .find(|r| !r.once && frame.starts_with(r.prefix.as_str()))
        {
            return Some(rule.reply.clone());
        }

        self.default_reply.clone()
    }
}

/// Scripted modem transport
#[derive(Debug, Clone)]
pub struct MockModem {
    inner: Rc<RefCell<Script>>,
}

impl Default for MockModem {
    fn default() -> Self {
        Self::new()
    }
}

impl MockModem {
    /// Modem that answers `OK` to anything without a rule
    pub fn new() -> Self {
        let modem = Self::silent();
        modem.inner.borrow_mut().default_reply = Some(DEFAULT_REPLY.to_string());
        modem
    }

    /// Modem that never answers unless a rule matches
    pub fn silent() -> Self {
        Self {
            inner: Rc::new(RefCell::new(Script::default())),
        }
    }

    /// Registered modem with an open bearer and a reachable HTTP server
    ///
    /// HTTP requests complete with status 200 and body `{"status":"ok"}`.
    pub fn online() -> Self {
        let modem = Self::new();
        modem.respond("AT+CREG?", "\r\n+CREG: 0,1\r\n\r\nOK\r\n");
        modem.respond("AT+SAPBR=2,1", "\r\n+SAPBR: 1,1,\"10.64.12.7\"\r\n\r\nOK\r\n");
        modem.respond("AT+CMGS=", "\r\n> ");
        modem.respond("AT+HTTPDATA=", "\r\nDOWNLOAD\r\n");
        modem.respond("AT+HTTPACTION=", "\r\nOK\r\n\r\n+HTTPACTION: 1,200,15\r\n");
        modem.respond(
            "AT+HTTPREAD",
            "\r\n+HTTPREAD: 15\r\n{\"status\":\"ok\"}\r\nOK\r\n",
        );
        modem.respond("AT+CSQ", "\r\n+CSQ: 18,0\r\n\r\nOK\r\n");
        modem.respond("AT+GSN", "\r\n867856030000000\r\n\r\nOK\r\n");
        modem.respond(
            "AT+CIPPING=",
            "\r\n+CIPPING: 1,\"8.8.8.8\",60,255\r\n\r\nOK\r\n",
        );
        modem
    }

    /// Reply to every frame starting with `prefix`
    pub fn respond(&self, prefix: &str, reply: &str) {
        self.push_rule(prefix, reply, false);
    }

    /// Reply to the next frame starting with `prefix`, then forget the rule
    pub fn respond_once(&self, prefix: &str, reply: &str) {
        self.push_rule(prefix, reply, true);
    }

    /// Make every subsequent write fail at the transport level
    pub fn fail_writes(&self, fail: bool) {
        self.inner.borrow_mut().fail_writes = fail;
    }

    /// Queue unsolicited bytes on the receive side
    pub fn inject(&self, data: &str) {
        self.inner.borrow_mut().rx.extend(data.bytes());
    }

    /// Frames written so far, trimmed of CR/LF
    pub fn trace(&self) -> Vec<String> {
        self.inner.borrow().trace.clone()
    }

    /// Number of frames starting with `prefix`
    pub fn count(&self, prefix: &str) -> usize {
        self.inner
            .borrow()
            .trace
            .iter()
            .filter(|f| f.starts_with(prefix))
            .count()
    }

    /// Whether any frame started with `prefix`
    pub fn sent(&self, prefix: &str) -> bool {
        self.count(prefix) > 0
    }

    /// Most recent frame
    pub fn last_frame(&self) -> Option<String> {
        self.inner.borrow().trace.last().cloned()
    }

    /// Forget the trace, keeping the rules
    pub fn clear_trace(&self) {
        self.inner.borrow_mut().trace.clear();
    }

    fn push_rule(&self, prefix: &str, reply: &str, once: bool) {
        self.inner.borrow_mut().rules.push(Rule {
            prefix: prefix.to_string(),
            reply: reply.to_string(),
            once,
        });
    }
}

impl UartInterface for MockModem {
    fn write(&mut self, data: &[u8]) -> Result<usize> {
        let mut script = self.inner.borrow_mut();
        if script.fail_writes {
            return Err(PlatformError::Uart(UartError::WriteFailed));
        }

        let frame = String::from_utf8_lossy(data)
            .trim_end_matches(['\r', '\n'])
            .to_string();
        let reply = script.reply_for(&frame);
        script.trace.push(frame);
        if let Some(reply) = reply {
            script.rx.extend(reply.bytes());
        }
        Ok(data.len())
    }

    fn read(&mut self, buffer: &mut [u8]) -> Result<usize> {
        let mut script = self.inner.borrow_mut();
        let mut n = 0;
        while n < buffer.len() {
            match script.rx.pop_front() {
                Some(byte) => {
                    buffer[n] = byte;
                    n += 1;
                }
                None => break,
            }
        }
        Ok(n)
    }

    fn set_baud_rate(&mut self, _baud: u32) -> Result<()> {
        Ok(())
    }

    fn available(&self) -> bool {
        !self.inner.borrow().rx.is_empty()
    }

    fn flush(&mut self) -> Result<()> {
        Ok(())
    }
}
