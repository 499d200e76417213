//! Blocking IMAP-over-TLS [`Mailbox`].
//!
//! Speaks just enough IMAP4rev1 for polling: LOGIN, SELECT, UID SEARCH,
//! UID FETCH with `BODY.PEEK[]` (which leaves `\Seen` alone) and
//! UID STORE. Each call opens its own session.

use std::io::{Read, Write};
use std::net::TcpStream;
use std::sync::Arc;
use std::time::Duration;

use rustls::{ClientConfig, ClientConnection, RootCertStore, StreamOwned};
use rustls_pki_types::ServerName;
use secrecy::ExposeSecret;
use tracing::{debug, warn};

use crate::channels::mail::{FetchedMail, MailConfig, Mailbox};
use crate::error::ChannelError;

const READ_TIMEOUT: Duration = Duration::from_secs(30);

/// IMAP mailbox reading the configured folder.
pub struct ImapMailbox {
    config: MailConfig,
    tls: Arc<ClientConfig>,
}

impl ImapMailbox {
    pub fn new(config: MailConfig) -> Result<Self, ChannelError> {
        let mut roots = RootCertStore::empty();
        roots.extend(webpki_roots::TLS_SERVER_ROOTS.iter().cloned());

        let tls = ClientConfig::builder_with_provider(Arc::new(
            rustls::crypto::ring::default_provider(),
        ))
        .with_safe_default_protocol_versions()
        .map_err(|e| mailbox_error("TLS setup", e))?
        .with_root_certificates(roots)
        .with_no_client_auth();

        Ok(Self {
            config,
            tls: Arc::new(tls),
        })
    }

    fn open(&self) -> Result<Session, ChannelError> {
        let mut session = Session::connect(&self.config, Arc::clone(&self.tls))?;
        session.command(&format!(
            "LOGIN {} {}",
            quote(&self.config.username),
            quote(self.config.password.expose_secret())
        ))?;
        session.command(&format!("SELECT {}", quote(&self.config.folder)))?;
        Ok(session)
    }
}

impl Mailbox for ImapMailbox {
    fn fetch_unseen(&self) -> Result<Vec<FetchedMail>, ChannelError> {
        let mut session = self.open()?;

        let search = session.command("UID SEARCH UNSEEN")?;
        let uids = parse_search(&search.lines);
        debug!(count = uids.len(), folder = %self.config.folder, "Unseen messages");

        let mut fetched = Vec::with_capacity(uids.len());
        for uid in uids {
            let response = session.command(&format!("UID FETCH {uid} BODY.PEEK[]"))?;
            match response.literals.into_iter().next() {
                Some(raw) => fetched.push(FetchedMail { uid, raw }),
                None => warn!(uid = %uid, "FETCH returned no message body"),
            }
        }

        session.logout();
        Ok(fetched)
    }

    fn mark_seen(&self, uid: &str) -> Result<(), ChannelError> {
        let mut session = self.open()?;
        session.command(&format!("UID STORE {uid} +FLAGS (\\Seen)"))?;
        session.logout();
        Ok(())
    }
}

// ── Session ─────────────────────────────────────────────────────────

#[derive(Debug, Default)]
struct Response {
    lines: Vec<String>,
    literals: Vec<Vec<u8>>,
}

struct Session {
    stream: StreamOwned<ClientConnection, TcpStream>,
    next_tag: u32,
}

impl Session {
    fn connect(config: &MailConfig, tls: Arc<ClientConfig>) -> Result<Self, ChannelError> {
        let tcp = TcpStream::connect((config.imap_host.as_str(), config.imap_port))?;
        tcp.set_read_timeout(Some(READ_TIMEOUT))?;

        let server_name = ServerName::try_from(config.imap_host.clone())
            .map_err(|e| mailbox_error("server name", e))?;
        let conn =
            ClientConnection::new(tls, server_name).map_err(|e| mailbox_error("TLS handshake", e))?;

        let mut session = Self {
            stream: StreamOwned::new(conn, tcp),
            next_tag: 1,
        };
        let greeting = session.read_line()?;
        if !greeting.starts_with("* OK") {
            return Err(ChannelError::Mailbox(format!(
                "unexpected greeting: {}",
                greeting.trim_end()
            )));
        }
        Ok(session)
    }

    fn read_line(&mut self) -> Result<String, ChannelError> {
        let mut buf = Vec::new();
        let mut byte = [0u8; 1];
        while !buf.ends_with(b"\r\n") {
            if self.stream.read(&mut byte)? == 0 {
                return Err(ChannelError::Mailbox("connection closed".into()));
            }
            buf.push(byte[0]);
        }
        Ok(String::from_utf8_lossy(&buf).into_owned())
    }

    /// Send a tagged command and collect its response, failing unless the
    /// tagged status is OK.
    fn command(&mut self, command: &str) -> Result<Response, ChannelError> {
        let tag = format!("A{}", self.next_tag);
        self.next_tag += 1;

        self.stream
            .write_all(format!("{tag} {command}\r\n").as_bytes())?;
        self.stream.flush()?;

        let mut response = Response::default();
        loop {
            let line = self.read_line()?;
            if let Some(len) = literal_length(&line) {
                let mut literal = vec![0u8; len];
                self.stream.read_exact(&mut literal)?;
                response.literals.push(literal);
            }
            if let Some(status) = line.strip_prefix(&tag) {
                if status.trim_start().starts_with("OK") {
                    return Ok(response);
                }
                let verb = command.split_whitespace().next().unwrap_or(command);
                return Err(ChannelError::Mailbox(format!(
                    "{verb} failed: {}",
                    status.trim()
                )));
            }
            response.lines.push(line);
        }
    }

    fn logout(mut self) {
        if let Err(e) = self.command("LOGOUT") {
            debug!(error = %e, "LOGOUT failed");
        }
    }
}

// ── Protocol helpers ────────────────────────────────────────────────

/// Quote an IMAP string argument.
fn quote(s: &str) -> String {
    format!("\"{}\"", s.replace('\\', "\\\\").replace('"', "\\\""))
}

/// Length of a `{N}` literal announced at the end of a response line.
fn literal_length(line: &str) -> Option<usize> {
    let line = line.trim_end_matches("\r\n");
    let open = line.rfind('{')?;
    line[open + 1..].strip_suffix('}')?.parse().ok()
}

/// UIDs listed in `* SEARCH` lines.
fn parse_search(lines: &[String]) -> Vec<String> {
    lines
        .iter()
        .filter_map(|line| line.strip_prefix("* SEARCH"))
        .flat_map(|rest| rest.split_whitespace().map(str::to_string))
        .collect()
}

fn mailbox_error(context: &str, e: impl std::fmt::Display) -> ChannelError {
    ChannelError::Mailbox(format!("{context}: {e}"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn quotes_special_characters() {
        assert_eq!(quote("INBOX"), "\"INBOX\"");
        assert_eq!(quote(r#"pa"ss\word"#), r#""pa\"ss\\word""#);
    }

    #[test]
    fn detects_literal_length() {
        assert_eq!(literal_length("* 1 FETCH (UID 7 BODY[] {342}\r\n"), Some(342));
        assert_eq!(literal_length("* 1 FETCH (FLAGS (\\Seen))\r\n"), None);
        assert_eq!(literal_length("A1 OK {not a number}\r\n"), None);
    }

    #[test]
    fn parses_search_results() {
        let lines = vec!["* SEARCH 4 9 12\r\n".to_string(), "* OK note\r\n".to_string()];
        assert_eq!(parse_search(&lines), vec!["4", "9", "12"]);
        assert!(parse_search(&["* SEARCH\r\n".to_string()]).is_empty());
    }
}
