//! Mock SMTP relay for forwarding tests
//!
//! Listens on `127.0.0.1:0`, answers with configurable replies and records
//! every command it receives.
#![allow(dead_code)] // Test utility module - not all methods used in every test

use std::{
    fmt::Write,
    net::SocketAddr,
    sync::{Arc, Mutex, PoisonError},
    time::Duration,
};

use tokio::{
    io::{AsyncBufReadExt, AsyncWriteExt, BufReader},
    net::{TcpListener, TcpStream},
    task::JoinHandle,
};

/// A command received by the mock relay
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SmtpCommand {
    Ehlo(String),
    Helo(String),
    MailFrom(String),
    RcptTo(String),
    Data,
    /// Content between `DATA` and the terminating `.`, as sent on the wire
    MessageContent(Vec<u8>),
    StartTls,
    Quit,
    Other(String),
}

#[derive(Debug, Clone)]
struct Reply {
    code: u16,
    message: String,
}

impl Reply {
    fn new(code: u16, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
        }
    }

    fn to_bytes(&self) -> Vec<u8> {
        format!("{} {}\r\n", self.code, self.message).into_bytes()
    }
}

#[derive(Debug, Clone)]
struct MockConfig {
    greeting: Reply,
    /// `None` rejects EHLO so the client has to fall back to HELO
    capabilities: Option<Vec<String>>,
    mail_from: Reply,
    rcpt_to: Reply,
    data_end: Reply,
    /// Stop answering after this many commands
    hang_after: Option<usize>,
}

impl Default for MockConfig {
    fn default() -> Self {
        Self {
            greeting: Reply::new(220, "mock.relay ESMTP"),
            capabilities: Some(vec!["SIZE 10000000".to_string()]),
            mail_from: Reply::new(250, "OK"),
            rcpt_to: Reply::new(250, "OK"),
            data_end: Reply::new(250, "OK: queued"),
            hang_after: None,
        }
    }
}

pub struct MockSmtpServer {
    addr: SocketAddr,
    commands: Arc<Mutex<Vec<SmtpCommand>>>,
    task: JoinHandle<()>,
}

impl MockSmtpServer {
    pub fn builder() -> MockSmtpServerBuilder {
        MockSmtpServerBuilder {
            config: MockConfig::default(),
        }
    }

    pub const fn addr(&self) -> SocketAddr {
        self.addr
    }

    pub fn commands(&self) -> Vec<SmtpCommand> {
        self.commands
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    fn record(commands: &Mutex<Vec<SmtpCommand>>, command: SmtpCommand) {
        commands
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(command);
    }

    async fn handle_client(
        stream: TcpStream,
        config: Arc<MockConfig>,
        commands: Arc<Mutex<Vec<SmtpCommand>>>,
    ) -> std::io::Result<()> {
        let (reader, mut writer) = stream.into_split();
        let mut reader = BufReader::new(reader);
        let mut line = String::new();
        let mut seen = 0;

        writer.write_all(&config.greeting.to_bytes()).await?;

        loop {
            line.clear();
            if reader.read_line(&mut line).await? == 0 {
                return Ok(());
            }

            seen += 1;
            if config.hang_after.is_some_and(|limit| seen > limit) {
                tokio::time::sleep(Duration::from_secs(3600)).await;
                return Ok(());
            }

            let text = line.trim_end();
            let (verb, arg) = text.split_once(' ').unwrap_or((text, ""));

            let (command, reply) = match verb.to_ascii_uppercase().as_str() {
                "EHLO" => {
                    let command = SmtpCommand::Ehlo(arg.to_string());
                    let reply = config.capabilities.as_ref().map_or_else(
                        || Reply::new(502, "Command not implemented").to_bytes(),
                        |capabilities| {
                            let mut reply = String::new();
                            let mut lines = std::iter::once("mock.relay".to_string())
                                .chain(capabilities.iter().cloned())
                                .peekable();
                            while let Some(capability) = lines.next() {
                                let sep = if lines.peek().is_some() { '-' } else { ' ' };
                                let _ = write!(reply, "250{sep}{capability}\r\n");
                            }
                            reply.into_bytes()
                        },
                    );
                    (command, reply)
                }
                "HELO" => (
                    SmtpCommand::Helo(arg.to_string()),
                    Reply::new(250, "mock.relay").to_bytes(),
                ),
                "MAIL" => (
                    SmtpCommand::MailFrom(arg.to_string()),
                    config.mail_from.to_bytes(),
                ),
                "RCPT" => (
                    SmtpCommand::RcptTo(arg.to_string()),
                    config.rcpt_to.to_bytes(),
                ),
                "DATA" => (
                    SmtpCommand::Data,
                    Reply::new(354, "End data with <CR><LF>.<CR><LF>").to_bytes(),
                ),
                "STARTTLS" => (
                    SmtpCommand::StartTls,
                    Reply::new(454, "TLS not available").to_bytes(),
                ),
                "QUIT" => {
                    Self::record(&commands, SmtpCommand::Quit);
                    writer.write_all(&Reply::new(221, "Bye").to_bytes()).await?;
                    return Ok(());
                }
                _ => (
                    SmtpCommand::Other(text.to_string()),
                    Reply::new(500, "Unknown command").to_bytes(),
                ),
            };

            let is_data = command == SmtpCommand::Data;
            Self::record(&commands, command);
            writer.write_all(&reply).await?;

            if is_data {
                let mut content = Vec::new();
                let mut data_line = Vec::new();
                loop {
                    data_line.clear();
                    if reader.read_until(b'\n', &mut data_line).await? == 0 {
                        return Ok(());
                    }
                    if data_line == b".\r\n" {
                        break;
                    }
                    content.extend_from_slice(&data_line);
                }

                Self::record(&commands, SmtpCommand::MessageContent(content));
                writer.write_all(&config.data_end.to_bytes()).await?;
            }
        }
    }
}

impl Drop for MockSmtpServer {
    fn drop(&mut self) {
        self.task.abort();
    }
}

pub struct MockSmtpServerBuilder {
    config: MockConfig,
}

impl MockSmtpServerBuilder {
    #[must_use]
    pub fn with_greeting(mut self, code: u16, message: impl Into<String>) -> Self {
        self.config.greeting = Reply::new(code, message);
        self
    }

    /// Advertise these EHLO capabilities
    #[must_use]
    pub fn with_capabilities(mut self, capabilities: &[&str]) -> Self {
        self.config.capabilities = Some(capabilities.iter().map(ToString::to_string).collect());
        self
    }

    /// Reject EHLO, forcing a HELO fallback
    #[must_use]
    pub fn without_ehlo(mut self) -> Self {
        self.config.capabilities = None;
        self
    }

    #[must_use]
    pub fn with_mail_from_response(mut self, code: u16, message: impl Into<String>) -> Self {
        self.config.mail_from = Reply::new(code, message);
        self
    }

    #[must_use]
    pub fn with_rcpt_to_response(mut self, code: u16, message: impl Into<String>) -> Self {
        self.config.rcpt_to = Reply::new(code, message);
        self
    }

    #[must_use]
    pub fn with_data_end_response(mut self, code: u16, message: impl Into<String>) -> Self {
        self.config.data_end = Reply::new(code, message);
        self
    }

    /// Stop responding after `count` commands
    #[must_use]
    pub const fn hang_after_commands(mut self, count: usize) -> Self {
        self.config.hang_after = Some(count);
        self
    }

    pub async fn build(self) -> std::io::Result<MockSmtpServer> {
        let listener = TcpListener::bind("127.0.0.1:0").await?;
        let addr = listener.local_addr()?;

        let config = Arc::new(self.config);
        let commands = Arc::new(Mutex::new(Vec::new()));

        let task = {
            let commands = Arc::clone(&commands);
            tokio::spawn(async move {
                while let Ok((stream, _peer)) = listener.accept().await {
                    let config = Arc::clone(&config);
                    let commands = Arc::clone(&commands);
                    tokio::spawn(async move {
                        let _ = MockSmtpServer::handle_client(stream, config, commands).await;
                    });
                }
            })
        };

        Ok(MockSmtpServer {
            addr,
            commands,
            task,
        })
    }
}
