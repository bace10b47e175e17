//! Async NNTP client
//!
//! One connection to one provider, speaking the commands this tool needs:
//! CAPABILITIES, HEAD, ARTICLE, POST, IHAVE, DATE and QUIT, with AUTHINFO
//! USER/PASS authentication. Providers may be plaintext or TLS, so the
//! connection is held behind a boxed transport.

use crate::article::Article;
use crate::commands;
use crate::config::ProviderConfig;
use crate::error::{RefreshError, Result};
use crate::response::{codes, NntpBinaryResponse, NntpResponse};
use std::sync::Arc;
use std::time::Duration;
use tokio::io::{AsyncBufReadExt, AsyncRead, AsyncWrite, AsyncWriteExt, BufReader};
use tokio::net::TcpStream;
use tokio::time::timeout;
use tokio_rustls::rustls::client::danger::{
    HandshakeSignatureValid, ServerCertVerified, ServerCertVerifier,
};
use tokio_rustls::rustls::pki_types::{CertificateDer, ServerName, UnixTime};
use tokio_rustls::rustls::{ClientConfig, DigitallySignedStruct, RootCertStore, SignatureScheme};
use tokio_rustls::TlsConnector;
use tracing::{debug, trace, warn};

const TCP_CONNECT_TIMEOUT: Duration = Duration::from_secs(60);
const TLS_HANDSHAKE_TIMEOUT: Duration = Duration::from_secs(30);
const SINGLE_LINE_TIMEOUT: Duration = Duration::from_secs(60);
const MULTILINE_TIMEOUT: Duration = Duration::from_secs(180);

/// Either a plain TCP stream or a TLS stream, behind one object
trait Transport: AsyncRead + AsyncWrite + Unpin + Send {}
impl<T: AsyncRead + AsyncWrite + Unpin + Send> Transport for T {}

/// Certificate verifier that accepts any certificate.
///
/// Selected by `SkipSslCheck`; the connection is then open to
/// man-in-the-middle interception, which is the operator's stated choice.
#[derive(Debug)]
struct AcceptAnyCertificate;

impl ServerCertVerifier for AcceptAnyCertificate {
    fn verify_server_cert(
        &self,
        _end_entity: &CertificateDer<'_>,
        _intermediates: &[CertificateDer<'_>],
        _server_name: &ServerName<'_>,
        _ocsp_response: &[u8],
        _now: UnixTime,
    ) -> std::result::Result<ServerCertVerified, tokio_rustls::rustls::Error> {
        Ok(ServerCertVerified::assertion())
    }

    fn verify_tls12_signature(
        &self,
        _message: &[u8],
        _cert: &CertificateDer<'_>,
        _dss: &DigitallySignedStruct,
    ) -> std::result::Result<HandshakeSignatureValid, tokio_rustls::rustls::Error> {
        Ok(HandshakeSignatureValid::assertion())
    }

    fn verify_tls13_signature(
        &self,
        _message: &[u8],
        _cert: &CertificateDer<'_>,
        _dss: &DigitallySignedStruct,
    ) -> std::result::Result<HandshakeSignatureValid, tokio_rustls::rustls::Error> {
        Ok(HandshakeSignatureValid::assertion())
    }

    fn supported_verify_schemes(&self) -> Vec<SignatureScheme> {
        tokio_rustls::rustls::crypto::ring::default_provider()
            .signature_verification_algorithms
            .supported_schemes()
    }
}

/// Async NNTP client for one provider connection
pub struct NntpClient {
    stream: BufReader<Box<dyn Transport>>,
    config: Arc<ProviderConfig>,
    authenticated: bool,
    /// Set when the server sent garbage; the pool discards such connections
    is_broken: bool,
}

impl NntpClient {
    /// Connect to the provider and validate the greeting
    ///
    /// Uses TLS when the provider config says so, with certificate
    /// validation against the Mozilla root store unless `SkipSslCheck`
    /// selects the accept-any verifier. Does not authenticate; call
    /// [`authenticate`](Self::authenticate) next.
    pub async fn connect(config: Arc<ProviderConfig>) -> Result<Self> {
        debug!(
            "Connecting to provider '{}' at {}:{}",
            config.name, config.host, config.port
        );

        let addr = format!("{}:{}", config.host, config.port);
        let tcp = timeout(TCP_CONNECT_TIMEOUT, TcpStream::connect(&addr))
            .await
            .map_err(|_| RefreshError::Timeout)??;
        // Low-latency request/response traffic; disable Nagle
        tcp.set_nodelay(true)?;

        let transport: Box<dyn Transport> = if config.ssl {
            let _ = tokio_rustls::rustls::crypto::CryptoProvider::install_default(
                tokio_rustls::rustls::crypto::ring::default_provider(),
            );

            let tls_config = if config.skip_ssl_check {
                warn!(
                    "TLS certificate validation disabled for provider '{}'",
                    config.name
                );
                ClientConfig::builder()
                    .dangerous()
                    .with_custom_certificate_verifier(Arc::new(AcceptAnyCertificate))
                    .with_no_client_auth()
            } else {
                let mut roots = RootCertStore::empty();
                roots.extend(webpki_roots::TLS_SERVER_ROOTS.iter().cloned());
                ClientConfig::builder()
                    .with_root_certificates(roots)
                    .with_no_client_auth()
            };

            let connector = TlsConnector::from(Arc::new(tls_config));
            let server_name = ServerName::try_from(config.host.clone())
                .map_err(|e| RefreshError::Tls(format!("invalid server name: {}", e)))?;

            let tls = timeout(TLS_HANDSHAKE_TIMEOUT, connector.connect(server_name, tcp))
                .await
                .map_err(|_| RefreshError::Timeout)?
                .map_err(|e| RefreshError::Tls(format!("handshake failed: {}", e)))?;
            Box::new(tls)
        } else {
            Box::new(tcp)
        };

        let mut client = Self {
            stream: BufReader::new(transport),
            config,
            authenticated: false,
            is_broken: false,
        };

        let greeting = client.read_response().await?;
        trace!("Greeting: {} {}", greeting.code, greeting.message);
        if !greeting.is_success() {
            return Err(RefreshError::Protocol {
                code: greeting.code,
                message: greeting.message,
            });
        }

        Ok(client)
    }

    /// Check if this connection received invalid data and should be discarded
    pub fn is_broken(&self) -> bool {
        self.is_broken
    }

    /// Authenticate with AUTHINFO USER/PASS
    ///
    /// A provider without a configured username is used anonymously and this
    /// is a no-op.
    pub async fn authenticate(&mut self) -> Result<()> {
        if self.config.username.is_empty() || self.authenticated {
            return Ok(());
        }

        let cmd = commands::authinfo_user(&self.config.username);
        self.send_command(cmd.as_bytes()).await?;
        let response = self.read_response().await?;

        if response.code == codes::AUTH_CONTINUE {
            let cmd = commands::authinfo_pass(&self.config.password);
            self.send_command(cmd.as_bytes()).await?;
            let response = self.read_response().await?;
            if response.code != codes::AUTH_ACCEPTED {
                return Err(RefreshError::AuthFailed(response.message));
            }
        } else if response.code != codes::AUTH_ACCEPTED {
            return Err(RefreshError::AuthFailed(response.message));
        }

        self.authenticated = true;
        debug!("Authenticated on provider '{}'", self.config.name);
        Ok(())
    }

    /// Fetch the server capability list (RFC 3977 §5.2)
    ///
    /// # Errors
    ///
    /// Returns [`RefreshError::Protocol`] when the server does not implement
    /// CAPABILITIES; callers fall back to probing individual commands.
    pub async fn capabilities(&mut self) -> Result<Vec<String>> {
        self.send_command(commands::capabilities().as_bytes())
            .await?;
        let response = self.read_multiline_response().await?;

        if response.code != codes::CAPABILITY_LIST {
            return Err(RefreshError::Protocol {
                code: response.code,
                message: response.message,
            });
        }

        Ok(response.lines)
    }

    /// Issue `HEAD <message-id>` and return the raw response
    ///
    /// Classification (present / absent / transient) is the caller's job;
    /// only transport failures are errors here.
    pub async fn head(&mut self, message_id: &str) -> Result<NntpResponse> {
        let cmd = commands::head(&commands::bracketed(message_id));
        self.send_command(cmd.as_bytes()).await?;
        self.read_multiline_response().await
    }

    /// Fetch a full article by message-id
    ///
    /// # Errors
    ///
    /// - [`RefreshError::NoSuchArticle`] - status 430
    /// - [`RefreshError::Protocol`] - any other error status
    pub async fn fetch_article(&mut self, message_id: &str) -> Result<Article> {
        let cmd = commands::article(&commands::bracketed(message_id));
        self.send_command(cmd.as_bytes()).await?;
        let response = self.read_multiline_binary().await?;

        if response.code == codes::NO_SUCH_ARTICLE_ID {
            return Err(RefreshError::NoSuchArticle(message_id.to_string()));
        }
        if !response.is_success() {
            return Err(RefreshError::Protocol {
                code: response.code,
                message: response.message,
            });
        }

        Article::parse(&response.data)
    }

    /// Post an article (RFC 3977 §6.3.1)
    ///
    /// # Errors
    ///
    /// - [`RefreshError::PostingNotPermitted`] - status 440
    /// - [`RefreshError::PostingFailed`] - status 441
    /// - [`RefreshError::Protocol`] - any other unexpected status
    pub async fn post(&mut self, article: &Article) -> Result<()> {
        self.send_command(commands::post().as_bytes()).await?;
        let response = self.read_response().await?;

        if response.code == codes::POSTING_NOT_PERMITTED {
            return Err(RefreshError::PostingNotPermitted);
        }
        if response.code != codes::SEND_ARTICLE {
            return Err(RefreshError::Protocol {
                code: response.code,
                message: response.message,
            });
        }

        self.send_command(&article.serialize_for_posting()).await?;
        self.send_command(b".\r\n").await?;

        let response = self.read_response().await?;
        if response.code == codes::POSTING_FAILED {
            return Err(RefreshError::PostingFailed(response.message));
        }
        if response.code != codes::ARTICLE_POSTED {
            return Err(RefreshError::Protocol {
                code: response.code,
                message: response.message,
            });
        }

        Ok(())
    }

    /// Transfer an article with IHAVE (RFC 3977 §6.3.2)
    ///
    /// # Errors
    ///
    /// - [`RefreshError::ArticleNotWanted`] - status 435
    /// - [`RefreshError::TransferNotPossible`] - status 436
    /// - [`RefreshError::TransferRejected`] - status 437
    /// - [`RefreshError::Protocol`] - any other unexpected status
    pub async fn ihave(&mut self, message_id: &str, article: &Article) -> Result<()> {
        let cmd = commands::ihave(&commands::bracketed(message_id));
        self.send_command(cmd.as_bytes()).await?;
        let response = self.read_response().await?;

        match response.code {
            codes::SEND_ARTICLE_TRANSFER => {}
            codes::ARTICLE_NOT_WANTED => return Err(RefreshError::ArticleNotWanted),
            codes::TRANSFER_NOT_POSSIBLE => {
                return Err(RefreshError::TransferNotPossible(response.message))
            }
            _ => {
                return Err(RefreshError::Protocol {
                    code: response.code,
                    message: response.message,
                })
            }
        }

        self.send_command(&article.serialize_for_posting()).await?;
        self.send_command(b".\r\n").await?;

        let response = self.read_response().await?;
        match response.code {
            codes::ARTICLE_TRANSFERRED => Ok(()),
            codes::TRANSFER_NOT_POSSIBLE => {
                Err(RefreshError::TransferNotPossible(response.message))
            }
            codes::TRANSFER_REJECTED => Err(RefreshError::TransferRejected(response.message)),
            _ => Err(RefreshError::Protocol {
                code: response.code,
                message: response.message,
            }),
        }
    }

    /// Cheap liveness probe (DATE)
    pub async fn ping(&mut self) -> Result<()> {
        self.send_command(commands::date().as_bytes()).await?;
        let response = self.read_response().await?;
        if response.code != codes::SERVER_DATE {
            return Err(RefreshError::Protocol {
                code: response.code,
                message: response.message,
            });
        }
        Ok(())
    }

    /// Close the connection gracefully
    pub async fn quit(&mut self) -> Result<()> {
        self.send_command(commands::quit().as_bytes()).await?;
        let _ = self.read_response().await?;
        Ok(())
    }

    async fn send_command(&mut self, data: &[u8]) -> Result<()> {
        self.stream.get_mut().write_all(data).await?;
        self.stream.get_mut().flush().await?;
        Ok(())
    }

    /// Read a single status line
    async fn read_response(&mut self) -> Result<NntpResponse> {
        let result = timeout(SINGLE_LINE_TIMEOUT, async {
            let line = self.read_line().await?;
            commands::parse_single_response(&line)
        })
        .await
        .map_err(|_| RefreshError::Timeout)?;

        if let Err(RefreshError::InvalidResponse(_)) = &result {
            self.is_broken = true;
        }
        result
    }

    /// Read a status line plus a dot-terminated text block
    ///
    /// Error statuses (4xx/5xx) carry no block; the response is returned
    /// with empty lines so callers can branch on the code.
    async fn read_multiline_response(&mut self) -> Result<NntpResponse> {
        let result = timeout(MULTILINE_TIMEOUT, async {
            let first = self.read_line().await?;
            trace!("Received: {}", first);
            let (code, message) = commands::parse_response_line(&first)?;

            if code >= 400 {
                return Ok(NntpResponse {
                    code,
                    message,
                    lines: vec![],
                });
            }

            let mut lines = Vec::with_capacity(16);
            loop {
                let line = self.read_line().await?;
                if line == "." {
                    break;
                }
                // Dot-stuffed lines start with ".."; drop one dot
                let line = if line.starts_with("..") {
                    &line[1..]
                } else {
                    line.as_str()
                };
                lines.push(line.to_string());
            }

            Ok(NntpResponse {
                code,
                message,
                lines,
            })
        })
        .await
        .map_err(|_| RefreshError::Timeout)?;

        if let Err(RefreshError::InvalidResponse(_)) = &result {
            self.is_broken = true;
        }
        result
    }

    /// Read a status line plus a dot-terminated block as raw bytes
    ///
    /// Line structure is preserved (CRLF terminators, dot-stuffing removed)
    /// so the payload can be re-serialized for posting byte-for-byte.
    async fn read_multiline_binary(&mut self) -> Result<NntpBinaryResponse> {
        let result = timeout(MULTILINE_TIMEOUT, async {
            let first = self.read_line().await?;
            trace!("Received: {}", first);
            let (code, message) = commands::parse_response_line(&first)?;

            if code >= 400 {
                return Ok(NntpBinaryResponse {
                    code,
                    message,
                    data: vec![],
                });
            }

            let mut data = Vec::with_capacity(128 * 1024);
            loop {
                let mut line = Vec::with_capacity(512);
                self.stream.read_until(b'\n', &mut line).await?;
                if line.is_empty() {
                    return Err(RefreshError::ConnectionClosed);
                }

                if line == b".\r\n" || line == b".\n" {
                    break;
                }

                let content_end = if line.ends_with(b"\r\n") {
                    line.len() - 2
                } else if line.ends_with(b"\n") {
                    line.len() - 1
                } else {
                    line.len()
                };
                let content = &line[..content_end];

                if content.starts_with(b"..") {
                    data.extend_from_slice(&content[1..]);
                } else {
                    data.extend_from_slice(content);
                }
                data.extend_from_slice(b"\r\n");
            }

            Ok(NntpBinaryResponse {
                code,
                message,
                data,
            })
        })
        .await
        .map_err(|_| RefreshError::Timeout)?;

        if let Err(RefreshError::InvalidResponse(_)) = &result {
            self.is_broken = true;
        }
        result
    }

    async fn read_line(&mut self) -> Result<String> {
        let mut bytes = Vec::with_capacity(512);
        self.stream.read_until(b'\n', &mut bytes).await?;
        if bytes.is_empty() {
            return Err(RefreshError::ConnectionClosed);
        }
        let line = String::from_utf8_lossy(&bytes);
        Ok(line.trim_end().to_string())
    }
}

impl std::fmt::Debug for NntpClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("NntpClient")
            .field("provider", &self.config.name)
            .field("authenticated", &self.authenticated)
            .field("is_broken", &self.is_broken)
            .finish()
    }
}
