//! conn-handler demo binary.
//!
//! Runs an echo server or a one-shot client on top of [`ConnectionHandler`],
//! over plain TCP or TLS depending on the configuration file.
//!
//! ```text
//! conn-handler --config server.toml serve --bind 127.0.0.1:7000
//! conn-handler --config client.toml connect --addr 127.0.0.1:7000 --message hello
//! ```

use std::error::Error;
use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use clap::{Parser, Subcommand, ValueEnum};
use tokio::net::{TcpListener, TcpStream};
use tokio::runtime::Handle;
use tokio::sync::Notify;

use conn_handler::config::{load_config, HandlerConfig, TlsConfig};
use conn_handler::net::tls;
use conn_handler::{observability, ConnectionHandler, ConnectionResult, Role, TlsEndpoint, TransportKind};

#[derive(Parser)]
#[command(name = "conn-handler")]
#[command(about = "Echo server and client over delimiter-framed TCP/TLS connections", long_about = None)]
struct Cli {
    /// TOML configuration file; plain TCP with defaults when omitted
    #[arg(short, long)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Accept connections and echo every message back
    Serve {
        #[arg(short, long, default_value = "127.0.0.1:7000")]
        bind: SocketAddr,

        /// Role of the accepted connections
        #[arg(long, value_enum, default_value_t = ServerRole::Server)]
        role: ServerRole,
    },
    /// Connect, send one message and print the reply
    Connect {
        #[arg(short, long, default_value = "127.0.0.1:7000")]
        addr: SocketAddr,

        #[arg(short, long, default_value = "hello")]
        message: String,
    },
}

#[derive(Clone, Copy, ValueEnum)]
enum ServerRole {
    Server,
    LoginServer,
}

impl From<ServerRole> for Role {
    fn from(role: ServerRole) -> Self {
        match role {
            ServerRole::Server => Role::Server,
            ServerRole::LoginServer => Role::LoginServer,
        }
    }
}

/// Owner of one accepted connection.
struct EchoService {
    peer: SocketAddr,
}

/// Owner of the outbound connection.
struct EchoClient {
    message: String,
    done: Notify,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn Error>> {
    let cli = Cli::parse();

    let config = match &cli.config {
        Some(path) => load_config(path)?,
        None => HandlerConfig::default(),
    };
    observability::logging::init(&config.observability.log_filter);

    tracing::info!(
        read_chunk_bytes = config.connection.read_chunk_bytes,
        tls = config.tls.is_some(),
        "conn-handler v0.1.0 starting"
    );

    match cli.command {
        Commands::Serve { bind, role } => serve(config, bind, role.into()).await,
        Commands::Connect { addr, message } => connect(config, addr, message).await,
    }
}

async fn serve(config: HandlerConfig, bind: SocketAddr, role: Role) -> Result<(), Box<dyn Error>> {
    let endpoint = config.tls.as_ref().map(server_endpoint).transpose()?;
    let listener = TcpListener::bind(bind).await?;

    tracing::info!(
        address = %listener.local_addr()?,
        role = %role,
        tls = endpoint.is_some(),
        "Listening for connections"
    );

    loop {
        tokio::select! {
            accepted = listener.accept() => {
                let (stream, peer) = match accepted {
                    Ok(accepted) => accepted,
                    Err(error) => {
                        tracing::warn!(error = %error, "Failed to accept connection");
                        continue;
                    }
                };
                if let Err(error) = start_echo(&config, role, stream, peer, endpoint.clone()) {
                    tracing::warn!(peer_addr = %peer, error = %error, "Failed to start connection");
                }
            }
            _ = tokio::signal::ctrl_c() => {
                tracing::info!("Shutdown signal received");
                break;
            }
        }
    }

    tracing::info!("Shutdown complete");
    Ok(())
}

fn server_endpoint(settings: &TlsConfig) -> Result<TlsEndpoint, Box<dyn Error>> {
    let (Some(cert_path), Some(key_path)) = (&settings.cert_path, &settings.key_path) else {
        return Err("serving TLS needs tls.cert_path and tls.key_path".into());
    };
    let server_config = tls::load_server_config(Path::new(cert_path), Path::new(key_path))?;
    Ok(TlsEndpoint::acceptor(server_config))
}

fn client_endpoint(settings: &TlsConfig) -> Result<TlsEndpoint, Box<dyn Error>> {
    let (Some(ca_path), Some(server_name)) = (&settings.ca_path, &settings.server_name) else {
        return Err("connecting over TLS needs tls.ca_path and tls.server_name".into());
    };
    let client_config = tls::load_client_config(Path::new(ca_path))?;
    Ok(TlsEndpoint::connector(client_config, server_name)?)
}

fn start_echo(
    config: &HandlerConfig,
    role: Role,
    stream: TcpStream,
    peer: SocketAddr,
    endpoint: Option<TlsEndpoint>,
) -> ConnectionResult<()> {
    let owner = Arc::new(EchoService { peer });
    let handler = match endpoint {
        Some(endpoint) => ConnectionHandler::tls(
            Handle::current(),
            owner,
            role,
            stream,
            endpoint,
            &config.connection,
        )?,
        None => ConnectionHandler::plain(Handle::current(), owner, role, stream, &config.connection),
    };

    handler.set_read_callback(|service: &EchoService, handler, outcome, bytes| {
        if let Err(error) = outcome {
            tracing::info!(peer_addr = %service.peer, error = %error, "Connection ended");
            handler.close();
            return;
        }
        let echoed = handler
            .extract_message()
            .and_then(|message| {
                tracing::debug!(
                    peer_addr = %service.peer,
                    bytes,
                    message = %String::from_utf8_lossy(&message),
                    "Echoing message"
                );
                handler.begin_write(message)
            });
        if let Err(error) = echoed {
            tracing::warn!(peer_addr = %service.peer, error = %error, "Echo failed");
            handler.close();
        }
    });

    handler.set_write_callback(|service: &EchoService, handler, outcome, _| {
        match outcome.and_then(|()| handler.begin_read()) {
            Ok(()) => {}
            Err(error) => {
                tracing::warn!(peer_addr = %service.peer, error = %error, "Write failed");
                handler.close();
            }
        }
    });

    handler.set_handshake_callback(|service: &EchoService, _, outcome, _| {
        if let Err(error) = outcome {
            tracing::warn!(peer_addr = %service.peer, error = %error, "Rejected TLS client");
        }
    });

    tracing::info!(peer_addr = %peer, connection_id = %handler.id(), "Connection accepted");
    // The issued operation keeps the handler alive after this Arc drops.
    match handler.transport_kind() {
        TransportKind::Tls => handler.begin_handshake(),
        TransportKind::Plain => handler.begin_read(),
    }
}

async fn connect(config: HandlerConfig, addr: SocketAddr, message: String) -> Result<(), Box<dyn Error>> {
    let endpoint = config.tls.as_ref().map(client_endpoint).transpose()?;
    let stream = TcpStream::connect(addr).await?;
    let owner = Arc::new(EchoClient {
        message,
        done: Notify::new(),
    });

    let handler = match endpoint {
        Some(endpoint) => ConnectionHandler::tls(
            Handle::current(),
            Arc::clone(&owner),
            Role::Client,
            stream,
            endpoint,
            &config.connection,
        )?,
        None => ConnectionHandler::plain(
            Handle::current(),
            Arc::clone(&owner),
            Role::Client,
            stream,
            &config.connection,
        ),
    };

    handler.set_read_callback(|client: &EchoClient, handler, outcome, _| {
        match outcome.and_then(|()| handler.extract_message()) {
            Ok(reply) => println!("{}", String::from_utf8_lossy(&reply)),
            Err(error) => eprintln!("read failed: {error}"),
        }
        handler.close();
        client.done.notify_one();
    });

    handler.set_write_callback(|client: &EchoClient, handler, outcome, _| {
        if let Err(error) = outcome {
            eprintln!("write failed: {error}");
            handler.close();
            client.done.notify_one();
        }
    });

    handler.set_handshake_callback(|client: &EchoClient, _, outcome, _| {
        if let Err(error) = outcome {
            eprintln!("handshake failed: {error}");
            client.done.notify_one();
        }
    });

    handler.set_ready_callback(|client: &EchoClient, handler, _, _| {
        if let Err(error) = handler.begin_write(client.message.clone()) {
            eprintln!("write failed: {error}");
            handler.close();
            client.done.notify_one();
        }
    });

    match handler.transport_kind() {
        TransportKind::Tls => handler.begin_handshake()?,
        TransportKind::Plain => {
            handler.begin_read()?;
            handler.begin_write(owner.message.clone())?;
        }
    }
    drop(handler);

    owner.done.notified().await;
    Ok(())
}
