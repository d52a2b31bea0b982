use std::net::IpAddr;
use std::net::Ipv4Addr;
use std::net::SocketAddr;
use std::path::PathBuf;

use clap::Parser;

use crate::config::cluster::ClusterArgs;
use crate::infrastructure::server::TlsFiles;

#[derive(Parser, Debug, Clone)]
pub struct ServeArgs {
    #[arg(long, env = "PORT", default_value = "8443", help = "Port to listen on")]
    pub port: u16,

    #[arg(
        long,
        env = "WEBHOOK_BIND_ADDRESS",
        default_value_t = IpAddr::V4(Ipv4Addr::UNSPECIFIED),
        help = "Address to bind the webhook server to"
    )]
    pub bind_address: IpAddr,

    #[arg(
        long,
        env = "WEBHOOK_TLS_CERT_FILE",
        default_value = "/etc/webhook/certs/tls.crt",
        value_hint = clap::ValueHint::FilePath,
        help = "PEM encoded serving certificate"
    )]
    pub tls_cert_file: PathBuf,

    #[arg(
        long,
        env = "WEBHOOK_TLS_KEY_FILE",
        default_value = "/etc/webhook/certs/tls.key",
        value_hint = clap::ValueHint::FilePath,
        help = "PEM encoded private key for the serving certificate"
    )]
    pub tls_key_file: PathBuf,

    #[arg(
        long,
        env = "WEBHOOK_ENABLE_TLS",
        help = "Serve over TLS; the API server only calls webhooks over HTTPS",
        default_value_t = true,
        action = clap::ArgAction::Set
    )]
    pub enable_tls: bool,

    #[command(flatten)]
    pub cluster: ClusterArgs,
}

impl ServeArgs {
    pub const fn listen_addr(&self) -> SocketAddr {
        SocketAddr::new(self.bind_address, self.port)
    }

    pub fn tls_files(&self) -> Option<TlsFiles> {
        self.enable_tls.then(|| TlsFiles {
            cert: self.tls_cert_file.clone(),
            key: self.tls_key_file.clone(),
        })
    }
}
