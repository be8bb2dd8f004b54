use std::fs::File;
use std::io::BufReader;
use std::path::Path;

use rustls::pki_types::CertificateDer;
use rustls::ServerConfig;

use crate::config::TlsPaths;
use crate::error::TlsError;

/// Checks that the certificate chain and key load into a usable server
/// config before the server commits to serving HTTPS/WSS.
pub fn load_tls_config(paths: &TlsPaths) -> Result<ServerConfig, TlsError> {
    let certs = load_certs(&paths.cert)?;

    let mut key_reader = BufReader::new(File::open(&paths.key)?);
    let key = rustls_pemfile::private_key(&mut key_reader)?.ok_or(TlsError::NoPrivateKey)?;

    let config = ServerConfig::builder()
        .with_no_client_auth()
        .with_single_cert(certs, key)?;
    Ok(config)
}

fn load_certs(path: &Path) -> Result<Vec<CertificateDer<'static>>, TlsError> {
    let mut reader = BufReader::new(File::open(path)?);
    let certs = rustls_pemfile::certs(&mut reader).collect::<Result<Vec<_>, _>>()?;
    if certs.is_empty() {
        return Err(TlsError::NoCertificates);
    }
    Ok(certs)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_files_are_reported() {
        let paths = TlsPaths {
            cert: "does/not/exist.pem".into(),
            key: "does/not/exist.key".into(),
        };
        assert!(matches!(load_tls_config(&paths), Err(TlsError::Io(_))));
    }

    #[test]
    fn file_without_certificates_is_rejected() {
        let dir = std::env::temp_dir().join(format!("presence-relay-tls-{}", std::process::id()));
        std::fs::create_dir_all(&dir).unwrap();
        let cert = dir.join("empty.pem");
        std::fs::write(&cert, "not a certificate\n").unwrap();

        let paths = TlsPaths {
            cert,
            key: dir.join("missing.key"),
        };
        assert!(matches!(load_tls_config(&paths), Err(TlsError::NoCertificates)));
        std::fs::remove_dir_all(dir).ok();
    }
}
