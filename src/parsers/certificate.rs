use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use std::path::Path;
use tracing::{debug, warn};
use x509_parser::pem::parse_x509_pem;
use x509_parser::prelude::*;
use x509_parser::public_key::PublicKey;

use crate::signature::TrustAnchor;

#[derive(Debug)]
pub struct CertInfo {
    pub not_before: DateTime<Utc>,
    pub not_after: DateTime<Utc>,
    pub key_size_bits: u32,
    pub subject: String,
    /// DER-encoded `RSAPublicKey`.
    pub rsa_public_key: Vec<u8>,
}

impl CertInfo {
    pub fn is_valid_at(&self, now: DateTime<Utc>) -> bool {
        self.not_before <= now && now <= self.not_after
    }
}

/// Loads the certificate the metadata signature is checked against.
///
/// A certificate outside its validity window is still used, with a warning.
pub fn load_trust_anchor(path: &Path) -> Result<TrustAnchor> {
    let info = parse_pem_file(path)?;
    debug!(subject = %info.subject, bits = info.key_size_bits, "loaded metadata signing certificate");
    if info.key_size_bits < 2048 {
        warn!(
            bits = info.key_size_bits,
            "RSA keys shorter than 2048 bits are refused; verification will fail"
        );
    }
    if !info.is_valid_at(Utc::now()) {
        warn!(
            certificate = %path.display(),
            not_before = %info.not_before,
            not_after = %info.not_after,
            "metadata signing certificate is outside its validity period"
        );
    }
    Ok(TrustAnchor {
        subject: info.subject,
        public_key: info.rsa_public_key,
    })
}

pub fn parse_pem_file(path: &Path) -> Result<CertInfo> {
    let content = std::fs::read(path)
        .with_context(|| format!("Failed to read certificate {}", path.display()))?;
    parse_pem_bytes(&content).with_context(|| format!("Invalid certificate {}", path.display()))
}

pub fn parse_pem_bytes(data: &[u8]) -> Result<CertInfo> {
    let (_, pem) = parse_x509_pem(data).map_err(|e| anyhow::anyhow!("PEM parse error: {}", e))?;
    let (_, cert) = X509Certificate::from_der(&pem.contents)
        .map_err(|e| anyhow::anyhow!("X509 parse error: {}", e))?;

    let not_before = cert.validity().not_before.to_datetime();
    let not_after = cert.validity().not_after.to_datetime();

    let key_size_bits = match cert.public_key().parsed() {
        Ok(PublicKey::RSA(rsa)) => rsa.key_size() as u32,
        Ok(_) => anyhow::bail!("Metadata signing certificate must carry an RSA key"),
        Err(e) => anyhow::bail!("Unreadable public key: {}", e),
    };

    Ok(CertInfo {
        not_before: DateTime::from_timestamp(not_before.unix_timestamp(), 0).unwrap_or_default(),
        not_after: DateTime::from_timestamp(not_after.unix_timestamp(), 0).unwrap_or_default(),
        key_size_bits,
        subject: cert.subject().to_string(),
        rsa_public_key: cert.public_key().subject_public_key.data.to_vec(),
    })
}
