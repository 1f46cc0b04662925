//! Decodes a fetched payload into the CRL validity window.
//!
//! Works on bytes only, no network: the fetcher hands over the payload and
//! this module either produces the timestamps or a decode error. DER is the
//! authoritative encoding; a PEM armored CRL is unwrapped first since some
//! distribution points serve the armored form.

use chrono::{DateTime, TimeZone, Utc};
use thiserror::Error;
use x509_parser::pem::parse_x509_pem;
use x509_parser::prelude::*;

const PEM_MARKER: &[u8] = b"-----BEGIN";
const PEM_CRL_LABEL: &str = "X509 CRL";

#[derive(Debug, Error)]
pub enum DecodeError {
    #[error("payload is not a DER encoded CRL: {0}")]
    Der(String),
    #[error("PEM armor could not be unwrapped: {0}")]
    Pem(String),
    #[error("PEM payload is labelled {0:?}, not an X509 CRL")]
    PemLabel(String),
    #[error("CRL carries no nextUpdate field")]
    MissingNextUpdate,
    #[error("CRL timestamp is outside the representable range")]
    TimestampRange,
    #[error("{0} trailing bytes after the CRL structure")]
    TrailingData(usize),
}

/// The fields of a revocation list this check evaluates.
#[derive(Debug, Clone)]
pub struct CrlInfo {
    pub this_update: DateTime<Utc>,
    pub next_update: DateTime<Utc>,
    pub issuer: String,
}

/// Decode a CRL payload, DER or PEM armored.
pub fn decode_crl(payload: &[u8]) -> Result<CrlInfo, DecodeError> {
    if payload.starts_with(PEM_MARKER) {
        let (_, pem) = parse_x509_pem(payload).map_err(|err| DecodeError::Pem(err.to_string()))?;
        if pem.label != PEM_CRL_LABEL {
            return Err(DecodeError::PemLabel(pem.label));
        }
        return decode_der(&pem.contents);
    }
    decode_der(payload)
}

fn decode_der(der: &[u8]) -> Result<CrlInfo, DecodeError> {
    let (rem, crl) = CertificateRevocationList::from_der(der)
        .map_err(|err| DecodeError::Der(err.to_string()))?;
    if !rem.is_empty() {
        return Err(DecodeError::TrailingData(rem.len()));
    }

    let next_update = crl.next_update().ok_or(DecodeError::MissingNextUpdate)?;

    Ok(CrlInfo {
        this_update: to_utc(crl.last_update())?,
        next_update: to_utc(next_update)?,
        issuer: crl.tbs_cert_list.issuer.to_string(),
    })
}

fn to_utc(time: ASN1Time) -> Result<DateTime<Utc>, DecodeError> {
    Utc.timestamp_opt(time.timestamp(), 0)
        .single()
        .ok_or(DecodeError::TimestampRange)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn garbage_is_a_der_error() {
        let err = decode_crl(b"certainly not a revocation list").unwrap_err();
        assert!(matches!(err, DecodeError::Der(_)));
    }

    #[test]
    fn empty_payload_is_a_der_error() {
        let err = decode_crl(b"").unwrap_err();
        assert!(matches!(err, DecodeError::Der(_)));
    }

    #[test]
    fn broken_armor_is_a_pem_error() {
        let payload = b"-----BEGIN X509 CRL-----\n%%% not base64 %%%\n-----END X509 CRL-----\n";
        let err = decode_crl(payload).unwrap_err();
        assert!(matches!(err, DecodeError::Pem(_)));
    }

    #[test]
    fn wrong_pem_label_is_rejected() {
        let payload = b"-----BEGIN CERTIFICATE-----\nAAAA\n-----END CERTIFICATE-----\n";
        let err = decode_crl(payload).unwrap_err();
        assert!(matches!(err, DecodeError::PemLabel(_)));
    }
}
