use crate::error::{Error, Result};
use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use sha1::{Digest, Sha1};

const PEM_BEGIN: &str = "-----BEGIN CERTIFICATE-----";
const PEM_END: &str = "-----END CERTIFICATE-----";

/// Strip separators and case so `ab:cd` and `ABCD` compare equal.
pub fn normalize_fingerprint(fingerprint: &str) -> String {
    fingerprint
        .chars()
        .filter(|c| c.is_ascii_hexdigit())
        .map(|c| c.to_ascii_uppercase())
        .collect()
}

/// Decode the first certificate block of a PEM document into DER bytes.
pub fn pem_to_der(pem: &str) -> Result<Vec<u8>> {
    let start = pem
        .find(PEM_BEGIN)
        .ok_or_else(|| Error::Parse("no PEM certificate block found".to_string()))?;
    let body = &pem[start + PEM_BEGIN.len()..];
    let end = body
        .find(PEM_END)
        .ok_or_else(|| Error::Parse("unterminated PEM certificate block".to_string()))?;
    let encoded: String = body[..end].chars().filter(|c| !c.is_whitespace()).collect();

    STANDARD
        .decode(encoded.as_bytes())
        .map_err(|e| Error::Parse(format!("invalid PEM body: {}", e)))
}

/// SHA-1 fingerprint of a DER certificate, formatted as `AA:BB:...`.
pub fn sha1_fingerprint(der: &[u8]) -> String {
    Sha1::digest(der)
        .iter()
        .map(|b| format!("{:02X}", b))
        .collect::<Vec<_>>()
        .join(":")
}

/// Check that `pem` is the certificate announced with `expected` fingerprint.
pub fn verify_fingerprint(server: &str, pem: &str, expected: &str) -> Result<()> {
    let der = pem_to_der(pem).map_err(|e| Error::Certificate {
        server: server.to_string(),
        reason: e.to_string(),
    })?;
    let actual = sha1_fingerprint(&der);

    if normalize_fingerprint(&actual) != normalize_fingerprint(expected) {
        return Err(Error::Certificate {
            server: server.to_string(),
            reason: format!("fingerprint mismatch: expected {}, got {}", expected, actual),
        });
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    const FIXTURE: &str = include_str!("../../tests/fixtures/smt.pem");
    const FIXTURE_FINGERPRINT: &str =
        "82:D2:4E:DF:04:12:13:61:1D:99:21:30:81:D9:E8:ED:27:11:28:34";

    #[test]
    fn test_fixture_fingerprint() {
        let der = pem_to_der(FIXTURE).unwrap();
        assert_eq!(sha1_fingerprint(&der), FIXTURE_FINGERPRINT);
    }

    #[test]
    fn test_verify_accepts_lowercase_without_colons() {
        let expected = FIXTURE_FINGERPRINT.replace(':', "").to_lowercase();
        verify_fingerprint("smt", FIXTURE, &expected).unwrap();
    }

    #[test]
    fn test_verify_rejects_mismatch() {
        let err = verify_fingerprint("smt", FIXTURE, "00:11").unwrap_err();
        assert!(matches!(err, Error::Certificate { .. }));
        assert!(err.to_string().contains("fingerprint mismatch"));
    }

    #[test]
    fn test_not_a_pem() {
        assert!(pem_to_der("hello").is_err());
        assert!(pem_to_der("-----BEGIN CERTIFICATE-----\nabc").is_err());
    }
}
