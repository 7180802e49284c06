//! # CA Bundle Validation
//!
//! Structural checks for a CA bundle read from disk: a concatenation of PEM
//! blocks, each labelled `CERTIFICATE`, each carrying a well-formed X.509
//! certificate. Validity periods, chains and revocation are not checked.

use crate::constants::CERTIFICATE_PEM_TAG;
use crate::error::CaBundleError;

/// Validate a CA bundle, returning the number of certificates it contains
pub fn validate_ca_bundle(bundle: &[u8]) -> Result<usize, CaBundleError> {
    let blocks =
        pem::parse_many(bundle).map_err(|e| CaBundleError::MalformedEncoding(e.to_string()))?;

    if blocks.is_empty() {
        return Err(CaBundleError::MalformedEncoding(
            "no PEM blocks found".to_string(),
        ));
    }

    for (index, block) in blocks.iter().enumerate() {
        if block.tag() != CERTIFICATE_PEM_TAG {
            return Err(CaBundleError::UnexpectedBlockType(block.tag().to_string()));
        }

        match x509_parser::parse_x509_certificate(block.contents()) {
            Ok((rest, _)) if rest.is_empty() => {}
            Ok((rest, _)) => {
                return Err(CaBundleError::CertificateParse {
                    index,
                    reason: format!("{} bytes of trailing data", rest.len()),
                });
            }
            Err(e) => {
                return Err(CaBundleError::CertificateParse {
                    index,
                    reason: e.to_string(),
                });
            }
        }
    }

    Ok(blocks.len())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cert_pem(name: &str) -> String {
        rcgen::generate_simple_self_signed(vec![name.to_string()])
            .unwrap()
            .cert
            .pem()
    }

    #[test]
    fn test_single_certificate_is_valid() {
        let bundle = cert_pem("ca.example.com");
        assert_eq!(validate_ca_bundle(bundle.as_bytes()), Ok(1));
    }

    #[test]
    fn test_concatenated_certificates_are_valid() {
        for n in 1..=4 {
            let bundle: String = (0..n).map(|i| cert_pem(&format!("ca{i}.example.com"))).collect();
            assert_eq!(validate_ca_bundle(bundle.as_bytes()), Ok(n));
        }
    }

    #[test]
    fn test_no_pem_blocks_is_malformed() {
        for input in [&b""[..], b"not a certificate", b"\x00\xff\x10", b"-----BEGIN"] {
            assert!(
                matches!(
                    validate_ca_bundle(input),
                    Err(CaBundleError::MalformedEncoding(_))
                ),
                "input {input:?} should be malformed"
            );
        }
    }

    #[test]
    fn test_private_key_block_is_rejected() {
        let key = rcgen::KeyPair::generate().unwrap().serialize_pem();
        assert_eq!(
            validate_ca_bundle(key.as_bytes()),
            Err(CaBundleError::UnexpectedBlockType("PRIVATE KEY".to_string()))
        );
    }

    #[test]
    fn test_key_after_certificate_is_rejected() {
        let mut bundle = cert_pem("ca.example.com");
        bundle.push_str(&rcgen::KeyPair::generate().unwrap().serialize_pem());
        assert!(matches!(
            validate_ca_bundle(bundle.as_bytes()),
            Err(CaBundleError::UnexpectedBlockType(_))
        ));
    }

    #[test]
    fn test_garbage_certificate_payload_is_rejected() {
        let bundle = pem::encode(&pem::Pem::new("CERTIFICATE", b"definitely not DER".to_vec()));
        assert!(matches!(
            validate_ca_bundle(bundle.as_bytes()),
            Err(CaBundleError::CertificateParse { index: 0, .. })
        ));
    }

    #[test]
    fn test_second_certificate_failure_reports_index() {
        let mut bundle = cert_pem("ca.example.com");
        bundle.push_str(&pem::encode(&pem::Pem::new("CERTIFICATE", vec![0x30, 0x00])));
        assert!(matches!(
            validate_ca_bundle(bundle.as_bytes()),
            Err(CaBundleError::CertificateParse { index: 1, .. })
        ));
    }
}
