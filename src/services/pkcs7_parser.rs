//! PKCS#7 parser service.
//!
//! Decodes a DER `ContentInfo` carrying a detached `SignedData` into a
//! [`SignedDataView`]. Attribute bytes are kept verbatim so the signature can
//! be checked over exactly what the signer signed.

use der::{Decode, Encode};
use x509_cert::Certificate;

use crate::{
    domain::{
        constants,
        crypto::HashAlgorithm,
        pkcs7::{encoding::{tlv, Tlv}, SignedAttributeSet, SignedDataView, SignerInfoView},
    },
    SigningError, SigningResult,
};

fn malformed(message: impl Into<String>) -> SigningError {
    SigningError::MalformedPkcs7(message.into())
}

fn digest_algorithm(alg_id: &Tlv<'_>) -> SigningResult<HashAlgorithm> {
    let (alg_oid, _) = Tlv::expect(alg_id.value, constants::ASN1_OID_TAG, "digest algorithm")?;
    HashAlgorithm::from_oid_bytes(alg_oid.value).ok_or_else(|| {
        malformed(format!(
            "unsupported digest algorithm {}",
            hex::encode(alg_oid.value)
        ))
    })
}

/// Total encoded length of the leading element, for stripping trailing padding.
pub fn encoded_len(der: &[u8]) -> SigningResult<usize> {
    let (element, _) = Tlv::parse(der)?;
    Ok(element.raw.len())
}

/// Decode a `ContentInfo { signedData, [0] SignedData }`.
pub fn parse_signed_data(der: &[u8]) -> SigningResult<SignedDataView> {
    let (content_info, trailing) = Tlv::expect(der, constants::ASN1_SEQUENCE_TAG, "ContentInfo")?;
    if !trailing.is_empty() {
        return Err(malformed(format!(
            "{} unexpected bytes after ContentInfo",
            trailing.len()
        )));
    }

    let (content_type, rest) =
        Tlv::expect(content_info.value, constants::ASN1_OID_TAG, "contentType")?;
    if content_type.value != constants::PKCS7_SIGNED_DATA_OID {
        return Err(malformed("content type is not signedData"));
    }
    let (explicit, _) = Tlv::expect(rest, constants::ASN1_CONTEXT_0_TAG, "content")?;
    let (signed_data, _) =
        Tlv::expect(explicit.value, constants::ASN1_SEQUENCE_TAG, "SignedData")?;

    let mut fields = signed_data.children();
    let mut next = |what: &str| {
        fields
            .next()
            .unwrap_or_else(|| Err(malformed(format!("SignedData is missing {what}"))))
    };

    let version = next("version")?;
    if version.tag != constants::ASN1_INTEGER_TAG {
        return Err(malformed("SignedData version is not an INTEGER"));
    }

    let digest_set = next("digestAlgorithms")?;
    if digest_set.tag != constants::ASN1_SET_TAG {
        return Err(malformed("digestAlgorithms is not a SET"));
    }
    let digest_algorithms = digest_set
        .children()
        .map(|alg| alg.and_then(|alg| digest_algorithm(&alg)))
        .collect::<SigningResult<Vec<_>>>()?;

    let encap = next("encapContentInfo")?;
    if encap.tag != constants::ASN1_SEQUENCE_TAG {
        return Err(malformed("encapContentInfo is not a SEQUENCE"));
    }

    let mut certificates = Vec::new();
    let mut element = next("signerInfos")?;
    if element.tag == constants::ASN1_CONTEXT_0_TAG {
        for cert in element.children() {
            certificates.push(cert?.raw.to_vec());
        }
        element = next("signerInfos")?;
    }
    if element.tag == constants::ASN1_CONTEXT_1_TAG {
        element = next("signerInfos")?; // crls, unused
    }
    if element.tag != constants::ASN1_SET_TAG {
        return Err(malformed("signerInfos is not a SET"));
    }

    let signer_infos = element.child_vec()?;
    let signer = match signer_infos.as_slice() {
        [only] => parse_signer_info(only)?,
        [] => return Err(malformed("no SignerInfo present")),
        many => {
            return Err(malformed(format!(
                "expected one SignerInfo, found {}",
                many.len()
            )))
        }
    };

    Ok(SignedDataView {
        digest_algorithms,
        certificates,
        signer,
    })
}

fn parse_signer_info(signer_info: &Tlv<'_>) -> SigningResult<SignerInfoView> {
    if signer_info.tag != constants::ASN1_SEQUENCE_TAG {
        return Err(malformed("SignerInfo is not a SEQUENCE"));
    }
    let parts = signer_info.child_vec()?;
    let [version, sid, digest_alg, attrs, sig_alg, signature, ..] = parts.as_slice() else {
        return Err(malformed(format!(
            "SignerInfo has {} fields; authenticated attributes are required",
            parts.len()
        )));
    };

    if version.tag != constants::ASN1_INTEGER_TAG {
        return Err(malformed("SignerInfo version is not an INTEGER"));
    }
    if sid.tag != constants::ASN1_SEQUENCE_TAG {
        return Err(malformed("only issuerAndSerialNumber signer identifiers are supported"));
    }
    if attrs.tag != constants::ASN1_CONTEXT_0_TAG {
        return Err(malformed("authenticated attributes missing"));
    }
    if signature.tag != constants::ASN1_OCTET_STRING_TAG {
        return Err(malformed("signature is not an OCTET STRING"));
    }
    let (sig_alg_oid, _) =
        Tlv::expect(sig_alg.value, constants::ASN1_OID_TAG, "signature algorithm")?;

    Ok(SignerInfoView {
        issuer_and_serial: sid.raw.to_vec(),
        digest_algorithm: digest_algorithm(digest_alg)?,
        signed_attributes: SignedAttributeSet::from_implicit(attrs)?,
        signature_algorithm: sig_alg_oid.value.to_vec(),
        signature: signature.value.to_vec(),
    })
}

/// The certificate matching the signer's issuer and serial, else the first one carried.
pub fn signer_certificate(view: &SignedDataView) -> SigningResult<&[u8]> {
    let matching = view.certificates.iter().find(|der| {
        Certificate::from_der(der)
            .ok()
            .and_then(|cert| {
                let issuer = cert.tbs_certificate.issuer.to_der().ok()?;
                let serial = cert.tbs_certificate.serial_number.to_der().ok()?;
                let mut body = issuer;
                body.extend_from_slice(&serial);
                Some(tlv(constants::ASN1_SEQUENCE_TAG, &body))
            })
            .is_some_and(|sid| sid == view.signer.issuer_and_serial)
    });

    matching
        .or_else(|| view.certificates.first())
        .map(Vec::as_slice)
        .ok_or_else(|| malformed("no certificate embedded in the signature"))
}
