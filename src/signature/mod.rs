//! Enveloped XML signature verification for metadata documents.
//!
//! The document digest is computed over the exclusive canonical form of the
//! document element with the signature removed, and the signature value is
//! checked over the canonical `SignedInfo` with the trusted RSA key.

pub mod c14n;

use aws_lc_rs::digest;
use aws_lc_rs::signature::{self as rsa, UnparsedPublicKey, VerificationAlgorithm};
use base64::Engine;
use thiserror::Error;
use tracing::{info, warn};

use crate::model::metadata::DSIG_NS;
use crate::model::xml::{children_named, NamespaceScope, XmlDocument, XmlElement, XmlNode};

/// Public key the metadata signature must verify against.
#[derive(Debug, Clone)]
pub struct TrustAnchor {
    pub subject: String,
    /// RSA public key, DER-encoded `RSAPublicKey`.
    pub public_key: Vec<u8>,
}

#[derive(Debug, Error, PartialEq)]
pub enum SignatureError {
    #[error("no signature found in metadata")]
    Missing,
    #[error("malformed signature: {0}")]
    Malformed(String),
    #[error("unsupported algorithm {0}")]
    UnsupportedAlgorithm(String),
    #[error("digest value does not match the document")]
    DigestMismatch,
    #[error("signature value does not verify against the trusted key")]
    SignatureMismatch,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum DigestAlgorithm {
    Sha1,
    Sha256,
    Sha384,
    Sha512,
}

impl DigestAlgorithm {
    /// An absent `DigestMethod` means SHA-1.
    fn from_uri(uri: Option<&str>) -> Result<Self, SignatureError> {
        match uri {
            None | Some("http://www.w3.org/2000/09/xmldsig#sha1") => Ok(Self::Sha1),
            Some("http://www.w3.org/2001/04/xmlenc#sha256") => Ok(Self::Sha256),
            Some("http://www.w3.org/2001/04/xmldsig-more#sha384") => Ok(Self::Sha384),
            Some("http://www.w3.org/2001/04/xmlenc#sha512") => Ok(Self::Sha512),
            Some(other) => Err(SignatureError::UnsupportedAlgorithm(other.to_string())),
        }
    }

    fn digest(self, data: &[u8]) -> Vec<u8> {
        let algorithm = match self {
            Self::Sha1 => &digest::SHA1_FOR_LEGACY_USE_ONLY,
            Self::Sha256 => &digest::SHA256,
            Self::Sha384 => &digest::SHA384,
            Self::Sha512 => &digest::SHA512,
        };
        digest::digest(algorithm, data).as_ref().to_vec()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum SignatureAlgorithm {
    RsaSha1,
    RsaSha256,
    RsaSha384,
    RsaSha512,
}

impl SignatureAlgorithm {
    /// An absent `SignatureMethod` means RSA-SHA1.
    fn from_uri(uri: Option<&str>) -> Result<Self, SignatureError> {
        match uri {
            None | Some("http://www.w3.org/2000/09/xmldsig#rsa-sha1") => Ok(Self::RsaSha1),
            Some("http://www.w3.org/2001/04/xmldsig-more#rsa-sha256") => Ok(Self::RsaSha256),
            Some("http://www.w3.org/2001/04/xmldsig-more#rsa-sha384") => Ok(Self::RsaSha384),
            Some("http://www.w3.org/2001/04/xmldsig-more#rsa-sha512") => Ok(Self::RsaSha512),
            Some(other) => Err(SignatureError::UnsupportedAlgorithm(other.to_string())),
        }
    }

    fn verification(self) -> &'static dyn VerificationAlgorithm {
        match self {
            Self::RsaSha1 => &rsa::RSA_PKCS1_2048_8192_SHA1_FOR_LEGACY_USE_ONLY,
            Self::RsaSha256 => &rsa::RSA_PKCS1_2048_8192_SHA256,
            Self::RsaSha384 => &rsa::RSA_PKCS1_2048_8192_SHA384,
            Self::RsaSha512 => &rsa::RSA_PKCS1_2048_8192_SHA512,
        }
    }
}

/// Verifies the document signature and removes the signature element.
///
/// The signature element is removed whatever the outcome. Without a trust
/// anchor nothing is checked and the document counts as verified. With a
/// trust anchor, a missing signature fails.
pub fn verify(doc: &mut XmlDocument, anchor: Option<&TrustAnchor>) -> bool {
    let signature = take_signature(&mut doc.root, &NamespaceScope::default());

    let Some(anchor) = anchor else {
        if signature.is_some() {
            warn!("metadata signature not verified but removed");
        }
        return true;
    };

    let result = match signature {
        Some((element, scope)) => check(&doc.root, &element, &scope, anchor),
        None => Err(SignatureError::Missing),
    };
    match result {
        Ok(()) => {
            info!(signer = %anchor.subject, "signature verification OK");
            true
        }
        Err(e) => {
            warn!(error = %e, "signature verification failed");
            false
        }
    }
}

/// Detaches the first `ds:Signature` below `parent` in document order and
/// returns it with the namespace scope it was in.
fn take_signature(
    parent: &mut XmlElement,
    parent_scope: &NamespaceScope,
) -> Option<(XmlElement, NamespaceScope)> {
    let own_scope = parent_scope.enter(parent);
    for i in 0..parent.children.len() {
        let XmlNode::Element(child) = &parent.children[i] else {
            continue;
        };
        let child_scope = own_scope.enter(child);
        if child_scope.is(child, DSIG_NS, "Signature") {
            if let XmlNode::Element(signature) = parent.children.remove(i) {
                return Some((signature, own_scope));
            }
            return None;
        }
        if let XmlNode::Element(child) = &mut parent.children[i] {
            if let Some(found) = take_signature(child, &own_scope) {
                return Some(found);
            }
        }
    }
    None
}

/// `scope` is the scope of the signature's parent.
fn check(
    root: &XmlElement,
    signature: &XmlElement,
    scope: &NamespaceScope,
    anchor: &TrustAnchor,
) -> Result<(), SignatureError> {
    let sig_scope = scope.enter(signature);
    let signed_info = ds_child(signature, &sig_scope, "SignedInfo")?;
    let signature_value = ds_child(signature, &sig_scope, "SignatureValue")?.text();

    let si_scope = sig_scope.enter(signed_info);
    let reference = ds_child(signed_info, &si_scope, "Reference")?;
    let signature_method = ds_child(signed_info, &si_scope, "SignatureMethod")
        .ok()
        .and_then(|m| m.attr("Algorithm"));

    let ref_scope = si_scope.enter(reference);
    let digest_value = ds_child(reference, &ref_scope, "DigestValue")?.text();
    let digest_method = ds_child(reference, &ref_scope, "DigestMethod")
        .ok()
        .and_then(|m| m.attr("Algorithm"));

    let digest_algorithm = DigestAlgorithm::from_uri(digest_method)?;
    let signature_algorithm = SignatureAlgorithm::from_uri(signature_method)?;

    info!("canonicalizing metadata; large documents take a while");
    let canonical = c14n::canonicalize(root, &NamespaceScope::default());
    info!(bytes = canonical.len(), "canonicalization finished");

    if digest_algorithm.digest(canonical.as_bytes()) != decode(&digest_value)? {
        return Err(SignatureError::DigestMismatch);
    }

    let canonical_signed_info = c14n::canonicalize(signed_info, &sig_scope);
    let public_key = UnparsedPublicKey::new(signature_algorithm.verification(), &anchor.public_key);
    public_key
        .verify(canonical_signed_info.as_bytes(), &decode(&signature_value)?)
        .map_err(|_| SignatureError::SignatureMismatch)
}

fn ds_child<'a>(
    parent: &'a XmlElement,
    scope: &NamespaceScope,
    local: &str,
) -> Result<&'a XmlElement, SignatureError> {
    children_named(parent, scope, DSIG_NS, local)
        .into_iter()
        .next()
        .ok_or_else(|| SignatureError::Malformed(format!("missing {}", local)))
}

fn decode(value: &str) -> Result<Vec<u8>, SignatureError> {
    let compact: String = value.chars().filter(|c| !c.is_whitespace()).collect();
    base64::engine::general_purpose::STANDARD
        .decode(compact)
        .map_err(|e| SignatureError::Malformed(format!("invalid base64: {}", e)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parsers::metadata::parse_str;
    use aws_lc_rs::rand::SystemRandom;
    use aws_lc_rs::rsa::KeySize;
    use aws_lc_rs::signature::{
        KeyPair, RsaKeyPair, RSA_PKCS1_SHA1_FOR_LEGACY_USE_ONLY, RSA_PKCS1_SHA256,
    };

    const UNSIGNED: &str = r#"<md:EntitiesDescriptor xmlns:md="urn:oasis:names:tc:SAML:2.0:metadata" ID="fed" Name="urn:fed">
  <md:EntityDescriptor entityID="https://idp.example.org/idp">
    <md:IDPSSODescriptor protocolSupportEnumeration="urn:oasis:names:tc:SAML:2.0:protocol"/>
  </md:EntityDescriptor>
</md:EntitiesDescriptor>"#;

    fn b64(data: &[u8]) -> String {
        base64::engine::general_purpose::STANDARD.encode(data)
    }

    fn anchor(key_pair: &RsaKeyPair) -> TrustAnchor {
        TrustAnchor {
            subject: "CN=test signer".to_string(),
            public_key: key_pair.public_key().as_ref().to_vec(),
        }
    }

    /// Signs `xml` with an enveloped RSA-SHA256 signature and returns the
    /// serialized signed document.
    fn sign(xml: &str, key_pair: &RsaKeyPair) -> String {
        sign_with(xml, key_pair, false)
    }

    /// `legacy` signs with RSA-SHA1 and a SHA-1 digest and leaves out both
    /// `SignatureMethod` and `DigestMethod`.
    fn sign_with(xml: &str, key_pair: &RsaKeyPair, legacy: bool) -> String {
        let mut doc = parse_str(xml).unwrap();
        let canonical = c14n::canonicalize(&doc.root, &NamespaceScope::default());
        let (digest_algorithm, encoding) = if legacy {
            (DigestAlgorithm::Sha1, &RSA_PKCS1_SHA1_FOR_LEGACY_USE_ONLY)
        } else {
            (DigestAlgorithm::Sha256, &RSA_PKCS1_SHA256)
        };
        let digest = b64(&digest_algorithm.digest(canonical.as_bytes()));

        let (signature_method, digest_method) = if legacy {
            ("", "")
        } else {
            (
                r#"<ds:SignatureMethod Algorithm="http://www.w3.org/2001/04/xmldsig-more#rsa-sha256"/>"#,
                r#"<ds:DigestMethod Algorithm="http://www.w3.org/2001/04/xmlenc#sha256"/>"#,
            )
        };
        let signature_xml = format!(
            r##"<ds:Signature xmlns:ds="http://www.w3.org/2000/09/xmldsig#"><ds:SignedInfo><ds:CanonicalizationMethod Algorithm="http://www.w3.org/2001/10/xml-exc-c14n#"/>{signature_method}<ds:Reference URI="#fed"><ds:Transforms><ds:Transform Algorithm="http://www.w3.org/2000/09/xmldsig#enveloped-signature"/></ds:Transforms>{digest_method}<ds:DigestValue>{digest}</ds:DigestValue></ds:Reference></ds:SignedInfo><ds:SignatureValue/></ds:Signature>"##
        );
        let mut signature = parse_str(&signature_xml).unwrap().root;

        let root_scope = NamespaceScope::default().enter(&doc.root);
        let sig_scope = root_scope.enter(&signature);
        let signed_info = signature.elements().next().unwrap();
        let canonical_signed_info = c14n::canonicalize(signed_info, &sig_scope);

        let rng = SystemRandom::new();
        let mut value = vec![0u8; key_pair.public_modulus_len()];
        key_pair
            .sign(encoding, &rng, canonical_signed_info.as_bytes(), &mut value)
            .unwrap();
        signature
            .elements_mut()
            .find(|e| e.local_name() == "SignatureValue")
            .unwrap()
            .set_text(b64(&value));

        doc.root.insert_first(signature);
        doc.root.to_xml()
    }

    fn key_pair() -> RsaKeyPair {
        RsaKeyPair::generate(KeySize::Rsa2048).unwrap()
    }

    #[test]
    fn valid_signature_verifies_and_is_removed() {
        let key_pair = key_pair();
        let mut doc = parse_str(&sign(UNSIGNED, &key_pair)).unwrap();
        assert!(doc.root.to_xml().contains("ds:Signature"));

        assert!(verify(&mut doc, Some(&anchor(&key_pair))));
        assert!(!doc.root.to_xml().contains("Signature"));
    }

    #[test]
    fn absent_methods_default_to_rsa_sha1() {
        let key_pair = key_pair();
        let signed = sign_with(UNSIGNED, &key_pair, true);
        assert!(!signed.contains("SignatureMethod"));
        assert!(!signed.contains("DigestMethod"));

        let mut doc = parse_str(&signed).unwrap();
        assert!(verify(&mut doc, Some(&anchor(&key_pair))));
    }

    #[test]
    fn tampered_document_fails() {
        let key_pair = key_pair();
        let signed = sign(UNSIGNED, &key_pair).replace("idp.example.org", "evil.example.org");
        let mut doc = parse_str(&signed).unwrap();
        assert!(!verify(&mut doc, Some(&anchor(&key_pair))));
        assert!(!doc.root.to_xml().contains("Signature"));
    }

    #[test]
    fn wrong_key_fails() {
        let signer = key_pair();
        let other = key_pair();
        let mut doc = parse_str(&sign(UNSIGNED, &signer)).unwrap();
        let scope = NamespaceScope::default();
        let (sig, sig_parent_scope) = take_signature(&mut doc.root, &scope).unwrap();
        assert_eq!(
            check(&doc.root, &sig, &sig_parent_scope, &anchor(&other)),
            Err(SignatureError::SignatureMismatch)
        );
    }

    #[test]
    fn no_anchor_counts_as_verified_but_strips_signature() {
        let key_pair = key_pair();
        let mut doc = parse_str(&sign(UNSIGNED, &key_pair)).unwrap();
        assert!(verify(&mut doc, None));
        assert!(!doc.root.to_xml().contains("Signature"));
    }

    #[test]
    fn anchor_without_signature_fails() {
        let key_pair = key_pair();
        let mut doc = parse_str(UNSIGNED).unwrap();
        assert!(!verify(&mut doc, Some(&anchor(&key_pair))));
    }

    #[test]
    fn unknown_digest_algorithm_is_rejected() {
        assert_eq!(
            DigestAlgorithm::from_uri(Some("urn:md5")),
            Err(SignatureError::UnsupportedAlgorithm("urn:md5".to_string()))
        );
        assert_eq!(DigestAlgorithm::from_uri(None), Ok(DigestAlgorithm::Sha1));
        assert_eq!(
            SignatureAlgorithm::from_uri(None),
            Ok(SignatureAlgorithm::RsaSha1)
        );
    }

    #[test]
    fn only_first_signature_is_removed() {
        let mut doc = parse_str(
            r#"<r xmlns:ds="http://www.w3.org/2000/09/xmldsig#"><a><ds:Signature/></a><ds:Signature/></r>"#,
        )
        .unwrap();
        let (_, scope) = take_signature(&mut doc.root, &NamespaceScope::default()).unwrap();
        assert_eq!(scope.resolve("ds"), Some(DSIG_NS));
        assert_eq!(doc.root.to_xml(), r#"<r xmlns:ds="http://www.w3.org/2000/09/xmldsig#"><a/><ds:Signature/></r>"#);
    }
}
