//! Known-vector regression tests (RFC 8032 §7.1)

use passport_core::{publish, KeyDefinition, KeyRegistry, PublicJwk, VisaSigner};

fn hex_to_bytes(hex: &str) -> Vec<u8> {
    (0..hex.len())
        .step_by(2)
        .map(|i| u8::from_str_radix(&hex[i..i + 2], 16).unwrap())
        .collect()
}

fn registry_for(seed_hex: &str) -> KeyRegistry {
    KeyRegistry::new(vec![KeyDefinition::ed25519("rfc", hex_to_bytes(seed_hex))]).unwrap()
}

fn signature_hex(registry: &KeyRegistry, message: &str) -> String {
    let visa = VisaSigner::new(registry).sign(message, "rfc").unwrap();
    visa.signature_bytes()
        .unwrap()
        .iter()
        .map(|b| format!("{:02x}", b))
        .collect()
}

fn published_x_hex(registry: &KeyRegistry) -> String {
    let jwks = publish(registry).unwrap();
    match jwks.find("rfc").unwrap() {
        PublicJwk::Okp { x, .. } => passport_core::crypto::b64url_decode(x)
            .unwrap()
            .iter()
            .map(|b| format!("{:02x}", b))
            .collect(),
        other => panic!("Expected OKP key, got {:?}", other),
    }
}

#[test]
fn rfc8032_test_1_empty_message() {
    let registry =
        registry_for("9d61b19deffd5a60ba844af492ec2cc44449c5697b326919703bac031cae7f60");

    assert_eq!(
        published_x_hex(&registry),
        "d75a980182b10ab7d54bfed3c964073a0ee172f3daa62325af021a68f707511a"
    );
    assert_eq!(
        signature_hex(&registry, ""),
        "e5564300c360ac729086e2cc806e828a84877f1eb8e5d974d873e065224901555fb8821590a33bacc61e39701cf9b46bd25bf5f0595bbe24655141438e7a100b"
    );
}

#[test]
fn rfc8032_test_2_single_byte() {
    let registry =
        registry_for("4ccd089b28ff96da9db6c346ec114e0f5b8a319f35aba624da8cf6ed4fb8a6fb");

    assert_eq!(
        published_x_hex(&registry),
        "3d4017c3e843895a92b70aa74d1b7ebc9c982ccf2ec4968cc0cd55f12af4660c"
    );
    // 0x72 is ASCII 'r'
    assert_eq!(
        signature_hex(&registry, "\u{72}"),
        "92a009a9f0d4cab8720e820b5f642540a2b27b5416503f8fb3762223ebdb69da085ac1e43e15996e458f3613d0f11d8c387b2eaeb4302aeeb00d291612bb0c00"
    );
}
