//! TOFU integration tests
//!
//! Exercises the credential trust evaluator against real rcgen-generated
//! certificates and a file-backed store on disk.

use std::sync::Arc;

use pretty_assertions::assert_eq;
use rcgen::{CertificateParams, DistinguishedName, DnType, KeyPair, date_time_ymd};
use tempfile::TempDir;
use time::OffsetDateTime;

use spoolgate::config::TrustConfig;
use spoolgate::trust::credentials::Credentials;
use spoolgate::trust::store::TrustStore;
use spoolgate::trust::{Trust, TrustEvaluator};

const CN: &str = "printer.example.com";

fn cert_pem(cn: &str, from_year: i32, to_year: i32) -> String {
    let mut params = CertificateParams::default();
    let mut dn = DistinguishedName::new();
    dn.push(DnType::CommonName, cn);
    params.distinguished_name = dn;
    params.not_before = date_time_ymd(from_year, 1, 1);
    params.not_after = date_time_ymd(to_year, 1, 1);

    let key_pair = KeyPair::generate().unwrap();
    params.self_signed(&key_pair).unwrap().pem()
}

fn at(year: i32) -> OffsetDateTime {
    // rcgen's helper already yields a UTC OffsetDateTime
    date_time_ymd(year, 6, 1)
}

// ── scenario D: first use of a self-signed cert ─────────────────────────────

#[test]
fn first_use_self_signed_unexpired_is_trusted() {
    let dir = TempDir::new().unwrap();
    let eval = TrustEvaluator::new(
        TrustConfig::default(),
        Arc::new(TrustStore::new(dir.path())),
    );

    let creds = Credentials::new(cert_pem(CN, 2020, 2030));
    assert_eq!(eval.evaluate_at(CN, &creds, false, at(2025)), Trust::Ok);
}

// ── scenario E: replacement with an older expiration ────────────────────────

#[test]
fn replacement_with_older_expiration_is_invalid() {
    let dir = TempDir::new().unwrap();
    let store = Arc::new(TrustStore::new(dir.path()));
    store.save(CN, &cert_pem(CN, 2020, 2024)).unwrap();

    let eval = TrustEvaluator::new(TrustConfig::default(), store);
    let replacement = Credentials::new(cert_pem(CN, 2020, 2023));

    assert_eq!(
        eval.evaluate_at(CN, &replacement, false, at(2025)),
        Trust::Invalid
    );
}

// ── scenario F: renewal after the stored record expired ─────────────────────

#[test]
fn renewal_replaces_an_expired_stored_record() {
    let dir = TempDir::new().unwrap();
    let store = Arc::new(TrustStore::new(dir.path()));
    store.save(CN, &cert_pem(CN, 2018, 2022)).unwrap();

    let eval = TrustEvaluator::new(TrustConfig::default(), Arc::clone(&store));
    let renewal = Credentials::new(cert_pem(CN, 2023, 2033));

    assert_eq!(
        eval.evaluate_at(CN, &renewal, false, at(2025)),
        Trust::Renewed
    );
    // The store now holds the new certificate
    assert_eq!(store.load(CN).as_deref(), Some(renewal.pem()));
}

// ── TOFU lifecycle across evaluations ───────────────────────────────────────

#[test]
fn remembered_credentials_keep_matching_across_evaluators() {
    let dir = TempDir::new().unwrap();
    let creds = Credentials::new(cert_pem(CN, 2020, 2030));

    // First contact remembers the cert
    {
        let eval = TrustEvaluator::new(
            TrustConfig::default(),
            Arc::new(TrustStore::new(dir.path())),
        );
        assert_eq!(eval.evaluate_at(CN, &creds, false, at(2025)), Trust::Ok);
    }

    // A fresh evaluator over the same directory sees the record
    let eval = TrustEvaluator::new(
        TrustConfig::default(),
        Arc::new(TrustStore::new(dir.path())),
    );
    assert_eq!(eval.evaluate_at(CN, &creds, false, at(2025)), Trust::Ok);

    // A different key pair under the same name is no longer first use;
    // same expiration means it is not a renewal either
    let impostor = Credentials::new(cert_pem(CN, 2020, 2030));
    assert_eq!(
        eval.evaluate_at(CN, &impostor, false, at(2025)),
        Trust::Invalid
    );
}

#[test]
fn each_common_name_gets_its_own_record() {
    let dir = TempDir::new().unwrap();
    let store = Arc::new(TrustStore::new(dir.path()));
    let eval = TrustEvaluator::new(TrustConfig::default(), Arc::clone(&store));

    let a = Credentials::new(cert_pem("printer-a.example.com", 2020, 2030));
    let b = Credentials::new(cert_pem("printer-b.example.com", 2020, 2030));

    assert_eq!(
        eval.evaluate_at("printer-a.example.com", &a, false, at(2025)),
        Trust::Ok
    );
    assert_eq!(
        eval.evaluate_at("printer-b.example.com", &b, false, at(2025)),
        Trust::Ok
    );

    assert!(store.load("printer-a.example.com").is_some());
    assert!(store.load("printer-b.example.com").is_some());
}

// ── expiry and strictness ───────────────────────────────────────────────────

#[test]
fn expired_certificate_is_reported_expired_not_ok() {
    let dir = TempDir::new().unwrap();
    let eval = TrustEvaluator::new(
        TrustConfig::default(),
        Arc::new(TrustStore::new(dir.path())),
    );

    let creds = Credentials::new(cert_pem(CN, 2018, 2020));
    assert_eq!(eval.evaluate_at(CN, &creds, false, at(2025)), Trust::Expired);
}

#[test]
fn require_ca_rejects_tofu_entirely() {
    let dir = TempDir::new().unwrap();
    let eval = TrustEvaluator::new(
        TrustConfig::default(),
        Arc::new(TrustStore::new(dir.path())),
    );

    let creds = Credentials::new(cert_pem(CN, 2020, 2030));
    assert_eq!(eval.evaluate_at(CN, &creds, true, at(2025)), Trust::Invalid);
}

#[test]
fn garbage_credentials_evaluate_to_unknown() {
    let dir = TempDir::new().unwrap();
    let eval = TrustEvaluator::new(
        TrustConfig::default(),
        Arc::new(TrustStore::new(dir.path())),
    );

    assert_eq!(
        eval.evaluate_at(CN, &Credentials::new("junk"), false, at(2025)),
        Trust::Unknown
    );
}

// ── site CA chains ──────────────────────────────────────────────────────────

#[test]
fn chain_rooted_at_the_site_ca_is_trusted_without_tofu() {
    let dir = TempDir::new().unwrap();
    let mut store = TrustStore::new(dir.path());

    let root = cert_pem("Site Print CA", 2010, 2040);
    store.add_site_root(&root).unwrap();

    let eval = TrustEvaluator::new(
        TrustConfig {
            trust_first_use: false,
            ..TrustConfig::default()
        },
        Arc::new(store),
    );

    let chain = Credentials::new(format!("{}{root}", cert_pem(CN, 2020, 2030)));
    assert_eq!(eval.evaluate_at(CN, &chain, false, at(2025)), Trust::Ok);

    // The same chain with an unknown root is refused
    let rogue = Credentials::new(format!(
        "{}{}",
        cert_pem(CN, 2020, 2030),
        cert_pem("Rogue CA", 2010, 2040)
    ));
    assert_eq!(eval.evaluate_at(CN, &rogue, false, at(2025)), Trust::Invalid);
}
