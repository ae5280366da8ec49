use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};

use chrono::{Duration, Utc};
use keystone_auth::{
    CredentialVerifier, HashingCost, Principal, Role, TokenAuthority, TokenVerifier, authorize,
    resolve_session,
};
use keystone_core::{TenantId, UserId};

fn bench_token_verification(c: &mut Criterion) {
    let authority = TokenAuthority::hs256(b"bench-secret").unwrap();
    let now = Utc::now();
    let issued = authority
        .issue_at(UserId::new(), Some(TenantId::new()), Role::User, Duration::minutes(15), now)
        .unwrap();
    let header = format!("Bearer {}", issued.token);

    let mut tampered = issued.token.clone().into_bytes();
    let last = tampered.len() - 1;
    tampered[last] ^= 1;
    let tampered = String::from_utf8(tampered).unwrap();

    let mut group = c.benchmark_group("token");
    group.bench_function("verify_valid", |b| {
        b.iter(|| authority.verify(black_box(&issued.token), now))
    });
    group.bench_function("verify_tampered", |b| {
        b.iter(|| authority.verify(black_box(&tampered), now))
    });
    group.bench_function("resolve_session", |b| {
        b.iter(|| resolve_session(&authority, black_box(Some(header.as_str())), now))
    });
    group.finish();
}

fn bench_authorize(c: &mut Criterion) {
    let principal = Principal::tenant_member(UserId::new(), TenantId::new(), Role::User).unwrap();
    let mut group = c.benchmark_group("authorize");
    for allowed in [&[Role::User][..], &[Role::SuperAdmin, Role::TenantAdmin][..], &Role::ALL[..]] {
        group.bench_with_input(BenchmarkId::from_parameter(allowed.len()), allowed, |b, allowed| {
            b.iter(|| authorize(black_box(&principal), allowed))
        });
    }
    group.finish();
}

fn bench_password_hashing(c: &mut Criterion) {
    // Minimal cost; measures overhead around argon2, not the KDF itself.
    let verifier = CredentialVerifier::new(HashingCost {
        memory_kib: 256,
        iterations: 1,
        parallelism: 1,
    })
    .unwrap();
    let digest = verifier.hash("correct horse").unwrap();

    let mut group = c.benchmark_group("password");
    group.sample_size(20);
    group.bench_function("verify_match", |b| {
        b.iter(|| verifier.verify(black_box("correct horse"), &digest))
    });
    group.bench_function("verify_dummy", |b| {
        b.iter(|| verifier.verify_against_dummy(black_box("correct horse")))
    });
    group.finish();
}

criterion_group!(benches, bench_token_verification, bench_authorize, bench_password_hashing);
criterion_main!(benches);
