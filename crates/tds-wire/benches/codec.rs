//! Benchmarks for the login builder, token framing and UTF-16 transcoding.

#![allow(clippy::unwrap_used, missing_docs)]

use std::hint::black_box;

use criterion::{Criterion, Throughput, criterion_group, criterion_main};
use tds_wire::token::{FIXED_LENGTH, VARIABLE_LENGTH, ZERO_LENGTH};
use tds_wire::{
    LoginConfig, LoginRecord, TdsVersion, Token, build_token_stream, decode_utf16, encode_utf16,
    obfuscate, parse_token_stream,
};

fn login_config() -> LoginConfig {
    LoginConfig::new()
        .with_tds_version(TdsVersion::V7_4)
        .with_hostname("bench-host-01")
        .with_sql_auth("bench_user", "correct horse battery staple")
        .with_app_name("tds-wire-bench")
        .with_database("AdventureWorks")
}

fn bench_login_encode(c: &mut Criterion) {
    let config = login_config();

    c.bench_function("login_encode", |b| {
        b.iter(|| black_box(config.encode().unwrap()))
    });
}

fn bench_login_decode(c: &mut Criterion) {
    let encoded = login_config().encode().unwrap();

    c.bench_function("login_decode", |b| {
        b.iter(|| black_box(LoginRecord::decode(black_box(&encoded)).unwrap()))
    });
}

fn bench_token_stream(c: &mut Criterion) {
    let tokens: Vec<Token> = (0..64)
        .map(|i| match i % 3 {
            0 => Token::zero_length(ZERO_LENGTH),
            1 => Token::fixed(FIXED_LENGTH, vec![0u8; 4]),
            _ => Token::variable(VARIABLE_LENGTH, vec![0xABu8; 120]),
        })
        .collect();
    let wire = build_token_stream(&tokens).unwrap();

    let mut group = c.benchmark_group("token_stream");
    group.throughput(Throughput::Bytes(wire.len() as u64));
    group.bench_function("build", |b| {
        b.iter(|| black_box(build_token_stream(black_box(&tokens)).unwrap()))
    });
    group.bench_function("parse", |b| {
        b.iter(|| black_box(parse_token_stream(black_box(&wire)).unwrap()))
    });
    group.finish();
}

fn bench_utf16(c: &mut Criterion) {
    let mut group = c.benchmark_group("utf16");

    for (name, text) in [
        ("ascii", "SELECT name FROM sys.databases WHERE state = 0".repeat(8)),
        ("cjk", "数据库连接字符串测试".repeat(16)),
        ("astral", "\u{1F600}\u{10348}".repeat(64)),
    ] {
        let encoded = encode_utf16(&text);
        group.throughput(Throughput::Bytes(encoded.len() as u64));
        group.bench_function(format!("encode_{name}"), |b| {
            b.iter(|| black_box(encode_utf16(black_box(&text))))
        });
        group.bench_function(format!("decode_{name}"), |b| {
            b.iter(|| black_box(decode_utf16(black_box(&encoded))))
        });
    }

    group.finish();
}

fn bench_password(c: &mut Criterion) {
    c.bench_function("password_obfuscate", |b| {
        b.iter(|| black_box(obfuscate(black_box("correct horse battery staple"))))
    });
}

criterion_group!(
    benches,
    bench_login_encode,
    bench_login_decode,
    bench_token_stream,
    bench_utf16,
    bench_password,
);

criterion_main!(benches);
