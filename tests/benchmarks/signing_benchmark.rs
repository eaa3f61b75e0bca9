//! Signing and order-field formatting benchmarks
//!
//! Every private call pays for one signature and every order for two
//! `floor_format` calls, so these sit on the order-placement hot path.

use criterion::{black_box, criterion_group, criterion_main, Criterion};
use unifex_core::floor_format;
use unifex_exchanges::auth::{
    binance_signature, hmac_query_v2_signature, lbank_signature, poloniex_signature, Signer, SigningScheme,
};
use unifex_exchanges::http::Method;
use unifex_exchanges::rest::ApiRequest;
use unifex_exchanges::Credentials;

const SECRET: &str = "NhqPtmdSJYdKjVHjA7PZj4Mge3R5YNiP1e3UZjInClVN65XAbvqqM6A7H5fATj0j";
const QUERY: &str = "symbol=LTCBTC&side=BUY&type=LIMIT&timeInForce=GTC&quantity=1&price=0.1&recvWindow=5000&timestamp=1499827319559";

fn signature_functions(c: &mut Criterion) {
    c.bench_function("binance_signature", |b| {
        b.iter(|| binance_signature(black_box(SECRET), black_box(QUERY)))
    });
    c.bench_function("hmac_query_v2_signature", |b| {
        b.iter(|| hmac_query_v2_signature(black_box(SECRET), "GET", "api.huobi.pro", "/v1/order/orders", black_box(QUERY)))
    });
    c.bench_function("poloniex_signature", |b| {
        b.iter(|| poloniex_signature(black_box(SECRET), black_box(QUERY)))
    });
    c.bench_function("lbank_signature", |b| {
        b.iter(|| lbank_signature(black_box(SECRET), black_box(QUERY)))
    });
}

fn signer_round_trip(c: &mut Criterion) {
    let signer = Signer::new(
        SigningScheme::Binance { recv_window: 5000 },
        Some(Credentials::new("key", SECRET)),
    );
    c.bench_function("signer_sign_binance_order", |b| {
        b.iter(|| {
            let request = ApiRequest::new(Method::Post, "/api/v3/order")
                .query("symbol", "LTCBTC")
                .query("side", "BUY")
                .query("quantity", "1")
                .query("price", "0.1");
            signer.sign(black_box(request))
        })
    });
}

fn order_field_formatting(c: &mut Criterion) {
    c.bench_function("floor_format_price", |b| {
        b.iter(|| floor_format(black_box(12345.6789), black_box(2)))
    });
    c.bench_function("floor_format_amount", |b| {
        b.iter(|| floor_format(black_box(0.1234567), black_box(6)))
    });
}

criterion_group!(benches, signature_functions, signer_round_trip, order_field_formatting);
criterion_main!(benches);
