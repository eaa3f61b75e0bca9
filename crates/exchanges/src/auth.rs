//! Credentials and request signing
//!
//! Each venue authenticates with one [`SigningScheme`]. The scheme is picked
//! when the adapter is built; [`Signer`] applies it to an [`ApiRequest`] that
//! the adapter has already laid out (query, form or JSON body). The signing
//! primitives below are pure functions of their inputs and are tested against
//! published vectors.

use crate::errors::{ExchangeError, Result};
use crate::rest::{encode_params, ApiRequest, Body};
use unifex_core::prelude::*;

use base64::engine::general_purpose::STANDARD;
use base64::Engine as _;
use hmac::{Hmac, Mac};
use md5::{Digest, Md5};
use sha2::{Sha256, Sha512};
use std::fmt;
use std::sync::Arc;
use tracing::debug;

type HmacSha256 = Hmac<Sha256>;
type HmacSha512 = Hmac<Sha512>;

type KeyFn = Arc<dyn Fn() -> String + Send + Sync>;

/// API key and secret, read through accessors on every signed request
#[derive(Clone)]
pub struct Credentials {
    api_key: KeyFn,
    secret_key: KeyFn,
}

impl Credentials {
    /// Static key material
    pub fn new(api_key: impl Into<String>, secret_key: impl Into<String>) -> Self {
        let api_key = api_key.into();
        let secret_key = secret_key.into();
        Self {
            api_key: Arc::new(move || api_key.clone()),
            secret_key: Arc::new(move || secret_key.clone()),
        }
    }

    /// Key material supplied on demand, e.g. from a secret manager
    pub fn from_fns<K, S>(api_key: K, secret_key: S) -> Self
    where
        K: Fn() -> String + Send + Sync + 'static,
        S: Fn() -> String + Send + Sync + 'static,
    {
        Self {
            api_key: Arc::new(api_key),
            secret_key: Arc::new(secret_key),
        }
    }

    pub fn api_key(&self) -> String {
        (self.api_key)()
    }

    pub fn secret_key(&self) -> String {
        (self.secret_key)()
    }
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials").finish_non_exhaustive()
    }
}

/// Authentication scheme of one venue
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SigningScheme {
    /// Public-only access
    None,
    /// `timestamp` + `recvWindow` in the query, hex HMAC-SHA256 as `signature`
    Binance { recv_window: u64 },
    /// hex HMAC-SHA256 of `ts + METHOD + path + body` in `ACCESS-*` headers
    Bitflyer,
    /// HTTP basic auth with key and secret
    BasicAuth,
    /// Huobi-style signature version 2, base64 HMAC-SHA256 over
    /// `METHOD\nhost\npath\nsortedQuery`
    HmacQueryV2 { host: String },
    /// hex HMAC-SHA256 of base64(`path/nonce/sortedQuery`)
    Kucoin,
    /// upper-case MD5 of `sortedParams&secret_key=...` as `sign`
    Lbank,
    /// hex HMAC-SHA512 of the form body
    Poloniex,
    /// base64 HMAC-SHA256 of `nonce + METHOD + path + query`
    P2pb2b,
    /// base64 HMAC-SHA256, keyed by the decoded secret, of
    /// `path + METHOD + nonce + body`
    Shrimpy,
}

/// Applies a [`SigningScheme`] with one set of credentials.
///
/// Owns the nonce latch, so nonces issued through one signer strictly
/// increase even when requests are signed concurrently.
pub struct Signer {
    scheme: SigningScheme,
    credentials: Option<Credentials>,
    nonce: NonceLatch,
}

impl Signer {
    pub fn new(scheme: SigningScheme, credentials: Option<Credentials>) -> Self {
        Self {
            scheme,
            credentials,
            nonce: NonceLatch::new(),
        }
    }

    pub fn scheme(&self) -> &SigningScheme {
        &self.scheme
    }

    pub fn has_credentials(&self) -> bool {
        self.credentials.is_some()
    }

    /// Authenticate a request with the current wall clock
    pub fn sign(&self, request: ApiRequest) -> Result<ApiRequest> {
        self.sign_at(request, epoch_millis())
    }

    /// Authenticate a request as of `now_ms` (epoch milliseconds)
    pub fn sign_at(&self, mut request: ApiRequest, now_ms: u64) -> Result<ApiRequest> {
        if self.scheme == SigningScheme::None {
            return Ok(request);
        }

        let credentials = self.credentials.as_ref().ok_or_else(|| {
            ExchangeError::MissingCredentials(format!("{} {}", request.method, request.path))
        })?;
        let api_key = credentials.api_key();
        let secret = credentials.secret_key();
        if api_key.is_empty() || secret.is_empty() {
            return Err(ExchangeError::MissingCredentials("empty api key or secret".to_string()));
        }

        match &self.scheme {
            SigningScheme::None => {}
            SigningScheme::Binance { recv_window } => {
                let timestamp = self.nonce.next(now_ms);
                request.query.push(("recvWindow".to_string(), recv_window.to_string()));
                request.query.push(("timestamp".to_string(), timestamp.to_string()));
                let signature = binance_signature(&secret, &encode_params(&request.query))?;
                request.query.push(("signature".to_string(), signature));
                request.headers.push(("X-MBX-APIKEY".to_string(), api_key));
            }
            SigningScheme::Bitflyer => {
                let timestamp = self.nonce.next(now_ms / 1000);
                let body = request.body.render()?;
                let signature = bitflyer_signature(
                    &secret,
                    timestamp,
                    request.method.as_str(),
                    &request.path_and_query(),
                    &body,
                )?;
                request.headers.push(("ACCESS-KEY".to_string(), api_key));
                request.headers.push(("ACCESS-TIMESTAMP".to_string(), timestamp.to_string()));
                request.headers.push(("ACCESS-SIGN".to_string(), signature));
            }
            SigningScheme::BasicAuth => {
                let token = STANDARD.encode(format!("{api_key}:{secret}"));
                request.headers.push(("Authorization".to_string(), format!("Basic {token}")));
            }
            SigningScheme::HmacQueryV2 { host } => {
                let timestamp = iso8601_secs(now_ms);
                request.query.push(("AccessKeyId".to_string(), api_key));
                request.query.push(("SignatureMethod".to_string(), "HmacSHA256".to_string()));
                request.query.push(("SignatureVersion".to_string(), "2".to_string()));
                request.query.push(("Timestamp".to_string(), timestamp));
                request.query.sort();
                let signature = hmac_query_v2_signature(
                    &secret,
                    request.method.as_str(),
                    host,
                    &request.path,
                    &encode_params(&request.query),
                )?;
                request.query.push(("Signature".to_string(), signature));
            }
            SigningScheme::Kucoin => {
                let nonce = self.nonce.next(now_ms);
                let mut params = request.params().to_vec();
                params.sort();
                let signature = kucoin_signature(&secret, &request.path, nonce, &encode_params(&params))?;
                request.headers.push(("KC-API-KEY".to_string(), api_key));
                request.headers.push(("KC-API-NONCE".to_string(), nonce.to_string()));
                request.headers.push(("KC-API-SIGNATURE".to_string(), signature));
            }
            SigningScheme::Lbank => {
                let params = request.params_mut();
                params.push(("api_key".to_string(), api_key));
                params.sort();
                let signature = lbank_signature(&secret, &encode_params(params));
                params.push(("sign".to_string(), signature));
            }
            SigningScheme::Poloniex => {
                let nonce = self.nonce.next(now_ms / 1000);
                request.params_mut().push(("nonce".to_string(), nonce.to_string()));
                let signature = poloniex_signature(&secret, &request.body.render()?)?;
                request.headers.push(("Key".to_string(), api_key));
                request.headers.push(("Sign".to_string(), signature));
            }
            SigningScheme::P2pb2b => {
                let nonce = self.nonce.next(now_ms);
                if let Body::Json(serde_json::Value::Object(fields)) = &mut request.body {
                    fields.insert("request".to_string(), request.path.clone().into());
                    fields.insert("nonce".to_string(), nonce.to_string().into());
                }
                let signature = p2pb2b_signature(
                    &secret,
                    nonce,
                    request.method.as_str(),
                    &request.path,
                    &encode_params(&request.query),
                )?;
                request.headers.push(("X-TXC-APIKEY".to_string(), api_key));
                request.headers.push(("X-TXC-NONCE".to_string(), nonce.to_string()));
                request.headers.push(("X-TXC-SIGNATURE".to_string(), signature));
            }
            SigningScheme::Shrimpy => {
                let nonce = self.nonce.next(now_ms);
                let signature = shrimpy_signature(
                    &secret,
                    &request.path_and_query(),
                    request.method.as_str(),
                    nonce,
                    &request.body.render()?,
                )?;
                request.headers.push(("DEV-SHRIMPY-API-KEY".to_string(), api_key));
                request.headers.push(("DEV-SHRIMPY-API-NONCE".to_string(), nonce.to_string()));
                request.headers.push(("DEV-SHRIMPY-API-SIGNATURE".to_string(), signature));
            }
        }

        debug!("🔐 Signed request: {} {}", request.method, request.path);
        Ok(request)
    }
}

impl fmt::Debug for Signer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Signer")
            .field("scheme", &self.scheme)
            .field("has_credentials", &self.credentials.is_some())
            .finish()
    }
}

pub fn hmac_sha256(secret: &[u8], payload: &[u8]) -> Result<Vec<u8>> {
    let mut mac = HmacSha256::new_from_slice(secret)
        .map_err(|e| ExchangeError::SigningError(format!("HMAC setup failed: {e}")))?;
    mac.update(payload);
    Ok(mac.finalize().into_bytes().to_vec())
}

pub fn hmac_sha512(secret: &[u8], payload: &[u8]) -> Result<Vec<u8>> {
    let mut mac = HmacSha512::new_from_slice(secret)
        .map_err(|e| ExchangeError::SigningError(format!("HMAC setup failed: {e}")))?;
    mac.update(payload);
    Ok(mac.finalize().into_bytes().to_vec())
}

pub fn md5_upper_hex(payload: &[u8]) -> String {
    hex::encode_upper(Md5::digest(payload))
}

pub fn binance_signature(secret: &str, query_string: &str) -> Result<String> {
    Ok(hex::encode(hmac_sha256(secret.as_bytes(), query_string.as_bytes())?))
}

pub fn bitflyer_signature(
    secret: &str,
    timestamp: u64,
    method: &str,
    path: &str,
    body: &str,
) -> Result<String> {
    let text = format!("{timestamp}{method}{path}{body}");
    Ok(hex::encode(hmac_sha256(secret.as_bytes(), text.as_bytes())?))
}

pub fn hmac_query_v2_signature(
    secret: &str,
    method: &str,
    host: &str,
    path: &str,
    sorted_query: &str,
) -> Result<String> {
    let text = format!("{method}\n{host}\n{path}\n{sorted_query}");
    Ok(STANDARD.encode(hmac_sha256(secret.as_bytes(), text.as_bytes())?))
}

pub fn kucoin_signature(secret: &str, path: &str, nonce: u64, sorted_query: &str) -> Result<String> {
    let text = STANDARD.encode(format!("{path}/{nonce}/{sorted_query}"));
    Ok(hex::encode(hmac_sha256(secret.as_bytes(), text.as_bytes())?))
}

pub fn lbank_signature(secret: &str, sorted_params: &str) -> String {
    md5_upper_hex(format!("{sorted_params}&secret_key={secret}").as_bytes())
}

pub fn poloniex_signature(secret: &str, body: &str) -> Result<String> {
    Ok(hex::encode(hmac_sha512(secret.as_bytes(), body.as_bytes())?))
}

pub fn p2pb2b_signature(
    secret: &str,
    nonce: u64,
    method: &str,
    path: &str,
    query: &str,
) -> Result<String> {
    let text = format!("{nonce}{method}{path}{query}");
    Ok(STANDARD.encode(hmac_sha256(secret.as_bytes(), text.as_bytes())?))
}

pub fn shrimpy_signature(
    secret_b64: &str,
    path: &str,
    method: &str,
    nonce: u64,
    body: &str,
) -> Result<String> {
    let key = STANDARD
        .decode(secret_b64)
        .map_err(|e| ExchangeError::SigningError(format!("secret is not base64: {e}")))?;
    let text = format!("{path}{method}{nonce}{body}");
    Ok(STANDARD.encode(hmac_sha256(&key, text.as_bytes())?))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::http::Method;

    const BINANCE_DOC_SECRET: &str =
        "NhqPtmdSJYdKjVHjA7PZj4Mge3R5YNiP1e3UZjInClVN65XAbvqqM6A7H5fATj0j";

    #[test]
    fn test_hmac_vectors() {
        assert_eq!(
            hex::encode(hmac_sha256(b"Jefe", b"what do ya want for nothing?").unwrap()),
            "5bdcc146bf60754e6a042426089575c75a003f089d2739839dec58b964ec3843"
        );
        assert_eq!(
            poloniex_signature("Jefe", "what do ya want for nothing?").unwrap(),
            "164b7a7bfcf819e2e395fbe73b56e0a387bd64222e831fd610270cd7ea2505549758bf75c05a994a6d034f65f8f0e6fdcaeab1a34d4a6b4b636e070a38bce737"
        );
        assert_eq!(md5_upper_hex(b"abc"), "900150983CD24FB0D6963F7D28E17F72");
    }

    #[test]
    fn test_binance_documented_signature() {
        let query = "symbol=LTCBTC&side=BUY&type=LIMIT&timeInForce=GTC&quantity=1&price=0.1&recvWindow=5000&timestamp=1499827319559";
        assert_eq!(
            binance_signature(BINANCE_DOC_SECRET, query).unwrap(),
            "c8db56825ae71d6d79447849e617115f4a920fa2acdcab2b053c4b2838bd6b71"
        );
    }

    #[test]
    fn test_binance_signer_layout() {
        let signer = Signer::new(
            SigningScheme::Binance { recv_window: 5000 },
            Some(Credentials::new("key", BINANCE_DOC_SECRET)),
        );
        let request = ApiRequest::new(Method::Post, "/api/v3/order")
            .query("symbol", "LTCBTC")
            .query("side", "BUY")
            .query("type", "LIMIT")
            .query("timeInForce", "GTC")
            .query("quantity", "1")
            .query("price", "0.1");

        let signed = signer.sign_at(request, 1_499_827_319_559).unwrap();
        let signature = signed.query.iter().find(|(k, _)| k == "signature").unwrap();
        assert_eq!(signature.1, "c8db56825ae71d6d79447849e617115f4a920fa2acdcab2b053c4b2838bd6b71");
        assert_eq!(signed.query.last().unwrap().0, "signature");
        assert!(signed.headers.contains(&("X-MBX-APIKEY".to_string(), "key".to_string())));
    }

    #[test]
    fn test_hmac_query_v2_layout() {
        let signer = Signer::new(
            SigningScheme::HmacQueryV2 { host: "api.huobi.pro".to_string() },
            Some(Credentials::new("e2xxxxxx-99xxxxxx-84xxxxxx-7xxxx", "secret")),
        );
        let request = ApiRequest::new(Method::Get, "/v1/order/orders")
            .query("symbol", "ethusdt")
            .query("states", "submitted");

        let signed = signer.sign_at(request, 1_494_515_970_000).unwrap();
        let keys: Vec<&str> = signed.query.iter().map(|(k, _)| k.as_str()).collect();
        assert_eq!(
            keys,
            vec!["AccessKeyId", "SignatureMethod", "SignatureVersion", "Timestamp", "states", "symbol", "Signature"]
        );

        let timestamp = &signed.query[3].1;
        assert_eq!(timestamp, "2017-05-11T15:19:30");

        let canonical = encode_params(&signed.query[..6]);
        assert!(canonical.contains("Timestamp=2017-05-11T15%3A19%3A30"));
        let expected = hmac_query_v2_signature("secret", "GET", "api.huobi.pro", "/v1/order/orders", &canonical).unwrap();
        assert_eq!(signed.query[6].1, expected);
    }

    #[test]
    fn test_lbank_sign_param() {
        let signer = Signer::new(SigningScheme::Lbank, Some(Credentials::new("k", "s")));
        let request = ApiRequest::new(Method::Post, "/v1/user_info.do");
        let signed = signer.sign_at(request, 0).unwrap();

        let Body::Form(params) = &signed.body else {
            panic!("lbank signs a form body");
        };
        assert_eq!(params[0], ("api_key".to_string(), "k".to_string()));
        assert_eq!(params[1].0, "sign");
        assert_eq!(params[1].1, md5_upper_hex(b"api_key=k&secret_key=s"));
    }

    #[test]
    fn test_poloniex_signs_rendered_body() {
        let signer = Signer::new(SigningScheme::Poloniex, Some(Credentials::new("k", "s")));
        let request = ApiRequest::new(Method::Post, "/tradingApi").form("command", "returnBalances");
        let signed = signer.sign_at(request, 1_600_000_000_000).unwrap();

        let body = signed.body.render().unwrap();
        assert_eq!(body, "command=returnBalances&nonce=1600000000");
        let sign = signed.headers.iter().find(|(k, _)| k == "Sign").unwrap();
        assert_eq!(sign.1, poloniex_signature("s", &body).unwrap());
    }

    #[test]
    fn test_nonces_strictly_increase_within_one_signer() {
        let signer = Signer::new(SigningScheme::Poloniex, Some(Credentials::new("k", "s")));
        let mut last = 0u64;
        for _ in 0..5 {
            let signed = signer
                .sign_at(ApiRequest::new(Method::Post, "/tradingApi"), 1_600_000_000_000)
                .unwrap();
            let Body::Form(params) = &signed.body else { unreachable!() };
            let nonce: u64 = params.iter().find(|(k, _)| k == "nonce").unwrap().1.parse().unwrap();
            assert!(nonce > last);
            last = nonce;
        }
    }

    #[test]
    fn test_shrimpy_rejects_non_base64_secret() {
        let err = shrimpy_signature("not base64!", "/v1/accounts", "GET", 1, "").unwrap_err();
        assert!(matches!(err, ExchangeError::SigningError(_)));
        let ok = shrimpy_signature(&STANDARD.encode("secret"), "/v1/accounts", "GET", 1, "").unwrap();
        assert_eq!(STANDARD.decode(ok).unwrap().len(), 32);
    }

    #[test]
    fn test_missing_credentials() {
        let signer = Signer::new(SigningScheme::BasicAuth, None);
        let err = signer.sign(ApiRequest::new(Method::Get, "/api/2/trading/balance")).unwrap_err();
        assert!(matches!(err, ExchangeError::MissingCredentials(_)));

        let public = Signer::new(SigningScheme::None, None);
        assert!(public.sign(ApiRequest::new(Method::Get, "/ping")).is_ok());
    }

    #[test]
    fn test_credentials_are_read_through_accessors() {
        let credentials = Credentials::from_fns(|| "rotating-key".to_string(), || "s".to_string());
        let signer = Signer::new(SigningScheme::BasicAuth, Some(credentials));
        let signed = signer.sign(ApiRequest::new(Method::Get, "/api/2/trading/balance")).unwrap();
        let auth = signed.headers.iter().find(|(k, _)| k == "Authorization").unwrap();
        assert_eq!(auth.1, format!("Basic {}", STANDARD.encode("rotating-key:s")));
        assert_eq!(format!("{:?}", Credentials::new("a", "b")), "Credentials { .. }");
    }
}
