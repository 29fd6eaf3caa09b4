use async_trait::async_trait;
use hyper::header::AUTHORIZATION;
use hyper::{Body, Request, Response, StatusCode};
use sha2::{Digest, Sha256, Sha384, Sha512};
use tracing::debug;

use super::{ChainHandler, Middleware};

/// Validates the bearer token carried in `Authorization` (no `Bearer`
/// prefix) against a shared HS-family secret.
///
/// Responses match the wire behavior consumers already depend on: 203
/// with `empty auth token` for a missing header, 502 with
/// `failed to parse token` for anything unverifiable.
pub struct AuthMiddleware {
    key: String,
}

impl AuthMiddleware {
    pub fn new(key: String) -> Self {
        Self { key }
    }
}

#[async_trait]
impl Middleware for AuthMiddleware {
    async fn handle(&self, req: Request<Body>, next: ChainHandler) -> Response<Body> {
        let token = req
            .headers()
            .get(AUTHORIZATION)
            .and_then(|value| value.to_str().ok())
            .unwrap_or("");

        if token.is_empty() {
            return Response::builder()
                .status(StatusCode::NON_AUTHORITATIVE_INFORMATION)
                .body(Body::from("empty auth token"))
                .unwrap_or_default();
        }

        if !verify_hs_token(token, self.key.as_bytes()) {
            debug!("bearer token failed verification");
            return Response::builder()
                .status(StatusCode::BAD_GATEWAY)
                .body(Body::from("failed to parse token"))
                .unwrap_or_default();
        }

        next(req).await
    }
}

/// Verify a compact JWT signed with HS256, HS384, or HS512. Checks the
/// signature against `secret` and the `exp`/`nbf` claims when present.
pub fn verify_hs_token(token: &str, secret: &[u8]) -> bool {
    let mut parts = token.split('.');
    let (header_b64, payload_b64, sig_b64) = match (parts.next(), parts.next(), parts.next()) {
        (Some(h), Some(p), Some(s)) if parts.next().is_none() => (h, p, s),
        _ => return false,
    };

    let header: serde_json::Value = match b64url_decode(header_b64)
        .and_then(|bytes| serde_json::from_slice(&bytes).ok())
    {
        Some(value) => value,
        None => return false,
    };
    let payload: serde_json::Value = match b64url_decode(payload_b64)
        .and_then(|bytes| serde_json::from_slice(&bytes).ok())
    {
        Some(value) => value,
        None => return false,
    };
    let sig = match b64url_decode(sig_b64) {
        Some(bytes) => bytes,
        None => return false,
    };

    let alg = header.get("alg").and_then(|v| v.as_str()).unwrap_or("");
    let signing_input = format!("{}.{}", header_b64, payload_b64);
    let mac = match alg {
        "HS256" => hmac::<Sha256>(secret, signing_input.as_bytes(), 64),
        "HS384" => hmac::<Sha384>(secret, signing_input.as_bytes(), 128),
        "HS512" => hmac::<Sha512>(secret, signing_input.as_bytes(), 128),
        _ => return false,
    };

    if mac != sig {
        return false;
    }

    validate_claims(&payload)
}

fn validate_claims(payload: &serde_json::Value) -> bool {
    let now = std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .unwrap_or_default()
        .as_secs() as i64;

    if let Some(exp) = payload.get("exp").and_then(|v| v.as_i64()) {
        if now > exp {
            return false;
        }
    }

    if let Some(nbf) = payload.get("nbf").and_then(|v| v.as_i64()) {
        if now < nbf {
            return false;
        }
    }

    true
}

fn hmac<D: Digest>(key: &[u8], msg: &[u8], block: usize) -> Vec<u8> {
    let mut k = if key.len() > block {
        D::digest(key).to_vec()
    } else {
        key.to_vec()
    };
    k.resize(block, 0);

    let mut ipad = vec![0x36u8; block];
    let mut opad = vec![0x5cu8; block];
    for i in 0..block {
        ipad[i] ^= k[i];
        opad[i] ^= k[i];
    }

    let mut inner = D::new();
    inner.update(&ipad);
    inner.update(msg);
    let inner_hash = inner.finalize();

    let mut outer = D::new();
    outer.update(&opad);
    outer.update(inner_hash);
    outer.finalize().to_vec()
}

pub fn b64url_decode(s: &str) -> Option<Vec<u8>> {
    fn val(c: u8) -> Option<u8> {
        match c {
            b'A'..=b'Z' => Some(c - b'A'),
            b'a'..=b'z' => Some(c - b'a' + 26),
            b'0'..=b'9' => Some(c - b'0' + 52),
            b'-' => Some(62),
            b'_' => Some(63),
            _ => None,
        }
    }

    let bytes = s.as_bytes();
    let mut out = Vec::with_capacity(bytes.len() / 4 * 3 + 3);
    let mut buf = 0u32;
    let mut bits = 0u32;

    for &b in bytes {
        let v = val(b)?;
        buf = (buf << 6) | v as u32;
        bits += 6;
        if bits >= 8 {
            bits -= 8;
            out.push(((buf >> bits) & 0xFF) as u8);
        }
    }

    Some(out)
}

pub fn b64url_encode(data: &[u8]) -> String {
    const TABLE: &[u8; 64] =
        b"ABCDEFGHIJKLMNOPQRSTUVWXYZabcdefghijklmnopqrstuvwxyz0123456789-_";
    let mut out = String::with_capacity(data.len().div_ceil(3) * 4);
    for chunk in data.chunks(3) {
        let n = (chunk[0] as u32) << 16
            | (*chunk.get(1).unwrap_or(&0) as u32) << 8
            | *chunk.get(2).unwrap_or(&0) as u32;
        out.push(TABLE[((n >> 18) & 63) as usize] as char);
        out.push(TABLE[((n >> 12) & 63) as usize] as char);
        if chunk.len() > 1 {
            out.push(TABLE[((n >> 6) & 63) as usize] as char);
        }
        if chunk.len() > 2 {
            out.push(TABLE[(n & 63) as usize] as char);
        }
    }
    out
}

/// Produce a compact HS256 JWT over `claims`, signed with `secret`.
/// The counterpart of [`verify_hs_token`]; handy for issuing test and
/// service tokens.
pub fn sign_hs256(secret: &[u8], claims: &serde_json::Value) -> String {
    let header = b64url_encode(br#"{"alg":"HS256","typ":"JWT"}"#);
    let payload = b64url_encode(claims.to_string().as_bytes());
    let signing_input = format!("{}.{}", header, payload);
    let sig = hmac::<Sha256>(secret, signing_input.as_bytes(), 64);
    format!("{}.{}", signing_input, b64url_encode(&sig))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::sync::Arc;

    fn ok_handler() -> ChainHandler {
        Arc::new(|_req| Box::pin(async move { Response::new(Body::from("downstream")) }))
    }

    #[test]
    fn test_verify_valid_token() {
        let token = sign_hs256(b"secret", &json!({"sub": "user-1"}));
        assert!(verify_hs_token(&token, b"secret"));
    }

    #[test]
    fn test_verify_rejects_wrong_key() {
        let token = sign_hs256(b"secret", &json!({"sub": "user-1"}));
        assert!(!verify_hs_token(&token, b"other"));
    }

    #[test]
    fn test_verify_rejects_garbage() {
        assert!(!verify_hs_token("not-a-token", b"secret"));
        assert!(!verify_hs_token("a.b", b"secret"));
        assert!(!verify_hs_token("a.b.c.d", b"secret"));
        assert!(!verify_hs_token("!!.!!.!!", b"secret"));
    }

    #[test]
    fn test_verify_rejects_unsigned_alg() {
        // alg "none" with an empty signature must not pass.
        let header = b64url_encode(br#"{"alg":"none"}"#);
        let payload = b64url_encode(b"{}");
        let token = format!("{}.{}.", header, payload);
        assert!(!verify_hs_token(&token, b"secret"));
    }

    #[test]
    fn test_verify_rejects_expired() {
        let token = sign_hs256(b"secret", &json!({"exp": 1_000}));
        assert!(!verify_hs_token(&token, b"secret"));
    }

    #[test]
    fn test_verify_honors_future_exp_and_nbf() {
        let far_future = 4_000_000_000i64;
        let token = sign_hs256(b"secret", &json!({"exp": far_future}));
        assert!(verify_hs_token(&token, b"secret"));

        let token = sign_hs256(b"secret", &json!({"nbf": far_future}));
        assert!(!verify_hs_token(&token, b"secret"));
    }

    #[test]
    fn test_b64url_round_trip() {
        for data in [&b"a"[..], b"ab", b"abc", b"abcd", b"\x00\xff\x7f"] {
            let encoded = b64url_encode(data);
            assert_eq!(b64url_decode(&encoded).unwrap(), data);
        }
    }

    #[tokio::test]
    async fn test_missing_token_responds_203() {
        let mw = AuthMiddleware::new("secret".to_string());
        let req = Request::builder().uri("/x").body(Body::empty()).unwrap();

        let resp = mw.handle(req, ok_handler()).await;
        assert_eq!(resp.status(), StatusCode::NON_AUTHORITATIVE_INFORMATION);
        let body = hyper::body::to_bytes(resp.into_body()).await.unwrap();
        assert_eq!(&body[..], b"empty auth token");
    }

    #[tokio::test]
    async fn test_invalid_token_responds_502() {
        let mw = AuthMiddleware::new("secret".to_string());
        let token = sign_hs256(b"wrong-key", &json!({}));
        let req = Request::builder()
            .uri("/x")
            .header(AUTHORIZATION, token)
            .body(Body::empty())
            .unwrap();

        let resp = mw.handle(req, ok_handler()).await;
        assert_eq!(resp.status(), StatusCode::BAD_GATEWAY);
        let body = hyper::body::to_bytes(resp.into_body()).await.unwrap();
        assert_eq!(&body[..], b"failed to parse token");
    }

    #[tokio::test]
    async fn test_valid_token_passes_through() {
        let mw = AuthMiddleware::new("secret".to_string());
        let token = sign_hs256(b"secret", &json!({"sub": "user-1"}));
        let req = Request::builder()
            .uri("/x")
            .header(AUTHORIZATION, token)
            .body(Body::empty())
            .unwrap();

        let resp = mw.handle(req, ok_handler()).await;
        assert_eq!(resp.status(), StatusCode::OK);
        let body = hyper::body::to_bytes(resp.into_body()).await.unwrap();
        assert_eq!(&body[..], b"downstream");
    }
}
