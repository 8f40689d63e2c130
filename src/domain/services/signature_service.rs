// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

use hmac::{Hmac, Mac};
use rand::RngCore;
use sha2::Sha256;

type HmacSha256 = Hmac<Sha256>;

/// 签名请求头名称
pub const SIGNATURE_HEADER: &str = "X-Webhook-Signature";

/// 签名前缀
const SIGNATURE_PREFIX: &str = "sha256=";

/// 生成密钥的随机字节数
const SECRET_BYTES: usize = 32;

/// 对负载生成HMAC-SHA256签名
///
/// # 参数
///
/// * `payload` - 实际发送的请求体字节
/// * `secret` - Webhook密钥
///
/// # 返回值
///
/// 十六进制编码的签名
pub fn sign(payload: &[u8], secret: &str) -> String {
    let mut mac = new_mac(secret);
    mac.update(payload);
    hex::encode(mac.finalize().into_bytes())
}

/// 生成签名请求头的值：`sha256=<hex>`
pub fn signature_header_value(payload: &[u8], secret: &str) -> String {
    format!("{}{}", SIGNATURE_PREFIX, sign(payload, secret))
}

/// 校验签名请求头（常量时间比较）
///
/// 接受带或不带 `sha256=` 前缀的值
pub fn verify(payload: &[u8], secret: &str, header_value: &str) -> bool {
    let digest = header_value
        .strip_prefix(SIGNATURE_PREFIX)
        .unwrap_or(header_value);

    let Ok(expected) = hex::decode(digest) else {
        return false;
    };

    let mut mac = new_mac(secret);
    mac.update(payload);
    mac.verify_slice(&expected).is_ok()
}

/// 生成新的Webhook密钥：32字节随机数的十六进制编码
pub fn generate_secret() -> String {
    let mut bytes = [0u8; SECRET_BYTES];
    rand::rng().fill_bytes(&mut bytes);
    hex::encode(bytes)
}

fn new_mac(secret: &str) -> HmacSha256 {
    // HMAC 接受任意长度的密钥，这里不会失败
    match HmacSha256::new_from_slice(secret.as_bytes()) {
        Ok(mac) => mac,
        Err(_) => unreachable!("HMAC can take key of any size"),
    }
}
