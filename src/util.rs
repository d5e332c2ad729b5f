use base64ct::{Base64, Encoding};

use crate::error::{BaiwangResult, Error};

pub fn base64_encode(data: &[u8]) -> String {
    Base64::encode_string(data)
}

/// 解码前去掉所有 ASCII 空白，兼容按 76 列折行的 base64
pub fn base64_decode(src: &str) -> BaiwangResult<Vec<u8>> {
    trace!("base64 decode source: {}", src);
    let compact: String = src.chars().filter(|c| !c.is_ascii_whitespace()).collect();
    Ok(Base64::decode_vec(&compact).map_err(|e| {
        error!("解码 base64 出错：{}", e);
        e
    })?)
}

/// 去掉末尾的 NUL 填充和空白字符
pub fn trim_right_bytes(data: &[u8]) -> &[u8] {
    let end = data
        .iter()
        .rposition(|b| *b != 0 && !b.is_ascii_whitespace())
        .map(|idx| idx + 1)
        .unwrap_or(0);

    &data[..end]
}

/// 金额、税率统一保留两位小数
pub fn format_fee(fee: f64) -> String {
    format!("{:.2}", fee)
}

pub fn round_fee(fee: f64) -> f64 {
    (fee * 100.0).round() / 100.0
}

pub fn parse_fee(tag: &str, text: &str) -> BaiwangResult<f64> {
    let text = text.trim();
    if text.is_empty() {
        return Ok(0.0);
    }

    text.parse::<f64>()
        .map_err(|e| Error::Malformed(format!("{} 不是合法的金额 `{}`: {}", tag, text, e)))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn trim_right() {
        assert_eq!(trim_right_bytes(b"<a/>\r\n\0\0"), b"<a/>");
        assert_eq!(trim_right_bytes(b"  <a/>"), b"  <a/>");
        assert_eq!(trim_right_bytes(b"\0 \n"), b"");
    }

    #[test]
    fn fee_text() {
        assert_eq!(format_fee(1.0 / 1.06), "0.94");
        assert_eq!(format_fee(0.06), "0.06");
        assert_eq!(round_fee(0.943396), 0.94);
        assert_eq!(parse_fee("JSHJ", " 12.50 ").unwrap(), 12.5);
        assert_eq!(parse_fee("JSHJ", "").unwrap(), 0.0);
        assert!(matches!(
            parse_fee("JSHJ", "abc"),
            Err(Error::Malformed(_))
        ));
    }

    #[test]
    fn base64_rejects_xml() {
        assert!(base64_decode("<?xml version=\"1.0\"?><business/>").is_err());
        assert_eq!(base64_decode(&base64_encode(b"fapiao")).unwrap(), b"fapiao");
    }

    #[test]
    fn base64_skips_line_breaks() {
        assert_eq!(base64_decode("ZmFw\r\naWFv\n").unwrap(), b"fapiao");
        assert_eq!(base64_decode(" ZmFw aWFv ").unwrap(), b"fapiao");
    }
}
