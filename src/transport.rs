use std::{io::Read, time::Duration};

use crate::{
    error::BaiwangResult,
    util::{base64_decode, base64_encode, trim_right_bytes},
};

const VERSION: &str = env!("CARGO_PKG_VERSION");

pub const CONTENT_TYPE: &str = "text/plain";

/// 发送一次 POST 请求并返回完整的响应体
pub trait Transport {
    fn post(&self, url: &str, body: &[u8]) -> BaiwangResult<Vec<u8>>;
}

impl<T: Transport + ?Sized> Transport for &T {
    fn post(&self, url: &str, body: &[u8]) -> BaiwangResult<Vec<u8>> {
        (**self).post(url, body)
    }
}

/// 基于 ureq 的同步 HTTP 传输，不做重试
#[derive(Debug)]
pub struct HttpTransport {
    agent: ureq::Agent,
    user_agent: String,
    timeout: Option<Duration>,
}

impl HttpTransport {
    pub fn new(timeout: Option<Duration>) -> Self {
        Self {
            agent: ureq::AgentBuilder::new().build(),
            user_agent: format!("baiwang-sdk-rust/{}", VERSION),
            timeout,
        }
    }
}

impl Default for HttpTransport {
    fn default() -> Self {
        Self::new(None)
    }
}

impl Transport for HttpTransport {
    fn post(&self, url: &str, body: &[u8]) -> BaiwangResult<Vec<u8>> {
        debug!("POST {} ({} bytes)", url, body.len());

        let mut req = self
            .agent
            .post(url)
            .set("Content-Type", CONTENT_TYPE)
            .set("User-Agent", &self.user_agent);
        if let Some(timeout) = self.timeout {
            req = req.timeout(timeout);
        }

        let resp = req.send_bytes(body).map_err(|e| {
            error!("[BaiwangSdk]HTTP 请求错误: {}", e);
            e
        })?;

        let mut data = Vec::new();
        resp.into_reader().read_to_end(&mut data)?;
        trace!("response body: {}", String::from_utf8_lossy(&data));

        Ok(data)
    }
}

/// 报文在 HTTP 上的包装方式。
///
/// 发票开具接口的请求体和响应体都是 base64，用户验证和发票下载接口直接传 XML。
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Wire {
    Plain,
    Base64,
}

impl Wire {
    pub fn encode_body(&self, document: Vec<u8>) -> Vec<u8> {
        match self {
            Wire::Plain => document,
            Wire::Base64 => base64_encode(&document).into_bytes(),
        }
    }

    pub fn decode_body(&self, body: Vec<u8>) -> BaiwangResult<Vec<u8>> {
        match self {
            Wire::Plain => Ok(body),
            Wire::Base64 => {
                let text = String::from_utf8_lossy(trim_right_bytes(&body)).into_owned();
                let data = base64_decode(&text)?;

                Ok(trim_right_bytes(&data).to_vec())
            }
        }
    }
}

/// 按 `wire` 包装已序列化的报文，发送到 `url`，返回解包后的响应报文
pub fn exchange<T: Transport + ?Sized>(
    transport: &T,
    url: &str,
    document: Vec<u8>,
    wire: Wire,
) -> BaiwangResult<Vec<u8>> {
    let body = wire.encode_body(document);
    let resp = transport.post(url, &body)?;

    wire.decode_body(resp)
}
