use std::time::Duration;

use encoding_rs::Encoding;
use url::Url;

use crate::{
    codec::{
        decode_access_token, decode_download_url, decode_invoice, decode_response,
        encode_auth_request, encode_download_request, encode_issuance_request, DEFAULT_TAX_RATE,
        AUTH_RESPONSE, DOWNLOAD_RESPONSE, ISSUANCE_RESPONSE,
    },
    error::{BaiwangResult, Error},
    model::{Invoice, InvoiceRequest},
    transport::{exchange, HttpTransport, Transport, Wire},
    util::round_fee,
    xml::Element,
};

/// 发票开具接口
pub const COMMON_API_URL: &str = "http://tccdzfp.shfapiao.cn/zpdzfp";
/// 用户验证接口
pub const ACCESS_TOKEN_URL: &str = "http://sc.bwfapiao.com/fpserver/FpServlet";
/// 发票存放地址接口
pub const DOWNLOAD_URL: &str = ACCESS_TOKEN_URL;
/// 报文声明和实际使用的字符集
pub const DEFAULT_CHARSET: &str = "gbk";

/// BaiwangConfig SDK 配置
#[derive(Debug, Clone)]
pub struct BaiwangConfig {
    /// 应用 id
    pub app_id: String,
    app_key: String,
    /// 销售方名称
    pub seller_name: String,
    /// 销售方纳税人识别号，默认与应用 id 相同
    pub seller_tax_id: String,
    pub token_url: String,
    pub issue_url: String,
    pub download_url: String,
    pub charset: String,
    /// 响应实际使用的字符集，为空时以 XML 声明为准
    pub response_charset: Option<String>,
    pub default_tax_rate: f64,
    /// 固定价税合计，设置后忽略请求中的金额
    pub fixed_total_fee: Option<f64>,
    pub timeout: Option<Duration>,
}

impl BaiwangConfig {
    pub fn builder<S: Into<String>>(app_id: S, app_key: S, seller_name: S) -> BaiwangConfigBuilder {
        BaiwangConfigBuilder::new(app_id, app_key, seller_name)
    }

    pub fn app_key(&self) -> &str {
        &self.app_key
    }
}

pub struct BaiwangConfigBuilder {
    app_id: String,
    app_key: String,
    seller_name: String,
    seller_tax_id: Option<String>,
    token_url: String,
    issue_url: String,
    download_url: String,
    charset: String,
    response_charset: Option<String>,
    default_tax_rate: f64,
    fixed_total_fee: Option<f64>,
    timeout: Option<Duration>,
}

impl BaiwangConfigBuilder {
    pub fn new<S: Into<String>>(app_id: S, app_key: S, seller_name: S) -> Self {
        BaiwangConfigBuilder {
            app_id: app_id.into(),
            app_key: app_key.into(),
            seller_name: seller_name.into(),
            seller_tax_id: Default::default(),
            token_url: ACCESS_TOKEN_URL.to_owned(),
            issue_url: COMMON_API_URL.to_owned(),
            download_url: DOWNLOAD_URL.to_owned(),
            charset: DEFAULT_CHARSET.to_owned(),
            response_charset: Default::default(),
            default_tax_rate: DEFAULT_TAX_RATE,
            fixed_total_fee: Default::default(),
            timeout: Default::default(),
        }
    }

    fn parse_url(url: &str) -> BaiwangResult<String> {
        let parsed = Url::parse(url)?;
        if parsed.scheme() != "http" && parsed.scheme() != "https" {
            return Err(Error::Config(format!("不支持的接口地址: {}", url)));
        }

        Ok(parsed.into())
    }

    pub fn with_token_url(mut self, url: &str) -> BaiwangResult<Self> {
        self.token_url = Self::parse_url(url)?;
        Ok(self)
    }

    pub fn with_issue_url(mut self, url: &str) -> BaiwangResult<Self> {
        self.issue_url = Self::parse_url(url)?;
        Ok(self)
    }

    pub fn with_download_url(mut self, url: &str) -> BaiwangResult<Self> {
        self.download_url = Self::parse_url(url)?;
        Ok(self)
    }

    pub fn with_seller_tax_id<S: Into<String>>(mut self, seller_tax_id: S) -> Self {
        self.seller_tax_id = Some(seller_tax_id.into());
        self
    }

    pub fn with_charset<S: Into<String>>(mut self, charset: S) -> Self {
        self.charset = charset.into();
        self
    }

    pub fn with_response_charset<S: Into<String>>(mut self, charset: S) -> Self {
        self.response_charset = Some(charset.into());
        self
    }

    pub fn with_default_tax_rate(mut self, tax_rate: f64) -> Self {
        self.default_tax_rate = tax_rate;
        self
    }

    /// 所有发票都按固定金额开具（如测试环境的 1 元票）
    pub fn with_fixed_total_fee(mut self, total_fee: f64) -> Self {
        self.fixed_total_fee = Some(total_fee);
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    pub fn build(self) -> BaiwangResult<BaiwangConfig> {
        if self.app_id.is_empty() || self.app_key.is_empty() {
            return Err(Error::Config("app_id 和 app_key 不能为空".to_owned()));
        }

        for charset in std::iter::once(&self.charset).chain(self.response_charset.as_ref()) {
            if Encoding::for_label(charset.as_bytes()).is_none() {
                return Err(Error::UnsupportedCharset(charset.clone()));
            }
        }

        if !is_valid_tax_rate(self.default_tax_rate) {
            return Err(Error::Config(format!(
                "默认税率无效: {}",
                self.default_tax_rate
            )));
        }

        if let Some(fee) = self.fixed_total_fee {
            if !(fee > 0.0) {
                return Err(Error::Config(format!("固定价税合计无效: {}", fee)));
            }
        }

        let seller_tax_id = match self.seller_tax_id {
            Some(id) => id,
            None => self.app_id.clone(),
        };

        Ok(BaiwangConfig {
            app_id: self.app_id,
            app_key: self.app_key,
            seller_name: self.seller_name,
            seller_tax_id,
            token_url: self.token_url,
            issue_url: self.issue_url,
            download_url: self.download_url,
            charset: self.charset,
            response_charset: self.response_charset,
            default_tax_rate: self.default_tax_rate,
            fixed_total_fee: self.fixed_total_fee,
            timeout: self.timeout,
        })
    }
}

/// 税率取值 [0, 1)
fn is_valid_tax_rate(rate: f64) -> bool {
    rate >= 0.0 && rate < 1.0
}

/// 百望电子发票客户端。
///
/// 每个方法只发送一次请求，不重试也不缓存，超时由配置或调用方控制。
pub struct BaiwangClient<T = HttpTransport> {
    config: BaiwangConfig,
    transport: T,
}

impl BaiwangClient<HttpTransport> {
    pub fn new(config: BaiwangConfig) -> Self {
        let transport = HttpTransport::new(config.timeout);
        Self { config, transport }
    }
}

impl<T: Transport> BaiwangClient<T> {
    pub fn with_transport(config: BaiwangConfig, transport: T) -> Self {
        Self { config, transport }
    }

    pub fn config(&self) -> &BaiwangConfig {
        &self.config
    }

    fn send(&self, url: &str, document: &Element, wire: Wire) -> BaiwangResult<Vec<u8>> {
        let bytes = document.to_document(&self.config.charset)?;
        debug!("send {} to {}", document.attr("id").unwrap_or_default(), url);

        exchange(&self.transport, url, bytes, wire)
    }

    /// 获取 access token，下载发票时需要
    pub fn fetch_access_token(&self) -> BaiwangResult<String> {
        let document = encode_auth_request(&self.config.app_id, &self.config.app_key);

        let token = self
            .send(&self.config.token_url, &document, Wire::Plain)
            .and_then(|resp| {
                decode_response(
                    &resp,
                    self.config.response_charset.as_deref(),
                    &AUTH_RESPONSE,
                )
            })
            .and_then(|business| decode_access_token(&business));

        match token {
            Ok(token) => Ok(token),
            Err(e @ Error::Business(_)) | Err(e @ Error::Malformed(_)) => {
                error!("获取 access token 失败: {}", e);
                Err(Error::Authentication(Box::new(e)))
            }
            Err(e) => Err(e),
        }
    }

    /// 补全金额和销售方信息后的开具请求
    pub(crate) fn prepare_request(&self, request: &InvoiceRequest) -> BaiwangResult<InvoiceRequest> {
        let tax_rate = request.tax_rate.unwrap_or(self.config.default_tax_rate);
        if !is_valid_tax_rate(tax_rate) {
            error!("发票 {} 的税率无效: {}", request.req_id, tax_rate);
            return Err(Error::Encoding(format!("税率无效: {}", tax_rate)));
        }

        let mut data = request.clone();
        let total_fee = self.config.fixed_total_fee.unwrap_or(request.total_fee);
        let goods_total_fee = round_fee(total_fee / (1.0 + tax_rate));
        let tax_total_fee = round_fee(total_fee - goods_total_fee);

        data.seller_tax_id = self.config.seller_tax_id.clone();
        data.seller_name = self.config.seller_name.clone();
        data.total_fee = total_fee;
        data.goods_total_fee = goods_total_fee;
        data.tax_total_fee = tax_total_fee;
        data.project_fee = goods_total_fee;
        data.tax_rate = Some(tax_rate);
        data.tax_fee = tax_total_fee;

        Ok(data)
    }

    /// 开具电子发票
    pub fn issue_invoice(&self, request: &InvoiceRequest) -> BaiwangResult<Invoice> {
        let data = self.prepare_request(request)?;
        debug!(
            "issue invoice {}: total={} goods={} tax={}",
            data.req_id, data.total_fee, data.goods_total_fee, data.tax_total_fee
        );

        let document = encode_issuance_request(&data, &self.config.charset)?;
        let resp = self.send(&self.config.issue_url, &document, Wire::Base64)?;
        let business = decode_response(
            &resp,
            self.config.response_charset.as_deref(),
            &ISSUANCE_RESPONSE,
        )?;

        decode_invoice(&business, data.total_fee)
    }

    /// 获取发票 PDF 的下载地址
    pub fn fetch_download_url(&self, access_token: &str, invoice: &Invoice) -> BaiwangResult<String> {
        let document = encode_download_request(&self.config.app_id, access_token, invoice)?;
        let resp = self.send(&self.config.download_url, &document, Wire::Plain)?;
        let business = decode_response(
            &resp,
            self.config.response_charset.as_deref(),
            &DOWNLOAD_RESPONSE,
        )?;

        decode_download_url(&business)
    }
}

#[cfg(test)]
mod tests {
    use std::{cell::RefCell, collections::VecDeque, net::TcpListener};

    use ::time::macros::datetime;

    use crate::{
        codec::decode_issuance_request,
        error::{BaiwangResult, Error},
        model::{Invoice, InvoiceRequest},
        transport::Transport,
        util::{base64_decode, base64_encode, format_fee},
        xml::parse_document,
    };

    use super::{BaiwangClient, BaiwangConfig, BaiwangConfigBuilder, ACCESS_TOKEN_URL};

    fn init() {
        let _ = env_logger::builder().is_test(true).try_init();
    }

    /// 记录请求并按顺序返回预置响应
    #[derive(Default)]
    struct Stub {
        requests: RefCell<Vec<(String, Vec<u8>)>>,
        responses: RefCell<VecDeque<Vec<u8>>>,
    }

    impl Stub {
        fn replying<B: Into<Vec<u8>>>(body: B) -> Self {
            let stub = Stub::default();
            stub.responses.borrow_mut().push_back(body.into());
            stub
        }

        fn request(&self, idx: usize) -> (String, Vec<u8>) {
            self.requests.borrow()[idx].clone()
        }
    }

    impl Transport for Stub {
        fn post(&self, url: &str, body: &[u8]) -> BaiwangResult<Vec<u8>> {
            self.requests
                .borrow_mut()
                .push((url.to_owned(), body.to_vec()));
            Ok(self.responses.borrow_mut().pop_front().unwrap_or_default())
        }
    }

    fn config() -> BaiwangConfig {
        BaiwangConfigBuilder::new("91310000MA1FL0000X", "secret", "百望测试")
            .with_issue_url("http://127.0.0.1:8080/zpdzfp")
            .unwrap()
            .build()
            .unwrap()
    }

    const ISSUE_SUCCESS: &str = r#"<?xml version="1.0" encoding="gbk"?><business id="FPKJ"><HTJS_DZFPKJ class="HTJS_DZFPKJ"><FPQQLSH>REQ1</FPQQLSH><FP_DM>FP123</FP_DM><FP_HM>000001</FP_HM><KPRQ>20230101120000</KPRQ><JQBH>499000000000</JQBH><FP_MW>03*/+&lt;&gt;</FP_MW><JYM>0123</JYM><BZ></BZ><RETURNCODE>0000</RETURNCODE><RETURNMSG>成功</RETURNMSG></HTJS_DZFPKJ></business>"#;

    fn invoice() -> Invoice {
        Invoice {
            req_id: "REQ1".to_owned(),
            code: "FP123".to_owned(),
            number: "000001".to_owned(),
            date: datetime!(2023-01-01 12:00:00),
            device_id: String::new(),
            secret: String::new(),
            verify_code: String::new(),
            backup: String::new(),
            total_fee: 1.0,
        }
    }

    #[test]
    fn builder_defaults() {
        let config = config();

        assert_eq!(config.seller_tax_id, "91310000MA1FL0000X");
        assert_eq!(config.token_url, ACCESS_TOKEN_URL);
        assert_eq!(config.issue_url, "http://127.0.0.1:8080/zpdzfp");
        assert_eq!(config.charset, "gbk");
        assert_eq!(config.default_tax_rate, 0.06);
        assert_eq!(config.fixed_total_fee, None);
        assert!(config.timeout.is_none());

        let config = BaiwangConfigBuilder::new("id", "key", "name")
            .with_seller_tax_id("91310000MA1FL0001Y")
            .build()
            .unwrap();
        assert_eq!(config.app_id, "id");
        assert_eq!(config.seller_tax_id, "91310000MA1FL0001Y");
    }

    #[test]
    fn builder_rejects_bad_config() {
        assert!(matches!(
            BaiwangConfig::builder("", "key", "name").build(),
            Err(Error::Config(_))
        ));
        assert!(matches!(
            BaiwangConfig::builder("id", "key", "name")
                .with_charset("klingon")
                .build(),
            Err(Error::UnsupportedCharset(_))
        ));
        assert!(matches!(
            BaiwangConfig::builder("id", "key", "name")
                .with_default_tax_rate(-0.1)
                .build(),
            Err(Error::Config(_))
        ));
        assert!(matches!(
            BaiwangConfig::builder("id", "key", "name").with_token_url("not a url"),
            Err(Error::Url(_))
        ));
        assert!(matches!(
            BaiwangConfig::builder("id", "key", "name").with_token_url("ftp://example.com"),
            Err(Error::Config(_))
        ));
    }

    #[test]
    fn prepare_request_applies_defaults() {
        let client = BaiwangClient::with_transport(config(), Stub::default());

        let data = client
            .prepare_request(&InvoiceRequest::new("REQ1", 1.0))
            .unwrap();

        assert_eq!(data.tax_rate, Some(0.06));
        assert_eq!(data.goods_total_fee, 0.94);
        assert_eq!(data.tax_total_fee, 0.06);
        assert_eq!(data.project_fee, 0.94);
        assert_eq!(data.tax_fee, 0.06);
        assert_eq!(data.seller_tax_id, "91310000MA1FL0000X");
        assert_eq!(data.seller_name, "百望测试");
    }

    #[test]
    fn prepare_request_keeps_caller_total() {
        let client = BaiwangClient::with_transport(config(), Stub::default());

        let mut req = InvoiceRequest::new("REQ1", 113.0);
        req.set_tax_rate(0.13);
        let data = client.prepare_request(&req).unwrap();

        assert_eq!(data.total_fee, 113.0);
        assert_eq!(data.goods_total_fee, 100.0);
        assert_eq!(data.tax_total_fee, 13.0);
        assert_eq!(data.tax_rate, Some(0.13));
    }

    #[test]
    fn prepare_request_rejects_bad_tax_rate() {
        init();

        let stub = Stub::default();
        let client = BaiwangClient::with_transport(config(), &stub);

        for rate in &[-1.0, 1.0, 1.5, f64::NAN] {
            let mut req = InvoiceRequest::new("REQ1", 1.0);
            req.set_tax_rate(*rate);

            assert!(matches!(client.prepare_request(&req), Err(Error::Encoding(_))));
            assert!(matches!(client.issue_invoice(&req), Err(Error::Encoding(_))));
        }

        let mut req = InvoiceRequest::new("REQ1", 1.0);
        req.set_tax_rate(0.0);
        let data = client.prepare_request(&req).unwrap();
        assert_eq!(data.goods_total_fee, 1.0);
        assert_eq!(data.tax_total_fee, 0.0);

        assert!(stub.requests.borrow().is_empty());
    }

    #[test]
    fn prepare_request_with_fixed_total() {
        let config = BaiwangConfigBuilder::new("id", "key", "name")
            .with_fixed_total_fee(1.0)
            .build()
            .unwrap();
        let client = BaiwangClient::with_transport(config, Stub::default());

        let data = client
            .prepare_request(&InvoiceRequest::new("REQ1", 500.0))
            .unwrap();

        assert_eq!(data.total_fee, 1.0);
        assert_eq!(format_fee(data.goods_total_fee + data.tax_total_fee), "1.00");
    }

    #[test]
    fn issue_invoice() {
        init();

        let stub = Stub::replying(base64_encode(&encoding_rs::GBK.encode(ISSUE_SUCCESS).0));
        let client = BaiwangClient::with_transport(config(), &stub);

        let invoice = client.issue_invoice(&InvoiceRequest::new("REQ1", 1.0)).unwrap();

        assert_eq!(invoice.get_code(), "FP123");
        assert_eq!(invoice.get_number(), "000001");
        assert_eq!(invoice.get_req_id(), "REQ1");
        assert_eq!(invoice.get_date(), datetime!(2023-01-01 12:00:00));
        assert_eq!(invoice.get_secret(), "03*/+<>");
        assert_eq!(invoice.get_total_fee(), 1.0);

        let (url, body) = stub.request(0);
        assert_eq!(url, "http://127.0.0.1:8080/zpdzfp");

        let document = base64_decode(std::str::from_utf8(&body).unwrap()).unwrap();
        let envelope = parse_document(&document, None).unwrap().unwrap();
        let sent = decode_issuance_request(&envelope, None).unwrap();
        assert_eq!(sent.get_total_fee(), 1.0);
        assert_eq!(sent.get_tax_rate(), Some(0.06));
        assert_eq!(sent.get_goods_total_fee(), 0.94);
        assert_eq!(sent.get_tax_total_fee(), 0.06);
        assert_eq!(sent.get_seller_name(), "百望测试");
    }

    #[test]
    fn issue_invoice_rejects_plain_response() {
        init();

        let client = BaiwangClient::with_transport(config(), Stub::replying(ISSUE_SUCCESS));

        assert!(matches!(
            client.issue_invoice(&InvoiceRequest::new("REQ1", 1.0)),
            Err(Error::Base64(_))
        ));
    }

    #[test]
    fn issue_invoice_business_rejection() {
        init();

        let body = "<business><HTJS_DZFPKJ><RETURNCODE>2001</RETURNCODE><RETURNMSG>开票金额超限</RETURNMSG></HTJS_DZFPKJ></business>";
        let client = BaiwangClient::with_transport(config(), Stub::replying(base64_encode(body.as_bytes())));

        let err = client
            .issue_invoice(&InvoiceRequest::new("REQ1", 1.0))
            .unwrap_err();
        let rejection = err.rejection().unwrap();
        assert_eq!(rejection.code, "2001");
        assert_eq!(rejection.message, "开票金额超限");
    }

    #[test]
    fn access_token() {
        init();

        let stub = Stub::replying(
            r#"<?xml version="1.0" encoding="utf-8"?><business id="YHYZ"><returnCode>0000</returnCode><returnMsg>成功</returnMsg><user><access_token>ak-123</access_token></user></business>"#,
        );
        let client = BaiwangClient::with_transport(config(), &stub);

        assert_eq!(client.fetch_access_token().unwrap(), "ak-123");

        let (url, body) = stub.request(0);
        assert_eq!(url, ACCESS_TOKEN_URL);
        let sent = parse_document(&body, None).unwrap().unwrap();
        assert_eq!(sent.require_text(&["user", "name"]).unwrap(), "91310000MA1FL0000X");
        assert_eq!(sent.require_text(&["user", "sn"]).unwrap(), "secret");
    }

    #[test]
    fn access_token_failures() {
        init();

        let client = BaiwangClient::with_transport(
            config(),
            Stub::replying("<business><returnCode>1001</returnCode><returnMsg>用户不存在</returnMsg></business>"),
        );
        match client.fetch_access_token() {
            Err(Error::Authentication(inner)) => {
                assert!(matches!(*inner, Error::Business(ref r) if r.message == "用户不存在"))
            }
            other => panic!("unexpected result: {:?}", other),
        }

        let client = BaiwangClient::with_transport(
            config(),
            Stub::replying("<business><returnCode>0000</returnCode></business>"),
        );
        match client.fetch_access_token() {
            Err(Error::Authentication(inner)) => assert!(matches!(*inner, Error::Malformed(_))),
            other => panic!("unexpected result: {:?}", other),
        }
    }

    #[test]
    fn access_token_transport_error_is_not_wrapped() {
        init();

        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let addr = listener.local_addr().unwrap();
        drop(listener);

        let config = BaiwangConfigBuilder::new("id", "key", "name")
            .with_token_url(&format!("http://{}/", addr))
            .unwrap()
            .build()
            .unwrap();
        let client = BaiwangClient::new(config);

        assert!(matches!(
            client.fetch_access_token(),
            Err(Error::Transport(_))
        ));
    }

    #[test]
    fn download_url() {
        init();

        let stub = Stub::replying(
            "<business><returnCode>0000</returnCode><returnMsg/><COMMON_FPXX_CFDZS><COMMON_FPXX_CFDZ><FP_URL>https://example/invoice.pdf</FP_URL></COMMON_FPXX_CFDZ></COMMON_FPXX_CFDZS></business>",
        );
        let client = BaiwangClient::with_transport(config(), &stub);

        let url = client.fetch_download_url("ak-123", &invoice()).unwrap();
        assert_eq!(url, "https://example/invoice.pdf");

        let (_, body) = stub.request(0);
        let sent = parse_document(&body, None).unwrap().unwrap();
        assert_eq!(sent.require_text(&["user", "access_token"]).unwrap(), "ak-123");
        assert_eq!(
            sent.require_text(&["COMMON_FPXX_CFDZS", "COMMON_FPXX_CFDZ", "KPRQ"])
                .unwrap(),
            "2023010112"
        );
    }

    #[test]
    fn missing_root_in_any_operation() {
        init();

        let client = BaiwangClient::with_transport(config(), Stub::replying(""));
        match client.fetch_access_token() {
            Err(Error::Authentication(inner)) => assert!(matches!(*inner, Error::Malformed(_))),
            other => panic!("unexpected result: {:?}", other),
        }

        let client = BaiwangClient::with_transport(config(), Stub::replying(""));
        assert!(matches!(
            client.fetch_download_url("ak", &invoice()),
            Err(Error::Malformed(_))
        ));

        let client = BaiwangClient::with_transport(config(), Stub::replying(""));
        assert!(matches!(
            client.issue_invoice(&InvoiceRequest::new("REQ1", 1.0)),
            Err(Error::Malformed(_))
        ));
    }
}
