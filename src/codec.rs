//! 百望报文的编码与解析。
//!
//! 发票开具报文有两层：内层 `FPKJ` 文档携带发票字段，序列化后以 base64 文本放进外层
//! `DZFPKJ` 报文的 `FPXML` 元素。字段与标签的对应关系写在 [`HEADER_FIELDS`] 和
//! [`LINE_FIELDS`] 两张表里，编码和解析共用。

use crate::{
    error::{BaiwangResult, Error},
    model::{Invoice, InvoiceRequest},
    time::{parse_issue_date, to_download_hour},
    util::{base64_decode, base64_encode, format_fee, parse_fee},
    xml::{parse_document, Element},
};

/// 百望接口成功返回码
pub const SUCCESS_CODE: &str = "0000";
/// 未设置税率时使用的默认税率
pub const DEFAULT_TAX_RATE: f64 = 0.06;

const ROOT: &str = "business";
const INVOICE_DETAIL: &str = "HTJS_DZFPKJ";
const INVOICE_HEADER: &str = "COMMON_FPKJ_FPT";
const INVOICE_LINES: &str = "COMMON_FPKJ_XMXXS";
const INVOICE_LINE: &str = "COMMON_FPKJ_XMXX";
const STORAGE_LIST: &str = "COMMON_FPXX_CFDZS";
const STORAGE: &str = "COMMON_FPXX_CFDZ";
const USER_KIND: &str = "用户类型";

/// 发票字段在 [`InvoiceRequest`] 中的位置
#[derive(Debug, Clone, Copy)]
enum Slot {
    ReqId,
    InvoiceType,
    TaxType,
    SellerTaxId,
    SellerName,
    SellerAddressAndPhone,
    SellerBankNumber,
    BuyerName,
    Drawer,
    TotalFee,
    GoodsTotalFee,
    TaxTotalFee,
    CodeTableVersion,
    TaxLineType,
    GoodsCode,
    Preferential,
    ProjectName,
    Quantity,
    ProjectFee,
    TaxRate,
    TaxFee,
    /// 必须出现但不填写的元素
    Blank,
}

/// 发票头（COMMON_FPKJ_FPT），顺序即报文顺序
const HEADER_FIELDS: &[(&str, Slot)] = &[
    ("FPQQLSH", Slot::ReqId),
    ("KPLX", Slot::InvoiceType),
    ("ZSFS", Slot::TaxType),
    ("XSF_NSRSBH", Slot::SellerTaxId),
    ("XSF_MC", Slot::SellerName),
    ("XSF_DZDH", Slot::SellerAddressAndPhone),
    ("XSF_YHZH", Slot::SellerBankNumber),
    ("XSF_LXFS", Slot::Blank),
    ("GMF_NSRSBH", Slot::Blank),
    ("GMF_MC", Slot::BuyerName),
    ("GMF_DZDH", Slot::Blank),
    ("GMF_YHZH", Slot::Blank),
    ("GMF_LXFS", Slot::Blank),
    ("KPR", Slot::Drawer),
    ("SKR", Slot::Blank),
    ("FHR", Slot::Blank),
    ("YFP_DM", Slot::Blank),
    ("YFP_HM", Slot::Blank),
    ("JSHJ", Slot::TotalFee),
    ("HJJE", Slot::GoodsTotalFee),
    ("HJSE", Slot::TaxTotalFee),
    ("KCE", Slot::Blank),
    ("BZ", Slot::Blank),
    ("BMB_BBH", Slot::CodeTableVersion),
];

/// 项目明细（COMMON_FPKJ_XMXX）
const LINE_FIELDS: &[(&str, Slot)] = &[
    ("FPHXZ", Slot::TaxLineType),
    ("SPBM", Slot::GoodsCode),
    ("ZXBM", Slot::Blank),
    ("YHZCBS", Slot::Preferential),
    ("LSLBS", Slot::Blank),
    ("ZZSTSGL", Slot::Blank),
    ("XMMC", Slot::ProjectName),
    ("GGXH", Slot::Blank),
    ("DW", Slot::Blank),
    ("XMSL", Slot::Quantity),
    ("XMDJ", Slot::ProjectFee),
    ("XMJE", Slot::ProjectFee),
    ("SL", Slot::TaxRate),
    ("SE", Slot::TaxFee),
];

impl Slot {
    fn read(self, req: &InvoiceRequest) -> String {
        match self {
            Slot::ReqId => req.req_id.clone(),
            Slot::InvoiceType => req.invoice_type.as_str().to_owned(),
            Slot::TaxType => req.tax_type.as_str().to_owned(),
            Slot::SellerTaxId => req.seller_tax_id.clone(),
            Slot::SellerName => req.seller_name.clone(),
            Slot::SellerAddressAndPhone => req.seller_address_and_phone.clone(),
            Slot::SellerBankNumber => req.seller_bank_number.clone(),
            Slot::BuyerName => req.buyer_name.clone(),
            Slot::Drawer => req.drawer.clone(),
            Slot::TotalFee => format_fee(req.total_fee),
            Slot::GoodsTotalFee => format_fee(req.goods_total_fee),
            Slot::TaxTotalFee => format_fee(req.tax_total_fee),
            Slot::CodeTableVersion => req.code_table_version.clone(),
            Slot::TaxLineType => req.tax_line_type.as_str().to_owned(),
            Slot::GoodsCode => req.goods_code.clone(),
            Slot::Preferential => req.preferential.as_str().to_owned(),
            Slot::ProjectName => req.project_name.clone(),
            Slot::Quantity => "1".to_owned(),
            Slot::ProjectFee => format_fee(req.project_fee),
            Slot::TaxRate => format_fee(req.tax_rate.unwrap_or(DEFAULT_TAX_RATE)),
            Slot::TaxFee => format_fee(req.tax_fee),
            Slot::Blank => String::new(),
        }
    }

    fn write(self, req: &mut InvoiceRequest, tag: &str, text: &str) -> BaiwangResult<()> {
        match self {
            Slot::ReqId => req.req_id = text.to_owned(),
            Slot::InvoiceType => req.invoice_type = text.parse()?,
            Slot::TaxType => req.tax_type = text.parse()?,
            Slot::SellerTaxId => req.seller_tax_id = text.to_owned(),
            Slot::SellerName => req.seller_name = text.to_owned(),
            Slot::SellerAddressAndPhone => req.seller_address_and_phone = text.to_owned(),
            Slot::SellerBankNumber => req.seller_bank_number = text.to_owned(),
            Slot::BuyerName => req.buyer_name = text.to_owned(),
            Slot::Drawer => req.drawer = text.to_owned(),
            Slot::TotalFee => req.total_fee = parse_fee(tag, text)?,
            Slot::GoodsTotalFee => req.goods_total_fee = parse_fee(tag, text)?,
            Slot::TaxTotalFee => req.tax_total_fee = parse_fee(tag, text)?,
            Slot::CodeTableVersion => req.code_table_version = text.to_owned(),
            Slot::TaxLineType => req.tax_line_type = text.parse()?,
            Slot::GoodsCode => req.goods_code = text.to_owned(),
            Slot::Preferential => req.preferential = text.parse()?,
            Slot::ProjectName => req.project_name = text.to_owned(),
            Slot::ProjectFee => req.project_fee = parse_fee(tag, text)?,
            Slot::TaxRate => req.tax_rate = Some(parse_fee(tag, text)?),
            Slot::TaxFee => req.tax_fee = parse_fee(tag, text)?,
            Slot::Quantity | Slot::Blank => {}
        }

        Ok(())
    }
}

fn build_fields(name: &str, fields: &[(&str, Slot)], req: &InvoiceRequest) -> Element {
    fields.iter().fold(Element::new(name), |el, (tag, slot)| {
        el.with_child(Element::new(*tag).with_text(slot.read(req)))
    })
}

fn walk_fields(el: &Element, fields: &[(&str, Slot)], req: &mut InvoiceRequest) -> BaiwangResult<()> {
    for (tag, slot) in fields {
        let text = el.require_text(&[*tag])?;
        slot.write(req, tag, text)?;
    }

    Ok(())
}

/// 内层发票开具文档（FPKJ）
pub fn encode_invoice_document(req: &InvoiceRequest) -> Element {
    Element::new(ROOT)
        .with_attr("id", "FPKJ")
        .with_attr("comment", "发票开具")
        .with_child(
            Element::new(INVOICE_DETAIL)
                .with_attr("class", INVOICE_DETAIL)
                .with_child(
                    build_fields(INVOICE_HEADER, HEADER_FIELDS, req)
                        .with_attr("class", INVOICE_HEADER),
                )
                .with_child(
                    Element::new(INVOICE_LINES)
                        .with_attr("class", INVOICE_LINE)
                        .with_attr("size", "1")
                        .with_child(build_fields(INVOICE_LINE, LINE_FIELDS, req)),
                ),
        )
}

/// 序列化 `document` 并转成 base64，作为外层报文的文本节点
pub fn embed_document(document: &Element, charset: &str) -> BaiwangResult<String> {
    let bytes = document.to_document(charset).map_err(|e| {
        error!("序列化内层报文出错：{}", e);
        Error::Encoding(format!("无法嵌入内层报文: {}", e))
    })?;

    Ok(base64_encode(&bytes))
}

/// [`embed_document`] 的逆过程
pub fn extract_document(text: &str, charset_hint: Option<&str>) -> BaiwangResult<Element> {
    let bytes = base64_decode(text.trim())?;

    parse_document(&bytes, charset_hint)?
        .ok_or_else(|| Error::Malformed("内层报文为空".to_owned()))
}

/// 电子发票开具报文（DZFPKJ），内层发票文档以 base64 放在 `FPXML` 中
pub fn encode_issuance_request(req: &InvoiceRequest, charset: &str) -> BaiwangResult<Element> {
    let inner = embed_document(&encode_invoice_document(req), charset)?;

    Ok(Element::new(ROOT)
        .with_attr("comment", "电子发票开具")
        .with_attr("id", "DZFPKJ")
        .with_child(
            Element::new("body").with_attr("yylxdm", "1").with_child(
                Element::new("input")
                    .with_child(Element::new("DJBH").with_text(req.req_id.as_str()))
                    .with_child(Element::new("FPXML").with_text(inner)),
            ),
        ))
}

/// 从开具报文还原发票请求
pub fn decode_issuance_request(
    envelope: &Element,
    charset_hint: Option<&str>,
) -> BaiwangResult<InvoiceRequest> {
    let fpxml = envelope.require_text(&["body", "input", "FPXML"])?;
    let inner = extract_document(fpxml, charset_hint)?;

    let detail = inner
        .child(INVOICE_DETAIL)
        .ok_or_else(|| Error::Malformed(format!("缺少元素 {}", INVOICE_DETAIL)))?;
    let header = detail
        .child(INVOICE_HEADER)
        .ok_or_else(|| Error::Malformed(format!("缺少元素 {}", INVOICE_HEADER)))?;
    let line = detail
        .descendant(&[INVOICE_LINES, INVOICE_LINE])
        .ok_or_else(|| Error::Malformed(format!("缺少元素 {}", INVOICE_LINE)))?;

    let mut req = InvoiceRequest::default();
    walk_fields(header, HEADER_FIELDS, &mut req)?;
    walk_fields(line, LINE_FIELDS, &mut req)?;

    let djbh = envelope.require_text(&["body", "input", "DJBH"])?;
    if djbh != req.req_id {
        return Err(Error::Malformed(format!(
            "DJBH `{}` 与 FPQQLSH `{}` 不一致",
            djbh, req.req_id
        )));
    }

    Ok(req)
}

/// 用户验证报文（YHYZ）
pub fn encode_auth_request(app_id: &str, app_key: &str) -> Element {
    Element::new(ROOT)
        .with_attr("id", "YHYZ")
        .with_attr("comment", "用户验证")
        .with_child(
            Element::new("user")
                .with_attr("lxdm", USER_KIND)
                .with_child(Element::new("name").with_text(app_id))
                .with_child(Element::new("sn").with_text(app_key)),
        )
}

/// 发票存放地址报文（FPCFDZ）
pub fn encode_download_request(
    app_id: &str,
    access_token: &str,
    invoice: &Invoice,
) -> BaiwangResult<Element> {
    let storage = Element::new(STORAGE)
        .with_child(Element::new("FP_DM").with_text(invoice.code.as_str()))
        .with_child(Element::new("FP_HM").with_text(invoice.number.as_str()))
        .with_child(Element::new("JSHJ").with_text(format_fee(invoice.total_fee)))
        .with_child(Element::new("KPRQ").with_text(to_download_hour(&invoice.date)?));

    Ok(Element::new(ROOT)
        .with_attr("FPCFDZ", "发票存放地址")
        .with_attr("id", "FPCFDZ")
        .with_child(
            Element::new("user")
                .with_attr("lxdm", USER_KIND)
                .with_child(Element::new("name").with_text(app_id))
                .with_child(Element::new("access_token").with_text(access_token)),
        )
        .with_child(
            Element::new(STORAGE_LIST)
                .with_attr("size", "1")
                .with_child(storage),
        ))
}

/// 返回码和返回信息在响应中的位置（相对 business 根元素）
#[derive(Debug, Clone, Copy)]
pub struct ResponseLayout {
    pub code: &'static [&'static str],
    pub message: &'static [&'static str],
}

pub const AUTH_RESPONSE: ResponseLayout = ResponseLayout {
    code: &["returnCode"],
    message: &["returnMsg"],
};

pub const ISSUANCE_RESPONSE: ResponseLayout = ResponseLayout {
    code: &[INVOICE_DETAIL, "RETURNCODE"],
    message: &[INVOICE_DETAIL, "RETURNMSG"],
};

pub const DOWNLOAD_RESPONSE: ResponseLayout = AUTH_RESPONSE;

/// 解析响应并检查返回码，成功时返回 business 根元素
pub fn decode_response(
    data: &[u8],
    charset_hint: Option<&str>,
    layout: &ResponseLayout,
) -> BaiwangResult<Element> {
    let root = match parse_document(data, charset_hint)? {
        Some(root) if root.name() == ROOT => root,
        _ => {
            error!("响应缺少 {} 根元素", ROOT);
            return Err(Error::Malformed(format!("响应缺少 {} 根元素", ROOT)));
        }
    };

    let code = root.require_text(layout.code)?.trim();
    if code != SUCCESS_CODE {
        let message = root
            .descendant(layout.message)
            .map(Element::text)
            .unwrap_or_default();
        error!("百望返回错误: code={} msg={}", code, message);
        return Err(Error::business(code, message));
    }

    Ok(root)
}

pub fn decode_access_token(business: &Element) -> BaiwangResult<String> {
    Ok(business.require_text(&["user", "access_token"])?.to_owned())
}

/// 把开具成功的响应映射为 [`Invoice`]，`total_fee` 取自请求
pub fn decode_invoice(business: &Element, total_fee: f64) -> BaiwangResult<Invoice> {
    let detail = business
        .child(INVOICE_DETAIL)
        .ok_or_else(|| Error::Malformed(format!("缺少元素 {}", INVOICE_DETAIL)))?;
    let optional = |tag: &str| detail.child(tag).map(|e| e.text().to_owned()).unwrap_or_default();

    Ok(Invoice {
        req_id: optional("FPQQLSH"),
        code: detail.require_text(&["FP_DM"])?.to_owned(),
        number: detail.require_text(&["FP_HM"])?.to_owned(),
        date: parse_issue_date(detail.require_text(&["KPRQ"])?)?,
        device_id: optional("JQBH"),
        secret: optional("FP_MW"),
        verify_code: optional("JYM"),
        backup: optional("BZ"),
        total_fee,
    })
}

pub fn decode_download_url(business: &Element) -> BaiwangResult<String> {
    Ok(business
        .require_text(&[STORAGE_LIST, STORAGE, "FP_URL"])?
        .to_owned())
}
