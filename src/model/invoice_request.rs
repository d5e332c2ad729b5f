use serde::{Deserialize, Serialize};

use crate::invoice_kind::{InvoiceType, PreferentialType, TaxLineType, TaxType};

/// 电子发票开具请求数据。
///
/// 金额单位为元，报文中保留两位小数。合计金额、税额以及销售方信息由客户端在开具前填充，
/// 调用方只需要给出价税合计和开票内容。
#[derive(Serialize, Deserialize, Debug, Clone, Default, PartialEq)]
pub struct InvoiceRequest {
    /// 发票请求流水号
    pub(crate) req_id: String,
    /// 征税方式
    pub(crate) tax_type: TaxType,
    /// 开票类型
    pub(crate) invoice_type: InvoiceType,
    /// 销售方纳税人识别号
    pub(crate) seller_tax_id: String,
    /// 销售方名称
    pub(crate) seller_name: String,
    /// 销售方地址、电话
    pub(crate) seller_address_and_phone: String,
    /// 销售方银行账号
    pub(crate) seller_bank_number: String,
    /// 购买方名称
    pub(crate) buyer_name: String,
    /// 开票人
    pub(crate) drawer: String,
    /// 价税合计
    pub(crate) total_fee: f64,
    /// 合计金额（不含税）
    pub(crate) goods_total_fee: f64,
    /// 合计税额
    pub(crate) tax_total_fee: f64,
    /// 编码表版本号
    pub(crate) code_table_version: String,
    /// 发票行性质
    pub(crate) tax_line_type: TaxLineType,
    /// 项目名称
    pub(crate) project_name: String,
    /// 项目单价、项目金额（数量固定为 1）
    pub(crate) project_fee: f64,
    /// 税率，未设置时按 6% 开具
    #[serde(skip_serializing_if = "Option::is_none")]
    pub(crate) tax_rate: Option<f64>,
    /// 项目税额
    pub(crate) tax_fee: f64,
    /// 商品编码
    pub(crate) goods_code: String,
    /// 是否使用了优惠政策
    pub(crate) preferential: PreferentialType,
}

impl InvoiceRequest {
    pub fn new<S: Into<String>>(req_id: S, total_fee: f64) -> Self {
        InvoiceRequest {
            req_id: req_id.into(),
            total_fee,
            ..Default::default()
        }
    }

    pub fn get_req_id(&self) -> &str {
        &self.req_id
    }

    pub fn set_req_id<S: Into<String>>(&mut self, req_id: S) {
        self.req_id = req_id.into();
    }

    pub fn get_tax_type(&self) -> TaxType {
        self.tax_type
    }

    pub fn set_tax_type(&mut self, tax_type: TaxType) {
        self.tax_type = tax_type;
    }

    pub fn get_invoice_type(&self) -> InvoiceType {
        self.invoice_type
    }

    pub fn set_invoice_type(&mut self, invoice_type: InvoiceType) {
        self.invoice_type = invoice_type;
    }

    pub fn get_seller_tax_id(&self) -> &str {
        &self.seller_tax_id
    }

    pub fn get_seller_name(&self) -> &str {
        &self.seller_name
    }

    pub fn get_seller_address_and_phone(&self) -> &str {
        &self.seller_address_and_phone
    }

    pub fn set_seller_address_and_phone<S: Into<String>>(&mut self, address_and_phone: S) {
        self.seller_address_and_phone = address_and_phone.into();
    }

    pub fn get_seller_bank_number(&self) -> &str {
        &self.seller_bank_number
    }

    pub fn set_seller_bank_number<S: Into<String>>(&mut self, bank_number: S) {
        self.seller_bank_number = bank_number.into();
    }

    pub fn get_buyer_name(&self) -> &str {
        &self.buyer_name
    }

    pub fn set_buyer_name<S: Into<String>>(&mut self, buyer_name: S) {
        self.buyer_name = buyer_name.into();
    }

    pub fn get_drawer(&self) -> &str {
        &self.drawer
    }

    pub fn set_drawer<S: Into<String>>(&mut self, drawer: S) {
        self.drawer = drawer.into();
    }

    pub fn get_total_fee(&self) -> f64 {
        self.total_fee
    }

    pub fn set_total_fee(&mut self, total_fee: f64) {
        self.total_fee = total_fee;
    }

    pub fn get_goods_total_fee(&self) -> f64 {
        self.goods_total_fee
    }

    pub fn get_tax_total_fee(&self) -> f64 {
        self.tax_total_fee
    }

    pub fn get_code_table_version(&self) -> &str {
        &self.code_table_version
    }

    pub fn set_code_table_version<S: Into<String>>(&mut self, version: S) {
        self.code_table_version = version.into();
    }

    pub fn get_tax_line_type(&self) -> TaxLineType {
        self.tax_line_type
    }

    pub fn set_tax_line_type(&mut self, tax_line_type: TaxLineType) {
        self.tax_line_type = tax_line_type;
    }

    pub fn get_project_name(&self) -> &str {
        &self.project_name
    }

    pub fn set_project_name<S: Into<String>>(&mut self, project_name: S) {
        self.project_name = project_name.into();
    }

    pub fn get_project_fee(&self) -> f64 {
        self.project_fee
    }

    pub fn get_tax_rate(&self) -> Option<f64> {
        self.tax_rate
    }

    pub fn set_tax_rate(&mut self, tax_rate: f64) {
        self.tax_rate = Some(tax_rate);
    }

    pub fn get_tax_fee(&self) -> f64 {
        self.tax_fee
    }

    pub fn get_goods_code(&self) -> &str {
        &self.goods_code
    }

    pub fn set_goods_code<S: Into<String>>(&mut self, goods_code: S) {
        self.goods_code = goods_code.into();
    }

    pub fn get_preferential(&self) -> PreferentialType {
        self.preferential
    }

    pub fn set_preferential(&mut self, preferential: PreferentialType) {
        self.preferential = preferential;
    }
}
