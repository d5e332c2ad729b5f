use std::time::Duration;

use rust_baiwang_sdk::{
    error::BaiwangResult,
    invoice_kind::{PreferentialType, TaxLineType},
    BaiwangClient, BaiwangConfigBuilder, InvoiceRequest,
};

const APP_ID: &str = "91310000MA1FL0000X";
const APP_KEY: &str = "0123456789abcdef";
const SELLER_NAME: &str = "上海百望测试有限公司";

fn main() -> BaiwangResult<()> {
    env_logger::init();

    let config = BaiwangConfigBuilder::new(APP_ID, APP_KEY, SELLER_NAME)
        .with_timeout(Duration::from_secs(30))
        .build()?;
    let client = BaiwangClient::new(config);

    let mut request = InvoiceRequest::new("REQ20230101000001", 1.0);
    request.set_buyer_name("张三");
    request.set_drawer("李四");
    request.set_code_table_version("33.0");
    request.set_tax_line_type(TaxLineType::Normal);
    request.set_project_name("*信息技术服务*软件服务费");
    request.set_goods_code("3040201000000000000");
    request.set_preferential(PreferentialType::NotApplied);

    let invoice = client.issue_invoice(&request)?;
    println!("开具成功: {} {}", invoice.get_code(), invoice.get_number());

    let access_token = client.fetch_access_token()?;
    let url = client.fetch_download_url(&access_token, &invoice)?;
    println!("下载地址: {}", url);

    Ok(())
}
