use serde::{Deserialize, Serialize};
use time::PrimitiveDateTime;

/// 开具成功的发票信息
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct Invoice {
    pub(crate) req_id: String,
    /// 发票代码
    pub(crate) code: String,
    /// 发票号码
    pub(crate) number: String,
    /// 开票日期
    pub(crate) date: PrimitiveDateTime,
    /// 机器编号
    pub(crate) device_id: String,
    /// 发票密文
    pub(crate) secret: String,
    /// 校验码
    pub(crate) verify_code: String,
    /// 备注
    pub(crate) backup: String,
    /// 价税合计，下载发票时回传
    pub(crate) total_fee: f64,
}

impl Invoice {
    pub fn get_req_id(&self) -> &str {
        &self.req_id
    }

    pub fn get_code(&self) -> &str {
        &self.code
    }

    pub fn get_number(&self) -> &str {
        &self.number
    }

    pub fn get_date(&self) -> PrimitiveDateTime {
        self.date
    }

    pub fn get_device_id(&self) -> &str {
        &self.device_id
    }

    pub fn get_secret(&self) -> &str {
        &self.secret
    }

    pub fn get_verify_code(&self) -> &str {
        &self.verify_code
    }

    pub fn get_backup(&self) -> &str {
        &self.backup
    }

    pub fn get_total_fee(&self) -> f64 {
        self.total_fee
    }
}
