use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::Error;

macro_rules! vendor_code {
    ($(#[$meta:meta])* $name:ident { $($(#[$vmeta:meta])* $variant:ident => $code:literal),+ $(,)? }) => {
        $(#[$meta])*
        #[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq)]
        pub enum $name {
            $(
                $(#[$vmeta])*
                #[serde(rename = $code)]
                $variant,
            )+
        }

        impl $name {
            pub fn as_str(&self) -> &'static str {
                match self {
                    $($name::$variant => $code,)+
                }
            }
        }

        impl FromStr for $name {
            type Err = Error;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                match s.trim() {
                    $($code => Ok($name::$variant),)+
                    other => Err(Error::Malformed(format!(
                        "{} 不支持的取值 `{}`",
                        stringify!($name),
                        other
                    ))),
                }
            }
        }
    };
}

vendor_code! {
    /// 征税方式（ZSFS）
    TaxType {
        /// 普通征税
        Common => "0",
        /// 减按计征
        Reduce => "1",
        /// 差额征税
        Disparity => "2",
    }
}

vendor_code! {
    /// 开票类型（KPLX）
    InvoiceType {
        /// 蓝字发票
        Blue => "0",
        /// 红字发票
        Red => "1",
    }
}

vendor_code! {
    /// 发票行性质（FPHXZ）
    TaxLineType {
        /// 正常行
        Normal => "0",
        /// 折扣行
        Discount => "1",
        /// 被折扣行
        Discounted => "2",
    }
}

vendor_code! {
    /// 优惠政策标识（YHZCBS）
    PreferentialType {
        /// 没有使用优惠政策
        NotApplied => "0",
        /// 使用了优惠政策
        Applied => "1",
    }
}

impl Default for TaxType {
    fn default() -> Self {
        TaxType::Common
    }
}

impl Default for InvoiceType {
    fn default() -> Self {
        InvoiceType::Blue
    }
}

impl Default for TaxLineType {
    fn default() -> Self {
        TaxLineType::Normal
    }
}

impl Default for PreferentialType {
    fn default() -> Self {
        PreferentialType::NotApplied
    }
}
