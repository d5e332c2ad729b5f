use std::convert::TryFrom;

use ::time::{
    format_description::FormatItem, macros::format_description, Date, Month, PrimitiveDateTime,
    Time,
};

use crate::error::{BaiwangResult, Error};

/// 下载发票时开票日期只精确到小时
const DOWNLOAD_HOUR_FORMAT: &[FormatItem<'static>] = format_description!("[year][month][day][hour]");

fn digits(text: &str, range: std::ops::Range<usize>) -> u32 {
    text[range]
        .bytes()
        .fold(0, |acc, b| acc * 10 + u32::from(b - b'0'))
}

/// 解析百望返回的 14 位开票日期（YYYYMMDDHHMMSS）
pub fn parse_issue_date(text: &str) -> BaiwangResult<PrimitiveDateTime> {
    let text = text.trim();
    if text.len() != 14 || !text.bytes().all(|b| b.is_ascii_digit()) {
        return Err(Error::Malformed(format!("开票日期格式错误: `{}`", text)));
    }

    let invalid = |e: ::time::error::ComponentRange| {
        Error::Malformed(format!("开票日期 `{}` 无效: {}", text, e))
    };

    let month = Month::try_from(digits(text, 4..6) as u8).map_err(invalid)?;
    let date = Date::from_calendar_date(digits(text, 0..4) as i32, month, digits(text, 6..8) as u8)
        .map_err(invalid)?;
    let time = Time::from_hms(
        digits(text, 8..10) as u8,
        digits(text, 10..12) as u8,
        digits(text, 12..14) as u8,
    )
    .map_err(invalid)?;

    Ok(PrimitiveDateTime::new(date, time))
}

pub fn to_download_hour(date: &PrimitiveDateTime) -> BaiwangResult<String> {
    date.format(DOWNLOAD_HOUR_FORMAT)
        .map_err(|e| Error::Encoding(format!("格式化开票日期出错: {}", e)))
}
