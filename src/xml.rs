//! 百望报文使用的最小 XML 树：按固定顺序构建元素，解析后按路径取值。

use std::borrow::Cow;

use encoding_rs::{Encoding, UTF_8};
use quick_xml::{
    events::{BytesDecl, BytesEnd, BytesStart, BytesText, Event},
    Reader, Writer,
};

use crate::error::{BaiwangResult, Error};

#[derive(Debug, Clone, PartialEq, Default)]
pub struct Element {
    name: String,
    attributes: Vec<(String, String)>,
    text: String,
    children: Vec<Element>,
}

impl Element {
    pub fn new<S: Into<String>>(name: S) -> Self {
        Self {
            name: name.into(),
            ..Default::default()
        }
    }

    pub fn with_attr<K: Into<String>, V: Into<String>>(mut self, key: K, value: V) -> Self {
        self.attributes.push((key.into(), value.into()));
        self
    }

    pub fn with_text<S: Into<String>>(mut self, text: S) -> Self {
        self.text = text.into();
        self
    }

    pub fn with_child(mut self, child: Element) -> Self {
        self.children.push(child);
        self
    }

    pub fn push_child(&mut self, child: Element) {
        self.children.push(child);
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn text(&self) -> &str {
        &self.text
    }

    pub fn attr(&self, key: &str) -> Option<&str> {
        self.attributes
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.as_str())
    }

    pub fn children(&self) -> &[Element] {
        &self.children
    }

    /// 第一个名为 `name` 的子元素
    pub fn child(&self, name: &str) -> Option<&Element> {
        self.children.iter().find(|c| c.name == name)
    }

    /// 逐层查找子元素，`path` 为空时返回自身
    pub fn descendant(&self, path: &[&str]) -> Option<&Element> {
        path.iter().try_fold(self, |el, name| el.child(name))
    }

    /// 按路径取文本，元素不存在时报响应格式错误
    pub fn require_text(&self, path: &[&str]) -> BaiwangResult<&str> {
        self.descendant(path).map(Element::text).ok_or_else(|| {
            Error::Malformed(format!("缺少元素 {}/{}", self.name, path.join("/")))
        })
    }

    /// 序列化成带声明的完整文档，并按 `charset` 编码
    pub fn to_document(&self, charset: &str) -> BaiwangResult<Vec<u8>> {
        let encoding = lookup_encoding(charset)?;

        let mut writer = Writer::new(Vec::new());
        writer
            .write_event(Event::Decl(BytesDecl::new("1.0", Some(charset), None)))
            .map_err(xml_io)?;
        self.write_to(&mut writer).map_err(xml_io)?;

        let xml = String::from_utf8(writer.into_inner())
            .map_err(|e| Error::Encoding(format!("XML UTF-8 error: {}", e)))?;
        trace!("xml document: {}", xml);

        let (bytes, _, unmappable) = encoding.encode(&xml);
        if unmappable {
            warn!("部分字符无法用 {} 编码，已替换为字符引用", encoding.name());
        }

        Ok(bytes.into_owned())
    }

    fn write_to(&self, writer: &mut Writer<Vec<u8>>) -> std::io::Result<()> {
        let mut start = BytesStart::new(self.name.as_str());
        for (k, v) in &self.attributes {
            start.push_attribute((k.as_str(), v.as_str()));
        }

        // 没有内容的元素也必须出现
        if self.text.is_empty() && self.children.is_empty() {
            return writer.write_event(Event::Empty(start));
        }

        writer.write_event(Event::Start(start))?;
        if !self.text.is_empty() {
            writer.write_event(Event::Text(BytesText::new(&self.text)))?;
        }
        for child in &self.children {
            child.write_to(writer)?;
        }
        writer.write_event(Event::End(BytesEnd::new(self.name.as_str())))
    }
}

fn xml_io(e: std::io::Error) -> Error {
    Error::Encoding(format!("XML write error: {}", e))
}

fn lookup_encoding(label: &str) -> BaiwangResult<&'static Encoding> {
    Encoding::for_label(label.trim().as_bytes())
        .ok_or_else(|| Error::UnsupportedCharset(label.to_owned()))
}

/// XML 声明中的 encoding
pub fn declared_charset(data: &[u8]) -> Option<String> {
    let mut reader = Reader::from_reader(data);
    reader.config_mut().trim_text(true);

    match reader.read_event() {
        Ok(Event::Decl(decl)) => decl
            .encoding()
            .and_then(|e| e.ok())
            .map(|e| String::from_utf8_lossy(&e).into_owned()),
        _ => None,
    }
}

/// 把响应字节转成 UTF-8 文本。
///
/// 字符集依次取 `charset_hint`、XML 声明、UTF-8。声明里的字符集和实际字节不一定一致，
/// 所以调用方明确知道响应字符集时应传入 `charset_hint`。
pub fn decode_charset<'a>(data: &'a [u8], charset_hint: Option<&str>) -> BaiwangResult<Cow<'a, str>> {
    let encoding = match charset_hint
        .map(str::to_owned)
        .or_else(|| declared_charset(data))
    {
        Some(label) => lookup_encoding(&label)?,
        None => UTF_8,
    };

    let (text, actual, malformed) = encoding.decode(data);
    if malformed {
        warn!("响应中存在无法按 {} 解码的字节", actual.name());
    }

    Ok(text)
}

/// 解析文档，返回根元素；文档中没有任何元素时返回 `None`
pub fn parse_document(data: &[u8], charset_hint: Option<&str>) -> BaiwangResult<Option<Element>> {
    let text = decode_charset(data, charset_hint)?;

    let mut reader = Reader::from_str(&text);

    let mut stack: Vec<Element> = Vec::new();
    let mut root = None;

    loop {
        match reader.read_event().map_err(|e| {
            error!("解析 XML 出错：{}", e);
            e
        })? {
            Event::Start(ref e) => stack.push(element_from_start(e)?),
            Event::Empty(ref e) => {
                let el = element_from_start(e)?;
                attach(&mut stack, &mut root, el);
            }
            Event::End(_) => {
                if let Some(mut el) = stack.pop() {
                    // 子元素之间的缩进和换行不算文本，叶子元素的内容原样保留
                    if !el.children.is_empty() && el.text.chars().all(char::is_whitespace) {
                        el.text.clear();
                    }
                    attach(&mut stack, &mut root, el);
                }
            }
            Event::Text(ref e) => {
                if let Some(current) = stack.last_mut() {
                    current.text.push_str(&e.unescape().map_err(quick_xml::Error::from)?);
                }
            }
            Event::CData(e) => {
                if let Some(current) = stack.last_mut() {
                    current.text.push_str(&String::from_utf8_lossy(&e.into_inner()));
                }
            }
            Event::Eof => break,
            _ => {}
        }
    }

    if let Some(open) = stack.first() {
        return Err(Error::Malformed(format!("元素 {} 没有闭合", open.name)));
    }

    Ok(root)
}

fn element_from_start(start: &BytesStart<'_>) -> BaiwangResult<Element> {
    let mut el = Element::new(String::from_utf8_lossy(start.name().as_ref()).into_owned());
    for attr in start.attributes() {
        let attr = attr.map_err(quick_xml::Error::from)?;
        el.attributes.push((
            String::from_utf8_lossy(attr.key.as_ref()).into_owned(),
            attr.unescape_value()
                .map_err(quick_xml::Error::from)?
                .into_owned(),
        ));
    }

    Ok(el)
}

fn attach(stack: &mut Vec<Element>, root: &mut Option<Element>, el: Element) {
    match stack.last_mut() {
        Some(parent) => parent.children.push(el),
        None => {
            if root.is_none() {
                *root = Some(el);
            }
        }
    }
}
