//! 文档模型
//!
//! 外部容器（EPUB 压缩包、逐页转写目录等）的解析不在本库范围内。
//! 调用方提供有序的 `(成员名, 字节)` 列表，本模块据此区分承载正文的章节
//! 和需要原样透传的成员，并在处理结束后按原顺序交还。

use encoding_rs::UTF_8;

/// 章节内容
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SectionBody {
    /// 承载正文、需要切分翻译的文本
    Text(String),
    /// 原样透传的二进制成员
    Binary(Vec<u8>),
}

/// 文档中的一个成员
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Section {
    pub name: String,
    pub body: SectionBody,
}

impl Section {
    pub fn text(name: impl Into<String>, content: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            body: SectionBody::Text(content.into()),
        }
    }

    pub fn binary(name: impl Into<String>, bytes: impl Into<Vec<u8>>) -> Self {
        Self {
            name: name.into(),
            body: SectionBody::Binary(bytes.into()),
        }
    }

    /// 正文内容，透传成员返回 `None`
    pub fn content(&self) -> Option<&str> {
        match &self.body {
            SectionBody::Text(text) => Some(text),
            SectionBody::Binary(_) => None,
        }
    }

    pub fn is_content_bearing(&self) -> bool {
        matches!(self.body, SectionBody::Text(_))
    }

    /// 成员的原始字节
    pub fn as_bytes(&self) -> &[u8] {
        match &self.body {
            SectionBody::Text(text) => text.as_bytes(),
            SectionBody::Binary(bytes) => bytes,
        }
    }
}

/// 由有序成员组成的文档
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Document {
    pub sections: Vec<Section>,
}

impl Document {
    pub fn new(sections: Vec<Section>) -> Self {
        Self { sections }
    }

    /// 从容器成员构建文档
    ///
    /// 名称以 `content_extensions` 之一结尾且能按严格 UTF-8 解码的成员视为正文，
    /// 其余成员一律透传。
    pub fn from_members<S: AsRef<str>>(
        members: Vec<(String, Vec<u8>)>,
        content_extensions: &[S],
    ) -> Self {
        let sections = members
            .into_iter()
            .map(|(name, bytes)| {
                let lower = name.to_lowercase();
                let wants_text = content_extensions
                    .iter()
                    .any(|ext| lower.ends_with(&ext.as_ref().to_lowercase()));
                if !wants_text {
                    return Section::binary(name, bytes);
                }

                let decoded = UTF_8
                    .decode_without_bom_handling_and_without_replacement(&bytes)
                    .map(|text| text.into_owned());
                match decoded {
                    Some(text) => Section::text(name, text),
                    None => {
                        tracing::warn!("成员 {} 不是有效的 UTF-8，按二进制透传", name);
                        Section::binary(name, bytes)
                    }
                }
            })
            .collect();

        Self { sections }
    }

    /// 交还容器成员，顺序与构建时一致
    pub fn into_members(self) -> Vec<(String, Vec<u8>)> {
        self.sections
            .into_iter()
            .map(|section| {
                let bytes = match section.body {
                    SectionBody::Text(text) => text.into_bytes(),
                    SectionBody::Binary(bytes) => bytes,
                };
                (section.name, bytes)
            })
            .collect()
    }

    /// 正文章节
    pub fn content_sections(&self) -> impl Iterator<Item = &Section> {
        self.sections.iter().filter(|s| s.is_content_bearing())
    }

    pub fn section(&self, name: &str) -> Option<&Section> {
        self.sections.iter().find(|s| s.name == name)
    }

    /// 文档指纹
    ///
    /// 覆盖所有成员的名称、类型和内容，用于在恢复任务时确认源文档未变。
    pub fn fingerprint(&self) -> String {
        let mut hasher = blake3::Hasher::new();
        for section in &self.sections {
            let kind: &[u8] = if section.is_content_bearing() { b"T" } else { b"B" };
            hasher.update(kind);
            hasher.update(&(section.name.len() as u64).to_le_bytes());
            hasher.update(section.name.as_bytes());
            let bytes = section.as_bytes();
            hasher.update(&(bytes.len() as u64).to_le_bytes());
            hasher.update(bytes);
        }
        hasher.finalize().to_hex().to_string()
    }
}
