//! 变量模板解析
//!
//! 模板中的变量引用写作 `{{#node_id.key#}}`，可以继续向下取对象字段，
//! 例如 `{{#start.profile.city#}}`。

use serde_json::Value;

use crate::state::{Segment, Selector, VariablePool};

const OPEN: &str = "{{#";
const CLOSE: &str = "#}}";
const MAX_NODE_ID_LEN: usize = 50;
const MAX_KEY_LEN: usize = 30;
const MAX_KEYS: usize = 10;

/// 模板中的一个变量引用
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct VariableSelector {
    /// 形如 `#start.query#`，用作映射键
    pub variable: String,
    pub value_selector: Selector,
}

#[derive(Clone, Debug, PartialEq, Eq)]
enum TemplatePart<'a> {
    Literal(&'a str),
    Variable { raw: &'a str, selector: Selector },
}

pub struct VariableTemplateParser<'a> {
    template: &'a str,
}

impl<'a> VariableTemplateParser<'a> {
    pub fn new(template: &'a str) -> Self {
        Self { template }
    }

    pub fn extract_variable_selectors(&self) -> Vec<VariableSelector> {
        let mut selectors: Vec<VariableSelector> = Vec::new();
        for part in split_template(self.template) {
            if let TemplatePart::Variable { raw, selector } = part {
                let variable = raw[2..raw.len() - 2].to_string();
                if selectors.iter().all(|existing| existing.variable != variable) {
                    selectors.push(VariableSelector {
                        variable,
                        value_selector: selector,
                    });
                }
            }
        }
        selectors
    }
}

/// 渲染结果：同一组片段既能给出执行值也能给出日志展示值
#[derive(Clone, Debug, Default, PartialEq)]
pub struct SegmentGroup {
    pub segments: Vec<Segment>,
}

impl SegmentGroup {
    pub fn text(&self) -> String {
        self.segments.iter().map(Segment::text).collect()
    }

    pub fn log(&self) -> String {
        self.segments.iter().map(Segment::log).collect()
    }

    pub fn render(&self, for_log: bool) -> Value {
        Value::String(if for_log { self.log() } else { self.text() })
    }
}

/// 将模板渲染为片段组；找不到的变量保留原始引用文本
pub fn convert_template(template: &str, pool: &VariablePool) -> SegmentGroup {
    let segments = split_template(template)
        .into_iter()
        .map(|part| match part {
            TemplatePart::Literal(text) => Segment::String(text.to_string()),
            TemplatePart::Variable { raw, selector } => pool
                .get(&selector)
                .unwrap_or_else(|| Segment::String(raw.to_string())),
        })
        .collect();
    SegmentGroup { segments }
}

fn split_template(template: &str) -> Vec<TemplatePart<'_>> {
    let mut parts = Vec::new();
    let mut literal_start = 0;
    let mut cursor = 0;

    while let Some(offset) = template[cursor..].find(OPEN) {
        let open = cursor + offset;
        let inner_start = open + OPEN.len();
        let Some(close_offset) = template[inner_start..].find(CLOSE) else {
            break;
        };
        let inner_end = inner_start + close_offset;
        let end = inner_end + CLOSE.len();

        match parse_selector(&template[inner_start..inner_end]) {
            Some(selector) => {
                if literal_start < open {
                    parts.push(TemplatePart::Literal(&template[literal_start..open]));
                }
                parts.push(TemplatePart::Variable {
                    raw: &template[open..end],
                    selector,
                });
                literal_start = end;
                cursor = end;
            }
            None => {
                // 非法引用按普通文本处理，从下一个字符继续查找
                cursor = open + 1;
            }
        }
    }

    if literal_start < template.len() {
        parts.push(TemplatePart::Literal(&template[literal_start..]));
    }
    parts
}

fn parse_selector(inner: &str) -> Option<Selector> {
    let mut pieces = inner.split('.');
    let node_id = pieces.next()?;
    if node_id.is_empty()
        || node_id.len() > MAX_NODE_ID_LEN
        || !node_id.chars().all(|c| c.is_ascii_alphanumeric() || c == '_')
    {
        return None;
    }

    let keys: Vec<&str> = pieces.collect();
    if keys.is_empty() || keys.len() > MAX_KEYS {
        return None;
    }
    for key in &keys {
        let mut chars = key.chars();
        let first = chars.next()?;
        if !(first.is_ascii_alphabetic() || first == '_')
            || key.len() > MAX_KEY_LEN
            || !chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
        {
            return None;
        }
    }

    Some(Selector::new(std::iter::once(node_id).chain(keys)))
}
