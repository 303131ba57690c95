//! 过滤条件：属性 + 方法 + 0..2 个取值
//!
//! 线上格式（请求体与状态令牌）为元组数组 `["attribute", "method", v1?, v2?]`，
//! 末尾的 null 值一律裁剪。

use std::fmt;

use serde::de::Error as _;
use serde::ser::SerializeSeq;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use serde_json::{Number, Value};

/// 过滤方法；同一「族」内的方法在同一属性上互斥
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FilterMethod {
    /// 全文检索，全局唯一（不论属性）
    #[serde(rename = "q")]
    Query,
    Match,
    Eq,
    Ne,
    In,
    NotIn,
    Range,
    Exist,
    NotExist,
}

impl FilterMethod {
    pub fn as_str(&self) -> &'static str {
        match self {
            FilterMethod::Query => "q",
            FilterMethod::Match => "match",
            FilterMethod::Eq => "eq",
            FilterMethod::Ne => "ne",
            FilterMethod::In => "in",
            FilterMethod::NotIn => "not_in",
            FilterMethod::Range => "range",
            FilterMethod::Exist => "exist",
            FilterMethod::NotExist => "not_exist",
        }
    }

    /// 设置本方法时需一并清除的同属性方法
    pub fn family(&self) -> &'static [FilterMethod] {
        use FilterMethod::*;
        match self {
            Query => &[Query],
            Match => &[Match],
            Eq | Ne => &[Eq, Ne],
            In | NotIn | Range => &[Range, In, NotIn],
            Exist | NotExist => &[Exist, NotExist],
        }
    }

    /// 新设置的 `self` 是否取代已存在的 `existing`（属性为 `attribute`）
    pub fn supersedes(&self, attribute: &str, existing: &Filter) -> bool {
        if *self == FilterMethod::Query {
            return existing.method == FilterMethod::Query;
        }
        existing.attribute == attribute && self.family().contains(&existing.method)
    }
}

impl fmt::Display for FilterMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// 过滤取值：字符串 / 数值 / 布尔；Null 仅用于开区间（如只有上界的 range）
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum FilterValue {
    Null,
    Bool(bool),
    Number(Number),
    String(String),
}

impl FilterValue {
    pub fn is_null(&self) -> bool {
        matches!(self, FilterValue::Null)
    }

    fn from_json(value: &Value) -> Option<Self> {
        match value {
            Value::Null => Some(FilterValue::Null),
            Value::Bool(b) => Some(FilterValue::Bool(*b)),
            Value::Number(n) => Some(FilterValue::Number(n.clone())),
            Value::String(s) => Some(FilterValue::String(s.clone())),
            Value::Array(_) | Value::Object(_) => None,
        }
    }
}

impl From<&str> for FilterValue {
    fn from(v: &str) -> Self {
        FilterValue::String(v.to_string())
    }
}

impl From<String> for FilterValue {
    fn from(v: String) -> Self {
        FilterValue::String(v)
    }
}

impl From<bool> for FilterValue {
    fn from(v: bool) -> Self {
        FilterValue::Bool(v)
    }
}

impl From<f64> for FilterValue {
    fn from(v: f64) -> Self {
        // NaN / 无穷不可表示为 JSON 数值
        Number::from_f64(v).map_or(FilterValue::Null, FilterValue::Number)
    }
}

macro_rules! impl_integer_value {
    ($($t:ty),*) => {
        $(
            impl From<$t> for FilterValue {
                fn from(v: $t) -> Self {
                    FilterValue::Number(Number::from(v))
                }
            }
        )*
    };
}

impl_integer_value!(i32, i64, u32, u64, usize);

impl<T: Into<FilterValue>> From<Option<T>> for FilterValue {
    fn from(v: Option<T>) -> Self {
        v.map_or(FilterValue::Null, Into::into)
    }
}

/// `set_filter` 的取值参数：`()`、单值、二元组或列表
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FilterValues(pub Vec<FilterValue>);

impl From<()> for FilterValues {
    fn from(_: ()) -> Self {
        FilterValues(Vec::new())
    }
}

impl From<Vec<FilterValue>> for FilterValues {
    fn from(v: Vec<FilterValue>) -> Self {
        FilterValues(v)
    }
}

impl<A: Into<FilterValue>, B: Into<FilterValue>> From<(A, B)> for FilterValues {
    fn from((a, b): (A, B)) -> Self {
        FilterValues(vec![a.into(), b.into()])
    }
}

macro_rules! impl_single_values {
    ($($t:ty),*) => {
        $(
            impl From<$t> for FilterValues {
                fn from(v: $t) -> Self {
                    FilterValues(vec![v.into()])
                }
            }
        )*
    };
}

impl_single_values!(FilterValue, &str, String, bool, f64, i32, i64, u32, u64, usize);

/// 一条过滤条件
#[derive(Debug, Clone, PartialEq)]
pub struct Filter {
    pub attribute: String,
    pub method: FilterMethod,
    pub values: Vec<FilterValue>,
}

impl Filter {
    /// 构造并裁剪末尾的 Null 取值；属性与方法总是保留（即使属性为空串）
    pub fn new(
        attribute: impl Into<String>,
        method: FilterMethod,
        values: impl Into<FilterValues>,
    ) -> Self {
        let mut values = values.into().0;
        while values.last().is_some_and(FilterValue::is_null) {
            values.pop();
        }
        Self {
            attribute: attribute.into(),
            method,
            values,
        }
    }

    /// 属性 / 方法匹配：None 表示该维度不参与比较
    pub fn matches(&self, attribute: Option<&str>, method: Option<FilterMethod>) -> bool {
        attribute.map_or(true, |a| self.attribute == a) && method.map_or(true, |m| self.method == m)
    }

    /// 取值部分：恰好一个时解包为标量，否则按顺序返回列表
    pub fn extract_values(&self) -> ExtractedValues {
        match self.values.as_slice() {
            [single] => ExtractedValues::Single(single.clone()),
            many => ExtractedValues::List(many.to_vec()),
        }
    }
}

/// `get_filter_values` 的返回：单值解包，多值为列表
#[derive(Debug, Clone, PartialEq)]
pub enum ExtractedValues {
    Single(FilterValue),
    List(Vec<FilterValue>),
}

impl Serialize for Filter {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut seq = serializer.serialize_seq(Some(2 + self.values.len()))?;
        seq.serialize_element(&self.attribute)?;
        seq.serialize_element(self.method.as_str())?;
        for value in &self.values {
            seq.serialize_element(value)?;
        }
        seq.end()
    }
}

impl<'de> Deserialize<'de> for Filter {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let tuple = Vec::<Value>::deserialize(deserializer)?;
        let (attribute, method, rest) = match tuple.as_slice() {
            [Value::String(a), m, rest @ ..] if rest.len() <= 2 => (a.clone(), m.clone(), rest),
            _ => return Err(D::Error::custom("filter must be [attribute, method, value?, value?]")),
        };
        let method: FilterMethod = serde_json::from_value(method).map_err(D::Error::custom)?;
        let values = rest
            .iter()
            .map(|v| FilterValue::from_json(v).ok_or_else(|| D::Error::custom("filter value must be scalar")))
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Filter::new(attribute, method, values))
    }
}
