// ==========================================
// 棒材库存管理系统 - 规格解析器
// ==========================================
// 职责: 自由文本规格 → MaterialSpec（牌号/形状/尺寸/专用品号/剩余文本）
// 红线: 解析永不失败；无法识别时返回降级结果并附带告警，不丢弃输入
// 红线: 无 I/O，无状态（除只读配置）
// ==========================================
// 流程:
// 1. 归一化（全角→半角、空白折叠）
// 2. 提取括号内容（首个非空 → 专用品号）
// 3. 按固定优先级依次尝试尺寸匹配器，首个命中生效
// 4. 取匹配位置之前的首个字母数字开头的词作为牌号
// 5. 剩余文本保留在 remainder
// 6. 形状: 匹配器提示 → 关键字 → 默认圆棒
// ==========================================

use crate::config::engine_config::SpecParserConfig;
use crate::domain::{MaterialSpec, Shape};
use once_cell::sync::OnceCell;
use regex_lite::Regex;
use serde::{Deserialize, Serialize};
use std::ops::Range;
use tracing::debug;

/// 六角关键字（先于方形检查，"六角"含"角"）
const HEXAGON_KEYWORDS: &[&str] = &["HEX", "六角"];
/// 方形关键字
const SQUARE_KEYWORDS: &[&str] = &["SQ", "□", "角"];

// ==========================================
// 解析结果
// ==========================================

/// 解析质量
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ParseQuality {
    Complete,         // 牌号 + 尺寸均已识别
    MissingDimension, // 有牌号，无尺寸
    Degraded,         // 无法分离牌号
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ParsedSpec {
    pub spec: MaterialSpec,
    pub quality: ParseQuality,
    pub warnings: Vec<String>,
}

impl ParsedSpec {
    pub fn is_degraded(&self) -> bool {
        self.quality == ParseQuality::Degraded
    }
}

// ==========================================
// DimensionMatcher - 尺寸匹配器
// ==========================================

/// 单次尺寸匹配结果
#[derive(Debug, Clone, PartialEq)]
pub struct DimensionMatch {
    pub dimension_mm: f64,
    pub shape_hint: Option<Shape>,
    /// 匹配到的文本区间（字节偏移）
    pub span: Range<usize>,
}

/// 尺寸匹配器（按优先级排列，首个命中生效）
pub trait DimensionMatcher: Send + Sync {
    fn name(&self) -> &'static str;

    fn try_match(&self, text: &str) -> Option<DimensionMatch>;
}

/// 用正则的第 1 个捕获组作为尺寸，整体匹配作为区间
fn capture_dimension(re: &Regex, text: &str, shape_hint: Option<Shape>) -> Option<DimensionMatch> {
    let caps = re.captures(text)?;
    let whole = caps.get(0)?;
    let dimension_mm = caps.get(1)?.as_str().parse::<f64>().ok()?;
    Some(DimensionMatch {
        dimension_mm,
        shape_hint,
        span: whole.start()..whole.end(),
    })
}

/// 直径符号: φ8.0 / ∅12 → 圆棒
pub struct DiameterMarkMatcher;

impl DimensionMatcher for DiameterMarkMatcher {
    fn name(&self) -> &'static str {
        "diameter_mark"
    }

    fn try_match(&self, text: &str) -> Option<DimensionMatch> {
        static RE: OnceCell<Regex> = OnceCell::new();
        let re = RE.get_or_init(|| {
            Regex::new(r"[φΦ∅øØ⌀]\s*(\d+(?:\.\d+)?)").expect("valid diameter regex")
        });
        capture_dimension(re, text, Some(Shape::Round))
    }
}

/// 六角对边: HEX17 / hex 17.0 → 六角棒
pub struct HexKeyMatcher;

impl DimensionMatcher for HexKeyMatcher {
    fn name(&self) -> &'static str {
        "hex_key"
    }

    fn try_match(&self, text: &str) -> Option<DimensionMatch> {
        static RE: OnceCell<Regex> = OnceCell::new();
        let re = RE.get_or_init(|| {
            Regex::new(r"(?i)HEX\s*(\d+(?:\.\d+)?)").expect("valid hex regex")
        });
        capture_dimension(re, text, Some(Shape::Hexagon))
    }
}

/// 裸小数: 12.0（后缀 mm 一并吸收）
pub struct DecimalNumberMatcher;

impl DimensionMatcher for DecimalNumberMatcher {
    fn name(&self) -> &'static str {
        "decimal_number"
    }

    fn try_match(&self, text: &str) -> Option<DimensionMatch> {
        static RE: OnceCell<Regex> = OnceCell::new();
        let re = RE.get_or_init(|| {
            Regex::new(r"(\d+\.\d+)(?:\s*(?i:mm))?").expect("valid decimal regex")
        });
        capture_dimension(re, text, None)
    }
}

/// 毫米后缀: 20mm / 20 MM
pub struct MillimeterSuffixMatcher;

impl DimensionMatcher for MillimeterSuffixMatcher {
    fn name(&self) -> &'static str {
        "millimeter_suffix"
    }

    fn try_match(&self, text: &str) -> Option<DimensionMatch> {
        static RE: OnceCell<Regex> = OnceCell::new();
        let re = RE.get_or_init(|| {
            Regex::new(r"(\d+(?:\.\d+)?)\s*(?i:mm)").expect("valid millimeter regex")
        });
        capture_dimension(re, text, None)
    }
}

/// 默认匹配器序列（顺序即优先级）
pub fn default_matchers() -> Vec<Box<dyn DimensionMatcher>> {
    vec![
        Box::new(DiameterMarkMatcher),
        Box::new(HexKeyMatcher),
        Box::new(DecimalNumberMatcher),
        Box::new(MillimeterSuffixMatcher),
    ]
}

// ==========================================
// 文本归一化
// ==========================================

/// 全角 ASCII → 半角，全角空格 → 空格，空白折叠并去首尾
pub fn normalize_text(text: &str) -> String {
    let folded: String = text
        .chars()
        .map(|c| match c {
            '\u{3000}' => ' ',
            '\u{FF01}'..='\u{FF5E}' => char::from_u32(c as u32 - 0xFEE0).unwrap_or(c),
            _ => c,
        })
        .collect();
    folded.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// 别名键归一化（保留大小写）
pub fn normalize_alias_key(text: &str) -> String {
    normalize_text(text)
}

/// 拆出所有括号内容
///
/// # 返回
/// - (去括号后的文本, 各括号内容按出现顺序)
fn extract_parenthesized(text: &str) -> (String, Vec<String>) {
    let mut stripped = String::with_capacity(text.len());
    let mut groups = Vec::new();
    let mut rest = text;

    while let Some(open) = rest.find('(') {
        let Some(close_rel) = rest[open + 1..].find(')') else {
            break;
        };
        let close = open + 1 + close_rel;
        stripped.push_str(&rest[..open]);
        stripped.push(' ');
        groups.push(rest[open + 1..close].trim().to_string());
        rest = &rest[close + 1..];
    }
    stripped.push_str(rest);

    (normalize_text(&stripped), groups)
}

// ==========================================
// SpecParser
// ==========================================
pub struct SpecParser {
    config: SpecParserConfig,
    matchers: Vec<Box<dyn DimensionMatcher>>,
}

impl Default for SpecParser {
    fn default() -> Self {
        Self::new(SpecParserConfig::default())
    }
}

impl SpecParser {
    pub fn new(config: SpecParserConfig) -> Self {
        Self {
            config,
            matchers: default_matchers(),
        }
    }

    /// 自定义匹配器序列
    pub fn with_matchers(config: SpecParserConfig, matchers: Vec<Box<dyn DimensionMatcher>>) -> Self {
        Self { config, matchers }
    }

    pub fn config(&self) -> &SpecParserConfig {
        &self.config
    }

    /// 解析规格文本
    ///
    /// # 返回
    /// - ParsedSpec: 始终返回；quality 表示识别程度
    pub fn parse(&self, text: &str) -> ParsedSpec {
        let normalized = normalize_text(text);
        if normalized.is_empty() {
            return self.degraded(&normalized, "规格文本为空");
        }

        let (body, groups) = extract_parenthesized(&normalized);
        let mut non_empty = groups.into_iter().filter(|g| !g.is_empty());
        let dedicated_part_number = non_empty.next();
        let extra_groups: Vec<String> = non_empty.collect();

        let matched = self.matchers.iter().find_map(|m| {
            m.try_match(&body).map(|hit| {
                debug!(matcher = m.name(), dimension_mm = hit.dimension_mm, "尺寸匹配命中");
                hit
            })
        });

        let (family, family_range) = match &matched {
            Some(hit) => {
                let before = self.isolate_family(&body[..hit.span.start], 0, true);
                match before {
                    Some(found) => found,
                    None => match self.isolate_family(&body[hit.span.end..], hit.span.end, false) {
                        Some(found) => found,
                        None => return self.degraded(&normalized, "无法识别材质牌号"),
                    },
                }
            }
            None => match self.isolate_family(&body, 0, true) {
                Some(found) => found,
                None => return self.degraded(&normalized, "无法识别材质牌号"),
            },
        };

        // 剩余文本: 去掉牌号与尺寸区间
        let mut cut: Vec<Range<usize>> = vec![family_range];
        if let Some(hit) = &matched {
            cut.push(hit.span.clone());
        }
        cut.sort_by_key(|r| r.start);
        let mut leftover = String::new();
        let mut pos = 0;
        for range in &cut {
            leftover.push_str(&body[pos..range.start]);
            leftover.push(' ');
            pos = range.end;
        }
        leftover.push_str(&body[pos..]);
        let mut pieces = vec![normalize_text(&leftover)];
        pieces.extend(extra_groups);
        let remainder = normalize_text(&pieces.join(" "));
        let remainder = (!remainder.is_empty()).then_some(remainder);

        let shape = matched
            .as_ref()
            .and_then(|hit| hit.shape_hint)
            .unwrap_or_else(|| shape_from_keywords(remainder.as_deref().unwrap_or("")));

        let mut warnings = Vec::new();
        let quality = if let Some(hit) = &matched {
            if is_glued_number(&body, &hit.span) {
                warnings.push(format!("尺寸数字紧贴前文，牌号可能被截断: '{}'", normalized));
            }
            ParseQuality::Complete
        } else {
            warnings.push(format!("未识别尺寸: '{}'", normalized));
            ParseQuality::MissingDimension
        };

        ParsedSpec {
            spec: MaterialSpec {
                family_name: family,
                shape,
                dimension_mm: matched.map(|hit| hit.dimension_mm),
                dedicated_part_number,
                remainder,
            },
            quality,
            warnings,
        }
    }

    /// 在片段中找牌号
    ///
    /// # 参数
    /// - fragment: 候选片段
    /// - offset: 片段在整体文本中的字节偏移
    /// - allow_leading: 片段首个词是否可用（尺寸之后的片段，紧贴尺寸的词不算）
    fn isolate_family(
        &self,
        fragment: &str,
        offset: usize,
        allow_leading: bool,
    ) -> Option<(String, Range<usize>)> {
        let mut cursor = 0;
        for (idx, token) in fragment.split(' ').enumerate() {
            let start = cursor;
            cursor += token.len() + 1;
            if idx == 0 && !allow_leading && !token.is_empty() {
                continue;
            }
            let Some(first) = token.chars().next() else {
                continue;
            };
            if !first.is_ascii_alphanumeric() {
                continue;
            }
            let run_len = token
                .char_indices()
                .find(|(_, c)| !(c.is_ascii_alphanumeric() || *c == '-' || *c == '_'))
                .map(|(i, _)| i)
                .unwrap_or(token.len());
            let family = self.canonical_family(&token[..run_len]);
            if family.is_empty() {
                continue;
            }
            return Some((family, offset + start..offset + start + run_len));
        }
        None
    }

    /// 大写 + 后缀归一 + 去尾部分隔符
    fn canonical_family(&self, run: &str) -> String {
        let mut family = run.to_uppercase();
        for (from, to) in &self.config.family_suffix_folds {
            if family.len() > from.len() && family.ends_with(from.as_str()) {
                family.truncate(family.len() - from.len());
                family.push_str(to);
                break;
            }
        }
        family.trim_end_matches(['-', '_']).to_string()
    }

    fn degraded(&self, normalized: &str, reason: &str) -> ParsedSpec {
        let family_name: String = normalized.chars().take(self.config.max_family_len).collect();
        ParsedSpec {
            spec: MaterialSpec {
                family_name,
                shape: Shape::Unknown,
                dimension_mm: None,
                dedicated_part_number: None,
                remainder: None,
            },
            quality: ParseQuality::Degraded,
            warnings: vec![format!("{}: '{}'", reason, normalized)],
        }
    }
}

/// 裸数字尺寸紧贴在字母/数字之后（如 SUS3038.0，无法区分牌号与尺寸）
fn is_glued_number(body: &str, span: &Range<usize>) -> bool {
    let starts_with_digit = body[span.start..]
        .chars()
        .next()
        .is_some_and(|c| c.is_ascii_digit());
    let glued = body[..span.start]
        .chars()
        .next_back()
        .is_some_and(|c| c.is_ascii_alphanumeric());
    starts_with_digit && glued
}

/// 按关键字推断形状（六角优先）
fn shape_from_keywords(text: &str) -> Shape {
    let upper = text.to_uppercase();
    if HEXAGON_KEYWORDS.iter().any(|k| upper.contains(k)) {
        Shape::Hexagon
    } else if SQUARE_KEYWORDS.iter().any(|k| upper.contains(k)) {
        Shape::Square
    } else {
        Shape::Round
    }
}
