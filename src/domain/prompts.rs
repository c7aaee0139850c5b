//! 提示词构建
//!
//! 各生成层级的提示词模板与目标 JSON 形态。润色提示词按段落位置
//! 三分（无邻居 / 仅前文 / 前后文），章节仅一段时必须走无邻居模板。

use serde::Deserialize;
use serde_json::{json, Value};

use super::book::{BookSpec, Paragraph};

// ============================================================================
// 目标形态
// ============================================================================

/// 章节规划响应
#[derive(Debug, Clone, Deserialize)]
pub struct ChapterPlan {
    pub chapters: Vec<ChapterSeed>,
}

/// 规划出的单个章节
#[derive(Debug, Clone, Deserialize)]
pub struct ChapterSeed {
    pub title: String,
    pub idea: String,
}

/// 段落规划响应
#[derive(Debug, Clone, Deserialize)]
pub struct ParagraphPlan {
    pub paragraphs: Vec<ParagraphSeed>,
}

/// 规划出的单个段落种子
#[derive(Debug, Clone, Deserialize)]
pub struct ParagraphSeed {
    pub idea: String,
}

/// 段落生成/润色响应
#[derive(Debug, Clone, Deserialize)]
pub struct GeneratedParagraph {
    pub text: String,
}

/// 章节规划的目标 schema
pub fn chapter_plan_schema() -> Value {
    json!({
        "chapters": [
            {
                "title": "String",
                "idea": "String"
            }
        ]
    })
}

/// 段落规划的目标 schema
pub fn paragraph_plan_schema() -> Value {
    json!({
        "paragraphs": [
            {
                "idea": "String"
            }
        ]
    })
}

/// 单段正文的目标 schema
pub fn paragraph_schema() -> Value {
    json!({ "text": "String" })
}

// ============================================================================
// 规划与生成提示词
// ============================================================================

/// 章节规划提示词
pub fn chapter_plan_prompt(spec: &BookSpec) -> String {
    let base = format!(
        "You're a book content manager. Your purpose is to generate a book schema template \
         based on user specifications which will be used to create a book. Your response \
         should match this json schema: {}. Under no circumstance should your response \
         include any other information than the json response schema. Please give me a JSON \
         response without including any code blocks or the ```json syntax.",
        chapter_plan_schema()
    );
    let special = format!("Special Configuration: {}", spec.instructions);
    let book_info = format!("Book Generation Specifications: {}", spec.informative_text);
    let book_data = format!("Book data: {{\"title\": \"{}\"}}", spec.title);

    [base, special, book_info, book_data].join("\n")
}

/// 章节内段落规划提示词
pub fn paragraph_plan_prompt(spec: &BookSpec, chapter_title: &str, chapter_idea: &str) -> String {
    let base = format!(
        "You're a book content manager. Your purpose is to generate a list of paragraphs \
         based on user specifications which will be part of a chapter used to create a book. \
         Your response should match this json schema: {}. But keep in mind that the number of \
         paragraphs is variable and can be as many as you think is best for the chapter.",
        paragraph_plan_schema()
    );
    let special = format!("Special Configuration: {}", spec.instructions);
    let book_info = format!(
        "General Book Generation Specifications: {}",
        spec.informative_text
    );
    let book_data = format!("Book data: {{\"title\": \"{}\"}}", spec.title);
    let chapter_info = format!(
        "Chapter data: {{\"title\": \"{}\", \"idea\": \"{}\"}}",
        chapter_title, chapter_idea
    );
    let bias_override = "If you have any bias towards the number of paragraphs you're \
                         inclined to generate, revoke it. You should generate the number of \
                         paragraphs that you think is best for the chapter, and keep in mind \
                         this is the chapter of a book."
        .to_string();

    [base, special, book_info, book_data, chapter_info, bias_override].join("\n")
}

/// 段落初稿提示词：由种子构想扩写正文
pub fn paragraph_draft_prompt(
    spec: &BookSpec,
    chapter_title: &str,
    chapter_idea: &str,
    seed_idea: &str,
) -> String {
    let base = "Your purpose is to write a comprehensive and detailed paragraph that is \
                within a chapter of a book with the following specifications:"
        .to_string();
    let instructions = format!(
        "General generation instructions for the book generation: {}",
        spec.instructions
    );
    let book_prompt = format!(
        "The book is titled \"{}\". A description about the books' content: {}. Make sure \
         you do the task that is required and nothing else. Your response should match this \
         json schema: {} without including any code blocks or the ```json syntax.",
        spec.title,
        spec.informative_text,
        paragraph_schema()
    );
    let chapter_prompt = format!(
        "The chapter is titled \"{}\", and the chapter is about: {}.",
        chapter_title, chapter_idea
    );
    let paragraph_prompt = format!(
        "The paragraph should be about and expand on this idea: {}.",
        seed_idea
    );

    [base, instructions, book_prompt, chapter_prompt, paragraph_prompt].join("\n")
}

// ============================================================================
// 润色提示词
// ============================================================================

/// 润色时可见的邻居上下文
///
/// 位置三分规则:
/// - 章节仅一段，或多段章节的首段 -> 无邻居
/// - 多段章节的末段 -> 仅前文
/// - 其余（中段） -> 前后文
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NeighborContext<'a> {
    None,
    Previous { previous: &'a str },
    Both { previous: &'a str, next: &'a str },
}

impl<'a> NeighborContext<'a> {
    /// 依位置选择邻居上下文
    pub fn for_paragraph(paragraphs: &'a [Paragraph], index: usize) -> Self {
        let len = paragraphs.len();
        if len <= 1 || index == 0 {
            return NeighborContext::None;
        }
        if index == len - 1 {
            return NeighborContext::Previous {
                previous: paragraphs[index - 1].text(),
            };
        }
        NeighborContext::Both {
            previous: paragraphs[index - 1].text(),
            next: paragraphs[index + 1].text(),
        }
    }
}

/// 润色提示词：按邻居上下文拼装
pub fn refinement_prompt(
    book_abstract: &str,
    chapter_title: &str,
    chapter_idea: &str,
    current_text: &str,
    neighbors: NeighborContext<'_>,
) -> String {
    let mut sections = vec![
        "You are a book content manager. Your task is to refactor the current paragraph to \
         blend seamlessly with the flow and content of the book and the chapter."
            .to_string(),
        format!(
            "**Instructions**:\n- Output your response **only** in JSON format matching the \
             following schema:\n{}\n- **Do not** include any text outside of the JSON \
             output.\n- Ensure the paragraph connects logically with the chapter and book \
             content.",
            paragraph_schema()
        ),
        format!("**Book Abstract**:\n\"{}\"", book_abstract),
        format!(
            "**Chapter Details**:\n{{\n  \"title\": \"{}\",\n  \"idea\": \"{}\"\n}}",
            chapter_title, chapter_idea
        ),
    ];

    match neighbors {
        NeighborContext::None => {}
        NeighborContext::Previous { previous } => {
            sections.push(format!("**Previous Paragraph**:\n\"{}\"", previous));
        }
        NeighborContext::Both { previous, .. } => {
            sections.push(format!("**Previous Paragraph**:\n\"{}\"", previous));
        }
    }

    sections.push(format!("**Current Paragraph**:\n\"{}\"", current_text));

    if let NeighborContext::Both { next, .. } = neighbors {
        sections.push(format!("**Next Paragraph**:\n\"{}\"", next));
    }

    sections.push("Please generate the refined paragraph in JSON format now.".to_string());

    sections.join("\n\n")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::book::ParagraphStatus;
    use uuid::Uuid;

    fn paragraphs(texts: &[&str]) -> Vec<Paragraph> {
        texts
            .iter()
            .enumerate()
            .map(|(i, t)| {
                Paragraph::new(Uuid::new_v4(), i, t.to_string(), ParagraphStatus::Generated)
            })
            .collect()
    }

    #[test]
    fn test_three_paragraph_chapter_positions() {
        let ps = paragraphs(&["P0", "P1", "P2"]);

        assert_eq!(NeighborContext::for_paragraph(&ps, 0), NeighborContext::None);
        assert_eq!(
            NeighborContext::for_paragraph(&ps, 1),
            NeighborContext::Both {
                previous: "P0",
                next: "P2"
            }
        );
        assert_eq!(
            NeighborContext::for_paragraph(&ps, 2),
            NeighborContext::Previous { previous: "P1" }
        );
    }

    #[test]
    fn test_single_paragraph_chapter_uses_no_neighbor() {
        let ps = paragraphs(&["only"]);
        // 仅一段的章节绝不走仅前文模板
        assert_eq!(NeighborContext::for_paragraph(&ps, 0), NeighborContext::None);
    }

    #[test]
    fn test_two_paragraph_chapter() {
        let ps = paragraphs(&["first", "last"]);
        assert_eq!(NeighborContext::for_paragraph(&ps, 0), NeighborContext::None);
        assert_eq!(
            NeighborContext::for_paragraph(&ps, 1),
            NeighborContext::Previous { previous: "first" }
        );
    }

    #[test]
    fn test_refinement_prompt_sections() {
        let prompt = refinement_prompt(
            "an abstract",
            "Chapter One",
            "the idea",
            "current text",
            NeighborContext::Both {
                previous: "prev text",
                next: "next text",
            },
        );

        let prev_pos = prompt.find("**Previous Paragraph**").unwrap();
        let current_pos = prompt.find("**Current Paragraph**").unwrap();
        let next_pos = prompt.find("**Next Paragraph**").unwrap();
        assert!(prev_pos < current_pos && current_pos < next_pos);

        let no_neighbor = refinement_prompt(
            "an abstract",
            "Chapter One",
            "the idea",
            "current text",
            NeighborContext::None,
        );
        assert!(!no_neighbor.contains("**Previous Paragraph**"));
        assert!(!no_neighbor.contains("**Next Paragraph**"));
    }

    #[test]
    fn test_draft_prompt_embeds_context() {
        let spec = BookSpec::new("My Book", "about things", "be thorough");
        let prompt = paragraph_draft_prompt(&spec, "Ch", "ch idea", "seed idea");
        assert!(prompt.contains("My Book"));
        assert!(prompt.contains("ch idea"));
        assert!(prompt.contains("seed idea"));
    }
}
