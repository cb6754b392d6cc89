//! Prompt contracts for the single-turn exchanges.
//!
//! Two canonical contracts: *cleaning* returns only the cleaned main-body
//! text with no commentary, *title extraction* returns either the exact
//! title line or the literal sentinel. The OCR contract transcribes one
//! rendered page image. Post-processing for titles lives in [`crate::title`].

/// Sentinel the title contract returns when no title line exists.
pub const TITLE_SENTINEL: &str = "Title not found";

pub const CLEANING_PROMPT: &str = "\
The following text is a *partial excerpt* from a research paper. Your task is to:

- Clean it up
- Keep only the **main body content**
- Remove footnotes, references, citations, figure captions, and legal disclaimers.
- Ensure proper paragraph structure and readability.
- Preserve the logical order within this chunk only.
- Do not include any commentary, analysis, or information not present in the chunk.
- Do not attempt to infer or hallucinate missing parts from previous or next sections.

This is only one chunk of a longer paper. Treat each chunk independently unless otherwise told.
Return ONLY the cleaned and readable main body text from the input. DO NOT add any commentary, introduction, summary, or instructional text.";

pub const TITLE_PROMPT: &str = "\
You are given a part of the introductory excerpt from a scientific paper.

Your sole task is to extract and return the **exact title** of the paper, using the rules below.

The title will be found in the first non-empty line of the text.

Task: from the text below, return **exactly** the paper title or **Title not found**

Rules (highest priority first)
1. Return the first non-empty line that appears **before** any line that starts with `Authors` or `Affiliations`.
2. If nothing matches, return: Title not found

Output format (must follow **exactly**):
<plain title>           (no quotes, no label, no markdown)";

pub const OCR_PROMPT: &str = "\
The image is one page of a scanned research paper. Transcribe the page text
faithfully as plain text, preserving reading order. Return ONLY the
transcription, with no commentary. If the page contains no legible text,
return an empty response.";
