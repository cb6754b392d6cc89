//! Local PDF text extraction with a one-shot OCR fallback.
//!
//! Text-layer extraction runs lopdf under `spawn_blocking`. When the whole
//! document yields no text, every page is rendered to a PNG with pdfium
//! (also blocking-pool work) and transcribed through the inference gate's
//! vision path. A document where both passes come up empty is
//! undeterminable and the orchestrator routes it to the unknown bucket.

use std::io::Cursor;
use std::path::Path;
use std::sync::Arc;

use async_trait::async_trait;
use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine as _;
use futures::future::join_all;
use image::ImageFormat;
use lopdf::Document;
use pdfium_render::prelude::*;
use tracing::{debug, info, instrument, warn};

use prepair_common::error::{PrepairError, Result};
use prepair_llm::gate::InferenceGate;
use prepair_llm::prompts::OCR_PROMPT;

/// Longest edge of rendered OCR page images.
const OCR_RENDER_PIXELS: i32 = 1024;

/// Seam used by the orchestrator; stubbed in pipeline tests.
#[async_trait]
pub trait PageTextExtractor: Send + Sync {
    /// Ordered per-page text of the document. Empty means undeterminable.
    async fn extract_pages(&self, path: &Path) -> Result<Vec<String>>;
}

pub struct PdfTextExtractor {
    gate: Arc<InferenceGate>,
}

impl PdfTextExtractor {
    pub fn new(gate: Arc<InferenceGate>) -> Self {
        Self { gate }
    }

    #[instrument(skip(self, bytes), fields(len = bytes.len()))]
    pub async fn pages_from_bytes(&self, bytes: Vec<u8>) -> Result<Vec<String>> {
        let layer_input = bytes.clone();
        let pages = tokio::task::spawn_blocking(move || text_layer_pages(&layer_input))
            .await
            .map_err(|e| PrepairError::Pdf(format!("extraction task panicked: {e}")))??;

        if !pages.is_empty() {
            debug!(n_pages = pages.len(), "Text layer extracted");
            return Ok(pages);
        }

        info!("Text layer empty, falling back to OCR");
        self.ocr_pages(bytes).await
    }

    /// Text of an already-downloaded PDF, joined across pages.
    /// `None` when neither the text layer nor OCR yields anything.
    pub async fn text_from_bytes(&self, bytes: Vec<u8>) -> Result<Option<String>> {
        let pages = self.pages_from_bytes(bytes).await?;
        if pages.is_empty() {
            Ok(None)
        } else {
            Ok(Some(pages.join("\n")))
        }
    }

    /// Render every page and transcribe through the vision path, bounded by
    /// the global inference gate. Pages that transcribe to nothing are
    /// dropped, mirroring the text-layer pass.
    async fn ocr_pages(&self, bytes: Vec<u8>) -> Result<Vec<String>> {
        let images = tokio::task::spawn_blocking(move || render_page_images(&bytes))
            .await
            .map_err(|e| PrepairError::Pdf(format!("render task panicked: {e}")))??;

        if images.is_empty() {
            return Ok(Vec::new());
        }

        let transcripts = join_all(
            images
                .into_iter()
                .map(|png| self.gate.transcribe_image(OCR_PROMPT, BASE64.encode(png))),
        )
        .await;

        let mut pages = Vec::new();
        for (i, result) in transcripts.into_iter().enumerate() {
            match result {
                Ok(text) if !text.trim().is_empty() => pages.push(text),
                Ok(_) => debug!(page = i + 1, "OCR produced no text"),
                Err(e) => {
                    warn!(page = i + 1, error = %e, "OCR transcription failed");
                    return Err(e.into());
                }
            }
        }
        info!(n_pages = pages.len(), "OCR fallback complete");
        Ok(pages)
    }
}

#[async_trait]
impl PageTextExtractor for PdfTextExtractor {
    async fn extract_pages(&self, path: &Path) -> Result<Vec<String>> {
        let bytes = tokio::fs::read(path).await?;
        self.pages_from_bytes(bytes).await
    }
}

/// Per-page text-layer extraction. Pages that fail to parse or carry no
/// text are skipped, not errors.
fn text_layer_pages(bytes: &[u8]) -> Result<Vec<String>> {
    let doc = Document::load_mem(bytes).map_err(|e| PrepairError::Pdf(e.to_string()))?;
    let mut pages = Vec::new();
    for (page_num, _) in doc.get_pages() {
        match doc.extract_text(&[page_num]) {
            Ok(text) if !text.trim().is_empty() => pages.push(text),
            _ => continue,
        }
    }
    Ok(pages)
}

/// Render every page to a PNG capped at `OCR_RENDER_PIXELS` on the longest
/// edge. pdfium wraps a C++ library with thread-local state, so this only
/// runs on the blocking pool.
fn render_page_images(bytes: &[u8]) -> Result<Vec<Vec<u8>>> {
    let pdfium = Pdfium::default();
    let doc = pdfium
        .load_pdf_from_byte_slice(bytes, None)
        .map_err(|e| PrepairError::Pdf(format!("{e:?}")))?;

    let render_config = PdfRenderConfig::new()
        .set_target_width(OCR_RENDER_PIXELS)
        .set_maximum_height(OCR_RENDER_PIXELS);

    let mut images = Vec::new();
    for page in doc.pages().iter() {
        let bitmap = page
            .render_with_config(&render_config)
            .map_err(|e| PrepairError::Pdf(format!("{e:?}")))?;
        let mut buf = Vec::new();
        bitmap
            .as_image()
            .write_to(&mut Cursor::new(&mut buf), ImageFormat::Png)
            .map_err(|e| PrepairError::Pdf(e.to_string()))?;
        images.push(buf);
    }
    Ok(images)
}

#[cfg(test)]
mod tests {
    use super::*;
    use lopdf::content::{Content, Operation};
    use lopdf::{dictionary, Object, Stream};

    fn single_page_pdf(text: &str) -> Vec<u8> {
        let mut doc = Document::with_version("1.5");
        let pages_id = doc.new_object_id();
        let font_id = doc.add_object(dictionary! {
            "Type" => "Font",
            "Subtype" => "Type1",
            "BaseFont" => "Courier",
        });
        let resources_id = doc.add_object(dictionary! {
            "Font" => dictionary! { "F1" => font_id },
        });
        let content = Content {
            operations: vec![
                Operation::new("BT", vec![]),
                Operation::new("Tf", vec!["F1".into(), 24.into()]),
                Operation::new("Td", vec![72.into(), 720.into()]),
                Operation::new("Tj", vec![Object::string_literal(text)]),
                Operation::new("ET", vec![]),
            ],
        };
        let content_id = doc.add_object(Stream::new(
            dictionary! {},
            content.encode().unwrap(),
        ));
        let page_id = doc.add_object(dictionary! {
            "Type" => "Page",
            "Parent" => pages_id,
            "Contents" => content_id,
        });
        doc.objects.insert(
            pages_id,
            Object::Dictionary(dictionary! {
                "Type" => "Pages",
                "Kids" => vec![page_id.into()],
                "Count" => 1,
                "Resources" => resources_id,
                "MediaBox" => vec![0.into(), 0.into(), 595.into(), 842.into()],
            }),
        );
        let catalog_id = doc.add_object(dictionary! {
            "Type" => "Catalog",
            "Pages" => pages_id,
        });
        doc.trailer.set("Root", catalog_id);

        let mut buf = Vec::new();
        doc.save_to(&mut buf).unwrap();
        buf
    }

    #[test]
    fn test_text_layer_extraction() {
        let bytes = single_page_pdf("KRAS signalling in pancreatic cancer");
        let pages = text_layer_pages(&bytes).unwrap();
        assert_eq!(pages.len(), 1);
        assert!(pages[0].contains("KRAS"));
    }

    #[test]
    fn test_garbage_bytes_are_a_parse_error() {
        assert!(text_layer_pages(b"not a pdf").is_err());
    }
}
