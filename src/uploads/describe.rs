use super::schema::{Extraction, ExtractionResult, StoredFile, StructureStats};
use std::fmt::Write;

const LINK_PREVIEW: usize = 10;
const IMAGE_PREVIEW: usize = 5;
const META_PREVIEW: usize = 10;

/// Plain-text report for a stored upload: metadata, then its extraction.
pub fn describe_upload(file: &StoredFile) -> String {
    let meta = &file.metadata;
    let mut out = String::new();
    let _ = writeln!(out, "File: {}", meta.original_name);
    let _ = writeln!(out, "Id: {}", meta.id);
    let _ = writeln!(out, "Size: {} bytes", meta.size_bytes);
    let _ = writeln!(out, "Uploaded: {}", meta.uploaded_at.to_rfc3339());
    out.push('\n');
    match &file.extraction {
        Some(extraction) => out.push_str(&describe_extraction(extraction)),
        None => out.push_str("No extraction data available\n"),
    }
    out
}

/// Plain-text report for one extraction entry.
pub fn describe_extraction(extraction: &Extraction) -> String {
    match extraction {
        Extraction::Failed(err) => format!("Extraction error: {}\n", err.message),
        Extraction::Extracted(result) => describe_result(result),
    }
}

fn describe_result(result: &ExtractionResult) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "Title: {}", result.title.as_deref().unwrap_or("No title"));
    let _ = writeln!(out, "Total elements: {}", result.structure_stats.total_elements);
    write_structure(&mut out, &result.structure_stats);

    if !result.headings_by_level.is_empty() {
        out.push_str("\nHeadings\n");
        for (level, texts) in &result.headings_by_level {
            let _ = writeln!(out, "  H{} ({})", level, texts.len());
            for text in texts {
                let _ = writeln!(out, "    - {}", text);
            }
        }
    }

    if !result.links.is_empty() {
        let _ = writeln!(out, "\nLinks ({})", result.links.len());
        for link in result.links.iter().take(LINK_PREVIEW) {
            let _ = writeln!(out, "  - {} -> {}", link.text, link.href);
        }
        if result.links.len() > LINK_PREVIEW {
            let _ = writeln!(
                out,
                "  (showing first {} of {} links)",
                LINK_PREVIEW,
                result.links.len()
            );
        }
    }

    if !result.images.is_empty() {
        let _ = writeln!(out, "\nImages ({})", result.images.len());
        for image in result.images.iter().take(IMAGE_PREVIEW) {
            match &image.alt {
                Some(alt) => {
                    let _ = writeln!(out, "  - {} (alt: {})", image.src, alt);
                }
                None => {
                    let _ = writeln!(out, "  - {}", image.src);
                }
            }
        }
        if result.images.len() > IMAGE_PREVIEW {
            let _ = writeln!(
                out,
                "  (showing first {} of {} images)",
                IMAGE_PREVIEW,
                result.images.len()
            );
        }
    }

    if !result.forms.is_empty() {
        let _ = writeln!(out, "\nForms ({})", result.forms.len());
        for (i, form) in result.forms.iter().enumerate() {
            let inputs: Vec<String> = form
                .inputs
                .iter()
                .map(|input| format!("{} ({})", input.kind, input.name.as_deref().unwrap_or("")))
                .collect();
            let _ = writeln!(
                out,
                "  Form {}: {} {}",
                i + 1,
                form.method,
                form.action.as_deref().unwrap_or("")
            );
            let _ = writeln!(out, "    Inputs: {}", inputs.join(", "));
        }
    }

    if !result.meta_tags.is_empty() {
        let _ = writeln!(out, "\nMeta tags ({})", result.meta_tags.len());
        for meta in result.meta_tags.iter().take(META_PREVIEW) {
            let key = meta
                .name
                .as_deref()
                .or(meta.property.as_deref())
                .unwrap_or("charset");
            let value = meta
                .content
                .as_deref()
                .or(meta.charset.as_deref())
                .unwrap_or("N/A");
            let _ = writeln!(out, "  {}: {}", key, value);
        }
    }
    out
}

fn write_structure(out: &mut String, stats: &StructureStats) {
    let _ = writeln!(
        out,
        "Structure: {} divs, {} spans, {} tables, {} lists, {} scripts, {} styles",
        stats.div_count,
        stats.span_count,
        stats.table_count,
        stats.list_count,
        stats.script_count,
        stats.style_count
    );
}
