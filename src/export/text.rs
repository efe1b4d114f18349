//! Plain-text export.

use crate::document::Document;

/// Every section as `title`, blank line, `content`; sections separated by a
/// blank line. Nothing is sanitised or dropped.
pub fn export_text(doc: &Document) -> String {
    doc.sections
        .iter()
        .map(|s| format!("{}\n\n{}", s.title, s.content))
        .collect::<Vec<_>>()
        .join("\n\n")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::document::tests::{sample_request, section};
    use crate::document::SectionKind;
    use chrono::Utc;

    #[test]
    fn text_export_is_lossless() {
        let mut a = section(1, SectionKind::Title, "Line one\n\n\u{2022} bullet \u{1F680}");
        a.title = "Caf\u{e9} **bold**".into();
        let b = section(2, SectionKind::Problem, "  padded  ");
        let doc = Document::assemble(&sample_request(), vec![a.clone(), b.clone()], Utc::now(), Utc::now());

        let text = export_text(&doc);
        assert_eq!(
            text,
            format!("{}\n\n{}\n\n{}\n\n{}", a.title, a.content, b.title, b.content)
        );
        for s in &doc.sections {
            assert!(text.contains(&s.title));
            assert!(text.contains(&s.content));
        }
    }

    #[test]
    fn empty_document_exports_empty_string() {
        let doc = Document::assemble(&sample_request(), vec![], Utc::now(), Utc::now());
        assert_eq!(export_text(&doc), "");
    }
}
