//! Writing a prepared report onto the two-page form.
//!
//! With a blank-form template the values are overlaid onto its pages, so the
//! result is the government form filled in. Without one the same values are
//! drawn on plain Letter pages.

use anyhow::{anyhow, Context, Result};
use lopdf::content::{Content, Operation};
use lopdf::{dictionary, Dictionary, Document, Object, ObjectId, Stream};
use printpdf::{BuiltinFont, IndirectFontRef, Mm, PdfDocument, PdfLayerReference};
use regex::Regex;
use std::fs::File;
use std::io::BufWriter;
use std::path::Path;
use std::sync::LazyLock;
use tracing::{debug, info};

use crate::layout::{Layout, Placement, FORM_PAGES};
use crate::models::Report;
use crate::render::{self, FormValues};

const MARK: &str = "X";

/// Resource name the overlay font is registered under on template pages.
const OVERLAY_FONT: &str = "NavfitxCourier";

static UNSAFE_CHARS: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"[^A-Za-z0-9]+").expect("valid regex"));

/// File name a report is exported under, e.g. `fitrep-3-DOE_JOHN_A.pdf`.
pub fn default_file_name(report: &Report) -> String {
    let name = UNSAFE_CHARS.replace_all(report.name.trim(), "_");
    let name = name.trim_matches('_');
    let mut stem = report.report_type().tag().to_string();
    if let Some(id) = report.id {
        stem.push_str(&format!("-{}", id));
    }
    if !name.is_empty() {
        stem.push('-');
        stem.push_str(name);
    }
    format!("{}.pdf", stem)
}

fn mm(points: f32) -> Mm {
    Mm(points * 25.4 / 72.0)
}

/// Renders `report` and writes the form to `path`, filling in `template`
/// when one is given.
pub fn create_pdf(
    report: &Report,
    layout: &Layout,
    summary_group_average: Option<String>,
    template: Option<&Path>,
    path: &Path,
) -> Result<()> {
    let values = render::prepare(report, summary_group_average);
    match template {
        Some(template) => fill_template(&values, layout, template, path),
        None => write_pdf(&values, layout, &report.title(), path),
    }
}

/// Everything to draw, with its placement, plus how many values the layout
/// had no place for.
fn placed<'a>(values: &'a FormValues, layout: &Layout) -> (Vec<(Placement, &'a str)>, usize) {
    let mut items = Vec::new();
    let mut skipped = 0;

    for (key, value) in &values.text {
        let placements = layout.text(key);
        if placements.is_empty() {
            debug!(key = *key, "layout has no placement for field");
            skipped += 1;
        }
        items.extend(placements.iter().map(|p| (*p, value.as_str())));
    }

    for key in &values.marks {
        match layout.mark(key) {
            Some(placement) => items.push((*placement, MARK)),
            None => {
                debug!(key = key.as_str(), "layout has no placement for mark");
                skipped += 1;
            }
        }
    }

    for &(row, score) in &values.traits {
        match layout.trait_mark(row, score) {
            Some(placement) => items.push((placement, MARK)),
            None => {
                debug!(row, score, "layout has no placement for trait score");
                skipped += 1;
            }
        }
    }

    (items, skipped)
}

/// Draws the values on blank Letter pages.
pub fn write_pdf(values: &FormValues, layout: &Layout, title: &str, path: &Path) -> Result<()> {
    let width = mm(layout.page.width);
    let height = mm(layout.page.height);

    let (doc, first_page, first_layer) = PdfDocument::new(title, width, height, "Form");
    let font = doc
        .add_builtin_font(BuiltinFont::Courier)
        .map_err(|e| anyhow!("Failed to load PDF font: {}", e))?;

    let mut layers = vec![doc.get_page(first_page).get_layer(first_layer)];
    for _ in 1..FORM_PAGES {
        let (page, layer) = doc.add_page(width, height, "Form");
        layers.push(doc.get_page(page).get_layer(layer));
    }

    let (items, skipped) = placed(values, layout);
    for (placement, text) in &items {
        draw_text(&layers[placement.page], &font, placement, layout.page.height, text);
    }

    let file = File::create(path)
        .with_context(|| format!("Failed to create PDF file: {}", path.display()))?;
    doc.save(&mut BufWriter::new(file))
        .map_err(|e| anyhow!("Failed to write PDF {}: {}", path.display(), e))?;

    info!(path = %path.display(), revision = %layout.revision, skipped, "wrote PDF");
    Ok(())
}

fn draw_text(
    layer: &PdfLayerReference,
    font: &IndirectFontRef,
    placement: &Placement,
    page_height: f32,
    text: &str,
) {
    let mut lines = text.split('\n');
    let Some(first) = lines.next() else {
        return;
    };

    layer.begin_text_section();
    layer.set_font(font, placement.size);
    layer.set_line_height(placement.size * placement.line_height);
    layer.set_text_cursor(mm(placement.x), mm(page_height - placement.y));
    layer.write_text(first, font);
    for line in lines {
        layer.add_line_break();
        layer.write_text(line, font);
    }
    layer.end_text_section();
}

fn pdf_error(e: lopdf::Error) -> anyhow::Error {
    anyhow!("{}", e)
}

/// Overlays the values onto the first two pages of a blank-form PDF.
pub fn fill_template(
    values: &FormValues,
    layout: &Layout,
    template: &Path,
    path: &Path,
) -> Result<()> {
    let mut doc = Document::load(template)
        .map_err(pdf_error)
        .with_context(|| format!("Failed to read form template: {}", template.display()))?;

    let pages: Vec<ObjectId> = doc.get_pages().into_values().collect();
    if pages.len() < FORM_PAGES {
        return Err(anyhow!(
            "Form template {} has {} page(s); the form needs {}",
            template.display(),
            pages.len(),
            FORM_PAGES
        ));
    }

    let font_id = doc.add_object(dictionary! {
        "Type" => "Font",
        "Subtype" => "Type1",
        "BaseFont" => "Courier",
        "Encoding" => "WinAnsiEncoding",
    });

    let mut operations: Vec<Vec<Operation>> = vec![Vec::new(); FORM_PAGES];
    let (items, skipped) = placed(values, layout);
    for (placement, text) in &items {
        operations[placement.page].extend(text_operations(placement, layout.page.height, text));
    }

    for (page_id, operations) in pages.iter().zip(operations) {
        if operations.is_empty() {
            continue;
        }
        let content = Content { operations }.encode().map_err(pdf_error)?;
        let overlay = doc.add_object(Stream::new(dictionary! {}, content));
        append_content(&mut doc, *page_id, overlay)?;
        register_font(&mut doc, *page_id, font_id)?;
    }

    doc.save(path)
        .with_context(|| format!("Failed to write PDF {}", path.display()))?;

    info!(
        path = %path.display(),
        template = %template.display(),
        revision = %layout.revision,
        skipped,
        "filled form template"
    );
    Ok(())
}

fn text_operations(placement: &Placement, page_height: f32, text: &str) -> Vec<Operation> {
    let mut ops = vec![
        Operation::new("BT", vec![]),
        Operation::new("Tf", vec![OVERLAY_FONT.into(), placement.size.into()]),
        Operation::new("TL", vec![(placement.size * placement.line_height).into()]),
        Operation::new("Td", vec![placement.x.into(), (page_height - placement.y).into()]),
    ];
    for (index, line) in text.split('\n').enumerate() {
        if index > 0 {
            ops.push(Operation::new("T*", vec![]));
        }
        ops.push(Operation::new("Tj", vec![Object::string_literal(line)]));
    }
    ops.push(Operation::new("ET", vec![]));
    ops
}

/// Appends `overlay` after the page's own content, which is wrapped in q/Q so
/// its graphics state cannot shift the overlay.
fn append_content(doc: &mut Document, page_id: ObjectId, overlay: ObjectId) -> Result<()> {
    let existing = match doc.get_dictionary(page_id).map_err(pdf_error)?.get(b"Contents") {
        Ok(Object::Reference(id)) => match doc.get_object(*id) {
            Ok(Object::Array(items)) => items.clone(),
            _ => vec![Object::Reference(*id)],
        },
        Ok(Object::Array(items)) => items.clone(),
        _ => Vec::new(),
    };

    let save = doc.add_object(Stream::new(dictionary! {}, b"q\n".to_vec()));
    let restore = doc.add_object(Stream::new(dictionary! {}, b"\nQ\n".to_vec()));

    let mut contents = vec![Object::Reference(save)];
    contents.extend(existing);
    contents.push(Object::Reference(restore));
    contents.push(Object::Reference(overlay));

    doc.get_object_mut(page_id)
        .and_then(Object::as_dict_mut)
        .map_err(pdf_error)?
        .set("Contents", Object::Array(contents));
    Ok(())
}

/// The resources a page uses, following inheritance from its parents.
fn page_resources(doc: &Document, page_id: ObjectId) -> Result<Dictionary> {
    let mut node = doc.get_dictionary(page_id).map_err(pdf_error)?;
    // Page trees are shallow; the bound only guards against a malformed cycle.
    for _ in 0..32 {
        match node.get(b"Resources") {
            Ok(Object::Reference(id)) => {
                return Ok(doc.get_dictionary(*id).map_err(pdf_error)?.clone());
            }
            Ok(Object::Dictionary(dict)) => return Ok(dict.clone()),
            _ => {}
        }
        match node.get(b"Parent").and_then(Object::as_reference) {
            Ok(parent) => node = doc.get_dictionary(parent).map_err(pdf_error)?,
            Err(_) => break,
        }
    }
    Ok(Dictionary::new())
}

/// Gives the page its own resource dictionary with the overlay font added.
fn register_font(doc: &mut Document, page_id: ObjectId, font_id: ObjectId) -> Result<()> {
    let mut resources = page_resources(doc, page_id)?;
    let mut fonts = match resources.get(b"Font") {
        Ok(Object::Reference(id)) => doc.get_dictionary(*id).map_err(pdf_error)?.clone(),
        Ok(Object::Dictionary(dict)) => dict.clone(),
        _ => Dictionary::new(),
    };
    fonts.set(OVERLAY_FONT, Object::Reference(font_id));
    resources.set("Font", Object::Dictionary(fonts));

    doc.get_object_mut(page_id)
        .and_then(Object::as_dict_mut)
        .map_err(pdf_error)?
        .set("Resources", Object::Dictionary(resources));
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{ReportKind, ReportType};
    use std::path::PathBuf;
    use tempfile::{tempdir, TempDir};

    fn sample() -> Report {
        let mut report = Report::new(ReportType::Fitrep);
        report.name = "DOE, JOHN A".to_string();
        report.comments = "Outstanding officer.\n\nPromote ahead of peers.".to_string();
        if let ReportKind::Fitrep(extra) = &mut report.kind {
            extra.leadership = Some(5);
            extra.teamwork = Some(0);
        }
        report
    }

    /// A two-page blank form to fill in.
    fn blank_form(dir: &TempDir) -> PathBuf {
        let path = dir.path().join("blank-form.pdf");
        let layout = Layout::embedded().unwrap();
        write_pdf(&FormValues::default(), &layout, "Blank", &path).unwrap();
        path
    }

    #[test]
    fn test_default_file_name() {
        let mut report = sample();
        assert_eq!(default_file_name(&report), "fitrep-DOE_JOHN_A.pdf");
        report.id = Some(3);
        assert_eq!(default_file_name(&report), "fitrep-3-DOE_JOHN_A.pdf");
        assert_eq!(default_file_name(&Report::new(ReportType::Eval)), "eval.pdf");
    }

    #[test]
    fn test_create_pdf_without_template_writes_file() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("doe.pdf");
        let layout = Layout::embedded().unwrap();

        create_pdf(&sample(), &layout, None, None, &path).unwrap();

        let bytes = std::fs::read(&path).unwrap();
        assert!(bytes.starts_with(b"%PDF"));
        assert_eq!(Document::load(&path).unwrap().get_pages().len(), FORM_PAGES);
    }

    #[test]
    fn test_blank_report_still_renders() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("blank.pdf");
        let layout = Layout::embedded().unwrap();

        create_pdf(&Report::new(ReportType::ChiefEval), &layout, Some("3.00".into()), None, &path)
            .unwrap();
        assert!(path.exists());
    }

    #[test]
    fn test_template_is_filled_in() {
        let dir = tempdir().unwrap();
        let template = blank_form(&dir);
        let path = dir.path().join("filled.pdf");
        let layout = Layout::embedded().unwrap();

        create_pdf(&sample(), &layout, None, Some(&template), &path).unwrap();

        let doc = Document::load(&path).unwrap();
        let pages: Vec<ObjectId> = doc.get_pages().into_values().collect();
        assert_eq!(pages.len(), FORM_PAGES);

        let front = String::from_utf8_lossy(&doc.get_page_content(pages[0]).unwrap()).into_owned();
        assert!(front.contains("(DOE, JOHN A) Tj"));
        let back = String::from_utf8_lossy(&doc.get_page_content(pages[1]).unwrap()).into_owned();
        assert!(back.contains("(Outstanding officer.) Tj"));

        let resources = page_resources(&doc, pages[0]).unwrap();
        let fonts = resources.get(b"Font").and_then(Object::as_dict).unwrap();
        assert!(fonts.has(OVERLAY_FONT.as_bytes()));
    }

    #[test]
    fn test_single_page_template_is_rejected() {
        let dir = tempdir().unwrap();
        let template = dir.path().join("one-page.pdf");
        let (doc, _, _) = PdfDocument::new("One", Mm(215.9), Mm(279.4), "Form");
        doc.save(&mut BufWriter::new(File::create(&template).unwrap())).unwrap();

        let path = dir.path().join("out.pdf");
        let layout = Layout::embedded().unwrap();
        let err = create_pdf(&sample(), &layout, None, Some(&template), &path).unwrap_err();
        assert!(err.to_string().contains("1 page(s)"));
        assert!(!path.exists());
    }

    #[test]
    fn test_missing_template_is_an_error() {
        let dir = tempdir().unwrap();
        let layout = Layout::embedded().unwrap();
        let err = create_pdf(
            &sample(),
            &layout,
            None,
            Some(&dir.path().join("nope.pdf")),
            &dir.path().join("out.pdf"),
        )
        .unwrap_err();
        assert!(err.to_string().contains("Failed to read form template"));
    }

    #[test]
    fn test_text_operations_break_lines() {
        let placement = Placement {
            page: 1,
            x: 34.0,
            y: 354.0,
            size: 9.0,
            line_height: 1.0,
        };
        let ops = text_operations(&placement, 792.0, "one\ntwo");
        let names: Vec<&str> = ops.iter().map(|op| op.operator.as_str()).collect();
        assert_eq!(names, vec!["BT", "Tf", "TL", "Td", "Tj", "T*", "Tj", "ET"]);
    }

    #[test]
    fn test_missing_directory_is_an_error() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("no/such/dir/out.pdf");
        let layout = Layout::embedded().unwrap();

        let err = create_pdf(&sample(), &layout, None, None, &path).unwrap_err();
        assert!(err.to_string().contains("Failed to create PDF file"));
    }
}
