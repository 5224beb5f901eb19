//! Product report export.
//!
//! Pagination is kept separate from rendering: [`paginate`] lays out every
//! text line on US Letter pages, and a [`ReportRenderer`] turns those pages
//! into a document.

use std::fs::File;
use std::io::{self, BufWriter};
use std::path::Path;

use log::info;
use printpdf::{BuiltinFont, Mm, PdfDocument, Pt};
use rust_decimal::Decimal;
use serde::Serialize;
use thiserror::Error;

use crate::inventory::{format_weight, Ledger};

pub const REPORT_TITLE: &str = "Product List";

// Positions are in PDF points, origin at the bottom left.
pub const PAGE_WIDTH: f32 = 612.0;
pub const PAGE_HEIGHT: f32 = 792.0;
pub const FONT_SIZE: f32 = 12.0;
pub const MARGIN_X: f32 = 30.0;
pub const TITLE_Y: f32 = 750.0;
pub const RULE_Y: f32 = 730.0;
pub const FIRST_LINE_Y: f32 = 710.0;
pub const CONTINUATION_Y: f32 = 750.0;
pub const LINE_STEP: f32 = 20.0;
pub const BOTTOM_LIMIT: f32 = 50.0;

const RULE_WIDTH: usize = 50;
const LAYER_NAME: &str = "Layer 1";

#[derive(Debug, Error)]
pub enum ReportError {
    #[error("no products to export")]
    Empty,
    #[error("IO error: {0}")]
    Io(#[from] io::Error),
    #[error("PDF error: {0}")]
    Pdf(String),
    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),
}

#[derive(Debug, Clone, PartialEq)]
pub struct PlacedText {
    pub x: f32,
    pub y: f32,
    pub text: String,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct Page {
    pub lines: Vec<PlacedText>,
}

pub trait ReportRenderer {
    fn render(&self, pages: &[Page], destination: &Path) -> Result<(), ReportError>;
}

pub fn report_line(name: &str, weight: Decimal) -> String {
    format!("{}: {}", name, format_weight(weight))
}

/// The title and rule only appear on the first page. A new page is started
/// once the next line would fall below [`BOTTOM_LIMIT`].
pub fn paginate<'a, I>(entries: I) -> Vec<Page>
where
    I: IntoIterator<Item = (&'a str, Decimal)>,
{
    let mut page = Page {
        lines: vec![
            PlacedText {
                x: MARGIN_X,
                y: TITLE_Y,
                text: REPORT_TITLE.to_string(),
            },
            PlacedText {
                x: MARGIN_X,
                y: RULE_Y,
                text: "-".repeat(RULE_WIDTH),
            },
        ],
    };
    let mut pages = Vec::new();
    let mut y = FIRST_LINE_Y;

    for (name, weight) in entries {
        if y < BOTTOM_LIMIT {
            pages.push(std::mem::take(&mut page));
            y = CONTINUATION_Y;
        }

        page.lines.push(PlacedText {
            x: MARGIN_X,
            y,
            text: report_line(name, weight),
        });
        y -= LINE_STEP;
    }

    pages.push(page);
    pages
}

/// Lays out the ledger in display order and hands it to `renderer`.
/// Returns the number of pages written.
pub fn export_report<R: ReportRenderer>(renderer: &R, ledger: &Ledger, destination: &Path) -> Result<usize, ReportError> {
    if ledger.is_empty() {
        return Err(ReportError::Empty);
    }

    let pages = paginate(ledger.sorted_view());
    renderer.render(&pages, destination)?;
    info!("exported {} product(s) on {} page(s) to {}", ledger.len(), pages.len(), destination.display());

    Ok(pages.len())
}

#[derive(Debug, Default, Clone, Copy)]
pub struct PdfRenderer;

impl ReportRenderer for PdfRenderer {
    fn render(&self, pages: &[Page], destination: &Path) -> Result<(), ReportError> {
        let width = Mm::from(Pt(PAGE_WIDTH));
        let height = Mm::from(Pt(PAGE_HEIGHT));

        let (doc, first_page, first_layer) = PdfDocument::new(REPORT_TITLE, width, height, LAYER_NAME);
        let font = doc
            .add_builtin_font(BuiltinFont::Helvetica)
            .map_err(|err| ReportError::Pdf(format!("{:?}", err)))?;

        for (index, page) in pages.iter().enumerate() {
            let (page_index, layer_index) = if index == 0 {
                (first_page, first_layer)
            } else {
                doc.add_page(width, height, LAYER_NAME)
            };

            let layer = doc.get_page(page_index).get_layer(layer_index);
            for line in &page.lines {
                layer.use_text(line.text.as_str(), FONT_SIZE, Mm::from(Pt(line.x)), Mm::from(Pt(line.y)), &font);
            }
        }

        let file = File::create(destination)?;
        doc.save(&mut BufWriter::new(file))
            .map_err(|err| ReportError::Pdf(format!("{:?}", err)))
    }
}

#[derive(Debug, Serialize)]
struct ProductRecord<'a> {
    name: &'a str,
    weight: Decimal,
}

/// Writes the ledger in display order as `name,weight` rows.
pub fn export_csv<W: io::Write>(ledger: &Ledger, writer: W) -> Result<(), ReportError> {
    let mut csv_writer = csv::WriterBuilder::new().from_writer(writer);
    for (name, weight) in ledger.sorted_view() {
        csv_writer.serialize(ProductRecord { name, weight })?;
    }

    csv_writer.flush()?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use std::cell::RefCell;
    use std::fs;

    use anyhow::{bail, Result};
    use pretty_assertions::assert_eq;
    use rust_decimal_macros::dec;
    use tempfile::TempDir;

    use super::*;
    use crate::inventory::Inventory;

    #[derive(Default)]
    struct RecordingRenderer {
        pages: RefCell<Vec<Page>>,
    }

    impl ReportRenderer for RecordingRenderer {
        fn render(&self, pages: &[Page], _destination: &Path) -> Result<(), ReportError> {
            self.pages.borrow_mut().extend_from_slice(pages);
            Ok(())
        }
    }

    fn numbered(count: usize) -> Vec<(String, Decimal)> {
        (0..count).map(|i| (format!("item {:03}", i), dec!(1.5))).collect()
    }

    #[test]
    fn test_paginate_single_page() {
        let pages = paginate([("Apple", dec!(2)), ("banana", dec!(0.125))]);

        assert_eq!(pages.len(), 1);
        let texts: Vec<(f32, &str)> = pages[0].lines.iter().map(|line| (line.y, line.text.as_str())).collect();
        assert_eq!(
            texts,
            vec![
                (750.0, "Product List"),
                (730.0, "--------------------------------------------------"),
                (710.0, "Apple: 2.00 lb"),
                (690.0, "banana: 0.13 lb"),
            ]
        );
    }

    #[test]
    fn test_paginate_breaks_pages() {
        // 34 lines fit under the header (710 down to 50), 36 on later pages.
        let entries = numbered(34 + 36 + 1);
        let pages = paginate(entries.iter().map(|(name, weight)| (name.as_str(), *weight)));

        assert_eq!(pages.len(), 3);
        assert_eq!(pages[0].lines.len(), 2 + 34);
        assert_eq!(pages[0].lines.last().map(|line| line.y), Some(50.0));
        assert_eq!(pages[1].lines.len(), 36);
        assert_eq!(pages[1].lines[0].y, 750.0);
        assert_eq!(pages[1].lines[0].text, "item 034: 1.50 lb");
        assert_eq!(pages[2].lines.len(), 1);
        assert!(pages.iter().flat_map(|page| &page.lines).all(|line| line.y >= BOTTOM_LIMIT));
    }

    #[test]
    fn test_paginate_exact_fit_has_no_blank_page() {
        let entries = numbered(34);
        let pages = paginate(entries.iter().map(|(name, weight)| (name.as_str(), *weight)));

        assert_eq!(pages.len(), 1);
    }

    #[test]
    fn test_export_uses_sorted_view() -> Result<()> {
        let mut inventory = Inventory::new();
        inventory.add("banana", dec!(1))?;
        inventory.add("Apple", dec!(2))?;

        let renderer = RecordingRenderer::default();
        let pages = export_report(&renderer, inventory.ledger(), Path::new("unused.pdf"))?;

        assert_eq!(pages, 1);
        let texts: Vec<String> = renderer.pages.borrow()[0].lines.iter().skip(2).map(|line| line.text.clone()).collect();
        assert_eq!(texts, vec!["Apple: 2.00 lb", "banana: 1.00 lb"]);

        Ok(())
    }

    #[test]
    fn test_export_empty_ledger() {
        let renderer = RecordingRenderer::default();
        let result = export_report(&renderer, &Ledger::new(), Path::new("unused.pdf"));

        assert!(matches!(result, Err(ReportError::Empty)));
        assert!(renderer.pages.borrow().is_empty());
    }

    #[test]
    fn test_pdf_renderer_writes_document() -> Result<()> {
        let dir = TempDir::new()?;
        let destination = dir.path().join("products.pdf");

        let mut inventory = Inventory::new();
        for (name, weight) in numbered(80) {
            inventory.add(&name, weight)?;
        }

        let pages = export_report(&PdfRenderer, inventory.ledger(), &destination)?;
        assert_eq!(pages, 3);

        let bytes = fs::read(&destination)?;
        assert!(bytes.starts_with(b"%PDF"));

        Ok(())
    }

    #[test]
    fn test_pdf_renderer_unwritable_destination() -> Result<()> {
        let dir = TempDir::new()?;
        let destination = dir.path().join("missing").join("products.pdf");

        let mut inventory = Inventory::new();
        inventory.add("Rice", dec!(1))?;

        if let Err(err) = export_report(&PdfRenderer, inventory.ledger(), &destination) {
            assert!(matches!(err, ReportError::Io(_)));
        } else {
            bail!("export into a missing directory should fail");
        }
        assert_eq!(inventory.ledger().weight("Rice"), Some(dec!(1)));

        Ok(())
    }

    #[test]
    fn test_export_csv() -> Result<()> {
        let mut inventory = Inventory::new();
        inventory.add("rice", dec!(2.25))?;
        inventory.add("Beans", dec!(5))?;

        let mut buffer = Vec::new();
        export_csv(inventory.ledger(), &mut buffer)?;

        assert_eq!(String::from_utf8(buffer)?, "name,weight\nBeans,5.0\nrice,2.25\n");

        Ok(())
    }
}
