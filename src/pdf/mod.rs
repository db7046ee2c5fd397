//! The compositor: blocks to flowables, flowables to page records, page records
//! plus overlays to PDF bytes.

mod blocks;
mod cover;
mod flow;
mod layout;
mod overlay;
mod record;
mod table;
mod toc;
mod writer;

pub use overlay::OverlayRenderer;
pub use record::{DrawOp, PageRecord, PageRecorder, finalize};
pub use toc::{ForwardReferenceEntry, ForwardReferences, OutlineNode, ResolverState, TocLine};

use std::collections::BTreeMap;
use std::io::Write;
use std::path::{Path, PathBuf};

use chrono::NaiveDateTime;
use serde_json::{Map, Value};

use crate::chart::{ChartRenderer, RasterChartRenderer};
use crate::error::{Error, Result, Warning, WarningKind};
use crate::fonts::FontBook;
use crate::geometry::PageGeometry;
use crate::images::ImageStore;
use crate::input::{DataSources, StyleSheet};
use crate::model::{DataTable, Document};
use crate::template::TemplateContext;

use blocks::{BlockBuilder, heading_index};
use flow::Flowable;

/// A finished document.
#[derive(Debug)]
pub struct Output {
    pub bytes: Vec<u8>,
    pub warnings: Vec<Warning>,
    pub page_count: usize,
}

/// Pages after both layout passes and overlay replay, before serialization.
#[derive(Debug)]
pub struct Layout {
    pub geometry: PageGeometry,
    pub pages: Vec<PageRecord>,
    pub headings: Vec<ForwardReferenceEntry>,
    pub warnings: Vec<Warning>,
}

struct Composition {
    geometry: PageGeometry,
    pages: Vec<PageRecord>,
    refs: ForwardReferences,
    fonts: FontBook,
    images: ImageStore,
    warnings: Vec<Warning>,
    now: NaiveDateTime,
}

/// One generation request. Instances share nothing mutable, so independent
/// compositors may run on separate threads.
pub struct Compositor {
    doc: Document,
    base_dir: PathBuf,
    charts: Box<dyn ChartRenderer>,
    clock: Option<NaiveDateTime>,
    system_fonts: bool,
    extra_sources: Vec<(String, DataTable)>,
}

impl Compositor {
    pub fn new(doc: Document) -> Self {
        Compositor {
            doc,
            base_dir: PathBuf::from("."),
            charts: Box::new(RasterChartRenderer::default()),
            clock: None,
            system_fonts: true,
            extra_sources: Vec::new(),
        }
    }

    pub fn with_chart_renderer(mut self, charts: impl ChartRenderer + 'static) -> Self {
        self.charts = Box::new(charts);
        self
    }

    /// Fix the time used for `{{date}}`, `{{datetime}}`, `{{year}}` and the
    /// document's creation date.
    pub fn with_clock(mut self, now: NaiveDateTime) -> Self {
        self.clock = Some(now);
        self
    }

    /// Resolve font families from explicit files, `fontDirs` and the builtin
    /// Helvetica family only.
    pub fn without_system_fonts(mut self) -> Self {
        self.system_fonts = false;
        self
    }

    /// Directory that relative image, data and font paths resolve against.
    pub fn with_base_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.base_dir = dir.into();
        self
    }

    /// Provide a table under `name` in addition to the description's sources.
    pub fn add_data_source(mut self, name: impl Into<String>, table: DataTable) -> Self {
        self.extra_sources.push((name.into(), table));
        self
    }

    /// Lay out and replay overlays without writing PDF bytes.
    pub fn layout(&self) -> Result<Layout> {
        let c = self.compose()?;
        Ok(Layout {
            geometry: c.geometry,
            pages: c.pages,
            headings: c.refs.entries().to_vec(),
            warnings: c.warnings,
        })
    }

    pub fn render(&self) -> Result<Output> {
        let t0 = std::time::Instant::now();
        let mut c = self.compose()?;
        let t_layout = t0.elapsed();
        let meta = &self.doc.metadata;
        let info = writer::DocumentInfo {
            title: meta.title.as_deref(),
            author: meta.author.as_deref(),
            subject: meta.subject.as_deref(),
            created: c.now,
            bookmarks: meta.bookmarks,
        };
        let bytes = writer::write_pdf(
            &c.pages,
            (c.geometry.width, c.geometry.height),
            &mut c.fonts,
            &c.images,
            &c.refs,
            &info,
        )?;
        c.warnings.extend(c.fonts.take_warnings());
        log::info!(
            "Render: layout={:.1}ms, write={:.1}ms, {} pages, {} warnings",
            t_layout.as_secs_f64() * 1000.0,
            (t0.elapsed() - t_layout).as_secs_f64() * 1000.0,
            c.pages.len(),
            c.warnings.len(),
        );
        Ok(Output {
            page_count: c.pages.len(),
            bytes,
            warnings: c.warnings,
        })
    }

    /// Render and write the bytes to `sink`. Nothing is written if composition fails.
    pub fn render_to(&self, sink: &mut impl Write) -> Result<(usize, Vec<Warning>)> {
        let out = self.render()?;
        sink.write_all(&out.bytes)
            .and_then(|_| sink.flush())
            .map_err(|e| Error::Finalization(format!("writing output failed: {e}")))?;
        Ok((out.page_count, out.warnings))
    }

    fn now(&self) -> NaiveDateTime {
        self.clock
            .unwrap_or_else(|| chrono::Local::now().naive_local())
    }

    fn resolve_path(&self, path: &Path) -> PathBuf {
        if path.is_relative() {
            self.base_dir.join(path)
        } else {
            path.to_path_buf()
        }
    }

    fn template_context(&self, now: NaiveDateTime) -> TemplateContext {
        let meta = &self.doc.metadata;
        let mut metadata = meta.extra.clone();
        for (key, value) in [("title", &meta.title), ("author", &meta.author), ("subject", &meta.subject)] {
            if let Some(v) = value {
                metadata.insert(key.to_string(), Value::String(v.clone()));
            }
        }
        metadata.insert("pageSize".into(), Value::String(meta.page_size.clone()));
        metadata.insert("orientation".into(), Value::String(meta.orientation.clone()));
        let mut values = Map::new();
        values.insert("metadata".into(), Value::Object(metadata));
        for (k, v) in &self.doc.context {
            values.insert(k.clone(), v.clone());
        }
        TemplateContext::new(values, now)
    }

    fn compose(&self) -> Result<Composition> {
        let t0 = std::time::Instant::now();
        let doc = &self.doc;
        let meta = &doc.metadata;

        let mut geometry = PageGeometry::from_metadata(meta)?;
        let (header_h, footer_h) = overlay::band_heights(doc.page_template.as_ref());
        geometry.reserve_bands(header_h, footer_h)?;
        let frame = geometry.frame();
        let page = (geometry.width, geometry.height);

        let now = self.now();
        let ctx = self.template_context(now);

        let explicit_fonts: BTreeMap<String, PathBuf> = meta
            .fonts
            .iter()
            .map(|(k, v)| (k.clone(), self.resolve_path(v)))
            .collect();
        let font_dirs: Vec<PathBuf> = meta.font_dirs.iter().map(|d| self.resolve_path(d)).collect();
        let mut fonts = FontBook::new(&explicit_fonts, &font_dirs);
        if !self.system_fonts {
            fonts = fonts.without_system_fonts();
        }
        let mut images = ImageStore::with_base_dir(&self.base_dir);
        let (mut sources, mut warnings) = DataSources::load(&doc.data_sources, &self.base_dir);
        for (name, table) in &self.extra_sources {
            sources.insert(name.clone(), table.clone());
        }
        let styles = StyleSheet::new(&doc.styles);

        let cover = if doc.cover_page.enabled {
            cover::cover_flowables(&doc.cover_page, page, &styles, &mut fonts, &mut images, &ctx, &mut warnings)
        } else {
            Vec::new()
        };
        let headings = heading_index(doc, &ctx, &mut warnings);
        let body = BlockBuilder {
            styles: &styles,
            fonts: &mut fonts,
            images: &mut images,
            sources: &sources,
            charts: self.charts.as_ref(),
            ctx: &ctx,
            frame_width: frame.width,
            warnings: &mut warnings,
        }
        .build_all(doc, &headings);
        let t_prepare = t0.elapsed();

        let toc = &doc.toc;
        let auto_toc = toc.enabled && toc.auto_generate;
        let assemble = |fonts: &mut FontBook, lines: Option<Vec<TocLine>>| -> Vec<Flowable> {
            let mut all = cover.clone();
            if let Some(lines) = lines {
                all.extend(toc::toc_flowables(toc, &lines, &styles, fonts, frame.width));
            }
            all.extend(body.iter().cloned());
            all
        };
        let first_lines = if !toc.enabled {
            None
        } else if toc.auto_generate {
            Some(toc::auto_lines(&headings, None, toc.max_level))
        } else {
            Some(toc::manual_lines(toc))
        };

        let mut refs = ForwardReferences::new();
        let mut layout_warnings = Vec::new();
        let mut pages = flow::layout(assemble(&mut fonts, first_lines), frame, &mut refs, &mut layout_warnings);

        if auto_toc {
            // Second pass with real page numbers in the contents.
            let lines = toc::auto_lines(&headings, Some(refs.entries()), toc.max_level);
            let mut final_refs = ForwardReferences::new();
            layout_warnings.clear();
            pages = flow::layout(assemble(&mut fonts, Some(lines)), frame, &mut final_refs, &mut layout_warnings);
            let before: Vec<usize> = refs.entries().iter().map(|e| e.page).collect();
            let after: Vec<usize> = final_refs.entries().iter().map(|e| e.page).collect();
            if before != after {
                log::warn!("Table of contents shifted headings: {before:?} -> {after:?}");
                layout_warnings.push(Warning::new(
                    WarningKind::TocDrift,
                    "inserting the table of contents moved headings; listed page numbers may be off",
                ));
            }
            refs = final_refs;
        }
        refs.resolve();
        warnings.extend(layout_warnings);
        let t_layout = t0.elapsed();

        let mut overlay = OverlayRenderer::new(doc.page_template.as_ref(), page, &mut fonts, &mut images, ctx);
        let mut overlay_warnings = Vec::new();
        let pages = if overlay.is_empty() {
            pages
        } else {
            finalize(
                pages,
                |_, index, total| overlay.render_page(&fonts, index, total, &mut overlay_warnings),
                &mut warnings,
            )
        };
        warnings.extend(overlay_warnings);
        warnings.extend(fonts.take_warnings());

        log::info!(
            "Compose phases: prepare={:.1}ms, layout={:.1}ms, overlay={:.1}ms ({} pages, {} headings)",
            t_prepare.as_secs_f64() * 1000.0,
            (t_layout - t_prepare).as_secs_f64() * 1000.0,
            (t0.elapsed() - t_layout).as_secs_f64() * 1000.0,
            pages.len(),
            refs.entries().len(),
        );

        Ok(Composition {
            geometry,
            pages,
            refs,
            fonts,
            images,
            warnings,
            now,
        })
    }
}
