use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::path::{Path, PathBuf};
use std::sync::OnceLock;

use memmap2::Mmap;
use pdf_writer::{Name, Pdf, Rect, Ref};
use ttf_parser::{Face, GlyphId};

use crate::error::{Warning, WarningKind};

/// Handle to a font loaded into a [`FontBook`].
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct FontId(pub(crate) usize);

/// Measures text for line breaking and vertical placement.
pub trait Typesetter {
    /// Advance width of `text` in points.
    fn text_width(&self, font: FontId, size: f32, text: &str) -> f32;

    /// Ascender height as a fraction of the font size.
    fn ascender_ratio(&self, font: FontId) -> f32;
}

enum FontSource {
    /// One of the standard 14 PDF fonts, WinAnsi-encoded, never embedded.
    Builtin {
        base_font: &'static str,
        widths_1000: Vec<f32>,
    },
    TrueType {
        family: String,
        data: Vec<u8>,
        face_index: u32,
        units: f32,
        ascender_ratio: f32,
    },
}

struct LoadedFont {
    pdf_name: String,
    source: FontSource,
}

/// (lowercase family name, bold, italic) -> (file path, face index within TTC)
type FontLookup = HashMap<(String, bool, bool), (PathBuf, u32)>;

static FONT_INDEX: OnceLock<FontLookup> = OnceLock::new();

/// Fonts for one generation request. Lookup order for a family name: the
/// explicit `fonts` map, the request's `fontDirs`, the system font index, and
/// finally Helvetica.
pub struct FontBook {
    fonts: Vec<LoadedFont>,
    resolved: HashMap<(String, bool), FontId>,
    explicit: BTreeMap<String, PathBuf>,
    local_index: FontLookup,
    use_system_fonts: bool,
    warnings: Vec<Warning>,
}

impl FontBook {
    pub fn new(explicit: &BTreeMap<String, PathBuf>, font_dirs: &[PathBuf]) -> Self {
        let local_index = if font_dirs.is_empty() {
            FontLookup::new()
        } else {
            index_font_dirs(font_dirs.to_vec())
        };
        FontBook {
            fonts: Vec::new(),
            resolved: HashMap::new(),
            explicit: explicit
                .iter()
                .map(|(k, v)| (k.to_lowercase(), v.clone()))
                .collect(),
            local_index,
            use_system_fonts: true,
            warnings: Vec::new(),
        }
    }

    /// A book that never consults system font directories. Layout is fully
    /// deterministic across machines when only builtin and explicit fonts are used.
    pub fn without_system_fonts(mut self) -> Self {
        self.use_system_fonts = false;
        self
    }

    pub fn resolve(&mut self, name: Option<&str>, bold: bool) -> FontId {
        let name = name.map(str::trim).filter(|n| !n.is_empty()).unwrap_or("Helvetica");
        let key = (name.to_lowercase(), bold);
        if let Some(&id) = self.resolved.get(&key) {
            return id;
        }
        let source = self.load(name, bold);
        let id = FontId(self.fonts.len());
        self.fonts.push(LoadedFont {
            pdf_name: format!("F{}", id.0 + 1),
            source,
        });
        self.resolved.insert(key, id);
        id
    }

    fn load(&mut self, name: &str, bold: bool) -> FontSource {
        if let Some(base_font) = standard_font(name, bold) {
            return builtin(base_font);
        }
        let lower = name.to_lowercase();
        let from_explicit = self.explicit.get(&lower).map(|p| (p.clone(), 0));
        let located = from_explicit
            .or_else(|| lookup(&self.local_index, &lower, bold))
            .or_else(|| {
                self.use_system_fonts
                    .then(|| lookup(system_font_index(), &lower, bold))
                    .flatten()
            });
        if let Some((path, face_index)) = located {
            match load_truetype(name, &path, face_index) {
                Some(source) => return source,
                None => self.warnings.push(Warning::new(
                    WarningKind::Font,
                    format!("font file {} for '{name}' could not be parsed", path.display()),
                )),
            }
        } else {
            self.warnings.push(Warning::new(
                WarningKind::Font,
                format!("font '{name}' not found, using Helvetica"),
            ));
        }
        log::warn!("Font not found: {name} bold={bold}, using Helvetica");
        builtin(if bold { "Helvetica-Bold" } else { "Helvetica" })
    }

    pub fn pdf_name(&self, id: FontId) -> &str {
        &self.fonts[id.0].pdf_name
    }

    pub fn len(&self) -> usize {
        self.fonts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fonts.is_empty()
    }

    pub fn take_warnings(&mut self) -> Vec<Warning> {
        std::mem::take(&mut self.warnings)
    }
}

impl Typesetter for FontBook {
    fn text_width(&self, font: FontId, size: f32, text: &str) -> f32 {
        let units_1000: f32 = match &self.fonts[font.0].source {
            FontSource::Builtin { widths_1000, .. } => text
                .chars()
                .map(|ch| match char_to_winansi(ch) {
                    Some(b) if b >= 32 => widths_1000[(b - 32) as usize],
                    _ => 0.0,
                })
                .sum(),
            FontSource::TrueType {
                data,
                face_index,
                units,
                ..
            } => match Face::parse(data, *face_index) {
                Ok(face) => {
                    let fallback = face.glyph_hor_advance(GlyphId(0)).unwrap_or(0) as f32;
                    text.chars()
                        .map(|ch| {
                            face.glyph_index(ch)
                                .and_then(|gid| face.glyph_hor_advance(gid))
                                .map(|adv| adv as f32)
                                .unwrap_or(fallback)
                                / units
                                * 1000.0
                        })
                        .sum()
                }
                Err(_) => 0.0,
            },
        };
        units_1000 * size / 1000.0
    }

    fn ascender_ratio(&self, font: FontId) -> f32 {
        match &self.fonts[font.0].source {
            FontSource::Builtin { base_font, .. } if base_font.starts_with("Courier") => 0.629,
            FontSource::Builtin { base_font, .. } if base_font.starts_with("Times") => 0.683,
            FontSource::Builtin { .. } => 0.718,
            FontSource::TrueType { ascender_ratio, .. } => *ascender_ratio,
        }
    }
}

fn builtin(base_font: &'static str) -> FontSource {
    let widths_1000 = if base_font.starts_with("Courier") {
        vec![600.0; 224]
    } else {
        helvetica_widths()
    };
    FontSource::Builtin {
        base_font,
        widths_1000,
    }
}

fn standard_font(name: &str, bold: bool) -> Option<&'static str> {
    let base = match name.to_ascii_lowercase().as_str() {
        "helvetica" | "arial" | "sans-serif" => {
            if bold {
                "Helvetica-Bold"
            } else {
                "Helvetica"
            }
        }
        "helvetica-bold" | "arial-bold" => "Helvetica-Bold",
        "helvetica-oblique" => "Helvetica-Oblique",
        "helvetica-boldoblique" => "Helvetica-BoldOblique",
        "times" | "times-roman" | "serif" => {
            if bold {
                "Times-Bold"
            } else {
                "Times-Roman"
            }
        }
        "times-bold" => "Times-Bold",
        "times-italic" => "Times-Italic",
        "courier" | "monospace" => {
            if bold {
                "Courier-Bold"
            } else {
                "Courier"
            }
        }
        "courier-bold" => "Courier-Bold",
        _ => return None,
    };
    Some(base)
}

fn load_truetype(family: &str, path: &Path, face_index: u32) -> Option<FontSource> {
    let data = std::fs::read(path).ok()?;
    let face = Face::parse(&data, face_index).ok()?;
    let units = face.units_per_em() as f32;
    let ascender_ratio = face.ascender() as f32 / units;
    log::debug!("Loaded font {family} from {}", path.display());
    Some(FontSource::TrueType {
        family: family.to_string(),
        data,
        face_index,
        units,
        ascender_ratio,
    })
}

fn lookup(index: &FontLookup, family: &str, bold: bool) -> Option<(PathBuf, u32)> {
    index
        .get(&(family.to_string(), bold, false))
        .or_else(|| index.get(&(family.to_string(), false, false)))
        .cloned()
}

fn font_family_name(face: &Face) -> Option<String> {
    face.names()
        .into_iter()
        .filter(|name| name.name_id == ttf_parser::name_id::FAMILY && name.is_unicode())
        .find_map(|name| name.to_string())
}

fn system_font_directories() -> Vec<PathBuf> {
    let mut dirs: Vec<PathBuf> = Vec::new();

    if let Ok(val) = std::env::var("FOLIO_FONTS") {
        dirs.extend(std::env::split_paths(&val).filter(|p| !p.as_os_str().is_empty()));
    }

    if let Ok(cwd) = std::env::current_dir() {
        dirs.push(cwd.join("fonts"));
    }

    #[cfg(target_os = "macos")]
    {
        dirs.extend([
            "/Library/Fonts".into(),
            "/System/Library/Fonts".into(),
            "/System/Library/Fonts/Supplemental".into(),
        ]);
        if let Ok(home) = std::env::var("HOME") {
            dirs.push(PathBuf::from(&home).join("Library/Fonts"));
        }
    }

    #[cfg(target_os = "linux")]
    {
        dirs.extend(["/usr/share/fonts".into(), "/usr/local/share/fonts".into()]);
        if let Ok(home) = std::env::var("HOME") {
            dirs.push(PathBuf::from(&home).join(".local/share/fonts"));
            dirs.push(PathBuf::from(home).join(".fonts"));
        }
    }

    #[cfg(target_os = "windows")]
    {
        if let Ok(windir) = std::env::var("WINDIR") {
            dirs.push(PathBuf::from(windir).join("Fonts"));
        } else {
            dirs.push("C:\\Windows\\Fonts".into());
        }
    }

    dirs
}

fn is_font_file(path: &Path) -> bool {
    matches!(
        path.extension()
            .and_then(|e| e.to_str())
            .map(|e| e.to_ascii_lowercase())
            .as_deref(),
        Some("ttf" | "otf" | "ttc")
    )
}

/// Walk `dirs` recursively and index every parseable face by family and style.
/// Earlier directories win on duplicate keys.
fn index_font_dirs(dirs: Vec<PathBuf>) -> FontLookup {
    let t0 = std::time::Instant::now();
    let mut index = FontLookup::new();
    let mut files_parsed = 0u32;
    let mut visited: std::collections::HashSet<PathBuf> = std::collections::HashSet::new();

    // Reverse so the stack pops directories in priority order.
    let mut stack: Vec<PathBuf> = dirs.into_iter().rev().collect();
    while let Some(dir) = stack.pop() {
        if !visited.insert(dir.clone()) {
            continue;
        }
        let Ok(entries) = std::fs::read_dir(&dir) else {
            continue;
        };
        let mut files: Vec<PathBuf> = Vec::new();
        for entry in entries.flatten() {
            let path = entry.path();
            if path.is_dir() {
                stack.push(path);
            } else if is_font_file(&path) {
                files.push(path);
            }
        }
        files.sort();
        for file_path in files {
            let Ok(file) = std::fs::File::open(&file_path) else {
                continue;
            };
            // SAFETY: font files are opened read-only and only read during the scan.
            let Ok(data) = (unsafe { Mmap::map(&file) }) else {
                continue;
            };
            files_parsed += 1;
            let face_count = ttf_parser::fonts_in_collection(&data).unwrap_or(1);
            for face_idx in 0..face_count {
                let Ok(face) = Face::parse(&data, face_idx) else {
                    continue;
                };
                if let Some(family) = font_family_name(&face) {
                    index
                        .entry((family.to_lowercase(), face.is_bold(), face.is_italic()))
                        .or_insert((file_path.clone(), face_idx));
                }
            }
        }
    }

    log::info!(
        "Font scan: {:.1}ms, {} dirs, {} files parsed → {} entries",
        t0.elapsed().as_secs_f64() * 1000.0,
        visited.len(),
        files_parsed,
        index.len(),
    );
    index
}

fn system_font_index() -> &'static FontLookup {
    FONT_INDEX.get_or_init(|| index_font_dirs(system_font_directories()))
}

/// Map a single Unicode char to its WinAnsi (Windows-1252) byte.
fn char_to_winansi(c: char) -> Option<u8> {
    let b = match c as u32 {
        0x0020..=0x007E | 0x00A0..=0x00FF => c as u8,
        0x20AC => 0x80,
        0x201A => 0x82,
        0x0192 => 0x83,
        0x201E => 0x84,
        0x2026 => 0x85,
        0x2020 => 0x86,
        0x2021 => 0x87,
        0x02C6 => 0x88,
        0x2030 => 0x89,
        0x0160 => 0x8A,
        0x2039 => 0x8B,
        0x0152 => 0x8C,
        0x017D => 0x8E,
        0x2018 => 0x91,
        0x2019 => 0x92,
        0x201C => 0x93,
        0x201D => 0x94,
        0x2022 => 0x95,
        0x2013 => 0x96,
        0x2014 => 0x97,
        0x02DC => 0x98,
        0x2122 => 0x99,
        0x0161 => 0x9A,
        0x203A => 0x9B,
        0x0153 => 0x9C,
        0x017E => 0x9E,
        0x0178 => 0x9F,
        _ => return None,
    };
    Some(b)
}

/// Approximate Helvetica widths at 1000 units/em for WinAnsi chars 32..=255.
fn helvetica_widths() -> Vec<f32> {
    (32u8..=255u8)
        .map(|b| match b {
            32 => 278.0,                          // space
            33..=47 => 333.0,                     // punctuation
            48..=57 => 556.0,                     // digits
            58..=64 => 333.0,                     // more punctuation
            73 | 74 => 278.0,                     // I J (narrow uppercase)
            77 => 833.0,                          // M (wide)
            65..=90 => 667.0,                     // uppercase A-Z (average)
            91..=96 => 333.0,                     // brackets etc.
            102 | 105 | 106 | 108 | 116 => 278.0, // narrow lowercase: f i j l t
            109 | 119 => 833.0,                   // m w (wide)
            97..=122 => 556.0,                    // lowercase a-z (average)
            _ => 556.0,
        })
        .collect()
}

/// A font as written into the PDF, ready to encode show-text strings.
pub(crate) struct EmbeddedFont {
    pub(crate) pdf_name: String,
    pub(crate) font_ref: Ref,
    char_to_gid: Option<HashMap<char, u16>>,
}

impl EmbeddedFont {
    pub(crate) fn encode(&self, text: &str) -> Vec<u8> {
        match &self.char_to_gid {
            Some(map) => {
                let mut out = Vec::with_capacity(text.len() * 2);
                for ch in text.chars() {
                    let gid = map.get(&ch).copied().unwrap_or(0);
                    out.extend_from_slice(&gid.to_be_bytes());
                }
                out
            }
            None => text.chars().filter_map(char_to_winansi).collect(),
        }
    }
}

impl FontBook {
    /// Write every font that `used` mentions. TrueType faces are subset to the
    /// characters actually drawn.
    pub(crate) fn embed(
        &mut self,
        pdf: &mut Pdf,
        alloc: &mut impl FnMut() -> Ref,
        used: &BTreeMap<FontId, BTreeSet<char>>,
    ) -> HashMap<FontId, EmbeddedFont> {
        let mut out = HashMap::new();
        for (&id, chars) in used {
            let t0 = std::time::Instant::now();
            let font = &self.fonts[id.0];
            let font_ref = alloc();
            let char_to_gid = match &font.source {
                FontSource::Builtin { base_font, .. } => {
                    write_type1(pdf, font_ref, base_font);
                    if let Some(bad) = chars.iter().find(|c| char_to_winansi(**c).is_none() && !c.is_control()) {
                        self.warnings.push(Warning::new(
                            WarningKind::Font,
                            format!("{base_font} cannot show '{bad}'; configure a font that covers it"),
                        ));
                    }
                    None
                }
                FontSource::TrueType {
                    family,
                    data,
                    face_index,
                    ..
                } => match embed_truetype(pdf, font_ref, family, data, *face_index, chars, alloc) {
                    Some(map) => Some(map),
                    None => {
                        self.warnings.push(Warning::new(
                            WarningKind::Font,
                            format!("embedding '{family}' failed, using Helvetica"),
                        ));
                        write_type1(pdf, font_ref, "Helvetica");
                        None
                    }
                },
            };
            log::debug!(
                "embed font {} ({} chars) → {:.1}ms",
                font.pdf_name,
                chars.len(),
                t0.elapsed().as_secs_f64() * 1000.0,
            );
            out.insert(
                id,
                EmbeddedFont {
                    pdf_name: font.pdf_name.clone(),
                    font_ref,
                    char_to_gid,
                },
            );
        }
        out
    }
}

fn write_type1(pdf: &mut Pdf, font_ref: Ref, base_font: &str) {
    pdf.type1_font(font_ref)
        .base_font(Name(base_font.as_bytes()))
        .encoding_predefined(Name(b"WinAnsiEncoding"));
}

/// Embed a TrueType/OpenType font as a CIDFont (Type0 composite) with Identity-H encoding.
fn embed_truetype(
    pdf: &mut Pdf,
    font_ref: Ref,
    family: &str,
    font_data: &[u8],
    face_index: u32,
    used_chars: &BTreeSet<char>,
    alloc: &mut impl FnMut() -> Ref,
) -> Option<HashMap<char, u16>> {
    let face = Face::parse(font_data, face_index).ok()?;
    let units = face.units_per_em() as f32;
    let to_1000 = |v: f32| v / units * 1000.0;

    let bb = face.global_bounding_box();
    let bbox = Rect::new(
        to_1000(bb.x_min as f32),
        to_1000(bb.y_min as f32),
        to_1000(bb.x_max as f32),
        to_1000(bb.y_max as f32),
    );

    let mut remapper = subsetter::GlyphRemapper::new();
    let mut char_to_gid = HashMap::new();
    let mut gid_widths: Vec<(u16, f32)> = Vec::new();
    for &ch in used_chars {
        let Some(gid) = face.glyph_index(ch) else {
            continue;
        };
        let new_gid = remapper.remap(gid.0);
        char_to_gid.insert(ch, new_gid);
        let adv = face.glyph_hor_advance(gid).unwrap_or(0) as f32;
        gid_widths.push((new_gid, to_1000(adv)));
    }
    gid_widths.sort_by_key(|&(gid, _)| gid);
    gid_widths.dedup_by_key(|&mut (gid, _)| gid);

    let subset_data = subsetter::subset(font_data, face_index, &remapper).unwrap_or_else(|e| {
        log::warn!("Font subsetting failed for {family}: {e}, embedding full font");
        font_data.to_vec()
    });

    let descriptor_ref = alloc();
    let data_ref = alloc();
    let cid_font_ref = alloc();
    let tounicode_ref = alloc();

    let data_len = i32::try_from(subset_data.len()).ok()?;
    pdf.stream(data_ref, &subset_data)
        .pair(Name(b"Length1"), data_len);

    let ps_name: String = family.chars().filter(|c| !c.is_whitespace()).collect();

    pdf.font_descriptor(descriptor_ref)
        .name(Name(ps_name.as_bytes()))
        .flags(pdf_writer::types::FontFlags::NON_SYMBOLIC)
        .bbox(bbox)
        .italic_angle(0.0)
        .ascent(to_1000(face.ascender() as f32))
        .descent(to_1000(face.descender() as f32))
        .cap_height(face.capital_height().map(|h| to_1000(h as f32)).unwrap_or(700.0))
        .stem_v(80.0)
        .font_file2(data_ref);

    let system_info = || pdf_writer::types::SystemInfo {
        registry: pdf_writer::Str(b"Adobe"),
        ordering: pdf_writer::Str(b"Identity"),
        supplement: 0,
    };
    {
        let mut cid = pdf.cid_font(cid_font_ref);
        cid.subtype(pdf_writer::types::CidFontType::Type2);
        cid.base_font(Name(ps_name.as_bytes()));
        cid.system_info(system_info());
        cid.font_descriptor(descriptor_ref);
        cid.default_width(0.0);
        cid.cid_to_gid_map_predefined(Name(b"Identity"));
        if !gid_widths.is_empty() {
            let mut w = cid.widths();
            for &(gid, width) in &gid_widths {
                w.consecutive(gid, [width]);
            }
        }
    }

    let cmap_name = format!("{ps_name}-UTF16");
    let mut cmap = pdf_writer::types::UnicodeCmap::new(Name(cmap_name.as_bytes()), system_info());
    for (&ch, &new_gid) in &char_to_gid {
        cmap.pair(new_gid, ch);
    }
    let cmap_data = cmap.finish();
    pdf.stream(tounicode_ref, cmap_data.as_slice());

    pdf.type0_font(font_ref)
        .base_font(Name(ps_name.as_bytes()))
        .encoding_predefined(Name(b"Identity-H"))
        .descendant_font(cid_font_ref)
        .to_unicode(tounicode_ref);

    Some(char_to_gid)
}
