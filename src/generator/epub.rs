use std::collections::HashSet;
use std::fs::File;
use std::io::Write;
use std::path::{Path, PathBuf};

use crate::error::{Error, Result};
use crate::generator::{
    Generator, GeneratorOptions, PageEntry, create_output, escape_xml, render_template,
};
use crate::log_scope::LogScope;
use crate::path_utils::{path_to_string_lossy, sanitize_filename};
use crate::types::{Direction, EbookMetadata, get_file_info};
use async_trait::async_trait;
use log::debug;
use percent_encoding::{AsciiSet, CONTROLS, utf8_percent_encode};
use tokio::task::spawn_blocking;
use zip::write::SimpleFileOptions;
use zip::{CompressionMethod, ZipWriter};

const MIMETYPE: &[u8] = b"application/epub+zip";
const CONTAINER_XML: &str = include_str!("../../templates/container.xml");
const STANDARD_OPF: &str = include_str!("../../templates/standard.opf");
const NAVIGATION_XHTML: &str = include_str!("../../templates/navigation-documents.xhtml");
const PAGE_XHTML: &str = include_str!("../../templates/page.xhtml");
const FIXED_LAYOUT_CSS: &str = include_str!("../../templates/fixed-layout-jp.css");

/// Characters escaped in a manifest href path segment.
const HREF_SEGMENT: &AsciiSet = &CONTROLS
    .add(b' ')
    .add(b'"')
    .add(b'#')
    .add(b'%')
    .add(b'&')
    .add(b'\'')
    .add(b'<')
    .add(b'>')
    .add(b'?')
    .add(b'`')
    .add(b'{')
    .add(b'}')
    .add(b'/')
    .add(b'\\');

#[derive(Debug, Clone)]
struct ManifestImage {
    id: String,
    /// Path relative to `item/image/`, percent-encoded.
    href: String,
    mime: &'static str,
    is_cover: bool,
}

#[derive(Debug, Clone)]
struct ManifestPage {
    id: String,
    is_cover: bool,
}

/// A generator for fixed-layout (pre-paginated) EPUB 3 comics.
///
/// Each page becomes one image resource under `item/image/` plus one XHTML
/// wrapper under `item/xhtml/` that shows the image at the declared viewport.
/// The cover is listed in the manifest but kept out of the spine.
pub struct EPub {
    zip: Option<ZipWriter<File>>,
    output_file: PathBuf,
    metadata: EbookMetadata,
    options: GeneratorOptions,
    scope: LogScope,
    images: Vec<ManifestImage>,
    pages: Vec<ManifestPage>,
    spine: Vec<String>,
    nav_items: Vec<(String, String)>,
    used_names: HashSet<String>,
}

impl EPub {
    fn zip_mut(&mut self) -> Result<&mut ZipWriter<File>> {
        self.zip
            .as_mut()
            .ok_or_else(|| Error::Unsupported("Zip writer not available".to_string()))
    }

    fn html_class(&self) -> &'static str {
        match self.options.reading_direction {
            Direction::Ltr => "hltr",
            Direction::Rtl => "vrtl",
        }
    }

    /// Image file stem inside `item/image/`: `chapter/page`, or the page index.
    ///
    /// Labels are sanitized per segment and made unique within the archive.
    fn image_stem(&mut self, page: &PageEntry, index: usize, extension: &str) -> String {
        let page_part = page
            .page_label
            .as_deref()
            .map(sanitize_filename)
            .unwrap_or_else(|| index.to_string());
        let base = match page.chapter_label.as_deref() {
            Some(chapter) => format!("{}/{}", sanitize_filename(chapter), page_part),
            None => page_part,
        };
        let mut stem = base.clone();
        let mut suffix = index;
        while self.used_names.contains(&format!("{}.{}", stem, extension)) {
            stem = format!("{}-{:05}", base, suffix);
            suffix += 1;
        }
        self.used_names.insert(format!("{}.{}", stem, extension));
        stem
    }

    fn render_page(&self, image_href: &str, is_cover: bool) -> String {
        let view_width = self.options.view_width.to_string();
        let view_height = self.options.view_height.to_string();
        let src = format!("../image/{}", image_href);
        let title = escape_xml(&self.metadata.title);
        let language = escape_xml(&self.metadata.language);
        render_template(
            PAGE_XHTML,
            &[
                ("language", language.as_str()),
                ("html_class", self.html_class()),
                ("title", title.as_str()),
                ("view_width", view_width.as_str()),
                ("view_height", view_height.as_str()),
                ("body_type", if is_cover { r#" epub:type="cover""# } else { "" }),
                ("src", src.as_str()),
            ],
        )
    }

    fn render_opf(&self) -> String {
        let meta = &self.metadata;
        let creators: String = meta
            .authors
            .iter()
            .enumerate()
            .map(|(i, author)| {
                format!(
                    "<dc:creator id=\"creator{:02}\">{}</dc:creator>\n",
                    i + 1,
                    escape_xml(author)
                )
            })
            .collect();
        let publisher = meta
            .publisher
            .as_deref()
            .map(|p| format!("<dc:publisher>{}</dc:publisher>\n", escape_xml(p)))
            .unwrap_or_default();
        let subjects: String = meta
            .subjects
            .iter()
            .map(|s| format!("<dc:subject>{}</dc:subject>\n", escape_xml(s)))
            .collect();
        let description = meta
            .description
            .as_deref()
            .map(|d| format!("<dc:description>{}</dc:description>\n", escape_xml(d)))
            .unwrap_or_default();

        let mut manifest = String::new();
        for image in &self.images {
            manifest.push_str(&format!(
                "<item media-type=\"{}\" id=\"{}\" href=\"image/{}\"{}/>\n",
                image.mime,
                image.id,
                image.href,
                if image.is_cover { " properties=\"cover-image\"" } else { "" }
            ));
        }
        for page in &self.pages {
            manifest.push_str(&format!(
                "<item media-type=\"application/xhtml+xml\" id=\"{}\" href=\"xhtml/{}.xhtml\" properties=\"svg{}\"/>\n",
                page.id,
                page.id,
                if page.is_cover { " rendition:page-spread-center" } else { "" }
            ));
        }
        let spine: String = self
            .spine
            .iter()
            .map(|id| format!("<itemref linear=\"yes\" idref=\"{}\"/>\n", id))
            .collect();

        let (direction, writing_mode) = match self.options.reading_direction {
            Direction::Ltr => ("ltr", "horizontal-lr"),
            Direction::Rtl => ("rtl", "horizontal-rl"),
        };
        let modified = meta.modified.format("%Y-%m-%dT%H:%M:%SZ").to_string();
        let view_width = self.options.view_width.to_string();
        let view_height = self.options.view_height.to_string();
        let title = escape_xml(&meta.title);
        let language = escape_xml(&meta.language);
        let identifier = escape_xml(&meta.identifier);

        render_template(
            STANDARD_OPF,
            &[
                ("language", language.as_str()),
                ("title", title.as_str()),
                ("creators", creators.as_str()),
                ("publisher", publisher.as_str()),
                ("subjects", subjects.as_str()),
                ("description", description.as_str()),
                ("identifier", identifier.as_str()),
                ("modified", modified.as_str()),
                ("view_width", view_width.as_str()),
                ("view_height", view_height.as_str()),
                ("writing_mode", writing_mode),
                ("manifest", manifest.as_str()),
                ("direction", direction),
                ("spine", spine.as_str()),
            ],
        )
    }

    fn render_navigation(&self) -> String {
        let mut items: String = self
            .nav_items
            .iter()
            .map(|(id, label)| {
                format!(
                    "<li><a href=\"xhtml/{}.xhtml\">{}</a></li>\n",
                    id,
                    escape_xml(label)
                )
            })
            .collect();
        // The toc list must not be empty; point at the first reading page.
        if items.is_empty() {
            if let Some(first) = self.spine.first() {
                items = format!(
                    "<li><a href=\"xhtml/{}.xhtml\">{}</a></li>\n",
                    first,
                    escape_xml(&self.metadata.title)
                );
            }
        }
        let title = escape_xml(&self.metadata.title);
        let language = escape_xml(&self.metadata.language);
        render_template(
            NAVIGATION_XHTML,
            &[("language", language.as_str()), ("title", title.as_str()), ("nav_items", items.as_str())],
        )
    }
}

#[async_trait]
impl Generator for EPub {
    fn new(
        output_file: &Path,
        metadata: &EbookMetadata,
        options: &GeneratorOptions,
        scope: LogScope,
    ) -> Result<Self> {
        let file = create_output(output_file).map_err(|e| {
            Error::InvalidPath(
                output_file.to_path_buf(),
                format!("Failed to create EPUB file: {}", e),
            )
        })?;
        let mut zip = ZipWriter::new(file);

        // Readers identify the container by this first, uncompressed entry.
        let stored = SimpleFileOptions::default().compression_method(CompressionMethod::Stored);
        zip.start_file("mimetype", stored)?;
        zip.write_all(MIMETYPE)?;

        Ok(EPub {
            zip: Some(zip),
            output_file: output_file.to_path_buf(),
            metadata: metadata.clone(),
            options: *options,
            scope,
            images: Vec::new(),
            pages: Vec::new(),
            spine: Vec::new(),
            nav_items: Vec::new(),
            used_names: HashSet::new(),
        })
    }

    async fn add_page(&mut self, page: PageEntry) -> Result<&mut Self> {
        if page.is_cover && self.images.iter().any(|i| i.is_cover) {
            return Err(Error::Unsupported("Cover already set".to_string()));
        }
        let (extension, mime) = get_file_info(&page.extension)?;
        let index = self.pages.len();

        let stem = self.image_stem(&page, index, extension);
        let href = stem
            .split('/')
            .map(|segment| utf8_percent_encode(segment, HREF_SEGMENT).to_string())
            .collect::<Vec<_>>()
            .join("/");
        let href = format!("{}.{}", href, extension);

        let (image_id, page_id) = if page.is_cover {
            ("cover".to_string(), "p-cover".to_string())
        } else {
            (format!("i-{:05}", index), format!("p-{:05}", index))
        };
        let xhtml = self.render_page(&href, page.is_cover);

        let images = SimpleFileOptions::default().compression_method(CompressionMethod::Stored);
        let documents = SimpleFileOptions::default().compression_method(CompressionMethod::Deflated);
        let zip = self.zip_mut()?;
        zip.start_file(format!("item/image/{}.{}", stem, extension), images)?;
        zip.write_all(&page.data)?;
        zip.start_file(format!("item/xhtml/{}.xhtml", page_id), documents)?;
        zip.write_all(xhtml.as_bytes())?;

        debug!("{} Added {} as {}", self.scope, stem, page_id);
        self.images.push(ManifestImage {
            id: image_id,
            href,
            mime,
            is_cover: page.is_cover,
        });
        if !page.is_cover {
            self.spine.push(page_id.clone());
        }
        if let Some(label) = page.nav_label {
            self.nav_items.push((page_id.clone(), label));
        }
        self.pages.push(ManifestPage {
            id: page_id,
            is_cover: page.is_cover,
        });

        Ok(self)
    }

    async fn save(mut self) -> Result<()> {
        if self.spine.is_empty() {
            return Err(Error::Other(format!(
                "EPUB '{}' has no pages in its reading order",
                path_to_string_lossy(&self.output_file)
            )));
        }

        let opf = self.render_opf();
        let navigation = self.render_navigation();
        let documents = SimpleFileOptions::default().compression_method(CompressionMethod::Deflated);

        let mut zip = self
            .zip
            .take()
            .ok_or_else(|| Error::Unsupported("Zip writer not available".to_string()))?;

        // Finish writing the zip file in a blocking task
        spawn_blocking(move || -> Result<()> {
            zip.start_file("META-INF/container.xml", documents)?;
            zip.write_all(CONTAINER_XML.as_bytes())?;
            zip.start_file("item/standard.opf", documents)?;
            zip.write_all(opf.as_bytes())?;
            zip.start_file("item/navigation-documents.xhtml", documents)?;
            zip.write_all(navigation.as_bytes())?;
            zip.start_file("item/style/fixed-layout-jp.css", documents)?;
            zip.write_all(FIXED_LAYOUT_CSS.as_bytes())?;
            zip.finish()?;
            Ok(())
        })
        .await
        .map_err(|e| Error::AsyncTaskError(e.to_string()))??;

        Ok(())
    }
}
